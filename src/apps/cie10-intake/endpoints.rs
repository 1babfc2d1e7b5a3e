// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::common::{cors_layer, json_response, GatewayResponse};
use crate::IntakeError;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::Engine;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Largest request body the HTTP adapter will read.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Entry point for one gateway event: route it, run the handler and format the outcome.
/// Every outcome, including errors, carries the standard header set.
pub async fn handle_event(state: &AppState, event: GatewayEvent) -> GatewayResponse {
    let outcome = match resolve_route(event.method(), event.path()) {
        Ok(Route::SubmitTexto) => submit_texto(state, &event).await,
        Ok(Route::SelectCode) => select_code(&event),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => response,
        Err(e) => {
            match &e {
                IntakeError::ValidationError(_) => warn!("Rejected request: {e}"),
                IntakeError::RouteNotFound { .. } => info!("{e}"),
                _ => error!(
                    ip_cliente = %resolve_client_ip(&event),
                    "Failed to process request: {e}"
                ),
            }
            GatewayResponse::from(e)
        }
    }
}

/// POST /texto: validate, truncate, generate candidates and save the session
/// record before answering. A failed save is logged and does not change the
/// response.
pub async fn submit_texto(
    state: &AppState,
    event: &GatewayEvent,
) -> Result<GatewayResponse, IntakeError> {
    let request: TextoRequest = parse_body(event)?;

    let texto = request.texto.as_deref().map(str::trim).unwrap_or_default();
    if texto.is_empty() {
        return Err(IntakeError::ValidationError("texto is required".to_string()));
    }
    let texto = truncate_texto(texto);

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ip_cliente = resolve_client_ip(event);

    let candidates = match state.generator.generate(&texto).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(
                session_id = %session_id,
                "{} generator failed, saving without candidates: {e}",
                state.generator.name()
            );
            Vec::new()
        }
    };

    let persisted = state
        .store
        .save(SessionRecord {
            session_id: session_id.clone(),
            texto,
            candidatos_gpt: candidates.clone(),
            ip_cliente: ip_cliente.clone(),
            timestamp: String::new(),
        })
        .await;

    info!(
        session_id = %session_id,
        ip_cliente = %ip_cliente,
        candidates = candidates.len(),
        persisted,
        "Processed texto submission"
    );

    json_response(StatusCode::OK, &TextoResponse::new(session_id, candidates))
}

/// POST /select: validate and acknowledge the user's final code.
///
/// The selection is logged only. It is not written to the session store and is
/// not linked to the record saved by /texto.
pub fn select_code(event: &GatewayEvent) -> Result<GatewayResponse, IntakeError> {
    let request: SelectRequest = parse_body(event)?;

    let session_id = non_empty(request.session_id.as_deref());
    let codigo = non_empty(request.codigo.as_deref());
    let (Some(session_id), Some(codigo)) = (session_id, codigo) else {
        return Err(IntakeError::ValidationError(
            "sessionId and codigo are required".to_string(),
        ));
    };

    info!(
        session_id = %session_id,
        codigo = %codigo,
        desc = %request.desc.as_deref().unwrap_or_default(),
        "Code selected"
    );

    json_response(StatusCode::OK, &SelectResponse { ok: true })
}

/// First `MAX_TEXTO_CHARS` characters of `texto`.
pub fn truncate_texto(texto: &str) -> String {
    texto.chars().take(MAX_TEXTO_CHARS).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decode the event body into `T`.
///
/// An absent or blank body reads as `{}`. Anything that is not a JSON object,
/// or whose fields have the wrong type, is a `MalformedRequest`.
pub fn parse_body<T: DeserializeOwned>(event: &GatewayEvent) -> Result<T, IntakeError> {
    let value = match &event.body {
        None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
        Some(serde_json::Value::String(raw)) => {
            let raw = if event.body_is_base64() {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(raw.trim())
                    .map_err(|e| {
                        IntakeError::MalformedRequest(format!("Failed to decode base64: {e}"))
                    })?;
                String::from_utf8(bytes).map_err(|e| {
                    IntakeError::MalformedRequest(format!("Invalid UTF-8 in body: {e}"))
                })?
            } else {
                raw.clone()
            };
            if raw.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    IntakeError::MalformedRequest(format!("Failed to parse body: {e}"))
                })?
            }
        }
        Some(other) => other.clone(),
    };

    if !value.is_object() {
        return Err(IntakeError::MalformedRequest(
            "Body is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| IntakeError::MalformedRequest(format!("Unexpected body fields: {e}")))
}

// ============================================
// HTTP adapter
// ============================================

/// Build the gateway event for an HTTP request received directly by this server.
/// `source_ip` fills the modern `requestContext.http.sourceIp` field.
pub fn event_from_http(parts: &Parts, body: String, source_ip: Option<String>) -> GatewayEvent {
    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| Some(value.to_string()));
        }
    }

    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();

    GatewayEvent {
        http_method: None,
        path: None,
        raw_path: Some(path.clone()),
        headers: Some(headers),
        request_context: Some(RequestContext {
            http: Some(HttpContext {
                method: Some(method),
                path: Some(path),
                source_ip,
            }),
            identity: None,
        }),
        body: (!body.is_empty()).then_some(serde_json::Value::String(body)),
        is_base64_encoded: Some(false),
    }
}

/// Fallback handler: every HTTP request is turned into a gateway event and
/// dispatched through `handle_event`.
pub async fn gateway_entry(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .filter(|_| state.trust_peer_address);

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = IntakeError::InternalError(format!("Failed to read request body: {e}"));
            error!(ip_cliente = ?peer_ip, "{err}");
            return err.into_response();
        }
    };
    let body = match String::from_utf8(bytes.to_vec()) {
        Ok(body) => body,
        Err(e) => {
            let err = IntakeError::MalformedRequest(format!("Invalid UTF-8 in body: {e}"));
            error!(ip_cliente = ?peer_ip, "{err}");
            return err.into_response();
        }
    };

    let event = event_from_http(&parts, body, peer_ip);
    handle_event(&state, event).await.into_response()
}

/// HTTP router for the service. Routing itself happens in `resolve_route`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(gateway_entry)
        .layer(cors_layer())
        .with_state(state)
}
