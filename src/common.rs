// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Response formatting shared by every route: JSON bodies and the permissive
//! cross-origin header set the browser client relies on.

use crate::IntakeError;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tower_http::cors::{Any, CorsLayer};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Result of handling one gateway event, in the shape the gateway expects back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl GatewayResponse {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[cfg(test)]
    pub fn json_body(&self) -> Result<serde_json::Value, IntakeError> {
        serde_json::from_str(&self.body)
            .map_err(|e| IntakeError::InternalError(format!("Response body is not JSON: {e}")))
    }
}

/// Headers attached to every response, success or failure.
pub fn response_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        (
            "Access-Control-Allow-Origin".to_string(),
            ALLOW_ORIGIN.to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            ALLOW_METHODS.to_string(),
        ),
        (
            "Access-Control-Allow-Headers".to_string(),
            ALLOW_HEADERS.to_string(),
        ),
    ])
}

/// Serialize `body` as the JSON payload of a response with the standard header set.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<GatewayResponse, IntakeError> {
    let body = serde_json::to_string(body)
        .map_err(|e| IntakeError::InternalError(format!("Failed to serialize response: {e}")))?;
    Ok(GatewayResponse {
        status_code: status.as_u16(),
        headers: response_headers(),
        body,
    })
}

impl From<IntakeError> for GatewayResponse {
    fn from(err: IntakeError) -> Self {
        GatewayResponse {
            status_code: err.status_code().as_u16(),
            headers: response_headers(),
            body: json!({ "error": err.public_message() }).to_string(),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Answers browser preflight requests with the same policy `response_headers` advertises.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
