// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of characters of submitted text that is kept.
pub const MAX_TEXTO_CHARS: usize = 200;

/// One CIE-10 code suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub codigo: String,
    #[serde(default)]
    pub desc: String,
}

impl Candidate {
    pub fn new(codigo: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            codigo: codigo.into(),
            desc: desc.into(),
        }
    }
}

/// Durable record written once for every accepted `/texto` submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Trimmed input, at most `MAX_TEXTO_CHARS` characters.
    pub texto: String,
    /// Always serialized, including when empty.
    pub candidatos_gpt: Vec<Candidate>,
    pub ip_cliente: String,
    /// UTC, second precision, `Z` suffix. Assigned when the record is written.
    pub timestamp: String,
}

/// Request for /texto
#[derive(Debug, Default, Deserialize)]
pub struct TextoRequest {
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// Response for /texto. `codes` and `codigos` mirror `candidatos_gpt` for older clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct TextoResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub candidatos_gpt: Vec<Candidate>,
    pub codes: Vec<Candidate>,
    pub codigos: Vec<Candidate>,
}

impl TextoResponse {
    pub fn new(session_id: String, candidates: Vec<Candidate>) -> Self {
        Self {
            session_id,
            codes: candidates.clone(),
            codigos: candidates.clone(),
            candidatos_gpt: candidates,
        }
    }
}

/// Request for /select
#[derive(Debug, Default, Deserialize)]
pub struct SelectRequest {
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub codigo: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

/// Response for /select
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectResponse {
    pub ok: bool,
}

// ============================================
// Gateway Event Shapes
// ============================================

/// Request payload as delivered by the front-door gateway. Covers both the modern
/// HTTP shape (`requestContext.http`, `rawPath`) and the legacy REST shape
/// (`requestContext.identity`, `httpMethod`, `path`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub raw_path: Option<String>,
    /// Header values may be null in gateway payloads; those count as absent.
    #[serde(default)]
    pub headers: Option<HashMap<String, Option<String>>>,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
    /// A JSON string, an already-decoded JSON value, or absent.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
    #[serde(default)]
    pub identity: Option<IdentityContext>,
}

/// Modern gateway request context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpContext {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source_ip: Option<String>,
}

/// Legacy gateway caller identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    #[serde(default)]
    pub source_ip: Option<String>,
}

impl GatewayEvent {
    pub fn method(&self) -> &str {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.http.as_ref())
            .and_then(|http| http.method.as_deref())
            .or(self.http_method.as_deref())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.raw_path
            .as_deref()
            .or_else(|| {
                self.request_context
                    .as_ref()
                    .and_then(|ctx| ctx.http.as_ref())
                    .and_then(|http| http.path.as_deref())
            })
            .or(self.path.as_deref())
            .unwrap_or_default()
    }

    pub fn body_is_base64(&self) -> bool {
        self.is_base64_encoded.unwrap_or(false)
    }

    /// Case-insensitive header lookup. An exact-name hit wins; otherwise the
    /// smallest matching key does, so duplicate casings resolve the same way
    /// every time. Null values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        if let Some(Some(value)) = headers.get(name) {
            return Some(value.as_str());
        }
        headers
            .iter()
            .filter_map(|(key, value)| Some((key, value.as_deref()?)))
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_shapes() {
        let modern: GatewayEvent = serde_json::from_value(json!({
            "rawPath": "/texto",
            "requestContext": { "http": { "method": "POST", "path": "/texto", "sourceIp": "192.168.1.100" } },
            "body": "{\"texto\":\"tos\"}",
            "isBase64Encoded": false
        }))
        .unwrap();
        assert_eq!(modern.method(), "POST");
        assert_eq!(modern.path(), "/texto");

        let legacy: GatewayEvent = serde_json::from_value(json!({
            "httpMethod": "POST",
            "path": "/select",
            "headers": null,
            "requestContext": { "identity": { "sourceIp": "10.0.0.1" } }
        }))
        .unwrap();
        assert_eq!(legacy.method(), "POST");
        assert_eq!(legacy.path(), "/select");
        assert_eq!(legacy.header("x-forwarded-for"), None);
    }

    #[test]
    fn test_null_header_and_base64_flag_accepted() {
        let event: GatewayEvent = serde_json::from_value(json!({
            "rawPath": "/texto",
            "headers": { "X-Foo": null, "X-Real-IP": "203.0.113.5" },
            "body": "{\"texto\":\"tos\"}",
            "isBase64Encoded": null
        }))
        .unwrap();
        assert_eq!(event.header("x-foo"), None);
        assert_eq!(event.header("x-real-ip"), Some("203.0.113.5"));
        assert!(!event.body_is_base64());
    }

    #[test]
    fn test_header_duplicate_casings_resolve_deterministically() {
        let event: GatewayEvent = serde_json::from_value(json!({
            "headers": {
                "X-Forwarded-For": "203.0.113.1",
                "x-forwarded-for": "203.0.113.2",
                "X-FORWARDED-FOR": "203.0.113.3"
            }
        }))
        .unwrap();
        // Exact name first.
        assert_eq!(event.header("x-forwarded-for"), Some("203.0.113.2"));
        assert_eq!(event.header("X-Forwarded-For"), Some("203.0.113.1"));
        // No exact hit: smallest key ("X-FORWARDED-FOR" < "X-Forwarded-For").
        for _ in 0..8 {
            assert_eq!(event.header("x-FORWARDED-for"), Some("203.0.113.3"));
        }

        let null_exact: GatewayEvent = serde_json::from_value(json!({
            "headers": { "x-real-ip": null, "X-Real-IP": "203.0.113.5" }
        }))
        .unwrap();
        assert_eq!(null_exact.header("x-real-ip"), Some("203.0.113.5"));
    }

    #[test]
    fn test_record_keeps_empty_candidates() {
        let record = SessionRecord {
            session_id: "abc".to_string(),
            texto: "texto sin palabras clave".to_string(),
            candidatos_gpt: vec![],
            ip_cliente: "unknown".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["candidatos_gpt"], json!([]));
        assert_eq!(value["sessionId"], "abc");
    }

    #[test]
    fn test_texto_response_aliases() {
        let response = TextoResponse::new("s1".to_string(), vec![Candidate::new("R05", "Tos")]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["candidatos_gpt"], value["codes"]);
        assert_eq!(value["candidatos_gpt"], value["codigos"]);
    }
}
