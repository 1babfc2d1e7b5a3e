// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

// CIE-10 candidate generation through an OpenAI-compatible chat completions API.
// Falls back to the keyword heuristic whenever the service cannot answer.

use super::candidates::{CandidateGenerator, KeywordCandidateGenerator};
use super::types::Candidate;
use crate::IntakeError;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

// ============================================
// Configuration
// ============================================

/// Upper bound on one chat completion round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

const CIE10_SYSTEM_PROMPT: &str = r#"
You are a clinical coding assistant. Given a short free-text clinical description in
Spanish, propose the most likely CIE-10 (ICD-10, Spanish edition) diagnostic codes.

Rules:
1. Output ONLY a JSON array, no markdown, no explanations.
2. Each element is an object: {"codigo": "<CIE-10 code>", "desc": "<official Spanish description>"}.
3. Order the array from most to least likely. Return at most 5 elements.
4. If the text has no clinical content, return [].
"#;

// ============================================
// LLM Service
// ============================================

pub struct OpenRouterCandidateGenerator {
    pub client: reqwest::Client,
    pub config: OpenRouterConfig,
    fallback: KeywordCandidateGenerator,
}

impl OpenRouterCandidateGenerator {
    pub fn new(config: OpenRouterConfig) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                IntakeError::InternalError(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            fallback: KeywordCandidateGenerator::new(),
        })
    }

    /// Ask the model for candidates. Errors are returned as-is; `generate` decides
    /// what to do with them.
    pub async fn request_candidates(&self, texto: &str) -> Result<Vec<Candidate>, IntakeError> {
        info!("Requesting CIE-10 candidates with model: {}", self.config.model);

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": CIE10_SYSTEM_PROMPT },
                { "role": "user", "content": texto }
            ],
            "max_tokens": 800,
            "temperature": 0.0
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                IntakeError::CandidateServiceError(format!("OpenRouter request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IntakeError::CandidateServiceError(format!(
                "OpenRouter returned {status}: {error_text}"
            )));
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            IntakeError::CandidateServiceError(format!("Failed to parse response: {e}"))
        })?;

        let content = response_json["choices"]
            .get(0)
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                IntakeError::CandidateServiceError("No content in response".to_string())
            })?;

        parse_candidates(content)
    }
}

#[async_trait]
impl CandidateGenerator for OpenRouterCandidateGenerator {
    async fn generate(&self, texto: &str) -> Result<Vec<Candidate>, IntakeError> {
        match self.request_candidates(texto).await {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                warn!("{e}; falling back to keyword candidates");
                self.fallback.generate(texto).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

/// Parse model output into candidates. Accepts a bare array or an object with a
/// `candidatos` array, optionally wrapped in a markdown code fence.
pub fn parse_candidates(content: &str) -> Result<Vec<Candidate>, IntakeError> {
    let trimmed = content.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim();

    let parsed: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
        IntakeError::CandidateServiceError(format!("Failed to parse candidate JSON: {e}"))
    })?;

    let items = match parsed {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("candidatos") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(IntakeError::CandidateServiceError(
                    "Candidate object has no candidatos array".to_string(),
                ))
            }
        },
        _ => {
            return Err(IntakeError::CandidateServiceError(
                "Candidate JSON is neither an array nor an object".to_string(),
            ))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Candidate>(item).ok())
        .filter(|c| !c.codigo.trim().is_empty())
        .collect())
}
