// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::candidates::{CandidateGenerator, KeywordCandidateGenerator};
use super::openrouter::{OpenRouterCandidateGenerator, OpenRouterConfig};
use super::store::StoreBackend;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

lazy_static::lazy_static! {
    /// Configuration shipped with the binary, used when CIE10_CONFIG is not set.
    pub static ref DEFAULT_CONFIG: IntakeConfig = {
        let config_str = include_str!("intake_config.yaml");
        serde_yaml::from_str(config_str)
            .expect("Failed to parse intake_config.yaml")
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    pub listen_addr: String,
    /// Treat the TCP peer as the gateway-supplied client address.
    #[serde(default = "default_true")]
    pub trust_peer_address: bool,
    pub store: StoreConfig,
    pub candidates: CandidatesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreKind,
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Connect and per-command response timeout for Redis.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Keyword,
    OpenRouter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatesConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_candidates_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    "sesiones".to_string()
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_candidates_timeout_ms() -> u64 {
    20_000
}

impl IntakeConfig {
    /// Load from the file named by `CIE10_CONFIG` (or the embedded default), then
    /// apply `CIE10_*` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CIE10_CONFIG") {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {path}"))?;
                Self::from_yaml_str(&contents)
                    .with_context(|| format!("Failed to parse config file {path}"))?
            }
            Err(_) => DEFAULT_CONFIG.clone(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CIE10_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(url) = lookup("CIE10_REDIS_URL") {
            self.store.redis_url = url;
        }
        if let Some(backend) = lookup("CIE10_STORE_BACKEND") {
            self.store.backend = serde_yaml::from_str(&backend.to_lowercase())
                .with_context(|| format!("Unknown store backend {backend}"))?;
        }
        if let Some(provider) = lookup("CIE10_CANDIDATE_PROVIDER") {
            self.candidates.provider = serde_yaml::from_str(&provider.to_lowercase())
                .with_context(|| format!("Unknown candidate provider {provider}"))?;
        }
        Ok(())
    }

    pub fn store_backend(&self) -> StoreBackend {
        match self.store.backend {
            StoreKind::Redis => StoreBackend::Redis {
                url: self.store.redis_url.clone(),
                key_prefix: self.store.key_prefix.clone(),
                timeout: Duration::from_millis(self.store.timeout_ms),
            },
            StoreKind::Memory => StoreBackend::Memory,
        }
    }

    /// Build the configured candidate generator. `api_key` is only needed for OpenRouter.
    pub fn candidate_generator(
        &self,
        api_key: Option<String>,
    ) -> anyhow::Result<Arc<dyn CandidateGenerator>> {
        match self.candidates.provider {
            ProviderKind::Keyword => Ok(Arc::new(KeywordCandidateGenerator::new())),
            ProviderKind::OpenRouter => {
                let api_key = api_key
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| anyhow!("OPENROUTER_API_KEY is required for the openrouter provider"))?;
                let config = OpenRouterConfig::new(
                    api_key,
                    self.candidates.model.clone(),
                    self.candidates.base_url.clone(),
                )
                .with_timeout(Duration::from_millis(self.candidates.timeout_ms));
                Ok(Arc::new(OpenRouterCandidateGenerator::new(config)?))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DEFAULT_CONFIG.clone();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert!(config.trust_peer_address);
        assert_eq!(config.store.backend, StoreKind::Redis);
        assert_eq!(config.store.key_prefix, "sesiones");
        assert_eq!(config.candidates.provider, ProviderKind::Keyword);
        assert_eq!(config.store.timeout_ms, 2_000);
        assert_eq!(config.candidates.timeout_ms, 20_000);
        match config.store_backend() {
            StoreBackend::Redis { timeout, .. } => {
                assert_eq!(timeout, Duration::from_millis(2_000))
            }
            StoreBackend::Memory => panic!("expected the redis backend"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CIE10_LISTEN_ADDR", "127.0.0.1:8080"),
            ("CIE10_STORE_BACKEND", "Memory"),
            ("CIE10_CANDIDATE_PROVIDER", "openrouter"),
        ]);
        let mut config = DEFAULT_CONFIG.clone();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.store.backend, StoreKind::Memory);
        assert!(matches!(config.store_backend(), StoreBackend::Memory));
        assert_eq!(config.candidates.provider, ProviderKind::OpenRouter);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = DEFAULT_CONFIG.clone();
        let result = config.apply_overrides(|key| {
            (key == "CIE10_STORE_BACKEND").then(|| "dynamo".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_openrouter_requires_key() {
        let config = IntakeConfig::from_yaml_str(
            r#"
listen_addr: "0.0.0.0:3000"
store:
  backend: memory
candidates:
  provider: openrouter
  model: "openai/gpt-4o-mini"
  base_url: "https://openrouter.ai/api/v1"
"#,
        )
        .unwrap();
        assert!(config.trust_peer_address);
        assert!(config.candidate_generator(None).is_err());
        let generator = config.candidate_generator(Some("sk-test".to_string())).unwrap();
        assert_eq!(generator.name(), "openrouter");
    }
}
