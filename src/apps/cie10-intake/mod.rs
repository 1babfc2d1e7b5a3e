// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod candidates;
pub mod config;
pub mod endpoints;
pub mod ip;
pub mod openrouter;
pub mod router;
pub mod store;
pub mod types;

pub use candidates::{CandidateGenerator, KeywordCandidateGenerator, KEYWORD_CATEGORIES};
pub use config::IntakeConfig;
pub use endpoints::{build_router, handle_event, select_code, submit_texto};
pub use ip::{resolve_client_ip, UNKNOWN_CLIENT_IP};
pub use router::{resolve_route, Route, ROUTES};
pub use store::{LazySessionStore, SessionStore, StoreBackend};
pub use types::*;

use std::sync::Arc;
use tracing::info;

/// App state shared by every request for the lifetime of the process.
pub struct AppState {
    /// Session store, connected on first write.
    pub store: LazySessionStore,
    pub generator: Arc<dyn CandidateGenerator>,
    /// Use the TCP peer address as the gateway-supplied client address.
    pub trust_peer_address: bool,
}

impl AppState {
    pub fn new(store: LazySessionStore, generator: Arc<dyn CandidateGenerator>) -> Self {
        Self {
            store,
            generator,
            trust_peer_address: true,
        }
    }

    /// Build the state described by `config`. The store is not contacted here.
    pub fn from_config(config: &IntakeConfig) -> anyhow::Result<Self> {
        let generator =
            config.candidate_generator(std::env::var("OPENROUTER_API_KEY").ok())?;
        info!(
            "Using {} candidates and {} session store",
            generator.name(),
            config.store_backend().kind()
        );
        Ok(Self {
            store: LazySessionStore::new(config.store_backend()),
            generator,
            trust_peer_address: config.trust_peer_address,
        })
    }
}
