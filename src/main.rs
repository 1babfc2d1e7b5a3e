// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use cie10_intake_server::app::{build_router, AppState, IntakeConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cie10_intake_server=info,tower_http=info".into()),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::load()?;
    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
