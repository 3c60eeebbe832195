use std::sync::Arc;

use anyhow::Context;

use splitledger_api::app::{build_app, services::AppServices};
use splitledger_api::config::{self, ApiConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    splitledger_observability::init(config::log_format_from_lookup(|key| std::env::var(key).ok()));
    let config = ApiConfig::from_env();

    let services = Arc::new(AppServices::in_memory(config.ledger));
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        allow_solo_groups = config.ledger.allow_solo_groups,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
