//! Applies the event store schema migrations.

use std::error::Error;

use chronicle_event_store::MIGRATOR;
use chronicle_event_store::config::EventStoreConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = EventStoreConfig::from_env()?;
    tracing::info!(
        max_connections = config.max_connections,
        "Connecting to event store database"
    );

    let pool = config.connect().await?;
    MIGRATOR.run(&pool).await?;

    tracing::info!("Event store migrations applied");
    Ok(())
}
