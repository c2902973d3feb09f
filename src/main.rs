//! Socialpost binary entry point

use socialpost::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber described by the logging config
///
/// `RUST_LOG`, when set, replaces the configured level.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "socialpost={},tower_http=debug",
            logging.level.to_ascii_lowercase()
        )
        .into()
    });

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from it
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Build Axum router and start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!("Starting Socialpost...");

    // 3. Initialize metrics
    socialpost::metrics::init_metrics();

    tracing::info!(
        ledger_bucket = %config.storage.ledger.bucket,
        ledger_mode = ?config.storage.ledger.mode,
        media_bucket = %config.storage.media.bucket,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config).await?;

    // 5. Build router and serve
    let app = socialpost::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
