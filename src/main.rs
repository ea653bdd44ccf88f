use api_rest::{AppState, cors_layer, parse_origins, router};
use habit_core::{AnalysisService, CoreConfig, OpenAiCompatibleClient, ledger};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ENV_REST_ADDR: &str = "HABIT_REST_ADDR";
const ENV_CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
const DEFAULT_REST_ADDR: &str = "0.0.0.0:8000";

/// Main entry point for the behavioural analysis service
///
/// Resolves and validates configuration, builds the language-model and ledger clients, and serves
/// the REST API until interrupted.
///
/// # Environment Variables
/// - `HABIT_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `CORS_ALLOWED_ORIGINS`: comma-separated allowed origins (default: any)
/// - everything read by `CoreConfig::from_env`
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - a required variable is missing or any value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("habit=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::from_env()?);

    let model = Arc::new(OpenAiCompatibleClient::new(cfg.model())?);
    let ledger = ledger::from_config(cfg.ledger())?;
    let service = AnalysisService::new(&cfg, model, ledger);

    let origins = parse_origins(&std::env::var(ENV_CORS_ALLOWED_ORIGINS).unwrap_or_default());
    let cors = cors_layer(&origins).map_err(|o| anyhow::anyhow!("invalid CORS origin: {o:?}"))?;

    let app = router(
        AppState {
            service: Arc::new(service),
        },
        cors,
    );

    let addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    tracing::info!(
        "++ Model {} at {}, response format {}",
        cfg.model().model,
        cfg.model().base_url,
        cfg.response_format()
    );
    tracing::info!(
        "++ Ledger {} for contract {}",
        cfg.ledger().backend.as_str(),
        cfg.ledger().contract_address
    );
    tracing::info!("++ Starting behavioral analysis REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}

/// Resolves once `signal` fires. If the signal handler cannot be installed this never resolves,
/// so the server keeps running.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("-- Shutdown requested"),
        Err(e) => {
            tracing::error!("failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
