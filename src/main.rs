//! facewatch server
//!
//! Main entry point: wiring and startup.

use facewatch::{
    alerts::AlertDispatcher,
    frame_source::FfmpegSourceOpener,
    monitor_registry::MonitorRegistry,
    notifications::{EmailSink, NotificationSink, SmsSink, WebhookSink},
    recognizer::HttpRecognitionEngine,
    recording::FfmpegWriterFactory,
    state::{AppConfig, AppState},
    storage::S3Storage,
    store::{self, ContactRepository, StreamRepository, TargetRepository},
    web_api,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facewatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting facewatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        database_url = %config.database_url,
        engine_url = %config.engine_url,
        recordings_dir = %config.recordings_dir.display(),
        s3_bucket = %config.s3_bucket,
        "Configuration loaded"
    );

    // Create database pool
    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;
    store::init_schema(&pool).await?;
    tracing::info!("Database connected");

    let streams = StreamRepository::new(pool.clone());
    let targets = TargetRepository::new(pool.clone());
    let contacts = ContactRepository::new(pool.clone());

    // No monitor survives a restart; stale active flags are lies
    let cleared = streams.deactivate_all().await?;
    if cleared > 0 {
        tracing::info!(cleared = cleared, "Reset stale active flags from previous run");
    }

    tokio::fs::create_dir_all(&config.recordings_dir).await?;

    // Recognition engine client
    let engine = Arc::new(HttpRecognitionEngine::new(
        config.engine_url.clone(),
        config.model.clone(),
    ));
    if !engine.health_check().await.unwrap_or(false) {
        tracing::warn!(engine_url = %config.engine_url, "Recognition engine not reachable at startup");
    }

    // Object store for finished recordings
    let object_store = Arc::new(S3Storage::from_env(config.s3_bucket.clone()).await);

    // Notification sinks (each enabled by its own configuration)
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Some(ref email) = config.email {
        match EmailSink::new(
            &email.smtp_server,
            email.smtp_port,
            &email.sender,
            &email.password,
        ) {
            Ok(sink) => {
                tracing::info!(smtp_server = %email.smtp_server, "Email sink enabled");
                sinks.push(Arc::new(sink));
            }
            Err(e) => {
                tracing::error!(error = %e, "Email sink disabled, configuration invalid");
            }
        }
    }
    if let Some(ref twilio) = config.twilio {
        tracing::info!("SMS sink enabled");
        sinks.push(Arc::new(SmsSink::new(
            twilio.account_sid.clone(),
            twilio.auth_token.clone(),
            twilio.from_number.clone(),
        )));
    }
    if let Some(ref url) = config.webhook_url {
        tracing::info!(url = %url, "Webhook sink enabled");
        sinks.push(Arc::new(WebhookSink::new(url.clone())));
    }
    if sinks.is_empty() {
        tracing::warn!("No notification sinks configured, alerts will only upload the artifact");
    }

    let dispatcher = Arc::new(AlertDispatcher::new(
        object_store,
        sinks,
        contacts.clone(),
    ));

    // Recording writer factory (one mp4 per session)
    let writer_factory = Arc::new(FfmpegWriterFactory::new(
        config.recordings_dir.clone(),
        config.recording_fps,
    ));

    // Monitor registry
    let registry = Arc::new(MonitorRegistry::new(
        streams.clone(),
        Arc::new(FfmpegSourceOpener),
        engine.clone(),
        writer_factory,
        dispatcher,
        config.monitor.clone(),
    ));
    tracing::info!("Monitor registry initialized");

    // Create application state
    let state = AppState {
        pool,
        config,
        registry: registry.clone(),
        streams,
        targets,
        contacts,
        engine,
    };

    // Create router
    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop every pipeline before exit so no session is left open
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
