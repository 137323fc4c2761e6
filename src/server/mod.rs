use crate::config::Config;
use crate::sources::{build_client, HttpFetcher, RandomSource, VideoSearch};
use crate::streaming::{self, FfmpegLauncher, StreamService};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod routes;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// The transcoding job cache
    pub streams: StreamService,
    pub random: RandomSource,
    pub search: VideoSearch,
}

impl AppContext {
    /// Wire the HTTP collaborators from config around an existing stream
    /// service.
    pub fn new(config: Config, streams: StreamService) -> Self {
        let client = build_client(&config.fetch.user_agent);
        let sources = &config.sources;

        let random = RandomSource::new(client.clone(), sources.random_list_url.clone());
        let search = VideoSearch::new(
            client,
            sources.youtube_api_base.clone(),
            sources.resolved_youtube_api_key(),
            sources.search_cache_dir.clone(),
            Duration::from_secs(sources.search_cache_ttl_secs),
        );

        Self {
            config: Arc::new(config),
            streams,
            random,
            search,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    let prefix = ctx.config.server.stream_prefix.trim_end_matches('/').to_string();
    let artifacts = ServeDir::new(ctx.streams.store().base());

    Router::new()
        .route("/", get(routes::root))
        .route("/slideshow", get(routes::slideshow))
        .route("/health", get(routes::health_check))
        .route("/api/streams", get(routes::streams_status))
        .nest_service(&prefix, artifacts)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let launcher = FfmpegLauncher::locate(
        config.encoder.ffmpeg_path.as_deref(),
        (&config.encoder).into(),
    )
    .context("ffmpeg is required to serve streams")?;
    tracing::info!("Using ffmpeg at {:?}", launcher.ffmpeg());

    std::fs::create_dir_all(&config.cache.base_dir).with_context(|| {
        format!("Failed to create stream directory: {:?}", config.cache.base_dir)
    })?;

    let fetcher = HttpFetcher::new(&config.fetch.user_agent);
    let streams = streaming::build_service(&config, Arc::new(launcher), Arc::new(fetcher));
    let cached = streams.store().list().map(|keys| keys.len()).unwrap_or(0);
    tracing::info!(
        capacity = config.cache.capacity,
        cached,
        "Stream cache at {:?}",
        config.cache.base_dir
    );

    let ctx = AppContext::new(config, streams.clone());
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    streams.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
