mod analysis;
mod artifacts;
mod cache;
mod config;
mod db;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod proposals;
mod routes;
mod state;
mod storage;
mod store;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::extract::DefaultBodyLimit;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{AnalysisConfig, AnalysisEngine};
use crate::cache::MarkdownCache;
use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::extraction::ExtractorRegistry;
use crate::llm_client::LlmClient;
use crate::proposals::ProposalService;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{BlobStore, FsBlobStore, S3BlobStore};
use crate::store::{FsProposalStore, PgProposalStore, ProposalStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RFP API v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(config.uploads_dir()).await?;

    // Proposal records: PostgreSQL when configured, JSON files otherwise
    let store: Arc<dyn ProposalStore> = match &config.database_url {
        Some(url) => {
            let pg = PgProposalStore::new(create_pool(url).await?);
            pg.ensure_schema().await?;
            info!("Proposal records stored in PostgreSQL");
            Arc::new(pg)
        }
        None => {
            let dir = config.records_dir();
            info!("Proposal records stored under {}", dir.display());
            Arc::new(FsProposalStore::open(dir).await?)
        }
    };

    // Blobs: S3 / MinIO when configured, local disk otherwise
    let blobs: Arc<dyn BlobStore> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 client initialized (bucket: {})", s3.bucket);
            Arc::new(S3BlobStore::new(client, s3.bucket.clone()))
        }
        None => {
            let dir = config.blobs_dir();
            info!("Blobs stored under {}", dir.display());
            Arc::new(FsBlobStore::new(dir))
        }
    };

    // Initialize LLM client and the model fallback engine
    let llm = LlmClient::new(
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.llm_timeout,
    )?;
    if config.models.is_empty() {
        warn!("GEMINI_MODELS is empty; every analysis will fail");
    }
    info!("LLM client initialized (models: {})", config.models.join(", "));
    let engine = AnalysisEngine::new(
        Arc::new(llm),
        AnalysisConfig {
            models: config.models.clone(),
            deadline: config.analysis_deadline,
        },
    );

    let proposals = ProposalService::new(store, blobs, ExtractorRegistry::default(), engine);

    if let Some(interval) = config.cache_sweep_interval {
        spawn_cache_sweep(proposals.cache().clone(), interval);
    }

    let max_upload_bytes = config.max_upload_bytes;
    let port = config.port;
    let state = AppState {
        proposals,
        config: Arc::new(config),
    };

    // Build router
    let app = build_router(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically deletes expired extraction cache entries.
fn spawn_cache_sweep(cache: MarkdownCache, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = cache.sweep_expired(Utc::now()).await {
                warn!("cache sweep failed: {e}");
            }
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "rfp-api-static",
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let s3_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(config.endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
