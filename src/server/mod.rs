// HTTP server
// Ingests once at startup, then answers FAQ queries over axum

pub mod error;
pub mod handlers;


use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::FaqError;
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::{Embedder, build_embedder};
use crate::ingest::{IngestMode, prepare_store};

pub use error::ApiError;

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub top_k: usize,
}

impl AppState {
    #[inline]
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            store: Arc::new(store),
            embedder,
            top_k,
        }
    }
}

#[inline]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/query", post(handlers::query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the embedder, ingest, then bind and serve until the process ends.
///
/// Nothing is bound if ingestion fails.
#[inline]
pub async fn serve(config: &Config, mode: IngestMode) -> Result<(), FaqError> {
    let embedder = build_embedder(&config.embedding)?;
    let (store, report) = prepare_store(config, &embedder, mode).await?;
    info!(
        "Vector store ready: {} rows in {} ({})",
        report.total_rows,
        store.table_name(),
        if report.skipped { "existing" } else { "ingested" }
    );

    let app = create_router(AppState::new(store, embedder, config.server.top_k));

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| FaqError::Server(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| FaqError::Server(format!("Server stopped: {}", e)))
}
