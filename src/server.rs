//! HTTP front end for the query service.
//!
//! - `POST /search` with `{"query": "...", "limit": 5}` returns the hits
//! - `GET /health` reports the record count and embedding dimension
//!
//! Errors come back as `{"kind": ..., "message": ...}`: `400` for an empty
//! query or an unreadable body, `504` when the query embedding times out,
//! `500` otherwise.

#[cfg(feature = "http-server")]
mod http {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::extract::rejection::JsonRejection;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde::{Deserialize, Serialize};
    use tower_http::cors::CorsLayer;

    use crate::error::SearchError;
    use crate::search::QueryService;

    /// Body of `POST /search`.
    #[derive(Debug, Deserialize)]
    pub struct SearchRequest {
        #[serde(default)]
        pub query: Option<String>,
        #[serde(default)]
        pub limit: Option<usize>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HealthResponse {
        pub status: String,
        pub records: usize,
        pub dimension: usize,
        pub model: String,
    }

    impl IntoResponse for SearchError {
        fn into_response(self) -> Response {
            let status = match &self {
                SearchError::EmptyQuery | SearchError::InvalidRequest { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SearchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if self.is_integrity_fault() {
                tracing::error!("index and corpus are out of step: {self}");
            } else if status.is_server_error() {
                tracing::error!("search failed: {self}");
            }
            (status, Json(self.to_body())).into_response()
        }
    }

    async fn search(
        State(service): State<Arc<QueryService>>,
        request: Result<Json<SearchRequest>, JsonRejection>,
    ) -> Result<Response, SearchError> {
        let Json(request) = request.map_err(|rejection| SearchError::InvalidRequest {
            reason: rejection.body_text(),
        })?;
        let query = request.query.unwrap_or_default();
        let timeout = service.config().timeout();
        let started = std::time::Instant::now();

        let hits = service
            .search_with_timeout(&query, request.limit, timeout)
            .await?;

        tracing::debug!(
            "query answered with {} hits in {}ms",
            hits.len(),
            started.elapsed().as_millis()
        );
        Ok(Json(hits).into_response())
    }

    async fn health(State(service): State<Arc<QueryService>>) -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "ok".to_string(),
            records: service.len(),
            dimension: service.dimension().get(),
            model: service.model_name().to_string(),
        })
    }

    /// Routes for `service`.
    pub fn router(service: Arc<QueryService>) -> Router {
        Router::new()
            .route("/search", post(search))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(service)
    }

    /// Serves `service` on `bind` until Ctrl+C.
    pub async fn serve_http(service: Arc<QueryService>, bind: String) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        tracing::info!("listening on http://{bind}");
        eprintln!("Search endpoint: POST http://{bind}/search");
        eprintln!("Health check: http://{bind}/health");
        eprintln!("Press Ctrl+C to stop the server");

        axum::serve(listener, router(service))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server shut down gracefully");
        Ok(())
    }

    async fn shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {e}");
            return;
        }
        eprintln!("Received shutdown signal");
    }

}

#[cfg(feature = "http-server")]
pub use http::{HealthResponse, SearchRequest, router, serve_http};

#[cfg(not(feature = "http-server"))]
pub async fn serve_http(
    _service: std::sync::Arc<crate::search::QueryService>,
    _bind: String,
) -> anyhow::Result<()> {
    anyhow::bail!(
        "HTTP server support is not compiled in. Rebuild with: cargo build --features http-server"
    )
}
