//! # HTTP Server
//!
//! Combines the status, metrics and user routers into one axum server with
//! CORS, request tracing, request counting and graceful shutdown.
//! Shutdown stops accepting connections and lets in-flight requests finish.

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::user_routes::{user_routes, UserState};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::service::UserService;

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// Status route
pub fn status_routes() -> Router {
    Router::new().route("/status", get(status_handler))
}

async fn status_handler() -> impl IntoResponse {
    let response = StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Metrics route
pub fn metrics_routes(metrics: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<MetricsRegistry>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

/// Count every response by method, route template and status
async fn track_requests(
    State(metrics): State<Arc<MetricsRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics.record_request(method.as_str(), &route, response.status().as_u16());
    response
}

/// HTTP Server for the user service
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    shutdown: CancellationToken,
}

impl HttpServer {
    pub fn new(
        config: HttpServerConfig,
        service: UserService,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let state = Arc::new(UserState::new(service, config.request_timeout()));
        let router = Self::build_router(&config, state, metrics);
        Self {
            config,
            router,
            shutdown,
        }
    }

    fn build_router(
        config: &HttpServerConfig,
        state: Arc<UserState>,
        metrics: Arc<MetricsRegistry>,
    ) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(status_routes())
            .merge(metrics_routes(metrics.clone()))
            .nest("/v1", user_routes(state))
            .layer(middleware::from_fn_with_state(metrics, track_requests))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Cancelling this token stops accepting connections; in-flight requests drain
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until the shutdown token is cancelled
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "user service listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("user service stopped");
        Ok(())
    }
}
