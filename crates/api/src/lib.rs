//! `api` crate: HTTP layer for project administration.
//!
//! Exposes:
//!   GET  /healthcheck
//!   GET  /admin/projects
//!   GET  /admin/projects/{projectId}
//!   GET  /admin/projects/{projectId}/members/{membershipId}
//!   POST /admin/projects/{projectId}/members/{membershipId}
//!
//! Everything under `/admin/projects` requires a bearer token.

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use db::Repository;

pub use auth::{Authenticator, CurrentUser, StaticTokenAuthenticator};
pub use error::ApiError;
pub use handlers::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// `(token, user id)` pairs accepted by the static authenticator.
    pub tokens: Vec<(String, String)>,
}

/// Build the router with all routes and middleware.
pub fn build_router(repo: Arc<dyn Repository>, authenticator: Arc<dyn Authenticator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_TYPE]);

    let project_admin = handlers::projects::router().route_layer(middleware::from_fn_with_state(
        authenticator,
        auth::authenticate_token,
    ));

    Router::new()
        .route("/healthcheck", get(handlers::health::healthcheck))
        .nest("/admin/projects", project_admin)
        .with_state(AppState::new(repo))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind `config.bind` and serve until Ctrl-C.
pub async fn serve(config: ServerConfig, repo: Arc<dyn Repository>) -> std::io::Result<()> {
    if config.tokens.is_empty() {
        info!("no access tokens configured; every admin request will be rejected");
    }
    let authenticator = Arc::new(StaticTokenAuthenticator::new(config.tokens.clone()));
    let router = build_router(repo, authenticator);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("API server listening on http://{}", config.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
