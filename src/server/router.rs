use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::projects::projects_router;
use crate::project::ProjectController;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub controller: ProjectController,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, controller: ProjectController) -> Self {
        Self { store, controller }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", projects_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
