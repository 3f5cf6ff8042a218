mod handlers;
mod members;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, put},
};

use crate::server::AppState;

pub fn projects_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects",
            get(handlers::list_projects)
                .post(handlers::create_project)
                .head(handlers::probe_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route("/projects/{id}/publicity", put(handlers::toggle_publicity))
        .route("/projects/{id}/logs", get(handlers::list_access_logs))
        // Members
        .route(
            "/projects/{id}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/projects/{id}/members/{user_id}",
            delete(members::remove_member),
        )
}
