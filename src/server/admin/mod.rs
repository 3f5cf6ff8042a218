mod tokens;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // User routes
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/users/{id}/tokens",
            post(tokens::create_user_token).get(tokens::list_user_tokens),
        )
        // Token routes
        .route("/tokens/{id}", delete(tokens::delete_token))
}
