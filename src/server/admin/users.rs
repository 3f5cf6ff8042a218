use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireSysAdmin;
use crate::error::Error;
use crate::project::Paged;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, PaginationParams};
use crate::server::response::{
    ApiError, ApiResponse, PaginatedResponse, StoreOptionExt, StoreResultExt, parse_page,
};

pub async fn create_user(
    admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }

    let user = match state.store.create_user(username, req.sysadmin) {
        Ok(user) => user,
        Err(Error::AlreadyExists) => {
            return Err(ApiError::conflict(format!("user {username} already exists")));
        }
        Err(e) => {
            tracing::error!("Failed to create user {username}: {e}");
            return Err(ApiError::internal("Failed to create user"));
        }
    };

    tracing::info!(
        user_id = user.id,
        sysadmin = user.sysadmin,
        created_by = admin.user.id,
        "Created user {}",
        user.username
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn list_users(
    _admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let page = parse_page(params.page, params.page_size)?;

    let total = state.store.count_users().api_err("Failed to count users")?;
    let users = state
        .store
        .list_users(page.page_size, page.offset())
        .api_err("Failed to list users")?;

    Ok::<_, ApiError>(PaginatedResponse::new(
        Paged {
            items: users,
            total,
            page,
        },
        "/api/v1/admin/users",
        Vec::new(),
    ))
}

pub async fn get_user(
    _admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}
