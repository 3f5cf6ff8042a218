use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::MemberRequest;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_members(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let members = state.controller.list_members(&auth.user, id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(members)))
}

pub async fn add_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MemberRequest>,
) -> impl IntoResponse {
    let role = req.role()?;
    let member = state
        .controller
        .add_member(&auth.user, id, req.user_id, role)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(member))))
}

pub async fn remove_member(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    state.controller.remove_member(&auth.user, id, user_id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
