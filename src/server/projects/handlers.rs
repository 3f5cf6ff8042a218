use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};

use crate::auth::{OptionalUser, RequireUser};
use crate::server::AppState;
use crate::server::dto::{
    AccessLogParams, ListProjectsParams, ProbeParams, ProjectCreatedResponse, ProjectRequest,
    TogglePublicRequest, parse_public_flag,
};
use crate::server::response::{ApiError, ApiResponse, PaginatedResponse, parse_page};

pub async fn create_project(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProjectRequest>,
) -> impl IntoResponse {
    let public = parse_public_flag(req.public)?;
    let id = state
        .controller
        .create(&auth.user, &req.project_name, public)?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        [(LOCATION, format!("/api/v1/projects/{id}"))],
        Json(ApiResponse::success(ProjectCreatedResponse { id })),
    ))
}

pub async fn probe_project(
    auth: OptionalUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
) -> impl IntoResponse {
    state
        .controller
        .probe(auth.user.as_ref(), params.project_name.as_deref())?;
    Ok::<_, ApiError>(StatusCode::OK)
}

pub async fn list_projects(
    auth: OptionalUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListProjectsParams>,
) -> impl IntoResponse {
    let filter = params.filter()?;
    let page = parse_page(params.page, params.page_size)?;

    let paged = state.controller.list(auth.user.as_ref(), &filter, page)?;

    Ok::<_, ApiError>(PaginatedResponse::new(
        paged,
        "/api/v1/projects",
        params.link_query(),
    ))
}

pub async fn get_project(
    auth: OptionalUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let view = state.controller.get(auth.user.as_ref(), id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(view)))
}

pub async fn delete_project(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state.controller.delete(&auth.user, id)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn toggle_publicity(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<TogglePublicRequest>,
) -> impl IntoResponse {
    let public = parse_public_flag(req.public)?;
    state.controller.toggle_visibility(&auth.user, id, public)?;
    Ok::<_, ApiError>(StatusCode::OK)
}

pub async fn list_access_logs(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<AccessLogParams>,
) -> impl IntoResponse {
    let page = parse_page(params.page, params.page_size)?;

    let paged = state
        .controller
        .filter_access_log(&auth.user, id, &params.filter(), page)?;

    Ok::<_, ApiError>(PaginatedResponse::new(
        paged,
        format!("/api/v1/projects/{id}/logs"),
        params.link_query(),
    ))
}
