use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::auth::{RequireSysAdmin, TokenGenerator};
use crate::server::AppState;
use crate::server::dto::{CreateTokenResponse, CreateUserTokenRequest, TokenResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};

pub async fn create_user_token(
    _admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<CreateUserTokenRequest>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let expires_at = match req.expires_in_seconds {
        Some(secs) if secs <= 0 => {
            return Err(ApiError::bad_request("expires_in_seconds must be positive"));
        }
        Some(secs) => Some(
            Duration::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| ApiError::bad_request("expires_in_seconds is out of range"))?,
        ),
        None => None,
    };

    let issued = TokenGenerator::new()
        .issue(user.id, expires_at)
        .api_err("Failed to generate token")?;

    state
        .store
        .create_token(&issued.token)
        .api_err("Failed to create token")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateTokenResponse {
            token: issued.raw,
            metadata: issued.token.into(),
        })),
    ))
}

pub async fn list_user_tokens(
    _admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state
        .store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let tokens: Vec<TokenResponse> = state
        .store
        .list_user_tokens(id)
        .api_err("Failed to list tokens")?
        .into_iter()
        .map(TokenResponse::from)
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(tokens)))
}

pub async fn delete_token(
    admin: RequireSysAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if id == admin.token.id {
        return Err(ApiError::bad_request("Cannot delete current token"));
    }

    if !state.store.delete_token(&id).api_err("Failed to delete token")? {
        return Err(ApiError::not_found("Token not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
