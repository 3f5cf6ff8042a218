use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, ValidatedToken, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::types::{Token, User};

/// Extractor that requires a valid token.
pub struct RequireUser {
    pub token: Token,
    pub user: User,
}

/// Extractor that requires a token owned by a system administrator.
pub struct RequireSysAdmin {
    pub token: Token,
    pub user: User,
}

/// Resolves the caller when credentials are present; anonymous otherwise.
/// Credentials that are present but invalid are still rejected.
pub struct OptionalUser {
    pub user: Option<User>,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotSysAdmin,
    InternalError,
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::NotSysAdmin => (StatusCode::FORBIDDEN, "System admin access required"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"dockyard\""),
            );
        }

        response
    }
}

fn authenticate(
    parts: &Parts,
    state: &Arc<AppState>,
) -> Result<Option<ValidatedToken>, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(raw_token) = extract_token_from_header(auth_header)? else {
        return Ok(None);
    };

    Ok(Some(validate_token(state.store.as_ref(), &raw_token)?))
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = authenticate(parts, state)?.ok_or(AuthError::MissingAuth)?;
        Ok(RequireUser {
            token: validated.token,
            user: validated.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireSysAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = authenticate(parts, state)?.ok_or(AuthError::MissingAuth)?;

        if !validated.user.sysadmin {
            return Err(AuthError::NotSysAdmin);
        }

        Ok(RequireSysAdmin {
            token: validated.token,
            user: validated.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?.map(|v| v.user);
        Ok(OptionalUser { user })
    }
}
