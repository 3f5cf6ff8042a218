use axum::{
    Json,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::LINK},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Result as StoreResult;
use crate::project::{Page, Paged, ProjectError};

pub const X_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// Offset-paginated list body; headers are added by [`PaginatedResponse::into_response`].
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    #[serde(skip)]
    path: String,
    #[serde(skip)]
    query: Vec<(&'static str, String)>,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// `query` holds the filter parameters to repeat in `Link` URLs.
    #[must_use]
    pub fn new(paged: Paged<T>, path: impl Into<String>, query: Vec<(&'static str, String)>) -> Self {
        Self {
            data: paged.items,
            total: paged.total,
            page: paged.page.page,
            page_size: paged.page.page_size,
            path: path.into(),
            query,
        }
    }

    fn link(&self, page: i64, rel: &str) -> String {
        let mut url = format!("{}?page={page}&page_size={}", self.path, self.page_size);
        for (key, value) in &self.query {
            url.push_str(&format!("&{key}={}", urlencoding::encode(value)));
        }
        format!("<{url}>; rel=\"{rel}\"")
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_TOTAL_COUNT, HeaderValue::from(self.total));

        let mut links = Vec::new();
        if self.page > 1 {
            links.push(self.link(self.page - 1, "prev"));
        }
        if self.page.saturating_mul(self.page_size) < self.total {
            links.push(self.link(self.page.saturating_add(1), "next"));
        }
        if !links.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&links.join(", ")) {
                headers.insert(LINK, value);
            }
        }
        headers
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        (self.headers(), Json(self)).into_response()
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ProjectError> for ApiError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::BadRequest(msg) | ProjectError::InvalidArgument(msg) => {
                Self::bad_request(msg)
            }
            ProjectError::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            ProjectError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            ProjectError::NotFound(msg) => Self::not_found(msg),
            ProjectError::Conflict(msg) => Self::conflict(msg),
            ProjectError::PreconditionFailed(msg) => {
                Self::new(StatusCode::PRECONDITION_FAILED, msg)
            }
            ProjectError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Parses raw `page`/`page_size` query values, applying defaults.
pub fn parse_page(page: Option<i64>, page_size: Option<i64>) -> Result<Page, ApiError> {
    let defaults = Page::default();
    Ok(Page::new(
        page.unwrap_or(defaults.page),
        page_size.unwrap_or(defaults.page_size),
    )?)
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
