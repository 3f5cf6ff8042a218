use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::response::ApiError;
use crate::project::{AccessLogFilter, ListFilter};
use crate::types::{ProjectRole, Token};

/// Parses the integer `public` flag used by project requests.
pub fn parse_public_flag(value: i32) -> Result<bool, ApiError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ApiError::bad_request("public must be 0 or 1")),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub project_name: String,
    #[serde(default)]
    pub public: i32,
}

#[derive(Debug, Deserialize)]
pub struct TogglePublicRequest {
    pub public: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeParams {
    pub project_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsParams {
    pub project_name: Option<String>,
    pub is_public: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListProjectsParams {
    pub fn filter(&self) -> Result<ListFilter, ApiError> {
        let public_only = match self.is_public.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    ApiError::bad_request(format!("invalid is_public: {raw}"))
                })?;
                value == 1
            }
        };

        Ok(ListFilter {
            name: self.project_name.clone().filter(|n| !n.is_empty()),
            public_only,
        })
    }

    /// Filter parameters repeated in pagination links.
    pub fn link_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(name) = self.project_name.as_ref().filter(|n| !n.is_empty()) {
            query.push(("project_name", name.clone()));
        }
        if let Some(is_public) = &self.is_public {
            query.push(("is_public", is_public.clone()));
        }
        query
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessLogParams {
    pub username: Option<String>,
    pub repository: Option<String>,
    pub operation: Option<String>,
    pub begin_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl AccessLogParams {
    pub fn filter(&self) -> AccessLogFilter {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        AccessLogFilter {
            username: non_empty(&self.username),
            repository: non_empty(&self.repository),
            operation: non_empty(&self.operation),
            begin_timestamp: self.begin_timestamp,
            end_timestamp: self.end_timestamp,
        }
    }

    pub fn link_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        for (key, value) in [
            ("username", &self.username),
            ("repository", &self.repository),
            ("operation", &self.operation),
        ] {
            if let Some(v) = value {
                query.push((key, v.clone()));
            }
        }
        for (key, value) in [
            ("begin_timestamp", self.begin_timestamp),
            ("end_timestamp", self.end_timestamp),
        ] {
            if let Some(v) = value {
                query.push((key, v.to_string()));
            }
        }
        query
    }
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub user_id: i64,
    pub role: String,
}

impl MemberRequest {
    pub fn role(&self) -> Result<ProjectRole, ApiError> {
        ProjectRole::parse(&self.role)
            .ok_or_else(|| ApiError::bad_request(format!("invalid role: {}", self.role)))
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectCreatedResponse {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub sysadmin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.id,
            user_id: token.user_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: TokenResponse,
}
