use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProjectRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub sysadmin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for a project; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub owner_id: i64,
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

/// A project as seen by a particular caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ProjectRole>,
    pub togglable: bool,
    pub repo_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: i64,
    pub user_id: i64,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationPolicy {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: i64,
    pub username: String,
    pub project_id: i64,
    pub repo_name: String,
    pub repo_tag: String,
    pub operation: String,
    pub op_time: DateTime<Utc>,
}

/// Filters for project listings. `name` is a substring match.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub name: Option<String>,
    pub public_only: bool,
}

/// Filters for access log queries, always scoped to one project.
/// Time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AccessLogQuery {
    pub project_id: i64,
    pub username: Option<String>,
    pub repo_name: Option<String>,
    pub operation: Option<String>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}
