mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Every method is a single atomic operation. `create_project` reports a
/// lost uniqueness race as [`Error::AlreadyExists`](crate::error::Error::AlreadyExists),
/// and `delete_project` re-checks dependents inside its own transaction,
/// reporting them as [`Error::HasDependents`](crate::error::Error::HasDependents).
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, username: &str, sysadmin: bool) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
    fn count_users(&self) -> Result<i64>;
    fn is_system_admin(&self, user_id: i64) -> Result<bool>;
    fn has_system_admin(&self) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: i64) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Project operations
    fn create_project(&self, project: &NewProject) -> Result<i64>;
    fn get_project(&self, id: i64) -> Result<Option<Project>>;
    fn get_project_by_name(&self, name: &str) -> Result<Option<Project>>;
    fn project_exists(&self, name: &str) -> Result<bool>;
    fn list_projects(&self, query: &ProjectQuery, limit: i64, offset: i64) -> Result<Vec<Project>>;
    fn count_projects(&self, query: &ProjectQuery) -> Result<i64>;
    fn list_user_relevant_projects(
        &self,
        user_id: i64,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Project>>;
    fn count_user_relevant_projects(&self, user_id: i64, name: Option<&str>) -> Result<i64>;
    fn toggle_project_public(&self, id: i64, public: bool) -> Result<()>;
    fn delete_project(&self, id: i64) -> Result<bool>;

    // Project member operations
    fn upsert_project_member(&self, member: &ProjectMember) -> Result<()>;
    fn delete_project_member(&self, project_id: i64, user_id: i64) -> Result<bool>;
    fn get_user_project_roles(&self, user_id: i64, project_id: i64) -> Result<Vec<ProjectRole>>;
    fn list_project_members(&self, project_id: i64) -> Result<Vec<ProjectMember>>;

    // Dependent resources
    fn create_repository(&self, project_id: i64, name: &str) -> Result<Repository>;
    fn delete_repository(&self, id: i64) -> Result<bool>;
    fn count_repositories_for_project(&self, project_name: &str) -> Result<i64>;
    fn create_policy(&self, project_id: i64, name: &str) -> Result<ReplicationPolicy>;
    fn count_policies_for_project(&self, project_id: i64) -> Result<i64>;

    // Access log operations
    fn append_access_log(&self, log: &AccessLog) -> Result<()>;
    fn list_access_logs(&self, query: &AccessLogQuery, limit: i64, offset: i64)
    -> Result<Vec<AccessLog>>;
    fn count_access_logs(&self, query: &AccessLogQuery) -> Result<i64>;

    fn close(&self) -> Result<()>;
}
