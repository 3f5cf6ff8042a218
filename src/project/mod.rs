mod audit;
mod authz;
mod controller;
mod error;
mod validation;

pub use audit::{AuditLogger, AuditOperation, REPO_TAG_PLACEHOLDER, project_entry};
pub use authz::{Authorizer, ResolvedRole};
pub use controller::{
    AccessLogFilter, DEFAULT_PAGE_SIZE, ListFilter, MAX_PAGE_SIZE, Page, Paged, ProjectController,
    ProjectPolicy,
};
pub use error::{ProjectError, ProjectResult, ProjectStoreExt};
pub use validation::{NameError, PROJECT_NAME_MAX_LEN, PROJECT_NAME_MIN_LEN, validate_project_name};
