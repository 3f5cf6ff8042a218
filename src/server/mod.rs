mod admin;
pub mod dto;
mod projects;
pub mod response;
mod router;

pub use admin::admin_router;
pub use projects::projects_router;
pub use router::{AppState, create_router};
