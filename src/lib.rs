//! # Dockyard
//!
//! A project registry server with per-project roles and an access log,
//! usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! dockyard = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dockyard::project::{AuditLogger, ProjectController, ProjectPolicy};
//! use dockyard::server::{AppState, create_router};
//! use dockyard::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/dockyard.db").unwrap();
//! store.initialize().unwrap();
//! let store: Arc<dyn Store> = Arc::new(store);
//!
//! let (audit, _worker) = AuditLogger::spawn(store.clone(), 1024);
//! let controller = ProjectController::new(store.clone(), audit, ProjectPolicy::default());
//! let router = create_router(Arc::new(AppState::new(store, controller)));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `dockyard` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod project;
pub mod server;
pub mod store;
pub mod types;
