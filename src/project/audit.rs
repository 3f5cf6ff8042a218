use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::store::Store;
use crate::types::{AccessLog, Project, User};

pub const REPO_TAG_PLACEHOLDER: &str = "N/A";

/// Operations recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOperation {
    Create,
    Delete,
}

impl AuditOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// Builds the access log entry for a project-level operation.
pub fn project_entry(user: &User, project: &Project, operation: AuditOperation) -> AccessLog {
    AccessLog {
        id: 0,
        username: user.username.clone(),
        project_id: project.id,
        repo_name: format!("{}/", project.name),
        repo_tag: REPO_TAG_PLACEHOLDER.to_string(),
        operation: operation.as_str().to_string(),
        op_time: Utc::now(),
    }
}

/// Sending half of the access log pipeline.
///
/// Recording never blocks and never fails the caller: when the queue is full
/// or the worker is gone the entry is dropped with a warning.
#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::Sender<AccessLog>,
}

impl AuditLogger {
    /// Creates a logger and the receiver its entries arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AccessLog>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Creates a logger whose entries are written to `store` by a background task.
    /// The task finishes once every clone of the logger has been dropped.
    pub fn spawn(store: Arc<dyn Store>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (logger, rx) = Self::channel(capacity);
        let worker = tokio::spawn(run_worker(store, rx));
        (logger, worker)
    }

    pub fn record(&self, entry: AccessLog) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                tracing::warn!(
                    project_id = entry.project_id,
                    operation = %entry.operation,
                    "Access log queue full, dropping entry"
                );
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::warn!(
                    project_id = entry.project_id,
                    operation = %entry.operation,
                    "Access log worker stopped, dropping entry"
                );
            }
        }
    }
}

async fn run_worker(store: Arc<dyn Store>, mut rx: mpsc::Receiver<AccessLog>) {
    while let Some(entry) = rx.recv().await {
        if let Err(e) = store.append_access_log(&entry) {
            tracing::error!(
                project_id = entry.project_id,
                operation = %entry.operation,
                "Failed to add access log: {e}"
            );
        }
    }
    tracing::debug!("Access log worker finished");
}
