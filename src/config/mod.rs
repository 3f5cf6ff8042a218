mod server;

pub use server::{DEFAULT_AUDIT_QUEUE_CAPACITY, ServerConfig};
