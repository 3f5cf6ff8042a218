use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// When set, only system admins may create projects.
    pub only_admin_create_project: bool,
    /// Bound on queued access log writes. Entries beyond it are dropped.
    pub audit_queue_capacity: usize,
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audit_queue_capacity == 0 {
            return Err(Error::Config(
                "audit_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("dockyard.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            only_admin_create_project: false,
            audit_queue_capacity: DEFAULT_AUDIT_QUEUE_CAPACITY,
        }
    }
}
