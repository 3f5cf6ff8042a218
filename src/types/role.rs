use std::fmt;

use serde::{Deserialize, Serialize};

/// An explicit per-project role. The numeric values are what the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    ProjectAdmin,
    Developer,
    Guest,
}

impl ProjectRole {
    pub const fn id(self) -> i64 {
        match self {
            Self::ProjectAdmin => 1,
            Self::Developer => 2,
            Self::Guest => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<ProjectRole> {
        match id {
            1 => Some(Self::ProjectAdmin),
            2 => Some(Self::Developer),
            3 => Some(Self::Guest),
            _ => None,
        }
    }

    /// Converts a role string to its role value.
    pub fn parse(s: &str) -> Option<ProjectRole> {
        match s {
            "project_admin" => Some(Self::ProjectAdmin),
            "developer" => Some(Self::Developer),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectAdmin => "project_admin",
            Self::Developer => "developer",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
