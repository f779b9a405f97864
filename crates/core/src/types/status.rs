//! Catalog visibility status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Product publication status as reported by the commerce backend.
///
/// The catalog defaults to showing published products only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Proposed,
    #[default]
    Published,
    Rejected,
}

impl ProductStatus {
    /// Wire representation used by the backend and the search index.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Proposed => "proposed",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown product status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for ProductStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "proposed" => Ok(Self::Proposed),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}
