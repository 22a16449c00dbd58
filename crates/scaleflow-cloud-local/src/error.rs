//! Local provider error types

use thiserror::Error;

/// Inventory persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Inventory file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Inventory is locked by another writer: {}", .0.display())]
    Busy(std::path::PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
