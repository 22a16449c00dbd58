use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "topology file not found. Looked in:\n\
        - current directory: topology.local.kdl, topology.kdl\n\
        - ./.scaleflow/ directory\n\
        or set SCALEFLOW_TOPOLOGY to point at a file"
    )]
    TopologyFileNotFound,

    #[error("invalid configuration in {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
