//! Reconciliation error types

use crate::action::{Action, ResourceKind};
use scaleflow_core::ValidationErrors;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Throttling, timeouts, 5xx; worth retrying
    Transient,
    /// Bad request, auth failure, conflict
    Unrecoverable,
    /// The named resource does not exist
    NotFound,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Transient => write!(f, "transient"),
            ProviderErrorKind::Unrecoverable => write!(f, "unrecoverable"),
            ProviderErrorKind::NotFound => write!(f, "not found"),
        }
    }
}

/// Error returned by every provider client call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} provider error: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, message)
    }

    pub fn unrecoverable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unrecoverable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }
}

/// Current state could not be read
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("failed to list resources of topology '{topology}': {source}")]
    List {
        topology: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to look up the owner of {kind} '{name}': {source}")]
    Ownership {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ProviderError,
    },
}

/// Invariant violation only visible once the provider has been observed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("{kind} '{name}' is owned by topology '{owner}', not '{topology}'")]
    ForeignOwner {
        topology: String,
        kind: ResourceKind,
        name: String,
        owner: String,
    },

    #[error("observed state belongs to topology '{observed}', not '{desired}'")]
    TopologyMismatch { desired: String, observed: String },
}

/// Why an action gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    /// Still failing transiently after the retry budget was spent
    Transient,
    Unrecoverable,
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionErrorKind::Transient => write!(f, "transient"),
            ActionErrorKind::Unrecoverable => write!(f, "unrecoverable"),
        }
    }
}

/// Failure of a single action, naming the action and the resource
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{action} failed ({kind}, {resource}) after {attempts} attempt(s): {message}")]
pub struct ActionError {
    pub kind: ActionErrorKind,
    /// Summary line of the failed action
    pub action: String,
    /// `<kind>/<name>` of the resource the action touched
    pub resource: String,
    pub attempts: u32,
    pub message: String,
}

impl ActionError {
    pub fn from_provider(action: &Action, error: ProviderError, attempts: u32) -> Self {
        let kind = match error.kind {
            ProviderErrorKind::Transient => ActionErrorKind::Transient,
            // NotFound on anything but a delete means a dependency is missing
            ProviderErrorKind::Unrecoverable | ProviderErrorKind::NotFound => {
                ActionErrorKind::Unrecoverable
            }
        };
        Self {
            kind,
            action: action.summary(),
            resource: format!("{}/{}", action.kind(), action.resource_name()),
            attempts,
            message: error.message,
        }
    }
}

/// Errors that abort a run before any action executes
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("invalid topology: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("reconciliation task for '{topology}' failed: {message}")]
    Task { topology: String, message: String },
}

impl ReconcileError {
    /// CLI exit code: 3 for validation, 2 for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconcileError::Validation(_) => 3,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Run lock errors
#[derive(Error, Debug)]
pub enum LockError {
    #[error("topology '{topology}' is locked by {holder} (pid {pid}) since {since}")]
    Held {
        topology: String,
        holder: String,
        pid: u32,
        since: chrono::DateTime<chrono::Utc>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
