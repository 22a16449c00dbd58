//! Reconciliation results

use crate::action::Action;
use crate::error::ActionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to one attempted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionOutcome {
    Applied,
    /// The provider already held the resource (create) or lacked it (delete)
    SkippedAlreadySatisfied,
    Failed,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Applied => write!(f, "applied"),
            ActionOutcome::SkippedAlreadySatisfied => write!(f, "skipped-already-satisfied"),
            ActionOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Phase of a reconciliation run.
///
/// `Planning → Applying → {Converged, PartiallyApplied, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    Planning,
    Applying,
    Converged,
    PartiallyApplied,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunPhase::Planning | RunPhase::Applying)
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every action succeeded
    Converged,
    /// Cancelled between actions; the applied prefix stands
    PartiallyApplied,
    /// An action failed and the run halted
    Failed,
}

impl RunOutcome {
    /// CLI exit code: 0, 1 or 2
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Converged => 0,
            RunOutcome::PartiallyApplied => 1,
            RunOutcome::Failed => 2,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Converged => write!(f, "converged"),
            RunOutcome::PartiallyApplied => write!(f, "partially-applied"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a single attempted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    pub action: Action,
    pub summary: String,
    pub outcome: ActionOutcome,
    pub attempts: u32,
    pub error: Option<ActionError>,
}

/// Auditable record of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub topology: String,
    pub outcome: RunOutcome,

    /// Attempted actions, in execution order
    pub actions: Vec<ActionReport>,

    /// Planned actions never attempted because the run halted or was cancelled
    pub not_attempted: usize,

    pub cancelled: bool,
    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ReconciliationResult {
    pub fn is_converged(&self) -> bool {
        self.outcome == RunOutcome::Converged
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    pub fn count(&self, outcome: ActionOutcome) -> usize {
        self.actions.iter().filter(|a| a.outcome == outcome).count()
    }

    pub fn applied(&self) -> usize {
        self.count(ActionOutcome::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.count(ActionOutcome::SkippedAlreadySatisfied)
    }

    /// The action that halted the run, if any
    pub fn failure(&self) -> Option<&ActionReport> {
        self.actions
            .iter()
            .find(|a| a.outcome == ActionOutcome::Failed)
    }

    /// One human-readable line per attempted action
    pub fn summary_lines(&self) -> Vec<String> {
        let total = self.actions.len() + self.not_attempted;
        self.actions
            .iter()
            .enumerate()
            .map(|(i, report)| {
                let mut line = format!(
                    "[{}/{}] {}: {}",
                    i + 1,
                    total,
                    report.summary,
                    report.outcome
                );
                if report.attempts > 1 {
                    line.push_str(&format!(" after {} attempts", report.attempts));
                }
                if let Some(error) = &report.error {
                    line.push_str(&format!(" ({}: {})", error.kind, error.message));
                }
                line
            })
            .collect()
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} applied, {} skipped",
            self.topology,
            self.outcome,
            self.applied(),
            self.skipped()
        )?;
        if self.failure().is_some() {
            write!(f, ", 1 failed")?;
        }
        if self.not_attempted > 0 {
            write!(f, ", {} not attempted", self.not_attempted)?;
        }
        write!(f, ") in {}ms", self.duration_ms)
    }
}
