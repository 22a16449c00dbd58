//! ScaleFlow reconciliation engine
//!
//! Brings the resources a provider holds for a topology in line with the
//! desired [`Topology`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 scale CLI                        │
//! │          (scale plan / apply / destroy)          │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────────────┐
//! │                scaleflow-cloud                   │
//! │  observe ──▶ build_plan ──▶ Reconciler::apply    │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │         trait ProviderClient { ... }       │  │
//! │  └────────────────────────────────────────────┘  │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ local provider│
//!           └───────────────┘
//! ```

pub mod action;
pub mod cancel;
pub mod error;
pub mod lock;
pub mod observed;
pub mod observer;
pub mod plan;
pub mod provider;
pub mod reconciler;
pub mod report;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use action::{Action, ActionType, FieldChange, Plan, PlanSummary, ResourceKind};
pub use cancel::CancelToken;
pub use error::{
    ActionError, ActionErrorKind, LockError, ObservationError, PlanningError, ProviderError,
    ProviderErrorKind, ReconcileError, Result,
};
pub use lock::{LockInfo, RunLock};
pub use observed::{
    ForeignClaim, ObservedAlarm, ObservedLaunchTemplate, ObservedLoadBalancer, ObservedPolicy,
    ObservedScalingGroup, ObservedState,
};
pub use observer::{observe, observe_topology};
pub use plan::{build_destroy_plan, build_plan};
pub use provider::{ProviderClient, ProviderResult, Provisioned, ResourceHandle};
pub use reconciler::Reconciler;
pub use report::{
    ActionOutcome, ActionReport, ReconciliationResult, RunOutcome, RunPhase,
};
pub use retry::RetryConfig;

use scaleflow_core::{Topology, ValidationError, ValidationErrors};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::Instrument;

/// Knobs of a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub retry: RetryConfig,
    pub cancel: CancelToken,
    /// Stop once the plan is built
    pub dry_run: bool,
}

/// Plan of a run and, unless it was a dry run, what applying it did
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub plan: Plan,
    pub result: Option<ReconciliationResult>,
}

impl Reconciliation {
    /// CLI exit code; a dry run always exits 0
    pub fn exit_code(&self) -> i32 {
        self.result.as_ref().map(|r| r.exit_code()).unwrap_or(0)
    }
}

/// Validate, observe, plan and apply one topology.
///
/// Validation, observation and planning failures return before any
/// provider resource is touched.
pub async fn reconcile(
    client: Arc<dyn ProviderClient>,
    desired: &Topology,
    options: &ReconcileOptions,
) -> Result<Reconciliation> {
    let span = tracing::info_span!("reconcile", topology = %desired.name);
    run(client, desired, options).instrument(span).await
}

async fn run(
    client: Arc<dyn ProviderClient>,
    desired: &Topology,
    options: &ReconcileOptions,
) -> Result<Reconciliation> {
    desired.validate()?;

    let observed = observe_topology(client.as_ref(), desired).await?;
    let plan = build_plan(desired, &observed)?;
    tracing::info!(summary = %plan.summary(), "Plan ready");

    if options.dry_run || plan.is_empty() {
        let result = (!options.dry_run).then(|| empty_result(&plan));
        return Ok(Reconciliation { plan, result });
    }

    let reconciler = Reconciler::new(client).with_retry(options.retry.clone());
    let result = reconciler.apply_with_cancel(&plan, &options.cancel).await;
    Ok(Reconciliation {
        plan,
        result: Some(result),
    })
}

/// Reconcile independent topologies concurrently, one task each.
///
/// Duplicate names are rejected before anything runs. Results come back in
/// input order.
pub async fn reconcile_many(
    client: Arc<dyn ProviderClient>,
    topologies: Vec<Topology>,
    options: &ReconcileOptions,
) -> Result<Vec<(String, Result<Reconciliation>)>> {
    let mut seen = HashSet::new();
    let duplicates: Vec<ValidationError> = topologies
        .iter()
        .filter(|t| !seen.insert(t.name.clone()))
        .map(|t| ValidationError::new(format!("topology[{}]", t.name), "duplicate topology name"))
        .collect();
    if let Some(errors) = ValidationErrors::from_vec(duplicates) {
        return Err(errors.into());
    }

    let handles: Vec<_> = topologies
        .into_iter()
        .map(|topology| {
            let client = client.clone();
            let options = options.clone();
            let name = topology.name.clone();
            let handle =
                tokio::spawn(async move { reconcile(client, &topology, &options).await });
            (name, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ReconcileError::Task {
                topology: name.clone(),
                message: e.to_string(),
            }),
        };
        results.push((name, result));
    }
    Ok(results)
}

fn empty_result(plan: &Plan) -> ReconciliationResult {
    ReconciliationResult {
        topology: plan.topology.clone(),
        outcome: RunOutcome::Converged,
        actions: Vec::new(),
        not_attempted: 0,
        cancelled: false,
        started_at: chrono::Utc::now(),
        duration_ms: 0,
    }
}
