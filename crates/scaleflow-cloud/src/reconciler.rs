//! Executes a plan against the provider

use crate::action::{Action, Plan};
use crate::cancel::CancelToken;
use crate::error::ActionError;
use crate::provider::{ProviderClient, ProviderResult, Provisioned, ResourceHandle};
use crate::report::{ActionOutcome, ActionReport, ReconciliationResult, RunOutcome, RunPhase};
use crate::retry::RetryConfig;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Applies plans one action at a time.
///
/// A transient provider failure retries the same action with exponential
/// backoff; any other failure halts the run. Later actions are never
/// attempted once one has failed.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn ProviderClient>,
    retry: RetryConfig,
}

/// Per-run memory shared by the actions of one plan
struct RunContext<'a> {
    owner: &'a str,
    /// Handles of policies created in this run, keyed by (group, name)
    policy_handles: HashMap<(String, String), ResourceHandle>,
    /// Whether an earlier attempt of the current action created its resource
    created: bool,
}

impl RunContext<'_> {
    /// Applied if this action created the resource on any attempt
    fn created(&mut self, provisioned: &Provisioned) -> ActionOutcome {
        self.created |= provisioned.was_created();
        if self.created {
            ActionOutcome::Applied
        } else {
            ActionOutcome::SkippedAlreadySatisfied
        }
    }
}

impl Reconciler {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Apply every action of `plan` in order
    pub async fn apply(&self, plan: &Plan) -> ReconciliationResult {
        self.apply_with_cancel(plan, &CancelToken::new()).await
    }

    /// Like [`apply`](Self::apply), stopping between actions once `cancel` fires
    pub async fn apply_with_cancel(&self, plan: &Plan, cancel: &CancelToken) -> ReconciliationResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let total = plan.actions.len();

        tracing::info!(
            topology = %plan.topology,
            provider = self.client.name(),
            actions = total,
            "Applying plan"
        );

        let mut ctx = RunContext {
            owner: &plan.topology,
            policy_handles: HashMap::new(),
            created: false,
        };
        let mut phase = RunPhase::Applying;
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, action) in plan.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    topology = %plan.topology,
                    remaining = total - index,
                    "Run cancelled, stopping before the next action"
                );
                cancelled = true;
                phase = RunPhase::PartiallyApplied;
                break;
            }

            let summary = action.summary();
            let (result, attempts) = self.execute_with_retry(action, &mut ctx).await;
            match result {
                Ok(outcome) => {
                    tracing::info!(
                        topology = %plan.topology,
                        action = %summary,
                        attempt = attempts,
                        %outcome,
                        "[{}/{}] {}",
                        index + 1,
                        total,
                        summary
                    );
                    reports.push(ActionReport {
                        action: action.clone(),
                        summary,
                        outcome,
                        attempts,
                        error: None,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        topology = %plan.topology,
                        action = %summary,
                        attempt = attempts,
                        kind = %error.kind,
                        "Halting run: {}",
                        error.message
                    );
                    reports.push(ActionReport {
                        action: action.clone(),
                        summary,
                        outcome: ActionOutcome::Failed,
                        attempts,
                        error: Some(error),
                    });
                    phase = RunPhase::Failed;
                    break;
                }
            }
        }

        if phase == RunPhase::Applying {
            phase = RunPhase::Converged;
        }
        let outcome = match phase {
            RunPhase::Failed => RunOutcome::Failed,
            RunPhase::PartiallyApplied => RunOutcome::PartiallyApplied,
            _ => RunOutcome::Converged,
        };

        let result = ReconciliationResult {
            topology: plan.topology.clone(),
            outcome,
            not_attempted: total - reports.len(),
            actions: reports,
            cancelled,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(topology = %plan.topology, outcome = %result.outcome, "{}", result);
        result
    }

    /// Run one action, retrying transient failures within the budget
    async fn execute_with_retry(
        &self,
        action: &Action,
        ctx: &mut RunContext<'_>,
    ) -> (Result<ActionOutcome, ActionError>, u32) {
        let mut attempt = 0;
        ctx.created = false;
        loop {
            attempt += 1;
            match self.execute(action, ctx).await {
                Ok(outcome) => return (Ok(outcome), attempt),
                Err(e) if e.is_transient() && self.retry.allows_retry_after(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        action = %action.summary(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying: {}",
                        e.message
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (Err(ActionError::from_provider(action, e, attempt)), attempt),
            }
        }
    }

    async fn execute(
        &self,
        action: &Action,
        ctx: &mut RunContext<'_>,
    ) -> ProviderResult<ActionOutcome> {
        let client = self.client.as_ref();
        match action {
            Action::CreateLoadBalancer { spec, zones } => {
                let provisioned = client
                    .create_or_get_load_balancer(ctx.owner, spec, zones)
                    .await?;
                client
                    .configure_health_check(&spec.name, &spec.health_check)
                    .await?;
                Ok(ctx.created(&provisioned))
            }
            Action::UpdateLoadBalancer {
                spec,
                zones,
                changes,
            } => {
                if changes.iter().any(|c| c.field != "healthCheck") {
                    client.update_load_balancer(spec, zones).await?;
                }
                if changes.iter().any(|c| c.field == "healthCheck") {
                    client
                        .configure_health_check(&spec.name, &spec.health_check)
                        .await?;
                }
                Ok(ActionOutcome::Applied)
            }
            Action::DeleteLoadBalancer { name } => deleted(client.delete_load_balancer(name).await),
            Action::CreateLaunchTemplate { revision, spec } => {
                let provisioned = client
                    .create_or_get_launch_template(ctx.owner, revision, spec)
                    .await?;
                Ok(ctx.created(&provisioned))
            }
            Action::DeleteLaunchTemplate { revision } => {
                deleted(client.delete_launch_template(revision).await)
            }
            Action::CreateScalingGroup { spec } => {
                let provisioned = client.create_or_get_scaling_group(ctx.owner, spec).await?;
                Ok(ctx.created(&provisioned))
            }
            Action::UpdateScalingGroup { spec, .. } => {
                client.update_scaling_group(spec).await?;
                Ok(ActionOutcome::Applied)
            }
            Action::DeleteScalingGroup { name } => deleted(client.delete_scaling_group(name).await),
            Action::CreateScalingPolicy { group, spec } => {
                let provisioned = client
                    .create_or_get_scaling_policy(ctx.owner, group, spec)
                    .await?;
                let outcome = ctx.created(&provisioned);
                ctx.policy_handles
                    .insert((group.clone(), spec.name.clone()), provisioned.into_handle());
                Ok(outcome)
            }
            Action::UpdateScalingPolicy { group, spec, .. } => {
                client.update_scaling_policy(group, spec).await?;
                Ok(ActionOutcome::Applied)
            }
            Action::DeleteScalingPolicy { group, name } => {
                deleted(client.delete_scaling_policy(group, name).await)
            }
            Action::CreateAlarm { group, spec } => {
                let handle = self.policy_handle(ctx, group, &spec.bound_policy).await?;
                let provisioned = client.create_or_get_alarm(ctx.owner, spec, &handle).await?;
                Ok(ctx.created(&provisioned))
            }
            Action::UpdateAlarm { group, spec, .. } => {
                let handle = self.policy_handle(ctx, group, &spec.bound_policy).await?;
                client.update_alarm(spec, &handle).await?;
                Ok(ActionOutcome::Applied)
            }
            Action::DeleteAlarm { name } => deleted(client.delete_alarm(name).await),
        }
    }

    /// Handle from this run if the policy was just created, otherwise asked for
    async fn policy_handle(
        &self,
        ctx: &RunContext<'_>,
        group: &str,
        policy: &str,
    ) -> ProviderResult<ResourceHandle> {
        if let Some(handle) = ctx
            .policy_handles
            .get(&(group.to_string(), policy.to_string()))
        {
            return Ok(handle.clone());
        }
        self.client.get_policy_handle(group, policy).await
    }
}

fn deleted(result: ProviderResult<()>) -> ProviderResult<ActionOutcome> {
    match result {
        Ok(()) => Ok(ActionOutcome::Applied),
        Err(e) if e.is_not_found() => Ok(ActionOutcome::SkippedAlreadySatisfied),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActionErrorKind, ProviderError};
    use crate::observed::ObservedState;
    use crate::plan::build_plan;
    use crate::testing::{FakeProvider, collector, policy_handle};
    use std::time::Duration;

    fn fresh_plan() -> Plan {
        build_plan(&collector(), &ObservedState::empty("storm-collector")).unwrap()
    }

    fn reconciler(provider: &Arc<FakeProvider>) -> Reconciler {
        Reconciler::new(provider.clone())
    }

    #[tokio::test]
    async fn test_apply_fresh_plan_converges() {
        let provider = Arc::new(FakeProvider::new());
        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert_eq!(result.outcome, RunOutcome::Converged);
        assert_eq!(result.applied(), 7);
        assert_eq!(result.not_attempted, 0);
        assert_eq!(provider.count("configure_health_check"), 1);
    }

    #[tokio::test]
    async fn test_alarm_uses_policy_handle_from_same_run() {
        let provider = Arc::new(FakeProvider::new());
        reconciler(&provider).apply(&fresh_plan()).await;

        assert_eq!(provider.count("get_policy_handle"), 0);
        let expected = format!(
            "create_or_get_alarm ctScaleAlarm-HighCPU -> {}",
            policy_handle("ctScalingGroup", "ctScaleUp")
        );
        assert!(provider.calls().contains(&expected));
    }

    #[tokio::test]
    async fn test_alarm_without_new_policy_looks_up_handle() {
        let provider = Arc::new(FakeProvider::new());
        let desired = collector();
        let plan = Plan::new(
            "storm-collector",
            vec![Action::CreateAlarm {
                group: "ctScalingGroup".to_string(),
                spec: desired.alarms[1].clone(),
            }],
        );

        let result = reconciler(&provider).apply(&plan).await;
        assert!(result.is_converged());
        assert_eq!(provider.count("get_policy_handle"), 1);
    }

    #[tokio::test]
    async fn test_existing_resources_are_skipped() {
        let provider = Arc::new(FakeProvider::new());
        provider.report_existing();

        let result = reconciler(&provider).apply(&fresh_plan()).await;
        assert!(result.is_converged());
        assert_eq!(result.skipped(), 7);
        assert_eq!(result.applied(), 0);
    }

    #[tokio::test]
    async fn test_delete_not_found_is_skipped() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail("delete_alarm", ProviderError::not_found("no such alarm"));
        let plan = Plan::new(
            "storm-collector",
            vec![Action::DeleteAlarm {
                name: "gone".to_string(),
            }],
        );

        let result = reconciler(&provider).apply(&plan).await;
        assert!(result.is_converged());
        assert_eq!(result.actions[0].outcome, ActionOutcome::SkippedAlreadySatisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_with_backoff() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_times(
            "create_or_get_load_balancer",
            ProviderError::transient("throttled"),
            2,
        );

        let started = tokio::time::Instant::now();
        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert!(result.is_converged());
        assert_eq!(result.actions[0].attempts, 3);
        assert_eq!(result.actions[0].outcome, ActionOutcome::Applied);
        // 1s + 2s of backoff
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_create_still_reports_applied() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail("configure_health_check", ProviderError::transient("throttled"));

        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert!(result.is_converged());
        assert_eq!(provider.count("create_or_get_load_balancer"), 2);
        assert_eq!(result.actions[0].attempts, 2);
        assert_eq!(result.actions[0].outcome, ActionOutcome::Applied);
        assert_eq!(result.applied(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_policy_create_still_reports_applied() {
        let provider = Arc::new(FakeProvider::new());
        provider.lose_response(
            "create_or_get_scaling_policy",
            ProviderError::transient("connection reset"),
        );

        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert!(result.is_converged());
        assert_eq!(result.actions[3].summary, "create scaling-policy ctScaleUp");
        assert_eq!(result.actions[3].attempts, 2);
        assert_eq!(result.actions[3].outcome, ActionOutcome::Applied);
        // the next policy is a separate action with its own attempts
        assert_eq!(result.actions[4].attempts, 1);
        assert_eq!(result.applied(), 7);
    }

    #[tokio::test]
    async fn test_repeated_create_is_skipped() {
        let provider = Arc::new(FakeProvider::new());
        let plan = fresh_plan();
        reconciler(&provider).apply(&plan).await;

        let second = reconciler(&provider).apply(&plan).await;
        assert!(second.is_converged());
        assert_eq!(second.skipped(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_five_attempts() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_times(
            "create_or_get_load_balancer",
            ProviderError::transient("throttled"),
            100,
        );

        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(provider.count("create_or_get_load_balancer"), 5);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].attempts, 5);
        let error = result.actions[0].error.as_ref().unwrap();
        assert_eq!(error.kind, ActionErrorKind::Transient);
        assert_eq!(result.not_attempted, 6);
    }

    #[tokio::test]
    async fn test_unrecoverable_failure_halts_run() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail(
            "create_or_get_scaling_group",
            ProviderError::unrecoverable("invalid instance type"),
        );

        let result = reconciler(&provider).apply(&fresh_plan()).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.applied(), 2);
        assert_eq!(result.not_attempted, 4);
        assert_eq!(provider.count("create_or_get_scaling_group"), 1);
        assert_eq!(provider.count("create_or_get_scaling_policy"), 0);

        let failure = result.failure().unwrap();
        let error = failure.error.as_ref().unwrap();
        assert_eq!(error.kind, ActionErrorKind::Unrecoverable);
        assert_eq!(error.resource, "scaling-group/ctScalingGroup");
        assert_eq!(error.message, "invalid instance type");
    }

    #[tokio::test]
    async fn test_not_found_on_update_is_unrecoverable() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail("update_scaling_group", ProviderError::not_found("no such group"));
        let mut spec = collector().scaling_group;
        spec.desired_capacity = 4;
        let plan = Plan::new(
            "storm-collector",
            vec![Action::UpdateScalingGroup {
                spec,
                changes: Vec::new(),
            }],
        );

        let result = reconciler(&provider).apply(&plan).await;
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.actions[0].attempts, 1);
        assert_eq!(
            result.actions[0].error.as_ref().unwrap().kind,
            ActionErrorKind::Unrecoverable
        );
    }

    #[tokio::test]
    async fn test_cancel_before_first_action() {
        let provider = Arc::new(FakeProvider::new());
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = reconciler(&provider)
            .apply_with_cancel(&fresh_plan(), &cancel)
            .await;

        assert_eq!(result.outcome, RunOutcome::PartiallyApplied);
        assert!(result.cancelled);
        assert!(result.actions.is_empty());
        assert_eq!(result.not_attempted, 7);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_health_check_only_update_skips_listener_push() {
        let provider = Arc::new(FakeProvider::new());
        let spec = collector().load_balancer;
        let plan = Plan::new(
            "storm-collector",
            vec![Action::UpdateLoadBalancer {
                spec,
                zones: collector().regions,
                changes: vec![crate::action::FieldChange::new(
                    "healthCheck",
                    serde_json::Value::Null,
                    serde_json::Value::Null,
                )],
            }],
        );

        reconciler(&provider).apply(&plan).await;
        assert_eq!(provider.count("update_load_balancer"), 0);
        assert_eq!(provider.count("configure_health_check"), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_converges() {
        let provider = Arc::new(FakeProvider::new());
        let result = reconciler(&provider)
            .apply(&Plan::empty("storm-collector"))
            .await;
        assert!(result.is_converged());
        assert!(result.actions.is_empty());
    }
}
