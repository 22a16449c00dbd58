//! Diff desired against observed state into an ordered plan
//!
//! Creates and updates run in dependency order (load balancer, launch
//! template, scaling group, policies, alarms); every delete follows them in
//! reverse dependency order, so a replaced launch template is only removed
//! after the scaling group has moved to its successor.

use crate::action::{Action, FieldChange, Plan};
use crate::error::PlanningError;
use crate::observed::ObservedState;
use scaleflow_core::{ScalingGroupSpec, Topology};
use serde::Serialize;
use std::collections::HashSet;

/// Compute the actions that take `observed` to `desired`
pub fn build_plan(
    desired: &Topology,
    observed: &ObservedState,
) -> Result<Plan, PlanningError> {
    if observed.topology != desired.name {
        return Err(PlanningError::TopologyMismatch {
            desired: desired.name.clone(),
            observed: observed.topology.clone(),
        });
    }
    if let Some(claim) = observed.foreign.first() {
        return Err(PlanningError::ForeignOwner {
            topology: desired.name.clone(),
            kind: claim.kind,
            name: claim.name.clone(),
            owner: claim.owner.clone(),
        });
    }

    let mut actions = Vec::new();
    let mut deletions = Deletions::default();

    plan_load_balancer(desired, observed, &mut actions, &mut deletions);
    let revision = plan_launch_template(desired, observed, &mut actions, &mut deletions);
    plan_scaling_group(desired, observed, revision, &mut actions, &mut deletions);
    let new_policies = plan_policies(desired, observed, &mut actions, &mut deletions);
    plan_alarms(desired, observed, &new_policies, &mut actions, &mut deletions);

    actions.extend(deletions.into_actions());

    let plan = Plan::new(desired.name.clone(), actions);
    tracing::debug!(
        topology = %desired.name,
        actions = plan.len(),
        summary = %plan.summary(),
        "Built plan"
    );
    Ok(plan)
}

/// Delete everything `observed` holds, alarms first
pub fn build_destroy_plan(observed: &ObservedState) -> Plan {
    let mut deletions = Deletions::default();
    for alarm in &observed.alarms {
        deletions.alarm(&alarm.spec.name);
    }
    for policy in &observed.policies {
        deletions.policy(&policy.group, &policy.spec.name);
    }
    for group in &observed.scaling_groups {
        deletions.group(&group.spec.name);
    }
    for template in &observed.launch_templates {
        deletions.template(&template.revision);
    }
    for lb in &observed.load_balancers {
        deletions.load_balancer(&lb.spec.name);
    }
    Plan::new(observed.topology.clone(), deletions.into_actions().collect())
}

fn plan_load_balancer(
    desired: &Topology,
    observed: &ObservedState,
    actions: &mut Vec<Action>,
    deletions: &mut Deletions,
) {
    let lb = &desired.load_balancer;
    match observed.load_balancer(&lb.name) {
        None => actions.push(Action::CreateLoadBalancer {
            spec: lb.clone(),
            zones: desired.regions.clone(),
        }),
        Some(current) => {
            let mut changes = Vec::new();
            diff(&mut changes, "listeners", &current.spec.listeners, &lb.listeners);
            diff(
                &mut changes,
                "healthCheck",
                &current.spec.health_check,
                &lb.health_check,
            );
            diff(&mut changes, "zones", &current.zones, &desired.regions);
            if !changes.is_empty() {
                actions.push(Action::UpdateLoadBalancer {
                    spec: lb.clone(),
                    zones: desired.regions.clone(),
                    changes,
                });
            }
        }
    }

    for stale in observed.load_balancers.iter().filter(|o| o.spec.name != lb.name) {
        deletions.load_balancer(&stale.spec.name);
    }
}

/// Returns the revision name the scaling group must point at
fn plan_launch_template(
    desired: &Topology,
    observed: &ObservedState,
    actions: &mut Vec<Action>,
    deletions: &mut Deletions,
) -> String {
    let revision = desired.launch_template.revision_name();
    if observed.launch_template(&revision).is_none() {
        actions.push(Action::CreateLaunchTemplate {
            revision: revision.clone(),
            spec: desired.launch_template.clone(),
        });
    }

    for stale in observed
        .launch_templates
        .iter()
        .filter(|t| t.revision != revision)
    {
        deletions.template(&stale.revision);
    }
    revision
}

fn plan_scaling_group(
    desired: &Topology,
    observed: &ObservedState,
    revision: String,
    actions: &mut Vec<Action>,
    deletions: &mut Deletions,
) {
    let group = ScalingGroupSpec {
        launch_template_ref: revision,
        ..desired.scaling_group.clone()
    };

    match observed.scaling_group(&group.name) {
        None => actions.push(Action::CreateScalingGroup {
            spec: group.clone(),
        }),
        Some(current) => {
            let current = &current.spec;
            let mut changes = Vec::new();
            diff(&mut changes, "minSize", &current.min_size, &group.min_size);
            diff(&mut changes, "maxSize", &current.max_size, &group.max_size);
            diff(
                &mut changes,
                "desiredCapacity",
                &current.desired_capacity,
                &group.desired_capacity,
            );
            diff(
                &mut changes,
                "cooldownSeconds",
                &current.cooldown_seconds,
                &group.cooldown_seconds,
            );
            diff(
                &mut changes,
                "launchTemplateRef",
                &current.launch_template_ref,
                &group.launch_template_ref,
            );
            diff(
                &mut changes,
                "loadBalancerRefs",
                &current.load_balancer_refs,
                &group.load_balancer_refs,
            );
            diff(&mut changes, "zones", &current.zones, &group.zones);
            if !changes.is_empty() {
                actions.push(Action::UpdateScalingGroup {
                    spec: group.clone(),
                    changes,
                });
            }
        }
    }

    for stale in observed
        .scaling_groups
        .iter()
        .filter(|g| g.spec.name != group.name)
    {
        deletions.group(&stale.spec.name);
    }
}

/// Returns the names of policies created by this plan
fn plan_policies<'a>(
    desired: &'a Topology,
    observed: &ObservedState,
    actions: &mut Vec<Action>,
    deletions: &mut Deletions,
) -> HashSet<&'a str> {
    let group = &desired.scaling_group.name;
    let mut created = HashSet::new();

    for policy in &desired.policies {
        match observed.policy(group, &policy.name) {
            None => {
                created.insert(policy.name.as_str());
                actions.push(Action::CreateScalingPolicy {
                    group: group.clone(),
                    spec: policy.clone(),
                });
            }
            Some(current) => {
                let current = &current.spec;
                let mut changes = Vec::new();
                diff(&mut changes, "direction", &current.direction, &policy.direction);
                diff(
                    &mut changes,
                    "capacityDelta",
                    &current.capacity_delta,
                    &policy.capacity_delta,
                );
                diff(
                    &mut changes,
                    "cooldownSeconds",
                    &current.cooldown_seconds,
                    &policy.cooldown_seconds,
                );
                if !changes.is_empty() {
                    actions.push(Action::UpdateScalingPolicy {
                        group: group.clone(),
                        spec: policy.clone(),
                        changes,
                    });
                }
            }
        }
    }

    for stale in observed
        .policies
        .iter()
        .filter(|p| &p.group != group || desired.policy(&p.spec.name).is_none())
    {
        deletions.policy(&stale.group, &stale.spec.name);
    }
    created
}

fn plan_alarms(
    desired: &Topology,
    observed: &ObservedState,
    new_policies: &HashSet<&str>,
    actions: &mut Vec<Action>,
    deletions: &mut Deletions,
) {
    let group = &desired.scaling_group.name;

    for alarm in &desired.alarms {
        let Some(current) = observed.alarm(&alarm.name) else {
            actions.push(Action::CreateAlarm {
                group: group.clone(),
                spec: alarm.clone(),
            });
            continue;
        };

        let spec = &current.spec;
        let mut changes = Vec::new();
        diff(
            &mut changes,
            "metricNamespace",
            &spec.metric_namespace,
            &alarm.metric_namespace,
        );
        diff(&mut changes, "metricName", &spec.metric_name, &alarm.metric_name);
        diff(&mut changes, "statistic", &spec.statistic, &alarm.statistic);
        diff(&mut changes, "comparator", &spec.comparator, &alarm.comparator);
        diff(&mut changes, "threshold", &spec.threshold, &alarm.threshold);
        diff(
            &mut changes,
            "periodSeconds",
            &spec.period_seconds,
            &alarm.period_seconds,
        );
        diff(
            &mut changes,
            "evaluationPeriods",
            &spec.evaluation_periods,
            &alarm.evaluation_periods,
        );
        diff(&mut changes, "boundPolicy", &spec.bound_policy, &alarm.bound_policy);
        diff(&mut changes, "dimensions", &spec.dimensions, &alarm.dimensions);

        // same policy name, but its handle changes or has drifted
        if spec.bound_policy == alarm.bound_policy {
            if new_policies.contains(alarm.bound_policy.as_str()) {
                changes.push(FieldChange::new(
                    "policyHandle",
                    to_json(&current.action),
                    serde_json::Value::String(format!("(new {})", alarm.bound_policy)),
                ));
            } else if let Some(policy) = observed.policy(group, &alarm.bound_policy)
                && policy.handle != current.action
            {
                changes.push(FieldChange::new(
                    "policyHandle",
                    to_json(&current.action),
                    to_json(&policy.handle),
                ));
            }
        }

        if !changes.is_empty() {
            actions.push(Action::UpdateAlarm {
                group: group.clone(),
                spec: alarm.clone(),
                changes,
            });
        }
    }

    for stale in observed
        .alarms
        .iter()
        .filter(|a| desired.alarm(&a.spec.name).is_none())
    {
        deletions.alarm(&stale.spec.name);
    }
}

fn diff<T: PartialEq + Serialize>(changes: &mut Vec<FieldChange>, field: &str, from: &T, to: &T) {
    if from != to {
        changes.push(FieldChange::new(field, to_json(from), to_json(to)));
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Deletes bucketed by kind, emitted in reverse dependency order
#[derive(Default)]
struct Deletions {
    alarms: Vec<Action>,
    policies: Vec<Action>,
    groups: Vec<Action>,
    templates: Vec<Action>,
    load_balancers: Vec<Action>,
}

impl Deletions {
    fn alarm(&mut self, name: &str) {
        self.alarms.push(Action::DeleteAlarm {
            name: name.to_string(),
        });
    }

    fn policy(&mut self, group: &str, name: &str) {
        self.policies.push(Action::DeleteScalingPolicy {
            group: group.to_string(),
            name: name.to_string(),
        });
    }

    fn group(&mut self, name: &str) {
        self.groups.push(Action::DeleteScalingGroup {
            name: name.to_string(),
        });
    }

    fn template(&mut self, revision: &str) {
        self.templates.push(Action::DeleteLaunchTemplate {
            revision: revision.to_string(),
        });
    }

    fn load_balancer(&mut self, name: &str) {
        self.load_balancers.push(Action::DeleteLoadBalancer {
            name: name.to_string(),
        });
    }

    fn into_actions(self) -> impl Iterator<Item = Action> {
        self.alarms
            .into_iter()
            .chain(self.policies)
            .chain(self.groups)
            .chain(self.templates)
            .chain(self.load_balancers)
    }
}
