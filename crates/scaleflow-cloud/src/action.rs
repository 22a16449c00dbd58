//! Action types for topology reconciliation

use scaleflow_core::{
    AlarmSpec, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec, ScalingPolicySpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of provider resource a topology is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    LoadBalancer,
    LaunchTemplate,
    ScalingGroup,
    ScalingPolicy,
    Alarm,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::LaunchTemplate => "launch-template",
            ResourceKind::ScalingGroup => "scaling-group",
            ResourceKind::ScalingPolicy => "scaling-policy",
            ResourceKind::Alarm => "alarm",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete a resource
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// One field that differs between observed and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// camelCase field name, e.g. `desiredCapacity`
    pub field: String,
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, from: serde_json::Value, to: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            from,
            to,
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}→{}", self.field, self.from, self.to)
    }
}

/// A planned change to one provider resource.
///
/// Each variant carries just what the provider call needs. Scaling group
/// specs carry the launch template *revision* name in `launch_template_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateLoadBalancer {
        spec: LoadBalancerSpec,
        zones: BTreeSet<String>,
    },
    UpdateLoadBalancer {
        spec: LoadBalancerSpec,
        zones: BTreeSet<String>,
        changes: Vec<FieldChange>,
    },
    DeleteLoadBalancer {
        name: String,
    },
    CreateLaunchTemplate {
        revision: String,
        spec: LaunchTemplateSpec,
    },
    DeleteLaunchTemplate {
        revision: String,
    },
    CreateScalingGroup {
        spec: ScalingGroupSpec,
    },
    UpdateScalingGroup {
        spec: ScalingGroupSpec,
        changes: Vec<FieldChange>,
    },
    DeleteScalingGroup {
        name: String,
    },
    CreateScalingPolicy {
        group: String,
        spec: ScalingPolicySpec,
    },
    UpdateScalingPolicy {
        group: String,
        spec: ScalingPolicySpec,
        changes: Vec<FieldChange>,
    },
    DeleteScalingPolicy {
        group: String,
        name: String,
    },
    CreateAlarm {
        /// Group whose policy the alarm fires
        group: String,
        spec: AlarmSpec,
    },
    UpdateAlarm {
        group: String,
        spec: AlarmSpec,
        changes: Vec<FieldChange>,
    },
    DeleteAlarm {
        name: String,
    },
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::CreateLoadBalancer { .. }
            | Action::CreateLaunchTemplate { .. }
            | Action::CreateScalingGroup { .. }
            | Action::CreateScalingPolicy { .. }
            | Action::CreateAlarm { .. } => ActionType::Create,
            Action::UpdateLoadBalancer { .. }
            | Action::UpdateScalingGroup { .. }
            | Action::UpdateScalingPolicy { .. }
            | Action::UpdateAlarm { .. } => ActionType::Update,
            Action::DeleteLoadBalancer { .. }
            | Action::DeleteLaunchTemplate { .. }
            | Action::DeleteScalingGroup { .. }
            | Action::DeleteScalingPolicy { .. }
            | Action::DeleteAlarm { .. } => ActionType::Delete,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Action::CreateLoadBalancer { .. }
            | Action::UpdateLoadBalancer { .. }
            | Action::DeleteLoadBalancer { .. } => ResourceKind::LoadBalancer,
            Action::CreateLaunchTemplate { .. } | Action::DeleteLaunchTemplate { .. } => {
                ResourceKind::LaunchTemplate
            }
            Action::CreateScalingGroup { .. }
            | Action::UpdateScalingGroup { .. }
            | Action::DeleteScalingGroup { .. } => ResourceKind::ScalingGroup,
            Action::CreateScalingPolicy { .. }
            | Action::UpdateScalingPolicy { .. }
            | Action::DeleteScalingPolicy { .. } => ResourceKind::ScalingPolicy,
            Action::CreateAlarm { .. } | Action::UpdateAlarm { .. } | Action::DeleteAlarm { .. } => {
                ResourceKind::Alarm
            }
        }
    }

    /// Provider-side name of the resource this action touches
    pub fn resource_name(&self) -> &str {
        match self {
            Action::CreateLoadBalancer { spec, .. } | Action::UpdateLoadBalancer { spec, .. } => {
                &spec.name
            }
            Action::CreateLaunchTemplate { revision, .. }
            | Action::DeleteLaunchTemplate { revision } => revision,
            Action::CreateScalingGroup { spec } | Action::UpdateScalingGroup { spec, .. } => {
                &spec.name
            }
            Action::CreateScalingPolicy { spec, .. } | Action::UpdateScalingPolicy { spec, .. } => {
                &spec.name
            }
            Action::CreateAlarm { spec, .. } | Action::UpdateAlarm { spec, .. } => &spec.name,
            Action::DeleteLoadBalancer { name }
            | Action::DeleteScalingGroup { name }
            | Action::DeleteScalingPolicy { name, .. }
            | Action::DeleteAlarm { name } => name,
        }
    }

    /// Changed fields of an update; empty for creates and deletes
    pub fn changes(&self) -> &[FieldChange] {
        match self {
            Action::UpdateLoadBalancer { changes, .. }
            | Action::UpdateScalingGroup { changes, .. }
            | Action::UpdateScalingPolicy { changes, .. }
            | Action::UpdateAlarm { changes, .. } => changes,
            _ => &[],
        }
    }

    /// One-line description, e.g. `update scaling-group ctScalingGroup (desiredCapacity: 2→4)`
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} {}",
            self.action_type(),
            self.kind(),
            self.resource_name()
        );
        let changes = self.changes();
        if !changes.is_empty() {
            let fields: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
            line.push_str(&format!(" ({})", fields.join(", ")));
        }
        line
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Ordered list of actions for one topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Topology the plan was computed for; every create is owned by it
    pub topology: String,

    /// Actions in execution order
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(topology: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            topology: topology.into(),
            actions,
        }
    }

    pub fn empty(topology: impl Into<String>) -> Self {
        Self::new(topology, Vec::new())
    }

    /// Whether the plan has any changes
    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type() == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}
