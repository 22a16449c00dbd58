//! Observed provider state of one topology

use crate::action::ResourceKind;
use crate::provider::ResourceHandle;
use scaleflow_core::{
    AlarmSpec, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec, ScalingPolicySpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the provider currently holds for a topology.
///
/// Normally at most one load balancer and one scaling group exist, but a
/// rename or an interrupted replace can leave more, so every kind is a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    pub topology: String,
    #[serde(default)]
    pub load_balancers: Vec<ObservedLoadBalancer>,
    #[serde(default)]
    pub launch_templates: Vec<ObservedLaunchTemplate>,
    #[serde(default)]
    pub scaling_groups: Vec<ObservedScalingGroup>,
    #[serde(default)]
    pub policies: Vec<ObservedPolicy>,
    #[serde(default)]
    pub alarms: Vec<ObservedAlarm>,
    /// Desired names held by other topologies
    #[serde(default)]
    pub foreign: Vec<ForeignClaim>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedLoadBalancer {
    pub spec: LoadBalancerSpec,
    pub zones: BTreeSet<String>,
    pub dns_name: Option<String>,
    pub handle: ResourceHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedLaunchTemplate {
    pub revision: String,
    pub spec: LaunchTemplateSpec,
    pub handle: ResourceHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedScalingGroup {
    /// `launch_template_ref` holds the revision name in use
    pub spec: ScalingGroupSpec,
    pub handle: ResourceHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedPolicy {
    pub group: String,
    pub spec: ScalingPolicySpec,
    pub handle: ResourceHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedAlarm {
    pub spec: AlarmSpec,
    /// Handle of the policy the alarm currently fires
    pub action: ResourceHandle,
    pub handle: ResourceHandle,
}

/// A name the desired topology wants that another topology owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignClaim {
    pub kind: ResourceKind,
    pub name: String,
    pub owner: String,
}

impl ObservedState {
    pub fn empty(topology: impl Into<String>) -> Self {
        Self {
            topology: topology.into(),
            load_balancers: Vec::new(),
            launch_templates: Vec::new(),
            scaling_groups: Vec::new(),
            policies: Vec::new(),
            alarms: Vec::new(),
            foreign: Vec::new(),
        }
    }

    /// Number of owned resources
    pub fn resource_count(&self) -> usize {
        self.load_balancers.len()
            + self.launch_templates.len()
            + self.scaling_groups.len()
            + self.policies.len()
            + self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }

    pub fn load_balancer(&self, name: &str) -> Option<&ObservedLoadBalancer> {
        self.load_balancers.iter().find(|lb| lb.spec.name == name)
    }

    pub fn launch_template(&self, revision: &str) -> Option<&ObservedLaunchTemplate> {
        self.launch_templates.iter().find(|t| t.revision == revision)
    }

    pub fn scaling_group(&self, name: &str) -> Option<&ObservedScalingGroup> {
        self.scaling_groups.iter().find(|g| g.spec.name == name)
    }

    pub fn policy(&self, group: &str, name: &str) -> Option<&ObservedPolicy> {
        self.policies
            .iter()
            .find(|p| p.group == group && p.spec.name == name)
    }

    pub fn alarm(&self, name: &str) -> Option<&ObservedAlarm> {
        self.alarms.iter().find(|a| a.spec.name == name)
    }

    /// Whether a resource of `kind` named `name` is owned by this topology
    pub fn owns(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::LoadBalancer => self.load_balancer(name).is_some(),
            ResourceKind::LaunchTemplate => self.launch_template(name).is_some(),
            ResourceKind::ScalingGroup => self.scaling_group(name).is_some(),
            ResourceKind::ScalingPolicy => self.policies.iter().any(|p| p.spec.name == name),
            ResourceKind::Alarm => self.alarm(name).is_some(),
        }
    }
}
