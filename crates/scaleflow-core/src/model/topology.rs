use super::{AlarmSpec, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec, ScalingPolicySpec};
use crate::error::ValidationErrors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Desired state of one scaled service deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Unique identifier; every provider resource is tagged with it
    pub name: String,

    /// Availability zones the load balancer spans
    pub regions: BTreeSet<String>,

    pub load_balancer: LoadBalancerSpec,
    pub launch_template: LaunchTemplateSpec,
    pub scaling_group: ScalingGroupSpec,

    /// Policies attached to `scaling_group`
    pub policies: Vec<ScalingPolicySpec>,

    /// Usually exactly two: one scale-up, one scale-down
    pub alarms: Vec<AlarmSpec>,
}

impl Topology {
    pub fn policy(&self, name: &str) -> Option<&ScalingPolicySpec> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn alarm(&self, name: &str) -> Option<&AlarmSpec> {
        self.alarms.iter().find(|a| a.name == name)
    }

    /// Check every invariant, reporting all violations at once
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        crate::validate::validate(self)
    }
}
