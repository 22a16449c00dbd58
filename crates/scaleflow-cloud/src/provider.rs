//! Provider client trait definition

use crate::action::ResourceKind;
use crate::error::ProviderError;
use crate::observed::ObservedState;
use async_trait::async_trait;
use scaleflow_core::{
    AlarmSpec, HealthCheck, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec,
    ScalingPolicySpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Provider-assigned identifier (ARN-equivalent) of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a create-or-get call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// The resource did not exist and was created
    Created(ResourceHandle),
    /// A resource with that name already existed for the same owner
    Existing(ResourceHandle),
}

impl Provisioned {
    pub fn handle(&self) -> &ResourceHandle {
        match self {
            Provisioned::Created(handle) | Provisioned::Existing(handle) => handle,
        }
    }

    pub fn into_handle(self) -> ResourceHandle {
        match self {
            Provisioned::Created(handle) | Provisioned::Existing(handle) => handle,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}

/// Provider client abstraction.
///
/// Every resource is addressed by name. Creates are idempotent: calling
/// `create_or_get_*` for a name the same `owner` already holds returns
/// [`Provisioned::Existing`]; a name held by another owner is an
/// unrecoverable conflict. Implementations must be safe to share between
/// concurrently reconciled topologies.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the provider name (e.g., "local")
    fn name(&self) -> &str;

    /// Every resource tagged with `topology`
    async fn list_resources(&self, topology: &str) -> ProviderResult<ObservedState>;

    /// Topology owning the resource named `name`, if it exists
    async fn lookup_owner(&self, kind: ResourceKind, name: &str)
    -> ProviderResult<Option<String>>;

    async fn create_or_get_load_balancer(
        &self,
        owner: &str,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
    ) -> ProviderResult<Provisioned>;

    async fn configure_health_check(
        &self,
        load_balancer: &str,
        check: &HealthCheck,
    ) -> ProviderResult<()>;

    /// Push listeners and zones of an existing load balancer
    async fn update_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
    ) -> ProviderResult<()>;

    async fn delete_load_balancer(&self, name: &str) -> ProviderResult<()>;

    /// Templates are immutable, so they are addressed by revision name
    async fn create_or_get_launch_template(
        &self,
        owner: &str,
        revision: &str,
        spec: &LaunchTemplateSpec,
    ) -> ProviderResult<Provisioned>;

    async fn delete_launch_template(&self, revision: &str) -> ProviderResult<()>;

    /// `spec.launch_template_ref` is a revision name
    async fn create_or_get_scaling_group(
        &self,
        owner: &str,
        spec: &ScalingGroupSpec,
    ) -> ProviderResult<Provisioned>;

    async fn update_scaling_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()>;

    async fn delete_scaling_group(&self, name: &str) -> ProviderResult<()>;

    /// Returns the policy handle alarms bind to
    async fn create_or_get_scaling_policy(
        &self,
        owner: &str,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<Provisioned>;

    async fn get_policy_handle(&self, group: &str, name: &str) -> ProviderResult<ResourceHandle>;

    async fn update_scaling_policy(
        &self,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<()>;

    async fn delete_scaling_policy(&self, group: &str, name: &str) -> ProviderResult<()>;

    async fn create_or_get_alarm(
        &self,
        owner: &str,
        spec: &AlarmSpec,
        action: &ResourceHandle,
    ) -> ProviderResult<Provisioned>;

    async fn update_alarm(&self, spec: &AlarmSpec, action: &ResourceHandle) -> ProviderResult<()>;

    async fn delete_alarm(&self, name: &str) -> ProviderResult<()>;
}
