//! Local provider implementation

use crate::error::{Result, StateError};
use crate::inventory::Inventory;
use crate::state::StateManager;
use async_trait::async_trait;
use scaleflow_cloud::{
    ObservedState, ProviderClient, ProviderError, ProviderResult, Provisioned, ResourceHandle,
    ResourceKind,
};
use scaleflow_config::ProviderConfig;
use scaleflow_core::{
    AlarmSpec, HealthCheck, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec,
    ScalingPolicySpec,
};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::Mutex;

/// Provider that keeps its resources in an inventory file.
///
/// Behaves like a real provider for everything reconciliation relies on:
/// ownership, idempotent creates, dependency checks and handles.
pub struct LocalProvider {
    region: String,
    inventory: Mutex<Inventory>,
    store: Option<StateManager>,
}

impl LocalProvider {
    /// Provider whose inventory lives only as long as the value
    pub fn in_memory(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            inventory: Mutex::new(Inventory::new()),
            store: None,
        }
    }

    /// Provider backed by `<state_dir>/inventory.json`
    pub async fn open(state_dir: impl AsRef<Path>, region: impl Into<String>) -> Result<Self> {
        let store = StateManager::new(state_dir);
        let inventory = store.load().await?;
        Ok(Self {
            region: region.into(),
            inventory: Mutex::new(inventory),
            store: Some(store),
        })
    }

    /// Provider for a loaded configuration; relative state dirs resolve against `base`
    pub async fn from_config(config: &ProviderConfig, base: &Path) -> Result<Self> {
        if let Some(proxy) = &config.proxy {
            tracing::debug!("Local provider does not use the proxy at {}", proxy.url());
        }
        Self::open(config.resolve_state_dir(base), config.region.clone()).await
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Copy of the current inventory, re-read from disk when file-backed
    pub async fn snapshot(&self) -> Inventory {
        let mut inventory = self.inventory.lock().await;
        if let Some(store) = &self.store {
            match store.load().await {
                Ok(fresh) => *inventory = fresh,
                Err(e) => tracing::warn!("Failed to reload inventory: {}", e),
            }
        }
        inventory.clone()
    }

    /// Name clients point their CNAME at
    pub fn dns_name(&self, load_balancer: &str) -> String {
        format!(
            "{}.{}.elb.scaleflow.local",
            load_balancer.to_lowercase(),
            self.region
        )
    }

    fn handle(&self, kind: ResourceKind, name: &str) -> ResourceHandle {
        ResourceHandle::new(format!("arn:scaleflow:{}:{}/{}", self.region, kind, name))
    }

    /// Run `f` against the latest inventory; other processes may share the file
    async fn read<T>(&self, f: impl FnOnce(&Inventory) -> T + Send) -> ProviderResult<T> {
        let mut inventory = self.inventory.lock().await;
        if let Some(store) = &self.store {
            *inventory = store.load().await.map_err(|e| {
                ProviderError::unrecoverable(format!("failed to load inventory: {}", e))
            })?;
        }
        Ok(f(&inventory))
    }

    /// Apply `f` to the latest inventory and persist the result.
    ///
    /// File-backed providers hold the inventory lock from reload to save, so
    /// concurrent writers never drop each other's records. A failed `f` or a
    /// failed save leaves the inventory untouched.
    async fn mutate<T: Send>(
        &self,
        f: impl FnOnce(&mut Inventory) -> ProviderResult<T> + Send,
    ) -> ProviderResult<T> {
        let mut cached = self.inventory.lock().await;
        let Some(store) = &self.store else {
            let mut working = cached.clone();
            let result = f(&mut working)?;
            *cached = working;
            return Ok(result);
        };

        let _lock = store.lock().await.map_err(|e| match e {
            StateError::Busy(_) => ProviderError::transient(e.to_string()),
            e => ProviderError::unrecoverable(format!("failed to lock inventory: {}", e)),
        })?;
        let mut working = store.load().await.map_err(|e| {
            ProviderError::unrecoverable(format!("failed to load inventory: {}", e))
        })?;
        let result = f(&mut working)?;
        store.save(&working).await.map_err(|e| {
            ProviderError::unrecoverable(format!("failed to persist inventory: {}", e))
        })?;
        *cached = working;
        Ok(result)
    }
}

#[async_trait]
impl ProviderClient for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_resources(&self, topology: &str) -> ProviderResult<ObservedState> {
        self.read(|inventory| inventory.list(topology)).await
    }

    async fn lookup_owner(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> ProviderResult<Option<String>> {
        self.read(|inventory| inventory.owner_of(kind, name)).await
    }

    async fn create_or_get_load_balancer(
        &self,
        owner: &str,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
    ) -> ProviderResult<Provisioned> {
        let handle = self.handle(ResourceKind::LoadBalancer, &spec.name);
        let dns_name = self.dns_name(&spec.name);
        let provisioned = self
            .mutate(|inventory| {
                inventory.create_load_balancer(owner, spec, zones, handle, dns_name.clone())
            })
            .await?;
        if provisioned.was_created() {
            tracing::info!(
                load_balancer = %spec.name,
                "Created load balancer, map your CNAME to {}",
                dns_name
            );
        }
        Ok(provisioned)
    }

    async fn configure_health_check(
        &self,
        load_balancer: &str,
        check: &HealthCheck,
    ) -> ProviderResult<()> {
        tracing::debug!(load_balancer, target = %check.target(), "Configuring health check");
        self.mutate(|inventory| inventory.configure_health_check(load_balancer, check))
            .await
    }

    async fn update_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
    ) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.update_load_balancer(spec, zones))
            .await
    }

    async fn delete_load_balancer(&self, name: &str) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.delete_load_balancer(name))
            .await
    }

    async fn create_or_get_launch_template(
        &self,
        owner: &str,
        revision: &str,
        spec: &LaunchTemplateSpec,
    ) -> ProviderResult<Provisioned> {
        let handle = self.handle(ResourceKind::LaunchTemplate, revision);
        self.mutate(|inventory| inventory.create_launch_template(owner, revision, spec, handle))
            .await
    }

    async fn delete_launch_template(&self, revision: &str) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.delete_launch_template(revision))
            .await
    }

    async fn create_or_get_scaling_group(
        &self,
        owner: &str,
        spec: &ScalingGroupSpec,
    ) -> ProviderResult<Provisioned> {
        let handle = self.handle(ResourceKind::ScalingGroup, &spec.name);
        self.mutate(|inventory| inventory.create_scaling_group(owner, spec, handle))
            .await
    }

    async fn update_scaling_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.update_scaling_group(spec))
            .await
    }

    async fn delete_scaling_group(&self, name: &str) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.delete_scaling_group(name))
            .await
    }

    async fn create_or_get_scaling_policy(
        &self,
        owner: &str,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<Provisioned> {
        let handle = self.handle(
            ResourceKind::ScalingPolicy,
            &format!("{}/{}", group, spec.name),
        );
        self.mutate(|inventory| inventory.create_scaling_policy(owner, group, spec, handle))
            .await
    }

    async fn get_policy_handle(&self, group: &str, name: &str) -> ProviderResult<ResourceHandle> {
        self.read(|inventory| inventory.policy_handle(group, name))
            .await?
    }

    async fn update_scaling_policy(
        &self,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.update_scaling_policy(group, spec))
            .await
    }

    async fn delete_scaling_policy(&self, group: &str, name: &str) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.delete_scaling_policy(group, name))
            .await
    }

    async fn create_or_get_alarm(
        &self,
        owner: &str,
        spec: &AlarmSpec,
        action: &ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        let handle = self.handle(ResourceKind::Alarm, &spec.name);
        self.mutate(|inventory| inventory.create_alarm(owner, spec, action, handle))
            .await
    }

    async fn update_alarm(&self, spec: &AlarmSpec, action: &ResourceHandle) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.update_alarm(spec, action))
            .await
    }

    async fn delete_alarm(&self, name: &str) -> ProviderResult<()> {
        self.mutate(|inventory| inventory.delete_alarm(name)).await
    }
}
