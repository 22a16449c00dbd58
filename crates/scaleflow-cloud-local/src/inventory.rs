//! In-memory inventory of everything the local provider holds
//!
//! Enforces the rules a real provider would: names are unique per kind,
//! every resource belongs to one topology, and a resource cannot be created
//! before its dependencies or deleted while something still uses it.

use chrono::{DateTime, Utc};
use scaleflow_cloud::{
    ObservedAlarm, ObservedLaunchTemplate, ObservedLoadBalancer, ObservedPolicy,
    ObservedScalingGroup, ObservedState, ProviderError, ProviderResult, Provisioned,
    ResourceHandle, ResourceKind,
};
use scaleflow_core::{
    AlarmSpec, HealthCheck, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec,
    ScalingPolicySpec,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const INVENTORY_VERSION: u32 = 1;

/// A resource plus its bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    /// Topology that created the resource
    pub owner: String,
    pub handle: ResourceHandle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resource: T,
}

impl<T> Record<T> {
    fn new(owner: &str, handle: ResourceHandle, resource: T) -> Self {
        let now = Utc::now();
        Self {
            owner: owner.to_string(),
            handle,
            created_at: now,
            updated_at: now,
            resource,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerResource {
    pub spec: LoadBalancerSpec,
    pub zones: BTreeSet<String>,
    pub dns_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResource {
    pub group: String,
    pub spec: ScalingPolicySpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmResource {
    pub spec: AlarmSpec,
    /// Handle of the policy fired by the alarm
    pub action: ResourceHandle,
}

/// Every resource of every topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub load_balancers: BTreeMap<String, Record<LoadBalancerResource>>,
    /// Keyed by revision name
    #[serde(default)]
    pub launch_templates: BTreeMap<String, Record<LaunchTemplateSpec>>,
    #[serde(default)]
    pub scaling_groups: BTreeMap<String, Record<ScalingGroupSpec>>,
    /// Keyed by `group/name`
    #[serde(default)]
    pub policies: BTreeMap<String, Record<PolicyResource>>,
    #[serde(default)]
    pub alarms: BTreeMap<String, Record<AlarmResource>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            version: INVENTORY_VERSION,
            updated_at: Utc::now(),
            load_balancers: BTreeMap::new(),
            launch_templates: BTreeMap::new(),
            scaling_groups: BTreeMap::new(),
            policies: BTreeMap::new(),
            alarms: BTreeMap::new(),
        }
    }
}

fn policy_key(group: &str, name: &str) -> String {
    format!("{}/{}", group, name)
}

fn not_found(kind: ResourceKind, name: &str) -> ProviderError {
    ProviderError::not_found(format!("{} '{}' does not exist", kind, name))
}

/// Existing record: same owner is idempotent success, another owner a conflict
fn existing<T>(
    kind: ResourceKind,
    name: &str,
    record: &Record<T>,
    owner: &str,
) -> ProviderResult<Provisioned> {
    if record.owner == owner {
        Ok(Provisioned::Existing(record.handle.clone()))
    } else {
        Err(ProviderError::unrecoverable(format!(
            "{} '{}' already exists and belongs to topology '{}'",
            kind, name, record.owner
        )))
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_count(&self) -> usize {
        self.load_balancers.len()
            + self.launch_templates.len()
            + self.scaling_groups.len()
            + self.policies.len()
            + self.alarms.len()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Names of every topology owning at least one resource
    pub fn topologies(&self) -> BTreeSet<String> {
        let owners = self
            .load_balancers
            .values()
            .map(|r| &r.owner)
            .chain(self.launch_templates.values().map(|r| &r.owner))
            .chain(self.scaling_groups.values().map(|r| &r.owner))
            .chain(self.policies.values().map(|r| &r.owner))
            .chain(self.alarms.values().map(|r| &r.owner));
        owners.cloned().collect()
    }

    /// Everything owned by `topology`
    pub fn list(&self, topology: &str) -> ObservedState {
        let mut state = ObservedState::empty(topology);
        state.load_balancers = self
            .load_balancers
            .values()
            .filter(|r| r.owner == topology)
            .map(|r| ObservedLoadBalancer {
                spec: r.resource.spec.clone(),
                zones: r.resource.zones.clone(),
                dns_name: Some(r.resource.dns_name.clone()),
                handle: r.handle.clone(),
            })
            .collect();
        state.launch_templates = self
            .launch_templates
            .iter()
            .filter(|(_, r)| r.owner == topology)
            .map(|(revision, r)| ObservedLaunchTemplate {
                revision: revision.clone(),
                spec: r.resource.clone(),
                handle: r.handle.clone(),
            })
            .collect();
        state.scaling_groups = self
            .scaling_groups
            .values()
            .filter(|r| r.owner == topology)
            .map(|r| ObservedScalingGroup {
                spec: r.resource.clone(),
                handle: r.handle.clone(),
            })
            .collect();
        state.policies = self
            .policies
            .values()
            .filter(|r| r.owner == topology)
            .map(|r| ObservedPolicy {
                group: r.resource.group.clone(),
                spec: r.resource.spec.clone(),
                handle: r.handle.clone(),
            })
            .collect();
        state.alarms = self
            .alarms
            .values()
            .filter(|r| r.owner == topology)
            .map(|r| ObservedAlarm {
                spec: r.resource.spec.clone(),
                action: r.resource.action.clone(),
                handle: r.handle.clone(),
            })
            .collect();
        state
    }

    pub fn owner_of(&self, kind: ResourceKind, name: &str) -> Option<String> {
        match kind {
            ResourceKind::LoadBalancer => self.load_balancers.get(name).map(|r| r.owner.clone()),
            ResourceKind::LaunchTemplate => {
                self.launch_templates.get(name).map(|r| r.owner.clone())
            }
            ResourceKind::ScalingGroup => self.scaling_groups.get(name).map(|r| r.owner.clone()),
            ResourceKind::ScalingPolicy => self
                .policies
                .values()
                .find(|r| r.resource.spec.name == name)
                .map(|r| r.owner.clone()),
            ResourceKind::Alarm => self.alarms.get(name).map(|r| r.owner.clone()),
        }
    }

    pub fn create_load_balancer(
        &mut self,
        owner: &str,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
        handle: ResourceHandle,
        dns_name: String,
    ) -> ProviderResult<Provisioned> {
        if let Some(record) = self.load_balancers.get(&spec.name) {
            return existing(ResourceKind::LoadBalancer, &spec.name, record, owner);
        }
        // the health check is configured by a separate call
        let resource = LoadBalancerResource {
            spec: LoadBalancerSpec {
                health_check: HealthCheck::default(),
                ..spec.clone()
            },
            zones: zones.clone(),
            dns_name,
        };
        self.load_balancers
            .insert(spec.name.clone(), Record::new(owner, handle.clone(), resource));
        self.touch();
        Ok(Provisioned::Created(handle))
    }

    pub fn configure_health_check(&mut self, name: &str, check: &HealthCheck) -> ProviderResult<()> {
        let record = self
            .load_balancers
            .get_mut(name)
            .ok_or_else(|| not_found(ResourceKind::LoadBalancer, name))?;
        record.resource.spec.health_check = check.clone();
        record.touch();
        self.touch();
        Ok(())
    }

    pub fn update_load_balancer(
        &mut self,
        spec: &LoadBalancerSpec,
        zones: &BTreeSet<String>,
    ) -> ProviderResult<()> {
        let record = self
            .load_balancers
            .get_mut(&spec.name)
            .ok_or_else(|| not_found(ResourceKind::LoadBalancer, &spec.name))?;
        record.resource.spec.listeners = spec.listeners.clone();
        record.resource.zones = zones.clone();
        record.touch();
        self.touch();
        Ok(())
    }

    pub fn delete_load_balancer(&mut self, name: &str) -> ProviderResult<()> {
        if !self.load_balancers.contains_key(name) {
            return Err(not_found(ResourceKind::LoadBalancer, name));
        }
        if let Some((group, _)) = self
            .scaling_groups
            .iter()
            .find(|(_, r)| r.resource.load_balancer_refs.contains(name))
        {
            return Err(ProviderError::unrecoverable(format!(
                "load-balancer '{}' is still attached to scaling-group '{}'",
                name, group
            )));
        }
        self.load_balancers.remove(name);
        self.touch();
        Ok(())
    }

    pub fn create_launch_template(
        &mut self,
        owner: &str,
        revision: &str,
        spec: &LaunchTemplateSpec,
        handle: ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        if let Some(record) = self.launch_templates.get(revision) {
            return existing(ResourceKind::LaunchTemplate, revision, record, owner);
        }
        self.launch_templates
            .insert(revision.to_string(), Record::new(owner, handle.clone(), spec.clone()));
        self.touch();
        Ok(Provisioned::Created(handle))
    }

    pub fn delete_launch_template(&mut self, revision: &str) -> ProviderResult<()> {
        if !self.launch_templates.contains_key(revision) {
            return Err(not_found(ResourceKind::LaunchTemplate, revision));
        }
        if let Some((group, _)) = self
            .scaling_groups
            .iter()
            .find(|(_, r)| r.resource.launch_template_ref == revision)
        {
            return Err(ProviderError::unrecoverable(format!(
                "launch-template '{}' is in use by scaling-group '{}'",
                revision, group
            )));
        }
        self.launch_templates.remove(revision);
        self.touch();
        Ok(())
    }

    fn check_group_refs(&self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        if !self.launch_templates.contains_key(&spec.launch_template_ref) {
            return Err(not_found(
                ResourceKind::LaunchTemplate,
                &spec.launch_template_ref,
            ));
        }
        for lb in &spec.load_balancer_refs {
            if !self.load_balancers.contains_key(lb) {
                return Err(not_found(ResourceKind::LoadBalancer, lb));
            }
        }
        Ok(())
    }

    pub fn create_scaling_group(
        &mut self,
        owner: &str,
        spec: &ScalingGroupSpec,
        handle: ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        if let Some(record) = self.scaling_groups.get(&spec.name) {
            return existing(ResourceKind::ScalingGroup, &spec.name, record, owner);
        }
        self.check_group_refs(spec)?;
        self.scaling_groups
            .insert(spec.name.clone(), Record::new(owner, handle.clone(), spec.clone()));
        self.touch();
        Ok(Provisioned::Created(handle))
    }

    pub fn update_scaling_group(&mut self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        if !self.scaling_groups.contains_key(&spec.name) {
            return Err(not_found(ResourceKind::ScalingGroup, &spec.name));
        }
        self.check_group_refs(spec)?;
        if let Some(record) = self.scaling_groups.get_mut(&spec.name) {
            record.resource = spec.clone();
            record.touch();
        }
        self.touch();
        Ok(())
    }

    /// Deleting a group also removes its policies
    pub fn delete_scaling_group(&mut self, name: &str) -> ProviderResult<()> {
        if self.scaling_groups.remove(name).is_none() {
            return Err(not_found(ResourceKind::ScalingGroup, name));
        }
        self.policies.retain(|_, r| r.resource.group != name);
        self.touch();
        Ok(())
    }

    pub fn create_scaling_policy(
        &mut self,
        owner: &str,
        group: &str,
        spec: &ScalingPolicySpec,
        handle: ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        let key = policy_key(group, &spec.name);
        if let Some(record) = self.policies.get(&key) {
            return existing(ResourceKind::ScalingPolicy, &key, record, owner);
        }
        if !self.scaling_groups.contains_key(group) {
            return Err(not_found(ResourceKind::ScalingGroup, group));
        }
        let resource = PolicyResource {
            group: group.to_string(),
            spec: spec.clone(),
        };
        self.policies
            .insert(key, Record::new(owner, handle.clone(), resource));
        self.touch();
        Ok(Provisioned::Created(handle))
    }

    pub fn policy_handle(&self, group: &str, name: &str) -> ProviderResult<ResourceHandle> {
        let key = policy_key(group, name);
        self.policies
            .get(&key)
            .map(|r| r.handle.clone())
            .ok_or_else(|| not_found(ResourceKind::ScalingPolicy, &key))
    }

    pub fn update_scaling_policy(
        &mut self,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<()> {
        let key = policy_key(group, &spec.name);
        let record = self
            .policies
            .get_mut(&key)
            .ok_or_else(|| not_found(ResourceKind::ScalingPolicy, &key))?;
        record.resource.spec = spec.clone();
        record.touch();
        self.touch();
        Ok(())
    }

    pub fn delete_scaling_policy(&mut self, group: &str, name: &str) -> ProviderResult<()> {
        let key = policy_key(group, name);
        if self.policies.remove(&key).is_none() {
            return Err(not_found(ResourceKind::ScalingPolicy, &key));
        }
        self.touch();
        Ok(())
    }

    fn check_alarm_action(&self, action: &ResourceHandle) -> ProviderResult<()> {
        if self.policies.values().any(|r| &r.handle == action) {
            Ok(())
        } else {
            Err(ProviderError::not_found(format!(
                "alarm action '{}' does not name an existing scaling-policy",
                action
            )))
        }
    }

    pub fn create_alarm(
        &mut self,
        owner: &str,
        spec: &AlarmSpec,
        action: &ResourceHandle,
        handle: ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        if let Some(record) = self.alarms.get(&spec.name) {
            return existing(ResourceKind::Alarm, &spec.name, record, owner);
        }
        self.check_alarm_action(action)?;
        let resource = AlarmResource {
            spec: spec.clone(),
            action: action.clone(),
        };
        self.alarms
            .insert(spec.name.clone(), Record::new(owner, handle.clone(), resource));
        self.touch();
        Ok(Provisioned::Created(handle))
    }

    pub fn update_alarm(&mut self, spec: &AlarmSpec, action: &ResourceHandle) -> ProviderResult<()> {
        if !self.alarms.contains_key(&spec.name) {
            return Err(not_found(ResourceKind::Alarm, &spec.name));
        }
        self.check_alarm_action(action)?;
        if let Some(record) = self.alarms.get_mut(&spec.name) {
            record.resource = AlarmResource {
                spec: spec.clone(),
                action: action.clone(),
            };
            record.touch();
        }
        self.touch();
        Ok(())
    }

    pub fn delete_alarm(&mut self, name: &str) -> ProviderResult<()> {
        if self.alarms.remove(name).is_none() {
            return Err(not_found(ResourceKind::Alarm, name));
        }
        self.touch();
        Ok(())
    }
}
