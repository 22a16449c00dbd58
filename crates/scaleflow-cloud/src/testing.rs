//! Scripted provider and fixtures for unit tests

use crate::action::ResourceKind;
use crate::error::ProviderError;
use crate::observed::{
    ObservedAlarm, ObservedLaunchTemplate, ObservedLoadBalancer, ObservedPolicy,
    ObservedScalingGroup, ObservedState,
};
use crate::provider::{ProviderClient, ProviderResult, Provisioned, ResourceHandle};
use async_trait::async_trait;
use scaleflow_core::{
    AlarmSpec, HealthCheck, LaunchTemplateSpec, LoadBalancerSpec, ScalingGroupSpec,
    ScalingPolicySpec, Topology,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) const COLLECTOR: &str = r#"
topology "storm-collector" {
    regions "eu-west-1a" "eu-west-1b" "eu-west-1c"
    load-balancer "StormTestCollector" {
        listener external=80 internal=80 protocol="tcp"
        listener external=443 internal=443 protocol="tcp"
        health-check target-port=80 interval=30 healthy=3 unhealthy=5 timeout=2
    }
    launch-template "ctLaunchConfig" {
        image "ami-93b087e7"
        instance-type "t1.micro"
        credential "default-TVT-ec2key"
        security-groups "StormTest-Collector-WebApp"
        volume "/dev/sdc" kind="ephemeral"
        volume "/dev/sdh" kind="persistent" size=100
    }
    scaling-group "ctScalingGroup" {
        capacity min=2 max=6 desired=2
        cooldown 300
    }
    policy "ctScaleUp" direction="up" delta=2 cooldown=180
    policy "ctScaleDown" direction="down" delta=-1 cooldown=180
    alarm "ctScaleAlarm-HighCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        when ">" 70
        policy "ctScaleUp"
    }
    alarm "ctScaleAlarm-LowCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        when "<=" 30
        policy "ctScaleDown"
    }
}
"#;

pub(crate) fn collector() -> Topology {
    scaleflow_core::parse_topology_str(COLLECTOR).unwrap()
}

fn handle(kind: ResourceKind, name: &str) -> ResourceHandle {
    ResourceHandle::new(format!("arn:test:{}/{}", kind, name))
}

pub(crate) fn policy_handle(group: &str, name: &str) -> ResourceHandle {
    handle(ResourceKind::ScalingPolicy, &format!("{}/{}", group, name))
}

/// What a provider reports once `desired` is fully applied
pub(crate) fn mirror(desired: &Topology) -> ObservedState {
    let revision = desired.launch_template.revision_name();
    let group = &desired.scaling_group.name;
    ObservedState {
        topology: desired.name.clone(),
        load_balancers: vec![ObservedLoadBalancer {
            spec: desired.load_balancer.clone(),
            zones: desired.regions.clone(),
            dns_name: None,
            handle: handle(ResourceKind::LoadBalancer, &desired.load_balancer.name),
        }],
        launch_templates: vec![ObservedLaunchTemplate {
            revision: revision.clone(),
            spec: desired.launch_template.clone(),
            handle: handle(ResourceKind::LaunchTemplate, &revision),
        }],
        scaling_groups: vec![ObservedScalingGroup {
            spec: ScalingGroupSpec {
                launch_template_ref: revision,
                ..desired.scaling_group.clone()
            },
            handle: handle(ResourceKind::ScalingGroup, group),
        }],
        policies: desired
            .policies
            .iter()
            .map(|policy| ObservedPolicy {
                group: group.clone(),
                spec: policy.clone(),
                handle: policy_handle(group, &policy.name),
            })
            .collect(),
        alarms: desired
            .alarms
            .iter()
            .map(|alarm| ObservedAlarm {
                spec: alarm.clone(),
                action: policy_handle(group, &alarm.bound_policy),
                handle: handle(ResourceKind::Alarm, &alarm.name),
            })
            .collect(),
        foreign: Vec::new(),
    }
}

/// Provider that records every call and fails on request.
///
/// Failures are queued per method name and consumed one per call. A second
/// create-or-get of the same resource reports `Existing`.
#[derive(Default)]
pub(crate) struct FakeProvider {
    observed: Mutex<Option<ObservedState>>,
    listing_error: Mutex<Option<ProviderError>>,
    owners: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ProviderError>>>,
    existing: AtomicBool,
    created: Mutex<HashSet<String>>,
    lost_responses: Mutex<HashMap<&'static str, ProviderError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observed(&self, state: ObservedState) {
        *self.observed.lock().unwrap() = Some(state);
    }

    pub fn fail_listing(&self, error: ProviderError) {
        *self.listing_error.lock().unwrap() = Some(error);
    }

    pub fn set_owner(&self, name: &str, owner: &str) {
        self.owners
            .lock()
            .unwrap()
            .insert(name.to_string(), owner.to_string());
    }

    /// Every create-or-get reports `Existing`
    pub fn report_existing(&self) {
        self.existing.store(true, Ordering::SeqCst);
    }

    pub fn fail(&self, method: &'static str, error: ProviderError) {
        self.fail_times(method, error, 1);
    }

    pub fn fail_times(&self, method: &'static str, error: ProviderError, times: usize) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(method).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// The next call of `method` takes effect but reports `error`
    pub fn lose_response(&self, method: &'static str, error: ProviderError) {
        self.lost_responses.lock().unwrap().insert(method, error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    fn call(&self, method: &'static str, name: &str) -> ProviderResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", method, name));
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(method).and_then(|q| q.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn respond(&self, method: &'static str, handle: ResourceHandle) -> ProviderResult<Provisioned> {
        let provisioned = self.provisioned(handle);
        match self.lost_responses.lock().unwrap().remove(method) {
            Some(error) => Err(error),
            None => Ok(provisioned),
        }
    }

    fn provisioned(&self, handle: ResourceHandle) -> Provisioned {
        let first = self
            .created
            .lock()
            .unwrap()
            .insert(handle.as_str().to_string());
        if !first || self.existing.load(Ordering::SeqCst) {
            Provisioned::Existing(handle)
        } else {
            Provisioned::Created(handle)
        }
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_resources(&self, topology: &str) -> ProviderResult<ObservedState> {
        self.call("list_resources", topology)?;
        if let Some(error) = self.listing_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .observed
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ObservedState::empty(topology)))
    }

    async fn lookup_owner(
        &self,
        _kind: ResourceKind,
        name: &str,
    ) -> ProviderResult<Option<String>> {
        self.call("lookup_owner", name)?;
        Ok(self.owners.lock().unwrap().get(name).cloned())
    }

    async fn create_or_get_load_balancer(
        &self,
        _owner: &str,
        spec: &LoadBalancerSpec,
        _zones: &BTreeSet<String>,
    ) -> ProviderResult<Provisioned> {
        self.call("create_or_get_load_balancer", &spec.name)?;
        self.respond("create_or_get_load_balancer", handle(ResourceKind::LoadBalancer, &spec.name))
    }

    async fn configure_health_check(
        &self,
        load_balancer: &str,
        _check: &HealthCheck,
    ) -> ProviderResult<()> {
        self.call("configure_health_check", load_balancer)
    }

    async fn update_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        _zones: &BTreeSet<String>,
    ) -> ProviderResult<()> {
        self.call("update_load_balancer", &spec.name)
    }

    async fn delete_load_balancer(&self, name: &str) -> ProviderResult<()> {
        self.call("delete_load_balancer", name)
    }

    async fn create_or_get_launch_template(
        &self,
        _owner: &str,
        revision: &str,
        _spec: &LaunchTemplateSpec,
    ) -> ProviderResult<Provisioned> {
        self.call("create_or_get_launch_template", revision)?;
        self.respond("create_or_get_launch_template", handle(ResourceKind::LaunchTemplate, revision))
    }

    async fn delete_launch_template(&self, revision: &str) -> ProviderResult<()> {
        self.call("delete_launch_template", revision)
    }

    async fn create_or_get_scaling_group(
        &self,
        _owner: &str,
        spec: &ScalingGroupSpec,
    ) -> ProviderResult<Provisioned> {
        self.call("create_or_get_scaling_group", &spec.name)?;
        self.respond("create_or_get_scaling_group", handle(ResourceKind::ScalingGroup, &spec.name))
    }

    async fn update_scaling_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        self.call("update_scaling_group", &spec.name)
    }

    async fn delete_scaling_group(&self, name: &str) -> ProviderResult<()> {
        self.call("delete_scaling_group", name)
    }

    async fn create_or_get_scaling_policy(
        &self,
        _owner: &str,
        group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<Provisioned> {
        self.call("create_or_get_scaling_policy", &spec.name)?;
        self.respond("create_or_get_scaling_policy", policy_handle(group, &spec.name))
    }

    async fn get_policy_handle(&self, group: &str, name: &str) -> ProviderResult<ResourceHandle> {
        self.call("get_policy_handle", name)?;
        Ok(policy_handle(group, name))
    }

    async fn update_scaling_policy(
        &self,
        _group: &str,
        spec: &ScalingPolicySpec,
    ) -> ProviderResult<()> {
        self.call("update_scaling_policy", &spec.name)
    }

    async fn delete_scaling_policy(&self, _group: &str, name: &str) -> ProviderResult<()> {
        self.call("delete_scaling_policy", name)
    }

    async fn create_or_get_alarm(
        &self,
        _owner: &str,
        spec: &AlarmSpec,
        action: &ResourceHandle,
    ) -> ProviderResult<Provisioned> {
        self.call("create_or_get_alarm", &format!("{} -> {}", spec.name, action))?;
        self.respond("create_or_get_alarm", handle(ResourceKind::Alarm, &spec.name))
    }

    async fn update_alarm(&self, spec: &AlarmSpec, action: &ResourceHandle) -> ProviderResult<()> {
        self.call("update_alarm", &format!("{} -> {}", spec.name, action))
    }

    async fn delete_alarm(&self, name: &str) -> ProviderResult<()> {
        self.call("delete_alarm", name)
    }
}
