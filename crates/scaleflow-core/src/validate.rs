//! Topology validation
//!
//! `validate` never stops at the first problem: every rule is checked and
//! all violations are returned together.

use crate::error::{ValidationError, ValidationErrors};
use crate::model::{SCALING_GROUP_DIMENSION, Topology, VolumeKind};
use std::collections::HashSet;

struct Violations(Vec<ValidationError>);

impl Violations {
    fn check(&mut self, ok: bool, field: impl Into<String>, reason: impl Into<String>) {
        if !ok {
            self.0.push(ValidationError::new(field, reason));
        }
    }

    fn non_empty(&mut self, value: &str, field: impl Into<String>) {
        self.check(!value.trim().is_empty(), field, "must not be empty");
    }
}

pub fn validate(topology: &Topology) -> Result<(), ValidationErrors> {
    let mut v = Violations(Vec::new());

    v.non_empty(&topology.name, "name");
    v.check(
        !topology.regions.is_empty(),
        "regions",
        "at least one zone is required",
    );

    validate_load_balancer(topology, &mut v);
    validate_launch_template(topology, &mut v);
    validate_scaling_group(topology, &mut v);
    validate_policies(topology, &mut v);
    validate_alarms(topology, &mut v);

    match ValidationErrors::from_vec(v.0) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

fn validate_load_balancer(topology: &Topology, v: &mut Violations) {
    let lb = &topology.load_balancer;
    v.non_empty(&lb.name, "loadBalancer.name");
    v.check(
        !lb.listeners.is_empty(),
        "loadBalancer.listeners",
        "at least one listener is required",
    );
    for (i, listener) in lb.listeners.iter().enumerate() {
        v.check(
            listener.external_port != 0,
            format!("loadBalancer.listeners[{}].externalPort", i),
            "port must be between 1 and 65535",
        );
        v.check(
            listener.internal_port != 0,
            format!("loadBalancer.listeners[{}].internalPort", i),
            "port must be between 1 and 65535",
        );
    }

    let hc = &lb.health_check;
    v.check(
        hc.target_port != 0,
        "loadBalancer.healthCheck.targetPort",
        "port must be between 1 and 65535",
    );
    v.check(
        hc.healthy_threshold >= 1,
        "loadBalancer.healthCheck.healthyThreshold",
        "must be at least 1",
    );
    v.check(
        hc.unhealthy_threshold >= 1,
        "loadBalancer.healthCheck.unhealthyThreshold",
        "must be at least 1",
    );
    v.check(
        hc.interval_seconds >= 1,
        "loadBalancer.healthCheck.intervalSeconds",
        "must be at least 1",
    );
    v.check(
        hc.timeout_seconds < hc.interval_seconds,
        "loadBalancer.healthCheck.timeoutSeconds",
        format!(
            "timeout ({}s) must be shorter than interval ({}s)",
            hc.timeout_seconds, hc.interval_seconds
        ),
    );
}

fn validate_launch_template(topology: &Topology, v: &mut Violations) {
    let lt = &topology.launch_template;
    v.non_empty(&lt.name, "launchTemplate.name");
    v.non_empty(&lt.image_id, "launchTemplate.imageId");
    v.non_empty(&lt.instance_type, "launchTemplate.instanceType");

    let mut devices = HashSet::new();
    for (i, volume) in lt.volumes.iter().enumerate() {
        let field = format!("launchTemplate.volumes[{}]", i);
        v.non_empty(&volume.device_name, format!("{}.deviceName", field));
        v.check(
            devices.insert(volume.device_name.as_str()),
            format!("{}.deviceName", field),
            format!("device {} is mapped more than once", volume.device_name),
        );
        if let VolumeKind::Persistent { size_gib } = volume.kind {
            v.check(
                size_gib >= 1,
                format!("{}.sizeGiB", field),
                "persistent volumes need a size of at least 1 GiB",
            );
        }
    }
}

fn validate_scaling_group(topology: &Topology, v: &mut Violations) {
    let sg = &topology.scaling_group;
    v.non_empty(&sg.name, "scalingGroup.name");
    v.check(sg.max_size >= 1, "scalingGroup.maxSize", "must be at least 1");
    v.check(
        sg.min_size <= sg.max_size,
        "scalingGroup.minSize",
        format!(
            "minSize ({}) exceeds maxSize ({})",
            sg.min_size, sg.max_size
        ),
    );
    v.check(
        sg.min_size <= sg.desired_capacity && sg.desired_capacity <= sg.max_size,
        "scalingGroup.desiredCapacity",
        format!(
            "desiredCapacity ({}) must be within [{}, {}]",
            sg.desired_capacity, sg.min_size, sg.max_size
        ),
    );
    v.check(
        sg.launch_template_ref == topology.launch_template.name,
        "scalingGroup.launchTemplateRef",
        format!(
            "references '{}' but the launch template is '{}'",
            sg.launch_template_ref, topology.launch_template.name
        ),
    );
    v.check(
        !sg.load_balancer_refs.is_empty(),
        "scalingGroup.loadBalancerRefs",
        "at least one load balancer reference is required",
    );
    for lb_ref in &sg.load_balancer_refs {
        v.check(
            *lb_ref == topology.load_balancer.name,
            "scalingGroup.loadBalancerRefs",
            format!(
                "references '{}' but the load balancer is '{}'",
                lb_ref, topology.load_balancer.name
            ),
        );
    }
    v.check(
        !sg.zones.is_empty(),
        "scalingGroup.zones",
        "at least one zone is required",
    );
    for zone in &sg.zones {
        v.check(
            topology.regions.contains(zone),
            "scalingGroup.zones",
            format!("zone '{}' is not one of the topology regions", zone),
        );
    }
}

fn validate_policies(topology: &Topology, v: &mut Violations) {
    let mut names = HashSet::new();
    for (i, policy) in topology.policies.iter().enumerate() {
        let field = format!("policies[{}]", i);
        v.non_empty(&policy.name, format!("{}.name", field));
        v.check(
            names.insert(policy.name.as_str()),
            format!("{}.name", field),
            format!("duplicate policy name '{}'", policy.name),
        );
        v.check(
            policy.capacity_delta != 0,
            format!("{}.capacityDelta", field),
            "must not be zero",
        );
        if policy.capacity_delta != 0 {
            v.check(
                policy.direction.accepts(policy.capacity_delta),
                format!("{}.capacityDelta", field),
                format!(
                    "delta {} does not scale {}",
                    policy.capacity_delta, policy.direction
                ),
            );
        }
    }
}

fn validate_alarms(topology: &Topology, v: &mut Violations) {
    let mut names = HashSet::new();
    for (i, alarm) in topology.alarms.iter().enumerate() {
        let field = format!("alarms[{}]", i);
        v.non_empty(&alarm.name, format!("{}.name", field));
        v.check(
            names.insert(alarm.name.as_str()),
            format!("{}.name", field),
            format!("duplicate alarm name '{}'", alarm.name),
        );
        v.non_empty(&alarm.metric_namespace, format!("{}.metricNamespace", field));
        v.non_empty(&alarm.metric_name, format!("{}.metricName", field));
        v.check(
            alarm.threshold.is_finite(),
            format!("{}.threshold", field),
            "must be a finite number",
        );
        v.check(
            alarm.period_seconds >= 1,
            format!("{}.periodSeconds", field),
            "must be at least 1",
        );
        v.check(
            alarm.evaluation_periods >= 1,
            format!("{}.evaluationPeriods", field),
            "must be at least 1",
        );
        v.check(
            topology.policy(&alarm.bound_policy).is_some(),
            format!("{}.boundPolicy", field),
            format!("policy '{}' is not declared", alarm.bound_policy),
        );
        if let Some(group) = alarm.dimensions.get(SCALING_GROUP_DIMENSION) {
            v.check(
                *group == topology.scaling_group.name,
                format!("{}.dimensions.{}", field, SCALING_GROUP_DIMENSION),
                format!(
                    "'{}' is not the scaling group '{}'",
                    group, topology.scaling_group.name
                ),
            );
        }
    }
}
