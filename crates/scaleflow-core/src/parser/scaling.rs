//! scaling-group and policy node parsing

use super::{Issues, as_i32, first_u32, name_arg, prop, string_args, string_prop, u32_prop};
use crate::model::{Direction, ScalingGroupSpec, ScalingPolicySpec};
use kdl::KdlNode;
use std::collections::BTreeSet;

const DEFAULT_GROUP_COOLDOWN: u32 = 300;
const DEFAULT_POLICY_COOLDOWN: u32 = 300;

/// Parse a `scaling-group` node.
///
/// Omitted references fall back to the topology's own load balancer and
/// launch template, and omitted zones to the topology regions.
pub(crate) fn parse_scaling_group(
    node: &KdlNode,
    regions: &BTreeSet<String>,
    load_balancer: &str,
    launch_template: &str,
    issues: &mut Issues,
) -> Option<ScalingGroupSpec> {
    let Some(name) = name_arg(node) else {
        issues.push("scalingGroup.name", "scaling-group requires a name");
        return None;
    };

    let mut min_size = None;
    let mut max_size = None;
    let mut desired_capacity = None;
    let mut cooldown_seconds = DEFAULT_GROUP_COOLDOWN;
    let mut launch_template_ref = None;
    let mut load_balancer_refs = BTreeSet::new();
    let mut zones = BTreeSet::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "capacity" => {
                    // only the given properties override earlier nodes
                    if let Some(v) = u32_prop(child, "min", "scalingGroup.minSize", issues) {
                        min_size = Some(v);
                    }
                    if let Some(v) = u32_prop(child, "max", "scalingGroup.maxSize", issues) {
                        max_size = Some(v);
                    }
                    if let Some(v) =
                        u32_prop(child, "desired", "scalingGroup.desiredCapacity", issues)
                    {
                        desired_capacity = Some(v);
                    }
                }
                "min" | "min-size" | "min_size" => {
                    min_size = first_u32(child, "scalingGroup.minSize", issues);
                }
                "max" | "max-size" | "max_size" => {
                    max_size = first_u32(child, "scalingGroup.maxSize", issues);
                }
                "desired" | "desired-capacity" | "desired_capacity" => {
                    desired_capacity = first_u32(child, "scalingGroup.desiredCapacity", issues);
                }
                "cooldown" => {
                    if let Some(v) = first_u32(child, "scalingGroup.cooldownSeconds", issues) {
                        cooldown_seconds = v;
                    }
                }
                "launch-template" | "launch_template" => {
                    launch_template_ref = name_arg(child);
                }
                "load-balancers" | "load_balancers" | "load-balancer" => {
                    load_balancer_refs.extend(string_args(child));
                }
                "zones" => {
                    zones.extend(string_args(child));
                }
                other => issues.push(
                    format!("scalingGroup.{}", other),
                    format!("unknown node '{}'", other),
                ),
            }
        }
    }

    let (Some(min_size), Some(max_size)) = (min_size, max_size) else {
        issues.push(
            "scalingGroup.capacity",
            "both min and max sizes are required (e.g. `capacity min=2 max=6`)",
        );
        return None;
    };

    if load_balancer_refs.is_empty() {
        load_balancer_refs.insert(load_balancer.to_string());
    }
    if zones.is_empty() {
        zones = regions.clone();
    }

    Some(ScalingGroupSpec {
        name,
        min_size,
        max_size,
        desired_capacity: desired_capacity.unwrap_or(min_size),
        cooldown_seconds,
        launch_template_ref: launch_template_ref.unwrap_or_else(|| launch_template.to_string()),
        load_balancer_refs,
        zones,
    })
}

/// `policy "ctScaleUp" direction="up" delta=2 cooldown=180`
///
/// Without `direction` the sign of `delta` decides.
pub(crate) fn parse_policy(
    node: &KdlNode,
    field: &str,
    issues: &mut Issues,
) -> Option<ScalingPolicySpec> {
    let Some(name) = name_arg(node) else {
        issues.push(format!("{}.name", field), "policy requires a name");
        return None;
    };

    let capacity_delta = match prop(node, "delta").or_else(|| prop(node, "adjustment")) {
        Some(value) => match as_i32(value) {
            Some(delta) => delta,
            None => {
                issues.push(
                    format!("{}.capacityDelta", field),
                    format!("expected an integer, got {}", value),
                );
                return None;
            }
        },
        None => {
            issues.push(format!("{}.capacityDelta", field), "policy requires a delta");
            return None;
        }
    };

    let direction = match string_prop(node, "direction") {
        Some(raw) => match Direction::parse(&raw) {
            Some(direction) => direction,
            None => {
                issues.push(
                    format!("{}.direction", field),
                    format!("unknown direction '{}' (expected up or down)", raw),
                );
                return None;
            }
        },
        None if capacity_delta < 0 => Direction::Down,
        None => Direction::Up,
    };

    let cooldown_seconds = u32_prop(node, "cooldown", &format!("{}.cooldownSeconds", field), issues)
        .unwrap_or(DEFAULT_POLICY_COOLDOWN);

    Some(ScalingPolicySpec {
        name,
        direction,
        capacity_delta,
        cooldown_seconds,
    })
}
