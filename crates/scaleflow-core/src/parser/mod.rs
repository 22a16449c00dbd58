//! KDL parser
//!
//! Parses topology documents. Each resource block is handled by its own
//! module; shape errors are collected instead of aborting at the first one.

mod alarm;
mod launch_template;
mod load_balancer;
mod scaling;

#[cfg(test)]
mod tests;

use alarm::parse_alarm;
use launch_template::parse_launch_template;
use load_balancer::parse_load_balancer;
use scaling::{parse_policy, parse_scaling_group};

use crate::error::{Result, TopologyError, ValidationError, ValidationErrors};
use crate::model::{
    AlarmSpec, LaunchTemplateSpec, LoadBalancerSpec, SCALING_GROUP_DIMENSION, ScalingPolicySpec,
    Topology,
};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Read a KDL file and parse every topology in it
pub fn parse_topology_file<P: AsRef<Path>>(path: P) -> Result<Vec<Topology>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| TopologyError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!("Parsing topology file: {}", path.display());
    Ok(parse_topologies_str(&content)?)
}

/// Parse a document containing exactly one topology
pub fn parse_topology_str(content: &str) -> std::result::Result<Topology, ValidationErrors> {
    let mut topologies = parse_topologies_str(content)?;
    if topologies.len() > 1 {
        return Err(ValidationError::new(
            "document",
            format!(
                "expected exactly one topology, found {}",
                topologies.len()
            ),
        )
        .into());
    }
    topologies.pop().ok_or_else(|| {
        ValidationError::new("document", "no topology node found").into()
    })
}

/// Parse a document containing one or more `topology` nodes
pub fn parse_topologies_str(
    content: &str,
) -> std::result::Result<Vec<Topology>, ValidationErrors> {
    let doc: KdlDocument = content
        .parse()
        .map_err(|e: kdl::KdlError| ValidationError::new("document", e.to_string()))?;

    let mut issues = Issues::default();
    let mut topologies = Vec::new();
    let mut seen = BTreeSet::new();

    for node in doc.nodes() {
        match node.name().value() {
            "topology" => {
                let name = name_arg(node).unwrap_or_default();
                let mut scoped = Issues::default();
                let topology = parse_topology(node, &mut scoped);
                issues.absorb(&name, scoped);
                if !seen.insert(name.clone()) {
                    issues.push(
                        format!("topology[{}]", name),
                        "topology names must be unique within a document",
                    );
                }
                if let Some(topology) = topology {
                    topologies.push(topology);
                }
            }
            other => issues.push(other, format!("unknown top-level node '{}'", other)),
        }
    }

    if let Some(errors) = ValidationErrors::from_vec(issues.0) {
        return Err(errors);
    }
    if topologies.is_empty() {
        return Err(ValidationError::new("document", "no topology node found").into());
    }
    Ok(topologies)
}

fn parse_topology(node: &KdlNode, issues: &mut Issues) -> Option<Topology> {
    let name = match name_arg(node) {
        Some(name) => name,
        None => {
            issues.push("name", "topology requires a name");
            String::new()
        }
    };

    let mut regions = BTreeSet::new();
    let mut load_balancer: Option<LoadBalancerSpec> = None;
    let mut launch_template: Option<LaunchTemplateSpec> = None;
    let mut group_node: Option<&KdlNode> = None;
    let mut policies: Vec<ScalingPolicySpec> = Vec::new();
    let mut alarms: Vec<AlarmSpec> = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "regions" | "region" | "zones" => {
                    regions.extend(string_args(child));
                }
                "load-balancer" | "load_balancer" => {
                    if load_balancer.is_some() {
                        issues.push("loadBalancer", "only one load-balancer block is allowed");
                    }
                    load_balancer = parse_load_balancer(child, issues);
                }
                "launch-template" | "launch_template" => {
                    if launch_template.is_some() {
                        issues.push(
                            "launchTemplate",
                            "only one launch-template block is allowed",
                        );
                    }
                    launch_template = parse_launch_template(child, issues);
                }
                "scaling-group" | "scaling_group" => {
                    if group_node.is_some() {
                        issues.push("scalingGroup", "only one scaling-group block is allowed");
                    }
                    // scaling group defaults depend on the other blocks
                    group_node = Some(child);
                }
                "policy" => {
                    let field = format!("policies[{}]", policies.len());
                    if let Some(policy) = parse_policy(child, &field, issues) {
                        policies.push(policy);
                    }
                }
                "alarm" => {
                    let field = format!("alarms[{}]", alarms.len());
                    if let Some(alarm) = parse_alarm(child, &field, issues) {
                        alarms.push(alarm);
                    }
                }
                other => issues.push(other, format!("unknown node '{}'", other)),
            }
        }
    }

    let Some(load_balancer) = load_balancer else {
        issues.push("loadBalancer", "missing load-balancer block");
        return None;
    };
    let Some(launch_template) = launch_template else {
        issues.push("launchTemplate", "missing launch-template block");
        return None;
    };
    let Some(group_node) = group_node else {
        issues.push("scalingGroup", "missing scaling-group block");
        return None;
    };
    let scaling_group = parse_scaling_group(
        group_node,
        &regions,
        &load_balancer.name,
        &launch_template.name,
        issues,
    )?;

    // alarms without explicit dimensions watch the scaling group
    for alarm in &mut alarms {
        if alarm.dimensions.is_empty() {
            alarm.dimensions.insert(
                SCALING_GROUP_DIMENSION.to_string(),
                scaling_group.name.clone(),
            );
        }
    }

    Some(Topology {
        name,
        regions,
        load_balancer,
        launch_template,
        scaling_group,
        policies,
        alarms,
    })
}

/// Shape errors collected while walking the document
#[derive(Default)]
pub(crate) struct Issues(Vec<ValidationError>);

impl Issues {
    pub(crate) fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(ValidationError::new(field, reason));
    }

    /// Merge errors of one topology, prefixing fields with its name
    fn absorb(&mut self, topology: &str, other: Issues) {
        for error in other.0 {
            self.0.push(ValidationError::new(
                format!("topology[{}].{}", topology, error.field),
                error.reason,
            ));
        }
    }
}

/// First positional string argument
pub(crate) fn name_arg(node: &KdlNode) -> Option<String> {
    positional(node)
        .next()
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// All positional string arguments
pub(crate) fn string_args(node: &KdlNode) -> Vec<String> {
    positional(node)
        .filter_map(|v| v.as_string().map(|s| s.to_string()))
        .collect()
}

pub(crate) fn positional(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

pub(crate) fn prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

pub(crate) fn string_prop(node: &KdlNode, key: &str) -> Option<String> {
    prop(node, key)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

pub(crate) fn as_u32(value: &KdlValue) -> Option<u32> {
    value.as_integer().and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn as_u16(value: &KdlValue) -> Option<u16> {
    value.as_integer().and_then(|v| u16::try_from(v).ok())
}

pub(crate) fn as_i32(value: &KdlValue) -> Option<i32> {
    value.as_integer().and_then(|v| i32::try_from(v).ok())
}

/// Integers are accepted where a number is expected
pub(crate) fn as_f64(value: &KdlValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|v| v as f64))
}

/// Read an optional non-negative integer property, recording a type error
pub(crate) fn u32_prop(
    node: &KdlNode,
    key: &str,
    field: &str,
    issues: &mut Issues,
) -> Option<u32> {
    let value = prop(node, key)?;
    let parsed = as_u32(value);
    if parsed.is_none() {
        issues.push(field, format!("expected a non-negative integer, got {}", value));
    }
    parsed
}

/// Read the first positional non-negative integer, recording a type error
pub(crate) fn first_u32(node: &KdlNode, field: &str, issues: &mut Issues) -> Option<u32> {
    let Some(value) = positional(node).next() else {
        issues.push(field, "missing value");
        return None;
    };
    let parsed = as_u32(value);
    if parsed.is_none() {
        issues.push(field, format!("expected a non-negative integer, got {}", value));
    }
    parsed
}
