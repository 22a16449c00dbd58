//! launch-template node parsing

use super::{Issues, as_u32, name_arg, prop, string_args, string_prop};
use crate::model::{LaunchTemplateSpec, Volume, VolumeKind};
use kdl::KdlNode;
use std::collections::BTreeSet;

/// Parse a `launch-template` node
pub(crate) fn parse_launch_template(
    node: &KdlNode,
    issues: &mut Issues,
) -> Option<LaunchTemplateSpec> {
    let Some(name) = name_arg(node) else {
        issues.push("launchTemplate.name", "launch-template requires a name");
        return None;
    };

    let mut template = LaunchTemplateSpec {
        name,
        image_id: String::new(),
        instance_type: String::new(),
        credential_ref: String::new(),
        security_groups: BTreeSet::new(),
        volumes: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "image" | "image-id" | "image_id" => {
                    template.image_id = name_arg(child).unwrap_or_default();
                }
                "instance-type" | "instance_type" => {
                    template.instance_type = name_arg(child).unwrap_or_default();
                }
                "credential" | "key-name" | "key_name" => {
                    template.credential_ref = name_arg(child).unwrap_or_default();
                }
                // may be repeated; values accumulate
                "security-groups" | "security_groups" | "security-group" => {
                    template.security_groups.extend(string_args(child));
                }
                "volume" => {
                    let field = format!("launchTemplate.volumes[{}]", template.volumes.len());
                    if let Some(volume) = parse_volume(child, &field, issues) {
                        template.volumes.push(volume);
                    }
                }
                other => issues.push(
                    format!("launchTemplate.{}", other),
                    format!("unknown node '{}'", other),
                ),
            }
        }
    }

    Some(template)
}

/// `volume "/dev/sdh" kind="persistent" size=100` or `volume "/dev/sdc" kind="ephemeral"`
fn parse_volume(node: &KdlNode, field: &str, issues: &mut Issues) -> Option<Volume> {
    let Some(device_name) = name_arg(node) else {
        issues.push(format!("{}.deviceName", field), "volume requires a device name");
        return None;
    };

    let size = match prop(node, "size") {
        Some(value) => match as_u32(value) {
            Some(size) => Some(size),
            None => {
                issues.push(
                    format!("{}.sizeGiB", field),
                    format!("expected a size in GiB, got {}", value),
                );
                return None;
            }
        },
        None => None,
    };

    // a size without an explicit kind means a persistent volume
    let kind = string_prop(node, "kind").unwrap_or_else(|| {
        if size.is_some() {
            "persistent".to_string()
        } else {
            "ephemeral".to_string()
        }
    });

    let kind = match (kind.to_lowercase().as_str(), size) {
        ("ephemeral", None) => VolumeKind::Ephemeral,
        ("ephemeral", Some(_)) => {
            issues.push(
                format!("{}.sizeGiB", field),
                "ephemeral volumes take their size from the instance type",
            );
            return None;
        }
        ("persistent", Some(size_gib)) => VolumeKind::Persistent { size_gib },
        ("persistent", None) => {
            issues.push(
                format!("{}.sizeGiB", field),
                "persistent volumes require a size",
            );
            return None;
        }
        (other, _) => {
            issues.push(
                format!("{}.kind", field),
                format!("unknown volume kind '{}' (expected ephemeral or persistent)", other),
            );
            return None;
        }
    };

    Some(Volume { device_name, kind })
}
