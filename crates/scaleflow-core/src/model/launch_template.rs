//! Launch template model

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// How the scaling group starts a new instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchTemplateSpec {
    pub name: String,
    pub image_id: String,
    pub instance_type: String,
    /// Key pair used to log into the instance
    pub credential_ref: String,
    pub security_groups: BTreeSet<String>,
    pub volumes: Vec<Volume>,
}

impl LaunchTemplateSpec {
    /// Provider-side name of this exact template content.
    ///
    /// Launch templates cannot be modified once created, so every distinct
    /// content gets its own name: `{name}-{first 8 hex chars}` of the sha256
    /// of the spec's JSON form.
    pub fn revision_name(&self) -> String {
        // field order and the sorted security groups make this JSON canonical;
        // plain string/number structs always serialize
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = hex::encode(Sha256::digest(&canonical));
        format!("{}-{}", self.name, &digest[..8])
    }
}

/// Block device attached to each instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub device_name: String,
    pub kind: VolumeKind,
}

impl Volume {
    pub fn ephemeral(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            kind: VolumeKind::Ephemeral,
        }
    }

    pub fn persistent(device_name: impl Into<String>, size_gib: u32) -> Self {
        Self {
            device_name: device_name.into(),
            kind: VolumeKind::Persistent { size_gib },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    /// Instance store, lost on termination
    Ephemeral,
    Persistent {
        #[serde(rename = "sizeGiB")]
        size_gib: u32,
    },
}
