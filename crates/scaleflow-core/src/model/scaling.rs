//! Scaling group and scaling policy model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Managed pool of instances kept within `[min_size, max_size]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingGroupSpec {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub cooldown_seconds: u32,
    pub launch_template_ref: String,
    pub load_balancer_refs: BTreeSet<String>,
    pub zones: BTreeSet<String>,
}

/// Capacity adjustment triggered by an alarm.
///
/// The adjustment is always a change in capacity relative to the current size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingPolicySpec {
    pub name: String,
    pub direction: Direction,
    /// Positive for up, negative for down
    pub capacity_delta: i32,
    pub cooldown_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Whether `delta` moves capacity in this direction
    pub fn accepts(&self, delta: i32) -> bool {
        match self {
            Self::Up => delta > 0,
            Self::Down => delta < 0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}
