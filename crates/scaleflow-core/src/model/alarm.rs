//! Metric alarm model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dimension key that scopes a metric to one scaling group
pub const SCALING_GROUP_DIMENSION: &str = "AutoScalingGroupName";

/// Threshold alarm bound to a scaling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSpec {
    pub name: String,
    pub metric_namespace: String,
    pub metric_name: String,
    pub statistic: Statistic,
    pub comparator: Comparator,
    pub threshold: f64,
    pub period_seconds: u32,
    pub evaluation_periods: u32,
    /// Name of the scaling policy fired when the alarm trips
    pub bound_policy: String,
    pub dimensions: BTreeMap<String, String>,
}

impl AlarmSpec {
    /// Human-readable condition, e.g. `Average(CPUUtilization) > 70`
    pub fn condition(&self) -> String {
        format!(
            "{}({}) {} {}",
            self.statistic.provider_name(),
            self.metric_name,
            self.comparator.symbol(),
            self.threshold
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Average,
    Sum,
    Min,
    Max,
}

impl Statistic {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "average" | "avg" => Some(Self::Average),
            "sum" => Some(Self::Sum),
            "min" | "minimum" => Some(Self::Min),
            "max" | "maximum" => Some(Self::Max),
            _ => None,
        }
    }

    /// Name used by the monitoring API
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Sum => "Sum",
            Self::Min => "Minimum",
            Self::Max => "Maximum",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// Closed set of comparison operators accepted by the monitoring API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    /// Accepts both the keyword (`gt`) and the symbolic (`>`) form
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gt" | ">" => Some(Self::Gt),
            "gte" | ">=" => Some(Self::Gte),
            "lt" | "<" => Some(Self::Lt),
            "lte" | "<=" => Some(Self::Lte),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Name used by the monitoring API
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Gt => "GreaterThanThreshold",
            Self::Gte => "GreaterThanOrEqualToThreshold",
            Self::Lt => "LessThanThreshold",
            Self::Lte => "LessThanOrEqualToThreshold",
        }
    }

    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
