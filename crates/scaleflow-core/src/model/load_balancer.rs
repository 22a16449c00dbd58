//! Load balancer model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Load balancer fronting the scaling group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    pub name: String,
    pub listeners: Vec<Listener>,
    pub health_check: HealthCheck,
}

/// Port mapping exposed by the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub external_port: u16,
    pub internal_port: u16,
    pub protocol: Protocol,
}

impl Listener {
    pub fn new(external_port: u16, internal_port: u16, protocol: Protocol) -> Self {
        Self {
            external_port,
            internal_port,
            protocol,
        }
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}->{}",
            self.protocol, self.external_port, self.internal_port
        )
    }
}

/// Listener protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Http,
}

impl Protocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "http" => Some(Self::Http),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance health check performed by the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub target_port: u16,
    pub interval_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub timeout_seconds: u32,
}

impl HealthCheck {
    /// Provider-facing target string, e.g. `TCP:80`
    pub fn target(&self) -> String {
        format!("TCP:{}", self.target_port)
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            target_port: 80,
            interval_seconds: 30,
            healthy_threshold: 3,
            unhealthy_threshold: 5,
            timeout_seconds: 2,
        }
    }
}
