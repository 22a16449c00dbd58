//! Topology model
//!
//! Declarative description of a scaled service: one load balancer, one
//! launch template, one scaling group, its policies and its alarms.

mod alarm;
mod launch_template;
mod load_balancer;
mod scaling;
mod topology;

// Re-exports
pub use alarm::*;
pub use launch_template::*;
pub use load_balancer::*;
pub use scaling::*;
pub use topology::*;
