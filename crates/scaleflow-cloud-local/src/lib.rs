//! Local provider for ScaleFlow
//!
//! This crate implements the ProviderClient trait against a file-backed
//! inventory, so topologies can be planned, applied and destroyed without
//! a cloud account.
//!
//! # Features
//!
//! - Ownership tags per resource (the topology that created it)
//! - Idempotent create-or-get for every resource kind
//! - Dependency checks (a group needs its template, an alarm its policy)
//! - Inventory persisted to `<state_dir>/inventory.json`, shared safely
//!   between processes
//!
//! # Example
//!
//! ```ignore
//! use scaleflow_cloud::{ReconcileOptions, reconcile};
//! use scaleflow_cloud_local::LocalProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(LocalProvider::open(".scaleflow", "eu-west-1").await?);
//! let topology = scaleflow_core::load_topology("scaleflow.kdl")?;
//!
//! let run = reconcile(provider, &topology, &ReconcileOptions::default()).await?;
//! println!("{}", run.plan.summary());
//! ```

pub mod error;
pub mod inventory;
pub mod provider;
pub mod state;

pub use error::{Result, StateError};
pub use inventory::{Inventory, INVENTORY_VERSION};
pub use provider::LocalProvider;
pub use state::{InventoryLock, StateManager};
