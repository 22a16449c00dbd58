//! ScaleFlow core
//!
//! Typed model of a scaled service topology (load balancer, launch
//! template, scaling group, scaling policies and alarms), its validation
//! rules, and the KDL document format it is authored in.

pub mod error;
pub mod model;
pub mod parser;
pub mod validate;

pub use error::{Result, TopologyError, ValidationError, ValidationErrors};
pub use model::*;
pub use parser::{parse_topologies_str, parse_topology_file, parse_topology_str};
pub use validate::validate;

use std::path::Path;

/// Read, parse and validate every topology in a file.
///
/// Violations of all topologies are reported together.
pub fn load_topologies<P: AsRef<Path>>(path: P) -> Result<Vec<Topology>> {
    let topologies = parse_topology_file(path)?;
    validate_all(&topologies)?;
    Ok(topologies)
}

/// Read, parse and validate a file holding exactly one topology
pub fn load_topology<P: AsRef<Path>>(path: P) -> Result<Topology> {
    let mut topologies = load_topologies(path)?;
    if topologies.len() != 1 {
        return Err(ValidationError::new(
            "document",
            format!(
                "expected exactly one topology, found {}",
                topologies.len()
            ),
        )
        .into());
    }
    topologies
        .pop()
        .ok_or_else(|| ValidationError::new("document", "no topology node found").into())
}

fn validate_all(topologies: &[Topology]) -> std::result::Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    for topology in topologies {
        if let Err(found) = topology.validate() {
            if topologies.len() == 1 {
                errors.extend(found.into_vec());
            } else {
                errors.extend(found.into_vec().into_iter().map(|e| {
                    ValidationError::new(format!("topology[{}].{}", topology.name, e.field), e.reason)
                }));
            }
        }
    }
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

impl From<ValidationError> for TopologyError {
    fn from(error: ValidationError) -> Self {
        TopologyError::Invalid(error.into())
    }
}
