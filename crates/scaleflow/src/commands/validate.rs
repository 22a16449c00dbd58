use crate::utils;
use colored::Colorize;
use scaleflow_core::TopologyError;
use std::path::Path;

pub fn handle(file: Option<&Path>) -> anyhow::Result<i32> {
    println!("{}", "Validating topology...".blue());

    let path = utils::resolve_topology_file(file)?;
    println!("File: {}", path.display().to_string().cyan());

    let topologies = match scaleflow_core::load_topologies(&path) {
        Ok(topologies) => topologies,
        Err(TopologyError::Invalid(errors)) => {
            eprintln!();
            eprintln!(
                "{}",
                format!("✗ {} validation error(s)", errors.len()).red().bold()
            );
            for error in errors.iter() {
                eprintln!("  - {}", error);
            }
            return Ok(3);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", "✓ Topology is valid".green().bold());
    println!();
    println!("Summary:");
    for topology in &topologies {
        let group = &topology.scaling_group;
        println!("  {}", topology.name.cyan().bold());
        println!(
            "    load-balancer   {} ({} listener(s), health check {})",
            topology.load_balancer.name,
            topology.load_balancer.listeners.len(),
            topology.load_balancer.health_check.target()
        );
        println!(
            "    launch-template {} ({} on {})",
            topology.launch_template.revision_name(),
            topology.launch_template.image_id,
            topology.launch_template.instance_type
        );
        println!(
            "    scaling-group   {} (min {}, desired {}, max {})",
            group.name, group.min_size, group.desired_capacity, group.max_size
        );
        for policy in &topology.policies {
            println!(
                "    policy          {} ({:+})",
                policy.name, policy.capacity_delta
            );
        }
        for alarm in &topology.alarms {
            println!(
                "    alarm           {} ({} -> {})",
                alarm.name,
                alarm.condition(),
                alarm.bound_policy
            );
        }
    }

    Ok(0)
}
