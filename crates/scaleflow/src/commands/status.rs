use crate::utils::{self, Context};
use colored::Colorize;
use scaleflow_cloud::{ObservedState, RunLock, build_plan, observe_topology};
use std::path::Path;

pub async fn handle(ctx: &Context, file: Option<&Path>) -> anyhow::Result<i32> {
    let (_, topologies) = utils::load_topologies(file)?;
    let provider = ctx.provider().await?;
    let state_dir = ctx.state_dir();

    let mut code = 0;
    for topology in &topologies {
        println!();
        println!("{} {}", "Topology:".bold(), topology.name.cyan());

        if let Some(lock) = RunLock::holder(&state_dir, &topology.name).await? {
            println!(
                "  {} run in progress on {} (pid {}) since {}",
                "⚠".yellow(),
                lock.holder,
                lock.pid,
                lock.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        let observed = match observe_topology(&*provider, topology).await {
            Ok(observed) => observed,
            Err(e) => {
                code = code.max(2);
                println!("  {} {}", "✗".red().bold(), e);
                continue;
            }
        };
        print_resources(&observed);

        match build_plan(topology, &observed) {
            Ok(plan) if plan.is_empty() => println!("  {}", "✓ in sync".green()),
            Ok(plan) => println!("  {} drift: {}", "~".yellow().bold(), plan.summary()),
            Err(e) => {
                code = code.max(2);
                println!("  {} {}", "✗".red().bold(), e);
            }
        }
    }

    Ok(code)
}

fn print_resources(observed: &ObservedState) {
    if observed.is_empty() {
        println!("  {}", "(no resources)".dimmed());
        return;
    }
    for lb in &observed.load_balancers {
        let dns = lb.dns_name.as_deref().unwrap_or("-");
        println!("  {:<16} {} ({})", "load-balancer", lb.spec.name, dns);
    }
    for template in &observed.launch_templates {
        println!(
            "  {:<16} {} ({})",
            "launch-template", template.revision, template.spec.image_id
        );
    }
    for group in &observed.scaling_groups {
        println!(
            "  {:<16} {} (min {}, desired {}, max {})",
            "scaling-group",
            group.spec.name,
            group.spec.min_size,
            group.spec.desired_capacity,
            group.spec.max_size
        );
    }
    for policy in &observed.policies {
        println!(
            "  {:<16} {}/{} ({:+})",
            "scaling-policy", policy.group, policy.spec.name, policy.spec.capacity_delta
        );
    }
    for alarm in &observed.alarms {
        println!(
            "  {:<16} {} ({})",
            "alarm",
            alarm.spec.name,
            alarm.spec.condition()
        );
    }
    for claim in &observed.foreign {
        println!(
            "  {} {} '{}' belongs to topology '{}'",
            "⚠".yellow(),
            claim.kind,
            claim.name,
            claim.owner
        );
    }
}
