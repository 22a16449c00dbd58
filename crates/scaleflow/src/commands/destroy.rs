use crate::utils::{self, Context};
use colored::Colorize;
use scaleflow_cloud::{Reconciler, build_destroy_plan, observe};
use std::path::Path;

pub async fn handle(ctx: &Context, file: Option<&Path>, json: bool) -> anyhow::Result<i32> {
    let (path, topologies) = utils::load_topologies(file)?;
    if !json {
        println!("{}", "Destroying topology...".yellow());
        println!("File: {}", path.display().to_string().cyan());
    }

    let provider = ctx.provider().await?;
    let locks = utils::lock_all(&ctx.state_dir(), &topologies).await?;
    let cancel = utils::cancel_on_ctrl_c();
    let reconciler = Reconciler::new(provider.clone()).with_retry(ctx.retry());

    let mut code = 0;
    let mut output = Vec::with_capacity(topologies.len());
    for topology in &topologies {
        if cancel.is_cancelled() {
            code = code.max(1);
            break;
        }

        let observed = match observe(&*provider, &topology.name).await {
            Ok(observed) => observed,
            Err(e) => {
                code = code.max(2);
                if json {
                    output.push(serde_json::json!({
                        "topology": topology.name,
                        "error": e.to_string(),
                    }));
                } else {
                    eprintln!("{} {}: {}", "✗".red().bold(), topology.name.cyan(), e);
                }
                continue;
            }
        };

        let plan = build_destroy_plan(&observed);
        if plan.is_empty() {
            if json {
                output.push(serde_json::json!({ "topology": topology.name, "plan": plan }));
            } else {
                println!();
                println!(
                    "{} {}: nothing to destroy",
                    "✓".green().bold(),
                    topology.name.cyan()
                );
            }
            continue;
        }

        let result = reconciler.apply_with_cancel(&plan, &cancel).await;
        code = code.max(result.exit_code());
        if json {
            output.push(serde_json::json!({
                "topology": topology.name,
                "plan": plan,
                "result": result,
            }));
        } else {
            utils::print_plan(&plan);
            println!();
            utils::print_result(&result);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    utils::release_all(locks).await?;
    Ok(code)
}
