use crate::utils::{self, Context};
use colored::Colorize;
use std::path::Path;

pub async fn handle(ctx: &Context, file: Option<&Path>, json: bool) -> anyhow::Result<i32> {
    let (path, topologies) = utils::load_topologies(file)?;
    if !json {
        println!("{}", "Applying topology...".blue());
        println!("File: {}", path.display().to_string().cyan());
    }

    let provider = ctx.provider().await?;
    let locks = utils::lock_all(&ctx.state_dir(), &topologies).await?;
    let options = ctx.options(utils::cancel_on_ctrl_c(), false);
    let runs = scaleflow_cloud::reconcile_many(provider, topologies, &options).await?;

    let mut code = 0;
    let mut output = Vec::with_capacity(runs.len());
    for (name, run) in runs {
        match run {
            Ok(run) => {
                code = code.max(run.exit_code());
                if json {
                    output.push(serde_json::json!({
                        "topology": name,
                        "plan": run.plan,
                        "result": run.result,
                    }));
                } else {
                    utils::print_plan(&run.plan);
                    if let Some(result) = &run.result
                        && !run.plan.is_empty()
                    {
                        println!();
                        utils::print_result(result);
                    }
                }
            }
            Err(e) => {
                code = code.max(e.exit_code());
                if json {
                    output.push(serde_json::json!({ "topology": name, "error": e.to_string() }));
                } else {
                    utils::print_topology_error(&name, &e);
                }
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    utils::release_all(locks).await?;
    Ok(code)
}
