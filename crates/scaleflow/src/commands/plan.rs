use crate::utils::{self, Context};
use colored::Colorize;
use scaleflow_cloud::CancelToken;
use std::path::Path;

pub async fn handle(ctx: &Context, file: Option<&Path>, json: bool) -> anyhow::Result<i32> {
    let (path, topologies) = utils::load_topologies(file)?;
    if !json {
        println!("{}", "Planning...".blue());
        println!("File: {}", path.display().to_string().cyan());
    }

    let provider = ctx.provider().await?;
    let options = ctx.options(CancelToken::new(), true);
    let runs = scaleflow_cloud::reconcile_many(provider, topologies, &options).await?;

    let mut code = 0;
    let mut output = Vec::with_capacity(runs.len());
    for (name, run) in runs {
        match run {
            Ok(run) => {
                if json {
                    output.push(serde_json::json!({ "topology": name, "plan": run.plan }));
                } else {
                    utils::print_plan(&run.plan);
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
    Ok(code)
}
