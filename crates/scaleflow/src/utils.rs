use colored::Colorize;
use scaleflow_cloud::{
    ActionType, CancelToken, Plan, ReconcileError, ReconcileOptions, ReconciliationResult,
    RetryConfig, RunLock, RunOutcome,
};
use scaleflow_cloud_local::LocalProvider;
use scaleflow_config::{ProviderConfig, ProviderKind};
use scaleflow_core::{Topology, TopologyError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Provider configuration plus the directory relative paths resolve against
pub struct Context {
    pub config: ProviderConfig,
    pub base_dir: PathBuf,
}

impl Context {
    pub fn load(state_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = scaleflow_config::load_config()?;
        if let Some(dir) = state_dir {
            config.state_dir = Some(dir);
        }
        Ok(Self {
            config,
            base_dir: std::env::current_dir()?,
        })
    }

    pub fn state_dir(&self) -> PathBuf {
        self.config.resolve_state_dir(&self.base_dir)
    }

    pub async fn provider(&self) -> anyhow::Result<Arc<LocalProvider>> {
        match self.config.provider {
            ProviderKind::Local => {
                let provider = LocalProvider::from_config(&self.config, &self.base_dir).await?;
                tracing::debug!(
                    region = provider.region(),
                    state_dir = %self.state_dir().display(),
                    "Using local provider"
                );
                Ok(Arc::new(provider))
            }
        }
    }

    pub fn retry(&self) -> RetryConfig {
        let settings = &self.config.retry;
        RetryConfig::new(
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.max_attempts,
        )
    }

    pub fn options(&self, cancel: CancelToken, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            retry: self.retry(),
            cancel,
            dry_run,
        }
    }
}

/// `-f` if given, otherwise the discovered topology file
pub fn resolve_topology_file(file: Option<&Path>) -> anyhow::Result<PathBuf> {
    match file {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(scaleflow_config::find_topology_file()?),
    }
}

pub fn load_topologies(file: Option<&Path>) -> anyhow::Result<(PathBuf, Vec<Topology>)> {
    let path = resolve_topology_file(file)?;
    let topologies = scaleflow_core::load_topologies(&path)?;
    Ok((path, topologies))
}

/// Map an error that ended the command to the CLI exit convention
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<ReconcileError>() {
        return e.exit_code();
    }
    if let Some(TopologyError::Invalid(_)) = error.downcast_ref::<TopologyError>() {
        return 3;
    }
    2
}

/// Cancel token fired by Ctrl-C; the running action finishes first
pub fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupted, stopping after the current action...".yellow()
            );
            token.cancel();
        }
    });
    cancel
}

/// Take the run lock of every topology, releasing all of them on failure
pub async fn lock_all(state_dir: &Path, topologies: &[Topology]) -> anyhow::Result<Vec<RunLock>> {
    let names: BTreeSet<&str> = topologies.iter().map(|t| t.name.as_str()).collect();
    let mut locks = Vec::with_capacity(names.len());
    for name in names {
        locks.push(RunLock::acquire(state_dir, name).await?);
    }
    Ok(locks)
}

pub async fn release_all(locks: Vec<RunLock>) -> anyhow::Result<()> {
    for lock in locks {
        lock.release().await?;
    }
    Ok(())
}

pub fn print_plan(plan: &Plan) {
    println!();
    println!("{} {}", "Topology:".bold(), plan.topology.cyan());
    if plan.is_empty() {
        println!("  {}", "✓ No changes, resources match the topology".green());
        return;
    }
    for action in &plan.actions {
        let marker = match action.action_type() {
            ActionType::Create => "+".green().bold(),
            ActionType::Update => "~".yellow().bold(),
            ActionType::Delete => "-".red().bold(),
        };
        println!("  {} {}", marker, action.summary());
    }
    println!("  {}", plan.summary().to_string().bold());
}

pub fn print_result(result: &ReconciliationResult) {
    for line in result.summary_lines() {
        println!("  {}", line);
    }
    let status = match result.outcome {
        RunOutcome::Converged => "✓".green().bold(),
        RunOutcome::PartiallyApplied => "⚠".yellow().bold(),
        RunOutcome::Failed => "✗".red().bold(),
    };
    println!("{} {}", status, result);
}

pub fn print_topology_error(name: &str, error: &ReconcileError) {
    eprintln!();
    eprintln!("{} {}", "✗".red().bold(), name.cyan());
    eprintln!("  {}", error);
}
