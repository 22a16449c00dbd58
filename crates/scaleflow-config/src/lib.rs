pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_REGION: &str = "eu-west-1";
const STATE_DIR: &str = ".scaleflow";

/// Which provider backend the CLI talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// File-backed provider simulation under the state directory
    #[default]
    Local,
}

/// Everything the provider client needs at construction time.
///
/// Replaces process-wide region/proxy/credential globals: one value is built
/// per process and handed to the provider constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Where local state (inventory, run locks) lives; defaults to `./.scaleflow`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            region: default_region(),
            proxy: None,
            state_dir: None,
            retry: RetrySettings::default(),
        }
    }
}

impl ProviderConfig {
    /// State directory, falling back to `.scaleflow` under `base`
    pub fn resolve_state_dir(&self, base: &Path) -> PathBuf {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.join(STATE_DIR),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// HTTP proxy used to reach the provider endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Backoff settings for transient provider failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

/// ScaleFlow's global configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("scaleflow");

    Ok(config_dir)
}

/// Locate the provider configuration file, if any.
///
/// Lookup order:
/// 1. `SCALEFLOW_CONFIG` (direct path)
/// 2. current directory: `scaleflow.yaml`
/// 3. `./.scaleflow/config.yaml`
/// 4. `~/.config/scaleflow/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var("SCALEFLOW_CONFIG") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "SCALEFLOW_CONFIG points at {} which does not exist",
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for candidate in [
        current_dir.join("scaleflow.yaml"),
        current_dir.join(STATE_DIR).join("config.yaml"),
    ] {
        if candidate.exists() {
            return Ok(Some(candidate));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Parse a configuration file
pub fn load_config_from(path: &Path) -> Result<ProviderConfig> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the configuration from the first file found (or defaults), then
/// apply `SCALEFLOW_REGION` / `SCALEFLOW_STATE_DIR` overrides
pub fn load_config() -> Result<ProviderConfig> {
    let mut config = match find_config_file()? {
        Some(path) => {
            tracing::debug!("Loading provider configuration from {}", path.display());
            load_config_from(&path)?
        }
        None => ProviderConfig::default(),
    };

    if let Ok(region) = std::env::var("SCALEFLOW_REGION")
        && !region.is_empty()
    {
        config.region = region;
    }
    if let Ok(state_dir) = std::env::var("SCALEFLOW_STATE_DIR")
        && !state_dir.is_empty()
    {
        config.state_dir = Some(PathBuf::from(state_dir));
    }

    Ok(config)
}

/// Locate the project's topology file.
///
/// Lookup order:
/// 1. `SCALEFLOW_TOPOLOGY` (direct path)
/// 2. current directory: `topology.local.kdl`, `topology.kdl`
/// 3. `./.scaleflow/`: same order
pub fn find_topology_file() -> Result<PathBuf> {
    if let Ok(topology_path) = std::env::var("SCALEFLOW_TOPOLOGY") {
        let path = PathBuf::from(topology_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let candidates = ["topology.local.kdl", "topology.kdl"];

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let state_dir = current_dir.join(STATE_DIR);
    if state_dir.is_dir() {
        for filename in &candidates {
            let path = state_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(ConfigError::TopologyFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.resolve_state_dir(Path::new("/work")),
            PathBuf::from("/work/.scaleflow")
        );
    }

    #[test]
    fn test_load_config_from_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scaleflow.yaml");
        fs::write(
            &path,
            "region: us-east-1\nproxy:\n  host: proxy.internal\n  port: 3128\nretry:\n  max_attempts: 3\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(
            config.proxy.as_ref().map(|p| p.url()),
            Some("http://proxy.internal:3128".to_string())
        );
        assert_eq!(config.retry.max_attempts, 3);
        // unspecified retry fields keep their defaults
        assert_eq!(config.retry.base_delay_ms, 1_000);
    }

    #[test]
    fn test_load_config_rejects_unknown_provider() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scaleflow.yaml");
        fs::write(&path, "provider: gcp\n").unwrap();

        let result = load_config_from(&path);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "region: us-east-1\n").unwrap();

        temp_env::with_vars(
            [
                ("SCALEFLOW_CONFIG", Some(path.to_str().unwrap())),
                ("SCALEFLOW_REGION", Some("ap-northeast-1")),
                ("SCALEFLOW_STATE_DIR", Some("/tmp/scaleflow-state")),
            ],
            || {
                let config = load_config().unwrap();
                assert_eq!(config.region, "ap-northeast-1");
                assert_eq!(
                    config.state_dir,
                    Some(PathBuf::from("/tmp/scaleflow-state"))
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_find_topology_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("topology.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("topology.local.kdl"), "// local").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("SCALEFLOW_TOPOLOGY", find_topology_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("topology.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_topology_file_in_state_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let state_dir = temp_dir.path().join(".scaleflow");
        fs::create_dir(&state_dir).unwrap();
        fs::write(state_dir.join("topology.kdl"), "// in state dir").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("SCALEFLOW_TOPOLOGY", find_topology_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".scaleflow/topology.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_topology_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.kdl");
        fs::write(&path, "// custom").unwrap();

        let result = temp_env::with_var("SCALEFLOW_TOPOLOGY", Some(path.to_str().unwrap()), || {
            find_topology_file()
        });
        assert_eq!(result.unwrap(), path);
    }

    #[test]
    #[serial]
    fn test_find_topology_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("SCALEFLOW_TOPOLOGY", find_topology_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(matches!(result, Err(ConfigError::TopologyFileNotFound)));
    }
}
