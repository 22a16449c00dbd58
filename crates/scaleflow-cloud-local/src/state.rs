//! Inventory persistence
//!
//! Manages `<state_dir>/inventory.json`, keeping the previous version as
//! `inventory.json.backup`. Writers from several processes serialize on
//! `inventory.lock`; saves go through a temp file and `rename`, so readers
//! never see a partial inventory.

use crate::error::{Result, StateError};
use crate::inventory::{INVENTORY_VERSION, Inventory};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const INVENTORY_FILE: &str = "inventory.json";
const INVENTORY_BACKUP: &str = "inventory.json.backup";
const INVENTORY_TEMP: &str = "inventory.json.tmp";
const INVENTORY_LOCK: &str = "inventory.lock";

const LOCK_POLL: Duration = Duration::from_millis(25);
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
/// A lock file this old belongs to a writer that died mid-update
const LOCK_STALE_AFTER: Duration = Duration::from_secs(120);

/// Exclusive write access to the inventory, released on drop
#[derive(Debug)]
pub struct InventoryLock {
    path: PathBuf,
}

impl Drop for InventoryLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// State manager for reading/writing the inventory file
#[derive(Debug, Clone)]
pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Get the inventory file path
    pub fn inventory_path(&self) -> PathBuf {
        self.state_dir.join(INVENTORY_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(INVENTORY_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(INVENTORY_LOCK)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Wait for exclusive write access to the inventory
    pub async fn lock(&self) -> Result<InventoryLock> {
        self.ensure_state_dir().await?;
        let path = self.lock_path();
        let started = Instant::now();

        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let lock = InventoryLock { path };
                    file.write_all(std::process::id().to_string().as_bytes())
                        .await?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path).await {
                        tracing::warn!("Removing stale inventory lock: {}", path.display());
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(StateError::Busy(path));
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Load the inventory, empty if none was saved yet
    pub async fn load(&self) -> Result<Inventory> {
        let mut path = self.inventory_path();
        if !path.exists() {
            let backup = self.backup_path();
            if !backup.exists() {
                tracing::debug!("Inventory file not found, starting empty");
                return Ok(Inventory::new());
            }
            tracing::warn!(
                "Inventory file missing, recovering from {}",
                backup.display()
            );
            path = backup;
        }

        let content = fs::read_to_string(&path).await?;
        let inventory: Inventory = serde_json::from_str(&content)?;

        if inventory.version > INVENTORY_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: inventory.version,
                supported: INVENTORY_VERSION,
            });
        }

        tracing::debug!(
            "Loaded inventory with {} resources",
            inventory.resource_count()
        );
        Ok(inventory)
    }

    /// Save the inventory; callers writing concurrently hold [`StateManager::lock`]
    pub async fn save(&self, inventory: &Inventory) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.inventory_path();
        let temp = self.state_dir.join(INVENTORY_TEMP);

        let content = serde_json::to_string_pretty(inventory)?;
        fs::write(&temp, content).await?;
        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!(
            "Saved inventory with {} resources",
            inventory.resource_count()
        );
        Ok(())
    }
}

async fn lock_is_stale(path: &Path) -> bool {
    match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified
            .elapsed()
            .map(|age| age >= LOCK_STALE_AFTER)
            .unwrap_or(false),
        Err(_) => false,
    }
}
