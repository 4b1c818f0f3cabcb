use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

const RELOAD_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// File-backed allow list of base mints the bot is permitted to buy.
/// One address per line; reloaded from disk every five minutes.
pub struct SnipeListCache {
    path: PathBuf,
    entries: Arc<RwLock<HashSet<String>>>,
}

impl SnipeListCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Read the backing file (creating it empty when missing) and start the
    /// periodic reload task.
    pub async fn init(&self) -> Result<()> {
        let initial = load_set(&self.path).await?;
        info!("Snipe list loaded: {} entries", initial.len());
        *self.entries.write().unwrap() = initial;

        let path = self.path.clone();
        let entries = self.entries.clone();
        tokio::spawn(async move {
            loop {
                sleep(RELOAD_INTERVAL).await;
                match load_set(&path).await {
                    Ok(fresh) => {
                        debug!("Snipe list reloaded: {} entries", fresh.len());
                        *entries.write().unwrap() = fresh;
                    }
                    Err(e) => error!("Snipe list reload failed: {:?}", e),
                }
            }
        });

        Ok(())
    }

    pub fn is_in_list(&self, address: &str) -> bool {
        self.entries.read().unwrap().contains(address)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

async fn load_set(path: &Path) -> Result<HashSet<String>> {
    if tokio::fs::metadata(path).await.is_err() {
        tokio::fs::write(path, b"")
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        return Ok(HashSet::new());
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipe-list.txt");
        let cache = SnipeListCache::new(&path);
        cache.init().await.unwrap();
        assert!(path.exists());
        assert!(cache.is_empty());
        assert!(!cache.is_in_list("M1"));
    }

    #[tokio::test]
    async fn test_init_loads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipe-list.txt");
        std::fs::write(&path, "M1\n  M2  \n\nM3\n").unwrap();

        let cache = SnipeListCache::new(&path);
        cache.init().await.unwrap();
        assert!(cache.is_in_list("M1"));
        assert!(cache.is_in_list("M2"));
        assert!(cache.is_in_list("M3"));
        assert!(!cache.is_in_list("M4"));
    }

    #[tokio::test]
    async fn test_reload_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snipe-list.txt");
        std::fs::write(&path, "M1\n").unwrap();

        let cache = SnipeListCache::new(&path);
        cache.init().await.unwrap();
        assert!(cache.is_in_list("M1"));

        std::fs::write(&path, "M2\n").unwrap();
        let fresh = load_set(&path).await.unwrap();
        *cache.entries.write().unwrap() = fresh;
        assert!(!cache.is_in_list("M1"));
        assert!(cache.is_in_list("M2"));
    }
}
