use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const RELOAD_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// File-backed deny list of base mints the bot must never buy. Lines are
/// either `ADDRESS` or `ADDRESS,<json-string-note>`; additions at runtime are
/// appended to the file so they survive a restart.
pub struct AvoidListCache {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, Option<String>>>>,
}

impl AvoidListCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn init(&self) -> Result<()> {
        let initial = load_map(&self.path).await?;
        info!("Avoid list loaded: {} entries", initial.len());
        *self.entries.write().unwrap() = initial;

        let path = self.path.clone();
        let entries = self.entries.clone();
        tokio::spawn(async move {
            loop {
                sleep(RELOAD_INTERVAL).await;
                match load_map(&path).await {
                    Ok(fresh) => {
                        debug!("Avoid list reloaded: {} entries", fresh.len());
                        *entries.write().unwrap() = fresh;
                    }
                    Err(e) => error!("Avoid list reload failed: {:?}", e),
                }
            }
        });

        Ok(())
    }

    pub fn is_in_list(&self, address: &str) -> bool {
        self.entries.read().unwrap().contains_key(address)
    }

    /// Append an address (with an optional note) to the file and the
    /// in-memory set. Duplicates are ignored with a warning.
    pub async fn add(&self, address: &str, note: Option<&str>) -> Result<()> {
        if self.is_in_list(address) {
            warn!(mint = address, "Already on the avoid list");
            return Ok(());
        }

        let line = match note {
            Some(text) => format!("{},{}\n", address, serde_json::to_string(text)?),
            None => format!("{}\n", address),
        };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;

        self.entries
            .write()
            .unwrap()
            .insert(address.to_string(), note.map(String::from));
        info!(mint = address, "Added to avoid list");
        Ok(())
    }
}

async fn load_map(path: &Path) -> Result<HashMap<String, Option<String>>> {
    if tokio::fs::metadata(path).await.is_err() {
        tokio::fs::write(path, b"")
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        return Ok(HashMap::new());
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect())
}

fn parse_line(line: &str) -> (String, Option<String>) {
    match line.split_once(',') {
        Some((address, rest)) => {
            let note = serde_json::from_str::<String>(rest)
                .unwrap_or_else(|_| rest.trim().to_string());
            (address.trim().to_string(), Some(note))
        }
        None => (line.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_persists_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avoid-list.txt");

        let cache = AvoidListCache::new(&path);
        cache.init().await.unwrap();
        cache.add("A", Some("scam")).await.unwrap();

        assert!(cache.is_in_list("A"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A,\"scam\"\n");

        // A restart reading the same file sees the same membership.
        let reloaded = AvoidListCache::new(&path);
        reloaded.init().await.unwrap();
        assert!(reloaded.is_in_list("A"));
        assert_eq!(
            reloaded.entries.read().unwrap().get("A").unwrap().as_deref(),
            Some("scam")
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avoid-list.txt");

        let cache = AvoidListCache::new(&path);
        cache.init().await.unwrap();
        cache.add("A", Some("scam")).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        cache.add("A", None).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_add_without_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avoid-list.txt");

        let cache = AvoidListCache::new(&path);
        cache.init().await.unwrap();
        cache.add("B", None).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "B\n");
        assert!(cache.is_in_list("B"));
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("ADDR"), ("ADDR".to_string(), None));
        assert_eq!(
            parse_line("ADDR,\"rug\""),
            ("ADDR".to_string(), Some("rug".to_string()))
        );
        // Non-JSON tails are kept verbatim rather than dropped.
        assert_eq!(
            parse_line("ADDR,plain note"),
            ("ADDR".to_string(), Some("plain note".to_string()))
        );
    }
}
