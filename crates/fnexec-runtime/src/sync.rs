//! Artifact synchronizer - pull bundles into the cache, expand them into a slot.

use crate::extract::{extract_archive, ArchiveKind};
use crate::transfer::Transfer;
use fnexec_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct Synchronizer {
    transfer: Arc<dyn Transfer>,
    source: String,
    cache_dir: PathBuf,
}

impl Synchronizer {
    pub fn new(transfer: Arc<dyn Transfer>, source: impl Into<String>, cache_dir: impl AsRef<Path>) -> Self {
        Self {
            transfer,
            source: source.into(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Pull every artifact from the source into the cache, then extract each
    /// archive found there into `target`. Returns the extracted archive names.
    ///
    /// Any transfer or extraction error aborts the cycle.
    pub async fn sync_and_extract(&self, target: &Path) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        self.transfer
            .sync(&self.source, &self.cache_dir.display().to_string())
            .await?;

        let cache_dir = self.cache_dir.clone();
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || extract_cache(&cache_dir, &target))
            .await
            .map_err(|e| Error::Internal(format!("extraction task failed: {}", e)))?
    }
}

fn extract_cache(cache_dir: &Path, target: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(cache_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    let mut extracted = Vec::new();
    for name in names {
        info!("Found function artifact {}", name);
        let Some(kind) = ArchiveKind::detect(&name) else {
            continue;
        };
        extract_archive(&cache_dir.join(&name), kind, target)?;
        info!(" ^ Extracted {} into {}", name, target.display());
        extracted.push(name);
    }
    Ok(extracted)
}
