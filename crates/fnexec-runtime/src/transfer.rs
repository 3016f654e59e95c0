//! Transfer strategies - pluggable backend for pulling bundles and pushing logs.
//!
//! The synchronizer and the log archiver only see `Transfer`. Which backend
//! runs is decided once, from `StorageDriver`, at start-up.

use fnexec_core::{Error, Result, StorageDriver};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

/// Opaque, possibly slow, possibly failing storage operations.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Recursively mirror `source` into `destination`. Idempotent.
    async fn sync(&self, source: &str, destination: &str) -> Result<()>;

    /// Copy a single file or tree from `source` to `destination`.
    async fn copy(&self, source: &str, destination: &str) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Build the transfer backend selected by configuration.
pub fn create_transfer(driver: StorageDriver) -> Arc<dyn Transfer> {
    match driver {
        StorageDriver::Local => Arc::new(LocalTransfer),
        StorageDriver::S3 => Arc::new(S3Transfer::new()),
    }
}

/// Plain filesystem copies.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalTransfer;

#[async_trait::async_trait]
impl Transfer for LocalTransfer {
    async fn sync(&self, source: &str, destination: &str) -> Result<()> {
        let (src, dst) = (source.to_string(), destination.to_string());
        run_blocking(source, destination, move || {
            let src = Path::new(&src);
            if !src.is_dir() {
                return Err(Error::transfer(
                    src.display().to_string(),
                    dst.clone(),
                    "source is not a directory",
                ));
            }
            copy_tree(src, Path::new(&dst))
        })
        .await
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        let (src, dst) = (source.to_string(), destination.to_string());
        run_blocking(source, destination, move || {
            let (src, dst) = (Path::new(&src), Path::new(&dst));
            if src.is_dir() {
                copy_tree(src, dst)
            } else {
                if let Some(parent) = dst.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(src, dst)?;
                Ok(())
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "local"
    }
}

async fn run_blocking<F>(source: &str, destination: &str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    debug!("transfer {} -> {}", source, destination);
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(Error::IoError(e))) => Err(Error::transfer(source, destination, e.to_string())),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(Error::Internal(format!("transfer task failed: {}", e))),
    }
}

/// Copy the contents of `src` into `dst`, creating `dst` and every
/// intermediate directory. Existing files are overwritten. Symlinks below
/// `src` are recreated as symlinks, never followed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_symlink() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            copy_link(entry.path(), &target)?;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Recreate the link at `src` as `dst`, replacing whatever `dst` holds.
#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> Result<()> {
    let link = std::fs::read_link(src)?;
    match std::fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(dst)?,
        Ok(_) => std::fs::remove_file(dst)?,
        Err(_) => {}
    }
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Object store backend, delegating to the `aws` CLI.
#[derive(Clone, Debug)]
pub struct S3Transfer {
    program: String,
}

impl Default for S3Transfer {
    fn default() -> Self {
        Self::new()
    }
}

impl S3Transfer {
    pub fn new() -> Self {
        Self {
            program: "aws".to_string(),
        }
    }

    /// Use a different executable than `aws` (e.g. a wrapper script).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, verb: &str, source: &str, destination: &str) -> Result<()> {
        debug!("{} s3 {} {} {}", self.program, verb, source, destination);
        let output = Command::new(&self.program)
            .args(["s3", verb, source, destination])
            .output()
            .await
            .map_err(|e| Error::transfer(source, destination, format!("failed to execute: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::transfer(
                source,
                destination,
                format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

#[async_trait::async_trait]
impl Transfer for S3Transfer {
    async fn sync(&self, source: &str, destination: &str) -> Result<()> {
        self.run("sync", source, destination).await
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        self.run("cp", source, destination).await
    }

    fn name(&self) -> &str {
        "s3"
    }
}
