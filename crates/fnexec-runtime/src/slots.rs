//! Slot manager - double-buffered function directories
//!
//! Two fixed directories (`a` and `b`) alternate between the active and
//! staging roles. A refresh syncs into staging and then flips the role flag;
//! the directories themselves never move. Executions capture the resolved
//! path at invocation time, so a flip never changes code under a running
//! execution.

use crate::sync::Synchronizer;
use fnexec_core::{Error, FunctionId, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }

    pub fn from_index(i: usize) -> Self {
        if i == 0 {
            SlotId::A
        } else {
            SlotId::B
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            SlotId::A => "a",
            SlotId::B => "b",
        }
    }
}

pub struct SlotManager {
    paths: [PathBuf; 2],
    /// Index of the active slot; the only mutable state here.
    active: AtomicU8,
    /// Held for the whole sync + flip cycle.
    refresh_lock: Mutex<()>,
    synchronizer: Synchronizer,
}

impl SlotManager {
    /// Slot `b` starts active so the first refresh fills `a` and promotes it.
    pub fn new(functions_dir: impl AsRef<Path>, synchronizer: Synchronizer) -> Self {
        let root = functions_dir.as_ref();
        Self {
            paths: [
                root.join(SlotId::A.dir_name()),
                root.join(SlotId::B.dir_name()),
            ],
            active: AtomicU8::new(SlotId::B.index() as u8),
            refresh_lock: Mutex::new(()),
            synchronizer,
        }
    }

    /// Create both slot directories (idempotent).
    pub fn initialize(&self) -> Result<()> {
        for path in &self.paths {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    pub fn active(&self) -> SlotId {
        SlotId::from_index(self.active.load(Ordering::Acquire) as usize)
    }

    pub fn staging(&self) -> SlotId {
        self.active().other()
    }

    pub fn path(&self, slot: SlotId) -> &Path {
        &self.paths[slot.index()]
    }

    /// Lock-free snapshot of the active slot's physical path.
    pub fn active_path(&self) -> PathBuf {
        self.path(self.active()).to_path_buf()
    }

    /// Function ids in the active slot, sorted. Only directories count,
    /// links to directories included, matching `resolve`.
    pub fn list_functions(&self) -> Result<Vec<FunctionId>> {
        list_dir(&self.active_path())
    }

    /// Resolve a function to its location in the active slot, once.
    pub fn resolve(&self, function_id: &FunctionId) -> Result<PathBuf> {
        if !function_id.is_valid() {
            return Err(Error::FunctionNotFound(function_id.to_string()));
        }
        let location = self.active_path().join(function_id.as_str());
        if location.is_dir() {
            Ok(location)
        } else {
            Err(Error::FunctionNotFound(function_id.to_string()))
        }
    }

    /// Sync into the staging slot and, on success, make it active.
    ///
    /// Concurrent callers wait for the running cycle and then run their own.
    /// A failed cycle leaves the roles untouched.
    pub async fn refresh(&self) -> Result<Vec<FunctionId>> {
        let _guard = self.refresh_lock.lock().await;

        let staging = self.staging();
        let staging_path = self.path(staging).to_path_buf();
        self.synchronizer.sync_and_extract(&staging_path).await?;

        self.active.store(staging.index() as u8, Ordering::Release);
        info!(
            "Updated functions, setting {} as ACTIVE",
            staging_path.display()
        );

        self.list_functions()
    }
}

fn list_dir(dir: &Path) -> Result<Vec<FunctionId>> {
    let mut ids: Vec<FunctionId> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| FunctionId::new(e.file_name().to_string_lossy().to_string()))
        .collect();
    ids.sort();
    Ok(ids)
}
