//! Execution engine - one isolated, logged subprocess run per invocation
//!
//! Within one execution the order is fixed: copy code, launch the entry
//! point, delete `code/`, archive `output.log`, unregister. Executions never
//! share a working directory and never wait on each other.

use crate::archive::LogArchiver;
use crate::process::{CommandSpec, ProcessRunner};
use crate::registry::{ExecutionHandle, ExecutionRegistry, Registration};
use crate::slots::SlotManager;
use crate::transfer::copy_tree;
use fnexec_core::{Error, ExecutionStatus, ExecutorConfig, FunctionId, Result, RuntimeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const CODE_DIR: &str = "code";
pub const OUTPUT_LOG: &str = "output.log";

/// How a function's entry point is launched.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    pub interpreter: String,
    /// File inside the bundle, e.g. `function.py`.
    pub script: String,
    /// Environment variable receiving the session context.
    pub session_env: String,
}

impl From<&ExecutorConfig> for EntryPoint {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: config.entry_point.clone(),
            session_env: config.session_env.clone(),
        }
    }
}

/// Final word on one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub runtime_id: RuntimeId,
    pub function_id: FunctionId,
    pub status: ExecutionStatus,
    /// `None` when archival failed or there was no log to archive.
    pub archive_location: Option<String>,
}

/// An accepted invocation. Dropping `task` detaches the execution.
pub struct Invocation {
    pub runtime_id: RuntimeId,
    pub function_id: FunctionId,
    pub session_context: String,
    pub handle: Arc<ExecutionHandle>,
    pub task: JoinHandle<ExecutionReport>,
}

pub struct ExecutionEngine {
    slots: Arc<SlotManager>,
    registry: Arc<ExecutionRegistry>,
    runner: Arc<dyn ProcessRunner>,
    archiver: Arc<LogArchiver>,
    executions_dir: PathBuf,
    entry: EntryPoint,
    prune: bool,
}

impl ExecutionEngine {
    pub fn new(
        slots: Arc<SlotManager>,
        registry: Arc<ExecutionRegistry>,
        runner: Arc<dyn ProcessRunner>,
        archiver: Arc<LogArchiver>,
        executions_dir: impl AsRef<Path>,
        entry: EntryPoint,
    ) -> Self {
        Self {
            slots,
            registry,
            runner,
            archiver,
            executions_dir: executions_dir.as_ref().to_path_buf(),
            entry,
            prune: false,
        }
    }

    /// Remove the whole execution directory after its log is archived.
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn executions_dir(&self) -> &Path {
        &self.executions_dir
    }

    /// Accept an invocation and start it in the background.
    ///
    /// Fails with `FunctionNotFound` before anything is created or registered
    /// when the function is absent from the active slot. Must be called from
    /// within a tokio runtime.
    pub fn invoke(&self, function_id: FunctionId, session_context: String) -> Result<Invocation> {
        let function_location = self.slots.resolve(&function_id)?;

        let runtime_id = RuntimeId::new();
        let working_directory = self
            .executions_dir
            .join(runtime_id.execution_name(&function_id));
        let handle = Arc::new(ExecutionHandle::new(
            runtime_id,
            function_id.clone(),
            function_location,
            working_directory,
        ));
        let registration = self.registry.register_guarded(handle.clone())?;

        let job = Job {
            handle: handle.clone(),
            session_context: session_context.clone(),
            runner: self.runner.clone(),
            archiver: self.archiver.clone(),
            entry: self.entry.clone(),
            prune: self.prune,
        };
        let task = tokio::spawn(job.run(registration));

        Ok(Invocation {
            runtime_id,
            function_id,
            session_context,
            handle,
            task,
        })
    }
}

struct Job {
    handle: Arc<ExecutionHandle>,
    session_context: String,
    runner: Arc<dyn ProcessRunner>,
    archiver: Arc<LogArchiver>,
    entry: EntryPoint,
    prune: bool,
}

impl Job {
    async fn run(self, registration: Registration) -> ExecutionReport {
        let runtime_id = self.handle.runtime_id;
        let function_id = self.handle.function_id.clone();
        let exec_dir = self.handle.working_directory.clone();
        let code_dir = exec_dir.join(CODE_DIR);
        let log_path = exec_dir.join(OUTPUT_LOG);

        let status = match self.prepare(&code_dir, &log_path).await {
            Ok(()) => {
                info!(
                    "({}): Starting {}, created from {}",
                    runtime_id,
                    exec_dir.display(),
                    self.handle.function_location.display()
                );
                self.launch(&exec_dir, &log_path).await
            }
            Err(e) => {
                error!("({}): Could not create function context: {}", runtime_id, e);
                append_log(&log_path, &format!("could not create function context: {}", e)).await;
                ExecutionStatus::Failed { code: None }
            }
        };

        // Runs on every path above; only output.log survives.
        if let Err(e) = tokio::fs::remove_dir_all(&code_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("({}): Failed to remove {}: {}", runtime_id, code_dir.display(), e);
            }
        }

        self.handle.set_status(status);
        if status.is_success() {
            info!("({}): Function {} {}", runtime_id, function_id, status);
        } else {
            warn!("({}): Function {} {}", runtime_id, function_id, status);
        }

        let archive_location = self.archive(&exec_dir, &log_path).await;

        registration.release();
        ExecutionReport {
            runtime_id,
            function_id,
            status,
            archive_location,
        }
    }

    /// Create the execution directory, its log file and a private copy of
    /// the function code. The copy completes before this returns.
    async fn prepare(&self, code_dir: &Path, log_path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(code_dir).await?;
        tokio::fs::File::create(log_path).await?;

        let source = self.handle.function_location.clone();
        let target = code_dir.to_path_buf();
        tokio::task::spawn_blocking(move || copy_tree(&source, &target))
            .await
            .map_err(|e| Error::Internal(format!("copy task failed: {}", e)))?
    }

    async fn launch(&self, exec_dir: &Path, log_path: &Path) -> ExecutionStatus {
        let runtime_id = self.handle.runtime_id;
        let spec = CommandSpec {
            program: self.entry.interpreter.clone(),
            args: vec![Path::new(CODE_DIR)
                .join(&self.entry.script)
                .display()
                .to_string()],
            cwd: exec_dir.to_path_buf(),
            env: vec![(self.entry.session_env.clone(), self.session_context.clone())],
            label: runtime_id.to_string(),
        };

        match self.runner.run(&spec, log_path).await {
            Ok(outcome) if outcome.success() => ExecutionStatus::Succeeded,
            Ok(outcome) => ExecutionStatus::Failed { code: outcome.code },
            Err(e) => {
                error!("({}): Entry point could not be run: {}", runtime_id, e);
                append_log(log_path, &format!("entry point could not be run: {}", e)).await;
                ExecutionStatus::Failed { code: None }
            }
        }
    }

    async fn archive(&self, exec_dir: &Path, log_path: &Path) -> Option<String> {
        let runtime_id = self.handle.runtime_id;
        if !log_path.exists() {
            warn!("({}): No log at {}, nothing to archive", runtime_id, log_path.display());
            return None;
        }

        match self
            .archiver
            .archive(&runtime_id, &self.handle.function_id, log_path)
            .await
        {
            Ok(destination) => {
                if self.prune {
                    if let Err(e) = tokio::fs::remove_dir_all(exec_dir).await {
                        warn!("({}): Failed to prune {}: {}", runtime_id, exec_dir.display(), e);
                    }
                }
                Some(destination)
            }
            Err(e) => {
                error!("({}): Failed to archive log: {}", runtime_id, e);
                None
            }
        }
    }
}

/// Best-effort note from the runtime itself into an execution's log.
async fn append_log(log_path: &Path, message: &str) {
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await;
    if let Ok(mut file) = file {
        let _ = file
            .write_all(format!("[fnexec] {}\n", message).as_bytes())
            .await;
    }
}
