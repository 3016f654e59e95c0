//! Function runtime - the boundary the control surface talks to

use crate::archive::LogArchiver;
use crate::engine::{EntryPoint, ExecutionEngine, Invocation};
use crate::process::{CommandRunner, ProcessRunner};
use crate::registry::ExecutionRegistry;
use crate::slots::SlotManager;
use crate::sync::Synchronizer;
use crate::transfer::{create_transfer, Transfer};
use fnexec_core::{
    FunctionId, Health, InvokeRequest, InvokeResponse, Result, RuntimeConfig, RuntimeId,
};
use std::sync::Arc;
use tracing::info;

pub struct FunctionRuntime {
    config: RuntimeConfig,
    slots: Arc<SlotManager>,
    registry: Arc<ExecutionRegistry>,
    engine: ExecutionEngine,
}

impl FunctionRuntime {
    /// Runtime with the transfer backend and process runner the config selects.
    pub fn new(config: RuntimeConfig) -> Self {
        let transfer = create_transfer(config.storage_driver);
        let runner = Arc::new(CommandRunner::new().with_echo(config.executor.echo_output));
        Self::with_components(config, transfer, runner)
    }

    pub fn with_components(
        config: RuntimeConfig,
        transfer: Arc<dyn Transfer>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let synchronizer = Synchronizer::new(
            transfer.clone(),
            config.functions_location.clone(),
            config.cache_dir(),
        );
        let slots = Arc::new(SlotManager::new(config.functions_dir(), synchronizer));
        let registry = Arc::new(ExecutionRegistry::new());
        let archiver = Arc::new(LogArchiver::new(transfer, config.logs_location.clone()));
        let engine = ExecutionEngine::new(
            slots.clone(),
            registry.clone(),
            runner,
            archiver,
            config.executions_dir(),
            EntryPoint::from(&config.executor),
        )
        .with_pruning(config.executor.prune_execution_dirs);

        Self {
            config,
            slots,
            registry,
            engine,
        }
    }

    /// Create the slot, cache and executions directories.
    pub fn initialize(&self) -> Result<()> {
        info!("Initializing directories under {}", self.config.run_directory.display());
        self.slots.initialize()?;
        std::fs::create_dir_all(self.config.cache_dir())?;
        std::fs::create_dir_all(self.config.executions_dir())?;
        Ok(())
    }

    /// Initialize and run the first sync. Must succeed before serving.
    pub async fn start(&self) -> Result<Vec<FunctionId>> {
        self.initialize()?;
        let functions = self.slots.refresh().await?;
        info!("Serving {} functions", functions.len());
        Ok(functions)
    }

    pub fn health(&self) -> Health {
        Health { healthy: true }
    }

    pub fn list_functions(&self) -> Result<Vec<FunctionId>> {
        self.slots.list_functions()
    }

    pub fn list_running_executions(&self) -> Vec<RuntimeId> {
        self.registry.list_ids()
    }

    pub async fn reload(&self) -> Result<Vec<FunctionId>> {
        self.slots.refresh().await
    }

    /// Accept an invocation; the execution runs unsupervised.
    pub fn invoke(&self, function_id: FunctionId, request: InvokeRequest) -> Result<InvokeResponse> {
        let invocation = self.invoke_tracked(function_id, request.session_info.clone())?;
        Ok(InvokeResponse {
            runtime_id: invocation.runtime_id,
            function_id: invocation.function_id,
            request,
        })
    }

    /// Like `invoke`, but hands back the task so callers can await the report.
    pub fn invoke_tracked(&self, function_id: FunctionId, session_context: String) -> Result<Invocation> {
        self.engine.invoke(function_id, session_context)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn slots(&self) -> &Arc<SlotManager> {
        &self.slots
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }
}
