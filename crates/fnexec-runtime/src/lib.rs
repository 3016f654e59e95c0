//! fnexec Runtime - function lifecycle engine
//!
//! Bundles are synced into a staging slot and promoted atomically; each
//! invocation runs in its own execution directory and its log is archived
//! whatever the outcome.

pub mod archive;
pub mod engine;
pub mod extract;
pub mod process;
pub mod registry;
pub mod runtime;
pub mod slots;
pub mod sync;
pub mod transfer;

pub use archive::LogArchiver;
pub use engine::{EntryPoint, ExecutionEngine, ExecutionReport, Invocation, CODE_DIR, OUTPUT_LOG};
pub use extract::{extract_archive, ArchiveKind};
pub use process::{CommandRunner, CommandSpec, ExitOutcome, ProcessRunner};
pub use registry::{ExecutionHandle, ExecutionRegistry, Registration};
pub use runtime::FunctionRuntime;
pub use slots::{SlotId, SlotManager};
pub use sync::Synchronizer;
pub use transfer::{copy_tree, create_transfer, LocalTransfer, S3Transfer, Transfer};
