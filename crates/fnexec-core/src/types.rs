//! Core types for fnexec

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Function identifier (the bundle's directory name) - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(Arc<str>);

impl FunctionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A function id must name exactly one directory entry: no separators,
    /// no relative components.
    pub fn is_valid(&self) -> bool {
        let id = self.as_str();
        !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains('/')
            && !id.contains('\\')
            && !id.contains('\0')
    }
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FunctionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for FunctionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Globally unique identifier of one execution, generated at invocation time.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeId(Uuid);

impl RuntimeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Directory and log-file stem shared by the execution directory and
    /// the archived log: `{runtime_id}_{function_id}`.
    pub fn execution_name(&self, function_id: &FunctionId) -> String {
        format!("{}_{}", self.0, function_id)
    }
}

impl Default for RuntimeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RuntimeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for RuntimeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of an execution
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    /// `code` is the exit code when the process ran; `None` when it could not
    /// be launched or was killed by a signal.
    Failed { code: Option<i32> },
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "COMPLETED"),
            Self::Failed { code: Some(code) } => write!(f, "FAILED, with code {}", code),
            Self::Failed { code: None } => write!(f, "FAILED, with code none"),
        }
    }
}

/// Body of an invocation request. The session info is opaque to the runtime.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvokeRequest {
    pub session_info: String,
}

/// Accepted invocation, returned before the execution finishes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvokeResponse {
    pub runtime_id: RuntimeId,
    pub function_id: FunctionId,
    pub request: InvokeRequest,
}

/// Liveness probe payload
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
}

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Loopback,
    #[default]
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "loopback" | "localhost" | "127.0.0.1" => BindMode::Loopback,
            _ => BindMode::Lan,
        }
    }
}
