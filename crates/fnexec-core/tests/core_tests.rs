//! Tests for fnexec-core: identifiers, status, payloads, config, errors

use fnexec_core::*;
use std::path::PathBuf;

// ===========================================================================
// FunctionId
// ===========================================================================

#[test]
fn function_id_new_and_display() {
    let id = FunctionId::new("echo-test");
    assert_eq!(id.as_str(), "echo-test");
    assert_eq!(format!("{}", id), "echo-test");
}

#[test]
fn function_id_rejects_path_components() {
    assert!(FunctionId::new("echo-test").is_valid());
    assert!(FunctionId::new("36af611a-832e-40dd-9946-a5dd24b4c0b9").is_valid());
    assert!(!FunctionId::new("").is_valid());
    assert!(!FunctionId::new(".").is_valid());
    assert!(!FunctionId::new("..").is_valid());
    assert!(!FunctionId::new("../etc").is_valid());
    assert!(!FunctionId::new("a/b").is_valid());
    assert!(!FunctionId::new("a\\b").is_valid());
}

#[test]
fn function_id_serializes_as_plain_string() {
    let id = FunctionId::new("f1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"f1\"");
}

// ===========================================================================
// RuntimeId
// ===========================================================================

#[test]
fn runtime_ids_are_unique() {
    use std::collections::HashSet;
    let ids: HashSet<RuntimeId> = (0..1000).map(|_| RuntimeId::new()).collect();
    assert_eq!(ids.len(), 1000);
}

#[test]
fn runtime_id_parses_its_display_form() {
    let id = RuntimeId::new();
    let parsed: RuntimeId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
    assert!("not-a-uuid".parse::<RuntimeId>().is_err());
}

#[test]
fn execution_name_joins_runtime_and_function() {
    let id = RuntimeId::new();
    let name = id.execution_name(&FunctionId::new("echo-test"));
    assert_eq!(name, format!("{}_echo-test", id));
}

// ===========================================================================
// ExecutionStatus
// ===========================================================================

#[test]
fn execution_status_terminality() {
    assert!(!ExecutionStatus::Running.is_terminal());
    assert!(ExecutionStatus::Succeeded.is_terminal());
    assert!(ExecutionStatus::Failed { code: Some(1) }.is_terminal());
    assert!(ExecutionStatus::Succeeded.is_success());
    assert!(!ExecutionStatus::Failed { code: None }.is_success());
}

#[test]
fn execution_status_display() {
    assert_eq!(ExecutionStatus::Succeeded.to_string(), "COMPLETED");
    assert_eq!(
        ExecutionStatus::Failed { code: Some(3) }.to_string(),
        "FAILED, with code 3"
    );
}

#[test]
fn execution_status_json_shape() {
    let v = serde_json::to_value(ExecutionStatus::Failed { code: Some(2) }).unwrap();
    assert_eq!(v["status"], "failed");
    assert_eq!(v["code"], 2);
    let v = serde_json::to_value(ExecutionStatus::Running).unwrap();
    assert_eq!(v["status"], "running");
}

// ===========================================================================
// Payloads
// ===========================================================================

#[test]
fn invoke_request_ignores_extra_fields() {
    let req: InvokeRequest =
        serde_json::from_str(r#"{"uuid": "abc", "session_info": "c2Vzc2lvbg=="}"#).unwrap();
    assert_eq!(req.session_info, "c2Vzc2lvbg==");
}

#[test]
fn invoke_response_shape() {
    let resp = InvokeResponse {
        runtime_id: RuntimeId::new(),
        function_id: FunctionId::new("f"),
        request: InvokeRequest {
            session_info: "s".into(),
        },
    };
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(v["runtime_id"], resp.runtime_id.to_string());
    assert_eq!(v["function_id"], "f");
    assert_eq!(v["request"]["session_info"], "s");
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn gateway_config_defaults() {
    let config = GatewayConfig::default();
    assert_eq!(config.port, 8000);
    assert_eq!(config.bind, BindMode::Lan);
    assert_eq!(config.bind.to_addr(), "0.0.0.0");
    assert_eq!(BindMode::parse("localhost").to_addr(), "127.0.0.1");
}

#[test]
fn runtime_config_loads_partial_toml() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("fnexec.toml");
    std::fs::write(
        &path,
        r#"
run_directory = "/srv/fnexec"
storage_driver = "s3"

[executor]
interpreter = "python3"
"#,
    )
    .unwrap();

    let config = RuntimeConfig::load(&path);
    assert_eq!(config.run_directory, PathBuf::from("/srv/fnexec"));
    assert_eq!(config.storage_driver, StorageDriver::S3);
    assert_eq!(config.executor.interpreter, "python3");
    assert_eq!(config.executor.entry_point, "function.py");
    assert_eq!(config.logs_location, "/tmp/executor_logs");
}

#[test]
fn runtime_config_missing_or_broken_file_uses_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = RuntimeConfig::load(&tmp.path().join("absent.toml"));
    assert_eq!(missing.run_directory, PathBuf::from("/tmp/executor"));

    let broken = tmp.path().join("broken.toml");
    std::fs::write(&broken, "run_directory = [").unwrap();
    let config = RuntimeConfig::load(&broken);
    assert_eq!(config.executor.route_prefix, "python");
}

#[test]
fn runtime_config_toml_roundtrip_keeps_driver() {
    let mut config = RuntimeConfig::default();
    config.storage_driver = StorageDriver::S3;
    let text = config.to_toml().unwrap();
    let back: RuntimeConfig = toml::from_str(&text).unwrap();
    assert_eq!(back.storage_driver, StorageDriver::S3);
}

#[cfg(unix)]
#[test]
fn runtime_config_unserializable_path_is_config_error() {
    use std::os::unix::ffi::OsStrExt;
    let mut config = RuntimeConfig::default();
    config.run_directory = std::path::PathBuf::from(std::ffi::OsStr::from_bytes(b"/tmp/\xff\xfe"));
    let err = config.to_toml().unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_display_messages() {
    let e = Error::FunctionNotFound("echo-test".into());
    assert_eq!(e.to_string(), "Function echo-test not found");
    assert!(e.is_not_found());

    let e = Error::transfer("s3://bucket", "/tmp/cache", "exit status 1");
    assert!(e.to_string().contains("s3://bucket -> /tmp/cache"));
    assert!(!e.is_not_found());

    let e = Error::extraction("f.tar.gz", "bad header");
    assert!(e.to_string().contains("f.tar.gz"));
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let e: Error = io.into();
    assert!(matches!(e, Error::IoError(_)));
}
