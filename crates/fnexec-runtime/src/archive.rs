//! Log archiver - relocate finished execution logs into a date-partitioned tree

use crate::transfer::Transfer;
use chrono::{Datelike, Local, NaiveDate};
use fnexec_core::{FunctionId, Result, RuntimeId};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct LogArchiver {
    transfer: Arc<dyn Transfer>,
    archive_root: String,
}

impl LogArchiver {
    pub fn new(transfer: Arc<dyn Transfer>, archive_root: impl Into<String>) -> Self {
        Self {
            transfer,
            archive_root: archive_root.into(),
        }
    }

    pub fn archive_root(&self) -> &str {
        &self.archive_root
    }

    /// `{root}/{YYYY}/{MM}/{DD}/{runtime_id}_{function_id}.log`
    pub fn archive_location(
        &self,
        runtime_id: &RuntimeId,
        function_id: &FunctionId,
        date: NaiveDate,
    ) -> String {
        format!(
            "{}/{:04}/{:02}/{:02}/{}.log",
            self.archive_root.trim_end_matches('/'),
            date.year(),
            date.month(),
            date.day(),
            runtime_id.execution_name(function_id)
        )
    }

    /// Copy the log to today's partition. Returns the destination.
    pub async fn archive(
        &self,
        runtime_id: &RuntimeId,
        function_id: &FunctionId,
        log_path: &Path,
    ) -> Result<String> {
        self.archive_on(runtime_id, function_id, log_path, Local::now().date_naive())
            .await
    }

    pub async fn archive_on(
        &self,
        runtime_id: &RuntimeId,
        function_id: &FunctionId,
        log_path: &Path,
        date: NaiveDate,
    ) -> Result<String> {
        let destination = self.archive_location(runtime_id, function_id, date);
        self.transfer
            .copy(&log_path.display().to_string(), &destination)
            .await?;
        info!("({}): Archived log to {}", runtime_id, destination);
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::LocalTransfer;

    #[test]
    fn location_is_date_partitioned() {
        let archiver = LogArchiver::new(Arc::new(LocalTransfer), "s3://logs-bucket-stg/");
        let rid = RuntimeId::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let loc = archiver.archive_location(&rid, &FunctionId::new("echo-test"), date);
        assert_eq!(
            loc,
            format!("s3://logs-bucket-stg/2026/03/07/{}_echo-test.log", rid)
        );
    }

    #[tokio::test]
    async fn archive_copies_log_and_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("output.log");
        std::fs::write(&log, "hello abc\n").unwrap();
        let root = tmp.path().join("logs");
        let archiver = LogArchiver::new(Arc::new(LocalTransfer), root.display().to_string());
        let rid = RuntimeId::new();
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let dest = archiver
            .archive_on(&rid, &FunctionId::new("echo-test"), &log, date)
            .await
            .unwrap();

        let expected = root
            .join("2026")
            .join("10")
            .join("17")
            .join(format!("{}_echo-test.log", rid));
        assert_eq!(dest, expected.display().to_string());
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "hello abc\n");
    }
}
