//! Append-only audit log of raw model output and final assessments.
//!
//! One JSON object per line, one file per UTC day:
//! `<directory>/llm_outputs_YYYYMMDD.jsonl`. A failed append is reported to
//! the caller, which logs it and carries on; the assessment is never lost
//! because the log could not be written.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskgate_core::Assessment;

/// Why an audit record could not be persisted.
#[derive(Error, Debug)]
pub enum AuditWriteFailure {
    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
    pub raw_text: String,
    pub final_assessment: Assessment,
}

impl AuditRecord {
    /// Stamp a record with the current time.
    pub fn now(
        transaction_id: impl Into<String>,
        raw_text: impl Into<String>,
        final_assessment: Assessment,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            transaction_id: transaction_id.into(),
            raw_text: raw_text.into(),
            final_assessment,
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditWriteFailure>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _record: &AuditRecord) -> Result<(), AuditWriteFailure> {
        Ok(())
    }
}

/// Writes records to daily JSONL files.
///
/// Each record is serialized to one line and written with a single
/// `write_all` on a file opened in append mode; the mutex keeps concurrent
/// assessments in this process from interleaving lines.
#[derive(Debug)]
pub struct DailyJsonlSink {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl DailyJsonlSink {
    /// The directory is created on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that holds records stamped on `timestamp`'s UTC day.
    pub fn path_for(&self, timestamp: &DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("llm_outputs_{}.jsonl", timestamp.format("%Y%m%d")))
    }
}

impl AuditSink for DailyJsonlSink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditWriteFailure> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();

        fs::create_dir_all(&self.directory)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(&record.timestamp))?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use riskgate_core::{Action, RiskLevel};
    use std::sync::Arc;

    fn record_at(timestamp: DateTime<Utc>, id: &str) -> AuditRecord {
        AuditRecord {
            timestamp,
            transaction_id: id.to_string(),
            raw_text: "{\"risk_level\": \"low\"}\nwith a second line".to_string(),
            final_assessment: Assessment::new(RiskLevel::Low, Action::Approve, 0.2),
        }
    }

    #[test]
    fn test_creates_directory_and_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyJsonlSink::new(dir.path().join("reports/raw_responses"));
        let ts = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();

        sink.append(&record_at(ts, "tx-1")).unwrap();

        let path = dir.path().join("reports/raw_responses/llm_outputs_20250309.jsonl");
        assert_eq!(sink.path_for(&ts), path);
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);

        let parsed: AuditRecord = serde_json::from_str(contents.trim_end()).unwrap();
        assert_eq!(parsed, record_at(ts, "tx-1"));
    }

    #[test]
    fn test_records_are_partitioned_by_utc_day() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyJsonlSink::new(dir.path());

        sink.append(&record_at(Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap(), "a"))
            .unwrap();
        sink.append(&record_at(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 1).unwrap(), "b"))
            .unwrap();

        assert!(dir.path().join("llm_outputs_20250309.jsonl").exists());
        assert!(dir.path().join("llm_outputs_20250310.jsonl").exists());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(DailyJsonlSink::new(dir.path()));
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        sink.append(&record_at(ts, &format!("tx-{worker}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = fs::read_to_string(sink.path_for(&ts)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            let _: AuditRecord = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_unwritable_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();

        let sink = DailyJsonlSink::new(&blocker);
        let result = sink.append(&record_at(Utc::now(), "tx"));

        assert!(matches!(result, Err(AuditWriteFailure::Io(_))));
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        assert!(NullAuditSink.append(&record_at(Utc::now(), "tx")).is_ok());
    }
}
