//! Dated chat capture files.
//!
//! Every inbound/outbound message is appended as one JSON line under
//! `{chats}/{tenant}/{channel}/{thread}/{YYYY-MM-DD}.ndjson` — the storage
//! partition key is the directory prefix, so a tenant's history is one
//! subtree.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ar_domain::error::{Error, Result};

/// One captured chat line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub timestamp: DateTime<Utc>,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl ChatRecord {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            role: role.to_owned(),
            content: content.to_owned(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// Appends chat records under the capture root.
pub struct ChatCapture {
    base_dir: PathBuf,
}

impl ChatCapture {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    fn day_file(&self, storage_partition_key: &str, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(storage_partition_key)
            .join(format!("{}.ndjson", date.format("%Y-%m-%d")))
    }

    /// Append records to today's file for the given partition.
    pub fn append(&self, storage_partition_key: &str, records: &[ChatRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let path = self.day_file(storage_partition_key, Utc::now().date_naive());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).map_err(Error::Io)?;
        Ok(())
    }

    /// Read back one day's records (dashboard / debugging).
    pub fn read_day(
        &self,
        storage_partition_key: &str,
        date: NaiveDate,
    ) -> Result<Vec<ChatRecord>> {
        let path = self.day_file(storage_partition_key, date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut records = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        partition = storage_partition_key,
                        error = %e,
                        "skipping malformed chat record"
                    );
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_user_then_assistant_under_partition_path() {
        let dir = tempfile::tempdir().unwrap();
        let capture = ChatCapture::new(dir.path());

        capture
            .append(
                "default/99001/13",
                &[
                    ChatRecord::new("user", "hello").with_message_id("m1"),
                    ChatRecord::new("assistant", "hi there"),
                ],
            )
            .unwrap();

        let today = Utc::now().date_naive();
        let expected = dir
            .path()
            .join("default/99001/13")
            .join(format!("{}.ndjson", today.format("%Y-%m-%d")));
        assert!(expected.exists());

        let records = capture.read_day("default/99001/13", today).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, "user");
        assert_eq!(records[0].message_id.as_deref(), Some("m1"));
        assert_eq!(records[1].role, "assistant");
    }

    #[test]
    fn append_accumulates_within_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let capture = ChatCapture::new(dir.path());
        capture
            .append("t/c/th", &[ChatRecord::new("user", "one")])
            .unwrap();
        capture
            .append("t/c/th", &[ChatRecord::new("assistant", "two")])
            .unwrap();

        let records = capture.read_day("t/c/th", Utc::now().date_naive()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_day_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let capture = ChatCapture::new(dir.path());
        let records = capture
            .read_day("t/c/th", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn empty_append_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let capture = ChatCapture::new(dir.path());
        capture.append("t/c/th", &[]).unwrap();
        assert!(!dir.path().join("t").exists());
    }
}
