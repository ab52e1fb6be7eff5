//! Session snapshot files.
//!
//! One JSON file per session key under the sessions directory, with `:`
//! replaced by `_` in filenames. Writes go through a temp file + rename so
//! a reader never observes a half-written snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};

use ar_domain::error::{Error, Result};

use crate::session::SessionData;

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Snapshot file path for a session key.
    pub fn path_for(&self, session_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_key.replace(':', "_")))
    }

    /// Load a snapshot. Read or parse failures are logged and treated as a
    /// miss — the session just starts fresh in memory.
    pub fn load(&self, session_key: &str) -> Option<SessionData> {
        let path = self.path_for(session_key);
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    session_key,
                    path = %path.display(),
                    error = %e,
                    "failed to read session snapshot"
                );
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(
                    session_key,
                    path = %path.display(),
                    error = %e,
                    "malformed session snapshot"
                );
                None
            }
        }
    }

    /// Write a snapshot atomically (temp file in the same directory, then
    /// rename over the target).
    pub fn save(&self, session_key: &str, data: &SessionData) -> Result<()> {
        let path = self.path_for(session_key);
        let json = serde_json::to_string_pretty(data)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(Error::Io)?;
        tmp.write_all(json.as_bytes()).map_err(Error::Io)?;
        tmp.persist(&path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Delete a snapshot. Missing files are fine.
    pub fn delete(&self, session_key: &str) -> Result<()> {
        let path = self.path_for(session_key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Load every snapshot in the directory, keyed by session key.
    ///
    /// The key comes from the payload when present; otherwise the filename
    /// is reverse-mapped (`_` → `:`), which is only ambiguous for ids that
    /// themselves contain underscores.
    pub fn load_all(&self) -> Vec<(String, SessionData)> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot list snapshots");
                return out;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_owned(),
                None => continue,
            };
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping snapshot");
                    continue;
                }
            };
            match serde_json::from_str::<SessionData>(&raw) {
                Ok(data) => {
                    let key = data
                        .session_key
                        .clone()
                        .unwrap_or_else(|| stem.replace('_', ":"));
                    out.push((key, data));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed snapshot");
                }
            }
        }
        out
    }
}
