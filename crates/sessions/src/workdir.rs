//! Per-thread working directory aliases.
//!
//! Each storage partition resolves to a stable alias path
//! `{thread_workdirs}/{tenant__channel__thread}` pointing at the shared
//! base working directory. Creation is idempotent.

use std::path::{Path, PathBuf};

use ar_domain::error::{Error, Result};
use ar_domain::identity::SessionIdentity;

pub struct WorkdirManager {
    aliases_dir: PathBuf,
    base_dir: PathBuf,
}

impl WorkdirManager {
    pub fn new(aliases_dir: &Path, base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(aliases_dir).map_err(Error::Io)?;
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            aliases_dir: aliases_dir.to_path_buf(),
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Alias directory name for an identity.
    pub fn alias_name(identity: &SessionIdentity) -> String {
        format!(
            "{}__{}__{}",
            identity.tenant_id, identity.channel_id, identity.thread_id
        )
    }

    /// Ensure the alias exists and return its path. Safe to call on every
    /// session creation.
    pub fn ensure_alias(&self, identity: &SessionIdentity) -> Result<PathBuf> {
        let alias = self.aliases_dir.join(Self::alias_name(identity));
        if alias.exists() || alias.symlink_metadata().is_ok() {
            return Ok(alias);
        }

        let target = std::fs::canonicalize(&self.base_dir).map_err(Error::Io)?;

        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &alias).map_err(Error::Io)?;

        #[cfg(not(unix))]
        std::fs::create_dir_all(&alias).map_err(Error::Io)?;

        let _ = target;
        Ok(alias)
    }
}
