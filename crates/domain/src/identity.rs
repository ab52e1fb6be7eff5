//! Canonical session identity — the `(tenant, channel, thread)` triple.
//!
//! Every routing decision downstream of the channel boundary keys off this
//! value object. It has two string encodings, both bijective with the
//! identity itself:
//! - session key `tenant:channel:thread` (in-memory and persistence key)
//! - storage partition key `tenant/channel/thread` (filesystem-safe prefix)

use serde::{Deserialize, Serialize};

use crate::error::{Error, IdentityErrorCode, Result};

/// Separator used by [`SessionIdentity::session_key`].
pub const SESSION_KEY_SEPARATOR: char = ':';

/// Separator used by [`SessionIdentity::storage_partition_key`].
pub const STORAGE_PARTITION_SEPARATOR: char = '/';

/// Characters that may not appear in any identity field. Both key encodings
/// stay parseable only because fields are free of all of these.
const FORBIDDEN_CHARS: [char; 3] = [':', '/', '\\'];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionIdentity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The canonical `(tenant, channel, thread)` triple.
///
/// Construct via [`SessionIdentity::new`], which trims and validates each
/// field. Fields are guaranteed non-empty and separator-free after
/// construction, so the key encodings below never need escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub tenant_id: String,
    pub channel_id: String,
    pub thread_id: String,
}

impl SessionIdentity {
    /// Validate and construct an identity. Each field is trimmed; empty or
    /// separator-carrying fields are rejected.
    pub fn new(
        tenant_id: impl AsRef<str>,
        channel_id: impl AsRef<str>,
        thread_id: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            tenant_id: validate_field("tenantId", tenant_id.as_ref())?,
            channel_id: validate_field("channelId", channel_id.as_ref())?,
            thread_id: validate_field("threadId", thread_id.as_ref())?,
        })
    }

    /// Canonical `tenant:channel:thread` key.
    pub fn session_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.tenant_id,
            self.channel_id,
            self.thread_id,
            sep = SESSION_KEY_SEPARATOR
        )
    }

    /// Filesystem-safe `tenant/channel/thread` path prefix.
    pub fn storage_partition_key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.tenant_id,
            self.channel_id,
            self.thread_id,
            sep = STORAGE_PARTITION_SEPARATOR
        )
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.session_key())
    }
}

fn validate_field(name: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Identity {
            code: IdentityErrorCode::Empty,
            message: format!("{name} must be non-empty"),
        });
    }
    if trimmed.contains(&FORBIDDEN_CHARS[..]) {
        return Err(Error::Identity {
            code: IdentityErrorCode::ContainsSeparator,
            message: format!("{name} must not contain ':', '/' or '\\': {trimmed:?}"),
        });
    }
    Ok(trimmed.to_owned())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key encode / decode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the canonical session key for an identity.
pub fn build_session_key(identity: &SessionIdentity) -> String {
    identity.session_key()
}

/// Parse a session key back into its identity.
///
/// The input must split on `:` into exactly three parts, each of which
/// passes the same validation as [`SessionIdentity::new`].
pub fn parse_session_key(key: &str) -> Result<SessionIdentity> {
    parse_triple(key, SESSION_KEY_SEPARATOR).map_err(|_| Error::Identity {
        code: IdentityErrorCode::SessionKeyInvalidFormat,
        message: format!("not a tenant:channel:thread key: {key:?}"),
    })
}

/// Build the storage partition key for an identity.
pub fn build_storage_partition_key(identity: &SessionIdentity) -> String {
    identity.storage_partition_key()
}

/// Parse a storage partition key back into its identity.
pub fn parse_storage_partition_key(key: &str) -> Result<SessionIdentity> {
    parse_triple(key, STORAGE_PARTITION_SEPARATOR).map_err(|_| Error::Identity {
        code: IdentityErrorCode::StoragePartitionInvalidFormat,
        message: format!("not a tenant/channel/thread key: {key:?}"),
    })
}

fn parse_triple(key: &str, sep: char) -> Result<SessionIdentity> {
    let parts: Vec<&str> = key.split(sep).collect();
    match parts.as_slice() {
        [tenant, channel, thread] => SessionIdentity::new(tenant, channel, thread),
        _ => Err(Error::Identity {
            code: IdentityErrorCode::SessionKeyInvalidFormat,
            message: String::new(),
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MessageIdentity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A session identity plus the per-message fields the boundary attaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageIdentity {
    #[serde(flatten)]
    pub session: SessionIdentity,
    pub user_id: String,
    pub message_id: String,
    /// Platform event timestamp, milliseconds since the epoch.
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(t: &str, c: &str, th: &str) -> SessionIdentity {
        SessionIdentity::new(t, c, th).unwrap()
    }

    #[test]
    fn session_key_round_trip() {
        let id = identity("default", "55001", "77");
        let key = build_session_key(&id);
        assert_eq!(key, "default:55001:77");
        assert_eq!(parse_session_key(&key).unwrap(), id);
    }

    #[test]
    fn storage_partition_round_trip() {
        let id = identity("default", "55001", "77");
        let key = build_storage_partition_key(&id);
        assert_eq!(key, "default/55001/77");
        assert_eq!(parse_storage_partition_key(&key).unwrap(), id);
    }

    #[test]
    fn keys_are_bijective_both_directions() {
        for key in ["a:b:c", "tenant-1:chan_2:thread.3", "cron:scheduler:daily-summary"] {
            let id = parse_session_key(key).unwrap();
            assert_eq!(build_session_key(&id), key);
        }
    }

    #[test]
    fn fields_are_trimmed() {
        let id = SessionIdentity::new(" default ", "100", " main").unwrap();
        assert_eq!(id.tenant_id, "default");
        assert_eq!(id.thread_id, "main");
    }

    #[test]
    fn empty_field_rejected() {
        for (t, c, th) in [("", "c", "t"), ("t", "  ", "t"), ("t", "c", "")] {
            let err = SessionIdentity::new(t, c, th).unwrap_err();
            assert!(matches!(
                err,
                Error::Identity {
                    code: IdentityErrorCode::Empty,
                    ..
                }
            ));
        }
    }

    #[test]
    fn separator_chars_rejected_in_every_field() {
        for bad in ["a:b", "a/b", "a\\b"] {
            for field in 0..3 {
                let (t, c, th) = match field {
                    0 => (bad, "c", "t"),
                    1 => ("t", bad, "t"),
                    _ => ("t", "c", bad),
                };
                let err = SessionIdentity::new(t, c, th).unwrap_err();
                assert!(
                    matches!(
                        err,
                        Error::Identity {
                            code: IdentityErrorCode::ContainsSeparator,
                            ..
                        }
                    ),
                    "expected separator rejection for {bad:?} in field {field}"
                );
            }
        }
    }

    #[test]
    fn parse_session_key_rejects_wrong_arity() {
        for bad in ["", "a", "a:b", "a:b:c:d", "a::c"] {
            let err = parse_session_key(bad).unwrap_err();
            assert!(matches!(
                err,
                Error::Identity {
                    code: IdentityErrorCode::SessionKeyInvalidFormat,
                    ..
                }
            ));
        }
    }

    #[test]
    fn parse_storage_partition_rejects_wrong_arity() {
        let err = parse_storage_partition_key("a/b").unwrap_err();
        assert!(matches!(
            err,
            Error::Identity {
                code: IdentityErrorCode::StoragePartitionInvalidFormat,
                ..
            }
        ));
    }

    #[test]
    fn parse_session_key_rejects_cross_separator_parts() {
        // A part containing '/' parses into three ':' segments but fails
        // field validation.
        assert!(parse_session_key("a/b:c:d").is_err());
    }
}
