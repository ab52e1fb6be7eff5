//! Boundary-qualified error taxonomy shared across all AgentRelay crates.
//!
//! Every fallible boundary (channel, provider, routing, identity) surfaces a
//! typed code so callers can branch on behavior instead of message text. The
//! provider-side normalizer maps raw SDK/HTTP failures into the taxonomy via
//! ordered substring pattern groups.

use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Codes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Channel boundary failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorCode {
    InvalidPayload,
    Unauthorized,
    RateLimited,
    Unavailable,
}

impl ChannelErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPayload => "CHANNEL_INVALID_PAYLOAD",
            Self::Unauthorized => "CHANNEL_UNAUTHORIZED",
            Self::RateLimited => "CHANNEL_RATE_LIMITED",
            Self::Unavailable => "CHANNEL_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ChannelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider boundary failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    RateLimit,
    Auth,
    Network,
    Tool,
    Abort,
    ContextLimit,
    InvalidRequest,
    Internal,
}

impl ProviderErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::Auth => "AUTH",
            Self::Network => "NETWORK",
            Self::Tool => "TOOL",
            Self::Abort => "ABORT",
            Self::ContextLimit => "CONTEXT_LIMIT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }

    /// Only rate limits and network faults are worth retrying.
    pub fn retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network)
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteErrorCode {
    InvalidInput,
    Forbidden,
    NotFound,
}

impl RouteErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "ROUTE_INVALID_INPUT",
            Self::Forbidden => "ROUTE_FORBIDDEN",
            Self::NotFound => "ROUTE_NOT_FOUND",
        }
    }
}

impl fmt::Display for RouteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity validation and key-parsing failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityErrorCode {
    Empty,
    ContainsSeparator,
    SessionKeyInvalidFormat,
    StoragePartitionInvalidFormat,
}

impl IdentityErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "IDENTITY_EMPTY",
            Self::ContainsSeparator => "IDENTITY_CONTAINS_SEPARATOR",
            Self::SessionKeyInvalidFormat => "SESSION_KEY_INVALID_FORMAT",
            Self::StoragePartitionInvalidFormat => "STORAGE_PARTITION_INVALID_FORMAT",
        }
    }
}

impl fmt::Display for IdentityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared error type used across all AgentRelay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("channel {code}: {message}")]
    Channel {
        code: ChannelErrorCode,
        message: String,
        /// Populated for `CHANNEL_RATE_LIMITED`.
        retry_after_seconds: Option<u64>,
    },

    #[error("provider {provider_id} {code}: {message}")]
    Provider {
        provider_id: String,
        code: ProviderErrorCode,
        message: String,
        status_code: Option<u16>,
    },

    #[error("routing {code}: {message}")]
    Routing {
        code: RouteErrorCode,
        message: String,
    },

    #[error("identity {code}: {message}")]
    Identity {
        code: IdentityErrorCode,
        message: String,
    },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn channel(code: ChannelErrorCode, message: impl Into<String>) -> Self {
        Self::Channel {
            code,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_seconds: u64) -> Self {
        Self::Channel {
            code: ChannelErrorCode::RateLimited,
            message: message.into(),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    pub fn provider(
        provider_id: impl Into<String>,
        code: ProviderErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider_id: provider_id.into(),
            code,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn routing(code: RouteErrorCode, message: impl Into<String>) -> Self {
        Self::Routing {
            code,
            message: message.into(),
        }
    }

    /// Whether a caller may retry the failed operation.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Channel { code, .. } => *code == ChannelErrorCode::RateLimited,
            Self::Provider { code, .. } => code.retryable(),
            _ => false,
        }
    }

    /// Provider code, when this is a provider-boundary error.
    pub fn provider_code(&self) -> Option<ProviderErrorCode> {
        match self {
            Self::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider error normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered pattern groups. First match across the groups wins, so the order
/// here is load-bearing: "429 rate limit" classifies as RATE_LIMIT even
/// though "limit" also appears in the CONTEXT_LIMIT group.
const PATTERN_GROUPS: &[(ProviderErrorCode, &[&str])] = &[
    (
        ProviderErrorCode::RateLimit,
        &[
            "429",
            "rate_limit",
            "rate limit",
            "too many requests",
            "overloaded",
            "capacity",
            "quota",
            "usage limit",
        ],
    ),
    (
        ProviderErrorCode::Auth,
        &["401", "403", "unauthorized", "forbidden", "invalid api key"],
    ),
    (
        ProviderErrorCode::Network,
        &[
            "network",
            "econnrefused",
            "etimedout",
            "socket hang up",
            "fetch failed",
        ],
    ),
    (ProviderErrorCode::Tool, &["tool", "mcp", "hook"]),
    (ProviderErrorCode::Abort, &["abort", "cancelled"]),
    (
        ProviderErrorCode::ContextLimit,
        &["context limit", "context_length", "too large"],
    ),
    (
        ProviderErrorCode::InvalidRequest,
        &["invalid request", "bad request", "400"],
    ),
];

/// Classify a raw provider failure message (plus optional HTTP status) into
/// a [`ProviderErrorCode`]. Falls back to `INTERNAL`.
pub fn classify_provider_failure(status_code: Option<u16>, message: &str) -> ProviderErrorCode {
    // Fold the status code into the haystack so the digit patterns match
    // failures that only carry a numeric status.
    let haystack = match status_code {
        Some(status) => format!("{status} {}", message.to_lowercase()),
        None => message.to_lowercase(),
    };

    for (code, patterns) in PATTERN_GROUPS {
        if patterns.iter().any(|p| haystack.contains(p)) {
            return *code;
        }
    }
    ProviderErrorCode::Internal
}

/// Pull a plausible HTTP status code out of a raw error message.
fn extract_status_code(message: &str) -> Option<u16> {
    // 4xx/5xx as a standalone token, compiled once.
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\b([45]\d\d)\b").expect("static pattern"));
    re.captures(message)?.get(1)?.as_str().parse().ok()
}

/// Normalize a raw provider failure into a boundary-qualified error.
///
/// Idempotent: an error that is already provider-qualified is returned
/// unchanged. Anything else (IO, JSON, ad-hoc message) is classified by the
/// pattern groups above and stamped with `provider_id`.
pub fn normalize_provider_error(provider_id: &str, raw: Error) -> Error {
    if matches!(raw, Error::Provider { .. }) {
        return raw;
    }
    let message = raw.to_string();
    normalize_provider_failure(provider_id, None, &message)
}

/// Normalize a raw message + optional status into a provider error.
pub fn normalize_provider_failure(
    provider_id: &str,
    status_code: Option<u16>,
    message: &str,
) -> Error {
    let status_code = status_code.or_else(|| extract_status_code(message));
    let code = classify_provider_failure(status_code, message);
    Error::Provider {
        provider_id: provider_id.to_owned(),
        code,
        message: message.to_owned(),
        status_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_first_match_wins() {
        let cases = [
            ("429 Too Many Requests", ProviderErrorCode::RateLimit),
            ("upstream overloaded, retry later", ProviderErrorCode::RateLimit),
            ("monthly usage limit reached", ProviderErrorCode::RateLimit),
            ("401 Unauthorized", ProviderErrorCode::Auth),
            ("invalid api key supplied", ProviderErrorCode::Auth),
            ("ECONNREFUSED 127.0.0.1:443", ProviderErrorCode::Network),
            ("socket hang up", ProviderErrorCode::Network),
            ("tool execution failed: exec", ProviderErrorCode::Tool),
            ("mcp server unreachable", ProviderErrorCode::Tool),
            ("request aborted by caller", ProviderErrorCode::Abort),
            ("operation cancelled", ProviderErrorCode::Abort),
            ("prompt too large for model", ProviderErrorCode::ContextLimit),
            ("context_length exceeded", ProviderErrorCode::ContextLimit),
            ("bad request: missing field", ProviderErrorCode::InvalidRequest),
            ("something unexpected happened", ProviderErrorCode::Internal),
        ];
        for (message, expected) in cases {
            assert_eq!(
                classify_provider_failure(None, message),
                expected,
                "message: {message}"
            );
        }
    }

    #[test]
    fn status_code_feeds_classification() {
        assert_eq!(
            classify_provider_failure(Some(429), "upstream said no"),
            ProviderErrorCode::RateLimit
        );
        assert_eq!(
            classify_provider_failure(Some(403), "nope"),
            ProviderErrorCode::Auth
        );
    }

    #[test]
    fn rate_limit_beats_context_limit_ordering() {
        // Carries both "rate limit" and "limit"; the first group wins.
        assert_eq!(
            classify_provider_failure(None, "rate limit: context limit nearby"),
            ProviderErrorCode::RateLimit
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let already = Error::provider("claude", ProviderErrorCode::Auth, "401");
        let normalized = normalize_provider_error("claude", already);
        assert!(matches!(
            normalized,
            Error::Provider {
                code: ProviderErrorCode::Auth,
                ..
            }
        ));
        // A second pass must not reclassify.
        let twice = normalize_provider_error("claude", normalized);
        assert_eq!(twice.provider_code(), Some(ProviderErrorCode::Auth));
    }

    #[test]
    fn normalize_extracts_status_from_message() {
        let err = normalize_provider_failure("claude", None, "HTTP 429: slow down");
        match err {
            Error::Provider {
                code, status_code, ..
            } => {
                assert_eq!(code, ProviderErrorCode::RateLimit);
                assert_eq!(status_code, Some(429));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn retryable_set_matches_codes() {
        assert!(Error::provider("p", ProviderErrorCode::RateLimit, "x").retryable());
        assert!(Error::provider("p", ProviderErrorCode::Network, "x").retryable());
        for code in [
            ProviderErrorCode::Auth,
            ProviderErrorCode::Tool,
            ProviderErrorCode::Abort,
            ProviderErrorCode::ContextLimit,
            ProviderErrorCode::InvalidRequest,
            ProviderErrorCode::Internal,
        ] {
            assert!(!Error::provider("p", code, "x").retryable());
        }
    }

    #[test]
    fn channel_rate_limited_is_retryable() {
        let err = Error::rate_limited("slow down", 30);
        assert!(err.retryable());
        match err {
            Error::Channel {
                retry_after_seconds,
                ..
            } => assert_eq!(retry_after_seconds, Some(30)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn codes_render_as_wire_names() {
        assert_eq!(
            ChannelErrorCode::InvalidPayload.as_str(),
            "CHANNEL_INVALID_PAYLOAD"
        );
        assert_eq!(ProviderErrorCode::RateLimit.as_str(), "RATE_LIMIT");
        assert_eq!(RouteErrorCode::NotFound.as_str(), "ROUTE_NOT_FOUND");
        assert_eq!(IdentityErrorCode::Empty.as_str(), "IDENTITY_EMPTY");
    }

    #[test]
    fn timeout_classifies_as_network() {
        // reqwest-style timeout messages mention the connection, not "429".
        assert_eq!(
            classify_provider_failure(None, "network timeout after 30s (etimedout)"),
            ProviderErrorCode::Network
        );
    }
}
