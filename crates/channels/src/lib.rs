//! Channel boundary for AgentRelay.
//!
//! Connectors hand this crate raw platform events; it normalizes them into
//! the common envelope (enforcing completeness, authorization, rate limits,
//! and timestamp ordering on the way in) and dispatches outbound payloads
//! through per-channel glue on the way out.

pub mod boundary;
pub mod dedupe;
pub mod ordering;
pub mod outbound;
pub mod rate_limit;
pub mod slack;
pub mod split;
pub mod telegram;
pub mod telegram_api;

pub use boundary::{ChannelBoundary, ChannelCapabilities, ChannelOutboundPort};
pub use dedupe::DedupeStore;
pub use ordering::OrderingGate;
pub use outbound::{normalize, OutboundDispatcher};
pub use rate_limit::InboundRateLimiter;
pub use slack::SlackChannel;
pub use telegram::TelegramChannel;
