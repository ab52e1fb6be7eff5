//! Shared domain types for AgentRelay.
//!
//! Everything the other crates agree on lives here: the canonical session
//! identity and its two key encodings, the inbound/outbound envelope model,
//! the provider event taxonomy, the boundary-qualified error type, config
//! types, and structured trace events.

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod identity;
pub mod trace;
