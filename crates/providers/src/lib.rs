//! Provider adapters and orchestration for AgentRelay.
//!
//! Adapters translate provider-native streams into the shared event
//! taxonomy; the registry holds them by id; the orchestrator drives retry,
//! backoff, and the rate-limit fallback chain.

pub mod active;
pub mod fallback;
pub mod orchestrator;
pub mod primary;
pub mod registry;
pub mod sdk;
pub mod traits;

pub use active::{ActiveQueryMap, CancelToken};
pub use fallback::EchoProvider;
pub use orchestrator::{ExecuteRequest, ProviderOrchestrator, QueryOutcome};
pub use primary::SdkProvider;
pub use registry::ProviderRegistry;
pub use traits::{ProviderAdapter, ProviderCapabilities, ProviderQueryInput};
