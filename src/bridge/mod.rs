//! Bridge entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Relay between tabs and the native peer |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Connection, polling and timing options |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for bridge configuration.
pub mod builder;

/// Core bridge implementation.
pub mod core;

/// Bridge options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use core::Bridge;
pub use options::{
    BridgeOptions, DEFAULT_ACTIVATION_DELAY, DEFAULT_HOST_NAME, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DEFAULT_RECONNECT_DELAY, DEFAULT_REQUEST_TIMEOUT,
};
