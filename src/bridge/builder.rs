//! Builder pattern for bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! let bridge = Bridge::builder()
//!     .host_name("com.example.reader")
//!     .connector(Arc::new(connector))
//!     .tabs(tabs)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tabs::TabHost;
use crate::transport::PeerConnector;

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`].
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Default)]
pub struct BridgeBuilder {
    /// Bridge options.
    options: BridgeOptions,
    /// Native peer connector.
    connector: Option<Arc<dyn PeerConnector>>,
    /// Tab access.
    tabs: Option<Arc<dyn TabHost>>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("options", &self.options)
            .field("connector", &self.connector.is_some())
            .field("tabs", &self.tabs.is_some())
            .finish()
    }
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder with default options and no collaborators.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the native host name.
    #[inline]
    #[must_use]
    pub fn host_name(mut self, host_name: impl Into<String>) -> Self {
        self.options.host_name = host_name.into();
        self
    }

    /// Sets the connector used to reach the native peer.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn PeerConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the tab host.
    #[inline]
    #[must_use]
    pub fn tabs(mut self, tabs: Arc<dyn TabHost>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    /// Builds the bridge with validation.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the connector or tab host is not set
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<Bridge> {
        let connector = self.connector.ok_or_else(|| {
            Error::config(
                "Peer connector is required. Use .connector() to set it.\n\
                 Example: Bridge::builder().connector(Arc::new(ProcessConnector::new()))",
            )
        })?;

        let tabs = self.tabs.ok_or_else(|| {
            Error::config(
                "Tab host is required. Use .tabs() to set it.\n\
                 Example: Bridge::builder().tabs(Arc::new(LocalTabs::new()))",
            )
        })?;

        self.options.validate()?;

        Ok(Bridge::new(self.options, connector, tabs))
    }
}

// ============================================================================
// Tests
// ============================================================================
