//! Bridge configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use page_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_host_name("com.example.reader")
//!     .with_reconnect_delay(Duration::from_secs(3))
//!     .with_auto_reconnect(false);
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default native host name.
pub const DEFAULT_HOST_NAME: &str = "com.my_company.my_application";

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default cap on consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay between an `init` and the active page push.
pub const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_secs(1);

/// Default bound on one page source exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Registered native host name.
    pub host_name: String,

    /// Flat delay before a reconnect attempt.
    pub reconnect_delay: Duration,

    /// Consecutive reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Reconnect after a disconnect even when not polling.
    pub auto_reconnect: bool,

    /// Polling probe interval.
    pub poll_interval: Duration,

    /// Delay after an `init` before announcing the active page.
    pub activation_delay: Duration,

    /// Bound on one `get_page_source` exchange.
    pub request_timeout: Duration,

    /// Number of user events content agents accept.
    pub user_event_count: usize,

    /// Notification banner display time.
    pub banner_duration: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            host_name: DEFAULT_HOST_NAME.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            auto_reconnect: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            activation_delay: DEFAULT_ACTIVATION_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_event_count: crate::content::DEFAULT_USER_EVENT_COUNT,
            banner_duration: crate::content::DEFAULT_BANNER_DURATION,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the native host name.
    #[inline]
    #[must_use]
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the reconnect attempt cap.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Enables or disables keep-alive reconnects.
    #[inline]
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets the polling interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the activation delay.
    #[inline]
    #[must_use]
    pub fn with_activation_delay(mut self, delay: Duration) -> Self {
        self.activation_delay = delay;
        self
    }

    /// Sets the page source request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the number of user events.
    #[inline]
    #[must_use]
    pub fn with_user_event_count(mut self, count: usize) -> Self {
        self.user_event_count = count;
        self
    }

    /// Sets the banner display time.
    #[inline]
    #[must_use]
    pub fn with_banner_duration(mut self, duration: Duration) -> Self {
        self.banner_duration = duration;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        validate_host_name(&self.host_name)?;

        for (name, value) in [
            ("reconnect_delay", self.reconnect_delay),
            ("poll_interval", self.poll_interval),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }

        if self.user_event_count == 0 {
            return Err(Error::config("user_event_count must be at least 1"));
        }

        Ok(())
    }
}

/// Checks native messaging host name rules.
///
/// Lowercase alphanumerics, `_` and `.`; dots may not lead, trail or repeat.
fn validate_host_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("host name is empty"));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.')))
    {
        return Err(Error::config(format!(
            "host name {name:?} contains invalid character {c:?}"
        )));
    }

    if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return Err(Error::config(format!("host name {name:?} has misplaced dots")));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
