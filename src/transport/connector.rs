//! Native peer connectors.
//!
//! A [`PeerConnector`] opens the raw byte streams for a new channel. The
//! production connector starts the registered native host executable and
//! talks to it over stdio, the same way a browser launches a native
//! messaging host.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// PeerIo
// ============================================================================

/// Byte streams for one channel to the native peer.
pub struct PeerIo {
    /// Peer output (frames from the peer).
    pub(crate) reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Peer input (frames to the peer).
    pub(crate) writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Peer process, killed when the channel closes.
    pub(crate) child: Option<Child>,
}

impl PeerIo {
    /// Creates peer streams from a reader and a writer.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Attaches the peer process so it is terminated with the channel.
    #[must_use]
    pub fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }
}

impl fmt::Debug for PeerIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerIo")
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PeerConnector
// ============================================================================

/// Opens byte streams to a named native peer.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Connects to the native host registered under `host_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PeerUnreachable`] if the peer cannot be started.
    async fn connect(&self, host_name: &str) -> Result<PeerIo>;
}

// ============================================================================
// ProcessConnector
// ============================================================================

/// Registered native host executable.
#[derive(Debug, Clone)]
struct HostEntry {
    /// Path to the executable.
    path: PathBuf,
    /// Extra arguments after the origin.
    args: Vec<String>,
}

/// Starts native hosts as child processes connected over stdio.
///
/// # Example
///
/// ```ignore
/// let connector = ProcessConnector::new()
///     .register("com.my_company.my_application", "/opt/app/host")
///     .with_origin("chrome-extension://abcdef/");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcessConnector {
    /// Host name → executable.
    hosts: FxHashMap<String, HostEntry>,
    /// Caller origin passed as the first argument.
    origin: Option<String>,
}

impl ProcessConnector {
    /// Creates a connector with no registered hosts.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native host executable.
    #[must_use]
    pub fn register(mut self, host_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.hosts.insert(
            host_name.into(),
            HostEntry {
                path: path.into(),
                args: Vec::new(),
            },
        );
        self
    }

    /// Registers a native host executable with extra arguments.
    #[must_use]
    pub fn register_with_args(
        mut self,
        host_name: impl Into<String>,
        path: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.hosts.insert(
            host_name.into(),
            HostEntry {
                path: path.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Sets the origin passed to hosts as their first argument.
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns `true` if a host is registered under `host_name`.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, host_name: &str) -> bool {
        self.hosts.contains_key(host_name)
    }
}

#[async_trait]
impl PeerConnector for ProcessConnector {
    async fn connect(&self, host_name: &str) -> Result<PeerIo> {
        let entry = self.hosts.get(host_name).ok_or_else(|| {
            Error::peer_unreachable(format!("native host '{host_name}' is not registered"))
        })?;

        let mut command = Command::new(&entry.path);
        if let Some(origin) = &self.origin {
            command.arg(origin);
        }
        command
            .args(&entry.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!(host = host_name, path = %entry.path.display(), "Starting native host");

        let mut child = command.spawn().map_err(|e| {
            Error::peer_unreachable(format!(
                "failed to start {}: {e}",
                entry.path.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::peer_unreachable("native host stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::peer_unreachable("native host stdout unavailable"))?;

        info!(host = host_name, pid = ?child.id(), "Native host started");

        Ok(PeerIo::new(stdout, stdin).with_child(child))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::transport::codec::{MAX_INBOUND_FRAME_BYTES, encode_frame, read_frame, write_frame};

    #[tokio::test]
    async fn test_unregistered_host() {
        let connector = ProcessConnector::new();
        let err = connector.connect("com.example.missing").await.unwrap_err();
        assert!(matches!(err, Error::PeerUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let connector =
            ProcessConnector::new().register("com.example.broken", "/nonexistent/native-host");
        let err = connector.connect("com.example.broken").await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_host_round_trip() {
        // `cat` echoes each frame back unchanged.
        let connector = ProcessConnector::new().register("com.example.echo", "cat");
        assert!(connector.is_registered("com.example.echo"));

        let mut io = connector.connect("com.example.echo").await.expect("spawn cat");
        let frame = encode_frame(&json!({"action": "check_messages"})).expect("encode");
        write_frame(&mut io.writer, &frame).await.expect("write");

        let payload = read_frame(&mut io.reader, MAX_INBOUND_FRAME_BYTES)
            .await
            .expect("read")
            .expect("frame");
        let value: Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(value["action"], "check_messages");
    }
}
