//! In-memory peer for tests.
//!
//! [`DuplexConnector`] hands the bridge one end of a `tokio::io::duplex`
//! pipe per connect and publishes the other end as a [`FakePeer`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::transport::codec::{MAX_OUTBOUND_FRAME_BYTES, encode_frame, read_frame, write_frame};
use crate::transport::{PeerConnector, PeerIo};

/// Pipe buffer size per direction.
const PIPE_BYTES: usize = 256 * 1024;

/// Installs a test subscriber honoring `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// DuplexConnector
// ============================================================================

/// Connector producing in-memory peers.
pub(crate) struct DuplexConnector {
    peers: mpsc::UnboundedSender<FakePeer>,
    attempts: Mutex<Vec<Instant>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
}

impl DuplexConnector {
    /// Creates a connector and the receiver of its peers.
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            peers,
            attempts: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
        });
        (connector, rx)
    }

    /// Makes later connects fail.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes later connects take `delay` before completing.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Times of all connect attempts.
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl PeerConnector for DuplexConnector {
    async fn connect(&self, host_name: &str) -> Result<PeerIo> {
        self.attempts.lock().push(Instant::now());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::peer_unreachable(format!("{host_name}: connection refused")));
        }

        let (bridge_side, peer_side) = duplex(PIPE_BYTES);
        let (reader, writer) = split(bridge_side);
        let (peer_reader, peer_writer) = split(peer_side);

        self.peers
            .send(FakePeer {
                reader: peer_reader,
                writer: peer_writer,
            })
            .map_err(|_| Error::peer_unreachable("test dropped the peer receiver"))?;

        Ok(PeerIo::new(reader, writer))
    }
}

// ============================================================================
// FakePeer
// ============================================================================

/// Native peer end of an in-memory channel.
pub(crate) struct FakePeer {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
}

impl FakePeer {
    /// Receives the next message, or `None` once the bridge closed.
    pub(crate) async fn recv(&mut self) -> Option<Value> {
        let payload = read_frame(&mut self.reader, MAX_OUTBOUND_FRAME_BYTES)
            .await
            .expect("read frame")?;
        Some(serde_json::from_slice(&payload).expect("peer frame is JSON"))
    }

    /// Receives messages until one has the given `type` or `action`.
    pub(crate) async fn recv_kind(&mut self, kind: &str) -> Value {
        loop {
            let message = self.recv().await.expect("bridge closed the channel");
            let found = message
                .get("type")
                .or_else(|| message.get("action"))
                .and_then(Value::as_str);
            if found == Some(kind) {
                return message;
            }
        }
    }

    /// Sends a message to the bridge.
    pub(crate) async fn send(&mut self, message: Value) {
        let frame = encode_frame(&message).expect("encode");
        write_frame(&mut self.writer, &frame).await.expect("write frame");
    }

    /// Writes raw bytes, bypassing the framing.
    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        write_frame(&mut self.writer, bytes).await.expect("write raw");
    }
}
