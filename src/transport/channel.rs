//! Channel to the native peer and its event loop.
//!
//! A [`Channel`] is one live duplex connection. It spawns a tokio task that
//! handles:
//!
//! - Incoming frames from the peer, forwarded as [`ChannelEvent::Frame`]
//! - Outgoing frames queued through [`Channel::send`]
//! - Peer shutdown, reported once as [`ChannelEvent::Closed`]
//!
//! Every channel carries a generation number so that events from a replaced
//! channel can be told apart from events of the current one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::pin;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::BridgeMessage;

use super::codec::{MAX_INBOUND_FRAME_BYTES, encode_frame, frame_stream, write_frame};
use super::connector::PeerIo;

// ============================================================================
// ChannelEvent
// ============================================================================

/// Notification from a channel's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A frame payload arrived from the peer.
    Frame {
        /// Channel that received the frame.
        generation: u64,
        /// Raw JSON payload.
        payload: Vec<u8>,
    },

    /// The channel stopped. Sent exactly once per channel.
    Closed {
        /// Channel that closed.
        generation: u64,
        /// Error that ended the channel, if any.
        reason: Option<String>,
    },
}

// ============================================================================
// ChannelCommand
// ============================================================================

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Write an encoded frame.
    Send(Vec<u8>),
    /// Close the channel.
    Shutdown,
}

// ============================================================================
// Channel
// ============================================================================

/// Live connection to the native peer.
///
/// Cloning yields another handle to the same event loop.
#[derive(Clone)]
pub struct Channel {
    /// Generation assigned by the connection manager.
    generation: u64,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("generation", &self.generation)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Channel {
    /// Opens a channel over the given streams.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn open(
        io: PeerIo,
        generation: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(io, generation, command_rx, events));

        Self {
            generation,
            command_tx,
        }
    }

    /// Returns the channel generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Queues a message for the peer.
    ///
    /// Messages are written in the order they are queued.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooLarge`] if the message exceeds the outbound limit
    /// - [`Error::PeerUnreachable`] if the event loop has stopped
    pub fn send(&self, message: &BridgeMessage) -> Result<()> {
        let frame = encode_frame(message)?;

        self.command_tx
            .send(ChannelCommand::Send(frame))
            .map_err(|_| Error::peer_unreachable("channel event loop has stopped"))?;

        trace!(generation = self.generation, kind = message.kind(), "Message queued");
        Ok(())
    }

    /// Closes the channel.
    ///
    /// A [`ChannelEvent::Closed`] still follows.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown);
    }

    /// Event loop that handles peer I/O.
    async fn run_event_loop(
        io: PeerIo,
        generation: u64,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) {
        let PeerIo {
            reader,
            mut writer,
            mut child,
        } = io;
        let mut frames = pin!(frame_stream(reader, MAX_INBOUND_FRAME_BYTES));

        let reason = loop {
            tokio::select! {
                // Incoming frames from peer
                frame = frames.next() => {
                    match frame {
                        Some(Ok(payload)) => {
                            trace!(generation, bytes = payload.len(), "Frame received");
                            if events.send(ChannelEvent::Frame { generation, payload }).is_err() {
                                debug!(generation, "Event receiver dropped");
                                break None;
                            }
                        }

                        Some(Err(e)) => {
                            warn!(generation, error = %e, "Failed to read from native peer");
                            break Some(e.to_string());
                        }

                        None => {
                            debug!(generation, "Native peer closed its output");
                            break None;
                        }
                    }
                }

                // Commands from the connection manager
                command = command_rx.recv() => {
                    match command {
                        Some(ChannelCommand::Send(frame)) => {
                            if let Err(e) = write_frame(&mut writer, &frame).await {
                                warn!(generation, error = %e, "Failed to write to native peer");
                                break Some(e.to_string());
                            }
                        }

                        Some(ChannelCommand::Shutdown) | None => {
                            debug!(generation, "Channel shutdown requested");
                            let _ = writer.shutdown().await;
                            break None;
                        }
                    }
                }
            }
        };

        // Stop accepting sends before reporting the close
        command_rx.close();

        if let Some(child) = child.as_mut()
            && let Err(e) = child.start_kill()
        {
            trace!(generation, error = %e, "Native host already exited");
        }

        let _ = events.send(ChannelEvent::Closed { generation, reason });
        debug!(generation, "Channel event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
