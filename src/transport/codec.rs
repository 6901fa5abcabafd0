//! Native messaging frame codec.
//!
//! Every message is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON. The same framing is used in both directions.
//!
//! # Limits
//!
//! | Direction | Limit |
//! |-----------|-------|
//! | Peer → Bridge | [`MAX_INBOUND_FRAME_BYTES`] (1 MiB) |
//! | Bridge → Peer | [`MAX_OUTBOUND_FRAME_BYTES`] (64 MiB) |

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind, Write};

use futures_util::Stream;
use futures_util::stream;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Largest frame accepted from the native peer.
pub const MAX_INBOUND_FRAME_BYTES: usize = 1024 * 1024;

/// Largest frame sent to the native peer.
pub const MAX_OUTBOUND_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Size of the length prefix.
const LENGTH_PREFIX_BYTES: usize = 4;

// ============================================================================
// Encoding
// ============================================================================

/// Serializes a message into a complete frame (prefix + payload).
///
/// # Errors
///
/// - [`Error::Json`] if serialization fails
/// - [`Error::FrameTooLarge`] if the payload exceeds [`MAX_OUTBOUND_FRAME_BYTES`]
pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_OUTBOUND_FRAME_BYTES {
        return Err(Error::frame_too_large(
            payload.len(),
            MAX_OUTBOUND_FRAME_BYTES,
        ));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| Error::frame_too_large(payload.len(), MAX_OUTBOUND_FRAME_BYTES))?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    frame.extend_from_slice(&len.to_ne_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Checks that a message fits in one outbound frame without building it.
///
/// # Errors
///
/// - [`Error::Json`] if serialization fails
/// - [`Error::FrameTooLarge`] if the payload exceeds [`MAX_OUTBOUND_FRAME_BYTES`]
pub fn check_outbound<T: Serialize + ?Sized>(message: &T) -> Result<()> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, message)?;
    if counter.0 > MAX_OUTBOUND_FRAME_BYTES {
        return Err(Error::frame_too_large(counter.0, MAX_OUTBOUND_FRAME_BYTES));
    }
    Ok(())
}

/// Sink that only counts bytes.
struct ByteCounter(usize);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes an encoded frame and flushes.
///
/// # Errors
///
/// Returns [`Error::Io`] if the write fails.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads one frame payload.
///
/// Returns `Ok(None)` when the stream ends before a new length prefix.
///
/// # Errors
///
/// - [`Error::FrameTooLarge`] if the declared length exceeds `max_bytes`
/// - [`Error::ConnectionClosed`] if the stream ends inside a payload
/// - [`Error::Io`] for other read failures
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0_u8; LENGTH_PREFIX_BYTES];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let frame_len = u32::from_ne_bytes(header) as usize;
    if frame_len > max_bytes {
        return Err(Error::frame_too_large(frame_len, max_bytes));
    }

    let mut payload = vec![0_u8; frame_len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
        Err(e) => Err(e.into()),
    }
}

/// Turns a reader into a stream of frame payloads.
///
/// The stream ends after the first error or at end of input. Partial reads
/// live inside the stream, so dropping a pending `next()` loses no bytes.
pub fn frame_stream<R>(reader: R, max_bytes: usize) -> impl Stream<Item = Result<Vec<u8>>> + Send
where
    R: AsyncRead + Unpin + Send,
{
    stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        match read_frame(&mut reader, max_bytes).await {
            Ok(Some(payload)) => Some((Ok(payload), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
