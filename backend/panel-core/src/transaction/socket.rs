//! Length-prefixed framing of transactions over a byte stream.

use crate::error::codec::CodecError;
use crate::transaction::Transaction;
use crate::{DEFAULT_MAX_FRAME_LEN, DEFAULT_SOCKET_TIMEOUT_MS};

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, copy, sink};
use tokio::time::timeout;

/// Bounds applied to every frame read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Deadline for one started frame.
    pub timeout: Duration,
    /// Largest payload accepted or sent.
    pub max_len: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_SOCKET_TIMEOUT_MS),
            max_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl FrameLimits {
    pub fn new(timeout: Duration, max_len: u32) -> Self {
        Self { timeout, max_len }
    }

    #[track_caller]
    fn check_len(&self, length: u64) -> Result<usize, CodecError> {
        if length > u64::from(self.max_len) {
            return Err(CodecError::FrameTooLarge {
                length,
                limit: self.max_len,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(length as usize)
    }
}

async fn with_deadline<T, F>(
    limits: &FrameLimits,
    what: &'static str,
    fut: F,
) -> Result<T, CodecError>
where
    F: Future<Output = Result<T, CodecError>>,
{
    match timeout(limits.timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CodecError::Timeout {
            message: format!(
                "{what} did not finish within {}ms",
                limits.timeout.as_millis()
            ),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn read_body<R>(
    reader: &mut R,
    limits: &FrameLimits,
    header: [u8; 4],
) -> Result<Transaction, CodecError>
where
    R: AsyncRead + Unpin,
{
    let length = limits.check_len(u64::from(u32::from_le_bytes(header)))?;
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(Transaction::from_bytes(payload))
}

impl Transaction {
    /// Write this transaction as one frame.
    ///
    /// The whole buffer is sent regardless of the read cursor.
    pub async fn write_to<W>(&self, writer: &mut W, limits: &FrameLimits) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        let length = limits.check_len(self.len() as u64)?;
        let mut frame = Vec::with_capacity(4 + length);
        frame.extend_from_slice(&(length as u32).to_le_bytes());
        frame.extend_from_slice(self.as_bytes());

        with_deadline(limits, "frame write", async {
            writer.write_all(&frame).await?;
            writer.flush().await?;
            Ok(())
        })
        .await
    }

    /// Read one frame, bounding the whole read by the deadline.
    pub async fn read_from<R>(
        reader: &mut R,
        limits: &FrameLimits,
    ) -> Result<Transaction, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        with_deadline(limits, "frame read", async {
            let mut header = [0u8; 4];
            reader.read_exact(&mut header).await?;
            read_body(reader, limits, header).await
        })
        .await
    }

    /// Read one frame from an idle connection.
    ///
    /// Waits without a deadline for the first header byte, then reads the
    /// rest of the frame under the deadline.
    pub async fn read_when_ready<R>(
        reader: &mut R,
        limits: &FrameLimits,
    ) -> Result<Transaction, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        let first = reader.read_u8().await?;
        with_deadline(limits, "frame read", async {
            let mut header = [first, 0, 0, 0];
            reader.read_exact(&mut header[1..]).await?;
            read_body(reader, limits, header).await
        })
        .await
    }
}

/// Skip the `length` payload bytes of a refused frame so the next header
/// lines up again.
pub async fn discard_payload<R>(
    reader: &mut R,
    length: u64,
    limits: &FrameLimits,
) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
{
    with_deadline(limits, "frame discard", async {
        let skipped = copy(&mut (&mut *reader).take(length), &mut sink()).await?;
        if skipped < length {
            return Err(CodecError::Closed {
                message: format!("peer closed after {skipped} of {length} discarded bytes"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    })
    .await
}
