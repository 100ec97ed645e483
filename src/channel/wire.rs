//! Newline-delimited JSON transport for the error channel
//!
//! An isolated worker writes one JSON object per line on its stdout. Lines
//! that are not protocol messages are skipped, so stray output from a
//! dependency cannot corrupt the channel.

use crate::channel::{ErrorReceiver, Signal};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

/// Writes one signal as a single line and flushes it
pub async fn write_signal<W>(writer: &mut W, signal: &Signal) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(signal)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Copies signals from an in-process receiver onto a writer, up to and
/// including the sentinel
///
/// On a write failure the receiver is closed so the producer is never left
/// waiting on a full channel.
pub async fn forward<W>(receiver: &mut ErrorReceiver, writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(signal) = receiver.recv().await {
        let last = matches!(signal, Signal::Finished { .. });
        if let Err(e) = write_signal(writer, &signal).await {
            receiver.close();
            return Err(e);
        }
        if last {
            break;
        }
    }
    Ok(())
}

/// Reads signals from a line-oriented stream
pub struct SignalReader<R> {
    lines: Lines<R>,
}

impl<R> SignalReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Returns the next signal, or `None` at end of stream
    pub async fn next_signal(&mut self) -> std::io::Result<Option<Signal>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Signal>(trimmed) {
                Ok(signal) => return Ok(Some(signal)),
                Err(_) => tracing::trace!("Skipping non-protocol line: {}", trimmed),
            }
        }
        Ok(None)
    }
}
