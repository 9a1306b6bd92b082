//! Line protocol output to the collector.

use execd_common::{Batch, serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

use crate::error::Result;

/// Writes batches to the collector as line protocol.
///
/// Each batch is encoded in full before anything is written, then sent with a
/// single write followed by a flush. A batch containing an invalid point
/// therefore never leaves a partial line on the output.
#[derive(Debug)]
pub struct LineEmitter<W> {
    writer: W,
    stats: EmitStats,
}

impl LineEmitter<Stdout> {
    /// Emit to the process stdout.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> LineEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stats: EmitStats::default(),
        }
    }

    /// Emit one batch. Returns the number of lines written.
    pub async fn emit(&mut self, batch: &Batch) -> Result<usize> {
        let text = serialize(batch)?;

        if batch.is_empty() {
            self.stats.empty_batches += 1;
            tracing::debug!("Producer yielded an empty batch, nothing to emit");
            return Ok(0);
        }

        tracing::debug!(
            lines = batch.len(),
            "Emitting data in the line format: {}",
            text.trim_end()
        );

        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;

        self.stats.batches += 1;
        self.stats.lines += batch.len() as u64;
        Ok(batch.len())
    }

    /// Flush and close the writer.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

/// Counters kept by a [`LineEmitter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitStats {
    /// Non-empty batches written.
    pub batches: u64,
    /// Lines written.
    pub lines: u64,
    /// Batches that contained no points.
    pub empty_batches: u64,
}

impl EmitStats {
    /// Total number of batches handled, empty or not.
    pub fn total_batches(&self) -> u64 {
        self.batches + self.empty_batches
    }
}
