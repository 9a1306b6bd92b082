//! Trigger lines read from the collector.

use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::sync::mpsc;

use crate::error::Result;

/// Chunks in flight between the stdin thread and the bridge.
const PIPE_DEPTH: usize = 16;
const PIPE_CHUNK: usize = 1024;

/// Outcome of waiting for the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A line arrived: produce the next batch.
    Signal,
    /// Input reached end-of-stream: the collector is going away.
    StreamClosed,
}

/// Reads trigger lines from the collector.
///
/// Telegraf's execd input with `signal = "STDIN"` writes a newline whenever it
/// wants data. The content of the line is ignored, so any line counts,
/// including an empty one or one that is not valid UTF-8.
#[derive(Debug)]
pub struct TriggerSource<R> {
    reader: R,
    buf: Vec<u8>,
    received: u64,
}

impl TriggerSource<BufReader<StdinPipe>> {
    /// Read triggers from the process stdin.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(StdinPipe::spawn()))
    }
}

/// Process stdin, read on a dedicated thread and handed over through a
/// channel.
///
/// A read on `tokio::io::stdin` occupies a blocking-pool thread that the
/// runtime waits for on shutdown, so a bridge stopped by a signal would hang
/// until the collector wrote another line. A plain thread is not joined when
/// the process exits.
#[derive(Debug)]
pub struct StdinPipe {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl StdinPipe {
    /// Start the reader thread on the process stdin.
    pub fn spawn() -> Self {
        Self::spawn_reader(io::stdin())
    }

    fn spawn_reader<T: Read + Send + 'static>(mut input: T) -> Self {
        let (tx, rx) = mpsc::channel(PIPE_DEPTH);

        std::thread::spawn(move || {
            let mut buf = vec![0u8; PIPE_CHUNK];
            loop {
                let item = match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                // The receiver is gone once the bridge stopped
                if tx.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });

        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl AsyncRead for StdinPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pos >= this.chunk.len() {
            match ready!(this.rx.poll_recv(cx)) {
                Some(Ok(chunk)) => {
                    this.chunk = chunk;
                    this.pos = 0;
                }
                Some(Err(e)) => return Poll::Ready(Err(e)),
                // Sender dropped: end of input
                None => return Poll::Ready(Ok(())),
            }
        }

        let n = (this.chunk.len() - this.pos).min(buf.remaining());
        buf.put_slice(&this.chunk[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl<R: AsyncBufRead + Unpin> TriggerSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            received: 0,
        }
    }

    /// Block until the next line or end-of-stream.
    ///
    /// A final line without a trailing newline still counts as a signal; the
    /// following call then reports [`Trigger::StreamClosed`].
    pub async fn await_trigger(&mut self) -> Result<Trigger> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;

        if n == 0 {
            tracing::debug!(received = self.received, "Trigger input closed");
            return Ok(Trigger::StreamClosed);
        }

        self.received += 1;
        tracing::trace!(
            received = self.received,
            line = %String::from_utf8_lossy(&self.buf).trim_end(),
            "Trigger received"
        );
        Ok(Trigger::Signal)
    }

    /// Number of signals received so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_each_line_is_a_signal() {
        let input: &[u8] = b"\nfoo\n\n";
        let mut source = TriggerSource::new(input);

        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::StreamClosed);
        assert_eq!(source.received(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_is_closed() {
        let input: &[u8] = b"";
        let mut source = TriggerSource::new(input);

        assert_eq!(source.await_trigger().await.unwrap(), Trigger::StreamClosed);
        assert_eq!(source.received(), 0);
    }

    #[tokio::test]
    async fn test_unterminated_last_line() {
        let input: &[u8] = b"poll";
        let mut source = TriggerSource::new(input);

        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::StreamClosed);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_a_signal() {
        let input: &[u8] = b"\xff\xfe\n";
        let mut source = TriggerSource::new(input);

        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
    }

    #[tokio::test]
    async fn test_waits_for_line_from_duplex() {
        use tokio::io::AsyncWriteExt;

        let (mut collector, bridge) = tokio::io::duplex(64);
        let mut source = TriggerSource::new(BufReader::new(bridge));

        collector.write_all(b"\n").await.unwrap();
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);

        drop(collector);
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::StreamClosed);
    }

    #[tokio::test]
    async fn test_stdin_pipe_delivers_lines_then_closes() {
        let input = io::Cursor::new(b"\npoll\n\n".to_vec());
        let mut source = TriggerSource::new(BufReader::new(StdinPipe::spawn_reader(input)));

        for _ in 0..3 {
            assert_eq!(source.await_trigger().await.unwrap(), Trigger::Signal);
        }
        assert_eq!(source.await_trigger().await.unwrap(), Trigger::StreamClosed);
        assert_eq!(source.received(), 3);
    }

    #[tokio::test]
    async fn test_stdin_pipe_splits_large_input() {
        // More than one chunk of trigger lines
        let input = io::Cursor::new(vec![b'\n'; PIPE_CHUNK * 3]);
        let mut source = TriggerSource::new(BufReader::new(StdinPipe::spawn_reader(input)));

        let mut signals = 0;
        while source.await_trigger().await.unwrap() == Trigger::Signal {
            signals += 1;
        }
        assert_eq!(signals, PIPE_CHUNK * 3);
    }

    struct FailingInput;

    impl Read for FailingInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin went away"))
        }
    }

    #[tokio::test]
    async fn test_stdin_pipe_read_error_is_io() {
        let mut source = TriggerSource::new(BufReader::new(StdinPipe::spawn_reader(FailingInput)));

        let err = source.await_trigger().await.unwrap_err();
        assert!(matches!(err, crate::BridgeError::Io(_)));
    }

    #[tokio::test]
    async fn test_stopped_bridge_does_not_wait_for_stdin() {
        // A reader that never returns, like a collector keeping stdin open
        struct Silent;
        impl Read for Silent {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                loop {
                    std::thread::park();
                }
            }
        }

        let mut source = TriggerSource::new(BufReader::new(StdinPipe::spawn_reader(Silent)));
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            source.await_trigger(),
        )
        .await;

        // Neither dropping the source nor the runtime waits for the thread
        assert!(waited.is_err());
        drop(source);
    }
}
