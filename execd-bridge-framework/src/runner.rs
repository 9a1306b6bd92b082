//! Bridge loop and entry points.

use std::fmt;
use std::future::Future;
use std::io::IsTerminal;
use std::pin::Pin;

use execd_common::{Batch, init_tracing, serialize_point};
use futures_util::Stream;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader, Stdout};
use tokio::signal;

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::emitter::LineEmitter;
use crate::error::{BridgeError, Result};
use crate::producer::{ProducerDriver, StepOutcome};
use crate::trigger::{StdinPipe, Trigger, TriggerSource};

/// State of the bridge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Starting,
    Cycling,
    ShuttingDown,
    Failing,
    Stopped,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeState::Starting => "starting",
            BridgeState::Cycling => "cycling",
            BridgeState::ShuttingDown => "shutting_down",
            BridgeState::Failing => "failing",
            BridgeState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Why a bridge run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The collector closed stdin.
    InputClosed,
    /// The producer's sequence ended.
    ProducerEnded,
    /// A termination signal was received.
    Signal,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::InputClosed => "input closed",
            StopReason::ProducerEnded => "producer ended",
            StopReason::Signal => "signal",
        };
        f.write_str(s)
    }
}

/// Counters from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Triggers that led to a producer step.
    pub cycles: u64,
    /// Non-empty batches written.
    pub batches: u64,
    /// Lines written.
    pub lines: u64,
    /// Cycles whose batch was empty.
    pub empty_batches: u64,
    pub reason: StopReason,
}

/// The bridge loop: one trigger, one producer step, one write.
///
/// Holds everything the loop touches, so a test can run it against an
/// in-memory reader and writer:
///
/// ```ignore
/// let input: &[u8] = b"\n\n";
/// let mut runner = BridgeRunner::new("test", producer, input, Vec::new());
/// let summary = runner.run_until(std::future::pending()).await?;
/// assert_eq!(runner.writer(), b"temp value=21.5\n");
/// ```
pub struct BridgeRunner<S, R, W> {
    name: String,
    triggers: TriggerSource<R>,
    driver: ProducerDriver<S>,
    emitter: LineEmitter<W>,
    state: BridgeState,
    cycles: u64,
}

impl<S, B, E> BridgeRunner<S, BufReader<StdinPipe>, Stdout>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    /// Create a runner wired to the process stdin and stdout.
    pub fn stdio(name: impl Into<String>, producer: S) -> Self {
        Self::from_parts(name, producer, TriggerSource::stdin(), LineEmitter::stdout())
    }
}

impl<S, B, E, R, W> BridgeRunner<S, R, W>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(name: impl Into<String>, producer: S, reader: R, writer: W) -> Self {
        Self::from_parts(name, producer, TriggerSource::new(reader), LineEmitter::new(writer))
    }

    /// Create a runner from an already built trigger source and emitter.
    pub fn from_parts(
        name: impl Into<String>,
        producer: S,
        triggers: TriggerSource<R>,
        emitter: LineEmitter<W>,
    ) -> Self {
        Self {
            name: name.into(),
            triggers,
            driver: ProducerDriver::new(producer),
            emitter,
            state: BridgeState::Starting,
            cycles: 0,
        }
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Get a reference to the producer driver.
    pub fn driver(&self) -> &ProducerDriver<S> {
        &self.driver
    }

    /// Get a reference to the output writer.
    pub fn writer(&self) -> &W {
        self.emitter.get_ref()
    }

    /// Run until stdin closes, the producer ends or fails, or a termination
    /// signal (Ctrl+C, SIGTERM) arrives.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until stdin closes, the producer ends or fails, or `shutdown`
    /// completes.
    ///
    /// A runner runs once; calling this again after it stopped returns
    /// [`BridgeError::Stopped`].
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        if self.state != BridgeState::Starting {
            return Err(BridgeError::Stopped);
        }

        tracing::info!(bridge = %self.name, "Bridge starting, waiting for triggers on stdin");
        self.set_state(BridgeState::Cycling);

        let mut shutdown = std::pin::pin!(shutdown);
        match self.cycle_until(shutdown.as_mut()).await {
            Ok(reason) => {
                self.set_state(BridgeState::ShuttingDown);
                if let Err(e) = self.emitter.shutdown().await {
                    // Nobody is left to read the output.
                    tracing::warn!(error = %e, "Failed to close output");
                }
                self.set_state(BridgeState::Stopped);

                let summary = self.summary(reason);
                tracing::info!(
                    bridge = %self.name,
                    reason = %reason,
                    cycles = summary.cycles,
                    lines = summary.lines,
                    "Bridge stopped"
                );
                Ok(summary)
            }
            Err(e) => {
                self.set_state(BridgeState::Failing);
                tracing::error!(
                    bridge = %self.name,
                    cycle = self.cycles,
                    error = %e,
                    "Bridge failed"
                );
                self.set_state(BridgeState::Stopped);
                Err(e)
            }
        }
    }

    async fn cycle_until<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.as_mut() => return Ok(StopReason::Signal),
                trigger = self.triggers.await_trigger() => trigger?,
            };
            if trigger == Trigger::StreamClosed {
                return Ok(StopReason::InputClosed);
            }

            self.cycles += 1;
            let outcome = tokio::select! {
                biased;
                _ = shutdown.as_mut() => return Ok(StopReason::Signal),
                outcome = self.driver.advance() => outcome,
            };

            // The write is never raced against shutdown, so a batch is
            // either fully written or not started.
            match outcome {
                StepOutcome::Emitted(batch) => {
                    let lines = self.emitter.emit(&batch).await?;
                    tracing::debug!(cycle = self.cycles, lines, "Cycle complete");
                }
                StepOutcome::Ended => return Ok(StopReason::ProducerEnded),
                StepOutcome::Failed(e) => return Err(e),
            }
        }
    }

    fn set_state(&mut self, state: BridgeState) {
        tracing::trace!(from = %self.state, to = %state, "Bridge state change");
        self.state = state;
    }

    fn summary(&self, reason: StopReason) -> RunSummary {
        let stats = self.emitter.stats();
        RunSummary {
            cycles: self.cycles,
            batches: stats.batches,
            lines: stats.lines,
            empty_batches: stats.empty_batches,
            reason,
        }
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Run the bridge loop on stdin/stdout until it stops.
///
/// This is the entry point for an input: build the producer, hand it over,
/// and exit non-zero if this returns an error.
pub async fn serve<S, B, E>(producer: S) -> Result<RunSummary>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    BridgeRunner::stdio("execd", producer).run().await
}

/// Take a single sample without waiting for a trigger and print it to stderr.
///
/// Meant for a human running an input from a terminal to check what it would
/// send to the collector.
pub async fn sample<S, B, E>(producer: S) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    let mut driver = ProducerDriver::new(producer);
    match driver.advance().await {
        StepOutcome::Emitted(batch) => {
            eprintln!("Sampled {} point(s):", batch.len());
            for point in &batch {
                eprintln!("\n{}", point.measurement());
                for (key, value) in point.tag_pairs() {
                    eprintln!("  tag   {}: \t{}", key, value);
                }
                for (key, value) in point.field_pairs() {
                    eprintln!("  field {}: \t{:?}", key, value);
                }
            }
            eprintln!("\nIn line format:");
            for point in &batch {
                eprintln!("{}", serialize_point(point)?);
            }
            Ok(())
        }
        StepOutcome::Ended => {
            eprintln!("Producer ended without yielding a sample");
            Ok(())
        }
        StepOutcome::Failed(e) => Err(e),
    }
}

/// Convenience function for an input binary.
///
/// Parses [`BridgeArgs`], loads the configuration (falling back to defaults
/// when the file does not exist), initializes logging on stderr, builds the
/// producer and then either samples once (`--once`, or stdout is a terminal)
/// or serves the collector.
///
/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     run_input::<MyConfig, _, _, _, _>("myinput", "myinput.json5", |config| {
///         Ok(my_producer(config))
///     })
///     .await
/// }
/// ```
pub async fn run_input<C, F, S, B, E>(
    name: &str,
    default_config: &'static str,
    make_producer: F,
) -> anyhow::Result<()>
where
    C: BridgeConfig + Default,
    F: FnOnce(C) -> anyhow::Result<S>,
    S: Stream<Item = std::result::Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    let args = BridgeArgs::parse_with_default(default_config);
    let config = C::load_or_default(&args.config)?;

    let log_config = args.logging_override(config.logging());
    init_tracing(&log_config)?;

    tracing::info!(
        input = name,
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "Starting input"
    );

    let producer = make_producer(config)?;

    if args.once || std::io::stdout().is_terminal() {
        tracing::info!("Sampling once instead of serving the collector");
        sample(producer).await?;
        return Ok(());
    }

    BridgeRunner::stdio(name, producer).run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use execd_common::Point;
    use futures_util::stream;

    fn temp(v: f64) -> Point {
        Point::new("temp").field("value", v)
    }

    #[tokio::test]
    async fn test_states_after_graceful_run() {
        let producer = stream::iter(vec![Ok::<_, anyhow::Error>(temp(1.0))]);
        let input: &[u8] = b"\n";
        let mut runner = BridgeRunner::new("test", producer, input, Vec::new());
        assert_eq!(runner.state(), BridgeState::Starting);

        let summary = runner.run_until(std::future::pending()).await.unwrap();
        assert_eq!(runner.state(), BridgeState::Stopped);
        assert_eq!(summary.reason, StopReason::InputClosed);
        assert_eq!(summary.cycles, 1);
        assert_eq!(runner.writer().as_slice(), b"temp value=1\n");
    }

    #[tokio::test]
    async fn test_runs_only_once() {
        let producer = stream::iter(Vec::<anyhow::Result<Point>>::new());
        let input: &[u8] = b"";
        let mut runner = BridgeRunner::new("test", producer, input, Vec::new());

        runner.run_until(std::future::pending()).await.unwrap();
        let again = runner.run_until(std::future::pending()).await;
        assert!(matches!(again, Err(BridgeError::Stopped)));
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_trigger() {
        let producer = stream::iter(vec![Ok::<_, anyhow::Error>(temp(1.0))]);
        // Never sends a line and never closes
        let (_collector, bridge) = tokio::io::duplex(64);
        let mut runner = BridgeRunner::new("test", producer, BufReader::new(bridge), Vec::new());

        let summary = runner.run_until(async {}).await.unwrap();
        assert_eq!(summary.reason, StopReason::Signal);
        assert_eq!(summary.cycles, 0);
        assert_eq!(runner.driver().advances(), 0);
        assert!(runner.writer().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_while_producer_is_busy() {
        let producer = async_stream::stream! {
            std::future::pending::<()>().await;
            yield Ok::<_, anyhow::Error>(temp(1.0));
        };
        let input: &[u8] = b"\n";
        let mut runner = BridgeRunner::new("test", producer, input, Vec::new());

        let shutdown = tokio::time::sleep(std::time::Duration::from_millis(20));
        let summary = runner.run_until(shutdown).await.unwrap();
        assert_eq!(summary.reason, StopReason::Signal);
        assert_eq!(summary.cycles, 1);
        assert!(runner.writer().is_empty());
    }

    #[tokio::test]
    async fn test_sample_does_not_need_trigger() {
        let producer = stream::iter(vec![Ok::<_, anyhow::Error>(temp(1.0))]);
        assert!(sample(producer).await.is_ok());
    }

    #[tokio::test]
    async fn test_sample_reports_failure() {
        let producer = stream::iter(vec![Err::<Point, _>(anyhow::anyhow!("no inverter found"))]);
        let err = sample(producer).await.unwrap_err();
        assert!(matches!(err, BridgeError::Producer(_)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BridgeState::ShuttingDown.to_string(), "shutting_down");
        assert_eq!(StopReason::InputClosed.to_string(), "input closed");
    }
}
