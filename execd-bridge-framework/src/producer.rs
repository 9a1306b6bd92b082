//! Driving a lazy producer one step at a time.
//!
//! A producer is any [`Stream`] of `Result<B, E>` where `B` converts into a
//! [`Batch`] (a single [`Point`](execd_common::Point) or a `Vec` of them).
//! Between two calls to [`ProducerDriver::advance`] the stream is not polled,
//! so it cannot run ahead of the collector.
//!
//! Producers are usually written as generators:
//!
//! ```ignore
//! let producer = async_stream::try_stream! {
//!     let inverter = connect(addr).await?;
//!     loop {
//!         yield inverter.read_point().await?;
//!     }
//! };
//! ```

use std::fmt;
use std::pin::Pin;

use execd_common::Batch;
use futures_util::{Stream, StreamExt};

use crate::error::BridgeError;

/// Boxed producer stream, for callers that pick the producer at runtime.
pub type BoxProducer = Pin<Box<dyn Stream<Item = anyhow::Result<Batch>> + Send>>;

/// Box any producer into a [`BoxProducer`].
pub fn boxed<S, B, E>(producer: S) -> BoxProducer
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    Box::pin(producer.map(|item| item.map(Into::into).map_err(Into::into)))
}

/// Lifecycle of the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    /// Not advanced yet.
    Ready,
    /// Paused at a yield, waiting for the next advance.
    Suspended,
    /// Ended normally.
    Done,
    /// Ended with an error.
    Failed,
}

impl ProducerState {
    /// `Done` and `Failed` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProducerState::Done | ProducerState::Failed)
    }
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProducerState::Ready => "ready",
            ProducerState::Suspended => "suspended",
            ProducerState::Done => "done",
            ProducerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of one producer step.
#[derive(Debug)]
pub enum StepOutcome {
    /// The producer yielded a batch.
    Emitted(Batch),
    /// The producer's sequence ended.
    Ended,
    /// The producer raised.
    Failed(BridgeError),
}

/// Owns a producer and advances it exactly one step per call.
pub struct ProducerDriver<S> {
    producer: Pin<Box<S>>,
    state: ProducerState,
    advances: u64,
}

impl<S, B, E> ProducerDriver<S>
where
    S: Stream<Item = Result<B, E>>,
    B: Into<Batch>,
    E: Into<anyhow::Error>,
{
    pub fn new(producer: S) -> Self {
        Self {
            producer: Box::pin(producer),
            state: ProducerState::Ready,
            advances: 0,
        }
    }

    /// Resume the producer until it yields, ends, or fails.
    ///
    /// Must not be called after [`StepOutcome::Ended`] or
    /// [`StepOutcome::Failed`]; if it is, the producer is left untouched and
    /// `Ended` is returned.
    pub async fn advance(&mut self) -> StepOutcome {
        if self.state.is_terminal() {
            tracing::warn!(state = %self.state, "Advance requested on a finished producer");
            return StepOutcome::Ended;
        }

        self.advances += 1;
        match self.producer.next().await {
            Some(Ok(batch)) => {
                self.state = ProducerState::Suspended;
                StepOutcome::Emitted(batch.into())
            }
            Some(Err(e)) => {
                self.state = ProducerState::Failed;
                StepOutcome::Failed(BridgeError::producer(e))
            }
            None => {
                self.state = ProducerState::Done;
                StepOutcome::Ended
            }
        }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// Number of times the producer has been resumed.
    pub fn advances(&self) -> u64 {
        self.advances
    }
}

impl<S> fmt::Debug for ProducerDriver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerDriver")
            .field("state", &self.state)
            .field("advances", &self.advances)
            .finish()
    }
}
