//! execd Bridge Framework
//!
//! Turns a lazy producer of measurements into a Telegraf `execd` input that
//! uses `signal = "STDIN"`: every line the collector writes to stdin advances
//! the producer exactly once, and whatever it yields is written to stdout as
//! line protocol before the next line is read.
//!
//! # Overview
//!
//! This framework provides:
//! - [`TriggerSource`] for reading trigger lines from stdin
//! - [`ProducerDriver`] for stepping a producer stream one yield at a time
//! - [`LineEmitter`] for writing batches as line protocol
//! - [`BridgeRunner`] for the request/response loop and its shutdown
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use execd_bridge_framework::{Point, serve};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let producer = async_stream::try_stream! {
//!         let sensor = Sensor::open()?;
//!         loop {
//!             yield Point::new("temp").field("value", sensor.read().await?);
//!         }
//!     };
//!
//!     // Runs until the collector closes stdin
//!     serve(producer).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod emitter;
mod error;
mod producer;
mod runner;
mod trigger;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use emitter::{EmitStats, LineEmitter};
pub use error::{BridgeError, Result};
pub use producer::{BoxProducer, ProducerDriver, ProducerState, StepOutcome, boxed};
pub use runner::{
    BridgeRunner, BridgeState, RunSummary, StopReason, run_input, sample, serve, shutdown_signal,
};
pub use trigger::{StdinPipe, Trigger, TriggerSource};

// Re-export commonly used types from execd-common
pub use execd_common::{Batch, FieldValue, LogFormat, LoggingConfig, Point};
