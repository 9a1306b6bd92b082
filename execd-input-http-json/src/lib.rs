//! Telegraf execd input for JSON HTTP APIs.
//!
//! On each trigger the configured URLs are fetched, their JSON documents
//! merged and flattened into the fields of a single point:
//!
//! ```text
//! {"status": {"temperature": 41.5}, "power": [{"id": 1, "value": 230}]}
//! ```
//!
//! becomes
//!
//! ```text
//! azrouter status_temperature=41.5,power_1="230"
//! ```

pub mod config;
pub mod poller;
