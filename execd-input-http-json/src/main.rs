//! Telegraf execd input for JSON HTTP APIs.

use anyhow::Result;
use execd_bridge_framework::run_input;

use execd_input_http_json::config::HttpInputConfig;
use execd_input_http_json::poller::producer;

#[tokio::main]
async fn main() -> Result<()> {
    run_input("http-json", "http-json.json5", |config: HttpInputConfig| {
        tracing::info!(
            urls = ?config.http.urls,
            measurement = %config.http.measurement,
            "HTTP JSON input ready"
        );
        Ok(producer(config.http))
    })
    .await
}
