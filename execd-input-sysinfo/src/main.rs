//! Telegraf execd input for local system metrics.

use anyhow::Result;
use execd_bridge_framework::run_input;

use execd_input_sysinfo::collector::{SystemCollector, producer};
use execd_input_sysinfo::config::SysinfoInputConfig;

#[tokio::main]
async fn main() -> Result<()> {
    run_input("sysinfo", "sysinfo.json5", |config: SysinfoInputConfig| {
        let hostname = config.get_hostname();
        tracing::info!(
            host = %hostname,
            prefix = %config.sysinfo.measurement_prefix,
            "Sysinfo input ready"
        );

        Ok(producer(SystemCollector::new(hostname, config.sysinfo)))
    })
    .await
}
