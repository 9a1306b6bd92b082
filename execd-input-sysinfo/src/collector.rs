//! System metrics collection using sysinfo.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use execd_bridge_framework::{Batch, Point};
use futures_util::Stream;
use futures_util::stream;
use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::config::SysinfoConfig;

/// Traffic counters from the previous sample, per interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NetSample {
    rx_bytes: u64,
    tx_bytes: u64,
}

/// Collector for system metrics.
///
/// Every call to [`collect`](Self::collect) refreshes the sysinfo handles and
/// returns one batch of points sharing a timestamp.
pub struct SystemCollector {
    system: System,
    disks: Disks,
    networks: Networks,
    hostname: String,
    config: SysinfoConfig,
    prev_network: HashMap<String, NetSample>,
    prev_sample: Option<Instant>,
}

impl SystemCollector {
    /// Create a new system collector.
    pub fn new(hostname: String, config: SysinfoConfig) -> Self {
        Self {
            system: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            hostname,
            config,
            prev_network: HashMap::new(),
            prev_sample: None,
        }
    }

    /// Take one sample of every enabled metric group.
    pub fn collect(&mut self) -> Vec<Point> {
        let now = Utc::now();
        let elapsed = self.prev_sample.map(|t| t.elapsed().as_secs_f64());
        self.prev_sample = Some(Instant::now());

        let mut points = Vec::new();

        if self.config.collect.system {
            self.collect_system(now, &mut points);
        }
        if self.config.collect.cpu {
            self.collect_cpu(now, &mut points);
        }
        if self.config.collect.memory {
            self.collect_memory(now, &mut points);
        }
        if self.config.collect.disk {
            self.collect_disk(now, &mut points);
        }
        if self.config.collect.network {
            self.collect_network(now, elapsed, &mut points);
        }

        debug!(host = %self.hostname, points = points.len(), "Collected system metrics");
        points
    }

    /// Start a point with the configured prefix, the `host` tag and the
    /// extra tags.
    fn point(&self, name: &str, time: DateTime<Utc>) -> Point {
        Point::new(format!("{}{}", self.config.measurement_prefix, name))
            .tag("host", &self.hostname)
            .tags(self.config.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .time(time)
    }

    fn collect_system(&mut self, time: DateTime<Utc>, points: &mut Vec<Point>) {
        let load = System::load_average();

        let point = self
            .point("system", time)
            .field("uptime_s", System::uptime())
            .field("boot_time_s", System::boot_time())
            .field("load1", load.one)
            .field("load5", load.five)
            .field("load15", load.fifteen);
        push_if_writable(points, point);
    }

    fn collect_cpu(&mut self, time: DateTime<Utc>, points: &mut Vec<Point>) {
        self.system.refresh_cpu_usage();

        let total = self
            .point("cpu", time)
            .tag("cpu", "cpu-total")
            .field("usage_pct", self.system.global_cpu_usage())
            .field("cores", self.system.cpus().len() as u64);
        push_if_writable(points, total);

        if !self.config.collect.per_core {
            return;
        }

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            let mut point = self
                .point("cpu", time)
                .tag("cpu", format!("cpu{}", i))
                .field("usage_pct", cpu.cpu_usage());

            let freq = cpu.frequency();
            if freq > 0 {
                point = point.field("frequency_MHz", freq);
            }
            push_if_writable(points, point);
        }
    }

    fn collect_memory(&mut self, time: DateTime<Utc>, points: &mut Vec<Point>) {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();

        let mut point = self
            .point("mem", time)
            .field("total_bytes", total)
            .field("used_bytes", used)
            .field("available_bytes", self.system.available_memory());
        if let Some(pct) = percent(used, total) {
            point = point.field("used_pct", pct);
        }

        let swap_total = self.system.total_swap();
        if swap_total > 0 {
            let swap_used = self.system.used_swap();
            point = point
                .field("swap_total_bytes", swap_total)
                .field("swap_used_bytes", swap_used);
            if let Some(pct) = percent(swap_used, swap_total) {
                point = point.field("swap_used_pct", pct);
            }
        }

        push_if_writable(points, point);
    }

    fn collect_disk(&mut self, time: DateTime<Utc>, points: &mut Vec<Point>) {
        self.disks.refresh(true);

        for disk in self.disks.list() {
            let mount_point = disk.mount_point().to_string_lossy().to_string();
            let fs_type = disk.file_system().to_string_lossy().to_string();

            if !self.config.disk.should_include(&mount_point, &fs_type) {
                continue;
            }

            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);

            let mut point = self
                .point("disk", time)
                .tag("path", &mount_point)
                .tag("device", disk.name().to_string_lossy())
                .tag("fstype", &fs_type)
                .field("total_bytes", total)
                .field("used_bytes", used)
                .field("free_bytes", free);
            if let Some(pct) = percent(used, total) {
                point = point.field("used_pct", pct);
            }

            push_if_writable(points, point);
        }
    }

    fn collect_network(
        &mut self,
        time: DateTime<Utc>,
        elapsed: Option<f64>,
        points: &mut Vec<Point>,
    ) {
        self.networks.refresh(true);

        let mut current = HashMap::new();
        for (name, data) in self.networks.list() {
            if !self.config.network.should_include(name) {
                continue;
            }

            let sample = NetSample {
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
            };

            let mut point = self
                .point("net", time)
                .tag("interface", name)
                .field("bytes_recv", sample.rx_bytes)
                .field("bytes_sent", sample.tx_bytes)
                .field("packets_recv", data.total_packets_received())
                .field("packets_sent", data.total_packets_transmitted())
                .field("err_in", data.total_errors_on_received())
                .field("err_out", data.total_errors_on_transmitted());

            let rates = match (self.prev_network.get(name), elapsed) {
                (Some(prev), Some(secs)) => byte_rates(*prev, sample, secs),
                _ => None,
            };
            if let Some((rx, tx)) = rates {
                point = point.field("recv_Bps", rx).field("sent_Bps", tx);
            }

            current.insert(name.clone(), sample);
            push_if_writable(points, point);
        }

        self.prev_network = current;
    }
}

/// Share of `part` in `total` as a percentage, if `total` is non-zero.
fn percent(part: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64 * 100.0)
}

/// Bytes per second between two counter samples. Counter resets yield no rate.
fn byte_rates(prev: NetSample, now: NetSample, secs: f64) -> Option<(f64, f64)> {
    if secs <= 0.0 || now.rx_bytes < prev.rx_bytes || now.tx_bytes < prev.tx_bytes {
        return None;
    }
    Some((
        (now.rx_bytes - prev.rx_bytes) as f64 / secs,
        (now.tx_bytes - prev.tx_bytes) as f64 / secs,
    ))
}

/// Keep a point only if at least one of its fields can be written
/// (a NaN usage reading right after boot has nothing to report).
fn push_if_writable(points: &mut Vec<Point>, point: Point) {
    if point.field_pairs().iter().any(|(_, v)| v.is_writable()) {
        points.push(point);
    } else {
        debug!(measurement = point.measurement(), "Dropping point without usable fields");
    }
}

/// The input's producer: one collection per advance, never ends.
pub fn producer(mut collector: SystemCollector) -> impl Stream<Item = anyhow::Result<Batch>> {
    stream::repeat_with(move || Ok(Batch::new(collector.collect())))
}
