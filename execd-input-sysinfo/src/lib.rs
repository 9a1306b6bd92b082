//! Telegraf execd input for local system metrics.
//!
//! Each trigger from the collector takes one sample with the `sysinfo` crate
//! and writes it as line protocol:
//!
//! ```text
//! system,host=server01 uptime_s=86400u,boot_time_s=1700000000u,load1=0.42,load5=0.3,load15=0.25 1700086400000000000
//! cpu,host=server01,cpu=cpu-total usage_pct=12.5,cores=8u 1700086400000000000
//! mem,host=server01 total_bytes=16777216000u,used_bytes=8388608000u,... 1700086400000000000
//! disk,host=server01,path=/,device=/dev/nvme0n1p2,fstype=ext4 total_bytes=...,used_pct=41.2 1700086400000000000
//! net,host=server01,interface=eth0 bytes_recv=123456u,...,recv_Bps=1024 1700086400000000000
//! ```

pub mod collector;
pub mod config;
