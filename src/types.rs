//! Data types pushed to subscribers over WebSocket.
//! Keep this module minimal and stable — it defines the wire format.

use serde::Serialize;

/// One tick's normalized machine snapshot. Built once per cycle, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub cpu_usage_percent: f64,
    /// 0 when the host reports no thermal sensor.
    pub cpu_temp_celsius: f64,
    #[serde(rename = "memoryUsedGiB")]
    pub memory_used_gib: f64,
    #[serde(rename = "memoryTotalGiB")]
    pub memory_total_gib: f64,
    /// Usage of the single largest volume, not a sum across partitions.
    #[serde(rename = "storageUsedGiB")]
    pub storage_used_gib: f64,
    #[serde(rename = "storageTotalGiB")]
    pub storage_total_gib: f64,
    /// Summed across all reported interfaces.
    pub network_down_mbps: f64,
    pub network_up_mbps: f64,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessStatus {
    Running,
    Sleeping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub status: ProcessStatus,
}

/// Static identity payload sent once per connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub instance_id: String,
    pub status: &'static str,
    pub region: &'static str,
    pub ip: String,
    pub os: String,
    pub kernel: String,
}

/// Wire envelope: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Event<'a> {
    VmInfo(&'a IdentitySnapshot),
    Stats(&'a SystemStats),
    Processes(&'a [ProcessEntry]),
}
