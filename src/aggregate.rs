//! Pure aggregation: one set of raw per-category readings in, one snapshot
//! out. No hidden state, no clocks — every merge rule here is testable in
//! isolation.

use std::cmp::Ordering;

use crate::error::{CycleError, QueryError};
use crate::source::{InterfaceAddr, MemReading, NetRate, OsIdentity, RawProcess, VolumeReading};
use crate::types::{IdentitySnapshot, ProcessEntry, ProcessStatus, SystemStats};

/// One tick's settled query results, one slot per category. Built by the
/// scheduler's fan-out, consumed whole by [`aggregate`].
#[derive(Debug)]
pub struct CycleReadings {
    pub load: Result<f64, QueryError>,
    pub temp: Result<Option<f64>, QueryError>,
    pub mem: Result<MemReading, QueryError>,
    pub volumes: Result<Vec<VolumeReading>, QueryError>,
    pub net: Result<Vec<NetRate>, QueryError>,
    pub processes: Result<Vec<RawProcess>, QueryError>,
    pub uptime: Result<f64, QueryError>,
}

/// At most this many entries in the published process list.
pub const TOP_PROCESSES: usize = 5;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Metric categories, used to record which readings degraded to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    CpuLoad,
    CpuTemp,
    Memory,
    Storage,
    Network,
    Uptime,
}

/// Result of one successful cycle. `degraded` names the categories whose
/// queries failed and fell back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub stats: SystemStats,
    pub processes: Vec<ProcessEntry>,
    pub degraded: Vec<Category>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn to_gib(bytes: u64) -> f64 {
    round1(bytes as f64 / BYTES_PER_GIB)
}

fn to_mbps(bytes_per_sec: f64) -> f64 {
    round1(bytes_per_sec * 8.0 / 1_000_000.0)
}

fn settle<T>(
    reading: Result<T, QueryError>,
    category: Category,
    default: T,
    degraded: &mut Vec<Category>,
) -> T {
    match reading {
        Ok(v) => v,
        Err(_) => {
            degraded.push(category);
            default
        }
    }
}

/// Merge one cycle's readings into a snapshot.
///
/// A failed category degrades to its default and is recorded; only a failed
/// process-list query aborts the cycle, since the `processes` event has no
/// meaningful default.
pub fn aggregate(readings: CycleReadings) -> Result<Aggregated, CycleError> {
    let raw_processes = readings.processes.map_err(CycleError::ProcessQuery)?;
    let mut degraded = Vec::new();

    let load = settle(readings.load, Category::CpuLoad, 0.0, &mut degraded);
    // Absent sensor (Ok(None)) is common and not a degradation.
    let temp = settle(readings.temp, Category::CpuTemp, None, &mut degraded).unwrap_or(0.0);
    let mem = settle(
        readings.mem,
        Category::Memory,
        MemReading { active: 0, total: 0 },
        &mut degraded,
    );
    let volumes = settle(readings.volumes, Category::Storage, Vec::new(), &mut degraded);
    let rates = settle(readings.net, Category::Network, Vec::new(), &mut degraded);
    let uptime = settle(readings.uptime, Category::Uptime, 0.0, &mut degraded);

    // Largest volume stands in for the main drive; summing partitions would
    // double-count logical volumes on one disk. Ties keep the first seen.
    let main_volume = volumes.iter().fold(None::<VolumeReading>, |best, v| match best {
        Some(b) if b.size >= v.size => Some(b),
        _ => Some(*v),
    });
    let (storage_used, storage_total) = main_volume.map(|v| (v.used, v.size)).unwrap_or((0, 0));

    let down: f64 = rates.iter().map(|r| r.rx_sec.unwrap_or(0.0)).sum();
    let up: f64 = rates.iter().map(|r| r.tx_sec.unwrap_or(0.0)).sum();

    let stats = SystemStats {
        cpu_usage_percent: round1(load),
        cpu_temp_celsius: temp,
        memory_used_gib: to_gib(mem.active),
        memory_total_gib: to_gib(mem.total),
        storage_used_gib: to_gib(storage_used),
        storage_total_gib: to_gib(storage_total),
        network_down_mbps: to_mbps(down),
        network_up_mbps: to_mbps(up),
        uptime_seconds: uptime,
    };

    Ok(Aggregated {
        stats,
        processes: rank_processes(raw_processes),
        degraded,
    })
}

/// Top entries by CPU, descending. The sort is stable so equal-CPU entries
/// keep their original source order.
fn rank_processes(mut raw: Vec<RawProcess>) -> Vec<ProcessEntry> {
    raw.sort_by(|a, b| b.cpu.partial_cmp(&a.cpu).unwrap_or(Ordering::Equal));
    raw.truncate(TOP_PROCESSES);
    raw.into_iter()
        .map(|p| ProcessEntry {
            pid: p.pid,
            name: p.name,
            user: p.user,
            cpu_percent: round1(p.cpu),
            mem_percent: round1(p.mem),
            status: if p.state == "sleeping" {
                ProcessStatus::Sleeping
            } else {
                ProcessStatus::Running
            },
        })
        .collect()
}

/// Assemble the one-time onboarding payload from the identity readings.
/// The advertised address is the first non-internal interface holding an
/// IPv4 address, with a loopback fallback.
pub fn build_identity(os: OsIdentity, interfaces: &[InterfaceAddr]) -> IdentitySnapshot {
    let ip = interfaces
        .iter()
        .find(|i| !i.internal && i.ip4.is_some())
        .and_then(|i| i.ip4)
        .map(|v4| v4.to_string())
        .unwrap_or_else(|| "127.0.0.1".into());
    IdentitySnapshot {
        instance_id: os.hostname,
        status: "Online",
        region: "Local",
        ip,
        os: format!("{} {}", os.distro, os.release),
        kernel: os.kernel,
    }
}
