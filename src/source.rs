//! Metric source boundary: the point-in-time queries the pipeline depends
//! on, and the sysinfo-backed production implementation.
//!
//! Every query is independently fallible. `SysinfoSource` keeps its sysinfo
//! handles alive across ticks so CPU usage and network counters can be read
//! as deltas against the previous refresh.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::time::Instant;

use async_trait::async_trait;
use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind,
    ProcessStatus, ProcessesToUpdate, RefreshKind, System, Users,
};
use tokio::sync::Mutex;

use crate::error::QueryError;

// ---------- Raw per-category readings ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsIdentity {
    pub hostname: String,
    pub distro: String,
    pub release: String,
    pub kernel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub internal: bool,
    pub ip4: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemReading {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeReading {
    pub used: u64,
    pub size: u64,
}

/// Per-interface throughput in bytes/sec. A source that cannot rate a
/// counter yet (first sample) reports `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetRate {
    pub rx_sec: Option<f64>,
    pub tx_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub cpu: f64,
    pub mem: f64,
    pub state: String,
}

/// The external collaborator the pipeline samples from. Object-safe so the
/// scheduler and tests can inject their own implementation.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn os_info(&self) -> Result<OsIdentity, QueryError>;
    async fn network_interfaces(&self) -> Result<Vec<InterfaceAddr>, QueryError>;
    async fn current_load(&self) -> Result<f64, QueryError>;
    async fn cpu_temperature(&self) -> Result<Option<f64>, QueryError>;
    async fn mem(&self) -> Result<MemReading, QueryError>;
    async fn fs_size(&self) -> Result<Vec<VolumeReading>, QueryError>;
    async fn network_stats(&self) -> Result<Vec<NetRate>, QueryError>;
    async fn processes(&self) -> Result<Vec<RawProcess>, QueryError>;
    async fn uptime(&self) -> Result<f64, QueryError>;
}

// ---------- sysinfo implementation ----------

struct NetSampler {
    nets: Networks,
    last_refresh: Instant,
}

pub struct SysinfoSource {
    sys: Mutex<System>,
    net: Mutex<NetSampler>,
    disks: Mutex<Disks>,
    components: Mutex<Components>,
    users: Mutex<Users>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything())
            .with_processes(ProcessRefreshKind::everything().without_tasks());
        let mut sys = System::new_with_specifics(refresh);
        sys.refresh_specifics(refresh);

        let nets = Networks::new_with_refreshed_list();

        SysinfoSource {
            sys: Mutex::new(sys),
            net: Mutex::new(NetSampler {
                nets,
                last_refresh: Instant::now(),
            }),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
            users: Mutex::new(Users::new_with_refreshed_list()),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

fn liveness(status: ProcessStatus) -> String {
    match status {
        ProcessStatus::Sleep => "sleeping".into(),
        ProcessStatus::Run => "running".into(),
        other => other.to_string().to_ascii_lowercase(),
    }
}

#[async_trait]
impl MetricSource for SysinfoSource {
    async fn os_info(&self) -> Result<OsIdentity, QueryError> {
        Ok(OsIdentity {
            hostname: System::host_name().unwrap_or_else(|| "unknown".into()),
            distro: System::name().unwrap_or_else(|| "Unknown".into()),
            release: System::os_version().unwrap_or_default(),
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".into()),
        })
    }

    async fn network_interfaces(&self) -> Result<Vec<InterfaceAddr>, QueryError> {
        let sampler = self.net.lock().await;
        let interfaces = sampler
            .nets
            .iter()
            .map(|(name, data)| {
                let ip4 = data.ip_networks().iter().find_map(|net| match net.addr {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                });
                let internal = name == "lo" || ip4.is_some_and(|v4| v4.is_loopback());
                InterfaceAddr { internal, ip4 }
            })
            .collect();
        Ok(interfaces)
    }

    async fn current_load(&self) -> Result<f64, QueryError> {
        let mut sys = self.sys.lock().await;
        sys.refresh_cpu_usage();
        Ok(sys.global_cpu_usage() as f64)
    }

    async fn cpu_temperature(&self) -> Result<Option<f64>, QueryError> {
        let mut components = self.components.lock().await;
        components.refresh(false);
        let main = components
            .iter()
            .filter(|c| {
                let label = c.label().to_ascii_lowercase();
                label.contains("cpu")
                    || label.contains("package")
                    || label.contains("tctl")
                    || label.contains("tdie")
            })
            .filter_map(|c| c.temperature())
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(main.map(f64::from))
    }

    async fn mem(&self) -> Result<MemReading, QueryError> {
        let mut sys = self.sys.lock().await;
        sys.refresh_memory();
        Ok(MemReading {
            active: sys.used_memory(),
            total: sys.total_memory(),
        })
    }

    async fn fs_size(&self) -> Result<Vec<VolumeReading>, QueryError> {
        let mut disks = self.disks.lock().await;
        disks.refresh(false);
        let volumes = disks
            .iter()
            .map(|d| VolumeReading {
                used: d.total_space().saturating_sub(d.available_space()),
                size: d.total_space(),
            })
            .collect();
        Ok(volumes)
    }

    async fn network_stats(&self) -> Result<Vec<NetRate>, QueryError> {
        let mut sampler = self.net.lock().await;
        let elapsed = sampler.last_refresh.elapsed().as_secs_f64();
        sampler.nets.refresh(true);
        sampler.last_refresh = Instant::now();
        if elapsed <= 0.0 {
            return Ok(sampler.nets.iter().map(|_| NetRate::default()).collect());
        }
        // received()/transmitted() are byte deltas since the previous refresh
        let rates = sampler
            .nets
            .iter()
            .map(|(_, data)| NetRate {
                rx_sec: Some(data.received() as f64 / elapsed),
                tx_sec: Some(data.transmitted() as f64 / elapsed),
            })
            .collect();
        Ok(rates)
    }

    async fn processes(&self) -> Result<Vec<RawProcess>, QueryError> {
        let mut sys = self.sys.lock().await;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            false,
            ProcessRefreshKind::everything().without_tasks(),
        );
        let users = self.users.lock().await;
        let total_mem = sys.total_memory();
        let n_cpus = sys.cpus().len().max(1) as f64;
        let list = sys
            .processes()
            .values()
            .map(|p| {
                let user = p
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_else(|| "unknown".into());
                let mem = if total_mem == 0 {
                    0.0
                } else {
                    p.memory() as f64 / total_mem as f64 * 100.0
                };
                RawProcess {
                    pid: p.pid().as_u32(),
                    name: p.name().to_string_lossy().into_owned(),
                    user,
                    cpu: (f64::from(p.cpu_usage()) / n_cpus).min(100.0),
                    mem,
                    state: liveness(p.status()),
                }
            })
            .collect();
        Ok(list)
    }

    async fn uptime(&self) -> Result<f64, QueryError> {
        Ok(System::uptime() as f64)
    }
}
