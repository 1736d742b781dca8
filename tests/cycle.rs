//! End-to-end cycle behavior against a scripted metric source: degradation
//! on partial failure, tick skipping on process-query failure, and fan-out
//! semantics for late subscribers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use vitals_agent::aggregate::Category;
use vitals_agent::broadcast::Broadcaster;
use vitals_agent::error::{CycleError, QueryError};
use vitals_agent::scheduler::{run_cycle, Scheduler};
use vitals_agent::source::{
    InterfaceAddr, MemReading, MetricSource, NetRate, OsIdentity, RawProcess, VolumeReading,
};

const GIB: u64 = 1024 * 1024 * 1024;

/// Scripted source: fixed readings, with per-category failure injection.
struct MockSource {
    temp: Result<Option<f64>, QueryError>,
    /// Number of initial `processes` queries that fail.
    fail_processes: AtomicU32,
    /// Uptime advances by one second per query, so each cycle's snapshot is
    /// distinguishable from its neighbors.
    uptime_queries: AtomicU32,
}

impl MockSource {
    fn healthy() -> Self {
        MockSource {
            temp: Ok(Some(48.0)),
            fail_processes: AtomicU32::new(0),
            uptime_queries: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl MetricSource for MockSource {
    async fn os_info(&self) -> Result<OsIdentity, QueryError> {
        Ok(OsIdentity {
            hostname: "mock-host".into(),
            distro: "Ubuntu".into(),
            release: "22.04".into(),
            kernel: "6.5.0".into(),
        })
    }

    async fn network_interfaces(&self) -> Result<Vec<InterfaceAddr>, QueryError> {
        Ok(vec![InterfaceAddr {
            internal: false,
            ip4: Some("10.0.0.7".parse().unwrap()),
        }])
    }

    async fn current_load(&self) -> Result<f64, QueryError> {
        Ok(40.04)
    }

    async fn cpu_temperature(&self) -> Result<Option<f64>, QueryError> {
        self.temp.clone()
    }

    async fn mem(&self) -> Result<MemReading, QueryError> {
        Ok(MemReading {
            active: 8 * GIB,
            total: 32 * GIB,
        })
    }

    async fn fs_size(&self) -> Result<Vec<VolumeReading>, QueryError> {
        Ok(vec![
            VolumeReading {
                used: 10 * GIB,
                size: 100 * GIB,
            },
            VolumeReading {
                used: 5 * GIB,
                size: 500 * GIB,
            },
        ])
    }

    async fn network_stats(&self) -> Result<Vec<NetRate>, QueryError> {
        Ok(vec![
            NetRate {
                rx_sec: Some(500_000.0),
                tx_sec: Some(250_000.0),
            },
            NetRate {
                rx_sec: Some(250_000.0),
                tx_sec: None,
            },
        ])
    }

    async fn processes(&self) -> Result<Vec<RawProcess>, QueryError> {
        let failed = self
            .fail_processes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(QueryError::Unavailable("procfs".into()));
        }
        Ok(vec![
            RawProcess {
                pid: 100,
                name: "postgres".into(),
                user: "postgres".into(),
                cpu: 12.34,
                mem: 4.56,
                state: "sleeping".into(),
            },
            RawProcess {
                pid: 200,
                name: "nginx".into(),
                user: "www-data".into(),
                cpu: 30.0,
                mem: 1.0,
                state: "running".into(),
            },
        ])
    }

    async fn uptime(&self) -> Result<f64, QueryError> {
        let n = self.uptime_queries.fetch_add(1, Ordering::SeqCst);
        Ok(3600.5 + f64::from(n))
    }
}

#[tokio::test]
async fn healthy_cycle_produces_consistent_snapshot() {
    let agg = run_cycle(&MockSource::healthy()).await.unwrap();
    assert!(agg.degraded.is_empty());

    let stats = &agg.stats;
    assert_eq!(stats.cpu_usage_percent, 40.0);
    assert_eq!(stats.cpu_temp_celsius, 48.0);
    assert_eq!(stats.memory_used_gib, 8.0);
    assert_eq!(stats.memory_total_gib, 32.0);
    assert!(stats.memory_used_gib <= stats.memory_total_gib);
    // Largest volume wins, partitions are never summed.
    assert_eq!(stats.storage_total_gib, 500.0);
    assert_eq!(stats.storage_used_gib, 5.0);
    assert!(stats.storage_used_gib <= stats.storage_total_gib);
    assert_eq!(stats.network_down_mbps, 6.0);
    assert_eq!(stats.network_up_mbps, 2.0);
    assert_eq!(stats.uptime_seconds, 3600.5);

    // Ranked by CPU descending, rounded to 1 decimal.
    assert_eq!(agg.processes.len(), 2);
    assert_eq!(agg.processes[0].pid, 200);
    assert_eq!(agg.processes[1].cpu_percent, 12.3);
    assert_eq!(agg.processes[1].mem_percent, 4.6);
}

#[tokio::test]
async fn missing_temperature_degrades_without_aborting() {
    let source = MockSource {
        temp: Err(QueryError::Unavailable("no sensors".into())),
        ..MockSource::healthy()
    };
    let agg = run_cycle(&source).await.unwrap();
    assert_eq!(agg.stats.cpu_temp_celsius, 0.0);
    assert_eq!(agg.degraded, vec![Category::CpuTemp]);
}

#[tokio::test]
async fn failed_process_query_fails_the_cycle() {
    let source = MockSource {
        fail_processes: AtomicU32::new(1),
        ..MockSource::healthy()
    };
    let err = run_cycle(&source).await.unwrap_err();
    assert!(matches!(err, CycleError::ProcessQuery(_)));
}

#[tokio::test(start_paused = true)]
async fn scheduler_skips_failed_tick_and_stays_on_schedule() {
    let source: Arc<dyn MetricSource> = Arc::new(MockSource {
        fail_processes: AtomicU32::new(1),
        ..MockSource::healthy()
    });
    let broadcaster = Broadcaster::new(8);
    let mut sub = broadcaster.join();

    let handle = Scheduler::new(source, broadcaster.clone(), Duration::from_millis(2000)).spawn();

    // Tick 1 fails its process query and publishes nothing; tick 2 lands one
    // interval later.
    let tick = timeout(Duration::from_secs(10), sub.next_tick())
        .await
        .expect("scheduler stopped publishing after a failed cycle")
        .unwrap();
    // Uptime advances per query, so the second cycle reads 3601.5: the first
    // delivered snapshot really is tick 2, not a published tick 1.
    assert_eq!(tick.stats.uptime_seconds, 3601.5);
    assert_eq!(tick.stats.cpu_usage_percent, 40.0);
    assert_eq!(tick.processes.len(), 2);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn zero_period_scheduler_still_publishes() {
    let source: Arc<dyn MetricSource> = Arc::new(MockSource::healthy());
    let broadcaster = Broadcaster::new(8);
    let mut sub = broadcaster.join();

    // A zero period must not abort the tick task before its first tick.
    let handle = Scheduler::new(source, broadcaster.clone(), Duration::ZERO).spawn();

    let tick = timeout(Duration::from_secs(10), sub.next_tick())
        .await
        .expect("scheduler died on a zero period")
        .unwrap();
    assert_eq!(tick.stats.cpu_usage_percent, 40.0);
    assert!(!handle.is_finished());

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn subscriber_joining_mid_stream_gets_only_fresh_ticks() {
    let source: Arc<dyn MetricSource> = Arc::new(MockSource::healthy());
    let broadcaster = Broadcaster::new(8);

    let handle = Scheduler::new(source, broadcaster.clone(), Duration::from_millis(2000)).spawn();

    // Let several ticks go by with nobody listening.
    tokio::time::sleep(Duration::from_millis(7000)).await;
    assert_eq!(broadcaster.subscriber_count(), 0);

    let mut sub = broadcaster.join();
    let tick = timeout(Duration::from_secs(10), sub.next_tick())
        .await
        .expect("no tick delivered to late subscriber")
        .unwrap();
    // Ticks fired at 0/2/4/6s before the join, so the first delivered
    // snapshot is the fifth cycle's reading — fresh, not a replay.
    assert_eq!(tick.stats.uptime_seconds, 3604.5);

    handle.abort();
}
