//! The sampling clock: a free-running tick loop that fans out every
//! periodic query, waits for all of them to settle, aggregates, and
//! publishes. Per-cycle failures skip the tick's publish and never stop the
//! loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::aggregate::{aggregate, Aggregated, CycleReadings};
use crate::broadcast::{Broadcaster, TickPayload};
use crate::error::CycleError;
use crate::source::MetricSource;

pub struct Scheduler {
    source: Arc<dyn MetricSource>,
    broadcaster: Broadcaster,
    period: Duration,
}

impl Scheduler {
    pub fn new(source: Arc<dyn MetricSource>, broadcaster: Broadcaster, period: Duration) -> Self {
        Scheduler {
            source,
            broadcaster,
            // interval() panics on a zero period, which would kill the
            // detached task before its first tick
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Start the tick loop. The task runs until aborted; a slow cycle delays
    /// the next tick rather than stacking up behind it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match run_cycle(self.source.as_ref()).await {
                    Ok(agg) => {
                        if !agg.degraded.is_empty() {
                            debug!(categories = ?agg.degraded, "cycle degraded to defaults");
                        }
                        let delivered = self.broadcaster.publish(TickPayload {
                            stats: agg.stats,
                            processes: agg.processes,
                        });
                        debug!(subscribers = delivered, "snapshot published");
                    }
                    Err(err) => warn!(%err, "cycle skipped"),
                }
            }
        })
    }
}

/// One sampling/aggregation cycle: every periodic query is issued
/// concurrently and the merge only starts once all have settled.
pub async fn run_cycle(source: &dyn MetricSource) -> Result<Aggregated, CycleError> {
    let (load, temp, mem, volumes, net, processes, uptime) = tokio::join!(
        source.current_load(),
        source.cpu_temperature(),
        source.mem(),
        source.fs_size(),
        source.network_stats(),
        source.processes(),
        source.uptime(),
    );
    aggregate(CycleReadings {
        load,
        temp,
        mem,
        volumes,
        net,
        processes,
        uptime,
    })
}
