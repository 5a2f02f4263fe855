//! Periodic jobs: statistics ticks, berth gauges, TTL sweeps and the
//! daily full reset.
//!
//! Each job runs on its own Tokio task. Interval jobs wait one full period
//! before their first run and delay (never burst) after a stall.

use std::sync::Arc;
use std::time::Duration;

use berth_core::AppContext;
use berth_core::config::{ReaperConfig, StatisticsConfig};
use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::graphite::GraphitePublisher;

/// Schedules for every periodic job.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Statistics tick period.
    pub tick: Duration,
    /// Gauge collection period.
    pub berth_stats: Duration,
    /// TTL sweep period.
    pub sweep: Duration,
    /// Berth TTL in seconds.
    pub ttl_seconds: i64,
    /// UTC hour of the daily reset.
    pub reset_hour: u32,
}

impl Schedule {
    /// Build from validated config sections.
    pub const fn from_config(statistics: &StatisticsConfig, reaper: &ReaperConfig) -> Self {
        Self {
            tick: Duration::from_secs(statistics.tick_seconds),
            berth_stats: Duration::from_secs(reaper.berth_stats_seconds),
            sweep: Duration::from_secs(reaper.sweep_seconds),
            ttl_seconds: reaper.ttl_seconds,
            reset_hour: reaper.reset_hour,
        }
    }
}

/// Spawn every periodic job. The handles run until aborted.
pub fn spawn_jobs(
    ctx: &AppContext,
    schedule: &Schedule,
    graphite: Option<GraphitePublisher>,
) -> Vec<JoinHandle<()>> {
    let stats = Arc::clone(&ctx.stats);
    let gauges = ctx.reaper();
    let sweeper = ctx.reaper();
    let resetter = ctx.reaper();
    let ttl = schedule.ttl_seconds;
    let reset_hour = schedule.reset_hour;

    let handles = vec![
        tokio::spawn(every(schedule.tick, move || {
            let stats = Arc::clone(&stats);
            let graphite = graphite.clone();
            async move {
                let collected = stats.tick().await;
                debug!(statistics = collected.len(), "statistics tick");
                if let Some(publisher) = graphite {
                    publisher.publish(&collected).await;
                }
            }
        })),
        tokio::spawn(every(schedule.berth_stats, move || {
            let reaper = gauges.clone();
            async move {
                reaper.collect_berth_counts().await;
            }
        })),
        tokio::spawn(every(schedule.sweep, move || {
            let reaper = sweeper.clone();
            async move {
                reaper.sweep_stale(ttl).await;
            }
        })),
        tokio::spawn(async move {
            loop {
                let wait = until_next_reset(Utc::now(), reset_hour);
                info!(seconds = wait.as_secs(), "next full reset scheduled");
                time::sleep(wait).await;
                resetter.full_reset().await;
            }
        }),
    ];

    info!(
        tick_seconds = schedule.tick.as_secs(),
        berth_stats_seconds = schedule.berth_stats.as_secs(),
        sweep_seconds = schedule.sweep.as_secs(),
        reset_hour,
        "scheduled jobs started"
    );
    handles
}

/// Run `job` every `period`, starting one period from now.
async fn every<F, Fut>(period: Duration, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        job().await;
    }
}

/// Time from `now` until the next `hour:00:00` UTC, strictly in the future.
pub fn until_next_reset(now: DateTime<Utc>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    };
    next.signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
