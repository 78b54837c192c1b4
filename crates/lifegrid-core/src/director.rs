//! The phase-alternating tick loop.
//!
//! The director races a repeating tick against a one-shot run-duration
//! expiry. Each tick publishes the current [`Phase`] on the director topic
//! and flips it, so the population sees `propagate, report, propagate, ...`
//! starting with `propagate`. On expiry the director stops ticking and
//! publishes the end-of-run sentinel exactly once.
//!
//! The race is biased toward expiry: a tick that falls due at the same
//! instant as the expiry is not emitted.

use std::sync::Arc;
use std::time::Duration;

use lifegrid_broker::Broker;
use lifegrid_types::{END_SENTINEL, Phase, Topic};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::TimingConfig;

/// Shortest tick interval the director accepts.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Longest tick interval or run duration; longer values are clamped so
/// deadlines never overflow. Roughly thirty years.
const MAX_DURATION: Duration = Duration::from_secs(946_080_000);

/// Summary of a finished director run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectorReport {
    /// Number of phase signals published.
    pub ticks: u64,
    /// The last phase published, if any tick happened.
    pub last_phase: Option<Phase>,
}

/// Drives the simulation in lockstep phases.
pub struct Director {
    broker: Arc<Broker>,
    tick_interval: Duration,
    run_duration: Duration,
}

impl Director {
    /// Create a director from the timing configuration.
    pub fn new(broker: Arc<Broker>, timing: &TimingConfig) -> Self {
        Self::with_durations(broker, timing.tick_interval(), timing.run_duration())
    }

    /// Create a director from explicit durations. The tick interval is
    /// clamped to at least one millisecond, and both durations to about
    /// thirty years.
    pub fn with_durations(
        broker: Arc<Broker>,
        tick_interval: Duration,
        run_duration: Duration,
    ) -> Self {
        Self {
            broker,
            tick_interval: tick_interval.clamp(MIN_TICK_INTERVAL, MAX_DURATION),
            run_duration: run_duration.min(MAX_DURATION),
        }
    }

    /// Run the director on a Tokio task.
    pub fn spawn(self) -> JoinHandle<DirectorReport> {
        tokio::spawn(self.run())
    }

    /// Tick until the run duration expires, then publish the end sentinel.
    ///
    /// The first tick happens one interval after the call.
    pub async fn run(self) -> DirectorReport {
        let director = Topic::director();
        let start = Instant::now();
        let Some(first_tick) = start.checked_add(self.tick_interval) else {
            warn!("tick interval overflows the clock, not ticking");
            return self.finish(DirectorReport::default());
        };
        let Some(deadline) = start.checked_add(self.run_duration) else {
            warn!("run duration overflows the clock, not ticking");
            return self.finish(DirectorReport::default());
        };

        let mut ticker = tokio::time::interval_at(first_tick, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        info!(
            tick_interval_ms = self.tick_interval.as_millis(),
            run_duration_secs = self.run_duration.as_secs(),
            "director starting"
        );

        let mut phase = Phase::FIRST;
        let mut report = DirectorReport::default();

        loop {
            tokio::select! {
                biased;
                () = &mut expiry => break,
                _ = ticker.tick() => {
                    let publication = self.broker.publish(&director, phase.as_str());
                    debug!(
                        %phase,
                        tick = report.ticks,
                        delivered = publication.delivered,
                        "phase published"
                    );
                    report.ticks = report.ticks.saturating_add(1);
                    report.last_phase = Some(phase);
                    phase = phase.next();
                }
            }
        }

        self.finish(report)
    }

    fn finish(&self, report: DirectorReport) -> DirectorReport {
        self.broker.publish(&Topic::end_of_run(), END_SENTINEL);
        info!(ticks = report.ticks, "director finished, end of run published");
        report
    }
}
