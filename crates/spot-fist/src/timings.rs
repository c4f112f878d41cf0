use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Statistics of the laps recorded for one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStatistics {
    /// Name of the phase.
    pub phase: String,
    /// Number of recorded laps.
    pub count: usize,
    /// Sum of all laps.
    pub total: Duration,
    /// Mean lap duration.
    pub mean: Duration,
    /// Shortest lap.
    pub min: Duration,
    /// Longest lap.
    pub max: Duration,
    /// Variance of the laps, in squared milliseconds.
    pub variance_ms2: f64,
    /// Standard deviation of the laps.
    pub std_dev: Duration,
    /// First quartile.
    pub quartile_1: Duration,
    /// Median.
    pub median: Duration,
    /// Third quartile.
    pub quartile_3: Duration,
    /// 90th percentile.
    pub percentile_90: Duration,
    /// 95th percentile.
    pub percentile_95: Duration,
    /// 99th percentile.
    pub percentile_99: Duration,
}

impl PhaseStatistics {
    fn from_laps(phase: &str, laps: &[Duration]) -> Option<Self> {
        if laps.is_empty() {
            return None;
        }
        let mut sorted = laps.to_vec();
        sorted.sort_unstable();

        // nearest-rank percentile
        let percentile = |p: f64| {
            let rank = (p * sorted.len() as f64).ceil() as usize;
            sorted[rank.clamp(1, sorted.len()) - 1]
        };

        let total: Duration = laps.iter().sum();
        let n = laps.len() as f64;
        let mean_ms = total.as_secs_f64() * 1e3 / n;
        let variance_ms2 = laps
            .iter()
            .map(|d| {
                let diff = d.as_secs_f64() * 1e3 - mean_ms;
                diff * diff
            })
            .sum::<f64>()
            / n;

        Some(Self {
            phase: phase.to_string(),
            count: laps.len(),
            total,
            mean: Duration::from_secs_f64(mean_ms / 1e3),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            variance_ms2,
            std_dev: Duration::from_secs_f64(variance_ms2.sqrt() / 1e3),
            quartile_1: percentile(0.25),
            median: percentile(0.5),
            quartile_3: percentile(0.75),
            percentile_90: percentile(0.90),
            percentile_95: percentile(0.95),
            percentile_99: percentile(0.99),
        })
    }
}

#[derive(Debug, Default)]
struct Records {
    // phases in the order they were first seen
    phases: Vec<(String, Vec<Duration>)>,
    running: HashMap<String, Instant>,
}

impl Records {
    fn push(&mut self, phase: &str, lap: Duration) {
        match self.phases.iter_mut().find(|(name, _)| name == phase) {
            Some((_, laps)) => laps.push(lap),
            None => self.phases.push((phase.to_string(), vec![lap])),
        }
    }

    fn laps(&self, phase: &str) -> Option<&[Duration]> {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, laps)| laps.as_slice())
    }
}

/// Records the duration of named phases.
///
/// Timing never interferes with the caller: every failure is logged and
/// ignored.
#[derive(Debug, Default)]
pub struct TimingsLogger {
    records: Mutex<Records>,
}

/// Stops its phase when dropped.
#[must_use = "the phase stops as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PhaseGuard<'a> {
    logger: &'a TimingsLogger,
    phase: String,
}

impl PhaseGuard<'_> {
    /// Stop the phase now.
    pub fn stop(self) {}
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.logger.finish(&self.phase, false);
    }
}

impl TimingsLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Option<MutexGuard<'_, Records>> {
        match self.records.lock() {
            Ok(records) => Some(records),
            Err(e) => {
                log::warn!("timings are unavailable: {e}");
                None
            }
        }
    }

    /// Start timing `phase`. The phase stops when the returned guard is
    /// dropped, or earlier with [`TimingsLogger::stop`].
    pub fn start(&self, phase: &str) -> PhaseGuard<'_> {
        if let Some(mut records) = self.lock() {
            if records
                .running
                .insert(phase.to_string(), Instant::now())
                .is_some()
            {
                log::warn!("phase '{phase}' restarted before being stopped");
            }
        }
        PhaseGuard {
            logger: self,
            phase: phase.to_string(),
        }
    }

    /// Stop timing `phase` and record the lap.
    pub fn stop(&self, phase: &str) {
        self.finish(phase, true);
    }

    fn finish(&self, phase: &str, explicit: bool) {
        let Some(mut records) = self.lock() else {
            return;
        };
        match records.running.remove(phase) {
            Some(start) => records.push(phase, start.elapsed()),
            // a guard dropped after an explicit stop is fine
            None if explicit => log::warn!("phase '{phase}' stopped but never started"),
            None => {}
        }
    }

    /// Record a lap measured elsewhere.
    pub fn record(&self, phase: &str, lap: Duration) {
        if let Some(mut records) = self.lock() {
            records.push(phase, lap);
        }
    }

    /// Forget every recorded lap.
    pub fn reset(&self) {
        if let Some(mut records) = self.lock() {
            records.phases.clear();
            records.running.clear();
        }
    }

    /// Names of the recorded phases, in first-seen order.
    pub fn phases(&self) -> Vec<String> {
        self.lock()
            .map(|records| records.phases.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// The `index`-th lap of `phase`.
    pub fn lap(&self, phase: &str, index: usize) -> Option<Duration> {
        self.lock()?.laps(phase)?.get(index).copied()
    }

    /// Number of laps recorded for `phase`.
    pub fn num_laps(&self, phase: &str) -> usize {
        self.lock()
            .and_then(|records| records.laps(phase).map(<[Duration]>::len))
            .unwrap_or(0)
    }

    /// Sum of the laps of `phase`; zero if the phase was never recorded.
    pub fn total_running_time(&self, phase: &str) -> Duration {
        self.lock()
            .and_then(|records| records.laps(phase).map(|laps| laps.iter().sum()))
            .unwrap_or_default()
    }

    /// Statistics of every recorded phase.
    pub fn report(&self) -> Vec<PhaseStatistics> {
        let Some(records) = self.lock() else {
            return Vec::new();
        };
        records
            .phases
            .iter()
            .filter_map(|(name, laps)| PhaseStatistics::from_laps(name, laps))
            .collect()
    }

    /// Log the statistics of every phase at info level.
    pub fn print_timings(&self, banner: &str, prefix: &str) {
        log::info!("{prefix}{banner}");
        for stats in self.report() {
            log::info!(
                "{prefix}[{}] laps: {} total: {:?} mean: {:?} min: {:?} max: {:?} std: {:?}",
                stats.phase,
                stats.count,
                stats.total,
                stats.mean,
                stats.min,
                stats.max,
                stats.std_dev,
            );
            log::info!(
                "{prefix}[{}] q1: {:?} median: {:?} q3: {:?} p90: {:?} p95: {:?} p99: {:?}",
                stats.phase,
                stats.quartile_1,
                stats.median,
                stats.quartile_3,
                stats.percentile_90,
                stats.percentile_95,
                stats.percentile_99,
            );
        }
    }
}
