//! Path congestion ("backup") tracking.

use crate::config::BackupConfig;
use crate::PathId;
use std::collections::VecDeque;

/// Running statistics of a path's slow-moving occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CongestionStats {
    /// The number of ticks observed.
    pub samples: u64,
    /// The mean occupancy.
    pub mean: f64,
    /// The standard deviation of the occupancy.
    pub stdev: f64,
    /// The highest occupancy observed.
    pub max: f64,
    /// The total time the path has been backed up, in s.
    pub backed_up_time: f64,
    /// The number of distinct periods the path has been backed up for.
    pub episodes: u64,
}

/// Tracks the congestion of a single path.
#[derive(Clone, Debug)]
pub(crate) struct CongestionTracker {
    path: PathId,
    window: VecDeque<f64>,
    window_sum: f64,
    /// Welford accumulator: sum of squared deviations from the mean.
    m2: f64,
    backed_up: bool,
    stats: CongestionStats,
}

impl CongestionTracker {
    pub fn new(path: PathId) -> Self {
        Self {
            path,
            window: VecDeque::new(),
            window_sum: 0.0,
            m2: 0.0,
            backed_up: false,
            stats: CongestionStats::default(),
        }
    }

    pub fn path(&self) -> PathId {
        self.path
    }

    /// Whether the path is currently backed up.
    pub fn is_backed_up(&self) -> bool {
        self.backed_up
    }

    pub fn stats(&self) -> CongestionStats {
        self.stats
    }

    /// Records the occupancy of the path for one tick.
    ///
    /// # Parameters
    /// * `occupancy` - The fraction of the path covered by slow vehicles
    /// * `dt` - The duration of the tick in s
    /// * `config` - The backup thresholds
    /// Returns `true` if the path has just become backed up.
    pub fn record(&mut self, occupancy: f64, dt: f64, config: &BackupConfig) -> bool {
        let stats = &mut self.stats;
        stats.samples += 1;
        let delta = occupancy - stats.mean;
        stats.mean += delta / stats.samples as f64;
        self.m2 += delta * (occupancy - stats.mean);
        stats.stdev = (self.m2 / stats.samples as f64).sqrt();
        stats.max = stats.max.max(occupancy);

        self.window.push_back(occupancy);
        self.window_sum += occupancy;
        while self.window.len() > config.window_ticks.max(1) {
            if let Some(old) = self.window.pop_front() {
                self.window_sum -= old;
            }
        }
        let trailing = self.window_sum / self.window.len() as f64;

        let was_backed_up = self.backed_up;
        self.backed_up = trailing > config.occupancy_threshold;
        if self.backed_up {
            stats.backed_up_time += dt;
        }
        let started = self.backed_up && !was_backed_up;
        if started {
            stats.episodes += 1;
        }
        started
    }
}

/// The fraction of a path covered by vehicles, clamped to `[0, 1]`.
pub(crate) fn occupancy(path_length: f64, vehicle_lengths: impl Iterator<Item = f64>) -> f64 {
    if path_length <= 0.0 {
        return 0.0;
    }
    (vehicle_lengths.sum::<f64>() / path_length).clamp(0.0, 1.0)
}
