//! Plain numeric records exported for analysis.

use crate::congestion::CongestionStats;
use crate::{PathId, RouteId, VehicleId};

/// The world space placement of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VehiclePosition {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub length: f64,
    pub width: f64,
    pub id: VehicleId,
}

/// The journey of a vehicle which has left the junction.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DelayRecord {
    pub vehicle: VehicleId,
    pub route: RouteId,
    /// The simulation time at which the vehicle was created, in s.
    pub spawn_time: f64,
    /// The simulation time at which the vehicle left, in s.
    pub exit_time: f64,
    /// The time spent stopped, in s.
    pub wait_time: f64,
    /// The travel time in excess of travelling the route at maximum speed, in s.
    pub delay: f64,
}

/// The congestion statistics of a tracked path.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PathCongestion {
    pub path: PathId,
    pub backed_up: bool,
    pub stats: CongestionStats,
}

/// A snapshot of the simulation's metrics.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Metrics {
    /// The number of ticks simulated.
    pub ticks: u64,
    /// The simulation time in s.
    pub time: f64,
    /// The number of vehicles currently in the junction.
    pub vehicles: usize,
    /// The number of vehicles which have been spawned.
    pub spawned: u64,
    /// The number of vehicles which have completed their route.
    pub retired: u64,
    /// The number of colliding pairs found on the last tick.
    pub collisions: usize,
    /// The total number of colliding pairs observed, summed over every tick.
    pub collision_ticks: u64,
    pub congestion: Vec<PathCongestion>,
    pub delays: Vec<DelayRecord>,
}

impl DelayRecord {
    /// The total time spent in the junction, in s.
    pub fn travel_time(&self) -> f64 {
        self.exit_time - self.spawn_time
    }
}

impl Metrics {
    /// The mean delay of retired vehicles, or `None` if no vehicle has left.
    pub fn mean_delay(&self) -> Option<f64> {
        if self.delays.is_empty() {
            return None;
        }
        Some(self.delays.iter().map(|d| d.delay).sum::<f64>() / self.delays.len() as f64)
    }

    /// Serializes the metrics to a JSON value.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
