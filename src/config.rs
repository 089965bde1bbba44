//! Simulation configuration.

use crate::vehicle::VehicleAttributes;
use crate::{Error, PathId};

/// Global parameters of a simulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// The number of ticks per simulated second.
    pub tick_rate: f64,
    /// The minimum chord distance between discretized path samples, in m.
    pub discrete_length_increment_size: f64,
    /// The number of uniform steps of the spline parameter used when discretizing a path.
    pub discretization_steps: usize,
    /// Multiplier on the distance between two nodes giving the spline tangent magnitude.
    pub tangent_scale: f64,
    /// The hour of day at which the simulation begins.
    pub start_hour: f64,
    /// Vehicles slower than this, in m/s, accumulate wait time.
    pub stopped_speed_threshold: f64,
    /// The speed of the virtual leader used when no object is ahead, in m/s.
    pub free_road_speed: f64,
    /// The gap to the virtual leader used when no object is ahead, in m.
    pub free_road_gap: f64,
    /// The fraction of a path's length at which a vehicle changes onto a parallel path.
    pub lane_change_point: f64,
    /// How long a vehicle is flagged as changing lanes, in s.
    pub lane_change_duration: f64,
    /// The attributes of vehicles before driver type adjustments.
    pub default_vehicle: VehicleAttributes,
    /// Congestion tracking.
    pub backup: BackupConfig,
}

/// Parameters of the congestion ("backup") tracker.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackupConfig {
    /// The paths on which congestion is tracked.
    pub paths: Vec<PathId>,
    /// Vehicles slower than this, in m/s, count towards a path's occupancy.
    pub speed_threshold: f64,
    /// The trailing mean occupancy above which a path is backed up.
    pub occupancy_threshold: f64,
    /// The length of the trailing window in ticks.
    pub window_ticks: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            discrete_length_increment_size: 0.5,
            discretization_steps: 100_000,
            tangent_scale: 1.5,
            start_hour: 8.0,
            stopped_speed_threshold: 0.5,
            free_road_speed: 100.0,
            free_road_gap: 100.0,
            lane_change_point: 0.5,
            lane_change_duration: 1.0,
            default_vehicle: VehicleAttributes::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            paths: vec![],
            speed_threshold: 2.0,
            occupancy_threshold: 0.5,
            window_ticks: 120,
        }
    }
}

impl SimConfig {
    /// The duration of one tick in s.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.tick_rate > 0.0) {
            return Err(Error::InvalidConfig("tick rate must be positive"));
        }
        if !(self.discrete_length_increment_size > 0.0) || self.discretization_steps == 0 {
            return Err(Error::InvalidConfig(
                "discretization increment and steps must be positive",
            ));
        }
        if !(self.lane_change_duration > 0.0) {
            return Err(Error::InvalidConfig("lane change duration must be positive"));
        }
        if !(0.0..=1.0).contains(&self.lane_change_point) {
            return Err(Error::InvalidConfig("lane change point must lie in [0, 1]"));
        }
        if self.backup.window_ticks == 0 {
            return Err(Error::InvalidConfig("backup window must span at least one tick"));
        }
        Ok(())
    }

    /// Parses a configuration from JSON. Missing fields take their default values.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_tick() {
        let config = SimConfig::default();
        assert_eq!(config.dt(), 1.0 / 60.0);
        assert!(config.backup.paths.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_parameters() {
        let cases: [fn(&mut SimConfig); 7] = [
            |c| c.tick_rate = 0.0,
            |c| c.tick_rate = f64::NAN,
            |c| c.discrete_length_increment_size = 0.0,
            |c| c.discretization_steps = 0,
            |c| c.lane_change_duration = -1.0,
            |c| c.lane_change_point = 1.5,
            |c| c.backup.window_ticks = 0,
        ];
        for case in cases {
            let mut config = SimConfig::default();
            case(&mut config);
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        let mut config = SimConfig::default();
        config.lane_change_point = 1.0;
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_is_validated() {
        assert!(matches!(
            SimConfig::from_json(r#"{ "tick_rate": 0.0 }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_json(r#"{ "tick_rate": "fast" }"#),
            Err(Error::Config(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json() {
        let config = SimConfig::from_json(
            r#"{ "tick_rate": 20.0, "backup": { "paths": [4, 5], "window_ticks": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.tick_rate, 20.0);
        assert_eq!(config.backup.paths, vec![PathId(4), PathId(5)]);
        assert_eq!(config.backup.window_ticks, 10);
        assert_eq!(config.backup.speed_threshold, 2.0);
        assert_eq!(config.tangent_scale, 1.5);
    }
}
