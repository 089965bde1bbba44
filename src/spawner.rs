//! Statistical arrival processes feeding vehicles into the junction.

use crate::error::Error;
use crate::math::gamma;
use crate::util::Interval;
use crate::vehicle::{DriverType, VehicleSize};
use crate::{NodeId, RouteId, SimRng};
use rand::distributions::WeightedIndex;
use rand_distr::{Distribution, Gamma, Normal, Weibull};

/// The exponent relating the coefficient of variation to the Weibull shape.
const WEIBULL_SHAPE_EXPONENT: f64 = -1.086;

/// The number of seconds in an hour.
const HOUR: f64 = 3600.0;

/// The mean and standard deviation of the time between arrivals, in s.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrivalRate {
    pub mean: f64,
    pub sdev: f64,
}

/// The distribution from which inter-arrival times are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrivalDistribution {
    Normal,
    /// Shape `(sdev / mean)^-1.086`, scale `mean / Γ(1 + 1/shape)`.
    Weibull,
    Gamma,
}

/// One mode of the vehicle size distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeMode {
    /// The relative probability of this mode.
    pub weight: f64,
    pub length: ArrivalRate,
    pub width: ArrivalRate,
}

/// A multimodal normal distribution over vehicle dimensions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeModel {
    pub modes: Vec<SizeMode>,
    /// The smallest dimensions a sampled vehicle may have.
    pub min: VehicleSize,
    /// The largest dimensions a sampled vehicle may have.
    pub max: VehicleSize,
}

/// The statistical model of a spawner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnModel {
    /// The inter-arrival time for each hour of the day, starting at midnight.
    pub hourly: [ArrivalRate; 24],
    pub distribution: ArrivalDistribution,
    /// The shortest time between arrivals, in s.
    pub min_spawn_time: f64,
    /// The longest time between arrivals, in s.
    pub max_spawn_time: f64,
    pub size: SizeModel,
    /// The relative probability of each of [DriverType::ALL].
    pub driver_weights: [f64; 3],
}

/// A vehicle which is due to spawn but is waiting for space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PendingSpawn {
    pub route: RouteId,
    pub size: VehicleSize,
    pub driver: DriverType,
    /// The simulation time at which the vehicle became due.
    pub since: f64,
}

/// Emits vehicles onto the junction at an entry node.
#[derive(Clone, Debug)]
pub struct Spawner {
    /// The entry node.
    node: NodeId,
    /// The statistical model.
    model: SpawnModel,
    /// The time of day at which the simulation began, in s since midnight.
    clock_offset: f64,
    /// The simulation time of the last emission.
    last: f64,
    /// The currently sampled inter-arrival time.
    delta: Option<f64>,
    /// A due vehicle waiting for space.
    pending: Option<PendingSpawn>,
    /// Whether a warning has been logged for the pending vehicle.
    warned: bool,
}

impl Default for SizeModel {
    fn default() -> Self {
        let mode = |weight, length, length_sdev, width, width_sdev| SizeMode {
            weight,
            length: ArrivalRate {
                mean: length,
                sdev: length_sdev,
            },
            width: ArrivalRate {
                mean: width,
                sdev: width_sdev,
            },
        };
        Self {
            modes: vec![mode(0.9, 4.4, 0.4, 1.8, 0.08), mode(0.1, 7.5, 1.5, 2.3, 0.1)],
            min: VehicleSize {
                length: 3.0,
                width: 1.4,
            },
            max: VehicleSize {
                length: 12.0,
                width: 2.6,
            },
        }
    }
}

impl SizeModel {
    /// Draws the dimensions of a vehicle.
    pub fn sample(&self, rng: &mut SimRng) -> VehicleSize {
        let weights = self.modes.iter().map(|mode| mode.weight);
        let idx = WeightedIndex::new(weights)
            .map(|dist| dist.sample(rng))
            .unwrap_or(0);
        let Some(mode) = self.modes.get(idx) else {
            return self.min;
        };
        let length = Interval::new(self.min.length, self.max.length);
        let width = Interval::new(self.min.width, self.max.width);
        VehicleSize {
            length: length.clamp(normal(mode.length, rng)),
            width: width.clamp(normal(mode.width, rng)),
        }
    }
}

impl Default for SpawnModel {
    fn default() -> Self {
        Self::uniform(10.0, 3.0)
    }
}

impl SpawnModel {
    /// A model with the same arrival rate at every hour of the day.
    pub fn uniform(mean: f64, sdev: f64) -> Self {
        Self {
            hourly: [ArrivalRate { mean, sdev }; 24],
            distribution: ArrivalDistribution::Normal,
            min_spawn_time: 2.0,
            max_spawn_time: 30.0,
            size: SizeModel::default(),
            driver_weights: [0.2, 0.6, 0.2],
        }
    }

    /// Checks the model's parameters are usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self
            .hourly
            .iter()
            .any(|rate| !(rate.mean > 0.0) || !(rate.sdev >= 0.0))
        {
            return Err(Error::InvalidSpawnModel(
                "arrival means must be positive and deviations non-negative",
            ));
        }
        if !(self.min_spawn_time >= 0.0) || !(self.min_spawn_time <= self.max_spawn_time) {
            return Err(Error::InvalidSpawnModel(
                "spawn time bounds must satisfy 0 <= min <= max",
            ));
        }
        if self.size.modes.is_empty()
            || self.size.modes.iter().any(|mode| !(mode.weight >= 0.0))
            || self.size.modes.iter().all(|mode| mode.weight == 0.0)
        {
            return Err(Error::InvalidSpawnModel(
                "size modes must have non-negative weights, not all zero",
            ));
        }
        if self.size.min.length > self.size.max.length || self.size.min.width > self.size.max.width
        {
            return Err(Error::InvalidSpawnModel("minimum size exceeds maximum size"));
        }
        if self.driver_weights.iter().any(|w| !(*w >= 0.0))
            || self.driver_weights.iter().all(|w| *w == 0.0)
        {
            return Err(Error::InvalidSpawnModel(
                "driver weights must be non-negative, not all zero",
            ));
        }
        Ok(())
    }

    /// The arrival rate at the given time of day, in s since midnight.
    /// Rates are interpolated linearly between hours.
    pub fn rate_at(&self, time_of_day: f64) -> ArrivalRate {
        let hours = (time_of_day / HOUR).rem_euclid(24.0);
        let hour = (hours.floor() as usize).min(23);
        let frac = hours - hour as f64;
        let this = self.hourly[hour];
        let next = self.hourly[(hour + 1) % 24];
        ArrivalRate {
            mean: Interval::new(this.mean, next.mean).lerp(frac),
            sdev: Interval::new(this.sdev, next.sdev).lerp(frac),
        }
    }

    /// Draws a time until the next arrival, clamped to the spawn time bounds.
    pub fn sample_delta(&self, rate: ArrivalRate, rng: &mut SimRng) -> f64 {
        let ArrivalRate { mean, sdev } = rate;
        let delta = if !(sdev > 0.0) || !(mean > 0.0) {
            mean
        } else {
            match self.distribution {
                ArrivalDistribution::Normal => normal(rate, rng),
                ArrivalDistribution::Weibull => {
                    let shape = (sdev / mean).powf(WEIBULL_SHAPE_EXPONENT);
                    let scale = mean / gamma(1.0 + 1.0 / shape);
                    Weibull::new(scale, shape)
                        .map(|dist| dist.sample(rng))
                        .unwrap_or(mean)
                }
                ArrivalDistribution::Gamma => {
                    let shape = mean * mean / (sdev * sdev);
                    let scale = sdev * sdev / mean;
                    Gamma::new(shape, scale)
                        .map(|dist| dist.sample(rng))
                        .unwrap_or(mean)
                }
            }
        };
        Interval::new(self.min_spawn_time, self.max_spawn_time).clamp(delta)
    }

    /// Draws the driver type of a vehicle.
    pub fn sample_driver(&self, rng: &mut SimRng) -> DriverType {
        WeightedIndex::new(self.driver_weights)
            .map(|dist| DriverType::ALL[dist.sample(rng)])
            .unwrap_or(DriverType::Normal)
    }
}

/// Draws from a normal distribution, falling back to the mean if it is degenerate.
fn normal(rate: ArrivalRate, rng: &mut SimRng) -> f64 {
    if !(rate.sdev > 0.0) {
        return rate.mean;
    }
    Normal::new(rate.mean, rate.sdev)
        .map(|dist| dist.sample(rng))
        .unwrap_or(rate.mean)
}

impl Spawner {
    /// Creates a spawner for an entry node.
    ///
    /// # Parameters
    /// * `node` - The entry node
    /// * `model` - The statistical model
    /// * `start_hour` - The hour of day at which the simulation begins
    pub fn new(node: NodeId, model: SpawnModel, start_hour: f64) -> Result<Self, Error> {
        model.validate()?;
        Ok(Self {
            node,
            model,
            clock_offset: start_hour * HOUR,
            last: 0.0,
            delta: None,
            pending: None,
            warned: false,
        })
    }

    /// The entry node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The statistical model.
    pub fn model(&self) -> &SpawnModel {
        &self.model
    }

    /// The simulation time of the last emission.
    pub fn last_emission(&self) -> f64 {
        self.last
    }

    /// The arrival rate at the given simulation time.
    pub fn rate(&self, time: f64) -> ArrivalRate {
        self.model.rate_at(self.clock_offset + time)
    }

    /// Whether a vehicle is due at simulation time `time`.
    ///
    /// A new inter-arrival time is sampled after each emission, and a vehicle
    /// is due once more than that time has passed since the last one.
    pub fn nudge(&mut self, time: f64, rng: &mut SimRng) -> bool {
        let delta = match self.delta {
            Some(delta) => delta,
            None => {
                let delta = self.model.sample_delta(self.rate(time), rng);
                self.delta = Some(delta);
                delta
            }
        };
        if time - self.last > delta {
            self.last = time;
            self.delta = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn pending(&self) -> Option<&PendingSpawn> {
        self.pending.as_ref()
    }

    pub(crate) fn set_pending(&mut self, pending: PendingSpawn) {
        self.pending = Some(pending);
        self.warned = false;
    }

    pub(crate) fn take_pending(&mut self) -> Option<PendingSpawn> {
        self.pending.take()
    }

    /// Marks the pending vehicle as warned about. Returns `true` the first time.
    pub(crate) fn warn_once(&mut self) -> bool {
        !std::mem::replace(&mut self.warned, true)
    }

    /// Returns the spawner to its initial state.
    pub fn reset(&mut self) {
        self.last = 0.0;
        self.delta = None;
        self.pending = None;
        self.warned = false;
    }
}
