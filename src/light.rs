use crate::store::Keyed;
use crate::{LightId, PathId};
use smallvec::SmallVec;

/// A traffic light gating entry onto a set of paths that share a start node.
///
/// Lights are normally driven externally through [TrafficLight::set_state].
/// The internal phase cycle only runs once enabled with [TrafficLight::set_cycling].
#[derive(Clone, Debug)]
pub struct TrafficLight {
    /// The light ID.
    id: LightId,
    /// The paths controlled by the light.
    paths: SmallVec<[PathId; 4]>,
    /// The current state.
    state: LightState,
    /// The duration of each phase of the cycle.
    timings: LightTimings,
    /// The time since the current state was entered, in s.
    since: f64,
    /// Whether the light advances through its cycle by itself.
    cycling: bool,
}

/// A light as supplied by the junction definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightRecord {
    pub id: LightId,
    pub paths: Vec<PathId>,
}

/// The state of a traffic light.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightState {
    Green,
    Amber,
    Red,
    RedAmber,
}

/// The duration of each phase of a light's cycle, in s.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightTimings {
    pub green: f64,
    pub amber: f64,
    pub red: f64,
    pub red_amber: f64,
}

impl LightState {
    /// The state which follows this one in the cycle.
    pub fn next(self) -> Self {
        use LightState::*;
        match self {
            Green => Amber,
            Amber => Red,
            Red => RedAmber,
            RedAmber => Green,
        }
    }

    /// Whether vehicles may pass a light in this state.
    pub fn allows_traffic(self) -> bool {
        self == LightState::Green
    }
}

impl Default for LightTimings {
    fn default() -> Self {
        Self {
            green: 20.0,
            amber: 3.0,
            red: 20.0,
            red_amber: 2.0,
        }
    }
}

impl LightTimings {
    /// The duration of the given phase.
    pub fn duration(&self, state: LightState) -> f64 {
        match state {
            LightState::Green => self.green,
            LightState::Amber => self.amber,
            LightState::Red => self.red,
            LightState::RedAmber => self.red_amber,
        }
    }
}

impl TrafficLight {
    /// Creates a green, externally controlled light.
    pub fn new(record: &LightRecord) -> Self {
        Self {
            id: record.id,
            paths: record.paths.iter().copied().collect(),
            state: LightState::Green,
            timings: LightTimings::default(),
            since: 0.0,
            cycling: false,
        }
    }

    /// The light ID.
    pub fn id(&self) -> LightId {
        self.id
    }

    /// The paths controlled by the light.
    pub fn paths(&self) -> &[PathId] {
        &self.paths
    }

    /// The first controlled path, which locates the light in the junction.
    pub fn head_path(&self) -> Option<PathId> {
        self.paths.first().copied()
    }

    /// Whether the light gates entry onto the given path.
    pub fn controls(&self, path: PathId) -> bool {
        self.paths.contains(&path)
    }

    /// The current state.
    pub fn state(&self) -> LightState {
        self.state
    }

    /// Whether vehicles may currently pass the light.
    pub fn allows_traffic(&self) -> bool {
        self.state.allows_traffic()
    }

    /// Changes the state immediately.
    pub fn set_state(&mut self, state: LightState) {
        if state != self.state {
            self.state = state;
            self.since = 0.0;
        }
    }

    /// Sets the phase durations used while cycling.
    pub fn set_timings(&mut self, timings: LightTimings) {
        self.timings = timings;
    }

    /// Enables or disables the internal phase cycle.
    pub fn set_cycling(&mut self, cycling: bool) {
        self.cycling = cycling;
    }

    /// Advances the light's timer by `dt` seconds.
    /// Returns `true` if the state changed.
    pub fn step(&mut self, dt: f64) -> bool {
        self.since += dt;
        if !self.cycling || self.since < self.timings.duration(self.state) {
            return false;
        }
        self.since -= self.timings.duration(self.state);
        self.state = self.state.next();
        true
    }
}

impl Keyed for TrafficLight {
    type Key = LightId;

    fn key(&self) -> LightId {
        self.id
    }
}
