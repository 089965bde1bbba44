pub use cgmath;
pub use collision::Footprint;
pub use config::{BackupConfig, SimConfig};
pub use congestion::CongestionStats;
pub use error::Error;
pub use light::{LightRecord, LightState, LightTimings, TrafficLight};
pub use metrics::{DelayRecord, Metrics, PathCongestion, VehiclePosition};
pub use node::{Node, NodeRecord};
pub use path::{Path, PathRecord, PathSample};
pub use route::{Route, RouteBuilder, Transition};
pub use simulation::Simulation;
pub use spawner::{ArrivalDistribution, ArrivalRate, SizeMode, SizeModel, SpawnModel, Spawner};
pub use store::{Arena, Keyed};
pub use util::Interval;
pub use vehicle::{DriverType, Leader, ObjectAhead, Vehicle, VehicleAttributes, VehicleSize};

mod collision;
mod config;
mod congestion;
mod error;
mod light;
pub mod math;
mod metrics;
mod node;
mod path;
mod route;
mod simulation;
mod spawner;
mod store;
mod util;
mod vehicle;

/// The random number generator driving every stochastic draw in a simulation.
pub type SimRng = rand_chacha::ChaCha8Rng;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident($int:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub $int);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id! {
    /// Unique ID of a [Node].
    NodeId(u32)
}
entity_id! {
    /// Unique ID of a [Path].
    PathId(u32)
}
entity_id! {
    /// Unique ID of a [TrafficLight].
    LightId(u32)
}
entity_id! {
    /// Unique ID of a [Route].
    RouteId(u32)
}
entity_id! {
    /// Unique ID of a [Vehicle].
    VehicleId(u64)
}

type NodeSet = Arena<NodeId, Node>;
type PathSet = Arena<PathId, Path>;
type LightSet = Arena<LightId, TrafficLight>;
type RouteSet = Arena<RouteId, Route>;
type VehicleSet = Arena<VehicleId, Vehicle>;
