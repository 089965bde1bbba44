use self::acceleration::{cornering_speed, AccelerationModel, ModelParams};
use crate::collision::Footprint;
use crate::config::SimConfig;
use crate::math::Point2d;
use crate::path::Path;
use crate::store::Keyed;
use crate::{LightId, PathId, RouteId, VehicleId};

mod acceleration;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    id: VehicleId,
    /// The route the vehicle is following.
    route: RouteId,
    /// The index of the current path within the route.
    path_index: usize,
    /// The ID of the current path.
    path: PathId,
    /// The distance of the vehicle's centre along the current path, in m.
    dist: f64,
    /// The velocity in m/s.
    vel: f64,
    /// The acceleration realised over the last update, in m/s<sup>2</sup>.
    acc: f64,
    /// The vehicle's dimensions.
    size: VehicleSize,
    /// The vehicle's dynamics limits.
    attributes: VehicleAttributes,
    /// The kind of driver.
    driver: DriverType,
    /// The acceleration model
    model: AccelerationModel,
    /// The total time spent stopped, in s.
    wait_time: f64,
    /// The simulation time at which the vehicle was created, in s.
    spawn_time: f64,
    /// The time remaining on an in-progress lane change, in s.
    lane_change: f64,
    /// The world space coordinates of the centre of the vehicle.
    world_pos: Point2d,
    /// The vehicle's heading in radians.
    heading: f64,
}

/// The dynamics limits of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAttributes {
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acc: f64,
    /// The maximum deceleration of the vehicle, a positive number in m/s^2.
    pub max_dec: f64,
    /// The maximum speed in m/s.
    pub max_speed: f64,
    /// The minimum speed in m/s.
    pub min_speed: f64,
    /// The maximum lateral acceleration when cornering, in m/s^2.
    pub max_lat_acc: f64,
    /// The preferred time gap to the object ahead, in s.
    pub time_gap: f64,
}

/// The footprint dimensions of a vehicle, in m.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleSize {
    pub length: f64,
    pub width: f64,
}

/// The temperament of a vehicle's driver, which scales its dynamics limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriverType {
    Cautious,
    Normal,
    Aggressive,
}

/// The nearest thing ahead of a vehicle along its route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectAhead {
    None,
    Vehicle(VehicleId),
    Light(LightId),
}

/// An object ahead of a vehicle, as seen by the car following model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leader {
    /// What the object is.
    pub object: ObjectAhead,
    /// The centre-to-centre distance along the route, in m.
    pub gap: f64,
    /// The object's speed in m/s.
    pub speed: f64,
    /// The object's length in m; zero for lights.
    pub length: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            max_acc: 2.5,
            max_dec: 4.5,
            max_speed: 13.9,
            min_speed: 0.0,
            max_lat_acc: 3.0,
            time_gap: 1.5,
        }
    }
}

impl Default for VehicleSize {
    fn default() -> Self {
        Self {
            length: 4.5,
            width: 1.8,
        }
    }
}

impl DriverType {
    /// Every driver type, in the order used for weighted sampling.
    pub const ALL: [DriverType; 3] = [
        DriverType::Cautious,
        DriverType::Normal,
        DriverType::Aggressive,
    ];

    /// Applies the driver's temperament to a set of base attributes.
    pub fn adjust(&self, base: &VehicleAttributes) -> VehicleAttributes {
        let (gap, acc, speed) = match self {
            DriverType::Cautious => (1.3, 0.8, 0.9),
            DriverType::Normal => (1.0, 1.0, 1.0),
            DriverType::Aggressive => (0.7, 1.25, 1.1),
        };
        VehicleAttributes {
            time_gap: base.time_gap * gap,
            max_acc: base.max_acc * acc,
            max_speed: base.max_speed * speed,
            ..*base
        }
    }
}

impl Leader {
    /// A red or amber light at the given distance ahead.
    pub fn light(id: LightId, gap: f64) -> Self {
        Self {
            object: ObjectAhead::Light(id),
            gap,
            speed: 0.0,
            length: 0.0,
        }
    }
}

impl Vehicle {
    /// Creates a new, stationary vehicle at the start of the given path.
    pub(crate) fn new(
        id: VehicleId,
        route: RouteId,
        path: &Path,
        size: VehicleSize,
        attributes: VehicleAttributes,
        driver: DriverType,
        now: f64,
    ) -> Self {
        let start = path.nearest_sample(0.0);
        Self {
            id,
            route,
            path_index: 0,
            path: path.id(),
            dist: 0.0,
            vel: attributes.min_speed,
            acc: 0.0,
            size,
            attributes,
            driver,
            model: AccelerationModel::new(&ModelParams {
                time_headway: attributes.time_gap,
                max_acceleration: attributes.max_acc,
                max_deceleration: attributes.max_dec,
            }),
            wait_time: 0.0,
            spawn_time: now,
            lane_change: 0.0,
            world_pos: start.pos,
            heading: start.heading,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The route the vehicle is following.
    pub fn route_id(&self) -> RouteId {
        self.route
    }

    /// The index of the vehicle's current path within its route.
    pub fn path_index(&self) -> usize {
        self.path_index
    }

    /// The ID of the path the vehicle is currently travelling on.
    pub fn path_id(&self) -> PathId {
        self.path
    }

    /// The distance of the vehicle's centre along its current path, in m.
    pub fn path_distance(&self) -> f64 {
        self.dist
    }

    /// The vehicle's velocity in m/s.
    pub fn speed(&self) -> f64 {
        self.vel
    }

    /// The vehicle's acceleration over the last tick in m/s<sup>2</sup>.
    pub fn acceleration(&self) -> f64 {
        self.acc
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.size.length
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        self.size.width
    }

    /// The vehicle's dimensions.
    pub fn size(&self) -> VehicleSize {
        self.size
    }

    /// The vehicle's dynamics limits.
    pub fn attributes(&self) -> &VehicleAttributes {
        &self.attributes
    }

    /// The vehicle's driver type.
    pub fn driver(&self) -> DriverType {
        self.driver
    }

    /// The total time the vehicle has spent stopped, in s.
    pub fn wait_time(&self) -> f64 {
        self.wait_time
    }

    /// The simulation time at which the vehicle was created, in s.
    pub fn spawn_time(&self) -> f64 {
        self.spawn_time
    }

    /// Whether the vehicle is part-way through a lane change.
    pub fn changing_lane(&self) -> bool {
        self.lane_change > 0.0
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.world_pos
    }

    /// The vehicle's heading in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The rectangle occupied by the vehicle in world space.
    pub fn footprint(&self) -> Footprint {
        Footprint::new(
            self.id,
            self.world_pos,
            self.heading,
            self.size.length,
            self.size.width,
        )
    }

    /// Moves the vehicle onto another path of its route.
    pub(crate) fn set_location(&mut self, path_index: usize, path: PathId, dist: f64) {
        self.path_index = path_index;
        self.path = path;
        self.dist = dist;
    }

    /// Flags the vehicle as changing lanes for `duration` seconds.
    pub(crate) fn start_lane_change(&mut self, duration: f64) {
        self.lane_change = duration;
    }

    /// Applies the car following model against the object ahead, then
    /// integrates the vehicle's speed and position.
    ///
    /// # Parameters
    /// * `leader` - The object ahead, if there is one
    /// * `curvature` - The curvature of the path at the vehicle's position
    /// * `dt` - The time step in seconds
    pub(crate) fn update(
        &mut self,
        leader: Option<&Leader>,
        curvature: f64,
        dt: f64,
        config: &SimConfig,
    ) {
        let (lead_vel, net_dist) = match leader {
            Some(leader) => (
                leader.speed,
                leader.gap - 0.5 * (self.size.length + leader.length),
            ),
            None => (config.free_road_speed, config.free_road_gap),
        };
        let acc = self
            .model
            .follow(net_dist, self.vel, lead_vel, self.acc < 0.0);

        // Slow down for bends
        let min_speed = self.attributes.min_speed;
        let max_speed = f64::min(
            self.attributes.max_speed,
            cornering_speed(self.attributes.max_lat_acc, curvature),
        )
        .max(min_speed);

        let vel = (self.vel + acc * dt).clamp(min_speed, max_speed);
        self.acc = if dt > 0.0 { (vel - self.vel) / dt } else { 0.0 };
        self.vel = vel;
        self.dist += vel * dt;

        if self.vel < config.stopped_speed_threshold {
            self.wait_time += dt;
        }
        self.lane_change = f64::max(self.lane_change - dt, 0.0);
    }

    /// Updates the vehicle's world coordinates from its current path.
    /// Past the end of the path, the last sample is used.
    pub(crate) fn update_coords(&mut self, path: &Path) {
        let sample = path
            .sample_at_distance(self.dist)
            .unwrap_or_else(|| path.nearest_sample(self.dist));
        self.world_pos = sample.pos;
        self.heading = sample.heading;
    }
}

impl Keyed for Vehicle {
    type Key = VehicleId;

    fn key(&self) -> VehicleId {
        self.id
    }
}
