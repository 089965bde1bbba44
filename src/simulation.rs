use crate::collision::detect_collisions;
use crate::config::SimConfig;
use crate::congestion::{occupancy, CongestionTracker};
use crate::error::Error;
use crate::light::{LightRecord, LightState, LightTimings, TrafficLight};
use crate::metrics::{DelayRecord, Metrics, PathCongestion, VehiclePosition};
use crate::node::{Node, NodeRecord};
use crate::path::{Path, PathRecord};
use crate::route::{Route, RouteBuilder, Transition};
use crate::spawner::{PendingSpawn, SpawnModel, Spawner};
use crate::vehicle::{DriverType, Leader, ObjectAhead, Vehicle, VehicleSize};
use crate::{
    LightId, LightSet, NodeId, NodeSet, PathId, PathSet, RouteId, RouteSet, SimRng, VehicleId,
    VehicleSet,
};
use log::{debug, info, trace, warn};
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A pending spawn blocked for longer than this is reported, in s.
const BLOCKED_SPAWN_WARNING: f64 = 30.0;

/// A traffic simulation of a single junction.
///
/// Each call to [Simulation::step] advances the simulation by one tick of
/// `1 / tick_rate` seconds. Given the same seed, junction and sequence of
/// calls, every run is identical.
pub struct Simulation {
    /// The simulation parameters.
    config: SimConfig,
    /// The nodes of the junction.
    nodes: NodeSet,
    /// The paths between nodes.
    paths: PathSet,
    /// The traffic lights.
    lights: LightSet,
    /// The light gating entry onto each light's head path.
    gates: HashMap<PathId, LightId>,
    /// The routes through the junction.
    routes: RouteSet,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The spawners, in the order they were added.
    spawners: Vec<Spawner>,
    /// Congestion trackers for the configured paths.
    congestion: Vec<CongestionTracker>,
    /// The colliding pairs found on the last tick.
    collisions: Vec<(VehicleId, VehicleId)>,
    /// The journeys of vehicles which have left the junction.
    delays: Vec<DelayRecord>,
    /// The random number generator.
    rng: SimRng,
    /// The seed the random number generator was last reset with.
    seed: u64,
    /// The ID of the next vehicle to be created.
    next_vehicle: u64,
    /// The number of ticks simulated.
    tick: u64,
    /// The simulation time in s.
    time: f64,
    /// The number of vehicles created.
    spawned: u64,
    /// The number of colliding pairs, summed over every tick.
    collision_ticks: u64,
}

/// A vehicle's position on a path, captured before any vehicle moves.
#[derive(Clone, Copy, Debug)]
struct Occupant {
    id: VehicleId,
    dist: f64,
    speed: f64,
    length: f64,
}

/// The vehicles on each path, ordered by distance along it.
type Occupancy = HashMap<PathId, SmallVec<[Occupant; 8]>>;

impl Occupant {
    fn leader(&self, gap: f64) -> Leader {
        Leader {
            object: ObjectAhead::Vehicle(self.id),
            gap,
            speed: self.speed,
            length: self.length,
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default(), 0)
    }
}

impl Simulation {
    /// Creates an empty simulation.
    pub fn new(config: SimConfig, seed: u64) -> Self {
        Self {
            config,
            nodes: NodeSet::new(),
            paths: PathSet::new(),
            lights: LightSet::new(),
            gates: HashMap::new(),
            routes: RouteSet::new(),
            vehicles: VehicleSet::new(),
            spawners: vec![],
            congestion: vec![],
            collisions: vec![],
            delays: vec![],
            rng: SimRng::seed_from_u64(seed),
            seed,
            next_vehicle: 0,
            tick: 0,
            time: 0.0,
            spawned: 0,
            collision_ticks: 0,
        }
    }

    /// Loads a junction, replacing any existing one, and generates its routes.
    ///
    /// Every vehicle and spawner is removed, the clock is reset to zero
    /// and the random number generator is reset to its seed.
    pub fn load(
        &mut self,
        nodes: &[NodeRecord],
        paths: &[PathRecord],
        lights: &[LightRecord],
    ) -> Result<(), Error> {
        self.config.validate()?;
        let mut node_set = NodeSet::new();
        for record in nodes {
            if !node_set.insert(Node::new(record)) {
                return Err(Error::DuplicateNode(record.id));
            }
        }

        let mut path_set = PathSet::new();
        for record in paths {
            if path_set.contains(record.id) {
                return Err(Error::DuplicatePath(record.id));
            }
            let node = |node| {
                node_set.get(node).ok_or(Error::UnknownNode {
                    path: record.id,
                    node,
                })
            };
            let (start, end) = (node(record.start)?, node(record.end)?);
            path_set.insert(Path::build(record, start, end, &self.config));
        }
        for path in &path_set {
            if let Some(other) = path
                .parallel_paths()
                .iter()
                .find(|id| !path_set.contains(**id))
            {
                return Err(Error::UnknownPath(*other));
            }
        }

        let mut light_set = LightSet::new();
        let mut gates = HashMap::new();
        for record in lights {
            let head = *record.paths.first().ok_or(Error::EmptyLight(record.id))?;
            let start = path_set
                .get(head)
                .ok_or(Error::UnknownPath(head))?
                .start_node();
            for id in &record.paths {
                let path = path_set.get(*id).ok_or(Error::UnknownPath(*id))?;
                if path.start_node() != start {
                    return Err(Error::DivergentLight(record.id));
                }
            }
            if !light_set.insert(TrafficLight::new(record)) {
                return Err(Error::DuplicateLight(record.id));
            }
            // Only the head path is gated
            gates.insert(head, record.id);
        }

        let congestion = self
            .config
            .backup
            .paths
            .iter()
            .map(|id| {
                if path_set.contains(*id) {
                    Ok(CongestionTracker::new(*id))
                } else {
                    Err(Error::UnknownPath(*id))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut route_set = RouteSet::new();
        for route in RouteBuilder::generate(&node_set, &path_set) {
            route_set.insert(route);
        }

        info!(
            "Loaded junction with {} nodes, {} paths, {} lights and {} routes",
            node_set.len(),
            path_set.len(),
            light_set.len(),
            route_set.len()
        );

        self.nodes = node_set;
        self.paths = path_set;
        self.lights = light_set;
        self.gates = gates;
        self.routes = route_set;
        self.congestion = congestion;
        self.vehicles.clear();
        self.spawners.clear();
        self.collisions.clear();
        self.delays.clear();
        self.next_vehicle = 0;
        self.tick = 0;
        self.time = 0.0;
        self.spawned = 0;
        self.collision_ticks = 0;
        self.rng = SimRng::seed_from_u64(self.seed);
        Ok(())
    }

    /// Moves a node, rebuilding the paths which start or end at it.
    ///
    /// The junction's topology is unchanged, so routes and vehicles are kept.
    /// Vehicles beyond the end of a shortened path are moved back onto it.
    pub fn edit_node(&mut self, record: &NodeRecord) {
        let id = record.id;
        let node = Node::new(record);
        self.nodes[id].set_pose(node.pos(), node.angle());

        let mut rebuilt = 0;
        for path in self.paths.iter_mut() {
            let (start, end) = (path.start_node(), path.end_node());
            if start == id || end == id {
                path.rebuild(&self.nodes[start], &self.nodes[end], &self.config);
                rebuilt += 1;
            }
        }
        for route in self.routes.iter_mut() {
            route.refresh_length(&self.paths);
        }
        for vehicle in self.vehicles.iter_mut() {
            let path = &self.paths[vehicle.path_id()];
            let dist = vehicle.path_distance().min(path.length());
            vehicle.set_location(vehicle.path_index(), path.id(), dist);
            vehicle.update_coords(path);
        }

        info!("Moved node {}, rebuilding {} paths", id, rebuilt);
    }

    /// Adds a spawner at an entry node, replacing any existing spawner there.
    pub fn add_spawner(&mut self, node: NodeId, model: SpawnModel) -> Result<(), Error> {
        if !self.routes.iter().any(|route| route.entry_node() == node) {
            return Err(Error::NotEntryNode(node));
        }
        let spawner = Spawner::new(node, model, self.config.start_hour)?;
        match self.spawners.iter_mut().find(|s| s.node() == node) {
            Some(existing) => *existing = spawner,
            None => self.spawners.push(spawner),
        }
        Ok(())
    }

    /// Adds a vehicle at the start of a route.
    pub fn add_vehicle(
        &mut self,
        route: RouteId,
        size: VehicleSize,
        driver: DriverType,
    ) -> Result<VehicleId, Error> {
        let path = self
            .routes
            .get(route)
            .and_then(|r| r.path(0))
            .ok_or(Error::UnknownRoute(route))?;
        let id = VehicleId(self.next_vehicle);
        let attributes = driver.adjust(&self.config.default_vehicle);
        let vehicle = Vehicle::new(
            id,
            route,
            &self.paths[path],
            size,
            attributes,
            driver,
            self.time,
        );
        self.vehicles.insert(vehicle);
        self.next_vehicle += 1;
        self.spawned += 1;
        debug!("Spawned vehicle {} on route {}", id, route);
        Ok(id)
    }

    /// Removes a vehicle from the simulation without recording its delay.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.remove(id)
    }

    /// Sets the state of a traffic light.
    pub fn set_light_state(&mut self, id: LightId, state: LightState) {
        let light = &mut self.lights[id];
        if light.state() != state {
            debug!("Light {} set to {:?}", id, state);
        }
        light.set_state(state);
    }

    /// Enables or disables a light's internal phase cycle.
    pub fn set_light_cycling(&mut self, id: LightId, cycling: bool) {
        self.lights[id].set_cycling(cycling);
    }

    /// Sets the phase durations of a light's internal cycle.
    pub fn set_light_timings(&mut self, id: LightId, timings: LightTimings) {
        self.lights[id].set_timings(timings);
    }

    /// Resets the random number generator and every spawner.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SimRng::seed_from_u64(seed);
        for spawner in &mut self.spawners {
            spawner.reset();
        }
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        let dt = self.config.dt();
        self.spawn_vehicles();
        self.update_lights(dt);
        self.advance_vehicles();
        self.update_vehicles(dt);
        self.update_collisions();
        self.update_congestion(dt);
        self.tick += 1;
        self.time = self.tick as f64 * dt;
        trace!(
            "Tick {}: {} vehicles, {} collisions",
            self.tick,
            self.vehicles.len(),
            self.collisions.len()
        );
    }

    /// Steps the simulation until `stop` returns true, or `max_ticks` ticks
    /// have been simulated. `stop` is checked before every tick.
    /// Returns the number of ticks simulated.
    pub fn run(&mut self, max_ticks: Option<u64>, mut stop: impl FnMut(&Self) -> bool) -> u64 {
        let mut ticks = 0;
        while max_ticks.map_or(true, |max| ticks < max) && !stop(self) {
            self.step();
            ticks += 1;
        }
        ticks
    }

    /// The simulation parameters.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The number of ticks simulated.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The time of day in s since midnight.
    pub fn time_of_day(&self) -> f64 {
        self.config.start_hour * 3600.0 + self.time
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn iter_paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }

    pub fn iter_lights(&self) -> impl Iterator<Item = &TrafficLight> {
        self.lights.iter()
    }

    pub fn iter_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    /// The spawners, in the order they were added.
    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    /// The routes which begin at the given node.
    pub fn routes_from(&self, node: NodeId) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |r| r.entry_node() == node)
    }

    /// Gets a reference to the node with the given ID.
    pub fn get_node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Gets a reference to the path with the given ID.
    pub fn get_path(&self, id: PathId) -> &Path {
        &self.paths[id]
    }

    /// Gets a reference to the light with the given ID.
    pub fn get_light(&self, id: LightId) -> &TrafficLight {
        &self.lights[id]
    }

    /// Gets a reference to the route with the given ID.
    pub fn get_route(&self, id: RouteId) -> &Route {
        &self.routes[id]
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id]
    }

    /// The nearest object ahead of a vehicle along its route.
    pub fn object_ahead(&self, id: VehicleId) -> Option<Leader> {
        self.find_leader(&self.vehicles[id], &self.occupancy())
    }

    /// The placement of every vehicle in world space.
    pub fn get_vehicle_positions(&self) -> Vec<VehiclePosition> {
        self.vehicles
            .iter()
            .map(|v| VehiclePosition {
                x: v.position().x,
                y: v.position().y,
                heading: v.heading(),
                length: v.length(),
                width: v.width(),
                id: v.id(),
            })
            .collect()
    }

    /// The delay of every vehicle which has completed its route, in s.
    pub fn get_delays(&self) -> Vec<f64> {
        self.delays.iter().map(|d| d.delay).collect()
    }

    /// The journeys of every vehicle which has completed its route.
    pub fn delay_records(&self) -> &[DelayRecord] {
        &self.delays
    }

    /// Finds the pairs of vehicles which currently overlap.
    pub fn detect_collisions(&self) -> Vec<(VehicleId, VehicleId)> {
        let footprints = self.vehicles.iter().map(|v| v.footprint()).collect::<Vec<_>>();
        detect_collisions(&footprints)
    }

    /// The colliding pairs found on the last tick.
    pub fn collisions(&self) -> &[(VehicleId, VehicleId)] {
        &self.collisions
    }

    /// Whether the given path is currently backed up.
    /// Always false for paths whose congestion is not tracked.
    pub fn is_backed_up(&self, path: PathId) -> bool {
        self.congestion
            .iter()
            .any(|t| t.path() == path && t.is_backed_up())
    }

    /// A snapshot of the simulation's metrics.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            ticks: self.tick,
            time: self.time,
            vehicles: self.vehicles.len(),
            spawned: self.spawned,
            retired: self.delays.len() as u64,
            collisions: self.collisions.len(),
            collision_ticks: self.collision_ticks,
            congestion: self
                .congestion
                .iter()
                .map(|t| PathCongestion {
                    path: t.path(),
                    backed_up: t.is_backed_up(),
                    stats: t.stats(),
                })
                .collect(),
            delays: self.delays.clone(),
        }
    }

    /// Emits vehicles from every spawner which is due and has space.
    fn spawn_vehicles(&mut self) {
        for idx in 0..self.spawners.len() {
            if self.spawners[idx].pending().is_none() {
                if !self.spawners[idx].nudge(self.time, &mut self.rng) {
                    continue;
                }
                let node = self.spawners[idx].node();
                let routes = self
                    .routes_from(node)
                    .map(|r| r.id())
                    .collect::<SmallVec<[RouteId; 8]>>();
                if routes.is_empty() {
                    continue;
                }
                let route = routes[self.rng.gen_range(0..routes.len())];
                let model = self.spawners[idx].model();
                let size = model.size.sample(&mut self.rng);
                let driver = model.sample_driver(&mut self.rng);
                self.spawners[idx].set_pending(PendingSpawn {
                    route,
                    size,
                    driver,
                    since: self.time,
                });
            }

            let Some(pending) = self.spawners[idx].pending().copied() else {
                continue;
            };
            if self.entry_is_clear(pending.route, pending.size.length) {
                self.spawners[idx].take_pending();
                if let Err(err) = self.add_vehicle(pending.route, pending.size, pending.driver) {
                    warn!("Failed to spawn at node {}: {}", self.spawners[idx].node(), err);
                }
            } else if self.time - pending.since > BLOCKED_SPAWN_WARNING
                && self.spawners[idx].warn_once()
            {
                warn!(
                    "Spawn at node {} blocked for over {} s",
                    self.spawners[idx].node(),
                    BLOCKED_SPAWN_WARNING
                );
            }
        }
    }

    /// Whether a vehicle of the given length may enter a route
    /// without overlapping the vehicles already on its first path.
    fn entry_is_clear(&self, route: RouteId, length: f64) -> bool {
        let Some(path) = self.routes[route].path(0) else {
            return false;
        };
        !self
            .vehicles
            .iter()
            .any(|v| v.path_id() == path && v.path_distance() < 2.0 * length)
    }

    /// Advances the traffic lights' internal cycles.
    fn update_lights(&mut self, dt: f64) {
        for light in self.lights.iter_mut() {
            if light.step(dt) {
                debug!("Light {} changed to {:?}", light.id(), light.state());
            }
        }
    }

    /// Moves vehicles past the end of their path onto the next path of their
    /// route, and retires those which have completed their route.
    fn advance_vehicles(&mut self) {
        let mut retired = vec![];

        for vehicle in self.vehicles.iter_mut() {
            let route = &self.routes[vehicle.route_id()];
            loop {
                let idx = vehicle.path_index();
                let path = &self.paths[vehicle.path_id()];
                let dist = vehicle.path_distance();
                match route.transition(idx) {
                    None => {
                        if dist >= path.length() {
                            retired.push(vehicle.id());
                        }
                        break;
                    }
                    Some(Transition::Follow) => {
                        if dist < path.length() {
                            break;
                        }
                        let next = route.paths()[idx + 1];
                        vehicle.set_location(idx + 1, next, dist - path.length());
                    }
                    Some(Transition::LaneChange) => {
                        if dist < self.config.lane_change_point * path.length() {
                            break;
                        }
                        let next = &self.paths[route.paths()[idx + 1]];
                        let dist = next.arc_length_at_s(path.s_at_arc_length(dist));
                        vehicle.set_location(idx + 1, next.id(), dist);
                        vehicle.start_lane_change(self.config.lane_change_duration);
                        debug!(
                            "Vehicle {} changed lanes from path {} to {}",
                            vehicle.id(),
                            path.id(),
                            next.id()
                        );
                    }
                }
            }
        }

        if retired.is_empty() {
            return;
        }
        for id in &retired {
            let vehicle = &self.vehicles[*id];
            let route = &self.routes[vehicle.route_id()];
            let travel_time = self.time - vehicle.spawn_time();
            let max_speed = vehicle.attributes().max_speed;
            let free_time = if max_speed > 0.0 {
                route.length() / max_speed
            } else {
                0.0
            };
            self.delays.push(DelayRecord {
                vehicle: *id,
                route: route.id(),
                spawn_time: vehicle.spawn_time(),
                exit_time: self.time,
                wait_time: vehicle.wait_time(),
                delay: (travel_time - free_time).max(0.0),
            });
            debug!("Vehicle {} completed route {}", id, route.id());
        }
        self.vehicles.retain(|v| !retired.contains(&v.id()));
    }

    /// Captures the positions of every vehicle, grouped by path.
    fn occupancy(&self) -> Occupancy {
        let mut occupancy = Occupancy::new();
        for vehicle in self.vehicles.iter() {
            occupancy
                .entry(vehicle.path_id())
                .or_default()
                .push(Occupant {
                    id: vehicle.id(),
                    dist: vehicle.path_distance(),
                    speed: vehicle.speed(),
                    length: vehicle.length(),
                });
        }
        for occupants in occupancy.values_mut() {
            occupants.sort_by(|a, b| a.dist.total_cmp(&b.dist).then(a.id.cmp(&b.id)));
        }
        occupancy
    }

    /// Finds the nearest vehicle, or light which is not green, ahead of a vehicle.
    ///
    /// Vehicles on the same path are checked first. Otherwise the rest of the
    /// route is searched in order, measuring each path from the point the
    /// vehicle would join it.
    fn find_leader(&self, vehicle: &Vehicle, occupancy: &Occupancy) -> Option<Leader> {
        let dist = vehicle.path_distance();
        let ahead = occupancy
            .get(&vehicle.path_id())
            .and_then(|occ| occ.iter().find(|o| o.dist > dist && o.id != vehicle.id()));
        if let Some(occupant) = ahead {
            return Some(occupant.leader(occupant.dist - dist));
        }

        let route = &self.routes[vehicle.route_id()];
        let mut idx = vehicle.path_index();
        let mut path = &self.paths[vehicle.path_id()];
        // The position of the start of the next path, in the current path's frame
        let mut offset = 0.0;

        while let Some(transition) = route.transition(idx) {
            let next = &self.paths[route.paths()[idx + 1]];
            match transition {
                Transition::Follow => {
                    offset += path.length();
                    let red = self
                        .gates
                        .get(&next.id())
                        .map(|id| &self.lights[*id])
                        .filter(|light| !light.allows_traffic());
                    if let Some(light) = red {
                        return Some(Leader::light(light.id(), offset - dist));
                    }
                }
                Transition::LaneChange => {
                    let switch = self.config.lane_change_point * path.length();
                    offset += switch - next.arc_length_at_s(path.s_at_arc_length(switch));
                }
            }

            let ahead = occupancy
                .get(&next.id())
                .and_then(|occ| occ.iter().find(|o| offset + o.dist > dist));
            if let Some(occupant) = ahead {
                return Some(occupant.leader(offset + occupant.dist - dist));
            }

            path = next;
            idx += 1;
        }

        None
    }

    /// Applies the car following model to every vehicle.
    ///
    /// The objects ahead of all vehicles are found before any vehicle moves.
    fn update_vehicles(&mut self, dt: f64) {
        let occupancy = self.occupancy();
        let leaders = self
            .vehicles
            .iter()
            .map(|v| self.find_leader(v, &occupancy))
            .collect::<Vec<_>>();

        for (vehicle, leader) in self.vehicles.iter_mut().zip(leaders) {
            let path = &self.paths[vehicle.path_id()];
            let curvature = path.nearest_sample(vehicle.path_distance()).curvature;
            vehicle.update(leader.as_ref(), curvature, dt, &self.config);
            vehicle.update_coords(path);
        }
    }

    fn update_collisions(&mut self) {
        self.collisions = self.detect_collisions();
        if !self.collisions.is_empty() {
            debug!(
                "Tick {}: {} colliding pairs",
                self.tick,
                self.collisions.len()
            );
        }
        self.collision_ticks += self.collisions.len() as u64;
    }

    /// Records the slow-moving occupancy of every tracked path.
    fn update_congestion(&mut self, dt: f64) {
        let threshold = self.config.backup.speed_threshold;
        for tracker in &mut self.congestion {
            let path = tracker.path();
            let lengths = self
                .vehicles
                .iter()
                .filter(|v| v.path_id() == path && v.speed() < threshold)
                .map(|v| v.length());
            let occ = occupancy(self.paths[path].length(), lengths);
            if tracker.record(occ, dt, &self.config.backup) {
                debug!("Path {} is backed up", path);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn node(id: u32, x: f64, y: f64) -> NodeRecord {
        NodeRecord {
            id: NodeId(id),
            x,
            y,
            angle: 0.0,
        }
    }

    fn path(id: u32, start: u32, end: u32, parallel: &[u32]) -> PathRecord {
        PathRecord {
            id: PathId(id),
            start: NodeId(start),
            end: NodeId(end),
            parallel: parallel.iter().map(|id| PathId(*id)).collect(),
        }
    }

    fn light(id: u32, paths: &[u32]) -> LightRecord {
        LightRecord {
            id: LightId(id),
            paths: paths.iter().map(|id| PathId(*id)).collect(),
        }
    }

    /// An approach path followed by a path gated by light 1.
    fn chain() -> Simulation {
        let mut sim = Simulation::default();
        sim.load(
            &[node(1, 0.0, 0.0), node(2, 50.0, 0.0), node(3, 100.0, 0.0)],
            &[path(1, 1, 2, &[]), path(2, 2, 3, &[])],
            &[light(1, &[2])],
        )
        .unwrap();
        sim
    }

    /// Two lanes with lane changes allowed between them.
    fn two_lanes() -> Simulation {
        let mut sim = Simulation::default();
        sim.load(
            &[
                node(1, 0.0, 0.0),
                node(2, 0.0, -3.5),
                node(3, 80.0, 0.0),
                node(4, 80.0, -3.5),
            ],
            &[path(1, 1, 3, &[2]), path(2, 2, 4, &[1])],
            &[],
        )
        .unwrap();
        sim
    }

    #[test]
    fn rejects_invalid_junctions() {
        let mut sim = Simulation::default();
        let nodes = [node(1, 0.0, 0.0), node(2, 50.0, 0.0), node(3, 50.0, 20.0)];

        let err = sim.load(&[node(1, 0.0, 0.0), node(1, 1.0, 0.0)], &[], &[]);
        assert!(matches!(err, Err(Error::DuplicateNode(NodeId(1)))));

        let err = sim.load(&nodes, &[path(1, 1, 9, &[])], &[]);
        assert!(matches!(
            err,
            Err(Error::UnknownNode {
                path: PathId(1),
                node: NodeId(9)
            })
        ));

        let err = sim.load(&nodes, &[path(1, 1, 2, &[]), path(1, 1, 3, &[])], &[]);
        assert!(matches!(err, Err(Error::DuplicatePath(PathId(1)))));

        let err = sim.load(&nodes, &[path(1, 1, 2, &[7])], &[]);
        assert!(matches!(err, Err(Error::UnknownPath(PathId(7)))));

        let paths = [path(1, 1, 2, &[]), path(2, 2, 3, &[]), path(3, 1, 3, &[])];
        let err = sim.load(&nodes, &paths, &[light(1, &[])]);
        assert!(matches!(err, Err(Error::EmptyLight(LightId(1)))));

        let err = sim.load(&nodes, &paths, &[light(1, &[1, 2])]);
        assert!(matches!(err, Err(Error::DivergentLight(LightId(1)))));

        let err = sim.load(&nodes, &paths, &[light(1, &[1, 3]), light(1, &[2])]);
        assert!(matches!(err, Err(Error::DuplicateLight(LightId(1)))));

        let mut config = SimConfig::default();
        config.backup.paths = vec![PathId(5)];
        let mut sim = Simulation::new(config, 0);
        let err = sim.load(&nodes, &paths, &[]);
        assert!(matches!(err, Err(Error::UnknownPath(PathId(5)))));
    }

    #[test]
    fn rejects_degenerate_config() {
        let nodes = [node(1, 0.0, 0.0), node(2, 50.0, 0.0)];
        let paths = [path(1, 1, 2, &[])];

        let mut config = SimConfig::default();
        config.discrete_length_increment_size = 0.0;
        let mut sim = Simulation::new(config, 0);
        let err = sim.load(&nodes, &paths, &[]);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
        assert_eq!(sim.iter_routes().count(), 0);

        let mut config = SimConfig::default();
        config.tick_rate = 0.0;
        let mut sim = Simulation::new(config, 0);
        let err = sim.load(&nodes, &paths, &[]);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn spawners_need_entry_nodes() {
        let mut sim = chain();
        assert!(sim.add_spawner(NodeId(1), SpawnModel::default()).is_ok());
        assert!(matches!(
            sim.add_spawner(NodeId(2), SpawnModel::default()),
            Err(Error::NotEntryNode(NodeId(2)))
        ));
        // Replaces the existing spawner
        assert!(sim.add_spawner(NodeId(1), SpawnModel::uniform(5.0, 1.0)).is_ok());
        assert_eq!(sim.spawners().len(), 1);
        assert_eq!(sim.spawners()[0].model().hourly[0].mean, 5.0);

        assert!(matches!(
            sim.add_vehicle(RouteId(3), VehicleSize::default(), DriverType::Normal),
            Err(Error::UnknownRoute(RouteId(3)))
        ));
    }

    #[test]
    fn vehicle_completes_route() {
        let mut sim = chain();
        let route = sim.routes_from(NodeId(1)).next().unwrap().id();
        let id = sim
            .add_vehicle(route, VehicleSize::default(), DriverType::Normal)
            .unwrap();

        let ticks = sim.run(Some(10_000), |sim| sim.iter_vehicles().count() == 0);
        assert!(ticks < 10_000);

        let records = sim.delay_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vehicle, id);
        assert!(records[0].delay >= 0.0);
        assert!(records[0].travel_time() > sim.get_route(route).length() / 13.9);
        assert_eq!(sim.get_delays(), vec![records[0].delay]);
        assert_eq!(sim.metrics().retired, 1);
        assert_eq!(sim.metrics().spawned, 1);
    }

    #[test]
    fn carries_overshoot_onto_next_path() {
        let mut sim = chain();
        let id = sim
            .add_vehicle(RouteId(0), VehicleSize::default(), DriverType::Normal)
            .unwrap();
        sim.run(None, |sim| sim.get_vehicle(id).path_index() == 1);
        let vehicle = sim.get_vehicle(id);
        assert_eq!(vehicle.path_id(), PathId(2));
        // The overshoot plus one tick of travel
        let step = vehicle.speed() * sim.config().dt();
        assert!(vehicle.path_distance() > 0.0);
        assert!(vehicle.path_distance() < 2.0 * step + 1e-9);
    }

    #[test]
    fn red_light_is_object_ahead() {
        let mut sim = chain();
        sim.set_light_state(LightId(1), LightState::Red);
        let id = sim
            .add_vehicle(RouteId(0), VehicleSize::default(), DriverType::Normal)
            .unwrap();

        let leader = sim.object_ahead(id).unwrap();
        assert_eq!(leader.object, ObjectAhead::Light(LightId(1)));
        assert_approx_eq!(leader.gap, sim.get_path(PathId(1)).length());

        // Vehicles queue at the light
        sim.run(Some(60 * 60), |_| false);
        let vehicle = sim.get_vehicle(id);
        assert_eq!(vehicle.path_id(), PathId(1));
        assert!(vehicle.speed() < 0.1);
        assert!(vehicle.wait_time() > 30.0);

        sim.set_light_state(LightId(1), LightState::Green);
        assert_eq!(sim.object_ahead(id), None);
        sim.run(None, |sim| sim.iter_vehicles().count() == 0);
        assert_eq!(sim.delay_records().len(), 1);
        assert!(sim.delay_records()[0].wait_time > 30.0);
    }

    #[test]
    fn only_the_head_path_is_gated() {
        let mut sim = Simulation::default();
        sim.load(
            &[
                node(1, 0.0, 0.0),
                node(2, 50.0, 0.0),
                node(3, 100.0, 0.0),
                node(4, 100.0, 20.0),
            ],
            &[path(1, 1, 2, &[]), path(2, 2, 3, &[]), path(3, 2, 4, &[])],
            &[light(1, &[2, 3])],
        )
        .unwrap();
        sim.set_light_state(LightId(1), LightState::Red);
        let route = |paths: [PathId; 2]| {
            sim.iter_routes()
                .find(|r| r.paths() == paths)
                .unwrap()
                .id()
        };
        let (head, other) = (route([PathId(1), PathId(2)]), route([PathId(1), PathId(3)]));

        // Side by side at the start, so neither is ahead of the other
        let stopped = sim
            .add_vehicle(head, VehicleSize::default(), DriverType::Normal)
            .unwrap();
        let free = sim
            .add_vehicle(other, VehicleSize::default(), DriverType::Normal)
            .unwrap();

        let leader = sim.object_ahead(stopped).unwrap();
        assert_eq!(leader.object, ObjectAhead::Light(LightId(1)));
        assert_eq!(sim.object_ahead(free), None);

        sim.run(Some(60 * 20), |_| false);
        assert_eq!(sim.get_vehicle(stopped).path_id(), PathId(1));
        assert_eq!(sim.delay_records().len(), 1);
        assert_eq!(sim.delay_records()[0].vehicle, free);
    }

    #[test]
    fn nearest_vehicle_ahead() {
        let mut sim = chain();
        let first = sim
            .add_vehicle(RouteId(0), VehicleSize::default(), DriverType::Normal)
            .unwrap();
        sim.run(Some(120), |_| false);
        let second = sim
            .add_vehicle(RouteId(0), VehicleSize::default(), DriverType::Normal)
            .unwrap();

        let leader = sim.object_ahead(second).unwrap();
        assert_eq!(leader.object, ObjectAhead::Vehicle(first));
        assert_approx_eq!(
            leader.gap,
            sim.get_vehicle(first).path_distance() - sim.get_vehicle(second).path_distance()
        );
        assert_eq!(sim.object_ahead(first), None);

        // The leader crosses onto the next path, and is still seen
        sim.run(None, |sim| sim.get_vehicle(first).path_index() == 1);
        let leader = sim.object_ahead(second).unwrap();
        assert_eq!(leader.object, ObjectAhead::Vehicle(first));
        let expected = sim.get_path(PathId(1)).length() + sim.get_vehicle(first).path_distance()
            - sim.get_vehicle(second).path_distance();
        assert_approx_eq!(leader.gap, expected);
    }

    #[test]
    fn changes_lanes_part_way() {
        let mut sim = two_lanes();
        let route = sim
            .iter_routes()
            .find(|r| r.paths() == [PathId(1), PathId(2)])
            .unwrap()
            .id();
        let id = sim
            .add_vehicle(route, VehicleSize::default(), DriverType::Normal)
            .unwrap();

        sim.run(None, |sim| sim.get_vehicle(id).path_index() == 1);
        let vehicle = sim.get_vehicle(id);
        assert_eq!(vehicle.path_id(), PathId(2));
        assert!(vehicle.changing_lane());
        let switch = sim.config().lane_change_point * sim.get_path(PathId(1)).length();
        assert!((vehicle.path_distance() - switch).abs() < 1.0);

        sim.run(Some(120), |_| false);
        assert!(!sim.get_vehicle(id).changing_lane());
        sim.run(None, |sim| sim.iter_vehicles().count() == 0);
        assert_eq!(sim.delay_records()[0].route, route);
    }

    #[test]
    fn sees_vehicles_in_target_lane() {
        let mut sim = two_lanes();
        let lane_2 = sim
            .iter_routes()
            .find(|r| r.paths() == [PathId(2)])
            .unwrap()
            .id();
        let changing = sim
            .iter_routes()
            .find(|r| r.paths() == [PathId(1), PathId(2)])
            .unwrap()
            .id();

        let ahead = sim
            .add_vehicle(lane_2, VehicleSize::default(), DriverType::Normal)
            .unwrap();
        sim.run(Some(240), |_| false);
        let behind = sim
            .add_vehicle(changing, VehicleSize::default(), DriverType::Normal)
            .unwrap();

        let leader = sim.object_ahead(behind).unwrap();
        assert_eq!(leader.object, ObjectAhead::Vehicle(ahead));
        // The lanes are parallel, so the gap is close to the difference in distance
        let diff = sim.get_vehicle(ahead).path_distance();
        assert!((leader.gap - diff).abs() < 1.0);
    }

    #[test]
    fn editing_a_node_rebuilds_paths() {
        let mut sim = chain();
        let before = sim.get_route(RouteId(0)).length();
        sim.edit_node(&node(3, 150.0, 0.0));

        let path = sim.get_path(PathId(2));
        assert!(path.length() > 99.0 && path.length() <= 100.0);
        let after = sim.get_route(RouteId(0)).length();
        assert_approx_eq!(after - before, 50.0, 1.0);
        assert_eq!(sim.get_node(NodeId(3)).pos().x, 150.0);
    }

    #[test]
    fn spawns_and_reseeds() {
        let mut sim = chain();
        sim.add_spawner(NodeId(1), SpawnModel::uniform(4.0, 1.0))
            .unwrap();
        sim.run(Some(60 * 60), |_| false);
        let spawned = sim.metrics().spawned;
        assert!(spawned >= 10, "{} spawned", spawned);
        assert!(sim.spawners()[0].last_emission() > 0.0);

        sim.reseed(99);
        assert_eq!(sim.spawners()[0].last_emission(), 0.0);
    }
}
