use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Instant;

use clap::Parser;
use junction_sim::{
    LightId, LightRecord, LightState, LightTimings, NodeId, NodeRecord, PathId, PathRecord,
    SimConfig, Simulation, SpawnModel,
};

/// The number of ticks simulated between progress reports.
const FRAMES: u64 = 1000;

/// The distance from the centre of the junction to the stop lines, in m.
const STOP_LINE: f64 = 15.0;

/// The length of each arm of the junction, in m.
const ARM_LENGTH: f64 = 100.0;

/// Half the width of a lane, in m.
const HALF_LANE: f64 = 1.75;

#[derive(Parser)]
#[command(name = "junction-sim")]
#[command(about = "Headless traffic simulation of a signalised crossroads")]
struct Cli {
    /// Seed for the random number generator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of ticks to simulate, overriding --hours
    #[arg(long)]
    ticks: Option<u64>,

    /// Simulated time in hours
    #[arg(long, default_value = "1.0")]
    hours: f64,

    /// Mean time between arrivals at each entry, in s
    #[arg(long, default_value = "8.0")]
    mean_arrival: f64,

    /// JSON file of simulation parameters
    #[cfg(feature = "serde")]
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Print the final metrics as JSON
    #[cfg(feature = "serde")]
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let ticks = cli
        .ticks
        .unwrap_or((cli.hours * 3600.0 * config.tick_rate).round() as u64);

    let mut sim = Simulation::new(config, cli.seed);
    let (nodes, paths, lights) = crossroads();
    sim.load(&nodes, &paths, &lights)?;

    // North-south and east-west phases alternate
    let timings = LightTimings {
        green: 20.0,
        amber: 3.0,
        red: 25.0,
        red_amber: 2.0,
    };
    for arm in 0..4 {
        for other in (0..4).filter(|other| *other != arm) {
            let light = turn_light(arm, other);
            sim.set_light_timings(light, timings);
            sim.set_light_cycling(light, true);
            if arm % 2 == 1 {
                sim.set_light_state(light, LightState::Red);
            }
        }
        let model = SpawnModel::uniform(cli.mean_arrival, 0.3 * cli.mean_arrival);
        sim.add_spawner(NodeId(10 * arm + 1), model)?;
    }

    println!(
        "Simulating {} ticks over {} routes...",
        ticks,
        sim.iter_routes().count()
    );
    let mut done = 0;
    while done < ticks {
        let batch = FRAMES.min(ticks - done);
        let start = Instant::now();
        sim.run(Some(batch), |_| false);
        done += batch;

        let frame = start.elapsed() / batch as u32;
        let dt = sim.config().dt() as f32;
        println!(
            "Avg. frame: {:?} --> {:.0}x speedup ({} vehs, {:.0} s simulated)",
            frame,
            dt / frame.as_secs_f32().max(f32::EPSILON),
            sim.iter_vehicles().count(),
            sim.time(),
        );
    }

    let metrics = sim.metrics();
    println!(
        "Spawned {}, completed {}, mean delay {}",
        metrics.spawned,
        metrics.retired,
        metrics
            .mean_delay()
            .map_or("n/a".to_string(), |d| format!("{:.1} s", d)),
    );
    println!("Colliding pairs over all ticks: {}", metrics.collision_ticks);
    for path in &metrics.congestion {
        println!(
            "Path {}: mean occupancy {:.2}, max {:.2}, backed up for {:.0} s over {} episodes",
            path.path,
            path.stats.mean,
            path.stats.max,
            path.stats.backed_up_time,
            path.stats.episodes
        );
    }

    #[cfg(feature = "serde")]
    {
        if cli.json {
            println!("{}", metrics.to_json());
        }
    }

    Ok(())
}

#[cfg(feature = "serde")]
fn load_config(cli: &Cli) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(file) => SimConfig::from_json(&std::fs::read_to_string(file)?)?,
        None => SimConfig::default(),
    };
    if config.backup.paths.is_empty() {
        config.backup.paths = approach_paths();
    }
    Ok(config)
}

#[cfg(not(feature = "serde"))]
fn load_config(_cli: &Cli) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut config = SimConfig::default();
    config.backup.paths = approach_paths();
    Ok(config)
}

/// The light gating the turn from arm `from` to arm `to`.
fn turn_light(from: u32, to: u32) -> LightId {
    LightId(10 * from + 5 + to)
}

/// The approach path of each arm.
fn approach_paths() -> Vec<PathId> {
    (0..4).map(|arm| PathId(10 * arm + 1)).collect()
}

/// A four-arm crossroads with one lane in each direction, driving on the right.
///
/// Each arm `k` has an entry, a stop line, a junction exit and an exit node,
/// with IDs `10k + 1` to `10k + 4`. Vehicles approach the stop line on path
/// `10k + 1`, cross the junction on paths starting at the stop line, and
/// leave on path `10k + 2`. Each crossing path has its own light.
fn crossroads() -> (Vec<NodeRecord>, Vec<PathRecord>, Vec<LightRecord>) {
    let mut nodes = vec![];
    let mut paths = vec![];
    let mut lights = vec![];

    for arm in 0..4u32 {
        // The direction from the centre out along the arm
        let out = arm as f64 * FRAC_PI_2;
        let inward = out + PI;
        let side = (out + FRAC_PI_2).cos() * HALF_LANE;
        let side_y = (out + FRAC_PI_2).sin() * HALF_LANE;
        let node = |id: u32, r: f64, lane: f64, angle: f64| NodeRecord {
            id: NodeId(10 * arm + id),
            x: r * out.cos() + lane * side,
            y: r * out.sin() + lane * side_y,
            angle,
        };
        nodes.push(node(1, ARM_LENGTH, 1.0, inward));
        nodes.push(node(2, STOP_LINE, 1.0, inward));
        nodes.push(node(3, STOP_LINE, -1.0, out));
        nodes.push(node(4, ARM_LENGTH, -1.0, out));

        paths.push(PathRecord {
            id: PathId(10 * arm + 1),
            start: NodeId(10 * arm + 1),
            end: NodeId(10 * arm + 2),
            parallel: vec![],
        });
        paths.push(PathRecord {
            id: PathId(10 * arm + 2),
            start: NodeId(10 * arm + 3),
            end: NodeId(10 * arm + 4),
            parallel: vec![],
        });

        for other in (0..4u32).filter(|other| *other != arm) {
            let id = PathId(10 * arm + 5 + other);
            paths.push(PathRecord {
                id,
                start: NodeId(10 * arm + 2),
                end: NodeId(10 * other + 3),
                parallel: vec![],
            });
            lights.push(LightRecord {
                id: turn_light(arm, other),
                paths: vec![id],
            });
        }
    }

    (nodes, paths, lights)
}
