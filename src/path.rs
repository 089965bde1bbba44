use crate::config::SimConfig;
use crate::math::{
    forward_stepped_points_along_curve, HermiteCurve2d, LookupTable, ParametricCurve2d, Point2d,
};
use crate::node::Node;
use crate::store::Keyed;
use crate::{NodeId, PathId};
use cgmath::prelude::*;
use smallvec::SmallVec;

/// A single lane of travel between two nodes.
///
/// The centre line is a cubic Hermite spline, discretized into samples
/// spaced one arc-length increment apart.
#[derive(Clone, Debug)]
pub struct Path {
    /// The path ID.
    id: PathId,
    /// The node at which the path begins.
    start: NodeId,
    /// The node at which the path ends.
    end: NodeId,
    /// Paths a vehicle may change lanes onto from this one.
    parallel: SmallVec<[PathId; 2]>,
    /// The spline defining the centre line.
    curve: HermiteCurve2d,
    /// The discretized samples, indexed by arc length.
    samples: LookupTable<PathSample>,
}

/// A path as supplied by the junction definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathRecord {
    pub id: PathId,
    pub start: NodeId,
    pub end: NodeId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parallel: Vec<PathId>,
}

/// A point on the discretized centre line of a [Path].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathSample {
    /// The spline parameter, in `[0, 1]`.
    pub s: f64,
    /// The world space position.
    pub pos: Point2d,
    /// The heading in radians.
    pub heading: f64,
    /// The unsigned curvature in 1/m.
    pub curvature: f64,
}

impl Path {
    /// Builds the path between two nodes.
    pub fn build(record: &PathRecord, start: &Node, end: &Node, config: &SimConfig) -> Self {
        let (curve, samples) = Self::discretize(start, end, config);
        Self {
            id: record.id,
            start: record.start,
            end: record.end,
            parallel: record.parallel.iter().copied().collect(),
            curve,
            samples,
        }
    }

    /// Rebuilds the geometry after one of the path's nodes has moved.
    pub(crate) fn rebuild(&mut self, start: &Node, end: &Node, config: &SimConfig) {
        (self.curve, self.samples) = Self::discretize(start, end, config);
    }

    fn discretize(
        start: &Node,
        end: &Node,
        config: &SimConfig,
    ) -> (HermiteCurve2d, LookupTable<PathSample>) {
        let weight = config.tangent_scale * (end.pos() - start.pos()).magnitude();
        let curve = HermiteCurve2d::new(
            start.pos(),
            start.tangent(weight),
            end.pos(),
            end.tangent(weight),
        );

        let increment = config.discrete_length_increment_size;
        let samples = forward_stepped_points_along_curve(
            &curve,
            increment,
            config.discretization_steps,
        )
        .into_iter()
        .map(|(s, pos)| PathSample {
            s,
            pos,
            heading: curve.direction(s),
            curvature: curve.curvature(s),
        })
        .collect();

        (curve, LookupTable::from_values(increment, samples))
    }

    /// The path ID.
    pub fn id(&self) -> PathId {
        self.id
    }

    /// The node at which the path begins.
    pub fn start_node(&self) -> NodeId {
        self.start
    }

    /// The node at which the path ends.
    pub fn end_node(&self) -> NodeId {
        self.end
    }

    /// The paths a vehicle may change lanes onto from this one.
    pub fn parallel_paths(&self) -> &[PathId] {
        &self.parallel
    }

    /// Whether a vehicle may change lanes from this path onto `other`.
    pub fn is_parallel_to(&self, other: PathId) -> bool {
        self.parallel.contains(&other)
    }

    /// The spline defining the path's centre line.
    pub fn curve(&self) -> &HermiteCurve2d {
        &self.curve
    }

    /// The discretized length of the path in m.
    pub fn length(&self) -> f64 {
        self.samples.max_x()
    }

    /// The spacing between samples in m.
    pub fn increment(&self) -> f64 {
        self.samples.step()
    }

    /// The discretized samples, in order of arc length.
    pub fn samples(&self) -> &[PathSample] {
        self.samples.values()
    }

    /// The position of the spline at parameter `s`.
    pub fn coordinates(&self, s: f64) -> Point2d {
        self.curve.sample(s)
    }

    /// The heading of the spline at parameter `s`.
    pub fn direction(&self, s: f64) -> f64 {
        self.curve.direction(s)
    }

    /// The curvature of the spline at parameter `s`.
    pub fn curvature(&self, s: f64) -> f64 {
        self.curve.curvature(s)
    }

    /// The sample at distance `dist` along the path, or `None` if
    /// `dist` lies beyond the discretized curve.
    pub fn sample_at_distance(&self, dist: f64) -> Option<&PathSample> {
        self.samples.get(dist)
    }

    /// The sample nearest to distance `dist`, clamped to the path.
    pub fn nearest_sample(&self, dist: f64) -> &PathSample {
        self.samples.sample(dist)
    }

    /// The spline parameter of the sample nearest arc length `length`.
    pub fn s_at_arc_length(&self, length: f64) -> f64 {
        self.samples.sample(length).s
    }

    /// The arc length of the sample whose spline parameter is nearest `s`.
    pub fn arc_length_at_s(&self, s: f64) -> f64 {
        let samples = self.samples.values();
        let idx = samples.partition_point(|sample| sample.s < s);
        let idx = match idx {
            0 => 0,
            i if i >= samples.len() => samples.len() - 1,
            i if s - samples[i - 1].s <= samples[i].s - s => i - 1,
            i => i,
        };
        idx as f64 * self.samples.step()
    }
}

impl Keyed for Path {
    type Key = PathId;

    fn key(&self) -> PathId {
        self.id
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeRecord;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::FRAC_PI_2;

    fn node(id: u32, x: f64, y: f64, angle: f64) -> Node {
        Node::new(&NodeRecord {
            id: NodeId(id),
            x,
            y,
            angle,
        })
    }

    fn curved_path() -> Path {
        let config = SimConfig::default();
        let start = node(1, 0.0, 0.0, 0.0);
        let end = node(2, 30.0, 25.0, FRAC_PI_2);
        let record = PathRecord {
            id: PathId(1),
            start: NodeId(1),
            end: NodeId(2),
            parallel: vec![],
        };
        Path::build(&record, &start, &end, &config)
    }

    #[test]
    fn arc_length_is_monotonic() {
        let path = curved_path();
        let inc = path.increment();
        let samples = path.samples();

        assert!(samples.len() > 10);
        assert_eq!(samples[0].s, 0.0);
        assert_approx_eq!(samples[0].pos.x, 0.0);
        assert_approx_eq!(samples[0].pos.y, 0.0);
        assert_approx_eq!(path.length(), (samples.len() - 1) as f64 * inc);

        for pair in samples.windows(2) {
            let chord = pair[0].pos.distance(pair[1].pos);
            assert!(pair[1].s > pair[0].s);
            assert!(chord >= inc - 1e-9, "chord {} below increment", chord);
            assert!(chord < 2.0 * inc, "chord {} skips a sample", chord);
        }

        // The last sample falls short of the end node by less than one increment
        let last = samples.last().unwrap();
        assert!(last.pos.distance(Point2d::new(30.0, 25.0)) < inc);
    }

    #[test]
    fn round_trip_projection() {
        let path = curved_path();
        let samples = path.samples();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let s = rng.gen_range(0.0..1.0);
            let length = path.arc_length_at_s(s);
            let s2 = path.s_at_arc_length(length);
            let idx = samples.iter().position(|sample| sample.s == s2).unwrap();
            let nearest = (length / path.increment()).round() as usize;
            assert!(idx.abs_diff(nearest) <= 1);
            // The round trip lands on the sample neighbouring `s`
            let below = samples.partition_point(|sample| sample.s < s);
            assert!(idx + 1 >= below && idx <= below);
        }
    }

    #[test]
    fn lookups_beyond_the_end() {
        let path = curved_path();
        let length = path.length();
        assert!(path.sample_at_distance(0.0).is_some());
        assert!(path.sample_at_distance(length).is_some());
        assert!(path.sample_at_distance(length + path.increment()).is_none());
        assert_eq!(path.nearest_sample(length + 100.0), path.samples().last().unwrap());
        assert_eq!(path.s_at_arc_length(-5.0), 0.0);
        assert_eq!(path.arc_length_at_s(2.0), length);
    }

    #[test]
    fn straight_path_length() {
        let config = SimConfig::default();
        let start = node(1, 0.0, 0.0, 0.0);
        let end = node(2, 50.0, 0.0, 0.0);
        let record = PathRecord {
            id: PathId(1),
            start: NodeId(1),
            end: NodeId(2),
            parallel: vec![PathId(3)],
        };
        let path = Path::build(&record, &start, &end, &config);
        assert!(path.length() <= 50.0);
        assert!(path.length() > 50.0 - 2.0 * path.increment());
        assert!(path.is_parallel_to(PathId(3)));
        for sample in path.samples() {
            assert_approx_eq!(sample.heading, 0.0);
            assert!(sample.curvature < 1e-6);
        }
    }
}
