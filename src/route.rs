use crate::store::Keyed;
use crate::{NodeId, NodeSet, PathId, PathSet, RouteId};
use itertools::Itertools;
use log::{info, warn};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};

/// An ordered sequence of paths leading from an entry node to an exit node.
#[derive(Clone, Debug)]
pub struct Route {
    /// The route ID.
    id: RouteId,
    /// The node at which the route begins.
    entry: NodeId,
    /// The node at which the route ends.
    exit: NodeId,
    /// The paths making up the route.
    paths: SmallVec<[PathId; 4]>,
    /// How a vehicle gets from each path onto the next.
    transitions: SmallVec<[Transition; 4]>,
    /// The sum of the path lengths in m.
    length: f64,
}

/// How a vehicle moves from one path of its route onto the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transition {
    /// The next path starts where this one ends.
    Follow,
    /// The next path is a parallel path of this one.
    LaneChange,
}

impl Route {
    fn new(id: RouteId, sequence: &[PathId], paths: &PathSet) -> Self {
        let transitions = sequence
            .iter()
            .tuple_windows()
            .map(|(a, b)| {
                if paths[*a].end_node() == paths[*b].start_node() {
                    Transition::Follow
                } else {
                    Transition::LaneChange
                }
            })
            .collect();
        let mut route = Self {
            id,
            entry: paths[sequence[0]].start_node(),
            exit: paths[sequence[sequence.len() - 1]].end_node(),
            paths: sequence.iter().copied().collect(),
            transitions,
            length: 0.0,
        };
        route.refresh_length(paths);
        route
    }

    /// The route ID.
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// The node at which the route begins.
    pub fn entry_node(&self) -> NodeId {
        self.entry
    }

    /// The node at which the route ends.
    pub fn exit_node(&self) -> NodeId {
        self.exit
    }

    /// The paths making up the route, in order.
    pub fn paths(&self) -> &[PathId] {
        &self.paths
    }

    /// The path at the given index, if it exists.
    pub fn path(&self, index: usize) -> Option<PathId> {
        self.paths.get(index).copied()
    }

    /// The number of paths in the route.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether `index` is the last path of the route.
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.paths.len()
    }

    /// The transitions between consecutive paths.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The transition from the path at `index` onto the next one,
    /// or `None` on the last path.
    pub fn transition(&self, index: usize) -> Option<Transition> {
        self.transitions.get(index).copied()
    }

    /// The total length of the route in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Recomputes the route length after path geometry has changed.
    pub(crate) fn refresh_length(&mut self, paths: &PathSet) {
        self.length = self.paths.iter().map(|id| paths[*id].length()).sum();
    }
}

impl Keyed for Route {
    type Key = RouteId;

    fn key(&self) -> RouteId {
        self.id
    }
}

/// Enumerates the routes through a junction.
///
/// Entry nodes are those with outgoing paths but no incoming paths,
/// and exit nodes those with no outgoing paths. Every distinct sequence
/// of paths connecting the two is kept, so lane change variants of the
/// same movement coexist as separate routes.
pub struct RouteBuilder<'a> {
    nodes: &'a NodeSet,
    paths: &'a PathSet,
    /// The paths leaving each node, in insertion order.
    outgoing: HashMap<NodeId, SmallVec<[PathId; 4]>>,
    /// The paths arriving at each node.
    incoming: HashMap<NodeId, SmallVec<[PathId; 4]>>,
    /// The paths which list each path as parallel.
    parallel_from: HashMap<PathId, SmallVec<[PathId; 2]>>,
}

impl<'a> RouteBuilder<'a> {
    pub fn new(nodes: &'a NodeSet, paths: &'a PathSet) -> Self {
        let mut outgoing = HashMap::<_, SmallVec<_>>::new();
        let mut incoming = HashMap::<_, SmallVec<_>>::new();
        let mut parallel_from = HashMap::<_, SmallVec<_>>::new();
        for path in paths {
            outgoing.entry(path.start_node()).or_default().push(path.id());
            incoming.entry(path.end_node()).or_default().push(path.id());
            for other in path.parallel_paths() {
                parallel_from.entry(*other).or_default().push(path.id());
            }
        }
        Self {
            nodes,
            paths,
            outgoing,
            incoming,
            parallel_from,
        }
    }

    /// Generates every route, with IDs assigned in order of discovery.
    pub fn generate(nodes: &NodeSet, paths: &PathSet) -> Vec<Route> {
        RouteBuilder::new(nodes, paths).build()
    }

    /// The nodes at which vehicles may enter the junction.
    pub fn entry_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .keys()
            .filter(|id| !self.incoming.contains_key(id) && self.outgoing.contains_key(id))
    }

    /// Whether the node is an exit node.
    pub fn is_exit(&self, node: NodeId) -> bool {
        !self.outgoing.contains_key(&node)
    }

    /// The paths a vehicle on `path` may move onto next, without repeats.
    fn successors(&self, path: PathId) -> impl Iterator<Item = PathId> + '_ {
        let path = &self.paths[path];
        let follow = self
            .outgoing
            .get(&path.end_node())
            .into_iter()
            .flatten()
            .copied();
        follow
            .chain(path.parallel_paths().iter().copied())
            .filter(|id| self.paths.contains(*id))
            .unique()
    }

    /// The paths from which some exit node can be reached.
    fn exit_reachable(&self) -> HashSet<PathId> {
        // Search backwards from a virtual node joined to every path ending at an exit
        pathfinding::directed::bfs::bfs_reach(None, |path: &Option<PathId>| {
            let preds: SmallVec<[Option<PathId>; 4]> = match path {
                None => self
                    .paths
                    .iter()
                    .filter(|p| self.is_exit(p.end_node()))
                    .map(|p| Some(p.id()))
                    .collect(),
                Some(id) => {
                    let path = &self.paths[*id];
                    let arriving = self.incoming.get(&path.start_node()).into_iter().flatten();
                    let changing = self.parallel_from.get(id).into_iter().flatten();
                    arriving.chain(changing).map(|id| Some(*id)).collect()
                }
            };
            preds
        })
        .flatten()
        .collect()
    }

    fn build(&self) -> Vec<Route> {
        let reachable = self.exit_reachable();
        let mut routes = Vec::new();

        for entry in self.entry_nodes() {
            let found = routes.len();
            let mut queue: VecDeque<SmallVec<[PathId; 4]>> = self.outgoing[&entry]
                .iter()
                .filter(|id| reachable.contains(*id))
                .map(|id| SmallVec::from_slice(&[*id]))
                .collect();

            while let Some(sequence) = queue.pop_front() {
                let last = sequence[sequence.len() - 1];
                for next in self.successors(last) {
                    if !sequence.contains(&next) && reachable.contains(&next) {
                        let mut extended = sequence.clone();
                        extended.push(next);
                        queue.push_back(extended);
                    }
                }
                if self.is_exit(self.paths[last].end_node()) {
                    let id = RouteId(routes.len() as u32);
                    routes.push(Route::new(id, &sequence, self.paths));
                }
            }

            if routes.len() == found {
                warn!("No routes leave entry node {}", entry);
            }
        }

        info!("Generated {} routes", routes.len());
        routes
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SimConfig;
    use crate::node::{Node, NodeRecord};
    use crate::path::{Path, PathRecord};
    use assert_approx_eq::assert_approx_eq;

    fn junction(
        nodes: &[(u32, f64, f64, f64)],
        paths: &[(u32, u32, u32, &[u32])],
    ) -> (NodeSet, PathSet) {
        let config = SimConfig::default();
        let mut node_set = NodeSet::new();
        for (id, x, y, angle) in nodes {
            node_set.insert(Node::new(&NodeRecord {
                id: NodeId(*id),
                x: *x,
                y: *y,
                angle: *angle,
            }));
        }
        let mut path_set = PathSet::new();
        for (id, start, end, parallel) in paths {
            let record = PathRecord {
                id: PathId(*id),
                start: NodeId(*start),
                end: NodeId(*end),
                parallel: parallel.iter().map(|id| PathId(*id)).collect(),
            };
            let path = Path::build(
                &record,
                &node_set[record.start],
                &node_set[record.end],
                &config,
            );
            path_set.insert(path);
        }
        (node_set, path_set)
    }

    #[test]
    fn two_disjoint_routes() {
        let (nodes, paths) = junction(
            &[
                (1, 0.0, 0.0, 0.0),
                (2, 40.0, 20.0, 0.0),
                (3, 40.0, -20.0, 0.0),
                (4, 80.0, -20.0, 0.0),
                (5, 120.0, 0.0, 0.0),
            ],
            &[
                (1, 1, 2, &[]),
                (2, 2, 5, &[]),
                (3, 1, 3, &[]),
                (4, 3, 4, &[]),
                (5, 4, 5, &[]),
            ],
        );

        let routes = RouteBuilder::generate(&nodes, &paths);
        assert_eq!(routes.len(), 2);

        assert_eq!(routes[0].id(), RouteId(0));
        assert_eq!(routes[0].paths(), &[PathId(1), PathId(2)]);
        assert_eq!(routes[1].paths(), &[PathId(3), PathId(4), PathId(5)]);

        for route in &routes {
            assert_eq!(route.entry_node(), NodeId(1));
            assert_eq!(route.exit_node(), NodeId(5));
            assert!(route.transitions().iter().all(|t| *t == Transition::Follow));
            assert_eq!(route.transitions().len(), route.len() - 1);
            let sum: f64 = route.paths().iter().map(|id| paths[*id].length()).sum();
            assert_approx_eq!(route.length(), sum);
        }
    }

    #[test]
    fn lane_change_variants_coexist() {
        // Two lanes towards two exits, with lane changes allowed both ways
        let (nodes, paths) = junction(
            &[
                (1, 0.0, 0.0, 0.0),
                (2, 0.0, -3.5, 0.0),
                (3, 60.0, 0.0, 0.0),
                (4, 60.0, -3.5, 0.0),
            ],
            &[(1, 1, 3, &[2]), (2, 2, 4, &[1])],
        );

        let routes = RouteBuilder::generate(&nodes, &paths);
        let sequences = routes.iter().map(|r| r.paths().to_vec()).collect::<Vec<_>>();
        assert_eq!(
            sequences,
            vec![
                vec![PathId(1)],
                vec![PathId(1), PathId(2)],
                vec![PathId(2)],
                vec![PathId(2), PathId(1)],
            ]
        );
        assert_eq!(routes[1].transition(0), Some(Transition::LaneChange));
        assert_eq!(routes[1].transition(1), None);
        assert_eq!(routes[1].exit_node(), NodeId(4));
        assert!(routes[1].is_last(1));
    }

    #[test]
    fn loops_are_taken_at_most_once() {
        // Node 3 is the only exit; paths 3 and 4 form a loop back to node 2
        let (nodes, paths) = junction(
            &[
                (1, 0.0, 0.0, 0.0),
                (2, 30.0, 0.0, 0.0),
                (3, 60.0, 0.0, 0.0),
                (4, 30.0, 30.0, 0.0),
            ],
            &[(1, 1, 2, &[]), (2, 2, 3, &[]), (3, 2, 4, &[]), (4, 4, 2, &[])],
        );

        let routes = RouteBuilder::generate(&nodes, &paths);
        let sequences = routes.iter().map(|r| r.paths().to_vec()).collect::<Vec<_>>();
        assert_eq!(
            sequences,
            vec![
                vec![PathId(1), PathId(2)],
                vec![PathId(1), PathId(3), PathId(4), PathId(2)],
            ]
        );

        let builder = RouteBuilder::new(&nodes, &paths);
        assert_eq!(builder.entry_nodes().collect::<Vec<_>>(), vec![NodeId(1)]);
        assert!(builder.is_exit(NodeId(3)));
        assert!(!builder.is_exit(NodeId(4)));
    }

    #[test]
    fn paths_which_cannot_exit_are_pruned() {
        // Path 3 leads into a loop between nodes 3 and 5 which never exits
        let (nodes, paths) = junction(
            &[
                (1, 0.0, 0.0, 0.0),
                (2, 60.0, 0.0, 0.0),
                (3, 30.0, 30.0, 0.0),
                (5, 30.0, 60.0, 0.0),
            ],
            &[(1, 1, 2, &[]), (3, 1, 3, &[]), (4, 3, 5, &[]), (5, 5, 3, &[])],
        );

        let builder = RouteBuilder::new(&nodes, &paths);
        let reachable = builder.exit_reachable();
        assert!(reachable.contains(&PathId(1)));
        assert!(!reachable.contains(&PathId(3)));
        assert!(!reachable.contains(&PathId(4)));

        let routes = RouteBuilder::generate(&nodes, &paths);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].paths(), &[PathId(1)]);
    }

    #[test]
    fn unreachable_exit_yields_no_routes() {
        let (nodes, paths) = junction(
            &[(1, 0.0, 0.0, 0.0), (2, 30.0, 0.0, 0.0), (3, 30.0, 30.0, 0.0)],
            &[(1, 1, 2, &[]), (2, 2, 3, &[]), (3, 3, 2, &[])],
        );
        assert!(RouteBuilder::generate(&nodes, &paths).is_empty());
    }
}
