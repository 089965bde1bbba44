use crate::math::{heading_vector, Point2d, Vector2d};
use crate::store::Keyed;
use crate::NodeId;

/// A point in the junction where paths begin and end.
///
/// The heading is the direction of travel through the node: paths
/// leave a node along its heading and arrive at a node along it.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    pos: Point2d,
    angle: f64,
}

/// A node as supplied by the junction definition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    /// The heading in radians.
    pub angle: f64,
}

impl Node {
    pub(crate) fn new(record: &NodeRecord) -> Self {
        Self {
            id: record.id,
            pos: Point2d::new(record.x, record.y),
            angle: record.angle,
        }
    }

    /// The node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's position in world space.
    pub fn pos(&self) -> Point2d {
        self.pos
    }

    /// The node's heading in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The node's tangent vector, scaled by `weight`.
    pub fn tangent(&self, weight: f64) -> Vector2d {
        weight * heading_vector(self.angle)
    }

    /// Moves the node. Paths touching it must be rebuilt afterwards.
    pub(crate) fn set_pose(&mut self, pos: Point2d, angle: f64) {
        self.pos = pos;
        self.angle = angle;
    }
}

impl Keyed for Node {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id
    }
}
