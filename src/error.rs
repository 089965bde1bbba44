use crate::{LightId, NodeId, PathId, RouteId};
use thiserror::Error;

/// Errors raised while loading a junction or configuring a simulation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate node ID {0}")]
    DuplicateNode(NodeId),
    #[error("duplicate path ID {0}")]
    DuplicatePath(PathId),
    #[error("duplicate light ID {0}")]
    DuplicateLight(LightId),
    #[error("path {path} references unknown node {node}")]
    UnknownNode { path: PathId, node: NodeId },
    #[error("unknown path {0}")]
    UnknownPath(PathId),
    #[error("unknown route {0}")]
    UnknownRoute(RouteId),
    #[error("light {0} controls no paths")]
    EmptyLight(LightId),
    #[error("paths controlled by light {0} do not share a start node")]
    DivergentLight(LightId),
    #[error("node {0} is not an entry node")]
    NotEntryNode(NodeId),
    #[error("invalid spawn model: {0}")]
    InvalidSpawnModel(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[cfg(feature = "serde")]
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
}
