//! Error types for trisplice.
//!
//! Every fallible operation in the crate returns [`Result`]. Topology
//! violations are reported, never repaired by guessing, so a caller can reject
//! the whole curve-insertion request instead of receiving a broken mesh.

use thiserror::Error;

use crate::mesh::{EdgeId, FaceId, NodeId};

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// The surface mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid node index.
    #[error("face {face} references invalid node index {node}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid node index.
        node: usize,
    },

    /// A face has duplicate node indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate nodes)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge was requested between a node and itself.
    #[error("cannot create an edge from {node:?} to itself")]
    DegenerateEdge {
        /// The repeated node.
        node: NodeId,
    },

    /// A face was given the same node twice.
    #[error("face uses node {node:?} more than once")]
    DuplicateFaceNode {
        /// The repeated node.
        node: NodeId,
    },

    /// A face was attached to an edge whose two face slots are already taken.
    #[error("edge {edge:?} would have more than two incident faces")]
    NonManifoldEdge {
        /// The overfull edge.
        edge: EdgeId,
    },

    /// A surface mesh edge (by node indices) has more than two incident faces.
    #[error("surface edge ({n0}, {n1}) has more than two incident faces")]
    NonManifoldInput {
        /// First node of the edge.
        n0: usize,
        /// Second node of the edge.
        n1: usize,
    },

    /// A surface mesh edge does not coincide with an edge of any face.
    #[error("surface edge {edge} is not an edge of any face")]
    UnknownFeatureEdge {
        /// The edge index.
        edge: usize,
    },

    /// The edges handed to a new face do not connect its nodes in cyclic order.
    #[error("face edge {slot} does not connect consecutive face nodes")]
    FaceEdgeMismatch {
        /// Local edge slot (0, 1 or 2) that does not match.
        slot: usize,
    },

    /// A handle refers to an element that has been removed.
    #[error("stale {kind} handle")]
    StaleHandle {
        /// The element kind ("node", "edge" or "face").
        kind: &'static str,
    },

    /// A point does not project onto any face or edge within tolerance.
    #[error("point ({x}, {y}, {z}) lies outside the mesh domain")]
    PointOutsideMesh {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
    },

    /// A segment passes exactly through a node other than its end points.
    #[error("segment {from:?} -> {to:?} passes through node {node:?}")]
    SegmentThroughNode {
        /// Segment start.
        from: NodeId,
        /// Segment end.
        to: NodeId,
        /// The node on the segment.
        node: NodeId,
    },

    /// Flip-based edge recovery could not produce the requested edge.
    #[error("could not recover edge {from:?} -> {to:?} by flipping")]
    EdgeRecoveryFailed {
        /// Segment start.
        from: NodeId,
        /// Segment end.
        to: NodeId,
    },

    /// A curve segment could not be represented by mesh edges (strict mode).
    #[error("segment {from:?} -> {to:?} of curve {curve} not fully conformed after {depth} bisections")]
    SegmentNotConformed {
        /// Curve index (group tag).
        curve: i32,
        /// Sub-segment start.
        from: NodeId,
        /// Sub-segment end.
        to: NodeId,
        /// Bisection depth reached.
        depth: usize,
    },

    /// A curve segment references a node index that does not exist.
    #[error("curve {curve} segment {segment} references invalid node index {node}")]
    InvalidCurve {
        /// The curve index.
        curve: usize,
        /// The segment index.
        segment: usize,
        /// The invalid node index.
        node: usize,
    },

    /// A face handle was used with a face that is no longer adjacent to an edge.
    #[error("face {face:?} is not adjacent to edge {edge:?}")]
    NotAdjacent {
        /// The face.
        face: FaceId,
        /// The edge.
        edge: EdgeId,
    },

    /// Invalid mesh state detected by validation.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn outside(p: &nalgebra::Point3<f64>) -> Self {
        MeshError::PointOutsideMesh {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_edge_mismatch_message() {
        let err = MeshError::FaceEdgeMismatch { slot: 2 };
        assert_eq!(
            err.to_string(),
            "face edge 2 does not connect consecutive face nodes"
        );
    }

    #[test]
    fn test_invalid_param() {
        let err = MeshError::invalid_param("tolerance", -1.0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: tolerance = -1 (must be positive)"
        );
    }
}
