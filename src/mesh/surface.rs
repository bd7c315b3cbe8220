//! Index-based exchange types for surfaces and curves.
//!
//! [`SurfaceMesh`] and [`CurveMesh`] are what callers hand to the curve
//! insertion drivers and what they get back. They are plain vectors indexed by
//! `usize`, so they are easy to build from (and write out to) whatever format
//! the surrounding application uses.

use std::collections::HashMap;

use nalgebra::Point3;

use super::index::NO_GROUP;
use crate::error::{MeshError, Result};

/// A node of a surface mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceNode {
    /// Position.
    pub position: Point3<f64>,
    /// Group id.
    pub gid: i32,
}

/// A triangular face of a surface mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFace {
    /// Node indices in counter-clockwise order.
    pub nodes: [usize; 3],
    /// Surface partition id.
    pub gid: i32,
}

/// An edge of a surface mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceEdge {
    /// Node indices.
    pub nodes: [usize; 2],
    /// Feature line id, or [`NO_GROUP`].
    pub gid: i32,
}

/// A triangulated surface with group ids on nodes, faces, and edges.
///
/// `edges` may list only the feature edges of the surface; face edges that are
/// not listed carry no group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Nodes.
    pub nodes: Vec<SurfaceNode>,
    /// Triangles.
    pub faces: Vec<SurfaceFace>,
    /// Edges with group ids.
    pub edges: Vec<SurfaceEdge>,
}

impl SurfaceMesh {
    /// Build a surface from positions and triangles, all in group 0 and with no
    /// feature edges.
    pub fn from_triangles(positions: &[Point3<f64>], triangles: &[[usize; 3]]) -> Self {
        Self {
            nodes: positions
                .iter()
                .map(|&position| SurfaceNode {
                    position,
                    gid: NO_GROUP,
                })
                .collect(),
            faces: triangles
                .iter()
                .map(|&nodes| SurfaceFace { nodes, gid: 0 })
                .collect(),
            edges: Vec::new(),
        }
    }

    /// Mark the edge between two nodes as a feature edge of group `gid`.
    pub fn with_feature_edge(mut self, n0: usize, n1: usize, gid: i32) -> Self {
        self.edges.push(SurfaceEdge {
            nodes: [n0, n1],
            gid,
        });
        self
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Node positions.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Face node indices.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces.iter().map(|f| f.nodes).collect()
    }

    /// Edges carrying group `gid`.
    pub fn edges_in_group(&self, gid: i32) -> impl Iterator<Item = &SurfaceEdge> + '_ {
        self.edges.iter().filter(move |e| e.gid == gid)
    }

    /// Number of distinct edge groups, ignoring [`NO_GROUP`].
    pub fn edge_partitions(&self) -> usize {
        let mut groups: Vec<i32> = self
            .edges
            .iter()
            .map(|e| e.gid)
            .filter(|&g| g != NO_GROUP)
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups.len()
    }

    /// Number of distinct face groups.
    pub fn face_partitions(&self) -> usize {
        let mut groups: Vec<i32> = self.faces.iter().map(|f| f.gid).collect();
        groups.sort_unstable();
        groups.dedup();
        groups.len()
    }

    /// Length of the bounding-box diagonal, or 0 for an empty surface.
    pub fn bounding_diagonal(&self) -> f64 {
        let mut it = self.nodes.iter();
        let Some(first) = it.next() else {
            return 0.0;
        };
        let (mut min, mut max) = (first.position, first.position);
        for node in it {
            for i in 0..3 {
                min[i] = min[i].min(node.position[i]);
                max[i] = max[i].max(node.position[i]);
            }
        }
        (max - min).norm()
    }

    /// Check indices, degenerate faces, and manifold edges.
    pub fn validate(&self) -> Result<()> {
        if self.faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        let mut use_count: HashMap<(usize, usize), usize> = HashMap::new();
        for (fi, face) in self.faces.iter().enumerate() {
            for &ni in &face.nodes {
                if ni >= self.nodes.len() {
                    return Err(MeshError::InvalidVertexIndex { face: fi, node: ni });
                }
            }
            let [a, b, c] = face.nodes;
            if a == b || b == c || a == c {
                return Err(MeshError::DegenerateFace { face: fi });
            }
            for i in 0..3 {
                let key = undirected(face.nodes[i], face.nodes[(i + 1) % 3]);
                let count = use_count.entry(key).or_insert(0);
                *count += 1;
                if *count > 2 {
                    return Err(MeshError::NonManifoldInput { n0: key.0, n1: key.1 });
                }
            }
        }

        for (ei, edge) in self.edges.iter().enumerate() {
            if !use_count.contains_key(&undirected(edge.nodes[0], edge.nodes[1])) {
                return Err(MeshError::UnknownFeatureEdge { edge: ei });
            }
        }
        Ok(())
    }
}

pub(crate) fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A polyline curve given by node positions and segments between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveMesh {
    /// Node positions.
    pub nodes: Vec<Point3<f64>>,
    /// Segments as pairs of node indices.
    pub edges: Vec<[usize; 2]>,
}

impl CurveMesh {
    /// Create a curve from explicit nodes and segments.
    pub fn new(nodes: Vec<Point3<f64>>, edges: Vec<[usize; 2]>) -> Self {
        Self { nodes, edges }
    }

    /// Create an open polyline through the given points.
    pub fn polyline(points: &[Point3<f64>]) -> Self {
        let edges = (1..points.len()).map(|i| [i - 1, i]).collect();
        Self {
            nodes: points.to_vec(),
            edges,
        }
    }

    /// Create a closed polyline through the given points.
    pub fn closed(points: &[Point3<f64>]) -> Self {
        let mut curve = Self::polyline(points);
        if points.len() > 2 {
            curve.edges.push([points.len() - 1, 0]);
        }
        curve
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of segments.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Check that every segment references existing nodes. `curve` is the
    /// index reported in the error.
    pub fn validate(&self, curve: usize) -> Result<()> {
        for (segment, edge) in self.edges.iter().enumerate() {
            for &node in edge {
                if node >= self.nodes.len() {
                    return Err(MeshError::InvalidCurve {
                        curve,
                        segment,
                        node,
                    });
                }
            }
        }
        Ok(())
    }
}
