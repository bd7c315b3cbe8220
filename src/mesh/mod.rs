//! Core mesh data structures.
//!
//! # Overview
//!
//! The primary type is [`TriMesh`], a triangle mesh that stores nodes, edges,
//! and faces in separate arenas with explicit edge-face adjacency. It supports
//! the local edits used by curve insertion: splitting faces and edges,
//! flipping diagonals, and removing elements.
//!
//! # Handles
//!
//! Mesh elements are identified by generation-checked handles:
//! - [`NodeId`] - Identifies a node
//! - [`EdgeId`] - Identifies an edge
//! - [`FaceId`] - Identifies a face
//!
//! A handle to a removed element never resolves again, even after its slot
//! is reused.
//!
//! # Construction
//!
//! Meshes are built from the index-based [`SurfaceMesh`] exchange type:
//!
//! ```
//! use trisplice::mesh::{build_trimesh, SurfaceMesh};
//! use nalgebra::Point3;
//!
//! let surface = SurfaceMesh::from_triangles(
//!     &[
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     &[[0, 1, 2], [0, 2, 3]],
//! );
//!
//! let (mesh, nodes) = build_trimesh(&surface).unwrap();
//! assert_eq!(mesh.num_faces(), 2);
//! assert!(mesh.find_edge(nodes[0], nodes[2]).is_some());
//! ```

mod builder;
mod index;
mod surface;
mod trimesh;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::{build_trimesh, to_surface};
pub use index::{EdgeId, FaceId, FaceSlot, NodeId, Winding, NO_GROUP};
pub use surface::{CurveMesh, SurfaceEdge, SurfaceFace, SurfaceMesh, SurfaceNode};
pub use trimesh::{Edge, Face, FaceSpec, Node, TriMesh};
