//! # Trisplice
//!
//! Embed polyline curves into triangulated surfaces.
//!
//! Trisplice takes a triangle mesh and a set of curves and produces a new mesh
//! whose edges follow the curves exactly. Inserted curve edges carry a group
//! id, and the surface can be re-partitioned into patches separated by them.
//!
//! ## Features
//!
//! - **Triangle mesh with stable handles**: nodes, edges, and faces live in
//!   generation-checked arenas, so local edits never invalidate other handles
//! - **Local topology edits**: face and edge splits, edge flips, removal
//! - **Tolerant classification**: points snap onto nearby nodes and edges
//!   instead of creating slivers
//! - **Delaunay insertion**: points and edges are inserted with edge-flip
//!   legalization to keep element quality
//! - **Curve drivers**: conform whole curve sets in one call and get a report
//!   of anything that could not be conformed
//!
//! ## Quick Start
//!
//! ```
//! use trisplice::prelude::*;
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
//! // A curve whose first segment crosses the diagonal
//! let curve = CurveMesh::polyline(&[
//!     Point3::new(0.7, 0.2, 0.0),
//!     Point3::new(0.4, 0.45, 0.0),
//!     Point3::new(0.3, 0.8, 0.0),
//! ]);
//!
//! let options = InsertOptions::with_tolerance(1e-3);
//! let result = insert_curves(&surface, &[curve], &options).unwrap();
//!
//! // Three curve nodes plus one where the diagonal was split
//! assert_eq!(result.mesh.num_nodes(), 8);
//! assert_eq!(result.mesh.edges_in_group(0).count(), 3);
//! assert!(result.report.is_complete());
//! ```
//!
//! ## Editing a Mesh Directly
//!
//! ```
//! use trisplice::prelude::*;
//! use nalgebra::Point3;
//!
//! # let surface = SurfaceMesh::from_triangles(
//! #     &[
//! #         Point3::new(0.0, 0.0, 0.0),
//! #         Point3::new(1.0, 0.0, 0.0),
//! #         Point3::new(1.0, 1.0, 0.0),
//! #         Point3::new(0.0, 1.0, 0.0),
//! #     ],
//! #     &[[0, 1, 2], [0, 2, 3]],
//! # );
//! let (mut mesh, nodes) = build_trimesh(&surface).unwrap();
//!
//! // Split the face under a point, then flip the diagonal
//! let n = insert_point(&mut mesh, &Point3::new(0.7, 0.2, 0.0), 1e-2).unwrap();
//! assert_eq!(mesh.node(n).valence(), 3);
//!
//! let diag = mesh.find_edge(nodes[0], nodes[2]).unwrap();
//! assert!(mesh.flip_edge(diag).unwrap());
//! assert_eq!(mesh.euler_characteristic(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use trisplice::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::curves::{
        insert_curves, insert_curves2, intersect_curves_planar, CurveInsertion, InsertionReport,
    };
    pub use crate::algo::insert::{
        insert_delaunay_edge, insert_delaunay_point, insert_edge, insert_point, ConformWarning,
        InsertOptions,
    };
    pub use crate::algo::partition::partition_surface;
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_trimesh, to_surface, CurveMesh, EdgeId, FaceId, NodeId, SurfaceMesh, TriMesh,
        NO_GROUP,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
