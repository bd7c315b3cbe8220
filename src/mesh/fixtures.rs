//! Small meshes shared by the unit tests.

use nalgebra::Point3;

use super::builder::build_trimesh;
use super::index::NodeId;
use super::surface::SurfaceMesh;
use super::trimesh::TriMesh;

/// A mesh together with the handles of its original nodes.
pub(crate) struct Square {
    pub mesh: TriMesh,
    pub nodes: Vec<NodeId>,
}

/// Unit square split along the 0-2 diagonal.
///
/// ```text
/// 3 --- 2
/// |   / |
/// | /   |
/// 0 --- 1
/// ```
pub(crate) fn unit_square_surface() -> SurfaceMesh {
    SurfaceMesh::from_triangles(
        &[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        &[[0, 1, 2], [0, 2, 3]],
    )
}

pub(crate) fn unit_square() -> Square {
    let (mesh, nodes) = build_trimesh(&unit_square_surface()).expect("valid square");
    Square { mesh, nodes }
}

/// An `n x n` grid of unit-square cells in the xy-plane, each split into two
/// triangles.
pub(crate) fn grid_surface(n: usize) -> SurfaceMesh {
    let mut positions = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            positions.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    let mut triangles = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + n + 1;
            let v11 = v01 + 1;
            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }
    SurfaceMesh::from_triangles(&positions, &triangles)
}

pub(crate) fn grid(n: usize) -> Square {
    let (mesh, nodes) = build_trimesh(&grid_surface(n)).expect("valid grid");
    Square { mesh, nodes }
}
