//! Conversion between [`SurfaceMesh`] and [`TriMesh`].
//!
//! The drivers convert the caller's surface into a [`TriMesh`], edit it, and
//! convert the result back into a fresh [`SurfaceMesh`].

use std::collections::HashMap;

use slotmap::SecondaryMap;

use super::index::{EdgeId, NodeId};
use super::surface::{undirected, SurfaceEdge, SurfaceFace, SurfaceMesh, SurfaceNode};
use super::trimesh::{FaceSpec, TriMesh};
use crate::error::Result;

/// Build a [`TriMesh`] from a surface mesh.
///
/// Every face edge is created once. Group ids of the surface's listed edges are
/// copied onto the matching mesh edges; all other edges carry no group.
///
/// Returns the mesh and the handle of each surface node, by index.
///
/// # Example
/// ```
/// use trisplice::mesh::{build_trimesh, SurfaceMesh};
/// use nalgebra::Point3;
///
/// let surface = SurfaceMesh::from_triangles(
///     &[
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.5, 1.0, 0.0),
///     ],
///     &[[0, 1, 2]],
/// );
/// let (mesh, nodes) = build_trimesh(&surface).unwrap();
/// assert_eq!(mesh.num_edges(), 3);
/// assert_eq!(nodes.len(), 3);
/// ```
pub fn build_trimesh(surface: &SurfaceMesh) -> Result<(TriMesh, Vec<NodeId>)> {
    surface.validate()?;

    let mut mesh = TriMesh::with_capacity(surface.nodes.len(), surface.faces.len());

    let node_ids: Vec<NodeId> = surface
        .nodes
        .iter()
        .map(|node| {
            let id = mesh.add_node(node.position, 0);
            mesh.node_mut(id).gid = node.gid;
            id
        })
        .collect();

    // Undirected node pair -> edge handle
    let mut edge_map: HashMap<(usize, usize), EdgeId> = HashMap::new();

    for face in &surface.faces {
        let mut edges = [EdgeId::default(); 3];
        for i in 0..3 {
            let (a, b) = (face.nodes[i], face.nodes[(i + 1) % 3]);
            edges[i] = match edge_map.get(&undirected(a, b)) {
                Some(&e) => e,
                None => {
                    let e = mesh.add_edge(node_ids[a], node_ids[b], 0)?;
                    edge_map.insert(undirected(a, b), e);
                    e
                }
            };
        }
        let nodes = face.nodes.map(|n| node_ids[n]);
        mesh.add_face(FaceSpec {
            nodes,
            edges,
            tag: 0,
            gid: face.gid,
        })?;
    }

    for edge in &surface.edges {
        if let Some(&e) = edge_map.get(&undirected(edge.nodes[0], edge.nodes[1])) {
            mesh.edge_mut(e).gid = edge.gid;
        }
    }

    Ok((mesh, node_ids))
}

/// Convert a [`TriMesh`] back into a surface mesh.
///
/// Nodes that no face uses are dropped and the rest are renumbered in arena
/// order. Every edge between surviving nodes is written out with its group id.
pub fn to_surface(mesh: &TriMesh) -> SurfaceMesh {
    let mut used: SecondaryMap<NodeId, ()> = SecondaryMap::new();
    for (_, face) in mesh.faces() {
        for n in face.nodes() {
            used.insert(n, ());
        }
    }

    let mut index: SecondaryMap<NodeId, usize> = SecondaryMap::new();
    let mut nodes = Vec::with_capacity(used.len());
    for (id, node) in mesh.nodes() {
        if used.contains_key(id) {
            index.insert(id, nodes.len());
            nodes.push(SurfaceNode {
                position: node.position,
                gid: node.gid,
            });
        }
    }

    let faces = mesh
        .faces()
        .map(|(_, face)| SurfaceFace {
            nodes: face.nodes().map(|n| index[n]),
            gid: face.gid,
        })
        .collect();

    let edges = mesh
        .edges()
        .filter_map(|(_, edge)| {
            let [a, b] = edge.nodes();
            Some(SurfaceEdge {
                nodes: [*index.get(a)?, *index.get(b)?],
                gid: edge.gid,
            })
        })
        .collect();

    SurfaceMesh {
        nodes,
        faces,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;
    use crate::mesh::NO_GROUP;
    use nalgebra::Point3;

    fn two_triangles() -> SurfaceMesh {
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

    #[test]
    fn test_build_two_triangles() {
        let (mesh, nodes) = build_trimesh(&two_triangles()).unwrap();
        assert_eq!(mesh.num_nodes(), 4);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.boundary_edges().count(), 4);
        assert_eq!(mesh.euler_characteristic(), 1);
        assert!(mesh.find_edge(nodes[0], nodes[2]).is_some());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_build_copies_edge_groups() {
        let surface = two_triangles().with_feature_edge(2, 0, 7);
        let (mesh, nodes) = build_trimesh(&surface).unwrap();
        let diag = mesh.find_edge(nodes[0], nodes[2]).unwrap();
        assert_eq!(mesh.edge(diag).gid, 7);
        let bottom = mesh.find_edge(nodes[0], nodes[1]).unwrap();
        assert_eq!(mesh.edge(bottom).gid, NO_GROUP);
    }

    #[test]
    fn test_build_rejects_empty() {
        assert_eq!(
            build_trimesh(&SurfaceMesh::default()).map(|_| ()),
            Err(MeshError::EmptyMesh)
        );
    }

    #[test]
    fn test_roundtrip_keeps_topology() {
        let surface = two_triangles().with_feature_edge(0, 1, 3);
        let (mesh, _) = build_trimesh(&surface).unwrap();
        let out = to_surface(&mesh);

        assert_eq!(out.positions(), surface.positions());
        assert_eq!(out.triangles(), surface.triangles());
        assert_eq!(out.num_edges(), 5);
        assert_eq!(out.edges_in_group(3).count(), 1);
    }

    #[test]
    fn test_to_surface_drops_isolated_nodes() {
        let (mut mesh, _) = build_trimesh(&two_triangles()).unwrap();
        mesh.add_node(Point3::new(5.0, 5.0, 0.0), 0);
        let out = to_surface(&mesh);
        assert_eq!(out.num_nodes(), 4);
        assert!(out.validate().is_ok());
    }
}
