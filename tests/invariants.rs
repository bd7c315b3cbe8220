//! Property-based tests for mesh invariants under insertion.
//!
//! ## Test Properties
//!
//! 1. **Manifold**: every edge is used by one or two faces after any sequence
//!    of insertions
//! 2. **Euler**: a disk stays a disk, `N - E + F == 1`
//! 3. **Idempotence**: inserting the same point twice changes nothing the
//!    second time
//! 4. **Flip safety**: flipping a boundary edge is a no-op
//! 5. **Conformance**: an inserted curve segment becomes a chain of tagged
//!    edges between its end nodes

use std::collections::HashMap;

use approx::assert_relative_eq;
use nalgebra::Point3;
use proptest::prelude::*;
use trisplice::algo::insert::legalize;
use trisplice::prelude::*;

// =============================================================================
// FIXTURES
// =============================================================================

/// An `n` by `n` grid of unit squares, two triangles each.
fn grid_surface(n: usize) -> SurfaceMesh {
    let mut positions = Vec::with_capacity((n + 1) * (n + 1));
    let mut triangles = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            positions.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }
    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;
            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }
    SurfaceMesh::from_triangles(&positions, &triangles)
}

fn check_manifold(mesh: &TriMesh) -> std::result::Result<(), TestCaseError> {
    for (e, edge) in mesh.edges() {
        let count = edge.face_count();
        prop_assert!(count == 1 || count == 2, "edge {:?} has {} faces", e, count);
    }
    prop_assert_eq!(mesh.euler_characteristic(), 1);
    prop_assert!(mesh.validate().is_ok());
    Ok(())
}

/// Strategy for points strictly inside a 4 by 4 grid.
fn interior_point() -> impl Strategy<Value = Point3<f64>> {
    (0.05..3.95f64, 0.05..3.95f64).prop_map(|(x, y)| Point3::new(x, y, 0.0))
}

// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_plain_insertion_keeps_disk(points in prop::collection::vec(interior_point(), 1..40)) {
        let (mut mesh, _) = build_trimesh(&grid_surface(4)).unwrap();
        for p in &points {
            insert_point(&mut mesh, p, 1e-2).unwrap();
        }
        check_manifold(&mesh)?;
    }

    #[test]
    fn prop_delaunay_insertion_keeps_disk(points in prop::collection::vec(interior_point(), 1..40)) {
        let (mut mesh, _) = build_trimesh(&grid_surface(4)).unwrap();
        let options = InsertOptions::default();
        for p in &points {
            let n = insert_delaunay_point(&mut mesh, p, &options).unwrap();
            // The node stays where the point landed on the plane.
            prop_assert!((mesh.position(n).xy() - p.xy()).norm() <= 0.1);
        }
        check_manifold(&mesh)?;
    }

    #[test]
    fn prop_insertion_is_idempotent(p in interior_point()) {
        let (mut mesh, _) = build_trimesh(&grid_surface(4)).unwrap();
        let first = insert_point(&mut mesh, &p, 1e-2).unwrap();
        let counts = (mesh.num_nodes(), mesh.num_edges(), mesh.num_faces());

        let again = *mesh.position(first);
        let second = insert_point(&mut mesh, &again, 1e-2).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(counts, (mesh.num_nodes(), mesh.num_edges(), mesh.num_faces()));
    }

    #[test]
    fn prop_boundary_flip_is_noop(points in prop::collection::vec(interior_point(), 0..20)) {
        let (mut mesh, _) = build_trimesh(&grid_surface(4)).unwrap();
        for p in &points {
            insert_point(&mut mesh, p, 1e-2).unwrap();
        }
        let boundary: Vec<EdgeId> = mesh.boundary_edges().collect();
        let before: Vec<_> = boundary.iter().map(|&e| mesh.edge(e).nodes()).collect();
        for &e in &boundary {
            prop_assert!(!mesh.flip_edge(e).unwrap());
        }
        let after: Vec<_> = boundary.iter().map(|&e| mesh.edge(e).nodes()).collect();
        prop_assert_eq!(before, after);
        check_manifold(&mesh)?;
    }

    #[test]
    fn prop_legalize_after_plain_insertion(points in prop::collection::vec(interior_point(), 1..30)) {
        let (mut mesh, _) = build_trimesh(&grid_surface(4)).unwrap();
        for p in &points {
            insert_point(&mut mesh, p, 1e-2).unwrap();
        }
        let all: Vec<EdgeId> = mesh.edge_ids().collect();
        legalize(&mut mesh, all, 100_000).unwrap();
        check_manifold(&mesh)?;
    }

    #[test]
    fn prop_curve_segment_becomes_tagged_chain(a in interior_point(), b in interior_point()) {
        prop_assume!((a - b).norm() > 0.5);
        let curve = CurveMesh::polyline(&[a, b]);
        let options = InsertOptions::with_tolerance(1e-3);
        let result = insert_curves2(&grid_surface(4), &[curve], &options).unwrap();
        prop_assume!(result.report.is_complete());

        let out = &result.mesh;
        let mut degree: HashMap<usize, usize> = HashMap::new();
        for edge in out.edges_in_group(0) {
            for n in edge.nodes {
                *degree.entry(n).or_insert(0) += 1;
            }
        }
        let ends: Vec<usize> = degree.iter().filter(|(_, &d)| d == 1).map(|(&n, _)| n).collect();
        prop_assert_eq!(ends.len(), 2);
        prop_assert!(degree.values().all(|&d| d == 1 || d == 2));

        let mut end_points: Vec<Point3<f64>> = ends.iter().map(|&n| out.nodes[n].position).collect();
        end_points.sort_by(|p, q| p.x.total_cmp(&q.x));
        let (lo, hi) = if a.x <= b.x { (a, b) } else { (b, a) };
        prop_assert!((end_points[0] - lo).norm() < 0.05);
        prop_assert!((end_points[1] - hi).norm() < 0.05);
    }
}

// =============================================================================
// DETERMINISTIC CHECKS
// =============================================================================

#[test]
fn test_centroid_scenario() {
    let surface = SurfaceMesh::from_triangles(
        &[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        &[[0, 1, 2], [0, 2, 3]],
    );
    let (mut mesh, _) = build_trimesh(&surface).unwrap();
    let n = insert_delaunay_point(&mut mesh, &Point3::new(0.5, 0.5, 0.0), &InsertOptions::default())
        .unwrap();

    assert_eq!(
        (mesh.num_nodes(), mesh.num_edges(), mesh.num_faces()),
        (5, 8, 4)
    );
    assert_relative_eq!(*mesh.position(n), Point3::new(0.5, 0.5, 0.0), epsilon = 1e-12);
    for e in mesh.edge_ids() {
        assert!(trisplice::algo::classify::is_locally_delaunay(&mesh, e));
    }
}

#[test]
fn test_stale_handle_is_detected() {
    let (mut mesh, _) = build_trimesh(&grid_surface(1)).unwrap();
    let f = mesh.face_ids().next().unwrap();
    mesh.remove_face(f, true).unwrap();
    assert!(mesh.get_face(f).is_none());
    assert!(!mesh.contains_face(f));
}
