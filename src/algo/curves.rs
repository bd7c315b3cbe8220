//! Curve-conforming drivers.
//!
//! Each driver takes a [`SurfaceMesh`] and a list of [`CurveMesh`] polylines,
//! embeds the curves in the surface so that every curve segment is made of
//! mesh edges, and returns a new surface. The input is never modified.
//!
//! - [`insert_curves`] inserts curve nodes with [`insert_point`] and conforms
//!   segments by splitting the edges they cross, bisecting only where that
//!   does not reach the far end. Curve edges get group ids after the
//!   surface's existing edge groups.
//! - [`insert_curves2`] merges nearby curve nodes across curves, keeps the
//!   mesh Delaunay while inserting, recovers segments by flipping before it
//!   bisects, and re-partitions the surface along the inserted curves. This
//!   is the one to use unless the old numbering scheme is required.
//! - [`intersect_curves_planar`] treats the surface as lying in the xy-plane
//!   and splits every edge a segment crosses, without any quality control.
//!
//! # Example
//!
//! ```
//! use trisplice::algo::curves::insert_curves2;
//! use trisplice::algo::insert::InsertOptions;
//! use trisplice::mesh::{CurveMesh, SurfaceMesh};
//! use nalgebra::Point3;
//!
//! let surface = SurfaceMesh::from_triangles(
//!     &[
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(2.0, 0.0, 0.0),
//!         Point3::new(2.0, 2.0, 0.0),
//!         Point3::new(0.0, 2.0, 0.0),
//!     ],
//!     &[[0, 1, 2], [0, 2, 3]],
//! );
//! let curve = CurveMesh::polyline(&[Point3::new(0.2, 1.5, 0.0), Point3::new(1.5, 0.3, 0.0)]);
//!
//! let result = insert_curves2(&surface, &[curve], &InsertOptions::default()).unwrap();
//! assert_eq!(result.report.unconformed_segments, 0);
//! assert!(result.mesh.edges_in_group(0).count() >= 1);
//! ```

use nalgebra::{Point3, Vector3};

use super::classify::{edge_intersect, SegmentIntersection};
use super::insert::{
    bisect_segment, insert_delaunay_point, insert_point, ConformWarning, InsertOptions,
};
use super::partition::{partition_surface, renumber_edge_groups};
use crate::error::{MeshError, Result};
use crate::mesh::{
    build_trimesh, to_surface, CurveMesh, EdgeId, NodeId, SurfaceMesh, TriMesh, NO_GROUP,
};

/// Snapping tolerance of the planar intersection driver.
const PLANAR_TOL: f64 = 1e-6;

/// Nesting limit of the planar intersection driver per segment.
const PLANAR_MAX_DEPTH: usize = 64;

/// Summary of a curve insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertionReport {
    /// Nodes added to the surface, including bisection midpoints.
    pub inserted_nodes: usize,
    /// Curve segments fully represented by mesh edges.
    pub conformed_segments: usize,
    /// Curve segments with at least one part left unrepresented.
    pub unconformed_segments: usize,
    /// Every sub-segment that could not be conformed.
    pub warnings: Vec<ConformWarning>,
}

impl InsertionReport {
    /// Whether every inserted segment was conformed.
    pub fn is_complete(&self) -> bool {
        self.unconformed_segments == 0
    }

    fn record(&mut self, warnings: Vec<ConformWarning>) {
        if warnings.is_empty() {
            self.conformed_segments += 1;
        } else {
            self.unconformed_segments += 1;
            self.warnings.extend(warnings);
        }
    }
}

/// The surface produced by a curve driver, with its report.
#[derive(Debug, Clone)]
pub struct CurveInsertion {
    /// The new surface.
    pub mesh: SurfaceMesh,
    /// What was inserted.
    pub report: InsertionReport,
}

fn validate_input(surface: &SurfaceMesh, curves: &[CurveMesh]) -> Result<()> {
    surface.validate()?;
    for (i, curve) in curves.iter().enumerate() {
        curve.validate(i)?;
    }
    Ok(())
}

fn finish(mesh: &TriMesh, report: InsertionReport) -> Result<CurveInsertion> {
    mesh.validate()?;
    Ok(CurveInsertion {
        mesh: to_surface(mesh),
        report,
    })
}

/// Insert curves into a surface.
///
/// Every curve node is inserted with [`insert_point`]. If
/// [`InsertOptions::insert_edges`] is set, each segment is then conformed as
/// in [`insert_edge`](crate::algo::insert::insert_edge): edges it properly
/// crosses are split at the crossing and anything left is bisected. Its
/// edges are tagged with the curve's group: curve `i` gets
/// group `k + i`, where `k` is the number of edge groups already on the
/// surface.
///
/// # Errors
///
/// Invalid options, an invalid surface or curve, a curve node off the surface,
/// or a mesh that fails validation afterwards. In strict mode a segment that
/// cannot be conformed is an error as well.
pub fn insert_curves(
    surface: &SurfaceMesh,
    curves: &[CurveMesh],
    options: &InsertOptions,
) -> Result<CurveInsertion> {
    options.validate()?;
    validate_input(surface, curves)?;

    let (mut mesh, _) = build_trimesh(surface)?;
    let base = surface.edge_partitions() as i32;
    let mut report = InsertionReport::default();

    for (i, curve) in curves.iter().enumerate() {
        let nodes = curve
            .nodes
            .iter()
            .map(|r| insert_point(&mut mesh, r, options.tolerance))
            .collect::<Result<Vec<NodeId>>>()?;

        if !options.insert_edges {
            continue;
        }
        let group = base + i as i32;
        let mut added = Vec::new();
        for &[a, b] in &curve.edges {
            let outcome =
                bisect_segment(&mut mesh, nodes[a], nodes[b], &mut added, group, options, false)?;
            report.record(outcome.warnings);
        }
    }

    report.inserted_nodes = mesh.num_nodes() - surface.num_nodes();
    log::debug!(
        "inserted {} curves: {} nodes, {} segments conformed, {} not",
        curves.len(),
        report.inserted_nodes,
        report.conformed_segments,
        report.unconformed_segments
    );
    finish(&mesh, report)
}

/// Merge curve nodes closer than `merge` to an earlier one. Returns the
/// distinct points and, per curve, the index of each node among them.
fn merge_curve_nodes(curves: &[CurveMesh], merge: f64) -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
    let merge2 = merge * merge;
    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut index = Vec::with_capacity(curves.len());
    for curve in curves {
        let mut ids = Vec::with_capacity(curve.num_nodes());
        for r in &curve.nodes {
            let k = match points.iter().position(|p| (p - r).norm_squared() <= merge2) {
                Some(k) => k,
                None => {
                    points.push(*r);
                    points.len() - 1
                }
            };
            ids.push(k);
        }
        index.push(ids);
    }
    (points, index)
}

/// Insert curves into a surface while keeping the mesh Delaunay, then
/// re-partition it along the inserted curves.
///
/// Curve nodes closer than the tolerance times the surface's bounding-box
/// diagonal are merged, across all curves, before insertion. Each node goes
/// in with [`insert_delaunay_point`]. Each segment is recovered by flipping
/// where possible; where not, crossed edges are split and the rest bisected.
///
/// Afterwards the faces are regrouped by [`partition_surface`] and edge
/// groups are renumbered from 0, so existing feature lines and the new curves
/// end up with consecutive group ids.
///
/// # Errors
///
/// As [`insert_curves`].
pub fn insert_curves2(
    surface: &SurfaceMesh,
    curves: &[CurveMesh],
    options: &InsertOptions,
) -> Result<CurveInsertion> {
    options.validate()?;
    validate_input(surface, curves)?;

    let (mut mesh, _) = build_trimesh(surface)?;
    let merge = options.tolerance * surface.bounding_diagonal();
    let (points, index) = merge_curve_nodes(curves, merge);
    log::trace!(
        "{} curve nodes merged into {}",
        curves.iter().map(CurveMesh::num_nodes).sum::<usize>(),
        points.len()
    );

    let nodes = points
        .iter()
        .map(|r| insert_delaunay_point(&mut mesh, r, options))
        .collect::<Result<Vec<NodeId>>>()?;

    let mut report = InsertionReport::default();
    if options.insert_edges {
        // Keep new groups clear of whatever ids the surface already uses.
        let base = surface
            .edges
            .iter()
            .map(|e| e.gid)
            .max()
            .map_or(0, |g| g.max(NO_GROUP) + 1);

        let mut added = Vec::new();
        for (i, curve) in curves.iter().enumerate() {
            let group = base + i as i32;
            for &[a, b] in &curve.edges {
                let (n0, n1) = (nodes[index[i][a]], nodes[index[i][b]]);
                let outcome = bisect_segment(&mut mesh, n0, n1, &mut added, group, options, true)?;
                report.record(outcome.warnings);
            }
        }
    }

    let partitions = partition_surface(&mut mesh);
    let groups = renumber_edge_groups(&mut mesh);
    report.inserted_nodes = mesh.num_nodes() - surface.num_nodes();
    log::debug!(
        "inserted {} curves: {} nodes, {} partitions, {} edge groups, {} segments not conformed",
        curves.len(),
        report.inserted_nodes,
        partitions,
        groups,
        report.unconformed_segments
    );
    finish(&mesh, report)
}

/// Intersect curves with a surface lying in the xy-plane.
///
/// Curve nodes are inserted with a tight snapping tolerance and no edge
/// flipping. Each segment is then cut at every mesh edge it crosses, and at
/// every mesh node it passes through, until its pieces are mesh edges. Curve
/// edges are tagged like in [`insert_curves`].
///
/// Coordinates out of the xy-plane are ignored when looking for crossings.
///
/// # Errors
///
/// An invalid surface or curve, a curve node off the surface, or a mesh that
/// fails validation afterwards.
pub fn intersect_curves_planar(surface: &SurfaceMesh, curves: &[CurveMesh]) -> Result<CurveInsertion> {
    validate_input(surface, curves)?;

    let (mut mesh, _) = build_trimesh(surface)?;
    let base = surface.edge_partitions() as i32;
    let mut report = InsertionReport::default();

    let mut nodes = Vec::with_capacity(curves.len());
    for curve in curves {
        let ids = curve
            .nodes
            .iter()
            .map(|r| insert_point(&mut mesh, r, PLANAR_TOL))
            .collect::<Result<Vec<NodeId>>>()?;
        nodes.push(ids);
    }

    for (i, curve) in curves.iter().enumerate() {
        let group = base + i as i32;
        for &[a, b] in &curve.edges {
            let warnings = split_along_segment(&mut mesh, nodes[i][a], nodes[i][b], group)?;
            report.record(warnings);
        }
    }

    report.inserted_nodes = mesh.num_nodes() - surface.num_nodes();
    log::debug!(
        "intersected {} curves: {} nodes, {} segments conformed, {} not",
        curves.len(),
        report.inserted_nodes,
        report.conformed_segments,
        report.unconformed_segments
    );
    finish(&mesh, report)
}

/// Where a segment first meets the mesh away from its end nodes.
enum Cut {
    Node(NodeId),
    Crossing(EdgeId, Point3<f64>),
}

fn find_cut(mesh: &TriMesh, n0: NodeId, n1: NodeId) -> Option<Cut> {
    let p0 = *mesh.position(n0);
    let p1 = *mesh.position(n1);
    let snap2 = (PLANAR_TOL * (p1 - p0).norm()).powi(2);

    for (e, edge) in mesh.edges() {
        match edge_intersect(mesh, edge.nodes(), [n0, n1], &Vector3::z(), PLANAR_TOL) {
            SegmentIntersection::Crossing { point, .. } => {
                let flat = |p: &Point3<f64>| (p.xy() - point.xy()).norm_squared();
                if flat(&p0) > snap2 && flat(&p1) > snap2 {
                    return Some(Cut::Crossing(e, point));
                }
            }
            SegmentIntersection::AtStart => return Some(Cut::Node(edge.nodes()[0])),
            SegmentIntersection::AtEnd => return Some(Cut::Node(edge.nodes()[1])),
            _ => {}
        }
    }
    None
}

/// Split the mesh along the segment from `n0` to `n1` and tag its edges.
fn split_along_segment(
    mesh: &mut TriMesh,
    n0: NodeId,
    n1: NodeId,
    group: i32,
) -> Result<Vec<ConformWarning>> {
    let mut warnings = Vec::new();
    let mut stack = vec![(n0, n1, 0usize)];

    while let Some((a, b, depth)) = stack.pop() {
        if a == b {
            continue;
        }
        if let Some(e) = mesh.find_edge(a, b) {
            mesh.edge_mut(e).gid = group;
            continue;
        }

        let cut = if depth < PLANAR_MAX_DEPTH {
            find_cut(mesh, a, b)
        } else {
            None
        };
        let m = match cut {
            Some(Cut::Node(m)) => m,
            Some(Cut::Crossing(e, q)) => {
                let m = mesh.add_node(q, 0);
                mesh.split_edge(e, m)?;
                log::trace!("curve {} crosses edge {:?} at {:?}", group, e, m);
                m
            }
            None => {
                log::warn!("segment {:?} -> {:?} of curve {} not conformed", a, b, group);
                warnings.push(ConformWarning::SegmentNotConformed {
                    curve: group,
                    from: a,
                    to: b,
                    depth,
                });
                continue;
            }
        };
        if m == a || m == b {
            return Err(MeshError::InvalidState(format!(
                "segment {:?} -> {:?} cut at its own end node",
                a, b
            )));
        }
        stack.push((m, b, depth + 1));
        stack.push((a, m, depth + 1));
    }
    Ok(warnings)
}
