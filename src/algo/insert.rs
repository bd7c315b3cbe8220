//! Point and edge insertion into a triangle mesh.
//!
//! Insertion comes in layers:
//!
//! - [`insert_point`] drops a node onto the surface, splitting the edge or
//!   face it lands on.
//! - [`insert_delaunay_point`] does the same and then restores the local
//!   Delaunay property by flipping edges ([`legalize`]).
//! - [`insert_delaunay_edge`] makes an edge between two existing nodes by
//!   flipping away the edges the segment crosses.
//! - [`insert_edge`] conforms a curve segment to the mesh by splitting the
//!   edges it crosses, falling back to recursive bisection, and tags the
//!   resulting edges with the curve's group id.
//!
//! # Example
//!
//! ```
//! use trisplice::algo::insert::{insert_delaunay_point, InsertOptions};
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
//! let (mut mesh, _) = build_trimesh(&surface).unwrap();
//!
//! let options = InsertOptions::default();
//! insert_delaunay_point(&mut mesh, &Point3::new(0.3, 0.6, 0.0), &options).unwrap();
//! assert_eq!(mesh.num_faces(), 4);
//! ```

use std::collections::{HashSet, VecDeque};

use nalgebra::{Point3, Vector3};

use super::classify::{
    can_flip, edge_intersect, is_locally_delaunay, project_to_edge, project_to_face, FaceHit,
    SegmentIntersection,
};
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, FaceId, NodeId, TriMesh};

/// Squared distance below which a point is the same as an existing node.
const COINCIDENT_DIST2: f64 = 1e-16;

/// Options controlling point and curve insertion.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// Relative snapping tolerance. Points within this fraction of the local
    /// element size snap onto nodes and edges, and curve segments are not
    /// bisected below this fraction of the local face size.
    pub tolerance: f64,

    /// Whether curve segments are inserted as edges, or only curve nodes.
    pub insert_edges: bool,

    /// Hard cap on the bisection depth of a single curve segment.
    pub max_bisection_depth: usize,

    /// Maximum number of flips per legalization pass.
    pub flip_budget: usize,

    /// Fail instead of warning when a segment cannot be conformed.
    pub strict: bool,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-2,
            insert_edges: true,
            max_bisection_depth: 16,
            flip_budget: 10_000,
            strict: false,
        }
    }
}

impl InsertOptions {
    /// Create options with the given tolerance and defaults otherwise.
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Set whether curve segments are inserted as edges.
    pub fn with_insert_edges(mut self, insert_edges: bool) -> Self {
        self.insert_edges = insert_edges;
        self
    }

    /// Set the bisection depth cap.
    pub fn with_max_bisection_depth(mut self, depth: usize) -> Self {
        self.max_bisection_depth = depth;
        self
    }

    /// Set the flip budget per legalization pass.
    pub fn with_flip_budget(mut self, budget: usize) -> Self {
        self.flip_budget = budget;
        self
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Check that the options are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance >= 0.5 {
            return Err(MeshError::invalid_param(
                "tolerance",
                self.tolerance,
                "must be in (0, 0.5)",
            ));
        }
        Ok(())
    }
}

/// A problem that did not stop insertion but left part of a curve
/// unrepresented by mesh edges.
#[derive(Debug, Clone, PartialEq)]
pub enum ConformWarning {
    /// Bisection stopped before the sub-segment became a mesh edge.
    SegmentNotConformed {
        /// Group id of the curve.
        curve: i32,
        /// Sub-segment start.
        from: NodeId,
        /// Sub-segment end.
        to: NodeId,
        /// Bisection depth reached.
        depth: usize,
    },
}

impl ConformWarning {
    fn into_error(self) -> MeshError {
        match self {
            ConformWarning::SegmentNotConformed {
                curve,
                from,
                to,
                depth,
            } => MeshError::SegmentNotConformed {
                curve,
                from,
                to,
                depth,
            },
        }
    }
}

/// Result of conforming one curve segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentOutcome {
    /// Number of mesh edges tagged with the curve's group.
    pub tagged_edges: usize,
    /// Sub-segments that could not be conformed.
    pub warnings: Vec<ConformWarning>,
}

impl SegmentOutcome {
    /// Whether the whole segment is represented by mesh edges.
    pub fn is_conformed(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Insert a node at `r`.
///
/// If `r` coincides with an existing node, that node is returned and the mesh
/// is unchanged. Otherwise `r` is projected onto the closest face; if the
/// projection lands on an edge (within `tol`) that edge is split, otherwise the
/// face is. A point that projects onto no face but lies over a convex crease
/// is snapped onto the crease edge.
///
/// # Errors
///
/// [`MeshError::EmptyMesh`] if the mesh has no faces and
/// [`MeshError::PointOutsideMesh`] if `r` is not on the surface.
pub fn insert_point(mesh: &mut TriMesh, r: &Point3<f64>, tol: f64) -> Result<NodeId> {
    if mesh.num_faces() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    if let Some(n) = coincident_node(mesh, r) {
        return Ok(n);
    }

    let mut best: Option<(FaceId, FaceHit, Point3<f64>)> = None;
    let mut best_dist = f64::INFINITY;
    for f in mesh.face_ids() {
        let (hit, q) = project_to_face(mesh, f, r, tol);
        if !hit.is_hit() {
            continue;
        }
        let d = (q - r).norm_squared();
        if d < best_dist {
            best_dist = d;
            best = Some((f, hit, q));
        }
    }

    if let Some((f, hit, q)) = best {
        let face = mesh.face(f);
        return match hit {
            FaceHit::Node(i) => Ok(face.nodes()[i]),
            FaceHit::Edge(i) => {
                let e = face.edges()[i];
                let p = mesh.add_node(q, 0);
                mesh.split_edge(e, p)?;
                log::trace!("inserted {:?} on edge {:?}", p, e);
                Ok(p)
            }
            FaceHit::Inside => {
                let p = mesh.add_node(q, 0);
                mesh.split_face(f, p)?;
                log::trace!("inserted {:?} in face {:?}", p, f);
                Ok(p)
            }
            FaceHit::Outside => Err(MeshError::outside(r)),
        };
    }

    // Over a convex crease the point can miss both face planes. Snap it onto
    // the crease edge it sits above.
    let mut closest: Option<(EdgeId, Point3<f64>)> = None;
    let mut closest_dist = f64::INFINITY;
    for e in mesh.edge_ids() {
        let proj = project_to_edge(mesh, e, r);
        if !proj.is_interior() || !over_crease(mesh, e, r) {
            continue;
        }
        let d = (proj.point - r).norm_squared();
        if d < closest_dist {
            closest_dist = d;
            closest = Some((e, proj.point));
        }
    }

    match closest {
        Some((e, q)) => {
            let p = mesh.add_node(q, 0);
            mesh.split_edge(e, p)?;
            log::trace!("inserted {:?} on crease edge {:?}", p, e);
            Ok(p)
        }
        None => Err(MeshError::outside(r)),
    }
}

/// Whether `r` lies beyond interior edge `e` as seen from both of its faces.
fn over_crease(mesh: &TriMesh, e: EdgeId, r: &Point3<f64>) -> bool {
    let edge = mesh.edge(e);
    if edge.is_boundary() {
        return false;
    }
    let [a, b] = edge.nodes();
    let origin = mesh.position(a);
    let tangent = mesh.position(b) - origin;
    edge.face_slots().all(|slot| {
        let face = mesh.face(slot.face);
        let apex = mesh.position(face.nodes()[(slot.local + 2) % 3]);
        let side = face.normal().cross(&tangent);
        (apex - origin).dot(&side) * (r - origin).dot(&side) < 0.0
    })
}

/// The node with at least one edge that coincides with `r`, if any.
fn coincident_node(mesh: &TriMesh, r: &Point3<f64>) -> Option<NodeId> {
    mesh.nodes()
        .filter(|(_, node)| node.valence() > 0)
        .map(|(id, node)| (id, (node.position - r).norm_squared()))
        .filter(|&(_, d)| d < COINCIDENT_DIST2)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Insert a node at `r` and restore the Delaunay property around it.
///
/// See [`insert_point`] for how the node is placed. If a new node was created,
/// the edges of the triangles around it are legalized by flipping.
pub fn insert_delaunay_point(
    mesh: &mut TriMesh,
    r: &Point3<f64>,
    options: &InsertOptions,
) -> Result<NodeId> {
    let before = mesh.num_nodes();
    let n = insert_point(mesh, r, options.tolerance)?;
    if mesh.num_nodes() > before {
        let link: Vec<EdgeId> = mesh
            .node_faces(n)
            .into_iter()
            .filter_map(|f| mesh.opposing_edge(f, n))
            .collect();
        legalize(mesh, link, options.flip_budget)?;
    }
    Ok(n)
}

/// Flip non-Delaunay edges starting from `seeds` until the neighborhood is
/// stable or `budget` flips were made.
///
/// Boundary edges, feature edges, and edges whose quad is not convex are never
/// flipped. Returns the number of flips.
pub fn legalize(
    mesh: &mut TriMesh,
    seeds: impl IntoIterator<Item = EdgeId>,
    budget: usize,
) -> Result<usize> {
    legalize_keeping(mesh, seeds, budget, None)
}

fn legalize_keeping(
    mesh: &mut TriMesh,
    seeds: impl IntoIterator<Item = EdgeId>,
    budget: usize,
    keep: Option<EdgeId>,
) -> Result<usize> {
    let mut stack: Vec<EdgeId> = Vec::new();
    let mut marked: HashSet<EdgeId> = HashSet::new();
    for e in seeds {
        if marked.insert(e) {
            stack.push(e);
        }
    }

    let mut flips = 0;
    while let Some(e) = stack.pop() {
        marked.remove(&e);
        if Some(e) == keep {
            continue;
        }
        let Some(edge) = mesh.get_edge(e) else {
            continue;
        };
        if edge.is_boundary() || edge.is_feature() {
            continue;
        }
        if is_locally_delaunay(mesh, e) || !can_flip(mesh, e) {
            continue;
        }
        if flips >= budget {
            log::warn!("legalization stopped after {} flips", flips);
            break;
        }

        let neighbors = [
            mesh.next_edge(e, 0),
            mesh.prev_edge(e, 0),
            mesh.next_edge(e, 1),
            mesh.prev_edge(e, 1),
        ];
        if !mesh.flip_edge(e)? {
            continue;
        }
        flips += 1;
        for nb in neighbors.into_iter().flatten() {
            if marked.insert(nb) {
                stack.push(nb);
            }
        }
    }
    Ok(flips)
}

/// Average normal of the faces of an edge.
fn edge_normal(mesh: &TriMesh, e: EdgeId) -> Vector3<f64> {
    let n: Vector3<f64> = mesh
        .edge(e)
        .face_slots()
        .map(|s| mesh.face(s.face).normal())
        .sum();
    n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
}

fn crosses(mesh: &TriMesh, e: EdgeId, n0: NodeId, n1: NodeId, tol: f64) -> Result<bool> {
    let normal = edge_normal(mesh, e);
    match edge_intersect(mesh, mesh.edge(e).nodes(), [n0, n1], &normal, tol) {
        SegmentIntersection::Crossing { .. } => Ok(true),
        SegmentIntersection::AtStart => Err(MeshError::SegmentThroughNode {
            from: n0,
            to: n1,
            node: mesh.edge(e).nodes()[0],
        }),
        SegmentIntersection::AtEnd => Err(MeshError::SegmentThroughNode {
            from: n0,
            to: n1,
            node: mesh.edge(e).nodes()[1],
        }),
        _ => Ok(false),
    }
}

/// Edges crossed by the segment from `n0` to `n1`, in walking order.
fn crossed_edges(mesh: &TriMesh, n0: NodeId, n1: NodeId, tol: f64) -> Result<Vec<EdgeId>> {
    let failed = MeshError::EdgeRecoveryFailed { from: n0, to: n1 };

    let mut current = None;
    for f in mesh.node_faces(n0) {
        let Some(e) = mesh.opposing_edge(f, n0) else {
            continue;
        };
        if crosses(mesh, e, n0, n1, tol)? {
            current = Some((e, f));
            break;
        }
    }

    let mut crossed = Vec::new();
    while let Some((e, from)) = current.take() {
        crossed.push(e);
        if crossed.len() > mesh.num_edges() {
            return Err(failed);
        }

        let Some(g) = mesh
            .edge(e)
            .face_slots()
            .map(|s| s.face)
            .find(|&g| g != from)
        else {
            return Err(failed);
        };
        let face = mesh.face(g);
        let Some(apex) = face.nodes().into_iter().find(|&n| !mesh.edge(e).has_node(n)) else {
            return Err(failed);
        };
        if apex == n1 {
            return Ok(crossed);
        }

        for next in face.edges() {
            if next != e && crosses(mesh, next, n0, n1, tol)? {
                current = Some((next, g));
                break;
            }
        }
        if current.is_none() {
            return Err(MeshError::SegmentThroughNode {
                from: n0,
                to: n1,
                node: apex,
            });
        }
    }
    Err(failed)
}

/// Make an edge between two existing nodes by flipping the edges that the
/// segment between them crosses, then legalize the new diagonals.
///
/// Returns the edge, which may have existed already. The edge is not tagged.
///
/// # Errors
///
/// - [`MeshError::SegmentThroughNode`] if the segment passes through another
///   node. When this is found before any flip the mesh is unchanged;
///   otherwise it is still valid but some edges may have been flipped.
/// - [`MeshError::EdgeRecoveryFailed`] if the segment leaves the surface,
///   crosses a feature edge, or flipping does not converge. The mesh is still
///   valid but some edges may have been flipped.
pub fn insert_delaunay_edge(
    mesh: &mut TriMesh,
    n0: NodeId,
    n1: NodeId,
    options: &InsertOptions,
) -> Result<EdgeId> {
    if n0 == n1 {
        return Err(MeshError::DegenerateEdge { node: n0 });
    }
    mesh.try_node(n0)?;
    mesh.try_node(n1)?;
    if let Some(e) = mesh.find_edge(n0, n1) {
        return Ok(e);
    }

    let failed = || MeshError::EdgeRecoveryFailed { from: n0, to: n1 };
    let tol = options.tolerance;
    let crossed = crossed_edges(mesh, n0, n1, tol)?;
    if crossed.iter().any(|&e| mesh.edge(e).is_feature()) {
        return Err(failed());
    }

    let mut queue: VecDeque<EdgeId> = crossed.into_iter().collect();
    let max_steps = 2 * (queue.len() + 2).pow(2);
    let mut steps = 0;
    let mut created = Vec::new();
    while let Some(e) = queue.pop_front() {
        steps += 1;
        if steps > max_steps {
            return Err(failed());
        }
        if !can_flip(mesh, e) || !mesh.flip_edge(e)? {
            queue.push_back(e);
            continue;
        }
        if crosses(mesh, e, n0, n1, tol)? {
            queue.push_back(e);
        } else {
            created.push(e);
        }
    }

    let edge = mesh.find_edge(n0, n1).ok_or_else(failed)?;
    legalize_keeping(mesh, created, options.flip_budget, Some(edge))?;
    log::trace!("recovered edge {:?} between {:?} and {:?}", edge, n0, n1);
    Ok(edge)
}

/// Smallest sub-segment length worth bisecting near `n0` and `n1`.
fn min_segment_length(mesh: &TriMesh, n0: NodeId, n1: NodeId, tol: f64) -> f64 {
    let mut faces = mesh.node_faces(n0);
    for f in mesh.node_faces(n1) {
        if !faces.contains(&f) {
            faces.push(f);
        }
    }
    let size = if faces.is_empty() {
        mesh.average_edge_length()
    } else {
        faces.iter().map(|&f| mesh.face_size(f)).sum::<f64>() / faces.len() as f64
    };
    tol * size
}

/// Where a sub-segment leaves the faces around its start node.
enum Exit {
    /// It properly crosses an edge at the given point.
    Crossing(EdgeId, Point3<f64>),
    /// It passes through an existing node.
    Through(NodeId),
}

/// Find where the segment from `a` to `b` leaves the star of `a`.
///
/// Crossings closer than `tol` times the segment length to `b` are ignored;
/// splitting there would leave a sliver next to `b`.
fn segment_exit(mesh: &TriMesh, a: NodeId, b: NodeId, tol: f64) -> Option<Exit> {
    let target = *mesh.position(b);
    let snap = tol * (target - mesh.position(a)).norm();
    for f in mesh.node_faces(a) {
        let Some(e) = mesh.opposing_edge(f, a) else {
            continue;
        };
        let nodes = mesh.edge(e).nodes();
        match edge_intersect(mesh, nodes, [a, b], &edge_normal(mesh, e), tol) {
            SegmentIntersection::Crossing { point, .. } if (point - target).norm() > snap => {
                return Some(Exit::Crossing(e, point));
            }
            SegmentIntersection::AtStart => return Some(Exit::Through(nodes[0])),
            SegmentIntersection::AtEnd => return Some(Exit::Through(nodes[1])),
            _ => {}
        }
    }
    None
}

/// Conform the segment from `n0` to `n1` to the mesh.
///
/// If an edge between the two nodes exists it is tagged with `group`.
/// Otherwise the segment is followed out of the faces around `n0`: an edge it
/// properly crosses is split at the crossing, and a node it passes through
/// becomes a break point. Only when neither happens is the segment bisected,
/// with the midpoint inserted by [`insert_delaunay_point`]. Both halves are
/// conformed in turn. New nodes are appended to `node_list`.
///
/// Bisection of a sub-segment stops when it is shorter than the tolerance
/// times the local face size, or after `log2(length / minimum length)`
/// bisections (capped by [`InsertOptions::max_bisection_depth`]). Such
/// sub-segments are reported in the outcome, or as
/// [`MeshError::SegmentNotConformed`] in strict mode.
pub fn insert_edge(
    mesh: &mut TriMesh,
    n0: NodeId,
    n1: NodeId,
    node_list: &mut Vec<NodeId>,
    group: i32,
    options: &InsertOptions,
) -> Result<SegmentOutcome> {
    bisect_segment(mesh, n0, n1, node_list, group, options, false)
}

/// Bisection shared by [`insert_edge`] and the curve drivers. With `recover`,
/// each sub-segment first tries flip-based edge recovery.
pub(crate) fn bisect_segment(
    mesh: &mut TriMesh,
    n0: NodeId,
    n1: NodeId,
    node_list: &mut Vec<NodeId>,
    group: i32,
    options: &InsertOptions,
    recover: bool,
) -> Result<SegmentOutcome> {
    let mut outcome = SegmentOutcome::default();
    if n0 == n1 {
        return Ok(outcome);
    }
    mesh.try_node(n0)?;
    mesh.try_node(n1)?;

    let length = (mesh.position(n1) - mesh.position(n0)).norm();
    let min_length = min_segment_length(mesh, n0, n1, options.tolerance);
    let depth_limit = if min_length > 0.0 && length > min_length {
        ((length / min_length).log2().ceil() as usize).min(options.max_bisection_depth)
    } else {
        0
    };

    // A straight segment crosses each edge at most once.
    let mut cuts_left = mesh.num_edges();
    let mut stack = vec![(n0, n1, 0usize)];
    while let Some((a, b, depth)) = stack.pop() {
        if a == b {
            continue;
        }

        let mut existing = mesh.find_edge(a, b);
        if existing.is_none() && recover {
            existing = match insert_delaunay_edge(mesh, a, b, options) {
                Ok(e) => Some(e),
                Err(MeshError::SegmentThroughNode { .. }) | Err(MeshError::EdgeRecoveryFailed { .. }) => None,
                Err(err) => return Err(err),
            };
        }
        if let Some(e) = existing {
            mesh.edge_mut(e).gid = group;
            outcome.tagged_edges += 1;
            continue;
        }

        if cuts_left > 0 {
            let exit = segment_exit(mesh, a, b, options.tolerance);
            let m = match exit {
                Some(Exit::Crossing(e, q)) => {
                    let m = mesh.add_node(q, 0);
                    mesh.split_edge(e, m)?;
                    node_list.push(m);
                    log::trace!("segment of curve {} crosses edge {:?} at {:?}", group, e, m);
                    Some(m)
                }
                Some(Exit::Through(m)) => Some(m),
                None => None,
            };
            if let Some(m) = m.filter(|&m| m != a && m != b) {
                cuts_left -= 1;
                stack.push((m, b, depth));
                stack.push((a, m, depth));
                continue;
            }
        }

        let sub_length = (mesh.position(b) - mesh.position(a)).norm();
        if depth < depth_limit && sub_length >= min_length {
            let mid = Point3::from((mesh.position(a).coords + mesh.position(b).coords) * 0.5);
            let before = mesh.num_nodes();
            let m = insert_delaunay_point(mesh, &mid, options)?;
            if mesh.num_nodes() > before {
                node_list.push(m);
            }
            if m != a && m != b {
                stack.push((m, b, depth + 1));
                stack.push((a, m, depth + 1));
                continue;
            }
        }

        let warning = ConformWarning::SegmentNotConformed {
            curve: group,
            from: a,
            to: b,
            depth,
        };
        if options.strict {
            return Err(warning.into_error());
        }
        log::warn!(
            "segment {:?} -> {:?} of curve {} not conformed after {} bisections",
            a,
            b,
            group,
            depth
        );
        outcome.warnings.push(warning);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::fixtures::{grid, unit_square, Square};
    use crate::mesh::{build_trimesh, SurfaceMesh, NO_GROUP};
    use approx::assert_relative_eq;

    #[test]
    fn test_options_defaults_and_builders() {
        let options = InsertOptions::default();
        assert_relative_eq!(options.tolerance, 1e-2);
        assert!(options.insert_edges);
        assert!(!options.strict);

        let options = InsertOptions::with_tolerance(1e-3)
            .with_insert_edges(false)
            .with_max_bisection_depth(4)
            .with_flip_budget(10)
            .with_strict(true);
        assert_relative_eq!(options.tolerance, 1e-3);
        assert!(!options.insert_edges);
        assert_eq!(options.max_bisection_depth, 4);
        assert_eq!(options.flip_budget, 10);
        assert!(options.strict);
        assert!(options.validate().is_ok());

        assert!(InsertOptions::with_tolerance(0.0).validate().is_err());
        assert!(InsertOptions::with_tolerance(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_insert_point_inside_face() {
        let Square { mut mesh, .. } = unit_square();
        let n = insert_point(&mut mesh, &Point3::new(0.75, 0.25, 0.0), 1e-3).unwrap();
        assert_eq!(mesh.node(n).valence(), 3);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_nodes(), 5);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_insert_point_on_edge() {
        let Square { mut mesh, nodes } = unit_square();
        let n = insert_point(&mut mesh, &Point3::new(0.5, 0.5, 0.0), 1e-3).unwrap();
        assert_eq!(mesh.node(n).valence(), 4);
        assert!(mesh.find_edge(nodes[0], nodes[2]).is_none());
        assert_eq!(mesh.num_edges(), 8);
        assert_eq!(mesh.euler_characteristic(), 1);
    }

    #[test]
    fn test_insert_point_is_idempotent() {
        let Square { mut mesh, nodes } = unit_square();
        let r = Point3::new(0.3, 0.6, 0.0);
        let first = insert_point(&mut mesh, &r, 1e-3).unwrap();
        let counts = (mesh.num_nodes(), mesh.num_edges(), mesh.num_faces());
        let second = insert_point(&mut mesh, &r, 1e-3).unwrap();
        assert_eq!(first, second);
        assert_eq!(counts, (mesh.num_nodes(), mesh.num_edges(), mesh.num_faces()));

        // Existing corner.
        let corner = insert_point(&mut mesh, &Point3::new(1.0, 1.0, 0.0), 1e-3).unwrap();
        assert_eq!(corner, nodes[2]);
    }

    #[test]
    fn test_insert_point_snaps_to_node() {
        let Square { mut mesh, nodes } = unit_square();
        let n = insert_point(&mut mesh, &Point3::new(1.0 - 1e-4, 1e-4, 0.0), 1e-2).unwrap();
        assert_eq!(n, nodes[1]);
        assert_eq!(mesh.num_nodes(), 4);
    }

    #[test]
    fn test_insert_point_outside() {
        let Square { mut mesh, .. } = unit_square();
        let result = insert_point(&mut mesh, &Point3::new(3.0, 3.0, 0.0), 1e-3);
        assert!(matches!(result, Err(MeshError::PointOutsideMesh { .. })));
        assert_eq!(mesh.num_nodes(), 4);

        let mut empty = TriMesh::new();
        assert_eq!(
            insert_point(&mut empty, &Point3::origin(), 1e-3),
            Err(MeshError::EmptyMesh)
        );
    }

    #[test]
    fn test_insert_point_snaps_to_boundary_edge() {
        let Square { mut mesh, nodes } = unit_square();
        // Slightly outside the bottom edge.
        let n = insert_point(&mut mesh, &Point3::new(0.5, -0.005, 0.0), 1e-2).unwrap();
        assert_relative_eq!(*mesh.position(n), Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert!(mesh.find_edge(nodes[0], nodes[1]).is_none());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_insert_point_over_crease() {
        // Two faces meeting at a ridge along the x axis.
        let surface = crate::mesh::SurfaceMesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, -1.0),
                Point3::new(0.5, -1.0, -1.0),
            ],
            &[[0, 1, 2], [1, 0, 3]],
        );
        let (mut mesh, nodes) = crate::mesh::build_trimesh(&surface).unwrap();
        let n = insert_point(&mut mesh, &Point3::new(0.5, 0.0, 0.2), 1e-3).unwrap();
        assert_relative_eq!(*mesh.position(n), Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert!(mesh.find_edge(nodes[0], nodes[1]).is_none());
        assert_eq!(mesh.num_faces(), 4);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_delaunay_centroid() {
        let Square { mut mesh, .. } = unit_square();
        let options = InsertOptions::default();
        let n = insert_delaunay_point(&mut mesh, &Point3::new(0.5, 0.5, 0.0), &options).unwrap();

        assert_eq!(mesh.num_nodes(), 5);
        assert_eq!(mesh.num_edges(), 8);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.node(n).valence(), 4);
        for e in mesh.edge_ids() {
            assert!(is_locally_delaunay(&mesh, e));
        }
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_delaunay_point_flips_bad_edges() {
        let Square { mut mesh, .. } = grid(3);
        let options = InsertOptions::default();
        // Near a cell corner, the plain split leaves obtuse pairs behind.
        insert_delaunay_point(&mut mesh, &Point3::new(1.1, 1.05, 0.0), &options).unwrap();
        for e in mesh.edge_ids() {
            assert!(is_locally_delaunay(&mesh, e), "edge {:?} not Delaunay", e);
        }
        assert_eq!(mesh.euler_characteristic(), 1);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_legalize_skips_feature_edges() {
        let Square { mut mesh, nodes } = grid(2);
        // Shear the grid so the stored diagonals are no longer Delaunay.
        let moved: Vec<_> = mesh.node_ids().collect();
        for n in moved {
            let p = *mesh.position(n);
            mesh.set_position(n, Point3::new(p.x + 2.0 * p.y, p.y, 0.0)).unwrap();
        }
        let diag = mesh.find_edge(nodes[0], nodes[4]).unwrap();
        mesh.edge_mut(diag).gid = 0;

        let all: Vec<_> = mesh.edge_ids().collect();
        legalize(&mut mesh, all, 100).unwrap();
        assert!(mesh.find_edge(nodes[0], nodes[4]).is_some());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_legalize_budget() {
        let Square { mut mesh, .. } = grid(2);
        let moved: Vec<_> = mesh.node_ids().collect();
        for n in moved {
            let p = *mesh.position(n);
            mesh.set_position(n, Point3::new(p.x + 2.0 * p.y, p.y, 0.0)).unwrap();
        }
        let all: Vec<_> = mesh.edge_ids().collect();
        assert_eq!(legalize(&mut mesh, all.clone(), 0).unwrap(), 0);
        assert!(legalize(&mut mesh, all, 100).unwrap() > 0);
    }

    #[test]
    fn test_delaunay_edge_by_flip() {
        let Square { mut mesh, nodes } = unit_square();
        let e = insert_delaunay_edge(&mut mesh, nodes[1], nodes[3], &InsertOptions::default()).unwrap();
        assert_eq!(mesh.find_edge(nodes[1], nodes[3]), Some(e));
        assert!(mesh.find_edge(nodes[0], nodes[2]).is_none());
        assert_eq!(mesh.edge(e).gid, NO_GROUP);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_delaunay_edge_across_grid() {
        let Square { mut mesh, nodes } = grid(4);
        // (0, 1) to (4, 2) crosses several diagonals and verticals.
        let (a, b) = (nodes[5], nodes[14]);
        let e = insert_delaunay_edge(&mut mesh, a, b, &InsertOptions::default()).unwrap();
        assert_eq!(mesh.find_edge(a, b), Some(e));
        assert_eq!(mesh.euler_characteristic(), 1);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_delaunay_edge_through_node() {
        let Square { mut mesh, nodes } = grid(2);
        // (0, 0) to (2, 2) passes through the center node (1, 1).
        let result = insert_delaunay_edge(&mut mesh, nodes[0], nodes[8], &InsertOptions::default());
        assert!(matches!(result, Err(MeshError::SegmentThroughNode { .. })));
    }

    #[test]
    fn test_delaunay_edge_through_node_after_flip() {
        // From B the walk crosses C-Y, X-Y and Z-X without touching C. C-Y
        // cannot flip, and flipping X-Y gives the long edge C-Z, which the
        // segment meets within tolerance of C.
        let surface = SurfaceMesh::from_triangles(
            &[
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.05, 0.0),
                Point3::new(-0.3, 0.3, 0.0),
                Point3::new(0.3, -0.3, 0.0),
                Point3::new(0.0, -6.0, 0.0),
            ],
            &[[0, 5, 3], [3, 5, 4], [3, 4, 2], [2, 4, 1]],
        );
        let (mut mesh, nodes) = build_trimesh(&surface).unwrap();
        let result = insert_delaunay_edge(&mut mesh, nodes[1], nodes[0], &InsertOptions::default());
        assert!(matches!(
            result,
            Err(MeshError::SegmentThroughNode { node, .. }) if node == nodes[2]
        ));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_insert_edge_existing() {
        let Square { mut mesh, nodes } = unit_square();
        let mut list = Vec::new();
        let outcome =
            insert_edge(&mut mesh, nodes[0], nodes[2], &mut list, 3, &InsertOptions::default()).unwrap();
        assert!(outcome.is_conformed());
        assert_eq!(outcome.tagged_edges, 1);
        assert!(list.is_empty());
        let diag = mesh.find_edge(nodes[0], nodes[2]).unwrap();
        assert_eq!(mesh.edge(diag).gid, 3);

        let outcome =
            insert_edge(&mut mesh, nodes[0], nodes[0], &mut list, 3, &InsertOptions::default()).unwrap();
        assert_eq!(outcome, SegmentOutcome::default());
    }

    #[test]
    fn test_insert_edge_bisects() {
        let Square { mut mesh, nodes } = unit_square();
        let mut list = Vec::new();
        let outcome =
            insert_edge(&mut mesh, nodes[1], nodes[3], &mut list, 2, &InsertOptions::default()).unwrap();
        assert!(outcome.is_conformed());
        assert_eq!(outcome.tagged_edges, 2);
        assert_eq!(list.len(), 1);
        let mid = list[0];
        assert_relative_eq!(*mesh.position(mid), Point3::new(0.5, 0.5, 0.0), epsilon = 1e-12);
        assert_eq!(mesh.edge(mesh.find_edge(nodes[1], mid).unwrap()).gid, 2);
        assert_eq!(mesh.edge(mesh.find_edge(mid, nodes[3]).unwrap()).gid, 2);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_insert_edge_splits_crossed_edge() {
        let Square { mut mesh, nodes } = unit_square();
        let options = InsertOptions::default().with_max_bisection_depth(0);
        let mut list = Vec::new();
        // (1, 0) to (0, 1) crosses the 0-2 diagonal; no bisection is allowed.
        let outcome = insert_edge(&mut mesh, nodes[1], nodes[3], &mut list, 1, &options).unwrap();
        assert!(outcome.is_conformed());
        assert_eq!(outcome.tagged_edges, 2);
        assert_eq!(list.len(), 1);
        assert_relative_eq!(*mesh.position(list[0]), Point3::new(0.5, 0.5, 0.0), epsilon = 1e-12);
        assert!(mesh.find_edge(nodes[0], nodes[2]).is_none());
        assert_eq!(mesh.edge(mesh.find_edge(nodes[0], list[0]).unwrap()).gid, NO_GROUP);
        assert_eq!(mesh.num_faces(), 4);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_insert_edge_follows_nodes_on_segment() {
        let Square { mut mesh, nodes } = grid(4);
        let options = InsertOptions::default().with_max_bisection_depth(0);
        let mut list = Vec::new();
        // The diagonal from (0, 0) to (4, 4) runs through nodes 6, 12 and 18.
        let outcome = insert_edge(&mut mesh, nodes[0], nodes[24], &mut list, 0, &options).unwrap();
        assert!(outcome.is_conformed());
        assert_eq!(outcome.tagged_edges, 4);
        assert!(list.is_empty());
        for pair in [0, 6, 12, 18, 24].windows(2) {
            let e = mesh.find_edge(nodes[pair[0]], nodes[pair[1]]).unwrap();
            assert_eq!(mesh.edge(e).gid, 0);
        }
        assert_eq!(mesh.num_nodes(), 25);
    }

    #[test]
    fn test_insert_edge_truncation_is_reported() {
        let Square { mut mesh, nodes } = unit_square();
        let target = insert_point(&mut mesh, &Point3::new(0.5, 0.5005, 0.0), 1e-6).unwrap();
        let options = InsertOptions::default().with_max_bisection_depth(0);
        let mut list = Vec::new();
        // The diagonal crossing lies within tolerance of the target, so it is not split.
        let outcome = insert_edge(&mut mesh, nodes[1], target, &mut list, 0, &options).unwrap();
        assert!(!outcome.is_conformed());
        assert!(list.is_empty());
        assert_eq!(
            outcome.warnings,
            vec![ConformWarning::SegmentNotConformed {
                curve: 0,
                from: nodes[1],
                to: target,
                depth: 0,
            }]
        );

        let strict = options.with_strict(true);
        let result = insert_edge(&mut mesh, nodes[1], target, &mut list, 0, &strict);
        assert!(matches!(result, Err(MeshError::SegmentNotConformed { depth: 0, .. })));
    }
}
