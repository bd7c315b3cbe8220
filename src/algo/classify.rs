//! Geometric classification of points and segments against mesh elements.
//!
//! These predicates decide where a curve node lands on the surface (on a node,
//! on an edge, inside a face, or outside) and whether a curve segment crosses
//! a mesh edge. All tests are tolerance based; the tolerance is relative to
//! the size of the element being tested.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector2, Vector3};

use crate::mesh::{EdgeId, FaceId, NodeId, TriMesh, Winding};

/// Fixed barycentric tolerance for the inside-face test.
const INSIDE_TOL: f64 = 1e-6;

/// Slack on the opposite-angle sum so that co-circular quads are not flipped
/// back and forth.
const DELAUNAY_SLACK: f64 = 1e-10;

/// Where a point lands relative to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceHit {
    /// The projection is outside the face.
    Outside,
    /// The projection coincides with local node `i`.
    Node(usize),
    /// The projection lies on local edge `i`.
    Edge(usize),
    /// The projection lies strictly inside the face.
    Inside,
}

impl FaceHit {
    /// Integer classification code: -1 outside, 0..=2 node, 3..=5 edge, 6 inside.
    pub fn code(self) -> i32 {
        match self {
            FaceHit::Outside => -1,
            FaceHit::Node(i) => i as i32,
            FaceHit::Edge(i) => 3 + i as i32,
            FaceHit::Inside => 6,
        }
    }

    /// Whether the point lands on the face at all.
    pub fn is_hit(self) -> bool {
        self != FaceHit::Outside
    }
}

/// Project a point onto the plane of face `f` and classify the projection.
///
/// Node and edge snapping use `tol` relative to the longest edge of the face;
/// when the point snaps, the returned point is moved onto the node or edge.
///
/// # Panics
/// Panics if `f` is stale.
pub fn project_to_face(mesh: &TriMesh, f: FaceId, p: &Point3<f64>, tol: f64) -> (FaceHit, Point3<f64>) {
    let face = mesh.face(f);
    let [r0, r1, r2] = mesh.face_positions(f);
    let normal = face.normal();
    let mut q = p - normal * (p - r0).dot(&normal);

    let lengths = face.edges().map(|e| mesh.edge_length(e));
    let mut lmax = lengths[0].max(lengths[1]).max(lengths[2]);
    if lmax == 0.0 {
        lmax = 1.0;
    }

    for (i, r) in [r0, r1, r2].iter().enumerate() {
        if (r - q).norm() / lmax < tol {
            return (FaceHit::Node(i), *r);
        }
    }

    for (i, &e) in face.edges().iter().enumerate() {
        if lengths[i] == 0.0 {
            continue;
        }
        let [a, b] = mesh.edge(e).nodes();
        let origin = mesh.position(a);
        let t = mesh.position(b) - origin;
        let r = q - origin;
        let c = r.dot(&t) / t.norm_squared();
        let h = (r - t * c).norm() / lengths[i];
        if c > 0.0 && c < 1.0 && h <= tol {
            q = origin + t * c;
            return (FaceHit::Edge(i), q);
        }
    }

    // Decompose q - r0 in the dual basis of the two face edges from r0.
    let e0 = r1 - r0;
    let e1 = r2 - r0;
    let (g00, g01, g11) = (e0.dot(&e0), e0.dot(&e1), e1.dot(&e1));
    let det = g00 * g11 - g01 * g01;
    if det == 0.0 {
        return (FaceHit::Outside, q);
    }
    let dual0 = (e0 * g11 - e1 * g01) / det;
    let dual1 = (e1 * g00 - e0 * g01) / det;
    let d = q - r0;
    let (s, t) = (dual0.dot(&d), dual1.dot(&d));

    if s >= -INSIDE_TOL && t >= -INSIDE_TOL && s + t <= 1.0 + INSIDE_TOL {
        (FaceHit::Inside, q)
    } else {
        (FaceHit::Outside, q)
    }
}

/// Orthogonal projection of a point onto the line of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeProjection {
    /// Unclamped line parameter; 0 at the first node, 1 at the second.
    pub t: f64,
    /// Projected point, clamped to the edge.
    pub point: Point3<f64>,
    /// Distance along the edge from its first node to `point`.
    pub arclength: f64,
}

impl EdgeProjection {
    /// Whether the projection falls strictly between the two nodes.
    pub fn is_interior(&self) -> bool {
        self.t > 0.0 && self.t < 1.0
    }
}

/// Project a point onto an edge.
///
/// # Panics
/// Panics if `e` is stale.
pub fn project_to_edge(mesh: &TriMesh, e: EdgeId, r: &Point3<f64>) -> EdgeProjection {
    let [a, b] = mesh.edge(e).nodes();
    let origin = mesh.position(a);
    let tangent = mesh.position(b) - origin;
    let len2 = tangent.norm_squared();
    let t = if len2 > 0.0 {
        tangent.dot(&(r - origin)) / len2
    } else {
        0.0
    };
    let clamped = t.clamp(0.0, 1.0);
    EdgeProjection {
        t,
        point: origin + tangent * clamped,
        arclength: clamped * len2.sqrt(),
    }
}

/// How two segments meet in a plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    /// The segments do not meet, or are parallel.
    None,
    /// The second segment passes through the start of the first.
    AtStart,
    /// The second segment passes through the end of the first.
    AtEnd,
    /// The segments cross in the interior of the first.
    Crossing {
        /// Crossing point on the first segment.
        point: Point3<f64>,
        /// Distance between the two segments at the crossing, measured in 3D.
        gap: f64,
    },
    /// The segments share exactly one end node.
    SharedEndpoint,
    /// The segments connect the same two nodes.
    Identical,
}

impl SegmentIntersection {
    /// Integer classification code: 0 none, 1 at start, 2 at end, 3 crossing,
    /// 4 shared end node, 5 identical.
    pub fn code(&self) -> i32 {
        match self {
            SegmentIntersection::None => 0,
            SegmentIntersection::AtStart => 1,
            SegmentIntersection::AtEnd => 2,
            SegmentIntersection::Crossing { .. } => 3,
            SegmentIntersection::SharedEndpoint => 4,
            SegmentIntersection::Identical => 5,
        }
    }
}

/// Classify how segment `b` meets segment `a` in the plane through `a[0]` with
/// the given normal.
///
/// `tol` is the fraction of `a` within which a crossing snaps to one of its
/// end nodes.
///
/// # Panics
/// Panics if any of the four node handles is stale, unless the pairs are
/// identical or share an endpoint.
pub fn edge_intersect(
    mesh: &TriMesh,
    a: [NodeId; 2],
    b: [NodeId; 2],
    normal: &Vector3<f64>,
    tol: f64,
) -> SegmentIntersection {
    if (a[0] == b[0] && a[1] == b[1]) || (a[0] == b[1] && a[1] == b[0]) {
        return SegmentIntersection::Identical;
    }
    if b.contains(&a[0]) || b.contains(&a[1]) {
        return SegmentIntersection::SharedEndpoint;
    }

    let Some(n) = normal.try_normalize(0.0) else {
        return SegmentIntersection::None;
    };
    let r0 = mesh.position(a[0]);
    let r1 = mesh.position(a[1]);
    let r2 = mesh.position(b[0]);
    let r3 = mesh.position(b[1]);

    let flatten = |r: &Point3<f64>| r - n * (r - r0).dot(&n);
    let (pa, pb, pc) = (flatten(r1), flatten(r2), flatten(r3));

    let (u, v) = plane_basis(&n);
    let to_2d = |w: Vector3<f64>| Vector2::new(w.dot(&u), w.dot(&v));
    let t = to_2d(pa - r0);
    let r = to_2d(pc - pb);
    let p = to_2d(pb - r0);

    // Solve r0 + t * lm = b + r * mu.
    let det = t.x * -r.y + r.x * t.y;
    if det == 0.0 || det.abs() <= 1e-14 * t.norm() * r.norm() {
        return SegmentIntersection::None;
    }
    let lm = (-r.y * p.x + r.x * p.y) / det;
    let mu = (-t.y * p.x + t.x * p.y) / det;

    if !(0.0..=1.0).contains(&mu) {
        return SegmentIntersection::None;
    }
    if (0.0..=tol).contains(&lm) {
        return SegmentIntersection::AtStart;
    }
    if lm <= 1.0 && lm >= 1.0 - tol {
        return SegmentIntersection::AtEnd;
    }
    if lm > tol && lm < 1.0 - tol {
        let point = r0 + (r1 - r0) * lm;
        let on_b = r2 + (r3 - r2) * mu;
        return SegmentIntersection::Crossing {
            point,
            gap: (on_b - point).norm(),
        };
    }
    SegmentIntersection::None
}

/// Two unit vectors spanning the plane orthogonal to `n`.
fn plane_basis(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let axis = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
        Vector3::x()
    } else if n.y.abs() <= n.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u = n.cross(&axis).normalize();
    let v = n.cross(&u);
    (u, v)
}

/// The quad around an interior edge as `[n0, n1, n2, n3]`: the edge's nodes in
/// the winding of its first face, then the node opposite in each face.
pub(crate) fn edge_quad(mesh: &TriMesh, e: EdgeId) -> Option<[NodeId; 4]> {
    let edge = mesh.edge(e);
    let s0 = edge.slot(0)?;
    edge.slot(1)?;
    let [a, b] = edge.nodes();
    let (n0, n1) = match mesh.face(s0.face).winding()[s0.local] {
        Winding::Forward => (a, b),
        Winding::Reverse => (b, a),
    };
    Some([n0, n1, mesh.opposing_node(e, 0)?, mesh.opposing_node(e, 1)?])
}

/// Whether an edge satisfies the local Delaunay condition.
///
/// Uses the sum of the two angles opposite the edge, which stays meaningful on
/// curved surfaces where an in-circle test would not. Boundary edges are always
/// locally Delaunay.
pub fn is_locally_delaunay(mesh: &TriMesh, e: EdgeId) -> bool {
    let Some([n0, n1, n2, n3]) = edge_quad(mesh, e) else {
        return true;
    };
    let (p0, p1) = (mesh.position(n0), mesh.position(n1));
    let angle_at = |apex: &Point3<f64>| (p0 - apex).angle(&(p1 - apex));
    angle_at(mesh.position(n2)) + angle_at(mesh.position(n3)) <= PI + DELAUNAY_SLACK
}

/// Whether flipping `e` yields two valid triangles.
///
/// The flipped pair must be non-degenerate and keep the orientation of the
/// current pair, which fails when the quad around `e` is not convex. Boundary
/// edges and edges whose flipped diagonal already exists cannot be flipped.
pub fn can_flip(mesh: &TriMesh, e: EdgeId) -> bool {
    let Some([n0, n1, n2, n3]) = edge_quad(mesh, e) else {
        return false;
    };
    if n2 == n3 || mesh.find_edge(n2, n3).is_some() {
        return false;
    }
    let edge = mesh.edge(e);
    let reference = edge
        .face_slots()
        .map(|s| mesh.face(s.face).normal())
        .sum::<Vector3<f64>>();
    let Some(reference) = reference.try_normalize(0.0) else {
        return false;
    };

    let p = |n: NodeId| *mesh.position(n);
    keeps_orientation(&p(n0), &p(n3), &p(n2), &reference)
        && keeps_orientation(&p(n1), &p(n2), &p(n3), &reference)
}

fn keeps_orientation(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, reference: &Vector3<f64>) -> bool {
    let (ab, ac) = (b - a, c - a);
    let scale = ab.norm_squared().max(ac.norm_squared());
    scale > 0.0 && ab.cross(&ac).dot(reference) > 1e-12 * scale
}
