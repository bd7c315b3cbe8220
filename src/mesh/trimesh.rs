//! Triangle mesh container with explicit node, edge, and face records.
//!
//! Unlike a half-edge structure, [`TriMesh`] stores every edge once, together
//! with the (at most two) faces that use it and the local index of the edge
//! inside each face. Faces store their three nodes, three edges, and the
//! winding of each edge. This layout makes the local edits needed for curve
//! insertion (splitting faces and edges, flipping diagonals) cheap and keeps
//! every handle held elsewhere valid across unrelated edits.
//!
//! # Conventions
//!
//! - Face `f` walks `nodes[i] -> nodes[(i + 1) % 3]` along `edges[i]`.
//! - An edge has two face slots; an empty slot means the edge lies on the
//!   boundary on that side.
//! - Node valence is the number of incident edges (0 = isolated node).

use std::collections::HashSet;

use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;
use smallvec::SmallVec;

use super::index::{EdgeId, FaceId, FaceSlot, NodeId, Winding, NO_GROUP};
use crate::error::{MeshError, Result};

/// A node (vertex) of the mesh.
#[derive(Debug, Clone)]
pub struct Node {
    /// Spatial position.
    pub position: Point3<f64>,
    /// User tag.
    pub tag: i32,
    /// Group id.
    pub gid: i32,
    /// Incident edges.
    pub(crate) edges: SmallVec<[EdgeId; 8]>,
}

impl Node {
    fn new(position: Point3<f64>, tag: i32) -> Self {
        Self {
            position,
            tag,
            gid: NO_GROUP,
            edges: SmallVec::new(),
        }
    }

    /// Number of edges connected to this node.
    #[inline]
    pub fn valence(&self) -> usize {
        self.edges.len()
    }

    /// Edges connected to this node.
    #[inline]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// An edge between two nodes, shared by at most two faces.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) nodes: [NodeId; 2],
    pub(crate) faces: [Option<FaceSlot>; 2],
    /// User tag.
    pub tag: i32,
    /// Group id of the feature line this edge belongs to, or [`NO_GROUP`].
    pub gid: i32,
}

impl Edge {
    fn new(n0: NodeId, n1: NodeId, tag: i32) -> Self {
        Self {
            nodes: [n0, n1],
            faces: [None, None],
            tag,
            gid: NO_GROUP,
        }
    }

    /// The two end nodes, in stored order.
    #[inline]
    pub fn nodes(&self) -> [NodeId; 2] {
        self.nodes
    }

    /// The face occupying slot `i` (0 or 1), if any.
    #[inline]
    pub fn slot(&self, i: usize) -> Option<FaceSlot> {
        self.faces[i]
    }

    /// Iterate over the occupied face slots.
    pub fn face_slots(&self) -> impl Iterator<Item = FaceSlot> + '_ {
        self.faces.iter().flatten().copied()
    }

    /// Number of faces using this edge (0, 1 or 2).
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.iter().filter(|s| s.is_some()).count()
    }

    /// Whether fewer than two faces use this edge.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.face_count() < 2
    }

    /// Whether this edge belongs to a feature line.
    #[inline]
    pub fn is_feature(&self) -> bool {
        self.gid != NO_GROUP
    }

    /// Whether `n` is one of the end nodes.
    #[inline]
    pub fn has_node(&self, n: NodeId) -> bool {
        self.nodes[0] == n || self.nodes[1] == n
    }

    /// The end node opposite to `n`, or `None` if `n` is not an end node.
    #[inline]
    pub fn other_node(&self, n: NodeId) -> Option<NodeId> {
        if self.nodes[0] == n {
            Some(self.nodes[1])
        } else if self.nodes[1] == n {
            Some(self.nodes[0])
        } else {
            None
        }
    }

    fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.nodes[0] == a && self.nodes[1] == b) || (self.nodes[0] == b && self.nodes[1] == a)
    }
}

/// A triangular face.
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) nodes: [NodeId; 3],
    pub(crate) edges: [EdgeId; 3],
    pub(crate) winding: [Winding; 3],
    pub(crate) normal: Vector3<f64>,
    /// User tag.
    pub tag: i32,
    /// Group (surface partition) id.
    pub gid: i32,
}

impl Face {
    /// The three nodes in cyclic order.
    #[inline]
    pub fn nodes(&self) -> [NodeId; 3] {
        self.nodes
    }

    /// The three edges; edge `i` connects node `i` and node `i + 1`.
    #[inline]
    pub fn edges(&self) -> [EdgeId; 3] {
        self.edges
    }

    /// Winding of each edge relative to the face.
    #[inline]
    pub fn winding(&self) -> [Winding; 3] {
        self.winding
    }

    /// Unit normal (zero for a degenerate face).
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Local index of node `n`, if it belongs to this face.
    #[inline]
    pub fn local_node(&self, n: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&x| x == n)
    }

    /// Local index of edge `e`, if it belongs to this face.
    #[inline]
    pub fn local_edge(&self, e: EdgeId) -> Option<usize> {
        self.edges.iter().position(|&x| x == e)
    }
}

/// Description of a face to add with [`TriMesh::add_face`].
#[derive(Debug, Clone, Copy)]
pub struct FaceSpec {
    /// Nodes in cyclic order.
    pub nodes: [NodeId; 3],
    /// Edge `i` must connect `nodes[i]` and `nodes[(i + 1) % 3]`.
    pub edges: [EdgeId; 3],
    /// User tag.
    pub tag: i32,
    /// Group id.
    pub gid: i32,
}

impl FaceSpec {
    /// Create a face description with tag 0 and group 0.
    pub fn new(nodes: [NodeId; 3], edges: [EdgeId; 3]) -> Self {
        Self {
            nodes,
            edges,
            tag: 0,
            gid: 0,
        }
    }

    /// Copy the tag and group id of an existing face.
    pub fn inherit(mut self, face: &Face) -> Self {
        self.tag = face.tag;
        self.gid = face.gid;
        self
    }
}

/// A triangle mesh built from node, edge, and face arenas.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    nodes: SlotMap<NodeId, Node>,
    edges: SlotMap<EdgeId, Edge>,
    faces: SlotMap<FaceId, Face>,
}

impl TriMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_nodes: usize, num_faces: usize) -> Self {
        // E ~ 3F/2 for a closed surface, a little more with boundary
        let num_edges = num_faces * 3 / 2 + num_faces / 4;
        Self {
            nodes: SlotMap::with_capacity_and_key(num_nodes),
            edges: SlotMap::with_capacity_and_key(num_edges),
            faces: SlotMap::with_capacity_and_key(num_faces),
        }
    }

    // ==================== Accessors ====================

    /// Number of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether the node handle is live.
    #[inline]
    pub fn contains_node(&self, n: NodeId) -> bool {
        self.nodes.contains_key(n)
    }

    /// Whether the edge handle is live.
    #[inline]
    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.edges.contains_key(e)
    }

    /// Whether the face handle is live.
    #[inline]
    pub fn contains_face(&self, f: FaceId) -> bool {
        self.faces.contains_key(f)
    }

    /// Get a node.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn node(&self, n: NodeId) -> &Node {
        &self.nodes[n]
    }

    /// Get a mutable node.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn node_mut(&mut self, n: NodeId) -> &mut Node {
        &mut self.nodes[n]
    }

    /// Get an edge.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn edge(&self, e: EdgeId) -> &Edge {
        &self.edges[e]
    }

    /// Get a mutable edge.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn edge_mut(&mut self, e: EdgeId) -> &mut Edge {
        &mut self.edges[e]
    }

    /// Get a face.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn face(&self, f: FaceId) -> &Face {
        &self.faces[f]
    }

    /// Get a mutable face.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn face_mut(&mut self, f: FaceId) -> &mut Face {
        &mut self.faces[f]
    }

    /// Get a node, or `None` if the handle is stale.
    #[inline]
    pub fn get_node(&self, n: NodeId) -> Option<&Node> {
        self.nodes.get(n)
    }

    /// Get an edge, or `None` if the handle is stale.
    #[inline]
    pub fn get_edge(&self, e: EdgeId) -> Option<&Edge> {
        self.edges.get(e)
    }

    /// Get a face, or `None` if the handle is stale.
    #[inline]
    pub fn get_face(&self, f: FaceId) -> Option<&Face> {
        self.faces.get(f)
    }

    pub(crate) fn try_node(&self, n: NodeId) -> Result<&Node> {
        self.nodes.get(n).ok_or(MeshError::StaleHandle { kind: "node" })
    }

    pub(crate) fn try_edge(&self, e: EdgeId) -> Result<&Edge> {
        self.edges.get(e).ok_or(MeshError::StaleHandle { kind: "edge" })
    }

    pub(crate) fn try_face(&self, f: FaceId) -> Result<&Face> {
        self.faces.get(f).ok_or(MeshError::StaleHandle { kind: "face" })
    }

    /// Position of a node.
    #[inline]
    pub fn position(&self, n: NodeId) -> &Point3<f64> {
        &self.nodes[n].position
    }

    /// Move a node and refresh the normals of its faces.
    pub fn set_position(&mut self, n: NodeId, position: Point3<f64>) -> Result<()> {
        self.nodes
            .get_mut(n)
            .ok_or(MeshError::StaleHandle { kind: "node" })?
            .position = position;
        for f in self.node_faces(n) {
            let normal = self.compute_normal(self.faces[f].nodes);
            self.faces[f].normal = normal;
        }
        Ok(())
    }

    // ==================== Iteration ====================

    /// Iterate over all node handles.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    /// Iterate over all nodes with their handles.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter()
    }

    /// Iterate over all edge handles.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    /// Iterate over all edges with their handles.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter()
    }

    /// Iterate over all face handles.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    /// Iterate over all faces with their handles.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &Face)> + '_ {
        self.faces.iter()
    }

    /// Iterate over edges used by fewer than two faces.
    pub fn boundary_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .filter(|(_, e)| e.is_boundary())
            .map(|(id, _)| id)
    }

    // ==================== Topology Queries ====================

    /// Edges connected to a node.
    pub fn node_edges(&self, n: NodeId) -> &[EdgeId] {
        self.nodes.get(n).map(|node| node.edges()).unwrap_or(&[])
    }

    /// Faces that use a node, without duplicates.
    pub fn node_faces(&self, n: NodeId) -> Vec<FaceId> {
        let mut out: Vec<FaceId> = Vec::new();
        for &e in self.node_edges(n) {
            for slot in self.edges[e].face_slots() {
                if !out.contains(&slot.face) {
                    out.push(slot.face);
                }
            }
        }
        out
    }

    /// Find the edge connecting two nodes.
    ///
    /// Runs in O(valence of `n0`).
    pub fn find_edge(&self, n0: NodeId, n1: NodeId) -> Option<EdgeId> {
        self.nodes
            .get(n0)?
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges[e].other_node(n0) == Some(n1))
    }

    /// The node of the face in `slot` that is not on edge `e`.
    pub fn opposing_node(&self, e: EdgeId, slot: usize) -> Option<NodeId> {
        let s = self.edges.get(e)?.faces[slot]?;
        Some(self.faces[s.face].nodes[(s.local + 2) % 3])
    }

    /// The edge that follows `e` in the face in `slot`.
    pub fn next_edge(&self, e: EdgeId, slot: usize) -> Option<EdgeId> {
        let s = self.edges.get(e)?.faces[slot]?;
        Some(self.faces[s.face].edges[(s.local + 1) % 3])
    }

    /// The edge that precedes `e` in the face in `slot`.
    pub fn prev_edge(&self, e: EdgeId, slot: usize) -> Option<EdgeId> {
        let s = self.edges.get(e)?.faces[slot]?;
        Some(self.faces[s.face].edges[(s.local + 2) % 3])
    }

    /// The edge of face `f` that does not touch node `n`.
    pub fn opposing_edge(&self, f: FaceId, n: NodeId) -> Option<EdgeId> {
        let face = self.faces.get(f)?;
        let i = face.local_node(n)?;
        Some(face.edges[(i + 1) % 3])
    }

    /// The face across edge `i` of face `f`.
    pub fn face_neighbor(&self, f: FaceId, i: usize) -> Option<FaceId> {
        let e = self.faces.get(f)?.edges[i];
        self.edges[e]
            .face_slots()
            .map(|s| s.face)
            .find(|&g| g != f)
    }

    /// Winding of edge `e` inside face `f`.
    pub fn edge_winding(&self, f: FaceId, e: EdgeId) -> Option<Winding> {
        let face = self.faces.get(f)?;
        face.local_edge(e).map(|i| face.winding[i])
    }

    fn face_edge_between(&self, f: FaceId, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.faces[f]
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges[e].connects(a, b))
    }

    // ==================== Geometry ====================

    /// Positions of the three face nodes.
    pub fn face_positions(&self, f: FaceId) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f].nodes;
        [*self.position(a), *self.position(b), *self.position(c)]
    }

    /// Area of a face.
    pub fn face_area(&self, f: FaceId) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Root-mean-square edge length of a face.
    pub fn face_size(&self, f: FaceId) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        let l2 = (p1 - p0).norm_squared() + (p2 - p1).norm_squared() + (p0 - p2).norm_squared();
        (l2 / 3.0).sqrt()
    }

    /// Centroid of a face.
    pub fn face_centroid(&self, f: FaceId) -> Point3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// Length of an edge.
    pub fn edge_length(&self, e: EdgeId) -> f64 {
        let [a, b] = self.edges[e].nodes;
        (self.position(b) - self.position(a)).norm()
    }

    /// Average edge length, or 0 for a mesh without edges.
    pub fn average_edge_length(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        let total: f64 = self.edge_ids().map(|e| self.edge_length(e)).sum();
        total / self.edges.len() as f64
    }

    /// Axis-aligned bounding box of all nodes.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut it = self.nodes.values();
        let first = it.next()?.position;
        let (mut min, mut max) = (first, first);
        for node in it {
            for i in 0..3 {
                min[i] = min[i].min(node.position[i]);
                max[i] = max[i].max(node.position[i]);
            }
        }
        Some((min, max))
    }

    fn compute_normal(&self, nodes: [NodeId; 3]) -> Vector3<f64> {
        let p0 = self.position(nodes[0]);
        let n = (self.position(nodes[1]) - p0).cross(&(self.position(nodes[2]) - p0));
        n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
    }

    // ==================== Construction ====================

    /// Add an isolated node.
    pub fn add_node(&mut self, position: Point3<f64>, tag: i32) -> NodeId {
        self.nodes.insert(Node::new(position, tag))
    }

    /// Add an edge that is not yet attached to any face.
    pub fn add_edge(&mut self, n0: NodeId, n1: NodeId, tag: i32) -> Result<EdgeId> {
        if n0 == n1 {
            return Err(MeshError::DegenerateEdge { node: n0 });
        }
        self.try_node(n0)?;
        self.try_node(n1)?;

        let e = self.edges.insert(Edge::new(n0, n1, tag));
        self.nodes[n0].edges.push(e);
        self.nodes[n1].edges.push(e);
        Ok(e)
    }

    /// Add a face over existing nodes and edges.
    ///
    /// Fails without modifying the mesh if the nodes are not distinct, an
    /// edge does not connect consecutive nodes, or an edge already has two
    /// faces.
    pub fn add_face(&mut self, spec: FaceSpec) -> Result<FaceId> {
        let [n0, n1, n2] = spec.nodes;
        if n0 == n1 || n0 == n2 {
            return Err(MeshError::DuplicateFaceNode { node: n0 });
        }
        if n1 == n2 {
            return Err(MeshError::DuplicateFaceNode { node: n1 });
        }
        for n in spec.nodes {
            self.try_node(n)?;
        }

        let winding = self.check_face_edges(&spec.nodes, &spec.edges)?;
        for &e in &spec.edges {
            if self.edges[e].face_count() == 2 {
                return Err(MeshError::NonManifoldEdge { edge: e });
            }
        }

        let normal = self.compute_normal(spec.nodes);
        let f = self.faces.insert(Face {
            nodes: spec.nodes,
            edges: spec.edges,
            winding,
            normal,
            tag: spec.tag,
            gid: spec.gid,
        });
        for (local, &e) in spec.edges.iter().enumerate() {
            self.attach(e, FaceSlot { face: f, local })?;
        }
        Ok(f)
    }

    fn check_face_edges(&self, nodes: &[NodeId; 3], edges: &[EdgeId; 3]) -> Result<[Winding; 3]> {
        let mut winding = [Winding::Forward; 3];
        for i in 0..3 {
            let edge = self.try_edge(edges[i])?;
            let a = nodes[i];
            let b = nodes[(i + 1) % 3];
            winding[i] = if edge.nodes == [a, b] {
                Winding::Forward
            } else if edge.nodes == [b, a] {
                Winding::Reverse
            } else {
                return Err(MeshError::FaceEdgeMismatch { slot: i });
            };
        }
        Ok(winding)
    }

    fn attach(&mut self, e: EdgeId, slot: FaceSlot) -> Result<()> {
        let edge = &mut self.edges[e];
        match edge.faces.iter_mut().find(|s| s.is_none()) {
            Some(free) => {
                *free = Some(slot);
                Ok(())
            }
            None => Err(MeshError::NonManifoldEdge { edge: e }),
        }
    }

    fn detach(&mut self, e: EdgeId, f: FaceId) -> Result<()> {
        let edge = self
            .edges
            .get_mut(e)
            .ok_or(MeshError::StaleHandle { kind: "edge" })?;
        match edge
            .faces
            .iter_mut()
            .find(|s| matches!(s, Some(slot) if slot.face == f))
        {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(MeshError::NotAdjacent { face: f, edge: e }),
        }
    }

    /// Recompute windings, normal, and edge slots of a face whose nodes and
    /// edges were rewritten in place.
    fn relink_face(&mut self, f: FaceId) -> Result<()> {
        let (nodes, edges) = (self.faces[f].nodes, self.faces[f].edges);
        let winding = self.check_face_edges(&nodes, &edges)?;
        let normal = self.compute_normal(nodes);
        {
            let face = &mut self.faces[f];
            face.winding = winding;
            face.normal = normal;
        }
        for (local, &e) in edges.iter().enumerate() {
            self.attach(e, FaceSlot { face: f, local })?;
        }
        Ok(())
    }

    // ==================== Removal ====================

    /// Remove a face.
    ///
    /// With `remove_edges`, edges left without faces are removed too unless
    /// they belong to a feature line.
    pub fn remove_face(&mut self, f: FaceId, remove_edges: bool) -> Result<()> {
        let face = self
            .faces
            .remove(f)
            .ok_or(MeshError::StaleHandle { kind: "face" })?;
        for &e in &face.edges {
            self.detach(e, f)?;
        }

        if remove_edges {
            for &e in &face.edges {
                let orphan = self
                    .edges
                    .get(e)
                    .map_or(false, |edge| edge.face_count() == 0 && !edge.is_feature());
                if orphan {
                    self.remove_edge(e)?;
                }
            }
        }
        Ok(())
    }

    /// Remove an edge together with the faces that still use it.
    pub fn remove_edge(&mut self, e: EdgeId) -> Result<()> {
        let slots = self.try_edge(e)?.faces;
        for slot in slots.into_iter().flatten() {
            self.remove_face(slot.face, false)?;
        }

        let edge = self
            .edges
            .remove(e)
            .ok_or(MeshError::StaleHandle { kind: "edge" })?;
        for n in edge.nodes {
            if let Some(node) = self.nodes.get_mut(n) {
                node.edges.retain(|x| *x != e);
            }
        }
        Ok(())
    }

    /// Remove a node that has no incident edges.
    pub fn remove_isolated_node(&mut self, n: NodeId) -> Result<()> {
        let node = self.try_node(n)?;
        if node.valence() != 0 {
            return Err(MeshError::InvalidState(format!(
                "node {:?} still has {} incident edges",
                n,
                node.valence()
            )));
        }
        self.nodes.remove(n);
        Ok(())
    }

    // ==================== Local Operators ====================

    /// Split face `f` at node `p`, which must lie inside it.
    ///
    /// The face is replaced by three faces fanning out from `p`. Returns the
    /// new faces, which inherit the tag and group of `f`.
    pub fn split_face(&mut self, f: FaceId, p: NodeId) -> Result<[FaceId; 3]> {
        let face = self.try_face(f)?.clone();
        self.try_node(p)?;
        if face.nodes.contains(&p) {
            return Err(MeshError::DuplicateFaceNode { node: p });
        }

        let [n0, n1, n2] = face.nodes;
        let [e0, e1, e2] = face.edges;
        let s0 = self.add_edge(p, n0, 0)?;
        let s1 = self.add_edge(p, n1, 0)?;
        let s2 = self.add_edge(p, n2, 0)?;

        let specs = [
            FaceSpec::new([n0, n1, p], [e0, s1, s0]).inherit(&face),
            FaceSpec::new([n1, n2, p], [e1, s2, s1]).inherit(&face),
            FaceSpec::new([n2, n0, p], [e2, s0, s2]).inherit(&face),
        ];

        self.remove_face(f, false)?;
        let out = [
            self.add_face(specs[0])?,
            self.add_face(specs[1])?,
            self.add_face(specs[2])?,
        ];
        log::trace!("split face {:?} at {:?}", f, p);
        Ok(out)
    }

    /// Split edge `e` at node `p`, which must lie on it.
    ///
    /// The edge is replaced by two edges that inherit its tag and group id,
    /// and each adjacent face is split in two along a new edge to `p`.
    /// Returns the two halves, starting at the edge's first node.
    pub fn split_edge(&mut self, e: EdgeId, p: NodeId) -> Result<[EdgeId; 2]> {
        let edge = self.try_edge(e)?.clone();
        self.try_node(p)?;
        if edge.has_node(p) {
            return Err(MeshError::DegenerateEdge { node: p });
        }

        struct Side {
            opposite: NodeId,
            next: EdgeId,
            prev: EdgeId,
            forward: bool,
            tag: i32,
            gid: i32,
        }

        let mut sides: SmallVec<[Side; 2]> = SmallVec::new();
        for slot in edge.face_slots() {
            let face = &self.faces[slot.face];
            let opposite = face.nodes[(slot.local + 2) % 3];
            if opposite == p {
                return Err(MeshError::DuplicateFaceNode { node: p });
            }
            sides.push(Side {
                opposite,
                next: face.edges[(slot.local + 1) % 3],
                prev: face.edges[(slot.local + 2) % 3],
                forward: face.winding[slot.local] == Winding::Forward,
                tag: face.tag,
                gid: face.gid,
            });
        }

        let [a, b] = edge.nodes;
        let h0 = self.add_edge(a, p, edge.tag)?;
        let h1 = self.add_edge(p, b, edge.tag)?;
        self.edges[h0].gid = edge.gid;
        self.edges[h1].gid = edge.gid;

        let mut specs: SmallVec<[FaceSpec; 4]> = SmallVec::new();
        for side in &sides {
            let (n1, n2) = if side.forward { (a, b) } else { (b, a) };
            let (d0, d1) = if side.forward { (h0, h1) } else { (h1, h0) };
            let cut = self.add_edge(side.opposite, p, 0)?;
            specs.push(FaceSpec {
                nodes: [side.opposite, n1, p],
                edges: [side.prev, d0, cut],
                tag: side.tag,
                gid: side.gid,
            });
            specs.push(FaceSpec {
                nodes: [side.opposite, p, n2],
                edges: [cut, d1, side.next],
                tag: side.tag,
                gid: side.gid,
            });
        }

        self.remove_edge(e)?;
        for spec in specs {
            self.add_face(spec)?;
        }
        log::trace!("split edge {:?} at {:?}", e, p);
        Ok([h0, h1])
    }

    /// Flip the diagonal of the quad formed by the two faces of `e`.
    ///
    /// Returns `Ok(false)` without touching the mesh if `e` is a boundary edge
    /// or if the other diagonal already exists. The edge keeps its handle,
    /// tag, and group id; only its end nodes change.
    pub fn flip_edge(&mut self, e: EdgeId) -> Result<bool> {
        let edge = self.try_edge(e)?;
        let (Some(s0), Some(s1)) = (edge.faces[0], edge.faces[1]) else {
            return Ok(false);
        };
        let (fa, fb) = (s0.face, s1.face);

        let f0 = &self.faces[fa];
        let (n0, n1) = match f0.winding[s0.local] {
            Winding::Forward => (edge.nodes[0], edge.nodes[1]),
            Winding::Reverse => (edge.nodes[1], edge.nodes[0]),
        };
        let n2 = f0.nodes[(s0.local + 2) % 3];
        let n3 = self.faces[fb].nodes[(s1.local + 2) % 3];
        if n2 == n3 || self.find_edge(n2, n3).is_some() {
            return Ok(false);
        }

        let missing = || MeshError::InvalidState(format!("faces around edge {:?} are not triangles", e));
        let e0 = self.face_edge_between(fa, n1, n2).ok_or_else(missing)?;
        let e1 = self.face_edge_between(fa, n2, n0).ok_or_else(missing)?;
        let e2 = self.face_edge_between(fb, n0, n3).ok_or_else(missing)?;
        let e3 = self.face_edge_between(fb, n3, n1).ok_or_else(missing)?;

        for (edge, face) in [(e, fa), (e, fb), (e0, fa), (e1, fa), (e2, fb), (e3, fb)] {
            self.detach(edge, face)?;
        }

        self.edges[e].nodes = [n2, n3];
        self.nodes[n0].edges.retain(|x| *x != e);
        self.nodes[n1].edges.retain(|x| *x != e);
        self.nodes[n2].edges.push(e);
        self.nodes[n3].edges.push(e);

        {
            let face = &mut self.faces[fa];
            face.nodes = [n0, n3, n2];
            face.edges = [e2, e, e1];
        }
        {
            let face = &mut self.faces[fb];
            face.nodes = [n1, n2, n3];
            face.edges = [e0, e, e3];
        }
        self.relink_face(fa)?;
        self.relink_face(fb)?;
        log::trace!("flipped edge {:?}", e);
        Ok(true)
    }

    // ==================== Validation ====================

    /// Euler characteristic `Nodes - Edges + Faces`.
    pub fn euler_characteristic(&self) -> i64 {
        self.nodes.len() as i64 - self.edges.len() as i64 + self.faces.len() as i64
    }

    /// Whether any edge is used by no face.
    pub fn has_orphan_edges(&self) -> bool {
        self.edges.values().any(|e| e.face_count() == 0)
    }

    /// Check that all adjacency information is mutually consistent.
    ///
    /// Returns an [`MeshError::InvalidState`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(MeshError::InvalidState(msg));

        for (nid, node) in &self.nodes {
            for &e in &node.edges {
                match self.edges.get(e) {
                    Some(edge) if edge.has_node(nid) => {}
                    _ => return bad(format!("node {:?} lists unrelated edge {:?}", nid, e)),
                }
            }
        }

        let mut pairs = HashSet::with_capacity(self.edges.len());
        for (eid, edge) in &self.edges {
            let [a, b] = edge.nodes;
            if a == b {
                return bad(format!("edge {:?} connects {:?} to itself", eid, a));
            }
            for n in edge.nodes {
                match self.nodes.get(n) {
                    Some(node) if node.edges.contains(&eid) => {}
                    _ => return bad(format!("edge {:?} is not listed by node {:?}", eid, n)),
                }
            }
            if !pairs.insert(if a < b { (a, b) } else { (b, a) }) {
                return bad(format!("edge {:?} duplicates another edge", eid));
            }
            if let (Some(s0), Some(s1)) = (edge.faces[0], edge.faces[1]) {
                if s0.face == s1.face {
                    return bad(format!("edge {:?} lists face {:?} twice", eid, s0.face));
                }
            }
            for slot in edge.face_slots() {
                match self.faces.get(slot.face) {
                    Some(face) if face.edges[slot.local] == eid => {}
                    _ => return bad(format!("edge {:?} lists unrelated face {:?}", eid, slot.face)),
                }
            }
        }

        for (fid, face) in &self.faces {
            let [n0, n1, n2] = face.nodes;
            if n0 == n1 || n1 == n2 || n0 == n2 {
                return bad(format!("face {:?} repeats a node", fid));
            }
            for i in 0..3 {
                let Some(edge) = self.edges.get(face.edges[i]) else {
                    return bad(format!("face {:?} uses removed edge", fid));
                };
                let (a, b) = (face.nodes[i], face.nodes[(i + 1) % 3]);
                let expected = match face.winding[i] {
                    Winding::Forward => [a, b],
                    Winding::Reverse => [b, a],
                };
                if edge.nodes != expected {
                    return bad(format!("face {:?} edge {} does not match its nodes", fid, i));
                }
                let listed = edge
                    .face_slots()
                    .any(|s| s.face == fid && s.local == i);
                if !listed {
                    return bad(format!("edge {:?} does not list face {:?}", face.edges[i], fid));
                }
            }
        }
        Ok(())
    }
}
