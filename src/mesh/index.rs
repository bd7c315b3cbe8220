//! Handle types for mesh elements.
//!
//! Nodes, edges, and faces live in separate arenas and are addressed by
//! type-safe, generation-checked handles. Removing an element frees its slot
//! and bumps the slot's generation, so a handle kept past the removal no longer
//! resolves instead of silently aliasing whatever reuses the slot.

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a node in a [`TriMesh`](super::TriMesh).
    pub struct NodeId;
}

new_key_type! {
    /// Handle of an edge in a [`TriMesh`](super::TriMesh).
    pub struct EdgeId;
}

new_key_type! {
    /// Handle of a face in a [`TriMesh`](super::TriMesh).
    pub struct FaceId;
}

/// Group id of an edge or node that belongs to no feature line.
pub const NO_GROUP: i32 = -1;

/// Orientation of an edge relative to the face that uses it.
///
/// A face walks its nodes `n[i] -> n[(i + 1) % 3]` along edge `i`. The edge is
/// `Forward` when its stored node order matches that walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    /// Edge node order matches the face's cyclic order.
    Forward,
    /// Edge node order is reversed relative to the face.
    Reverse,
}

impl Winding {
    /// The sign convention used by the classic list-based meshes (+1 / -1).
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Winding::Forward => 1,
            Winding::Reverse => -1,
        }
    }
}

/// A face occupying one of an edge's two face slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceSlot {
    /// The adjacent face.
    pub face: FaceId,
    /// Local index (0, 1 or 2) of the edge inside that face.
    pub local: usize,
}
