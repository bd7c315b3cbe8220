//! Surface partitioning along feature edges.
//!
//! Once curves have been inserted as tagged edges, the faces between them are
//! regrouped: faces reachable from each other without crossing a feature edge
//! form one partition.

use std::collections::HashMap;

use slotmap::SecondaryMap;

use crate::mesh::{FaceId, TriMesh, NO_GROUP};

/// Assign face group ids by flood fill, stopping at feature edges.
///
/// Partitions are numbered from 0 in arena order of their first face. Returns
/// the number of partitions.
pub fn partition_surface(mesh: &mut TriMesh) -> usize {
    let mut group: SecondaryMap<FaceId, i32> = SecondaryMap::with_capacity(mesh.num_faces());
    let seeds: Vec<FaceId> = mesh.face_ids().collect();
    let mut count = 0i32;

    for seed in seeds {
        if group.contains_key(seed) {
            continue;
        }
        group.insert(seed, count);
        let mut stack = vec![seed];
        while let Some(f) = stack.pop() {
            let edges = mesh.face(f).edges();
            for (i, &e) in edges.iter().enumerate() {
                if mesh.edge(e).is_feature() {
                    continue;
                }
                if let Some(g) = mesh.face_neighbor(f, i) {
                    if !group.contains_key(g) {
                        group.insert(g, count);
                        stack.push(g);
                    }
                }
            }
        }
        count += 1;
    }

    for (f, gid) in group {
        mesh.face_mut(f).gid = gid;
    }
    log::debug!("partitioned {} faces into {} groups", mesh.num_faces(), count);
    count as usize
}

/// Compact edge group ids to `0..k` in arena order of first appearance.
///
/// Edges without a group are left alone. Returns `k`.
pub fn renumber_edge_groups(mesh: &mut TriMesh) -> usize {
    let mut remap: HashMap<i32, i32> = HashMap::new();
    let ids: Vec<_> = mesh.edge_ids().collect();
    for e in ids {
        let gid = mesh.edge(e).gid;
        if gid == NO_GROUP {
            continue;
        }
        let next = remap.len() as i32;
        let new_gid = *remap.entry(gid).or_insert(next);
        mesh.edge_mut(e).gid = new_gid;
    }
    remap.len()
}
