//! Primitive topology mutators
//!
//! Collapse, split, flip and relocate are the only operations that change a
//! [`ConnectivityStore`]. Each one looks up and validates every id it needs
//! before its first write, so a call either applies completely or returns
//! without touching the store.

use crate::store::{ConnectivityStore, EdgeId, Triangle, TriangleId, Vertex, VertexId};
use remeshcrate_core::{centroid, midpoint, Error, Result};
use std::collections::BTreeSet;
use tracing::trace;

/// Target valence of a diagonal's endpoints when scoring a flip.
const ENDPOINT_VALENCE: i64 = 6;
/// Target valence of the opposite vertices when scoring a flip.
const OPPOSITE_VALENCE: i64 = 4;

/// What a collapse changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollapseOutcome {
    pub removed_triangles: Vec<TriangleId>,
    pub removed_edges: Vec<EdgeId>,
    pub inserted_edges: Vec<EdgeId>,
}

/// Result of an attempted split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    Split {
        vertex: VertexId,
        triangles: [TriangleId; 2],
        edges: [EdgeId; 3],
    },
    /// Boundary or non-manifold edge; the edge was dropped from the candidate set.
    Rejected,
}

/// The two triangles flanking an edge and their opposite vertices.
#[derive(Debug, Clone, Copy)]
struct Diamond {
    triangles: [TriangleId; 2],
    opposite: [VertexId; 2],
}

impl ConnectivityStore {
    /// Triangles incident to both endpoints, paired with their third vertex.
    fn flanking(&self, e1: VertexId, e2: VertexId) -> Result<Vec<(TriangleId, Option<VertexId>)>> {
        let v1 = self.vertex_checked(e1)?;
        self.vertex_checked(e2)?;
        Ok(v1
            .incident_triangles
            .iter()
            .filter_map(|&t| self.triangle(t))
            .filter(|tri| tri.contains(e2))
            .map(|tri| (tri.id(), tri.opposite(e1, e2)))
            .collect())
    }

    /// Exactly two flanking triangles with two distinct opposite vertices.
    fn diamond(&self, e1: VertexId, e2: VertexId) -> Result<Option<Diamond>> {
        let flanking = self.flanking(e1, e2)?;
        let [(t0, Some(o0)), (t1, Some(o1))] = flanking[..] else {
            return Ok(None);
        };
        if o0 == o1 {
            return Ok(None);
        }
        Ok(Some(Diamond {
            triangles: [t0, t1],
            opposite: [o0, o1],
        }))
    }

    fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex> {
        self.vertices.get_mut(id).ok_or(Error::UnknownVertex(id))
    }

    /// Merge `drop` into `keep`.
    ///
    /// `keep` moves to the midpoint and takes the sum of both quadrics and
    /// the union of both neighborhoods. Triangles holding both vertices are
    /// deleted; the rest of `drop`'s triangles are relabelled to `keep`. All
    /// candidate edges touching either vertex are replaced by one fresh edge
    /// (cost 0) per neighbor of `keep`, appended in ascending neighbor order.
    pub fn collapse(&mut self, keep: VertexId, drop: VertexId) -> Result<CollapseOutcome> {
        if keep == drop {
            return Err(Error::InvalidCollapse(keep));
        }
        let kv = self.vertex_checked(keep)?;
        let dv = self.vertex_checked(drop)?;

        let position = midpoint(&kv.position, &dv.position);
        let quadric = kv.quadric + dv.quadric;

        let old_keep_neighbors = kv.neighbors.clone();
        let old_drop_neighbors = dv.neighbors.clone();
        let mut neighbors: BTreeSet<VertexId> =
            old_keep_neighbors.union(&old_drop_neighbors).copied().collect();
        neighbors.remove(&keep);
        neighbors.remove(&drop);

        let degenerate: Vec<TriangleId> = kv
            .incident_triangles
            .iter()
            .copied()
            .filter(|&t| self.triangle(t).is_some_and(|tri| tri.contains(drop)))
            .collect();
        let moved: Vec<TriangleId> = dv
            .incident_triangles
            .iter()
            .copied()
            .filter(|t| !degenerate.contains(t))
            .collect();

        let stale_edges: BTreeSet<EdgeId> = old_keep_neighbors
            .iter()
            .map(|&n| (keep, n))
            .chain(old_drop_neighbors.iter().map(|&n| (drop, n)))
            .filter_map(|(a, b)| self.edge_between(a, b).map(|e| e.id()))
            .collect();

        // Neighborhoods
        for &n in &neighbors {
            let nv = self.vertex_mut(n)?;
            nv.neighbors.remove(&drop);
            nv.neighbors.insert(keep);
        }
        {
            let kv = self.vertex_mut(keep)?;
            kv.position = position;
            kv.quadric = quadric;
            kv.neighbors = neighbors.clone();
        }

        // Degenerate triangles
        for &t in &degenerate {
            if let Some(tri) = self.triangles.remove(t) {
                for v in tri.vertices() {
                    if let Some(vertex) = self.vertices.get_mut(v) {
                        vertex.incident_triangles.remove(&t);
                    }
                }
            }
        }

        // Relabel the surviving triangles of `drop`
        for &t in &moved {
            if let Some(tri) = self.triangles.get_mut(t) {
                tri.substitute(drop, keep);
            }
        }
        self.vertex_mut(keep)?.incident_triangles.extend(moved.iter().copied());

        // Candidate edges
        for &e in &stale_edges {
            self.remove_edge(e);
        }
        let inserted: Vec<EdgeId> = neighbors.iter().map(|&n| self.insert_edge(keep, n)).collect();

        self.vertices.remove(drop);

        trace!(
            keep,
            drop,
            removed_triangles = degenerate.len(),
            valence = neighbors.len(),
            "collapsed edge"
        );

        Ok(CollapseOutcome {
            removed_triangles: degenerate,
            removed_edges: stale_edges.into_iter().collect(),
            inserted_edges: inserted,
        })
    }

    /// Split a candidate edge `(e1, e2)` at its midpoint.
    ///
    /// Requires exactly two flanking triangles with distinct opposite
    /// vertices `o1, o2`. The flanking triangles become `(e1, o_i, new)`, two
    /// triangles `(e2, o_i, new)` are appended, edges `new-o1`, `new-o2` and
    /// `new-e2` are appended, and the split edge itself is rewritten in place
    /// as `e1-new` keeping its old cost. Otherwise the edge is removed from
    /// the candidate set and nothing else changes.
    pub fn split(&mut self, edge: EdgeId) -> Result<SplitOutcome> {
        let (e1, e2) = self.edge_checked(edge)?.vertices();

        let Some(diamond) = self.diamond(e1, e2)? else {
            self.remove_edge(edge);
            trace!(edge, e1, e2, "split rejected, edge dropped");
            return Ok(SplitOutcome::Rejected);
        };
        let [t0, t1] = diamond.triangles;
        let [o0, o1] = diamond.opposite;

        let position = midpoint(&self.vertex_checked(e1)?.position, &self.vertex_checked(e2)?.position);
        let new = self.vertices.insert_with(|id| Vertex::new(id, position));

        // Rewire the flanking triangles to (e1, o_i, new)
        for (t, o) in [(t0, o0), (t1, o1)] {
            if let Some(tri) = self.triangles.get_mut(t) {
                tri.set_vertices([e1, o, new]);
            }
            self.vertex_mut(e2)?.incident_triangles.remove(&t);
        }

        // New triangles (e2, o_i, new)
        let n0 = self.triangles.insert_with(|id| Triangle::new(id, [e2, o0, new]));
        let n1 = self.triangles.insert_with(|id| Triangle::new(id, [e2, o1, new]));
        for (t, o) in [(n0, o0), (n1, o1)] {
            self.vertex_mut(e2)?.incident_triangles.insert(t);
            self.vertex_mut(o)?.incident_triangles.insert(t);
        }
        {
            let nv = self.vertex_mut(new)?;
            nv.incident_triangles.extend([t0, t1, n0, n1]);
            nv.neighbors.extend([e1, e2, o0, o1]);
        }

        // Neighborhoods
        {
            let v = self.vertex_mut(e1)?;
            v.neighbors.remove(&e2);
            v.neighbors.insert(new);
        }
        {
            let v = self.vertex_mut(e2)?;
            v.neighbors.remove(&e1);
            v.neighbors.insert(new);
        }
        self.vertex_mut(o0)?.neighbors.insert(new);
        self.vertex_mut(o1)?.neighbors.insert(new);

        // Candidate edges
        let edges = [
            self.insert_edge(new, o0),
            self.insert_edge(new, o1),
            self.insert_edge(new, e2),
        ];
        self.rekey_edge(edge, e1, new);

        trace!(edge, e1, e2, new, "split edge");

        Ok(SplitOutcome::Split {
            vertex: new,
            triangles: [n0, n1],
            edges,
        })
    }

    /// Swap the diagonal of the two triangles flanking `edge` when that
    /// lowers the valence deviation of the four vertices involved.
    ///
    /// Deviation of the current diagonal `e1-e2` is
    /// `|deg(e1)-6| + |deg(e2)-6| + |deg(o1)-4| + |deg(o2)-4|`, of the swapped
    /// diagonal `o1-o2` it is `|deg(o1)-6| + |deg(o2)-6| + |deg(e1)-4| + |deg(e2)-4|`,
    /// with the current degrees in both. The flip is applied only when the
    /// swapped deviation is strictly smaller, and never when `o1` and `o2` are
    /// already adjacent. Returns whether the mesh changed.
    pub fn flip(&mut self, edge: EdgeId) -> Result<bool> {
        let (e1, e2) = self.edge_checked(edge)?.vertices();
        let Some(diamond) = self.diamond(e1, e2)? else {
            return Ok(false);
        };
        let [t0, t1] = diamond.triangles;
        let [o0, o1] = diamond.opposite;

        if self.vertex_checked(o0)?.neighbors.contains(&o1) {
            return Ok(false);
        }

        let deg = |v: VertexId| -> Result<i64> { Ok(self.vertex_checked(v)?.valence() as i64) };
        let (d1, d2, d3, d4) = (deg(e1)?, deg(e2)?, deg(o0)?, deg(o1)?);
        let current = (d1 - ENDPOINT_VALENCE).abs()
            + (d2 - ENDPOINT_VALENCE).abs()
            + (d3 - OPPOSITE_VALENCE).abs()
            + (d4 - OPPOSITE_VALENCE).abs();
        let swapped = (d3 - ENDPOINT_VALENCE).abs()
            + (d4 - ENDPOINT_VALENCE).abs()
            + (d2 - OPPOSITE_VALENCE).abs()
            + (d1 - OPPOSITE_VALENCE).abs();
        if swapped >= current {
            return Ok(false);
        }

        // t0 = (e1, e2, o0) -> (o0, o1, e1); t1 = (e1, e2, o1) -> (o0, o1, e2)
        if let Some(tri) = self.triangles.get_mut(t0) {
            tri.set_vertices([o0, o1, e1]);
        }
        if let Some(tri) = self.triangles.get_mut(t1) {
            tri.set_vertices([o0, o1, e2]);
        }
        self.vertex_mut(e1)?.incident_triangles.remove(&t1);
        self.vertex_mut(e2)?.incident_triangles.remove(&t0);
        self.vertex_mut(o1)?.incident_triangles.insert(t0);
        self.vertex_mut(o0)?.incident_triangles.insert(t1);

        self.vertex_mut(e1)?.neighbors.remove(&e2);
        self.vertex_mut(e2)?.neighbors.remove(&e1);
        self.vertex_mut(o0)?.neighbors.insert(o1);
        self.vertex_mut(o1)?.neighbors.insert(o0);

        self.rekey_edge(edge, o0, o1);

        trace!(edge, e1, e2, o0, o1, current, swapped, "flipped edge");
        Ok(true)
    }

    /// Move a vertex to the unweighted mean of its neighbors' positions.
    ///
    /// A vertex without neighbors stays where it is.
    pub fn relocate(&mut self, v: VertexId) -> Result<()> {
        let vertex = self.vertex_checked(v)?;
        let positions = vertex
            .neighbors
            .iter()
            .map(|&n| self.position(n))
            .collect::<Result<Vec<_>>>()?;
        if let Some(target) = centroid(positions.iter()) {
            self.vertex_mut(v)?.position = target;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{
        make_octahedron, make_single_triangle, make_tetrahedron, make_unit_quad,
    };
    use approx::assert_relative_eq;
    use remeshcrate_core::Point3f;

    fn store(mesh: remeshcrate_core::TriangleMesh) -> ConnectivityStore {
        ConnectivityStore::from_mesh(&mesh).unwrap()
    }

    fn assert_manifold_neighbors(s: &ConnectivityStore) {
        for v in s.vertices() {
            assert!(
                s.neighbors_match_triangles(v.id()),
                "vertex {} neighbors {:?} differ from triangle adjacency {:?}",
                v.id(),
                v.neighbors(),
                s.triangle_neighbors(v.id())
            );
        }
    }

    // ---- Collapse ----

    #[test]
    fn test_collapse_moves_to_midpoint() {
        let mut s = store(make_octahedron());
        let a = s.position(0).unwrap();
        let b = s.position(2).unwrap();
        s.collapse(0, 2).unwrap();
        let p = s.position(0).unwrap();
        assert_relative_eq!(p, Point3f::from((a.coords + b.coords) / 2.0));
        assert!(s.vertex(2).is_none());
    }

    #[test]
    fn test_collapse_octahedron_keeps_invariants() {
        let mut s = store(make_octahedron());
        let outcome = s.collapse(0, 2).unwrap();
        assert_eq!(outcome.removed_triangles.len(), 2);
        assert_eq!(s.vertex_count(), 5);
        assert_eq!(s.triangle_count(), 6);
        // 12 edges - 1 collapsed - 2 merged duplicates
        assert_eq!(s.edge_count(), 9);
        assert_eq!(s.vertex(0).unwrap().neighbors().iter().copied().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
        s.check_invariants().unwrap();
        assert_manifold_neighbors(&s);
        for t in s.triangles() {
            assert!(!t.contains(2));
        }
    }

    #[test]
    fn test_collapse_sums_quadrics() {
        let mut s = store(make_tetrahedron());
        s.initialize_quadrics().unwrap();
        let expected = s.vertex(0).unwrap().quadric() + s.vertex(1).unwrap().quadric();
        s.collapse(0, 1).unwrap();
        assert_eq!(*s.vertex(0).unwrap().quadric(), expected);
    }

    #[test]
    fn test_collapse_appends_fresh_edges() {
        let mut s = store(make_octahedron());
        let before = s.edge_ids().into_iter().max().unwrap();
        let outcome = s.collapse(0, 2).unwrap();
        assert_eq!(outcome.inserted_edges.len(), 4);
        for e in &outcome.inserted_edges {
            assert!(*e > before);
            assert_eq!(s.edge(*e).unwrap().cost(), 0.0);
            assert!(s.edge(*e).unwrap().contains(0));
        }
        for e in &outcome.removed_edges {
            assert!(s.edge(*e).is_none());
        }
    }

    #[test]
    fn test_collapse_tetrahedron_to_point() {
        let mut s = store(make_tetrahedron());
        s.collapse(0, 1).unwrap();
        assert_eq!(s.vertex_count(), 3);
        assert_eq!(s.triangle_count(), 2);
        s.check_invariants().unwrap();
        s.collapse(0, 2).unwrap();
        assert_eq!(s.vertex_count(), 2);
        assert_eq!(s.triangle_count(), 0);
        assert_eq!(s.edge_count(), 1);
        s.check_invariants().unwrap();
        s.collapse(0, 3).unwrap();
        assert_eq!(s.vertex_count(), 1);
        assert_eq!(s.edge_count(), 0);
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_collapse_rejects_self() {
        let mut s = store(make_tetrahedron());
        assert_eq!(s.collapse(1, 1), Err(Error::InvalidCollapse(1)));
        assert_eq!(s.vertex_count(), 4);
    }

    #[test]
    fn test_collapse_rejects_unknown_vertex() {
        let mut s = store(make_tetrahedron());
        assert_eq!(s.collapse(0, 9), Err(Error::UnknownVertex(9)));
        assert_eq!(s.edge_count(), 6);
        s.check_invariants().unwrap();
    }

    // ---- Split ----

    #[test]
    fn test_split_interior_edge() {
        let mut s = store(make_unit_quad());
        let diagonal = s.edge_between(0, 2).unwrap().id();
        let outcome = s.split(diagonal).unwrap();
        let SplitOutcome::Split { vertex, triangles, edges } = outcome else {
            panic!("expected split, got {:?}", outcome);
        };
        assert_eq!(vertex, 4);
        assert_eq!(s.vertex_count(), 5);
        assert_eq!(s.triangle_count(), 4);
        assert_eq!(s.edge_count(), 8);
        assert_relative_eq!(s.position(vertex).unwrap(), Point3f::new(0.5, 0.5, 0.0));

        // Rewritten in place
        assert_eq!(s.edge(diagonal).unwrap().vertices(), (0, 4));
        assert!(s.edge_between(0, 2).is_none());
        for e in edges {
            assert!(s.edge(e).unwrap().contains(vertex));
        }
        for t in triangles {
            assert!(s.triangle(t).unwrap().contains(2));
        }
        assert_eq!(s.vertex(vertex).unwrap().valence(), 4);
        s.check_invariants().unwrap();
        assert_manifold_neighbors(&s);
    }

    #[test]
    fn test_split_keeps_stale_cost() {
        let mut s = store(make_octahedron());
        let e = s.edge_between(0, 2).unwrap().id();
        s.set_edge_cost(e, 7.5);
        s.split(e).unwrap();
        assert_eq!(s.edge(e).unwrap().cost(), 7.5);
    }

    #[test]
    fn test_split_closed_mesh() {
        let mut s = store(make_octahedron());
        let e = s.edge_between(0, 4).unwrap().id();
        assert!(matches!(s.split(e).unwrap(), SplitOutcome::Split { .. }));
        assert_eq!(s.vertex_count(), 7);
        assert_eq!(s.triangle_count(), 10);
        s.check_invariants().unwrap();
        assert_manifold_neighbors(&s);
    }

    #[test]
    fn test_split_boundary_edge_is_rejected() {
        let mut s = store(make_unit_quad());
        let side = s.edge_between(0, 1).unwrap().id();
        assert_eq!(s.split(side).unwrap(), SplitOutcome::Rejected);
        assert_eq!(s.vertex_count(), 4);
        assert_eq!(s.triangle_count(), 2);
        assert!(s.edge(side).is_none());
        // Adjacency itself is untouched
        assert!(s.vertex(0).unwrap().neighbors().contains(&1));
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_split_single_triangle_rejected() {
        let mut s = store(make_single_triangle());
        assert_eq!(s.split(0).unwrap(), SplitOutcome::Rejected);
        assert_eq!(s.edge_count(), 2);
    }

    #[test]
    fn test_split_unknown_edge() {
        let mut s = store(make_unit_quad());
        assert_eq!(s.split(42), Err(Error::UnknownEdge(42)));
    }

    // ---- Flip ----

    #[test]
    fn test_flip_keeps_balanced_diagonal() {
        // Quad diagonal 0-2: valences 3, 3 with opposite 1, 3 at 2, 2
        // current = 3+3+2+2 = 10, swapped = 4+4+1+1 = 10 -> not strictly better
        let mut s = store(make_unit_quad());
        let diagonal = s.edge_between(0, 2).unwrap().id();
        assert!(!s.flip(diagonal).unwrap());
        assert_eq!(s.edge(diagonal).unwrap().vertices(), (0, 2));

        // Octahedron: all valence 4, current = 4 = swapped
        let mut s = store(make_octahedron());
        let e = s.edge_between(0, 2).unwrap().id();
        assert!(!s.flip(e).unwrap());
        s.check_invariants().unwrap();
    }

    /// Diamond 0-1 with opposite vertices 2 and 3, each carrying an extra fan
    /// so that deg(0) = deg(1) = 3 and deg(2) = deg(3) = 5.
    fn make_lopsided_diamond() -> remeshcrate_core::TriangleMesh {
        remeshcrate_core::TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
                Point3f::new(0.5, -1.0, 0.0),
                Point3f::new(0.0, 2.0, 0.0),
                Point3f::new(0.5, 2.2, 0.0),
                Point3f::new(1.0, 2.0, 0.0),
                Point3f::new(0.0, -2.0, 0.0),
                Point3f::new(0.5, -2.2, 0.0),
                Point3f::new(1.0, -2.0, 0.0),
            ],
            vec![
                [0, 1, 2],
                [0, 3, 1],
                [2, 4, 5],
                [2, 5, 6],
                [3, 8, 7],
                [3, 9, 8],
            ],
        )
    }

    #[test]
    fn test_flip_applies() {
        let mut s = store(make_lopsided_diamond());
        let e = s.edge_between(0, 1).unwrap().id();
        // current = 3+3+1+1 = 8, swapped = 1+1+1+1 = 4
        assert!(s.flip(e).unwrap());

        assert_eq!(s.edge(e).unwrap().vertices(), (2, 3));
        assert!(s.edge_between(0, 1).is_none());
        assert_eq!(s.triangle(0).unwrap().vertices(), [0, 2, 3]);
        assert_eq!(s.triangle(1).unwrap().vertices(), [1, 2, 3]);
        assert_eq!(s.vertex(0).unwrap().valence(), 2);
        assert_eq!(s.vertex(1).unwrap().valence(), 2);
        assert_eq!(s.vertex(2).unwrap().valence(), 6);
        assert_eq!(s.vertex(3).unwrap().valence(), 6);
        assert_eq!(s.vertex_count(), 10);
        assert_eq!(s.triangle_count(), 6);
        s.check_invariants().unwrap();
        assert_manifold_neighbors(&s);

        // Flipping back would raise the deviation again
        assert!(!s.flip(e).unwrap());
    }

    #[test]
    fn test_flip_refuses_existing_diagonal() {
        // In a tetrahedron the opposite vertices of every edge are adjacent
        let mut s = store(make_tetrahedron());
        for e in s.edge_ids() {
            assert!(!s.flip(e).unwrap());
        }
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_flip_boundary_is_noop() {
        let mut s = store(make_unit_quad());
        let side = s.edge_between(0, 1).unwrap().id();
        assert!(!s.flip(side).unwrap());
        // Unlike split, flip keeps the edge
        assert!(s.edge(side).is_some());
    }

    // ---- Relocate ----

    #[test]
    fn test_relocate_to_neighbor_mean() {
        let mut s = store(make_unit_quad());
        s.relocate(0).unwrap();
        let p = s.position(0).unwrap();
        assert_relative_eq!(p, Point3f::new(2.0 / 3.0, 2.0 / 3.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_relocate_isolated_vertex() {
        let mut s = store(make_tetrahedron());
        s.collapse(0, 1).unwrap();
        s.collapse(0, 2).unwrap();
        s.collapse(0, 3).unwrap();
        let before = s.position(0).unwrap();
        s.relocate(0).unwrap();
        assert_eq!(s.position(0).unwrap(), before);
    }
}
