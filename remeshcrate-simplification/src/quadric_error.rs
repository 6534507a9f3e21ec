//! Quadric error metric
//!
//! Every vertex accumulates the outer products of the planes of its incident
//! triangles. The cost of an edge is scored at the midpoint of its endpoints
//! against the summed quadric of both endpoints as `‖v̄ᵀQ‖²`, the squared norm
//! of the homogeneous midpoint transformed by `Q`. This is not the textbook
//! `v̄ᵀQv̄` form, and the midpoint is not the quadric minimizer; both are the
//! observable behavior of this engine and are kept as they are.

use crate::store::{ConnectivityStore, EdgeId, VertexId};
use nalgebra::{Matrix4, RowVector4};
use remeshcrate_core::{midpoint, Point3f, Result, Vector4};

/// Plane through `p0, p1, p2` anchored at `anchor`, as `(n.x, n.y, n.z, d)`.
///
/// The normal is the unnormalized cross product of two edge vectors, and
/// `d = -dot(anchor, n)`; the anchor must lie on the plane.
pub fn compute_plane(p0: &Point3f, p1: &Point3f, p2: &Point3f, anchor: &Point3f) -> Vector4<f64> {
    let n = (p1 - p0).cross(&(p2 - p0));
    let d = -anchor.coords.dot(&n);
    Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64)
}

/// Outer product `p pᵀ` of a plane vector.
pub fn plane_to_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
    p * p.transpose()
}

/// Cost of merging two vertices scored at their midpoint.
pub fn collapse_cost(pa: &Point3f, qa: &Matrix4<f64>, pb: &Point3f, qb: &Matrix4<f64>) -> f32 {
    let m = midpoint(pa, pb);
    let q = qa + qb;
    let v = RowVector4::new(m.x as f64, m.y as f64, m.z as f64, 1.0);
    let r = v * q;
    r.dot(&r) as f32
}

impl ConnectivityStore {
    /// Sum of plane quadrics over the triangles incident to `v`.
    pub fn compute_quadric(&self, v: VertexId) -> Result<Matrix4<f64>> {
        let vertex = self.vertex_checked(v)?;
        let mut quadric = Matrix4::zeros();
        for &t in &vertex.incident_triangles {
            let Some(tri) = self.triangle(t) else {
                continue;
            };
            let [a, b, c] = tri.vertices();
            let plane = compute_plane(
                &self.position(a)?,
                &self.position(b)?,
                &self.position(c)?,
                &vertex.position,
            );
            quadric += plane_to_quadric(&plane);
        }
        Ok(quadric)
    }

    /// Recompute every vertex quadric from its incident triangles.
    pub fn initialize_quadrics(&mut self) -> Result<()> {
        let mut computed = Vec::with_capacity(self.vertex_count());
        for v in self.vertex_ids() {
            computed.push((v, self.compute_quadric(v)?));
        }
        for (v, q) in computed {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.quadric = q;
            }
        }
        Ok(())
    }

    /// Cost of a candidate edge under the current positions and quadrics.
    pub fn compute_edge_cost(&self, e: EdgeId) -> Result<f32> {
        let (a, b) = self.edge_checked(e)?.vertices();
        let va = self.vertex_checked(a)?;
        let vb = self.vertex_checked(b)?;
        Ok(collapse_cost(&va.position, &va.quadric, &vb.position, &vb.quadric))
    }

    /// Score every candidate edge.
    pub fn score_all_edges(&mut self) -> Result<()> {
        for e in self.edge_ids() {
            let cost = self.compute_edge_cost(e)?;
            self.set_edge_cost(e, cost);
        }
        Ok(())
    }

    /// Re-score the candidate edges incident to `v`; returns their ids.
    pub fn rescore_edges_around(&mut self, v: VertexId) -> Result<Vec<EdgeId>> {
        let neighbors: Vec<VertexId> = self.vertex_checked(v)?.neighbors.iter().copied().collect();
        let mut touched = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            let Some(e) = self.edge_between(v, n).map(|e| e.id()) else {
                continue;
            };
            let cost = self.compute_edge_cost(e)?;
            self.set_edge_cost(e, cost);
            touched.push(e);
        }
        Ok(touched)
    }
}
