//! Single-pass isotropic remeshing.
//!
//! Edges are pushed toward the mean edge length `L` of the current candidate
//! set: edges shorter than `collapse_ratio * L` are collapsed, edges longer
//! than `split_ratio * L` are split, and every vertex is then moved to the
//! average of its neighbors.

use crate::store::ConnectivityStore;
use crate::operators::SplitOutcome;
use crate::MeshRemesher;
use remeshcrate_core::{Error, Result, TriangleMesh};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters for isotropic remeshing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemeshParams {
    /// Edges shorter than `target * collapse_ratio` are collapsed.
    /// Default: 0.8
    pub collapse_ratio: f32,

    /// Edges longer than `target * split_ratio` are split.
    /// Default: 4/3
    pub split_ratio: f32,

    /// Run a valence-driven flip pass between splitting and relocation.
    /// Default: false
    pub flip_pass: bool,

    /// Run the relocation pass.
    /// Default: true
    pub relocate: bool,
}

impl Default for RemeshParams {
    fn default() -> Self {
        Self {
            collapse_ratio: 0.8,
            split_ratio: 4.0 / 3.0,
            flip_pass: false,
            relocate: true,
        }
    }
}

impl RemeshParams {
    /// Create params with custom length bounds.
    pub fn with_ratios(collapse_ratio: f32, split_ratio: f32) -> Self {
        Self {
            collapse_ratio,
            split_ratio,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = self.collapse_ratio > 0.0 && self.collapse_ratio < self.split_ratio;
        if !ordered || !self.split_ratio.is_finite() {
            return Err(Error::InvalidData(format!(
                "Remesh ratios must satisfy 0 < collapse_ratio < split_ratio, got {} and {}",
                self.collapse_ratio, self.split_ratio
            )));
        }
        Ok(())
    }
}

/// What a remeshing pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemeshStats {
    /// Mean candidate edge length the pass aimed for.
    pub target_length: f32,
    pub min_length: f32,
    pub max_length: f32,
    pub collapses: usize,
    pub splits: usize,
    /// Boundary or non-manifold edges dropped instead of split.
    pub rejected_splits: usize,
    pub flips: usize,
    pub relocations: usize,
}

/// Isotropic remesher running one collapse / split / relocate pass.
#[derive(Debug, Clone, Default)]
pub struct IsotropicRemesher {
    pub params: RemeshParams,
}

impl IsotropicRemesher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: RemeshParams) -> Self {
        Self { params }
    }

    /// Remesh the store in place.
    ///
    /// A store without candidate edges is left untouched.
    pub fn run(&self, store: &mut ConnectivityStore) -> Result<RemeshStats> {
        self.params.validate()?;

        let Some(target_length) = store.mean_edge_length() else {
            debug!("no candidate edges, skipping remesh");
            return Ok(RemeshStats::default());
        };
        let mut stats = RemeshStats {
            target_length,
            min_length: target_length * self.params.collapse_ratio,
            max_length: target_length * self.params.split_ratio,
            ..RemeshStats::default()
        };
        debug!(
            target = stats.target_length,
            min = stats.min_length,
            max = stats.max_length,
            edges = store.edge_count(),
            "remesh length bounds"
        );

        self.collapse_short_edges(store, &mut stats)?;
        self.split_long_edges(store, &mut stats)?;
        if self.params.flip_pass {
            self.flip_edges(store, &mut stats)?;
        }
        if self.params.relocate {
            self.relocate_vertices(store, &mut stats)?;
        }

        info!(
            target = stats.target_length,
            collapses = stats.collapses,
            splits = stats.splits,
            rejected = stats.rejected_splits,
            flips = stats.flips,
            vertices = store.vertex_count(),
            triangles = store.triangle_count(),
            "remesh finished"
        );
        Ok(stats)
    }

    /// Ascending walk that also visits edges created by earlier collapses.
    fn collapse_short_edges(&self, store: &mut ConnectivityStore, stats: &mut RemeshStats) -> Result<()> {
        let mut cursor = 0;
        while let Some(edge) = store.next_edge_from(cursor) {
            cursor = edge + 1;
            if store.edge_length(edge)? < stats.min_length {
                let (keep, drop) = store.edge_checked(edge)?.vertices();
                store.collapse(keep, drop)?;
                stats.collapses += 1;
            }
        }
        debug!(collapses = stats.collapses, "collapse pass done");
        Ok(())
    }

    fn split_long_edges(&self, store: &mut ConnectivityStore, stats: &mut RemeshStats) -> Result<()> {
        for edge in store.edge_ids().into_iter().rev() {
            if store.edge(edge).is_none() || store.edge_length(edge)? <= stats.max_length {
                continue;
            }
            match store.split(edge)? {
                SplitOutcome::Split { .. } => stats.splits += 1,
                SplitOutcome::Rejected => stats.rejected_splits += 1,
            }
        }
        debug!(
            splits = stats.splits,
            rejected = stats.rejected_splits,
            "split pass done"
        );
        Ok(())
    }

    fn flip_edges(&self, store: &mut ConnectivityStore, stats: &mut RemeshStats) -> Result<()> {
        for edge in store.edge_ids().into_iter().rev() {
            if store.edge(edge).is_some() && store.flip(edge)? {
                stats.flips += 1;
            }
        }
        debug!(flips = stats.flips, "flip pass done");
        Ok(())
    }

    fn relocate_vertices(&self, store: &mut ConnectivityStore, stats: &mut RemeshStats) -> Result<()> {
        for v in store.vertex_ids() {
            store.relocate(v)?;
            stats.relocations += 1;
        }
        Ok(())
    }
}

impl MeshRemesher for IsotropicRemesher {
    fn remesh(&self, mesh: &TriangleMesh) -> Result<TriangleMesh> {
        let mut store = ConnectivityStore::from_mesh(mesh)?;
        self.run(&mut store)?;
        Ok(store.to_triangle_mesh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{make_octahedron, make_plane_grid, make_unit_quad};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    /// Two thin triangles sharing a long diagonal from (0,0) to (4,0).
    fn make_long_diamond() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
                Point3::new(2.0, 0.5, 0.0),
                Point3::new(2.0, -0.5, 0.0),
            ],
            vec![[0, 1, 2], [0, 3, 1]],
        )
    }

    fn remesh_store(mesh: &TriangleMesh, params: RemeshParams) -> (ConnectivityStore, RemeshStats) {
        let mut store = ConnectivityStore::from_mesh(mesh).unwrap();
        let stats = IsotropicRemesher::with_params(params).run(&mut store).unwrap();
        (store, stats)
    }

    #[test]
    fn test_params_default() {
        let params = RemeshParams::default();
        assert_relative_eq!(params.collapse_ratio, 0.8);
        assert_relative_eq!(params.split_ratio, 4.0 / 3.0);
        assert!(!params.flip_pass);
        assert!(params.relocate);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_validation() {
        for (lo, hi) in [(0.0, 1.3), (1.5, 1.2), (0.8, f32::NAN), (0.8, f32::INFINITY)] {
            let err = RemeshParams::with_ratios(lo, hi).validate();
            assert!(matches!(err, Err(Error::InvalidData(_))), "{} {}", lo, hi);
        }
    }

    #[test]
    fn test_unit_quad_only_relocates() {
        let (store, stats) = remesh_store(&make_unit_quad(), RemeshParams::default());

        let expected_l = (4.0 + 2.0f32.sqrt()) / 5.0;
        assert_relative_eq!(stats.target_length, expected_l, epsilon = 1e-5);
        assert_relative_eq!(stats.min_length, expected_l * 0.8, epsilon = 1e-5);
        assert_relative_eq!(stats.max_length, expected_l * 4.0 / 3.0, epsilon = 1e-5);
        assert_eq!(stats.collapses, 0);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.relocations, 4);
        assert_eq!(store.vertex_count(), 4);
        assert_eq!(store.triangle_count(), 2);

        // Sequential averaging in ascending id order
        let expected = [
            (2.0 / 3.0, 2.0 / 3.0),
            (5.0 / 6.0, 5.0 / 6.0),
            (0.5, 5.0 / 6.0),
            (7.0 / 12.0, 0.75),
        ];
        for (v, (x, y)) in expected.iter().enumerate() {
            let p = store.position(v as u32).unwrap();
            assert_relative_eq!(p.x, *x, epsilon = 1e-5);
            assert_relative_eq!(p.y, *y, epsilon = 1e-5);
            assert_relative_eq!(p.z, 0.0);
        }
    }

    #[test]
    fn test_long_diagonal_is_split() {
        let params = RemeshParams {
            relocate: false,
            ..RemeshParams::default()
        };
        let (store, stats) = remesh_store(&make_long_diamond(), params);
        assert_eq!(stats.collapses, 0);
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.rejected_splits, 0);
        assert_eq!(store.vertex_count(), 5);
        assert_eq!(store.triangle_count(), 4);
        assert_eq!(store.edge_count(), 8);

        let p = store.position(4).unwrap();
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 0.0);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_boundary_edge_is_dropped_not_split() {
        let mut mesh = make_long_diamond();
        mesh.faces.truncate(1);
        let params = RemeshParams {
            collapse_ratio: 0.5,
            relocate: false,
            ..RemeshParams::default()
        };
        let (store, stats) = remesh_store(&mesh, params);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.rejected_splits, 1);
        assert_eq!(store.triangle_count(), 1);
        assert_eq!(store.edge_count(), 2);
        assert!(store.edge_between(0, 1).is_none());
    }

    #[test]
    fn test_short_edges_collapse() {
        // Pull two grid vertices close together
        let mut mesh = make_plane_grid(4);
        mesh.vertices[5] = Point3::new(1.0, 1.0, 0.0);
        mesh.vertices[6] = Point3::new(1.05, 1.0, 0.0);
        let params = RemeshParams {
            relocate: false,
            ..RemeshParams::default()
        };
        let (store, stats) = remesh_store(&mesh, params);
        assert!(stats.collapses >= 1);
        assert_eq!(store.vertex_count(), 16 - stats.collapses + stats.splits);
        assert!(store.edges().all(|e| !e.contains(6)));
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_flip_pass_on_regular_mesh() {
        let params = RemeshParams {
            flip_pass: true,
            relocate: false,
            ..RemeshParams::default()
        };
        let (store, stats) = remesh_store(&make_octahedron(), params);
        assert_eq!(stats.flips, 0);
        assert_eq!(store.triangle_count(), 8);
        for v in store.vertices() {
            assert_eq!(v.valence(), 4);
        }
    }

    #[test]
    fn test_no_edges_is_noop() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            vec![],
        );
        let (store, stats) = remesh_store(&mesh, RemeshParams::default());
        assert_eq!(stats, RemeshStats::default());
        assert_eq!(store.vertex_count(), 2);
    }

    #[test]
    fn test_mesh_remesher_trait() {
        let result = IsotropicRemesher::new().remesh(&make_plane_grid(5)).unwrap();
        assert!(result.validate().is_ok());
        assert!(result.face_count() > 0);
    }

    #[test]
    fn test_params_from_json() {
        let params: RemeshParams = serde_json::from_str(r#"{ "flip_pass": true }"#).unwrap();
        assert!(params.flip_pass);
        assert_relative_eq!(params.collapse_ratio, 0.8);
    }
}
