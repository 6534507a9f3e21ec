//! Timed entry points
//!
//! Each entry point builds a fresh [`ConnectivityStore`] from the input mesh,
//! runs the requested passes and flattens the result into a [`MeshBuffer`].
//! `elapsed_seconds` covers store construction, the passes and the buffer
//! build.

use crate::edge_collapse::{EdgeCollapseSimplifier, SimplifyParams, SimplifyStats};
use crate::remesh::{IsotropicRemesher, RemeshParams, RemeshStats};
use crate::store::ConnectivityStore;
use remeshcrate_core::{MeshBuffer, Result, TriangleMesh};
use std::time::Instant;
use tracing::{info, info_span};

/// Output of an entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshOutput {
    pub buffer: MeshBuffer,
    pub elapsed_seconds: f64,
    pub simplify: Option<SimplifyStats>,
    pub remesh: Option<RemeshStats>,
}

/// Simplify `mesh` down to `retain_fraction` of its vertices.
pub fn simplify(mesh: &TriangleMesh, retain_fraction: f32) -> Result<MeshOutput> {
    simplify_with(mesh, &SimplifyParams::new(retain_fraction))
}

pub fn simplify_with(mesh: &TriangleMesh, params: &SimplifyParams) -> Result<MeshOutput> {
    let _span = info_span!(
        "simplify",
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        retain = params.retain_fraction
    )
    .entered();
    let start = Instant::now();

    let mut store = ConnectivityStore::from_mesh(mesh)?;
    let stats = EdgeCollapseSimplifier::with_params(params.clone()).run(&mut store)?;
    let buffer = store.to_buffer();

    Ok(finish(start, buffer, Some(stats), None))
}

/// Run one isotropic remeshing pass over `mesh`.
pub fn remesh(mesh: &TriangleMesh) -> Result<MeshOutput> {
    remesh_with(mesh, &RemeshParams::default())
}

pub fn remesh_with(mesh: &TriangleMesh, params: &RemeshParams) -> Result<MeshOutput> {
    let _span = info_span!(
        "remesh",
        vertices = mesh.vertex_count(),
        faces = mesh.face_count()
    )
    .entered();
    let start = Instant::now();

    let mut store = ConnectivityStore::from_mesh(mesh)?;
    let stats = IsotropicRemesher::with_params(params.clone()).run(&mut store)?;
    let buffer = store.to_buffer();

    Ok(finish(start, buffer, None, Some(stats)))
}

/// Simplify, then remesh the simplified store.
///
/// The remesh pass sees the simplifier's candidate edges and accumulated
/// quadrics rather than a store rebuilt from the simplified faces.
pub fn simplify_then_remesh(mesh: &TriangleMesh, retain_fraction: f32) -> Result<MeshOutput> {
    simplify_then_remesh_with(
        mesh,
        &SimplifyParams::new(retain_fraction),
        &RemeshParams::default(),
    )
}

pub fn simplify_then_remesh_with(
    mesh: &TriangleMesh,
    simplify_params: &SimplifyParams,
    remesh_params: &RemeshParams,
) -> Result<MeshOutput> {
    let _span = info_span!(
        "simplify_then_remesh",
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        retain = simplify_params.retain_fraction
    )
    .entered();
    let start = Instant::now();

    let mut store = ConnectivityStore::from_mesh(mesh)?;
    let simplified = EdgeCollapseSimplifier::with_params(simplify_params.clone()).run(&mut store)?;
    let remeshed = IsotropicRemesher::with_params(remesh_params.clone()).run(&mut store)?;
    let buffer = store.to_buffer();

    Ok(finish(start, buffer, Some(simplified), Some(remeshed)))
}

fn finish(
    start: Instant,
    buffer: MeshBuffer,
    simplify: Option<SimplifyStats>,
    remesh: Option<RemeshStats>,
) -> MeshOutput {
    let elapsed_seconds = start.elapsed().as_secs_f64();
    info!(
        vertices = buffer.vertex_count(),
        triangles = buffer.triangle_count(),
        elapsed_seconds,
        "mesh ready"
    );
    MeshOutput {
        buffer,
        elapsed_seconds,
        simplify,
        remesh,
    }
}
