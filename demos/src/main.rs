//! remesh-demo: run the simplifier and the remesher on a procedural mesh.
//!
//! Set `RUST_LOG` to control log output, for example
//! `RUST_LOG=remeshcrate_simplification=debug remesh-demo sphere --mode both`.
//! Without `RUST_LOG`, `-v` enables info and `-vv` debug logging.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use remeshcrate_core::{Point3f, TriangleMesh};
use remeshcrate_simplification::{
    remesh_with, simplify_then_remesh_with, simplify_with, ExhaustionPolicy, MeshOutput,
    RemeshParams, RemeshStats, SelectionStrategy, SimplifyParams, SimplifyStats,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "remesh-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Procedural input mesh
    #[arg(value_enum, default_value = "sphere")]
    shape: Shape,

    /// Mesh resolution (rings for the sphere, side length for the grid)
    #[arg(long, default_value = "24")]
    resolution: usize,

    /// Which passes to run
    #[arg(long, value_enum, default_value = "both")]
    mode: Mode,

    /// Fraction of vertices kept by the simplifier
    #[arg(long, default_value = "0.5")]
    retain: f32,

    /// Use the priority queue instead of a linear scan
    #[arg(long)]
    queue: bool,

    /// Fail instead of stopping early when candidate edges run out
    #[arg(long)]
    strict: bool,

    /// Run the valence flip pass while remeshing
    #[arg(long)]
    flip: bool,

    /// JSON file with `simplify` and `remesh` parameter sections; overrides the flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result summary as JSON
    #[arg(long)]
    json: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Sphere,
    Grid,
    Tetrahedron,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Simplify,
    Remesh,
    Both,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    simplify: Option<SimplifyParams>,
    remesh: Option<RemeshParams>,
}

#[derive(Serialize)]
struct Summary {
    input_vertices: usize,
    input_triangles: usize,
    output_vertices: usize,
    output_triangles: usize,
    elapsed_seconds: f64,
    simplify: Option<SimplifyStats>,
    remesh: Option<RemeshStats>,
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "remeshcrate_simplification=info",
            2 => "remeshcrate_simplification=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn uv_sphere(rings: usize) -> TriangleMesh {
    let rings = rings.max(3);
    let segments = rings * 2;
    let mut mesh = TriangleMesh::new();
    mesh.add_vertex(Point3f::new(0.0, 0.0, 1.0));
    for r in 1..rings {
        let phi = std::f32::consts::PI * r as f32 / rings as f32;
        for s in 0..segments {
            let theta = std::f32::consts::TAU * s as f32 / segments as f32;
            mesh.add_vertex(Point3f::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            ));
        }
    }
    let bottom = mesh.vertex_count();
    mesh.add_vertex(Point3f::new(0.0, 0.0, -1.0));

    let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
    for s in 0..segments {
        mesh.add_face([0, ring(1, s), ring(1, s + 1)]);
        mesh.add_face([bottom, ring(rings - 1, s + 1), ring(rings - 1, s)]);
    }
    for r in 1..(rings - 1) {
        for s in 0..segments {
            mesh.add_face([ring(r, s), ring(r + 1, s), ring(r + 1, s + 1)]);
            mesh.add_face([ring(r, s), ring(r + 1, s + 1), ring(r, s + 1)]);
        }
    }
    mesh
}

fn wavy_grid(size: usize) -> TriangleMesh {
    let size = size.max(2);
    let mut mesh = TriangleMesh::new();
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            mesh.add_vertex(Point3f::new(x as f32, y as f32, fx.sin() * fy.sin() * 2.0));
        }
    }
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            mesh.add_face([tl, bl, tr]);
            mesh.add_face([tr, bl, bl + 1]);
        }
    }
    mesh
}

fn tetrahedron() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.5, 1.0, 0.0),
            Point3f::new(0.5, 0.5, 1.0),
        ],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mesh = match cli.shape {
        Shape::Sphere => uv_sphere(cli.resolution),
        Shape::Grid => wavy_grid(cli.resolution),
        Shape::Tetrahedron => tetrahedron(),
    };

    let mut simplify_params = SimplifyParams {
        retain_fraction: cli.retain,
        strategy: if cli.queue {
            SelectionStrategy::PriorityQueue
        } else {
            SelectionStrategy::LinearScan
        },
        on_exhaustion: if cli.strict {
            ExhaustionPolicy::Fail
        } else {
            ExhaustionPolicy::StopEarly
        },
    };
    let mut remesh_params = RemeshParams {
        flip_pass: cli.flip,
        ..RemeshParams::default()
    };
    if let Some(path) = &cli.config {
        let config = load_config(path)?;
        simplify_params = config.simplify.unwrap_or(simplify_params);
        remesh_params = config.remesh.unwrap_or(remesh_params);
    }

    info!(
        vertices = mesh.vertex_count(),
        triangles = mesh.face_count(),
        "generated input mesh"
    );

    let output: MeshOutput = match cli.mode {
        Mode::Simplify => simplify_with(&mesh, &simplify_params),
        Mode::Remesh => remesh_with(&mesh, &remesh_params),
        Mode::Both => simplify_then_remesh_with(&mesh, &simplify_params, &remesh_params),
    }
    .context("mesh processing failed")?;

    let summary = Summary {
        input_vertices: mesh.vertex_count(),
        input_triangles: mesh.face_count(),
        output_vertices: output.buffer.vertex_count(),
        output_triangles: output.buffer.triangle_count(),
        elapsed_seconds: output.elapsed_seconds,
        simplify: output.simplify,
        remesh: output.remesh,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} vertices / {} triangles -> {} vertices / {} triangles in {:.6}s",
            summary.input_vertices,
            summary.input_triangles,
            summary.output_vertices,
            summary.output_triangles,
            summary.elapsed_seconds
        );
        if let Some(s) = &summary.simplify {
            println!(
                "  simplify: {} of {} collapses{}",
                s.performed,
                s.requested,
                if s.exhausted { " (candidate edges exhausted)" } else { "" }
            );
        }
        if let Some(r) = &summary.remesh {
            println!(
                "  remesh: target {:.4} [{:.4}, {:.4}], {} collapses, {} splits ({} rejected), {} flips",
                r.target_length,
                r.min_length,
                r.max_length,
                r.collapses,
                r.splits,
                r.rejected_splits,
                r.flips
            );
        }
    }

    Ok(())
}
