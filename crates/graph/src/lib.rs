//! g2o-style text graph I/O for pose chains.
//!
//! One record per line, whitespace separated. Vertices carry an index,
//! a translation, and a unit quaternion; edges add the upper triangle
//! of their 6x6 covariance (and, in the Sim(3) dialect, a scale).
//! Adjacent-index edges are the chain's relative measurements, all
//! others are loop closures.
//!
//! Original measurements and covariances survive a parse/write round
//! trip untouched, so downstream consumers of the optimized graph see
//! the edges they put in.

use chain::{ChainError, SolutionSpace};
use thiserror::Error;

mod parse;
mod write;

pub use parse::{parse_graph, parse_str};
pub use write::{write_graph, write_string};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: malformed record")]
    Malformed { line: usize },
    #[error("Line {line}: covariance block is not invertible")]
    SingularCovariance { line: usize },
    #[error("No vertices found in input")]
    NoVertices,
    #[error(
        "Pose counts disagree with header scan: \
         {vertices}/{expected_vertices} vertices, \
         {edges}/{expected_edges} relative edges, \
         {closures}/{expected_closures} closures"
    )]
    Inconsistent {
        vertices: usize,
        expected_vertices: usize,
        edges: usize,
        expected_edges: usize,
        closures: usize,
        expected_closures: usize,
    },
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Vertex record tag for a solution space.
fn vertex_tag(space: SolutionSpace) -> &'static str {
    match space {
        SolutionSpace::Se3 => "VERTEX_SE3:QUAT",
        SolutionSpace::Sim3 => "VERTEX_RST3:QUAT",
        SolutionSpace::RxT3 => "VERTEX_RT3:QUAT",
    }
}

/// Edge record tag for a solution space.
fn edge_tag(space: SolutionSpace) -> &'static str {
    match space {
        SolutionSpace::Se3 => "EDGE_SE3:QUAT",
        SolutionSpace::Sim3 => "EDGE_RST3:QUAT",
        SolutionSpace::RxT3 => "EDGE_RT3:QUAT",
    }
}
