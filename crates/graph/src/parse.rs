//! Graph file parsing.

use crate::{edge_tag, vertex_tag, GraphError};
use algebra::Pose;
use chain::{LoopClosure, PoseChain, RelativeEdge, SolutionSpace};
use nalgebra::{Matrix6, Quaternion, UnitQuaternion, Vector3};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse a graph file into a pose chain.
pub fn parse_graph(path: &Path) -> Result<PoseChain, GraphError> {
    parse_str(&fs::read_to_string(path)?)
}

/// Parse graph text into a pose chain.
///
/// Two passes: the first counts vertex tags to fix the solution space
/// and the expected record counts, the second fills the chain. A
/// mismatch between expected and observed counts is fatal; the
/// optimizer never runs on an inconsistent graph.
pub fn parse_str(input: &str) -> Result<PoseChain, GraphError> {
    let mut records = 0usize;
    let mut se3 = 0usize;
    let mut rst3 = 0usize;
    let mut rt3 = 0usize;
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records += 1;
        match line.split_whitespace().next() {
            Some("VERTEX_SE3:QUAT") => se3 += 1,
            Some("VERTEX_RST3:QUAT") => rst3 += 1,
            Some("VERTEX_RT3:QUAT") => rt3 += 1,
            _ => {}
        }
    }

    let (space, expected_vertices) = if se3 > 0 {
        (SolutionSpace::Se3, se3)
    } else if rst3 > 0 {
        (SolutionSpace::Sim3, rst3)
    } else if rt3 > 0 {
        (SolutionSpace::RxT3, rt3)
    } else {
        return Err(GraphError::NoVertices);
    };
    let expected_edges = expected_vertices.saturating_sub(1);
    let expected_closures = records
        .saturating_sub(expected_vertices)
        .saturating_sub(expected_edges);
    debug!(
        ?space,
        expected_vertices, expected_edges, expected_closures, "Scanned graph"
    );

    let v_tag = vertex_tag(space);
    let e_tag = edge_tag(space);
    let has_scale = space.has_scale();
    let scale_fields = usize::from(has_scale);

    let mut vertices = vec![Pose::identity(); expected_vertices];
    let mut seen_vertices = 0usize;
    let mut slots: Vec<Option<RelativeEdge>> = vec![None; expected_vertices];
    let mut seen_edges = 0usize;
    let mut closures = Vec::with_capacity(expected_closures);

    for (idx, raw) in input.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let record = Record {
            tokens: raw.split_whitespace().collect(),
            line: idx + 1,
        };
        let Some(&tag) = record.tokens.first() else {
            continue;
        };

        if tag == v_tag {
            let id = record.index(1)?;
            if id >= expected_vertices {
                return Err(GraphError::Malformed { line: record.line });
            }
            vertices[id] = record.pose(2)?;
            seen_vertices += 1;
        } else if tag == e_tag {
            let from = record.index(1)?;
            let to = record.index(2)?;
            let pose = record.pose(3)?;
            let scale = if has_scale { record.float(10)? } else { 1.0 };
            let covariance = record.covariance(10 + scale_fields)?;
            let (tra_info, rot_info) = information_scalars(&covariance, record.line)?;

            if to == from + 1 {
                // Sequential measurement for slot `to`.
                if to >= expected_vertices || slots[to].is_some() {
                    return Err(GraphError::Malformed { line: record.line });
                }
                slots[to] = Some(RelativeEdge {
                    pose,
                    tra_info,
                    rot_info,
                    scale,
                    covariance,
                });
                seen_edges += 1;
            } else {
                closures.push(LoopClosure::from_edge(
                    from, to, pose, tra_info, rot_info, scale, covariance,
                ));
            }
        }
    }

    if seen_vertices != expected_vertices
        || seen_edges != expected_edges
        || closures.len() != expected_closures
    {
        return Err(GraphError::Inconsistent {
            vertices: seen_vertices,
            expected_vertices,
            edges: seen_edges,
            expected_edges,
            closures: closures.len(),
            expected_closures,
        });
    }

    debug!(
        vertices = seen_vertices,
        edges = seen_edges,
        closures = closures.len(),
        "Parsed pose graph"
    );

    let edges: Vec<RelativeEdge> = slots.into_iter().skip(1).flatten().collect();
    Ok(PoseChain::new(space, vertices, edges, closures)?)
}

/// Reduce an edge covariance to per-channel information scalars: invert
/// the information-style block to a variance matrix and take the mean
/// standard deviation over each channel's diagonal, squared.
fn information_scalars(covariance: &[f64; 21], line: usize) -> Result<(f64, f64), GraphError> {
    let mut info = Matrix6::zeros();
    let mut k = 0;
    for r in 0..6 {
        for c in r..6 {
            info[(r, c)] = covariance[k];
            info[(c, r)] = covariance[k];
            k += 1;
        }
    }
    let var = info
        .try_inverse()
        .ok_or(GraphError::SingularCovariance { line })?;
    let mean_std = |a: f64, b: f64, c: f64| ((a.sqrt() + b.sqrt() + c.sqrt()) / 3.0).powi(2);
    Ok((
        mean_std(var[(0, 0)], var[(1, 1)], var[(2, 2)]),
        mean_std(var[(3, 3)], var[(4, 4)], var[(5, 5)]),
    ))
}

/// One whitespace-tokenized record with its 1-based line number.
struct Record<'a> {
    tokens: Vec<&'a str>,
    line: usize,
}

impl Record<'_> {
    fn float(&self, at: usize) -> Result<f64, GraphError> {
        self.tokens
            .get(at)
            .and_then(|tok| tok.parse().ok())
            .ok_or(GraphError::Malformed { line: self.line })
    }

    fn index(&self, at: usize) -> Result<usize, GraphError> {
        self.tokens
            .get(at)
            .and_then(|tok| tok.parse().ok())
            .ok_or(GraphError::Malformed { line: self.line })
    }

    /// Translation then quaternion, `tx ty tz qx qy qz qw`.
    fn pose(&self, at: usize) -> Result<Pose, GraphError> {
        let translation = Vector3::new(self.float(at)?, self.float(at + 1)?, self.float(at + 2)?);
        let quat = Quaternion::new(
            self.float(at + 6)?,
            self.float(at + 3)?,
            self.float(at + 4)?,
            self.float(at + 5)?,
        );
        Ok(Pose::from_parts(
            translation,
            UnitQuaternion::from_quaternion(quat),
        ))
    }

    fn covariance(&self, at: usize) -> Result<[f64; 21], GraphError> {
        let mut cov = [0.0; 21];
        for (k, value) in cov.iter_mut().enumerate() {
            *value = self.float(at + k)?;
        }
        Ok(cov)
    }
}
