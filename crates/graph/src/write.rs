//! Optimized graph output.

use crate::{edge_tag, vertex_tag, GraphError};
use algebra::Pose;
use chain::PoseChain;
use std::fs;
use std::path::Path;

/// Write the optimized graph to a file.
pub fn write_graph(path: &Path, chain: &PoseChain) -> Result<(), GraphError> {
    fs::write(path, write_string(chain))?;
    Ok(())
}

/// Render the optimized graph as text.
///
/// Vertices come first in index order with their optimized poses. Each
/// relative edge follows, rebuilt from the original measurement and
/// covariance rather than the mutated chain, so downstream consumers
/// keep working on the edges they supplied; loop closures are emitted
/// right after the edge ending at their later vertex, in their original
/// direction. Floats use the default formatting, which round-trips f64
/// exactly.
pub fn write_string(chain: &PoseChain) -> String {
    let space = chain.solution_space();
    let v_tag = vertex_tag(space);
    let e_tag = edge_tag(space);
    let has_scale = space.has_scale();
    let mut out = String::new();

    for i in 0..chain.len() {
        let pose = chain.absolute(i);
        out.push_str(&format!("{} {} {}\n", v_tag, i, pose_fields(pose)));
    }

    for i in 1..chain.len() {
        let mut line = format!(
            "{} {} {} {}",
            e_tag,
            i - 1,
            i,
            pose_fields(chain.relative_original(i))
        );
        if has_scale {
            line.push_str(&format!(" {}", chain.edge_scale(i)));
        }
        line.push(' ');
        line.push_str(&cov_fields(chain.edge_covariance(i)));
        out.push_str(&line);
        out.push('\n');

        for closure in chain.closures().iter().filter(|c| c.end == i) {
            let mut line = format!(
                "{} {} {} {}",
                e_tag,
                closure.from,
                closure.to,
                pose_fields(&closure.measured)
            );
            if has_scale {
                line.push_str(&format!(" {}", closure.scale));
            }
            line.push(' ');
            line.push_str(&cov_fields(&closure.covariance));
            out.push_str(&line);
            out.push('\n');
        }
    }

    out
}

/// `tx ty tz qx qy qz qw` for one pose.
fn pose_fields(pose: &Pose) -> String {
    let t = pose.translation();
    let q = pose.rotation_quaternion();
    format!("{} {} {} {} {} {} {}", t.x, t.y, t.z, q.i, q.j, q.k, q.w)
}

fn cov_fields(cov: &[f64; 21]) -> String {
    cov.iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_str;
    use chain::{
        identity_covariance, LoopClosure, PoseChain, RelativeEdge, SolutionSpace,
    };
    use nalgebra::Vector3;

    fn small_chain(space: SolutionSpace) -> PoseChain {
        let vertices = vec![Pose::identity(); 4];
        let step = Pose::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let edges = vec![RelativeEdge::with_unit_info(step); 3];
        let closure = LoopClosure::from_edge(
            3,
            0,
            Pose::from_translation(Vector3::new(-3.0, 0.0, 0.0)),
            1.0,
            1.0,
            1.0,
            identity_covariance(),
        );
        PoseChain::new(space, vertices, edges, vec![closure]).unwrap()
    }

    #[test]
    fn test_layout_vertices_then_edges() {
        let text = write_string(&small_chain(SolutionSpace::Se3));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        for line in &lines[..4] {
            assert!(line.starts_with("VERTEX_SE3:QUAT"));
        }
        for line in &lines[4..] {
            assert!(line.starts_with("EDGE_SE3:QUAT"));
        }
        // The closure comes right after the edge ending at vertex 3,
        // in its original backward direction.
        assert!(lines[7].starts_with("EDGE_SE3:QUAT 3 0 "));
    }

    #[test]
    fn test_sim3_records_carry_scale() {
        let text = write_string(&small_chain(SolutionSpace::Sim3));
        let edge = text
            .lines()
            .find(|l| l.starts_with("EDGE_RST3:QUAT 0 1"))
            .unwrap();
        // tag + endpoints + pose + scale + 21 covariance values
        assert_eq!(edge.split_whitespace().count(), 32);
    }

    #[test]
    fn test_written_graph_reparses() {
        let chain = small_chain(SolutionSpace::Se3);
        let reparsed = parse_str(&write_string(&chain)).unwrap();
        assert_eq!(reparsed.len(), chain.len());
        assert_eq!(reparsed.closures().len(), 1);
        assert_eq!(reparsed.relative_original(1).translation().x, 1.0);
    }
}
