//! Chain storage: parallel pose/update/information arrays.

use algebra::Pose;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Chain needs at least 2 poses, got {0}")]
    TooFewPoses(usize),
    #[error("Expected {expected} relative edges for {vertices} vertices, got {got}")]
    EdgeCountMismatch {
        vertices: usize,
        expected: usize,
        got: usize,
    },
    #[error("Loop closure {index} spans [{start}, {end}] outside a chain of {len} poses")]
    InvalidSegment {
        index: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("Relative edge at slot {slot} carries a non-positive information scalar")]
    EdgeInformation { slot: usize },
    #[error("Loop closure {index} carries a non-positive information scalar")]
    ClosureInformation { index: usize },
}

/// Solution space the chain is optimized over, fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionSpace {
    /// Rigid motions.
    Se3,
    /// Rigid motions with a drifting scale.
    Sim3,
    /// Decoupled rotation and translation.
    RxT3,
}

impl SolutionSpace {
    /// Whether relative translations carry a scale drift to correct.
    pub fn has_scale(&self) -> bool {
        matches!(self, SolutionSpace::Sim3)
    }
}

/// A sequential relative measurement, as parsed.
#[derive(Debug, Clone, Copy)]
pub struct RelativeEdge {
    /// Measured relative pose (slot i-1 -> i)
    pub pose: Pose,
    /// Translation information scalar
    pub tra_info: f64,
    /// Rotation information scalar
    pub rot_info: f64,
    /// Measured edge scale (1.0 outside Sim(3))
    pub scale: f64,
    /// Original upper-triangular 6x6 covariance, preserved for output
    pub covariance: [f64; 21],
}

impl RelativeEdge {
    /// Edge with unit information and identity covariance, handy for
    /// synthetic chains.
    pub fn with_unit_info(pose: Pose) -> Self {
        Self {
            pose,
            tra_info: 1.0,
            rot_info: 1.0,
            scale: 1.0,
            covariance: identity_covariance(),
        }
    }
}

/// A loop-closure constraint between two non-adjacent chain indices.
#[derive(Debug, Clone, Copy)]
pub struct LoopClosure {
    /// Segment start, always <= `end`
    pub start: usize,
    /// Segment end
    pub end: usize,
    /// Constraint transform start -> end
    pub constraint: Pose,
    /// Translation information scalar
    pub tra_info: f64,
    /// Rotation information scalar
    pub rot_info: f64,
    /// Closing scale factor (1.0 outside Sim(3))
    pub scale: f64,
    /// Edge source index as read
    pub from: usize,
    /// Edge target index as read
    pub to: usize,
    /// Measured transform as read, preserved for output
    pub measured: Pose,
    /// Original upper-triangular 6x6 covariance, preserved for output
    pub covariance: [f64; 21],
}

impl LoopClosure {
    /// Build a closure from an edge record, normalizing direction so
    /// that `start <= end`: a backward edge is inverted and its
    /// endpoints swapped.
    pub fn from_edge(
        from: usize,
        to: usize,
        measured: Pose,
        tra_info: f64,
        rot_info: f64,
        scale: f64,
        covariance: [f64; 21],
    ) -> Self {
        let (start, end, constraint) = if to < from {
            (to, from, measured.inverse_isometry())
        } else {
            (from, to, measured)
        };
        Self {
            start,
            end,
            constraint,
            tra_info,
            rot_info,
            scale,
            from,
            to,
            measured,
            covariance,
        }
    }
}

/// The pose chain plus everything the optimizer mutates in place.
///
/// All arrays have one entry per absolute pose; slot arrays (relative
/// poses, updates, scale, information) leave index 0 unused so that
/// slot i pairs with the edge ending at pose i. Everything is allocated
/// here; the optimization loops never reallocate.
pub struct PoseChain {
    pub(crate) space: SolutionSpace,
    /// Absolute poses; index 0 is the anchor from the input
    pub(crate) abs: Vec<Pose>,
    /// Current relative poses, mutated by the optimizer
    pub(crate) rel: Vec<Pose>,
    /// Original relative measurements, preserved for output
    pub(crate) rel_orig: Vec<Pose>,
    /// Per-slot update scratch written by the interpolator
    pub(crate) upd: Vec<Pose>,
    /// Accumulated per-slot scale corrections
    pub(crate) scale: Vec<f64>,
    /// Translation information per slot
    pub(crate) tra_info: Vec<f64>,
    /// Rotation information per slot
    pub(crate) rot_info: Vec<f64>,
    /// Scale information per slot
    pub(crate) scale_info: Vec<f64>,
    /// Measured edge scales, preserved for output
    pub(crate) scale_meas: Vec<f64>,
    /// Original edge covariances, preserved for output
    pub(crate) covariances: Vec<[f64; 21]>,
    pub(crate) closures: Vec<LoopClosure>,
}

impl PoseChain {
    /// Assemble a chain from parsed parts.
    ///
    /// `vertices[i]` seeds the absolute pose at index i (only the
    /// anchor at index 0 survives integration), `edges[k]` is the
    /// relative measurement for slot k+1. Validates the count relation
    /// and that every information scalar is strictly positive.
    pub fn new(
        space: SolutionSpace,
        vertices: Vec<Pose>,
        edges: Vec<RelativeEdge>,
        closures: Vec<LoopClosure>,
    ) -> Result<Self, ChainError> {
        let n = vertices.len();
        if n < 2 {
            return Err(ChainError::TooFewPoses(n));
        }
        if edges.len() != n - 1 {
            return Err(ChainError::EdgeCountMismatch {
                vertices: n,
                expected: n - 1,
                got: edges.len(),
            });
        }
        for (index, closure) in closures.iter().enumerate() {
            if closure.start > closure.end || closure.end >= n {
                return Err(ChainError::InvalidSegment {
                    index,
                    start: closure.start,
                    end: closure.end,
                    len: n,
                });
            }
            if !positive(closure.tra_info) || !positive(closure.rot_info) {
                return Err(ChainError::ClosureInformation { index });
            }
        }

        let mut rel = vec![Pose::identity(); n];
        let mut rel_orig = vec![Pose::identity(); n];
        let mut tra_info = vec![0.0; n];
        let mut rot_info = vec![0.0; n];
        let mut scale_meas = vec![1.0; n];
        let mut covariances = vec![[0.0; 21]; n];
        for (k, edge) in edges.iter().enumerate() {
            let slot = k + 1;
            if !positive(edge.tra_info) || !positive(edge.rot_info) {
                return Err(ChainError::EdgeInformation { slot });
            }
            rel[slot] = edge.pose;
            rel_orig[slot] = edge.pose;
            tra_info[slot] = edge.tra_info;
            rot_info[slot] = edge.rot_info;
            scale_meas[slot] = edge.scale;
            covariances[slot] = edge.covariance;
        }

        Ok(Self {
            space,
            abs: vertices,
            rel,
            rel_orig,
            upd: vec![Pose::identity(); n],
            scale: vec![1.0; n],
            tra_info,
            rot_info,
            scale_info: vec![1.0; n],
            scale_meas,
            covariances,
            closures,
        })
    }

    /// Number of absolute poses.
    pub fn len(&self) -> usize {
        self.abs.len()
    }

    pub fn solution_space(&self) -> SolutionSpace {
        self.space
    }

    /// Absolute pose at index i.
    pub fn absolute(&self, i: usize) -> &Pose {
        &self.abs[i]
    }

    /// Current relative pose at slot i (1-based slots).
    pub fn relative(&self, i: usize) -> &Pose {
        &self.rel[i]
    }

    /// Original relative measurement at slot i.
    pub fn relative_original(&self, i: usize) -> &Pose {
        &self.rel_orig[i]
    }

    /// Accumulated scale correction at slot i.
    pub fn scale_correction(&self, i: usize) -> f64 {
        self.scale[i]
    }

    /// Translation information at slot i.
    pub fn tra_info(&self, i: usize) -> f64 {
        self.tra_info[i]
    }

    /// Rotation information at slot i.
    pub fn rot_info(&self, i: usize) -> f64 {
        self.rot_info[i]
    }

    /// Measured edge scale at slot i, as parsed.
    pub fn edge_scale(&self, i: usize) -> f64 {
        self.scale_meas[i]
    }

    /// Original edge covariance at slot i, as parsed.
    pub fn edge_covariance(&self, i: usize) -> &[f64; 21] {
        &self.covariances[i]
    }

    pub fn closures(&self) -> &[LoopClosure] {
        &self.closures
    }
}

/// Identity upper-triangular 6x6 covariance block.
pub fn identity_covariance() -> [f64; 21] {
    let mut cov = [0.0; 21];
    // Diagonal entries of the row-major upper triangle.
    for slot in [0, 6, 11, 15, 18, 20] {
        cov[slot] = 1.0;
    }
    cov
}

fn positive(info: f64) -> bool {
    info.is_finite() && info > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn identity_chain(n: usize) -> PoseChain {
        let vertices = vec![Pose::identity(); n];
        let edges = vec![RelativeEdge::with_unit_info(Pose::identity()); n - 1];
        PoseChain::new(SolutionSpace::Se3, vertices, edges, Vec::new()).unwrap()
    }

    #[test]
    fn test_slot_layout() {
        let chain = identity_chain(5);
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.closures().len(), 0);
        assert_eq!(chain.scale_correction(3), 1.0);
        assert_eq!(chain.tra_info(0), 0.0);
        assert_eq!(chain.tra_info(1), 1.0);
    }

    #[test]
    fn test_rejects_edge_count_mismatch() {
        let vertices = vec![Pose::identity(); 4];
        let edges = vec![RelativeEdge::with_unit_info(Pose::identity()); 2];
        let result = PoseChain::new(SolutionSpace::Se3, vertices, edges, Vec::new());
        assert!(matches!(result, Err(ChainError::EdgeCountMismatch { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_closure() {
        let vertices = vec![Pose::identity(); 4];
        let edges = vec![RelativeEdge::with_unit_info(Pose::identity()); 3];
        let closure = LoopClosure::from_edge(
            0,
            7,
            Pose::identity(),
            1.0,
            1.0,
            1.0,
            identity_covariance(),
        );
        let result = PoseChain::new(SolutionSpace::Se3, vertices, edges, vec![closure]);
        assert!(matches!(result, Err(ChainError::InvalidSegment { .. })));
    }

    #[test]
    fn test_rejects_non_positive_information() {
        let vertices = vec![Pose::identity(); 3];
        let mut edges = vec![RelativeEdge::with_unit_info(Pose::identity()); 2];
        edges[1].rot_info = 0.0;
        let result = PoseChain::new(SolutionSpace::Se3, vertices, edges, Vec::new());
        assert!(matches!(
            result,
            Err(ChainError::EdgeInformation { slot: 2 })
        ));
    }

    #[test]
    fn test_backward_edge_normalized() {
        let measured = Pose::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let closure =
            LoopClosure::from_edge(6, 2, measured, 1.0, 1.0, 1.0, identity_covariance());
        assert_eq!(closure.start, 2);
        assert_eq!(closure.end, 6);
        assert_eq!(closure.from, 6);
        assert_eq!(closure.to, 2);
        assert_eq!(closure.constraint.translation().x, -1.0);
        assert_eq!(closure.measured.translation().x, 1.0);
    }
}
