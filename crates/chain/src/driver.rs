//! The optimization driver: walks loop closures in order and
//! distributes each correction along its chain segment.

use crate::interpolate::Normalizers;
use crate::store::PoseChain;
use crate::update::UpdateMode;
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// Translation information at or above this value marks a closure as
/// orientation-only: its translation channel is effectively
/// uninformative and must not be distributed.
const ORIENTATION_ONLY_INFO: f64 = 4.5e9;

/// Relative rotations are re-orthonormalized once every this many
/// processed closures.
const NORMALIZE_PERIOD: usize = 101;

/// Distribution method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Monolithic: rotation and translation distributed together.
    OnePass,
    /// Stratified: rotation first, then scale, then translation.
    #[default]
    TwoPass,
}

/// Immutable optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizeConfig {
    pub method: Method,
    /// Optimize Sim(3) input as SE(3), leaving scale drift untouched.
    pub ignore_scale: bool,
    /// Fraction of each correction to distribute; 1.0 applies the full
    /// correction, larger values damp it.
    pub global_normalizer: f64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            method: Method::TwoPass,
            ignore_scale: false,
            global_normalizer: 1.0,
        }
    }
}

impl PoseChain {
    /// Run the optimizer over all loop closures in input order.
    ///
    /// Closures are processed sequentially, each as one transaction
    /// over the chain, which simulates an online run over the recorded
    /// trajectory. A closure ending before the frontier of an already
    /// processed one is skipped, as is a degenerate zero-length
    /// segment.
    pub fn optimize(&mut self, config: &OptimizeConfig) {
        let g = config.global_normalizer;
        let use_scale = self.space.has_scale() && !config.ignore_scale;
        let mut prev_end = 0usize;
        let mut normalize_counter = 0usize;

        for n in 0..self.closures.len() {
            let closure = self.closures[n];
            let (start, end) = (closure.start, closure.end);
            debug!(
                closure = n,
                start,
                end,
                length = end - start,
                "Loop closure"
            );

            if end < prev_end {
                debug!(closure = n, "Skipping closure behind the frontier");
                continue;
            }
            if start == end {
                debug!(closure = n, "Skipping degenerate closure");
                continue;
            }

            // Bring the chain up to date before the segment.
            if prev_end < start {
                self.integrate(prev_end, start, false);
            }

            let orientation_only = closure.tra_info >= ORIENTATION_ONLY_INFO;
            if orientation_only {
                debug!(closure = n, "Orientation-only closure");
            }

            // Integrate the segment in its local frame; the residual is
            // what remains between the accumulated drift and the
            // constraint.
            self.integrate(start, end, true);
            let mut residual = self.abs[end].inverse().compose(&closure.constraint);

            let etas = if config.method == Method::OnePass && !orientation_only {
                let etas = self.interpolate_motion(&residual, &closure, g);
                self.change_of_basis(start, end, UpdateMode::Both);
                self.apply_updates(start, end, UpdateMode::Both);
                etas
            } else {
                // First pass: rotation only.
                residual.set_translation(Vector3::zeros());
                let mut etas = self.interpolate_rotation(&residual, &closure, g);
                self.change_of_basis(start, end, UpdateMode::Rotation);
                self.apply_updates(start, end, UpdateMode::Rotation);

                if !orientation_only {
                    if use_scale {
                        self.distribute_scale(start, end, closure.scale, g);
                    }

                    // Second pass: whatever translation residual is
                    // left once the rotations (and scale) are in.
                    self.integrate(start, end, true);
                    let mut residual =
                        self.abs[end].inverse().compose(&closure.constraint);
                    residual.set_rotation(Matrix3::identity());
                    etas.tra = self.interpolate_translation(&residual, &closure, g).tra;
                    self.change_of_basis(start, end, UpdateMode::Translation);
                    self.apply_updates(start, end, UpdateMode::Translation);
                }
                etas
            };

            self.integrate_normalized(start, end, normalize_counter == NORMALIZE_PERIOD - 1);
            normalize_counter = (normalize_counter + 1) % NORMALIZE_PERIOD;

            self.shrink_information(start, end, orientation_only, etas);
            prev_end = end;
        }

        // Integrate the tail of the trajectory.
        let last = self.len() - 1;
        self.integrate(prev_end, last, false);
    }

    /// Allocate the closure's scale factor over the segment and
    /// down-weight the segment's scale information accordingly.
    fn distribute_scale(&mut self, start: usize, end: usize, close_factor: f64, g: f64) {
        let interior: f64 = self.scale_info[start + 1..=end].iter().sum();
        let normalizer = g * (interior + 1.0);
        self.apply_scale(start, end, close_factor, normalizer);
        for info in &mut self.scale_info[start + 1..=end] {
            *info /= normalizer;
        }
    }

    /// Closing a loop makes every pose inside it more certain; scale
    /// the segment's information down by the closure's normalizers.
    fn shrink_information(
        &mut self,
        start: usize,
        end: usize,
        orientation_only: bool,
        etas: Normalizers,
    ) {
        for info in &mut self.rot_info[start + 1..=end] {
            *info *= etas.rot;
        }
        if !orientation_only {
            for info in &mut self.tra_info[start + 1..=end] {
                *info *= etas.tra;
            }
        }
    }
}
