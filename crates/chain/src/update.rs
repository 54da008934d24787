//! Change of basis and update application.
//!
//! The interpolator leaves world-frame updates in the scratch slots.
//! Before an update can right-multiply its relative pose it must be
//! conjugated into that pose's own frame by the running absolute pose,
//! which at this point holds the segment's local-frame integration.

use crate::store::PoseChain;
use nalgebra::Vector3;
use tracing::debug;

/// Which channel of the relative poses an update pass touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateMode {
    Both,
    Rotation,
    Translation,
}

impl PoseChain {
    /// Conjugate each update slot in (start, end] into the frame of its
    /// relative pose.
    pub(crate) fn change_of_basis(&mut self, start: usize, end: usize, mode: UpdateMode) {
        match mode {
            UpdateMode::Both => {
                for i in start + 1..=end {
                    self.upd[i] = self.abs[i]
                        .inverse()
                        .compose(&self.upd[i])
                        .compose(&self.abs[i]);
                }
            }
            UpdateMode::Rotation => {
                for i in start + 1..=end {
                    let inv = self.abs[i].inverse();
                    let rot = inv.rotation() * self.upd[i].rotation() * self.abs[i].rotation();
                    self.upd[i].set_rotation(rot);
                }
            }
            UpdateMode::Translation => {
                for i in start + 1..=end {
                    // Rotation-only frame: the pure-translation update is
                    // rotated into the local frame, not offset.
                    let mut frame = self.abs[i];
                    frame.set_translation(Vector3::zeros());
                    let tra = frame.inverse().rotation() * self.upd[i].translation();
                    self.upd[i].set_translation(tra);
                }
            }
        }
    }

    /// Fold each update slot in (start, end] into its relative pose.
    pub(crate) fn apply_updates(&mut self, start: usize, end: usize, mode: UpdateMode) {
        match mode {
            UpdateMode::Both => {
                for i in start + 1..=end {
                    self.rel[i] = self.rel[i].compose(&self.upd[i]);
                }
            }
            UpdateMode::Rotation => {
                for i in start + 1..=end {
                    let rot = self.rel[i].rotation() * self.upd[i].rotation();
                    self.rel[i].set_rotation(rot);
                }
            }
            UpdateMode::Translation => {
                for i in start + 1..=end {
                    let tra = self.rel[i].translation() + self.upd[i].translation();
                    self.rel[i].set_translation(tra);
                }
            }
        }
    }

    /// Scale pass for Sim(3): walk the segment with a running product
    /// of per-slot shares of the closing scale factor, rescaling each
    /// relative translation and recording the accumulated correction.
    pub(crate) fn apply_scale(
        &mut self,
        start: usize,
        end: usize,
        close_factor: f64,
        normalizer: f64,
    ) {
        let mut correction = 1.0;
        for i in start + 1..=end {
            correction *= close_factor.powf(self.scale_info[i] / normalizer);
            self.scale[i] = correction;
            let tra = self.rel[i].translation() * correction;
            self.rel[i].set_translation(tra);
        }
        debug!(correction, "Loop closure scale correction");
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateMode;
    use crate::store::{PoseChain, RelativeEdge, SolutionSpace};
    use algebra::Pose;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::PI;

    fn chain_with_rels(rels: Vec<Pose>) -> PoseChain {
        let n = rels.len() + 1;
        let vertices = vec![Pose::identity(); n];
        let edges = rels
            .into_iter()
            .map(RelativeEdge::with_unit_info)
            .collect::<Vec<_>>();
        PoseChain::new(SolutionSpace::Sim3, vertices, edges, Vec::new()).unwrap()
    }

    #[test]
    fn test_change_of_basis_both_conjugates() {
        let mut chain = chain_with_rels(vec![
            Pose::from_parts(
                Vector3::new(1.0, 0.0, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 4.0),
            ),
            Pose::identity(),
        ]);
        chain.integrate(0, 2, false);
        let world_update = Pose::from_translation(Vector3::new(0.0, 1.0, 0.0));
        chain.upd[1] = world_update;

        chain.change_of_basis(0, 1, UpdateMode::Both);
        // Conjugation is invertible: mapping back recovers the update.
        let back = chain.abs[1]
            .compose(&chain.upd[1])
            .compose(&chain.abs[1].inverse());
        assert_relative_eq!(
            *back.translation(),
            *world_update.translation(),
            epsilon = 1e-10
        );
        assert_relative_eq!(
            *back.rotation(),
            *world_update.rotation(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_change_of_basis_translation_rotates_into_local_frame() {
        let quarter = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let mut chain = chain_with_rels(vec![Pose::from_parts(
            Vector3::new(5.0, 0.0, 0.0),
            quarter,
        )]);
        chain.integrate(0, 1, false);
        chain.upd[1] = Pose::from_translation(Vector3::new(1.0, 0.0, 0.0));

        chain.change_of_basis(0, 1, UpdateMode::Translation);
        // A world x step seen from a frame yawed +90 degrees points -y;
        // the frame's own offset must not leak in.
        assert_relative_eq!(
            *chain.upd[1].translation(),
            Vector3::new(0.0, -1.0, 0.0),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_apply_rotation_leaves_translation() {
        let mut chain = chain_with_rels(vec![Pose::from_translation(Vector3::new(
            1.0, 2.0, 3.0,
        ))]);
        chain.upd[1] = Pose::from_axis_angle(&Vector3::z_axis(), PI / 2.0);

        chain.apply_updates(0, 1, UpdateMode::Rotation);
        assert_relative_eq!(
            *chain.relative(1).translation(),
            Vector3::new(1.0, 2.0, 3.0)
        );
        assert_relative_eq!(
            *chain.relative(1).rotation(),
            *Pose::from_axis_angle(&Vector3::z_axis(), PI / 2.0).rotation(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_apply_translation_adds() {
        let mut chain = chain_with_rels(vec![Pose::from_translation(Vector3::new(
            1.0, 0.0, 0.0,
        ))]);
        chain.upd[1] = Pose::from_translation(Vector3::new(0.25, -0.5, 0.0));

        chain.apply_updates(0, 1, UpdateMode::Translation);
        assert_relative_eq!(
            *chain.relative(1).translation(),
            Vector3::new(1.25, -0.5, 0.0)
        );
    }

    #[test]
    fn test_apply_scale_running_product() {
        let step = Pose::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let mut chain = chain_with_rels(vec![step; 4]);

        // Uniform unit scale information, normalizer 4: each slot takes
        // an equal exponent share and the product climbs geometrically.
        chain.apply_scale(0, 4, 16.0, 4.0);
        for i in 1..=4 {
            let expected = 16.0_f64.powf(i as f64 / 4.0);
            assert_relative_eq!(chain.scale_correction(i), expected, epsilon = 1e-12);
            assert_relative_eq!(
                chain.relative(i).translation().x,
                expected,
                epsilon = 1e-12
            );
        }
    }
}
