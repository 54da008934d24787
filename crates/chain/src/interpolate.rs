//! Loop-closure residual interpolation.
//!
//! Splits one closure residual into per-slot update transforms,
//! allocating shares proportional to each slot's information scalar.
//! Updates are expressed in the world frame, conjugated by the closure
//! constraint; the change-of-basis pass later rewrites them into each
//! relative pose's own frame.

use crate::store::{LoopClosure, PoseChain};
use algebra::Pose;

/// Per-closure normalizers handed back to the driver, which uses them
/// to down-weight information inside the closed segment.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Normalizers {
    pub tra: f64,
    pub rot: f64,
}

impl PoseChain {
    /// Combined rotation + translation allocation, used by the one-pass
    /// method. The interior information sum excludes the segment's end
    /// slot; the stratified variants below include it.
    pub(crate) fn interpolate_motion(
        &mut self,
        residual: &Pose,
        closure: &LoopClosure,
        global_normalizer: f64,
    ) -> Normalizers {
        let (start, end) = (closure.start, closure.end);
        let tra = *residual.translation();
        let (angle, axis) = residual.log_rotation();

        let interior: f64 = self.tra_info[start + 1..end].iter().sum();
        let eta_tra = 1.0 / (1.0 + interior / closure.tra_info);
        let tra_denom = global_normalizer * (interior + closure.tra_info);

        let interior: f64 = self.rot_info[start + 1..end].iter().sum();
        let eta_rot = 1.0 / (1.0 + interior / closure.rot_info);
        let rot_denom = global_normalizer * (interior + closure.rot_info);

        let desired = closure.constraint;
        let desired_inv = desired.inverse_isometry();
        let mut tra_step = 0.0;
        let mut rot_step = 0.0;
        for i in start + 1..=end {
            let before = Pose::interp_rigid(tra_step, rot_step, &tra, angle, &axis);
            tra_step += self.tra_info[i] / tra_denom;
            rot_step += self.rot_info[i] / rot_denom;
            let after = Pose::interp_rigid(tra_step, rot_step, &tra, angle, &axis);

            let step = before.inverse_isometry().compose(&after);
            self.upd[i] = desired.compose(&step).compose(&desired_inv);
        }

        Normalizers {
            tra: eta_tra,
            rot: eta_rot,
        }
    }

    /// Translation-only allocation, the second stratified pass.
    pub(crate) fn interpolate_translation(
        &mut self,
        residual: &Pose,
        closure: &LoopClosure,
        global_normalizer: f64,
    ) -> Normalizers {
        let (start, end) = (closure.start, closure.end);
        let tra = *residual.translation();

        let interior: f64 = self.tra_info[start + 1..=end].iter().sum();
        let eta_tra = 1.0 / (1.0 + interior / closure.tra_info);
        let tra_denom = global_normalizer * (interior + closure.tra_info);

        let desired = closure.constraint;
        let desired_inv = desired.inverse_isometry();
        for i in start + 1..=end {
            let motion = Pose::from_translation(tra * (self.tra_info[i] / tra_denom));
            self.upd[i] = desired.compose(&motion).compose(&desired_inv);
        }

        Normalizers {
            tra: eta_tra,
            rot: 0.0,
        }
    }

    /// Rotation-only allocation, the first stratified pass. Writes only
    /// the rotation blocks of the update slots.
    pub(crate) fn interpolate_rotation(
        &mut self,
        residual: &Pose,
        closure: &LoopClosure,
        global_normalizer: f64,
    ) -> Normalizers {
        let (start, end) = (closure.start, closure.end);
        let (angle, axis) = residual.log_rotation();

        let interior: f64 = self.rot_info[start + 1..=end].iter().sum();
        let eta_rot = 1.0 / (1.0 + interior / closure.rot_info);
        let rot_denom = global_normalizer * (interior + closure.rot_info);

        let desired_rot = *closure.constraint.rotation();
        let desired_rot_t = desired_rot.transpose();
        for i in start + 1..=end {
            let motion = Pose::from_axis_angle(&axis, angle * (self.rot_info[i] / rot_denom));
            self.upd[i].set_rotation(desired_rot * motion.rotation() * desired_rot_t);
        }

        Normalizers {
            tra: 0.0,
            rot: eta_rot,
        }
    }
}
