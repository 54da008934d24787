//! Integration sweeps: recompute absolute poses from relative poses.

use crate::store::PoseChain;
use algebra::Pose;

impl PoseChain {
    /// Recompute `abs[i] = abs[i-1] * rel[i]` for i in (start, end].
    ///
    /// With `pin_identity` the absolute pose at `start` is swapped for
    /// identity during the sweep and restored afterwards, so the swept
    /// range ends up expressed in the segment's local frame. That is
    /// how the driver obtains the accumulated drift of a loop segment.
    pub fn integrate(&mut self, start: usize, end: usize, pin_identity: bool) {
        let pinned = if pin_identity {
            let anchor = self.abs[start];
            self.abs[start] = Pose::identity();
            Some(anchor)
        } else {
            None
        };

        for i in start + 1..=end {
            self.abs[i] = self.abs[i - 1].compose(&self.rel[i]);
        }

        if let Some(anchor) = pinned {
            self.abs[start] = anchor;
        }
    }

    /// Integration sweep that optionally re-orthonormalizes each
    /// relative rotation first. Float rotation blocks drift off SO(3)
    /// as updates accumulate; the driver schedules this once every 101
    /// closures.
    pub fn integrate_normalized(&mut self, start: usize, end: usize, normalize: bool) {
        if normalize {
            for i in start + 1..=end {
                self.rel[i].normalize_rotation();
            }
        }
        for i in start + 1..=end {
            self.abs[i] = self.abs[i - 1].compose(&self.rel[i]);
        }
    }
}
