//! Forward kinematics: placement queries on a serial chain.
//!
//! Placements are computed as a local product of transforms, one fixed
//! offset and one rotation per joint. A frame that sits on a joint's own
//! rotation axis therefore keeps a bitwise-identical translation when that
//! joint moves; nothing is recomputed in a way that could reintroduce
//! rounding.

use crate::lie::SE3;
use crate::robot::{Config, SerialChain};

impl<const N: usize> SerialChain<N> {
    /// Pose of the `frame`-th joint frame, `frame` in `1..=N`, after that
    /// joint's rotation.
    ///
    /// # Panics
    ///
    /// Panics when `frame` is outside `1..=N`.
    pub fn placement(&self, q: &Config<N>, frame: usize) -> SE3 {
        assert!(
            (1..=N).contains(&frame),
            "frame index {frame} out of range 1..={N}"
        );
        let mut pose = SE3::identity();
        for (i, joint) in self.joints.iter().take(frame).enumerate() {
            pose = pose * joint.origin * SE3::rotation_axis(&joint.axis, q[i]);
        }
        pose
    }

    /// Pose of the tip link frame: the last joint frame times the chain's
    /// fixed tail.
    pub fn tip_placement(&self, q: &Config<N>) -> SE3 {
        self.placement(q, N) * self.tail
    }

    /// Poses of all `N` joint frames in one pass, base first.
    pub fn joint_placements(&self, q: &Config<N>) -> [SE3; N] {
        let mut placements = [SE3::identity(); N];
        let mut pose = SE3::identity();
        for (i, joint) in self.joints.iter().enumerate() {
            pose = pose * joint.origin * SE3::rotation_axis(&joint.axis, q[i]);
            placements[i] = pose;
        }
        placements
    }
}
