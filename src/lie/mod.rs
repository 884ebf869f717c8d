//! Rigid transforms on SE(3) and their tangent space.
//!
//! Convention: twist vectors are [linear; angular], translation part first.

use nalgebra as na;

pub type Vec3 = na::Vector3<f64>;
pub type Mat3 = na::Matrix3<f64>;
pub type Vec6 = na::Vector6<f64>;

/// Rotation angle below which exp/log switch to their Taylor branches.
/// The closed forms divide differences like 1 - cos(θ) by powers of θ and
/// lose precision well before θ reaches the denormal range.
const SMALL_ANGLE: f64 = 1e-3;

/// Cross-product (skew-symmetric) matrix of a 3-vector.
#[inline]
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

#[inline]
fn vee(m: &Mat3) -> Vec3 {
    Vec3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)])
}

/// A rigid transform: rotation matrix plus translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// Rotation part.
    pub rot: Mat3,
    /// Translation part.
    pub trans: Vec3,
}

impl SE3 {
    /// Create from rotation matrix and translation.
    pub fn new(rot: Mat3, trans: Vec3) -> Self {
        Self { rot, trans }
    }

    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            rot: Mat3::identity(),
            trans: Vec3::zeros(),
        }
    }

    /// Pure translation.
    pub fn translation(trans: Vec3) -> Self {
        Self {
            rot: Mat3::identity(),
            trans,
        }
    }

    /// Pure rotation about the X axis.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rot: Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c),
            trans: Vec3::zeros(),
        }
    }

    /// Pure rotation about the Y axis.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rot: Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c),
            trans: Vec3::zeros(),
        }
    }

    /// Pure rotation about the Z axis.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rot: Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0),
            trans: Vec3::zeros(),
        }
    }

    /// Pure rotation about an arbitrary unit axis.
    pub fn rotation_axis(axis: &na::Unit<Vec3>, angle: f64) -> Self {
        let rot = na::Rotation3::from_axis_angle(axis, angle);
        Self {
            rot: *rot.matrix(),
            trans: Vec3::zeros(),
        }
    }

    /// From a URDF `<origin>`: fixed-axis roll/pitch/yaw plus translation.
    pub fn from_rpy_xyz(rpy: [f64; 3], xyz: [f64; 3]) -> Self {
        let rot = na::Rotation3::from_euler_angles(rpy[0], rpy[1], rpy[2]);
        Self {
            rot: *rot.matrix(),
            trans: Vec3::new(xyz[0], xyz[1], xyz[2]),
        }
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Self {
        let rt = self.rot.transpose();
        Self {
            rot: rt,
            trans: -(rt * self.trans),
        }
    }

    /// Apply to a point.
    #[inline]
    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        self.rot * p + self.trans
    }

    /// Rotation part as a unit quaternion.
    pub fn unit_quaternion(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix_unchecked(self.rot))
    }

    /// Logarithmic map: the twist whose exponential is this transform.
    ///
    /// Robust for rotations all the way to π; the rotation angle of the
    /// result is always in [0, π].
    pub fn log(&self) -> Twist {
        let ang = log_rotation(&self.rot);
        let theta = ang.norm();
        let w = skew(&ang);
        let w2 = w * w;
        let coeff = if theta < SMALL_ANGLE {
            1.0 / 12.0 + theta * theta / 720.0
        } else {
            let (s, c) = theta.sin_cos();
            1.0 / (theta * theta) - (1.0 + c) / (2.0 * theta * s)
        };
        let v_inv = Mat3::identity() - w * 0.5 + w2 * coeff;
        Twist {
            lin: v_inv * self.trans,
            ang,
        }
    }
}

impl std::ops::Mul for SE3 {
    type Output = SE3;

    #[inline]
    fn mul(self, rhs: SE3) -> SE3 {
        SE3 {
            rot: self.rot * rhs.rot,
            trans: self.rot * rhs.trans + self.trans,
        }
    }
}

/// Rotation vector of a rotation matrix (axis times angle, angle in [0, π]).
fn log_rotation(rot: &Mat3) -> Vec3 {
    let trace = rot.trace();
    if trace >= 3.0 - 1e-10 {
        // Near the identity the first-order term is accurate to O(θ³).
        vee(&(rot - rot.transpose())) * 0.5
    } else if trace <= -1.0 + 1e-8 {
        // Near π the off-diagonal formula degenerates; recover the axis
        // from the largest diagonal entry instead.
        let theta = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos();
        let k = if rot[(0, 0)] >= rot[(1, 1)] && rot[(0, 0)] >= rot[(2, 2)] {
            0
        } else if rot[(1, 1)] >= rot[(2, 2)] {
            1
        } else {
            2
        };
        let mut axis = Vec3::new(rot[(0, k)], rot[(1, k)], rot[(2, k)]);
        axis[k] += 1.0;
        axis /= (2.0 * (1.0 + rot[(k, k)])).sqrt();
        axis * theta
    } else {
        let theta = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos();
        vee(&(rot - rot.transpose())) * (theta / (2.0 * theta.sin()))
    }
}

/// An element of se(3): linear and angular velocity parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    /// Linear part.
    pub lin: Vec3,
    /// Angular part.
    pub ang: Vec3,
}

impl Twist {
    /// Create from linear and angular parts.
    pub fn new(lin: Vec3, ang: Vec3) -> Self {
        Self { lin, ang }
    }

    /// Zero twist.
    pub fn zero() -> Self {
        Self {
            lin: Vec3::zeros(),
            ang: Vec3::zeros(),
        }
    }

    /// Stacked 6-vector [linear; angular].
    #[inline]
    pub fn vector(&self) -> Vec6 {
        Vec6::new(
            self.lin.x, self.lin.y, self.lin.z, self.ang.x, self.ang.y, self.ang.z,
        )
    }

    /// Euclidean norm of the stacked 6-vector.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.vector().norm()
    }

    /// Exponential map: the rigid transform reached by following this twist
    /// for unit time.
    pub fn exp(&self) -> SE3 {
        let theta = self.ang.norm();
        let w = skew(&self.ang);
        let w2 = w * w;
        let (a, b, c) = if theta < SMALL_ANGLE {
            let t2 = theta * theta;
            (
                1.0 - t2 / 6.0,
                0.5 - t2 / 24.0,
                1.0 / 6.0 - t2 / 120.0,
            )
        } else {
            let (s, cos) = theta.sin_cos();
            let t2 = theta * theta;
            (s / theta, (1.0 - cos) / t2, (theta - s) / (t2 * theta))
        };
        let rot = Mat3::identity() + w * a + w2 * b;
        let v = Mat3::identity() + w * b + w2 * c;
        SE3 {
            rot,
            trans: v * self.lin,
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn arb_pos() -> impl Strategy<Value = Vec3> {
        (-10.0..10.0_f64, -10.0..10.0_f64, -10.0..10.0_f64)
            .prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn arb_angle() -> impl Strategy<Value = f64> {
        -3.0..3.0_f64
    }

    fn arb_unit_axis() -> impl Strategy<Value = na::Unit<Vec3>> {
        (-1.0..1.0_f64, -1.0..1.0_f64, -1.0..1.0_f64)
            .prop_filter("non-zero axis", |(x, y, z)| x * x + y * y + z * z > 0.01)
            .prop_map(|(x, y, z)| na::Unit::new_normalize(Vec3::new(x, y, z)))
    }

    fn arb_transform() -> impl Strategy<Value = SE3> {
        (arb_unit_axis(), arb_angle(), arb_pos()).prop_map(|(axis, angle, pos)| {
            SE3::translation(pos) * SE3::rotation_axis(&axis, angle)
        })
    }

    proptest! {
        #[test]
        fn compose_with_inverse_is_identity(t in arb_transform()) {
            let id = t * t.inverse();
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    prop_assert!((id.rot[(i, j)] - expected).abs() < EPS,
                        "rot[{},{}] = {}", i, j, id.rot[(i, j)]);
                }
                prop_assert!(id.trans[i].abs() < EPS, "trans[{}] = {}", i, id.trans[i]);
            }
        }

        #[test]
        fn exp_log_roundtrip(t in arb_transform()) {
            let back = t.log().exp();
            for i in 0..3 {
                for j in 0..3 {
                    prop_assert!((back.rot[(i, j)] - t.rot[(i, j)]).abs() < 1e-7,
                        "rot[{},{}]: {} vs {}", i, j, back.rot[(i, j)], t.rot[(i, j)]);
                }
                prop_assert!((back.trans[i] - t.trans[i]).abs() < 1e-6,
                    "trans[{}]: {} vs {}", i, back.trans[i], t.trans[i]);
            }
        }

        #[test]
        fn log_exp_roundtrip(lin in arb_pos(), axis in arb_unit_axis(), angle in arb_angle()) {
            let xi = Twist::new(lin, axis.into_inner() * angle);
            let back = xi.exp().log();
            for i in 0..3 {
                prop_assert!((back.lin[i] - xi.lin[i]).abs() < 1e-6,
                    "lin[{}]: {} vs {}", i, back.lin[i], xi.lin[i]);
                prop_assert!((back.ang[i] - xi.ang[i]).abs() < 1e-7,
                    "ang[{}]: {} vs {}", i, back.ang[i], xi.ang[i]);
            }
        }

        #[test]
        fn rotation_preserves_norm(axis in arb_unit_axis(), angle in arb_angle(), p in arb_pos()) {
            let t = SE3::rotation_axis(&axis, angle);
            let q = t.transform_point(&p);
            prop_assert!((q.norm() - p.norm()).abs() < EPS);
        }
    }
}
