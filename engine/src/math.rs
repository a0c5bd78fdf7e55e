use glam::{Mat4, Quat, Vec3, Vec4};

/// Per-component lerp of a keyframe rotation stored as axis-angle in a Vec4
/// (xyz = axis, w = angle). This is intentionally NOT a slerp: retargeted
/// clips are authored against component interpolation and large-delta frames
/// would drift if we switched the scheme.
pub fn lerp_vec4(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    a + (b - a) * t
}

pub trait QuatExt {
    fn nlerp(self, other: Quat, t: f32) -> Quat;
    fn slerp_shortest(self, other: Quat, t: f32) -> Quat;
    fn from_rotation_mat4(m: &Mat4) -> Quat;
}

impl QuatExt for Quat {
    #[inline]
    fn nlerp(self, other: Quat, t: f32) -> Quat {
        let mut b = other;
        if self.dot(other) < 0.0 {
            b = -b;
        }
        (self * (1.0 - t) + b * t).normalize()
    }

    fn slerp_shortest(self, other: Quat, t: f32) -> Quat {
        let mut dot = self.dot(other);
        let mut b = other;
        if dot < 0.0 {
            dot = -dot;
            b = -b;
        }

        // Nearly parallel: 1/sin(theta) blows up, fall back to nlerp.
        const DOT_THRESHOLD: f32 = 0.9995;
        if dot > DOT_THRESHOLD {
            return self.nlerp(b, t);
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0;
        self * s0 + b * s1
    }

    fn from_rotation_mat4(m: &Mat4) -> Quat {
        // Row-major accessor over glam's column storage: r(row, col).
        let c = m.to_cols_array_2d();
        let r = |row: usize, col: usize| c[col][row];
        let trace = r(0, 0) + r(1, 1) + r(2, 2);

        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quat::from_xyzw(
                (r(2, 1) - r(1, 2)) / s,
                (r(0, 2) - r(2, 0)) / s,
                (r(1, 0) - r(0, 1)) / s,
                0.25 * s,
            )
        } else if r(0, 0) > r(1, 1) && r(0, 0) > r(2, 2) {
            let s = (1.0 + r(0, 0) - r(1, 1) - r(2, 2)).sqrt() * 2.0;
            Quat::from_xyzw(
                0.25 * s,
                (r(0, 1) + r(1, 0)) / s,
                (r(0, 2) + r(2, 0)) / s,
                (r(2, 1) - r(1, 2)) / s,
            )
        } else if r(1, 1) > r(2, 2) {
            let s = (1.0 + r(1, 1) - r(0, 0) - r(2, 2)).sqrt() * 2.0;
            Quat::from_xyzw(
                (r(0, 1) + r(1, 0)) / s,
                0.25 * s,
                (r(1, 2) + r(2, 1)) / s,
                (r(0, 2) - r(2, 0)) / s,
            )
        } else {
            let s = (1.0 + r(2, 2) - r(0, 0) - r(1, 1)).sqrt() * 2.0;
            Quat::from_xyzw(
                (r(0, 2) + r(2, 0)) / s,
                (r(1, 2) + r(2, 1)) / s,
                0.25 * s,
                (r(1, 0) - r(0, 1)) / s,
            )
        }
    }
}

pub trait Mat4Ext {
    fn inverse_or_max(&self) -> Mat4;
    fn rotation_only(&self) -> Mat4;
    fn extract_scale(&self) -> Vec3;
    fn strip_scale(&self) -> Mat4;
    fn to_axis_angle(&self) -> (Vec3, f32);
    fn translation_vec3(&self) -> Vec3;
    fn approx_eq(&self, other: &Mat4, tolerance: f32) -> bool;
}

impl Mat4Ext for Mat4 {
    /// General inverse. A near-singular matrix does not error: every entry of
    /// the result is `f32::MAX`, so callers must never assume an inverse is
    /// well formed.
    fn inverse_or_max(&self) -> Mat4 {
        let det = self.determinant();
        if det.abs() < 1.0e-20 {
            return Mat4::from_cols_array(&[f32::MAX; 16]);
        }
        self.inverse()
    }

    /// Same rotation/scale basis with the translation column zeroed.
    fn rotation_only(&self) -> Mat4 {
        let mut m = *self;
        m.w_axis = Vec4::new(0.0, 0.0, 0.0, 1.0);
        m
    }

    fn extract_scale(&self) -> Vec3 {
        Vec3::new(
            self.x_axis.truncate().length(),
            self.y_axis.truncate().length(),
            self.z_axis.truncate().length(),
        )
    }

    /// Divides each basis column by its length, removing any scale baked into
    /// the bind pose.
    fn strip_scale(&self) -> Mat4 {
        let scale = self.extract_scale();
        *self * Mat4::from_scale(Vec3::new(1.0 / scale.x, 1.0 / scale.y, 1.0 / scale.z))
    }

    /// Axis-angle of the rotation part. Three cases: identity (axis is
    /// arbitrary, +X by convention), angle near pi (the off-diagonal
    /// difference formula degenerates, use the largest diagonal term), and
    /// the general case.
    fn to_axis_angle(&self) -> (Vec3, f32) {
        let c = self.to_cols_array_2d();
        let r = |row: usize, col: usize| c[col][row];
        let trace = r(0, 0) + r(1, 1) + r(2, 2);
        let angle = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos();

        if angle.abs() < 1.0e-6 {
            return (Vec3::X, angle);
        }

        if (angle - std::f32::consts::PI).abs() <= 1.0e-3 {
            let diag = [r(0, 0), r(1, 1), r(2, 2)];
            let mut axis = Vec3::ZERO;
            for i in 0..3 {
                let j = (i + 1) % 3;
                let k = (i + 2) % 3;
                if diag[i] >= diag[j] && diag[i] >= diag[k] {
                    let denom = (1.0 + diag[i] - diag[j] - diag[k]).sqrt();
                    axis[i] = denom / 2.0;
                    axis[j] = (r(i, j) + r(j, i)) / (2.0 * denom);
                    axis[k] = (r(i, k) + r(k, i)) / (2.0 * denom);
                    break;
                }
            }
            return (axis, angle);
        }

        let inv_denom = 1.0 / (2.0 * angle.sin());
        let axis = Vec3::new(
            (r(2, 1) - r(1, 2)) * inv_denom,
            (r(0, 2) - r(2, 0)) * inv_denom,
            (r(1, 0) - r(0, 1)) * inv_denom,
        );
        (axis, angle)
    }

    fn translation_vec3(&self) -> Vec3 {
        self.w_axis.truncate()
    }

    fn approx_eq(&self, other: &Mat4, tolerance: f32) -> bool {
        let a = self.to_cols_array();
        let b = other.to_cols_array();
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inverse_round_trips_to_identity() {
        let m = Mat4::from_translation(Vec3::new(1.0, -2.0, 3.5))
            * Mat4::from_rotation_y(0.7)
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 1.5));
        let product = m * m.inverse_or_max();
        assert!(product.approx_eq(&Mat4::IDENTITY, 1.0e-4));
    }

    #[test]
    fn singular_inverse_is_max_sentinel() {
        let singular = Mat4::from_scale(Vec3::new(0.0, 1.0, 1.0));
        let inv = singular.inverse_or_max();
        for entry in inv.to_cols_array() {
            assert_eq!(entry, f32::MAX);
        }
    }

    #[test]
    fn slerp_endpoints() {
        let q0 = Quat::from_rotation_y(0.3);
        let q1 = Quat::from_rotation_z(1.4);
        let at0 = q0.slerp_shortest(q1, 0.0);
        let at1 = q0.slerp_shortest(q1, 1.0);
        assert!(q0.dot(at0).abs() > 1.0 - 1.0e-3);
        assert!(q1.dot(at1).abs() > 1.0 - 1.0e-3);
    }

    #[test]
    fn slerp_of_nearly_parallel_quats_is_finite() {
        let q0 = Quat::from_rotation_x(0.5);
        let q1 = Quat::from_rotation_x(0.5001);
        let mid = q0.slerp_shortest(q1, 0.5);
        assert!(mid.is_finite());
        assert_relative_eq!(mid.length(), 1.0, epsilon = 1.0e-4);
    }

    #[test]
    fn slerp_takes_shortest_path() {
        let q0 = Quat::from_rotation_y(0.2);
        let q1 = -Quat::from_rotation_y(0.4);
        let mid = q0.slerp_shortest(q1, 0.5);
        let expected = Quat::from_rotation_y(0.3);
        assert!(mid.dot(expected).abs() > 1.0 - 1.0e-4);
    }

    #[test]
    fn axis_angle_general_case() {
        let m = Mat4::from_axis_angle(Vec3::Z, 1.2);
        let (axis, angle) = m.to_axis_angle();
        assert_relative_eq!(angle, 1.2, epsilon = 1.0e-5);
        assert_relative_eq!(axis.z, 1.0, epsilon = 1.0e-5);
    }

    #[test]
    fn axis_angle_identity_case() {
        let (axis, angle) = Mat4::IDENTITY.to_axis_angle();
        assert_eq!(axis, Vec3::X);
        assert_relative_eq!(angle, 0.0);
    }

    #[test]
    fn axis_angle_near_pi_case() {
        let m = Mat4::from_axis_angle(Vec3::Y, std::f32::consts::PI - 1.0e-4);
        let (axis, angle) = m.to_axis_angle();
        assert_relative_eq!(angle, std::f32::consts::PI, epsilon = 1.0e-3);
        assert_relative_eq!(axis.y.abs(), 1.0, epsilon = 1.0e-3);
    }

    #[test]
    fn quat_from_matrix_round_trip() {
        for q in [
            Quat::from_rotation_x(0.4),
            Quat::from_rotation_y(2.9),
            Quat::from_axis_angle(Vec3::new(0.6, -0.64, 0.48).normalize(), 3.1),
        ] {
            let m = Mat4::from_quat(q);
            let back = Quat::from_rotation_mat4(&m);
            assert!(q.dot(back).abs() > 1.0 - 1.0e-4);
        }
    }

    #[test]
    fn strip_scale_normalizes_basis() {
        let m = Mat4::from_rotation_z(0.8) * Mat4::from_scale(Vec3::new(3.0, 0.25, 7.0));
        let stripped = m.strip_scale();
        let scale = stripped.extract_scale();
        assert_relative_eq!(scale.x, 1.0, epsilon = 1.0e-5);
        assert_relative_eq!(scale.y, 1.0, epsilon = 1.0e-5);
        assert_relative_eq!(scale.z, 1.0, epsilon = 1.0e-5);
    }
}
