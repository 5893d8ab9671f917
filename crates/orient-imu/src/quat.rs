//! Quaternion helpers used by calibration and resampling.
//!
//! These operate on raw components and do not assume unit length, since
//! sensor readings arrive un-normalized.

use glam::{DQuat, DVec3};

/// Scale `q` to unit length, or return the identity when `q` is zero.
pub fn normalize(q: DQuat) -> DQuat {
    let length = q.length();
    if length == 0.0 {
        DQuat::IDENTITY
    } else {
        q / length
    }
}

/// Component-wise linear interpolation. `t` is not clamped.
pub fn lerp(from: DQuat, to: DQuat, t: f64) -> DQuat {
    from + (to - from) * t
}

/// Rotation of `angle` radians around `axis`.
///
/// Returns `None` when `axis` has zero length.
pub fn angle_axis(axis: DVec3, angle: f64) -> Option<DQuat> {
    let axis = axis.try_normalize()?;
    Some(DQuat::from_axis_angle(axis, angle))
}

/// The rotation `r` such that `to = r * from`.
pub fn relative_rotation(to: DQuat, from: DQuat) -> DQuat {
    to * inverse(from)
}

/// Multiplicative inverse, valid for non-unit quaternions too.
fn inverse(q: DQuat) -> DQuat {
    q.conjugate() / q.length_squared()
}

/// Largest absolute per-component difference between `a` and `b`.
pub fn max_offset(a: DQuat, b: DQuat) -> f64 {
    let d = a - b;
    d.w.abs().max(d.x.abs()).max(d.y.abs()).max(d.z.abs())
}

/// Re-center a raw reading around `reference` by subtracting its vector part,
/// then renormalize.
pub fn calibrate(raw: DQuat, reference: DQuat) -> DQuat {
    normalize(DQuat::from_xyzw(
        raw.x - reference.x,
        raw.y - reference.y,
        raw.z - reference.z,
        raw.w,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    fn assert_quat_eq(a: DQuat, b: DQuat) {
        assert_abs_diff_eq!(a.w, b.w, epsilon = EPS);
        assert_abs_diff_eq!(a.x, b.x, epsilon = EPS);
        assert_abs_diff_eq!(a.y, b.y, epsilon = EPS);
        assert_abs_diff_eq!(a.z, b.z, epsilon = EPS);
    }

    #[test]
    fn normalize_zero_is_identity() {
        assert_eq!(normalize(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0)), DQuat::IDENTITY);
    }

    #[test]
    fn normalize_keeps_direction() {
        let q = DQuat::from_xyzw(1.0, 2.0, -2.0, 4.0);
        let n = normalize(q);
        assert_abs_diff_eq!(n.length(), 1.0, epsilon = EPS);
        assert_quat_eq(n * 5.0, q);
    }

    #[test]
    fn lerp_is_component_wise_and_unclamped() {
        let a = DQuat::from_xyzw(0.0, 1.0, 2.0, 1.0);
        let b = DQuat::from_xyzw(1.0, 3.0, 2.0, 0.0);
        assert_quat_eq(lerp(a, b, 0.0), a);
        assert_quat_eq(lerp(a, b, 1.0), b);
        assert_quat_eq(lerp(a, b, 0.5), DQuat::from_xyzw(0.5, 2.0, 2.0, 0.5));
        assert_quat_eq(lerp(a, b, 2.0), DQuat::from_xyzw(2.0, 5.0, 2.0, -1.0));
    }

    #[test]
    fn angle_axis_builds_rotation() {
        let q = angle_axis(DVec3::new(0.0, 0.0, 2.0), FRAC_PI_2).unwrap();
        let half = (FRAC_PI_2 / 2.0).sin();
        assert_quat_eq(q, DQuat::from_xyzw(0.0, 0.0, half, (FRAC_PI_2 / 2.0).cos()));
        assert!(angle_axis(DVec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn relative_rotation_maps_from_onto_to() {
        let from = angle_axis(DVec3::X, 0.3).unwrap();
        let to = angle_axis(DVec3::Y, -1.1).unwrap();
        let r = relative_rotation(to, from);
        assert_quat_eq(r * from, to);

        // Non-unit input still yields a true inverse.
        let scaled = from * 3.0;
        assert_quat_eq(relative_rotation(scaled, scaled), DQuat::IDENTITY);
    }

    #[test]
    fn max_offset_is_symmetric_and_zero_on_self() {
        let a = DQuat::from_xyzw(0.1, -0.4, 0.2, 0.9);
        let b = DQuat::from_xyzw(0.3, 0.1, 0.2, 0.7);
        assert_eq!(max_offset(a, a), 0.0);
        assert_abs_diff_eq!(max_offset(a, b), 0.5, epsilon = EPS);
        assert_eq!(max_offset(a, b), max_offset(b, a));
    }

    #[test]
    fn calibrate_subtracts_vector_part() {
        let raw = DQuat::from_xyzw(0.5, 0.0, 0.0, 0.5);
        let reference = DQuat::from_xyzw(0.5, 0.0, 0.0, 0.5);
        assert_eq!(calibrate(raw, reference), DQuat::IDENTITY);

        let degenerate = DQuat::from_xyzw(0.2, 0.0, 0.0, 0.0);
        assert_eq!(calibrate(degenerate, degenerate), DQuat::IDENTITY);
    }
}
