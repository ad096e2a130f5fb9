//! Conversion between decomposed component transforms and affine matrices.

use kurbo::{Affine, Vec2};

use crate::classes::DecomposedTransform;

/// The affine matrix of a decomposed transform: translate, rotate, scale and
/// skew around `t_center`.
pub fn to_affine(t: &DecomposedTransform) -> Affine {
    Affine::translate(Vec2::new(
        t.translate_x + t.t_center_x,
        t.translate_y + t.t_center_y,
    )) * Affine::rotate(t.rotation.to_radians())
        * Affine::scale_non_uniform(t.scale_x, t.scale_y)
        * Affine::skew(t.skew_x.to_radians().tan(), t.skew_y.to_radians().tan())
        * Affine::translate(Vec2::new(-t.t_center_x, -t.t_center_y))
}

/// Split an affine matrix into translation, rotation, scale and skew.
///
/// A negative `a` is folded into the x scale rather than a 180 degree
/// rotation, so horizontally mirrored components keep a zero angle.
pub fn from_affine(affine: Affine) -> DecomposedTransform {
    let [mut a, mut b, c, d, x, y] = affine.as_coeffs();
    let sx = 1f64.copysign(a);
    if sx < 0.0 {
        a *= sx;
        b *= sx;
    }
    let delta = a * d - b * c;

    let mut rotation = 0.0;
    let (mut scale_x, mut scale_y) = (0.0, 0.0);
    let (mut skew_x, mut skew_y) = (0.0, 0.0);
    if a != 0.0 || b != 0.0 {
        let r = a.hypot(b);
        rotation = if b >= 0.0 {
            (a / r).acos()
        } else {
            -(a / r).acos()
        };
        (scale_x, scale_y) = (r, delta / r);
        skew_x = ((a * c + b * d) / (r * r)).atan();
    } else if c != 0.0 || d != 0.0 {
        let s = c.hypot(d);
        rotation = std::f64::consts::FRAC_PI_2
            - if d >= 0.0 {
                (-c / s).acos()
            } else {
                -(c / s).acos()
            };
        (scale_x, scale_y) = (delta / s, s);
        skew_y = ((a * c + b * d) / (s * s)).atan();
    }

    DecomposedTransform {
        translate_x: x,
        translate_y: y,
        rotation: rotation.to_degrees(),
        scale_x: scale_x * sx,
        scale_y,
        skew_x: skew_x.to_degrees() * sx,
        skew_y: skew_y.to_degrees(),
        t_center_x: 0.0,
        t_center_y: 0.0,
    }
}

/// Round to the precision Glyphs writes.
pub(crate) fn round5(value: f64) -> f64 {
    let rounded = (value * 100_000.0).round() / 100_000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn close(a: [f64; 6], b: [f64; 6]) -> bool {
        a.iter().zip(b.iter()).all(|(a, b)| (a - b).abs() < 1e-6)
    }

    #[test]
    fn identity() {
        let t = DecomposedTransform::default();
        assert_eq!(to_affine(&t), Affine::IDENTITY);
        assert_eq!(from_affine(Affine::IDENTITY), t);
    }

    #[test]
    fn mirrored_component_keeps_zero_angle() {
        let t = from_affine(Affine::new([-1.0, 0.0, 0.0, 1.0, 500.0, 0.0]));
        assert_eq!(t.rotation, 0.0);
        assert_eq!(t.scale_x, -1.0);
        assert_eq!(t.scale_y, 1.0);
        assert_eq!(t.translate_x, 500.0);
    }

    #[test]
    fn rotation_and_scale() {
        let t = DecomposedTransform {
            translate_x: 10.0,
            translate_y: 20.0,
            rotation: 30.0,
            scale_x: 2.0,
            scale_y: 0.5,
            ..Default::default()
        };
        let round_tripped = from_affine(to_affine(&t));
        assert!((round_tripped.rotation - 30.0).abs() < 1e-9);
        assert!((round_tripped.scale_x - 2.0).abs() < 1e-9);
        assert!((round_tripped.scale_y - 0.5).abs() < 1e-9);
        assert!(round_tripped.skew_x.abs() < 1e-9);
    }

    #[test]
    fn center_is_folded_into_translation() {
        let t = DecomposedTransform {
            rotation: 180.0,
            t_center_x: 50.0,
            t_center_y: 50.0,
            ..Default::default()
        };
        let affine = to_affine(&t);
        let p = affine * kurbo::Point::new(0.0, 0.0);
        assert!((p.x - 100.0).abs() < 1e-9 && (p.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn round5_clears_negative_zero() {
        assert_eq!(round5(-0.000001), 0.0);
        assert!(round5(-0.000001).is_sign_positive());
        assert_eq!(round5(1.234567), 1.23457);
    }

    proptest! {
        #[test]
        fn decomposition_rebuilds_matrix(
            a in -4.0f64..4.0,
            b in -4.0f64..4.0,
            c in -4.0f64..4.0,
            d in -4.0f64..4.0,
            x in -1000.0f64..1000.0,
            y in -1000.0f64..1000.0,
        ) {
            prop_assume!((a * d - b * c).abs() > 1e-3);
            let affine = Affine::new([a, b, c, d, x, y]);
            let rebuilt = to_affine(&from_affine(affine));
            prop_assert!(close(rebuilt.as_coeffs(), affine.as_coeffs()));
        }

        #[test]
        fn skewless_transforms_survive(
            rotation in -89.0f64..89.0,
            scale_x in 0.1f64..3.0,
            scale_y in 0.1f64..3.0,
        ) {
            let t = DecomposedTransform { rotation, scale_x, scale_y, ..Default::default() };
            let back = from_affine(to_affine(&t));
            prop_assert!((back.rotation - rotation).abs() < 1e-6);
            prop_assert!((back.scale_x - scale_x).abs() < 1e-6);
            prop_assert!((back.scale_y - scale_y).abs() < 1e-6);
            prop_assert!(back.skew_x.abs() < 1e-6);
        }

        // Past 90 degrees a negative scale is folded in, giving another
        // decomposition of the same matrix.
        #[test]
        fn wide_rotations_keep_their_matrix(
            rotation in -179.0f64..179.0,
            scale_x in 0.1f64..3.0,
            scale_y in 0.1f64..3.0,
        ) {
            let t = DecomposedTransform { rotation, scale_x, scale_y, ..Default::default() };
            let affine = to_affine(&t);
            let rebuilt = to_affine(&from_affine(affine));
            prop_assert!(close(rebuilt.as_coeffs(), affine.as_coeffs()));
        }
    }
}
