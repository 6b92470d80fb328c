use std::f64::consts::PI;

/// Cross-sectional area of an annular circle.
///
/// `od` and `id` are outer and inner diameters; `mult` scales the area
/// by the number of physically-identical copies the component stands
/// for (e.g. the pins of a bundle).
#[must_use]
pub(crate) fn area(od: f64, id: f64, mult: f64) -> f64 {
    PI / 4.0 * (od * od - id * id) * mult
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn solid_circle_area() {
        // pi/4 * 4 = pi
        assert!((area(2.0, 0.0, 1.0) - PI).abs() < 1e-12);
    }

    #[test]
    fn annulus_area() {
        let expected = PI / 4.0 * (100.0 - 25.0);
        assert!((area(10.0, 5.0, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn multiplicity_scales_area() {
        assert!((area(2.0, 0.0, 169.0) - 169.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn inverted_diameters_give_negative_area() {
        // Negative area is meaningful for void gaps representing overlap.
        assert!(area(1.0, 2.0, 1.0) < 0.0);
    }
}
