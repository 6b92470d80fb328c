/// Cross-sectional area of a hexagonal ring.
///
/// `op` and `ip` are the outer and inner flat-to-flat pitches. A regular
/// hexagon of pitch `p` has area `sqrt(3)/2 * p^2`.
#[must_use]
pub(crate) fn area(op: f64, ip: f64, mult: f64) -> f64 {
    3.0_f64.sqrt() / 2.0 * (op * op - ip * ip) * mult
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn full_hexagon_area() {
        let expected = 3.0_f64.sqrt() / 2.0 * 256.0;
        assert!((area(16.0, 0.0, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn hex_ring_area() {
        let expected = 3.0_f64.sqrt() / 2.0 * (256.0 - 225.0);
        assert!((area(16.0, 15.0, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn ring_is_outer_minus_inner() {
        let ring = area(16.0, 15.0, 1.0);
        let outer = area(16.0, 0.0, 1.0);
        let inner = area(15.0, 0.0, 1.0);
        assert!((ring - (outer - inner)).abs() < 1e-12);
    }
}
