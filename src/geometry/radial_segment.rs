use std::f64::consts::TAU;

/// Cross-sectional area of an azimuthal sector of an annulus.
///
/// `start_theta`/`end_theta` are in radians; the sector covers the
/// fraction `(end - start) / 2*pi` of the full annulus.
#[must_use]
pub(crate) fn area(od: f64, id: f64, start_theta: f64, end_theta: f64, mult: f64) -> f64 {
    let annulus = std::f64::consts::PI / 4.0 * (od * od - id * id);
    annulus * (end_theta - start_theta) / TAU * mult
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn full_sweep_matches_annulus() {
        let expected = PI / 4.0 * (100.0 - 25.0);
        assert!((area(10.0, 5.0, 0.0, TAU, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn quarter_sweep_is_a_quarter() {
        let full = area(10.0, 5.0, 0.0, TAU, 1.0);
        let quarter = area(10.0, 5.0, 0.0, TAU / 4.0, 1.0);
        assert!((quarter - full / 4.0).abs() < 1e-12);
    }
}
