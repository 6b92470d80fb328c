/// Cross-sectional area of a rectangular ring.
#[must_use]
pub(crate) fn area(
    length_outer: f64,
    width_outer: f64,
    length_inner: f64,
    width_inner: f64,
    mult: f64,
) -> f64 {
    (length_outer * width_outer - length_inner * width_inner) * mult
}
