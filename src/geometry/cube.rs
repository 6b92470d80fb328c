/// Volume of a rectangular prism shell.
///
/// An intrinsic 3-D shape with its own height dimension, independent of
/// the parent container.
#[must_use]
pub(crate) fn volume(
    length_outer: f64,
    width_outer: f64,
    height_outer: f64,
    length_inner: f64,
    width_inner: f64,
    height_inner: f64,
    mult: f64,
) -> f64 {
    (length_outer * width_outer * height_outer - length_inner * width_inner * height_inner) * mult
}
