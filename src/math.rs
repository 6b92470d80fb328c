/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// A closed axial interval `[bottom, top]` in cm.
///
/// Used by blocks to describe their elevation range and by the mesh
/// converter to compute overlap-weighted averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxialSpan {
    /// Lower elevation in cm.
    pub bottom: f64,
    /// Upper elevation in cm.
    pub top: f64,
}

impl AxialSpan {
    /// Creates a new axial span.
    #[must_use]
    pub fn new(bottom: f64, top: f64) -> Self {
        Self { bottom, top }
    }

    /// Returns the height of the span.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Returns the length of the intersection with `other`, or `0.0`
    /// when the spans are disjoint.
    #[must_use]
    pub fn overlap(&self, other: &AxialSpan) -> f64 {
        (self.top.min(other.top) - self.bottom.max(other.bottom)).max(0.0)
    }

    /// Returns whether the span has (numerically) zero height.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.height().abs() < TOLERANCE
    }
}
