mod circle;
mod cube;
mod hexagon;
mod radial_segment;
mod rectangle;
mod sphere;

use std::collections::BTreeMap;

/// A fully-resolved dimension set: name -> value in cm (or radians for
/// angular dimensions, dimensionless for `mult`).
pub type DimMap = BTreeMap<&'static str, f64>;

/// The closed set of geometric primitives a component can take.
///
/// Dispatch is a plain `match` per operation; there is no open
/// registration and no reflection. Each kind declares a fixed dimension
/// list through [`ShapeKind::dimension_names`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Annular circle: `od`, `id`, `mult`.
    Circle,
    /// Hexagonal ring, flat-to-flat pitches: `op`, `ip`, `mult`.
    Hexagon,
    /// Rectangular ring: outer/inner length and width, `mult`.
    Rectangle,
    /// Spherical shell, an intrinsic 3-D shape: `od`, `id`, `mult`.
    Sphere,
    /// Rectangular prism shell, an intrinsic 3-D shape.
    Cube,
    /// Azimuthal sector of an annulus: `od`, `id`, `startTheta`,
    /// `endTheta`, `mult`.
    RadialSegment,
    /// Fills whatever the siblings leave of the container; no stored
    /// extent of its own.
    DerivedShape,
    /// A shape with a user-declared area and no closed-form boundary.
    Unshaped,
}

impl ShapeKind {
    /// Returns the display name of the shape kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Hexagon => "hexagon",
            Self::Rectangle => "rectangle",
            Self::Sphere => "sphere",
            Self::Cube => "cube",
            Self::RadialSegment => "radial segment",
            Self::DerivedShape => "derived shape",
            Self::Unshaped => "unshaped",
        }
    }

    /// Returns the fixed dimension names of this shape kind.
    #[must_use]
    pub const fn dimension_names(self) -> &'static [&'static str] {
        match self {
            Self::Circle | Self::Sphere => &["od", "id", "mult"],
            Self::Hexagon => &["op", "ip", "mult"],
            Self::Rectangle => &[
                "lengthOuter",
                "widthOuter",
                "lengthInner",
                "widthInner",
                "mult",
            ],
            Self::Cube => &[
                "lengthOuter",
                "widthOuter",
                "heightOuter",
                "lengthInner",
                "widthInner",
                "heightInner",
                "mult",
            ],
            Self::RadialSegment => &["od", "id", "startTheta", "endTheta", "mult"],
            Self::DerivedShape => &["mult"],
            Self::Unshaped => &["area", "mult"],
        }
    }

    /// Returns the subset of dimensions subject to thermal expansion.
    ///
    /// `mult` is a count and never expands; angles are invariant; a
    /// user-declared area carries no expansion model of its own.
    #[must_use]
    pub const fn expanding_dimension_names(self) -> &'static [&'static str] {
        match self {
            Self::Circle | Self::Sphere | Self::RadialSegment => &["od", "id"],
            Self::Hexagon => &["op", "ip"],
            Self::Rectangle => &["lengthOuter", "widthOuter", "lengthInner", "widthInner"],
            Self::Cube => &[
                "lengthOuter",
                "widthOuter",
                "heightOuter",
                "lengthInner",
                "widthInner",
                "heightInner",
            ],
            Self::DerivedShape | Self::Unshaped => &[],
        }
    }

    /// Returns the default value for a dimension of this kind.
    ///
    /// `mult` defaults to one physical copy; every geometric dimension
    /// defaults to zero (no inner hole, zero extent).
    #[must_use]
    pub fn default_dimension(self, name: &str) -> f64 {
        if name == "mult" {
            1.0
        } else {
            0.0
        }
    }

    /// Returns whether the dimension name is valid for this kind.
    #[must_use]
    pub fn has_dimension(self, name: &str) -> bool {
        self.dimension_names().iter().any(|&n| n == name)
    }

    /// Returns whether this dimension participates in thermal expansion.
    #[must_use]
    pub fn is_expanding_dimension(self, name: &str) -> bool {
        self.expanding_dimension_names().iter().any(|&n| n == name)
    }

    /// Returns whether the shape carries an intrinsic 3-D volume rather
    /// than an extruded cross-section.
    #[must_use]
    pub const fn is_three_dimensional(self) -> bool {
        matches!(self, Self::Sphere | Self::Cube)
    }

    /// Computes the cross-sectional area from resolved dimensions.
    ///
    /// Returns `None` for intrinsic 3-D shapes and for the derived
    /// shape, whose extent is a container remainder.
    #[must_use]
    pub fn area(self, dims: &DimMap) -> Option<f64> {
        match self {
            Self::Circle => Some(circle::area(d(dims, "od"), d(dims, "id"), d(dims, "mult"))),
            Self::Hexagon => Some(hexagon::area(d(dims, "op"), d(dims, "ip"), d(dims, "mult"))),
            Self::Rectangle => Some(rectangle::area(
                d(dims, "lengthOuter"),
                d(dims, "widthOuter"),
                d(dims, "lengthInner"),
                d(dims, "widthInner"),
                d(dims, "mult"),
            )),
            Self::RadialSegment => Some(radial_segment::area(
                d(dims, "od"),
                d(dims, "id"),
                d(dims, "startTheta"),
                d(dims, "endTheta"),
                d(dims, "mult"),
            )),
            Self::Unshaped => Some(d(dims, "area")),
            Self::Sphere | Self::Cube | Self::DerivedShape => None,
        }
    }

    /// Computes the outer-envelope area, ignoring inner holes.
    ///
    /// This is the footprint a shape claims inside its container and
    /// drives the container-capacity calculation of the derived-volume
    /// resolver. `None` for 3-D and derived shapes.
    #[must_use]
    pub fn bounding_area(self, dims: &DimMap) -> Option<f64> {
        match self {
            Self::Circle => Some(circle::area(d(dims, "od"), 0.0, d(dims, "mult"))),
            Self::Hexagon => Some(hexagon::area(d(dims, "op"), 0.0, d(dims, "mult"))),
            Self::Rectangle => Some(rectangle::area(
                d(dims, "lengthOuter"),
                d(dims, "widthOuter"),
                0.0,
                0.0,
                d(dims, "mult"),
            )),
            Self::RadialSegment => Some(radial_segment::area(
                d(dims, "od"),
                0.0,
                d(dims, "startTheta"),
                d(dims, "endTheta"),
                d(dims, "mult"),
            )),
            Self::Unshaped => Some(d(dims, "area")),
            Self::Sphere | Self::Cube | Self::DerivedShape => None,
        }
    }

    /// Computes the intrinsic volume of a 3-D shape, `None` otherwise.
    #[must_use]
    pub fn intrinsic_volume(self, dims: &DimMap) -> Option<f64> {
        match self {
            Self::Sphere => Some(sphere::volume(d(dims, "od"), d(dims, "id"), d(dims, "mult"))),
            Self::Cube => Some(cube::volume(
                d(dims, "lengthOuter"),
                d(dims, "widthOuter"),
                d(dims, "heightOuter"),
                d(dims, "lengthInner"),
                d(dims, "widthInner"),
                d(dims, "heightInner"),
                d(dims, "mult"),
            )),
            _ => None,
        }
    }
}

fn d(dims: &DimMap, name: &str) -> f64 {
    dims.get(name).copied().unwrap_or_default()
}
