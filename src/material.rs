use std::collections::BTreeMap;
use std::fmt;

/// Capability interface for material property models.
///
/// The kernel treats materials as opaque strategy objects: thermal
/// expansion correlations, reference densities, and isotopic makeup all
/// live behind this trait and are supplied by the host application.
/// Temperatures are in degrees Celsius throughout.
pub trait Material: fmt::Debug {
    /// Returns the material name.
    fn name(&self) -> &str;

    /// Returns the linear thermal expansion fraction `dL/L` between the
    /// reference temperature `t0` and the evaluation temperature `tc`.
    ///
    /// A dimension measured cold at `t0` scales by
    /// `1 + linear_expansion_factor(tc, t0)` when heated to `tc`.
    fn linear_expansion_factor(&self, tc: f64, t0: f64) -> f64;

    /// Returns the reference mass density in g/cm^3 at temperature `tc`.
    fn density(&self, tc: f64) -> f64;

    /// Returns the mass fractions of the material's constituent nuclides.
    fn mass_fractions(&self) -> BTreeMap<String, f64>;

    /// Returns whether the material is a void or gap.
    ///
    /// Void components are allowed negative extent, representing
    /// deliberate overlap corrections between solid neighbors.
    fn is_void(&self) -> bool {
        false
    }
}

/// A material with a constant linear expansion coefficient.
///
/// Sufficient for structural alloys over moderate temperature ranges,
/// and the standard stand-in when a host does not supply its own
/// property correlations.
#[derive(Debug, Clone)]
pub struct LinearExpansionMaterial {
    name: String,
    /// Linear expansion coefficient in 1/degC.
    alpha: f64,
    reference_density: f64,
    mass_fractions: BTreeMap<String, f64>,
}

impl LinearExpansionMaterial {
    /// Creates a material with the given expansion coefficient (1/degC).
    #[must_use]
    pub fn new(name: &str, alpha: f64) -> Self {
        Self {
            name: name.to_string(),
            alpha,
            reference_density: 0.0,
            mass_fractions: BTreeMap::new(),
        }
    }

    /// Sets the reference density in g/cm^3.
    #[must_use]
    pub fn with_density(mut self, density: f64) -> Self {
        self.reference_density = density;
        self
    }

    /// Sets the constituent mass fractions.
    #[must_use]
    pub fn with_mass_fractions(mut self, fractions: BTreeMap<String, f64>) -> Self {
        self.mass_fractions = fractions;
        self
    }
}

impl Material for LinearExpansionMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn linear_expansion_factor(&self, tc: f64, t0: f64) -> f64 {
        self.alpha * (tc - t0)
    }

    fn density(&self, tc: f64) -> f64 {
        // Mass conservation under isotropic expansion of the reference cube.
        let f = 1.0 + self.linear_expansion_factor(tc, 20.0);
        self.reference_density / (f * f * f)
    }

    fn mass_fractions(&self) -> BTreeMap<String, f64> {
        self.mass_fractions.clone()
    }
}

/// A void or gap material: no mass, no expansion, negative extent allowed.
#[derive(Debug, Clone)]
pub struct VoidMaterial {
    name: String,
}

impl VoidMaterial {
    /// Creates a void material with the conventional name `"Void"`.
    #[must_use]
    pub fn new() -> Self {
        Self::named("Void")
    }

    /// Creates a void material with a custom name (e.g. `"Gap"`).
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for VoidMaterial {
    fn default() -> Self {
        Self::new()
    }
}

impl Material for VoidMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn linear_expansion_factor(&self, _tc: f64, _t0: f64) -> f64 {
        0.0
    }

    fn density(&self, _tc: f64) -> f64 {
        0.0
    }

    fn mass_fractions(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    fn is_void(&self) -> bool {
        true
    }
}
