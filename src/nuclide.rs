//! Nuclide data and number-density unit constants.
//!
//! Number densities are carried in the domain's native unit,
//! atoms/(barn*cm), which equals 1e24 atoms/cm^3.

/// Avogadro's number, atoms/mol.
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Conversion between mol/cm^3 and atoms/(barn*cm):
/// `N [atoms/b-cm] = n [mol/cm^3] * MOLES_PER_CC_TO_ATOMS_PER_BARN_CM`.
///
/// Equal to Avogadro's number times 1e-24.
pub const MOLES_PER_CC_TO_ATOMS_PER_BARN_CM: f64 = 0.602_214_076;

/// Atomic masses (g/mol) for the nuclides the kernel commonly sees.
///
/// A static table, populated once; unknown nuclides are reported to the
/// caller as `None` and handled per the missing-data policy (skip the
/// affected nuclide, never panic).
const ATOMIC_MASSES: &[(&str, f64)] = &[
    ("H1", 1.007_825),
    ("B10", 10.012_937),
    ("B11", 11.009_305),
    ("C12", 12.0),
    ("O16", 15.994_915),
    ("NA23", 22.989_769),
    ("SI28", 27.976_927),
    ("CR52", 51.940_506),
    ("MN55", 54.938_044),
    ("FE56", 55.934_936),
    ("NI58", 57.935_342),
    ("MO98", 97.905_405),
    ("ZR90", 89.904_697),
    ("U234", 234.040_950),
    ("U235", 235.043_928),
    ("U236", 236.045_566),
    ("U238", 238.050_787),
    ("PU238", 238.049_558),
    ("PU239", 239.052_162),
    ("PU240", 240.053_812),
    ("PU241", 241.056_851),
    ("AM241", 241.056_827),
];

/// Returns the atomic mass (g/mol) of a nuclide, or `None` when the
/// nuclide is not in the table.
#[must_use]
pub fn atomic_mass(name: &str) -> Option<f64> {
    ATOMIC_MASSES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, mass)| *mass)
}

/// Converts a number density (atoms/b-cm) of one nuclide to a partial
/// mass density (g/cm^3), or `None` when the nuclide is unknown.
#[must_use]
pub fn mass_density(name: &str, number_density: f64) -> Option<f64> {
    atomic_mass(name).map(|a| number_density * a / MOLES_PER_CC_TO_ATOMS_PER_BARN_CM)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_nuclide_lookup() {
        let mass = atomic_mass("U235").unwrap();
        assert!((mass - 235.043_928).abs() < 1e-6);
    }

    #[test]
    fn unknown_nuclide_lookup() {
        assert!(atomic_mass("XX999").is_none());
    }

    #[test]
    fn uranium_metal_density_roundtrip() {
        // Pure U238 at 19.1 g/cc is about 0.0483 atoms/b-cm.
        let n = 19.1 / 238.050_787 * MOLES_PER_CC_TO_ATOMS_PER_BARN_CM;
        let rho = mass_density("U238", n).unwrap();
        assert!((rho - 19.1).abs() < 1e-9);
    }
}
