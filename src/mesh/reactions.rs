use std::collections::BTreeMap;

use crate::error::{PhysicsError, Result};
use crate::model::{params, CompositeKind, ModelStore, NodeId};
use crate::solver::XsLibrary;

/// Relative tolerance below which a negative computed rate is treated
/// as floating-point noise and clamped to zero. Anything more negative
/// is an inconsistency in the library or the state, and fatal.
const NEGATIVE_RATE_TOLERANCE: f64 = 1e-10;

/// Recomputes block reaction rates from number densities, multigroup
/// flux, and microscopic cross sections.
///
/// Blocks are grouped by cross-section label so each library lookup
/// serves every block of the group. Fission neutron production scales
/// by `1/keff`. Blocks without flux and nuclides absent from the
/// library are skipped with a warning; they are missing data, not
/// defects.
pub struct ComputeReactionRates<'a> {
    root: NodeId,
    library: &'a dyn XsLibrary,
    keff: f64,
}

impl<'a> ComputeReactionRates<'a> {
    /// Creates the operation for a subtree and a converged keff.
    #[must_use]
    pub fn new(root: NodeId, library: &'a dyn XsLibrary, keff: f64) -> Self {
        Self {
            root,
            library,
            keff,
        }
    }

    /// Executes the operation, writing `rateAbs`, `rateFis`, `rateCap`,
    /// `rateN2n`, `rateProdFis`, and `rateProdN2n` onto each block.
    ///
    /// # Errors
    ///
    /// Returns an error when keff is non-positive or a computed rate is
    /// negative beyond floating-point noise.
    pub fn execute(&self, store: &mut ModelStore) -> Result<()> {
        if self.keff <= 0.0 {
            return Err(PhysicsError::NonPositiveKeff { keff: self.keff }.into());
        }

        let mut by_label: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut nodes = vec![self.root];
        nodes.extend(store.descendants(self.root));
        for node in nodes {
            if store.composite_kind(node) == Some(CompositeKind::Block) {
                let label = store.param_text(node, params::XS_TYPE).unwrap_or("").to_string();
                by_label.entry(label).or_default().push(node);
            }
        }

        for (label, blocks) in by_label {
            for block in blocks {
                self.compute_block(store, block, &label)?;
            }
        }
        Ok(())
    }

    fn compute_block(&self, store: &mut ModelStore, block: NodeId, label: &str) -> Result<()> {
        let Some(flux) = store.param_vec(block, params::MG_FLUX).map(<[f64]>::to_vec) else {
            log::warn!(
                "block '{}' has no multigroup flux; skipping reaction rates",
                store.name(block)
            );
            return Ok(());
        };

        let densities = store.number_densities(block)?;
        let mut capture = RateTally::default();
        let mut fission = RateTally::default();
        let mut n2n = RateTally::default();
        let mut production = RateTally::default();
        for (nuclide, density) in densities {
            let Some(xs) = self.library.micro_xs(&nuclide, label) else {
                log::warn!("nuclide '{nuclide}' not in library for label '{label}'; skipping");
                continue;
            };
            for (group, &phi) in flux.iter().enumerate() {
                let sigma_c = xs.capture.get(group).copied().unwrap_or_default();
                let sigma_f = xs.fission.get(group).copied().unwrap_or_default();
                let sigma_n2n = xs.n2n.get(group).copied().unwrap_or_default();
                let nu = xs.neutrons_per_fission.get(group).copied().unwrap_or_default();
                // Densities in atoms/b-cm and cross sections in barns
                // cancel to reactions/cm^3/s directly.
                capture.add(density * phi * sigma_c);
                fission.add(density * phi * sigma_f);
                n2n.add(density * phi * sigma_n2n);
                production.add(density * phi * sigma_f * nu);
            }
        }

        let name = store.name(block).to_string();
        let capture = capture.finalize(&name, "capture")?;
        let fission = fission.finalize(&name, "fission")?;
        let n2n = n2n.finalize(&name, "n2n")?;
        let production = production.finalize(&name, "fission production")? / self.keff;

        store.set_param(block, params::RATE_CAP, capture);
        store.set_param(block, params::RATE_FIS, fission);
        store.set_param(block, params::RATE_N2N, n2n);
        store.set_param(block, params::RATE_ABS, capture + fission + n2n);
        store.set_param(block, params::RATE_PROD_FIS, production);
        store.set_param(block, params::RATE_PROD_N2N, 2.0 * n2n);
        Ok(())
    }
}

/// Accumulates rate terms alongside their magnitude, so a final
/// negative value can be judged against the scale of what went in.
#[derive(Debug, Default, Clone, Copy)]
struct RateTally {
    value: f64,
    scale: f64,
}

impl RateTally {
    fn add(&mut self, term: f64) {
        self.value += term;
        self.scale += term.abs();
    }

    fn finalize(self, block: &str, rate_name: &'static str) -> Result<f64> {
        if self.value >= 0.0 {
            return Ok(self.value);
        }
        if -self.value <= NEGATIVE_RATE_TOLERANCE * self.scale.max(1.0) {
            return Ok(0.0);
        }
        Err(PhysicsError::NegativeReactionRate {
            block: block.to_string(),
            rate_name,
            value: self.value,
        }
        .into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::ShapeKind;
    use crate::material::LinearExpansionMaterial;
    use crate::model::{ComponentSpec, CompositeKind, RegionFlags};
    use crate::solver::{MapXsLibrary, MicroXs};
    use std::sync::Arc;

    fn fueled_assembly(store: &mut ModelStore) -> (NodeId, NodeId) {
        let assembly = store.add_composite(None, CompositeKind::Assembly, "a0001");
        let block = store.add_block(assembly, "b0001", 100.0, "AA", RegionFlags::default());
        store
            .add_component(
                block,
                ComponentSpec::new(
                    "mix",
                    ShapeKind::Unshaped,
                    Arc::new(LinearExpansionMaterial::new("smeared mix", 0.0)),
                )
                .with_dim("area", 10.0)
                .with_number_density("U235", 0.01),
            )
            .unwrap();
        store.update_elevations(assembly, 0.0).unwrap();
        (assembly, block)
    }

    fn u235_library() -> MapXsLibrary {
        let mut library = MapXsLibrary::new();
        library.insert(
            "U235",
            "AA",
            MicroXs {
                capture: vec![0.5],
                fission: vec![1.9],
                n2n: vec![0.01],
                neutrons_per_fission: vec![2.43],
            },
        );
        library
    }

    #[test]
    fn one_group_rates_are_dot_products() {
        let mut store = ModelStore::new();
        let (assembly, block) = fueled_assembly(&mut store);
        store.set_param_vec(block, params::MG_FLUX, vec![1.0e14]);
        let library = u235_library();

        ComputeReactionRates::new(assembly, &library, 1.2)
            .execute(&mut store)
            .unwrap();

        let fis = store.param_f64(block, params::RATE_FIS).unwrap();
        assert!((fis - 0.01 * 1.0e14 * 1.9).abs() < 1.0);
        let cap = store.param_f64(block, params::RATE_CAP).unwrap();
        assert!((cap - 0.01 * 1.0e14 * 0.5).abs() < 1.0);
        let abs = store.param_f64(block, params::RATE_ABS).unwrap();
        let n2n = store.param_f64(block, params::RATE_N2N).unwrap();
        assert!((abs - (fis + cap + n2n)).abs() < 1.0);
        // Production carries nu and the 1/keff scaling.
        let prod = store.param_f64(block, params::RATE_PROD_FIS).unwrap();
        assert!((prod - fis * 2.43 / 1.2).abs() < 1.0);
        let prod_n2n = store.param_f64(block, params::RATE_PROD_N2N).unwrap();
        assert!((prod_n2n - 2.0 * n2n).abs() < 1.0);
    }

    #[test]
    fn missing_flux_skips_the_block() {
        let mut store = ModelStore::new();
        let (assembly, block) = fueled_assembly(&mut store);
        let library = u235_library();
        ComputeReactionRates::new(assembly, &library, 1.0)
            .execute(&mut store)
            .unwrap();
        assert!(store.param_f64(block, params::RATE_FIS).is_none());
    }

    #[test]
    fn unknown_nuclide_is_skipped() {
        let mut store = ModelStore::new();
        let (assembly, block) = fueled_assembly(&mut store);
        store.set_param_vec(block, params::MG_FLUX, vec![1.0e14]);
        let library = MapXsLibrary::new();
        ComputeReactionRates::new(assembly, &library, 1.0)
            .execute(&mut store)
            .unwrap();
        assert!(store.param_f64(block, params::RATE_FIS).unwrap().abs() < 1e-12);
    }

    #[test]
    fn substantially_negative_rate_is_fatal() {
        let mut store = ModelStore::new();
        let (assembly, block) = fueled_assembly(&mut store);
        store.set_param_vec(block, params::MG_FLUX, vec![1.0e14]);
        let mut library = MapXsLibrary::new();
        library.insert(
            "U235",
            "AA",
            MicroXs {
                capture: vec![-0.5],
                fission: vec![1.9],
                n2n: vec![0.0],
                neutrons_per_fission: vec![2.43],
            },
        );
        assert!(ComputeReactionRates::new(assembly, &library, 1.0)
            .execute(&mut store)
            .is_err());
    }

    #[test]
    fn non_positive_keff_is_fatal() {
        let mut store = ModelStore::new();
        let (assembly, _) = fueled_assembly(&mut store);
        let library = u235_library();
        assert!(ComputeReactionRates::new(assembly, &library, 0.0)
            .execute(&mut store)
            .is_err());
    }
}
