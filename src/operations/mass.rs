use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::math::TOLERANCE;
use crate::model::{ModelStore, NodeId, NodeKind};
use crate::nuclide;

impl ModelStore {
    /// Computes the mass of a node in grams.
    ///
    /// Sums `density * atomic mass * volume` over the node's nuclides,
    /// restricted to `nuclide_filter` when given. Volume is divided by
    /// the applicable symmetry factor, so a block sitting on a 1/3-core
    /// boundary reports its in-model mass. Nuclides missing from the
    /// atomic-mass table are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error when a volume computation fails.
    pub fn mass(&mut self, id: NodeId, nuclide_filter: Option<&[&str]>) -> Result<f64> {
        if matches!(self.node(id)?.kind(), NodeKind::Composite(_)) {
            let mut total = 0.0;
            for child in self.children(id).to_vec() {
                total += self.mass(child, nuclide_filter)?;
            }
            return Ok(total);
        }
        let volume = self.volume(id)? / self.symmetry_factor(id);
        let comp = self.component(id)?;
        let mut mass = 0.0;
        for (name, &density) in comp.number_densities() {
            if let Some(filter) = nuclide_filter {
                if !filter.contains(&name.as_str()) {
                    continue;
                }
            }
            match nuclide::mass_density(name, density) {
                Some(rho) => mass += rho * volume,
                None => {
                    log::warn!("nuclide '{name}' not in the atomic-mass table; skipping its mass");
                }
            }
        }
        Ok(mass)
    }

    /// Computes the mass density of a node in g/cm^3, zero for a node
    /// with no volume.
    ///
    /// # Errors
    ///
    /// Returns an error when mass or volume fail to compute.
    pub fn density(&mut self, id: NodeId) -> Result<f64> {
        let volume = self.volume(id)? / self.symmetry_factor(id);
        if volume.abs() < TOLERANCE {
            return Ok(0.0);
        }
        Ok(self.mass(id, None)? / volume)
    }

    /// Returns the homogenized number densities of a node in
    /// atoms/(barn*cm).
    ///
    /// For a component this is its own density map; for a composite it
    /// is the volume-weighted average over every descendant component.
    ///
    /// # Errors
    ///
    /// Returns an error when a volume computation fails.
    pub fn number_densities(&mut self, id: NodeId) -> Result<BTreeMap<String, f64>> {
        if matches!(self.node(id)?.kind(), NodeKind::Component(_)) {
            return Ok(self.component(id)?.number_densities().clone());
        }
        let leaves = self.component_leaves(id);
        let mut total_volume = 0.0;
        let mut accumulated: BTreeMap<String, f64> = BTreeMap::new();
        for &leaf in &leaves {
            let volume = self.volume(leaf)?;
            total_volume += volume;
            for (name, &density) in self.component(leaf)?.number_densities() {
                *accumulated.entry(name.clone()).or_default() += density * volume;
            }
        }
        if total_volume.abs() < TOLERANCE {
            return Ok(BTreeMap::new());
        }
        for value in accumulated.values_mut() {
            *value /= total_volume;
        }
        Ok(accumulated)
    }

    /// Returns the homogenized number density of one nuclide.
    ///
    /// # Errors
    ///
    /// Returns an error when a volume computation fails.
    pub fn number_density(&mut self, id: NodeId, nuclide: &str) -> Result<f64> {
        Ok(self.number_densities(id)?.get(nuclide).copied().unwrap_or_default())
    }

    /// Sets the homogenized number density of one nuclide on a subtree.
    ///
    /// The requested value is de-homogenized into the components that
    /// already carry the nuclide: each receives `value` divided by the
    /// carriers' combined volume fraction, so the composite-level
    /// density matches the request while other nuclides' distributions
    /// stay untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when the nuclide exists nowhere in the subtree
    /// and a non-zero value is requested, or a volume fails to compute.
    pub fn set_number_density(&mut self, id: NodeId, nuclide: &str, value: f64) -> Result<()> {
        if matches!(self.node(id)?.kind(), NodeKind::Component(_)) {
            return self.set_component_number_density(id, nuclide, value);
        }
        let carriers: Vec<NodeId> = self
            .component_leaves(id)
            .into_iter()
            .filter(|&leaf| {
                self.component(leaf)
                    .map(|c| c.number_densities().contains_key(nuclide))
                    .unwrap_or(false)
            })
            .collect();
        if carriers.is_empty() {
            if value.abs() < TOLERANCE {
                return Ok(());
            }
            return Err(ModelError::NuclideNotFound {
                node: self.name(id).to_string(),
                nuclide: nuclide.to_string(),
            }
            .into());
        }
        let total_volume = self.volume(id)?;
        let mut carrier_volume = 0.0;
        for &carrier in &carriers {
            carrier_volume += self.volume(carrier)?;
        }
        if carrier_volume.abs() < TOLERANCE {
            return Err(ModelError::ZeroWeightSum {
                node: self.name(id).to_string(),
                param: "volume".to_string(),
            }
            .into());
        }
        let dehomogenized = value * total_volume / carrier_volume;
        for &carrier in &carriers {
            self.set_component_number_density(carrier, nuclide, dehomogenized)?;
        }
        Ok(())
    }

    /// Sets several homogenized number densities at once.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as
    /// [`ModelStore::set_number_density`].
    pub fn set_number_densities(
        &mut self,
        id: NodeId,
        densities: &BTreeMap<String, f64>,
    ) -> Result<()> {
        for (nuclide, &value) in densities {
            self.set_number_density(id, nuclide, value)?;
        }
        Ok(())
    }

    /// Returns every descendant component of a node (or the node itself
    /// when it is a component).
    #[must_use]
    pub fn component_leaves(&self, id: NodeId) -> Vec<NodeId> {
        let is_component = |n: NodeId| {
            self.node(n)
                .map(|data| matches!(data.kind(), NodeKind::Component(_)))
                .unwrap_or(false)
        };
        if is_component(id) {
            return vec![id];
        }
        self.descendants(id)
            .into_iter()
            .filter(|&n| is_component(n))
            .collect()
    }
}
