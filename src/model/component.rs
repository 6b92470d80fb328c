use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GeometryError, ModelError, Result};
use crate::geometry::{DimMap, ShapeKind};
use crate::material::Material;
use crate::model::{ModelStore, NodeId};

/// Link resolution recursion limit.
///
/// The link graph must be acyclic by construction; this bound turns an
/// accidental cycle into an error instead of unbounded recursion.
const MAX_LINK_DEPTH: usize = 32;

/// A dimension value: either owned by this component, or a live
/// reference to another component's dimension.
///
/// Links are resolved to a node handle once, at attachment time; the
/// string form a blueprint might use is never re-parsed afterwards.
/// Cloning preserves the link as a link, so backup/restore round-trips
/// never freeze a reference into a stale scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    /// A cold (as-input) value in cm (or radians, or a count).
    Value(f64),
    /// The current value of `name` on another component.
    Link {
        /// The component owning the referenced dimension.
        node: NodeId,
        /// The referenced dimension name.
        name: &'static str,
    },
}

/// A dimension as specified at construction time, before sibling names
/// are resolved to handles.
#[derive(Debug, Clone)]
pub enum DimInput {
    /// A plain cold value.
    Value(f64),
    /// A reference to a sibling component's dimension, by sibling name.
    Link {
        /// Name of the sibling component to link against.
        component: String,
        /// Dimension name on the sibling.
        dimension: &'static str,
    },
}

/// Construction parameters for a component, as a blueprint supplies them.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    /// Component name, unique among its siblings.
    pub name: String,
    /// Geometric primitive.
    pub shape: ShapeKind,
    /// Material strategy object.
    pub material: Arc<dyn Material>,
    /// Cold/as-input reference temperature in degC.
    pub input_temperature: f64,
    /// Initial operating temperature in degC.
    pub temperature: f64,
    /// Explicit dimensions; anything omitted takes the registry default.
    pub dims: Vec<(&'static str, DimInput)>,
    /// Initial number densities, atoms/(barn*cm).
    pub number_densities: BTreeMap<String, f64>,
}

impl ComponentSpec {
    /// Creates a spec with both temperatures at 20 degC and no
    /// explicit dimensions.
    #[must_use]
    pub fn new(name: &str, shape: ShapeKind, material: Arc<dyn Material>) -> Self {
        Self {
            name: name.to_string(),
            shape,
            material,
            input_temperature: 20.0,
            temperature: 20.0,
            dims: Vec::new(),
            number_densities: BTreeMap::new(),
        }
    }

    /// Sets the input (cold) and initial operating temperatures.
    #[must_use]
    pub fn with_temperatures(mut self, input: f64, operating: f64) -> Self {
        self.input_temperature = input;
        self.temperature = operating;
        self
    }

    /// Adds a plain cold dimension value.
    #[must_use]
    pub fn with_dim(mut self, name: &'static str, value: f64) -> Self {
        self.dims.push((name, DimInput::Value(value)));
        self
    }

    /// Adds a dimension linked to a sibling component's dimension.
    #[must_use]
    pub fn with_linked_dim(
        mut self,
        name: &'static str,
        sibling: &str,
        dimension: &'static str,
    ) -> Self {
        self.dims.push((
            name,
            DimInput::Link {
                component: sibling.to_string(),
                dimension,
            },
        ));
        self
    }

    /// Adds an initial number density in atoms/(barn*cm).
    #[must_use]
    pub fn with_number_density(mut self, nuclide: &str, density: f64) -> Self {
        self.number_densities.insert(nuclide.to_string(), density);
        self
    }
}

/// Saved component state for the scoped state retainer.
#[derive(Debug, Clone)]
pub(crate) struct ComponentBackup {
    temperature: f64,
    dims: BTreeMap<&'static str, Dimension>,
    ndens: BTreeMap<String, f64>,
    cached_volume: Option<(f64, u64)>,
}

/// Leaf payload of the composite tree: one geometric primitive with a
/// material, a temperature state, dimensions, and number densities.
#[derive(Debug, Clone)]
pub struct ComponentData {
    pub(crate) shape: ShapeKind,
    pub(crate) material: Arc<dyn Material>,
    pub(crate) input_temperature: f64,
    pub(crate) temperature: f64,
    pub(crate) dims: BTreeMap<&'static str, Dimension>,
    pub(crate) ndens: BTreeMap<String, f64>,
    pub(crate) cached_volume: Option<(f64, u64)>,
    pub(crate) backups: Vec<ComponentBackup>,
}

impl ComponentData {
    /// Returns the geometric primitive kind.
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Returns the material.
    #[must_use]
    pub fn material(&self) -> &Arc<dyn Material> {
        &self.material
    }

    /// Returns the current operating temperature in degC.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Returns the cold/as-input reference temperature in degC.
    #[must_use]
    pub fn input_temperature(&self) -> f64 {
        self.input_temperature
    }

    /// Returns the number densities in atoms/(barn*cm).
    #[must_use]
    pub fn number_densities(&self) -> &BTreeMap<String, f64> {
        &self.ndens
    }

    /// Returns the raw (unresolved, unexpanded) dimension entry.
    #[must_use]
    pub fn raw_dimension(&self, name: &str) -> Option<Dimension> {
        self.dims.get(name).copied()
    }

    pub(crate) fn back_up(&mut self) {
        let backup = ComponentBackup {
            temperature: self.temperature,
            dims: self.dims.clone(),
            ndens: self.ndens.clone(),
            cached_volume: self.cached_volume,
        };
        self.backups.push(backup);
    }

    pub(crate) fn restore_backup(&mut self) {
        if let Some(backup) = self.backups.pop() {
            self.temperature = backup.temperature;
            self.dims = backup.dims;
            self.ndens = backup.ndens;
            self.cached_volume = backup.cached_volume;
        }
    }
}

impl ModelStore {
    /// Returns a dimension value in cm.
    ///
    /// Links resolve through the target component, recursively. For a
    /// thermally-expanding dimension the cold value scales by the
    /// material's expansion factor, evaluated at `tc` when given or at
    /// the component's current temperature otherwise; `cold` skips the
    /// expansion and returns the as-input value.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component, the dimension
    /// name is not declared by the shape, or link resolution exceeds
    /// the depth limit (a cycle).
    pub fn dimension(&self, id: NodeId, name: &str, tc: Option<f64>, cold: bool) -> Result<f64> {
        self.dimension_at_depth(id, name, tc, cold, 0)
    }

    fn dimension_at_depth(
        &self,
        id: NodeId,
        name: &str,
        tc: Option<f64>,
        cold: bool,
        depth: usize,
    ) -> Result<f64> {
        if depth > MAX_LINK_DEPTH {
            return Err(ModelError::LinkDepthExceeded {
                component: self.name(id).to_string(),
                dimension: name.to_string(),
            }
            .into());
        }
        let comp = self.component(id)?;
        let dim = comp.dims.get(name).copied().ok_or(GeometryError::UnknownDimension {
            shape: comp.shape.name(),
            dimension: name.to_string(),
        })?;
        match dim {
            Dimension::Link { node, name: target } => {
                self.dimension_at_depth(node, target, tc, cold, depth + 1)
            }
            Dimension::Value(value) => {
                if cold || !comp.shape.is_expanding_dimension(name) {
                    Ok(value)
                } else {
                    Ok(value * self.expansion_factor(id, tc)?)
                }
            }
        }
    }

    /// Returns `1 + dL/L` for the component, evaluated at `tc` or at
    /// its current temperature.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component.
    pub fn expansion_factor(&self, id: NodeId, tc: Option<f64>) -> Result<f64> {
        let comp = self.component(id)?;
        let t = tc.unwrap_or(comp.temperature);
        Ok(1.0 + comp.material.linear_expansion_factor(t, comp.input_temperature))
    }

    /// Resolves every dimension of a component into plain values.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component or a link fails
    /// to resolve.
    pub fn resolved_dimensions(&self, id: NodeId, tc: Option<f64>, cold: bool) -> Result<DimMap> {
        let names: Vec<&'static str> = self.component(id)?.dims.keys().copied().collect();
        let mut out = DimMap::new();
        for name in names {
            out.insert(name, self.dimension(id, name, tc, cold)?);
        }
        Ok(out)
    }

    /// Sets a dimension.
    ///
    /// `value` is interpreted as a cold value when `cold` is true, and
    /// as a hot value (deflated by the current expansion factor before
    /// storage) otherwise. When the dimension is currently a link and
    /// `retain_link` is set, the write is forwarded to the link target
    /// and the link itself is preserved; without `retain_link` the link
    /// is replaced by the scalar.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component or the dimension
    /// name is not declared by the shape.
    pub fn set_dimension(
        &mut self,
        id: NodeId,
        name: &'static str,
        value: f64,
        retain_link: bool,
        cold: bool,
    ) -> Result<()> {
        let comp = self.component(id)?;
        let current = comp.dims.get(name).copied().ok_or(GeometryError::UnknownDimension {
            shape: comp.shape.name(),
            dimension: name.to_string(),
        })?;
        if retain_link {
            if let Dimension::Link { node, name: target } = current {
                return self.set_dimension(node, target, value, retain_link, cold);
            }
        }
        let stored = if cold || !comp.shape.is_expanding_dimension(name) {
            value
        } else {
            value / self.expansion_factor(id, None)?
        };
        self.component_mut(id)?.dims.insert(name, Dimension::Value(stored));
        self.touch(id);
        Ok(())
    }

    /// Updates the component's operating temperature.
    ///
    /// Number densities scale by `(f_old / f_new)^2`, the 2-D expansion
    /// rule: the cross-section grows as the square of the linear factor
    /// while the axial direction is owned by block-height logic, so the
    /// atom count per component is conserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component.
    pub fn set_temperature(&mut self, id: NodeId, tc: f64) -> Result<()> {
        let f_old = self.expansion_factor(id, None)?;
        let f_new = self.expansion_factor(id, Some(tc))?;
        let comp = self.component_mut(id)?;
        if f_new.abs() > crate::math::TOLERANCE {
            let ratio = (f_old / f_new).powi(2);
            for density in comp.ndens.values_mut() {
                *density *= ratio;
            }
        }
        comp.temperature = tc;
        self.touch(id);
        Ok(())
    }

    /// Sets the number density of one nuclide on a component,
    /// atoms/(barn*cm).
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component.
    pub fn set_component_number_density(
        &mut self,
        id: NodeId,
        nuclide: &str,
        density: f64,
    ) -> Result<()> {
        self.component_mut(id)?.ndens.insert(nuclide.to_string(), density);
        Ok(())
    }

    /// Drops the component's cached volume, forcing recomputation.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a component.
    pub fn clear_cache(&mut self, id: NodeId) -> Result<()> {
        self.component_mut(id)?.cached_volume = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::material::{LinearExpansionMaterial, VoidMaterial};
    use crate::math::TOLERANCE;
    use crate::model::CompositeKind;

    fn steel() -> Arc<dyn Material> {
        Arc::new(LinearExpansionMaterial::new("HT9", 1.2e-5))
    }

    fn block_with(store: &mut ModelStore) -> NodeId {
        let block = store.add_composite(None, CompositeKind::Block, "b0001");
        store.set_param(block, crate::model::params::HEIGHT, 10.0);
        block
    }

    #[test]
    fn dimension_expands_with_temperature() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let spec = ComponentSpec::new("clad", ShapeKind::Circle, steel())
            .with_temperatures(25.0, 25.0)
            .with_dim("od", 10.0)
            .with_dim("id", 5.0)
            .with_dim("mult", 1.5);
        let clad = store.add_component(block, spec).unwrap();

        let cold = store.dimension(clad, "od", None, true).unwrap();
        assert!((cold - 10.0).abs() < TOLERANCE);

        let hot = store.dimension(clad, "od", Some(700.0), false).unwrap();
        let expected = 10.0 * (1.0 + 1.2e-5 * (700.0 - 25.0));
        assert!((hot - expected).abs() < TOLERANCE);
    }

    #[test]
    fn multiplicity_never_expands() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let spec = ComponentSpec::new("pin", ShapeKind::Circle, steel())
            .with_dim("od", 1.0)
            .with_dim("mult", 169.0);
        let pin = store.add_component(block, spec).unwrap();
        let mult = store.dimension(pin, "mult", Some(700.0), false).unwrap();
        assert!((mult - 169.0).abs() < TOLERANCE);
    }

    #[test]
    fn linked_dimension_tracks_target_mutations() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let fuel = store
            .add_component(
                block,
                ComponentSpec::new("fuel", ShapeKind::Circle, steel()).with_dim("od", 0.76),
            )
            .unwrap();
        let gap = store
            .add_component(
                block,
                ComponentSpec::new("gap", ShapeKind::Circle, Arc::new(VoidMaterial::new()))
                    .with_linked_dim("id", "fuel", "od")
                    .with_dim("od", 0.80),
            )
            .unwrap();

        let id = store.dimension(gap, "id", None, true).unwrap();
        assert!((id - 0.76).abs() < TOLERANCE);

        // No refresh call: the link reads the target's current state.
        store.set_dimension(fuel, "od", 0.78, false, true).unwrap();
        let id = store.dimension(gap, "id", None, true).unwrap();
        assert!((id - 0.78).abs() < TOLERANCE);
    }

    #[test]
    fn linking_against_unknown_sibling_fails() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let result = store.add_component(
            block,
            ComponentSpec::new("gap", ShapeKind::Circle, steel())
                .with_linked_dim("id", "nonexistent", "od"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn link_cycle_is_detected() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let a = store
            .add_component(
                block,
                ComponentSpec::new("a", ShapeKind::Circle, steel()).with_dim("od", 1.0),
            )
            .unwrap();
        let b = store
            .add_component(
                block,
                ComponentSpec::new("b", ShapeKind::Circle, steel())
                    .with_linked_dim("od", "a", "od"),
            )
            .unwrap();
        // Manufacture the cycle directly; construction cannot produce one.
        store
            .component_mut(a)
            .unwrap()
            .dims
            .insert("od", Dimension::Link { node: b, name: "od" });
        assert!(store.dimension(a, "od", None, true).is_err());
    }

    #[test]
    fn set_dimension_with_retain_link_forwards_to_target() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let fuel = store
            .add_component(
                block,
                ComponentSpec::new("fuel", ShapeKind::Circle, steel()).with_dim("od", 0.76),
            )
            .unwrap();
        let gap = store
            .add_component(
                block,
                ComponentSpec::new("gap", ShapeKind::Circle, Arc::new(VoidMaterial::new()))
                    .with_linked_dim("id", "fuel", "od"),
            )
            .unwrap();

        store.set_dimension(gap, "id", 0.79, true, true).unwrap();
        // The write went to the target; the link is still live.
        assert!((store.dimension(fuel, "od", None, true).unwrap() - 0.79).abs() < TOLERANCE);
        assert!(matches!(
            store.component(gap).unwrap().raw_dimension("id"),
            Some(Dimension::Link { .. })
        ));
    }

    #[test]
    fn set_dimension_without_retain_link_severs_it() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        store
            .add_component(
                block,
                ComponentSpec::new("fuel", ShapeKind::Circle, steel()).with_dim("od", 0.76),
            )
            .unwrap();
        let gap = store
            .add_component(
                block,
                ComponentSpec::new("gap", ShapeKind::Circle, Arc::new(VoidMaterial::new()))
                    .with_linked_dim("id", "fuel", "od"),
            )
            .unwrap();

        store.set_dimension(gap, "id", 0.70, false, true).unwrap();
        assert!(matches!(
            store.component(gap).unwrap().raw_dimension("id"),
            Some(Dimension::Value(_))
        ));
    }

    #[test]
    fn hot_set_deflates_to_cold_storage() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel())
                    .with_temperatures(25.0, 500.0)
                    .with_dim("od", 1.0),
            )
            .unwrap();
        let f = store.expansion_factor(pin, None).unwrap();
        store.set_dimension(pin, "od", 1.01, false, false).unwrap();
        let cold = store.dimension(pin, "od", None, true).unwrap();
        assert!((cold - 1.01 / f).abs() < TOLERANCE);
        let hot = store.dimension(pin, "od", None, false).unwrap();
        assert!((hot - 1.01).abs() < TOLERANCE);
    }

    #[test]
    fn temperature_change_rescales_densities() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel())
                    .with_temperatures(25.0, 25.0)
                    .with_dim("od", 1.0)
                    .with_number_density("FE56", 0.05),
            )
            .unwrap();
        store.set_temperature(pin, 600.0).unwrap();
        let f = store.expansion_factor(pin, None).unwrap();
        let n = store.component(pin).unwrap().number_densities()["FE56"];
        assert!((n - 0.05 / (f * f)).abs() < 1e-12);
    }

    #[test]
    fn unknown_dimension_is_an_error() {
        let mut store = ModelStore::new();
        let block = block_with(&mut store);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel()).with_dim("od", 1.0),
            )
            .unwrap();
        assert!(store.dimension(pin, "op", None, true).is_err());
    }
}
