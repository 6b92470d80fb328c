use crate::error::{GeometryError, ModelError, Result};
use crate::geometry::ShapeKind;
use crate::math::TOLERANCE;
use crate::model::{params, ModelStore, NodeId, NodeKind};

/// Relative slack allowed before a negative derived remainder is
/// treated as geometric oversubscription rather than float noise.
const OVERSUBSCRIPTION_SLACK: f64 = 1e-9;

impl ModelStore {
    /// Computes the cross-sectional area of a node in cm^2.
    ///
    /// Components evaluate their shape formula on thermally-expanded
    /// dimensions (as-input dimensions when `cold` is set); 3-D shapes
    /// report volume over container height; a derived shape reports the
    /// container remainder. Composites sum their children.
    ///
    /// # Errors
    ///
    /// Returns an error when a solid component's area is negative, the
    /// geometry is undefined, or a derived shape's container is
    /// malformed.
    pub fn area(&mut self, id: NodeId, cold: bool) -> Result<f64> {
        if matches!(self.node(id)?.kind(), NodeKind::Composite(_)) {
            let mut total = 0.0;
            for child in self.children(id).to_vec() {
                total += self.area(child, cold)?;
            }
            return Ok(total);
        }
        self.component_area(id, cold)
    }

    /// Computes the volume of a node in cm^3.
    ///
    /// Extruded components multiply area by container height; spheres
    /// and cubes use their intrinsic formula; a derived shape takes the
    /// container remainder. Composites sum their children. Component
    /// results are cached against the dependency generation and only
    /// recomputed after a mutation that can affect them.
    ///
    /// # Errors
    ///
    /// Returns an error when the geometry is undefined or violates the
    /// non-negativity constraints for solid materials.
    pub fn volume(&mut self, id: NodeId) -> Result<f64> {
        if matches!(self.node(id)?.kind(), NodeKind::Composite(_)) {
            let mut total = 0.0;
            for child in self.children(id).to_vec() {
                total += self.volume(child)?;
            }
            return Ok(total);
        }
        if let Some((value, computed_at)) = self.component(id)?.cached_volume {
            if computed_at >= self.dependency_generation(id) {
                return Ok(value);
            }
        }
        let value = self.compute_component_volume(id)?;
        let generation = self.current_generation();
        self.component_mut(id)?.cached_volume = Some((value, generation));
        Ok(value)
    }

    /// Returns each direct child with its share of the total volume.
    ///
    /// # Errors
    ///
    /// Returns an error when a child volume fails to compute or the
    /// total volume is zero.
    pub fn volume_fractions(&mut self, id: NodeId) -> Result<Vec<(NodeId, f64)>> {
        let children = self.children(id).to_vec();
        let mut volumes = Vec::with_capacity(children.len());
        let mut total = 0.0;
        for &child in &children {
            let v = self.volume(child)?;
            volumes.push(v);
            total += v;
        }
        if total.abs() < TOLERANCE {
            return Err(ModelError::ZeroWeightSum {
                node: self.name(id).to_string(),
                param: "volume".to_string(),
            }
            .into());
        }
        Ok(children.into_iter().zip(volumes.into_iter().map(|v| v / total)).collect())
    }

    fn component_area(&mut self, id: NodeId, cold: bool) -> Result<f64> {
        let comp = self.component(id)?;
        let shape = comp.shape();
        if shape == ShapeKind::DerivedShape {
            return self.derived_area(id, cold);
        }
        if shape.is_three_dimensional() {
            let dims = self.resolved_dimensions(id, None, cold)?;
            let volume = shape.intrinsic_volume(&dims).unwrap_or_default();
            let height = self.container_height(id)?;
            if height > TOLERANCE {
                return Ok(volume / height);
            }
            return Err(GeometryError::UndefinedExtent {
                component: self.name(id).to_string(),
            }
            .into());
        }
        let dims = self.resolved_dimensions(id, None, cold)?;
        let area = shape.area(&dims).unwrap_or_default();
        if area < -TOLERANCE && !self.component(id)?.material().is_void() {
            return Err(GeometryError::NegativeArea {
                component: self.name(id).to_string(),
                area,
            }
            .into());
        }
        Ok(area)
    }

    fn compute_component_volume(&mut self, id: NodeId) -> Result<f64> {
        let comp = self.component(id)?;
        let shape = comp.shape();
        if shape == ShapeKind::DerivedShape {
            return self.derived_volume(id);
        }
        if shape.is_three_dimensional() {
            let dims = self.resolved_dimensions(id, None, false)?;
            let volume = shape.intrinsic_volume(&dims).unwrap_or_default();
            if volume < -TOLERANCE && !self.component(id)?.material().is_void() {
                return Err(GeometryError::NegativeVolume {
                    component: self.name(id).to_string(),
                    volume,
                }
                .into());
            }
            return Ok(volume);
        }
        let area = self.component_area(id, false)?;
        let height = self.container_height(id)?;
        Ok(area * height)
    }

    /// Height of the component's parent container, zero when the
    /// container declares none.
    fn container_height(&self, id: NodeId) -> Result<f64> {
        let parent = self.node(id)?.parent().ok_or_else(|| GeometryError::MissingParent {
            component: self.name(id).to_string(),
        })?;
        Ok(self.param_f64(parent, params::HEIGHT).unwrap_or_default())
    }

    /// Locates the container and non-derived siblings of a derived
    /// shape, rejecting containers with a second derived shape.
    fn derived_partners(&self, id: NodeId) -> Result<(NodeId, Vec<NodeId>)> {
        let container = self.node(id)?.parent().ok_or_else(|| GeometryError::MissingParent {
            component: self.name(id).to_string(),
        })?;
        let mut siblings = Vec::new();
        for &child in self.children(container) {
            if child == id {
                continue;
            }
            if let Ok(comp) = self.component(child) {
                if comp.shape() == ShapeKind::DerivedShape {
                    return Err(GeometryError::MultipleDerivedShapes {
                        container: self.name(container).to_string(),
                    }
                    .into());
                }
            }
            siblings.push(child);
        }
        Ok((container, siblings))
    }

    /// The container's maximum theoretical cross-section: the largest
    /// outer-envelope footprint any sibling claims.
    fn capacity_area(&self, siblings: &[NodeId], cold: bool) -> Result<f64> {
        let mut capacity: Option<f64> = None;
        for &sibling in siblings {
            let Ok(comp) = self.component(sibling) else {
                continue;
            };
            let dims = self.resolved_dimensions(sibling, None, cold)?;
            if let Some(bounding) = comp.shape().bounding_area(&dims) {
                capacity = Some(capacity.map_or(bounding, |c: f64| c.max(bounding)));
            }
        }
        capacity.ok_or_else(|| {
            GeometryError::UndefinedExtent {
                component: "derived shape container".to_string(),
            }
            .into()
        })
    }

    fn derived_volume(&mut self, id: NodeId) -> Result<f64> {
        let (container, siblings) = self.derived_partners(id)?;
        let height = self.param_f64(container, params::HEIGHT).unwrap_or_default();
        if height <= TOLERANCE {
            // Zero-height container: the remainder only exists as an
            // area. Evaluate it so malformed geometry still errors.
            self.derived_area(id, false)?;
            return Ok(0.0);
        }
        let capacity = self.capacity_area(&siblings, false)? * height;
        let mut occupied = 0.0;
        for &sibling in &siblings {
            occupied += self.volume(sibling)?;
        }
        self.remainder(container, capacity, occupied)
    }

    fn derived_area(&mut self, id: NodeId, cold: bool) -> Result<f64> {
        let (container, siblings) = self.derived_partners(id)?;
        let height = self.param_f64(container, params::HEIGHT).unwrap_or_default();
        if height > TOLERANCE && !cold {
            return Ok(self.derived_volume(id)? / height);
        }
        let capacity = self.capacity_area(&siblings, cold)?;
        let mut occupied = 0.0;
        for &sibling in &siblings {
            occupied += self.area(sibling, cold)?;
        }
        self.remainder(container, capacity, occupied)
    }

    fn remainder(&self, container: NodeId, capacity: f64, occupied: f64) -> Result<f64> {
        let remainder = capacity - occupied;
        let slack = OVERSUBSCRIPTION_SLACK * capacity.abs().max(1.0);
        if remainder < -slack {
            return Err(GeometryError::OversubscribedContainer {
                container: self.name(container).to_string(),
                capacity,
                occupied,
                excess: -remainder,
            }
            .into());
        }
        Ok(remainder.max(0.0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::material::{LinearExpansionMaterial, VoidMaterial};
    use crate::model::{ComponentSpec, CompositeKind, RegionFlags};
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn steel() -> Arc<dyn crate::material::Material> {
        Arc::new(LinearExpansionMaterial::new("HT9", 1.2e-5))
    }

    fn sodium() -> Arc<dyn crate::material::Material> {
        Arc::new(LinearExpansionMaterial::new("Sodium", 0.0))
    }

    fn hex_block(store: &mut ModelStore, height: f64) -> NodeId {
        let assembly = store.add_composite(None, CompositeKind::Assembly, "a0001");
        store.add_block(assembly, "b0001", height, "AA", RegionFlags::default())
    }

    #[test]
    fn hot_circle_area_matches_expanded_dimensions() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel())
                    .with_temperatures(25.0, 25.0)
                    .with_dim("od", 10.0)
                    .with_dim("id", 5.0)
                    .with_dim("mult", 1.5),
            )
            .unwrap();
        store.set_temperature(pin, 700.0).unwrap();
        let f = 1.0 + 1.2e-5 * (700.0 - 25.0);
        let od = 10.0 * f;
        let id = 5.0 * f;
        let expected = PI / 4.0 * (od * od - id * id) * 1.5;
        let area = store.area(pin, false).unwrap();
        assert_relative_eq!(area, expected, max_relative = 1e-12);
    }

    #[test]
    fn negative_area_fails_on_solid_material() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let bad = store
            .add_component(
                block,
                ComponentSpec::new("bad", ShapeKind::Circle, steel())
                    .with_dim("od", 1.0)
                    .with_dim("id", 2.0),
            )
            .unwrap();
        assert!(store.area(bad, false).is_err());
    }

    #[test]
    fn negative_area_is_allowed_on_void() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let gap = store
            .add_component(
                block,
                ComponentSpec::new("gap", ShapeKind::Circle, Arc::new(VoidMaterial::new()))
                    .with_dim("od", 1.0)
                    .with_dim("id", 2.0),
            )
            .unwrap();
        assert!(store.area(gap, false).unwrap() < 0.0);
    }

    #[test]
    fn extruded_volume_is_area_times_height() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel()).with_dim("od", 2.0),
            )
            .unwrap();
        let volume = store.volume(pin).unwrap();
        assert!((volume - PI * 10.0).abs() < 1e-9);
    }

    #[test]
    fn sphere_volume_ignores_container_height() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let ball = store
            .add_component(
                block,
                ComponentSpec::new("ball", ShapeKind::Sphere, steel()).with_dim("od", 2.0),
            )
            .unwrap();
        let volume = store.volume(ball).unwrap();
        assert!((volume - 4.0 / 3.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn composite_volume_is_sum_of_children() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let a = store
            .add_component(
                block,
                ComponentSpec::new("a", ShapeKind::Circle, steel()).with_dim("od", 2.0),
            )
            .unwrap();
        let b = store
            .add_component(
                block,
                ComponentSpec::new("b", ShapeKind::Circle, steel()).with_dim("od", 1.0),
            )
            .unwrap();
        let total = store.volume(block).unwrap();
        let parts = store.volume(a).unwrap() + store.volume(b).unwrap();
        assert!((total - parts).abs() < 1e-12);
    }

    #[test]
    fn derived_shape_closes_the_hex_block() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let fuel = store
            .add_component(
                block,
                ComponentSpec::new("fuel", ShapeKind::Circle, steel()).with_dim("od", 0.76),
            )
            .unwrap();
        let structure = store
            .add_component(
                block,
                ComponentSpec::new("structure", ShapeKind::Hexagon, steel())
                    .with_dim("op", 16.0)
                    .with_dim("ip", 15.0),
            )
            .unwrap();
        let coolant = store
            .add_component(
                block,
                ComponentSpec::new("coolant", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();

        let hex_capacity = 3.0_f64.sqrt() / 2.0 * 256.0 * 10.0;
        let expected =
            hex_capacity - store.volume(fuel).unwrap() - store.volume(structure).unwrap();
        let coolant_volume = store.volume(coolant).unwrap();
        assert!((coolant_volume - expected).abs() < 1e-9);

        // Closure: derived + siblings == container capacity.
        let total = store.volume(block).unwrap();
        assert!((total - hex_capacity).abs() < 1e-9);
    }

    #[test]
    fn two_derived_shapes_are_ambiguous() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel()).with_dim("op", 16.0),
            )
            .unwrap();
        let c1 = store
            .add_component(
                block,
                ComponentSpec::new("c1", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        store
            .add_component(
                block,
                ComponentSpec::new("c2", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        assert!(store.volume(c1).is_err());
    }

    #[test]
    fn oversubscribed_container_is_reported() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel()).with_dim("op", 2.0),
            )
            .unwrap();
        store
            .add_component(
                block,
                // Far larger than the duct's footprint.
                ComponentSpec::new("slug", ShapeKind::Circle, steel()).with_dim("od", 1.9),
            )
            .unwrap();
        let derived = store
            .add_component(
                block,
                ComponentSpec::new("rest", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        // The solid duct already fills the capacity; the slug pushes the
        // occupied volume past it.
        let err = store.volume(derived).unwrap_err();
        assert!(err.to_string().contains("oversubscribed"));
    }

    #[test]
    fn derived_with_no_parent_is_undefined() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel()).with_dim("op", 16.0),
            )
            .unwrap();
        let derived = store
            .add_component(
                block,
                ComponentSpec::new("rest", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        store.remove_child(block, derived).unwrap();
        assert!(store.volume(derived).is_err());
    }

    #[test]
    fn zero_height_container_still_has_derived_area() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 0.0);
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel())
                    .with_dim("op", 16.0)
                    .with_dim("ip", 15.0),
            )
            .unwrap();
        let derived = store
            .add_component(
                block,
                ComponentSpec::new("rest", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        let expected = 3.0_f64.sqrt() / 2.0 * 225.0; // inside the duct
        let area = store.area(derived, false).unwrap();
        assert!((area - expected).abs() < 1e-9);
        assert!(store.volume(derived).unwrap().abs() < TOLERANCE);
    }

    #[test]
    fn volume_cache_invalidates_on_dimension_change() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let pin = store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel()).with_dim("od", 2.0),
            )
            .unwrap();
        let before = store.volume(pin).unwrap();
        assert!(store.component(pin).unwrap().cached_volume.is_some());
        store.set_dimension(pin, "od", 4.0, false, true).unwrap();
        let after = store.volume(pin).unwrap();
        assert!((after - before * 4.0).abs() < 1e-9);
    }

    #[test]
    fn derived_cache_invalidates_on_sibling_change() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        let fuel = store
            .add_component(
                block,
                ComponentSpec::new("fuel", ShapeKind::Circle, steel()).with_dim("od", 1.0),
            )
            .unwrap();
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel()).with_dim("op", 16.0),
            )
            .unwrap();
        let coolant = store
            .add_component(
                block,
                ComponentSpec::new("coolant", ShapeKind::DerivedShape, sodium()),
            )
            .unwrap();
        let before = store.volume(coolant).unwrap();
        store.set_dimension(fuel, "od", 2.0, false, true).unwrap();
        let after = store.volume(coolant).unwrap();
        assert!(after < before);
        let delta = before - after;
        let expected = (PI / 4.0 * (4.0 - 1.0)) * 10.0;
        assert!((delta - expected).abs() < 1e-9);
    }

    #[test]
    fn volume_fractions_sum_to_one() {
        let mut store = ModelStore::new();
        let block = hex_block(&mut store, 10.0);
        store
            .add_component(
                block,
                ComponentSpec::new("duct", ShapeKind::Hexagon, steel()).with_dim("op", 16.0),
            )
            .unwrap();
        store
            .add_component(
                block,
                ComponentSpec::new("pin", ShapeKind::Circle, steel()).with_dim("od", 1.0),
            )
            .unwrap();
        let fractions = store.volume_fractions(block).unwrap();
        let total: f64 = fractions.iter().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
