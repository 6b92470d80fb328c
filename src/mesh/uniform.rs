use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MeshError, Result};
use crate::geometry::ShapeKind;
use crate::material::LinearExpansionMaterial;
use crate::math::{AxialSpan, TOLERANCE};
use crate::model::{params, ComponentSpec, CompositeKind, ModelStore, NodeId, ParamValue};

/// How a physical quantity redistributes between two axial partitions
/// of the same extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamCategory {
    /// Extensive: a destination cell receives the fraction of the
    /// source value matching the fraction of the source's own height it
    /// overlaps.
    VolumeIntegrated,
    /// The maximum across contributing source regions, unweighted. An
    /// approximation when overlap is partial.
    Peak,
    /// Intensive: smeared over the destination in proportion to the
    /// overlapped fraction of the destination's height.
    Intensive,
}

/// Classification of the parameters the mesh converter maps.
#[derive(Debug, Clone)]
pub struct ParamMapper {
    categories: BTreeMap<String, ParamCategory>,
}

impl ParamMapper {
    /// Creates an empty mapper; nothing is mapped until classified.
    #[must_use]
    pub fn new() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Creates a mapper covering the kernel's standard parameters.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut mapper = Self::new();
        mapper.set(params::POWER, ParamCategory::VolumeIntegrated);
        mapper.set(params::FLUX, ParamCategory::Intensive);
        mapper.set(params::MG_FLUX, ParamCategory::Intensive);
        mapper.set(params::PDENS, ParamCategory::Intensive);
        mapper.set(params::BURNUP, ParamCategory::Intensive);
        mapper.set(params::PEAK_PDENS, ParamCategory::Peak);
        mapper
    }

    /// Classifies a parameter.
    pub fn set(&mut self, name: &str, category: ParamCategory) {
        self.categories.insert(name.to_string(), category);
    }

    /// Iterates over the classified parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamCategory)> {
        self.categories.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl Default for ParamMapper {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Builds an axially-uniform copy of an assembly and maps state in and
/// out of it.
///
/// The converter owns the conversion protocol: build the homogenized
/// copy on the common mesh, push state onto it, hand it to a solver,
/// then pull results back onto the original and discard the copy.
#[derive(Debug)]
pub struct UniformMeshConverter<'a> {
    mesh: &'a [f64],
    mapper: &'a ParamMapper,
}

impl<'a> UniformMeshConverter<'a> {
    /// Creates a converter over mesh boundary elevations (ascending,
    /// bottom and top included).
    #[must_use]
    pub fn new(mesh: &'a [f64], mapper: &'a ParamMapper) -> Self {
        Self { mesh, mapper }
    }

    /// Builds the uniform copy of `source` and maps its state over.
    ///
    /// The copy is a parentless assembly in the same store; discard it
    /// with [`UniformMeshConverter::restore`] when done.
    ///
    /// # Errors
    ///
    /// Returns an error when a mesh cell overlaps no source block or
    /// state mapping fails.
    pub fn convert(&self, store: &mut ModelStore, source: NodeId) -> Result<NodeId> {
        let destination = self.build(store, source)?;
        self.apply_state(store, source, destination)?;
        Ok(destination)
    }

    /// Maps state from the uniform copy back onto the original and
    /// discards the copy.
    ///
    /// # Errors
    ///
    /// Returns an error when state mapping fails.
    pub fn restore(&self, store: &mut ModelStore, source: NodeId, destination: NodeId) -> Result<()> {
        self.apply_state(store, destination, source)?;
        store.discard(destination);
        Ok(())
    }

    /// Builds the homogenized assembly on the converter's mesh.
    ///
    /// Each new cell takes the cross-section label representing the
    /// largest overlap height among the overlapping source blocks,
    /// restricted to fuel/control/shield blocks whenever any overlap.
    ///
    /// # Errors
    ///
    /// Returns an error when a cell overlaps no source block.
    pub fn build(&self, store: &mut ModelStore, source: NodeId) -> Result<NodeId> {
        let name = format!("{}-uniform", store.name(source));
        let destination = store.add_composite(None, CompositeKind::Assembly, &name);

        let source_blocks = store.blocks(source);
        let cross_section = source_blocks
            .first()
            .map(|&b| store.area(b, false))
            .transpose()?
            .unwrap_or_default();

        for (index, pair) in self.mesh.windows(2).enumerate() {
            let cell = AxialSpan::new(pair[0], pair[1]);
            let overlapping = overlapping_blocks(store, source, &cell)?;
            if overlapping.is_empty() {
                return Err(MeshError::EmptyMeshCell {
                    assembly: store.name(source).to_string(),
                    bottom: cell.bottom,
                    top: cell.top,
                }
                .into());
            }

            let significant: Vec<&(NodeId, f64)> = overlapping
                .iter()
                .filter(|(block, _)| {
                    store
                        .node(*block)
                        .map(|n| n.flags().is_significant())
                        .unwrap_or(false)
                })
                .collect();
            let candidates: Vec<(NodeId, f64)> = if significant.is_empty() {
                overlapping.clone()
            } else {
                significant.into_iter().copied().collect()
            };

            let mut label_overlap: BTreeMap<String, f64> = BTreeMap::new();
            for (block, overlap) in &candidates {
                let label = store.param_text(*block, params::XS_TYPE).unwrap_or("").to_string();
                *label_overlap.entry(label).or_default() += overlap;
            }
            let representative_label = label_overlap
                .iter()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(label, _)| label.clone())
                .unwrap_or_default();

            let representative = candidates
                .iter()
                .filter(|(block, _)| {
                    store.param_text(*block, params::XS_TYPE).unwrap_or("")
                        == representative_label
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(block, _)| *block);
            let flags = representative
                .and_then(|b| store.node(b).ok().map(|n| n.flags()))
                .unwrap_or_default();

            let block = store.add_block(
                destination,
                &format!("b{index:04}"),
                cell.height(),
                &representative_label,
                flags,
            );
            store.set_param(block, params::ZBOTTOM, cell.bottom);
            store.set_param(block, params::ZTOP, cell.top);
            store
                .add_component(
                    block,
                    ComponentSpec::new(
                        "homogenized",
                        ShapeKind::Unshaped,
                        Arc::new(LinearExpansionMaterial::new("smeared mix", 0.0)),
                    )
                    .with_dim("area", cross_section),
                )?;
        }
        Ok(destination)
    }

    /// Maps block parameters and number densities from one assembly
    /// onto another partition of the same axial extent.
    ///
    /// Classified parameters follow their [`ParamCategory`] rule.
    /// Number densities always map additively with destination-height
    /// weighting, the rule under which total atom count is conserved
    /// across any repartition of the same total height.
    ///
    /// # Errors
    ///
    /// Returns an error when a destination block overlaps no source
    /// block or a density assignment fails.
    pub fn apply_state(
        &self,
        store: &mut ModelStore,
        source: NodeId,
        destination: NodeId,
    ) -> Result<()> {
        for dest_block in store.blocks(destination) {
            let cell = store.axial_span(dest_block)?;
            if cell.is_degenerate() {
                continue;
            }
            let overlapping = overlapping_blocks(store, source, &cell)?;
            if overlapping.is_empty() {
                return Err(MeshError::EmptyMeshCell {
                    assembly: store.name(destination).to_string(),
                    bottom: cell.bottom,
                    top: cell.top,
                }
                .into());
            }

            for (name, category) in self.mapper.iter().collect::<Vec<_>>() {
                self.map_param(store, &overlapping, dest_block, &cell, name, category)?;
            }
            self.map_number_densities(store, &overlapping, dest_block, &cell)?;
        }
        Ok(())
    }

    #[allow(clippy::unused_self)]
    fn map_param(
        &self,
        store: &mut ModelStore,
        overlapping: &[(NodeId, f64)],
        dest_block: NodeId,
        cell: &AxialSpan,
        name: &str,
        category: ParamCategory,
    ) -> Result<()> {
        let mut scalar: Option<f64> = None;
        let mut vector: Option<Vec<f64>> = None;
        for &(source_block, overlap) in overlapping {
            let source_height = store.axial_span(source_block)?.height();
            let weight = match category {
                ParamCategory::VolumeIntegrated => overlap / source_height,
                ParamCategory::Intensive => overlap / cell.height(),
                ParamCategory::Peak => 1.0,
            };
            match store.node(source_block)?.params().get(name) {
                Some(ParamValue::Float(value)) => {
                    let value = *value;
                    scalar = Some(match (scalar, category) {
                        (None, ParamCategory::Peak) => value,
                        (Some(acc), ParamCategory::Peak) => acc.max(value),
                        (acc, _) => acc.unwrap_or_default() + value * weight,
                    });
                }
                Some(ParamValue::FloatVec(values)) => {
                    let values = values.clone();
                    let acc = vector.get_or_insert_with(Vec::new);
                    if acc.len() < values.len() {
                        acc.resize(values.len(), 0.0);
                    }
                    for (slot, value) in acc.iter_mut().zip(&values) {
                        match category {
                            ParamCategory::Peak => *slot = slot.max(*value),
                            _ => *slot += value * weight,
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(value) = scalar {
            store.set_param(dest_block, name, value);
        }
        if let Some(values) = vector {
            store.set_param_vec(dest_block, name, values);
        }
        Ok(())
    }

    /// Additive, destination-weighted density mapping; replaces the
    /// destination's previous distribution entirely.
    #[allow(clippy::unused_self)]
    fn map_number_densities(
        &self,
        store: &mut ModelStore,
        overlapping: &[(NodeId, f64)],
        dest_block: NodeId,
        cell: &AxialSpan,
    ) -> Result<()> {
        let mut mapped: BTreeMap<String, f64> = BTreeMap::new();
        for &(source_block, overlap) in overlapping {
            for (nuclide, density) in store.number_densities(source_block)? {
                *mapped.entry(nuclide).or_default() += density * overlap / cell.height();
            }
        }
        for nuclide in store.number_densities(dest_block)?.into_keys() {
            mapped.entry(nuclide).or_insert(0.0);
        }
        assign_homogenized_densities(store, dest_block, &mapped)
    }
}

/// Source blocks intersecting a destination cell, with overlap heights.
/// Zero-height degenerate blocks never participate.
fn overlapping_blocks(
    store: &ModelStore,
    source: NodeId,
    cell: &AxialSpan,
) -> Result<Vec<(NodeId, f64)>> {
    let mut out = Vec::new();
    for block in store.blocks(source) {
        let span = store.axial_span(block)?;
        if span.is_degenerate() {
            continue;
        }
        let overlap = span.overlap(cell);
        if overlap > TOLERANCE {
            out.push((block, overlap));
        }
    }
    Ok(out)
}

/// Writes a homogenized density map onto a block.
///
/// Nuclides some component already carries de-homogenize through the
/// composite setter; brand-new nuclides (smeared across a material
/// boundary) land uniformly on every component, which leaves the
/// homogenized value intact.
fn assign_homogenized_densities(
    store: &mut ModelStore,
    block: NodeId,
    densities: &BTreeMap<String, f64>,
) -> Result<()> {
    let leaves = store.component_leaves(block);
    for (nuclide, &value) in densities {
        let carried = leaves.iter().any(|&leaf| {
            store
                .component(leaf)
                .map(|c| c.number_densities().contains_key(nuclide))
                .unwrap_or(false)
        });
        if carried {
            store.set_number_density(block, nuclide, value)?;
        } else {
            for &leaf in &leaves {
                store.set_component_number_density(leaf, nuclide, value)?;
            }
        }
    }
    Ok(())
}
