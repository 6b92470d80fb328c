pub mod component;
pub mod params;
mod retain;

pub use component::{ComponentData, ComponentSpec, DimInput, Dimension};
pub use params::{ParamStore, ParamValue};
pub use retain::StateRetainer;

use slotmap::SlotMap;

use crate::error::{ModelError, Result};
use crate::math::{AxialSpan, Point3};

slotmap::new_key_type! {
    /// Unique identifier for a node in the model store.
    pub struct NodeId;
}

/// The container kinds a composite node can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    /// The whole core.
    Core,
    /// An axial stack of blocks at one lattice position.
    Assembly,
    /// One axial slice of an assembly, the unit of homogenization.
    Block,
    /// An ad-hoc grouping used for bookkeeping (e.g. a fuel batch).
    Batch,
}

/// Physics-relevant classification flags of a region.
///
/// Fuel and control boundaries anchor the common axial mesh; radial
/// shields join them when selecting representative regions during
/// homogenization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionFlags {
    /// Region bears fuel.
    pub fuel: bool,
    /// Region bears control material.
    pub control: bool,
    /// Region is a radial shield.
    pub shield_radial: bool,
}

impl RegionFlags {
    /// Returns whether any flag that anchors mesh boundaries is set.
    #[must_use]
    pub fn anchors_mesh(&self) -> bool {
        self.fuel || self.control
    }

    /// Returns whether any flag relevant to representative-region
    /// selection is set.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.fuel || self.control || self.shield_radial
    }
}

/// Position of a node within its parent's coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialLocator {
    /// A Cartesian offset in cm.
    Cartesian(Point3),
    /// An index into the parent's hexagonal grid.
    HexGrid {
        /// First lattice index.
        i: i32,
        /// Second lattice index.
        j: i32,
    },
}

impl SpatialLocator {
    /// Converts a hex-grid index to a Cartesian position for a flat-up
    /// hexagonal lattice with the given flat-to-flat pitch.
    #[must_use]
    pub fn hex_to_cartesian(i: i32, j: i32, pitch: f64) -> Point3 {
        let x = pitch * (f64::from(i) + f64::from(j) / 2.0);
        let y = pitch * 3.0_f64.sqrt() / 2.0 * f64::from(j);
        Point3::new(x, y, 0.0)
    }
}

/// One node of the composite tree.
#[derive(Debug)]
pub struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    pub(crate) params: ParamStore,
    locator: Option<SpatialLocator>,
    flags: RegionFlags,
    pub(crate) changed_at: u64,
}

/// Payload discriminating containers from leaves.
#[derive(Debug)]
pub enum NodeKind {
    /// A container node aggregating children.
    Composite(CompositeKind),
    /// A leaf geometric primitive.
    Component(Box<ComponentData>),
}

impl NodeData {
    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the node payload.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the region flags.
    #[must_use]
    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    /// Returns the spatial locator, if positioned.
    #[must_use]
    pub fn locator(&self) -> Option<SpatialLocator> {
        self.locator
    }

    /// Returns the parameter namespace.
    #[must_use]
    pub fn params(&self) -> &ParamStore {
        &self.params
    }
}

/// Central arena that owns the composite tree.
///
/// Nodes reference each other via generational keys, avoiding
/// self-referential structures and enabling safe mutation. A store-wide
/// generation counter stamps every mutation; cached derived quantities
/// record the generation they were computed against and recompute on
/// mismatch.
#[derive(Debug, Default)]
pub struct ModelStore {
    nodes: SlotMap<NodeId, NodeData>,
    generation: u64,
}

impl ModelStore {
    /// Creates a new, empty model store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the node data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the store.
    pub fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id)
            .ok_or_else(|| ModelError::EntityNotFound("node".into()).into())
    }

    /// Returns the node's name, or a placeholder for a dead handle.
    #[must_use]
    pub fn name(&self, id: NodeId) -> &str {
        self.nodes.get(id).map_or("<dead node>", |n| &n.name)
    }

    /// Returns the component payload of a leaf node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or is a composite.
    pub fn component(&self, id: NodeId) -> Result<&ComponentData> {
        match &self.node(id)?.kind {
            NodeKind::Component(data) => Ok(data),
            NodeKind::Composite(_) => {
                Err(ModelError::NotAComponent(self.name(id).to_string()).into())
            }
        }
    }

    /// Returns the mutable component payload of a leaf node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or is a composite.
    pub fn component_mut(&mut self, id: NodeId) -> Result<&mut ComponentData> {
        let name = self.name(id).to_string();
        match self
            .nodes
            .get_mut(id)
            .map(|n| &mut n.kind)
            .ok_or_else(|| ModelError::EntityNotFound("node".into()))?
        {
            NodeKind::Component(data) => Ok(data),
            NodeKind::Composite(_) => Err(ModelError::NotAComponent(name).into()),
        }
    }

    /// Returns the composite kind of a container node, or `None` for a
    /// component.
    #[must_use]
    pub fn composite_kind(&self, id: NodeId) -> Option<CompositeKind> {
        match self.nodes.get(id)?.kind {
            NodeKind::Composite(kind) => Some(kind),
            NodeKind::Component(_) => None,
        }
    }

    /// Creates a composite node, optionally attached to a parent.
    pub fn add_composite(
        &mut self,
        parent: Option<NodeId>,
        kind: CompositeKind,
        name: &str,
    ) -> NodeId {
        let id = self.nodes.insert(NodeData {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            kind: NodeKind::Composite(kind),
            params: ParamStore::new(),
            locator: None,
            flags: RegionFlags::default(),
            changed_at: 0,
        });
        if let Some(p) = parent {
            if let Some(node) = self.nodes.get_mut(p) {
                node.children.push(id);
            }
        }
        self.touch(id);
        if let Some(p) = parent {
            self.touch(p);
        }
        id
    }

    /// Creates a block composite with its height, cross-section label,
    /// and flags, appended to an assembly.
    pub fn add_block(
        &mut self,
        assembly: NodeId,
        name: &str,
        height: f64,
        xs_type: &str,
        flags: RegionFlags,
    ) -> NodeId {
        let block = self.add_composite(Some(assembly), CompositeKind::Block, name);
        self.set_param(block, params::HEIGHT, height);
        self.set_param_text(block, params::XS_TYPE, xs_type);
        if let Some(node) = self.nodes.get_mut(block) {
            node.flags = flags;
        }
        block
    }

    /// Creates a component from a spec, attached to a parent container.
    ///
    /// Dimension links are resolved here, against the parent's existing
    /// children, and never re-resolved from names afterwards. Forward
    /// references to siblings not yet created are not supported.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension name is not declared by the
    /// shape or a link names an absent sibling.
    pub fn add_component(&mut self, parent: NodeId, spec: ComponentSpec) -> Result<NodeId> {
        if matches!(self.node(parent)?.kind, NodeKind::Component(_)) {
            return Err(ModelError::NotAComposite(self.name(parent).to_string()).into());
        }
        let mut dims = std::collections::BTreeMap::new();
        for &name in spec.shape.dimension_names() {
            dims.insert(name, Dimension::Value(spec.shape.default_dimension(name)));
        }
        for &(name, ref input) in &spec.dims {
            if !spec.shape.has_dimension(name) {
                return Err(crate::error::GeometryError::UnknownDimension {
                    shape: spec.shape.name(),
                    dimension: name.to_string(),
                }
                .into());
            }
            let dim = match input {
                DimInput::Value(v) => Dimension::Value(*v),
                DimInput::Link {
                    component,
                    dimension,
                } => {
                    let target = self
                        .children(parent)
                        .iter()
                        .copied()
                        .find(|&c| self.name(c) == component.as_str())
                        .ok_or_else(|| ModelError::LinkingFailure {
                            component: spec.name.clone(),
                            dimension: name.to_string(),
                            target: component.clone(),
                        })?;
                    Dimension::Link {
                        node: target,
                        name: *dimension,
                    }
                }
            };
            dims.insert(name, dim);
        }
        let data = ComponentData {
            shape: spec.shape,
            material: spec.material,
            input_temperature: spec.input_temperature,
            temperature: spec.temperature,
            dims,
            ndens: spec.number_densities,
            cached_volume: None,
            backups: Vec::new(),
        };
        let id = self.nodes.insert(NodeData {
            name: spec.name,
            parent: Some(parent),
            children: Vec::new(),
            kind: NodeKind::Component(Box::new(data)),
            params: ParamStore::new(),
            locator: None,
            flags: RegionFlags::default(),
            changed_at: 0,
        });
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(id);
        }
        self.touch(id);
        self.touch(parent);
        Ok(id)
    }

    /// Attaches an existing detached node as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the child already has a parent (a child
    /// belongs to exactly one composite at a time).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_child(parent, self.children(parent).len(), child)
    }

    /// Attaches an existing detached node at `index` among the children
    /// of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the child already has a parent.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if matches!(self.node(parent)?.kind, NodeKind::Component(_)) {
            return Err(ModelError::NotAComposite(self.name(parent).to_string()).into());
        }
        if self.node(child)?.parent.is_some() {
            return Err(ModelError::DuplicateChild {
                parent: self.name(parent).to_string(),
                child: self.name(child).to_string(),
            }
            .into());
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        self.touch(child);
        self.touch(parent);
        Ok(())
    }

    /// Detaches a child from its parent, leaving it parentless in the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if `child` is not among the children of
    /// `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let position = self
            .node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| ModelError::ChildNotFound {
                parent: self.name(parent).to_string(),
                child: self.name(child).to_string(),
            })?;
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.remove(position);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        self.touch(child);
        self.touch(parent);
        Ok(())
    }

    /// Removes a node and its whole subtree from the store.
    ///
    /// Used to discard temporary trees (e.g. a uniform-mesh copy after
    /// results have been mapped back).
    pub fn discard(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.retain(|&c| c != id);
            }
            self.touch(parent);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next) {
                stack.extend(node.children);
            }
        }
    }

    /// Returns the direct children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| &n.children)
    }

    /// Returns all descendants of a node in depth-first order,
    /// excluding the node itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Returns exactly the nth generation below a node: 1 for direct
    /// children, 2 for grandchildren, and so on.
    #[must_use]
    pub fn generation_children(&self, id: NodeId, generation: usize) -> Vec<NodeId> {
        let mut current = vec![id];
        for _ in 0..generation {
            current = current
                .iter()
                .flat_map(|&n| self.children(n).iter().copied())
                .collect();
        }
        if generation == 0 {
            Vec::new()
        } else {
            current
        }
    }

    /// Returns the block children of an assembly, in axial order.
    #[must_use]
    pub fn blocks(&self, assembly: NodeId) -> Vec<NodeId> {
        self.children(assembly)
            .iter()
            .copied()
            .filter(|&c| self.composite_kind(c) == Some(CompositeKind::Block))
            .collect()
    }

    // --- Parameters ---

    /// Sets a scalar parameter, stamping the node's generation.
    pub fn set_param(&mut self, id: NodeId, key: &str, value: f64) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.set(key, ParamValue::Float(value));
        }
        self.touch(id);
    }

    /// Sets a vector parameter, stamping the node's generation.
    pub fn set_param_vec(&mut self, id: NodeId, key: &str, value: Vec<f64>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.set(key, ParamValue::FloatVec(value));
        }
        self.touch(id);
    }

    /// Sets a text parameter, stamping the node's generation.
    pub fn set_param_text(&mut self, id: NodeId, key: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.set(key, ParamValue::Text(value.to_string()));
        }
        self.touch(id);
    }

    /// Returns a scalar parameter, or `None` when unset.
    #[must_use]
    pub fn param_f64(&self, id: NodeId, key: &str) -> Option<f64> {
        self.nodes.get(id)?.params.float(key)
    }

    /// Returns a vector parameter, or `None` when unset.
    #[must_use]
    pub fn param_vec(&self, id: NodeId, key: &str) -> Option<&[f64]> {
        self.nodes.get(id)?.params.vec(key)
    }

    /// Returns a text parameter, or `None` when unset.
    #[must_use]
    pub fn param_text(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes.get(id)?.params.text(key)
    }

    /// Returns a required scalar parameter.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameter is unset or non-scalar.
    pub fn require_param_f64(&self, id: NodeId, key: &str) -> Result<f64> {
        self.param_f64(id, key).ok_or_else(|| {
            ModelError::ParamNotFound {
                node: self.name(id).to_string(),
                param: key.to_string(),
            }
            .into()
        })
    }

    /// Sets the region flags of a node.
    pub fn set_flags(&mut self, id: NodeId, flags: RegionFlags) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags = flags;
        }
        self.touch(id);
    }

    /// Sets the spatial locator of a node.
    pub fn set_locator(&mut self, id: NodeId, locator: SpatialLocator) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.locator = Some(locator);
        }
        self.touch(id);
    }

    // --- Axial layout ---

    /// Returns the elevation span of a block from its `zbottom`/`ztop`
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when either elevation parameter is unset.
    pub fn axial_span(&self, block: NodeId) -> Result<AxialSpan> {
        Ok(AxialSpan::new(
            self.require_param_f64(block, params::ZBOTTOM)?,
            self.require_param_f64(block, params::ZTOP)?,
        ))
    }

    /// Recomputes `zbottom`/`ztop` for every block of an assembly by
    /// accumulating block heights from `base` upward.
    ///
    /// # Errors
    ///
    /// Returns an error when a block lacks a height.
    pub fn update_elevations(&mut self, assembly: NodeId, base: f64) -> Result<()> {
        let mut z = base;
        for block in self.blocks(assembly) {
            let height = self.require_param_f64(block, params::HEIGHT)?;
            self.set_param(block, params::ZBOTTOM, z);
            self.set_param(block, params::ZTOP, z + height);
            z += height;
        }
        Ok(())
    }

    /// Changes a block's height, conserving its atom inventory.
    ///
    /// The axial counterpart of the 2-D rule in
    /// [`ModelStore::set_temperature`]: component cross-sections own the
    /// radial expansion, the block height owns the axial one. Every
    /// descendant component's number densities scale by the old/new
    /// height ratio, so `density * volume` per nuclide is unchanged.
    /// Elevations are not recomputed; call
    /// [`ModelStore::update_elevations`] on the assembly afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when the block has no height parameter or the
    /// new height is not positive.
    pub fn set_block_height(&mut self, block: NodeId, height: f64) -> Result<()> {
        let old = self.require_param_f64(block, params::HEIGHT)?;
        if height <= crate::math::TOLERANCE {
            return Err(crate::error::GeometryError::NonPositiveHeight {
                block: self.name(block).to_string(),
                height,
            }
            .into());
        }
        let ratio = old / height;
        for leaf in self.component_leaves(block) {
            if let Ok(comp) = self.component_mut(leaf) {
                for density in comp.ndens.values_mut() {
                    *density *= ratio;
                }
            }
        }
        self.set_param(block, params::HEIGHT, height);
        Ok(())
    }

    /// Returns the axial mesh boundaries of an assembly: the bottom of
    /// the first block followed by every block's top elevation.
    ///
    /// # Errors
    ///
    /// Returns an error when a block lacks elevation parameters.
    pub fn axial_mesh(&self, assembly: NodeId) -> Result<Vec<f64>> {
        let blocks = self.blocks(assembly);
        let mut mesh = Vec::with_capacity(blocks.len() + 1);
        for (index, block) in blocks.iter().enumerate() {
            let span = self.axial_span(*block)?;
            if index == 0 {
                mesh.push(span.bottom);
            }
            mesh.push(span.top);
        }
        Ok(mesh)
    }

    /// Returns the symmetry factor applying to a node: the first
    /// `symmetryFactor` parameter found on the node or its ancestors,
    /// defaulting to one.
    #[must_use]
    pub fn symmetry_factor(&self, id: NodeId) -> f64 {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(factor) = self.param_f64(node_id, params::SYMMETRY_FACTOR) {
                return factor;
            }
            current = self.nodes.get(node_id).and_then(|n| n.parent);
        }
        1.0
    }

    // --- Paths ---

    /// Returns the slash-separated path of `id` below `root`, or `None`
    /// when `id` is not in that subtree. The root itself maps to `"."`.
    #[must_use]
    pub fn relative_path(&self, root: NodeId, id: NodeId) -> Option<String> {
        if id == root {
            return Some(".".to_string());
        }
        let mut segments = Vec::new();
        let mut current = id;
        while current != root {
            let node = self.nodes.get(current)?;
            segments.push(node.name.clone());
            current = node.parent?;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Resolves a slash-separated path below `root` back to a node.
    #[must_use]
    pub fn resolve_path(&self, root: NodeId, path: &str) -> Option<NodeId> {
        if path == "." {
            return Some(root);
        }
        let mut current = root;
        for segment in path.split('/') {
            current = self
                .children(current)
                .iter()
                .copied()
                .find(|&c| self.name(c) == segment)?;
        }
        Some(current)
    }

    /// Writes an already-synchronized parameter value without marking
    /// it modified.
    pub(crate) fn apply_synced_param(&mut self, id: NodeId, param: &str, value: ParamValue) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.set_clean(param, value);
        }
        self.touch(id);
    }

    /// Clears the modified flags of one node's parameters.
    pub(crate) fn clear_modified(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.clear_modified();
        }
    }

    // --- Generation tracking ---

    /// Stamps the node with a fresh store generation.
    pub(crate) fn touch(&mut self, id: NodeId) {
        self.generation += 1;
        let generation = self.generation;
        if let Some(node) = self.nodes.get_mut(id) {
            node.changed_at = generation;
        }
    }

    /// Returns the current store generation.
    pub(crate) fn current_generation(&self) -> u64 {
        self.generation
    }

    /// Returns the newest generation across everything a component's
    /// volume depends on: the node itself, its parent (height), its
    /// dimension-link targets, and for a derived shape its siblings.
    pub(crate) fn dependency_generation(&self, id: NodeId) -> u64 {
        self.dependency_generation_at_depth(id, 0)
    }

    fn dependency_generation_at_depth(&self, id: NodeId, depth: usize) -> u64 {
        if depth > 32 {
            // Deep link chains are a cycle in the making; force
            // recomputation, where resolution reports the error.
            return u64::MAX;
        }
        let Some(node) = self.nodes.get(id) else {
            return u64::MAX;
        };
        let mut newest = node.changed_at;
        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get(parent) {
                newest = newest.max(p.changed_at);
            }
        }
        if let NodeKind::Component(comp) = &node.kind {
            for dim in comp.dims.values() {
                if let Dimension::Link { node: target, .. } = dim {
                    newest = newest.max(self.dependency_generation_at_depth(*target, depth + 1));
                }
            }
            if comp.shape == crate::geometry::ShapeKind::DerivedShape {
                if let Some(parent) = node.parent {
                    for &sibling in self.children(parent) {
                        if sibling != id {
                            newest = newest
                                .max(self.dependency_generation_at_depth(sibling, depth + 1));
                        }
                    }
                }
            }
        }
        newest
    }
}
