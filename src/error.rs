use thiserror::Error;

/// Top-level error type for the Hexcore modeling kernel.
#[derive(Debug, Error)]
pub enum HexcoreError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Errors raised by shape formulas and the derived-volume resolver.
///
/// These indicate an invalid physical model and are never downgraded
/// to warnings.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("component '{component}' has negative area {area} cm^2 on a solid material")]
    NegativeArea { component: String, area: f64 },

    #[error("component '{component}' has negative volume {volume} cm^3 on a solid material")]
    NegativeVolume { component: String, volume: f64 },

    #[error("container '{container}' holds more than one derived shape; the remainder is ambiguous")]
    MultipleDerivedShapes { container: String },

    #[error(
        "container '{container}' is oversubscribed: capacity {capacity} but \
         siblings occupy {occupied} (excess {excess})"
    )]
    OversubscribedContainer {
        container: String,
        capacity: f64,
        occupied: f64,
        excess: f64,
    },

    #[error("shape {shape} has no dimension named '{dimension}'")]
    UnknownDimension {
        shape: &'static str,
        dimension: String,
    },

    #[error("component '{component}' has no parent container; its extent is undefined")]
    MissingParent { component: String },

    #[error("component '{component}' has undefined extent: zero-height container and no area formula")]
    UndefinedExtent { component: String },

    #[error("block '{block}' height {height} cm must be positive")]
    NonPositiveHeight { block: String, height: f64 },
}

/// Errors raised by the composite tree and its parameter namespace.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("node '{child}' is already a child of '{parent}'")]
    DuplicateChild { parent: String, child: String },

    #[error("node '{child}' is not a child of '{parent}'")]
    ChildNotFound { parent: String, child: String },

    #[error(
        "cannot link dimension '{dimension}' of component '{component}': \
         no sibling named '{target}'"
    )]
    LinkingFailure {
        component: String,
        dimension: String,
        target: String,
    },

    #[error(
        "dimension '{dimension}' of component '{component}' exceeds the link \
         resolution depth limit; the link graph likely contains a cycle"
    )]
    LinkDepthExceeded {
        component: String,
        dimension: String,
    },

    #[error("node '{0}' is not a component")]
    NotAComponent(String),

    #[error("node '{0}' is not a composite")]
    NotAComposite(String),

    #[error("nuclide '{nuclide}' is present nowhere below '{node}'; cannot set a non-zero density")]
    NuclideNotFound { node: String, nuclide: String },

    #[error("node '{node}' has no parameter '{param}'")]
    ParamNotFound { node: String, param: String },

    #[error("no child of '{node}' carries parameter '{param}'")]
    NoParticipatingChildren { node: String, param: String },

    #[error("negative weight {weight} from parameter '{param}' under '{node}'")]
    NegativeWeight {
        node: String,
        param: String,
        weight: f64,
    },

    #[error("weights for parameter '{param}' under '{node}' sum to zero")]
    ZeroWeightSum { node: String, param: String },
}

/// Errors raised by axial mesh generation and state remapping.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error(
        "anchor points {lower} and {upper} cm are {spacing} cm apart, closer \
         than the minimum mesh size {min_size} cm; both mark required material \
         boundaries"
    )]
    AnchorSpacingConflict {
        lower: f64,
        upper: f64,
        spacing: f64,
        min_size: f64,
    },

    #[error(
        "mesh cell [{bottom}, {top}] cm of '{assembly}' overlaps no source \
         region; the common mesh extends outside the source span"
    )]
    EmptyMeshCell {
        assembly: String,
        bottom: f64,
        top: f64,
    },

    #[error("axial mesh is not monotonically increasing at index {index}")]
    NonMonotonicMesh { index: usize },

    #[error("no assembly shares the reference mesh point count {expected}")]
    NoComparableMesh { expected: usize },
}

/// Numerical-consistency errors from physics post-processing.
///
/// These are treated as defects requiring investigation, not
/// user-correctable input problems.
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error(
        "computed {rate_name} rate {value} on block '{block}' is negative \
         beyond floating-point noise"
    )]
    NegativeReactionRate {
        block: String,
        rate_name: &'static str,
        value: f64,
    },

    #[error("multiplication factor {keff} is not positive")]
    NonPositiveKeff { keff: f64 },
}

/// A single parameter disagreement detected during synchronization.
#[derive(Debug, Clone)]
pub struct SyncConflict {
    /// Slash-separated path of the offending node.
    pub node: String,
    /// Name of the conflicting parameter.
    pub param: String,
    /// The distinct values reported, with the ranks that reported them.
    pub values: Vec<(usize, String)>,
}

/// Errors raised by multi-process parameter synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("processes report different tree sizes: {counts:?} (rank, node count)")]
    TreeSizeMismatch { counts: Vec<(usize, usize)> },

    #[error("rank {rank} reported parameter data for unknown node path '{path}'")]
    UnknownPath { rank: usize, path: String },

    #[error("{} parameter conflict(s) after exchange: {}", .conflicts.len(), format_conflicts(.conflicts))]
    Conflict { conflicts: Vec<SyncConflict> },
}

fn format_conflicts(conflicts: &[SyncConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            let values = c
                .values
                .iter()
                .map(|(rank, value)| format!("rank {rank} -> {value}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}.{} [{values}]", c.node, c.param)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience type alias for results using [`HexcoreError`].
pub type Result<T> = std::result::Result<T, HexcoreError>;
