//! Contracts for the external physics collaborators: the global flux
//! solver and the cross-section library.
//!
//! Only the data exchanged with the kernel is defined here; the solver
//! numerics live in separate programs driven by the host application.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{params, ModelStore, NodeId};

/// Real or adjoint flux problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemType {
    /// Forward flux.
    #[default]
    Real,
    /// Adjoint flux.
    Adjoint,
}

/// Eigenvalue or fixed-source driving mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// Solve for keff.
    #[default]
    Eigenvalue,
    /// Solve with an imposed external source.
    FixedSource,
}

/// Outer boundary condition of the global problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryCondition {
    /// No incoming flux.
    #[default]
    Vacuum,
    /// Mirror symmetry.
    Reflective,
    /// Repeating lattice.
    Periodic,
}

/// How often the solver runs over a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveCadence {
    /// Once, at beginning of life.
    BeginningOfLife,
    /// At the start of every cycle.
    BeginningOfCycle,
    /// At every time node.
    #[default]
    EveryNode,
    /// Inside every coupled iteration.
    EveryCoupledIteration,
}

/// Configuration handed to a global flux solver.
#[derive(Debug, Clone)]
pub struct GlobalFluxOptions {
    /// Forward or adjoint.
    pub problem_type: ProblemType,
    /// Eigenvalue or fixed-source.
    pub source_mode: SourceMode,
    /// Outer boundary condition.
    pub boundary: BoundaryCondition,
    /// Convergence criterion on the eigenvalue.
    pub eigenvalue_tolerance: f64,
    /// Convergence criterion on the pointwise flux.
    pub flux_tolerance: f64,
    /// Core symmetry factor of the modeled fraction (1, 3, ...).
    pub symmetry_factor: f64,
    /// Execution cadence.
    pub cadence: SolveCadence,
}

impl Default for GlobalFluxOptions {
    fn default() -> Self {
        Self {
            problem_type: ProblemType::default(),
            source_mode: SourceMode::default(),
            boundary: BoundaryCondition::default(),
            eigenvalue_tolerance: 1e-7,
            flux_tolerance: 1e-5,
            symmetry_factor: 1.0,
            cadence: SolveCadence::default(),
        }
    }
}

/// Results a flux solver hands back through the parameter namespace.
#[derive(Debug, Clone)]
pub struct FluxSolution {
    /// Converged multiplication factor.
    pub keff: f64,
    /// Multigroup flux per block, n/cm^2/s.
    pub block_flux: Vec<(NodeId, Vec<f64>)>,
}

/// An external global flux solver.
///
/// Implementations wrap whatever code the host runs (diffusion,
/// transport, an external binary); the kernel only sees the options in
/// and the solution out.
pub trait FluxSolver {
    /// Runs the solver against a (possibly uniform-mesh) tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the solve fails or does not converge.
    fn execute(
        &self,
        options: &GlobalFluxOptions,
        store: &ModelStore,
        root: NodeId,
    ) -> Result<FluxSolution>;
}

/// Writes a flux solution into the tree's parameter namespace:
/// `mgFlux`, group-integrated `flux`, and `keff` on the root.
pub fn apply_solution(store: &mut ModelStore, root: NodeId, solution: &FluxSolution) {
    store.set_param(root, params::KEFF, solution.keff);
    for (block, flux) in &solution.block_flux {
        store.set_param(*block, params::FLUX, flux.iter().sum());
        store.set_param_vec(*block, params::MG_FLUX, flux.clone());
    }
}

/// Microscopic multigroup cross sections for one nuclide in one
/// cross-section group, in barns.
#[derive(Debug, Clone, Default)]
pub struct MicroXs {
    /// Radiative capture.
    pub capture: Vec<f64>,
    /// Fission.
    pub fission: Vec<f64>,
    /// (n,2n).
    pub n2n: Vec<f64>,
    /// Neutrons emitted per fission, per group.
    pub neutrons_per_fission: Vec<f64>,
}

/// Cross-section library keyed by nuclide name and cross-section group
/// label.
pub trait XsLibrary {
    /// Returns the microscopic cross sections, or `None` when the
    /// nuclide is not in the library for that label.
    fn micro_xs(&self, nuclide: &str, xs_label: &str) -> Option<&MicroXs>;
}

/// In-memory cross-section library.
///
/// The natural adapter for host-side data as well as the fixture used
/// in tests.
#[derive(Debug, Clone, Default)]
pub struct MapXsLibrary {
    entries: HashMap<(String, String), MicroXs>,
}

impl MapXsLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts cross sections for a nuclide under a label.
    pub fn insert(&mut self, nuclide: &str, xs_label: &str, xs: MicroXs) {
        self.entries
            .insert((nuclide.to_string(), xs_label.to_string()), xs);
    }
}

impl XsLibrary for MapXsLibrary {
    fn micro_xs(&self, nuclide: &str, xs_label: &str) -> Option<&MicroXs> {
        self.entries
            .get(&(nuclide.to_string(), xs_label.to_string()))
    }
}
