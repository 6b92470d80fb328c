//! Axial mesh uniformization: building a common mesh across
//! assemblies, constructing homogenized copies on it, and mapping
//! state between the original and uniform representations with
//! overlap-weighted conservation rules.

mod common;
mod reactions;
mod uniform;

pub use common::{AnchorPreference, CommonMesh, CommonMeshOptions};
pub use reactions::ComputeReactionRates;
pub use uniform::{ParamCategory, ParamMapper, UniformMeshConverter};
