//! Derived-quantity queries over the composite tree: areas, volumes,
//! masses, homogenized number densities, and parameter statistics.
//!
//! These extend [`crate::model::ModelStore`] with the recursive
//! computation engine; the arena itself stays in `model`.

mod mass;
mod stats;
mod volume;
