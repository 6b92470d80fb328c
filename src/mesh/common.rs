use crate::error::{MeshError, Result};
use crate::math::TOLERANCE;
use crate::model::{ModelStore, NodeId};

/// Which of two nearby candidate points survives when they violate the
/// minimum mesh spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPreference {
    /// The lower point wins.
    #[default]
    Bottom,
    /// The upper point wins.
    Top,
}

/// Options controlling common-mesh generation.
#[derive(Debug, Clone, Copy)]
pub struct CommonMeshOptions {
    /// Minimum spacing between mesh points in cm. `None` disables the
    /// decusping pass entirely.
    pub min_mesh_size: Option<f64>,
    /// Tie-break direction for nearby non-anchor points.
    pub anchor_preference: AnchorPreference,
    /// Distance below which two elevations count as the same point.
    pub tolerance: f64,
}

impl Default for CommonMeshOptions {
    fn default() -> Self {
        Self {
            min_mesh_size: None,
            anchor_preference: AnchorPreference::default(),
            tolerance: 1e-4,
        }
    }
}

/// Computes a representative axial mesh over a set of assemblies.
///
/// Every assembly whose boundary count matches the first (reference)
/// assembly contributes; their boundaries average point-wise. With a
/// minimum mesh size configured, a decusping pass then pulls the mesh
/// onto fuel and control material boundaries: those anchor elevations
/// are collected across all assemblies, never dropped, and nearby
/// averaged points give way to them.
#[derive(Debug)]
pub struct CommonMesh<'a> {
    assemblies: &'a [NodeId],
    options: CommonMeshOptions,
}

impl<'a> CommonMesh<'a> {
    /// Creates the operation with default options (no decusping).
    #[must_use]
    pub fn new(assemblies: &'a [NodeId]) -> Self {
        Self {
            assemblies,
            options: CommonMeshOptions::default(),
        }
    }

    /// Sets the generation options.
    #[must_use]
    pub fn with_options(mut self, options: CommonMeshOptions) -> Self {
        self.options = options;
        self
    }

    /// Executes the operation, returning the mesh boundary elevations
    /// in ascending order (bottom and top included).
    ///
    /// # Errors
    ///
    /// Returns an error when no assembly is given, elevations are
    /// missing, the averaged mesh is not monotonic, or two required
    /// anchor points violate the minimum spacing.
    pub fn execute(&self, store: &ModelStore) -> Result<Vec<f64>> {
        let Some(&reference) = self.assemblies.first() else {
            return Err(MeshError::NoComparableMesh { expected: 0 }.into());
        };
        let reference_mesh = store.axial_mesh(reference)?;

        let mut meshes = Vec::new();
        for &assembly in self.assemblies {
            let mesh = store.axial_mesh(assembly)?;
            // Assemblies with a dissimilar discretization (e.g. a
            // control assembly with extra slices) would skew the
            // point-wise average; leave them out.
            if mesh.len() == reference_mesh.len() {
                meshes.push(mesh);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let count = meshes.len() as f64;
        let mut averaged = vec![0.0; reference_mesh.len()];
        for mesh in &meshes {
            for (slot, z) in averaged.iter_mut().zip(mesh) {
                *slot += z;
            }
        }
        for slot in &mut averaged {
            *slot /= count;
        }
        for (index, pair) in averaged.windows(2).enumerate() {
            if pair[1] - pair[0] <= TOLERANCE {
                return Err(MeshError::NonMonotonicMesh { index: index + 1 }.into());
            }
        }

        match self.options.min_mesh_size {
            Some(min_size) => self.decusp(store, &averaged, min_size),
            None => Ok(averaged),
        }
    }

    /// Adjusts the averaged mesh to respect material boundaries.
    fn decusp(&self, store: &ModelStore, averaged: &[f64], min_size: f64) -> Result<Vec<f64>> {
        let mut anchors = vec![averaged[0], averaged[averaged.len() - 1]];
        for &assembly in self.assemblies {
            for block in store.blocks(assembly) {
                if store.node(block)?.flags().anchors_mesh() {
                    let span = store.axial_span(block)?;
                    anchors.push(span.bottom);
                    anchors.push(span.top);
                }
            }
        }
        anchors.sort_by(f64::total_cmp);
        anchors.dedup_by(|a, b| (*a - *b).abs() <= self.options.tolerance);

        // Anchors are never dropped, so two distinct anchors closer
        // than the minimum spacing cannot be satisfied.
        for pair in anchors.windows(2) {
            let spacing = pair[1] - pair[0];
            if spacing < min_size - TOLERANCE {
                return Err(MeshError::AnchorSpacingConflict {
                    lower: pair[0],
                    upper: pair[1],
                    spacing,
                    min_size,
                }
                .into());
            }
        }

        let mut candidates = averaged.to_vec();
        if self.options.anchor_preference == AnchorPreference::Top {
            candidates.reverse();
        }
        let mut kept = anchors;
        for candidate in candidates {
            if kept.iter().all(|&k| (k - candidate).abs() >= min_size) {
                kept.push(candidate);
            }
        }
        kept.sort_by(f64::total_cmp);
        Ok(kept)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{CompositeKind, RegionFlags};

    const FUEL: RegionFlags = RegionFlags {
        fuel: true,
        control: false,
        shield_radial: false,
    };

    fn assembly(store: &mut ModelStore, name: &str, blocks: &[(f64, RegionFlags)]) -> NodeId {
        let assembly = store.add_composite(None, CompositeKind::Assembly, name);
        for (index, (height, flags)) in blocks.iter().enumerate() {
            store.add_block(assembly, &format!("b{index}"), *height, "AA", *flags);
        }
        store.update_elevations(assembly, 0.0).unwrap();
        assembly
    }

    #[test]
    fn averages_comparable_meshes_point_wise() {
        let mut store = ModelStore::new();
        let plain = RegionFlags::default();
        let a = assembly(&mut store, "a1", &[(30.0, plain), (70.0, plain)]);
        let b = assembly(&mut store, "a2", &[(30.4, plain), (69.6, plain)]);
        let mesh = CommonMesh::new(&[a, b]).execute(&store).unwrap();
        assert_eq!(mesh.len(), 3);
        assert!((mesh[0] - 0.0).abs() < 1e-12);
        assert!((mesh[1] - 30.2).abs() < 1e-9);
        assert!((mesh[2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn dissimilar_point_counts_are_excluded() {
        let mut store = ModelStore::new();
        let plain = RegionFlags::default();
        let a = assembly(&mut store, "a1", &[(50.0, plain), (50.0, plain)]);
        // Three blocks: a different discretization.
        let b = assembly(
            &mut store,
            "a2",
            &[(20.0, plain), (30.0, plain), (50.0, plain)],
        );
        let mesh = CommonMesh::new(&[a, b]).execute(&store).unwrap();
        assert_eq!(mesh, vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn anchors_displace_nearby_averaged_points() {
        let mut store = ModelStore::new();
        let plain = RegionFlags::default();
        let a = assembly(&mut store, "a1", &[(30.0, FUEL), (30.0, plain), (40.0, plain)]);
        let b = assembly(&mut store, "a2", &[(30.4, FUEL), (29.6, plain), (40.0, plain)]);
        let options = CommonMeshOptions {
            min_mesh_size: Some(0.25),
            ..CommonMeshOptions::default()
        };
        let mesh = CommonMesh::new(&[a, b])
            .with_options(options)
            .execute(&store)
            .unwrap();
        // Fuel tops at 30.0 and 30.4 are anchors; the averaged 30.2 is
        // within the minimum spacing of both and gives way.
        assert!(mesh.contains(&30.0));
        assert!(mesh.contains(&30.4));
        assert!(!mesh.iter().any(|&z| (z - 30.2).abs() < 1e-9));
    }

    #[test]
    fn conflicting_anchors_are_fatal() {
        let mut store = ModelStore::new();
        let plain = RegionFlags::default();
        let a = assembly(&mut store, "a1", &[(40.0, plain), (60.0, FUEL)]);
        let b = assembly(&mut store, "a2", &[(40.3, plain), (59.7, FUEL)]);
        // Fuel bottoms at 40.0 and 40.3 cm, 0.3 cm apart, with a
        // 0.5 cm minimum: both are required boundaries.
        let options = CommonMeshOptions {
            min_mesh_size: Some(0.5),
            ..CommonMeshOptions::default()
        };
        let err = CommonMesh::new(&[a, b])
            .with_options(options)
            .execute(&store)
            .unwrap_err();
        assert!(err.to_string().contains("anchor"));
    }

    #[test]
    fn preference_decides_between_close_non_anchor_points() {
        let mut store = ModelStore::new();
        let plain = RegionFlags::default();
        let layout = &[(10.0, plain), (0.1, plain), (9.9, plain)];
        let a = assembly(&mut store, "a1", layout);

        let near = |mesh: &[f64], z: f64| mesh.iter().any(|&p| (p - z).abs() < 1e-9);

        let bottom = CommonMesh::new(&[a])
            .with_options(CommonMeshOptions {
                min_mesh_size: Some(0.5),
                anchor_preference: AnchorPreference::Bottom,
                ..CommonMeshOptions::default()
            })
            .execute(&store)
            .unwrap();
        assert!(near(&bottom, 10.0) && !near(&bottom, 10.1));

        let top = CommonMesh::new(&[a])
            .with_options(CommonMeshOptions {
                min_mesh_size: Some(0.5),
                anchor_preference: AnchorPreference::Top,
                ..CommonMeshOptions::default()
            })
            .execute(&store)
            .unwrap();
        assert!(near(&top, 10.1) && !near(&top, 10.0));
    }

    #[test]
    fn no_assemblies_is_an_error() {
        let store = ModelStore::new();
        assert!(CommonMesh::new(&[]).execute(&store).is_err());
    }
}
