use std::collections::BTreeMap;
use std::fmt;

/// Height of a block in cm.
pub const HEIGHT: &str = "height";
/// Bottom elevation of a block in cm.
pub const ZBOTTOM: &str = "zbottom";
/// Top elevation of a block in cm.
pub const ZTOP: &str = "ztop";
/// Symmetry factor of a region (e.g. 3.0 in a 1/3-core model).
pub const SYMMETRY_FACTOR: &str = "symmetryFactor";
/// Cross-section group label of a block.
pub const XS_TYPE: &str = "xsType";
/// Multigroup neutron flux, n/cm^2/s per group.
pub const MG_FLUX: &str = "mgFlux";
/// Group-integrated neutron flux, n/cm^2/s.
pub const FLUX: &str = "flux";
/// Block power in W.
pub const POWER: &str = "power";
/// Power density in W/cm^3.
pub const PDENS: &str = "pdens";
/// Peak power density in W/cm^3.
pub const PEAK_PDENS: &str = "ppdens";
/// Burnup in percent of initial heavy-metal atoms fissioned.
pub const BURNUP: &str = "percentBu";
/// Effective multiplication factor.
pub const KEFF: &str = "keff";
/// Absorption reaction rate, 1/cm^3/s.
pub const RATE_ABS: &str = "rateAbs";
/// Fission reaction rate, 1/cm^3/s.
pub const RATE_FIS: &str = "rateFis";
/// Capture reaction rate, 1/cm^3/s.
pub const RATE_CAP: &str = "rateCap";
/// (n,2n) reaction rate, 1/cm^3/s.
pub const RATE_N2N: &str = "rateN2n";
/// Neutron production rate from fission, 1/cm^3/s.
pub const RATE_PROD_FIS: &str = "rateProdFis";
/// Neutron production rate from (n,2n), 1/cm^3/s.
pub const RATE_PROD_N2N: &str = "rateProdN2n";

/// A value in a node's parameter namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A scalar physical quantity.
    Float(f64),
    /// A per-group quantity (e.g. multigroup flux).
    FloatVec(Vec<f64>),
    /// A label (e.g. a cross-section type).
    Text(String),
}

impl ParamValue {
    /// Returns the scalar value, or `None` for non-scalar variants.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the vector value, or `None` for non-vector variants.
    #[must_use]
    pub fn as_vec(&self) -> Option<&[f64]> {
        match self {
            Self::FloatVec(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the text value, or `None` for non-text variants.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::FloatVec(v) => write!(f, "{v:?}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ParamEntry {
    value: ParamValue,
    modified: bool,
}

/// String-keyed parameter namespace of one node.
///
/// Every `set` marks the entry as modified since the last multi-process
/// synchronization. Backups form a stack, so scoped state retention
/// nests.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    entries: BTreeMap<String, ParamEntry>,
    backups: Vec<BTreeMap<String, ParamEntry>>,
}

impl ParamStore {
    /// Creates an empty parameter store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a parameter, or `None` when unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Returns a scalar parameter, or `None` when unset or non-scalar.
    #[must_use]
    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_float)
    }

    /// Returns a vector parameter, or `None` when unset or non-vector.
    #[must_use]
    pub fn vec(&self, key: &str) -> Option<&[f64]> {
        self.get(key).and_then(ParamValue::as_vec)
    }

    /// Returns a text parameter, or `None` when unset or non-text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_text)
    }

    /// Returns whether the parameter is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sets a parameter and marks it modified.
    pub fn set(&mut self, key: &str, value: ParamValue) {
        self.entries.insert(
            key.to_string(),
            ParamEntry {
                value,
                modified: true,
            },
        );
    }

    /// Sets a parameter without marking it modified.
    ///
    /// Used when applying already-synchronized values from other
    /// processes and when restoring backups.
    pub fn set_clean(&mut self, key: &str, value: ParamValue) {
        self.entries.insert(
            key.to_string(),
            ParamEntry {
                value,
                modified: false,
            },
        );
    }

    /// Removes a parameter, returning its value if it was set.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Iterates over all `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Iterates over parameters modified since the last synchronization.
    pub fn modified(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.modified)
            .map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Clears the modified flag of every parameter.
    pub fn clear_modified(&mut self) {
        for entry in self.entries.values_mut() {
            entry.modified = false;
        }
    }

    /// Pushes a snapshot of all parameters onto the backup stack.
    pub fn back_up(&mut self) {
        self.backups.push(self.entries.clone());
    }

    /// Pops the most recent backup and restores it.
    ///
    /// Parameters named in `keep` retain their current (post-backup)
    /// state instead of being rolled back. A call without a matching
    /// `back_up` is a no-op.
    pub fn restore_backup(&mut self, keep: &[&str]) {
        let Some(mut saved) = self.backups.pop() else {
            return;
        };
        for &key in keep {
            match self.entries.get(key) {
                Some(entry) => {
                    saved.insert(key.to_string(), entry.clone());
                }
                None => {
                    saved.remove(key);
                }
            }
        }
        self.entries = saved;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut p = ParamStore::new();
        p.set(HEIGHT, ParamValue::Float(25.0));
        assert!((p.float(HEIGHT).unwrap() - 25.0).abs() < 1e-12);
        assert!(p.float(POWER).is_none());
    }

    #[test]
    fn set_marks_modified_and_clear_resets() {
        let mut p = ParamStore::new();
        p.set(POWER, ParamValue::Float(1.0));
        assert_eq!(p.modified().count(), 1);
        p.clear_modified();
        assert_eq!(p.modified().count(), 0);
    }

    #[test]
    fn set_clean_does_not_mark_modified() {
        let mut p = ParamStore::new();
        p.set_clean(POWER, ParamValue::Float(1.0));
        assert_eq!(p.modified().count(), 0);
    }

    #[test]
    fn backup_restores_previous_values() {
        let mut p = ParamStore::new();
        p.set(POWER, ParamValue::Float(1.0));
        p.back_up();
        p.set(POWER, ParamValue::Float(99.0));
        p.set(BURNUP, ParamValue::Float(3.0));
        p.restore_backup(&[]);
        assert!((p.float(POWER).unwrap() - 1.0).abs() < 1e-12);
        assert!(!p.contains(BURNUP));
    }

    #[test]
    fn keep_list_survives_restore() {
        let mut p = ParamStore::new();
        p.set(POWER, ParamValue::Float(1.0));
        p.back_up();
        p.set(POWER, ParamValue::Float(99.0));
        p.set(BURNUP, ParamValue::Float(3.0));
        p.restore_backup(&[BURNUP]);
        assert!((p.float(POWER).unwrap() - 1.0).abs() < 1e-12);
        assert!((p.float(BURNUP).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn backups_nest() {
        let mut p = ParamStore::new();
        p.set(POWER, ParamValue::Float(1.0));
        p.back_up();
        p.set(POWER, ParamValue::Float(2.0));
        p.back_up();
        p.set(POWER, ParamValue::Float(3.0));
        p.restore_backup(&[]);
        assert!((p.float(POWER).unwrap() - 2.0).abs() < 1e-12);
        p.restore_backup(&[]);
        assert!((p.float(POWER).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn restore_without_backup_is_noop() {
        let mut p = ParamStore::new();
        p.set(POWER, ParamValue::Float(1.0));
        p.restore_backup(&[]);
        assert!((p.float(POWER).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn text_and_vec_params() {
        let mut p = ParamStore::new();
        p.set(XS_TYPE, ParamValue::Text("AA".into()));
        p.set(MG_FLUX, ParamValue::FloatVec(vec![1.0, 2.0]));
        assert_eq!(p.text(XS_TYPE).unwrap(), "AA");
        assert_eq!(p.vec(MG_FLUX).unwrap().len(), 2);
    }
}
