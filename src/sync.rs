//! Multi-process parameter synchronization.
//!
//! Worker processes each hold a full copy of the tree and mutate
//! disjoint parts independently (e.g. distinct physics solves per
//! branch). Afterwards they reconcile through a blocking all-to-all
//! exchange of modified parameters. Two processes reporting *different*
//! values for the same logical parameter is a conflict and fatal —
//! never resolved by last-write-wins.

use std::collections::BTreeMap;

use crate::error::{Result, SyncConflict, SyncError};
use crate::model::{ModelStore, NodeId, ParamValue};

/// One modified parameter of one node, addressed by tree path.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyEntry {
    /// Path of the node below the synchronization root.
    pub path: String,
    /// Parameter name.
    pub param: String,
    /// The locally-held value.
    pub value: ParamValue,
}

/// Everything one process contributes to an exchange.
#[derive(Debug, Clone)]
pub struct DirtySnapshot {
    /// Rank of the contributing process.
    pub rank: usize,
    /// Node count of the subtree, for cross-process shape checking.
    pub node_count: usize,
    /// Modified parameters since the last synchronization.
    pub entries: Vec<DirtyEntry>,
}

/// The collective transport: hands the local snapshot to every peer
/// and returns everyone's snapshots (the local one included).
///
/// A blocking, all-or-nothing operation; implementations surface
/// transport failures as errors, which abort the synchronization.
pub trait ParameterExchange {
    /// Performs the all-to-all exchange.
    ///
    /// # Errors
    ///
    /// Returns an error when the exchange cannot complete.
    fn all_gather(&mut self, local: DirtySnapshot) -> Result<Vec<DirtySnapshot>>;
}

/// In-process stand-in for the collective, fed with the snapshots the
/// other ranks would send. Also the test fixture.
#[derive(Debug, Default)]
pub struct LocalExchange {
    /// Snapshots of the other ranks.
    pub peers: Vec<DirtySnapshot>,
}

impl ParameterExchange for LocalExchange {
    fn all_gather(&mut self, local: DirtySnapshot) -> Result<Vec<DirtySnapshot>> {
        let mut all = vec![local];
        all.extend(self.peers.iter().cloned());
        Ok(all)
    }
}

/// Collects the modified parameters of a subtree into a snapshot.
#[must_use]
pub fn collect_dirty(store: &ModelStore, root: NodeId, rank: usize) -> DirtySnapshot {
    let mut nodes = vec![root];
    nodes.extend(store.descendants(root));
    let node_count = nodes.len();
    let mut entries = Vec::new();
    for id in nodes {
        let Some(path) = store.relative_path(root, id) else {
            continue;
        };
        if let Ok(node) = store.node(id) {
            for (param, value) in node.params().modified() {
                entries.push(DirtyEntry {
                    path: path.clone(),
                    param: param.to_string(),
                    value: value.clone(),
                });
            }
        }
    }
    DirtySnapshot {
        rank,
        node_count,
        entries,
    }
}

/// Synchronizes a subtree's parameters across processes.
///
/// Exchanges the local dirty set with every peer, verifies tree shapes
/// match, detects conflicts, applies the union of everyone's changes,
/// and clears all modified flags. Returns the number of parameters
/// applied.
pub struct SyncParameters<'a> {
    root: NodeId,
    rank: usize,
    exchange: &'a mut dyn ParameterExchange,
}

impl<'a> SyncParameters<'a> {
    /// Creates the operation for a subtree and this process's rank.
    #[must_use]
    pub fn new(root: NodeId, rank: usize, exchange: &'a mut dyn ParameterExchange) -> Self {
        Self {
            root,
            rank,
            exchange,
        }
    }

    /// Executes the synchronization.
    ///
    /// # Errors
    ///
    /// Returns an error when tree sizes differ across ranks, a peer
    /// names an unknown node path, or two ranks disagree on a value.
    pub fn execute(&mut self, store: &mut ModelStore) -> Result<usize> {
        let local = collect_dirty(store, self.root, self.rank);
        let expected_nodes = local.node_count;
        let snapshots = self.exchange.all_gather(local)?;

        let mismatched: Vec<(usize, usize)> = snapshots
            .iter()
            .filter(|s| s.node_count != expected_nodes)
            .map(|s| (s.rank, s.node_count))
            .collect();
        if !mismatched.is_empty() {
            let mut counts = vec![(self.rank, expected_nodes)];
            counts.extend(mismatched);
            return Err(SyncError::TreeSizeMismatch { counts }.into());
        }

        // Gather every report per (node, param).
        let mut reported: BTreeMap<(String, String), Vec<(usize, ParamValue)>> = BTreeMap::new();
        for snapshot in &snapshots {
            for entry in &snapshot.entries {
                reported
                    .entry((entry.path.clone(), entry.param.clone()))
                    .or_default()
                    .push((snapshot.rank, entry.value.clone()));
            }
        }

        let mut conflicts = Vec::new();
        for ((path, param), reports) in &reported {
            let (_, first) = &reports[0];
            if reports.iter().any(|(_, value)| value != first) {
                conflicts.push(SyncConflict {
                    node: path.clone(),
                    param: param.clone(),
                    values: reports
                        .iter()
                        .map(|(rank, value)| (*rank, value.to_string()))
                        .collect(),
                });
            }
        }
        if !conflicts.is_empty() {
            return Err(SyncError::Conflict { conflicts }.into());
        }

        let mut applied = 0;
        for ((path, param), reports) in reported {
            let Some(node) = store.resolve_path(self.root, &path) else {
                return Err(SyncError::UnknownPath {
                    rank: reports[0].0,
                    path,
                }
                .into());
            };
            if let Some((_, value)) = reports.into_iter().next() {
                store.apply_synced_param(node, &param, value);
                applied += 1;
            }
        }

        let mut nodes = vec![self.root];
        nodes.extend(store.descendants(self.root));
        for id in nodes {
            store.clear_modified(id);
        }
        Ok(applied)
    }
}
