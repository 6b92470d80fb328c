use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::model::{ModelStore, NodeId, NodeKind};

/// Scoped backup/restore guard for a subtree's mutable state.
///
/// On construction, every node of the subtree pushes a snapshot of its
/// parameters and (for components) dimensions, number densities,
/// temperature, and volume cache. On drop, everything not named in the
/// keep-list rolls back, whatever happened inside the scope — early
/// returns, `?` propagation, and panics included.
///
/// Dimension links are snapshotted structurally, so a restored link is
/// the live reference itself, never a frozen scalar copy of its value.
/// Guards nest: each node keeps a backup stack.
#[derive(Debug)]
pub struct StateRetainer<'a> {
    store: &'a mut ModelStore,
    nodes: Vec<NodeId>,
    keep: Vec<String>,
}

impl ModelStore {
    /// Pushes a backup of one node's parameters and component state.
    ///
    /// Dimension links are snapshotted as links; the other end is a
    /// handle, so a later restore re-installs the live reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the store.
    pub fn back_up(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.back_up();
            if let NodeKind::Component(comp) = &mut node.kind {
                comp.back_up();
            }
        }
        Ok(())
    }

    /// Pops and applies one node's most recent backup. Parameters named
    /// in `keep` retain their current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the store.
    pub fn restore_backup(&mut self, id: NodeId, keep: &[&str]) -> Result<()> {
        self.node(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.params.restore_backup(keep);
            if let NodeKind::Component(comp) = &mut node.kind {
                comp.restore_backup();
            }
        }
        self.touch(id);
        Ok(())
    }

    /// Begins a retained-state scope over `root` and its descendants.
    ///
    /// Parameters named in `keep` retain whatever value they hold when
    /// the scope exits; everything else restores to its pre-scope
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not in the store.
    pub fn retain_state(&mut self, root: NodeId, keep: &[&str]) -> Result<StateRetainer<'_>> {
        self.node(root)?;
        let mut nodes = vec![root];
        nodes.extend(self.descendants(root));
        for &id in &nodes {
            self.back_up(id)?;
        }
        Ok(StateRetainer {
            store: self,
            nodes,
            keep: keep.iter().map(|k| (*k).to_string()).collect(),
        })
    }
}

impl Deref for StateRetainer<'_> {
    type Target = ModelStore;

    fn deref(&self) -> &ModelStore {
        self.store
    }
}

impl DerefMut for StateRetainer<'_> {
    fn deref_mut(&mut self) -> &mut ModelStore {
        self.store
    }
}

impl Drop for StateRetainer<'_> {
    fn drop(&mut self) {
        let keep: Vec<&str> = self.keep.iter().map(String::as_str).collect();
        for &id in &self.nodes {
            // Nodes discarded inside the scope have nothing to restore.
            if let Some(node) = self.store.nodes.get_mut(id) {
                node.params.restore_backup(&keep);
                if let NodeKind::Component(comp) = &mut node.kind {
                    comp.restore_backup();
                }
            }
        }
    }
}
