use crate::channel::TreeShape;

use super::{TopologyError, TopologyView};

/// Peers the calling process talks to at one level of one collective call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommSet {
    pub level: usize,
    pub shape: TreeShape,
    // group ranks, in group order
    pub members: Vec<usize>,
    pub root_index: usize,
    pub my_index: usize,
}

impl CommSet {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, index: usize) -> usize {
        self.members[index]
    }

    pub fn root(&self) -> usize {
        self.members[self.root_index]
    }

    pub fn is_root(&self) -> bool {
        self.root_index == self.my_index
    }
}

impl<'a> TopologyView<'a> {
    /// Shallowest level at which `p` still participates: the deepest level at
    /// which it holds a non-zero cluster id, or 0 if it holds none.
    pub fn first_level(&self, p: usize) -> usize {
        self.cluster_ids(p)
            .iter()
            .rposition(|&id| id != 0)
            .unwrap_or(0)
    }

    /// Build the per-level sets of `caller`. `None` marks a level where the
    /// caller has nothing to do: it is not a master there, or fewer than two
    /// masters share its color.
    pub fn comm_sets(&self, caller: usize) -> Result<Vec<Option<CommSet>>, TopologyError> {
        if caller >= self.size() {
            return Err(TopologyError::RankOutOfRange {
                rank: caller,
                size: self.size(),
            });
        }
        let model = self.model();
        let depth = self.depth(caller);
        let first_level = self.first_level(caller);
        let mut sets = Vec::with_capacity(depth);
        sets.resize(first_level, None);

        for lvl in first_level..depth {
            let color = model.colors(caller)[lvl];
            if model.cluster_size(lvl, color) < 2 {
                sets.push(None);
                continue;
            }
            let members: Vec<usize> = model
                .color_members(lvl, color)
                .into_iter()
                .filter(|&q| self.is_master(q, lvl))
                .collect();
            if members.len() < 2 {
                sets.push(None);
                continue;
            }
            let unresolved = || TopologyError::UnresolvedCommSet {
                level: lvl,
                rank: caller,
            };
            let root_index = members
                .iter()
                .position(|&q| self.cluster_ids(q)[lvl] == 0)
                .ok_or_else(unresolved)?;
            let my_index = members
                .iter()
                .position(|&q| q == caller)
                .ok_or_else(unresolved)?;
            sets.push(Some(CommSet {
                level: lvl,
                shape: self.tree_shape(lvl),
                members,
                root_index,
                my_index,
            }));
        }
        Ok(sets)
    }
}
