use std::borrow::Cow;

use itertools::Itertools;

use crate::channel::TreeShape;

use super::{Jagged, TopologyError, TopologyModel};

/// Cluster ids of a group as seen by one collective call.
///
/// The canonical view borrows the model's table. A rooted view owns a rotated
/// copy, so concurrent calls with different roots never share mutable state.
#[derive(Clone, Debug)]
pub struct TopologyView<'a> {
    model: &'a TopologyModel,
    root: usize,
    cluster_ids: Cow<'a, Jagged<usize>>,
}

impl<'a> TopologyView<'a> {
    pub(crate) fn canonical(model: &'a TopologyModel) -> Self {
        TopologyView {
            model,
            root: 0,
            cluster_ids: Cow::Borrowed(&model.cluster_ids),
        }
    }

    pub(crate) fn rooted(model: &'a TopologyModel, root: usize) -> Result<Self, TopologyError> {
        if root >= model.size {
            return Err(TopologyError::RankOutOfRange {
                rank: root,
                size: model.size,
            });
        }
        let mut view = Self::canonical(model);
        view.reindex_for_root(root);
        Ok(view)
    }

    /// Rotate ids inside each of `root`'s (level, color) groups so that `root`
    /// holds id 0 wherever it participates. Applying it twice for the same
    /// root changes nothing the second time.
    pub fn reindex_for_root(&mut self, root: usize) {
        let model = self.model;
        self.root = root;
        for lvl in 0..model.depths[root] {
            let root_id = self.cluster_ids.row(root)[lvl];
            if root_id == 0 {
                continue;
            }
            let color = model.colors.row(root)[lvl];
            let n_ids = model.cluster_counts[lvl][color];
            let shift = n_ids - root_id;
            let cluster_ids = self.cluster_ids.to_mut();
            for p in 0..model.size {
                if model.colors.get(p, lvl) == Some(&color) {
                    let id = &mut cluster_ids.row_mut(p)[lvl];
                    *id = (*id + shift) % n_ids;
                }
            }
            log::trace!(
                "Reindexed level {} color {} by {} for root {}",
                lvl,
                color,
                shift,
                root
            );
        }
    }

    pub fn model(&self) -> &'a TopologyModel {
        self.model
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn size(&self) -> usize {
        self.model.size
    }

    pub fn depth(&self, p: usize) -> usize {
        self.model.depths[p]
    }

    pub fn color(&self, p: usize, lvl: usize) -> Option<usize> {
        self.model.color(p, lvl)
    }

    pub fn cluster_id(&self, p: usize, lvl: usize) -> Option<usize> {
        self.cluster_ids.get(p, lvl).copied()
    }

    pub fn cluster_ids(&self, p: usize) -> &[usize] {
        self.cluster_ids.row(p)
    }

    pub fn tree_shape(&self, lvl: usize) -> TreeShape {
        self.model.tree_shape(lvl)
    }

    /// Whether `p` is the sole representative of its subtree at every level
    /// below `lvl`, i.e. it holds id 0 at all of its levels deeper than `lvl`.
    pub fn is_master(&self, p: usize, lvl: usize) -> bool {
        let ids = self.cluster_ids.row(p);
        ids.len() > lvl && ids[lvl + 1..].iter().all(|&id| id == 0)
    }

    /// Processes represented by `p` at `lvl`: those sharing its color and its
    /// cluster id there, which is its finer cluster one level down.
    pub fn represented(&self, p: usize, lvl: usize) -> Vec<usize> {
        let (Some(color), Some(id)) = (self.color(p, lvl), self.cluster_id(p, lvl)) else {
            return Vec::new();
        };
        let color_members = self.model.color_members(lvl, color);
        color_members
            .into_iter()
            .filter(|&q| self.cluster_ids.row(q)[lvl] == id)
            .collect()
    }

    /// Processes represented by each of `members` at `lvl`, from one pass over
    /// their color group. The members share a color and hold distinct cluster
    /// ids at `lvl`, as the members of a comm set do; each list is in group
    /// order.
    pub fn represented_by(&self, members: &[usize], lvl: usize) -> Vec<Vec<usize>> {
        let mut represented = vec![Vec::new(); members.len()];
        let Some(color) = members.first().and_then(|&m| self.color(m, lvl)) else {
            return represented;
        };
        let mut owner = vec![None; self.model.num_cluster_ids(lvl, color)];
        for (index, &m) in members.iter().enumerate() {
            if self.color(m, lvl) != Some(color) {
                continue;
            }
            if let Some(slot) = self.cluster_id(m, lvl).and_then(|id| owner.get_mut(id)) {
                *slot = Some(index);
            }
        }
        for q in self.model.color_members(lvl, color) {
            let id = self.cluster_ids.row(q)[lvl];
            if let Some(index) = owner.get(id).copied().flatten() {
                represented[index].push(q);
            }
        }
        represented
    }

    /// Union of the processes represented by `members` at `lvl`, in group order.
    pub fn covered<I>(&self, members: I, lvl: usize) -> Vec<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let wanted: Vec<(usize, usize)> = members
            .into_iter()
            .filter_map(|m| Some((self.color(m, lvl)?, self.cluster_id(m, lvl)?)))
            .sorted_unstable()
            .dedup()
            .collect();
        let wanted = &wanted;
        wanted
            .iter()
            .map(|&(color, _)| color)
            .dedup()
            .flat_map(|color| {
                self.model
                    .color_members(lvl, color)
                    .into_iter()
                    .filter(move |&q| {
                        let id = self.cluster_ids.row(q)[lvl];
                        wanted.binary_search(&(color, id)).is_ok()
                    })
            })
            .sorted_unstable()
            .collect()
    }
}
