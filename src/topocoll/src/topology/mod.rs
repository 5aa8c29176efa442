pub mod build;
pub mod commset;
pub mod view;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{LevelKind, ProcessId, TreeShape};

pub use commset::CommSet;
pub use view::TopologyView;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Group has no members")]
    EmptyGroup,
    #[error("{0} appears more than once in the group")]
    DuplicateMember(ProcessId),
    #[error("No channel information for {0}")]
    MissingChannelInfo(ProcessId),
    #[error("{process} reports unrecognized protocol {kind:?}")]
    UnrecognizedProtocol { process: ProcessId, kind: String },
    #[error("Level {level} is {found:?} at rank {rank} but {expected:?} at lower ranks")]
    LevelKindMismatch {
        level: usize,
        rank: usize,
        expected: LevelKind,
        found: LevelKind,
    },
    #[error("Channel match at level {level} between ranks {p} and {q} is not symmetric")]
    AsymmetricMatch { level: usize, p: usize, q: usize },
    #[error("Channel match at level {level} between ranks {p} and {q} is not transitive")]
    NonTransitiveMatch { level: usize, p: usize, q: usize },
    #[error("Ranks {p} and {q} share a color at level {level} but not one level coarser")]
    NonNestedLevels { level: usize, p: usize, q: usize },
    #[error("Group splits into {0} unreachable partitions at the coarsest level")]
    Disconnected(usize),
    #[error("Cannot resolve the peers of rank {rank} at level {level}")]
    UnresolvedCommSet { level: usize, rank: usize },
    #[error("Rank {rank} is outside a group of {size}")]
    RankOutOfRange { rank: usize, size: usize },
}

/// Per-process rows of varying length stored in one buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jagged<T> {
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone> Jagged<T> {
    pub fn from_lengths(lengths: &[usize], fill: T) -> Self {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for len in lengths {
            total += len;
            offsets.push(total);
        }
        Jagged {
            offsets,
            data: vec![fill; total],
        }
    }
}

impl<T> Jagged<T> {
    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn row(&self, p: usize) -> &[T] {
        &self.data[self.offsets[p]..self.offsets[p + 1]]
    }

    pub fn row_mut(&mut self, p: usize) -> &mut [T] {
        &mut self.data[self.offsets[p]..self.offsets[p + 1]]
    }

    pub fn get(&self, p: usize, lvl: usize) -> Option<&T> {
        self.row(p).get(lvl)
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Jagged<U> {
        Jagged {
            offsets: self.offsets.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<T>>
    where
        T: Clone,
    {
        (0..self.num_rows()).map(|p| self.row(p).to_vec()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelInfo {
    pub kind: LevelKind,
    pub shape: TreeShape,
}

/// Multi-level description of the communication paths of one group.
///
/// Built once when the group is created and read-only afterwards. Per-call
/// root-relative cluster ids are produced as private [`TopologyView`]s.
#[derive(Clone, Debug)]
pub struct TopologyModel {
    pub(crate) size: usize,
    pub(crate) depths: Vec<usize>,
    pub(crate) levels: Vec<LevelInfo>,
    pub(crate) colors: Jagged<usize>,
    pub(crate) cluster_ids: Jagged<usize>,
    pub(crate) ranks: Jagged<usize>,
    // [lvl][color] -> number of processes
    pub(crate) cluster_sizes: Vec<Vec<usize>>,
    // [lvl][color] -> number of distinct cluster ids
    pub(crate) cluster_counts: Vec<Vec<usize>>,
}

/// Read-only copy of the depths and colors of a group, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyAttributes {
    pub depths: Vec<usize>,
    pub colors: Vec<Vec<usize>>,
}

impl TopologyModel {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_depth(&self) -> usize {
        self.levels.len()
    }

    pub fn depth(&self, p: usize) -> usize {
        self.depths[p]
    }

    pub fn depths(&self) -> &[usize] {
        &self.depths
    }

    pub fn level(&self, lvl: usize) -> LevelInfo {
        self.levels[lvl]
    }

    /// Shallowest level of the given kind, if any process has one.
    pub fn find_level(&self, kind: LevelKind) -> Option<usize> {
        self.levels.iter().position(|level| level.kind == kind)
    }

    pub fn tree_shape(&self, lvl: usize) -> TreeShape {
        self.levels[lvl].shape
    }

    pub fn colors(&self, p: usize) -> &[usize] {
        self.colors.row(p)
    }

    pub fn color(&self, p: usize, lvl: usize) -> Option<usize> {
        self.colors.get(p, lvl).copied()
    }

    pub fn cluster_id(&self, p: usize, lvl: usize) -> Option<usize> {
        self.cluster_ids.get(p, lvl).copied()
    }

    /// Position of `p` in group order among the processes sharing its color at `lvl`.
    pub fn rank_in_color(&self, p: usize, lvl: usize) -> Option<usize> {
        self.ranks.get(p, lvl).copied()
    }

    pub fn num_colors(&self, lvl: usize) -> usize {
        self.cluster_sizes[lvl].len()
    }

    pub fn cluster_size(&self, lvl: usize, color: usize) -> usize {
        self.cluster_sizes[lvl][color]
    }

    pub fn num_cluster_ids(&self, lvl: usize, color: usize) -> usize {
        self.cluster_counts[lvl][color]
    }

    /// Members of a color group at `lvl`, in group order.
    pub fn color_members(&self, lvl: usize, color: usize) -> Vec<usize> {
        let mut members = vec![0; self.cluster_sizes[lvl][color]];
        for p in 0..self.size {
            if self.color(p, lvl) == Some(color) {
                members[self.ranks.row(p)[lvl]] = p;
            }
        }
        members
    }

    /// The canonical view: rank 0 is the representative at every level.
    pub fn view(&self) -> TopologyView<'_> {
        TopologyView::canonical(self)
    }

    /// A private view in which `root` holds cluster id 0 at each of its levels.
    pub fn rooted_view(&self, root: usize) -> Result<TopologyView<'_>, TopologyError> {
        TopologyView::rooted(self, root)
    }

    pub fn is_master(&self, p: usize, lvl: usize) -> bool {
        self.view().is_master(p, lvl)
    }

    pub fn attributes(&self) -> TopologyAttributes {
        TopologyAttributes {
            depths: self.depths.clone(),
            colors: self.colors.to_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::StaticChannelInfo;
    use crate::topology::fixtures::{fabric_and_tcp, layout, members};

    #[test]
    fn jagged_rows_have_their_own_length() {
        let mut table = Jagged::from_lengths(&[3, 0, 4], 7usize);
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.row(0), &[7, 7, 7]);
        assert!(table.row(1).is_empty());
        table.row_mut(2)[3] = 1;
        assert_eq!(table.get(2, 3), Some(&1));
        assert_eq!(table.get(1, 0), None);
        let doubled = table.map(|v| v * 2);
        assert_eq!(doubled.row(2), &[14, 14, 14, 2]);
    }

    #[test]
    fn levels_are_found_by_kind() {
        let info = StaticChannelInfo::new()
            .with_process(ProcessId(0), fabric_and_tcp("h0", "l0", "ib"))
            .with_process(ProcessId(1), fabric_and_tcp("h0", "l0", "ib"));
        let model = TopologyModel::build(&members(2), &info).unwrap();
        assert_eq!(model.find_level(LevelKind::Wan), Some(0));
        assert_eq!(model.find_level(LevelKind::Lan), Some(1));
        assert_eq!(model.find_level(LevelKind::Fabric), Some(3));

        let (info, ids) = layout(&[("a", "x"), ("b", "y")]);
        let model = TopologyModel::build(&ids, &info).unwrap();
        assert_eq!(model.find_level(LevelKind::Fabric), None);
    }
}
