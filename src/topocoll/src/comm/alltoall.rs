use crate::op::Element;
use crate::pattern::IndexedPattern;
use crate::topology::{CommSet, TopologyError, TopologyView};
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::allgather::complement;
use super::{CollectiveError, Communicator, SetPlan};

/// Blocks of `count` keyed by (src, dst), where block (src, dst) carries what
/// `src` sends to `dst`. Only pairs touching a held rank have room: rows for
/// held sources, then columns for held destinations.
struct PairGrid {
    size: usize,
    count: usize,
    // position among the held ranks
    slot: Vec<Option<usize>>,
    held: usize,
}

impl PairGrid {
    fn new(size: usize, count: usize, held: &[usize]) -> Self {
        let mut slot = vec![None; size];
        for (i, &rank) in held.iter().enumerate() {
            slot[rank] = Some(i);
        }
        PairGrid {
            size,
            count,
            slot,
            held: held.len(),
        }
    }

    fn len(&self) -> usize {
        2 * self.held * self.size * self.count
    }

    fn offset(&self, src: usize, dst: usize) -> Option<usize> {
        let block = match (self.slot[src], self.slot[dst]) {
            (Some(s), _) => s * self.size + dst,
            (None, Some(d)) => (self.held + d) * self.size + src,
            (None, None) => return None,
        };
        Some(block * self.count)
    }

    fn pairs(&self, srcs: &[usize], dsts: &[usize]) -> Option<IndexedPattern> {
        let offsets = srcs
            .iter()
            .flat_map(|&src| dsts.iter().map(move |&dst| (src, dst)))
            .map(|(src, dst)| self.offset(src, dst))
            .collect::<Option<Vec<_>>>()?;
        Some(IndexedPattern::uniform(self.count, offsets))
    }

    /// Blocks leaving the subtree covering `covered`.
    fn outbound(&self, covered: &[usize]) -> Option<IndexedPattern> {
        self.pairs(covered, &complement(self.size, covered))
    }

    /// Blocks entering the subtree covering `covered`.
    fn inbound(&self, covered: &[usize]) -> Option<IndexedPattern> {
        self.pairs(&complement(self.size, covered), covered)
    }
}

/// Ranks whose blocks pass through `me`: what its subtree covers at the
/// shallowest level it takes part in. Every deeper subtree of `me` nests
/// inside it.
fn held_ranks(view: &TopologyView<'_>, sets: &[Option<CommSet>], me: usize) -> Vec<usize> {
    match sets.iter().flatten().next() {
        Some(set) => SetPlan::new(view, set).subtree_ranks(set.my_index),
        None => vec![me],
    }
}

impl Communicator {
    /// `send` holds one block of `send.len() / size` elements per destination
    /// rank. The result holds, at block r, what rank r sent to this process.
    pub async fn alltoall<T: Element>(&self, send: &[T]) -> Result<Vec<T>, CollectiveError> {
        let size = self.size();
        if send.len() % size != 0 {
            return Err(CollectiveError::InvalidArgument(format!(
                "alltoall buffer of {} elements does not split over {} ranks",
                send.len(),
                size
            )));
        }
        let count = send.len() / size;
        let view = self.model.view();
        let sets = self.comm_sets(&view)?;
        let grid = PairGrid::new(size, count, &held_ranks(&view, &sets, self.rank));
        log::trace!(
            "alltoall scratch at rank {}: {} of {} elements",
            self.rank,
            grid.len(),
            size * send.len()
        );

        let unheld = |level| {
            CollectiveError::from(TopologyError::UnresolvedCommSet {
                level,
                rank: self.rank,
            })
        };
        let mut scratch = vec![T::default(); grid.len()];
        let row = grid.offset(self.rank, 0).ok_or_else(|| unheld(0))?;
        scratch[row..row + send.len()].clone_from_slice(send);

        for set in sets.iter().rev().flatten() {
            let plan = SetPlan::new(&view, set);
            let step = StepHeader::new(CollOp::AllToAll, Phase::Up, set.level);
            for child in plan.tree.children() {
                let pattern = grid
                    .outbound(&plan.subtree_ranks(child))
                    .ok_or_else(|| unheld(set.level))?;
                self.recv_pattern(set.member(child), step, &mut scratch, &pattern)
                    .await?;
            }
            if let Some(parent) = plan.tree.parent() {
                let pattern = grid
                    .outbound(&plan.subtree_ranks(set.my_index))
                    .ok_or_else(|| unheld(set.level))?;
                self.send_pattern(set.member(parent), step, &scratch, &pattern)
                    .await?;
            }
        }

        for set in sets.iter().flatten() {
            let plan = SetPlan::new(&view, set);
            let step = StepHeader::new(CollOp::AllToAll, Phase::Down, set.level);
            if let Some(parent) = plan.tree.parent() {
                let pattern = grid
                    .inbound(&plan.subtree_ranks(set.my_index))
                    .ok_or_else(|| unheld(set.level))?;
                self.recv_pattern(set.member(parent), step, &mut scratch, &pattern)
                    .await?;
            }
            for child in plan.tree.children().into_iter().rev() {
                let pattern = grid
                    .inbound(&plan.subtree_ranks(child))
                    .ok_or_else(|| unheld(set.level))?;
                self.send_pattern(set.member(child), step, &scratch, &pattern)
                    .await?;
            }
        }

        let mut recv = Vec::with_capacity(send.len());
        for src in 0..size {
            let at = grid.offset(src, self.rank).ok_or_else(|| unheld(0))?;
            recv.extend_from_slice(&scratch[at..at + count]);
        }
        Ok(recv)
    }
}
