use itertools::{EitherOrBoth, Itertools};

use crate::op::Element;
use crate::pattern::BlockLayout;
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::{relayout, CollectiveError, Communicator, SetPlan};

impl Communicator {
    /// Every process ends up with every process's `send`, in rank order.
    pub async fn allgather<T: Element>(&self, send: &[T]) -> Result<Vec<T>, CollectiveError> {
        let layout = BlockLayout::uniform(self.size(), send.len());
        self.allgather_layout(send, &layout).await
    }

    pub async fn allgatherv<T: Element>(
        &self,
        send: &[T],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<Vec<T>, CollectiveError> {
        let layout = self.check_layout(counts, displs)?;
        self.allgather_layout(send, &layout).await
    }

    async fn allgather_layout<T: Element>(
        &self,
        send: &[T],
        layout: &BlockLayout,
    ) -> Result<Vec<T>, CollectiveError> {
        self.check_len("send buffer", layout.block(self.rank).len, send.len())?;
        let counts: Vec<usize> = (0..self.size()).map(|r| layout.block(r).len).collect();
        let scratch_layout = BlockLayout::packed(&counts);
        let mut scratch = vec![T::default(); scratch_layout.total_len()];
        scratch[scratch_layout.block(self.rank).range()].clone_from_slice(send);

        let view = self.model.view();
        let sets = self.comm_sets(&view)?;
        self.gather_up(&view, &sets, CollOp::AllGather, &scratch_layout, &mut scratch)
            .await?;

        // a node already holds what its own subtree covers; ship the rest
        for set in sets.iter().flatten() {
            let plan = SetPlan::new(&view, set);
            let tree = &plan.tree;
            let step = StepHeader::new(CollOp::AllGather, Phase::Down, set.level);
            if let Some(parent) = tree.parent() {
                let held = plan.subtree_ranks(set.my_index);
                let missing = complement(self.size(), &held);
                let pattern = scratch_layout.pattern(&missing);
                self.recv_pattern(set.member(parent), step, &mut scratch, &pattern)
                    .await?;
            }
            for child in tree.children().into_iter().rev() {
                let held = plan.subtree_ranks(child);
                let missing = complement(self.size(), &held);
                let pattern = scratch_layout.pattern(&missing);
                self.send_pattern(set.member(child), step, &scratch, &pattern)
                    .await?;
            }
        }

        let mut recv = vec![T::default(); layout.total_len()];
        relayout(&scratch, &scratch_layout, &mut recv, layout);
        Ok(recv)
    }
}

/// Ranks of `0..size` not in the sorted list `held`.
pub(super) fn complement(size: usize, held: &[usize]) -> Vec<usize> {
    (0..size)
        .merge_join_by(held.iter().copied(), |a, b| a.cmp(b))
        .filter_map(|either| match either {
            EitherOrBoth::Left(rank) => Some(rank),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::complement;

    #[test]
    fn complement_of_sorted_ranks() {
        assert_eq!(complement(6, &[1, 2, 5]), vec![0, 3, 4]);
        assert!(complement(3, &[0, 1, 2]).is_empty());
        assert_eq!(complement(2, &[]), vec![0, 1]);
    }
}
