use crate::op::Element;
use crate::pattern::BlockLayout;
use crate::topology::{CommSet, TopologyView};
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::{relayout, CollectiveError, Communicator, SetPlan};

impl Communicator {
    /// Collect `send` from every process at `root`, in rank order. Every
    /// process contributes the same number of elements. Only `root` receives
    /// `Some`.
    pub async fn gather<T: Element>(
        &self,
        send: &[T],
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError> {
        let counts = vec![send.len(); self.size()];
        let layout = BlockLayout::packed(&counts);
        self.gather_layout(send, &layout, root).await
    }

    /// Gather blocks of varying size: rank r's block lands at `displs[r]` in
    /// the root's buffer. `counts` and `displs` are identical at every process.
    pub async fn gatherv<T: Element>(
        &self,
        send: &[T],
        counts: &[usize],
        displs: &[usize],
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError> {
        let layout = self.check_layout(counts, displs)?;
        self.gather_layout(send, &layout, root).await
    }

    async fn gather_layout<T: Element>(
        &self,
        send: &[T],
        layout: &BlockLayout,
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError> {
        self.check_root(root)?;
        let my_count = layout.block(self.rank).len;
        self.check_len("send buffer", my_count, send.len())?;
        let view = self.model.rooted_view(root)?;
        let sets = self.comm_sets(&view)?;

        let counts: Vec<usize> = (0..self.size()).map(|r| layout.block(r).len).collect();
        let scratch_layout = BlockLayout::packed(&counts);
        let mut scratch = vec![T::default(); scratch_layout.total_len()];
        scratch[scratch_layout.block(self.rank).range()].clone_from_slice(send);

        self.gather_up(&view, &sets, CollOp::Gather, &scratch_layout, &mut scratch)
            .await?;

        if self.rank != root {
            return Ok(None);
        }
        let mut recv = vec![T::default(); layout.total_len()];
        relayout(&scratch, &scratch_layout, &mut recv, layout);
        Ok(Some(recv))
    }

    /// Fan the per-rank blocks of `scratch` in toward the view's root, deepest
    /// level first. On return the caller holds the blocks of every rank its
    /// subtrees cover; the root holds all of them.
    pub(super) async fn gather_up<T: Element>(
        &self,
        view: &TopologyView<'_>,
        sets: &[Option<CommSet>],
        op: CollOp,
        scratch_layout: &BlockLayout,
        scratch: &mut [T],
    ) -> Result<(), CollectiveError> {
        for set in sets.iter().rev().flatten() {
            let plan = SetPlan::new(view, set);
            let tree = &plan.tree;
            let step = StepHeader::new(op, Phase::Up, set.level);
            for child in tree.children() {
                let ranks = plan.subtree_ranks(child);
                let pattern = scratch_layout.pattern(&ranks);
                self.recv_pattern(set.member(child), step, scratch, &pattern)
                    .await?;
            }
            if let Some(parent) = tree.parent() {
                let ranks = plan.subtree_ranks(set.my_index);
                let pattern = scratch_layout.pattern(&ranks);
                self.send_pattern(set.member(parent), step, scratch, &pattern)
                    .await?;
            }
        }
        Ok(())
    }
}
