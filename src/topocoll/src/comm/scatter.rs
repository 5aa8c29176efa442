use crate::op::Element;
use crate::pattern::BlockLayout;
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::{relayout, CollectiveError, Communicator, SetPlan};

impl Communicator {
    /// Split `send` at `root` into equal blocks and hand block r to rank r.
    /// Only `root` passes `Some`.
    pub async fn scatter<T: Element>(
        &self,
        send: Option<&[T]>,
        count: usize,
        root: usize,
    ) -> Result<Vec<T>, CollectiveError> {
        let counts = vec![count; self.size()];
        let layout = BlockLayout::packed(&counts);
        self.scatter_layout(send, &layout, root).await
    }

    /// Hand rank r the `counts[r]` elements at `displs[r]` of the root's
    /// buffer. `counts` and `displs` are identical at every process.
    pub async fn scatterv<T: Element>(
        &self,
        send: Option<&[T]>,
        counts: &[usize],
        displs: &[usize],
        root: usize,
    ) -> Result<Vec<T>, CollectiveError> {
        let layout = self.check_layout(counts, displs)?;
        self.scatter_layout(send, &layout, root).await
    }

    pub(super) async fn scatter_layout<T: Element>(
        &self,
        send: Option<&[T]>,
        layout: &BlockLayout,
        root: usize,
    ) -> Result<Vec<T>, CollectiveError> {
        self.check_root(root)?;
        let counts: Vec<usize> = (0..self.size()).map(|r| layout.block(r).len).collect();
        let scratch_layout = BlockLayout::packed(&counts);
        let mut scratch = vec![T::default(); scratch_layout.total_len()];
        if self.rank == root {
            let send = send.ok_or_else(|| {
                CollectiveError::InvalidArgument("scatter root has no send buffer".to_string())
            })?;
            if send.len() < layout.total_len() {
                return Err(CollectiveError::InvalidArgument(format!(
                    "scatter buffer holds {} elements, layout needs {}",
                    send.len(),
                    layout.total_len()
                )));
            }
            relayout(send, layout, &mut scratch, &scratch_layout);
        }

        let view = self.model.rooted_view(root)?;
        let sets = self.comm_sets(&view)?;
        for set in sets.iter().flatten() {
            let plan = SetPlan::new(&view, set);
            let tree = &plan.tree;
            let step = StepHeader::new(CollOp::Scatter, Phase::Down, set.level);
            if let Some(parent) = tree.parent() {
                let ranks = plan.subtree_ranks(set.my_index);
                let pattern = scratch_layout.pattern(&ranks);
                self.recv_pattern(set.member(parent), step, &mut scratch, &pattern)
                    .await?;
            }
            for child in tree.children().into_iter().rev() {
                let ranks = plan.subtree_ranks(child);
                let pattern = scratch_layout.pattern(&ranks);
                self.send_pattern(set.member(child), step, &scratch, &pattern)
                    .await?;
            }
        }
        Ok(scratch[scratch_layout.block(self.rank).range()].to_vec())
    }
}
