use crate::op::{fold_into, Element, ReduceOp};
use crate::pattern::BlockLayout;
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::tree::TreeSchedule;
use super::{CollectiveError, Communicator};

impl Communicator {
    /// Combine `send` element-wise across all processes with `op`; only
    /// `root` receives `Some`.
    ///
    /// Commutative operators fold along the topology tree. Others are
    /// gathered straight to the root and folded in ascending rank order,
    /// which costs the root one receive per process.
    pub async fn reduce<T, O>(
        &self,
        send: &[T],
        op: &O,
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        self.check_root(root)?;
        if op.is_commutative() {
            self.reduce_tree(send, op, root).await
        } else {
            self.reduce_ordered(send, op, root).await
        }
    }

    async fn reduce_tree<T, O>(
        &self,
        send: &[T],
        op: &O,
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        let view = self.model.rooted_view(root)?;
        let sets = self.comm_sets(&view)?;
        let mut acc = send.to_vec();
        for set in sets.iter().rev().flatten() {
            let tree = TreeSchedule::for_set(set);
            let step = StepHeader::new(CollOp::Reduce, Phase::Up, set.level);
            for child in tree.children() {
                let partial = self.recv_items(set.member(child), step, acc.len()).await?;
                fold_into(op, &mut acc, &partial);
            }
            if let Some(parent) = tree.parent() {
                self.send_items(set.member(parent), step, &acc).await?;
            }
        }
        Ok((self.rank == root).then_some(acc))
    }

    async fn reduce_ordered<T, O>(
        &self,
        send: &[T],
        op: &O,
        root: usize,
    ) -> Result<Option<Vec<T>>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        let step = StepHeader::new(CollOp::Reduce, Phase::Direct, 0);
        if self.rank != root {
            self.send_items(root, step, send).await?;
            return Ok(None);
        }
        let mut acc: Option<Vec<T>> = None;
        for rank in 0..self.size() {
            let contribution = if rank == root {
                send.to_vec()
            } else {
                self.recv_items(rank, step, send.len()).await?
            };
            match acc.as_mut() {
                None => acc = Some(contribution),
                Some(acc) => fold_into(op, acc, &contribution),
            }
        }
        Ok(acc)
    }

    /// Reduce to rank 0, then broadcast the result.
    pub async fn allreduce<T, O>(&self, send: &[T], op: &O) -> Result<Vec<T>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        let mut result = match self.reduce(send, op, 0).await? {
            Some(result) => result,
            None => vec![T::default(); send.len()],
        };
        self.broadcast(&mut result, 0).await?;
        Ok(result)
    }

    /// Reduce to rank 0, then hand rank r the next `recv_counts[r]` elements
    /// of the result.
    pub async fn reduce_scatter<T, O>(
        &self,
        send: &[T],
        recv_counts: &[usize],
        op: &O,
    ) -> Result<Vec<T>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        if recv_counts.len() != self.size() {
            return Err(CollectiveError::InvalidArgument(format!(
                "expected {} receive counts, got {}",
                self.size(),
                recv_counts.len()
            )));
        }
        let layout = BlockLayout::packed(recv_counts);
        self.check_len("send buffer", layout.total_len(), send.len())?;
        let reduced = self.reduce(send, op, 0).await?;
        self.scatter_layout(reduced.as_deref(), &layout, 0).await
    }

    /// Inclusive prefix reduction: rank r receives `send_0 ⊕ … ⊕ send_r`.
    pub async fn scan<T, O>(&self, send: &[T], op: &O) -> Result<Vec<T>, CollectiveError>
    where
        T: Element,
        O: ReduceOp<T> + ?Sized,
    {
        let all = self.allgather(send).await?;
        let count = send.len();
        let mut acc = send.to_vec();
        if count == 0 {
            return Ok(acc);
        }
        for (rank, block) in all.chunks(count).enumerate().take(self.rank + 1) {
            if rank == 0 {
                acc.clone_from_slice(block);
            } else {
                fold_into(op, &mut acc, block);
            }
        }
        Ok(acc)
    }
}
