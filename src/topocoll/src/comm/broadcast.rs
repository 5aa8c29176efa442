use crate::op::Element;
use crate::transport::message::{CollOp, Phase, StepHeader};

use super::tree::TreeSchedule;
use super::{CollectiveError, Communicator};

impl Communicator {
    /// Copy `buf` from `root` into `buf` at every process. All processes
    /// pass buffers of the same length.
    pub async fn broadcast<T: Element>(
        &self,
        buf: &mut [T],
        root: usize,
    ) -> Result<(), CollectiveError> {
        self.check_root(root)?;
        let view = self.model.rooted_view(root)?;
        let sets = self.comm_sets(&view)?;
        for set in sets.iter().flatten() {
            let tree = TreeSchedule::for_set(set);
            let step = StepHeader::new(CollOp::Broadcast, Phase::Down, set.level);
            if tree.is_root() {
                log::trace!(
                    "broadcast level {}: {:?} tree of {} in {} rounds",
                    set.level,
                    set.shape,
                    set.size(),
                    tree.rounds()
                );
            }
            if let Some(parent) = tree.parent() {
                let items = self.recv_items(set.member(parent), step, buf.len()).await?;
                buf.clone_from_slice(&items);
            }
            for child in tree.children().into_iter().rev() {
                self.send_items(set.member(child), step, buf).await?;
            }
        }
        Ok(())
    }
}
