use crate::transport::message::{CollOp, Phase, StepHeader};

use super::tree::TreeSchedule;
use super::{CollectiveError, Communicator};

impl Communicator {
    /// Returns only after every process of the group has entered.
    pub async fn barrier(&self) -> Result<(), CollectiveError> {
        let view = self.model.view();
        let sets = self.comm_sets(&view)?;

        for set in sets.iter().rev().flatten() {
            let tree = TreeSchedule::for_set(set);
            let step = StepHeader::new(CollOp::Barrier, Phase::Up, set.level);
            for child in tree.children() {
                self.recv_items::<()>(set.member(child), step, 0).await?;
            }
            if let Some(parent) = tree.parent() {
                self.send_items::<()>(set.member(parent), step, &[]).await?;
            }
        }

        for set in sets.iter().flatten() {
            let tree = TreeSchedule::for_set(set);
            let step = StepHeader::new(CollOp::Barrier, Phase::Down, set.level);
            if let Some(parent) = tree.parent() {
                self.recv_items::<()>(set.member(parent), step, 0).await?;
            }
            for child in tree.children().into_iter().rev() {
                self.send_items::<()>(set.member(child), step, &[]).await?;
            }
        }
        log::trace!("{} rank {} left barrier", self.id, self.rank);
        Ok(())
    }
}
