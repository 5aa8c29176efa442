pub mod tree;

mod allgather;
mod alltoall;
mod barrier;
mod broadcast;
mod gather;
mod reduce;
mod scatter;

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{ChannelInfoProvider, ProcessId};
use crate::op::Element;
use crate::pattern::{BlockLayout, IndexedPattern};
use crate::registry::AttributeCache;
use crate::topology::{CommSet, TopologyAttributes, TopologyError, TopologyModel, TopologyView};
use crate::transport::message::{self, ProtocolViolation, StepHeader};
use crate::transport::{Transport, TransportError};

use tree::TreeSchedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum CollectiveError {
    #[error("Transport: {0}")]
    Transport(#[from] TransportError),
    #[error("Message codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("Topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("Root {root} is outside a group of {size}")]
    InvalidRoot { root: usize, size: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// One process's handle on a group.
///
/// Creating it builds the group's [`TopologyModel`]; the model is read-only
/// afterwards and every collective works on a private view of it, so
/// collectives on different roots never disturb each other.
pub struct Communicator {
    id: GroupId,
    rank: usize,
    members: Vec<ProcessId>,
    model: Arc<TopologyModel>,
    transport: Box<dyn Transport>,
    published: Option<Arc<AttributeCache>>,
}

impl Communicator {
    pub fn new<P>(
        id: GroupId,
        members: Vec<ProcessId>,
        transport: Box<dyn Transport>,
        provider: &P,
    ) -> Result<Self, CollectiveError>
    where
        P: ChannelInfoProvider + ?Sized,
    {
        let model = TopologyModel::build(&members, provider)?;
        Self::with_model(id, members, transport, Arc::new(model))
    }

    /// Join a group whose model was already built from the same provider data.
    pub fn with_model(
        id: GroupId,
        members: Vec<ProcessId>,
        transport: Box<dyn Transport>,
        model: Arc<TopologyModel>,
    ) -> Result<Self, CollectiveError> {
        if transport.size() != members.len() || model.size() != members.len() {
            return Err(CollectiveError::InvalidArgument(format!(
                "{} members, transport of {}, topology of {}",
                members.len(),
                transport.size(),
                model.size()
            )));
        }
        let rank = transport.rank();
        log::debug!(
            "{} rank {} joined, depth {} of max {}",
            id,
            rank,
            model.depth(rank),
            model.max_depth()
        );
        Ok(Communicator {
            id,
            rank,
            members,
            model,
            transport,
            published: None,
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[ProcessId] {
        &self.members
    }

    pub fn model(&self) -> &Arc<TopologyModel> {
        &self.model
    }

    pub fn attributes(&self) -> TopologyAttributes {
        self.model.attributes()
    }

    /// Publish this group's depths and colors; withdrawn again on drop.
    pub fn publish_attributes(&mut self, cache: &Arc<AttributeCache>) {
        if self.published.is_some() {
            return;
        }
        cache.publish(self.id, || self.model.attributes());
        self.published = Some(Arc::clone(cache));
    }

    fn check_root(&self, root: usize) -> Result<(), CollectiveError> {
        if root >= self.size() {
            return Err(CollectiveError::InvalidRoot {
                root,
                size: self.size(),
            });
        }
        Ok(())
    }

    fn check_layout(
        &self,
        counts: &[usize],
        displs: &[usize],
    ) -> Result<BlockLayout, CollectiveError> {
        if counts.len() != self.size() || displs.len() != self.size() {
            return Err(CollectiveError::InvalidArgument(format!(
                "expected {} counts and displacements, got {} and {}",
                self.size(),
                counts.len(),
                displs.len()
            )));
        }
        Ok(BlockLayout::with_displs(counts, displs))
    }

    fn check_len(&self, what: &str, expected: usize, found: usize) -> Result<(), CollectiveError> {
        if expected != found {
            return Err(CollectiveError::InvalidArgument(format!(
                "{} holds {} elements, expected {}",
                what, found, expected
            )));
        }
        Ok(())
    }

    fn comm_sets(&self, view: &TopologyView<'_>) -> Result<Vec<Option<CommSet>>, CollectiveError> {
        let sets = view.comm_sets(self.rank)?;
        log::trace!(
            "{} rank {} root {}: active levels {:?}",
            self.id,
            self.rank,
            view.root(),
            sets.iter().flatten().map(|s| s.level).collect::<Vec<_>>()
        );
        Ok(sets)
    }

    async fn send_items<T: Element>(
        &self,
        peer: usize,
        step: StepHeader,
        items: &[T],
    ) -> Result<(), CollectiveError> {
        let payload = message::encode(step, items)?;
        log::trace!("{} {} -> {} {:?} x{}", self.id, self.rank, peer, step, items.len());
        self.transport.send(peer, payload).await?;
        Ok(())
    }

    async fn recv_items<T: Element>(
        &self,
        peer: usize,
        step: StepHeader,
        expected_len: usize,
    ) -> Result<Vec<T>, CollectiveError> {
        let payload = self.transport.recv(peer).await?;
        let (header, items) = message::decode::<T>(&payload)?;
        step.check(peer, header, expected_len, items.len())?;
        Ok(items)
    }

    async fn send_pattern<T: Element>(
        &self,
        peer: usize,
        step: StepHeader,
        buf: &[T],
        pattern: &IndexedPattern,
    ) -> Result<(), CollectiveError> {
        self.send_items(peer, step, &pattern.pack(buf)).await
    }

    async fn recv_pattern<T: Element>(
        &self,
        peer: usize,
        step: StepHeader,
        buf: &mut [T],
        pattern: &IndexedPattern,
    ) -> Result<(), CollectiveError> {
        let items = self.recv_items(peer, step, pattern.len()).await?;
        pattern.unpack(buf, items);
        Ok(())
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        if let Some(cache) = self.published.take() {
            cache.retire(self.id);
        }
    }
}

/// A comm set with its tree and the ranks each member stands for, resolved
/// once per call.
struct SetPlan<'s> {
    set: &'s CommSet,
    tree: TreeSchedule,
    represented: Vec<Vec<usize>>,
}

impl<'s> SetPlan<'s> {
    fn new(view: &TopologyView<'_>, set: &'s CommSet) -> Self {
        SetPlan {
            set,
            tree: TreeSchedule::for_set(set),
            represented: view.represented_by(&set.members, set.level),
        }
    }

    /// Group ranks whose data travels with the subtree under `index`, sorted.
    fn subtree_ranks(&self, index: usize) -> Vec<usize> {
        self.tree
            .subtree(index)
            .into_iter()
            .map(|i| self.represented[i].iter().copied())
            .kmerge()
            .collect()
    }
}

/// Copy each rank's block between two layouts of the same counts.
fn relayout<T: Clone>(src: &[T], from: &BlockLayout, dst: &mut [T], to: &BlockLayout) {
    for rank in 0..from.num_ranks() {
        let (a, b) = (from.block(rank), to.block(rank));
        dst[b.range()].clone_from_slice(&src[a.range()]);
    }
}
