pub mod local;
pub mod message;

use async_trait::async_trait;
use bytes::Bytes;

pub type TransportError = anyhow::Error;

/// Point-to-point byte transport between the ranks of one group.
///
/// Messages between one ordered pair of ranks are delivered in the order they
/// were sent; nothing is assumed across different pairs. Either call may
/// suspend for an arbitrary time.
#[async_trait]
pub trait Transport: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    async fn send(&self, peer: usize, payload: Bytes) -> Result<(), TransportError>;

    async fn recv(&self, peer: usize) -> Result<Bytes, TransportError>;
}
