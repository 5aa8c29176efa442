use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use smol::channel::{Receiver, Sender};

use super::{Transport, TransportError};

pub type LinkDelay = Arc<dyn Fn(usize, usize) -> Duration + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub messages: usize,
    pub bytes: usize,
}

/// Per-link traffic seen by a [`LocalFabric`], keyed by (sender, receiver).
#[derive(Debug, Default)]
pub struct LinkStats {
    links: DashMap<(usize, usize), LinkCounters>,
}

impl LinkStats {
    fn record(&self, src: usize, dst: usize, bytes: usize) {
        let mut counters = self.links.entry((src, dst)).or_default();
        counters.messages += 1;
        counters.bytes += bytes;
    }

    pub fn link(&self, src: usize, dst: usize) -> LinkCounters {
        self.links
            .get(&(src, dst))
            .map(|c| *c)
            .unwrap_or_default()
    }

    pub fn total_messages(&self) -> usize {
        self.links.iter().map(|c| c.messages).sum()
    }

    /// All links that carried traffic, sorted by (sender, receiver).
    pub fn links(&self) -> Vec<((usize, usize), LinkCounters)> {
        let mut links: Vec<_> = self.links.iter().map(|e| (*e.key(), *e.value())).collect();
        links.sort_unstable_by_key(|(link, _)| *link);
        links
    }

    pub fn clear(&self) {
        self.links.clear();
    }
}

/// In-process fabric connecting `size` ranks with one FIFO channel per
/// ordered pair.
pub struct LocalFabric {
    size: usize,
    delay: Option<LinkDelay>,
    stats: Arc<LinkStats>,
}

impl LocalFabric {
    pub fn new(size: usize) -> Self {
        LocalFabric {
            size,
            delay: None,
            stats: Arc::new(LinkStats::default()),
        }
    }

    /// Delay every send from `src` to `dst` by `delay(src, dst)`.
    pub fn with_link_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(usize, usize) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }

    pub fn endpoints(self) -> Vec<LocalTransport> {
        let n = self.size;
        let links: Vec<(Sender<Bytes>, Receiver<Bytes>)> =
            (0..n * n).map(|_| smol::channel::unbounded()).collect();
        (0..n)
            .map(|rank| LocalTransport {
                rank,
                size: n,
                to_peers: (0..n).map(|dst| links[rank * n + dst].0.clone()).collect(),
                from_peers: (0..n).map(|src| links[src * n + rank].1.clone()).collect(),
                delay: self.delay.clone(),
                stats: Arc::clone(&self.stats),
            })
            .collect()
    }
}

pub struct LocalTransport {
    rank: usize,
    size: usize,
    to_peers: Vec<Sender<Bytes>>,
    from_peers: Vec<Receiver<Bytes>>,
    delay: Option<LinkDelay>,
    stats: Arc<LinkStats>,
}

impl LocalTransport {
    fn check_peer(&self, peer: usize) -> Result<(), TransportError> {
        if peer >= self.size || peer == self.rank {
            return Err(anyhow!(
                "rank {} cannot address peer {} on a fabric of {}",
                self.rank,
                peer,
                self.size
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn send(&self, peer: usize, payload: Bytes) -> Result<(), TransportError> {
        self.check_peer(peer)?;
        if let Some(delay) = &self.delay {
            let duration = delay(self.rank, peer);
            if !duration.is_zero() {
                smol::Timer::after(duration).await;
            }
        }
        self.stats.record(self.rank, peer, payload.len());
        log::trace!("link {} -> {}: {} bytes", self.rank, peer, payload.len());
        self.to_peers[peer]
            .send(payload)
            .await
            .map_err(|_| anyhow!("link {} -> {} is closed", self.rank, peer))
    }

    async fn recv(&self, peer: usize) -> Result<Bytes, TransportError> {
        self.check_peer(peer)?;
        self.from_peers[peer]
            .recv()
            .await
            .map_err(|_| anyhow!("link {} -> {} is closed", peer, self.rank))
    }
}
