#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;

use topocoll::transport::local::LinkStats;
use topocoll::{
    Communicator, GroupId, LocalFabric, ProcessId, Protocol, StaticChannelInfo, TopologyModel,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One process per entry: `(lan, host, fabric session)`.
pub fn topology(entries: &[(&str, &str, Option<&str>)]) -> (StaticChannelInfo, Vec<ProcessId>) {
    let mut info = StaticChannelInfo::new();
    for (rank, (lan, host, session)) in entries.iter().enumerate() {
        let mut protocols = vec![Protocol::Tcp {
            hostname: host.to_string(),
            lan: lan.to_string(),
        }];
        if let Some(session) = session {
            protocols.push(Protocol::Fabric {
                session: session.to_string(),
            });
        }
        info.insert(ProcessId(rank), protocols);
    }
    let members = (0..entries.len()).map(ProcessId).collect();
    (info, members)
}

/// Every process on its own host inside one LAN.
pub fn single_lan(n: usize) -> (StaticChannelInfo, Vec<ProcessId>) {
    let hosts: Vec<String> = (0..n).map(|i| format!("h{}", i)).collect();
    let entries: Vec<_> = hosts.iter().map(|h| ("lan", h.as_str(), None)).collect();
    topology(&entries)
}

/// Every process in a LAN of its own.
pub fn wan_singletons(n: usize) -> (StaticChannelInfo, Vec<ProcessId>) {
    let names: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
    let entries: Vec<_> = names.iter().map(|s| (s.as_str(), s.as_str(), None)).collect();
    topology(&entries)
}

/// Two LANs of `a` and `b` hosts, `a` first in rank order.
pub fn two_lans(a: usize, b: usize) -> (StaticChannelInfo, Vec<ProcessId>) {
    let hosts: Vec<String> = (0..a + b).map(|i| format!("h{}", i)).collect();
    let entries: Vec<_> = hosts
        .iter()
        .enumerate()
        .map(|(i, h)| (if i < a { "a" } else { "b" }, h.as_str(), None))
        .collect();
    topology(&entries)
}

/// Three LANs, a shared host, a fabric session and ranks interleaved across sites.
pub fn mixed() -> (StaticChannelInfo, Vec<ProcessId>) {
    topology(&[
        ("a", "x", None),
        ("b", "y", Some("f1")),
        ("a", "z", None),
        ("c", "w", None),
        ("b", "y", Some("f1")),
        ("a", "x", None),
        ("b", "v", None),
        ("b", "y", None),
    ])
}

pub struct Group {
    pub comms: Vec<Communicator>,
    pub stats: Arc<LinkStats>,
}

impl Group {
    pub fn new(info: &StaticChannelInfo, members: Vec<ProcessId>) -> Self {
        Self::on_fabric(LocalFabric::new(members.len()), info, members)
    }

    /// All ranks share one model, as they would share one provider.
    pub fn on_fabric(
        fabric: LocalFabric,
        info: &StaticChannelInfo,
        members: Vec<ProcessId>,
    ) -> Self {
        init_logger();
        let model = Arc::new(TopologyModel::build(&members, info).unwrap());
        let stats = fabric.stats();
        let comms = fabric
            .endpoints()
            .into_iter()
            .map(|t| {
                Communicator::with_model(GroupId(0), members.clone(), Box::new(t), Arc::clone(&model))
                    .unwrap()
            })
            .collect();
        Group { comms, stats }
    }

    pub fn size(&self) -> usize {
        self.comms.len()
    }

    /// Run `f` at every rank concurrently on one executor.
    pub fn run<'a, F, Fut, R>(&'a self, f: F) -> Vec<R>
    where
        F: Fn(&'a Communicator) -> Fut,
        Fut: Future<Output = R> + 'a,
    {
        smol::block_on(join_all(self.comms.iter().map(f)))
    }
}

pub fn all_topologies() -> Vec<(&'static str, (StaticChannelInfo, Vec<ProcessId>))> {
    vec![
        ("single lan", single_lan(5)),
        ("two lans", two_lans(3, 4)),
        ("wan singletons", wan_singletons(5)),
        ("mixed", mixed()),
        ("lone process", single_lan(1)),
    ]
}
