use crate::channel::{ProcessId, Protocol, StaticChannelInfo};

pub fn tcp(host: &str, lan: &str) -> Protocol {
    Protocol::Tcp {
        hostname: host.to_string(),
        lan: lan.to_string(),
    }
}

pub fn fabric_and_tcp(host: &str, lan: &str, session: &str) -> Vec<Protocol> {
    vec![
        tcp(host, lan),
        Protocol::Fabric {
            session: session.to_string(),
        },
    ]
}

pub fn members(n: usize) -> Vec<ProcessId> {
    (0..n).map(ProcessId).collect()
}

/// One tcp-only process per `(lan, host)` entry, in group order.
pub fn layout(entries: &[(&str, &str)]) -> (StaticChannelInfo, Vec<ProcessId>) {
    let mut info = StaticChannelInfo::new();
    for (rank, (lan, host)) in entries.iter().enumerate() {
        info.insert(ProcessId(rank), vec![tcp(host, lan)]);
    }
    (info, members(entries.len()))
}
