use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use chrono::Timelike;
use env_logger::fmt::Color;
use futures::future::join_all;
use structopt::StructOpt;

use topocoll::{
    AttributeCache, Communicator, Concat, GroupId, LevelKind, LocalFabric, StaticChannelInfo, Sum,
    TopologyConfig, TopologyModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Barrier,
    Broadcast,
    Gather,
    Scatter,
    AllGather,
    AllToAll,
    Reduce,
    AllReduce,
    ReduceScatter,
    Scan,
}

impl FromStr for Op {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.to_ascii_lowercase().as_str() {
            "barrier" => Op::Barrier,
            "broadcast" => Op::Broadcast,
            "gather" => Op::Gather,
            "scatter" => Op::Scatter,
            "allgather" => Op::AllGather,
            "alltoall" => Op::AllToAll,
            "reduce" => Op::Reduce,
            "allreduce" => Op::AllReduce,
            "reducescatter" => Op::ReduceScatter,
            "scan" => Op::Scan,
            other => return Err(anyhow!("unknown collective {}", other)),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "Collective Simulator")]
struct Opts {
    /// Topology file
    #[structopt(short, long, default_value = "topology.toml")]
    config: PathBuf,
    #[structopt(short, long, default_value = "broadcast")]
    op: Op,
    #[structopt(short, long, default_value = "0")]
    root: usize,
    /// Elements contributed per rank
    #[structopt(long, default_value = "4")]
    count: usize,
    /// Extra latency on links that cross a wan boundary
    #[structopt(long, default_value = "0")]
    delay_ms: u64,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let time = chrono::Local::now();
            let style = buf.style().set_color(Color::Black).set_intense(true).clone();
            let time = format!(
                "{:02}:{:02}:{:02}.{:03}",
                time.hour() % 24,
                time.minute(),
                time.second(),
                time.timestamp_subsec_millis()
            );
            writeln!(
                buf,
                "{}{} {} {}{} {}",
                style.value("["),
                time,
                buf.default_styled_level(record.level()),
                record.module_path().unwrap_or(""),
                style.value("]"),
                record.args()
            )
        })
        .init();
}

fn value(rank: usize, i: usize) -> u64 {
    (rank * 1000 + i) as u64
}

/// Run `op` at one rank and check what it got back.
async fn run_rank(comm: &Communicator, opts: &Opts) -> Result<()> {
    let (rank, n, root, count) = (comm.rank(), comm.size(), opts.root, opts.count);
    let mine: Vec<u64> = (0..count).map(|i| value(rank, i)).collect();
    let everyone: Vec<u64> = (0..n).flat_map(|r| (0..count).map(move |i| value(r, i))).collect();
    let sums: Vec<u64> = (0..count).map(|i| (0..n).map(|r| value(r, i)).sum()).collect();

    let ok = match opts.op {
        Op::Barrier => {
            comm.barrier().await?;
            true
        }
        Op::Broadcast => {
            let mut buf = if rank == root {
                mine.clone()
            } else {
                vec![0; count]
            };
            comm.broadcast(&mut buf, root).await?;
            buf.iter().enumerate().all(|(i, &v)| v == value(root, i))
        }
        Op::Gather => match comm.gather(&mine, root).await? {
            Some(all) => all == everyone,
            None => rank != root,
        },
        Op::Scatter => {
            let send = (rank == root).then_some(everyone.as_slice());
            comm.scatter(send, count, root).await? == mine
        }
        Op::AllGather => comm.allgather(&mine).await? == everyone,
        Op::AllToAll => {
            let send: Vec<u64> = (0..n * count).map(|i| value(rank, i)).collect();
            let recv = comm.alltoall(&send).await?;
            (0..n * count).all(|i| recv[i] == value(i / count, rank * count + i % count))
        }
        Op::Reduce => match comm.reduce(&mine, &Sum, root).await? {
            Some(total) => total == sums,
            None => rank != root,
        },
        Op::AllReduce => comm.allreduce(&mine, &Sum).await? == sums,
        Op::ReduceScatter => {
            let counts = vec![count; n];
            let block = comm.reduce_scatter(&everyone, &counts, &Sum).await?;
            let expected: Vec<u64> = (0..count).map(|i| n as u64 * value(rank, i)).collect();
            block == expected
        }
        Op::Scan => {
            let words = comm.scan(&[rank.to_string()], &Concat).await?;
            let expected: String = (0..=rank).map(|r| r.to_string()).collect();
            words == [expected]
        }
    };
    if !ok {
        bail!("rank {} got a wrong result for {:?}", rank, opts.op);
    }
    Ok(())
}

/// Whether a link between two ranks leaves their LAN. A group without a LAN
/// level has no such links.
fn crosses_lan(model: &TopologyModel, src: usize, dst: usize) -> bool {
    match model.find_level(LevelKind::Lan) {
        Some(lvl) => model.color(src, lvl) != model.color(dst, lvl),
        None => false,
    }
}

fn main() -> Result<()> {
    better_panic::install();
    let opts = Opts::from_args();
    init_logger();

    let config = TopologyConfig::from_path(&opts.config)?;
    let info = StaticChannelInfo::from_config(&config)?;
    let members = config.members();
    let model = Arc::new(TopologyModel::build(&members, &info)?);
    let n = members.len();
    log::info!("Loaded {} processes, depths {:?}", n, model.depths());

    let wan_delay = Duration::from_millis(opts.delay_ms);
    let delay_model = Arc::clone(&model);
    let fabric = LocalFabric::new(n).with_link_delay(move |src, dst| {
        if crosses_lan(&delay_model, src, dst) {
            wan_delay
        } else {
            Duration::ZERO
        }
    });
    let stats = fabric.stats();

    let cache = Arc::new(AttributeCache::new());
    let mut comms = Vec::with_capacity(n);
    for transport in fabric.endpoints() {
        let mut comm = Communicator::with_model(
            GroupId(0),
            members.clone(),
            Box::new(transport),
            Arc::clone(&model),
        )?;
        comm.publish_attributes(&cache);
        comms.push(comm);
    }
    if let Some(attributes) = cache.get(GroupId(0)) {
        log::debug!("Colors: {:?}", attributes.colors);
    }

    let start = Instant::now();
    let results = smol::block_on(join_all(comms.iter().map(|comm| run_rank(comm, &opts))));
    let elapsed = start.elapsed();
    for result in results {
        result?;
    }

    log::info!("{:?} on {} ranks finished in {:?}", opts.op, n, elapsed);
    for ((src, dst), counters) in stats.links() {
        log::info!(
            "  {} -> {}: {} messages, {} bytes",
            src,
            dst,
            counters.messages,
            counters.bytes
        );
    }
    log::info!("{} messages in total", stats.total_messages());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topocoll::channel::ChannelLevel;
    use topocoll::{ChannelInfoProvider, ProcessId, Protocol, TopologyError};

    const SITES: &str = r#"
        [[processes]]
        protocols = [{ kind = "tcp", hostname = "a0", lan = "site-a" }]

        [[processes]]
        protocols = [{ kind = "tcp", hostname = "a1", lan = "site-a" }]

        [[processes]]
        protocols = [{ kind = "tcp", hostname = "b0", lan = "site-b" }]
    "#;

    /// Puts an extra all-matching region level above every process's levels.
    struct Regions(StaticChannelInfo);

    impl ChannelInfoProvider for Regions {
        fn protocols(&self, process: ProcessId) -> Option<Vec<Protocol>> {
            self.0.protocols(process)
        }

        fn levels(&self, process: ProcessId) -> Result<Vec<ChannelLevel>, TopologyError> {
            let mut levels = self.0.levels(process)?;
            levels.insert(0, levels[0].clone());
            Ok(levels)
        }
    }

    #[test]
    fn lan_crossings_follow_the_lan_level() {
        let config = TopologyConfig::parse(SITES).unwrap();
        let info = StaticChannelInfo::from_config(&config).unwrap();
        let members = config.members();

        let model = TopologyModel::build(&members, &info).unwrap();
        assert!(!crosses_lan(&model, 0, 1));
        assert!(crosses_lan(&model, 1, 2));

        let model = TopologyModel::build(&members, &Regions(info)).unwrap();
        assert_eq!(model.level(1).kind, LevelKind::Wan);
        assert_eq!(model.find_level(LevelKind::Lan), Some(2));
        assert!(!crosses_lan(&model, 0, 1));
        assert!(crosses_lan(&model, 0, 2));
    }
}
