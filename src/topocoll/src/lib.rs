//! Topology-aware collective communication.
//!
//! A group's processes are clustered level by level from the channel
//! information each reports ([`topology::TopologyModel`]); every collective
//! then walks those levels, using a flat tree where a level is expensive to
//! cross and a binomial tree elsewhere.

pub mod channel;
pub mod comm;
pub mod config;
pub mod op;
pub mod pattern;
pub mod registry;
pub mod topology;
pub mod transport;

pub use channel::{
    ChannelInfoProvider, LevelKind, ProcessId, Protocol, StaticChannelInfo, TreeShape,
};
pub use comm::{CollectiveError, Communicator, GroupId};
pub use config::{ConfigError, TopologyConfig};
pub use op::{Concat, Element, Max, Min, Prod, ReduceFn, ReduceOp, Sum};
pub use registry::AttributeCache;
pub use topology::{TopologyAttributes, TopologyError, TopologyModel};
pub use transport::local::{LocalFabric, LocalTransport};
pub use transport::{Transport, TransportError};
