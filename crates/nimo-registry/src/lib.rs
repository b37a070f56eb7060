//! The Registry (C6): the authoritative, in-memory directory of machines,
//! nodes, channels, and connections that gives a nImO service network its
//! shape, reached over the same command-port protocol every node exposes
//! (`nimo_service`), and its own RPC client proxy for talking to one.
//!
//! This crate does not run a process on its own — see `nimo-registryd` for
//! the binary that binds a `Registry`, announces it over mDNS, and serves
//! its command vocabulary.

mod broadcast;
mod grammar;
mod handlers;
mod proxy;
mod store;
mod types;

pub use broadcast::{StatusBroadcaster, StatusEvent};
pub use grammar::{parse as parse_channel_name, ChannelName, ChannelNameError};
pub use handlers::{register_all, COMMAND_NAMES};
pub use proxy::{call as call_registry, ProxyError};
pub use store::{NodeRemovalCascade, Registry, RegistryError};
pub use types::{Channel, ChannelKey, Connection, Direction, Machine, Node, Transport};
