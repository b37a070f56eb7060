//! The authoritative in-memory directory: four entity tables guarded by a
//! single reader/writer lock, giving every mutating request the "single
//! logical writer, overlapping readers" semantics §5 requires. There is no
//! persistence across restarts — the Registry is authoritative only while
//! it runs (§1 Non-goals).

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use parking_lot::RwLock;

use crate::types::{Channel, ChannelKey, Connection, Direction, Machine, Node, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotFound(String),
    AlreadyExists(String),
    PreconditionFailed(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound(what) => write!(f, "not found: {what}"),
            RegistryError::AlreadyExists(what) => write!(f, "already exists: {what}"),
            RegistryError::PreconditionFailed(why) => write!(f, "precondition failed: {why}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Everything a `removeNode!` cascade removed, so the caller can emit the
/// matching status broadcasts (two `c-` per channel and one `c/` per
/// connection it participated in, per the worked example in §8).
#[derive(Debug, Default)]
pub struct NodeRemovalCascade {
    pub removed_channels: Vec<Channel>,
    pub removed_connections: Vec<Connection>,
}

#[derive(Default)]
struct Tables {
    machines: HashMap<String, Machine>,
    nodes: HashMap<String, Node>,
    channels: HashMap<ChannelKey, Channel>,
    connections: Vec<Connection>,
}

/// The directory itself. All reads and writes go through `parking_lot`'s
/// `RwLock`, which serializes writers against each other and against
/// readers while letting readers run concurrently with one another.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Machines -------------------------------------------------------

    pub fn machine(&self, name: &str) -> Option<Machine> {
        self.tables.read().machines.get(name).cloned()
    }

    pub fn all_machines(&self) -> Vec<Machine> {
        self.tables.read().machines.values().cloned().collect()
    }

    pub fn machine_names(&self) -> Vec<String> {
        self.tables.read().machines.keys().cloned().collect()
    }

    pub fn machine_count(&self) -> usize {
        self.tables.read().machines.len()
    }

    // ---- Nodes ----------------------------------------------------------

    /// Registers a node, creating its machine entry if this is the first
    /// node seen on it.
    pub fn add_node(&self, node: Node, machine_address: Ipv4Addr) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if tables.nodes.contains_key(&node.name) {
            return Err(RegistryError::AlreadyExists(format!("node '{}'", node.name)));
        }
        tables
            .machines
            .entry(node.machine.clone())
            .or_insert_with(|| Machine {
                name: node.machine.clone(),
                address: machine_address,
            });
        tables.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<Node> {
        self.tables.read().nodes.get(name).cloned()
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.tables.read().nodes.values().cloned().collect()
    }

    pub fn nodes_on_machine(&self, machine: &str) -> Vec<Node> {
        self.tables
            .read()
            .nodes
            .values()
            .filter(|n| n.machine == machine)
            .cloned()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.tables.read().nodes.len()
    }

    /// Removes a node and cascades: every channel it owns is removed, and
    /// every connection touching one of those channels is removed too.
    /// The node's machine is dropped once it has no nodes left.
    pub fn remove_node(&self, name: &str) -> Result<NodeRemovalCascade, RegistryError> {
        let mut tables = self.tables.write();
        let node = tables
            .nodes
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(format!("node '{name}'")))?;

        let channel_keys: Vec<ChannelKey> = tables
            .channels
            .keys()
            .filter(|k| k.node == name)
            .cloned()
            .collect();

        let mut removed_channels = Vec::new();
        let mut removed_connections = Vec::new();
        for key in channel_keys {
            if let Some(channel) = tables.channels.remove(&key) {
                let (kept, removed): (Vec<_>, Vec<_>) = tables
                    .connections
                    .drain(..)
                    .partition(|c| !c.touches(&channel.node, &channel.path));
                tables.connections = kept;
                removed_connections.extend(removed);
                removed_channels.push(channel);
            }
        }

        let machine_has_other_nodes = tables.nodes.values().any(|n| n.machine == node.machine);
        if !machine_has_other_nodes {
            tables.machines.remove(&node.machine);
        }

        Ok(NodeRemovalCascade {
            removed_channels,
            removed_connections,
        })
    }

    // ---- Channels ---------------------------------------------------------

    pub fn add_channel(&self, channel: Channel) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if !tables.nodes.contains_key(&channel.node) {
            return Err(RegistryError::NotFound(format!("node '{}'", channel.node)));
        }
        let key = channel.key();
        if tables.channels.contains_key(&key) {
            return Err(RegistryError::AlreadyExists(format!(
                "channel '{}' on node '{}'",
                channel.path, channel.node
            )));
        }
        tables.channels.insert(key, channel);
        Ok(())
    }

    /// Removes one channel, plus whatever connection(s) touched it. Returns
    /// both so the caller can emit the matching `c-`/`c/` broadcasts.
    pub fn remove_channel(&self, node: &str, path: &str) -> Result<(Channel, Vec<Connection>), RegistryError> {
        let mut tables = self.tables.write();
        let key = ChannelKey {
            node: node.to_string(),
            path: path.to_string(),
        };
        let channel = tables
            .channels
            .remove(&key)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{path}' on node '{node}'")))?;
        let (kept, removed): (Vec<_>, Vec<_>) = tables
            .connections
            .drain(..)
            .partition(|c| !c.touches(node, path));
        tables.connections = kept;
        Ok((channel, removed))
    }

    pub fn channel(&self, node: &str, path: &str) -> Option<Channel> {
        let key = ChannelKey {
            node: node.to_string(),
            path: path.to_string(),
        };
        self.tables.read().channels.get(&key).cloned()
    }

    pub fn all_channels(&self) -> Vec<Channel> {
        self.tables.read().channels.values().cloned().collect()
    }

    pub fn channels_on_node(&self, node: &str) -> Vec<Channel> {
        self.tables
            .read()
            .channels
            .values()
            .filter(|c| c.node == node)
            .cloned()
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.tables.read().channels.len()
    }

    pub fn channels_on_machine(&self, machine: &str) -> Vec<Channel> {
        let tables = self.tables.read();
        let node_names: std::collections::HashSet<&str> = tables
            .nodes
            .values()
            .filter(|n| n.machine == machine)
            .map(|n| n.name.as_str())
            .collect();
        tables
            .channels
            .values()
            .filter(|c| node_names.contains(c.node.as_str()))
            .cloned()
            .collect()
    }

    /// Removes every channel owned by `node` (and every connection
    /// touching one of them) without removing the node itself — the
    /// shape `removeChannelsForNode!` needs, distinct from the cascade
    /// that happens as a side effect of `removeNode!`.
    pub fn remove_channels_for_node(&self, node: &str) -> Result<NodeRemovalCascade, RegistryError> {
        let mut tables = self.tables.write();
        if !tables.nodes.contains_key(node) {
            return Err(RegistryError::NotFound(format!("node '{node}'")));
        }

        let channel_keys: Vec<ChannelKey> = tables
            .channels
            .keys()
            .filter(|k| k.node == node)
            .cloned()
            .collect();

        let mut removed_channels = Vec::new();
        let mut removed_connections = Vec::new();
        for key in channel_keys {
            if let Some(channel) = tables.channels.remove(&key) {
                let (kept, removed): (Vec<_>, Vec<_>) = tables
                    .connections
                    .drain(..)
                    .partition(|c| !c.touches(&channel.node, &channel.path));
                tables.connections = kept;
                removed_connections.extend(removed);
                removed_channels.push(channel);
            }
        }

        Ok(NodeRemovalCascade {
            removed_channels,
            removed_connections,
        })
    }

    pub fn channel_in_use(&self, node: &str, path: &str) -> Result<bool, RegistryError> {
        let key = ChannelKey {
            node: node.to_string(),
            path: path.to_string(),
        };
        self.tables
            .read()
            .channels
            .get(&key)
            .map(|c| c.in_use)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{path}' on node '{node}'")))
    }

    pub fn set_channel_in_use(&self, node: &str, path: &str, in_use: bool) -> Result<(), RegistryError> {
        let key = ChannelKey {
            node: node.to_string(),
            path: path.to_string(),
        };
        let mut tables = self.tables.write();
        let channel = tables
            .channels
            .get_mut(&key)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{path}' on node '{node}'")))?;
        channel.in_use = in_use;
        Ok(())
    }

    /// Test-and-set: returns the prior in-use flag, atomically setting it
    /// true, so two racing connect attempts on the same channel can never
    /// both believe they won.
    pub fn get_channel_in_use_and_set(&self, node: &str, path: &str) -> Result<bool, RegistryError> {
        let key = ChannelKey {
            node: node.to_string(),
            path: path.to_string(),
        };
        let mut tables = self.tables.write();
        let channel = tables
            .channels
            .get_mut(&key)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{path}' on node '{node}'")))?;
        let prior = channel.in_use;
        channel.in_use = true;
        Ok(prior)
    }

    // ---- Connections --------------------------------------------------------

    /// Atomic per §4.6: both endpoints must exist, both must be unused,
    /// directions must be `out`→`in`, and the transport preferences must
    /// overlap. No partial state change on any failure.
    pub fn add_connection(
        &self,
        from_node: &str,
        from_path: &str,
        to_node: &str,
        to_path: &str,
        transport: Transport,
    ) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();

        let from_key = ChannelKey {
            node: from_node.to_string(),
            path: from_path.to_string(),
        };
        let to_key = ChannelKey {
            node: to_node.to_string(),
            path: to_path.to_string(),
        };

        let from = tables
            .channels
            .get(&from_key)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{from_path}' on node '{from_node}'")))?;
        let to = tables
            .channels
            .get(&to_key)
            .ok_or_else(|| RegistryError::NotFound(format!("channel '{to_path}' on node '{to_node}'")))?;

        if from.direction != Direction::Out {
            return Err(RegistryError::PreconditionFailed(format!(
                "'{from_path}' on '{from_node}' is not an output channel"
            )));
        }
        if to.direction != Direction::In {
            return Err(RegistryError::PreconditionFailed(format!(
                "'{to_path}' on '{to_node}' is not an input channel"
            )));
        }
        if from.in_use {
            return Err(RegistryError::PreconditionFailed(format!(
                "'{from_path}' on '{from_node}' is already in use"
            )));
        }
        if to.in_use {
            return Err(RegistryError::PreconditionFailed(format!(
                "'{to_path}' on '{to_node}' is already in use"
            )));
        }
        if !from.transport_preference.overlaps(to.transport_preference) {
            return Err(RegistryError::PreconditionFailed(
                "transport preferences do not overlap".to_string(),
            ));
        }

        tables.channels.get_mut(&from_key).unwrap().in_use = true;
        tables.channels.get_mut(&to_key).unwrap().in_use = true;
        tables.connections.push(Connection {
            from_node: from_node.to_string(),
            from_path: from_path.to_string(),
            to_node: to_node.to_string(),
            to_path: to_path.to_string(),
            transport,
        });
        Ok(())
    }

    pub fn remove_connection(
        &self,
        from_node: &str,
        from_path: &str,
        to_node: &str,
        to_path: &str,
    ) -> Result<Connection, RegistryError> {
        let mut tables = self.tables.write();
        let idx = tables
            .connections
            .iter()
            .position(|c| {
                c.from_node == from_node
                    && c.from_path == from_path
                    && c.to_node == to_node
                    && c.to_path == to_path
            })
            .ok_or_else(|| RegistryError::NotFound("connection".to_string()))?;
        let removed = tables.connections.remove(idx);
        for (node, path) in [
            (removed.from_node.as_str(), removed.from_path.as_str()),
            (removed.to_node.as_str(), removed.to_path.as_str()),
        ] {
            let key = ChannelKey {
                node: node.to_string(),
                path: path.to_string(),
            };
            if let Some(channel) = tables.channels.get_mut(&key) {
                channel.in_use = false;
            }
        }
        Ok(removed)
    }

    /// Removes whichever connection touches `(node, path)`, from either
    /// end — the shape `disconnectChannels!` needs (§8 scenario 5).
    pub fn disconnect_channel(&self, node: &str, path: &str) -> Result<Connection, RegistryError> {
        let mut tables = self.tables.write();
        let idx = tables
            .connections
            .iter()
            .position(|c| c.touches(node, path))
            .ok_or_else(|| RegistryError::NotFound(format!("connection touching '{path}' on '{node}'")))?;
        let removed = tables.connections.remove(idx);
        for (n, p) in [
            (removed.from_node.as_str(), removed.from_path.as_str()),
            (removed.to_node.as_str(), removed.to_path.as_str()),
        ] {
            let key = ChannelKey {
                node: n.to_string(),
                path: p.to_string(),
            };
            if let Some(channel) = tables.channels.get_mut(&key) {
                channel.in_use = false;
            }
        }
        Ok(removed)
    }

    pub fn connection_from(&self, node: &str, path: &str) -> Option<Connection> {
        self.tables
            .read()
            .connections
            .iter()
            .find(|c| c.touches(node, path))
            .cloned()
    }

    pub fn all_connections(&self) -> Vec<Connection> {
        self.tables.read().connections.clone()
    }

    pub fn connections_on_node(&self, node: &str) -> Vec<Connection> {
        self.tables
            .read()
            .connections
            .iter()
            .filter(|c| c.from_node == node || c.to_node == node)
            .cloned()
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.tables.read().connections.len()
    }

    pub fn connections_on_machine(&self, machine: &str) -> Vec<Connection> {
        let tables = self.tables.read();
        let node_names: std::collections::HashSet<&str> = tables
            .nodes
            .values()
            .filter(|n| n.machine == machine)
            .map(|n| n.name.as_str())
            .collect();
        tables
            .connections
            .iter()
            .filter(|c| node_names.contains(c.from_node.as_str()) || node_names.contains(c.to_node.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            machine: "m1".to_string(),
            service_type: "test".to_string(),
            command_address: Ipv4Addr::LOCALHOST,
            command_port: 9999,
            launch_details: None,
        }
    }

    fn channel(node_name: &str, path: &str, direction: Direction) -> Channel {
        Channel {
            node: node_name.to_string(),
            path: path.to_string(),
            direction,
            data_type: "bytes".to_string(),
            transport_preference: Transport::Any,
            in_use: false,
        }
    }

    #[test]
    fn add_connection_sets_both_channels_in_use() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        reg.add_channel(channel("N2", "/in", Direction::In)).unwrap();

        reg.add_connection("N1", "/out", "N2", "/in", Transport::Tcp).unwrap();
        assert!(reg.channel_in_use("N1", "/out").unwrap());
        assert!(reg.channel_in_use("N2", "/in").unwrap());
    }

    #[test]
    fn second_connection_to_busy_channel_fails_and_leaves_first_intact() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N3"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        reg.add_channel(channel("N2", "/in", Direction::In)).unwrap();
        reg.add_channel(channel("N3", "/in", Direction::In)).unwrap();

        reg.add_connection("N1", "/out", "N2", "/in", Transport::Tcp).unwrap();
        let err = reg.add_connection("N1", "/out", "N3", "/in", Transport::Tcp).unwrap_err();
        assert!(matches!(err, RegistryError::PreconditionFailed(_)));
        assert_eq!(reg.connection_count(), 1);
        assert!(reg.connection_from("N1", "/out").is_some());
    }

    #[test]
    fn remove_node_cascades_channels_and_connections() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        reg.add_channel(channel("N2", "/in", Direction::In)).unwrap();
        reg.add_connection("N1", "/out", "N2", "/in", Transport::Tcp).unwrap();

        let cascade = reg.remove_node("N1").unwrap();
        assert_eq!(cascade.removed_channels.len(), 1);
        assert_eq!(cascade.removed_connections.len(), 1);
        assert!(reg.node("N1").is_none());
        assert!(!reg.channel_in_use("N2", "/in").unwrap());
    }

    #[test]
    fn machine_is_dropped_once_its_last_node_is_removed() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        assert_eq!(reg.machine_count(), 1);
        reg.remove_node("N1").unwrap();
        assert_eq!(reg.machine_count(), 0);
    }

    #[test]
    fn get_channel_in_use_and_set_is_test_and_set() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        assert!(!reg.get_channel_in_use_and_set("N1", "/out").unwrap());
        assert!(reg.get_channel_in_use_and_set("N1", "/out").unwrap());
    }

    #[test]
    fn incompatible_transport_preferences_reject_connection() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        let mut out_chan = channel("N1", "/out", Direction::Out);
        out_chan.transport_preference = Transport::Tcp;
        let mut in_chan = channel("N2", "/in", Direction::In);
        in_chan.transport_preference = Transport::Udp;
        reg.add_channel(out_chan).unwrap();
        reg.add_channel(in_chan).unwrap();

        let err = reg.add_connection("N1", "/out", "N2", "/in", Transport::Tcp).unwrap_err();
        assert!(matches!(err, RegistryError::PreconditionFailed(_)));
    }

    #[test]
    fn remove_channels_for_node_keeps_the_node() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        reg.add_channel(channel("N2", "/in", Direction::In)).unwrap();
        reg.add_connection("N1", "/out", "N2", "/in", Transport::Tcp).unwrap();

        let cascade = reg.remove_channels_for_node("N1").unwrap();
        assert_eq!(cascade.removed_channels.len(), 1);
        assert_eq!(cascade.removed_connections.len(), 1);
        assert!(reg.node("N1").is_some());
        assert_eq!(reg.channel_count(), 1);
        assert!(!reg.channel_in_use("N2", "/in").unwrap());
    }

    #[test]
    fn channels_on_machine_spans_every_node_there() {
        let reg = Registry::new();
        reg.add_node(node("N1"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_node(node("N2"), Ipv4Addr::LOCALHOST).unwrap();
        reg.add_channel(channel("N1", "/out", Direction::Out)).unwrap();
        reg.add_channel(channel("N2", "/in", Direction::In)).unwrap();

        assert_eq!(reg.channels_on_machine("m1").len(), 2);
        assert_eq!(reg.channels_on_machine("no-such-machine").len(), 0);
    }
}
