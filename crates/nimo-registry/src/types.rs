//! The four Registry entity relations (§3) and the small enums that give
//! channels and connections their shape.

use std::net::Ipv4Addr;

use nimo_value::Shared;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// A channel's transport preference. `Any` overlaps with everything;
/// otherwise two preferences must match exactly to be compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
    Any,
}

impl Transport {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Transport::Tcp),
            "udp" => Some(Transport::Udp),
            "any" => Some(Transport::Any),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
            Transport::Any => "any",
        }
    }

    pub fn overlaps(self, other: Transport) -> bool {
        self == Transport::Any || other == Transport::Any || self == other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub name: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub machine: String,
    pub service_type: String,
    pub command_address: Ipv4Addr,
    pub command_port: u16,
    /// Opaque launch-time parameters. The source's `getRunParamsForApp!`
    /// handler is visibly unfinished (§9 open questions); this core never
    /// interprets the payload, only stores and returns it verbatim.
    pub launch_details: Option<Shared>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub node: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub node: String,
    pub path: String,
    pub direction: Direction,
    pub data_type: String,
    pub transport_preference: Transport,
    pub in_use: bool,
}

impl Channel {
    pub fn key(&self) -> ChannelKey {
        ChannelKey {
            node: self.node.clone(),
            path: self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from_node: String,
    pub from_path: String,
    pub to_node: String,
    pub to_path: String,
    pub transport: Transport,
}

impl Connection {
    pub fn touches(&self, node: &str, path: &str) -> bool {
        (self.from_node == node && self.from_path == path) || (self.to_node == node && self.to_path == path)
    }
}
