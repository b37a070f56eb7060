//! The Registry's UDP multicast status feed (§4.5): every mutation that
//! changes the directory's shape is announced on the status multicast
//! group so logger/monitor processes can track it without polling.
//!
//! Wire schema (frozen choice, recorded in DESIGN.md): each datagram is a
//! text-codec-printed `Array` whose first element is the event's prefix
//! string (`"c+"`, `"c-"`, `"c^"`, `"c*"`, `"c/"`, `"n+"`, `"n-"`), second
//! element the subject node or channel name, and any remaining elements
//! carrying event-specific detail.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use nimo_value::{Array, Value};
use tokio::net::UdpSocket;

use crate::types::{Channel, Connection};

/// One status-feed event. Each variant corresponds to one of the prefixes
/// `spec.md` §4.6 names: `c+`/`c-`/`c^`/`c*`/`c/`/`n+`/`n-`.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// `c+`: a channel was added to a node.
    ChannelAdded { node: String, path: String },
    /// `c-`: a single channel was removed from a node.
    ChannelRemoved { node: String, path: String },
    /// `c^`: a batch of channels was removed from a node in one cascade
    /// (`removeChannelsForNode!`, or the channel side of `removeNode!`).
    ChannelsRemoved { node: String, paths: Vec<String> },
    /// `c*`: a connection between two channels was made.
    ConnectionAdded {
        from_node: String,
        from_path: String,
        to_node: String,
        to_path: String,
    },
    /// `c/`: a connection between two channels was broken.
    ConnectionRemoved {
        from_node: String,
        from_path: String,
        to_node: String,
        to_path: String,
    },
    /// `n+`: a node was added.
    NodeAdded { node: String },
    /// `n-`: a node was removed.
    NodeRemoved { node: String },
}

impl StatusEvent {
    fn prefix(&self) -> &'static str {
        match self {
            StatusEvent::ChannelAdded { .. } => "c+",
            StatusEvent::ChannelRemoved { .. } => "c-",
            StatusEvent::ChannelsRemoved { .. } => "c^",
            StatusEvent::ConnectionAdded { .. } => "c*",
            StatusEvent::ConnectionRemoved { .. } => "c/",
            StatusEvent::NodeAdded { .. } => "n+",
            StatusEvent::NodeRemoved { .. } => "n-",
        }
    }

    fn subject(&self) -> String {
        match self {
            StatusEvent::ChannelAdded { node, path } | StatusEvent::ChannelRemoved { node, path } => {
                format!("{node}{path}")
            }
            StatusEvent::ChannelsRemoved { node, .. } => node.clone(),
            StatusEvent::ConnectionAdded { from_node, from_path, .. }
            | StatusEvent::ConnectionRemoved { from_node, from_path, .. } => format!("{from_node}{from_path}"),
            StatusEvent::NodeAdded { node } | StatusEvent::NodeRemoved { node } => node.clone(),
        }
    }

    fn extra_elements(&self) -> Vec<Value> {
        match self {
            StatusEvent::ChannelsRemoved { paths, .. } => {
                paths.iter().map(|p| Value::String(p.clone())).collect()
            }
            StatusEvent::ConnectionAdded { to_node, to_path, .. }
            | StatusEvent::ConnectionRemoved { to_node, to_path, .. } => {
                vec![Value::String(format!("{to_node}{to_path}"))]
            }
            _ => vec![],
        }
    }

    fn to_value(&self) -> Value {
        let mut array = Array::new();
        array.push(Arc::new(Value::String(self.prefix().to_string())));
        array.push(Arc::new(Value::String(self.subject())));
        for extra in self.extra_elements() {
            array.push(Arc::new(extra));
        }
        Value::Array(array)
    }

    pub fn channel_added(channel: &Channel) -> Self {
        StatusEvent::ChannelAdded {
            node: channel.node.clone(),
            path: channel.path.clone(),
        }
    }

    pub fn channel_removed(channel: &Channel) -> Self {
        StatusEvent::ChannelRemoved {
            node: channel.node.clone(),
            path: channel.path.clone(),
        }
    }

    pub fn channels_removed(node: &str, channels: &[Channel]) -> Self {
        StatusEvent::ChannelsRemoved {
            node: node.to_string(),
            paths: channels.iter().map(|c| c.path.clone()).collect(),
        }
    }

    pub fn connection_added(connection: &Connection) -> Self {
        StatusEvent::ConnectionAdded {
            from_node: connection.from_node.clone(),
            from_path: connection.from_path.clone(),
            to_node: connection.to_node.clone(),
            to_path: connection.to_path.clone(),
        }
    }

    pub fn connection_removed(connection: &Connection) -> Self {
        StatusEvent::ConnectionRemoved {
            from_node: connection.from_node.clone(),
            from_path: connection.from_path.clone(),
            to_node: connection.to_node.clone(),
            to_path: connection.to_path.clone(),
        }
    }
}

/// Sends status events as multicast datagrams. One socket, reused for the
/// lifetime of the Registry process.
pub struct StatusBroadcaster {
    socket: UdpSocket,
    target: SocketAddrV4,
}

impl StatusBroadcaster {
    /// Binds an ephemeral UDP socket and resolves the multicast target.
    /// `interface` selects which local interface outgoing multicast
    /// traffic leaves from; `Ipv4Addr::UNSPECIFIED` lets the OS choose.
    pub async fn bind(interface: Ipv4Addr, address: Ipv4Addr, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(interface, 0)).await?;
        socket.set_multicast_loop_v4(true)?;
        Ok(Self {
            socket,
            target: SocketAddrV4::new(address, port),
        })
    }

    pub async fn publish(&self, event: &StatusEvent) -> std::io::Result<()> {
        let text = nimo_codec::print_text(&event.to_value(), true);
        self.socket.send_to(text.as_bytes(), self.target).await?;
        tracing::debug!(prefix = event.prefix(), subject = %event.subject(), "published status event");
        Ok(())
    }

    pub async fn publish_all(&self, events: &[StatusEvent]) {
        for event in events {
            if let Err(err) = self.publish(event).await {
                tracing::warn!(error = %err, prefix = event.prefix(), "failed to publish status event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Transport};

    #[test]
    fn channel_added_event_renders_prefix_and_subject() {
        let channel = Channel {
            node: "N1".to_string(),
            path: "/out".to_string(),
            direction: Direction::Out,
            data_type: "bytes".to_string(),
            transport_preference: Transport::Any,
            in_use: false,
        };
        let event = StatusEvent::channel_added(&channel);
        let text = nimo_codec::print_text(&event.to_value(), true);
        assert!(text.contains("c+"));
        assert!(text.contains("N1/out"));
    }

    #[tokio::test]
    async fn broadcaster_sends_without_error_on_loopback() {
        let broadcaster = StatusBroadcaster::bind(Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(239, 17, 12, 1), 1955)
            .await
            .unwrap();
        let event = StatusEvent::NodeAdded { node: "N1".to_string() };
        broadcaster.publish(&event).await.unwrap();
    }
}
