//! Wires the full command vocabulary from `spec.md` §4.6 onto
//! `nimo_service::Handler`. Rather than giving each of the ~38 commands
//! its own type, a single [`CommandHandler`] carries its registered
//! command name and dispatches internally on it, the same compactness
//! trade a `u32`-keyed method dispatcher makes over one struct per RPC.
//!
//! Argument marshaling is this crate's own frozen convention (the
//! original RPC's exact argument order is not recoverable): each
//! handler's positional arguments are documented in
//! its match arm below and in `DESIGN.md`. Channel-to-channel commands
//! (`addConnection!`, `removeConnection!`, `disconnectChannels!`,
//! `getConnectionInformation?`) take external channel-name strings
//! (`"N1/out"`) parsed with [`crate::grammar`], matching the worked
//! examples in `spec.md` §8 item 5; everything else takes node/path as
//! separate string arguments.

use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::Arc;

use nimo_value::{Array, NimoAddress, Shared, Value};
use nimo_service::{response_array, write_envelope, Handler, HandlerTableBuilder, ResponseWriter};

use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::grammar;
use crate::proxy::response_name_for;
use crate::store::{Registry, RegistryError};
use crate::types::{Channel, Connection, Direction, Machine, Node, Transport};

/// Every command name this crate registers a handler for. `stop!` is not
/// among them — every service registers that one itself via
/// `nimo_service::StopHandler`, shared across node and Registry processes
/// alike.
pub const COMMAND_NAMES: &[&str] = &[
    "getInformationForAllMachines?",
    "getMachineInformation?",
    "getNamesOfMachines?",
    "getNumberOfMachines?",
    "isMachinePresent?",
    "addNode!",
    "removeNode!",
    "getNodeInformation?",
    "getInformationForAllNodes?",
    "getInformationForAllNodesOnMachine?",
    "getLaunchDetails?",
    "getNamesOfNodes?",
    "getNamesOfNodesOnMachine?",
    "getNumberOfNodes?",
    "getNumberOfNodesOnMachine?",
    "isNodePresent?",
    "addChannel!",
    "removeChannel!",
    "removeChannelsForNode!",
    "getChannelInformation?",
    "getChannelInUse?",
    "setChannelInUse!",
    "clearChannelInUse!",
    "getChannelInUseAndSet#",
    "getInformationForAllChannels?",
    "getInformationForAllChannelsOnNode?",
    "getInformationForAllChannelsOnMachine?",
    "getNumberOfChannels?",
    "getNumberOfChannelsOnNode?",
    "isChannelPresent?",
    "addConnection!",
    "removeConnection!",
    "disconnectChannels!",
    "getConnectionInformation?",
    "getInformationForAllConnections?",
    "getInformationForAllConnectionsOnNode?",
    "getInformationForAllConnectionsOnMachine?",
    "getNumberOfConnections?",
];

/// Registers a [`CommandHandler`] for every entry in [`COMMAND_NAMES`]
/// against `registry`, publishing status events through `broadcaster`
/// when one is supplied (a Registry running in a test harness may omit
/// it and skip the network entirely).
pub fn register_all(
    mut builder: HandlerTableBuilder,
    registry: Arc<Registry>,
    broadcaster: Option<Arc<StatusBroadcaster>>,
) -> HandlerTableBuilder {
    for name in COMMAND_NAMES.iter().copied() {
        builder = builder.register(Arc::new(CommandHandler {
            name,
            registry: Arc::clone(&registry),
            broadcaster: broadcaster.clone(),
        }));
    }
    builder
}

pub struct CommandHandler {
    name: &'static str,
    registry: Arc<Registry>,
    broadcaster: Option<Arc<StatusBroadcaster>>,
}

impl Handler for CommandHandler {
    fn command_name(&self) -> &str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        writer: ResponseWriter<'a>,
        args: Vec<Shared>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            // args[0] is the command name itself; the real parameters follow.
            let params: &[Shared] = if args.is_empty() { &[] } else { &args[1..] };
            let response = self.dispatch(params).await;
            let buf = nimo_codec::encode_one(&response);
            write_envelope(writer, &buf).await.is_ok()
        })
    }
}

impl CommandHandler {
    async fn dispatch(&self, params: &[Shared]) -> Value {
        let name = response_name_for(self.name);
        let reg = &self.registry;

        macro_rules! try_arg {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(diagnostic) => return err(&name, diagnostic),
                }
            };
        }

        match self.name {
            // ---- Machines --------------------------------------------------
            "getInformationForAllMachines?" => {
                let values = reg.all_machines().iter().map(machine_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getMachineInformation?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                match reg.machine(machine_name) {
                    Some(m) => ok(&name, vec![Value::Logical(true), machine_value(&m)]),
                    None => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "getNamesOfMachines?" => {
                let values = reg.machine_names().into_iter().map(Value::String).collect();
                ok(&name, vec![array_value(values)])
            }
            "getNumberOfMachines?" => ok(&name, vec![Value::Integer(reg.machine_count() as i64)]),
            "isMachinePresent?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                ok(&name, vec![Value::Logical(reg.machine(machine_name).is_some())])
            }

            // ---- Nodes ------------------------------------------------------
            // addNode!(name, machine, service_type, command_address, command_port, [launch_details])
            "addNode!" => {
                let node_name = try_arg!(str_arg(params, 0));
                let machine_name = try_arg!(str_arg(params, 1));
                let service_type = try_arg!(str_arg(params, 2));
                let command_address = try_arg!(addr_arg(params, 3));
                let command_port = try_arg!(int_arg(params, 4)) as u16;
                let launch_details = params.get(5).cloned();
                let node = Node {
                    name: node_name.to_string(),
                    machine: machine_name.to_string(),
                    service_type: service_type.to_string(),
                    command_address,
                    command_port,
                    launch_details,
                };
                match reg.add_node(node, command_address) {
                    Ok(()) => {
                        self.publish(StatusEvent::NodeAdded { node: node_name.to_string() }).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "removeNode!" => {
                let node_name = try_arg!(str_arg(params, 0));
                match reg.remove_node(node_name) {
                    Ok(cascade) => {
                        let mut events = vec![StatusEvent::NodeRemoved { node: node_name.to_string() }];
                        events.extend(cascade.removed_channels.iter().map(StatusEvent::channel_removed));
                        events.extend(cascade.removed_connections.iter().map(StatusEvent::connection_removed));
                        self.publish_all(&events).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "getNodeInformation?" => {
                let node_name = try_arg!(str_arg(params, 0));
                match reg.node(node_name) {
                    Some(n) => ok(&name, vec![Value::Logical(true), node_value(&n)]),
                    None => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "getInformationForAllNodes?" => {
                let values = reg.all_nodes().iter().map(node_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getInformationForAllNodesOnMachine?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                let values = reg.nodes_on_machine(machine_name).iter().map(node_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getLaunchDetails?" => {
                let node_name = try_arg!(str_arg(params, 0));
                match reg.node(node_name) {
                    Some(n) => match n.launch_details {
                        Some(details) => {
                            let mut elements = vec![Arc::new(Value::Logical(true)), Arc::new(Value::Logical(true))];
                            elements.push(details);
                            response_array(&name, true, "", elements)
                        }
                        None => ok(&name, vec![Value::Logical(true), Value::Logical(false)]),
                    },
                    None => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "getNamesOfNodes?" => {
                let values = reg.all_nodes().into_iter().map(|n| Value::String(n.name)).collect();
                ok(&name, vec![array_value(values)])
            }
            "getNamesOfNodesOnMachine?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                let values = reg
                    .nodes_on_machine(machine_name)
                    .into_iter()
                    .map(|n| Value::String(n.name))
                    .collect();
                ok(&name, vec![array_value(values)])
            }
            "getNumberOfNodes?" => ok(&name, vec![Value::Integer(reg.node_count() as i64)]),
            "getNumberOfNodesOnMachine?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                ok(&name, vec![Value::Integer(reg.nodes_on_machine(machine_name).len() as i64)])
            }
            "isNodePresent?" => {
                let node_name = try_arg!(str_arg(params, 0));
                ok(&name, vec![Value::Logical(reg.node(node_name).is_some())])
            }

            // ---- Channels -----------------------------------------------------
            // addChannel!(node, path, direction, data_type, [transport])
            "addChannel!" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                let direction = try_arg!(direction_arg(params, 2));
                let data_type = try_arg!(str_arg(params, 3));
                let transport = try_arg!(transport_arg(params, 4, Transport::Any));
                let channel = Channel {
                    node: node_name.to_string(),
                    path: path.to_string(),
                    direction,
                    data_type: data_type.to_string(),
                    transport_preference: transport,
                    in_use: false,
                };
                match reg.add_channel(channel.clone()) {
                    Ok(()) => {
                        self.publish(StatusEvent::channel_added(&channel)).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "removeChannel!" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.remove_channel(node_name, path) {
                    Ok((channel, removed_connections)) => {
                        let mut events = vec![StatusEvent::channel_removed(&channel)];
                        events.extend(removed_connections.iter().map(StatusEvent::connection_removed));
                        self.publish_all(&events).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "removeChannelsForNode!" => {
                let node_name = try_arg!(str_arg(params, 0));
                match reg.remove_channels_for_node(node_name) {
                    Ok(cascade) => {
                        let mut events = vec![StatusEvent::channels_removed(node_name, &cascade.removed_channels)];
                        events.extend(cascade.removed_connections.iter().map(StatusEvent::connection_removed));
                        self.publish_all(&events).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "getChannelInformation?" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.channel(node_name, path) {
                    Some(c) => ok(&name, vec![Value::Logical(true), channel_value(&c)]),
                    None => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "getChannelInUse?" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.channel_in_use(node_name, path) {
                    Ok(in_use) => ok(&name, vec![Value::Logical(true), Value::Logical(in_use)]),
                    Err(_) => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "setChannelInUse!" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.set_channel_in_use(node_name, path, true) {
                    Ok(()) => ok(&name, vec![]),
                    Err(e) => err(&name, e),
                }
            }
            "clearChannelInUse!" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.set_channel_in_use(node_name, path, false) {
                    Ok(()) => ok(&name, vec![]),
                    Err(e) => err(&name, e),
                }
            }
            "getChannelInUseAndSet#" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                match reg.get_channel_in_use_and_set(node_name, path) {
                    Ok(prior) => ok(&name, vec![Value::Logical(true), Value::Logical(prior)]),
                    Err(e) => err(&name, e),
                }
            }
            "getInformationForAllChannels?" => {
                let values = reg.all_channels().iter().map(channel_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getInformationForAllChannelsOnNode?" => {
                let node_name = try_arg!(str_arg(params, 0));
                let values = reg.channels_on_node(node_name).iter().map(channel_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getInformationForAllChannelsOnMachine?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                let values = reg.channels_on_machine(machine_name).iter().map(channel_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getNumberOfChannels?" => ok(&name, vec![Value::Integer(reg.channel_count() as i64)]),
            "getNumberOfChannelsOnNode?" => {
                let node_name = try_arg!(str_arg(params, 0));
                ok(&name, vec![Value::Integer(reg.channels_on_node(node_name).len() as i64)])
            }
            "isChannelPresent?" => {
                let node_name = try_arg!(str_arg(params, 0));
                let path = try_arg!(str_arg(params, 1));
                ok(&name, vec![Value::Logical(reg.channel(node_name, path).is_some())])
            }

            // ---- Connections --------------------------------------------------
            // addConnection!(from_channel_name, to_channel_name, [transport])
            "addConnection!" => {
                let from = try_arg!(str_arg(params, 0));
                let to = try_arg!(str_arg(params, 1));
                let (from_node, from_path) = try_arg!(parse_channel_ref(from));
                let (to_node, to_path) = try_arg!(parse_channel_ref(to));
                let transport = try_arg!(transport_arg(params, 2, Transport::Any));
                match reg.add_connection(&from_node, &from_path, &to_node, &to_path, transport) {
                    Ok(()) => {
                        if let Some(connection) = reg.connection_from(&from_node, &from_path) {
                            self.publish(StatusEvent::connection_added(&connection)).await;
                        }
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            // removeConnection!(channel_name, [is_output]) — resolves whichever
            // connection touches the named channel, from either end (the
            // worked example in spec.md §8 item 5 names only one endpoint).
            "removeConnection!" => {
                let channel_ref = try_arg!(str_arg(params, 0));
                let (node_name, path) = try_arg!(parse_channel_ref(channel_ref));
                match reg.disconnect_channel(&node_name, &path) {
                    Ok(connection) => {
                        self.publish(StatusEvent::connection_removed(&connection)).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "disconnectChannels!" => {
                let channel_ref = try_arg!(str_arg(params, 0));
                let (node_name, path) = try_arg!(parse_channel_ref(channel_ref));
                match reg.disconnect_channel(&node_name, &path) {
                    Ok(connection) => {
                        self.publish(StatusEvent::connection_removed(&connection)).await;
                        ok(&name, vec![])
                    }
                    Err(e) => err(&name, e),
                }
            }
            "getConnectionInformation?" => {
                let channel_ref = try_arg!(str_arg(params, 0));
                let (node_name, path) = try_arg!(parse_channel_ref(channel_ref));
                match reg.connection_from(&node_name, &path) {
                    Some(c) => ok(&name, vec![Value::Logical(true), connection_value(&c)]),
                    None => ok(&name, vec![Value::Logical(false)]),
                }
            }
            "getInformationForAllConnections?" => {
                let values = reg.all_connections().iter().map(connection_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getInformationForAllConnectionsOnNode?" => {
                let node_name = try_arg!(str_arg(params, 0));
                let values = reg.connections_on_node(node_name).iter().map(connection_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getInformationForAllConnectionsOnMachine?" => {
                let machine_name = try_arg!(str_arg(params, 0));
                let values = reg.connections_on_machine(machine_name).iter().map(connection_value).collect();
                ok(&name, vec![array_value(values)])
            }
            "getNumberOfConnections?" => ok(&name, vec![Value::Integer(reg.connection_count() as i64)]),

            other => err(&name, format!("unimplemented command '{other}'")),
        }
    }

    async fn publish(&self, event: StatusEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            if let Err(e) = broadcaster.publish(&event).await {
                tracing::warn!(error = %e, "failed to publish status event");
            }
        }
    }

    async fn publish_all(&self, events: &[StatusEvent]) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.publish_all(events).await;
        }
    }
}

fn str_arg<'a>(params: &'a [Shared], index: usize) -> Result<&'a str, String> {
    params
        .get(index)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("argument {index} must be a string"))
}

fn int_arg(params: &[Shared], index: usize) -> Result<i64, String> {
    params
        .get(index)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| format!("argument {index} must be an integer"))
}

fn addr_arg(params: &[Shared], index: usize) -> Result<Ipv4Addr, String> {
    let text = str_arg(params, index)?;
    text.parse().map_err(|_| format!("argument {index} is not a valid IPv4 address"))
}

fn direction_arg(params: &[Shared], index: usize) -> Result<Direction, String> {
    match str_arg(params, index)?.to_ascii_lowercase().as_str() {
        "in" => Ok(Direction::In),
        "out" => Ok(Direction::Out),
        _ => Err(format!("argument {index} must be 'in' or 'out'")),
    }
}

fn transport_arg(params: &[Shared], index: usize, default: Transport) -> Result<Transport, String> {
    match params.get(index) {
        None => Ok(default),
        Some(v) => {
            let text = v.as_str().ok_or_else(|| format!("argument {index} must be a string"))?;
            Transport::parse(text).ok_or_else(|| format!("argument {index} is not a recognized transport"))
        }
    }
}

fn parse_channel_ref(text: &str) -> Result<(String, String), String> {
    let parsed = grammar::parse(text).map_err(|e| e.to_string())?;
    let node = parsed
        .node
        .ok_or_else(|| format!("channel reference '{text}' has no node component"))?;
    Ok((node, parsed.path))
}

fn machine_value(m: &Machine) -> Value {
    array_value(vec![Value::String(m.name.clone()), Value::Address(NimoAddress::from_ipv4(m.address))])
}

fn node_value(n: &Node) -> Value {
    let mut elements = vec![
        Value::String(n.name.clone()),
        Value::String(n.machine.clone()),
        Value::String(n.service_type.clone()),
        Value::Address(NimoAddress::from_ipv4(n.command_address)),
        Value::Integer(n.command_port as i64),
    ];
    elements.push(Value::Logical(n.launch_details.is_some()));
    let mut array = Array::new();
    for element in elements.drain(..) {
        array.push(Arc::new(element));
    }
    if let Some(details) = &n.launch_details {
        array.push(Arc::clone(details));
    }
    Value::Array(array)
}

fn channel_value(c: &Channel) -> Value {
    array_value(vec![
        Value::String(c.node.clone()),
        Value::String(c.path.clone()),
        Value::String(c.direction.as_str().to_string()),
        Value::String(c.data_type.clone()),
        Value::String(c.transport_preference.as_str().to_string()),
        Value::Logical(c.in_use),
    ])
}

fn connection_value(c: &Connection) -> Value {
    array_value(vec![
        Value::String(c.from_node.clone()),
        Value::String(c.from_path.clone()),
        Value::String(c.to_node.clone()),
        Value::String(c.to_path.clone()),
        Value::String(c.transport.as_str().to_string()),
    ])
}

fn array_value(values: Vec<Value>) -> Value {
    let mut array = Array::new();
    for v in values {
        array.push(Arc::new(v));
    }
    Value::Array(array)
}

fn ok(response_name: &str, payload: Vec<Value>) -> Value {
    let shared: Vec<Shared> = payload.into_iter().map(Arc::new).collect();
    response_array(response_name, true, "", shared)
}

fn err(response_name: &str, diagnostic: impl std::fmt::Display) -> Value {
    response_array(response_name, false, &diagnostic.to_string(), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn params(values: Vec<Value>) -> Vec<Shared> {
        values.into_iter().map(Arc::new).collect()
    }

    #[tokio::test]
    async fn add_node_then_get_information_round_trips() {
        let registry = Arc::new(Registry::new());
        let builder = register_all(HandlerTableBuilder::new(), Arc::clone(&registry), None);
        let table = builder.build();
        assert_eq!(table.len(), COMMAND_NAMES.len());

        let add_handler = CommandHandler {
            name: "addNode!",
            registry: Arc::clone(&registry),
            broadcaster: None,
        };
        let add_params = params(vec![
            Value::String("N1".to_string()),
            Value::String("m1".to_string()),
            Value::String("worker".to_string()),
            Value::String("127.0.0.1".to_string()),
            Value::Integer(9999),
        ]);
        let response = add_handler.dispatch(&add_params).await;
        assert!(response.as_array().unwrap().get(1).unwrap().as_logical().unwrap());
        assert!(registry.node("N1").is_some());

        let info_handler = CommandHandler {
            name: "getNodeInformation?",
            registry: Arc::clone(&registry),
            broadcaster: None,
        };
        let info_params = params(vec![Value::String("N1".to_string())]);
        let response = info_handler.dispatch(&info_params).await;
        let array = response.as_array().unwrap();
        assert!(array.get(1).unwrap().as_logical().unwrap());
        assert!(array.get(3).unwrap().as_logical().unwrap());
        let _ = Ipv4Addr::LOCALHOST;
    }

    #[test]
    fn parse_channel_ref_rejects_missing_node() {
        assert!(parse_channel_ref("/out").is_err());
    }

    #[test]
    fn parse_channel_ref_splits_node_and_path() {
        let (node, path) = parse_channel_ref("N1/out").unwrap();
        assert_eq!(node, "N1");
        assert_eq!(path, "/out");
    }
}
