//! Drives the full command-port stack over a real TCP loopback connection:
//! `CommandAcceptor` + the registered command vocabulary on one side,
//! `nimo_registry::call_registry` on the other. This is the worked scenario
//! from the wire-format notes (add two nodes, add a channel on each, connect
//! them, look the connection up, then tear it down) run against live
//! sockets rather than the registry handlers directly, so it also exercises
//! `nimo-mime` framing and `nimo-codec` decoding end to end.

use std::net::Ipv4Addr;
use std::sync::Arc;

use nimo_registry::{call_registry, register_all, Registry};
use nimo_service::{CommandAcceptor, HandlerTableBuilder};
use nimo_value::Value;

async fn start_registry() -> Arc<CommandAcceptor> {
    let registry = Arc::new(Registry::new());
    let builder = register_all(HandlerTableBuilder::new(), registry, None);
    let table = builder.build();
    let acceptor = CommandAcceptor::bind(Ipv4Addr::LOCALHOST, table)
        .await
        .expect("bind should succeed on loopback");
    Arc::new(acceptor)
}

#[tokio::test]
async fn connect_lookup_disconnect_round_trip() {
    let acceptor = start_registry().await;
    let port = acceptor.local_addr().port();
    let run_handle = {
        let acceptor = Arc::clone(&acceptor);
        tokio::spawn(async move { acceptor.run().await })
    };

    let addr = Ipv4Addr::LOCALHOST;

    // addNode!(name, machine, service_type, command_address, command_port)
    for (node, port_arg) in [("N1", 10001i64), ("N2", 10002i64)] {
        let payload = call_registry(
            addr,
            port,
            "addNode!",
            vec![
                Arc::new(Value::String(node.to_string())),
                Arc::new(Value::String("m1".to_string())),
                Arc::new(Value::String("worker".to_string())),
                Arc::new(Value::String("127.0.0.1".to_string())),
                Arc::new(Value::Integer(port_arg)),
            ],
        )
        .await
        .expect("addNode! should succeed");
        assert!(payload.is_empty());
    }

    // addChannel!(node, path, direction, data_type)
    call_registry(
        addr,
        port,
        "addChannel!",
        vec![
            Arc::new(Value::String("N1".to_string())),
            Arc::new(Value::String("/out".to_string())),
            Arc::new(Value::String("out".to_string())),
            Arc::new(Value::String("bytes".to_string())),
        ],
    )
    .await
    .expect("addChannel! on N1 should succeed");

    call_registry(
        addr,
        port,
        "addChannel!",
        vec![
            Arc::new(Value::String("N2".to_string())),
            Arc::new(Value::String("/in".to_string())),
            Arc::new(Value::String("in".to_string())),
            Arc::new(Value::String("bytes".to_string())),
        ],
    )
    .await
    .expect("addChannel! on N2 should succeed");

    // addConnection!(N1/out, N2/in, tcp)
    call_registry(
        addr,
        port,
        "addConnection!",
        vec![
            Arc::new(Value::String("N1/out".to_string())),
            Arc::new(Value::String("N2/in".to_string())),
            Arc::new(Value::String("tcp".to_string())),
        ],
    )
    .await
    .expect("addConnection! should succeed");

    // getChannelInUse? on both endpoints now reports true.
    for (node, path) in [("N1", "/out"), ("N2", "/in")] {
        let payload = call_registry(
            addr,
            port,
            "getChannelInUse?",
            vec![
                Arc::new(Value::String(node.to_string())),
                Arc::new(Value::String(path.to_string())),
            ],
        )
        .await
        .expect("getChannelInUse? should succeed");
        assert!(payload[0].as_logical().unwrap(), "channel should be found");
        assert!(payload[1].as_logical().unwrap(), "channel should be in use");
    }

    // getConnectionInformation?(N1/out) finds the peer N2/in.
    let payload = call_registry(
        addr,
        port,
        "getConnectionInformation?",
        vec![Arc::new(Value::String("N1/out".to_string()))],
    )
    .await
    .expect("getConnectionInformation? should succeed");
    assert!(payload[0].as_logical().unwrap());
    let connection = payload[1].as_array().expect("connection info is an array");
    assert_eq!(connection.get(0).unwrap().as_str(), Some("N1"));
    assert_eq!(connection.get(1).unwrap().as_str(), Some("/out"));
    assert_eq!(connection.get(2).unwrap().as_str(), Some("N2"));
    assert_eq!(connection.get(3).unwrap().as_str(), Some("/in"));

    // removeConnection!(N1/out) tears the connection down.
    call_registry(
        addr,
        port,
        "removeConnection!",
        vec![Arc::new(Value::String("N1/out".to_string()))],
    )
    .await
    .expect("removeConnection! should succeed");

    let payload = call_registry(
        addr,
        port,
        "getConnectionInformation?",
        vec![Arc::new(Value::String("N1/out".to_string()))],
    )
    .await
    .expect("getConnectionInformation? should succeed after removal");
    assert!(!payload[0].as_logical().unwrap(), "connection should be gone");

    acceptor.shutdown();
    let _ = run_handle.await;
}

#[tokio::test]
async fn second_connection_to_a_busy_channel_is_rejected() {
    let acceptor = start_registry().await;
    let port = acceptor.local_addr().port();
    let run_handle = {
        let acceptor = Arc::clone(&acceptor);
        tokio::spawn(async move { acceptor.run().await })
    };
    let addr = Ipv4Addr::LOCALHOST;

    for (node, port_arg) in [("N1", 1i64), ("N2", 2i64), ("N3", 3i64)] {
        call_registry(
            addr,
            port,
            "addNode!",
            vec![
                Arc::new(Value::String(node.to_string())),
                Arc::new(Value::String("m1".to_string())),
                Arc::new(Value::String("worker".to_string())),
                Arc::new(Value::String("127.0.0.1".to_string())),
                Arc::new(Value::Integer(port_arg)),
            ],
        )
        .await
        .unwrap();
    }
    call_registry(
        addr,
        port,
        "addChannel!",
        vec![
            Arc::new(Value::String("N1".to_string())),
            Arc::new(Value::String("/out".to_string())),
            Arc::new(Value::String("out".to_string())),
            Arc::new(Value::String("bytes".to_string())),
        ],
    )
    .await
    .unwrap();
    for node in ["N2", "N3"] {
        call_registry(
            addr,
            port,
            "addChannel!",
            vec![
                Arc::new(Value::String(node.to_string())),
                Arc::new(Value::String("/in".to_string())),
                Arc::new(Value::String("in".to_string())),
                Arc::new(Value::String("bytes".to_string())),
            ],
        )
        .await
        .unwrap();
    }

    call_registry(
        addr,
        port,
        "addConnection!",
        vec![
            Arc::new(Value::String("N1/out".to_string())),
            Arc::new(Value::String("N2/in".to_string())),
        ],
    )
    .await
    .expect("first connection should succeed");

    let second = call_registry(
        addr,
        port,
        "addConnection!",
        vec![
            Arc::new(Value::String("N1/out".to_string())),
            Arc::new(Value::String("N3/in".to_string())),
        ],
    )
    .await;
    assert!(second.is_err(), "second connection to a busy channel must fail");

    let payload = call_registry(
        addr,
        port,
        "getConnectionInformation?",
        vec![Arc::new(Value::String("N1/out".to_string()))],
    )
    .await
    .unwrap();
    let connection = payload[1].as_array().unwrap();
    assert_eq!(connection.get(2).unwrap().as_str(), Some("N2"));

    acceptor.shutdown();
    let _ = run_handle.await;
}
