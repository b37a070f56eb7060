//! The command-port acceptor (§4.5 lifecycle steps 1 and 4). Binds an
//! ephemeral TCP port, then loops accepting connections and spawning one
//! session task per connection until cancelled.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::session::{service_one, SessionOutcome};
use crate::table::HandlerTable;

/// Owns the bound listener and the cancellation broadcast every session
/// task subscribes to. Dropping (or calling [`CommandAcceptor::shutdown`])
/// closes the acceptor and signals every live session to treat its socket
/// as possibly-closed, mirroring the teardown semantics in §5.
pub struct CommandAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    table: HandlerTable,
    cancel: broadcast::Sender<()>,
}

impl CommandAcceptor {
    /// Binds to an ephemeral port on `interface`.
    pub async fn bind(interface: Ipv4Addr, table: HandlerTable) -> std::io::Result<Self> {
        let listener = TcpListener::bind((interface, 0)).await?;
        let local_addr = listener.local_addr()?;
        let (cancel, _) = broadcast::channel(1);
        Ok(Self {
            listener,
            local_addr,
            table,
            cancel,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals every live session (and the accept loop itself) to stop.
    pub fn shutdown(&self) {
        let _ = self.cancel.send(());
    }

    /// Runs the accept loop until [`CommandAcceptor::shutdown`] is called
    /// or the listener errors. Each accepted connection is serviced on its
    /// own task; sessions are single-request, so the task exits as soon as
    /// one request has been handled.
    pub async fn run(&self) {
        let mut cancel_rx = self.cancel.subscribe();
        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    tracing::info!(addr = %self.local_addr, "command acceptor shutting down");
                    return;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let table = self.table.clone();
                            let mut session_cancel = self.cancel.subscribe();
                            tokio::spawn(async move {
                                tokio::select! {
                                    _ = session_cancel.recv() => {
                                        tracing::debug!(%peer, "session aborted by shutdown");
                                    }
                                    outcome = service_one(stream, &table) => {
                                        log_outcome(peer, outcome);
                                    }
                                }
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
    }
}

fn log_outcome(peer: SocketAddr, outcome: std::io::Result<SessionOutcome>) {
    match outcome {
        Ok(SessionOutcome::Dispatched { command, handled }) => {
            tracing::debug!(%peer, %command, handled, "session dispatched");
        }
        Ok(SessionOutcome::NoHandler { command }) => {
            tracing::warn!(%peer, %command, "no handler registered");
        }
        Ok(SessionOutcome::Malformed(reason)) => {
            tracing::warn!(%peer, %reason, "malformed envelope; session closed without reply");
        }
        Err(err) => {
            tracing::warn!(%peer, error = %err, "session I/O error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::HandlerTableBuilder;

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let table = HandlerTableBuilder::new().build();
        let acceptor = CommandAcceptor::bind(Ipv4Addr::LOCALHOST, table).await.unwrap();
        assert_ne!(acceptor.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_the_accept_loop() {
        let table = HandlerTableBuilder::new().build();
        let acceptor = Arc::new(CommandAcceptor::bind(Ipv4Addr::LOCALHOST, table).await.unwrap());
        let run_handle = {
            let acceptor = Arc::clone(&acceptor);
            tokio::spawn(async move { acceptor.run().await })
        };
        acceptor.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), run_handle)
            .await
            .expect("accept loop should exit promptly after shutdown")
            .unwrap();
    }
}
