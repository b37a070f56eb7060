//! A node's command port (C5): the acceptor, session, and handler-dispatch
//! machinery every nImO process runs, generalized from a `u32` method-ID
//! dispatch table (the pattern this workspace's RPC ancestor used) to
//! nImO's string command names.

mod acceptor;
mod handler;
mod session;
mod table;

pub use acceptor::CommandAcceptor;
pub use handler::{response_array, write_envelope, Handler, ResponseWriter, StopHandler};
pub use session::{service_one, SessionOutcome};
pub use table::{HandlerTable, HandlerTableBuilder};
