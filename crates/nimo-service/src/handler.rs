//! The per-command handler contract, generalized from a `u32` method-ID
//! dispatch table to nImO's string command names (`addNode!`, `stop!`,
//! `getNodeInformation?`, …).

use std::future::Future;
use std::pin::Pin;

use nimo_value::Shared;
use tokio::io::AsyncWrite;
use tokio::net::tcp::OwnedWriteHalf;

/// The write half of a session's socket, boxed so handlers don't need to
/// be generic over the concrete transport.
pub type ResponseWriter<'a> = &'a mut OwnedWriteHalf;

/// Implemented once per registered command name. A handler receives the
/// full decoded argument array (element 0 is always the command name
/// itself) and the session's socket write half, and is responsible for
/// writing its own response envelope before returning — the acceptor only
/// writes a response on its own behalf when no handler matched at all.
pub trait Handler: Send + Sync {
    /// The exact command name this handler answers to, e.g. `"stop!"`.
    fn command_name(&self) -> &str;

    fn handle<'a>(
        &'a self,
        writer: ResponseWriter<'a>,
        args: Vec<Shared>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// Writes `bytes` as a framed MIME envelope to `writer`.
pub async fn write_envelope(writer: &mut (impl AsyncWrite + Unpin), bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let envelope = nimo_mime::encode(bytes);
    writer.write_all(&envelope).await
}

/// Builds the standard response array shape: `[response_name, ok, diagnostic, ...payload]`.
pub fn response_array(
    response_name: &str,
    ok: bool,
    diagnostic: &str,
    payload: Vec<Shared>,
) -> nimo_value::Value {
    use std::sync::Arc;
    let mut elements = vec![
        Arc::new(nimo_value::Value::String(response_name.to_string())),
        Arc::new(nimo_value::Value::Logical(ok)),
        Arc::new(nimo_value::Value::String(diagnostic.to_string())),
    ];
    elements.extend(payload);
    nimo_value::Value::Array(nimo_value::Array::from_vec(elements))
}

/// The `stop!` handler every service registers: fires an optional
/// callback, then flips the process-wide keep-running flag.
pub struct StopHandler<F: Fn() + Send + Sync> {
    keep_running: std::sync::Arc<std::sync::atomic::AtomicBool>,
    on_stop: F,
}

impl<F: Fn() + Send + Sync> StopHandler<F> {
    pub fn new(keep_running: std::sync::Arc<std::sync::atomic::AtomicBool>, on_stop: F) -> Self {
        Self { keep_running, on_stop }
    }
}

impl<F: Fn() + Send + Sync> Handler for StopHandler<F> {
    fn command_name(&self) -> &str {
        "stop!"
    }

    fn handle<'a>(
        &'a self,
        writer: ResponseWriter<'a>,
        _args: Vec<Shared>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            (self.on_stop)();
            self.keep_running
                .store(false, std::sync::atomic::Ordering::SeqCst);
            let response = response_array("stop=", true, "", vec![]);
            let buf = nimo_codec::encode_one(&response);
            write_envelope(writer, &buf).await.is_ok()
        })
    }
}
