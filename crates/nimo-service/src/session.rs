//! A single accepted connection. Sessions are single-request by design
//! (§4.5): read one envelope, decode it, dispatch by name, then the
//! connection closes regardless of outcome.

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::handler::{response_array, write_envelope};
use crate::table::HandlerTable;

/// Bound generously above any real request; guards against a misbehaving
/// or malicious peer that never sends the terminator.
const MAX_ENVELOPE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub enum SessionOutcome {
    /// A handler ran and returned its own success/failure.
    Dispatched { command: String, handled: bool },
    /// No handler matched; the acceptor wrote the standard bad response.
    NoHandler { command: String },
    /// The envelope was malformed; the session closed without a reply.
    Malformed(String),
}

/// Services exactly one request on `stream`, then returns. The caller is
/// expected to drop `stream` afterward — sessions never persist past their
/// single exchange.
pub async fn service_one(stream: TcpStream, table: &HandlerTable) -> std::io::Result<SessionOutcome> {
    let (mut read_half, mut write_half) = stream.into_split();
    let envelope = match read_until_terminator(&mut read_half, nimo_mime::TERMINATOR).await? {
        Some(bytes) => bytes,
        None => return Ok(SessionOutcome::Malformed("connection closed before terminator".into())),
    };

    let message_bytes = match nimo_mime::decode(&envelope) {
        Ok(b) => b,
        Err(e) => return Ok(SessionOutcome::Malformed(e.to_string())),
    };

    let request = match nimo_codec::decode_one(&message_bytes) {
        Ok(v) => v,
        Err(e) => return Ok(SessionOutcome::Malformed(e.to_string())),
    };

    let Some(array) = request.as_array() else {
        return Ok(SessionOutcome::Malformed("request is not an array".into()));
    };
    let Some(command) = array.get(0).and_then(|v| v.as_str()) else {
        return Ok(SessionOutcome::Malformed("request's first element is not a command name".into()));
    };
    let command = command.to_string();
    let args: Vec<_> = array.iter().cloned().collect();

    match table.lookup(&command) {
        Some(handler) => {
            let handled = handler.handle(&mut write_half, args).await;
            Ok(SessionOutcome::Dispatched { command, handled })
        }
        None => {
            let response = response_array(
                "error=",
                false,
                &format!("no handler registered for '{command}'"),
                vec![],
            );
            let buf = nimo_codec::encode_one(&response);
            let _ = write_envelope(&mut write_half, &buf).await;
            Ok(SessionOutcome::NoHandler { command })
        }
    }
}

/// Reads from `stream` until `terminator` has been seen in full, returning
/// everything read (terminator included), or `None` if the peer closed the
/// connection first.
async fn read_until_terminator(
    stream: &mut (impl tokio::io::AsyncRead + Unpin),
    terminator: &[u8],
) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_ENVELOPE_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "envelope exceeded the maximum accepted size",
            ));
        }
        // A single read may return more than one envelope's worth of bytes
        // if the peer pipelines past its one request; truncate at the end
        // of the first terminator and drop anything after it, since a
        // session only ever answers the one request it was opened for.
        if let Some(end) = find_subslice(&buf, terminator) {
            buf.truncate(end + terminator.len());
            return Ok(Some(buf));
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_until_terminator_stops_at_sentinel() {
        let data = b"hello\r\n.\r\nmore-data-that-should-not-be-read".to_vec();
        let mut cursor = std::io::Cursor::new(data);
        let result = read_until_terminator(&mut cursor, nimo_mime::TERMINATOR)
            .await
            .unwrap()
            .unwrap();
        assert!(result.ends_with(nimo_mime::TERMINATOR));
    }

    #[tokio::test]
    async fn read_until_terminator_reports_closed_connection() {
        let data: Vec<u8> = b"incomplete".to_vec();
        let mut cursor = std::io::Cursor::new(data);
        let result = read_until_terminator(&mut cursor, nimo_mime::TERMINATOR)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
