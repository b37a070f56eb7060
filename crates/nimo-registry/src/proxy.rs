//! The client side of the Registry's command protocol: marshal a request
//! into the standard `[command, ...args]` array, send it as a MIME-wrapped
//! envelope over TCP, and unmarshal the `[response_name, ok, diagnostic,
//! ...payload]` reply §4.6 documents for every command.

use std::net::Ipv4Addr;
use std::sync::Arc;

use nimo_value::{Shared, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug)]
pub enum ProxyError {
    Io(std::io::Error),
    Mime(nimo_mime::MimeError),
    /// The envelope didn't decode to a single well-formed response array.
    Malformed(String),
    /// The response name didn't match what the request expected (every
    /// response name is the request name with `!`/`?`/`#` replaced by `=`).
    UnexpectedResponse { expected: String, found: String },
    /// `ok` was `false`; the Registry rejected the request.
    Rejected(String),
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::Io(err) => write!(f, "I/O error: {err}"),
            ProxyError::Mime(err) => write!(f, "MIME error: {err}"),
            ProxyError::Malformed(why) => write!(f, "malformed response: {why}"),
            ProxyError::UnexpectedResponse { expected, found } => {
                write!(f, "expected response '{expected}', got '{found}'")
            }
            ProxyError::Rejected(diagnostic) => write!(f, "request rejected: {diagnostic}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(err)
    }
}

impl From<nimo_mime::MimeError> for ProxyError {
    fn from(err: nimo_mime::MimeError) -> Self {
        ProxyError::Mime(err)
    }
}

/// Turns a request command name into the response name it expects back,
/// e.g. `"addNode!"` -> `"addNode="`, `"getNodeInformation?"` ->
/// `"getNodeInformation="`.
pub(crate) fn response_name_for(command: &str) -> String {
    let stem = command.trim_end_matches(['!', '?', '#']);
    format!("{stem}=")
}

/// One request/response round trip to a Registry command port.
///
/// `command` is the command name (e.g. `"addNode!"`); `args` are its
/// arguments in order. Returns the response payload elements (everything
/// after `[name, ok, diagnostic]`) on success.
pub async fn call(
    address: Ipv4Addr,
    port: u16,
    command: &str,
    args: Vec<Shared>,
) -> Result<Vec<Shared>, ProxyError> {
    let mut stream = TcpStream::connect((address, port)).await?;

    let mut elements = vec![Arc::new(Value::String(command.to_string()))];
    elements.extend(args);
    let request = Value::Array(nimo_value::Array::from_vec(elements));
    let body = nimo_codec::encode_one(&request);
    let envelope = nimo_mime::encode(&body);
    stream.write_all(&envelope).await?;

    let raw = read_until_terminator(&mut stream, nimo_mime::TERMINATOR).await?;
    let decoded_body = nimo_mime::decode(&raw)?;
    let decoded = nimo_codec::decode_one(&decoded_body)
        .map_err(|flaw| ProxyError::Malformed(flaw.to_string()))?;

    let response = decoded
        .as_array()
        .ok_or_else(|| ProxyError::Malformed("response was not an array".to_string()))?;

    let name = response
        .get(0)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProxyError::Malformed("response array is missing its name element".to_string()))?;
    let expected = response_name_for(command);
    if name != expected {
        return Err(ProxyError::UnexpectedResponse {
            expected,
            found: name.to_string(),
        });
    }

    let ok = response
        .get(1)
        .and_then(|v| v.as_logical())
        .ok_or_else(|| ProxyError::Malformed("response array is missing its ok flag".to_string()))?;
    let diagnostic = response
        .get(2)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    if !ok {
        return Err(ProxyError::Rejected(diagnostic));
    }

    let payload: Vec<Shared> = (3..response.len())
        .filter_map(|i| response.get(i).cloned())
        .collect();
    Ok(payload)
}

async fn read_until_terminator(stream: &mut TcpStream, terminator: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before a complete response was received",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= terminator.len() && buf[buf.len() - terminator.len()..] == *terminator {
            return Ok(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_name_replaces_trailing_punctuation() {
        assert_eq!(response_name_for("addNode!"), "addNode=");
        assert_eq!(response_name_for("getNodeInformation?"), "getNodeInformation=");
        assert_eq!(response_name_for("getChannelInUseAndSet#"), "getChannelInUseAndSet=");
    }
}
