//! The MIME envelope (C3): the wire unit for every command-port exchange.
//!
//! An envelope is the base64 of a binary-encoded message, wrapped to a
//! fixed line length divisible by four, followed by a terminator sentinel.
//! The terminator (`TERMINATOR`) is not dictated by anything upstream of
//! this crate; it is a frozen implementation choice (see DESIGN.md) picked
//! to be something `async_read_until` can match unambiguously and that
//! never collides with base64 alphabet bytes or line endings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;

/// Default line length: must be divisible by 4, matching the historical
/// `kMaxMIMELine` constant this format is descended from.
pub const DEFAULT_LINE_LENGTH: usize = 72;

/// The framing sentinel appended after the last base64 line. Chosen to be
/// unmistakable on the wire: it can never appear inside a base64 alphabet
/// run, and `async_read_until`-style readers can match it as a literal byte
/// string without needing to understand base64 at all.
pub const TERMINATOR: &[u8] = b"\r\n.\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeError {
    LineLengthNotDivisibleByFour(usize),
    LineTooLong { len: usize, max: usize },
    MissingTerminator,
    InvalidBase64,
}

impl fmt::Display for MimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeError::LineLengthNotDivisibleByFour(len) => {
                write!(f, "line length {len} is not a configured multiple of 4")
            }
            MimeError::LineTooLong { len, max } => {
                write!(f, "line of length {len} exceeds the maximum of {max}")
            }
            MimeError::MissingTerminator => write!(f, "envelope has no terminator sentinel"),
            MimeError::InvalidBase64 => write!(f, "envelope body is not valid base64"),
        }
    }
}

impl std::error::Error for MimeError {}

/// Wraps `bytes` as a base64 MIME envelope using [`DEFAULT_LINE_LENGTH`].
pub fn encode(bytes: &[u8]) -> Vec<u8> {
    encode_with_line_length(bytes, DEFAULT_LINE_LENGTH).expect("DEFAULT_LINE_LENGTH is divisible by 4")
}

/// Wraps `bytes` as a base64 MIME envelope using a caller-supplied line
/// length, which must be divisible by 4.
pub fn encode_with_line_length(bytes: &[u8], line_length: usize) -> Result<Vec<u8>, MimeError> {
    if line_length == 0 || line_length % 4 != 0 {
        return Err(MimeError::LineLengthNotDivisibleByFour(line_length));
    }
    let encoded = BASE64.encode(bytes);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / line_length * 2 + TERMINATOR.len());
    for chunk in encoded.as_bytes().chunks(line_length) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(TERMINATOR);
    Ok(out)
}

/// Locates the terminator in `input` and decodes everything before it back
/// to raw bytes. Accepts either a single unsplit buffer or one that has
/// already been split into CRLF-terminated lines and rejoined; either way
/// every line (after splitting on `\r\n`) must have a length divisible by
/// 4, and the first `=` pad character encountered ends the data — it is
/// never treated as an ordinary base64 data character.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, MimeError> {
    let body_end = find_subslice(input, TERMINATOR).ok_or(MimeError::MissingTerminator)?;
    let body = &input[..body_end];
    decode_lines(body)
}

/// Decodes from a sequence of pre-split lines (no terminator expected —
/// the caller has already stripped it).
pub fn decode_lines(body: &[u8]) -> Result<Vec<u8>, MimeError> {
    let mut collected = String::new();
    let mut truncated = false;
    for line in body.split(|&b| b == b'\n') {
        let line = strip_trailing_cr(line);
        if line.is_empty() {
            continue;
        }
        if line.len() % 4 != 0 {
            return Err(MimeError::LineLengthNotDivisibleByFour(line.len()));
        }
        let text = std::str::from_utf8(line).map_err(|_| MimeError::InvalidBase64)?;
        match text.find('=') {
            Some(pos) => {
                collected.push_str(&text[..pos]);
                truncated = true;
                break;
            }
            None => collected.push_str(text),
        }
    }
    let _ = truncated;
    BASE64
        .decode(collected.as_bytes())
        .or_else(|_| {
            // Re-attempt with padding restored, since we stripped the `=`
            // above while scanning for end-of-data.
            let mut padded = collected.clone();
            while padded.len() % 4 != 0 {
                padded.push('=');
            }
            BASE64.decode(padded.as_bytes())
        })
        .map_err(|_| MimeError::InvalidBase64)
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
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

    #[test]
    fn round_trip_small_payload() {
        let payload = b"the quick brown fox";
        let envelope = encode(payload);
        let decoded = decode(&envelope).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn round_trip_payload_spanning_multiple_lines() {
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 256) as u8).collect();
        let envelope = encode(&payload);
        let decoded = decode(&envelope).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn every_non_final_line_is_a_multiple_of_four() {
        let payload: Vec<u8> = vec![7; 500];
        let envelope = encode(&payload);
        let body_end = find_subslice(&envelope, TERMINATOR).unwrap();
        let lines: Vec<&[u8]> = envelope[..body_end].split(|&b| b == b'\n').collect();
        for line in &lines {
            let line = strip_trailing_cr(line);
            if !line.is_empty() {
                assert_eq!(line.len() % 4, 0);
                assert!(line.len() <= DEFAULT_LINE_LENGTH);
            }
        }
    }

    #[test]
    fn rejects_line_length_not_divisible_by_four() {
        assert!(encode_with_line_length(b"abc", 70).is_err());
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let mut envelope = encode(b"hello");
        let term_len = TERMINATOR.len();
        envelope.truncate(envelope.len() - term_len);
        assert_eq!(decode(&envelope), Err(MimeError::MissingTerminator));
    }

    #[test]
    fn empty_payload_round_trips() {
        let envelope = encode(b"");
        let decoded = decode(&envelope).unwrap();
        assert!(decoded.is_empty());
    }
}
