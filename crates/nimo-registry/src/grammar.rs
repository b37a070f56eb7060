//! The external channel-name grammar (§3):
//!
//! ```text
//! channel-name := [ network ":" ] [ node ] path [ "#" transport ]
//! network, node := alnum|"$" ( ("_"|"."|"-")? alnum|"$" )*
//! path          := ( "/" name )+
//! transport     := "tcp" | "udp" | "any"     (case-insensitive)
//! ```

use std::fmt;

use crate::types::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelName {
    pub network: Option<String>,
    pub node: Option<String>,
    pub path: String,
    /// `None` means the transport was left unspecified ("unknown"),
    /// distinct from an explicit `any`.
    pub transport: Option<Transport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNameError(pub String);

impl fmt::Display for ChannelNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid channel name: {}", self.0)
    }
}

impl std::error::Error for ChannelNameError {}

pub fn parse(input: &str) -> Result<ChannelName, ChannelNameError> {
    let (before_hash, transport_str) = match input.rsplit_once('#') {
        Some((b, t)) => (b, Some(t)),
        None => (input, None),
    };

    let transport = match transport_str {
        Some(t) => Some(
            Transport::parse(t).ok_or_else(|| ChannelNameError(format!("unrecognized transport '{t}'")))?,
        ),
        None => None,
    };

    let (network, rest) = match before_hash.split_once(':') {
        Some((n, r)) => (Some(n), r),
        None => (None, before_hash),
    };
    if let Some(n) = network {
        validate_identifier(n)?;
    }

    let slash_pos = rest
        .find('/')
        .ok_or_else(|| ChannelNameError("missing path component".to_string()))?;
    let (node, path) = rest.split_at(slash_pos);
    let node = if node.is_empty() { None } else { Some(node) };
    if let Some(n) = node {
        validate_identifier(n)?;
    }
    validate_path(path)?;

    Ok(ChannelName {
        network: network.map(str::to_string),
        node: node.map(str::to_string),
        path: path.to_string(),
        transport,
    })
}

fn validate_identifier(s: &str) -> Result<(), ChannelNameError> {
    let mut chars = s.chars();
    let first = chars
        .next()
        .ok_or_else(|| ChannelNameError("identifier is empty".to_string()))?;
    if !(first.is_alphanumeric() || first == '$') {
        return Err(ChannelNameError(format!("identifier '{s}' has an invalid leading character")));
    }
    let mut chars = chars.peekable();
    while let Some(c) = chars.next() {
        if c == '_' || c == '.' || c == '-' {
            let next = chars
                .next()
                .ok_or_else(|| ChannelNameError(format!("identifier '{s}' ends with a separator")))?;
            if !(next.is_alphanumeric() || next == '$') {
                return Err(ChannelNameError(format!("identifier '{s}' has two separators in a row")));
            }
        } else if !(c.is_alphanumeric() || c == '$') {
            return Err(ChannelNameError(format!("identifier '{s}' contains an invalid character '{c}'")));
        }
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), ChannelNameError> {
    if !path.starts_with('/') {
        return Err(ChannelNameError("path must begin with '/'".to_string()));
    }
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ChannelNameError(format!("path '{path}' has an empty segment")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_form_parses() {
        let parsed = parse("netA:node1/out#tcp").unwrap();
        assert_eq!(parsed.network.as_deref(), Some("netA"));
        assert_eq!(parsed.node.as_deref(), Some("node1"));
        assert_eq!(parsed.path, "/out");
        assert_eq!(parsed.transport, Some(Transport::Tcp));
    }

    #[test]
    fn bare_path_has_no_network_or_node_and_unknown_transport() {
        let parsed = parse("/out").unwrap();
        assert_eq!(parsed.network, None);
        assert_eq!(parsed.node, None);
        assert_eq!(parsed.path, "/out");
        assert_eq!(parsed.transport, None);
    }

    #[test]
    fn double_colon_fails_to_parse() {
        assert!(parse("::foo").is_err());
    }

    #[test]
    fn missing_path_fails_to_parse() {
        assert!(parse("node1").is_err());
    }

    #[test]
    fn multi_segment_path_parses() {
        let parsed = parse("node1/a/b/c").unwrap();
        assert_eq!(parsed.path, "/a/b/c");
    }

    #[test]
    fn case_insensitive_transport() {
        let parsed = parse("/out#TCP").unwrap();
        assert_eq!(parsed.transport, Some(Transport::Tcp));
    }
}
