//! Loader for the section-less `key = value` configuration file that
//! overrides the multicast endpoints and discovery timeout (§6). This is
//! not part of THE CORE's three subsystems, but every process still reads
//! it at startup, so it lives here as an ambient, shared concern.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOGGER_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 17, 12, 1);
const DEFAULT_LOGGER_PORT: u16 = 1954;
const DEFAULT_STATUS_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 17, 12, 1);
const DEFAULT_STATUS_PORT: u16 = 1955;
const DEFAULT_REGISTRY_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fully resolved configuration: either the value read from the file (and
/// validated) or the built-in default.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub logger_address: Ipv4Addr,
    pub logger_port: u16,
    pub status_address: Ipv4Addr,
    pub status_port: u16,
    pub registry_search_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logger_address: DEFAULT_LOGGER_ADDRESS,
            logger_port: DEFAULT_LOGGER_PORT,
            status_address: DEFAULT_STATUS_ADDRESS,
            status_port: DEFAULT_STATUS_PORT,
            registry_search_timeout: DEFAULT_REGISTRY_SEARCH_TIMEOUT,
        }
    }
}

/// The platform-default configuration file path, honored when no override
/// is supplied on the command line.
pub fn default_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:/nImO/nimo-config.txt")
    } else {
        PathBuf::from("/etc/nImO/nimo-config.txt")
    }
}

/// Loads configuration from `path`, falling back entirely to
/// [`Config::default`] if the file is absent. Individual keys that fail
/// validation are replaced by their built-in default and logged as a
/// one-line diagnostic, rather than failing the whole load.
pub fn load(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(&text),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no configuration file found, using defaults");
            Config::default()
        }
    }
}

/// Parses the section-less `key = value` text format directly, useful for
/// tests and for callers that already have the file contents in memory.
pub fn parse(text: &str) -> Config {
    let mut config = Config::default();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!(line = line_no + 1, %line, "ignoring configuration line with no '='");
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        apply(&mut config, key, value, line_no + 1);
    }
    config
}

fn apply(config: &mut Config, key: &str, value: &str, line_no: usize) {
    match key {
        "logger address" => match parse_multicast_address(value) {
            Some(addr) => config.logger_address = addr,
            None => warn_and_keep_default(line_no, key, value, "must be a 239.x.x.x multicast address"),
        },
        "logger port" => match value.parse() {
            Ok(port) => config.logger_port = port,
            Err(_) => warn_and_keep_default(line_no, key, value, "must be a valid port number"),
        },
        "status address" => match parse_multicast_address(value) {
            Some(addr) => config.status_address = addr,
            None => warn_and_keep_default(line_no, key, value, "must be a 239.x.x.x multicast address"),
        },
        "status port" => match value.parse() {
            Ok(port) => config.status_port = port,
            Err(_) => warn_and_keep_default(line_no, key, value, "must be a valid port number"),
        },
        "registry search timeout" => match value.parse::<u64>() {
            Ok(secs) => config.registry_search_timeout = Duration::from_secs(secs),
            Err(_) => warn_and_keep_default(line_no, key, value, "must be an integer number of seconds"),
        },
        other => {
            tracing::warn!(line = line_no, key = other, "ignoring unrecognized configuration key");
        }
    }
}

fn warn_and_keep_default(line_no: usize, key: &str, value: &str, why: &str) {
    tracing::warn!(
        line = line_no,
        key,
        value,
        "invalid configuration value ({why}); keeping built-in default"
    );
}

fn parse_multicast_address(value: &str) -> Option<Ipv4Addr> {
    let addr: Ipv4Addr = value.parse().ok()?;
    if addr.octets()[0] == 239 {
        Some(addr)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = parse("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overrides_recognized_keys() {
        let text = "logger address = 239.1.2.3\nlogger port = 9000\n";
        let config = parse(text);
        assert_eq!(config.logger_address, Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(config.logger_port, 9000);
    }

    #[test]
    fn invalid_address_falls_back_to_default() {
        let config = parse("logger address = 10.0.0.1\n");
        assert_eq!(config.logger_address, DEFAULT_LOGGER_ADDRESS);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let config = parse("# a comment\n\n; another comment\nstatus port = 2000\n");
        assert_eq!(config.status_port, 2000);
    }

    #[test]
    fn registry_search_timeout_overrides() {
        let config = parse("registry search timeout = 10\n");
        assert_eq!(config.registry_search_timeout, Duration::from_secs(10));
    }
}
