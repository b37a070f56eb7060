//! Umbrella crate for the nImO workspace: the typed value model and its
//! three wire codecs, the MIME envelope they travel in, ambient
//! configuration, mDNS-based discovery, the service/session runtime every
//! process embeds, and the Registry's entity store, status feed, and RPC
//! client.
//!
//! Most callers only need this crate — it re-exports the full public
//! surface of `nimo-value`, `nimo-codec`, `nimo-mime`, `nimo-config`,
//! `nimo-discovery`, `nimo-service`, and `nimo-registry` so a binary can
//! depend on one path instead of seven.

pub use nimo_value::{Array, ClassMismatch, EnumerationClass, Map, NimoAddress, NimoDate, NimoTime, Ordering3, Set, Shared, Value};

pub use nimo_codec::{
    decode_message, decode_one, encode_message, encode_one, parse_text, print_text, read_binary_value,
    read_text_value, to_json, to_json_string, DecodedMessage, Extraction, Flaw,
};

pub use nimo_mime::{decode as mime_decode, encode as mime_encode, MimeError, DEFAULT_LINE_LENGTH, TERMINATOR};

pub use nimo_config::{default_path as default_config_path, load as load_config, parse as parse_config, Config};

pub use nimo_discovery::{
    announce, Discovery, DiscoveryContext, DiscoveryError, RegistryEndpoint, DEFAULT_SEARCH_TIMEOUT,
    SERVICE_TYPE as REGISTRY_SERVICE_TYPE, TXT_KEY_REGISTRY_ADDRESS,
};

pub use nimo_service::{
    response_array, write_envelope, CommandAcceptor, Handler, HandlerTable, HandlerTableBuilder, ResponseWriter,
    SessionOutcome, StopHandler,
};

pub use nimo_registry::{
    call_registry, parse_channel_name, register_all as register_registry_handlers, Channel, ChannelKey,
    ChannelName, ChannelNameError, Connection, Direction, Machine, Node, NodeRemovalCascade, ProxyError, Registry,
    RegistryError, StatusBroadcaster, StatusEvent, Transport, COMMAND_NAMES as REGISTRY_COMMAND_NAMES,
};

/// Convenience re-exports for the common case: building a process that
/// speaks the command protocol (service or client) against values and
/// the two codecs that matter on the wire.
pub mod prelude {
    pub use crate::{decode_one, encode_one, Array, Map, Set, Shared, Value};
    pub use crate::{response_array, Handler, HandlerTable, HandlerTableBuilder};
}
