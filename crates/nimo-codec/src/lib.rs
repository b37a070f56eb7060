//! The three wire encodings over [`nimo_value::Value`]: a binary message
//! format used on the control-plane wire, a human-readable text form used
//! by CLI collaborators and in tests, and a one-way JSON renderer used for
//! tooling and diagnostics output.

mod binary;
mod flaw;
mod json;
mod text;

pub use binary::{decode_message, decode_one, encode_message, encode_one, read_value as read_binary_value, write_value as write_binary_value, DecodedMessage};
pub use flaw::{Extraction, Flaw};
pub use json::{to_json, to_string as to_json_string};
pub use text::{parse as parse_text, print_to_string as print_text, read_value as read_text_value};
