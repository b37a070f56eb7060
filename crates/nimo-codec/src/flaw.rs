//! The [`Flaw`] sentinel: what a decode reports when framing was intact but
//! the payload was structurally invalid (e.g. a map whose keys aren't all
//! the same enumeration class).

use std::fmt;

/// A decode outcome: either a value, or a distinguished flaw describing why
/// decoding failed despite the surrounding framing being well-formed.
///
/// Unlike a raw parse failure (which readers report as `None`, meaning "not
/// even framing-shaped"), a `Flaw` means the bytes were legal framing
/// wrapping semantically broken content, and that brokenness should poison
/// the rest of the decode rather than silently skip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flaw {
    pub reason: String,
}

impl Flaw {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Flaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flawed value: {}", self.reason)
    }
}

impl std::error::Error for Flaw {}

/// The result of attempting to extract one value from a buffer: a clean
/// value, a structural flaw, or "not enough bytes yet" for streaming
/// decoders that may be handed a partial buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Value(T),
    Flawed(Flaw),
    Incomplete,
}

impl<T> Extraction<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Extraction::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Extraction::Value(v) => Some(v),
            _ => None,
        }
    }
}
