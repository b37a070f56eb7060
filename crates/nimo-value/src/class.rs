//! The equivalence classes that govern comparability and Map/Set key
//! homogeneity, and the tri-state ordering result comparisons produce.

use std::fmt;

/// The equivalence class a [`crate::Value`] belongs to for the purposes of
/// ordering and container key homogeneity.
///
/// Two values of different classes are never equal and never orderable,
/// with one exception: `Integer` and `Double` both report `Number` and are
/// cross-comparable (see [`crate::Value::cmp`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumerationClass {
    Logical,
    Number,
    String,
    Blob,
    Date,
    Time,
    Address,
    Container,
    /// Reserved for decode-time sentinels; no ordinary `Value` reports this.
    NotComparable,
}

impl fmt::Display for EnumerationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnumerationClass::Logical => "logical",
            EnumerationClass::Number => "number",
            EnumerationClass::String => "string",
            EnumerationClass::Blob => "blob",
            EnumerationClass::Date => "date",
            EnumerationClass::Time => "time",
            EnumerationClass::Address => "address",
            EnumerationClass::Container => "container",
            EnumerationClass::NotComparable => "not-comparable",
        };
        write!(f, "{name}")
    }
}

/// The result of comparing two values: a total order within a class, plus
/// an explicit third state for pairs that cannot be compared at all
/// (e.g. a container against a scalar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering3 {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl Ordering3 {
    pub fn from_std(o: std::cmp::Ordering) -> Self {
        match o {
            std::cmp::Ordering::Less => Ordering3::Less,
            std::cmp::Ordering::Equal => Ordering3::Equal,
            std::cmp::Ordering::Greater => Ordering3::Greater,
        }
    }

    pub fn is_comparable(self) -> bool {
        !matches!(self, Ordering3::Incomparable)
    }

    pub fn reverse(self) -> Self {
        match self {
            Ordering3::Less => Ordering3::Greater,
            Ordering3::Greater => Ordering3::Less,
            other => other,
        }
    }
}
