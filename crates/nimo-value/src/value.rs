use std::sync::Arc;

use crate::class::{EnumerationClass, Ordering3};
use crate::container::{Array, Map, Set};
use crate::scalar::{NimoAddress, NimoDate, NimoTime};

/// A child reference inside an [`Array`], [`Map`], or [`Set`].
///
/// Values are immutable once constructed, so the only way to add a value to
/// a container is to hand over ownership of a freshly-built `Value`; a
/// container can therefore never end up holding a live reference to one of
/// its own ancestors, which is what rules out cycles in the value DAG.
pub type Shared = Arc<Value>;

/// The recursive sum type at the heart of nImO: every piece of data that
/// crosses the wire — Registry requests, responses, status broadcasts — is
/// a `Value`.
#[derive(Debug, Clone)]
pub enum Value {
    Logical(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Date(NimoDate),
    Time(NimoTime),
    Address(NimoAddress),
    Array(Array),
    Map(Map),
    Set(Set),
}

impl Value {
    /// A human-readable, one-word type name, used in diagnostics and in
    /// the JSON/text codecs' error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Address(_) => "address",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }

    /// The equivalence class used for ordering and Map/Set key homogeneity.
    pub fn enumeration_class(&self) -> EnumerationClass {
        match self {
            Value::Logical(_) => EnumerationClass::Logical,
            Value::Integer(_) | Value::Double(_) => EnumerationClass::Number,
            Value::String(_) => EnumerationClass::String,
            Value::Blob(_) => EnumerationClass::Blob,
            Value::Date(_) => EnumerationClass::Date,
            Value::Time(_) => EnumerationClass::Time,
            Value::Address(_) => EnumerationClass::Address,
            Value::Array(_) | Value::Map(_) | Value::Set(_) => EnumerationClass::Container,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Map(_) | Value::Set(_))
    }

    /// Structural, deep equality. Reference identity (`Arc::ptr_eq`) is
    /// checked first purely as a fast path; it never changes the answer.
    pub fn deep_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Logical(a), Value::Logical(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Integer(a), Value::Double(b)) | (Value::Double(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Address(a), Value::Address(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.deep_equal(b),
            (Value::Map(a), Value::Map(b)) => a.deep_equal(b),
            (Value::Set(a), Value::Set(b)) => a.deep_equal(b),
            _ => false,
        }
    }

    /// A total order within an enumeration class; `Incomparable` when the
    /// two values have no defined relative order (a container against a
    /// scalar, or differing classes other than the Integer/Double pair).
    pub fn cmp(&self, other: &Value) -> Ordering3 {
        match (self, other) {
            (Value::Logical(a), Value::Logical(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => match a.partial_cmp(b) {
                Some(o) => Ordering3::from_std(o),
                None => Ordering3::Incomparable,
            },
            (Value::Integer(a), Value::Double(b)) => match (*a as f64).partial_cmp(b) {
                Some(o) => Ordering3::from_std(o),
                None => Ordering3::Incomparable,
            },
            (Value::Double(a), Value::Integer(b)) => match a.partial_cmp(&(*b as f64)) {
                Some(o) => Ordering3::from_std(o),
                None => Ordering3::Incomparable,
            },
            (Value::String(a), Value::String(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Blob(a), Value::Blob(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Address(a), Value::Address(b)) => Ordering3::from_std(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (a, b) if a.is_container() && b.is_container() => container_kind_rank(a)
                .partial_cmp(&container_kind_rank(b))
                .map(Ordering3::from_std)
                .unwrap_or(Ordering3::Incomparable),
            _ => Ordering3::Incomparable,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// Arbitrary but fixed precedence used to totally order the three
/// container kinds against each other when they are not already equal by
/// structure; `spec.md` leaves container-vs-container-of-different-kind
/// ordering unspecified, so this ranking is a frozen implementation
/// decision (see DESIGN.md).
fn container_kind_rank(v: &Value) -> u8 {
    match v {
        Value::Array(_) => 0,
        Value::Map(_) => 1,
        Value::Set(_) => 2,
        _ => unreachable!("container_kind_rank called on a non-container value"),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equal(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflexivity() {
        let v = Value::Integer(42);
        assert_eq!(v.cmp(&v), Ordering3::Equal);
    }

    #[test]
    fn antisymmetry() {
        let a = Value::Integer(1);
        let b = Value::Integer(2);
        assert_eq!(a.cmp(&b), Ordering3::Less);
        assert_eq!(b.cmp(&a), Ordering3::Greater);
    }

    #[test]
    fn integer_double_cross_compare() {
        let a = Value::Integer(42);
        let b = Value::Double(42.0);
        assert!(a.deep_equal(&b));
        assert_eq!(a.cmp(&b), Ordering3::Equal);

        let c = Value::Double(41.5);
        assert_eq!(c.cmp(&a), Ordering3::Less);
    }

    #[test]
    fn container_vs_scalar_is_incomparable() {
        let arr = Value::Array(Array::default());
        let n = Value::Integer(1);
        assert_eq!(arr.cmp(&n), Ordering3::Incomparable);
        assert!(!arr.deep_equal(&n));
    }

    #[test]
    fn different_class_not_equal() {
        let a = Value::String("1".to_string());
        let b = Value::Integer(1);
        assert!(!a.deep_equal(&b));
        assert_eq!(a.cmp(&b), Ordering3::Incomparable);
    }

    #[test]
    fn describe_names() {
        assert_eq!(Value::Logical(true).describe(), "logical");
        assert_eq!(Value::Integer(0).describe(), "integer");
        assert_eq!(Value::Array(Array::default()).describe(), "array");
    }
}
