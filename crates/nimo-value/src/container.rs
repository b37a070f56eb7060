//! The three container kinds: [`Array`] (ordered, heterogeneous), [`Map`]
//! (sorted by key, homogeneous keys), and [`Set`] (sorted, homogeneous
//! members). Map and Set keep their elements in `cmp`-sorted order at all
//! times rather than relying on a hash, since `Value` has no `Hash` impl
//! that would agree with its partial ordering across the Integer/Double
//! pair.

use crate::class::{EnumerationClass, Ordering3};
use crate::value::{Shared, Value};

/// Returned when a caller tries to add a value of the wrong enumeration
/// class to a [`Map`] or [`Set`], or a value that doesn't compare at all
/// against the container's existing members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMismatch {
    pub expected: EnumerationClass,
    pub found: EnumerationClass,
}

impl std::fmt::Display for ClassMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected a value of class {}, found {}",
            self.expected, self.found
        )
    }
}

impl std::error::Error for ClassMismatch {}

/// An ordered, heterogeneous sequence of values.
#[derive(Debug, Clone, Default)]
pub struct Array {
    elements: Vec<Shared>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(elements: Vec<Shared>) -> Self {
        Self { elements }
    }

    pub fn push(&mut self, value: Shared) {
        self.elements.push(value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Shared> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shared> {
        self.elements.iter()
    }

    pub fn deep_equal(&self, other: &Array) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| a.deep_equal(b))
    }

    /// Lexicographic order over elements; the first incomparable pair of
    /// elements makes the whole array comparison `Incomparable`.
    pub fn cmp(&self, other: &Array) -> Ordering3 {
        for (a, b) in self.elements.iter().zip(other.elements.iter()) {
            match a.cmp(b) {
                Ordering3::Equal => continue,
                other => return other,
            }
        }
        Ordering3::from_std(self.elements.len().cmp(&other.elements.len()))
    }
}

/// A sorted, homogeneous set of values: every member belongs to the same
/// [`EnumerationClass`] (Integer and Double may mix freely, since they
/// share the `Number` class). The class resets to `None` once the set is
/// emptied, so a drained set can be repopulated with a different class.
#[derive(Debug, Clone, Default)]
pub struct Set {
    members: Vec<Shared>,
    class: Option<EnumerationClass>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn class(&self) -> Option<EnumerationClass> {
        self.class
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shared> {
        self.members.iter()
    }

    /// Inserts `value`, maintaining sorted order. Returns `false` without
    /// modifying the set if an equal member is already present (set
    /// semantics), after first checking that `value`'s class is
    /// compatible with the set's existing members.
    pub fn insert(&mut self, value: Shared) -> Result<bool, ClassMismatch> {
        self.check_class(&value)?;
        match self.locate(&value) {
            Ok(_) => Ok(false),
            Err(insert_at) => {
                self.members.insert(insert_at, value);
                self.class = Some(self.class.unwrap_or_else(|| self.members[insert_at].enumeration_class()));
                Ok(true)
            }
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.locate_value(value).is_ok()
    }

    /// Removes a member equal to `value`, if present. Once the last member
    /// is removed the class resets to `None`, so a drained set accepts a
    /// member of any class on its next insert.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.locate_value(value) {
            Ok(idx) => {
                self.members.remove(idx);
                if self.members.is_empty() {
                    self.class = None;
                }
                true
            }
            Err(_) => false,
        }
    }

    fn check_class(&self, value: &Value) -> Result<(), ClassMismatch> {
        if let Some(expected) = self.class {
            let found = value.enumeration_class();
            let compatible = expected == found
                || (expected == EnumerationClass::Number && found == EnumerationClass::Number);
            if !compatible {
                return Err(ClassMismatch { expected, found });
            }
        }
        Ok(())
    }

    fn locate(&self, value: &Shared) -> Result<usize, usize> {
        self.locate_value(value)
    }

    fn locate_value(&self, value: &Value) -> Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = self.members.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.members[mid].cmp(value) {
                Ordering3::Less => lo = mid + 1,
                Ordering3::Greater | Ordering3::Incomparable => hi = mid,
                Ordering3::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    pub fn deep_equal(&self, other: &Set) -> bool {
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(other.members.iter())
                .all(|(a, b)| a.deep_equal(b))
    }

    pub fn cmp(&self, other: &Set) -> Ordering3 {
        for (a, b) in self.members.iter().zip(other.members.iter()) {
            match a.cmp(b) {
                Ordering3::Equal => continue,
                other => return other,
            }
        }
        Ordering3::from_std(self.members.len().cmp(&other.members.len()))
    }
}

/// A sorted association from homogeneous-class keys to arbitrary values.
/// Like [`Set`], the key class resets to `None` once the map is emptied.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(Shared, Shared)>,
    key_class: Option<EnumerationClass>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_class(&self) -> Option<EnumerationClass> {
        self.key_class
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Shared, Shared)> {
        self.entries.iter()
    }

    /// Inserts or overwrites the value for `key`. Returns the previous
    /// value, if any was replaced.
    pub fn insert(&mut self, key: Shared, value: Shared) -> Result<Option<Shared>, ClassMismatch> {
        self.check_class(&key)?;
        match self.locate(&key) {
            Ok(idx) => {
                let previous = std::mem::replace(&mut self.entries[idx].1, value);
                Ok(Some(previous))
            }
            Err(insert_at) => {
                self.key_class = Some(self.key_class.unwrap_or_else(|| key.enumeration_class()));
                self.entries.insert(insert_at, (key, value));
                Ok(None)
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Shared> {
        self.locate_value(key).ok().map(|idx| &self.entries[idx].1)
    }

    /// Removes the entry keyed by `key`, if present, returning its value.
    /// Once the last entry is removed the key class resets to `None`, so a
    /// drained map accepts a key of any class on its next insert.
    pub fn remove(&mut self, key: &Value) -> Option<Shared> {
        let idx = self.locate_value(key).ok()?;
        let (_, value) = self.entries.remove(idx);
        if self.entries.is_empty() {
            self.key_class = None;
        }
        Some(value)
    }

    fn check_class(&self, key: &Value) -> Result<(), ClassMismatch> {
        if let Some(expected) = self.key_class {
            let found = key.enumeration_class();
            let compatible = expected == found
                || (expected == EnumerationClass::Number && found == EnumerationClass::Number);
            if !compatible {
                return Err(ClassMismatch { expected, found });
            }
        }
        Ok(())
    }

    fn locate(&self, key: &Shared) -> Result<usize, usize> {
        self.locate_value(key)
    }

    fn locate_value(&self, key: &Value) -> Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = self.entries.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.entries[mid].0.cmp(key) {
                Ordering3::Less => lo = mid + 1,
                Ordering3::Greater | Ordering3::Incomparable => hi = mid,
                Ordering3::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    pub fn deep_equal(&self, other: &Map) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().zip(other.entries.iter()).all(|(a, b)| {
                a.0.deep_equal(&b.0) && a.1.deep_equal(&b.1)
            })
    }

    pub fn cmp(&self, other: &Map) -> Ordering3 {
        for (a, b) in self.entries.iter().zip(other.entries.iter()) {
            match a.0.cmp(&b.0) {
                Ordering3::Equal => {}
                other => return other,
            }
            match a.1.cmp(&b.1) {
                Ordering3::Equal => continue,
                other => return other,
            }
        }
        Ordering3::from_std(self.entries.len().cmp(&other.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn v(i: i64) -> Shared {
        Arc::new(Value::Integer(i))
    }

    #[test]
    fn array_push_and_len() {
        let mut a = Array::new();
        a.push(v(1));
        a.push(v(2));
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(0).unwrap().as_integer(), Some(1));
    }

    #[test]
    fn set_insert_keeps_sorted_order() {
        let mut s = Set::new();
        s.insert(v(3)).unwrap();
        s.insert(v(1)).unwrap();
        s.insert(v(2)).unwrap();
        let ordered: Vec<i64> = s.iter().map(|x| x.as_integer().unwrap()).collect();
        assert_eq!(ordered, vec![1, 2, 3]);
    }

    #[test]
    fn set_insert_duplicate_is_noop() {
        let mut s = Set::new();
        assert!(s.insert(v(1)).unwrap());
        assert!(!s.insert(v(1)).unwrap());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn set_rejects_mismatched_class() {
        let mut s = Set::new();
        s.insert(v(1)).unwrap();
        let err = s
            .insert(Arc::new(Value::String("x".to_string())))
            .unwrap_err();
        assert_eq!(err.expected, EnumerationClass::Number);
        assert_eq!(err.found, EnumerationClass::String);
    }

    #[test]
    fn set_allows_integer_and_double_together() {
        let mut s = Set::new();
        s.insert(v(1)).unwrap();
        assert!(s.insert(Arc::new(Value::Double(2.5))).is_ok());
    }

    #[test]
    fn set_class_resets_when_emptied() {
        let mut s = Set::new();
        s.insert(v(1)).unwrap();
        assert!(s.remove(&Value::Integer(1)));
        assert!(s
            .insert(Arc::new(Value::String("ok".to_string())))
            .is_ok());
    }

    #[test]
    fn set_remove_missing_member_is_noop() {
        let mut s = Set::new();
        s.insert(v(1)).unwrap();
        assert!(!s.remove(&Value::Integer(2)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn map_insert_overwrites_existing_key() {
        let mut m = Map::new();
        m.insert(v(1), v(100)).unwrap();
        let previous = m.insert(v(1), v(200)).unwrap();
        assert_eq!(previous.unwrap().as_integer(), Some(100));
        assert_eq!(m.get(&Value::Integer(1)).unwrap().as_integer(), Some(200));
    }

    #[test]
    fn map_rejects_mismatched_key_class() {
        let mut m = Map::new();
        m.insert(v(1), v(1)).unwrap();
        let err = m
            .insert(Arc::new(Value::Logical(true)), v(1))
            .unwrap_err();
        assert_eq!(err.expected, EnumerationClass::Number);
        assert_eq!(err.found, EnumerationClass::Logical);
    }

    #[test]
    fn map_class_resets_when_emptied() {
        let mut m = Map::new();
        m.insert(v(1), v(100)).unwrap();
        assert!(m.remove(&Value::Integer(1)).is_some());
        assert!(m
            .insert(Arc::new(Value::Logical(true)), v(1))
            .is_ok());
    }

    #[test]
    fn map_remove_missing_key_returns_none() {
        let mut m = Map::new();
        m.insert(v(1), v(100)).unwrap();
        assert!(m.remove(&Value::Integer(2)).is_none());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn array_cmp_is_lexicographic() {
        let a = Array::from_vec(vec![v(1), v(2)]);
        let b = Array::from_vec(vec![v(1), v(3)]);
        assert_eq!(a.cmp(&b), Ordering3::Less);
    }
}
