//! The nImO value algebra.
//!
//! A [`Value`] is the recursive sum type shared by every wire codec in this
//! workspace (binary, text, JSON) and by the Registry's own bookkeeping.
//! It has eight scalar variants and three container variants, a tri-state
//! [`Ordering3`] in place of `std::cmp::Ordering` (containers and scalars
//! are never comparable to one another), and an [`EnumerationClass`] that
//! governs which values may share a [`Map`] or [`Set`].

mod class;
mod container;
mod scalar;
mod value;

pub use class::{EnumerationClass, Ordering3};
pub use container::{Array, ClassMismatch, Map, Set};
pub use scalar::{NimoAddress, NimoDate, NimoTime};
pub use value::{Shared, Value};
