//! Tri-state presence for optional update fields.
//!
//! An update payload must tell apart "leave this field alone" from "set it
//! to zero". A plain `Option<T>` cannot carry that once the value is zero,
//! so every optional scalar in an update input is a [`Presence`]:
//!
//! - [`Presence::Absent`] is omitted from the payload entirely.
//! - [`Presence::ExplicitZero`] is sent as the type's zero value.
//! - [`Presence::ExplicitValue`] is sent as-is.
//!
//! Fields are declared as
//! `#[serde(default, skip_serializing_if = "Presence::is_absent")]`.

use serde::{Serialize, Serializer};

/// Types with a distinguished zero value.
pub trait ZeroValue: Sized {
    fn zero() -> Self;
    fn is_zero(&self) -> bool;
}

macro_rules! numeric_zero {
    ($($ty:ty),*) => {
        $(impl ZeroValue for $ty {
            fn zero() -> Self {
                0
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }
        })*
    };
}

numeric_zero!(i32, i64, u16, u32, u64);

impl ZeroValue for bool {
    fn zero() -> Self {
        false
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl ZeroValue for String {
    fn zero() -> Self {
        Self::new()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// Presence classification of one optional field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence<T> {
    /// Not part of this update.
    Absent,
    /// Present and equal to the zero value.
    ExplicitZero,
    /// Present with a non-zero value.
    ExplicitValue(T),
}

impl<T> Default for Presence<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Presence<T> {
    /// Check if the field should be omitted from the payload
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Check if the field carries anything
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }
}

impl<T: ZeroValue + PartialEq + Clone> Presence<T> {
    fn classify(value: &T) -> Self {
        if value.is_zero() {
            Self::ExplicitZero
        } else {
            Self::ExplicitValue(value.clone())
        }
    }

    /// Classify a field by comparing its last observed and declared values.
    ///
    /// Unchanged fields are absent, and so are fields the declaration does
    /// not mention: leaving a key out never resets the remote value.
    pub fn of_change(old: Option<&T>, new: Option<&T>) -> Self {
        match (old, new) {
            (_, None) => Self::Absent,
            (Some(old), Some(new)) if old == new => Self::Absent,
            (_, Some(new)) => Self::classify(new),
        }
    }

    /// Classify a field that is sent whenever it is declared.
    pub fn of_declared(new: Option<&T>) -> Self {
        new.map_or(Self::Absent, Self::classify)
    }

    /// The value the payload would carry, if any.
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::ExplicitZero => Some(T::zero()),
            Self::ExplicitValue(value) => Some(value.clone()),
        }
    }
}

impl<T: Serialize + ZeroValue> Serialize for Presence<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::ExplicitZero => T::zero().serialize(serializer),
            Self::ExplicitValue(value) => value.serialize(serializer),
        }
    }
}
