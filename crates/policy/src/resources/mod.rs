//! Managed resource kinds.
//!
//! Each kind carries one record type used both as declared state (read
//! from the manifest, IDs empty) and as observed state (rendered from the
//! backend, IDs filled in), plus the backend's create/update payloads.

pub mod exceptions;
pub mod gateway_profile;
pub mod log_trigger;
pub mod rate_limit;
pub mod trusted_sources;
pub mod user_response;
pub mod web_api_practice;
pub mod web_asset;
pub mod web_practice;

use serde::{Deserialize, Deserializer, Serialize};

/// Default visibility of practices and behaviors.
pub const DEFAULT_VISIBILITY: &str = "Shared";

pub(crate) fn default_visibility() -> String {
    DEFAULT_VISIBILITY.to_string()
}

/// Deserialize `null` the same way as a missing field.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The new value of a required field, if it changed.
pub(crate) fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

/// A reference to another backend object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

pub(crate) fn ids(refs: Vec<ObjectRef>) -> Vec<String> {
    refs.into_iter().map(|r| r.id).collect()
}
