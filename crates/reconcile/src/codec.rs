//! Composite IDs: a business value and its backend ID in one token.
//!
//! Collections such as URLs or source-identifier values are declared as
//! plain strings, but removing one from the backend needs the ID it was
//! assigned. The rendered observed state stores `value<sep>id` next to the
//! plain value so the next diff can recover it.
//!
//! No escaping is done. Values must not contain their separator.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Separator families. Each collection kind uses a fixed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;;;;`, used for asset URLs.
    Url,
    /// `;;;`, used for identifier values, URIs and setting keys.
    Value,
}

impl Separator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => ";;;;",
            Self::Value => ";;;",
        }
    }
}

/// Join a value with its backend ID.
pub fn encode(value: &str, id: &str, separator: Separator) -> String {
    debug_assert!(
        !value.contains(separator.as_str()),
        "value {value:?} contains its separator"
    );
    format!("{value}{}{id}", separator.as_str())
}

/// Split a composite ID on the first separator.
pub fn decode(raw: &str, separator: Separator) -> Result<(&str, &str)> {
    raw.split_once(separator.as_str())
        .ok_or_else(|| Error::MalformedCompositeId {
            raw: raw.to_string(),
            separator: separator.as_str(),
        })
}

/// Build a value to ID lookup from stored composite IDs.
///
/// Later entries win when a value appears twice.
pub fn index_ids<S: AsRef<str>>(raw: &[S], separator: Separator) -> Result<HashMap<String, String>> {
    let mut index = HashMap::with_capacity(raw.len());
    for item in raw {
        let (value, id) = decode(item.as_ref(), separator)?;
        index.insert(value.to_string(), id.to_string());
    }
    Ok(index)
}

/// Resolve removed values to backend IDs.
///
/// A removed value with no stored ID is a data-shape defect.
pub fn resolve_ids(
    removed: &[String],
    index: &HashMap<String, String>,
    separator: Separator,
) -> Result<Vec<String>> {
    removed
        .iter()
        .map(|value| {
            index
                .get(value)
                .cloned()
                .ok_or_else(|| Error::MalformedCompositeId {
                    raw: value.clone(),
                    separator: separator.as_str(),
                })
        })
        .collect()
}
