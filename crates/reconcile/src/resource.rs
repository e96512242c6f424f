//! Resource and backend traits.
//!
//! A [`Resource`] is a type-level description of one kind of remote object:
//! its declared and observed shapes, the payloads the backend accepts, and
//! the pure functions between them. A [`Backend`] performs the calls.

use crate::error::{DependencyBlocker, Result};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An update payload.
pub trait Mutation {
    /// Whether sending this payload would change nothing.
    fn is_empty(&self) -> bool;
}

/// How other objects point at a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Referenced from asset practice wrappers.
    Practice,
    /// Referenced from asset behavior lists.
    Behavior,
    /// Referenced from asset profile lists.
    Profile,
    /// Referenced from the trigger lists inside asset practice wrappers.
    Trigger,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Practice => f.write_str("practice"),
            Self::Behavior => f.write_str("behavior"),
            Self::Profile => f.write_str("profile"),
            Self::Trigger => f.write_str("trigger"),
        }
    }
}

/// One kind of managed remote object.
pub trait Resource {
    /// Declared state, owned by the caller.
    type Desired;
    /// Last canonical snapshot, with backend IDs.
    type Observed: Clone;
    /// Object as returned by the backend.
    type Remote;
    /// Payload of the create mutation.
    type CreateInput: Serialize;
    /// Payload of the update mutation.
    type UpdateInput: Serialize + Mutation;

    /// Kind name used in logs and errors.
    const KIND: &'static str;

    /// Set when deleting this kind can be blocked by referrers.
    const REFERENCE: Option<ReferenceKind> = None;

    fn create_input(desired: &Self::Desired) -> Result<Self::CreateInput>;

    fn update_input(observed: &Self::Observed, desired: &Self::Desired) -> Result<Self::UpdateInput>;

    /// Map a backend object back into observed state.
    fn render(remote: Self::Remote) -> Result<Self::Observed>;

    fn remote_id(remote: &Self::Remote) -> &str;

    fn observed_id(observed: &Self::Observed) -> &str;

    /// Drop the blocking object from the payload's remove lists.
    ///
    /// Returns `true` only if the payload shrank, so the update can be
    /// retried.
    fn relax(_input: &mut Self::UpdateInput, _blocker: &DependencyBlocker) -> bool {
        false
    }
}

/// CRUD calls for one resource kind.
pub trait Backend<R: Resource>: Transaction {
    fn create(&self, input: &R::CreateInput) -> Result<R::Remote>;

    /// Fetch an object. `Ok(None)` means it does not exist.
    fn fetch(&self, id: &str) -> Result<Option<R::Remote>>;

    fn update(&self, id: &str, input: &R::UpdateInput) -> Result<bool>;

    fn delete(&self, id: &str) -> Result<bool>;
}

/// An object that refers to another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referrer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub object_type: String,
    #[serde(rename = "subType", default)]
    pub sub_type: String,
    #[serde(rename = "objectStatus", default)]
    pub status: String,
    /// Practices of the referrer that hold the reference, for triggers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub practices: Vec<String>,
}

impl Referrer {
    /// Deleted objects and wrappers hold no reference worth repairing.
    pub fn is_live(&self) -> bool {
        self.status != "Deleted" && self.object_type != "Wrapper"
    }
}

/// Reference lookup and repair.
pub trait References {
    /// List the objects that refer to `id`.
    fn used_by(&self, kind: ReferenceKind, id: &str) -> Result<Vec<Referrer>>;

    /// Remove the reference to `id` from `referrer` via the referrer's own
    /// update mutation.
    fn strip_reference(&self, referrer: &Referrer, kind: ReferenceKind, id: &str) -> Result<bool>;
}
