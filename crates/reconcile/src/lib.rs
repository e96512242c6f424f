//! # Reconcile
//!
//! A state reconciliation engine for remote objects managed through a
//! staged publish/discard API.
//!
//! Given the declared state of a resource and its last observed state,
//! the engine builds the minimal update payload, sends it, publishes the
//! change and reads the resource back. Any failure after a mutation was
//! attempted discards staged changes.
//!
//! ## Core Concepts
//!
//! - **Resource**: Type-level description of one remote object kind
//! - **Backend**: Performs create/fetch/update/delete calls for a resource
//! - **Presence**: Tri-state optional field (absent, explicit zero, value)
//! - **Composite IDs**: `value;;;id` pairs that keep backend IDs next to user values
//! - **Virtual settings**: Structured fields stored as flat key/value settings
//! - **Reconciler**: Runs one call through build, mutate, publish or discard
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::Reconciler;
//!
//! let mut reconciler = Reconciler::new(&client);
//! let created = reconciler.create::<RateLimitPractice>(&desired)?;
//! let updated = reconciler.update::<RateLimitPractice>(&created.observed, &changed)?;
//! reconciler.delete::<RateLimitPractice>(&updated.observed.id)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Transaction`]: Publish and discard staged changes
//! - [`Backend`]: Per-resource CRUD calls
//! - [`References`]: Referrer lookup and repair for blocked deletes
//! - [`PhaseObserver`]: Receives phase transitions

pub mod codec;
pub mod diff;
pub mod error;
pub mod flatten;
pub mod orchestrator;
pub mod presence;
pub mod resource;
pub mod settings;
pub mod transaction;
pub mod types;

// Re-export main types at crate root
pub use codec::Separator;
pub use diff::{CollectionDelta, KeyedDelta, diff, diff_values, keyed_diff};
pub use error::{DependencyBlocker, Error, ErrorCategory, Result};
pub use flatten::{
    BlockFormat, BlockSlot, Certificate, CertificateFormat, CertificateSlot, CustomHeader,
    InstructionBlock, VirtualSettings,
};
pub use orchestrator::{MAX_DEPENDENCY_RETRIES, Reconciler};
pub use presence::{Presence, ZeroValue};
pub use resource::{Backend, Mutation, ReferenceKind, Referrer, References, Resource};
pub use settings::{FlattenedSetting, SettingInput, SettingUpdate, SettingsDelta};
pub use transaction::{NoObserver, Phase, PhaseObserver, Transaction};
pub use types::{ApplyResult, ReconcileSummary, Reconciled};
