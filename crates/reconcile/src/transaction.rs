//! Publish/discard protocol and phase reporting.
//!
//! Mutations are staged on the backend until published. Every failure path
//! discards staged changes so a failed reconciliation never leaves the
//! backend half-published.

use crate::error::{Error, Result};
use std::fmt;

/// Two-phase commit exposed by the backend.
pub trait Transaction {
    /// Publish staged changes. `Ok(false)` means the backend rejected them.
    fn publish(&self) -> Result<bool>;

    /// Discard staged changes.
    fn discard(&self) -> Result<bool>;
}

/// Orchestrator phase for one reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Mutating,
    Committed,
    RolledBack,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Mutating => "mutating",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Receives phase transitions.
pub trait PhaseObserver {
    fn on_phase(&mut self, kind: &str, phase: Phase);
}

/// Observer that only logs.
pub struct NoObserver;

impl PhaseObserver for NoObserver {
    fn on_phase(&mut self, kind: &str, phase: Phase) {
        log::debug!("{kind}: {phase}");
    }
}

/// Discard staged changes and return `err`, with any discard failure
/// appended to it.
pub fn rollback<T: Transaction + ?Sized>(transaction: &T, err: Error) -> Error {
    match transaction.discard() {
        Ok(true) => err,
        Ok(false) => err.with_discard(Error::Rejected {
            operation: "discardChanges".to_string(),
        }),
        Err(discard) => err.with_discard(discard),
    }
}

/// Publish staged changes, discarding them if publishing fails.
pub fn commit<T: Transaction + ?Sized>(transaction: &T) -> Result<()> {
    match transaction.publish() {
        Ok(true) => Ok(()),
        Ok(false) => Err(rollback(
            transaction,
            Error::Rejected {
                operation: "publishChanges".to_string(),
            },
        )),
        Err(err) => Err(rollback(transaction, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Staged {
        publish_ok: bool,
        discard_ok: bool,
        discards: Cell<usize>,
    }

    impl Transaction for Staged {
        fn publish(&self) -> Result<bool> {
            Ok(self.publish_ok)
        }

        fn discard(&self) -> Result<bool> {
            self.discards.set(self.discards.get() + 1);
            if self.discard_ok {
                Ok(true)
            } else {
                Err(Error::transport("connection reset", None))
            }
        }
    }

    fn staged(publish_ok: bool, discard_ok: bool) -> Staged {
        Staged {
            publish_ok,
            discard_ok,
            discards: Cell::new(0),
        }
    }

    #[test]
    fn test_commit_publishes() {
        let tx = staged(true, true);
        commit(&tx).unwrap();
        assert_eq!(tx.discards.get(), 0);
    }

    #[test]
    fn test_commit_rejected_discards() {
        let tx = staged(false, true);
        let err = commit(&tx).unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(tx.discards.get(), 1);
    }

    #[test]
    fn test_rollback_appends_discard_failure() {
        let tx = staged(true, false);
        let err = rollback(&tx, Error::from_backend_message("boom"));
        match err {
            Error::RolledBack { source, discard } => {
                assert_eq!(source.to_string(), "backend error: boom");
                assert!(discard.to_string().contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::RolledBack.to_string(), "rolled back");
    }
}
