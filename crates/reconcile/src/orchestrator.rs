//! Reconciliation orchestrator - create, read, update and delete one resource
//!
//! Each call walks `Idle → Building → Mutating → {Committed, RolledBack} → Idle`.
//! Observed state is never assumed after a mutation: it is always fetched
//! again once the change is published.

use crate::error::{Error, Result};
use crate::resource::{Backend, Mutation, ReferenceKind, Referrer, References, Resource};
use crate::transaction::{NoObserver, Phase, PhaseObserver, Transaction, commit, rollback};
use crate::types::{ApplyResult, Reconciled};

/// Upper bound on update retries after dependency errors.
pub const MAX_DEPENDENCY_RETRIES: usize = 8;

/// Drives one backend through reconciliation calls.
pub struct Reconciler<'a, B: ?Sized, P = NoObserver> {
    backend: &'a B,
    observer: P,
}

impl<'a, B: ?Sized> Reconciler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            observer: NoObserver,
        }
    }
}

impl<'a, B: ?Sized, P: PhaseObserver> Reconciler<'a, B, P> {
    /// Report phases to `observer` instead of the log.
    pub fn with_observer<Q: PhaseObserver>(self, observer: Q) -> Reconciler<'a, B, Q> {
        Reconciler {
            backend: self.backend,
            observer,
        }
    }

    pub fn observer(&self) -> &P {
        &self.observer
    }

    fn enter(&mut self, kind: &str, phase: Phase) {
        self.observer.on_phase(kind, phase);
    }

    fn fail(&mut self, kind: &str, err: Error) -> Error
    where
        B: Transaction,
    {
        self.enter(kind, Phase::RolledBack);
        let err = rollback(self.backend, err);
        self.enter(kind, Phase::Idle);
        err
    }

    fn finish(&mut self, kind: &str) -> Result<()>
    where
        B: Transaction,
    {
        if let Err(err) = commit(self.backend) {
            self.enter(kind, Phase::RolledBack);
            self.enter(kind, Phase::Idle);
            return Err(err);
        }
        self.enter(kind, Phase::Committed);
        Ok(())
    }

    fn refetch<R: Resource>(&mut self, id: &str) -> Result<R::Observed>
    where
        B: Backend<R>,
    {
        let remote = <B as Backend<R>>::fetch(self.backend, id)?.ok_or_else(|| Error::NotFound {
            kind: R::KIND,
            id: id.to_string(),
        })?;
        R::render(remote)
    }

    /// Create a resource and return its canonical observed state.
    pub fn create<R: Resource>(&mut self, desired: &R::Desired) -> Result<Reconciled<R::Observed>>
    where
        B: Backend<R>,
    {
        self.enter(R::KIND, Phase::Building);
        let input = match R::create_input(desired) {
            Ok(input) => input,
            Err(err) => {
                self.enter(R::KIND, Phase::Idle);
                return Err(err);
            }
        };

        self.enter(R::KIND, Phase::Mutating);
        let remote = match <B as Backend<R>>::create(self.backend, &input) {
            Ok(remote) => remote,
            Err(err) => return Err(self.fail(R::KIND, err)),
        };
        let id = R::remote_id(&remote).to_string();
        log::debug!("Created {} {id}", R::KIND);

        self.finish(R::KIND)?;
        let observed = self.refetch::<R>(&id);
        self.enter(R::KIND, Phase::Idle);
        Ok(Reconciled {
            observed: observed?,
            result: ApplyResult::Created,
        })
    }

    /// Fetch and render a resource. `Ok(None)` means it no longer exists.
    pub fn read<R: Resource>(&mut self, id: &str) -> Result<Option<R::Observed>>
    where
        B: Backend<R>,
    {
        match <B as Backend<R>>::fetch(self.backend, id)? {
            Some(remote) => R::render(remote).map(Some),
            None => {
                log::debug!("{} {id} not found", R::KIND);
                Ok(None)
            }
        }
    }

    /// Move a resource from `observed` to `desired`.
    ///
    /// An empty update payload sends nothing and returns `observed` as-is.
    pub fn update<R: Resource>(
        &mut self,
        observed: &R::Observed,
        desired: &R::Desired,
    ) -> Result<Reconciled<R::Observed>>
    where
        B: Backend<R>,
    {
        self.enter(R::KIND, Phase::Building);
        let id = R::observed_id(observed).to_string();
        let mut input = match R::update_input(observed, desired) {
            Ok(input) => input,
            Err(err) => {
                self.enter(R::KIND, Phase::Idle);
                return Err(err);
            }
        };

        if input.is_empty() {
            log::debug!("{} {id} is up to date", R::KIND);
            self.enter(R::KIND, Phase::Idle);
            return Ok(Reconciled {
                observed: observed.clone(),
                result: ApplyResult::NoChange,
            });
        }

        self.enter(R::KIND, Phase::Mutating);
        let mut retries = 0;
        loop {
            match <B as Backend<R>>::update(self.backend, &id, &input) {
                Ok(true) => break,
                Ok(false) => {
                    let err = Error::Rejected {
                        operation: format!("update {} {id}", R::KIND),
                    };
                    return Err(self.fail(R::KIND, err));
                }
                Err(Error::Dependency { message, blocker }) if retries < MAX_DEPENDENCY_RETRIES => {
                    // Nothing was accepted if relaxing leaves an empty payload.
                    if !R::relax(&mut input, &blocker) || input.is_empty() {
                        return Err(self.fail(R::KIND, Error::Dependency { message, blocker }));
                    }
                    retries += 1;
                    log::debug!(
                        "Retrying update of {} {id} without {blocker} (attempt {retries})",
                        R::KIND
                    );
                }
                Err(err) => return Err(self.fail(R::KIND, err)),
            }
        }

        self.finish(R::KIND)?;
        let observed = self.refetch::<R>(&id);
        self.enter(R::KIND, Phase::Idle);
        Ok(Reconciled {
            observed: observed?,
            result: ApplyResult::Modified,
        })
    }

    /// Delete a resource.
    ///
    /// When the backend reports the object is still referenced, referrers
    /// are detached once and the delete is retried exactly once.
    pub fn delete<R: Resource>(&mut self, id: &str) -> Result<ApplyResult>
    where
        B: Backend<R> + References,
    {
        self.enter(R::KIND, Phase::Mutating);
        match <B as Backend<R>>::delete(self.backend, id) {
            Ok(true) => {}
            Ok(false) => {
                let err = Error::Rejected {
                    operation: format!("delete {} {id}", R::KIND),
                };
                return Err(self.fail(R::KIND, err));
            }
            Err(err) if err.is_referenced() => match R::REFERENCE {
                Some(kind) => self.repair_and_retry::<R>(kind, id, err)?,
                None => return Err(self.fail(R::KIND, err)),
            },
            Err(err) => return Err(self.fail(R::KIND, err)),
        }

        self.finish(R::KIND)?;
        self.enter(R::KIND, Phase::Idle);
        Ok(ApplyResult::Removed)
    }

    fn repair_and_retry<R: Resource>(&mut self, kind: ReferenceKind, id: &str, original: Error) -> Result<()>
    where
        B: Backend<R> + References,
    {
        let repair_failed = |original: &Error, source: Error| Error::RepairFailed {
            original: original.to_string(),
            source: Box::new(source),
        };

        let referrers = match self.backend.used_by(kind, id) {
            Ok(referrers) => referrers,
            Err(err) => return Err(self.fail(R::KIND, repair_failed(&original, err))),
        };
        let live: Vec<Referrer> = referrers.into_iter().filter(Referrer::is_live).collect();
        if live.is_empty() {
            log::warn!("{} {id} is referenced but no live referrer was found", R::KIND);
            return Err(self.fail(R::KIND, original));
        }

        for referrer in &live {
            log::info!(
                "Detaching {kind} {id} from {} {} ({})",
                referrer.sub_type,
                referrer.name,
                referrer.id
            );
            match self.backend.strip_reference(referrer, kind, id) {
                Ok(true) => {}
                Ok(false) => {
                    let err = Error::Rejected {
                        operation: format!("update {} {}", referrer.sub_type, referrer.id),
                    };
                    return Err(self.fail(R::KIND, repair_failed(&original, err)));
                }
                Err(err) => return Err(self.fail(R::KIND, repair_failed(&original, err))),
            }
        }

        match <B as Backend<R>>::delete(self.backend, id) {
            Ok(true) => Ok(()),
            Ok(false) => {
                let err = Error::Rejected {
                    operation: format!("delete {} {id}", R::KIND),
                };
                Err(self.fail(R::KIND, err))
            }
            Err(err) => Err(self.fail(R::KIND, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DependencyBlocker;
    use crate::presence::Presence;
    use serde::Serialize;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    // ------------------------------------------------------------------------
    // A small resource: a named quota with an optional limit and profiles
    // ------------------------------------------------------------------------

    struct Quota;

    #[derive(Debug, Clone)]
    struct Desired {
        name: String,
        limit: Option<i64>,
        profiles: Vec<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Observed {
        id: String,
        name: String,
        limit: Option<i64>,
        profiles: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct CreateInput {
        name: String,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    struct UpdateInput {
        #[serde(skip_serializing_if = "Presence::is_absent")]
        name: Presence<String>,
        #[serde(skip_serializing_if = "Presence::is_absent")]
        limit: Presence<i64>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        remove_profiles: Vec<String>,
    }

    impl Mutation for UpdateInput {
        fn is_empty(&self) -> bool {
            self.name.is_absent() && self.limit.is_absent() && self.remove_profiles.is_empty()
        }
    }

    impl Resource for Quota {
        type Desired = Desired;
        type Observed = Observed;
        type Remote = Observed;
        type CreateInput = CreateInput;
        type UpdateInput = UpdateInput;

        const KIND: &'static str = "quota";
        const REFERENCE: Option<ReferenceKind> = Some(ReferenceKind::Practice);

        fn create_input(desired: &Desired) -> Result<CreateInput> {
            Ok(CreateInput {
                name: desired.name.clone(),
            })
        }

        fn update_input(observed: &Observed, desired: &Desired) -> Result<UpdateInput> {
            Ok(UpdateInput {
                name: Presence::of_change(Some(&observed.name), Some(&desired.name)),
                limit: Presence::of_change(observed.limit.as_ref(), desired.limit.as_ref()),
                remove_profiles: observed
                    .profiles
                    .iter()
                    .filter(|p| !desired.profiles.contains(p))
                    .cloned()
                    .collect(),
            })
        }

        fn render(remote: Observed) -> Result<Observed> {
            Ok(remote)
        }

        fn remote_id(remote: &Observed) -> &str {
            &remote.id
        }

        fn observed_id(observed: &Observed) -> &str {
            &observed.id
        }

        fn relax(input: &mut UpdateInput, blocker: &DependencyBlocker) -> bool {
            let before = input.remove_profiles.len();
            if let DependencyBlocker::Profile(id) = blocker {
                input.remove_profiles.retain(|p| p != id);
            }
            input.remove_profiles.len() < before
        }
    }

    /// Same shape, but deletes are never repaired.
    struct Standalone;

    impl Resource for Standalone {
        type Desired = Desired;
        type Observed = Observed;
        type Remote = Observed;
        type CreateInput = CreateInput;
        type UpdateInput = UpdateInput;

        const KIND: &'static str = "standalone";

        fn create_input(desired: &Desired) -> Result<CreateInput> {
            Quota::create_input(desired)
        }

        fn update_input(observed: &Observed, desired: &Desired) -> Result<UpdateInput> {
            Quota::update_input(observed, desired)
        }

        fn render(remote: Observed) -> Result<Observed> {
            Ok(remote)
        }

        fn remote_id(remote: &Observed) -> &str {
            &remote.id
        }

        fn observed_id(observed: &Observed) -> &str {
            &observed.id
        }
    }

    // ------------------------------------------------------------------------
    // Scripted backend
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct MockBackend {
        stored: RefCell<Option<Observed>>,
        create_error: RefCell<Option<Error>>,
        updates: RefCell<VecDeque<Result<bool>>>,
        deletes: RefCell<VecDeque<Result<bool>>>,
        referrers: RefCell<Vec<Referrer>>,
        sent_updates: RefCell<Vec<serde_json::Value>>,
        stripped: RefCell<Vec<String>>,
        delete_calls: Cell<usize>,
        publishes: Cell<usize>,
        discards: Cell<usize>,
    }

    impl MockBackend {
        fn with_stored(observed: Observed) -> Self {
            let backend = Self::default();
            *backend.stored.borrow_mut() = Some(observed);
            backend
        }
    }

    impl Transaction for MockBackend {
        fn publish(&self) -> Result<bool> {
            self.publishes.set(self.publishes.get() + 1);
            Ok(true)
        }

        fn discard(&self) -> Result<bool> {
            self.discards.set(self.discards.get() + 1);
            Ok(true)
        }
    }

    impl<R> Backend<R> for MockBackend
    where
        R: Resource<CreateInput = CreateInput, UpdateInput = UpdateInput, Remote = Observed>,
    {
        fn create(&self, input: &CreateInput) -> Result<Observed> {
            if let Some(err) = self.create_error.borrow_mut().take() {
                return Err(err);
            }
            let observed = Observed {
                id: "q-1".to_string(),
                name: input.name.clone(),
                limit: None,
                profiles: Vec::new(),
            };
            *self.stored.borrow_mut() = Some(observed.clone());
            Ok(observed)
        }

        fn fetch(&self, id: &str) -> Result<Option<Observed>> {
            Ok(self.stored.borrow().clone().filter(|o| o.id == id))
        }

        fn update(&self, _id: &str, input: &UpdateInput) -> Result<bool> {
            self.sent_updates
                .borrow_mut()
                .push(serde_json::to_value(input).unwrap());
            self.updates.borrow_mut().pop_front().unwrap_or(Ok(true))
        }

        fn delete(&self, _id: &str) -> Result<bool> {
            self.delete_calls.set(self.delete_calls.get() + 1);
            self.deletes.borrow_mut().pop_front().unwrap_or(Ok(true))
        }
    }

    impl References for MockBackend {
        fn used_by(&self, _kind: ReferenceKind, _id: &str) -> Result<Vec<Referrer>> {
            Ok(self.referrers.borrow().clone())
        }

        fn strip_reference(&self, referrer: &Referrer, _kind: ReferenceKind, _id: &str) -> Result<bool> {
            self.stripped.borrow_mut().push(referrer.id.clone());
            Ok(true)
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Phase>);

    impl PhaseObserver for Recorder {
        fn on_phase(&mut self, _kind: &str, phase: Phase) {
            self.0.push(phase);
        }
    }

    fn observed() -> Observed {
        Observed {
            id: "q-1".to_string(),
            name: "api".to_string(),
            limit: Some(100),
            profiles: vec!["p-1".to_string(), "p-2".to_string()],
        }
    }

    fn desired_from(observed: &Observed) -> Desired {
        Desired {
            name: observed.name.clone(),
            limit: observed.limit,
            profiles: observed.profiles.clone(),
        }
    }

    fn referenced() -> Error {
        Error::from_backend_message("Practice can't be deleted since it is pointed from other objects")
    }

    fn asset_referrer(id: &str, status: &str) -> Referrer {
        Referrer {
            id: id.to_string(),
            name: "shop".to_string(),
            object_type: "Asset".to_string(),
            sub_type: "WebApplication".to_string(),
            status: status.to_string(),
            practices: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Create / read
    // ------------------------------------------------------------------------

    #[test]
    fn test_create_publishes_and_rereads() {
        let backend = MockBackend::default();
        let mut reconciler = Reconciler::new(&backend).with_observer(Recorder::default());
        let desired = Desired {
            name: "api".to_string(),
            limit: None,
            profiles: Vec::new(),
        };

        let reconciled = reconciler.create::<Quota>(&desired).unwrap();

        assert_eq!(reconciled.result, ApplyResult::Created);
        assert_eq!(reconciled.observed.id, "q-1");
        assert_eq!(backend.publishes.get(), 1);
        assert_eq!(backend.discards.get(), 0);
        assert_eq!(
            reconciler.observer().0,
            vec![Phase::Building, Phase::Mutating, Phase::Committed, Phase::Idle]
        );
    }

    #[test]
    fn test_create_failure_discards() {
        let backend = MockBackend::default();
        *backend.create_error.borrow_mut() = Some(Error::from_backend_message("name taken"));
        let mut reconciler = Reconciler::new(&backend).with_observer(Recorder::default());

        let err = reconciler.create::<Quota>(&desired_from(&observed())).unwrap_err();

        assert!(err.to_string().contains("name taken"));
        assert_eq!(backend.discards.get(), 1);
        assert_eq!(backend.publishes.get(), 0);
        assert_eq!(
            reconciler.observer().0,
            vec![Phase::Building, Phase::Mutating, Phase::RolledBack, Phase::Idle]
        );
    }

    #[test]
    fn test_read_missing_is_none() {
        let backend = MockBackend::default();
        let mut reconciler = Reconciler::new(&backend);
        assert!(reconciler.read::<Quota>("q-404").unwrap().is_none());
    }

    // ------------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------------

    #[test]
    fn test_update_without_changes_sends_nothing() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        let mut reconciler = Reconciler::new(&backend);

        let reconciled = reconciler.update::<Quota>(&current, &desired_from(&current)).unwrap();

        assert_eq!(reconciled.result, ApplyResult::NoChange);
        assert_eq!(reconciled.observed, current);
        assert!(backend.sent_updates.borrow().is_empty());
        assert_eq!(backend.publishes.get(), 0);
    }

    #[test]
    fn test_update_name_only_leaves_limit_untouched() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        let mut reconciler = Reconciler::new(&backend);
        let mut desired = desired_from(&current);
        desired.name = "api-v2".to_string();

        let reconciled = reconciler.update::<Quota>(&current, &desired).unwrap();

        assert_eq!(reconciled.result, ApplyResult::Modified);
        assert_eq!(
            backend.sent_updates.borrow()[0],
            serde_json::json!({"name": "api-v2"})
        );
        assert_eq!(reconciled.observed.limit, Some(100));
        assert_eq!(backend.publishes.get(), 1);
    }

    #[test]
    fn test_update_retries_without_blocking_profile() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        backend.updates.borrow_mut().push_back(Err(Error::Dependency {
            message: "profile in use".to_string(),
            blocker: DependencyBlocker::Profile("p-2".to_string()),
        }));
        let mut reconciler = Reconciler::new(&backend);
        let mut desired = desired_from(&current);
        desired.profiles.clear();

        reconciler.update::<Quota>(&current, &desired).unwrap();

        let sent = backend.sent_updates.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["remove_profiles"], serde_json::json!(["p-1", "p-2"]));
        assert_eq!(sent[1]["remove_profiles"], serde_json::json!(["p-1"]));
        assert_eq!(backend.discards.get(), 0);
    }

    #[test]
    fn test_update_blocked_on_only_removal_is_not_modified() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        backend.updates.borrow_mut().push_back(Err(Error::Dependency {
            message: "profile in use".to_string(),
            blocker: DependencyBlocker::Profile("p-2".to_string()),
        }));
        let mut reconciler = Reconciler::new(&backend);
        let mut desired = desired_from(&current);
        desired.profiles.retain(|p| p == "p-1");

        let err = reconciler.update::<Quota>(&current, &desired).unwrap_err();

        assert!(matches!(
            err,
            Error::Dependency {
                blocker: DependencyBlocker::Profile(ref id),
                ..
            } if id == "p-2"
        ));
        assert_eq!(backend.sent_updates.borrow().len(), 1);
        assert_eq!(backend.publishes.get(), 0);
        assert_eq!(backend.discards.get(), 1);
    }

    #[test]
    fn test_update_dependency_without_progress_fails() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        backend.updates.borrow_mut().push_back(Err(Error::Dependency {
            message: "behavior in use".to_string(),
            blocker: DependencyBlocker::Behavior("b-9".to_string()),
        }));
        let mut reconciler = Reconciler::new(&backend);
        let mut desired = desired_from(&current);
        desired.profiles.clear();

        let err = reconciler.update::<Quota>(&current, &desired).unwrap_err();

        assert!(matches!(err, Error::Dependency { .. }));
        assert_eq!(backend.sent_updates.borrow().len(), 1);
        assert_eq!(backend.discards.get(), 1);
    }

    #[test]
    fn test_update_rejected_discards() {
        let current = observed();
        let backend = MockBackend::with_stored(current.clone());
        backend.updates.borrow_mut().push_back(Ok(false));
        let mut reconciler = Reconciler::new(&backend);
        let mut desired = desired_from(&current);
        desired.limit = Some(0);

        let err = reconciler.update::<Quota>(&current, &desired).unwrap_err();

        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(backend.sent_updates.borrow()[0], serde_json::json!({"limit": 0}));
        assert_eq!(backend.discards.get(), 1);
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    #[test]
    fn test_delete_repairs_references_once() {
        let backend = MockBackend::default();
        backend.deletes.borrow_mut().push_back(Err(referenced()));
        backend.referrers.borrow_mut().extend([
            asset_referrer("asset-1", "Active"),
            asset_referrer("asset-old", "Deleted"),
        ]);
        let mut reconciler = Reconciler::new(&backend).with_observer(Recorder::default());

        let result = reconciler.delete::<Quota>("q-1").unwrap();

        assert_eq!(result, ApplyResult::Removed);
        assert_eq!(*backend.stripped.borrow(), vec!["asset-1".to_string()]);
        assert_eq!(backend.delete_calls.get(), 2);
        assert_eq!(backend.publishes.get(), 1);
        assert_eq!(backend.discards.get(), 0);
        assert_eq!(
            reconciler.observer().0,
            vec![Phase::Mutating, Phase::Committed, Phase::Idle]
        );
    }

    #[test]
    fn test_delete_gives_up_after_one_retry() {
        let backend = MockBackend::default();
        backend.deletes.borrow_mut().extend([Err(referenced()), Err(referenced())]);
        backend.referrers.borrow_mut().push(asset_referrer("asset-1", "Active"));
        let mut reconciler = Reconciler::new(&backend);

        let err = reconciler.delete::<Quota>("q-1").unwrap_err();

        assert!(err.is_referenced());
        assert_eq!(backend.stripped.borrow().len(), 1);
        assert_eq!(backend.delete_calls.get(), 2);
        assert_eq!(backend.discards.get(), 1);
        assert_eq!(backend.publishes.get(), 0);
    }

    #[test]
    fn test_delete_without_live_referrers_surfaces_original() {
        let backend = MockBackend::default();
        backend.deletes.borrow_mut().push_back(Err(referenced()));
        backend.referrers.borrow_mut().push(asset_referrer("wrapper", "Deleted"));
        let mut reconciler = Reconciler::new(&backend);

        let err = reconciler.delete::<Quota>("q-1").unwrap_err();

        assert!(err.is_referenced());
        assert!(backend.stripped.borrow().is_empty());
        assert_eq!(backend.delete_calls.get(), 1);
        assert_eq!(backend.discards.get(), 1);
    }

    #[test]
    fn test_delete_unreferenceable_kind_is_not_repaired() {
        let backend = MockBackend::default();
        backend.deletes.borrow_mut().push_back(Err(referenced()));
        backend.referrers.borrow_mut().push(asset_referrer("asset-1", "Active"));
        let mut reconciler = Reconciler::new(&backend);

        let err = reconciler.delete::<Standalone>("q-1").unwrap_err();

        assert!(err.is_referenced());
        assert!(backend.stripped.borrow().is_empty());
        assert_eq!(backend.delete_calls.get(), 1);
        assert_eq!(backend.discards.get(), 1);
    }
}
