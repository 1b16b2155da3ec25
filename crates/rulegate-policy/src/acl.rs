//! Two-predicate access lists and a per-entity cache of them.
//!
//! An [`AccessList`] is the classic form of a rule chain: every entry pairs
//! a test on the acting user with a test on the requested operation, and
//! anything no entry decides is refused.

use rulegate_core::Decision;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::combine::{combine_rules, evaluate_traced};
use crate::predicate::Predicate;
use crate::rule::{allow_when, deny_when, Rule};

/// The context an access list evaluates: who is acting and what they ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest<U, O> {
    pub user: U,
    pub operation: O,
}

/// Ordered allow/deny entries over a user and an operation.
pub struct AccessList<U, O> {
    rules: Vec<Rule<AccessRequest<U, O>>>,
}

impl<U: 'static, O: 'static> AccessList<U, O> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Allow when both the user and the operation match.
    pub fn allow(&mut self, user: Predicate<U>, operation: Predicate<O>) -> &mut Self {
        self.rules
            .push(allow_when([on_user(user), on_operation(operation)]));
        self
    }

    /// Deny when both the user and the operation match.
    pub fn deny(&mut self, user: Predicate<U>, operation: Predicate<O>) -> &mut Self {
        self.rules
            .push(deny_when([on_user(user), on_operation(operation)]));
        self
    }

    /// Append every entry of `base`, evaluated as one nested entry.
    pub fn inherit(&mut self, base: &AccessList<U, O>) -> &mut Self {
        self.rules.push(base.rule());
        self
    }

    /// First matching entry wins; Undecided when nothing matches.
    pub fn evaluate(&self, user: U, operation: O) -> Decision {
        evaluate_traced(&self.rules, &AccessRequest { user, operation }).decision
    }

    /// True only when an entry explicitly allows. An empty list refuses
    /// everything.
    pub fn check(&self, user: U, operation: O) -> bool {
        self.evaluate(user, operation).is_allowed()
    }

    /// The entries as one composite rule.
    pub fn rule(&self) -> Rule<AccessRequest<U, O>> {
        combine_rules(self.rules.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<U: 'static, O: 'static> Default for AccessList<U, O> {
    fn default() -> Self {
        Self::new()
    }
}

fn on_user<U: 'static, O: 'static>(inner: Predicate<U>) -> Predicate<AccessRequest<U, O>> {
    let name = format!("user:{}", inner.name());
    Predicate::new(name, move |req: &AccessRequest<U, O>| inner.test(&req.user))
}

fn on_operation<U: 'static, O: 'static>(inner: Predicate<O>) -> Predicate<AccessRequest<U, O>> {
    let name = format!("operation:{}", inner.name());
    Predicate::new(name, move |req: &AccessRequest<U, O>| {
        inner.test(&req.operation)
    })
}

// ---------------------------------------------------------------------------
// AclCache: lazily built access lists per entity
// ---------------------------------------------------------------------------

/// A host object that knows how to fill its own access list.
pub trait AclEntity<U, O> {
    type Key: Eq + Hash + Clone;

    /// Identity under which the built list is cached.
    fn acl_key(&self) -> Self::Key;

    /// Add this entity's entries to a fresh list.
    fn populate(&self, acl: &mut AccessList<U, O>);
}

/// Caller-owned memo of access lists, keyed by entity identity.
///
/// Each key owns a `OnceLock` slot, so `populate` runs at most once per key
/// even when several threads ask at the same time. The map lock is only
/// held to find or insert a slot, never while a list is being built: a
/// `populate` may fetch other entities' lists from the same cache, and one
/// that panics leaves its slot empty without affecting any other key.
/// Fetching the entity's own list from inside its `populate` deadlocks.
pub struct AclCache<K, U, O> {
    slots: Mutex<HashMap<K, Slot<U, O>>>,
}

type Slot<U, O> = Arc<OnceLock<Arc<AccessList<U, O>>>>;

impl<K: Eq + Hash + Clone, U: 'static, O: 'static> AclCache<K, U, O> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    // The map is only touched by single insert/remove calls, so it is
    // consistent even if a holder panicked.
    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<U, O>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The entity's access list, building it on first access.
    pub fn get<E>(&self, entity: &E) -> Arc<AccessList<U, O>>
    where
        E: AclEntity<U, O, Key = K>,
    {
        let slot = Arc::clone(self.slots().entry(entity.acl_key()).or_default());
        let list = slot.get_or_init(|| {
            let mut list = AccessList::new();
            entity.populate(&mut list);
            tracing::debug!(entries = list.len(), "built access list");
            Arc::new(list)
        });
        Arc::clone(list)
    }

    /// Drop the cached list so the next [`AclCache::get`] rebuilds it.
    /// Returns whether a list was cached.
    pub fn reset<E>(&self, entity: &E) -> bool
    where
        E: AclEntity<U, O, Key = K>,
    {
        self.reset_key(&entity.acl_key())
    }

    pub fn reset_key(&self, key: &K) -> bool {
        self.slots()
            .remove(key)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Number of lists built and cached.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, U: 'static, O: 'static> Default for AclCache<K, U, O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::always;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type User = Option<&'static str>;
    type Op = Option<&'static str>;

    const ALICE: User = Some("alice");
    const BOB: User = Some("bob");
    const READ: Op = Some("read");
    const WRITE: Op = Some("write");

    fn is<T: PartialEq + std::fmt::Debug + Send + Sync + 'static>(expected: T) -> Predicate<T> {
        let name = format!("is({:?})", expected);
        Predicate::new(name, move |v: &T| *v == expected)
    }

    #[test]
    fn test_empty_list_denies_everything() {
        let acl: AccessList<User, Op> = AccessList::new();
        assert!(!acl.check(BOB, WRITE));
        assert!(!acl.check(BOB, READ));
        assert!(!acl.check(None, None));
        assert_eq!(acl.evaluate(BOB, READ), Decision::Undecided);
    }

    #[test]
    fn test_allow_all_list() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.allow(always(), always());
        assert!(acl.check(BOB, WRITE));
        assert!(acl.check(BOB, READ));
        assert!(acl.check(None, None));
    }

    #[test]
    fn test_user_predicate_only() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.allow(is(BOB), always());
        assert!(acl.check(BOB, WRITE));
        assert!(acl.check(BOB, None));
        assert!(!acl.check(ALICE, WRITE));
        assert!(!acl.check(ALICE, READ));
        assert!(!acl.check(None, None));
    }

    #[test]
    fn test_operation_predicate_only() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.allow(always(), is(READ));
        assert!(acl.check(BOB, READ));
        assert!(acl.check(None, READ));
        assert!(!acl.check(BOB, WRITE));
        assert!(!acl.check(None, None));
    }

    #[test]
    fn test_complex_allow_list() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.allow(is(ALICE), always()).allow(always(), is(READ));
        assert!(acl.check(ALICE, WRITE));
        assert!(acl.check(ALICE, READ));
        assert!(!acl.check(BOB, WRITE));
        assert!(acl.check(BOB, READ));
    }

    #[test]
    fn test_complex_mixed_list() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.allow(is(ALICE), always()) // alice can do everything
            .deny(is(None), always()) // guests cannot do anything
            .deny(always(), is(WRITE)) // nobody else can write
            .allow(always(), is(READ)); // everyone else can read

        assert!(acl.check(ALICE, WRITE));
        assert!(acl.check(ALICE, READ));
        assert!(!acl.check(BOB, WRITE));
        assert!(acl.check(BOB, READ));
        assert!(!acl.check(None, WRITE));
        assert!(!acl.check(None, READ));
        assert!(!acl.check(Some("mallory"), Some("delete")));
    }

    #[test]
    fn test_rule_exposes_composite() {
        let mut acl: AccessList<User, Op> = AccessList::new();
        acl.deny(is(None), always());
        let rule = acl.rule();
        assert_eq!(rule.label(), "[deny:user:is(None),operation:always]");
        let guest = AccessRequest {
            user: None,
            operation: READ,
        };
        assert_eq!(rule.evaluate(&guest), Decision::Deny);
    }

    struct Document {
        id: u32,
        owner: User,
        populated: Arc<AtomicUsize>,
    }

    impl AclEntity<User, Op> for Document {
        type Key = u32;

        fn acl_key(&self) -> u32 {
            self.id
        }

        fn populate(&self, acl: &mut AccessList<User, Op>) {
            self.populated.fetch_add(1, Ordering::SeqCst);
            acl.allow(is(self.owner), always());
            acl.allow(always(), is(READ));
        }
    }

    fn document(owner: User) -> Document {
        Document {
            id: 7,
            owner,
            populated: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn test_cache_builds_entity_list() {
        let cache: AclCache<u32, User, Op> = AclCache::new();
        let doc = document(ALICE);
        let acl = cache.get(&doc);
        assert!(acl.check(ALICE, WRITE));
        assert!(acl.check(ALICE, READ));
        assert!(!acl.check(BOB, WRITE));
        assert!(acl.check(BOB, READ));
        assert!(!acl.check(None, WRITE));
        assert!(acl.check(None, READ));
    }

    #[test]
    fn test_cache_memoizes_and_resets() {
        let cache: AclCache<u32, User, Op> = AclCache::new();
        let doc = document(ALICE);

        let first = cache.get(&doc);
        let second = cache.get(&doc);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(doc.populated.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.reset(&doc));
        assert!(cache.is_empty());
        assert!(!cache.reset(&doc));

        let third = cache.get(&doc);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(doc.populated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_concurrent_get_builds_once() {
        let cache: Arc<AclCache<u32, User, Op>> = Arc::new(AclCache::new());
        let doc = Arc::new(document(BOB));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let doc = Arc::clone(&doc);
                std::thread::spawn(move || cache.get(doc.as_ref()).check(BOB, WRITE))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(doc.populated.load(Ordering::SeqCst), 1);
    }

    struct Broken;

    impl AclEntity<User, Op> for Broken {
        type Key = u32;

        fn acl_key(&self) -> u32 {
            99
        }

        fn populate(&self, _acl: &mut AccessList<User, Op>) {
            panic!("entity store unavailable");
        }
    }

    #[test]
    fn test_cache_survives_panicking_populate() {
        let cache: AclCache<u32, User, Op> = AclCache::new();
        let doc = document(ALICE);
        let cached = cache.get(&doc);

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| cache.get(&Broken)));
        assert!(outcome.is_err());

        // Other entities are untouched and the failed one is not counted
        assert!(Arc::ptr_eq(&cached, &cache.get(&doc)));
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
        assert!(cache.reset(&doc));
        assert!(!cache.reset(&Broken));
        assert!(cache.is_empty());
    }

    struct Derived<'a> {
        base: &'a Document,
        cache: &'a AclCache<u32, User, Op>,
    }

    impl AclEntity<User, Op> for Derived<'_> {
        type Key = u32;

        fn acl_key(&self) -> u32 {
            self.base.id + 1
        }

        fn populate(&self, acl: &mut AccessList<User, Op>) {
            let base = self.cache.get(self.base);
            acl.deny(is(None), always())
                .inherit(&base)
                .allow(is(BOB), is(WRITE));
        }
    }

    #[test]
    fn test_cache_populate_may_read_other_entities() {
        let cache: AclCache<u32, User, Op> = AclCache::new();
        let base = document(ALICE);
        let derived = Derived {
            base: &base,
            cache: &cache,
        };

        let acl = cache.get(&derived);
        assert_eq!(acl.len(), 3);
        assert!(acl.check(ALICE, WRITE));
        assert!(acl.check(BOB, WRITE));
        assert!(!acl.check(None, READ));
        assert!(!acl.check(Some("carol"), WRITE));
        assert!(acl.check(Some("carol"), READ));

        assert_eq!(cache.len(), 2);
        assert_eq!(base.populated.load(Ordering::SeqCst), 1);
    }
}
