//! Registry mapping (target, capability) pairs to backends
//!
//! The table is an immutable `Arc` snapshot behind an `RwLock`. Writers build
//! a copy-on-write replacement under the write lock, so a reader holding a
//! snapshot never sees a half-applied attach or detach.

use std::any::Any;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use targetctl_core::prelude::*;
use targetctl_core::{Target, TargetId};

/// A named set of operations a target may support
///
/// Implemented by zero-sized marker types; `Backend` is usually a trait
/// object (e.g. `dyn ApplicationCommands`).
pub trait Capability: 'static {
    /// Registry key, e.g. `"application-commands"`
    const NAME: &'static str;

    type Backend: ?Sized + Send + Sync + 'static;
}

#[derive(Clone)]
struct Registration {
    target: Target,
    /// Always an `Arc<C::Backend>` for the capability it is filed under
    backend: Arc<dyn Any + Send + Sync>,
}

impl Registration {
    fn new<C: Capability>(target: Target, backend: Arc<C::Backend>) -> Self {
        Self {
            target,
            backend: Arc::new(backend),
        }
    }

    fn backend<C: Capability>(&self) -> Option<Arc<C::Backend>> {
        self.backend
            .as_ref()
            .downcast_ref::<Arc<C::Backend>>()
            .cloned()
    }
}

type TargetTable = BTreeMap<TargetId, Registration>;
type CapabilityTable = BTreeMap<&'static str, TargetTable>;

/// Thread-safe registry of capability backends per target
#[derive(Default)]
pub struct TargetRegistry {
    table: RwLock<Arc<CapabilityTable>>,
}

impl fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.snapshot();
        let mut map = f.debug_map();
        for (capability, targets) in table.iter() {
            map.entry(capability, &targets.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<CapabilityTable> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update<R>(&self, apply: impl FnOnce(&mut CapabilityTable) -> R) -> R {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        apply(Arc::make_mut(&mut table))
    }

    /// Register `backend` as the implementation of `C` on `target`
    ///
    /// Fails with [`Error::DuplicateRegistration`] if one already exists;
    /// use [`replace`](Self::replace) to swap backends deliberately.
    pub fn attach<C: Capability>(&self, target: Target, backend: Arc<C::Backend>) -> Result<()> {
        self.update(|table| {
            let targets = table.entry(C::NAME).or_default();
            if targets.contains_key(&target.id) {
                warn!("Rejected duplicate '{}' registration for {}", C::NAME, target.id);
                return Err(Error::duplicate_registration(target.id.as_str(), C::NAME));
            }
            info!("Attached '{}' to {}", C::NAME, target.display_string());
            targets.insert(target.id.clone(), Registration::new::<C>(target, backend));
            Ok(())
        })
    }

    /// Register `backend` for `C` on `target`, replacing any existing one
    ///
    /// Returns true if a previous registration was replaced.
    pub fn replace<C: Capability>(&self, target: Target, backend: Arc<C::Backend>) -> bool {
        self.update(|table| {
            let id = target.id.clone();
            let replaced = table
                .entry(C::NAME)
                .or_default()
                .insert(id.clone(), Registration::new::<C>(target, backend))
                .is_some();
            info!(
                "{} '{}' on {}",
                if replaced { "Replaced" } else { "Attached" },
                C::NAME,
                id
            );
            replaced
        })
    }

    /// Remove the `C` registration for `target`. No-op if absent.
    pub fn detach<C: Capability>(&self, target: &TargetId) -> bool {
        self.detach_named(target, C::NAME)
    }

    /// Remove a registration by capability name. No-op if absent.
    pub fn detach_named(&self, target: &TargetId, capability: &str) -> bool {
        self.update(|table| {
            let Some(targets) = table.get_mut(capability) else {
                return false;
            };
            let removed = targets.remove(target).is_some();
            if targets.is_empty() {
                table.remove(capability);
            }
            if removed {
                info!("Detached '{}' from {}", capability, target);
            }
            removed
        })
    }

    /// Remove every registration for `target`, returning how many were removed
    pub fn detach_target(&self, target: &TargetId) -> usize {
        self.update(|table| {
            let mut removed = 0;
            table.retain(|_, targets| {
                if targets.remove(target).is_some() {
                    removed += 1;
                }
                !targets.is_empty()
            });
            if removed > 0 {
                info!("Detached {} from {} capabilities", target, removed);
            }
            removed
        })
    }

    /// Look up the backend servicing `C` on `target`
    pub fn resolve<C: Capability>(&self, target: &TargetId) -> Result<Arc<C::Backend>> {
        let table = self.snapshot();
        table
            .get(C::NAME)
            .and_then(|targets| targets.get(target))
            .and_then(Registration::backend::<C>)
            .ok_or_else(|| {
                debug!("No '{}' backend registered for {}", C::NAME, target);
                Error::capability_not_supported(target.as_str(), C::NAME)
            })
    }

    pub fn supports(&self, target: &TargetId, capability: &str) -> bool {
        self.snapshot()
            .get(capability)
            .is_some_and(|targets| targets.contains_key(target))
    }

    /// Names of every capability registered for `target`, sorted
    pub fn capabilities_of(&self, target: &TargetId) -> Vec<&'static str> {
        self.snapshot()
            .iter()
            .filter(|(_, targets)| targets.contains_key(target))
            .map(|(capability, _)| *capability)
            .collect()
    }

    /// Targets registered for `capability`, as of this call
    ///
    /// Later attach/detach calls do not affect the returned snapshot.
    pub fn targets_supporting(&self, capability: &str) -> TargetSnapshot {
        TargetSnapshot {
            table: self.snapshot(),
            capability: capability.to_string(),
        }
    }

    /// Every attached target (with at least one capability), sorted by id
    pub fn targets(&self) -> Vec<Target> {
        let mut targets: BTreeMap<&TargetId, &Target> = BTreeMap::new();
        let table = self.snapshot();
        for registration in table.values().flat_map(|targets| targets.values()) {
            targets.insert(&registration.target.id, &registration.target);
        }
        targets.into_values().cloned().collect()
    }
}

/// Point-in-time view of the targets supporting one capability
///
/// Iteration is lazy and can be restarted any number of times; every pass
/// yields the same targets in id order.
#[derive(Clone)]
pub struct TargetSnapshot {
    table: Arc<CapabilityTable>,
    capability: String,
}

impl fmt::Debug for TargetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSnapshot")
            .field("capability", &self.capability)
            .field("targets", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

impl TargetSnapshot {
    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn iter(&self) -> TargetIter<'_> {
        TargetIter {
            inner: self
                .table
                .get(self.capability.as_str())
                .map(|targets| targets.values()),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &TargetId> + '_ {
        self.iter().map(|target| &target.id)
    }

    pub fn len(&self) -> usize {
        self.table
            .get(self.capability.as_str())
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> IntoIterator for &'a TargetSnapshot {
    type Item = &'a Target;
    type IntoIter = TargetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`TargetSnapshot`]
pub struct TargetIter<'a> {
    inner: Option<btree_map::Values<'a, TargetId, Registration>>,
}

impl<'a> Iterator for TargetIter<'a> {
    type Item = &'a Target;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .as_mut()
            .and_then(Iterator::next)
            .map(|registration| &registration.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use targetctl_core::TargetKind;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Named(&'static str);

    impl Greeter for Named {
        fn greet(&self) -> String {
            format!("hello from {}", self.0)
        }
    }

    struct Greeting;

    impl Capability for Greeting {
        const NAME: &'static str = "greeting";
        type Backend = dyn Greeter;
    }

    struct Farewell;

    impl Capability for Farewell {
        const NAME: &'static str = "farewell";
        type Backend = dyn Greeter;
    }

    fn sim(id: &str) -> Target {
        Target::new(id, format!("Simulator {id}"), TargetKind::Simulator)
    }

    fn greeter(name: &'static str) -> Arc<dyn Greeter> {
        Arc::new(Named(name))
    }

    #[test]
    fn test_attach_and_resolve() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();

        let backend = registry.resolve::<Greeting>(&"T1".into()).unwrap();
        assert_eq!(backend.greet(), "hello from a");
        assert!(registry.supports(&"T1".into(), "greeting"));
    }

    #[test]
    fn test_resolve_unknown_pair_fails() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();

        let Err(err) = registry.resolve::<Farewell>(&"T1".into()) else {
            panic!("Farewell should not resolve on T1");
        };
        assert!(matches!(err, Error::CapabilityNotSupported { .. }));

        let Err(err) = registry.resolve::<Greeting>(&"T2".into()) else {
            panic!("Greeting should not resolve on T2");
        };
        match err {
            Error::CapabilityNotSupported { target, capability } => {
                assert_eq!(target, "T2");
                assert_eq!(capability, "greeting");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_attach_rejected() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();

        let err = registry
            .attach::<Greeting>(sim("T1"), greeter("b"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRegistration { .. }));

        // Original backend untouched
        let backend = registry.resolve::<Greeting>(&"T1".into()).unwrap();
        assert_eq!(backend.greet(), "hello from a");
    }

    #[test]
    fn test_replace_swaps_backend() {
        let registry = TargetRegistry::new();
        assert!(!registry.replace::<Greeting>(sim("T1"), greeter("a")));
        assert!(registry.replace::<Greeting>(sim("T1"), greeter("b")));

        let backend = registry.resolve::<Greeting>(&"T1".into()).unwrap();
        assert_eq!(backend.greet(), "hello from b");
    }

    #[test]
    fn test_different_backend_per_capability() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("hi")).unwrap();
        registry.attach::<Farewell>(sim("T1"), greeter("bye")).unwrap();

        assert_eq!(
            registry.resolve::<Greeting>(&"T1".into()).unwrap().greet(),
            "hello from hi"
        );
        assert_eq!(
            registry.resolve::<Farewell>(&"T1".into()).unwrap().greet(),
            "hello from bye"
        );
        assert_eq!(
            registry.capabilities_of(&"T1".into()),
            vec!["farewell", "greeting"]
        );
    }

    #[test]
    fn test_detach_is_noop_when_absent() {
        let registry = TargetRegistry::new();
        assert!(!registry.detach::<Greeting>(&"T1".into()));

        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();
        assert!(registry.detach::<Greeting>(&"T1".into()));
        assert!(!registry.detach::<Greeting>(&"T1".into()));
        assert!(registry.resolve::<Greeting>(&"T1".into()).is_err());
    }

    #[test]
    fn test_detach_target_removes_all_capabilities() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();
        registry.attach::<Farewell>(sim("T1"), greeter("b")).unwrap();
        registry.attach::<Greeting>(sim("T2"), greeter("c")).unwrap();

        assert_eq!(registry.detach_target(&"T1".into()), 2);
        assert!(registry.capabilities_of(&"T1".into()).is_empty());
        assert_eq!(
            registry.targets().into_iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![TargetId::from("T2")]
        );
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_changes() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("T1"), greeter("a")).unwrap();
        registry.attach::<Greeting>(sim("T2"), greeter("b")).unwrap();

        let snapshot = registry.targets_supporting("greeting");
        registry.detach::<Greeting>(&"T1".into());
        registry.attach::<Greeting>(sim("T3"), greeter("c")).unwrap();

        let ids: Vec<_> = snapshot.ids().map(TargetId::as_str).collect();
        assert_eq!(ids, vec!["T1", "T2"]);
        assert_eq!(snapshot.len(), 2);

        let fresh: Vec<_> = registry
            .targets_supporting("greeting")
            .ids()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(fresh, vec!["T2", "T3"]);
    }

    #[test]
    fn test_snapshot_iteration_is_restartable() {
        let registry = TargetRegistry::new();
        registry.attach::<Greeting>(sim("B"), greeter("b")).unwrap();
        registry.attach::<Greeting>(sim("A"), greeter("a")).unwrap();

        let snapshot = registry.targets_supporting("greeting");
        let first: Vec<_> = snapshot.iter().map(|t| t.id.clone()).collect();
        let second: Vec<_> = (&snapshot).into_iter().map(|t| t.id.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![TargetId::from("A"), TargetId::from("B")]);
    }

    #[test]
    fn test_snapshot_for_unknown_capability_is_empty() {
        let registry = TargetRegistry::new();
        let snapshot = registry.targets_supporting("nothing");
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.iter().count(), 0);
        assert_eq!(snapshot.capability(), "nothing");
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let registry = Arc::new(TargetRegistry::new());

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for round in 0..50 {
                    let id = format!("T{round:02}");
                    registry.attach::<Greeting>(sim(&id), greeter("w")).unwrap();
                    registry.attach::<Farewell>(sim(&id), greeter("w")).unwrap();
                    if round % 3 == 0 {
                        registry.detach_target(&TargetId::from(id.as_str()));
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = registry.targets_supporting("greeting");
                        let first: Vec<_> = snapshot.ids().cloned().collect();
                        let second: Vec<_> = snapshot.ids().cloned().collect();
                        assert_eq!(first, second);
                        assert_eq!(first.len(), snapshot.len());
                        assert!(first.windows(2).all(|pair| pair[0] < pair[1]));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        // Rounds divisible by 3 were fully detached
        assert_eq!(registry.targets_supporting("greeting").len(), 33);
        assert_eq!(registry.targets_supporting("farewell").len(), 33);
    }
}
