//! Locates bindings across an injector tree, decides their owner and
//! produces instances under the owner's scope policy

use crate::{
    binding::{Binding, Recipe, Strategy},
    error::Error,
    injector::{Injector, InjectorId},
    instance::Instance,
    key::Key,
    scope::{ScopePolicy, ScopeTag},
};
use std::{cell::RefCell, collections::HashSet, sync::Arc};

thread_local! {
    /// Constructions in progress on the current thread, outermost first
    static CHAIN: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

struct Frame {
    injector: InjectorId,
    key: Key,
}

/// Marks a construction in progress; leaves the chain when dropped
struct ChainGuard;

impl ChainGuard {
    fn enter(owner: &Injector, key: &Key) -> Result<Self, Error> {
        let max_depth = owner.config().max_depth();
        CHAIN.with_borrow_mut(|chain| {
            let start = chain
                .iter()
                .position(|f| f.injector == owner.id() && f.key == *key);
            if let Some(start) = start {
                let mut cycle = chain[start..]
                    .iter()
                    .map(|f| f.key.clone())
                    .collect::<Vec<_>>();
                cycle.push(key.clone());
                return Err(Error::CircularDependency(cycle));
            }
            if chain.len() >= max_depth {
                return Err(Error::DepthExceeded(max_depth));
            }
            chain.push(Frame { injector: owner.id(), key: key.clone() });
            Ok(ChainGuard)
        })
    }
}

impl Drop for ChainGuard {
    #[inline]
    fn drop(&mut self) {
        CHAIN.with_borrow_mut(|chain| chain.pop());
    }
}

/// Resolves `key` on behalf of `requester`
pub(crate) fn resolve(requester: &Injector, key: &Key) -> Result<Instance, Error> {
    let (binding, owner) = locate(requester, key)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "resolving {key} from injector {} owned by injector {}",
        requester.id(),
        owner.id()
    );

    produce(&binding, &owner)
}

/// Finds the binding for `key` visible from `requester` and the injector owning it
fn locate(requester: &Injector, key: &Key) -> Result<(Arc<Binding>, Injector), Error> {
    let explicit = requester
        .chain()
        .find_map(|i| i.store().lookup_local(key).map(|b| (i, b.clone())));
    if let Some((declaring, binding)) = explicit {
        let owner = match binding.recipe() {
            Some(recipe) if binding.is_promotable() => promoted_owner(declaring, recipe),
            _ => declaring.clone(),
        };
        return Ok((binding, owner));
    }

    let synthesized = requester
        .chain()
        .find_map(|i| i.synthesized(key).map(|b| (i, b)));
    if let Some((owner, binding)) = synthesized {
        return Ok((binding, owner.clone()));
    }

    synthesize(requester, key)
}

/// The owner of an explicit binding equivalent to a synthesized one,
/// computed once per declaring injector
fn promoted_owner(declaring: &Injector, recipe: &Recipe) -> Injector {
    let key = recipe.key();
    let levels = declaring.promoted(key).unwrap_or_else(|| {
        let levels = promotion_target(declaring, recipe).unwrap_or(0);
        declaring.remember_promotion(key.clone(), levels);

        #[cfg(feature = "tracing")]
        if levels > 0 {
            tracing::debug!(
                "binding for {key} declared in injector {} is owned {levels} level(s) up",
                declaring.id()
            );
        }

        levels
    });
    declaring
        .ancestor(levels)
        .unwrap_or(declaring)
        .clone()
}

/// Synthesizes a binding from the constructible shape of `key`, if the tree knows it
fn synthesize(requester: &Injector, key: &Key) -> Result<(Arc<Binding>, Injector), Error> {
    let recipe = if requester.config().jit() {
        requester.catalog().get(key).map(|r| r.value().clone())
    } else {
        None
    };

    let Some(recipe) = recipe else {
        return if descendant_owns(requester, key) {
            Err(Error::NotVisible(key.clone()))
        } else {
            Err(Error::UnresolvableKey(key.clone()))
        };
    };

    if descendant_declares(requester, key) {
        return Err(Error::NotVisible(key.clone()));
    }

    match promotion_target(requester, &recipe) {
        Some(levels) => {
            let owner = requester
                .ancestor(levels)
                .unwrap_or(requester);
            let binding = owner.synthesize(recipe);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "synthesized binding for {key} requested by injector {} and owned by injector {}",
                requester.id(),
                owner.id()
            );

            Ok((binding, owner.clone()))
        },
        // Not memoized, the missing dependency surfaces as its own error
        None => Ok((Arc::new(Binding::synthesized(recipe)), requester.clone())),
    }
}

/// How many levels above `start` a binding built from `recipe` is owned.
///
/// Unscoped recipes stay where they are requested. Shareable ones go to
/// the injector closest to the root that can build them on its own.
fn promotion_target(start: &Injector, recipe: &Recipe) -> Option<usize> {
    if !recipe.scope().is_shareable() {
        return eligible(start, recipe).then_some(0);
    }
    start
        .chain()
        .enumerate()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find(|(_, candidate)| eligible(candidate, recipe))
        .map(|(levels, _)| levels)
}

fn eligible(candidate: &Injector, recipe: &Recipe) -> bool {
    let mut visiting = HashSet::from([recipe.key().clone()]);
    !candidate.store().contains(recipe.key())
        && constructible_from(candidate, recipe, &mut visiting)
}

fn constructible_from(candidate: &Injector, recipe: &Recipe, visiting: &mut HashSet<Key>) -> bool {
    scope_bound(candidate, recipe.scope())
        && recipe
            .dependencies()
            .iter()
            .all(|dep| satisfiable(candidate, dep, visiting))
}

/// Whether resolving `key` from `candidate` would find something to build
fn satisfiable(candidate: &Injector, key: &Key, visiting: &mut HashSet<Key>) -> bool {
    if candidate
        .chain()
        .any(|i| i.store().contains(key) || i.owns_synthesized(key)) {
        return true;
    }
    if !candidate.config().jit() || descendant_declares(candidate, key) {
        return false;
    }
    let Some(recipe) = candidate.catalog().get(key).map(|r| r.value().clone()) else {
        return false;
    };
    // A key already being checked is assumed to be satisfiable
    if !visiting.insert(key.clone()) {
        return true;
    }
    constructible_from(candidate, &recipe, visiting)
}

#[inline]
fn scope_bound(candidate: &Injector, scope: &ScopeTag) -> bool {
    scope
        .custom_name()
        .is_none_or(|name| candidate.scope_policy(name).is_some())
}

/// Whether a live descendant of `injector` explicitly binds `key`
fn descendant_declares(injector: &Injector, key: &Key) -> bool {
    injector
        .children()
        .iter()
        .any(|child| child.store().contains(key) || descendant_declares(child, key))
}

/// Whether a live descendant of `injector` owns any binding for `key`
fn descendant_owns(injector: &Injector, key: &Key) -> bool {
    injector
        .children()
        .iter()
        .any(|child| child.store().contains(key)
            || child.owns_synthesized(key)
            || descendant_owns(child, key))
}

/// Produces an instance of `binding` in `owner` honoring the binding scope
fn produce(binding: &Binding, owner: &Injector) -> Result<Instance, Error> {
    if let Strategy::Instance(instance) = binding.strategy() {
        return Ok(instance.clone());
    }

    let key = binding.key();
    let _guard = ChainGuard::enter(owner, key).inspect_err(|_err| {
        #[cfg(feature = "tracing")]
        tracing::warn!("failed to construct {key} in injector {}: {_err}", owner.id());
    })?;

    let producer = || construct(binding, owner);
    match binding.scope() {
        ScopeTag::Unscoped => producer(),
        ScopeTag::Singleton => owner.singletons().get(key, &producer),
        ScopeTag::Custom(name) => owner
            .scope_policy(name)
            .ok_or_else(|| Error::UnboundScope { key: key.clone(), scope: name.clone() })?
            .get(key, &producer),
    }
}

fn construct(binding: &Binding, owner: &Injector) -> Result<Instance, Error> {
    match binding.strategy() {
        Strategy::Instance(instance) => Ok(instance.clone()),
        Strategy::Provider { factory, .. } => factory(owner),
        Strategy::Implementation(link) => owner
            .resolve(link.target())
            .and_then(|instance| link.cast(instance)),
        Strategy::JustInTime(recipe) => recipe.construct(owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inject::Inject, scope::ScopeCache};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Clock;

    impl Inject for Clock {
        type Deps = ();

        fn scope() -> ScopeTag {
            ScopeTag::Singleton
        }

        fn inject(_: ()) -> Result<Self, Error> {
            Ok(Clock)
        }
    }

    #[derive(Debug)]
    struct Session {
        _clock: Arc<Clock>,
        _user: Arc<String>,
    }

    impl Inject for Session {
        type Deps = (Arc<Clock>, Arc<String>);

        fn scope() -> ScopeTag {
            ScopeTag::Singleton
        }

        fn inject((clock, user): Self::Deps) -> Result<Self, Error> {
            Ok(Session { _clock: clock, _user: user })
        }
    }

    #[derive(Debug)]
    struct Ping;
    #[derive(Debug)]
    struct Pong;

    impl Inject for Ping {
        type Deps = Arc<Pong>;

        fn inject(_: Arc<Pong>) -> Result<Self, Error> {
            Ok(Ping)
        }
    }

    impl Inject for Pong {
        type Deps = Arc<Ping>;

        fn inject(_: Arc<Ping>) -> Result<Self, Error> {
            Ok(Pong)
        }
    }

    #[test]
    fn it_promotes_dependency_free_singletons_to_root() {
        let root = Injector::builder().build().unwrap();
        let child = root.child_builder().build().unwrap();

        child.instance::<Clock>().unwrap();

        assert!(root.owns_synthesized(&Key::of::<Clock>()));
        assert!(!child.owns_synthesized(&Key::of::<Clock>()));
    }

    #[test]
    fn it_keeps_partially_satisfiable_singletons_at_requester() {
        let root = Injector::builder().build().unwrap();
        let mut builder = root.child_builder();
        builder.constructible::<Clock>();
        builder.bind::<String>().to_instance(String::from("alice"));
        let child = builder.build().unwrap();

        child.instance::<Session>().unwrap();

        assert!(child.owns_synthesized(&Key::of::<Session>()));
        assert!(root.owns_synthesized(&Key::of::<Clock>()));
    }

    #[test]
    fn it_memoizes_explicit_promotion() {
        let root = Injector::builder().build().unwrap();
        let mut builder = root.child_builder();
        builder.bind::<Clock>().to_self();
        let child = builder.build().unwrap();

        let a = child.get::<Clock>().unwrap();
        let b = child.get::<Clock>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(child.promoted(&Key::of::<Clock>()), Some(1));
        assert!(root.singletons().contains(&Key::of::<Clock>()));
        assert!(!root.owns_synthesized(&Key::of::<Clock>()));
    }

    #[test]
    fn it_does_not_memoize_unsatisfiable_synthesis() {
        let mut builder = Injector::builder();
        builder.constructible::<Clock>();
        let root = builder.build().unwrap();

        let err = root.instance::<Session>().unwrap_err();

        assert!(matches!(err, Error::UnresolvableKey(key) if key == Key::of::<String>()));
        assert!(!root.owns_synthesized(&Key::of::<Session>()));
    }

    #[test]
    fn it_detects_cycles_with_path() {
        let mut builder = Injector::builder();
        builder.constructible::<Ping>();
        builder.constructible::<Pong>();
        let injector = builder.build().unwrap();

        let err = injector.get::<Ping>().unwrap_err();

        match err {
            Error::CircularDependency(path) => assert_eq!(path, vec![
                Key::of::<Ping>(),
                Key::of::<Pong>(),
                Key::of::<Ping>(),
            ]),
            _ => panic!("Expected CircularDependency error"),
        }
        CHAIN.with_borrow(|chain| assert!(chain.is_empty()));
    }

    #[test]
    fn it_limits_construction_depth() {
        let mut builder = Injector::builder()
            .with_config(crate::InjectorConfig::new().with_max_depth(1));
        builder.bind::<u8>().to_provider(|| 1_u8);
        builder.bind::<u16>().to_provider(|x: Arc<u8>| Ok(*x as u16));
        let injector = builder.build().unwrap();

        assert!(injector.get::<u8>().is_ok());
        assert!(matches!(injector.get::<u16>(), Err(Error::DepthExceeded(1))));
    }

    #[test]
    fn it_retries_after_failed_singleton() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut builder = Injector::builder();
        builder.bind::<u32>()
            .to_provider(|_: Injector| {
                match CALLS.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::other("not ready")),
                    n => Ok(n as u32),
                }
            })
            .in_singleton();
        let injector = builder.build().unwrap();

        assert!(injector.get::<u32>().is_err());
        assert_eq!(*injector.get::<u32>().unwrap(), 1);
        assert_eq!(*injector.get::<u32>().unwrap(), 1);
    }

    #[test]
    fn it_serves_custom_scope_from_owner_chain() {
        let mut builder = Injector::builder();
        builder.bind_scope("request", ScopeCache::new());
        builder.bind::<String>()
            .to_provider(|| String::from("scoped"))
            .in_scope(ScopeTag::custom("request"));
        let root = builder.build().unwrap();
        let child = root.child_builder().build().unwrap();

        let a = child.get::<String>().unwrap();
        let b = root.get::<String>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn it_reports_not_visible_for_descendant_bindings() {
        let root = Injector::builder().build().unwrap();
        let mut builder = root.child_builder();
        builder.bind::<Clock>().to_self();
        let _child = builder.build().unwrap();

        assert!(matches!(root.get::<Clock>(), Err(Error::NotVisible(_))));
    }
}
