//! Injector hierarchy and the public resolution API

use crate::{
    binding::{Binding, BindingStore, Catalog, Recipe},
    error::Error,
    inject::{Inject, Provider},
    instance::Instance,
    key::Key,
    resolver,
    scope::{ScopeCache, ScopePolicy},
};
use dashmap::DashMap;
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    iter::successors,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

pub use self::{
    builder::{
        BindingBuilder,
        BindingDeclaration,
        Declaration,
        InjectorBuilder,
        Module,
        ScopedBindingBuilder,
        build_injector,
    },
    config::{InjectorConfig, Stage},
    factory::GenericFactory,
    from_injector::FromInjector,
};

pub mod builder;
pub mod config;
pub mod factory;
pub mod from_injector;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an injector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InjectorId(u64);

impl InjectorId {
    #[inline]
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for InjectorId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type ScopeMap = HashMap<
    Cow<'static, str>,
    Arc<dyn ScopePolicy>
>;

pub(crate) struct InjectorInner {
    id: InjectorId,
    parent: Option<Injector>,
    store: BindingStore,
    scopes: ScopeMap,
    singletons: ScopeCache,
    /// Synthesized bindings owned by this injector
    synthesized: DashMap<Key, Arc<Binding>>,
    /// Levels above this injector that own a promoted declaration
    promoted: DashMap<Key, usize>,
    children: Mutex<Vec<Weak<InjectorInner>>>,
    catalog: Arc<Catalog>,
    config: InjectorConfig,
}

/// A node in a tree of injectors.
///
/// Owns a sealed set of explicit bindings, the registered scope policies of
/// its level and the instance caches for everything it owns. Cloning is
/// cheap and yields a handle to the same node.
///
/// A child keeps its parent alive; a parent only observes its children.
///
/// # Example
/// ```
/// use grove::{Injector, ScopeTag};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Config;
///
/// struct Handler {
///     config: Arc<Config>,
/// }
///
/// let mut root = Injector::builder();
/// root.bind::<Config>()
///     .to_provider(Config::default)
///     .in_scope(ScopeTag::Singleton);
/// let root = root.build().unwrap();
///
/// let mut child = root.child_builder();
/// child.bind::<Handler>()
///     .to_provider(|config: Arc<Config>| Ok(Handler { config }));
/// let child = child.build().unwrap();
///
/// let handler = child.get::<Handler>().unwrap();
/// assert!(Arc::ptr_eq(&handler.config, &root.get::<Config>().unwrap()));
/// assert!(root.get::<Handler>().is_err());
/// ```
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent.as_ref().map(Injector::id))
            .field("bindings", &self.inner.store.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Injector {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Injector {}

impl Injector {
    /// Creates a builder for a root injector
    #[inline]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    /// Builds a root injector from modules
    pub fn new(modules: &[&dyn Module]) -> Result<Self, Error> {
        let mut builder = Self::builder();
        for module in modules {
            builder.install(*module);
        }
        builder.build()
    }

    /// Creates a builder for a child of this injector
    #[inline]
    pub fn child_builder(&self) -> InjectorBuilder {
        InjectorBuilder::child_of(self)
    }

    /// Builds a child of this injector from modules
    pub fn create_child(&self, modules: &[&dyn Module]) -> Result<Self, Error> {
        let mut builder = self.child_builder();
        for module in modules {
            builder.install(*module);
        }
        builder.build()
    }

    pub(crate) fn from_parts(
        parent: Option<Injector>,
        store: BindingStore,
        scopes: ScopeMap,
        config: InjectorConfig
    ) -> Self {
        let catalog = parent
            .as_ref()
            .map(|p| p.inner.catalog.clone())
            .unwrap_or_default();
        let inner = InjectorInner {
            id: InjectorId::next(),
            singletons: ScopeCache::new(),
            synthesized: DashMap::new(),
            promoted: DashMap::new(),
            children: Mutex::new(Vec::new()),
            parent,
            store,
            scopes,
            catalog,
            config,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Links a fully built child into this injector's children
    pub(crate) fn adopt(&self, child: &Injector) {
        let mut children = self.inner.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
    }

    /// Returns the identifier of this injector
    #[inline]
    pub fn id(&self) -> InjectorId {
        self.inner.id
    }

    /// Returns the parent injector, `None` for a root
    #[inline]
    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    /// Returns the live children of this injector
    pub fn children(&self) -> Vec<Injector> {
        self.inner.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Injector { inner })
            .collect()
    }

    /// Returns the number of ancestors, `0` for a root
    #[inline]
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Returns `true` if this injector is a strict ancestor of `other`
    #[inline]
    pub fn is_ancestor_of(&self, other: &Injector) -> bool {
        other.ancestors().any(|a| a == self)
    }

    /// Returns the configuration of this injector
    #[inline]
    pub fn config(&self) -> &InjectorConfig {
        &self.inner.config
    }

    /// Returns the explicit binding store of this injector level
    #[inline]
    pub fn store(&self) -> &BindingStore {
        &self.inner.store
    }

    /// Iterates over the explicit bindings declared at this level
    #[inline]
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.inner.store.iter()
    }

    /// Returns the explicit or already synthesized binding for `key`
    /// visible from this injector, nearest first
    pub fn binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.chain()
            .find_map(|i| i.inner.store.lookup_local(key).cloned())
            .or_else(|| self.chain().find_map(|i| i.synthesized(key)))
    }

    /// Resolves `key` into an instance
    pub fn resolve(&self, key: &Key) -> Result<Instance, Error> {
        resolver::resolve(self, key)
    }

    /// Resolves `T` and returns a shared pointer
    #[inline]
    pub fn get<T>(&self) -> Result<Arc<T>, Error>
    where
        T: ?Sized + Send + Sync + 'static
    {
        self.get_by_key(&Key::of::<T>())
    }

    /// Resolves `T` qualified with `qualifier` and returns a shared pointer
    #[inline]
    pub fn get_named<T>(&self, qualifier: impl Into<Cow<'static, str>>) -> Result<Arc<T>, Error>
    where
        T: ?Sized + Send + Sync + 'static
    {
        self.get_by_key(&Key::named::<T>(qualifier))
    }

    /// Resolves `T` and returns a cloned instance.
    /// `T` must implement [`Clone`] otherwise use [`Injector::get`] method
    /// that returns a shared pointer.
    #[inline]
    pub fn get_cloned<T: Send + Sync + Clone + 'static>(&self) -> Result<T, Error> {
        self.get::<T>()
            .map(|s| s.as_ref().clone())
    }

    /// Makes the constructible shape of `T` known to the whole tree and resolves it
    pub fn instance<T: Inject>(&self) -> Result<Arc<T>, Error> {
        let key = Key::of::<T>();
        self.inner.catalog
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Recipe::of::<T>()));
        self.get_by_key(&key)
    }

    /// Returns a lazy handle resolving `T` from this injector on demand
    #[inline]
    pub fn provider<T>(&self) -> Provider<T>
    where
        T: ?Sized + Send + Sync + 'static
    {
        Provider::new(self, Key::of::<T>())
    }

    #[inline]
    pub(crate) fn get_by_key<T>(&self, key: &Key) -> Result<Arc<T>, Error>
    where
        T: ?Sized + Send + Sync + 'static
    {
        self.resolve(key)?
            .downcast::<T>()
            .ok_or(Error::ResolveFailed(std::any::type_name::<T>()))
    }

    /// This injector followed by its ancestors up to the root
    #[inline]
    pub(crate) fn chain(&self) -> impl Iterator<Item = &Injector> {
        successors(Some(self), |i| i.parent())
    }

    /// Strict ancestors of this injector, nearest first
    #[inline]
    pub(crate) fn ancestors(&self) -> impl Iterator<Item = &Injector> {
        self.chain().skip(1)
    }

    /// Finds the policy registered for a custom scope, nearest first
    pub(crate) fn scope_policy(&self, name: &str) -> Option<&Arc<dyn ScopePolicy>> {
        self.chain().find_map(|i| i.inner.scopes.get(name))
    }

    #[inline]
    pub(crate) fn singletons(&self) -> &ScopeCache {
        &self.inner.singletons
    }

    #[inline]
    pub(crate) fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[inline]
    pub(crate) fn synthesized(&self, key: &Key) -> Option<Arc<Binding>> {
        self.inner.synthesized
            .get(key)
            .map(|b| b.value().clone())
    }

    #[inline]
    pub(crate) fn owns_synthesized(&self, key: &Key) -> bool {
        self.inner.synthesized.contains_key(key)
    }

    /// Drops a synthesized binding together with its cached singleton
    pub(crate) fn forget_synthesized(&self, key: &Key) {
        if self.inner.synthesized.remove(key).is_some() {
            self.inner.singletons.remove(key);
        }
    }

    /// Stores a synthesized binding, keeping the first one if another
    /// thread got there before
    pub(crate) fn synthesize(&self, recipe: Arc<Recipe>) -> Arc<Binding> {
        self.inner.synthesized
            .entry(recipe.key().clone())
            .or_insert_with(|| Arc::new(Binding::synthesized(recipe)))
            .value()
            .clone()
    }

    #[inline]
    pub(crate) fn promoted(&self, key: &Key) -> Option<usize> {
        self.inner.promoted
            .get(key)
            .map(|levels| *levels.value())
    }

    #[inline]
    pub(crate) fn remember_promotion(&self, key: Key, levels: usize) {
        self.inner.promoted.insert(key, levels);
    }

    /// The ancestor `levels` above this injector
    #[inline]
    pub(crate) fn ancestor(&self, levels: usize) -> Option<&Injector> {
        self.chain().nth(levels)
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> WeakInjector {
        WeakInjector(Arc::downgrade(&self.inner))
    }
}

/// A handle that does not keep its injector alive
#[derive(Debug, Clone)]
pub(crate) struct WeakInjector(Weak<InjectorInner>);

impl WeakInjector {
    #[inline]
    pub(crate) fn upgrade(&self) -> Option<Injector> {
        self.0
            .upgrade()
            .map(|inner| Injector { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeTag;
    use std::sync::Mutex;

    trait Cache: Send + Sync {
        fn get(&self, key: &str) -> Option<String>;
        fn set(&self, key: &str, value: &str);
    }

    #[derive(Clone, Default)]
    struct InMemoryCache {
        inner: Arc<Mutex<HashMap<String, String>>>
    }

    impl Cache for InMemoryCache {
        fn get(&self, key: &str) -> Option<String> {
            self.inner
                .lock()
                .unwrap()
                .get(key)
                .cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.inner
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    #[derive(Clone)]
    struct CacheWrapper {
        inner: Arc<dyn Cache>
    }

    #[test]
    fn it_binds_instance() {
        let mut builder = Injector::builder();
        builder.bind::<InMemoryCache>().to_instance(InMemoryCache::default());

        let injector = builder.build().unwrap();

        let cache = injector.get::<InMemoryCache>().unwrap();
        cache.set("key", "value");

        let cache = injector.get::<InMemoryCache>().unwrap();
        let key = cache.get("key").unwrap();

        assert_eq!(key, "value");
    }

    #[test]
    fn it_binds_unscoped_provider() {
        let mut builder = Injector::builder();
        builder.bind::<InMemoryCache>().to_provider(InMemoryCache::default);

        let injector = builder.build().unwrap();

        let cache = injector.get::<InMemoryCache>().unwrap();
        cache.set("key", "value");

        let cache = injector.get::<InMemoryCache>().unwrap();
        let key = cache.get("key");

        assert!(key.is_none());
    }

    #[test]
    fn it_binds_singleton_provider() {
        let mut builder = Injector::builder();
        builder.bind::<InMemoryCache>()
            .to_provider(InMemoryCache::default)
            .in_singleton();

        let injector = builder.build().unwrap();

        let a = injector.get::<InMemoryCache>().unwrap();
        let b = injector.get::<InMemoryCache>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn it_resolves_inner_dependencies() {
        let mut builder = Injector::builder();
        builder.bind::<InMemoryCache>().to_instance(InMemoryCache::default());
        builder.bind::<dyn Cache>().to_implementation::<InMemoryCache, _>(|c| c);
        builder.bind::<CacheWrapper>()
            .to_provider(|inner: Arc<dyn Cache>| Ok(CacheWrapper { inner }));

        let root = builder.build().unwrap();

        {
            let child = root.child_builder().build().unwrap();
            let cache = child.get::<CacheWrapper>().unwrap();
            cache.inner.set("key", "value 1");
        }

        let cache = root.get::<InMemoryCache>().unwrap();
        let key = cache.get("key").unwrap();

        assert_eq!(key, "value 1");
    }

    #[test]
    fn it_returns_cloned_instance() {
        let mut builder = Injector::builder();
        builder.bind::<InMemoryCache>().to_instance(InMemoryCache::default());

        let injector = builder.build().unwrap();

        let cache = injector.get_cloned::<InMemoryCache>().unwrap();
        cache.set("key", "value");

        assert_eq!(injector.get::<InMemoryCache>().unwrap().get("key").unwrap(), "value");
    }

    #[test]
    fn it_resolves_named_keys() {
        let mut builder = Injector::builder();
        builder.bind_named::<String>("primary").to_instance(String::from("db-1"));
        builder.bind_named::<String>("replica").to_instance(String::from("db-2"));

        let injector = builder.build().unwrap();

        assert_eq!(*injector.get_named::<String>("primary").unwrap(), "db-1");
        assert_eq!(*injector.get_named::<String>("replica").unwrap(), "db-2");
        assert!(matches!(injector.get::<String>(), Err(Error::UnresolvableKey(_))));
    }

    #[test]
    fn it_returns_error_when_resolve_unbound() {
        let injector = Injector::builder().build().unwrap();

        let cache = injector.get::<CacheWrapper>();

        assert!(matches!(cache, Err(Error::UnresolvableKey(_))));
    }

    #[test]
    fn it_returns_error_when_resolve_unbound_from_child() {
        let injector = Injector::builder()
            .build()
            .unwrap()
            .child_builder()
            .build()
            .unwrap();

        let cache = injector.get::<CacheWrapper>();

        assert!(cache.is_err());
    }

    #[test]
    fn it_tracks_tree_shape() {
        let root = Injector::builder().build().unwrap();
        let child = root.child_builder().build().unwrap();
        let grandchild = child.child_builder().build().unwrap();

        assert_eq!(root.depth(), 0);
        assert_eq!(grandchild.depth(), 2);
        assert!(root.is_ancestor_of(&grandchild));
        assert!(!grandchild.is_ancestor_of(&root));
        assert!(!child.is_ancestor_of(&child));
        assert_eq!(grandchild.parent(), Some(&child));
        assert_eq!(root.children(), vec![child.clone()]);
        assert_eq!(grandchild.ancestor(1), Some(&child));
    }

    #[test]
    fn it_forgets_dropped_children() {
        let root = Injector::builder().build().unwrap();
        {
            let _child = root.child_builder().build().unwrap();
            assert_eq!(root.children().len(), 1);
        }

        assert!(root.children().is_empty());
    }

    #[test]
    fn it_frees_child_singletons_when_child_dropped() {
        let mut builder = Injector::builder();
        builder.bind::<u32>().to_instance(7);
        let root = builder.build().unwrap();

        let mut builder = root.child_builder();
        builder.bind::<String>()
            .to_provider(|| String::from("session"))
            .in_singleton();
        let child = builder.build().unwrap();

        let session = child.get::<String>().unwrap();
        let weak = Arc::downgrade(&session);
        assert!(Arc::ptr_eq(&session, &child.get::<String>().unwrap()));

        drop(session);
        drop(child);

        assert!(weak.upgrade().is_none());
        assert!(root.children().is_empty());
        assert_eq!(*root.get::<u32>().unwrap(), 7);
    }

    #[test]
    fn it_keeps_parent_alive_through_child() {
        let mut builder = Injector::builder();
        builder.bind::<u32>().to_instance(7);
        let child = builder.build().unwrap().child_builder().build().unwrap();

        assert_eq!(*child.get::<u32>().unwrap(), 7);
    }

    #[test]
    fn it_reports_visible_binding() {
        let mut builder = Injector::builder();
        builder.bind::<u32>().to_instance(7);
        let root = builder.build().unwrap();
        let child = root.child_builder().build().unwrap();

        let binding = child.binding(&Key::of::<u32>()).unwrap();

        assert_eq!(binding.scope(), &ScopeTag::Singleton);
        assert!(child.bindings().next().is_none());
        assert_eq!(root.bindings().count(), 1);
    }
}
