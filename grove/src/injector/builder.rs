//! Declarations and the construction of sealed injectors

use super::{Error, FromInjector, GenericFactory, Injector, InjectorConfig, ScopeMap, Stage};
use crate::{
    binding::{Binding, BindingStore, Link, ModuleId, Origin, Recipe, Strategy},
    inject::Inject,
    instance::Instance,
    key::Key,
    scope::{ScopePolicy, ScopeTag},
};
use super::factory::{make_provider_fn, make_shared_provider_fn};
use dashmap::mapref::entry::Entry;
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};

/// A unit of configuration that declares bindings on a builder
///
/// # Example
/// ```
/// use grove::{Injector, InjectorBuilder, Module};
///
/// struct Greetings;
///
/// impl Module for Greetings {
///     fn configure(&self, builder: &mut InjectorBuilder) {
///         builder.bind::<String>().to_instance(String::from("hello"));
///     }
/// }
///
/// let injector = Injector::new(&[&Greetings]).unwrap();
/// assert_eq!(*injector.get::<String>().unwrap(), "hello");
/// ```
pub trait Module {
    /// Declares bindings, scopes and constructible types
    fn configure(&self, builder: &mut InjectorBuilder);

    /// Identifies the module in binding origins
    fn id(&self) -> ModuleId {
        ModuleId::new(std::any::type_name::<Self>())
    }
}

impl<F> Module for F
where
    F: Fn(&mut InjectorBuilder)
{
    #[inline]
    fn configure(&self, builder: &mut InjectorBuilder) {
        self(builder)
    }
}

/// A binding as declared, before its scope defaults are applied
#[derive(Debug, Clone)]
pub struct BindingDeclaration {
    /// The bound key
    pub key: Key,

    /// How instances are produced
    pub strategy: Strategy,

    /// The requested scope, `None` to use the default of the strategy
    pub scope: Option<ScopeTag>,

    /// The declaring module
    pub origin: ModuleId,
}

impl BindingDeclaration {
    /// Creates a declaration with the default scope
    #[inline]
    pub fn new(key: Key, strategy: Strategy) -> Self {
        Self {
            key,
            strategy,
            scope: None,
            origin: ModuleId::default(),
        }
    }

    /// Seals the declaration. Instances are singletons, a type constructed
    /// from its own shape keeps its own scope and anything else is unscoped.
    fn into_binding(self) -> Binding {
        let scope = self.scope.unwrap_or_else(|| match &self.strategy {
            Strategy::JustInTime(recipe) => recipe.scope().clone(),
            _ => ScopeTag::Unscoped,
        });
        Binding::new(self.key, self.strategy, scope, Origin::Module(self.origin))
    }
}

/// One entry of the configuration of an injector level
pub enum Declaration {
    /// An explicit binding
    Binding(BindingDeclaration),

    /// A policy serving a custom scope tag
    Scope {
        /// Name of the custom scope
        name: Cow<'static, str>,
        /// The policy
        policy: Arc<dyn ScopePolicy>,
    },

    /// A type that may be synthesized just in time
    Constructible(Arc<Recipe>),
}

impl Debug for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Declaration::Binding(binding) => f.debug_tuple("Binding").field(binding).finish(),
            Declaration::Scope { name, .. } => f
                .debug_struct("Scope")
                .field("name", name)
                .finish_non_exhaustive(),
            Declaration::Constructible(recipe) => f.debug_tuple("Constructible").field(recipe).finish(),
        }
    }
}

/// Collects the declarations of one injector level
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    declarations: Vec<Declaration>,
    parent: Option<Injector>,
    config: Option<InjectorConfig>,
    module: ModuleId,
}

impl InjectorBuilder {
    /// Creates a builder for a root injector
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for a child of `parent`
    #[inline]
    pub fn child_of(parent: &Injector) -> Self {
        Self {
            parent: Some(parent.clone()),
            ..Self::default()
        }
    }

    /// Overrides the configuration, which is otherwise inherited from the parent
    pub fn with_config(mut self, config: InjectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Starts a binding for `T`
    #[inline]
    pub fn bind<T>(&mut self) -> BindingBuilder<'_, T>
    where
        T: ?Sized + Send + Sync + 'static
    {
        BindingBuilder::new(self, Key::of::<T>())
    }

    /// Starts a binding for `T` qualified with `qualifier`
    #[inline]
    pub fn bind_named<T>(&mut self, qualifier: impl Into<Cow<'static, str>>) -> BindingBuilder<'_, T>
    where
        T: ?Sized + Send + Sync + 'static
    {
        BindingBuilder::new(self, Key::named::<T>(qualifier))
    }

    /// Binds `T` to an already built instance
    #[inline]
    pub fn bind_instance<T: Send + Sync + 'static>(&mut self, instance: T) {
        self.bind::<T>().to_instance(instance)
    }

    /// Registers a policy serving the custom scope `name`
    pub fn bind_scope(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        policy: impl ScopePolicy
    ) -> &mut Self {
        self.declarations.push(Declaration::Scope {
            name: name.into(),
            policy: Arc::new(policy),
        });
        self
    }

    /// Makes the constructible shape of `T` known to the whole tree
    pub fn constructible<T: Inject>(&mut self) -> &mut Self {
        self.declarations.push(Declaration::Constructible(Arc::new(Recipe::of::<T>())));
        self
    }

    /// Adds an already prepared declaration
    #[inline]
    pub fn declare(&mut self, declaration: Declaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }

    /// Lets `module` declare its bindings on this builder
    pub fn install(&mut self, module: &dyn Module) -> &mut Self {
        let previous = std::mem::replace(&mut self.module, module.id());
        module.configure(self);
        self.module = previous;
        self
    }

    /// Returns the collected declarations
    #[inline]
    pub fn into_declarations(self) -> Vec<Declaration> {
        self.declarations
    }

    /// Validates the declarations and builds the injector
    #[inline]
    pub fn build(self) -> Result<Injector, Error> {
        build_injector(self.declarations, self.parent.as_ref(), self.config)
    }

    fn push_binding(&mut self, key: Key, strategy: Strategy) -> ScopedBindingBuilder<'_> {
        let mut declaration = BindingDeclaration::new(key, strategy);
        declaration.origin = self.module.clone();
        self.declarations.push(Declaration::Binding(declaration));
        ScopedBindingBuilder {
            index: self.declarations.len() - 1,
            declarations: &mut self.declarations,
        }
    }
}

/// Chooses how a key is produced
pub struct BindingBuilder<'a, T: ?Sized> {
    builder: &'a mut InjectorBuilder,
    key: Key,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> Debug for BindingBuilder<'_, T> {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<'a, T> BindingBuilder<'a, T>
where
    T: ?Sized + Send + Sync + 'static
{
    #[inline]
    fn new(builder: &'a mut InjectorBuilder, key: Key) -> Self {
        Self { builder, key, _marker: PhantomData }
    }

    /// Binds to an already built instance
    #[inline]
    pub fn to_instance(self, instance: T)
    where
        T: Sized
    {
        self.to_shared(Arc::new(instance))
    }

    /// Binds to an already shared instance, possibly a trait object
    #[inline]
    pub fn to_shared(self, instance: Arc<T>) {
        self.builder.push_binding(self.key, Strategy::Instance(Instance::new(instance)));
    }

    /// Binds to a factory whose arguments are extracted from the owning injector
    pub fn to_provider<F, Args>(self, factory: F) -> ScopedBindingBuilder<'a>
    where
        T: Sized,
        F: GenericFactory<Args, Output = T>,
        Args: FromInjector
    {
        let (factory, dependencies) = make_provider_fn(factory);
        self.builder.push_binding(self.key, Strategy::Provider { factory, dependencies })
    }

    /// Binds to a factory producing shared pointers, possibly to trait objects
    pub fn to_shared_provider<F, Args>(self, factory: F) -> ScopedBindingBuilder<'a>
    where
        F: GenericFactory<Args, Output = Arc<T>>,
        Args: FromInjector
    {
        let (factory, dependencies) = make_shared_provider_fn(factory);
        self.builder.push_binding(self.key, Strategy::Provider { factory, dependencies })
    }

    /// Links to the constructible type `U`, registering its shape
    pub fn to<U, F>(self, cast: F) -> ScopedBindingBuilder<'a>
    where
        U: Inject,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static
    {
        self.builder.constructible::<U>();
        self.to_implementation::<U, F>(cast)
    }

    /// Links to whatever binding `U` resolves to
    pub fn to_implementation<U, F>(self, cast: F) -> ScopedBindingBuilder<'a>
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static
    {
        let link = Link::new::<T, U, F>(Key::of::<U>(), cast);
        self.builder.push_binding(self.key, Strategy::Implementation(link))
    }

    /// Constructs `T` from its own shape
    pub fn to_self(self) -> ScopedBindingBuilder<'a>
    where
        T: Inject
    {
        let recipe = Arc::new(Recipe::of::<T>());
        self.builder.declarations.push(Declaration::Constructible(recipe.clone()));
        self.builder.push_binding(self.key, Strategy::JustInTime(recipe))
    }
}

/// Optionally overrides the scope of a declared binding
#[derive(Debug)]
pub struct ScopedBindingBuilder<'a> {
    declarations: &'a mut Vec<Declaration>,
    index: usize,
}

impl ScopedBindingBuilder<'_> {
    /// Places the binding in `scope`
    pub fn in_scope(self, scope: ScopeTag) {
        if let Some(Declaration::Binding(declaration)) = self.declarations.get_mut(self.index) {
            declaration.scope = Some(scope);
        }
    }

    /// Places the binding in the singleton scope of the injector owning it
    #[inline]
    pub fn in_singleton(self) {
        self.in_scope(ScopeTag::Singleton)
    }

    /// Makes every resolution produce a new instance
    #[inline]
    pub fn unscoped(self) {
        self.in_scope(ScopeTag::Unscoped)
    }
}

/// Validates `declarations` and builds a sealed injector, a child of `parent` if any.
///
/// Every construction-time error is collected before failing: one is
/// returned as itself, several as [`Error::Creation`]. Nothing is published
/// on failure, the parent does not learn about the rejected child.
pub fn build_injector(
    declarations: Vec<Declaration>,
    parent: Option<&Injector>,
    config: Option<InjectorConfig>
) -> Result<Injector, Error> {
    let config = config
        .or_else(|| parent.map(|p| *p.config()))
        .unwrap_or_default();

    let mut errors = Vec::new();
    let mut scopes = ScopeMap::new();
    let mut recipes = HashMap::new();
    let mut bindings = Vec::new();
    for declaration in declarations {
        match declaration {
            Declaration::Binding(declaration) => bindings.push(declaration.into_binding()),
            Declaration::Constructible(recipe) => {
                recipes.entry(recipe.key().clone()).or_insert(recipe);
            },
            Declaration::Scope { name, policy } => {
                if scopes.contains_key(&name) {
                    errors.push(Error::DuplicateScope(name));
                } else {
                    scopes.insert(name, policy);
                }
            }
        }
    }

    let store = BindingStore::new(bindings.iter().cloned())
        .unwrap_or_else(|err| {
            collect(&mut errors, err);
            BindingStore::default()
        });

    let scope_bound = |name: &str| scopes.contains_key(name)
        || parent.is_some_and(|p| p.scope_policy(name).is_some());
    let recipe_of = |key: &Key| recipes
        .get(key)
        .cloned()
        .or_else(|| parent.and_then(|p| p.catalog().get(key).map(|r| r.value().clone())));

    for binding in &bindings {
        let key = binding.key();
        if let Some(ancestor) = parent.and_then(|p| p.chain().find(|a| a.store().contains(key))) {
            errors.push(Error::OverlappingBinding { key: key.clone(), ancestor: ancestor.id() });
        }

        let target = match binding.strategy() {
            Strategy::Implementation(link) => recipe_of(link.target()),
            Strategy::JustInTime(recipe) => Some(recipe.clone()),
            _ => None,
        };
        let target_scope = target
            .as_ref()
            .map(|r| r.scope())
            .filter(|scope| *scope != binding.scope());
        let required = [Some(binding.scope()), target_scope];
        for name in required.into_iter().flatten().filter_map(ScopeTag::custom_name) {
            if !scope_bound(&**name) {
                errors.push(Error::UnboundScope { key: key.clone(), scope: name.clone() });
            }
        }
    }

    if let Some(err) = Error::from_many(errors) {
        #[cfg(feature = "tracing")]
        tracing::warn!("injector construction failed: {err}");
        return Err(err);
    }

    let injector = Injector::from_parts(parent.cloned(), store, scopes, config);
    let registered = recipes
        .into_iter()
        .filter_map(|(key, recipe)| match injector.catalog().entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(recipe);
                Some(key)
            },
            Entry::Occupied(_) => None,
        })
        .collect::<Vec<_>>();

    if config.stage() == Stage::Production {
        if let Err(err) = instantiate_singletons(&injector) {
            withdraw(&injector, &registered);
            return Err(err);
        }
    }

    if let Some(parent) = parent {
        parent.adopt(&injector);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "injector {} built with {} bindings, parent: {:?}",
        injector.id(),
        injector.store().len(),
        parent.map(Injector::id)
    );

    Ok(injector)
}

/// Takes back the recipes a failed build published, along with anything
/// ancestors synthesized from them
fn withdraw(injector: &Injector, keys: &[Key]) {
    for key in keys {
        injector.catalog().remove(key);
        for ancestor in injector.ancestors() {
            ancestor.forget_synthesized(key);
        }
    }
}

/// Constructs every explicit singleton declared at the level of `injector`
fn instantiate_singletons(injector: &Injector) -> Result<(), Error> {
    let keys = injector
        .bindings()
        .filter(|b| b.scope() == &ScopeTag::Singleton)
        .filter(|b| !matches!(b.strategy(), Strategy::Instance(_)))
        .map(|b| b.key().clone())
        .collect::<Vec<_>>();

    for key in keys {
        #[cfg(feature = "tracing")]
        tracing::debug!("eagerly instantiating {key} in injector {}", injector.id());

        if let Err(err) = injector.resolve(&key) {
            #[cfg(feature = "tracing")]
            tracing::warn!("eager instantiation of {key} failed: {err}");
            return Err(err);
        }
    }
    Ok(())
}

#[inline]
fn collect(errors: &mut Vec<Error>, err: Error) {
    match err {
        Error::Creation(nested) => errors.extend(nested),
        err => errors.push(err),
    }
}
