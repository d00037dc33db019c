//! Bindings that map a [`Key`] to a construction strategy

use crate::{
    error::Error,
    inject::Inject,
    injector::{FromInjector, Injector},
    instance::Instance,
    key::Key,
    scope::ScopeTag,
};
use dashmap::DashMap;
use std::{
    borrow::Cow,
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

pub use store::BindingStore;

pub mod store;

/// A type-erased factory producing an instance from its owning injector
pub type ProviderFn = Arc<
    dyn Fn(&Injector) -> Result<Instance, Error>
    + Send
    + Sync
>;

/// A type-erased upcast applied to a linked instance
pub type CastFn = Arc<
    dyn Fn(Instance) -> Result<Instance, Error>
    + Send
    + Sync
>;

/// Tree-wide index of constructible shapes, shared by a root and all its descendants
pub(crate) type Catalog = DashMap<Key, Arc<Recipe>>;

/// Identifies the module that declared a binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(Cow<'static, str>);

impl ModuleId {
    /// Creates a module id
    #[inline]
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModuleId {
    #[inline]
    fn default() -> Self {
        Self::new("default")
    }
}

impl Display for ModuleId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a binding comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Declared explicitly by a module
    Module(ModuleId),

    /// Synthesized just in time from a constructible shape
    Synthesized,
}

/// The constructible shape of a type: its own scope tag, the keys it
/// depends on and how to build it from an injector.
pub struct Recipe {
    key: Key,
    scope: ScopeTag,
    dependencies: Vec<Key>,
    factory: ProviderFn,
}

impl Debug for Recipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recipe")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Recipe {
    /// Captures the constructible shape of `T`
    pub fn of<T: Inject>() -> Self {
        let mut dependencies = Vec::new();
        T::Deps::dependencies(&mut dependencies);
        Self {
            key: Key::of::<T>(),
            scope: T::scope(),
            dependencies,
            factory: Arc::new(|injector: &Injector| {
                let deps = T::Deps::from_injector(injector)?;
                T::inject(deps).map(Instance::from_value)
            }),
        }
    }

    /// The key this recipe constructs
    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The scope tag carried by the type itself
    #[inline]
    pub fn scope(&self) -> &ScopeTag {
        &self.scope
    }

    /// Keys required to construct the type
    #[inline]
    pub fn dependencies(&self) -> &[Key] {
        &self.dependencies
    }

    #[inline]
    pub(crate) fn construct(&self, injector: &Injector) -> Result<Instance, Error> {
        (self.factory)(injector)
    }
}

/// A link from one key to another key's binding
#[derive(Clone)]
pub struct Link {
    target: Key,
    cast: CastFn,
}

impl Debug for Link {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Link {
    /// Links `Key::of::<T>()`-typed bindings to `target`, upcasting with `cast`
    pub(crate) fn new<T, U, F>(target: Key, cast: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<U>) -> Arc<T> + Send + Sync + 'static
    {
        let cast: CastFn = Arc::new(move |instance: Instance| {
            instance
                .downcast::<U>()
                .map(|target| Instance::new(cast(target)))
                .ok_or(Error::ResolveFailed(std::any::type_name::<U>()))
        });
        Self { target, cast }
    }

    /// The key this link delegates to
    #[inline]
    pub fn target(&self) -> &Key {
        &self.target
    }

    #[inline]
    pub(crate) fn cast(&self, instance: Instance) -> Result<Instance, Error> {
        (self.cast)(instance)
    }
}

/// How a binding produces its instance
#[derive(Clone)]
pub enum Strategy {
    /// Always the same, already built instance
    Instance(Instance),

    /// A factory whose arguments are extracted from the owning injector
    Provider {
        /// The factory
        factory: ProviderFn,
        /// Keys extracted for the factory arguments
        dependencies: Vec<Key>,
    },

    /// Delegation to another key's binding
    Implementation(Link),

    /// Construction from the type's constructible shape
    JustInTime(Arc<Recipe>),
}

impl Debug for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Instance(_) => f.write_str("Instance(..)"),
            Strategy::Provider { dependencies, .. } => f
                .debug_struct("Provider")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            Strategy::Implementation(link) => f.debug_tuple("Implementation").field(link).finish(),
            Strategy::JustInTime(recipe) => f.debug_tuple("JustInTime").field(recipe).finish(),
        }
    }
}

/// A sealed mapping from a [`Key`] to a [`Strategy`] and a [`ScopeTag`]
#[derive(Debug, Clone)]
pub struct Binding {
    key: Key,
    strategy: Strategy,
    scope: ScopeTag,
    origin: Origin,
}

impl Binding {
    /// Creates a binding.
    ///
    /// Instance bindings always behave as singletons, whatever `scope` says.
    pub fn new(key: Key, strategy: Strategy, scope: ScopeTag, origin: Origin) -> Self {
        let scope = match strategy {
            Strategy::Instance(_) => ScopeTag::Singleton,
            _ => scope,
        };
        Self { key, strategy, scope, origin }
    }

    /// Creates a synthesized binding from a constructible shape
    #[inline]
    pub(crate) fn synthesized(recipe: Arc<Recipe>) -> Self {
        Self {
            key: recipe.key.clone(),
            scope: recipe.scope.clone(),
            strategy: Strategy::JustInTime(recipe),
            origin: Origin::Synthesized,
        }
    }

    /// The bound key
    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The construction strategy
    #[inline]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// The scope tag
    #[inline]
    pub fn scope(&self) -> &ScopeTag {
        &self.scope
    }

    /// Where the binding comes from
    #[inline]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Keys this binding needs in order to produce an instance
    pub fn dependencies(&self) -> &[Key] {
        match &self.strategy {
            Strategy::Instance(_) => &[],
            Strategy::Provider { dependencies, .. } => dependencies,
            Strategy::Implementation(link) => std::slice::from_ref(&link.target),
            Strategy::JustInTime(recipe) => recipe.dependencies(),
        }
    }

    /// Returns the recipe of a just-in-time binding
    #[inline]
    pub fn recipe(&self) -> Option<&Arc<Recipe>> {
        match &self.strategy {
            Strategy::JustInTime(recipe) => Some(recipe),
            _ => None,
        }
    }

    /// An explicit binding is equivalent to a synthesized one when it builds
    /// the type from its own shape, under its own shareable scope. Such a
    /// binding may be owned by an ancestor.
    pub(crate) fn is_promotable(&self) -> bool {
        match &self.strategy {
            Strategy::JustInTime(recipe) => recipe.key == self.key
                && recipe.scope == self.scope
                && self.scope.is_shareable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Repo;

    struct Service;

    impl Inject for Repo {
        type Deps = ();

        fn scope() -> ScopeTag {
            ScopeTag::Singleton
        }

        fn inject(_: ()) -> Result<Self, Error> {
            Ok(Repo)
        }
    }

    impl Inject for Service {
        type Deps = (Arc<Repo>, Arc<u32>);

        fn inject(_: Self::Deps) -> Result<Self, Error> {
            Ok(Service)
        }
    }

    #[test]
    fn it_captures_recipe_shape() {
        let recipe = Recipe::of::<Service>();

        assert_eq!(recipe.key(), &Key::of::<Service>());
        assert_eq!(recipe.scope(), &ScopeTag::Unscoped);
        assert_eq!(recipe.dependencies(), &[Key::of::<Repo>(), Key::of::<u32>()]);
    }

    #[test]
    fn it_forces_singleton_for_instances() {
        let binding = Binding::new(
            Key::of::<u8>(),
            Strategy::Instance(Instance::from_value(1_u8)),
            ScopeTag::Unscoped,
            Origin::Module(ModuleId::default()));

        assert_eq!(binding.scope(), &ScopeTag::Singleton);
        assert!(binding.dependencies().is_empty());
        assert!(!binding.is_promotable());
    }

    #[test]
    fn it_promotes_only_equivalent_bindings() {
        let recipe = Arc::new(Recipe::of::<Repo>());

        let same_scope = Binding::new(
            Key::of::<Repo>(),
            Strategy::JustInTime(recipe.clone()),
            ScopeTag::Singleton,
            Origin::Module(ModuleId::default()));
        let other_scope = Binding::new(
            Key::of::<Repo>(),
            Strategy::JustInTime(recipe.clone()),
            ScopeTag::custom("request"),
            Origin::Module(ModuleId::default()));
        let qualified = Binding::new(
            Key::named::<Repo>("other"),
            Strategy::JustInTime(recipe),
            ScopeTag::Singleton,
            Origin::Module(ModuleId::default()));

        assert!(same_scope.is_promotable());
        assert!(!other_scope.is_promotable());
        assert!(!qualified.is_promotable());
    }

    #[test]
    fn it_reports_link_target_as_dependency() {
        let link = Link::new::<Repo, Repo, _>(Key::of::<Repo>(), |r| r);
        let binding = Binding::new(
            Key::named::<Repo>("alias"),
            Strategy::Implementation(link),
            ScopeTag::Unscoped,
            Origin::Module(ModuleId::new("alias")));

        assert_eq!(binding.dependencies(), &[Key::of::<Repo>()]);
        assert_eq!(binding.origin(), &Origin::Module(ModuleId::new("alias")));
    }
}
