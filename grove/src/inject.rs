//! Constructible shapes and the extractors they are built from

use crate::{
    error::Error,
    injector::{FromInjector, Injector, WeakInjector},
    key::{Key, Qualifier},
    scope::ScopeTag,
};
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
    ops::Deref,
    sync::Arc,
};

/// The constructible shape of a type: what it depends on, which scope it
/// carries and how it is built from its dependencies.
///
/// A type implementing `Inject` can be synthesized just in time, without an
/// explicit binding, once the tree knows about it (see
/// [`InjectorBuilder::constructible`](crate::InjectorBuilder::constructible),
/// [`BindingBuilder::to`](crate::injector::BindingBuilder::to) and
/// [`Injector::instance`]).
///
/// # Example
/// ```
/// use grove::{Error, Inject, Injector, ScopeTag};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// impl Inject for Clock {
///     type Deps = ();
///
///     fn scope() -> ScopeTag {
///         ScopeTag::Singleton
///     }
///
///     fn inject(_: ()) -> Result<Self, Error> {
///         Ok(Clock)
///     }
/// }
///
/// struct Scheduler {
///     clock: Arc<Clock>,
/// }
///
/// impl Inject for Scheduler {
///     type Deps = Arc<Clock>;
///
///     fn inject(clock: Arc<Clock>) -> Result<Self, Error> {
///         Ok(Scheduler { clock })
///     }
/// }
///
/// let mut builder = Injector::builder();
/// builder.constructible::<Clock>();
/// let injector = builder.build().unwrap();
///
/// let a = injector.instance::<Scheduler>().unwrap();
/// let b = injector.instance::<Scheduler>().unwrap();
///
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.clock, &b.clock));
/// ```
pub trait Inject: Sized + Send + Sync + 'static {
    /// Dependencies extracted from the owning injector
    type Deps: FromInjector;

    /// The scope tag this type carries
    #[inline]
    fn scope() -> ScopeTag {
        ScopeTag::Unscoped
    }

    /// Builds `Self` from its dependencies
    fn inject(deps: Self::Deps) -> Result<Self, Error>;
}

/// A lazy handle resolving `T` on each [`Provider::get`] call.
///
/// Taking a dependency through a `Provider` does not resolve it while the
/// dependent is constructed, which breaks construction cycles. The handle
/// does not keep its injector alive.
pub struct Provider<T: ?Sized> {
    injector: WeakInjector,
    key: Key,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> Clone for Provider<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Debug for Provider<T> {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Provider").field(&self.key).finish()
    }
}

impl<T> Provider<T>
where
    T: ?Sized + Send + Sync + 'static
{
    #[inline]
    pub(crate) fn new(injector: &Injector, key: Key) -> Self {
        Self {
            injector: injector.downgrade(),
            key,
            _marker: PhantomData,
        }
    }

    /// The key this provider resolves
    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Resolves the key from the injector this provider was taken from
    pub fn get(&self) -> Result<Arc<T>, Error> {
        self.injector
            .upgrade()
            .ok_or_else(|| Error::other(format!("injector providing {} was dropped", self.key)))?
            .get_by_key(&self.key)
    }
}

impl<T> FromInjector for Provider<T>
where
    T: ?Sized + Send + Sync + 'static
{
    #[inline]
    fn from_injector(injector: &Injector) -> Result<Self, Error> {
        Ok(Self::new(injector, Key::of::<T>()))
    }

    #[inline]
    fn dependencies(deps: &mut Vec<Key>) {
        deps.push(Key::of::<T>());
    }
}

/// Extracts `T` bound under the qualifier `Q`
///
/// # Example
/// ```
/// use grove::{Injector, Named, Qualifier};
///
/// struct Primary;
///
/// impl Qualifier for Primary {
///     const NAME: &'static str = "primary";
/// }
///
/// let mut builder = Injector::builder();
/// builder.bind_named::<String>("primary").to_instance(String::from("db-1"));
/// builder.bind::<usize>().to_provider(|url: Named<String, Primary>| Ok(url.len()));
///
/// let injector = builder.build().unwrap();
/// assert_eq!(*injector.get::<usize>().unwrap(), 4);
/// ```
pub struct Named<T: ?Sized, Q> {
    inner: Arc<T>,
    _marker: PhantomData<fn() -> Q>,
}

impl<T: ?Sized, Q> Named<T, Q> {
    /// Unwraps the shared pointer
    #[inline]
    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: ?Sized, Q> Clone for Named<T, Q> {
    #[inline]
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _marker: PhantomData }
    }
}

impl<T: ?Sized + Debug, Q> Debug for Named<T, Q> {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Named").field(&self.inner).finish()
    }
}

impl<T: ?Sized, Q> Deref for Named<T, Q> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T, Q> FromInjector for Named<T, Q>
where
    T: ?Sized + Send + Sync + 'static,
    Q: Qualifier
{
    #[inline]
    fn from_injector(injector: &Injector) -> Result<Self, Error> {
        injector
            .get_by_key(&Key::named::<T>(Q::NAME))
            .map(|inner| Self { inner, _marker: PhantomData })
    }

    #[inline]
    fn dependencies(deps: &mut Vec<Key>) {
        deps.push(Key::named::<T>(Q::NAME));
    }
}

/// Implements [`Inject`] for one or more dependency-free types built with [`Default`].
///
/// # Macro Syntax
/// ```ignore
/// injectable! { Type1 Type2 }
/// injectable! { singleton: Type1 Type2 }
/// injectable! { scope("request"): Type1 Type2 }
/// ```
///
/// # Example
/// ```
/// use grove::{injectable, Injector, ScopeTag, Inject};
///
/// #[derive(Default)]
/// struct Clock;
///
/// #[derive(Default)]
/// struct Counter;
///
/// injectable! { singleton: Clock }
/// injectable! { Counter }
///
/// assert_eq!(Clock::scope(), ScopeTag::Singleton);
/// assert_eq!(Counter::scope(), ScopeTag::Unscoped);
///
/// let injector = Injector::builder().build().unwrap();
/// assert!(injector.instance::<Clock>().is_ok());
/// ```
#[macro_export]
macro_rules! injectable {
    (singleton: $($name:ident)*) => {
        $crate::injectable! { @impl $crate::ScopeTag::Singleton; $($name)* }
    };
    (scope($tag:literal): $($name:ident)*) => {
        $crate::injectable! { @impl $crate::ScopeTag::custom($tag); $($name)* }
    };
    (@impl $scope:expr; $($name:ident)*) => {
        $(impl $crate::Inject for $name {
            type Deps = ();

            #[inline]
            fn scope() -> $crate::ScopeTag {
                $scope
            }

            #[inline]
            fn inject(_: ()) -> Result<Self, $crate::Error> {
                Ok(<$name as ::core::default::Default>::default())
            }
        })*
    };
    ($($name:ident)*) => {
        $crate::injectable! { @impl $crate::ScopeTag::Unscoped; $($name)* }
    };
}
