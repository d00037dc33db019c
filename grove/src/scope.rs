//! Scope policies that control instance reuse

use crate::{error::Error, instance::Instance, key::Key};
use dashmap::DashMap;
use std::{
    borrow::Cow,
    fmt::{Debug, Display, Formatter},
    sync::{Arc, Mutex, PoisonError, TryLockError},
};

/// Names the scope a binding lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ScopeTag {
    /// No caching, every resolution produces a new instance
    #[default]
    Unscoped,

    /// One instance per key for the lifetime of the owning injector
    Singleton,

    /// A caller-supplied policy registered under this name
    Custom(Cow<'static, str>),
}

impl ScopeTag {
    /// Creates a tag for a custom scope
    #[inline]
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        ScopeTag::Custom(name.into())
    }

    /// Returns `true` if instances of this scope may be reused
    #[inline]
    pub fn is_shareable(&self) -> bool {
        !matches!(self, ScopeTag::Unscoped)
    }

    /// Returns the custom scope name, if any
    #[inline]
    pub fn custom_name(&self) -> Option<&Cow<'static, str>> {
        match self {
            ScopeTag::Custom(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for ScopeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeTag::Unscoped => f.write_str("unscoped"),
            ScopeTag::Singleton => f.write_str("singleton"),
            ScopeTag::Custom(name) => f.write_str(name),
        }
    }
}

/// A policy deciding whether an instance is produced or reused.
///
/// `producer` constructs a fresh instance. A policy that caches must invoke
/// it at most once per key, even under concurrent callers.
///
/// # Example
/// ```
/// use grove::{Error, Instance, Key, ScopePolicy};
///
/// /// Never caches, but counts constructions
/// #[derive(Default)]
/// struct Counting(std::sync::atomic::AtomicUsize);
///
/// impl ScopePolicy for Counting {
///     fn get(
///         &self,
///         _: &Key,
///         producer: &dyn Fn() -> Result<Instance, Error>
///     ) -> Result<Instance, Error> {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         producer()
///     }
/// }
/// ```
pub trait ScopePolicy: Send + Sync + 'static {
    /// Returns an instance for `key`, calling `producer` if needed
    fn get(
        &self,
        key: &Key,
        producer: &dyn Fn() -> Result<Instance, Error>
    ) -> Result<Instance, Error>;
}

/// A policy that never caches
#[derive(Debug, Default, Clone, Copy)]
pub struct Unscoped;

impl ScopePolicy for Unscoped {
    #[inline]
    fn get(
        &self,
        _: &Key,
        producer: &dyn Fn() -> Result<Instance, Error>
    ) -> Result<Instance, Error> {
        producer()
    }
}

/// Per-key slot, empty until its first successful construction
#[derive(Default)]
struct Slot(Mutex<Option<Instance>>);

/// A keyed instance cache holding at most one instance per [`Key`].
///
/// Callers of the same key serialize around its first construction, callers
/// of different keys never contend. A failed construction leaves the key
/// empty so that a later call may retry.
///
/// Every injector uses one of these for its singletons. It is also a ready
/// made policy for custom scopes:
///
/// # Example
/// ```
/// use grove::{Injector, ScopeCache, ScopeTag};
///
/// #[derive(Default)]
/// struct Session;
///
/// let mut builder = Injector::builder();
/// builder.bind_scope("session", ScopeCache::new());
/// builder.bind::<Session>()
///     .to_provider(Session::default)
///     .in_scope(ScopeTag::custom("session"));
///
/// let injector = builder.build().unwrap();
/// let a = injector.get::<Session>().unwrap();
/// let b = injector.get::<Session>().unwrap();
///
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Default)]
pub struct ScopeCache {
    slots: DashMap<Key, Arc<Slot>>,
}

impl Debug for ScopeCache {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache")
            .field("len", &self.len())
            .finish()
    }
}

impl ScopeCache {
    /// Creates an empty cache
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached instances
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    /// Returns `true` if nothing is cached yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if an instance for `key` is cached
    #[inline]
    pub fn contains(&self, key: &Key) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.value().get().is_some())
    }

    /// Evicts whatever is cached for `key`
    #[inline]
    pub(crate) fn remove(&self, key: &Key) {
        self.slots.remove(key);
    }

    #[inline]
    fn slot(&self, key: &Key) -> Arc<Slot> {
        // The map guard is dropped here, before the slot is locked
        self.slots
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

impl Slot {
    /// Peeks at the slot without waiting for a construction in progress
    #[inline]
    fn get(&self) -> Option<Instance> {
        match self.0.try_lock() {
            Ok(value) => value.clone(),
            Err(TryLockError::Poisoned(value)) => value.into_inner().clone(),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

impl ScopePolicy for ScopeCache {
    fn get(
        &self,
        key: &Key,
        producer: &dyn Fn() -> Result<Instance, Error>
    ) -> Result<Instance, Error> {
        let slot = self.slot(key);
        // Declared before the lock so that it runs after the lock is released
        let _vacancy = Vacancy { slots: &self.slots, key, slot: &slot };
        let mut value = slot.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(instance) = value.as_ref() {
            return Ok(instance.clone());
        }

        let instance = producer()?;
        *value = Some(instance.clone());
        Ok(instance)
    }
}

/// Evicts a slot that is still empty once its last caller leaves,
/// whether construction failed or panicked
struct Vacancy<'a> {
    slots: &'a DashMap<Key, Arc<Slot>>,
    key: &'a Key,
    slot: &'a Arc<Slot>,
}

impl Drop for Vacancy<'_> {
    fn drop(&mut self) {
        if self.slot.get().is_some() {
            return;
        }
        // One reference is held by the map, the other by this caller
        self.slots.remove_if(self.key, |_, slot| {
            Arc::ptr_eq(slot, self.slot)
                && Arc::strong_count(slot) == 2
                && slot.get().is_none()
        });
    }
}

impl<P: ScopePolicy> ScopePolicy for Arc<P> {
    #[inline]
    fn get(
        &self,
        key: &Key,
        producer: &dyn Fn() -> Result<Instance, Error>
    ) -> Result<Instance, Error> {
        self.as_ref().get(key, producer)
    }
}
