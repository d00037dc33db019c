//! Per-injector table of explicit bindings

use super::Binding;
use crate::{error::Error, key::Key};
use std::{collections::HashMap, sync::Arc};

/// A sealed lookup table over the explicit bindings of one injector level.
///
/// Keys are unique within a store; the table never changes after construction.
#[derive(Debug, Default)]
pub struct BindingStore {
    bindings: HashMap<Key, Arc<Binding>>,
}

impl BindingStore {
    /// Builds a store from the bindings declared for one injector level.
    ///
    /// Fails with [`Error::DuplicateBinding`] for every key declared more than once.
    pub fn new(bindings: impl IntoIterator<Item = Binding>) -> Result<Self, Error> {
        let mut store = HashMap::new();
        let mut errors = Vec::new();
        for binding in bindings {
            let key = binding.key().clone();
            if store.contains_key(&key) {
                if !errors.iter().any(|err| matches!(err, Error::DuplicateBinding(k) if *k == key)) {
                    errors.push(Error::DuplicateBinding(key));
                }
                continue;
            }
            store.insert(key, Arc::new(binding));
        }

        match Error::from_many(errors) {
            Some(err) => Err(err),
            None => Ok(Self { bindings: store }),
        }
    }

    /// Returns the binding declared at this level for `key`
    #[inline]
    pub fn lookup_local(&self, key: &Key) -> Option<&Arc<Binding>> {
        self.bindings.get(key)
    }

    /// Returns `true` if `key` is declared at this level
    #[inline]
    pub fn contains(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    /// Iterates over all bindings of this level
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.values()
    }

    /// Number of bindings at this level
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if this level declares nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
