//! # Grove
//!
//! > Hierarchical dependency-binding resolution with trees of scoped injectors.
//!
//! ## Features
//! * Trees of injectors: children see everything their ancestors bind, never the other way round
//! * Singleton, unscoped and custom scopes with at-most-once construction under concurrency
//! * Just-in-time bindings from constructible types, promoted to the highest injector able to build them
//! * Eager validation of overlapping bindings and unregistered scopes
//! * Cycle detection at resolution time
//!
//! ## Example
//! ```
//! use grove::{Error, Inject, Injector, ScopeTag};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! impl Inject for English {
//!     type Deps = ();
//!
//!     fn scope() -> ScopeTag {
//!         ScopeTag::Singleton
//!     }
//!
//!     fn inject(_: ()) -> Result<Self, Error> {
//!         Ok(English)
//!     }
//! }
//!
//! let root = Injector::builder().build().unwrap();
//!
//! let mut child = root.child_builder();
//! child.bind::<dyn Greeter>().to::<English, _>(|e| e);
//! let child = child.build().unwrap();
//!
//! assert_eq!(child.get::<dyn Greeter>().unwrap().greet(), "hello");
//! assert!(matches!(root.get::<dyn Greeter>(), Err(Error::NotVisible(_))));
//! ```

pub use crate::{
    binding::{Binding, BindingStore, Link, ModuleId, Origin, Recipe, Strategy},
    error::Error,
    inject::{Inject, Named, Provider},
    injector::{
        BindingDeclaration,
        Declaration,
        FromInjector,
        GenericFactory,
        Injector,
        InjectorBuilder,
        InjectorConfig,
        InjectorId,
        Module,
        Stage,
        build_injector,
    },
    instance::Instance,
    key::{Key, Qualifier},
    scope::{ScopeCache, ScopePolicy, ScopeTag, Unscoped},
};

#[cfg(feature = "macros")]
pub use grove_macros::Inject;

mod resolver;

pub mod binding;
pub mod error;
pub mod inject;
pub mod injector;
pub mod instance;
pub mod key;
pub mod scope;
