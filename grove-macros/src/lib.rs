//! Proc-Macros implementations for grove
//!

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod inject;

/// Implements the `Inject` trait for a struct whose fields are extractors
///
/// Every field is extracted from the owning injector, so its type must
/// implement `FromInjector` (`Arc<T>`, `Named<T, Q>`, `Provider<T>`, `Injector`).
/// Fields marked `#[inject(default)]` are built with [`Default`] instead.
/// The struct may carry its scope with `#[inject(singleton)]` or `#[inject(scope = "name")]`.
///
/// # Example
/// ```ignore
/// use grove::{Inject, Injector};
/// use std::sync::Arc;
///
/// #[derive(Inject)]
/// #[inject(singleton)]
/// struct Clock;
///
/// #[derive(Inject)]
/// struct Scheduler {
///     clock: Arc<Clock>,
///     #[inject(default)]
///     ticks: u64,
/// }
///
/// // This expands to:
/// // impl Inject for Scheduler {
/// //     type Deps = (Arc<Clock>,);
/// //
/// //     fn scope() -> ScopeTag {
/// //         ScopeTag::Unscoped
/// //     }
/// //
/// //     fn inject((clock,): Self::Deps) -> Result<Self, Error> {
/// //         Ok(Self { clock, ticks: Default::default() })
/// //     }
/// // }
/// ```
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    inject::expand_inject(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
