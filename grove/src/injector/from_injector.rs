//! Extractors for fetching dependencies from an injector

use super::{Error, Injector};
use crate::key::Key;
use std::sync::Arc;

/// A trait that defines how to extract `Self` from an injector.
///
/// Besides extracting, an extractor reports the keys it depends on, which is
/// what makes a constructible shape inspectable without constructing it.
pub trait FromInjector: Sized + Send + Sync {
    /// Extracts `Self` from the injector
    fn from_injector(injector: &Injector) -> Result<Self, Error>;

    /// Appends the keys this extractor resolves
    #[inline]
    fn dependencies(_: &mut Vec<Key>) {}
}

impl FromInjector for Injector {
    #[inline]
    fn from_injector(injector: &Injector) -> Result<Self, Error> {
        Ok(injector.clone())
    }
}

impl FromInjector for () {
    #[inline]
    fn from_injector(_: &Injector) -> Result<Self, Error> {
        Ok(())
    }
}

impl<T> FromInjector for Arc<T>
where
    T: ?Sized + Send + Sync + 'static
{
    #[inline]
    fn from_injector(injector: &Injector) -> Result<Self, Error> {
        injector.get::<T>()
    }

    #[inline]
    fn dependencies(deps: &mut Vec<Key>) {
        deps.push(Key::of::<T>());
    }
}

macro_rules! define_generic_from_injector {
    ($($T: ident),*) => {
        impl<$($T: FromInjector),+> FromInjector for ($($T,)+) {
            #[inline]
            #[allow(non_snake_case)]
            fn from_injector(injector: &Injector) -> Result<Self, Error> {
                let tuple = (
                    $(
                    $T::from_injector(injector)?,
                    )*
                );
                Ok(tuple)
            }

            #[inline]
            fn dependencies(deps: &mut Vec<Key>) {
                $(
                $T::dependencies(deps);
                )*
            }
        }
    }
}

define_generic_from_injector! { T1 }
define_generic_from_injector! { T1, T2 }
define_generic_from_injector! { T1, T2, T3 }
define_generic_from_injector! { T1, T2, T3, T4 }
define_generic_from_injector! { T1, T2, T3, T4, T5 }
define_generic_from_injector! { T1, T2, T3, T4, T5, T6 }
define_generic_from_injector! { T1, T2, T3, T4, T5, T6, T7 }
define_generic_from_injector! { T1, T2, T3, T4, T5, T6, T7, T8 }

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Dependency {
        x: i32
    }

    #[test]
    fn it_resolves_from_injector() {
        let mut builder = Injector::builder();
        builder.bind::<Dependency>().to_provider(|| Dependency { x: 1 });

        let injector = builder.build().unwrap();

        let dependency = Arc::<Dependency>::from_injector(&injector).unwrap();

        assert_eq!(dependency.x, 1);
    }

    #[test]
    fn it_resolves_from_injector_with_error() {
        let injector = Injector::builder().build().unwrap();

        let err = Arc::<Dependency>::from_injector(&injector).unwrap_err();

        assert_eq!(err.to_string(), "Injector Error: unable to resolve grove::injector::from_injector::tests::Dependency");
    }

    #[test]
    fn it_collects_tuple_dependencies() {
        let mut deps = Vec::new();
        <(Arc<u8>, Injector, Arc<str>)>::dependencies(&mut deps);

        assert_eq!(deps, vec![Key::of::<u8>(), Key::of::<str>()]);
    }

    #[test]
    fn it_extracts_owning_injector() {
        let injector = Injector::builder().build().unwrap();

        let extracted = Injector::from_injector(&injector).unwrap();

        assert_eq!(extracted.id(), injector.id());
    }
}
