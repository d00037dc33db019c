//! Generic factory for producing bound types

use super::{Error, FromInjector, Injector};
use crate::{binding::ProviderFn, instance::Instance, key::Key};
use std::sync::Arc;

/// A trait that describes a generic factory function
/// whose arguments are extracted from an injector
pub trait GenericFactory<Args>: Send + Sync + 'static {
    /// A type of object that will be produced
    type Output;

    /// Calls a generic function and returns either produced object or error
    fn call(&self, args: Args) -> Result<Self::Output, Error>;
}

impl<F, R> GenericFactory<()> for F
where
    F: Fn() -> R + Send + Sync + 'static
{
    type Output = R;

    #[inline]
    fn call(&self, _: ()) -> Result<Self::Output, Error> {
        Ok(self())
    }
}

macro_rules! define_generic_factory ({ $($param:ident)* } => {
    impl<F, R, $($param,)*> GenericFactory<($($param,)*)> for F
    where
        F: Fn($($param),*) -> Result<R, Error> + Send + Sync + 'static,
    {
        type Output = R;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Result<Self::Output, Error> {
            (self)($($param,)*)
        }
    }
});

define_generic_factory! { T1 }
define_generic_factory! { T1 T2 }
define_generic_factory! { T1 T2 T3 }
define_generic_factory! { T1 T2 T3 T4 }
define_generic_factory! { T1 T2 T3 T4 T5 }

/// Erases a factory producing owned values
#[inline]
pub(crate) fn make_provider_fn<T, F, Args>(factory: F) -> (ProviderFn, Vec<Key>)
where
    T: Send + Sync + 'static,
    F: GenericFactory<Args, Output = T>,
    Args: FromInjector
{
    let provider: ProviderFn = Arc::new(move |injector: &Injector| {
        let args = Args::from_injector(injector)?;
        factory.call(args).map(Instance::from_value)
    });
    (provider, dependencies_of::<Args>())
}

/// Erases a factory producing shared pointers, possibly to trait objects
#[inline]
pub(crate) fn make_shared_provider_fn<T, F, Args>(factory: F) -> (ProviderFn, Vec<Key>)
where
    T: ?Sized + Send + Sync + 'static,
    F: GenericFactory<Args, Output = Arc<T>>,
    Args: FromInjector
{
    let provider: ProviderFn = Arc::new(move |injector: &Injector| {
        let args = Args::from_injector(injector)?;
        factory.call(args).map(Instance::new)
    });
    (provider, dependencies_of::<Args>())
}

#[inline]
fn dependencies_of<Args: FromInjector>() -> Vec<Key> {
    let mut deps = Vec::new();
    Args::dependencies(&mut deps);
    deps
}
