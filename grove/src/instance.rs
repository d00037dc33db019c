//! Type-erased instances produced by the injector

use std::{
    any::Any,
    fmt::{Debug, Formatter},
    sync::Arc,
};

type ArcService = Arc<
    dyn Any
    + Send
    + Sync
>;

/// A type-erased handle to a resolved instance.
///
/// The handle always wraps an `Arc<T>`, so `T` may be a trait object and
/// reference identity survives caching, linking and downcasting.
#[derive(Clone)]
pub struct Instance {
    service: ArcService,
    addr: usize,
}

impl Debug for Instance {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Instance(..)")
    }
}

impl Instance {
    /// Wraps a shared pointer
    #[inline]
    pub fn new<T>(service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static
    {
        let addr = Arc::as_ptr(&service).cast::<()>() as usize;
        Self { service: Arc::new(service), addr }
    }

    /// Wraps an owned value
    #[inline]
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Returns the shared pointer if the instance holds a `T`
    #[inline]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static
    {
        self.service
            .downcast_ref::<Arc<T>>()
            .cloned()
    }

    /// Checks whether both handles refer to the very same instance.
    ///
    /// Compares the address of the wrapped value, so an instance and its
    /// upcast to a trait object are equal.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

#[cfg(test)]
mod tests {
    use super::Instance;
    use std::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn it_downcasts_values() {
        let instance = Instance::from_value(42_u32);

        assert_eq!(*instance.downcast::<u32>().unwrap(), 42);
        assert!(instance.downcast::<u64>().is_none());
    }

    #[test]
    fn it_downcasts_trait_objects() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(greeter);

        assert_eq!(instance.downcast::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn it_preserves_identity() {
        let instance = Instance::from_value(String::from("value"));
        let clone = instance.clone();

        assert!(instance.ptr_eq(&clone));
        assert!(Arc::ptr_eq(
            &instance.downcast::<String>().unwrap(),
            &clone.downcast::<String>().unwrap()
        ));
        assert!(!instance.ptr_eq(&Instance::from_value(String::from("value"))));
    }

    #[test]
    fn it_keeps_identity_across_upcast() {
        let english = Arc::new(English);
        let concrete = Instance::new(english.clone());
        let upcast = Instance::new(english as Arc<dyn Greeter>);

        assert!(concrete.ptr_eq(&upcast));
    }
}
