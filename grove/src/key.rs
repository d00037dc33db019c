//! Keys that identify a requested dependency

use std::{
    any::TypeId,
    borrow::Cow,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

/// Identifies a dependency: a type plus an optional qualifier.
///
/// Two keys are the same dependency iff both the type and the qualifier match.
/// The type name is carried for diagnostics only.
///
/// # Example
/// ```
/// use grove::Key;
///
/// trait Storage: Send + Sync {}
///
/// let a = Key::of::<dyn Storage>();
/// let b = Key::named::<dyn Storage>("primary");
///
/// assert_ne!(a, b);
/// assert_eq!(b, Key::of::<dyn Storage>().with_qualifier("primary"));
/// ```
#[derive(Clone)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Cow<'static, str>>,
}

impl Key {
    /// Creates an unqualified key for `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// Creates a key for `T` qualified with `qualifier`
    #[inline]
    pub fn named<T: ?Sized + 'static>(qualifier: impl Into<Cow<'static, str>>) -> Self {
        Self::of::<T>().with_qualifier(qualifier)
    }

    /// Returns a copy of this key with the given qualifier
    #[inline]
    pub fn with_qualifier(mut self, qualifier: impl Into<Cow<'static, str>>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Returns the [`TypeId`] of the requested type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the name of the requested type
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the qualifier, if any
    #[inline]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Checks whether this key refers to `T`, ignoring the qualifier
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} @ \"{qualifier}\"", self.type_name),
            None => f.write_str(self.type_name),
        }
    }
}

impl Debug for Key {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({self})")
    }
}

/// A type-level qualifier name.
///
/// Used together with [`Named`](crate::Named) to depend on a qualified key
/// from a constructible shape.
///
/// # Example
/// ```
/// use grove::Qualifier;
///
/// struct Primary;
///
/// impl Qualifier for Primary {
///     const NAME: &'static str = "primary";
/// }
/// ```
pub trait Qualifier: Send + Sync + 'static {
    /// The qualifier value
    const NAME: &'static str;
}
