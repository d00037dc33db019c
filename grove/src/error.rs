//! Describes injector construction and resolution errors

use crate::{injector::InjectorId, key::Key};
use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
};

/// Errors raised while building an injector or resolving a key
#[derive(Debug, Clone)]
pub enum Error {
    /// Two declarations at the same injector level target the same key
    DuplicateBinding(Key),

    /// A child declares a key that an ancestor already binds explicitly
    OverlappingBinding {
        /// The overlapping key
        key: Key,
        /// The ancestor that already binds the key
        ancestor: InjectorId,
    },

    /// A binding requires a scope with no registered policy in the ancestor chain
    UnboundScope {
        /// The key of the binding that requires the scope
        key: Key,
        /// The scope name
        scope: Cow<'static, str>,
    },

    /// The same scope name is registered twice at one injector level
    DuplicateScope(Cow<'static, str>),

    /// A construction chain cycles back onto itself
    CircularDependency(Vec<Key>),

    /// The key is bound only in a descendant of the requesting injector
    NotVisible(Key),

    /// No binding exists and none can be synthesized
    UnresolvableKey(Key),

    /// An instance could not be downcast to the requested type
    ResolveFailed(&'static str),

    /// The construction chain is deeper than the configured maximum
    DepthExceeded(usize),

    /// Several construction errors at once
    Creation(Vec<Error>),

    /// A factory or constructor failure
    Other(Cow<'static, str>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateBinding(key) => write!(f, "Injector Error: {key} is bound more than once"),
            Error::OverlappingBinding { key, ancestor } => write!(f, "Injector Error: {key} is already bound in ancestor {ancestor}"),
            Error::UnboundScope { key, scope } => write!(f, "Injector Error: no scope registered for \"{scope}\" required by {key}"),
            Error::DuplicateScope(scope) => write!(f, "Injector Error: scope \"{scope}\" is registered more than once"),
            Error::CircularDependency(chain) => {
                f.write_str("Injector Error: circular dependency: ")?;
                for (i, key) in chain.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" -> ")?;
                    }
                    write!(f, "{key}")?;
                }
                Ok(())
            },
            Error::NotVisible(key) => write!(f, "Injector Error: {key} is bound only in a descendant injector"),
            Error::UnresolvableKey(key) => write!(f, "Injector Error: unable to resolve {key}"),
            Error::ResolveFailed(type_name) => write!(f, "Injector Error: unable to resolve the service: {type_name}"),
            Error::DepthExceeded(depth) => write!(f, "Injector Error: construction depth exceeded {depth}"),
            Error::Creation(errors) => {
                write!(f, "Injector Error: {} construction errors", errors.len())?;
                for err in errors {
                    write!(f, "\n  {err}")?;
                }
                Ok(())
            },
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error::Other`] from a message
    #[inline]
    pub fn other(msg: impl Into<Cow<'static, str>>) -> Self {
        Error::Other(msg.into())
    }

    /// Returns `true` if the error is raised while building an injector
    pub fn is_creation(&self) -> bool {
        matches!(self,
            Error::DuplicateBinding(_)
            | Error::OverlappingBinding { .. }
            | Error::UnboundScope { .. }
            | Error::DuplicateScope(_)
            | Error::Creation(_))
    }

    /// Returns `true` if the error is raised while resolving a key
    #[inline]
    pub fn is_resolution(&self) -> bool {
        !self.is_creation()
    }

    /// Collapses a list of construction errors into a single error
    pub(crate) fn from_many(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Creation(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::Key;

    #[test]
    fn it_displays_cycle_chain() {
        let err = Error::CircularDependency(vec![
            Key::of::<u8>(),
            Key::of::<u16>(),
            Key::of::<u8>(),
        ]);

        assert_eq!(err.to_string(), "Injector Error: circular dependency: u8 -> u16 -> u8");
        assert!(err.is_resolution());
    }

    #[test]
    fn it_collapses_single_error() {
        let err = Error::from_many(vec![Error::DuplicateBinding(Key::of::<u8>())]).unwrap();

        assert!(matches!(err, Error::DuplicateBinding(_)));
        assert!(err.is_creation());
    }

    #[test]
    fn it_collects_many_errors() {
        let err = Error::from_many(vec![
            Error::DuplicateBinding(Key::of::<u8>()),
            Error::DuplicateScope("request".into()),
        ]).unwrap();

        match err {
            Error::Creation(errors) => assert_eq!(errors.len(), 2),
            _ => panic!("Expected Creation error"),
        }
    }

    #[test]
    fn it_returns_none_without_errors() {
        assert!(Error::from_many(Vec::new()).is_none());
    }
}
