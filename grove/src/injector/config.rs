//! Injector configuration

const DEFAULT_MAX_DEPTH: usize = 128;

/// Controls when singletons are constructed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    /// Singletons are constructed lazily on first resolution
    #[default]
    Development,

    /// Every explicit singleton declared at an injector level is constructed
    /// while that injector is built, so construction failures surface early
    Production,
}

/// Represents an injector configuration.
///
/// A child injector inherits the configuration of its parent unless its
/// builder overrides it.
#[derive(Debug, Clone, Copy)]
pub struct InjectorConfig {
    /// Specifies when singletons are constructed
    ///
    /// Default: [`Stage::Development`]
    stage: Stage,

    /// Specifies whether bindings may be synthesized just in time
    ///
    /// Default: `true`
    jit: bool,

    /// Maximum depth of a nested construction chain
    ///
    /// Default: `128`
    max_depth: usize,
}

impl Default for InjectorConfig {
    #[inline]
    fn default() -> Self {
        Self {
            stage: Stage::Development,
            jit: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl InjectorConfig {
    /// Creates a default injector configuration
    ///
    /// Defaults:
    /// - stage: [`Stage::Development`]
    /// - jit: `true`
    /// - max_depth: `128`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the stage
    ///
    /// Default: [`Stage::Development`]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Requires an explicit binding for every resolved key
    ///
    /// Default: just-in-time bindings are allowed
    pub fn without_jit(mut self) -> Self {
        self.jit = false;
        self
    }

    /// Allows just-in-time bindings
    pub fn with_jit(mut self) -> Self {
        self.jit = true;
        self
    }

    /// Configures the maximum depth of a nested construction chain
    ///
    /// Default: `128`
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the stage
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns `true` if just-in-time bindings are allowed
    #[inline]
    pub fn jit(&self) -> bool {
        self.jit
    }

    /// Returns the maximum construction depth
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
