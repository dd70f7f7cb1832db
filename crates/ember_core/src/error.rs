//! # Core Error Types
//!
//! Errors for setup-time operations: type registration, cache registration
//! and configuration. Hot-path contract violations are assertions, not
//! error values.

use thiserror::Error;

/// Errors that can occur while setting up a scene.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A component type declared an id outside the mask width.
    #[error("component `{name}` has id {id}, limit is {}", crate::ecs::MAX_COMPONENTS)]
    ComponentIdOutOfRange {
        /// The offending id.
        id: u8,
        /// Name of the component type.
        name: &'static str,
    },

    /// Two different component types declared the same id.
    #[error("component id {id} is held by `{existing}`, cannot register `{requested}`")]
    ComponentIdTaken {
        /// The contested id.
        id: u8,
        /// Type already registered under the id.
        existing: &'static str,
        /// Type that tried to register.
        requested: &'static str,
    },

    /// A cache filter names a component type the scene does not know.
    #[error("cache filter requires unregistered component id {0}")]
    UnregisteredFilterComponent(u8),

    /// Every cache membership bit is in use.
    #[error("cache limit reached: {0} caches already registered")]
    CacheLimitReached(usize),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
}

/// Result type for core setup operations.
pub type CoreResult<T> = Result<T, CoreError>;
