use thiserror::Error;

/// The error type for declaring, binding and resolving injectables.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Injectable is already bound to a Container: {container}.{name}")]
  AlreadyBound { container: String, name: String },

  #[error("Injectables must be owned by a Container of this registry, not {container}")]
  NotAContainer { container: String },

  #[error("Cannot create container with duplicate name: {container}")]
  DuplicateContainer { container: String },

  #[error("Container {container} already declares an attribute named '{name}'")]
  DuplicateAttribute { container: String, name: String },

  #[error("{container} cannot be instantiated directly - it must be subclassed")]
  AbstractInstantiation { container: String },

  #[error("Container already initialized: {container}")]
  AlreadyInitialized { container: String },

  #[error("Container {container} already has an initialized instance")]
  DuplicateInstance { container: String },

  #[error("Container: {container} is not initialized")]
  Uninitialized { container: String },

  #[error("Injectable is not bound to a Container")]
  Unbound,

  #[error("Container {container} has no injectable named '{name}'")]
  UnknownInjectable { container: String, name: String },

  #[error("Injectable {container}.{name} does not hold a value of type {expected}")]
  TypeMismatch {
    container: String,
    name: String,
    expected: &'static str,
  },

  #[error("Cannot read attribute '{attribute}' of {container}.{name}: value is not a {expected}")]
  Attribute {
    container: String,
    name: String,
    attribute: String,
    expected: &'static str,
  },

  #[error("Circular dependency detected while resolving {container}.{name}")]
  CircularDependency { container: String, name: String },

  #[error("Missing factory argument: {0}")]
  MissingArgument(String),

  #[error("Factory argument {argument} is not a {expected}")]
  ArgumentType {
    argument: String,
    expected: &'static str,
  },

  #[error("Factory failed: {0}")]
  Factory(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("The registry owning this container has been dropped")]
  RegistryDropped,
}

impl Error {
  /// Wraps an arbitrary error raised inside a factory.
  pub fn factory<E>(error: E) -> Self
  where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
  {
    Error::Factory(error.into())
  }
}

/// A specialized `Result` type for `fibre_inject` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
