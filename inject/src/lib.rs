//! # Fibre Inject
//!
//! A minimal, declarative dependency-injection framework for Rust.
//!
//! Values are declared as [`Injectable`]s on a container type: a factory plus
//! the arguments it is called with. Arguments can be literals, other
//! injectables (of the same or of another container type) or attributes read
//! lazily off another injectable's value. Nothing is constructed until a
//! container instance is initialized, and then every value is built exactly
//! once, in declaration order.
//!
//! ## Core Concepts
//!
//! - **Registry**: owns the declared container types, the global declaration
//!   counter and the list of initialized instances. The process-wide one is
//!   available through [`global()`]; tests use `Registry::new()`.
//! - **Container type**: declared through [`Registry::declare`], frozen by
//!   [`ContainerDecl::finish`] and immutable afterwards.
//! - **Binding**: attaching an injectable to a container type under a name.
//!   An injectable can be bound only once.
//! - **Initialization**: [`ContainerInstance::initialize`] resolves every
//!   injectable and publishes the instance for cross-container lookups.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_inject::{Args, Injectable, Registry};
//!
//! # fn main() -> fibre_inject::Result<()> {
//! let registry = Registry::new();
//!
//! let mut settings = registry.declare("Settings");
//! let base = settings.bind("base", Injectable::constant(100_i64))?;
//! let settings = settings.finish()?;
//!
//! let mut services = registry.declare("Services");
//! let scaled = services.bind(
//!   "scaled",
//!   Injectable::new(|args: &Args| Ok(args.get::<i64>(0)? * args.get::<i64>(1)?))
//!     .arg(&base)
//!     .value(5_i64),
//! )?;
//! let services = services.finish()?;
//!
//! // `Settings` must be initialized before anything that depends on it.
//! registry.instantiate(&settings)?.initialize()?;
//!
//! let instance = registry.instantiate(&services)?;
//! instance.initialize()?;
//!
//! assert_eq!(*instance.get::<i64>("scaled")?, 500);
//! assert_eq!(*registry.resolve::<i64>(&scaled)?, 500);
//! # Ok(())
//! # }
//! ```

mod container;
mod core;
mod error;
mod global;
mod injectable;
mod macros;
mod registry;

pub use crate::core::Value;
pub use container::{ContainerDecl, ContainerId, ContainerInstance, ContainerType};
pub use error::{Error, Result};
pub use global::global;
pub use injectable::{Arg, Args, Injectable, LazyAttribute};
pub use registry::{InstancePolicy, Registry, RegistryBuilder};
