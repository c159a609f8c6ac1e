//! The process-wide registry and its access function.

use crate::registry::Registry;
use once_cell::sync::Lazy;

// Created on first access in a thread-safe manner and never dropped.
static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Provides a reference to the process-wide registry.
///
/// Container types declared here can be looked up from anywhere in the
/// application, which is what the [`inject!`](crate::inject) macros use.
///
/// # Examples
///
/// ```
/// use fibre_inject::{global, Injectable};
///
/// fn declare_settings() -> fibre_inject::Result<()> {
///   let mut settings = global().declare("GlobalDocSettings");
///   settings.bind("greeting", Injectable::constant(String::from("Hello from global!")))?;
///   settings.finish()?;
///   Ok(())
/// }
/// # declare_settings().unwrap();
/// ```
pub fn global() -> &'static Registry {
  &GLOBAL_REGISTRY
}
