// inject/tests/macros.rs

//! Tests specifically for the injection macros.
//! This file verifies the behavior of:
//! - `inject!` and `maybe_inject!` against the global registry
//! - `inject_from!` and `maybe_inject_from!` against a local `Registry`

use fibre_inject::{global, inject, inject_from, maybe_inject, maybe_inject_from, Args, Injectable, Registry};
use pretty_assertions::assert_eq;

// --- Test Fixtures ---

struct MacroTestService {
  value: i32,
}

/// Declares and initializes a container with a `service` and a `doubled` injectable.
fn declare_initialized(registry: &Registry, name: &str) -> (Injectable, Injectable) {
  let mut decl = registry.declare(name);
  let service = decl
    .bind("service", Injectable::from_fn(|| MacroTestService { value: 42 }))
    .unwrap();
  let doubled = decl
    .bind(
      "doubled",
      Injectable::new(|args: &Args| Ok(args.get::<MacroTestService>(0)?.value * 2)).arg(&service),
    )
    .unwrap();
  let container = decl.finish().unwrap();
  registry.instantiate(&container).unwrap().initialize().unwrap();
  (service, doubled)
}

// --- Global Macro Tests ---

#[test]
fn test_maybe_inject_global() {
  // Arrange
  let (service, doubled) = declare_initialized(global(), "MaybeInjectGlobal");
  let loose = Injectable::constant(1_u8);

  // Act & Assert: Success cases
  assert_eq!(maybe_inject!(service, MacroTestService).unwrap().value, 42);
  assert_eq!(*maybe_inject!(doubled, i32).unwrap(), 84);
  assert!(maybe_inject!(doubled).is_some());

  // Act & Assert: Failure cases
  assert!(maybe_inject!(doubled, String).is_none());
  assert!(maybe_inject!(loose, u8).is_none());
  assert!(maybe_inject!(loose).is_none());
}

#[test]
fn test_inject_global() {
  let (service, doubled) = declare_initialized(global(), "InjectGlobal");

  assert_eq!(inject!(service, MacroTestService).value, 42);
  assert_eq!(*inject!(doubled, i32), 84);
  assert_eq!(*inject!(doubled).downcast::<i32>().unwrap(), 84);
}

#[test]
#[should_panic(expected = "Failed to inject required value unbound Injectable(u8) as u8")]
fn test_inject_panics_on_unbound() {
  let loose = Injectable::constant(1_u8);
  let _ = inject!(loose, u8);
}

#[test]
#[should_panic(expected = "Container: InjectUninitialized is not initialized")]
fn test_inject_panics_on_uninitialized_owner() {
  let mut decl = global().declare("InjectUninitialized");
  let port = decl.bind("port", Injectable::constant(8080_u16)).unwrap();
  decl.finish().unwrap();

  let _ = inject!(port);
}

// --- Local Registry Macro Tests ---

#[test]
fn test_maybe_inject_from_local() {
  // Arrange
  let registry = Registry::new();
  let (service, doubled) = declare_initialized(&registry, "MaybeInjectLocal");

  // Act & Assert
  assert_eq!(maybe_inject_from!(registry, service, MacroTestService).unwrap().value, 42);
  assert_eq!(*maybe_inject_from!(registry, doubled, i32).unwrap(), 84);
  // Local declarations never leak into the global registry.
  assert!(maybe_inject!(doubled, i32).is_none());
  assert!(!global().contains("MaybeInjectLocal"));
}

#[test]
fn test_inject_from_local() {
  let registry = Registry::new();
  let (_, doubled) = declare_initialized(&registry, "InjectLocal");

  assert_eq!(*inject_from!(registry, doubled, i32), 84);
  assert_eq!(*inject_from!(&registry, doubled.clone(), i32), 84);
}

#[test]
#[should_panic(expected = "Failed to inject required value Injectable(i32) bound to InjectLocalMismatch.doubled as alloc::string::String")]
fn test_inject_from_panics_on_type_mismatch() {
  let registry = Registry::new();
  let (_, doubled) = declare_initialized(&registry, "InjectLocalMismatch");

  let _ = inject_from!(registry, doubled, String);
}
