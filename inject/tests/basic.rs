use fibre_inject::{Args, Error, Injectable, Registry};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// --- Test Fixtures ---

#[derive(Debug, PartialEq, Eq)]
struct SimpleService {
  id: u32,
}

fn multiply(args: &Args) -> fibre_inject::Result<i64> {
  Ok(args.get::<i64>(0)? * args.get::<i64>(1)?)
}

// --- Binding ---

#[test]
fn test_unbound_injectable() {
  let foo = Injectable::constant(123_i64);

  assert!(!foo.is_bound());
  assert_eq!(foo.name(), None);
  assert_eq!(foo.sequence_index(), None);
  assert!(foo.owner().is_none());
}

#[test]
fn test_binding_assigns_name_owner_and_index() {
  // Arrange
  let registry = Registry::new();
  let foo = Injectable::constant(123_i64);

  // Act
  let mut decl = registry.declare("BindingContainer");
  let bound = decl.bind("foo", foo.clone()).unwrap();
  let container = decl.finish().unwrap();

  // Assert
  assert!(bound.ptr_eq(&foo));
  assert_eq!(foo.name(), Some("foo"));
  assert!(foo.sequence_index().is_some());
  assert_eq!(foo.owner(), Some(container.id()));
  assert_eq!(format!("{:?}", foo), "Injectable(i64) bound to BindingContainer.foo");
}

#[test]
fn test_cannot_reuse_injectable_in_more_than_one_container() {
  // Arrange
  let registry = Registry::new();
  let shared = Injectable::constant(123_i64);

  let mut first = registry.declare("FirstOwner");
  first.bind("foo", shared.clone()).unwrap();
  let first = first.finish().unwrap();
  let index = shared.sequence_index();

  // Act
  let mut second = registry.declare("SecondOwner");
  let err = second.bind("foo", shared.clone()).unwrap_err();

  // Assert
  assert!(matches!(
    err,
    Error::AlreadyBound { ref container, ref name } if container == "FirstOwner" && name == "foo"
  ));
  assert!(err.to_string().contains("Injectable is already bound to a Container"));
  // The original binding is untouched.
  assert_eq!(shared.owner(), Some(first.id()));
  assert_eq!(shared.sequence_index(), index);
}

#[test]
fn test_sequence_indexes_are_unique_and_follow_declaration_order() {
  // Arrange
  let registry = Registry::new();
  let mut a = registry.declare("OrderA");
  let a1 = a.bind("one", Injectable::constant(1_u8)).unwrap();
  let mut b = registry.declare("OrderB");
  let b1 = b.bind("one", Injectable::constant(1_u8)).unwrap();
  let a2 = a.bind("two", Injectable::constant(2_u8)).unwrap();

  // Act
  let indexes: Vec<u64> = [&a1, &b1, &a2].iter().map(|i| i.sequence_index().unwrap()).collect();

  // Assert
  // Order reflects declarations across all containers, not within one.
  assert!(indexes[0] < indexes[1]);
  assert!(indexes[1] < indexes[2]);
}

#[test]
fn test_duplicate_name_in_one_declaration_leaves_injectable_unbound() {
  let registry = Registry::new();
  let mut decl = registry.declare("DuplicateNames");
  decl.bind("foo", Injectable::constant(1_u8)).unwrap();

  let second = Injectable::constant(2_u8);
  let err = decl.bind("foo", second.clone()).unwrap_err();

  assert!(matches!(err, Error::DuplicateAttribute { .. }));
  assert!(!second.is_bound());
}

// --- Resolution ---

#[test]
fn test_injectable_is_initialized_on_first_access_only() {
  // Arrange
  let registry = Registry::new();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();

  let mut decl = registry.declare("FirstAccess");
  let foo = decl
    .bind(
      "foo",
      Injectable::new(move |args: &Args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(*args.get::<i64>(0)?)
      })
      .value(123_i64),
    )
    .unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();

  // Assert: nothing runs before the first access.
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert!(instance.cached("foo").is_none());

  // Act
  assert_eq!(*instance.get::<i64>("foo").unwrap(), 123);
  assert_eq!(*instance.get::<i64>("foo").unwrap(), 123);
  assert_eq!(*foo.get_from::<i64>(&instance).unwrap(), 123);

  // Assert
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_resolving_twice_returns_the_identical_value() {
  let registry = Registry::new();
  let mut decl = registry.declare("Identity");
  decl.bind("service", Injectable::from_fn(|| SimpleService { id: 101 })).unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();

  let r1 = instance.get::<SimpleService>("service").unwrap();
  let r2 = instance.get::<SimpleService>("service").unwrap();

  assert_eq!(r1.id, 101);
  assert!(Arc::ptr_eq(&r1, &r2));
}

#[test]
fn test_each_instance_gets_its_own_value() {
  let registry = Registry::new();
  let mut decl = registry.declare("PerInstance");
  decl.bind("service", Injectable::from_fn(|| SimpleService { id: 7 })).unwrap();
  let container = decl.finish().unwrap();

  let first = registry.instantiate(&container).unwrap();
  let second = registry.instantiate(&container).unwrap();

  let a = first.get::<SimpleService>("service").unwrap();
  let b = second.get::<SimpleService>("service").unwrap();
  assert_eq!(*a, *b);
  assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_keyword_arguments_reach_the_factory() {
  // Arrange
  let registry = Registry::new();
  let mut decl = registry.declare("Keywords");
  decl
    .bind(
      "bar",
      Injectable::new(|args: &Args| {
        let mut map = HashMap::new();
        map.insert("a", args.kwarg::<i32>("a")?.to_string());
        map.insert("b", args.kwarg::<&str>("b")?.to_string());
        Ok(map)
      })
      .kwarg_value("a", 1_i32)
      .kwarg_value("b", "hi"),
    )
    .unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();

  // Act
  let bar = instance.get::<HashMap<&str, String>>("bar").unwrap();

  // Assert
  let expected: HashMap<&str, String> = [("a", "1".to_string()), ("b", "hi".to_string())].into_iter().collect();
  assert_eq!(*bar, expected);
}

#[test]
fn test_intra_container_forward_reference() {
  // Arrange
  let registry = Registry::new();
  let mut decl = registry.declare("ForwardReference");
  let x = decl.bind("x", Injectable::constant(100_i64)).unwrap();
  decl
    .bind("y", Injectable::new(multiply).arg(&x).value(5_i64))
    .unwrap();
  let container = decl.finish().unwrap();

  // Act: resolving `y` on a fresh instance pulls `x` from the same instance.
  let instance = registry.instantiate(&container).unwrap();
  let y = instance.get::<i64>("y").unwrap();

  // Assert
  assert_eq!(*y, 500);
  assert_eq!(instance.resolved_names(), vec!["x", "y"]);
  assert!(!instance.is_initialized());
}

#[test]
fn test_type_mismatch_and_unknown_names() {
  let registry = Registry::new();
  let mut decl = registry.declare("Lookups");
  decl.bind("foo", Injectable::constant(1_i64)).unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();

  assert!(matches!(
    instance.get::<String>("foo"),
    Err(Error::TypeMismatch { expected, .. }) if expected == std::any::type_name::<String>()
  ));
  assert!(matches!(instance.value("bar"), Err(Error::UnknownInjectable { .. })));
}

#[test]
fn test_unbound_injectable_cannot_be_resolved() {
  let registry = Registry::new();
  let loose = Injectable::constant(1_u8);

  // As a dependency.
  let mut decl = registry.declare("LooseDependency");
  decl.bind("uses_loose", Injectable::new(|args: &Args| Ok(*args.get::<u8>(0)?)).arg(&loose)).unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();
  assert!(matches!(instance.value("uses_loose"), Err(Error::Unbound)));

  // Directly.
  assert!(matches!(registry.resolve_value(&loose), Err(Error::Unbound)));
  assert!(matches!(loose.get_from::<u8>(&instance), Err(Error::Unbound)));
}

#[test]
fn test_factory_errors_propagate_and_nothing_is_memoized() {
  // Arrange
  let registry = Registry::new();
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let mut decl = registry.declare("Flaky");
  decl
    .bind(
      "flaky",
      Injectable::new(move |_: &Args| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
          return Err(Error::factory("connection refused"));
        }
        Ok(42_u32)
      }),
    )
    .unwrap();
  let container = decl.finish().unwrap();
  let instance = registry.instantiate(&container).unwrap();

  // Act & Assert
  let err = instance.value("flaky").unwrap_err();
  assert_eq!(err.to_string(), "Factory failed: connection refused");
  assert!(instance.cached("flaky").is_none());

  assert_eq!(*instance.get::<u32>("flaky").unwrap(), 42);
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
