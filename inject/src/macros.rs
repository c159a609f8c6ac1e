//! Public macros for injecting resolved values at call sites.

/// Returns the value of a bound injectable from its owning container's
/// initialized instance in the global registry.
///
/// With a type argument the value is downcast to `Arc<Type>`; without one the
/// type-erased [`Value`](crate::Value) is returned.
///
/// # Panics
///
/// Panics if the injectable is unbound, its container has no initialized
/// instance, or the value has another type. For a non-panicking version, use
/// [`maybe_inject!`] or `global().resolve(...)` directly.
///
/// # Examples
///
/// ```
/// use fibre_inject::{global, inject, Injectable};
///
/// let mut decl = global().declare("InjectDocContainer");
/// let port = decl.bind("port", Injectable::constant(8080_u16)).unwrap();
/// let container = decl.finish().unwrap();
/// global().instantiate(&container).unwrap().initialize().unwrap();
///
/// let port = inject!(port, u16);
/// assert_eq!(*port, 8080);
/// ```
#[macro_export]
macro_rules! inject {
  ($injectable:expr, $type:ty) => {
    $crate::inject_from!($crate::global(), $injectable, $type)
  };

  ($injectable:expr) => {
    $crate::inject_from!($crate::global(), $injectable)
  };
}

/// Like [`inject!`], returning `None` instead of panicking.
#[macro_export]
macro_rules! maybe_inject {
  ($injectable:expr, $type:ty) => {
    $crate::maybe_inject_from!($crate::global(), $injectable, $type)
  };

  ($injectable:expr) => {
    $crate::maybe_inject_from!($crate::global(), $injectable)
  };
}

/// Like [`inject!`], against an explicit [`Registry`](crate::Registry).
#[macro_export]
macro_rules! inject_from {
  ($registry:expr, $injectable:expr, $type:ty) => {
    {
      let injectable: &$crate::Injectable = &$injectable;
      match $registry.resolve::<$type>(injectable) {
        Ok(value) => value,
        Err(err) => panic!(
          "Failed to inject required value {:?} as {}: {}",
          injectable,
          std::any::type_name::<$type>(),
          err
        ),
      }
    }
  };

  ($registry:expr, $injectable:expr) => {
    {
      let injectable: &$crate::Injectable = &$injectable;
      match $registry.resolve_value(injectable) {
        Ok(value) => value,
        Err(err) => panic!("Failed to inject required value {:?}: {}", injectable, err),
      }
    }
  };
}

/// Like [`inject_from!`], returning `None` instead of panicking.
#[macro_export]
macro_rules! maybe_inject_from {
  ($registry:expr, $injectable:expr, $type:ty) => {
    $registry.resolve::<$type>(&$injectable).ok()
  };

  ($registry:expr, $injectable:expr) => {
    $registry.resolve_value(&$injectable).ok()
  };
}
