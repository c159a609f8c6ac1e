//! Container types, their declaration builder, and container instances.

use crate::core::{ResolutionGuard, Value};
use crate::error::{Error, Result};
use crate::injectable::Injectable;
use crate::registry::{Registry, Shared};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

// Keys instances across every registry so the resolution stack never confuses two of them.
static NEXT_INSTANCE_KEY: AtomicU64 = AtomicU64::new(0);

// --- Container Identity ---

struct IdInner {
  id: u64,
  registry: u64,
  name: String,
  parent: Option<ContainerId>,
  is_abstract: bool,
}

/// The identity of a container type: its name, its parent and its registry.
///
/// This is what an [`Injectable`] records as its owner. Two ids are equal when
/// they denote the same declared type of the same registry.
#[derive(Clone)]
pub struct ContainerId {
  inner: Arc<IdInner>,
}

impl ContainerId {
  pub(crate) fn new(id: u64, registry: u64, name: String, parent: Option<ContainerId>, is_abstract: bool) -> Self {
    Self {
      inner: Arc::new(IdInner {
        id,
        registry,
        name,
        parent,
        is_abstract,
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn parent(&self) -> Option<&ContainerId> {
    self.inner.parent.as_ref()
  }

  /// Only the registry's base container type is abstract.
  pub fn is_abstract(&self) -> bool {
    self.inner.is_abstract
  }

  /// Whether `self` is `other` or declared (transitively) on top of it.
  pub fn is_subtype_of(&self, other: &ContainerId) -> bool {
    let mut current = Some(self);
    while let Some(id) = current {
      if id == other {
        return true;
      }
      current = id.parent();
    }
    false
  }

  pub(crate) fn registry_key(&self) -> u64 {
    self.inner.registry
  }
}

impl PartialEq for ContainerId {
  fn eq(&self, other: &Self) -> bool {
    self.inner.id == other.inner.id && self.inner.registry == other.inner.registry
  }
}

impl Eq for ContainerId {}

impl Hash for ContainerId {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.inner.id.hash(state);
    self.inner.registry.hash(state);
  }
}

impl fmt::Debug for ContainerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContainerId({})", self.inner.name)
  }
}

impl fmt::Display for ContainerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.inner.name)
  }
}

// --- Container Types ---

struct TypeInner {
  id: ContainerId,
  injectables: Vec<(String, Injectable)>,
  attributes: HashMap<String, Value>,
}

/// A declared, immutable container type.
///
/// Produced by [`ContainerDecl::finish`]. A container type exposes no way to
/// add, replace or remove attributes once declared:
///
/// ```compile_fail
/// use fibre_inject::{Injectable, Registry};
///
/// let registry = Registry::new();
/// let app = registry.declare("App").finish().unwrap();
/// app.bind("late", Injectable::constant(1_u8));
/// ```
#[derive(Clone)]
pub struct ContainerType {
  inner: Arc<TypeInner>,
}

impl ContainerType {
  pub(crate) fn base(id: ContainerId) -> Self {
    Self {
      inner: Arc::new(TypeInner {
        id,
        injectables: Vec::new(),
        attributes: HashMap::new(),
      }),
    }
  }

  pub fn id(&self) -> &ContainerId {
    &self.inner.id
  }

  pub fn name(&self) -> &str {
    self.inner.id.name()
  }

  pub fn is_abstract(&self) -> bool {
    self.inner.id.is_abstract()
  }

  /// The `(name, injectable)` pairs of this type, inherited ones included,
  /// sorted by global declaration order.
  pub fn injectables(&self) -> &[(String, Injectable)] {
    &self.inner.injectables
  }

  pub fn injectable(&self, name: &str) -> Option<&Injectable> {
    self
      .inner
      .injectables
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, injectable)| injectable)
  }

  /// A plain (non-injectable) attribute declared on this type or a parent.
  pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
    self.inner.attributes.get(name).and_then(|v| (**v).downcast_ref::<T>())
  }

  pub fn ptr_eq(&self, other: &ContainerType) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl AsRef<ContainerId> for ContainerType {
  fn as_ref(&self) -> &ContainerId {
    self.id()
  }
}

impl fmt::Debug for ContainerType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerType")
      .field("name", &self.name())
      .field("injectables", &self.inner.injectables.len())
      .field("attributes", &self.inner.attributes.len())
      .finish()
  }
}

// --- Declaration ---

/// The declaration step of a container type.
///
/// Injectables bound here receive their name, owner and global order number
/// immediately. [`finish`](Self::finish) registers the type name and freezes
/// the declaration into a [`ContainerType`].
pub struct ContainerDecl {
  registry: Registry,
  id: ContainerId,
  parent: ContainerType,
  injectables: Vec<(String, Injectable)>,
  attributes: HashMap<String, Value>,
}

impl ContainerDecl {
  pub(crate) fn new(registry: Registry, id: ContainerId, parent: ContainerType) -> Self {
    Self {
      registry,
      id,
      parent,
      injectables: Vec::new(),
      attributes: HashMap::new(),
    }
  }

  pub fn id(&self) -> &ContainerId {
    &self.id
  }

  /// Binds `injectable` to this type under `name` and returns the bound handle.
  ///
  /// Fails if the injectable is already bound anywhere, or if `name` is already
  /// used by this declaration (the injectable then stays unbound).
  pub fn bind(&mut self, name: impl Into<String>, injectable: Injectable) -> Result<Injectable> {
    let name = name.into();
    self.ensure_unused(&name)?;

    let registry = &self.registry;
    let index = injectable.bind(&self.id, &name, || registry.next_sequence())?;
    trace!(container = %self.id, name = %name, index, "bound injectable");

    self.injectables.push((name, injectable.clone()));
    Ok(injectable)
  }

  /// Declares a plain attribute, which is never treated as an injectable.
  pub fn attribute<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) -> Result<&mut Self> {
    let name = name.into();
    self.ensure_unused(&name)?;
    self.attributes.insert(name, Arc::new(value));
    Ok(self)
  }

  /// Registers the type name and freezes the declaration.
  pub fn finish(self) -> Result<ContainerType> {
    let Self {
      registry,
      id,
      parent,
      injectables: own,
      attributes: own_attributes,
    } = self;

    let shadowed = |name: &str| own.iter().any(|(n, _)| n == name) || own_attributes.contains_key(name);

    let mut injectables: Vec<(String, Injectable)> = parent
      .injectables()
      .iter()
      .filter(|(name, _)| !shadowed(name.as_str()))
      .cloned()
      .collect();
    let mut attributes: HashMap<String, Value> = parent
      .inner
      .attributes
      .iter()
      .filter(|(name, _)| !shadowed(name.as_str()))
      .map(|(name, value)| (name.clone(), value.clone()))
      .collect();

    injectables.extend(own);
    attributes.extend(own_attributes);
    injectables.sort_by_key(|(_, injectable)| injectable.sequence_index());

    let container = ContainerType {
      inner: Arc::new(TypeInner {
        id,
        injectables,
        attributes,
      }),
    };
    registry.register_type(&container)?;

    debug!(
      container = %container.id(),
      parent = %container.id().parent().map(ContainerId::name).unwrap_or_default(),
      injectables = container.injectables().len(),
      "declared container type"
    );
    Ok(container)
  }

  fn ensure_unused(&self, name: &str) -> Result<()> {
    let taken = self.injectables.iter().any(|(n, _)| n == name) || self.attributes.contains_key(name);
    if taken {
      return Err(Error::DuplicateAttribute {
        container: self.id.name().to_owned(),
        name: name.to_owned(),
      });
    }
    Ok(())
  }
}

impl fmt::Debug for ContainerDecl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerDecl")
      .field("name", &self.id.name())
      .field("injectables", &self.injectables.len())
      .finish_non_exhaustive()
  }
}

// --- Container Instances ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
  Constructed,
  Initializing,
  Initialized,
}

struct Slot {
  injectable: Injectable,
  cell: OnceCell<Value>,
}

struct InstanceInner {
  key: u64,
  container: ContainerType,
  registry: Weak<Shared>,
  slots: HashMap<String, Slot>,
  state: Mutex<InstanceState>,
}

/// One run of a container type: its memoized values and initialization state.
///
/// Values are produced on first access, at most once per name, and there is no
/// way to overwrite them:
///
/// ```compile_fail
/// use fibre_inject::{Injectable, Registry};
///
/// let registry = Registry::new();
/// let mut decl = registry.declare("Settings");
/// decl.bind("port", Injectable::constant(8080_u16)).unwrap();
/// let settings = decl.finish().unwrap();
/// let instance = registry.instantiate(&settings).unwrap();
/// instance.set("port", 9090_u16);
/// ```
#[derive(Clone)]
pub struct ContainerInstance {
  inner: Arc<InstanceInner>,
}

impl ContainerInstance {
  pub(crate) fn new(container: ContainerType, registry: Weak<Shared>) -> Self {
    let slots = container
      .injectables()
      .iter()
      .map(|(name, injectable)| {
        let slot = Slot {
          injectable: injectable.clone(),
          cell: OnceCell::new(),
        };
        (name.clone(), slot)
      })
      .collect();
    Self {
      inner: Arc::new(InstanceInner {
        key: NEXT_INSTANCE_KEY.fetch_add(1, Ordering::Relaxed),
        container,
        registry,
        slots,
        state: Mutex::new(InstanceState::Constructed),
      }),
    }
  }

  pub fn container(&self) -> &ContainerType {
    &self.inner.container
  }

  pub fn is_initialized(&self) -> bool {
    *self.inner.state.lock() == InstanceState::Initialized
  }

  /// Resolves every injectable in declaration order, then publishes this
  /// instance for cross-container lookups.
  ///
  /// Fails without side effects when the instance is already initialized (or
  /// being initialized by another thread). If a factory fails, the instance
  /// goes back to its constructed state; values resolved so far stay memoized.
  pub fn initialize(&self) -> Result<()> {
    {
      let mut state = self.inner.state.lock();
      if *state != InstanceState::Constructed {
        return Err(Error::AlreadyInitialized {
          container: self.container().name().to_owned(),
        });
      }
      *state = InstanceState::Initializing;
    }

    let outcome = self.initialize_all();

    let mut state = self.inner.state.lock();
    match outcome {
      Ok(()) => {
        *state = InstanceState::Initialized;
        debug!(container = %self.container().id(), "container initialized");
        Ok(())
      }
      Err(err) => {
        *state = InstanceState::Constructed;
        warn!(container = %self.container().id(), error = %err, "container initialization failed");
        Err(err)
      }
    }
  }

  fn initialize_all(&self) -> Result<()> {
    for (name, _) in self.container().injectables() {
      self.value(name)?;
    }
    self.registry()?.publish(self)
  }

  /// Returns the value of injectable `name`, running its factory on first access.
  pub fn value(&self, name: &str) -> Result<Value> {
    let slot = self.inner.slots.get(name).ok_or_else(|| Error::UnknownInjectable {
      container: self.container().name().to_owned(),
      name: name.to_owned(),
    })?;
    if let Some(value) = slot.cell.get() {
      return Ok(value.clone());
    }

    let _guard = ResolutionGuard::enter(self.inner.key, name).ok_or_else(|| Error::CircularDependency {
      container: self.container().name().to_owned(),
      name: name.to_owned(),
    })?;

    slot
      .cell
      .get_or_try_init(|| {
        trace!(
          container = %self.container().id(),
          name,
          index = slot.injectable.sequence_index(),
          "running factory"
        );
        slot.injectable.produce(self)
      })
      .cloned()
  }

  /// Returns the value of injectable `name` as an `Arc<T>`.
  pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.value(name)?.downcast::<T>().map_err(|_| Error::TypeMismatch {
      container: self.container().name().to_owned(),
      name: name.to_owned(),
      expected: type_name::<T>(),
    })
  }

  /// The memoized value of `name`, without resolving it.
  pub fn cached(&self, name: &str) -> Option<Value> {
    self.inner.slots.get(name).and_then(|slot| slot.cell.get().cloned())
  }

  /// Names whose values have been resolved, in declaration order.
  pub fn resolved_names(&self) -> Vec<&str> {
    self
      .container()
      .injectables()
      .iter()
      .filter(|(name, _)| self.cached(name).is_some())
      .map(|(name, _)| name.as_str())
      .collect()
  }

  pub fn ptr_eq(&self, other: &ContainerInstance) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub(crate) fn registry(&self) -> Result<Registry> {
    self
      .inner
      .registry
      .upgrade()
      .map(Registry::from_shared)
      .ok_or(Error::RegistryDropped)
  }
}

impl fmt::Debug for ContainerInstance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerInstance")
      .field("container", &self.container().name())
      .field("state", &*self.inner.state.lock())
      .field("resolved", &self.resolved_names())
      .finish()
  }
}
