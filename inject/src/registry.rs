//! The registry: container-type names, the sequence counter and the
//! initialized-instances list.

use crate::container::{ContainerDecl, ContainerId, ContainerInstance, ContainerType};
use crate::core::Value;
use crate::error::{Error, Result};
use crate::injectable::Injectable;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_REGISTRY_KEY: AtomicU64 = AtomicU64::new(0);

const BASE_CONTAINER_NAME: &str = "Container";

/// Which initialized instance answers a cross-container lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstancePolicy {
  /// Any number of instances per type; lookups return the earliest initialized.
  #[default]
  FirstInitialized,
  /// Any number of instances per type; lookups return the latest initialized.
  MostRecent,
  /// At most one initialized instance per type. Initializing a second one fails.
  Unique,
}

pub(crate) struct Shared {
  key: u64,
  policy: InstancePolicy,
  sequence: AtomicU64,
  type_ids: AtomicU64,
  base: ContainerType,
  types: DashMap<String, ContainerType>,
  initialized: RwLock<Vec<ContainerInstance>>,
}

/// A handle to one set of container types and their initialized instances.
///
/// The process-wide registry is available through [`global()`](crate::global);
/// `Registry::new()` creates an isolated one, which is what tests usually want.
/// Handles are cheap to clone and all clones share the same state.
#[derive(Clone)]
pub struct Registry {
  shared: Arc<Shared>,
}

impl Default for Registry {
  fn default() -> Self {
    Self::new()
  }
}

impl Registry {
  /// Creates an empty registry with the default [`InstancePolicy`].
  pub fn new() -> Self {
    Self::builder().build()
  }

  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
    Self { shared }
  }

  pub fn policy(&self) -> InstancePolicy {
    self.shared.policy
  }

  /// The abstract base container type every declared type extends.
  pub fn base(&self) -> &ContainerType {
    &self.shared.base
  }

  // --- Declaration ---

  /// Starts declaring a container type named `name`, extending the base type.
  pub fn declare(&self, name: impl Into<String>) -> ContainerDecl {
    let parent = self.shared.base.clone();
    self.declare_on(name.into(), parent)
  }

  /// Starts declaring a container type named `name` that extends `parent` and
  /// inherits its injectables and attributes.
  pub fn declare_extending(&self, name: impl Into<String>, parent: &ContainerType) -> Result<ContainerDecl> {
    self.ensure_owned(parent)?;
    Ok(self.declare_on(name.into(), parent.clone()))
  }

  fn declare_on(&self, name: String, parent: ContainerType) -> ContainerDecl {
    let id = ContainerId::new(
      self.shared.type_ids.fetch_add(1, Ordering::Relaxed),
      self.shared.key,
      name,
      Some(parent.id().clone()),
      false,
    );
    ContainerDecl::new(self.clone(), id, parent)
  }

  pub(crate) fn next_sequence(&self) -> u64 {
    self.shared.sequence.fetch_add(1, Ordering::Relaxed)
  }

  pub(crate) fn register_type(&self, container: &ContainerType) -> Result<()> {
    match self.shared.types.entry(container.name().to_owned()) {
      Entry::Occupied(_) => Err(Error::DuplicateContainer {
        container: container.name().to_owned(),
      }),
      Entry::Vacant(slot) => {
        slot.insert(container.clone());
        Ok(())
      }
    }
  }

  /// The declared container type named `name`.
  pub fn container(&self, name: &str) -> Option<ContainerType> {
    self.shared.types.get(name).map(|entry| entry.value().clone())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.shared.types.contains_key(name)
  }

  /// Names of all declared container types, in no particular order.
  pub fn container_names(&self) -> Vec<String> {
    self.shared.types.iter().map(|entry| entry.key().clone()).collect()
  }

  // --- Instances ---

  /// Creates an uninitialized instance of `container`.
  pub fn instantiate(&self, container: &ContainerType) -> Result<ContainerInstance> {
    self.ensure_owned(container)?;
    if container.is_abstract() {
      return Err(Error::AbstractInstantiation {
        container: container.name().to_owned(),
      });
    }
    debug!(container = %container.id(), "instantiating container");
    Ok(ContainerInstance::new(container.clone(), Arc::downgrade(&self.shared)))
  }

  pub(crate) fn publish(&self, instance: &ContainerInstance) -> Result<()> {
    let mut initialized = self.shared.initialized.write();
    if self.shared.policy == InstancePolicy::Unique {
      let id = instance.container().id();
      if initialized.iter().any(|other| other.container().id() == id) {
        return Err(Error::DuplicateInstance {
          container: id.name().to_owned(),
        });
      }
    }
    initialized.push(instance.clone());
    Ok(())
  }

  /// The initialized instance of `container` (or of a subtype of it), if any.
  pub fn lookup_initialized(&self, container: &ContainerId) -> Option<ContainerInstance> {
    let initialized = self.shared.initialized.read();
    let is_match = |instance: &&ContainerInstance| instance.container().id().is_subtype_of(container);
    let found = match self.shared.policy {
      InstancePolicy::MostRecent => initialized.iter().rev().find(is_match),
      InstancePolicy::FirstInitialized | InstancePolicy::Unique => initialized.iter().find(is_match),
    };
    found.cloned()
  }

  pub fn initialized_count(&self) -> usize {
    self.shared.initialized.read().len()
  }

  // --- Injection ---

  /// Returns the value of a bound injectable from its owner's initialized instance.
  pub fn resolve_value(&self, injectable: &Injectable) -> Result<Value> {
    let binding = injectable.binding().ok_or(Error::Unbound)?;
    let instance = self
      .lookup_initialized(&binding.owner)
      .ok_or_else(|| Error::Uninitialized {
        container: binding.owner.name().to_owned(),
      })?;
    instance.value(&binding.name)
  }

  /// Like [`resolve_value`](Self::resolve_value), downcast to `Arc<T>`.
  pub fn resolve<T: Any + Send + Sync>(&self, injectable: &Injectable) -> Result<Arc<T>> {
    self.resolve_value(injectable)?.downcast::<T>().map_err(|_| {
      let (container, name) = match injectable.binding() {
        Some(b) => (b.owner.name().to_owned(), b.name.clone()),
        None => (String::new(), String::new()),
      };
      Error::TypeMismatch {
        container,
        name,
        expected: type_name::<T>(),
      }
    })
  }

  /// Forgets every declared type and initialized instance.
  ///
  /// The sequence counter keeps counting, so order numbers stay unique.
  #[cfg(any(test, feature = "testing"))]
  pub fn clear(&self) {
    self.shared.types.clear();
    self.shared.initialized.write().clear();
  }

  fn ensure_owned(&self, container: &ContainerType) -> Result<()> {
    if container.id().registry_key() != self.shared.key {
      return Err(Error::NotAContainer {
        container: container.name().to_owned(),
      });
    }
    Ok(())
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("policy", &self.shared.policy)
      .field("containers", &self.shared.types.len())
      .field("initialized", &self.initialized_count())
      .finish()
  }
}

/// A builder for [`Registry`] instances.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
  policy: InstancePolicy,
}

impl RegistryBuilder {
  /// Sets which initialized instance answers cross-container lookups.
  pub fn instance_policy(mut self, policy: InstancePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn build(self) -> Registry {
    let key = NEXT_REGISTRY_KEY.fetch_add(1, Ordering::Relaxed);
    let base_id = ContainerId::new(0, key, BASE_CONTAINER_NAME.to_owned(), None, true);
    Registry {
      shared: Arc::new(Shared {
        key,
        policy: self.policy,
        sequence: AtomicU64::new(0),
        type_ids: AtomicU64::new(1),
        base: ContainerType::base(base_id),
        types: DashMap::new(),
        initialized: RwLock::new(Vec::new()),
      }),
    }
  }
}
