//! Injectable descriptors: a factory plus the argument specs it is invoked with.

use crate::container::{ContainerId, ContainerInstance};
use crate::core::Value;
use crate::error::{Error, Result};

use once_cell::sync::OnceCell;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

type Factory = Arc<dyn Fn(&Args) -> Result<Value> + Send + Sync>;
type Projection = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Where an injectable lives once it has been attached to a container type.
pub(crate) struct Binding {
  pub(crate) name: String,
  pub(crate) owner: ContainerId,
  pub(crate) index: u64,
}

struct InjectableInner {
  factory: Factory,
  type_name: &'static str,
  args: Vec<Arg>,
  kwargs: Vec<(String, Arg)>,
  binding: OnceCell<Binding>,
}

// A copy is a new descriptor: it shares the factory and arguments but is unbound.
impl Clone for InjectableInner {
  fn clone(&self) -> Self {
    Self {
      factory: self.factory.clone(),
      type_name: self.type_name,
      args: self.args.clone(),
      kwargs: self.kwargs.clone(),
      binding: OnceCell::new(),
    }
  }
}

/// A deferred, memoized value declared on a container type.
///
/// An `Injectable` is a factory together with positional and keyword argument
/// specs. It is bound exactly once, when a [`ContainerDecl`](crate::ContainerDecl)
/// attaches it under a name, and its value is produced lazily, once per
/// container instance.
///
/// Handles are cheap to clone; all clones refer to the same descriptor and
/// share its binding.
#[derive(Clone)]
pub struct Injectable {
  inner: Arc<InjectableInner>,
}

impl Injectable {
  /// Creates an injectable from a factory that receives the resolved arguments.
  pub fn new<T, F>(factory: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
  {
    let factory: Factory = Arc::new(move |args: &Args| factory(args).map(|v| Arc::new(v) as Value));
    Self {
      inner: Arc::new(InjectableInner {
        factory,
        type_name: type_name::<T>(),
        args: Vec::new(),
        kwargs: Vec::new(),
        binding: OnceCell::new(),
      }),
    }
  }

  /// Creates an injectable from an argument-less factory.
  pub fn from_fn<T, F>(factory: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn() -> T + Send + Sync + 'static,
  {
    Self::new(move |_: &Args| Ok(factory()))
  }

  /// Creates an injectable whose value is a copy of `value` in every instance.
  pub fn constant<T>(value: T) -> Self
  where
    T: Any + Clone + Send + Sync,
  {
    Self::new(move |_: &Args| Ok(value.clone()))
  }

  // --- Argument Specs ---
  //
  // If this handle has been cloned, the argument is added to a fresh, unbound
  // copy and the other clones keep their arguments.

  /// Appends a positional argument spec.
  pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
    Arc::make_mut(&mut self.inner).args.push(arg.into());
    self
  }

  /// Appends a literal positional argument.
  pub fn value<T: Any + Send + Sync>(self, value: T) -> Self {
    self.arg(Arg::value(value))
  }

  /// Sets a keyword argument spec, replacing any earlier one of the same name.
  pub fn kwarg(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
    let name = name.into();
    let arg = arg.into();
    let kwargs = &mut Arc::make_mut(&mut self.inner).kwargs;
    match kwargs.iter_mut().find(|(existing, _)| *existing == name) {
      Some(slot) => slot.1 = arg,
      None => kwargs.push((name, arg)),
    }
    self
  }

  /// Sets a literal keyword argument.
  pub fn kwarg_value<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
    self.kwarg(name, Arg::value(value))
  }

  /// Defers reading `attribute` off this injectable's value until resolution.
  ///
  /// `project` receives the resolved value and returns the attribute; the
  /// attribute name is kept for error reporting.
  pub fn attr<T, U, F>(&self, attribute: impl Into<String>, project: F) -> LazyAttribute
  where
    T: Any + Send + Sync,
    U: Any + Send + Sync,
    F: Fn(&T) -> U + Send + Sync + 'static,
  {
    let project: Projection =
      Arc::new(move |value: &Value| (**value).downcast_ref::<T>().map(|v| Arc::new(project(v)) as Value));
    LazyAttribute {
      injectable: self.clone(),
      attribute: attribute.into(),
      expected: type_name::<T>(),
      project,
    }
  }

  // --- Accessors ---

  /// The attribute name on the owning container type, once bound.
  pub fn name(&self) -> Option<&str> {
    self.binding().map(|b| b.name.as_str())
  }

  /// The owning container type, once bound.
  pub fn owner(&self) -> Option<&ContainerId> {
    self.binding().map(|b| &b.owner)
  }

  /// The global declaration order number, once bound.
  pub fn sequence_index(&self) -> Option<u64> {
    self.binding().map(|b| b.index)
  }

  pub fn is_bound(&self) -> bool {
    self.binding().is_some()
  }

  /// The type name of the value produced by the factory.
  pub fn type_name(&self) -> &'static str {
    self.inner.type_name
  }

  /// Whether two handles refer to the same descriptor.
  pub fn ptr_eq(&self, other: &Injectable) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Returns this injectable's value from `instance`, resolving it on first access.
  pub fn get_from<T: Any + Send + Sync>(&self, instance: &ContainerInstance) -> Result<Arc<T>> {
    let binding = self.binding().ok_or(Error::Unbound)?;
    if !instance.container().id().is_subtype_of(&binding.owner) {
      return Err(Error::UnknownInjectable {
        container: instance.container().name().to_owned(),
        name: binding.name.clone(),
      });
    }
    instance.get::<T>(&binding.name)
  }

  // --- Crate Internals ---

  pub(crate) fn binding(&self) -> Option<&Binding> {
    self.inner.binding.get()
  }

  /// Binds this injectable to `owner` under `name`, drawing its order number
  /// from `next_index` only when the binding succeeds.
  pub(crate) fn bind(&self, owner: &ContainerId, name: &str, next_index: impl FnOnce() -> u64) -> Result<u64> {
    let mut fresh = false;
    let binding = self.inner.binding.get_or_init(|| {
      fresh = true;
      Binding {
        name: name.to_owned(),
        owner: owner.clone(),
        index: next_index(),
      }
    });
    if !fresh {
      return Err(Error::AlreadyBound {
        container: binding.owner.name().to_owned(),
        name: binding.name.clone(),
      });
    }
    Ok(binding.index)
  }

  /// Resolves the argument specs against `instance` and runs the factory.
  pub(crate) fn produce(&self, instance: &ContainerInstance) -> Result<Value> {
    let positional = self
      .inner
      .args
      .iter()
      .map(|arg| arg.resolve(instance))
      .collect::<Result<Vec<_>>>()?;
    let keyword = self
      .inner
      .kwargs
      .iter()
      .map(|(name, arg)| -> Result<(String, Value)> { Ok((name.clone(), arg.resolve(instance)?)) })
      .collect::<Result<Vec<_>>>()?;
    (self.inner.factory)(&Args { positional, keyword })
  }

  /// Resolves this injectable as a dependency of something declared on `instance`.
  fn resolve_dependency(&self, instance: &ContainerInstance) -> Result<Value> {
    let binding = self.binding().ok_or(Error::Unbound)?;

    // Same container type (or a subtype): resolve against the instance being
    // initialized, even though it is not fully initialized yet.
    if instance.container().id().is_subtype_of(&binding.owner) {
      return instance.value(&binding.name);
    }

    let registry = instance.registry()?;
    let other = registry
      .lookup_initialized(&binding.owner)
      .ok_or_else(|| Error::Uninitialized {
        container: binding.owner.name().to_owned(),
      })?;
    other.value(&binding.name)
  }
}

impl fmt::Debug for Injectable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.binding() {
      Some(b) => write!(f, "Injectable({}) bound to {}.{}", self.inner.type_name, b.owner.name(), b.name),
      None => write!(f, "unbound Injectable({})", self.inner.type_name),
    }
  }
}

/// One argument spec of an injectable's factory.
#[derive(Clone)]
pub enum Arg {
  /// A literal value, passed through unchanged.
  Value(Value),
  /// The resolved value of another injectable.
  Injectable(Injectable),
  /// An attribute read off another injectable's resolved value.
  Attribute(LazyAttribute),
}

impl Arg {
  pub fn value<T: Any + Send + Sync>(value: T) -> Self {
    Arg::Value(Arc::new(value))
  }

  fn resolve(&self, instance: &ContainerInstance) -> Result<Value> {
    match self {
      Arg::Value(value) => Ok(value.clone()),
      Arg::Injectable(injectable) => injectable.resolve_dependency(instance),
      Arg::Attribute(attribute) => attribute.resolve(instance),
    }
  }
}

impl From<Injectable> for Arg {
  fn from(injectable: Injectable) -> Self {
    Arg::Injectable(injectable)
  }
}

impl From<&Injectable> for Arg {
  fn from(injectable: &Injectable) -> Self {
    Arg::Injectable(injectable.clone())
  }
}

impl From<LazyAttribute> for Arg {
  fn from(attribute: LazyAttribute) -> Self {
    Arg::Attribute(attribute)
  }
}

/// A deferred "read this attribute off that injectable's value" dependency.
///
/// Built with [`Injectable::attr`]. At declaration time the value does not
/// exist yet, so the read happens when the dependent injectable resolves.
#[derive(Clone)]
pub struct LazyAttribute {
  injectable: Injectable,
  attribute: String,
  expected: &'static str,
  project: Projection,
}

impl LazyAttribute {
  pub fn injectable(&self) -> &Injectable {
    &self.injectable
  }

  pub fn attribute(&self) -> &str {
    &self.attribute
  }

  fn resolve(&self, instance: &ContainerInstance) -> Result<Value> {
    let value = self.injectable.resolve_dependency(instance)?;
    (self.project)(&value).ok_or_else(|| {
      let (container, name) = match self.injectable.binding() {
        Some(b) => (b.owner.name().to_owned(), b.name.clone()),
        None => (String::new(), String::new()),
      };
      Error::Attribute {
        container,
        name,
        attribute: self.attribute.clone(),
        expected: self.expected,
      }
    })
  }
}

impl fmt::Debug for LazyAttribute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "LazyAttribute({:?}.{})", self.injectable, self.attribute)
  }
}

/// The resolved arguments handed to a factory.
pub struct Args {
  positional: Vec<Value>,
  keyword: Vec<(String, Value)>,
}

impl Args {
  /// Number of positional arguments.
  pub fn len(&self) -> usize {
    self.positional.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positional.is_empty() && self.keyword.is_empty()
  }

  /// Borrows positional argument `index` as a `T`.
  pub fn get<T: Any>(&self, index: usize) -> Result<&T> {
    let value = self.positional_value(index)?;
    (**value).downcast_ref::<T>().ok_or_else(|| Error::ArgumentType {
      argument: format!("#{}", index),
      expected: type_name::<T>(),
    })
  }

  /// Shares positional argument `index` as an `Arc<T>`, keeping its identity.
  pub fn get_arc<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
    let value = self.positional_value(index)?.clone();
    value.downcast::<T>().map_err(|_| Error::ArgumentType {
      argument: format!("#{}", index),
      expected: type_name::<T>(),
    })
  }

  /// Borrows keyword argument `name` as a `T`.
  pub fn kwarg<T: Any>(&self, name: &str) -> Result<&T> {
    let value = self.keyword_value(name)?;
    (**value).downcast_ref::<T>().ok_or_else(|| Error::ArgumentType {
      argument: format!("'{}'", name),
      expected: type_name::<T>(),
    })
  }

  /// Shares keyword argument `name` as an `Arc<T>`, keeping its identity.
  pub fn kwarg_arc<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    let value = self.keyword_value(name)?.clone();
    value.downcast::<T>().map_err(|_| Error::ArgumentType {
      argument: format!("'{}'", name),
      expected: type_name::<T>(),
    })
  }

  pub fn has_kwarg(&self, name: &str) -> bool {
    self.keyword.iter().any(|(k, _)| k == name)
  }

  /// Keyword names in declaration order.
  pub fn kwarg_names(&self) -> impl Iterator<Item = &str> {
    self.keyword.iter().map(|(k, _)| k.as_str())
  }

  fn positional_value(&self, index: usize) -> Result<&Value> {
    self
      .positional
      .get(index)
      .ok_or_else(|| Error::MissingArgument(format!("#{}", index)))
  }

  fn keyword_value(&self, name: &str) -> Result<&Value> {
    self
      .keyword
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v)
      .ok_or_else(|| Error::MissingArgument(format!("'{}'", name)))
  }
}
