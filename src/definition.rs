//! Declarative construction recipes
//!
//! A [`Definition`] describes how to produce one service instance. Raw
//! declarative input ([`RawDefinition`]) is normalized into this closed sum
//! type before it ever reaches the resolution engine.
//!
//! ## Enum-based recipes
//!
//! Definitions are a plain enum rather than boxed trait objects:
//! - the resolution engine matches on the kind once per build
//! - every variant is `Clone` (closures and instances sit behind `Arc`)
//! - normalization is total over the structured input; malformed input is
//!   rejected with `InvalidConfig` before storage

use crate::container::Container;
use crate::error::{BoxError, DiError, Result};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type-erased service instance shared out of the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Downcast a resolved [`Instance`] to a concrete type.
///
/// Returns `InvalidConfig` when the instance is not of the requested type.
pub fn downcast_instance<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| {
        DiError::invalid_config(format!(
            "instance is not of the requested type {}",
            std::any::type_name::<T>()
        ))
    })
}

// =============================================================================
// Definition
// =============================================================================

/// Declarative recipe for producing one service instance.
///
/// # Examples
///
/// ```rust
/// use wirebox::{Container, Reference};
///
/// let container = Container::new();
/// container.set("engine", "app.EngineMarkOne").unwrap();
/// container.set("motor", Reference::to("engine")).unwrap();
/// ```
#[derive(Clone)]
pub enum Definition {
    /// Instantiate a registered type, resolving constructor dependencies
    Class(ClassDefinition),
    /// Invoke a factory closure with the container
    Callable(CallableDefinition),
    /// Redirect to another identifier
    Reference(String),
    /// Ordered list of every instance registered under a tag
    TagReference(String),
    /// Already-constructed instance, returned as-is
    Value(Instance),
}

impl Definition {
    /// Trivial class definition for `type_name` with no explicit arguments.
    #[inline]
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Definition::Class(ClassDefinition::new(type_name))
    }

    /// Redirect to another identifier.
    #[inline]
    pub fn reference(id: impl Into<String>) -> Self {
        Definition::Reference(id.into())
    }

    /// Resolve to the ordered list of instances registered under `tag`.
    #[inline]
    pub fn tagged(tag: impl Into<String>) -> Self {
        Definition::TagReference(tag.into())
    }

    /// Wrap an already-constructed value; identity is preserved on resolve.
    #[inline]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Definition::Value(Arc::new(value))
    }

    /// Wrap an already type-erased instance.
    #[inline]
    pub fn instance(instance: Instance) -> Self {
        Definition::Value(instance)
    }

    /// Factory closure receiving the container.
    pub fn callable<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Definition::Callable(CallableDefinition::new(factory))
    }

    /// Kind label used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Definition::Class(_) => "class",
            Definition::Callable(_) => "callable",
            Definition::Reference(_) => "reference",
            Definition::TagReference(_) => "tag-reference",
            Definition::Value(_) => "value",
        }
    }

    /// Normalize raw declarative input into a canonical definition.
    ///
    /// `id` is the identifier the definition is being stored under; a config
    /// without an explicit type name falls back to it. Strings passed through
    /// `set` are always class names; redirects are spelled explicitly with
    /// [`Reference::to`].
    pub fn normalize(raw: RawDefinition, id: Option<&str>) -> Result<Definition> {
        match raw {
            RawDefinition::Definition(definition) => {
                if let Definition::Class(class) = &definition {
                    if class.type_name.is_empty() {
                        return Err(DiError::invalid_config(
                            "class definition has an empty type name",
                        ));
                    }
                }
                Ok(definition)
            }
            RawDefinition::TypeName(type_name) => {
                if type_name.is_empty() {
                    return Err(DiError::invalid_config(
                        "class definition has an empty type name",
                    ));
                }
                Ok(Definition::Class(ClassDefinition::new(type_name)))
            }
            RawDefinition::Config(config) => {
                let type_name = match config.type_name {
                    Some(name) => name,
                    None => id
                        .map(str::to_string)
                        .ok_or_else(|| {
                            DiError::invalid_config(
                                "definition config names no class and no id is available",
                            )
                        })?,
                };
                if type_name.is_empty() {
                    return Err(DiError::invalid_config(
                        "class definition has an empty type name",
                    ));
                }
                Ok(Definition::Class(ClassDefinition {
                    type_name,
                    arguments: config.arguments,
                    actions: config.actions,
                    tags: config.tags,
                }))
            }
            RawDefinition::Callable(callable) => Ok(Definition::Callable(callable)),
            RawDefinition::Instance(instance) => Ok(Definition::Value(instance)),
        }
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Definition::Class(class) => f
                .debug_struct("Class")
                .field("type_name", &class.type_name)
                .field("arguments", &class.arguments.len())
                .field("actions", &class.actions.len())
                .finish(),
            Definition::Callable(_) => f.write_str("Callable"),
            Definition::Reference(id) => f.debug_tuple("Reference").field(id).finish(),
            Definition::TagReference(tag) => f.debug_tuple("TagReference").field(tag).finish(),
            Definition::Value(_) => f.write_str("Value"),
        }
    }
}

/// Spelled-out redirect, mirroring how references appear in configuration.
///
/// ```rust
/// use wirebox::{Container, Reference};
///
/// let container = Container::new();
/// container.set("mailer", Reference::to("smtp-mailer")).unwrap();
/// ```
pub struct Reference;

impl Reference {
    /// A definition redirecting to `id`.
    #[inline]
    pub fn to(id: impl Into<String>) -> Definition {
        Definition::Reference(id.into())
    }
}

// =============================================================================
// Class definitions
// =============================================================================

/// Recipe for instantiating a registered type.
///
/// Explicit constructor arguments are sparse and positional: an entry at
/// index `i` replaces the inferred dependency for parameter `i`, unspecified
/// positions fall back to inference.
#[derive(Clone, Debug)]
pub struct ClassDefinition {
    pub type_name: String,
    pub arguments: BTreeMap<usize, Definition>,
    pub actions: Vec<Action>,
    pub tags: Vec<String>,
}

impl ClassDefinition {
    /// New definition with no explicit arguments or actions.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            arguments: BTreeMap::new(),
            actions: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Post-construction step, applied in declaration order.
#[derive(Clone, Debug)]
pub enum Action {
    /// Assign a resolved value to a named property
    Property(String, Definition),
    /// Invoke a named method with resolved positional arguments
    MethodCall(String, Vec<Definition>),
}

// =============================================================================
// Callable definitions
// =============================================================================

type FactoryFn = Arc<dyn Fn(&Container) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Factory closure invoked with the container to produce the instance.
#[derive(Clone)]
pub struct CallableDefinition {
    factory: FactoryFn,
}

impl CallableDefinition {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Run the factory. Errors are wrapped at the `get` boundary.
    #[inline]
    pub fn invoke(&self, container: &Container) -> std::result::Result<Instance, BoxError> {
        (self.factory)(container)
    }
}

// =============================================================================
// Raw declarative input
// =============================================================================

/// Raw declarative input accepted by `set` and providers.
pub enum RawDefinition {
    /// Class-name shorthand: instantiate with no explicit arguments
    TypeName(String),
    /// Structured configuration map
    Config(DefinitionConfig),
    /// Factory closure
    Callable(CallableDefinition),
    /// Already-constructed instance
    Instance(Instance),
    /// Pass-through for an already-normalized definition
    Definition(Definition),
}

impl RawDefinition {
    /// Wrap an already-constructed value.
    #[inline]
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        RawDefinition::Instance(Arc::new(value))
    }

    /// Wrap a factory closure.
    pub fn callable<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        RawDefinition::Callable(CallableDefinition::new(factory))
    }
}

impl From<&str> for RawDefinition {
    fn from(type_name: &str) -> Self {
        RawDefinition::TypeName(type_name.to_string())
    }
}

impl From<String> for RawDefinition {
    fn from(type_name: String) -> Self {
        RawDefinition::TypeName(type_name)
    }
}

impl From<DefinitionConfig> for RawDefinition {
    fn from(config: DefinitionConfig) -> Self {
        RawDefinition::Config(config)
    }
}

impl From<Definition> for RawDefinition {
    fn from(definition: Definition) -> Self {
        RawDefinition::Definition(definition)
    }
}

// =============================================================================
// Definition configuration
// =============================================================================

/// Structured configuration for a class definition.
///
/// This is the structured face of the original marker grammar: method-call
/// entries carry a `()` suffix, property entries a `$` prefix. Both markers
/// are still understood by [`DefinitionConfig::with_entry`], so configuration
/// translated from key/value form keeps working.
///
/// # Examples
///
/// ```rust
/// use wirebox::{Definition, DefinitionConfig, Reference};
///
/// let config = DefinitionConfig::of("app.Car")
///     .with_constructor([Reference::to("engine")])
///     .with_call("setRadio", vec![Definition::value("loud")])
///     .with_property("color", Definition::value("red"))
///     .with_tags(["vehicle"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DefinitionConfig {
    pub(crate) type_name: Option<String>,
    pub(crate) arguments: BTreeMap<usize, Definition>,
    pub(crate) actions: Vec<Action>,
    pub(crate) tags: Vec<String>,
}

impl DefinitionConfig {
    /// Config with no explicit type name; the definition id supplies it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for a named type.
    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// Replace inferred constructor dependencies positionally, starting at 0.
    pub fn with_constructor(mut self, arguments: impl IntoIterator<Item = Definition>) -> Self {
        for (index, argument) in arguments.into_iter().enumerate() {
            self.arguments.insert(index, argument);
        }
        self
    }

    /// Replace the inferred constructor dependency at one positional slot.
    pub fn with_argument(mut self, index: usize, argument: Definition) -> Self {
        self.arguments.insert(index, argument);
        self
    }

    /// Append a post-construction method call.
    pub fn with_call(mut self, method: impl Into<String>, arguments: Vec<Definition>) -> Self {
        self.actions
            .push(Action::MethodCall(method.into(), arguments));
        self
    }

    /// Append a post-construction property assignment.
    pub fn with_property(mut self, property: impl Into<String>, value: Definition) -> Self {
        self.actions.push(Action::Property(property.into(), value));
        self
    }

    /// Append a post-construction entry in marker form.
    ///
    /// Keys ending in `()` become method calls, keys starting with `$`
    /// become property assignments (first value). Anything else is a
    /// configuration error.
    pub fn with_entry(mut self, key: &str, values: Vec<Definition>) -> Result<Self> {
        if let Some(method) = key.strip_suffix("()") {
            if method.is_empty() {
                return Err(DiError::invalid_config("method-call entry has no name"));
            }
            self.actions
                .push(Action::MethodCall(method.to_string(), values));
            return Ok(self);
        }
        if let Some(property) = key.strip_prefix('$') {
            if property.is_empty() {
                return Err(DiError::invalid_config("property entry has no name"));
            }
            let value = values.into_iter().next().ok_or_else(|| {
                DiError::invalid_config(format!("property entry \"${property}\" has no value"))
            })?;
            self.actions.push(Action::Property(property.to_string(), value));
            return Ok(self);
        }
        Err(DiError::invalid_config(format!(
            "unrecognized definition entry key \"{key}\". Did you mean \"{key}()\" or \"${key}\"?"
        )))
    }

    /// Register the definition under the given tags.
    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
