//! Type introspection registry
//!
//! Rust has no runtime reflection, so constructor metadata is supplied by an
//! explicit registry. A [`TypeRegistration`] describes one constructible
//! type: its ordered constructor parameters, a construction closure, and the
//! named setters/methods that post-construction actions may target. The
//! [`TypeRegistry`] implements [`TypeIntrospector`], the capability the
//! dependency resolver consumes.
//!
//! # Examples
//!
//! ```rust
//! use wirebox::{ParamDescriptor, TypeRegistration, TypeRegistry};
//!
//! struct Engine { name: &'static str }
//!
//! let registry = TypeRegistry::new();
//! registry.register(
//!     TypeRegistration::new::<Engine>("app.EngineMarkOne")
//!         .implements("app.EngineInterface")
//!         .constructor::<Engine, _>(|_args| Ok(Engine { name: "Mark One" })),
//! );
//! assert!(registry.is_registered("app.EngineMarkOne"));
//! ```

use crate::definition::Instance;
use crate::error::{BoxError, DiError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// Parameter descriptors
// =============================================================================

/// Declared type of one constructor parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeHint {
    /// No declared type
    None,
    /// Builtin scalar type; the label is informational ("int", "string", ...)
    Builtin(&'static str),
    /// Registered class or interface name
    Class(String),
    /// Union of class/interface names
    Union(Vec<String>),
}

/// Declared default of one constructor parameter.
#[derive(Clone)]
pub enum ParamDefault {
    /// No default
    None,
    /// Defaults to null
    Null,
    /// Defaults to a concrete value
    Value(Instance),
}

impl std::fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamDefault::None => f.write_str("None"),
            ParamDefault::Null => f.write_str("Null"),
            ParamDefault::Value(_) => f.write_str("Value"),
        }
    }
}

/// One constructor parameter, in declaration order.
#[derive(Clone, Debug)]
pub struct ParamDescriptor {
    pub name: String,
    pub hint: TypeHint,
    pub nullable: bool,
    pub default: ParamDefault,
    pub variadic: bool,
}

impl ParamDescriptor {
    fn with_hint(name: impl Into<String>, hint: TypeHint) -> Self {
        Self {
            name: name.into(),
            hint,
            nullable: false,
            default: ParamDefault::None,
            variadic: false,
        }
    }

    /// Class-typed parameter.
    pub fn class(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_hint(name, TypeHint::Class(type_name.into()))
    }

    /// Builtin-typed parameter ("int", "string", ...).
    pub fn builtin(name: impl Into<String>, label: &'static str) -> Self {
        Self::with_hint(name, TypeHint::Builtin(label))
    }

    /// Parameter with no declared type.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::with_hint(name, TypeHint::None)
    }

    /// Union-typed parameter (`A|B`).
    pub fn union<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_hint(
            name,
            TypeHint::Union(members.into_iter().map(Into::into).collect()),
        )
    }

    /// Mark the parameter nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Declare a concrete default value.
    pub fn with_default<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = ParamDefault::Value(Arc::new(value));
        self
    }

    /// Declare a null default (implies the parameter accepts null).
    pub fn with_null_default(mut self) -> Self {
        self.default = ParamDefault::Null;
        self
    }

    /// Mark the parameter variadic; it collects surplus explicit arguments
    /// as a `Vec<Instance>`.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether a usable default exists.
    #[inline]
    pub fn has_default(&self) -> bool {
        !matches!(self.default, ParamDefault::None)
    }
}

// =============================================================================
// TypeIntrospector capability
// =============================================================================

/// Capability consumed by the dependency resolver: ordered constructor
/// parameter descriptors per type name.
pub trait TypeIntrospector: Send + Sync {
    /// Constructor parameters of `type_name`, empty for types with a
    /// trivial constructor. Fails with `NotInstantiable` when the name is
    /// unknown or cannot be constructed directly.
    fn constructor_parameters(&self, type_name: &str) -> Result<Arc<[ParamDescriptor]>>;
}

// =============================================================================
// Registry entries
// =============================================================================

type ConstructFn = Box<
    dyn Fn(Vec<Option<Instance>>) -> std::result::Result<Box<dyn Any + Send + Sync>, BoxError>
        + Send
        + Sync,
>;
type SetterFn = Box<
    dyn Fn(&mut (dyn Any + Send + Sync), Instance) -> std::result::Result<(), BoxError>
        + Send
        + Sync,
>;
type MethodFn = Box<
    dyn Fn(&mut (dyn Any + Send + Sync), Vec<Instance>) -> std::result::Result<(), BoxError>
        + Send
        + Sync,
>;

pub(crate) struct TypeEntry {
    type_name: String,
    type_id: Option<TypeId>,
    interfaces: Vec<String>,
    params: Arc<[ParamDescriptor]>,
    construct: Option<ConstructFn>,
    setters: HashMap<String, SetterFn>,
    methods: HashMap<String, MethodFn>,
}

impl TypeEntry {
    #[inline]
    pub(crate) fn is_instantiable(&self) -> bool {
        self.construct.is_some()
    }

    #[inline]
    pub(crate) fn params(&self) -> Arc<[ParamDescriptor]> {
        Arc::clone(&self.params)
    }

    pub(crate) fn invoke_constructor(
        &self,
        args: Vec<Option<Instance>>,
    ) -> std::result::Result<Box<dyn Any + Send + Sync>, BoxError> {
        match &self.construct {
            Some(construct) => construct(args),
            None => Err(Box::new(DiError::not_instantiable(
                &self.type_name,
                "no bound constructor",
            ))),
        }
    }

    pub(crate) fn set_property(
        &self,
        object: &mut (dyn Any + Send + Sync),
        property: &str,
        value: Instance,
    ) -> std::result::Result<(), BoxError> {
        let setter = self.setters.get(property).ok_or_else(|| -> BoxError {
            Box::new(DiError::invalid_config(format!(
                "type \"{}\" has no registered property \"${property}\"",
                self.type_name
            )))
        })?;
        setter(object, value)
    }

    pub(crate) fn call_method(
        &self,
        object: &mut (dyn Any + Send + Sync),
        method: &str,
        args: Vec<Instance>,
    ) -> std::result::Result<(), BoxError> {
        let bound = self.methods.get(method).ok_or_else(|| -> BoxError {
            Box::new(DiError::invalid_config(format!(
                "type \"{}\" has no registered method \"{method}()\"",
                self.type_name
            )))
        })?;
        bound(object, args)
    }
}

// =============================================================================
// Registration builder
// =============================================================================

/// Builder for one registry entry.
pub struct TypeRegistration {
    entry: TypeEntry,
}

impl TypeRegistration {
    /// Registration for a concrete type.
    pub fn new<T: Send + Sync + 'static>(type_name: impl Into<String>) -> Self {
        Self {
            entry: TypeEntry {
                type_name: type_name.into(),
                type_id: Some(TypeId::of::<T>()),
                interfaces: Vec::new(),
                params: Arc::from(Vec::new()),
                construct: None,
                setters: HashMap::new(),
                methods: HashMap::new(),
            },
        }
    }

    /// Registration for an interface name. Interfaces have no constructor;
    /// instantiating one directly fails with `NotInstantiable` unless an
    /// explicit definition binds it to an implementation.
    pub fn interface(type_name: impl Into<String>) -> Self {
        Self {
            entry: TypeEntry {
                type_name: type_name.into(),
                type_id: None,
                interfaces: Vec::new(),
                params: Arc::from(Vec::new()),
                construct: None,
                setters: HashMap::new(),
                methods: HashMap::new(),
            },
        }
    }

    /// Declare an interface this type implements, for instanceof checks.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.entry.interfaces.push(interface.into());
        self
    }

    /// Append a constructor parameter descriptor (declaration order).
    pub fn param(mut self, descriptor: ParamDescriptor) -> Self {
        let mut params: Vec<ParamDescriptor> = self.entry.params.to_vec();
        params.push(descriptor);
        self.entry.params = params.into();
        self
    }

    /// Bind the construction closure. Arguments arrive positionally, `None`
    /// standing in for null; a variadic tail arrives as one `Vec<Instance>`.
    pub fn constructor<T, F>(mut self, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Vec<Option<Instance>>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.entry.construct = Some(Box::new(move |args| {
            construct(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        }));
        self
    }

    /// Bind a named property setter (the `$name` marker in definitions).
    pub fn setter<T, F>(mut self, property: impl Into<String>, set: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut T, Instance) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let property = property.into();
        let label = property.clone();
        self.entry.setters.insert(
            property,
            Box::new(move |object, value| {
                let typed = object.downcast_mut::<T>().ok_or_else(|| -> BoxError {
                    Box::new(DiError::invalid_config(format!(
                        "property \"${label}\" applied to an object of a different type"
                    )))
                })?;
                set(typed, value)
            }),
        );
        self
    }

    /// Bind a named method (the `name()` marker in definitions).
    pub fn method<T, F>(mut self, method: impl Into<String>, call: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut T, Vec<Instance>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let method = method.into();
        let label = method.clone();
        self.entry.methods.insert(
            method,
            Box::new(move |object, args| {
                let typed = object.downcast_mut::<T>().ok_or_else(|| -> BoxError {
                    Box::new(DiError::invalid_config(format!(
                        "method \"{label}()\" applied to an object of a different type"
                    )))
                })?;
                call(typed, args)
            }),
        );
        self
    }
}

// =============================================================================
// TypeRegistry
// =============================================================================

/// Registry of constructible types, shared by every container that needs to
/// instantiate or introspect them.
pub struct TypeRegistry {
    entries: DashMap<String, Arc<TypeEntry>, RandomState>,
    names_by_id: DashMap<TypeId, String, RandomState>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            names_by_id: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register (or replace) one type entry.
    pub fn register(&self, registration: TypeRegistration) {
        let entry = Arc::new(registration.entry);

        #[cfg(feature = "logging")]
        tracing::debug!(
            target: "wirebox",
            type_name = %entry.type_name,
            instantiable = entry.is_instantiable(),
            "Registering type"
        );

        if let Some(type_id) = entry.type_id {
            self.names_by_id.insert(type_id, entry.type_name.clone());
        }
        self.entries.insert(entry.type_name.clone(), entry);
    }

    /// Register several entries at once.
    pub fn register_many(&self, registrations: impl IntoIterator<Item = TypeRegistration>) {
        for registration in registrations {
            self.register(registration);
        }
    }

    /// Whether a name is known to the registry (instantiable or not).
    #[inline]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub(crate) fn entry(&self, type_name: &str) -> Option<Arc<TypeEntry>> {
        self.entries.get(type_name).map(|entry| Arc::clone(&entry))
    }

    /// Instanceof check: the instance's concrete type either is the named
    /// type or declares it as an implemented interface.
    pub fn is_instance_of(&self, instance: &Instance, type_name: &str) -> bool {
        let concrete = instance.as_ref().type_id();
        if let Some(entry) = self.entries.get(type_name) {
            if entry.type_id == Some(concrete) {
                return true;
            }
        }
        let concrete_name = match self.names_by_id.get(&concrete) {
            Some(name) => name.clone(),
            None => return false,
        };
        self.entries
            .get(&concrete_name)
            .is_some_and(|entry| entry.interfaces.iter().any(|i| i == type_name))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIntrospector for TypeRegistry {
    fn constructor_parameters(&self, type_name: &str) -> Result<Arc<[ParamDescriptor]>> {
        let entry = self.entry(type_name).ok_or_else(|| {
            DiError::not_instantiable(type_name, "type is not registered")
        })?;
        if !entry.is_instantiable() {
            return Err(DiError::not_instantiable(
                type_name,
                "interface has no bound constructor",
            ));
        }
        Ok(entry.params())
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine {
        name: &'static str,
    }

    struct Car {
        engine: Arc<Engine>,
        color: String,
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Engine>("app.Engine")
                .implements("app.EngineInterface")
                .constructor::<Engine, _>(|_| Ok(Engine { name: "Mark One" })),
        );
        registry.register(
            TypeRegistration::new::<Car>("app.Car")
                .param(ParamDescriptor::class("engine", "app.Engine"))
                .constructor::<Car, _>(|args| {
                    let engine = args[0]
                        .clone()
                        .and_then(|value| value.downcast::<Engine>().ok())
                        .ok_or("missing engine")?;
                    Ok(Car {
                        engine,
                        color: String::new(),
                    })
                })
                .setter::<Car, _>("color", |car, value| {
                    car.color = value
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .ok_or("color must be a string")?;
                    Ok(())
                }),
        );
        registry
    }

    #[test]
    fn test_constructor_parameters() {
        let registry = registry();
        let params = registry.constructor_parameters("app.Car").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "engine");
    }

    #[test]
    fn test_unknown_type_is_not_instantiable() {
        let registry = registry();
        let err = registry.constructor_parameters("app.Ghost").unwrap_err();
        assert!(matches!(err, DiError::NotInstantiable { .. }));
    }

    #[test]
    fn test_interface_is_not_instantiable() {
        let registry = registry();
        registry.register(TypeRegistration::interface("app.EngineInterface"));
        let err = registry
            .constructor_parameters("app.EngineInterface")
            .unwrap_err();
        assert!(matches!(err, DiError::NotInstantiable { .. }));
    }

    #[test]
    fn test_construct_and_set_property() {
        let registry = registry();
        let engine: Instance = Arc::new(Engine { name: "Mark One" });
        let entry = registry.entry("app.Car").unwrap();

        let mut object = entry.invoke_constructor(vec![Some(engine)]).unwrap();
        entry
            .set_property(object.as_mut(), "color", Arc::new("red"))
            .unwrap();

        let car = object.downcast_ref::<Car>().unwrap();
        assert_eq!(car.color, "red");
        assert_eq!(car.engine.name, "Mark One");
    }

    #[test]
    fn test_unknown_property_is_config_error() {
        let registry = registry();
        let entry = registry.entry("app.Car").unwrap();
        let engine: Instance = Arc::new(Engine { name: "Mark One" });
        let mut object = entry.invoke_constructor(vec![Some(engine)]).unwrap();

        let err = entry
            .set_property(object.as_mut(), "wheels", Arc::new(4_i64))
            .unwrap_err();
        assert!(err.downcast_ref::<DiError>().is_some());
    }

    #[test]
    fn test_is_instance_of_concrete_and_interface() {
        let registry = registry();
        let engine: Instance = Arc::new(Engine { name: "Mark One" });

        assert!(registry.is_instance_of(&engine, "app.Engine"));
        assert!(registry.is_instance_of(&engine, "app.EngineInterface"));
        assert!(!registry.is_instance_of(&engine, "app.Car"));
    }
}
