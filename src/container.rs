//! Definition-driven dependency injection container
//!
//! The `Container` is the façade over the resolution engine. It owns the
//! definition storage, the singleton instance cache, the build-stack guard
//! used for cycle detection, the tag registry and the deferred providers.
//! `get` recursively drives the object builder; the builder calls back into
//! `get` to resolve references and inferred dependencies, which is how the
//! dependency graph closes.

use crate::builder::ObjectBuilder;
use crate::definition::{Definition, Instance, RawDefinition};
use crate::error::{DiError, Result};
use crate::introspect::TypeRegistry;
use crate::provider::{DeferredServiceProvider, ExtensionFn, ServiceProvider};
use crate::storage::DefinitionStorage;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// The resolution contract shared by every container flavor: plain,
/// composite and module-scoped containers all answer `get`/`has`, so any of
/// them can serve as another container's delegate.
pub trait DependencyContainer: Send + Sync {
    /// Resolve a service by id.
    fn get(&self, id: &str) -> Result<Instance>;

    /// Whether this container can resolve the id. Must not instantiate.
    fn has(&self, id: &str) -> bool;

    /// Drop cached instances, keeping definitions. Containers without a
    /// cache ignore it.
    fn reset(&self) {}
}

/// Definition-driven dependency injection container.
///
/// Cloning is shallow: clones share storage, cache and registry.
///
/// # Examples
///
/// ```rust
/// use wirebox::{Container, TypeRegistration, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// let registry = TypeRegistry::new();
/// registry.register(
///     TypeRegistration::new::<Clock>("app.Clock").constructor::<Clock, _>(|_| Ok(Clock)),
/// );
///
/// let container = Container::with_registry(Arc::new(registry));
/// container.set("clock", "app.Clock").unwrap();
///
/// let clock = container.get("clock").unwrap();
/// assert!(clock.downcast_ref::<Clock>().is_some());
/// ```
#[derive(Clone)]
pub struct Container {
    storage: Arc<DefinitionStorage>,
    builder: ObjectBuilder,
    registry: Arc<TypeRegistry>,
    /// Singleton cache: id -> built instance
    instances: Arc<DashMap<String, Instance, RandomState>>,
    /// Ids under construction in the active call stack
    building: Arc<Mutex<Vec<String>>>,
    /// Tag name -> ids, in registration order
    tags: Arc<DashMap<String, Vec<String>, RandomState>>,
    /// Id -> decorators applied after build, before caching
    extensions: Arc<DashMap<String, Vec<ExtensionFn>, RandomState>>,
    /// Providers not yet registered
    deferred: Arc<Mutex<Vec<Arc<dyn DeferredServiceProvider>>>>,
    delegate: Option<Arc<dyn DependencyContainer>>,
}

impl Container {
    /// Create an empty container with its own type registry.
    #[inline]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()))
    }

    /// Create an empty container over a shared type registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self::assemble(registry, None)
    }

    /// Start a fluent container builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn assemble(registry: Arc<TypeRegistry>, delegate: Option<Arc<dyn DependencyContainer>>) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            has_delegate = delegate.is_some(),
            "Creating container"
        );

        Self {
            storage: Arc::new(DefinitionStorage::new(
                Arc::clone(&registry),
                delegate.clone(),
            )),
            builder: ObjectBuilder::new(Arc::clone(&registry)),
            registry,
            instances: Arc::new(DashMap::with_hasher(RandomState::new())),
            building: Arc::new(Mutex::new(Vec::new())),
            tags: Arc::new(DashMap::with_hasher(RandomState::new())),
            extensions: Arc::new(DashMap::with_hasher(RandomState::new())),
            deferred: Arc::new(Mutex::new(Vec::new())),
            delegate,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Store a definition for `id`.
    ///
    /// Replaces any previous definition (including a reference, clearing the
    /// alias) and invalidates the cached instance so a later `get` rebuilds.
    pub fn set(&self, id: &str, definition: impl Into<RawDefinition>) -> Result<()> {
        let definition = Definition::normalize(definition.into(), Some(id))?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            id = id,
            kind = definition.kind(),
            "Storing definition"
        );

        if let Definition::Class(class) = &definition {
            for tag in &class.tags {
                self.add_tag(tag, id);
            }
        }
        self.storage.set(id, definition);
        self.instances.remove(id);
        Ok(())
    }

    /// Store several definitions at once, in iteration order.
    pub fn set_multiple<K>(
        &self,
        definitions: impl IntoIterator<Item = (K, RawDefinition)>,
    ) -> Result<()>
    where
        K: AsRef<str>,
    {
        for (id, raw) in definitions {
            self.set(id.as_ref(), raw)?;
        }
        Ok(())
    }

    /// Register a tag for an id. Tag order follows registration order.
    pub fn add_tag(&self, tag: &str, id: &str) {
        let mut ids = self.tags.entry(tag.to_string()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    /// Register a provider immediately, consuming its definitions and
    /// extensions once.
    pub fn add_provider<P>(&self, provider: &P) -> Result<()>
    where
        P: ServiceProvider + ?Sized,
    {
        for (id, raw) in provider.definitions() {
            self.set(&id, raw)?;
        }
        for (id, extension) in provider.extensions() {
            self.extensions.entry(id).or_default().push(extension);
        }
        Ok(())
    }

    /// Register a provider lazily; it is consumed when one of its declared
    /// ids is first requested through `get` or `has`.
    pub fn add_deferred_provider(&self, provider: Arc<dyn DeferredServiceProvider>) {
        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            provides = ?provider.provides(),
            "Queueing deferred provider"
        );

        self.deferred.lock().unwrap().push(provider);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a service by id.
    ///
    /// Aliases are chased first; a cached singleton is returned as-is;
    /// otherwise the definition is looked up (synthesized via the autoload
    /// fallback, or supplied by a just-activated deferred provider), built,
    /// decorated by extensions and memoized. When the id is absent locally,
    /// resolution falls through to the delegate without caching locally:
    /// the container that defines a service owns its singleton lifetime.
    pub fn get(&self, id: &str) -> Result<Instance> {
        let id = self.dereference(id)?;

        if let Some(existing) = self.instances.get(id.as_str()) {
            #[cfg(feature = "logging")]
            trace!(target: "wirebox", id = %id, "Returning cached instance");
            return Ok(Instance::clone(&existing));
        }

        let _guard = BuildGuard::enter(self, &id)?;

        self.activate_deferred(&id)?;

        let definition = self.storage.get(&id).or_else(|| {
            if self.storage.has(&id) {
                self.storage.get(&id)
            } else {
                None
            }
        });

        let Some(definition) = definition else {
            if let Some(delegate) = &self.delegate {
                #[cfg(feature = "logging")]
                trace!(target: "wirebox", id = %id, "Falling through to delegate");
                return delegate.get(&id);
            }
            return Err(DiError::not_found(&id, self.build_stack()));
        };

        let instance = self.builder.build(self, &id, &definition)?;
        let instance = self.apply_extensions(&id, instance)?;
        self.instances.insert(id.clone(), Instance::clone(&instance));

        #[cfg(feature = "logging")]
        debug!(target: "wirebox", id = %id, "Built and cached instance");

        Ok(instance)
    }

    /// Resolve and downcast to a concrete type.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        let instance = self.get(id)?;
        instance.downcast::<T>().map_err(|_| {
            DiError::invalid_config(format!(
                "service \"{id}\" is not of the requested type {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Resolve, returning `None` when the id is unknown.
    #[inline]
    pub fn try_get(&self, id: &str) -> Option<Instance> {
        self.get(id).ok()
    }

    /// Whether this container can resolve `id`: an explicit definition
    /// exists or the autoload probe succeeds. Never instantiates, and does
    /// not consult the delegate, so ownership stays observable.
    pub fn has(&self, id: &str) -> bool {
        if let Err(_err) = self.activate_deferred(id) {
            #[cfg(feature = "logging")]
            warn!(
                target: "wirebox",
                id = id,
                error = %_err,
                "Deferred provider failed to register during has()"
            );
            return false;
        }
        self.storage.has(id)
    }

    /// Ordered instances of every id registered under `tag`.
    pub fn get_tagged(&self, tag: &str) -> Result<Vec<Instance>> {
        self.resolve_tag(tag)
    }

    /// Drop all cached instances, keeping definitions, tags and providers.
    pub fn reset(&self) {
        let count = self.instances.len();
        self.instances.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            instances_dropped = count,
            "Container reset"
        );
        #[cfg(not(feature = "logging"))]
        let _ = count;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Ids with an explicit (or synthesized) definition.
    pub fn ids(&self) -> Vec<String> {
        self.storage.ids()
    }

    /// Number of stored definitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether no definitions are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The shared type registry.
    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    // =========================================================================
    // Internals
    // =========================================================================

    #[inline]
    pub(crate) fn storage(&self) -> &DefinitionStorage {
        &self.storage
    }

    /// Snapshot of the ids currently under construction, for diagnostics.
    pub(crate) fn build_stack(&self) -> Vec<String> {
        self.building.lock().unwrap().clone()
    }

    /// Chase reference definitions until a non-reference id; a revisited id
    /// is an alias cycle.
    fn dereference(&self, id: &str) -> Result<String> {
        let mut current = id.to_string();
        let mut seen: Vec<String> = Vec::new();
        while let Some(Definition::Reference(target)) = self.storage.get(&current) {
            seen.push(current.clone());
            if seen.iter().any(|visited| visited == &target) {
                let mut chain = seen;
                chain.push(target.clone());
                return Err(DiError::circular(target, chain));
            }
            current = target;
        }
        Ok(current)
    }

    /// Register every deferred provider that declares `id`, exactly once.
    fn activate_deferred(&self, id: &str) -> Result<()> {
        let matching: Vec<Arc<dyn DeferredServiceProvider>> = {
            let mut deferred = self.deferred.lock().unwrap();
            let mut matched = Vec::new();
            let mut index = 0;
            while index < deferred.len() {
                if deferred[index].provides().iter().any(|provided| provided == id) {
                    matched.push(deferred.remove(index));
                } else {
                    index += 1;
                }
            }
            matched
        };

        for provider in matching {
            #[cfg(feature = "logging")]
            debug!(
                target: "wirebox",
                id = id,
                "Activating deferred provider"
            );
            self.add_provider(provider.as_ref())?;
        }
        Ok(())
    }

    pub(crate) fn resolve_tag(&self, tag: &str) -> Result<Vec<Instance>> {
        let ids: Vec<String> = match self.tags.get(tag) {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => {
                return Err(DiError::not_found(format!("tag@{tag}"), self.build_stack()));
            }
        };
        ids.iter().map(|id| self.get(id)).collect()
    }

    fn apply_extensions(&self, id: &str, instance: Instance) -> Result<Instance> {
        let extensions: Option<Vec<ExtensionFn>> =
            self.extensions.get(id).map(|registered| registered.clone());
        let Some(extensions) = extensions else {
            return Ok(instance);
        };

        let mut decorated = instance;
        for extend in extensions {
            decorated = extend(self, decorated)?;
        }
        Ok(decorated)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyContainer for Container {
    fn get(&self, id: &str) -> Result<Instance> {
        Container::get(self, id)
    }

    fn has(&self, id: &str) -> bool {
        Container::has(self, id)
    }

    fn reset(&self) {
        Container::reset(self);
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.storage.len())
            .field("instances", &self.instances.len())
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

/// Marks an id as building for the duration of one `get`, unmarking on every
/// exit path. Re-entering for the same id is a circular reference.
struct BuildGuard<'a> {
    container: &'a Container,
    id: String,
}

impl<'a> BuildGuard<'a> {
    fn enter(container: &'a Container, id: &str) -> Result<Self> {
        let mut building = container.building.lock().unwrap();
        if building.iter().any(|active| active == id) {
            let mut chain = building.clone();
            chain.push(id.to_string());
            return Err(DiError::circular(id, chain));
        }
        building.push(id.to_string());
        Ok(Self {
            container,
            id: id.to_string(),
        })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut building = self.container.building.lock().unwrap();
        if let Some(position) = building.iter().rposition(|active| active == &self.id) {
            building.remove(position);
        }
    }
}

// =============================================================================
// Fluent construction
// =============================================================================

/// Fluent builder seeding a container with a registry, definitions,
/// providers and a delegate.
///
/// # Examples
///
/// ```rust
/// use wirebox::Container;
///
/// let container = Container::builder()
///     .with_definition("greeting", wirebox::RawDefinition::instance("hello"))
///     .build()
///     .unwrap();
/// assert!(container.has("greeting"));
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    registry: Option<Arc<TypeRegistry>>,
    definitions: Vec<(String, RawDefinition)>,
    providers: Vec<Box<dyn ServiceProvider>>,
    deferred: Vec<Arc<dyn DeferredServiceProvider>>,
    delegate: Option<Arc<dyn DependencyContainer>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a shared type registry.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Seed one definition.
    pub fn with_definition(mut self, id: impl Into<String>, raw: impl Into<RawDefinition>) -> Self {
        self.definitions.push((id.into(), raw.into()));
        self
    }

    /// Register a provider at build time.
    pub fn with_provider(mut self, provider: impl ServiceProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Queue a deferred provider.
    pub fn with_deferred_provider(mut self, provider: Arc<dyn DeferredServiceProvider>) -> Self {
        self.deferred.push(provider);
        self
    }

    /// Fall back to `delegate` for ids absent locally.
    pub fn with_delegate(mut self, delegate: Arc<dyn DependencyContainer>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Build the container, normalizing every seeded definition.
    pub fn build(self) -> Result<Container> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(TypeRegistry::new()));
        let container = Container::assemble(registry, self.delegate);
        for (id, raw) in self.definitions {
            container.set(&id, raw)?;
        }
        for provider in &self.providers {
            container.add_provider(provider.as_ref())?;
        }
        for provider in self.deferred {
            container.add_deferred_provider(provider);
        }
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionConfig, Reference};
    use crate::introspect::{ParamDescriptor, TypeRegistration};
    use std::sync::atomic::{AtomicU32, Ordering};

    const ENGINE_NAME: &str = "Mark One";

    struct EngineMarkOne;

    impl EngineMarkOne {
        fn name(&self) -> &'static str {
            ENGINE_NAME
        }
    }

    struct Car {
        engine: Instance,
    }

    fn test_registry() -> Arc<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry.register(TypeRegistration::interface("test.EngineInterface"));
        registry.register(
            TypeRegistration::new::<EngineMarkOne>("test.EngineMarkOne")
                .implements("test.EngineInterface")
                .constructor::<EngineMarkOne, _>(|_| Ok(EngineMarkOne)),
        );
        registry.register(
            TypeRegistration::new::<Car>("test.Car")
                .param(ParamDescriptor::class("engine", "test.EngineInterface"))
                .constructor::<Car, _>(|mut args| {
                    let engine = args.remove(0).ok_or("engine is required")?;
                    Ok(Car { engine })
                }),
        );
        Arc::new(registry)
    }

    fn container() -> Container {
        Container::with_registry(test_registry())
    }

    #[test]
    fn test_singleton_identity() {
        let container = container();
        container.set("engine", "test.EngineMarkOne").unwrap();

        let first = container.get("engine").unwrap();
        let second = container.get("engine").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_car_scenario() {
        let container = container();
        container
            .set(
                "car",
                DefinitionConfig::of("test.Car").with_constructor([Reference::to("engine")]),
            )
            .unwrap();
        container.set("engine", "test.EngineMarkOne").unwrap();

        let car = container.get_as::<Car>("car").unwrap();
        let engine = car.engine.downcast_ref::<EngineMarkOne>().unwrap();
        assert_eq!(engine.name(), ENGINE_NAME);
    }

    #[test]
    fn test_autoload_fallback() {
        let container = container();
        // No definition stored, but the type name is constructible
        let engine = container.get("test.EngineMarkOne").unwrap();
        assert!(engine.downcast_ref::<EngineMarkOne>().is_some());
    }

    #[test]
    fn test_interface_dependency_resolved_through_binding() {
        let container = container();
        container
            .set("test.EngineInterface", "test.EngineMarkOne")
            .unwrap();

        // Car's constructor dependency on the interface resolves through
        // the explicit binding; no definition for the car itself is needed.
        let car = container.get_as::<Car>("test.Car").unwrap();
        assert!(car.engine.downcast_ref::<EngineMarkOne>().is_some());
    }

    #[test]
    fn test_not_found() {
        let container = container();
        let err = container.get("missing").unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
    }

    #[test]
    fn test_untyped_defaultless_parameter() {
        struct Opaque;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Opaque>("test.Opaque")
                .param(ParamDescriptor::untyped("context"))
                .constructor::<Opaque, _>(|_| Ok(Opaque)),
        );
        let container = Container::with_registry(Arc::new(registry));

        assert!(!container.has("test.Opaque"));
        let err = container.get("test.Opaque").unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
    }

    #[test]
    fn test_circular_class_dependencies() {
        struct A;
        struct B;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<A>("test.A")
                .param(ParamDescriptor::class("b", "test.B"))
                .constructor::<A, _>(|_| Ok(A)),
        );
        registry.register(
            TypeRegistration::new::<B>("test.B")
                .param(ParamDescriptor::class("a", "test.A"))
                .constructor::<B, _>(|_| Ok(B)),
        );
        let container = Container::with_registry(Arc::new(registry));
        container.set("test.A", "test.A").unwrap();
        container.set("test.B", "test.B").unwrap();

        let err = container.get("test.A").unwrap_err();
        assert!(matches!(err, DiError::CircularReference { .. }));
        // The failed build never partially constructs or caches anything
        assert!(container.instances.is_empty());
        assert!(container.build_stack().is_empty());
    }

    #[test]
    fn test_alias_chasing() {
        let container = container();
        container.set("x", Reference::to("y")).unwrap();
        container.set("y", "test.EngineMarkOne").unwrap();

        let via_alias = container.get("x").unwrap();
        assert!(via_alias.downcast_ref::<EngineMarkOne>().is_some());
        // Alias and target share the singleton
        let direct = container.get("y").unwrap();
        assert!(Arc::ptr_eq(&via_alias, &direct));
    }

    #[test]
    fn test_reference_cycle() {
        let container = container();
        container.set("engine1", Reference::to("engine2")).unwrap();
        container.set("engine2", Reference::to("engine3")).unwrap();
        container.set("engine3", Reference::to("engine1")).unwrap();

        let err = container.get("engine1").unwrap_err();
        match err {
            DiError::CircularReference { chain, .. } => {
                assert_eq!(chain.len(), 4);
                assert_eq!(chain.first(), chain.last());
            }
            other => panic!("expected circular reference, got {other:?}"),
        }
    }

    #[test]
    fn test_override_precedence() {
        struct Row {
            first: i64,
            second: i64,
        }

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Row>("test.Row")
                .param(ParamDescriptor::builtin("first", "int").with_default(1_i64))
                .param(ParamDescriptor::builtin("second", "int").with_default(2_i64))
                .constructor::<Row, _>(|args| {
                    let int_at = |value: &Option<Instance>| {
                        value
                            .as_ref()
                            .and_then(|v| v.downcast_ref::<i64>().copied())
                            .ok_or("expected an int")
                    };
                    Ok(Row {
                        first: int_at(&args[0])?,
                        second: int_at(&args[1])?,
                    })
                }),
        );
        let container = Container::with_registry(Arc::new(registry));
        container
            .set(
                "row",
                DefinitionConfig::of("test.Row").with_argument(0, Definition::value(10_i64)),
            )
            .unwrap();

        let row = container.get_as::<Row>("row").unwrap();
        assert_eq!(row.first, 10);
        assert_eq!(row.second, 2);
    }

    #[test]
    fn test_delegate_fallback_does_not_cache_locally() {
        let parent = container();
        parent.set("engine", "test.EngineMarkOne").unwrap();

        let child = Container::builder()
            .with_registry(test_registry())
            .with_delegate(Arc::new(parent.clone()))
            .build()
            .unwrap();

        let from_child = child.get("engine").unwrap();
        let from_parent = parent.get("engine").unwrap();
        assert!(Arc::ptr_eq(&from_child, &from_parent));

        // The parent owns the singleton; the child neither caches nor claims it
        assert!(!child.has("engine"));
        assert!(child.instances.is_empty());
    }

    #[test]
    fn test_set_invalidates_cached_instance() {
        let container = container();
        container.set("n", RawDefinition::instance(1_i64)).unwrap();
        assert_eq!(*container.get_as::<i64>("n").unwrap(), 1);

        container.set("n", RawDefinition::instance(2_i64)).unwrap();
        assert_eq!(*container.get_as::<i64>("n").unwrap(), 2);
    }

    #[test]
    fn test_value_definition_preserves_identity() {
        let container = container();
        let value: Instance = Arc::new(EngineMarkOne);
        container
            .set("engine", RawDefinition::Instance(Instance::clone(&value)))
            .unwrap();

        let resolved = container.get("engine").unwrap();
        assert!(Arc::ptr_eq(&resolved, &value));
    }

    #[test]
    fn test_callable_definition() {
        let container = container();
        container
            .set(
                "engine",
                RawDefinition::callable(|_| Ok(Arc::new(EngineMarkOne) as Instance)),
            )
            .unwrap();

        let first = container.get("engine").unwrap();
        let second = container.get("engine").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_callable_error_is_wrapped_with_build_context() {
        let container = container();
        container
            .set("boom", RawDefinition::callable(|_| Err("kaput".into())))
            .unwrap();

        let err = container.get("boom").unwrap_err();
        match err {
            DiError::Building { id, source, .. } => {
                assert_eq!(id, "boom");
                assert_eq!(source.to_string(), "kaput");
            }
            other => panic!("expected Building, got {other:?}"),
        }
        // Guaranteed cleanup even on failure
        assert!(container.build_stack().is_empty());
    }

    #[test]
    fn test_tag_ordering() {
        let container = container();
        for id in ["first", "second", "third"] {
            container
                .set(
                    id,
                    DefinitionConfig::of("test.EngineMarkOne").with_tags(["engine"]),
                )
                .unwrap();
        }

        let tagged = container.get_tagged("engine").unwrap();
        assert_eq!(tagged.len(), 3);
        let first = container.get("first").unwrap();
        assert!(Arc::ptr_eq(&tagged[0], &first));
    }

    #[test]
    fn test_unknown_tag_is_not_found() {
        let container = container();
        let err = container.get_tagged("nothing").unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
    }

    #[test]
    fn test_deferred_provider_registers_exactly_once() {
        struct LazyProvider {
            registrations: Arc<AtomicU32>,
        }

        impl ServiceProvider for LazyProvider {
            fn definitions(&self) -> Vec<(String, RawDefinition)> {
                self.registrations.fetch_add(1, Ordering::SeqCst);
                vec![("greeting".into(), RawDefinition::instance("hello"))]
            }
        }

        impl DeferredServiceProvider for LazyProvider {
            fn provides(&self) -> Vec<String> {
                vec!["greeting".into()]
            }
        }

        let registrations = Arc::new(AtomicU32::new(0));
        let container = container();
        container.add_deferred_provider(Arc::new(LazyProvider {
            registrations: Arc::clone(&registrations),
        }));

        // Unrelated lookups leave the provider untouched
        assert!(!container.has("something-else"));
        assert_eq!(registrations.load(Ordering::SeqCst), 0);

        assert!(container.has("greeting"));
        assert_eq!(registrations.load(Ordering::SeqCst), 1);

        let greeting = container.get_as::<&str>("greeting").unwrap();
        assert_eq!(*greeting, "hello");
        assert_eq!(registrations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extensions_decorate_before_caching() {
        struct Extended;

        impl ServiceProvider for Extended {
            fn definitions(&self) -> Vec<(String, RawDefinition)> {
                vec![("n".into(), RawDefinition::instance(1_i64))]
            }

            fn extensions(&self) -> Vec<(String, ExtensionFn)> {
                vec![(
                    "n".into(),
                    Arc::new(|_container, instance| {
                        let n = *instance.downcast_ref::<i64>().unwrap();
                        Ok(Arc::new(n + 1) as Instance)
                    }),
                )]
            }
        }

        let container = container();
        container.add_provider(&Extended).unwrap();

        assert_eq!(*container.get_as::<i64>("n").unwrap(), 2);
    }

    #[test]
    fn test_reset_clears_instances_only() {
        let container = container();
        container.set("engine", "test.EngineMarkOne").unwrap();

        let before = container.get("engine").unwrap();
        container.reset();
        let after = container.get("engine").unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(container.has("engine"));
    }

    #[test]
    fn test_get_as_type_mismatch() {
        let container = container();
        container.set("engine", "test.EngineMarkOne").unwrap();

        let err = container.get_as::<i64>("engine").unwrap_err();
        assert!(matches!(err, DiError::InvalidConfig { .. }));
    }
}
