//! Definition storage with autoload fallback
//!
//! Maps service identifiers to definitions and answers the "is this
//! resolvable" probe. When no explicit definition exists but the identifier
//! names a constructible registered type whose required dependencies are all
//! transitively resolvable, a trivial definition is synthesized so future
//! lookups skip the probe.

use crate::container::DependencyContainer;
use crate::definition::Definition;
use crate::error::Result;
use crate::introspect::TypeRegistry;
use crate::resolver::{DependencyDescriptor, DependencyResolver};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Identifier-to-definition storage shared by one container.
pub struct DefinitionStorage {
    definitions: DashMap<String, Definition, RandomState>,
    resolver: DependencyResolver,
    delegate: Option<Arc<dyn DependencyContainer>>,
    /// Memoized probe verdicts; cleared whenever a definition is set
    resolvable: DashMap<String, bool, RandomState>,
    /// Ids being probed in the active call chain, for cycle detection
    probing: Mutex<Vec<String>>,
}

impl DefinitionStorage {
    pub fn new(registry: Arc<TypeRegistry>, delegate: Option<Arc<dyn DependencyContainer>>) -> Self {
        Self {
            definitions: DashMap::with_hasher(RandomState::new()),
            resolver: DependencyResolver::new(registry),
            delegate,
            resolvable: DashMap::with_hasher(RandomState::new()),
            probing: Mutex::new(Vec::new()),
        }
    }

    /// Store a definition. Any memoized resolvability verdict may now be
    /// stale (a new definition can satisfy previously-failing probes), so
    /// the memo table is dropped wholesale; registrations are rare.
    pub fn set(&self, id: &str, definition: Definition) {
        self.definitions.insert(id.to_string(), definition);
        self.resolvable.clear();
    }

    /// Fetch a definition by id (clone; definitions are immutable once stored).
    #[inline]
    pub fn get(&self, id: &str) -> Option<Definition> {
        self.definitions.get(id).map(|definition| definition.clone())
    }

    /// Whether an explicit definition exists (no probe).
    #[inline]
    pub fn has_definition(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Whether `id` is resolvable here: explicitly defined, or synthesizable
    /// via the autoload fallback. Must not instantiate anything.
    pub fn has(&self, id: &str) -> bool {
        self.has_definition(id) || self.probe(id)
    }

    /// Whether a dependency on `type_name` can be satisfied: definitions,
    /// autoload fallback, or the delegate container.
    pub fn is_resolvable(&self, type_name: &str) -> bool {
        if self.has_definition(type_name) || self.probe(type_name) {
            return true;
        }
        self.delegate
            .as_ref()
            .is_some_and(|delegate| delegate.has(type_name))
    }

    /// Constructor dependency descriptors for `type_name`, via the
    /// storage-owned resolver cache.
    pub(crate) fn constructor_dependencies(
        &self,
        type_name: &str,
    ) -> Result<Arc<[DependencyDescriptor]>> {
        self.resolver.resolve_constructor(type_name, self)
    }

    /// All ids with an explicit definition.
    pub fn ids(&self) -> Vec<String> {
        self.definitions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of stored definitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definitions are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    // =========================================================================
    // Resolvability probe
    // =========================================================================

    /// Probe state machine: Unknown -> Probing -> {Resolvable, Unresolvable}.
    ///
    /// Re-entering a probe for an id already in the active chain is a
    /// circular class dependency and fails that probe. Only the active call
    /// chain is protected; the id is unmarked on every exit so sibling
    /// probes are unaffected. Verdicts are memoized, and a successful probe
    /// records a trivial definition.
    fn probe(&self, id: &str) -> bool {
        if let Some(verdict) = self.resolvable.get(id) {
            return *verdict;
        }

        {
            let mut probing = self.probing.lock().unwrap();
            if probing.iter().any(|probed| probed == id) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "wirebox",
                    id = id,
                    "Probe re-entered: circular class dependency"
                );
                return false;
            }
            probing.push(id.to_string());
        }

        let verdict = self.compute_resolvable(id);

        {
            let mut probing = self.probing.lock().unwrap();
            if let Some(position) = probing.iter().rposition(|probed| probed == id) {
                probing.remove(position);
            }
        }

        self.resolvable.insert(id.to_string(), verdict);
        if verdict {
            self.definitions
                .entry(id.to_string())
                .or_insert_with(|| Definition::of_type(id));

            #[cfg(feature = "logging")]
            debug!(
                target: "wirebox",
                id = id,
                "Autoload fallback: synthesized trivial definition"
            );
        }
        verdict
    }

    fn compute_resolvable(&self, id: &str) -> bool {
        let descriptors = match self.resolver.resolve_constructor(id, self) {
            Ok(descriptors) => descriptors,
            // Not registered, not instantiable, or ambiguous: not resolvable
            Err(_) => return false,
        };

        descriptors.iter().all(|descriptor| match descriptor {
            DependencyDescriptor::Class {
                type_name,
                optional,
            } => *optional || self.is_resolvable(type_name),
            DependencyDescriptor::Invalid { .. } => false,
            DependencyDescriptor::Value(_) | DependencyDescriptor::Variadic => true,
        })
    }
}

impl std::fmt::Debug for DefinitionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionStorage")
            .field("definitions", &self.len())
            .field("has_delegate", &self.delegate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ParamDescriptor, TypeRegistration};

    struct Engine;
    struct Car;

    fn registry() -> Arc<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Engine>("app.Engine")
                .constructor::<Engine, _>(|_| Ok(Engine)),
        );
        registry.register(
            TypeRegistration::new::<Car>("app.Car")
                .param(ParamDescriptor::class("engine", "app.Engine"))
                .constructor::<Car, _>(|_| Ok(Car)),
        );
        Arc::new(registry)
    }

    #[test]
    fn test_probe_synthesizes_trivial_definition() {
        let storage = DefinitionStorage::new(registry(), None);

        assert!(!storage.has_definition("app.Car"));
        assert!(storage.has("app.Car"));
        // Second lookup skips the probe
        assert!(storage.has_definition("app.Car"));
    }

    #[test]
    fn test_unregistered_type_is_unresolvable() {
        let storage = DefinitionStorage::new(registry(), None);
        assert!(!storage.has("app.Ghost"));
    }

    #[test]
    fn test_untyped_defaultless_parameter_fails_probe() {
        struct Opaque;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Opaque>("app.Opaque")
                .param(ParamDescriptor::untyped("context"))
                .constructor::<Opaque, _>(|_| Ok(Opaque)),
        );
        let storage = DefinitionStorage::new(Arc::new(registry), None);

        assert!(!storage.has("app.Opaque"));
        assert!(!storage.has_definition("app.Opaque"));
    }

    #[test]
    fn test_circular_class_dependency_fails_probe() {
        struct A;
        struct B;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<A>("app.A")
                .param(ParamDescriptor::class("b", "app.B"))
                .constructor::<A, _>(|_| Ok(A)),
        );
        registry.register(
            TypeRegistration::new::<B>("app.B")
                .param(ParamDescriptor::class("a", "app.A"))
                .constructor::<B, _>(|_| Ok(B)),
        );
        let storage = DefinitionStorage::new(Arc::new(registry), None);

        assert!(!storage.has("app.A"));
        assert!(!storage.has("app.B"));
    }

    #[test]
    fn test_set_clears_stale_verdicts() {
        struct Holder;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Holder>("app.Holder")
                .param(ParamDescriptor::class("dep", "app.Missing"))
                .constructor::<Holder, _>(|_| Ok(Holder)),
        );
        let storage = DefinitionStorage::new(Arc::new(registry), None);

        assert!(!storage.has("app.Holder"));

        storage.set("app.Missing", Definition::value(1_i64));
        assert!(storage.has("app.Holder"));
    }

    #[test]
    fn test_nullable_dependency_is_an_escape() {
        struct Loose;

        let registry = TypeRegistry::new();
        registry.register(
            TypeRegistration::new::<Loose>("app.Loose")
                .param(ParamDescriptor::class("dep", "app.Missing").nullable())
                .constructor::<Loose, _>(|_| Ok(Loose)),
        );
        let storage = DefinitionStorage::new(Arc::new(registry), None);

        assert!(storage.has("app.Loose"));
    }
}
