//! Namespace-scoped module containers
//!
//! A `ModuleContainer` partitions definitions by namespace prefix and builds
//! one sub-container per namespace lazily, on first use. An id is resolved
//! by the module with the longest matching namespace prefix, falling back to
//! an explicit default-owner map, then to the single module that defines the
//! id. Two modules claiming the same id with no prefix winner is a
//! configuration error, never a silent first-registered pick.

use crate::container::{Container, DependencyContainer};
use crate::definition::{Instance, RawDefinition};
use crate::error::{DiError, Result};
use crate::introspect::TypeRegistry;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[cfg(feature = "logging")]
use tracing::debug;

struct Module {
    namespace: String,
    /// Ids this module explicitly defines, known before the lazy build
    ids: Vec<String>,
    pending: Mutex<Option<Vec<(String, RawDefinition)>>>,
    container: OnceCell<Container>,
}

impl Module {
    fn defines(&self, id: &str) -> bool {
        self.ids.iter().any(|defined| defined == id)
    }

    /// Build the sub-container on first use. Definitions are registered
    /// here, but nothing is instantiated.
    fn container(&self, registry: &Arc<TypeRegistry>) -> Result<&Container> {
        self.container.get_or_try_init(|| {
            #[cfg(feature = "logging")]
            debug!(
                target: "wirebox",
                namespace = %self.namespace,
                definitions = self.ids.len(),
                "Building module sub-container"
            );

            let definitions = self.pending.lock().unwrap().take().unwrap_or_default();
            let container = Container::with_registry(Arc::clone(registry));
            container.set_multiple(definitions)?;
            Ok(container)
        })
    }
}

/// Container composed of namespace-scoped modules.
///
/// # Examples
///
/// ```rust
/// use wirebox::{ModuleContainer, RawDefinition};
///
/// let container = ModuleContainer::builder()
///     .with_module(
///         "app.db.",
///         [("app.db.dsn", RawDefinition::instance("postgres://localhost"))],
///     )
///     .build();
///
/// assert!(container.has("app.db.dsn"));
/// ```
pub struct ModuleContainer {
    registry: Arc<TypeRegistry>,
    modules: Vec<Module>,
    /// id -> owning namespace, consulted when no prefix matches
    default_owners: HashMap<String, String>,
}

impl ModuleContainer {
    /// Start a module container builder.
    pub fn builder() -> ModuleContainerBuilder {
        ModuleContainerBuilder::new()
    }

    /// Resolve a service through its owning module.
    pub fn get(&self, id: &str) -> Result<Instance> {
        match self.owner_of(id)? {
            Some(module) => module.container(&self.registry)?.get(id),
            None => Err(DiError::not_found(id, Vec::new())),
        }
    }

    /// Whether some module owns and can resolve the id.
    pub fn has(&self, id: &str) -> bool {
        match self.owner_of(id) {
            Ok(Some(module)) => module
                .container(&self.registry)
                .map(|container| container.has(id))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Cascade a reset to every module container built so far.
    pub fn reset(&self) {
        for module in &self.modules {
            if let Some(container) = module.container.get() {
                container.reset();
            }
        }
    }

    /// Find the module owning `id`.
    ///
    /// Longest-matching-namespace-prefix wins; a duplicate namespace
    /// registration makes the match ambiguous. With no prefix match the
    /// default-owner map decides, then the single module that explicitly
    /// defines the id; several defining modules are a configuration error.
    fn owner_of(&self, id: &str) -> Result<Option<&Module>> {
        let mut best: Option<&Module> = None;
        for module in &self.modules {
            if !id.starts_with(module.namespace.as_str()) {
                continue;
            }
            match best {
                Some(current) if current.namespace.len() == module.namespace.len() => {
                    return Err(DiError::invalid_config(format!(
                        "id \"{id}\" is claimed by namespace \"{}\" more than once",
                        module.namespace
                    )));
                }
                Some(current) if current.namespace.len() > module.namespace.len() => {}
                _ => best = Some(module),
            }
        }
        if best.is_some() {
            return Ok(best);
        }

        if let Some(namespace) = self.default_owners.get(id) {
            let module = self
                .modules
                .iter()
                .find(|module| &module.namespace == namespace)
                .ok_or_else(|| {
                    DiError::invalid_config(format!(
                        "default owner of \"{id}\" names unknown namespace \"{namespace}\""
                    ))
                })?;
            return Ok(Some(module));
        }

        let mut definers = self.modules.iter().filter(|module| module.defines(id));
        let first = definers.next();
        if let Some(owner) = first {
            if let Some(conflicting) = definers.next() {
                return Err(DiError::invalid_config(format!(
                    "id \"{id}\" is defined by both \"{}\" and \"{}\"; declare a default owner",
                    owner.namespace, conflicting.namespace
                )));
            }
        }
        Ok(first)
    }
}

impl DependencyContainer for ModuleContainer {
    fn get(&self, id: &str) -> Result<Instance> {
        ModuleContainer::get(self, id)
    }

    fn has(&self, id: &str) -> bool {
        ModuleContainer::has(self, id)
    }

    fn reset(&self) {
        ModuleContainer::reset(self);
    }
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("modules", &self.modules.len())
            .finish()
    }
}

/// Builder assembling a [`ModuleContainer`] from namespaced definition sets.
#[derive(Default)]
pub struct ModuleContainerBuilder {
    registry: Option<Arc<TypeRegistry>>,
    modules: Vec<Module>,
    default_owners: HashMap<String, String>,
}

impl ModuleContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share one type registry across every module.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a module owning a namespace prefix with its definitions.
    pub fn with_module<K: Into<String>>(
        mut self,
        namespace: impl Into<String>,
        definitions: impl IntoIterator<Item = (K, RawDefinition)>,
    ) -> Self {
        let definitions: Vec<(String, RawDefinition)> = definitions
            .into_iter()
            .map(|(id, raw)| (id.into(), raw))
            .collect();
        self.modules.push(Module {
            namespace: namespace.into(),
            ids: definitions.iter().map(|(id, _)| id.clone()).collect(),
            pending: Mutex::new(Some(definitions)),
            container: OnceCell::new(),
        });
        self
    }

    /// Declare which namespace owns an id that matches no prefix.
    pub fn with_default_owner(
        mut self,
        id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.default_owners.insert(id.into(), namespace.into());
        self
    }

    pub fn build(self) -> ModuleContainer {
        ModuleContainer {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(TypeRegistry::new())),
            modules: self.modules,
            default_owners: self.default_owners,
        }
    }
}
