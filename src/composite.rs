//! Composite containers
//!
//! A `CompositeContainer` chains several containers under priority rules:
//! the most recently attached container is consulted first, and the first
//! container that can resolve an id wins.

use crate::container::DependencyContainer;
use crate::definition::Instance;
use crate::error::{DiError, Result};
use std::sync::{Arc, RwLock};

#[cfg(feature = "logging")]
use tracing::debug;

/// Ordered chain of containers, most recently attached first.
///
/// # Examples
///
/// ```rust
/// use wirebox::{CompositeContainer, Container, RawDefinition};
/// use std::sync::Arc;
///
/// let defaults = Container::new();
/// defaults.set("greeting", RawDefinition::instance("hello")).unwrap();
///
/// let overrides = Container::new();
/// overrides.set("greeting", RawDefinition::instance("hi")).unwrap();
///
/// let composite = CompositeContainer::new();
/// composite.attach(Arc::new(defaults));
/// composite.attach(Arc::new(overrides));
///
/// let greeting = composite.get("greeting").unwrap();
/// assert_eq!(*greeting.downcast_ref::<&str>().unwrap(), "hi");
/// ```
pub struct CompositeContainer {
    containers: RwLock<Vec<Arc<dyn DependencyContainer>>>,
}

impl CompositeContainer {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
        }
    }

    /// Attach a container with the highest priority.
    pub fn attach(&self, container: Arc<dyn DependencyContainer>) {
        let mut containers = self.containers.write().unwrap();
        containers.insert(0, container);

        #[cfg(feature = "logging")]
        debug!(
            target: "wirebox",
            attached = containers.len(),
            "Attached container to composite"
        );
    }

    /// Detach a previously attached container.
    pub fn detach(&self, container: &Arc<dyn DependencyContainer>) {
        let mut containers = self.containers.write().unwrap();
        containers.retain(|attached| !Arc::ptr_eq(attached, container));
    }

    /// Number of attached containers.
    pub fn len(&self) -> usize {
        self.containers.read().unwrap().len()
    }

    /// Whether no containers are attached.
    pub fn is_empty(&self) -> bool {
        self.containers.read().unwrap().is_empty()
    }

    /// Resolve from the first attached container that can supply the id.
    /// The winning container's failure propagates as-is.
    pub fn get(&self, id: &str) -> Result<Instance> {
        let containers = self.containers.read().unwrap().clone();
        for container in containers {
            if container.has(id) {
                return container.get(id);
            }
        }
        Err(DiError::not_found(id, Vec::new()))
    }

    /// Whether any attached container can resolve the id.
    pub fn has(&self, id: &str) -> bool {
        let containers = self.containers.read().unwrap().clone();
        containers.iter().any(|container| container.has(id))
    }

    /// Cascade a reset to every attached container that supports one.
    pub fn reset(&self) {
        let containers = self.containers.read().unwrap().clone();
        for container in containers {
            container.reset();
        }
    }
}

impl Default for CompositeContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyContainer for CompositeContainer {
    fn get(&self, id: &str) -> Result<Instance> {
        CompositeContainer::get(self, id)
    }

    fn has(&self, id: &str) -> bool {
        CompositeContainer::has(self, id)
    }

    fn reset(&self) {
        CompositeContainer::reset(self);
    }
}

impl std::fmt::Debug for CompositeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeContainer")
            .field("attached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::definition::RawDefinition;

    fn value_container(id: &str, value: i64) -> Arc<Container> {
        let container = Container::new();
        container.set(id, RawDefinition::instance(value)).unwrap();
        Arc::new(container)
    }

    #[test]
    fn test_most_recently_attached_wins() {
        let first = value_container("svc", 1);
        let second = value_container("svc", 2);

        let composite = CompositeContainer::new();
        composite.attach(first.clone());
        composite.attach(second.clone());

        let resolved = composite.get("svc").unwrap();
        assert_eq!(*resolved.downcast_ref::<i64>().unwrap(), 2);
    }

    #[test]
    fn test_detach_restores_previous_priority() {
        let first = value_container("svc", 1);
        let second = value_container("svc", 2);

        let composite = CompositeContainer::new();
        let first_dyn: Arc<dyn DependencyContainer> = first;
        let second_dyn: Arc<dyn DependencyContainer> = second;
        composite.attach(first_dyn.clone());
        composite.attach(second_dyn.clone());

        composite.detach(&second_dyn);
        let resolved = composite.get("svc").unwrap();
        assert_eq!(*resolved.downcast_ref::<i64>().unwrap(), 1);
    }

    #[test]
    fn test_has_checks_every_attached_container() {
        let composite = CompositeContainer::new();
        composite.attach(value_container("a", 1));
        composite.attach(value_container("b", 2));

        assert!(composite.has("a"));
        assert!(composite.has("b"));
        assert!(!composite.has("c"));
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let composite = CompositeContainer::new();
        composite.attach(value_container("a", 1));

        let err = composite.get("missing").unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
    }

    #[test]
    fn test_reset_cascades() {
        struct Token;

        let container = Container::new();
        container
            .set(
                "token",
                RawDefinition::callable(|_| Ok(Arc::new(Token) as Instance)),
            )
            .unwrap();
        let container = Arc::new(container);

        let composite = CompositeContainer::new();
        composite.attach(container.clone());

        let before = composite.get("token").unwrap();
        composite.reset();
        let after = composite.get("token").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
