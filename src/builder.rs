//! Object graph construction
//!
//! The builder turns a definition into an instance. Class definitions pull
//! their inferred dependency list from the resolver, let explicit arguments
//! override it slot-for-slot, resolve every argument (recursing through the
//! container for references and nested definitions), construct the object,
//! then apply post-construction actions in declaration order. Construction
//! and `Container::get` are mutually recursive; that recursion is how the
//! dependency graph unwinds.

use crate::container::Container;
use crate::definition::{Action, ClassDefinition, Definition, Instance};
use crate::error::{DiError, Result};
use crate::introspect::TypeRegistry;
use crate::resolver::DependencyDescriptor;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

#[derive(Clone)]
pub(crate) struct ObjectBuilder {
    registry: Arc<TypeRegistry>,
}

impl ObjectBuilder {
    pub(crate) fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// Build one instance from a definition.
    ///
    /// Foreign errors raised by user code (factories, constructors, setters,
    /// methods) are wrapped with build-stack context here; container-native
    /// errors propagate unwrapped.
    pub(crate) fn build(
        &self,
        container: &Container,
        id: &str,
        definition: &Definition,
    ) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "wirebox",
            id = id,
            kind = definition.kind(),
            "Building instance"
        );

        match definition {
            Definition::Value(instance) => Ok(Arc::clone(instance)),
            Definition::Reference(target) => container.get(target),
            Definition::TagReference(tag) => {
                let instances = container.resolve_tag(tag)?;
                Ok(Arc::new(instances) as Instance)
            }
            Definition::Callable(callable) => callable
                .invoke(container)
                .map_err(|err| DiError::building(id, container.build_stack(), err)),
            Definition::Class(class) => self.build_class(container, id, class),
        }
    }

    fn build_class(
        &self,
        container: &Container,
        id: &str,
        class: &ClassDefinition,
    ) -> Result<Instance> {
        let entry = self.registry.entry(&class.type_name).ok_or_else(|| {
            DiError::not_instantiable(&class.type_name, "type is not registered")
        })?;
        if !entry.is_instantiable() {
            return Err(DiError::not_instantiable(
                &class.type_name,
                "interface has no bound constructor",
            ));
        }

        let descriptors = container.storage().constructor_dependencies(&class.type_name)?;
        let mut arguments: Vec<Option<Instance>> = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.iter().enumerate() {
            // A variadic tail collects every remaining explicit argument.
            if matches!(descriptor, DependencyDescriptor::Variadic) {
                let mut tail = Vec::new();
                for argument in class.arguments.range(index..).map(|(_, a)| a) {
                    tail.push(self.resolve_argument(container, id, argument)?);
                }
                arguments.push(Some(Arc::new(tail) as Instance));
                continue;
            }

            // Explicit entries replace inferred dependencies index-for-index.
            if let Some(explicit) = class.arguments.get(&index) {
                let value = self.resolve_argument(container, id, explicit)?;
                if let DependencyDescriptor::Class { type_name, .. } = descriptor {
                    self.check_instance_of(&value, type_name, &class.type_name)?;
                }
                arguments.push(Some(value));
                continue;
            }

            match descriptor {
                DependencyDescriptor::Class {
                    type_name,
                    optional,
                } => match container.get(type_name) {
                    Ok(value) => {
                        self.check_instance_of(&value, type_name, &class.type_name)?;
                        arguments.push(Some(value));
                    }
                    Err(DiError::NotFound { .. }) if *optional => arguments.push(None),
                    Err(err) => return Err(err),
                },
                DependencyDescriptor::Value(value) => arguments.push(value.clone()),
                DependencyDescriptor::Invalid { param } => {
                    return Err(DiError::invalid_config(format!(
                        "cannot resolve parameter \"{param}\" of \"{}\": \
                         no declared class type and no default",
                        class.type_name
                    )));
                }
                DependencyDescriptor::Variadic => unreachable!("handled above"),
            }
        }

        let mut object = entry
            .invoke_constructor(arguments)
            .map_err(|err| DiError::building(id, container.build_stack(), err))?;

        for action in &class.actions {
            match action {
                Action::Property(property, value) => {
                    let value = self.resolve_argument(container, id, value)?;
                    entry
                        .set_property(object.as_mut(), property, value)
                        .map_err(|err| DiError::building(id, container.build_stack(), err))?;
                }
                Action::MethodCall(method, argument_defs) => {
                    let mut args = Vec::with_capacity(argument_defs.len());
                    for definition in argument_defs {
                        args.push(self.resolve_argument(container, id, definition)?);
                    }
                    entry
                        .call_method(object.as_mut(), method, args)
                        .map_err(|err| DiError::building(id, container.build_stack(), err))?;
                }
            }
        }

        Ok(Arc::from(object))
    }

    /// Resolve one argument in place: literals pass through, references go
    /// through the container, nested definitions build anonymously.
    fn resolve_argument(
        &self,
        container: &Container,
        id: &str,
        definition: &Definition,
    ) -> Result<Instance> {
        self.build(container, id, definition)
    }

    fn check_instance_of(&self, value: &Instance, expected: &str, owner: &str) -> Result<()> {
        if self.registry.is_instance_of(value, expected) {
            Ok(())
        } else {
            Err(DiError::invalid_config(format!(
                "dependency of \"{owner}\" resolved to a value that is not an instance of \"{expected}\""
            )))
        }
    }
}

impl std::fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBuilder").finish()
    }
}
