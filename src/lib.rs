//! # Wirebox - Definition-Driven Dependency Injection for Rust
//!
//! A dependency injection container that turns declarative definitions into
//! fully-wired object graphs: services are registered under string ids with
//! construction recipes, dependencies resolve transitively, singletons are
//! memoized, and cycles are detected instead of looping.
//!
//! ## Features
//!
//! - 🧩 **Declarative definitions** - class recipes, factories, references, tags and values
//! - 🔍 **Registry introspection** - constructor dependencies inferred from registered metadata
//! - ♻️ **Autoload fallback** - constructible types resolve without an explicit definition
//! - 🔗 **Cycle detection** - reference chains and re-entrant builds fail fast, never hang
//! - 💤 **Deferred providers** - definition bundles registered on first request
//! - 🏗️ **Composable containers** - delegate fallback, priority chains, namespaced modules
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use wirebox::{Container, DefinitionConfig, Reference, TypeRegistration, TypeRegistry};
//! use std::sync::Arc;
//!
//! struct Engine;
//! struct Car { engine: Arc<Engine> }
//!
//! let registry = TypeRegistry::new();
//! registry.register(
//!     TypeRegistration::new::<Engine>("app.Engine").constructor::<Engine, _>(|_| Ok(Engine)),
//! );
//! registry.register(
//!     TypeRegistration::new::<Car>("app.Car")
//!         .param(wirebox::ParamDescriptor::class("engine", "app.Engine"))
//!         .constructor::<Car, _>(|mut args| {
//!             let engine = args
//!                 .remove(0)
//!                 .and_then(|value| value.downcast::<Engine>().ok())
//!                 .ok_or("engine is required")?;
//!             Ok(Car { engine })
//!         }),
//! );
//!
//! let container = Container::with_registry(Arc::new(registry));
//! container.set("engine", "app.Engine").unwrap();
//! container
//!     .set(
//!         "car",
//!         DefinitionConfig::of("app.Car").with_constructor([Reference::to("engine")]),
//!     )
//!     .unwrap();
//!
//! let car = container.get_as::<Car>("car").unwrap();
//! let engine = container.get_as::<Engine>("engine").unwrap();
//! assert!(Arc::ptr_eq(&car.engine, &engine));
//! ```
//!
//! ## Definitions
//!
//! A definition describes how to produce one service:
//!
//! - a **string** is a class name, instantiated with inferred dependencies
//! - a [`DefinitionConfig`] adds explicit constructor arguments, method
//!   calls (`name()` marker), property assignments (`$name` marker) and tags
//! - [`Reference::to`] redirects one id to another
//! - [`Definition::tagged`] resolves to every instance under a tag, in
//!   registration order
//! - a **callable** builds the instance from the container
//! - an **instance** is returned as-is, identity preserved
//!
//! ## Resolution
//!
//! `get(id)` chases aliases, consults the singleton cache, activates
//! deferred providers, looks up (or synthesizes) the definition and builds
//! the graph recursively. Missing ids fall through to an optional delegate
//! container whose own cache keeps ownership of the singleton. Errors carry
//! the build stack for diagnostics.

mod builder;
mod composite;
mod container;
mod definition;
mod error;
mod introspect;
#[cfg(feature = "logging")]
pub mod logging;
mod modules;
mod provider;
mod resolver;
mod storage;

pub use composite::*;
pub use container::*;
pub use definition::*;
pub use error::*;
pub use introspect::*;
pub use modules::*;
pub use provider::*;
pub use resolver::*;
pub use storage::*;

// Re-export tracing macros for convenience when logging is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Container, ContainerBuilder, Definition, DefinitionConfig, DeferredServiceProvider,
        DependencyContainer, DiError, Instance, ParamDescriptor, RawDefinition, Reference, Result,
        ServiceProvider, TypeRegistration, TypeRegistry,
    };
    pub use std::sync::Arc;
}
