//! Constructor dependency resolution
//!
//! For each constructor parameter the resolver decides once whether it is a
//! class dependency (resolved through the container), a literal/default
//! value, or unresolvable. The decision list is cached per type name for the
//! lifetime of the resolver instance, since constructor signatures cannot change
//! during a run. The cache is owned by the resolver, not process-global, so
//! containers never leak descriptor state into each other.

use crate::definition::Instance;
use crate::error::{DiError, Result};
use crate::introspect::{ParamDefault, ParamDescriptor, TypeHint, TypeIntrospector};
use crate::storage::DefinitionStorage;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Per-parameter resolution decision.
#[derive(Clone)]
pub enum DependencyDescriptor {
    /// Must resolve via the container to an instance of `type_name`; when
    /// `optional`, a missing service yields null instead of an error
    Class { type_name: String, optional: bool },
    /// Yields the carried literal unconditionally (`None` is null)
    Value(Option<Instance>),
    /// Collects surplus explicit definition arguments
    Variadic,
    /// Resolving this parameter is always an error
    Invalid { param: String },
}

impl std::fmt::Debug for DependencyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyDescriptor::Class {
                type_name,
                optional,
            } => f
                .debug_struct("Class")
                .field("type_name", type_name)
                .field("optional", optional)
                .finish(),
            DependencyDescriptor::Value(value) => f
                .debug_tuple("Value")
                .field(&value.as_ref().map(|_| "..."))
                .finish(),
            DependencyDescriptor::Variadic => f.write_str("Variadic"),
            DependencyDescriptor::Invalid { param } => {
                f.debug_tuple("Invalid").field(param).finish()
            }
        }
    }
}

/// Decides and caches constructor dependency descriptors per type name.
pub struct DependencyResolver {
    introspector: Arc<dyn TypeIntrospector>,
    cache: DashMap<String, Arc<[DependencyDescriptor]>, RandomState>,
}

impl DependencyResolver {
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self {
            introspector,
            cache: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Descriptor list for `type_name`'s constructor.
    ///
    /// Union-typed parameters are probed against `storage` (definitions and
    /// delegate): a single resolvable member wins; several resolvable
    /// members are rejected as ambiguous and need an explicit binding.
    pub fn resolve_constructor(
        &self,
        type_name: &str,
        storage: &DefinitionStorage,
    ) -> Result<Arc<[DependencyDescriptor]>> {
        if let Some(cached) = self.cache.get(type_name) {
            return Ok(Arc::clone(&cached));
        }

        let params = self.introspector.constructor_parameters(type_name)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "wirebox",
            type_name = type_name,
            params = params.len(),
            "Resolving constructor dependencies"
        );

        let mut descriptors = Vec::with_capacity(params.len());
        for param in params.iter() {
            descriptors.push(Self::decide(param, storage)?);
        }
        let descriptors: Arc<[DependencyDescriptor]> = descriptors.into();

        self.cache
            .insert(type_name.to_string(), Arc::clone(&descriptors));
        Ok(descriptors)
    }

    fn decide(param: &ParamDescriptor, storage: &DefinitionStorage) -> Result<DependencyDescriptor> {
        if param.variadic {
            return Ok(DependencyDescriptor::Variadic);
        }
        match &param.hint {
            TypeHint::Class(type_name) => Ok(DependencyDescriptor::Class {
                type_name: type_name.clone(),
                optional: param.nullable || matches!(param.default, ParamDefault::Null),
            }),
            TypeHint::Union(members) => Self::decide_union(param, members, storage),
            TypeHint::Builtin(_) | TypeHint::None => Ok(Self::value_escape(param)),
        }
    }

    /// Union parameters: each member is probed independently. Exactly one
    /// resolvable member wins; several need an explicit disambiguating
    /// binding; none falls back to the default/null escape.
    fn decide_union(
        param: &ParamDescriptor,
        members: &[String],
        storage: &DefinitionStorage,
    ) -> Result<DependencyDescriptor> {
        let resolvable: Vec<&String> = members
            .iter()
            .filter(|member| storage.is_resolvable(member))
            .collect();

        match resolvable.as_slice() {
            [single] => Ok(DependencyDescriptor::Class {
                type_name: (*single).clone(),
                optional: param.nullable || matches!(param.default, ParamDefault::Null),
            }),
            [] => Ok(Self::value_escape(param)),
            many => Err(DiError::invalid_config(format!(
                "union parameter \"{}\" is ambiguous: {} members are resolvable ({}); \
                 bind one of them explicitly",
                param.name,
                many.len(),
                many.iter()
                    .map(|member| member.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Default/null escape for non-class parameters; untyped or builtin
    /// parameters with no way out are unresolvable.
    fn value_escape(param: &ParamDescriptor) -> DependencyDescriptor {
        match &param.default {
            ParamDefault::Value(value) => DependencyDescriptor::Value(Some(Arc::clone(value))),
            ParamDefault::Null => DependencyDescriptor::Value(None),
            ParamDefault::None if param.nullable => DependencyDescriptor::Value(None),
            ParamDefault::None => DependencyDescriptor::Invalid {
                param: param.name.clone(),
            },
        }
    }
}

impl std::fmt::Debug for DependencyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResolver")
            .field("cached_types", &self.cache.len())
            .finish()
    }
}
