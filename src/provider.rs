//! Service providers
//!
//! Providers bundle related definitions and extensions for registration as a
//! unit. A deferred provider additionally declares which ids it would
//! provide; its registration is postponed until one of those ids is first
//! requested.

use crate::container::Container;
use crate::definition::{Instance, RawDefinition};
use crate::error::Result;
use std::sync::Arc;

/// Decorator applied to an instance after it is built, before it is cached.
pub type ExtensionFn = Arc<dyn Fn(&Container, Instance) -> Result<Instance> + Send + Sync>;

/// A bundle of definitions and extensions registered as a unit.
///
/// Both methods are consumed exactly once, at registration time.
///
/// # Examples
///
/// ```rust
/// use wirebox::{RawDefinition, ServiceProvider};
///
/// struct MailModule;
///
/// impl ServiceProvider for MailModule {
///     fn definitions(&self) -> Vec<(String, RawDefinition)> {
///         vec![("mailer".into(), "app.SmtpMailer".into())]
///     }
/// }
/// ```
pub trait ServiceProvider: Send + Sync {
    /// Definitions to store, in registration order.
    fn definitions(&self) -> Vec<(String, RawDefinition)> {
        Vec::new()
    }

    /// Extensions decorating instances built for the given ids.
    fn extensions(&self) -> Vec<(String, ExtensionFn)> {
        Vec::new()
    }
}

/// A provider whose registration is postponed until one of its declared ids
/// is first requested through `get` or `has`.
pub trait DeferredServiceProvider: ServiceProvider {
    /// Ids this provider would provide.
    fn provides(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyProvider;

    impl ServiceProvider for EmptyProvider {}

    #[test]
    fn test_default_provider_is_empty() {
        let provider = EmptyProvider;
        assert!(provider.definitions().is_empty());
        assert!(provider.extensions().is_empty());
    }
}
