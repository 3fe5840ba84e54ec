//! Explicit worker factory map: configuration names a kind tag, the registry
//! turns it into a fresh worker instance.

use std::collections::BTreeMap;

use crate::core::errors::{OpsError, Result};

use super::{Consumer, Producer};

type ProducerFactory = Box<dyn Fn() -> Box<dyn Producer> + Send + Sync>;
type ConsumerFactory = Box<dyn Fn() -> Box<dyn Consumer> + Send + Sync>;

/// Kind tag → constructor, for both worker roles.
#[derive(Default)]
pub struct WorkerRegistry {
    producers: BTreeMap<String, ProducerFactory>,
    consumers: BTreeMap<String, ConsumerFactory>,
}

impl WorkerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the workers shipped in [`crate::builtin`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        registry
    }

    /// Register (or replace) a producer kind.
    pub fn register_producer<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Producer> + Send + Sync + 'static,
    {
        self.producers.insert(kind.into(), Box::new(factory));
        self
    }

    /// Register (or replace) a consumer kind.
    pub fn register_consumer<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Consumer> + Send + Sync + 'static,
    {
        self.consumers.insert(kind.into(), Box::new(factory));
        self
    }

    /// Instantiate the producer registered as `kind` for `section`.
    ///
    /// # Errors
    /// [`OpsError::UnknownWorker`] if no such kind is registered.
    pub fn producer(&self, section: &str, kind: &str) -> Result<Box<dyn Producer>> {
        self.producers
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| unknown("producer", section, kind))
    }

    /// Instantiate the consumer registered as `kind` for `section`.
    ///
    /// # Errors
    /// [`OpsError::UnknownWorker`] if no such kind is registered.
    pub fn consumer(&self, section: &str, kind: &str) -> Result<Box<dyn Consumer>> {
        self.consumers
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| unknown("consumer", section, kind))
    }

    /// Registered producer kinds, sorted.
    pub fn producer_kinds(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    /// Registered consumer kinds, sorted.
    pub fn consumer_kinds(&self) -> impl Iterator<Item = &str> {
        self.consumers.keys().map(String::as_str)
    }
}

fn unknown(role: &'static str, section: &str, kind: &str) -> OpsError {
    OpsError::UnknownWorker {
        role,
        section: section.to_string(),
        kind: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_role() {
        let registry = WorkerRegistry::with_builtins();
        assert_eq!(
            registry.producer_kinds().collect::<Vec<_>>(),
            vec!["heartbeat", "schedule"]
        );
        assert_eq!(
            registry.consumer_kinds().collect::<Vec<_>>(),
            vec!["journal", "log"]
        );
        assert!(registry.producer("uptime", "heartbeat").is_ok());
        assert!(registry.consumer("audit", "journal").is_ok());
    }

    #[test]
    fn unknown_kind_is_a_discovery_error() {
        let registry = WorkerRegistry::with_builtins();
        let Err(err) = registry.producer("probe", "ping") else {
            panic!("ping is not a registered producer");
        };
        assert_eq!(err.code(), "OPS-3001");
        assert!(err.to_string().contains("\"probe\""));

        // Roles are separate namespaces.
        assert!(registry.consumer("x", "heartbeat").is_err());
    }
}
