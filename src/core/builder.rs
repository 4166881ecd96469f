use std::sync::Arc;

use crate::{
    core::{Engine, EngineConfig},
    env::{Fetcher, Namespaces, WatchedKeys},
    error::EngineError,
    events::Bus,
    process::{ChildProcess, Supervise},
    store::{EtcdClient, KvStore},
    subscribers::{LogWriter, Subscribe},
};

/// Builder for constructing an [`Engine`] from an [`EngineConfig`].
///
/// Without [`with_store`](Self::with_store) the engine talks to
/// [`EtcdClient`] on `cfg.endpoints`; without
/// [`with_process`](Self::with_process) it runs `cfg.command` as a
/// [`ChildProcess`].
pub struct EngineBuilder {
    cfg: EngineConfig,
    store: Option<Arc<dyn KvStore>>,
    process: Option<Box<dyn Supervise>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            store: None,
            process: None,
            subscribers: Vec::new(),
        }
    }

    /// Uses `store` instead of an [`EtcdClient`].
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `process` instead of a [`ChildProcess`].
    pub fn with_process<P: Supervise>(mut self, process: P) -> Self {
        self.process = Some(Box::new(process));
        self
    }

    /// Adds event subscribers next to the built-in [`LogWriter`].
    ///
    /// Subscribers receive engine events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Validates the configuration and wires the engine.
    ///
    /// Does not touch the store or spawn anything; that happens in
    /// [`Engine::run`].
    pub fn build(self) -> Result<Engine, EngineError> {
        let cfg = self.cfg;
        cfg.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => {
                if cfg.endpoints.is_empty() {
                    return Err(EngineError::invalid("at least one store endpoint is required"));
                }
                Arc::new(EtcdClient::new(cfg.endpoints.clone()))
            }
        };
        let process = match self.process {
            Some(process) => process,
            None => {
                if cfg.command.is_empty() {
                    return Err(EngineError::invalid("a command to run is required"));
                }
                Box::new(ChildProcess::new(cfg.command.clone(), cfg.grace))
            }
        };

        let bus = Bus::new(cfg.bus_capacity_clamped());
        let fetcher = Fetcher::new(
            Arc::clone(&store),
            Namespaces::new(cfg.namespaces.iter().cloned()),
            cfg.fetch_retry,
            bus.clone(),
        );

        let mut subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
        subscribers.extend(self.subscribers);

        Ok(Engine::new_internal(
            cfg.shutdown,
            fetcher,
            store,
            process,
            WatchedKeys::new(cfg.watched_keys.iter().cloned()),
            cfg.watch_retry,
            cfg.change_capacity_clamped(),
            bus,
            subscribers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ShutdownBehavior;

    fn cfg() -> EngineConfig {
        EngineConfig {
            namespaces: vec!["/app".into()],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_requires_command_without_custom_process() {
        let err = EngineBuilder::new(cfg()).build().err().unwrap();
        assert!(matches!(err, EngineError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_requires_endpoints_without_custom_store() {
        let cfg = EngineConfig {
            endpoints: Vec::new(),
            command: vec!["true".into()],
            ..cfg()
        };
        assert!(EngineBuilder::new(cfg).build().is_err());
    }

    #[test]
    fn test_builds_with_defaults() {
        let cfg = EngineConfig {
            command: vec!["true".into()],
            shutdown: ShutdownBehavior::Restart,
            ..cfg()
        };
        assert!(EngineBuilder::new(cfg).build().is_ok());
    }
}
