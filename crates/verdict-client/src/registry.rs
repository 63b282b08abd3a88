//! Instance registry
//!
//! Owns every live engine instance and hands out numeric handles for them.
//! Handles are issued monotonically from 1 and never reused, which is what lets
//! a lookup tell a released handle apart from one that was never issued.
//!
//! Release paths:
//! - [`Instance::destroy`] / [`InstanceRegistry::destroy`] - the primary path
//! - dropping an [`Instance`] - backstop, no timing guarantee
//!
//! Either way the engine's `shut_down` runs exactly once, when the last
//! in-flight call holding the instance returns.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use verdict_core::{BootstrapConfig, DecisionEngine, EngineFactory, Result, VerdictError};

/// Numeric handle bound to one engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wrap a raw handle value, e.g. one received over an FFI boundary
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine instance plus the handle it lives under. Shutting down on drop ties
/// release to the last reference rather than to the `destroy` call.
pub(crate) struct EngineSlot {
    id: InstanceId,
    engine: Box<dyn DecisionEngine>,
}

impl EngineSlot {
    pub(crate) fn engine(&self) -> &dyn DecisionEngine {
        self.engine.as_ref()
    }
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        self.engine.shut_down();
        tracing::debug!(handle = %self.id, "engine instance shut down");
    }
}

struct RegistryInner {
    factory: Box<dyn EngineFactory>,
    next_id: AtomicU64,
    live: RwLock<HashMap<InstanceId, Arc<EngineSlot>>>,
}

/// Creates, tracks and destroys engine instances.
///
/// Cloning is cheap and yields another view of the same registry.
#[derive(Clone)]
pub struct InstanceRegistry {
    inner: Arc<RegistryInner>,
}

impl InstanceRegistry {
    /// Create a registry that builds engines with `factory`
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                factory: Box::new(factory),
                next_id: AtomicU64::new(1),
                live: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Validate `config` and start a new engine instance.
    pub fn create(&self, config: &BootstrapConfig) -> Result<Instance> {
        config.validate()?;
        let rendered = config.to_json()?;
        let engine = self
            .inner
            .factory
            .create(&rendered)
            .map_err(VerdictError::engine_init_failed)?;

        let id = InstanceId(self.inner.next_id.fetch_add(1, Ordering::AcqRel));
        self.inner
            .live
            .write()
            .insert(id, Arc::new(EngineSlot { id, engine }));

        tracing::debug!(
            handle = %id,
            application = %config.application_name,
            "engine instance created"
        );
        Ok(Instance::new(id, self.clone()))
    }

    /// Like [`create`](Self::create), reading `VERDICT_<KEY>` environment
    /// variables first and layering `overrides` on top.
    pub fn create_from_environment(&self, overrides: &Map<String, Value>) -> Result<Instance> {
        let config = BootstrapConfig::from_env_with(overrides)?;
        self.create(&config)
    }

    /// Create an instance, run `f` with it, and destroy it afterwards.
    pub fn with_instance<T, F>(&self, config: &BootstrapConfig, f: F) -> Result<T>
    where
        F: FnOnce(&Instance) -> Result<T>,
    {
        let instance = self.create(config)?;
        let outcome = f(&instance);
        instance.destroy();
        outcome
    }

    /// Release the instance behind `id`. Unknown or already released handles
    /// are ignored.
    pub fn destroy(&self, id: InstanceId) {
        let removed = self.inner.live.write().remove(&id);
        match removed {
            Some(slot) => {
                tracing::debug!(handle = %id, "engine instance destroyed");
                drop(slot);
            }
            None => tracing::trace!(handle = %id, "destroy of inactive handle ignored"),
        }
    }

    /// Whether `id` currently maps to a live instance
    pub fn is_live(&self, id: InstanceId) -> bool {
        self.inner.live.read().contains_key(&id)
    }

    /// Handles of every live instance, ascending
    pub fn live_handles(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self.inner.live.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a handle. The lock is released before the engine is called.
    pub(crate) fn slot(&self, id: InstanceId) -> Result<Arc<EngineSlot>> {
        if let Some(slot) = self.inner.live.read().get(&id) {
            return Ok(Arc::clone(slot));
        }
        let issued = id.0 != 0 && id.0 < self.inner.next_id.load(Ordering::Acquire);
        if issued {
            Err(VerdictError::HandleReleased { handle: id.0 })
        } else {
            Err(VerdictError::UnknownHandle { handle: id.0 })
        }
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("live", &self.live_handles())
            .field("next_id", &self.inner.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

/// Owning guard for one engine instance.
///
/// Call [`destroy`](Self::destroy) when done. Dropping the guard releases the
/// instance too, but only as a safety net.
pub struct Instance {
    id: InstanceId,
    registry: InstanceRegistry,
    released: bool,
}

impl Instance {
    fn new(id: InstanceId, registry: InstanceRegistry) -> Self {
        Self {
            id,
            registry,
            released: false,
        }
    }

    /// The numeric handle of this instance
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The registry that owns this instance
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Release the instance now.
    pub fn destroy(mut self) {
        self.registry.destroy(self.id);
        self.released = true;
    }

    /// Give up the guard and keep the instance alive under its raw handle.
    /// The caller becomes responsible for [`InstanceRegistry::destroy`].
    pub fn into_raw(mut self) -> InstanceId {
        self.released = true;
        self.id
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.registry.is_live(self.id) {
            tracing::warn!(
                handle = %self.id,
                "instance dropped without destroy; releasing it now"
            );
        }
        self.registry.destroy(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use verdict_core::EngineResult;

    struct CountingEngine {
        shutdowns: Arc<AtomicUsize>,
    }

    impl DecisionEngine for CountingEngine {
        fn authorize(&self, _: &str) -> EngineResult<String> {
            Err("not scripted".into())
        }
        fn authorize_unsigned(&self, _: &str) -> EngineResult<String> {
            Err("not scripted".into())
        }
        fn authorize_multi_issuer(&self, _: &str) -> EngineResult<String> {
            Err("not scripted".into())
        }
        fn pop_logs(&self) -> Vec<String> {
            Vec::new()
        }
        fn get_log_by_id(&self, _: &str) -> String {
            String::new()
        }
        fn get_log_ids(&self) -> Vec<String> {
            Vec::new()
        }
        fn get_logs_by_tag(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn get_logs_by_request_id(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn get_logs_by_request_id_and_tag(&self, _: &str, _: &str) -> Vec<String> {
            Vec::new()
        }
        fn push_data(&self, _: &str, _: &str, _: Option<Duration>) -> EngineResult<()> {
            Ok(())
        }
        fn get_data(&self, _: &str) -> EngineResult<Option<String>> {
            Ok(None)
        }
        fn get_data_entry(&self, _: &str) -> EngineResult<Option<String>> {
            Ok(None)
        }
        fn remove_data(&self, _: &str) -> EngineResult<bool> {
            Ok(false)
        }
        fn clear_data(&self) -> EngineResult<()> {
            Ok(())
        }
        fn list_data(&self) -> EngineResult<String> {
            Ok("[]".into())
        }
        fn data_stats(&self) -> EngineResult<String> {
            Err("not scripted".into())
        }
        fn shut_down(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> (InstanceRegistry, Arc<AtomicUsize>) {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&shutdowns);
        let factory = move |_: &str| -> EngineResult<Box<dyn DecisionEngine>> {
            Ok(Box::new(CountingEngine {
                shutdowns: Arc::clone(&counter),
            }))
        };
        let registry = InstanceRegistry::new(factory);
        (registry, shutdowns)
    }

    #[test]
    fn handles_are_sequential_and_never_reused() {
        let (registry, _) = registry();
        let config = BootstrapConfig::new("TestApp");

        let first = registry.create(&config).unwrap();
        let second = registry.create(&config).unwrap();
        assert_eq!(first.id().get(), 1);
        assert_eq!(second.id().get(), 2);

        first.destroy();
        let third = registry.create(&config).unwrap();
        assert_eq!(third.id().get(), 3);
        assert_eq!(registry.live_handles(), [second.id(), third.id()]);
    }

    #[test]
    fn released_and_unknown_handles_are_distinguished() {
        let (registry, _) = registry();
        let id = registry.create(&BootstrapConfig::new("TestApp")).unwrap().into_raw();

        assert!(registry.slot(id).is_ok());
        registry.destroy(id);

        assert!(matches!(
            registry.slot(id),
            Err(VerdictError::HandleReleased { handle: 1 })
        ));
        assert!(matches!(
            registry.slot(InstanceId::from_raw(42)),
            Err(VerdictError::UnknownHandle { handle: 42 })
        ));
        assert!(matches!(
            registry.slot(InstanceId::from_raw(0)),
            Err(VerdictError::UnknownHandle { handle: 0 })
        ));
    }

    #[test]
    fn shutdown_waits_for_in_flight_references() {
        let (registry, shutdowns) = registry();
        let instance = registry.create(&BootstrapConfig::new("TestApp")).unwrap();

        let in_flight = registry.slot(instance.id()).unwrap();
        instance.destroy();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);

        drop(in_flight);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_error_is_engine_init_failed() {
        let registry = InstanceRegistry::new(|_: &str| -> EngineResult<Box<dyn DecisionEngine>> {
            Err("policy store not found".into())
        });
        let err = registry
            .create(&BootstrapConfig::new("TestApp"))
            .unwrap_err();
        assert_eq!(
            err,
            VerdictError::engine_init_failed("policy store not found")
        );
        assert!(registry.live_handles().is_empty());
    }
}
