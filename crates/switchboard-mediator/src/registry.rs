use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use switchboard_shared::SwitchboardError;

/// Type-erased single-handler registry keyed by `TypeId`, backing the
/// command and query processors. Exactly one handler may be registered per
/// concrete message type; a second registration is rejected rather than
/// silently overwriting the first.
///
/// `K` is the lookup key — the concrete command/query type — while `S` is
/// the value actually stored, typically `Arc<dyn CommandHandler<K>>`: a
/// handler trait object is itself a sized, `'static` value and so
/// qualifies for [`Any`] just like any other type, letting one map hold
/// handlers for arbitrarily many distinct message types.
///
/// A real source-generator front end would resolve handlers at compile
/// time; this registry is the runtime equivalent, trading static dispatch
/// for the ability to register handlers dynamically at startup.
#[derive(Debug, Default)]
pub struct SingleHandlerRegistry {
    handlers: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SingleHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: 'static, S: 'static + Send + Sync>(
        &self,
        type_name: &'static str,
        stored: S,
    ) -> Result<(), SwitchboardError> {
        let key = TypeId::of::<K>();
        match self.handlers.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(SwitchboardError::HandlerAlreadyRegistered { type_name })
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(stored));
                Ok(())
            }
        }
    }

    pub fn get<K: 'static, S: 'static + Send + Sync + Clone>(
        &self,
        type_name: &'static str,
    ) -> Result<S, SwitchboardError> {
        let key = TypeId::of::<K>();
        self.handlers
            .get(&key)
            .and_then(|entry| entry.value().downcast_ref::<S>().cloned())
            .ok_or(SwitchboardError::HandlerNotRegistered { type_name })
    }
}

/// Type-erased multi-handler registry backing the event bus: zero or more
/// handlers may be registered per event type, all invoked on publish.
#[derive(Debug, Default)]
pub struct MultiHandlerRegistry {
    handlers: DashMap<TypeId, Vec<Arc<dyn Any + Send + Sync>>>,
}

impl MultiHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: 'static, S: 'static + Send + Sync>(&self, stored: S) {
        let key = TypeId::of::<K>();
        self.handlers.entry(key).or_default().push(Arc::new(stored));
    }

    pub fn get_all<K: 'static, S: 'static + Send + Sync + Clone>(&self) -> Vec<S> {
        let key = TypeId::of::<K>();
        match self.handlers.get(&key) {
            Some(entries) => entries
                .value()
                .iter()
                .filter_map(|handler| handler.downcast_ref::<S>().cloned())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = SingleHandlerRegistry::new();
        registry.register::<u32, u32>("u32", 1u32).unwrap();
        let err = registry.register::<u32, u32>("u32", 2u32).unwrap_err();
        assert!(matches!(err, SwitchboardError::HandlerAlreadyRegistered { .. }));
    }

    #[test]
    fn missing_handler_is_reported() {
        let registry = SingleHandlerRegistry::new();
        let err = registry.get::<u32, u32>("u32").unwrap_err();
        assert!(matches!(err, SwitchboardError::HandlerNotRegistered { .. }));
    }

    #[test]
    fn registered_handler_round_trips() {
        let registry = SingleHandlerRegistry::new();
        registry.register::<u32, u32>("u32", 7u32).unwrap();
        assert_eq!(registry.get::<u32, u32>("u32").unwrap(), 7);
    }

    #[test]
    fn multi_registry_collects_all_handlers_for_a_type() {
        let registry = MultiHandlerRegistry::new();
        registry.register::<u32, u32>(1u32);
        registry.register::<u32, u32>(2u32);
        assert_eq!(registry.get_all::<u32, u32>().len(), 2);
    }

    #[test]
    fn multi_registry_returns_empty_for_unknown_type() {
        let registry = MultiHandlerRegistry::new();
        assert!(registry.get_all::<u32, u32>().is_empty());
    }
}
