use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::handlers::QueryHandler;

/// Mode-keyed directory of reporting handlers.
///
/// Cloning shares the same table. Build a fresh instance for isolation.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<DashMap<String, Arc<dyn QueryHandler>>>,
}

impl HandlerRegistry {
    /// Stores `handler` under its mode, replacing and returning any previous one.
    ///
    /// Replacement is logged, not rejected: reloading a handler set re-registers.
    pub fn register(&self, handler: Arc<dyn QueryHandler>) -> Option<Arc<dyn QueryHandler>> {
        let mode = handler.mode().to_string();
        let previous = self.inner.insert(mode.clone(), handler);
        match &previous {
            Some(replaced) => warn!(
                target: "report_router_core",
                mode = %mode,
                replaced = %replaced.source_label(),
                "handler re-registered; previous entry replaced"
            ),
            None => debug!(target: "report_router_core", mode = %mode, "handler registered"),
        }
        previous
    }

    pub fn register_handler<H>(&self, handler: H) -> Option<Arc<dyn QueryHandler>>
    where
        H: QueryHandler + 'static,
    {
        self.register(Arc::new(handler))
    }

    #[must_use]
    pub fn get(&self, mode: &str) -> Option<Arc<dyn QueryHandler>> {
        self.inner.get(mode).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, mode: &str) -> bool {
        self.inner.contains_key(mode)
    }

    /// Registered modes, sorted.
    #[must_use]
    pub fn modes(&self) -> Vec<String> {
        let mut modes: Vec<String> = self.inner.iter().map(|entry| entry.key().clone()).collect();
        modes.sort();
        modes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("modes", &self.modes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ResourceHandler;

    #[test]
    fn second_registration_wins() {
        let registry = HandlerRegistry::default();
        let first = registry.register_handler(
            ResourceHandler::new("subjects", "subjects").with_source_label("first"),
        );
        let second = registry.register_handler(
            ResourceHandler::new("subjects", "subjects").with_source_label("second"),
        );

        assert!(first.is_none());
        assert_eq!(second.map(|old| old.source_label().to_string()), Some("first".into()));
        let current = registry.get("subjects").expect("registered");
        assert_eq!(current.source_label(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_mode_is_none() {
        let registry = HandlerRegistry::default();
        assert!(registry.get("tags").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn modes_are_sorted() {
        let registry = HandlerRegistry::default();
        registry.register_handler(ResourceHandler::new("votes", "votes"));
        registry.register_handler(ResourceHandler::new("roles", "roles"));
        assert_eq!(registry.modes(), vec!["roles", "votes"]);
    }

    #[test]
    fn clones_share_one_table() {
        let registry = HandlerRegistry::default();
        let view = registry.clone();
        registry.register_handler(ResourceHandler::new("tags", "tags"));
        assert!(view.contains("tags"));
    }

    #[test]
    fn reads_overlap_registration() {
        let registry = HandlerRegistry::default();
        std::thread::scope(|scope| {
            let writer = registry.clone();
            scope.spawn(move || {
                for round in 0..200 {
                    writer.register_handler(
                        ResourceHandler::new("tags", "tags").with_source_label(format!("v{round}")),
                    );
                }
            });
            for _ in 0..4 {
                let reader = registry.clone();
                scope.spawn(move || {
                    for _ in 0..200 {
                        if let Some(handler) = reader.get("tags") {
                            assert_eq!(handler.mode(), "tags");
                            assert!(handler.source_label().starts_with('v'));
                        }
                    }
                });
            }
        });
        assert_eq!(registry.len(), 1);
    }
}
