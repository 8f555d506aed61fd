//! Handler and interceptor storage.
//!
//! Both registries keep their lists behind a `parking_lot::RwLock` and hand
//! out snapshots, so dispatch never runs user code while holding a lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::interceptor::{Interceptor, InterceptorId};
use crate::registration::{HandlerId, Registration};

// =============================================================================
// Handlers
// =============================================================================

struct Channel<P, R> {
    event: String,
    handlers: Vec<Arc<Registration<P, R>>>,
}

/// Per-event handler lists, kept in first-registration order of the events.
pub(crate) struct HandlerRegistry<P, R> {
    channels: RwLock<Vec<Channel<P, R>>>,
}

impl<P, R> Default for HandlerRegistry<P, R> {
    fn default() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
        }
    }
}

impl<P, R> HandlerRegistry<P, R> {
    /// Appends a registration to its event, re-sorting the list when the new
    /// registration carries a priority.
    pub fn insert(&self, registration: Arc<Registration<P, R>>) {
        let mut channels = self.channels.write();
        let index = match channels
            .iter()
            .position(|c| c.event == registration.event())
        {
            Some(index) => index,
            None => {
                channels.push(Channel {
                    event: registration.event().to_owned(),
                    handlers: Vec::new(),
                });
                channels.len() - 1
            }
        };

        let sort = registration.priority().is_some();
        let handlers = &mut channels[index].handlers;
        handlers.push(registration);
        if sort {
            // Stable: equal priorities keep insertion order, unprioritised sort last.
            handlers.sort_by_key(|r| r.priority().map_or(i64::MAX, i64::from));
        }
    }

    /// Removes a registration by id. Returns `false` if `event` has no such id.
    pub fn remove(&self, event: &str, id: HandlerId) -> bool {
        let mut channels = self.channels.write();
        let Some(index) = channels.iter().position(|c| c.event == event) else {
            return false;
        };

        let handlers = &mut channels[index].handlers;
        let before = handlers.len();
        handlers.retain(|r| r.id() != id);
        let removed = handlers.len() != before;

        if handlers.is_empty() {
            channels.remove(index);
            trace!(event = %event, "channel removed");
        }
        removed
    }

    /// Registrations an emission of `event` reaches.
    ///
    /// Without `namespace` only the exact event matches. With it, every event
    /// that extends `event` by at least one more `:`-separated segment matches,
    /// but `event` itself does not.
    pub fn resolve(&self, event: &str, namespace: bool) -> Vec<Arc<Registration<P, R>>> {
        let channels = self.channels.read();
        channels
            .iter()
            .filter(|c| {
                if namespace {
                    extends_namespace(&c.event, event)
                } else {
                    c.event == event
                }
            })
            .flat_map(|c| c.handlers.iter().cloned())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.channels
            .read()
            .iter()
            .find(|c| c.event == event)
            .map_or(0, |c| c.handlers.len())
    }

    pub fn events(&self) -> Vec<String> {
        self.channels.read().iter().map(|c| c.event.clone()).collect()
    }
}

fn extends_namespace(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return !candidate.is_empty();
    }
    let Some(rest) = candidate.strip_prefix(prefix) else {
        return false;
    };
    if prefix.ends_with(':') {
        !rest.is_empty()
    } else {
        rest.len() > 1 && rest.starts_with(':')
    }
}

// =============================================================================
// Interceptors
// =============================================================================

/// Per-event interceptor lists.
pub(crate) struct InterceptorRegistry<P> {
    by_event: RwLock<HashMap<String, Vec<Interceptor<P>>>>,
}

impl<P> Default for InterceptorRegistry<P> {
    fn default() -> Self {
        Self {
            by_event: RwLock::new(HashMap::new()),
        }
    }
}

impl<P: Clone> InterceptorRegistry<P> {
    pub fn add(&self, event: &str, interceptor: Interceptor<P>) {
        self.by_event
            .write()
            .entry(event.to_owned())
            .or_default()
            .push(interceptor);
    }

    pub fn remove(&self, event: &str, id: InterceptorId) -> bool {
        let mut by_event = self.by_event.write();
        let Some(list) = by_event.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|i| i.id() != id);
        let removed = list.len() != before;
        if list.is_empty() {
            by_event.remove(event);
        }
        removed
    }

    /// Runs every interceptor of `event` against `payload`, in registration order.
    pub fn apply(&self, event: &str, payload: &mut P) {
        let snapshot = match self.by_event.read().get(event) {
            Some(list) => list.clone(),
            None => return,
        };
        for interceptor in &snapshot {
            interceptor.apply(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::registration::HandlerOptions;

    fn reg(id: u64, event: &str, priority: Option<i32>) -> Arc<Registration<u32, u32>> {
        let mut options = HandlerOptions::new();
        if let Some(p) = priority {
            options = options.priority(p);
        }
        Arc::new(Registration::new(
            HandlerId(id),
            event.into(),
            Handler::sync(|n: u32| n),
            options,
        ))
    }

    fn ids(regs: &[Arc<Registration<u32, u32>>]) -> Vec<u64> {
        regs.iter().map(|r| r.id().get()).collect()
    }

    #[test]
    fn test_priority_sorting_is_stable() {
        let registry = HandlerRegistry::default();
        registry.insert(reg(1, "A", None));
        registry.insert(reg(2, "A", Some(5)));
        registry.insert(reg(3, "A", Some(1)));
        registry.insert(reg(4, "A", Some(5)));
        registry.insert(reg(5, "A", None));

        // 5 was inserted without a priority, so no re-sort ran after it.
        assert_eq!(ids(&registry.resolve("A", false)), vec![3, 2, 4, 1, 5]);
    }

    #[test]
    fn test_namespace_matches_deeper_segments_only() {
        let registry = HandlerRegistry::default();
        registry.insert(reg(1, "A", None));
        registry.insert(reg(2, "A:B", None));
        registry.insert(reg(3, "A:B:C", None));
        registry.insert(reg(4, "A:BC", None));
        registry.insert(reg(5, "B:A", None));

        assert_eq!(ids(&registry.resolve("A", true)), vec![2, 3, 4]);
        assert_eq!(ids(&registry.resolve("A:B", true)), vec![3]);
        assert_eq!(ids(&registry.resolve("A:", true)), vec![2, 3, 4]);
        assert_eq!(ids(&registry.resolve("A", false)), vec![1]);
    }

    #[test]
    fn test_empty_namespace_matches_every_named_event() {
        let registry = HandlerRegistry::default();
        registry.insert(reg(1, "A", None));
        registry.insert(reg(2, "", None));
        registry.insert(reg(3, "B:C", None));

        assert_eq!(ids(&registry.resolve("", true)), vec![1, 3]);
        assert_eq!(ids(&registry.resolve("", false)), vec![2]);
    }

    #[test]
    fn test_remove_drops_empty_channel() {
        let registry = HandlerRegistry::default();
        registry.insert(reg(1, "A", None));
        registry.insert(reg(2, "B", None));

        assert!(!registry.remove("A", HandlerId(2)));
        assert!(registry.remove("A", HandlerId(1)));
        assert_eq!(registry.count("A"), 0);
        assert_eq!(registry.events(), vec!["B".to_string()]);
    }

    #[test]
    fn test_interceptors_apply_in_order_and_remove() {
        let registry = InterceptorRegistry::default();
        registry.add("A", Interceptor::mutable(InterceptorId(1), |n: &mut i32| *n += 1));
        registry.add("A", Interceptor::mutable(InterceptorId(2), |n: &mut i32| *n *= 10));

        let mut payload = 1;
        registry.apply("A", &mut payload);
        assert_eq!(payload, 20);

        assert!(registry.remove("A", InterceptorId(1)));
        assert!(!registry.remove("A", InterceptorId(1)));
        let mut payload = 1;
        registry.apply("A", &mut payload);
        assert_eq!(payload, 10);
    }
}
