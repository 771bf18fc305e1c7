//! Event name → callback registry.
//!
//! Callbacks run synchronously inside [`EventDispatcher::emit`], in the order
//! they were registered. Delivery works on a snapshot of the listener list, so
//! a callback may subscribe or unsubscribe without deadlocking; changes take
//! effect from the next `emit`.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(SubscriptionId, Callback)>>>,
}

impl Registry {
    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Vec<(SubscriptionId, Callback)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}

/// Handle returned by [`EventDispatcher::on`]; pass it to `off` or call
/// [`Subscription::unsubscribe`] to stop delivery.
#[derive(Debug, Clone)]
#[must_use = "dropping a Subscription leaves the callback registered with no way to remove it"]
pub struct Subscription {
    id: SubscriptionId,
    event: String,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the callback. Returns false if it was already removed.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.event, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(event, entries)| (event.as_str(), entries.len()))
            .collect();
        f.debug_struct("Registry").field("listeners", &counts).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`.
    pub fn on<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .listeners()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            event: event.to_string(),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a subscription made on this dispatcher. Unknown or foreign
    /// subscriptions are ignored.
    pub fn off(&self, subscription: &Subscription) -> bool {
        if !std::ptr::eq(subscription.registry.as_ptr(), Arc::as_ptr(&self.registry)) {
            return false;
        }
        self.registry.remove(&subscription.event, subscription.id)
    }

    /// Deliver `payload` to every callback registered for `event`.
    ///
    /// Returns how many callbacks completed without panicking.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let callbacks: Vec<Callback> = match self.registry.listeners().get(event) {
            Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    crate::log_error!("Listener for '{}' panicked: {}", event, message);
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .listeners()
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.registry.listeners().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Value) + Send + Sync>)
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| {
                let log = Arc::clone(&log);
                let name = name.to_string();
                Box::new(move |payload: &Value| {
                    log.lock().unwrap().push(format!("{name}:{payload}"));
                }) as Box<dyn Fn(&Value) + Send + Sync>
            }
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let _a = dispatcher.on("new_message", make("a"));
        let _b = dispatcher.on("new_message", make("b"));
        let _c = dispatcher.on("new_message", make("c"));

        let delivered = dispatcher.emit("new_message", &json!({"id": 7, "message": "hello"}));

        assert_eq!(delivered, 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                r#"a:{"id":7,"message":"hello"}"#,
                r#"b:{"id":7,"message":"hello"}"#,
                r#"c:{"id":7,"message":"hello"}"#,
            ]
        );
    }

    #[test]
    fn off_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let sub = dispatcher.on("user_typing", make("a"));
        let _keep = dispatcher.on("user_typing", make("b"));

        assert!(dispatcher.off(&sub));
        dispatcher.emit("user_typing", &json!(1));

        assert_eq!(*log.lock().unwrap(), vec!["b:1"]);
        assert!(!dispatcher.off(&sub), "second removal is a no-op");
    }

    #[test]
    fn unsubscribe_handle_removes_only_its_callback() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let first = dispatcher.on("error", make("a"));
        let _second = dispatcher.on("error", make("a"));

        assert!(first.unsubscribe());
        dispatcher.emit("error", &Value::Null);

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.listener_count("error"), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_later_ones() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let _a = dispatcher.on("new_message", make("a"));
        let _boom = dispatcher.on("new_message", |_| panic!("listener blew up"));
        let _c = dispatcher.on("new_message", make("c"));

        let delivered = dispatcher.emit("new_message", &json!("x"));

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec![r#"a:"x""#, r#"c:"x""#]);
    }

    #[test]
    fn off_ignores_subscriptions_from_another_dispatcher() {
        let first = EventDispatcher::new();
        let second = EventDispatcher::new();
        let sub = first.on("connected", |_| {});
        let _other = second.on("connected", |_| {});

        assert!(!second.off(&sub));
        assert_eq!(second.listener_count("connected"), 1);
        assert!(first.off(&sub));
    }

    #[test]
    fn callbacks_can_subscribe_during_emit() {
        let dispatcher = EventDispatcher::new();
        let inner = dispatcher.clone();
        let _sub = dispatcher.on("connected", move |_| {
            let _late = inner.on("connected", |_| {});
        });

        assert_eq!(dispatcher.emit("connected", &Value::Null), 1);
        assert_eq!(dispatcher.listener_count("connected"), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.on("a", |_| {});
        let _b = dispatcher.on("b", |_| {});

        dispatcher.clear();

        assert_eq!(dispatcher.emit("a", &Value::Null), 0);
        assert_eq!(dispatcher.listener_count("b"), 0);
        assert!(!sub.unsubscribe());
    }
}
