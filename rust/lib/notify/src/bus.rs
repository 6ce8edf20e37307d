use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::controller::SyncController;
use crate::wire::PushEnvelope;

/// A boxed, `Send`-able future returned by bus handlers.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Type-erased handler. Receives the topic it was published on.
type ErasedHandler = Arc<dyn Fn(String) -> BoxFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Returned by [`PushBus::on`]; pass it to [`PushBus::off`] to deregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub topic: String,
    pub id: HandlerId,
}

struct BusInner {
    topics: RwLock<HashMap<String, Vec<(HandlerId, ErasedHandler)>>>,
    next_id: AtomicU64,
}

/// Topic bus for out-of-band refresh signals.
///
/// Cloning shares the same registrations. Handlers for a topic run
/// sequentially in registration order; publishing a topic nobody listens
/// to is a no-op.
///
/// ```ignore
/// let bus = PushBus::new();
/// let reg = bus.on("wallet", |_topic| async move { reload_wallet().await });
/// bus.publish("wallet").await;
/// bus.off(&reg);
/// ```
#[derive(Clone)]
pub struct PushBus {
    inner: Arc<BusInner>,
}

impl PushBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register an async handler for `topic`.
    pub fn on<F, Fut>(&self, topic: &str, handler: F) -> Registration
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: ErasedHandler = Arc::new(move |topic: String| -> BoxFuture { Box::pin(handler(topic)) });
        let mut topics = self.inner.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.entry(topic.to_string()).or_default().push((id, handler));
        Registration {
            topic: topic.to_string(),
            id,
        }
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn off(&self, registration: &Registration) -> bool {
        let mut topics = self.inner.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = topics.get_mut(&registration.topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != registration.id);
        let removed = handlers.len() < before;
        if handlers.is_empty() {
            topics.remove(&registration.topic);
        }
        removed
    }

    /// Run every handler registered on `topic`. Returns how many ran.
    pub async fn publish(&self, topic: &str) -> usize {
        let handlers: Vec<ErasedHandler> = {
            let topics = self.inner.topics.read().unwrap_or_else(PoisonError::into_inner);
            match topics.get(topic) {
                Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => Vec::new(),
            }
        };
        if handlers.is_empty() {
            debug!("push on {} with no handler", topic);
        }
        for handler in &handlers {
            handler(topic.to_string()).await;
        }
        handlers.len()
    }

    /// Decode a raw push envelope and publish its target topic.
    pub async fn deliver(&self, raw: &str) -> Result<usize, serde_json::Error> {
        let envelope: PushEnvelope = serde_json::from_str(raw)?;
        debug!("push {} {} -> {}", envelope.kind, envelope.action, envelope.target);
        Ok(self.publish(&envelope.target).await)
    }

    pub fn has_handlers(&self, topic: &str) -> bool {
        let topics = self.inner.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).is_some_and(|handlers| !handlers.is_empty())
    }
}

impl Default for PushBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes push signals on the notification topic to
/// [`SyncController::invalidate`] for as long as it is mounted.
///
/// Holds only a weak reference to the controller: once the session is
/// gone, signals are silently ignored. Dropping the bridge deregisters it.
pub struct PushBridge {
    bus: PushBus,
    registration: Option<Registration>,
}

impl PushBridge {
    /// Mount on the topic named by the controller's config.
    pub fn mount(bus: &PushBus, controller: &SyncController) -> Self {
        let topic = controller.config().push_topic.clone();
        Self::mount_on(bus, controller, &topic)
    }

    pub fn mount_on(bus: &PushBus, controller: &SyncController, topic: &str) -> Self {
        let weak = controller.downgrade();
        let registration = bus.on(topic, move |_topic| {
            let weak = weak.clone();
            async move {
                if let Some(controller) = weak.upgrade() {
                    controller.invalidate().await;
                }
            }
        });
        debug!("push bridge mounted on {}", topic);
        Self {
            bus: bus.clone(),
            registration: Some(registration),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.registration.is_some()
    }

    pub fn unmount(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.bus.off(&registration);
            debug!("push bridge unmounted from {}", registration.topic);
        }
    }
}

impl Drop for PushBridge {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::gateway::{MemoryGateway, Operation};
    use crate::model::{NotificationItem, NotificationKind};
    use std::sync::Mutex;

    fn counter(bus: &PushBus, topic: &str) -> (Registration, Arc<AtomicU64>) {
        let called = Arc::new(AtomicU64::new(0));
        let called_c = called.clone();
        let reg = bus.on(topic, move |_topic| {
            let called = called_c.clone();
            async move {
                called.fetch_add(1, Ordering::Relaxed);
            }
        });
        (reg, called)
    }

    fn session(ids: &[&str]) -> (Arc<MemoryGateway>, SyncController) {
        let items = ids
            .iter()
            .map(|id| NotificationItem::new(*id, NotificationKind::Booking, "m"))
            .collect();
        let gw = Arc::new(MemoryGateway::with_items(items));
        let ctrl = SyncController::new(gw.clone(), SyncConfig::default());
        (gw, ctrl)
    }

    // ========================================================================
    // PushBus
    // ========================================================================

    #[tokio::test]
    async fn publish_runs_topic_handlers_only() {
        let bus = PushBus::new();
        let (_, wallet) = counter(&bus, "wallet");
        let (_, booking) = counter(&bus, "booking");

        assert_eq!(bus.publish("wallet").await, 1);
        assert_eq!(wallet.load(Ordering::Relaxed), 1);
        assert_eq!(booking.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn publish_without_handler_is_noop() {
        let bus = PushBus::new();
        assert_eq!(bus.publish("nobody").await, 0);
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let bus = PushBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let order = order.clone();
            bus.on("t", move |_| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(n);
                }
            });
        }
        bus.publish("t").await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn off_removes_only_that_handler() {
        let bus = PushBus::new();
        let (first, a) = counter(&bus, "t");
        let (_, b) = counter(&bus, "t");

        assert!(bus.off(&first));
        assert!(!bus.off(&first));
        bus.publish("t").await;

        assert_eq!(a.load(Ordering::Relaxed), 0);
        assert_eq!(b.load(Ordering::Relaxed), 1);
        assert!(bus.has_handlers("t"));
    }

    #[tokio::test]
    async fn deliver_routes_by_target() {
        let bus = PushBus::new();
        let (_, called) = counter(&bus, "notification");

        let ran = bus
            .deliver(r#"{"type":"REFRESH","action":"refresh","target":"notification","userId":"u1"}"#)
            .await
            .unwrap();
        assert_eq!(ran, 1);
        assert_eq!(called.load(Ordering::Relaxed), 1);

        assert!(bus.deliver("not json").await.is_err());
        assert!(bus.deliver(r#"{"type":"REFRESH"}"#).await.is_err());
    }

    #[tokio::test]
    async fn clones_share_registrations() {
        let bus = PushBus::new();
        let other = bus.clone();
        let (_, called) = counter(&bus, "t");
        other.publish("t").await;
        assert_eq!(called.load(Ordering::Relaxed), 1);
    }

    // ========================================================================
    // PushBridge
    // ========================================================================

    #[tokio::test]
    async fn bridge_invalidates_controller() {
        let bus = PushBus::new();
        let (gw, ctrl) = session(&["n1", "n2"]);
        let _bridge = PushBridge::mount(&bus, &ctrl);

        assert_eq!(bus.publish("notification").await, 1);

        let snap = ctrl.snapshot();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.unread_count, 2);
        assert_eq!(gw.calls(Operation::UnreadCount), 1);
        assert_eq!(gw.calls(Operation::FetchPage), 0);
    }

    #[tokio::test]
    async fn bridge_refreshes_open_list() {
        let bus = PushBus::new();
        let (gw, ctrl) = session(&["n1"]);
        let _bridge = PushBridge::mount(&bus, &ctrl);
        ctrl.open().await;

        gw.push(NotificationItem::new("n0", NotificationKind::Report, "m"));
        bus.deliver(r#"{"type":"REFRESH","action":"refresh","target":"notification"}"#)
            .await
            .unwrap();

        let ids: Vec<_> = ctrl.snapshot().items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["n0", "n1"]);
    }

    #[tokio::test]
    async fn dropped_bridge_deregisters() {
        let bus = PushBus::new();
        let (gw, ctrl) = session(&["n1"]);
        let bridge = PushBridge::mount(&bus, &ctrl);
        assert!(bridge.is_mounted());
        drop(bridge);

        assert_eq!(bus.publish("notification").await, 0);
        assert_eq!(gw.calls(Operation::UnreadCount), 0);
    }

    #[tokio::test]
    async fn unmount_is_idempotent() {
        let bus = PushBus::new();
        let (_gw, ctrl) = session(&[]);
        let mut bridge = PushBridge::mount_on(&bus, &ctrl, "alerts");
        assert!(bus.has_handlers("alerts"));

        bridge.unmount();
        bridge.unmount();
        assert!(!bridge.is_mounted());
        assert!(!bus.has_handlers("alerts"));
    }

    #[tokio::test]
    async fn bridge_without_controller_is_silent() {
        let bus = PushBus::new();
        let (gw, ctrl) = session(&["n1"]);
        let _bridge = PushBridge::mount(&bus, &ctrl);
        drop(ctrl);

        assert_eq!(bus.publish("notification").await, 1);
        assert_eq!(gw.calls(Operation::UnreadCount), 0);
    }
}
