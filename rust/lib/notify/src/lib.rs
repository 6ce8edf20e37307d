//! Rental notify — notification synchronization core.
//!
//! Keeps a client-side cache of a user's notifications consistent with a
//! remote source of truth across three independent triggers: user actions
//! (open the dropdown, click an item, mark all read), periodic and
//! on-focus re-fetch, and out-of-band push signals.
//!
//! # Pieces
//!
//! - [`NotificationStore`] — reconciled state, Arc snapshots, change
//!   subscriptions. Only the controller writes to it.
//! - [`SyncController`] — open/close, paging, optimistic mark-read,
//!   invalidation. Stale fetch results are discarded by generation.
//! - [`PushBus`] / [`PushBridge`] — topic bus for push signals; the bridge
//!   routes the notification topic to `invalidate()`.
//! - [`NotificationGateway`] — the remote API contract, with
//!   [`HttpGateway`] and [`MemoryGateway`] adapters.
//! - [`Poller`] — periodic unread-count refresh.
//!
//! # Example
//!
//! ```ignore
//! use rental_notify::{HttpGateway, PushBridge, PushBus, StaticToken, SyncConfig, SyncController};
//!
//! let config = SyncConfig::default();
//! let gateway = HttpGateway::new("http://localhost:8080", Arc::new(StaticToken::new(jwt)), config.request_timeout())?;
//! let controller = SyncController::new(Arc::new(gateway), config);
//!
//! controller.store().subscribe(|state| render(state));
//!
//! let bus = PushBus::new();
//! let _bridge = PushBridge::mount(&bus, &controller);
//!
//! controller.open().await;
//! controller.mark_read("n1").await;
//! bus.deliver(r#"{"type":"REFRESH","action":"refresh","target":"notification"}"#).await?;
//! ```

pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod model;
pub mod poller;
pub mod store;
pub mod wire;

// Re-export primary types at crate root.
pub use bus::{PushBridge, PushBus, Registration};
pub use config::SyncConfig;
pub use controller::{Activation, SyncController, WeakController};
pub use error::{ConfigError, GatewayError};
pub use gateway::{HttpGateway, MemoryGateway, NoAuth, NotificationGateway, StaticToken, TokenSource};
pub use model::{NotificationItem, NotificationKind, Page, Timestamp, Tone};
pub use poller::Poller;
pub use store::{NotificationState, NotificationStore, Notice, NoticeKind, SubscriptionId};
pub use wire::PushEnvelope;
