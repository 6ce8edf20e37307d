//! SyncController: the single writer of [`NotificationStore`].
//!
//! Every fetch captures a [`Ticket`] at dispatch. When it resumes, the
//! result is applied only if the store's generation still matches, and
//! is merged against any optimistic mutation that ran in between.
//! Gateway failures never reach callers; they become a rollback, a
//! [`Notice`], or a forced resynchronization.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::GatewayError;
use crate::gateway::NotificationGateway;
use crate::model::NotificationItem;
use crate::store::{
    Drift, NotificationState, NotificationStore, Notice, NoticeKind, Scope, StatePatch, Ticket,
};

/// Outcome of activating (clicking) a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Navigate to the item's target; the dropdown has been closed.
    Redirect(String),
    /// The item has no target; it is now `selected` for a detail view.
    ShowDetail(NotificationItem),
    /// No loaded item has this id.
    Missing,
}

struct Shared {
    store: Arc<NotificationStore>,
    gateway: Arc<dyn NotificationGateway>,
    config: SyncConfig,
}

/// Cloneable handle on one notification session.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<Shared>,
}

/// Non-owning handle, for callers that must not keep a session alive.
#[derive(Clone)]
pub struct WeakController(Weak<Shared>);

impl WeakController {
    pub fn upgrade(&self) -> Option<SyncController> {
        self.0.upgrade().map(|inner| SyncController { inner })
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SyncController {
    pub fn new(gateway: Arc<dyn NotificationGateway>, config: SyncConfig) -> Self {
        Self::with_store(Arc::new(NotificationStore::new()), gateway, config)
    }

    pub fn with_store(
        store: Arc<NotificationStore>,
        gateway: Arc<dyn NotificationGateway>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Shared { store, gateway, config }),
        }
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.inner.store
    }

    pub fn snapshot(&self) -> Arc<NotificationState> {
        self.inner.store.snapshot()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController(Arc::downgrade(&self.inner))
    }

    fn store_ref(&self) -> &NotificationStore {
        &self.inner.store
    }

    fn gateway(&self) -> &dyn NotificationGateway {
        self.inner.gateway.as_ref()
    }

    // ====================================================================
    // Visibility
    // ====================================================================

    /// Open the dropdown. On a closed → open transition the list is reset
    /// under a new generation and reloaded together with the count.
    pub async fn open(&self) {
        let generation = self.store_ref().update_if(|s| {
            if s.is_open {
                return None;
            }
            s.is_open = true;
            s.generation += 1;
            s.page_cursor = 0;
            s.has_more = true;
            s.items.clear();
            Some(s.generation)
        });
        let Some(generation) = generation else {
            return;
        };
        debug!("dropdown opened (generation {})", generation);
        tokio::join!(self.refresh_list(), self.refresh_unread_count());
    }

    /// Hide the dropdown. Loaded items are kept for the next open.
    pub fn close(&self) {
        self.store_ref().update_if(|s| {
            if !s.is_open {
                return None;
            }
            s.is_open = false;
            Some(())
        });
    }

    pub async fn toggle(&self) {
        if self.snapshot().is_open {
            self.close();
        } else {
            self.open().await;
        }
    }

    // ====================================================================
    // Reads
    // ====================================================================

    /// Fetch page 0 and replace the list. No-op while closed.
    pub async fn refresh_list(&self) {
        let store = self.store_ref();
        if !store.snapshot().is_open {
            debug!("list refresh skipped: dropdown closed");
            return;
        }
        let ticket = store.ticket();
        let _fetch = store.begin_fetch();
        match self.gateway().fetch_page(0, self.inner.config.page_size).await {
            Ok(page) => {
                let applied = store.reconcile(&ticket, |state, drift| {
                    let items = overlay_read(state, page.items, drift);
                    state.replace_items(items);
                    state.page_cursor = 0;
                    state.has_more = !page.is_last;
                });
                if applied.is_none() {
                    debug!("discarding stale list page (generation {})", ticket.generation);
                }
            }
            Err(e) => self.read_failed(&ticket, NoticeKind::LoadFailed, &e),
        }
    }

    /// Fetch the authoritative unread count. The result is dropped if the
    /// generation moved on, or if an optimistic mutation ran or is still
    /// pending since dispatch.
    pub async fn refresh_unread_count(&self) {
        let store = self.store_ref();
        let ticket = store.ticket();
        let _fetch = store.begin_fetch();
        match self.gateway().fetch_unread_count().await {
            Ok(count) => {
                let applied = store.reconcile(&ticket, |state, drift| {
                    if drift.mutated || drift.has_pending() {
                        return false;
                    }
                    state.unread_count = count;
                    true
                });
                match applied {
                    None => debug!("discarding stale unread count (generation {})", ticket.generation),
                    Some(false) => debug!("discarding unread count {}: local mutation since dispatch", count),
                    Some(true) => {}
                }
            }
            Err(e) => self.read_failed(&ticket, NoticeKind::CountFailed, &e),
        }
    }

    /// Fetch the next page and append it. No-op while closed, while any
    /// fetch is in flight, or once the last page has been loaded.
    pub async fn load_more(&self) {
        let store = self.store_ref();
        let Some((page, ticket, _fetch)) = store.claim_next_page() else {
            debug!("load_more skipped");
            return;
        };
        match self.gateway().fetch_page(page, self.inner.config.page_size).await {
            Ok(fetched) => {
                let applied = store.reconcile(&ticket, |state, drift| {
                    let items = overlay_read(state, fetched.items, drift);
                    state.append_items(items);
                    state.has_more = !fetched.is_last;
                });
                if applied.is_none() {
                    debug!("discarding stale page {} (generation {})", page, ticket.generation);
                }
            }
            Err(e) => {
                warn!("[{}] failed to load page {}: {}", e.error_code(), page, e);
                store.update_if(|s| {
                    if s.generation != ticket.generation {
                        return None;
                    }
                    if s.page_cursor == page {
                        s.page_cursor = page - 1;
                    }
                    s.notice = Some(Notice::new(NoticeKind::LoadFailed, &e));
                    Some(())
                });
            }
        }
    }

    fn read_failed(&self, ticket: &Ticket, kind: NoticeKind, err: &GatewayError) {
        warn!("[{}] {}: {}", err.error_code(), kind.summary(), err);
        self.store_ref().update_if(|s| {
            if s.generation != ticket.generation {
                return None;
            }
            s.notice = Some(Notice::new(kind, err));
            Some(())
        });
    }

    // ====================================================================
    // Mutations
    // ====================================================================

    /// Mark one notification read, optimistically. The request is sent
    /// even when the item is unknown or already read locally. A failure
    /// always leaves a notice and rolls back what was patched, unless a
    /// newer mark-all-read covers it. If the session was invalidated
    /// meanwhile, it resynchronizes as well.
    pub async fn mark_read(&self, id: &str) {
        let store = self.store_ref();
        // Some(decremented) when an unread item was patched.
        let (patched, stamp) = store.mutate_one(|s| {
            let item = s.items.iter_mut().find(|item| item.id == id && !item.is_read)?;
            item.is_read = true;
            let decremented = s.unread_count > 0;
            if decremented {
                s.unread_count -= 1;
            }
            Some(decremented)
        });

        let result = {
            let _pending = store.begin_mark(id);
            self.gateway().mark_read(id).await
        };

        let Err(e) = result else {
            return;
        };
        warn!("[{}] failed to mark {} read: {}", e.error_code(), id, e);
        let resync = store.revert(&stamp, |s, since| {
            if let Some(decremented) = patched.filter(|_| !since.marked_all) {
                if let Some(item) = s.items.iter_mut().find(|item| item.id == id) {
                    item.is_read = false;
                }
                if decremented {
                    s.unread_count = s.unread_count.saturating_add(1);
                }
            }
            s.notice = Some(Notice::new(NoticeKind::MarkReadFailed, &e));
            Some(since.invalidated)
        });
        if resync == Some(true) {
            debug!("mark of {} failed across an invalidation, resynchronizing", id);
            self.invalidate().await;
        }
    }

    /// Mark everything read, optimistically. A failure is not rolled back
    /// item by item: the session resynchronizes as on invalidation.
    pub async fn mark_all_read(&self) {
        let store = self.store_ref();
        store.mutate(Scope::All, |s| {
            for item in &mut s.items {
                item.is_read = true;
            }
            s.unread_count = 0;
            Some(())
        });

        let result = {
            let _pending = store.begin_mark_all();
            self.gateway().mark_all_read().await
        };

        if let Err(e) = result {
            warn!("[{}] failed to mark all read, resynchronizing: {}", e.error_code(), e);
            store.patch(StatePatch {
                notice: Some(Some(Notice::new(NoticeKind::MarkAllReadFailed, &e))),
                ..Default::default()
            });
            self.invalidate().await;
        }
    }

    /// Discard in-flight results and resynchronize: list and count when
    /// open, count only when closed.
    pub async fn invalidate(&self) {
        let (generation, is_open) = self.store_ref().update(|s| {
            s.generation += 1;
            (s.generation, s.is_open)
        });
        debug!("invalidated (generation {}, open={})", generation, is_open);
        if is_open {
            tokio::join!(self.refresh_list(), self.refresh_unread_count());
        } else {
            self.refresh_unread_count().await;
        }
    }

    /// Window regained focus: refresh the count, and the list when open.
    pub async fn focus(&self) {
        if self.snapshot().is_open {
            tokio::join!(self.refresh_list(), self.refresh_unread_count());
        } else {
            self.refresh_unread_count().await;
        }
    }

    // ====================================================================
    // Item activation and notices
    // ====================================================================

    /// Click on a notification: mark it read, then either navigate to its
    /// target (closing the dropdown) or select it for a detail view.
    pub async fn activate(&self, id: &str) -> Activation {
        let Some(item) = self.snapshot().item(id).cloned() else {
            return Activation::Missing;
        };
        let activation = match &item.redirect_target {
            Some(target) => {
                self.close();
                Activation::Redirect(target.clone())
            }
            None => {
                let detail = item.clone().read();
                self.store_ref().patch(StatePatch {
                    selected: Some(Some(detail.clone())),
                    ..Default::default()
                });
                Activation::ShowDetail(detail)
            }
        };
        self.mark_read(id).await;
        activation
    }

    pub fn dismiss_detail(&self) {
        self.store_ref().update_if(|s| s.selected.take().map(|_| ()));
    }

    pub fn dismiss_notice(&self) {
        self.store_ref().update_if(|s| s.notice.take().map(|_| ()));
    }

    /// End of session: close, discard everything in flight, and reset.
    pub fn teardown(&self) {
        let generation = self.store_ref().reset();
        info!("notification session torn down (generation {})", generation);
    }
}

/// Carry local read marks onto freshly fetched items. `is_read` only
/// moves towards true, so a response that predates a local mark must
/// not undo it.
fn overlay_read(
    state: &NotificationState,
    mut items: Vec<NotificationItem>,
    drift: &Drift<'_>,
) -> Vec<NotificationItem> {
    for item in &mut items {
        if item.is_read {
            continue;
        }
        let locally_read = state.item(&item.id).is_some_and(|local| local.is_read);
        if drift.keeps_read(&item.id, locally_read) {
            item.is_read = true;
        }
    }
    items
}
