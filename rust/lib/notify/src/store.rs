use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::NotificationItem;

/// Callback type for state change notifications.
pub type ChangeHandler = Arc<dyn Fn(&Arc<NotificationState>) + Send + Sync>;

/// Unique handle for a subscription, returned by [`NotificationStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ====================================================================
// Notice
// ====================================================================

/// What went wrong, for a non-blocking user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    LoadFailed,
    CountFailed,
    MarkReadFailed,
    MarkAllReadFailed,
}

impl NoticeKind {
    pub fn summary(&self) -> &'static str {
        match self {
            NoticeKind::LoadFailed => "Could not load notifications",
            NoticeKind::CountFailed => "Could not refresh the unread count",
            NoticeKind::MarkReadFailed => "Could not mark the notification as read",
            NoticeKind::MarkAllReadFailed => "Could not mark all notifications as read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub detail: String,
}

impl Notice {
    pub(crate) fn new(kind: NoticeKind, detail: impl fmt::Display) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.summary(), self.detail)
    }
}

// ====================================================================
// NotificationState
// ====================================================================

/// Reconciled notification state of one session.
///
/// Consumers only ever see it behind an `Arc` handed out by
/// [`NotificationStore::snapshot`]; every write produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationState {
    /// Newest first, unique by id.
    pub items: Vec<NotificationItem>,
    pub unread_count: u32,
    pub page_cursor: u32,
    pub has_more: bool,
    pub is_synchronizing: bool,
    pub is_open: bool,
    /// Bumped on every invalidation, open reset, and teardown. Fetches
    /// dispatched under an older generation are discarded.
    pub generation: u64,
    /// Item shown in the detail view after activating a notification
    /// with no redirect target.
    pub selected: Option<NotificationItem>,
    pub notice: Option<Notice>,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unread_count: 0,
            page_cursor: 0,
            has_more: true,
            is_synchronizing: false,
            is_open: false,
            generation: 0,
            selected: None,
            notice: None,
        }
    }
}

impl NotificationState {
    pub fn item(&self, id: &str) -> Option<&NotificationItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Unread items among those loaded (not the server-side count).
    pub fn unread_loaded(&self) -> usize {
        self.items.iter().filter(|item| !item.is_read).count()
    }

    pub(crate) fn replace_items(&mut self, items: Vec<NotificationItem>) {
        self.items.clear();
        self.append_items(items);
    }

    /// Append items not already present, keeping the order of those that
    /// are. A known item only picks up a `false -> true` read transition.
    pub(crate) fn append_items(&mut self, items: Vec<NotificationItem>) {
        let mut index: HashMap<String, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(at, item)| (item.id.clone(), at))
            .collect();
        for item in items {
            match index.get(&item.id) {
                Some(&at) => {
                    if item.is_read {
                        self.items[at].is_read = true;
                    }
                }
                None => {
                    index.insert(item.id.clone(), self.items.len());
                    self.items.push(item);
                }
            }
        }
    }

    pub(crate) fn set_unread_count(&mut self, count: i64) {
        self.unread_count = clamp_count(count);
    }
}

fn clamp_count(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

/// Partial update for [`NotificationStore::patch`]. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub unread_count: Option<i64>,
    pub page_cursor: Option<u32>,
    pub has_more: Option<bool>,
    pub is_open: Option<bool>,
    pub selected: Option<Option<NotificationItem>>,
    pub notice: Option<Option<Notice>>,
}

impl StatePatch {
    fn apply(self, state: &mut NotificationState) {
        if let Some(count) = self.unread_count {
            state.set_unread_count(count);
        }
        if let Some(cursor) = self.page_cursor {
            state.page_cursor = cursor;
        }
        if let Some(has_more) = self.has_more {
            state.has_more = has_more;
        }
        if let Some(is_open) = self.is_open {
            state.is_open = is_open;
        }
        if let Some(selected) = self.selected {
            state.selected = selected;
        }
        if let Some(notice) = self.notice {
            state.notice = notice;
        }
    }
}

// ====================================================================
// Reconciliation bookkeeping
// ====================================================================

/// Captured when a fetch is dispatched, checked when it resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub mutation_seq: u64,
}

/// What happened to local state between a fetch's dispatch and its
/// resumption, handed to [`NotificationStore::reconcile`].
pub(crate) struct Drift<'a> {
    /// An optimistic mutation or rollback ran after dispatch.
    pub mutated: bool,
    /// A mark-all-read ran after dispatch.
    pub marked_all: bool,
    pending_reads: &'a HashMap<String, u32>,
    pending_mark_all: bool,
}

impl Drift<'_> {
    /// A mark request is still waiting for the server.
    pub fn has_pending(&self) -> bool {
        self.pending_mark_all || !self.pending_reads.is_empty()
    }

    /// Whether a fetched item must stay read whatever the server said:
    /// the response may predate a local mark that has not landed yet.
    pub fn keeps_read(&self, id: &str, locally_read: bool) -> bool {
        self.marked_all
            || self.pending_mark_all
            || self.pending_reads.contains_key(id)
            || (self.mutated && locally_read)
    }
}

/// Position of an optimistic mutation, checked by
/// [`NotificationStore::revert`] when its request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    seq: u64,
    generation: u64,
    session: u64,
}

/// What happened since a [`Stamp`] was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Since {
    /// A mark-all-read ran after the stamped mutation.
    pub marked_all: bool,
    /// The generation moved on: fetches ran that may have merged the
    /// mutation as pending.
    pub invalidated: bool,
}

/// Scope of an optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    One,
    All,
}

struct Inner {
    state: Arc<NotificationState>,
    in_flight: u32,
    mutation_seq: u64,
    last_mark_all_seq: u64,
    pending_reads: HashMap<String, u32>,
    pending_mark_all: u32,
    /// Bumped by `reset`; a revert never crosses it.
    session: u64,
}

impl Inner {
    fn stamp(&self) -> Stamp {
        Stamp {
            seq: self.mutation_seq,
            generation: self.state.generation,
            session: self.session,
        }
    }

    /// Re-derive `is_synchronizing` from the in-flight counter. Returns
    /// whether the flag changed.
    fn sync_flag(&mut self) -> bool {
        let busy = self.in_flight > 0;
        if self.state.is_synchronizing == busy {
            return false;
        }
        Arc::make_mut(&mut self.state).is_synchronizing = busy;
        true
    }
}

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    handler: ChangeHandler,
}

// ====================================================================
// NotificationStore
// ====================================================================

/// Holder of the reconciled [`NotificationState`].
///
/// - `snapshot()` reads the current state (Arc clone, cheap).
/// - `subscribe(handler)` registers a change handler, called after every
///   write with the new snapshot.
/// - `unsubscribe(id)` removes a handler.
///
/// Writes are crate-private: only the sync controller mutates the store.
pub struct NotificationStore {
    inner: RwLock<Inner>,
    handlers: RwLock<Vec<HandlerEntry>>,
    /// Monotonic counter for subscription IDs.
    next_id: AtomicU64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::with_state(NotificationState::default())
    }

    pub fn with_state(state: NotificationState) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: Arc::new(state),
                in_flight: 0,
                mutation_seq: 0,
                last_mark_all_seq: 0,
                pending_reads: HashMap::new(),
                pending_mark_all: 0,
                session: 0,
            }),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current state. Later writes never change a snapshot already taken.
    pub fn snapshot(&self) -> Arc<NotificationState> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&inner.state)
    }

    /// Register a handler called synchronously after every state write.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Arc<NotificationState>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|entry| entry.id != id);
        handlers.len() < before
    }

    // ====================================================================
    // Writes (controller only)
    // ====================================================================

    pub(crate) fn patch(&self, patch: StatePatch) {
        self.update(|state| patch.apply(state));
    }

    /// Apply `f` to the state and notify subscribers.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut NotificationState) -> R) -> R {
        self.commit(|inner| (f(Arc::make_mut(&mut inner.state)), true))
    }

    /// Like [`update`](Self::update), but subscribers are only notified
    /// when `f` returns `Some`.
    pub(crate) fn update_if<R>(&self, f: impl FnOnce(&mut NotificationState) -> Option<R>) -> Option<R> {
        self.commit(|inner| {
            let mut next = NotificationState::clone(&inner.state);
            match f(&mut next) {
                Some(result) => {
                    inner.state = Arc::new(next);
                    (Some(result), true)
                }
                None => (None, false),
            }
        })
    }

    /// Advance the cursor and start a page fetch, if the list is open,
    /// idle, and not exhausted. Returns the page to request.
    pub(crate) fn claim_next_page(&self) -> Option<(u32, Ticket, FetchGuard<'_>)> {
        let claimed = self.commit(|inner| {
            let state = &inner.state;
            if !state.is_open || inner.in_flight > 0 || !state.has_more {
                return (None, false);
            }
            let state = Arc::make_mut(&mut inner.state);
            state.page_cursor += 1;
            let page = state.page_cursor;
            inner.in_flight += 1;
            inner.sync_flag();
            let ticket = Ticket {
                generation: inner.state.generation,
                mutation_seq: inner.mutation_seq,
            };
            (Some((page, ticket)), true)
        });
        claimed.map(|(page, ticket)| (page, ticket, FetchGuard { store: self }))
    }

    pub(crate) fn ticket(&self) -> Ticket {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ticket {
            generation: inner.state.generation,
            mutation_seq: inner.mutation_seq,
        }
    }

    /// Apply a fetch result captured under `ticket`. Returns `None`, and
    /// leaves the state alone, when the generation has moved on.
    pub(crate) fn reconcile<R>(
        &self,
        ticket: &Ticket,
        f: impl FnOnce(&mut NotificationState, &Drift<'_>) -> R,
    ) -> Option<R> {
        self.commit(|inner| {
            if inner.state.generation != ticket.generation {
                return (None, false);
            }
            let Inner {
                state,
                mutation_seq,
                last_mark_all_seq,
                pending_reads,
                pending_mark_all,
                ..
            } = inner;
            let drift = Drift {
                mutated: *mutation_seq != ticket.mutation_seq,
                marked_all: *last_mark_all_seq > ticket.mutation_seq,
                pending_reads,
                pending_mark_all: *pending_mark_all > 0,
            };
            (Some(f(Arc::make_mut(state), &drift)), true)
        })
    }

    /// Apply an optimistic mutation. `f` returns `None` when it changed
    /// nothing; otherwise the mutation sequence advances.
    pub(crate) fn mutate<R>(
        &self,
        scope: Scope,
        f: impl FnOnce(&mut NotificationState) -> Option<R>,
    ) -> Option<R> {
        self.mutate_stamped(scope, f).0
    }

    /// [`mutate`](Self::mutate) with [`Scope::One`], also returning the
    /// stamp a rollback is later checked against.
    pub(crate) fn mutate_one<R>(
        &self,
        f: impl FnOnce(&mut NotificationState) -> Option<R>,
    ) -> (Option<R>, Stamp) {
        self.mutate_stamped(Scope::One, f)
    }

    fn mutate_stamped<R>(
        &self,
        scope: Scope,
        f: impl FnOnce(&mut NotificationState) -> Option<R>,
    ) -> (Option<R>, Stamp) {
        self.commit(|inner| {
            let result = f(Arc::make_mut(&mut inner.state));
            let changed = result.is_some();
            if changed {
                inner.mutation_seq += 1;
                if scope == Scope::All {
                    inner.last_mark_all_seq = inner.mutation_seq;
                }
            }
            ((result, inner.stamp()), changed)
        })
    }

    /// Roll back the mutation stamped `stamp`. Skipped, returning `None`,
    /// once the session has been reset. `f` returns `None` when it
    /// changed nothing.
    pub(crate) fn revert<R>(
        &self,
        stamp: &Stamp,
        f: impl FnOnce(&mut NotificationState, &Since) -> Option<R>,
    ) -> Option<R> {
        self.commit(|inner| {
            if inner.session != stamp.session {
                return (None, false);
            }
            let since = Since {
                marked_all: inner.last_mark_all_seq > stamp.seq,
                invalidated: inner.state.generation != stamp.generation,
            };
            let result = f(Arc::make_mut(&mut inner.state), &since);
            let changed = result.is_some();
            if changed {
                inner.mutation_seq += 1;
            }
            (result, changed)
        })
    }

    /// Count a fetch as in flight until the guard drops.
    pub(crate) fn begin_fetch(&self) -> FetchGuard<'_> {
        self.commit(|inner| {
            inner.in_flight += 1;
            ((), inner.sync_flag())
        });
        FetchGuard { store: self }
    }

    fn end_fetch(&self) {
        self.commit(|inner| {
            inner.in_flight = inner.in_flight.saturating_sub(1);
            ((), inner.sync_flag())
        });
    }

    /// Record a mark-read request for `id` as pending until the guard drops.
    pub(crate) fn begin_mark(&self, id: &str) -> PendingMark<'_> {
        self.commit(|inner| {
            *inner.pending_reads.entry(id.to_string()).or_insert(0) += 1;
            ((), false)
        });
        PendingMark {
            store: self,
            id: Some(id.to_string()),
        }
    }

    /// Record a mark-all-read request as pending until the guard drops.
    pub(crate) fn begin_mark_all(&self) -> PendingMark<'_> {
        self.commit(|inner| {
            inner.pending_mark_all += 1;
            ((), false)
        });
        PendingMark {
            store: self,
            id: None,
        }
    }

    fn settle(&self, id: Option<&str>) {
        self.commit(|inner| {
            match id {
                Some(id) => {
                    if let Some(count) = inner.pending_reads.get_mut(id) {
                        *count -= 1;
                        if *count == 0 {
                            inner.pending_reads.remove(id);
                        }
                    }
                }
                None => inner.pending_mark_all = inner.pending_mark_all.saturating_sub(1),
            }
            ((), false)
        });
    }

    /// Back to an empty session state under a new generation.
    pub(crate) fn reset(&self) -> u64 {
        self.commit(|inner| {
            let generation = inner.state.generation + 1;
            inner.session += 1;
            inner.state = Arc::new(NotificationState {
                generation,
                is_synchronizing: inner.in_flight > 0,
                ..Default::default()
            });
            (generation, true)
        })
    }

    /// Run `f` under the write lock, then notify subscribers outside the
    /// lock if `f` reports a change.
    fn commit<R>(&self, f: impl FnOnce(&mut Inner) -> (R, bool)) -> R {
        let (result, snapshot) = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let (result, changed) = f(&mut inner);
            (result, changed.then(|| Arc::clone(&inner.state)))
        };
        if let Some(snapshot) = snapshot {
            self.notify(&snapshot);
        }
        result
    }

    fn notify(&self, snapshot: &Arc<NotificationState>) {
        let handlers: Vec<ChangeHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers.iter().map(|entry| Arc::clone(&entry.handler)).collect()
        };
        for handler in handlers {
            handler(snapshot);
        }
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight mark for a fetch when dropped, including when the
/// fetch future itself is dropped before completing.
pub(crate) struct FetchGuard<'a> {
    store: &'a NotificationStore,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.store.end_fetch();
    }
}

/// Pending mark request; settles when dropped.
pub(crate) struct PendingMark<'a> {
    store: &'a NotificationStore,
    id: Option<String>,
}

impl Drop for PendingMark<'_> {
    fn drop(&mut self) {
        self.store.settle(self.id.as_deref());
    }
}
