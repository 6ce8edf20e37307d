use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::NotificationGateway;
use crate::error::GatewayError;
use crate::model::{NotificationItem, Page};

/// The four gateway operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UnreadCount,
    FetchPage,
    MarkRead,
    MarkAllRead,
}

struct Parked {
    arrived: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Server {
    /// Newest first.
    items: Vec<NotificationItem>,
    failures: HashMap<Operation, u32>,
    calls: HashMap<Operation, usize>,
    holds: HashMap<Operation, VecDeque<Parked>>,
}

impl Server {
    fn take_failure(&mut self, op: Operation) -> bool {
        match self.failures.get_mut(&op) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn unread_count(&self) -> u32 {
        let unread = self.items.iter().filter(|item| !item.is_read).count();
        u32::try_from(unread).unwrap_or(u32::MAX)
    }

    fn page(&self, page: u32, size: u32) -> Page {
        let size_us = size as usize;
        let start = (page as usize).saturating_mul(size_us);
        let items: Vec<NotificationItem> = self.items.iter().skip(start).take(size_us).cloned().collect();
        Page {
            items,
            is_last: start.saturating_add(size_us) >= self.items.len(),
            number: page,
            size,
        }
    }
}

/// In-process notification server.
///
/// Responses are computed when a call arrives. A call with a pending
/// [`Hold`] then parks until the hold is released, so a test can make
/// an early response land after a later one.
#[derive(Default)]
pub struct MemoryGateway {
    server: Mutex<Server>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server holding `items`, newest first.
    pub fn with_items(items: Vec<NotificationItem>) -> Self {
        Self {
            server: Mutex::new(Server { items, ..Default::default() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Server> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a new notification (it becomes the newest).
    pub fn push(&self, item: NotificationItem) {
        self.lock().items.insert(0, item);
    }

    /// Server-side view of the list.
    pub fn items(&self) -> Vec<NotificationItem> {
        self.lock().items.clone()
    }

    /// Fail the next `times` calls of `op` with an HTTP 500.
    pub fn fail_next(&self, op: Operation, times: u32) {
        *self.lock().failures.entry(op).or_insert(0) += times;
    }

    /// Number of calls of `op` received so far.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Park the next not-yet-held call of `op` until the returned handle
    /// is released or dropped.
    pub fn hold(&self, op: Operation) -> Hold {
        let (arrived_tx, arrived_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.lock().holds.entry(op).or_default().push_back(Parked {
            arrived: arrived_tx,
            release: release_rx,
        });
        Hold {
            arrived: Some(arrived_rx),
            release: Some(release_tx),
        }
    }

    async fn call<T>(
        &self,
        op: Operation,
        respond: impl FnOnce(&mut Server) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let (result, parked) = {
            let mut server = self.lock();
            *server.calls.entry(op).or_insert(0) += 1;
            let parked = server.holds.get_mut(&op).and_then(VecDeque::pop_front);
            let result = if server.take_failure(op) {
                Err(GatewayError::Server {
                    status: 500,
                    message: "injected failure".into(),
                })
            } else {
                respond(&mut server)
            };
            (result, parked)
        };
        if let Some(parked) = parked {
            let _ = parked.arrived.send(());
            // Released or dropped, either way the call proceeds.
            let _ = parked.release.await;
        }
        result
    }
}

#[async_trait::async_trait]
impl NotificationGateway for MemoryGateway {
    async fn fetch_unread_count(&self) -> Result<u32, GatewayError> {
        self.call(Operation::UnreadCount, |server| Ok(server.unread_count()))
            .await
    }

    async fn fetch_page(&self, page: u32, size: u32) -> Result<Page, GatewayError> {
        self.call(Operation::FetchPage, |server| Ok(server.page(page, size)))
            .await
    }

    async fn mark_read(&self, id: &str) -> Result<(), GatewayError> {
        self.call(Operation::MarkRead, |server| {
            match server.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.is_read = true;
                    Ok(())
                }
                None => Err(GatewayError::Server {
                    status: 404,
                    message: format!("notification {} not found", id),
                }),
            }
        })
        .await
    }

    async fn mark_all_read(&self) -> Result<(), GatewayError> {
        self.call(Operation::MarkAllRead, |server| {
            for item in &mut server.items {
                item.is_read = true;
            }
            Ok(())
        })
        .await
    }
}

/// Handle on a parked gateway call, see [`MemoryGateway::hold`].
pub struct Hold {
    arrived: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl Hold {
    /// Wait until the held call has arrived and computed its response.
    pub async fn arrived(&mut self) {
        if let Some(rx) = self.arrived.take() {
            let _ = rx.await;
        }
    }

    /// Let the held call return.
    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationKind;
    use std::sync::Arc;

    fn items(n: usize) -> Vec<NotificationItem> {
        (0..n)
            .map(|i| NotificationItem::new(format!("n{}", i), NotificationKind::Booking, "m"))
            .collect()
    }

    #[tokio::test]
    async fn pages_and_unread_count() {
        let gw = MemoryGateway::with_items(items(7));

        let first = gw.fetch_page(0, 5).await.unwrap();
        assert_eq!(first.items.len(), 5);
        assert!(!first.is_last);

        let second = gw.fetch_page(1, 5).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.is_last);
        assert_eq!(second.items[0].id, "n5");

        let beyond = gw.fetch_page(4, 5).await.unwrap();
        assert!(beyond.items.is_empty());
        assert!(beyond.is_last);

        assert_eq!(gw.fetch_unread_count().await.unwrap(), 7);
        assert_eq!(gw.calls(Operation::FetchPage), 3);
    }

    #[tokio::test]
    async fn marks_update_server_state() {
        let gw = MemoryGateway::with_items(items(3));
        gw.mark_read("n1").await.unwrap();
        assert_eq!(gw.fetch_unread_count().await.unwrap(), 2);

        let err = gw.mark_read("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::Server { status: 404, .. }));

        gw.mark_all_read().await.unwrap();
        assert_eq!(gw.fetch_unread_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let gw = MemoryGateway::with_items(items(2));
        gw.fail_next(Operation::MarkRead, 1);

        assert!(gw.mark_read("n0").await.is_err());
        assert!(!gw.items()[0].is_read);
        assert!(gw.mark_read("n0").await.is_ok());
        assert!(gw.items()[0].is_read);
    }

    #[tokio::test]
    async fn held_call_returns_the_response_computed_on_arrival() {
        let gw = Arc::new(MemoryGateway::with_items(items(2)));
        let mut hold = gw.hold(Operation::UnreadCount);

        let gw_c = gw.clone();
        let task = tokio::spawn(async move { gw_c.fetch_unread_count().await });
        hold.arrived().await;

        gw.push(NotificationItem::new("new", NotificationKind::Report, "m"));
        assert_eq!(gw.fetch_unread_count().await.unwrap(), 3);

        hold.release();
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn dropped_hold_releases_the_call() {
        let gw = Arc::new(MemoryGateway::with_items(items(1)));
        let hold = gw.hold(Operation::MarkAllRead);
        drop(hold);
        gw.mark_all_read().await.unwrap();
    }
}
