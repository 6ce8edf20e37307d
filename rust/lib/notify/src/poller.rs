use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::controller::SyncController;

/// Background task refreshing the unread count on a fixed period, so the
/// badge stays live while the dropdown is closed.
///
/// The first refresh happens one period after spawning. The task stops
/// when the handle is dropped or the session is gone.
pub struct Poller {
    task: JoinHandle<()>,
}

impl Poller {
    pub fn spawn(controller: &SyncController, every: Duration) -> Self {
        let weak = controller.downgrade();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    debug!("poller stopping: session gone");
                    break;
                };
                controller.refresh_unread_count().await;
            }
        });
        Self { task }
    }

    /// Spawn with the controller's configured period, or `None` when
    /// polling is disabled.
    pub fn from_config(controller: &SyncController) -> Option<Self> {
        controller
            .config()
            .poll_interval()
            .map(|every| Self::spawn(controller, every))
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::gateway::{MemoryGateway, Operation};
    use crate::model::{NotificationItem, NotificationKind};
    use std::sync::Arc;

    fn session() -> (Arc<MemoryGateway>, SyncController) {
        let gw = Arc::new(MemoryGateway::with_items(vec![NotificationItem::new(
            "n1",
            NotificationKind::Booking,
            "m",
        )]));
        let ctrl = SyncController::new(gw.clone(), SyncConfig::default());
        (gw, ctrl)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_each_period() {
        let (gw, ctrl) = session();
        let _poller = Poller::spawn(&ctrl, Duration::from_secs(5));

        time::sleep(Duration::from_secs(11)).await;

        assert_eq!(gw.calls(Operation::UnreadCount), 2);
        assert_eq!(ctrl.snapshot().unread_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let (gw, ctrl) = session();
        let poller = Poller::spawn(&ctrl, Duration::from_secs(5));
        time::sleep(Duration::from_secs(6)).await;
        drop(poller);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gw.calls(Operation::UnreadCount), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_session_is_gone() {
        let (gw, ctrl) = session();
        let poller = Poller::spawn(&ctrl, Duration::from_secs(5));
        drop(ctrl);

        time::sleep(Duration::from_secs(6)).await;
        assert!(!poller.is_running());
        assert_eq!(gw.calls(Operation::UnreadCount), 0);
    }

    #[tokio::test]
    async fn disabled_by_config() {
        let gw = Arc::new(MemoryGateway::new());
        let config = SyncConfig { poll_interval_secs: 0, ..Default::default() };
        let ctrl = SyncController::new(gw, config);
        assert!(Poller::from_config(&ctrl).is_none());
    }
}
