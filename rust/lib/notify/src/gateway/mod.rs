//! Boundary to the remote notification API.
//!
//! The controller depends only on [`NotificationGateway`]. Two adapters
//! ship with the crate: [`HttpGateway`] for a live server and
//! [`MemoryGateway`] for tests and offline use.

mod http;
mod memory;

pub use http::{HttpGateway, NoAuth, StaticToken, TokenSource};
pub use memory::{Hold, MemoryGateway, Operation};

use crate::error::GatewayError;
use crate::model::Page;

/// Remote notification operations. Every call is fallible and may be
/// issued concurrently with any other; retrying a call is harmless.
#[async_trait::async_trait]
pub trait NotificationGateway: Send + Sync + 'static {
    /// Authoritative number of unread notifications.
    async fn fetch_unread_count(&self) -> Result<u32, GatewayError>;

    /// Page `page` (0-based) of the list, newest first.
    async fn fetch_page(&self, page: u32, size: u32) -> Result<Page, GatewayError>;

    async fn mark_read(&self, id: &str) -> Result<(), GatewayError>;

    async fn mark_all_read(&self) -> Result<(), GatewayError>;
}
