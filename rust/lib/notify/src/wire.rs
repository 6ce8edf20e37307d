//! JSON shapes of the notification API and their normalization.
//!
//! Decoding is lenient per item: a malformed notification is rendered
//! with defaults, and only an item without a usable id is dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::model::{NotificationItem, NotificationKind, Page, Timestamp};

/// A notification as sent by the server.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireNotification {
    pub id: Value,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub is_read: Option<bool>,
    pub created_at: Value,
    #[serde(deserialize_with = "lenient")]
    pub redirect_url: Option<String>,
}

/// Accept any JSON for a field, keeping it only when it has the expected
/// type. A mistyped field falls back to its default instead of failing
/// the whole item.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl WireNotification {
    /// Normalize into a [`NotificationItem`]. Returns `None` when the
    /// payload has no usable id.
    pub fn into_item(self) -> Option<NotificationItem> {
        let id = match self.id {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(NotificationItem {
            id,
            kind: self
                .kind
                .as_deref()
                .map(NotificationKind::from_wire)
                .unwrap_or(NotificationKind::General),
            message: self.message.unwrap_or_default(),
            is_read: self.is_read.unwrap_or(false),
            created_at: timestamp_from_value(&self.created_at),
            redirect_target: self.redirect_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

/// Normalize the `createdAt` field: a calendar tuple, a date-time string,
/// or epoch milliseconds.
pub fn timestamp_from_value(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Array(parts) => {
            let parts: Option<Vec<i64>> = parts.iter().map(Value::as_i64).collect();
            Timestamp::from_parts(&parts?)
        }
        Value::String(text) => Timestamp::parse(text),
        Value::Number(n) => n.as_i64().and_then(Timestamp::from_epoch_millis),
        _ => None,
    }
}

/// Decode one list entry. Only an entry that is not an object, or has no
/// usable id, is logged and skipped.
pub fn decode_item(value: Value) -> Option<NotificationItem> {
    match serde_json::from_value::<WireNotification>(value) {
        Ok(wire) => {
            let item = wire.into_item();
            if item.is_none() {
                warn!("notification without id in page payload, skipping");
            }
            item
        }
        Err(e) => {
            warn!("undecodable notification in page payload, skipping: {}", e);
            None
        }
    }
}

/// `GET /notifications?page=&size=` response body.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WirePage {
    #[serde(deserialize_with = "lenient")]
    pub content: Option<Vec<Value>>,
    pub last: bool,
    pub number: u32,
    pub size: u32,
}

impl Default for WirePage {
    fn default() -> Self {
        Self {
            content: None,
            // Without the flag we cannot tell whether more pages exist;
            // stop paging rather than loop on an empty tail.
            last: true,
            number: 0,
            size: 0,
        }
    }
}

impl From<WirePage> for Page {
    fn from(wire: WirePage) -> Self {
        Page {
            items: wire
                .content
                .unwrap_or_default()
                .into_iter()
                .filter_map(decode_item)
                .collect(),
            is_last: wire.last,
            number: wire.number,
            size: wire.size,
        }
    }
}

/// `GET /notifications/unread-count` response body.
#[derive(Debug, Deserialize)]
pub struct WireUnreadCount {
    #[serde(rename = "unreadCount")]
    pub unread_count: i64,
}

impl WireUnreadCount {
    pub fn clamped(&self) -> u32 {
        u32::try_from(self.unread_count.max(0)).unwrap_or(u32::MAX)
    }
}

/// Refresh signal pushed by the live-update channel.
///
/// `target` names the area to refresh (`notification`, `wallet`,
/// `booking`, `vehicle`, ...) and is used as the bus topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}
