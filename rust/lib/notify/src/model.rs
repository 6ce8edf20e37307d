use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

// ====================================================================
// NotificationKind
// ====================================================================

/// Category of a notification, as sent in the `type` field.
///
/// The set is closed. Wire values this client does not know about map to
/// [`NotificationKind::General`] instead of failing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Booking,
    OrderPlaced,
    OrderApproved,
    OrderRejected,
    PaymentCompleted,
    VehicleHandover,
    TopupSuccessful,
    SystemAnnouncement,
    MaintenanceNotice,
    VehiclePickupConfirmed,
    VehicleReturnConfirmed,
    BookingCompleted,
    VehicleApproved,
    VehicleRejected,
    Report,
    General,
}

/// Accent color a presentation layer uses for a notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Blue,
    Green,
    Red,
    Purple,
    Yellow,
    Orange,
    Gray,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 16] = [
        NotificationKind::Booking,
        NotificationKind::OrderPlaced,
        NotificationKind::OrderApproved,
        NotificationKind::OrderRejected,
        NotificationKind::PaymentCompleted,
        NotificationKind::VehicleHandover,
        NotificationKind::TopupSuccessful,
        NotificationKind::SystemAnnouncement,
        NotificationKind::MaintenanceNotice,
        NotificationKind::VehiclePickupConfirmed,
        NotificationKind::VehicleReturnConfirmed,
        NotificationKind::BookingCompleted,
        NotificationKind::VehicleApproved,
        NotificationKind::VehicleRejected,
        NotificationKind::Report,
        NotificationKind::General,
    ];

    /// Map a wire `type` string to a kind. Matching ignores case and
    /// surrounding whitespace.
    pub fn from_wire(value: &str) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_wire().eq_ignore_ascii_case(value))
            .unwrap_or(NotificationKind::General)
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            NotificationKind::Booking => "BOOKING",
            NotificationKind::OrderPlaced => "ORDER_PLACED",
            NotificationKind::OrderApproved => "ORDER_APPROVED",
            NotificationKind::OrderRejected => "ORDER_REJECTED",
            NotificationKind::PaymentCompleted => "PAYMENT_COMPLETED",
            NotificationKind::VehicleHandover => "VEHICLE_HANDOVER",
            NotificationKind::TopupSuccessful => "TOPUP_SUCCESSFUL",
            NotificationKind::SystemAnnouncement => "SYSTEM_ANNOUNCEMENT",
            NotificationKind::MaintenanceNotice => "MAINTENANCE_NOTICE",
            NotificationKind::VehiclePickupConfirmed => "VEHICLE_PICKUP_CONFIRMED",
            NotificationKind::VehicleReturnConfirmed => "VEHICLE_RETURN_CONFIRMED",
            NotificationKind::BookingCompleted => "BOOKING_COMPLETED",
            NotificationKind::VehicleApproved => "VEHICLE_APPROVED",
            NotificationKind::VehicleRejected => "VEHICLE_REJECTED",
            NotificationKind::Report => "REPORT",
            NotificationKind::General => "GENERAL",
        }
    }

    /// Icon identifier (heroicons set) for this kind.
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Booking => "heroicons:calendar-days-20-solid",
            NotificationKind::OrderPlaced => "heroicons:shopping-cart-20-solid",
            NotificationKind::OrderApproved => "heroicons:check-circle-20-solid",
            NotificationKind::OrderRejected => "heroicons:x-circle-20-solid",
            NotificationKind::PaymentCompleted => "heroicons:credit-card-20-solid",
            NotificationKind::VehicleHandover => "heroicons:key-20-solid",
            NotificationKind::TopupSuccessful => "heroicons:banknotes-20-solid",
            NotificationKind::SystemAnnouncement => "heroicons:megaphone-20-solid",
            NotificationKind::MaintenanceNotice => "heroicons:wrench-screwdriver-20-solid",
            NotificationKind::VehiclePickupConfirmed => "heroicons:check-badge-20-solid",
            NotificationKind::VehicleReturnConfirmed => "heroicons:arrow-uturn-left-20-solid",
            NotificationKind::BookingCompleted | NotificationKind::Report => "heroicons:flag-20-solid",
            NotificationKind::VehicleApproved => "heroicons:shield-check-20-solid",
            NotificationKind::VehicleRejected => "heroicons:shield-exclamation-20-solid",
            NotificationKind::General => "heroicons:bell-20-solid",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            NotificationKind::Booking
            | NotificationKind::OrderPlaced
            | NotificationKind::VehicleReturnConfirmed => Tone::Blue,
            NotificationKind::OrderApproved
            | NotificationKind::TopupSuccessful
            | NotificationKind::VehiclePickupConfirmed
            | NotificationKind::VehicleApproved => Tone::Green,
            NotificationKind::OrderRejected | NotificationKind::VehicleRejected => Tone::Red,
            NotificationKind::PaymentCompleted | NotificationKind::BookingCompleted => Tone::Purple,
            NotificationKind::VehicleHandover => Tone::Yellow,
            NotificationKind::SystemAnnouncement | NotificationKind::Report => Tone::Orange,
            NotificationKind::MaintenanceNotice | NotificationKind::General => Tone::Gray,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ====================================================================
// Timestamp
// ====================================================================

/// Creation time of a notification.
///
/// The API sends either a string or a `[year, month, day, hour, minute,
/// second, nanos]` tuple; both are normalized into this one type at the
/// gateway boundary. The value carries no zone: tuples and zone-less
/// strings are kept as-is, RFC 3339 strings are converted to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Build from calendar parts. Requires at least year, month (1-based)
    /// and day; missing time parts are zero.
    pub fn from_parts(parts: &[i64]) -> Option<Self> {
        if parts.len() < 3 {
            return None;
        }
        let part = |i: usize| -> Option<u32> {
            u32::try_from(parts.get(i).copied().unwrap_or(0)).ok()
        };
        let year = i32::try_from(parts[0]).ok()?;
        let date = NaiveDate::from_ymd_opt(year, part(1)?, part(2)?)?;
        let time = NaiveTime::from_hms_nano_opt(part(3)?, part(4)?, part(5)?, part(6)?)?;
        Some(Self(date.and_time(time)))
    }

    /// Parse RFC 3339, zone-less ISO date-times, or a bare date.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(value) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(value.naive_utc()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self(value));
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Self)
    }

    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|value| Self(value.naive_utc()))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

// ====================================================================
// NotificationItem
// ====================================================================

/// A single notification as held by the client.
///
/// Everything except `is_read` is fixed once fetched, and `is_read` only
/// ever moves from `false` to `true` on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: Option<Timestamp>,
    /// Opaque navigation reference (a route in the web front end).
    pub redirect_target: Option<String>,
}

impl NotificationItem {
    /// An unread item with no timestamp and no redirect target.
    pub fn new(id: impl Into<String>, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            message: message.into(),
            is_read: false,
            created_at: None,
            redirect_target: None,
        }
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect_target = Some(target.into());
        self
    }

    pub fn with_created_at(mut self, at: Timestamp) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }
}

/// One page of the remote notification list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<NotificationItem>,
    /// True when no page follows this one.
    pub is_last: bool,
    pub number: u32,
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_map_back() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::from_wire(kind.as_wire()), kind);
        }
    }

    #[test]
    fn kind_from_wire_ignores_case() {
        assert_eq!(NotificationKind::from_wire(" booking "), NotificationKind::Booking);
        assert_eq!(
            NotificationKind::from_wire("Vehicle_Approved"),
            NotificationKind::VehicleApproved
        );
    }

    #[test]
    fn unknown_kind_falls_back_to_general() {
        let kind = NotificationKind::from_wire("WALLET_FROZEN");
        assert_eq!(kind, NotificationKind::General);
        assert_eq!(kind.icon(), "heroicons:bell-20-solid");
        assert_eq!(kind.tone(), Tone::Gray);
    }

    #[test]
    fn kind_presentation_mapping() {
        assert_eq!(NotificationKind::OrderRejected.tone(), Tone::Red);
        assert_eq!(NotificationKind::PaymentCompleted.tone(), Tone::Purple);
        assert_eq!(NotificationKind::VehicleHandover.icon(), "heroicons:key-20-solid");
        assert_eq!(NotificationKind::Report.icon(), NotificationKind::BookingCompleted.icon());
    }

    #[test]
    fn timestamp_from_full_parts() {
        let ts = Timestamp::from_parts(&[2024, 3, 9, 14, 5, 30]).unwrap();
        assert_eq!(ts.to_string(), "2024-03-09 14:05:30");
    }

    #[test]
    fn timestamp_from_partial_parts() {
        let ts = Timestamp::from_parts(&[2024, 12, 31]).unwrap();
        assert_eq!(ts.to_string(), "2024-12-31 00:00:00");
        assert!(Timestamp::from_parts(&[2024, 12]).is_none());
    }

    #[test]
    fn timestamp_parts_reject_invalid_dates() {
        assert!(Timestamp::from_parts(&[2024, 13, 1]).is_none());
        assert!(Timestamp::from_parts(&[2024, 2, 30, 0, 0, 0]).is_none());
        assert!(Timestamp::from_parts(&[2024, -1, 1]).is_none());
    }

    #[test]
    fn timestamp_parse_variants() {
        let zone_less = Timestamp::parse("2024-03-09T14:05:30").unwrap();
        assert_eq!(zone_less.to_string(), "2024-03-09 14:05:30");

        let fractional = Timestamp::parse("2024-03-09T14:05:30.123456").unwrap();
        assert_eq!(fractional.to_string(), "2024-03-09 14:05:30");

        let spaced = Timestamp::parse("2024-03-09 14:05:30").unwrap();
        assert_eq!(spaced, zone_less);

        let rfc = Timestamp::parse("2024-03-09T16:05:30+02:00").unwrap();
        assert_eq!(rfc, zone_less);

        let date_only = Timestamp::parse("2024-03-09").unwrap();
        assert_eq!(date_only.to_string(), "2024-03-09 00:00:00");

        assert!(Timestamp::parse("yesterday").is_none());
        assert!(Timestamp::parse("").is_none());
    }

    #[test]
    fn timestamp_from_epoch_millis() {
        let ts = Timestamp::from_epoch_millis(0).unwrap();
        assert_eq!(ts.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn item_builders() {
        let item = NotificationItem::new("n1", NotificationKind::Booking, "Booked")
            .with_redirect("/bookings/1")
            .read();
        assert_eq!(item.id, "n1");
        assert!(item.is_read);
        assert_eq!(item.redirect_target.as_deref(), Some("/bookings/1"));
        assert!(item.created_at.is_none());
    }
}
