//! Change events published by the database on the notification channel.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Kind of catalog entity a change event refers to.
///
/// Unknown kinds are kept verbatim so that the listener can log them and
/// still advance its watermark when the database side grows new triggers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Test,
    TestGroup,
    PriceListEntry,
    PriceListGroupEntry,
    Unknown(String),
}

impl EntityKind {
    /// Canonical snake_case name used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Test => "test",
            Self::TestGroup => "test_group",
            Self::PriceListEntry => "price_list_entry",
            Self::PriceListGroupEntry => "price_list_group_entry",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns true for kinds whose events carry a price list id.
    pub fn is_price_scoped(&self) -> bool {
        matches!(self, Self::PriceListEntry | Self::PriceListGroupEntry)
    }

    /// Returns true if the kind was not recognised.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl FromStr for EntityKind {
    type Err = std::convert::Infallible;

    /// Accepts `price_list_entry`, `PriceListEntry` and `price-list-entry` alike.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        Ok(match normalized.as_str() {
            "test" => Self::Test,
            "testgroup" => Self::TestGroup,
            "pricelistentry" => Self::PriceListEntry,
            "pricelistgroupentry" => Self::PriceListGroupEntry,
            _ => Self::Unknown(s.to_string()),
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change announced by the database.
///
/// Only identifiers travel on the channel. Consumers re-read current state
/// from the source instead of trusting event contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub entity_id: i64,
    pub price_list_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Wire shape of a notification payload.
#[derive(Debug, Serialize, Deserialize)]
struct RawPayload {
    #[serde(alias = "entityKind", alias = "entity_kind")]
    kind: String,
    #[serde(alias = "entityId", alias = "id")]
    entity_id: i64,
    #[serde(
        default,
        alias = "priceListId",
        skip_serializing_if = "Option::is_none"
    )]
    price_list_id: Option<i64>,
    #[serde(alias = "occurredAt", alias = "ts")]
    occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event for an entity that is not price scoped.
    pub fn new(kind: EntityKind, entity_id: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            entity_id,
            price_list_id: None,
            occurred_at,
        }
    }

    /// Creates a price-scoped event.
    pub fn priced(
        kind: EntityKind,
        entity_id: i64,
        price_list_id: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            entity_id,
            price_list_id: Some(price_list_id),
            occurred_at,
        }
    }

    /// Decodes a notification payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricecache_core::{ChangeEvent, EntityKind};
    ///
    /// let payload = r#"{"kind":"price_list_entry","entity_id":1001,
    ///     "price_list_id":27,"occurred_at":"2026-01-05T10:00:00Z"}"#;
    /// let event = ChangeEvent::from_payload(payload).unwrap();
    /// assert_eq!(event.kind, EntityKind::PriceListEntry);
    /// assert_eq!(event.price_list_id, Some(27));
    /// ```
    ///
    /// # Errors
    ///
    /// - `CoreError::MalformedPayload` if the payload is not valid JSON or
    ///   misses a required field
    /// - `CoreError::MissingPriceList` if a price-scoped kind has no price list
    pub fn from_payload(payload: &str) -> Result<Self> {
        let raw: RawPayload =
            serde_json::from_str(payload).map_err(|e| CoreError::malformed(e.to_string()))?;

        // Infallible
        let kind = raw.kind.parse::<EntityKind>().unwrap_or_else(|e| match e {});

        let price_list_id = match (&kind, raw.price_list_id) {
            (k, None) if k.is_price_scoped() => {
                return Err(CoreError::MissingPriceList {
                    kind: k.to_string(),
                });
            },
            (k, Some(_)) if matches!(k, EntityKind::Test | EntityKind::TestGroup) => None,
            (_, id) => id,
        };

        Ok(Self {
            kind,
            entity_id: raw.entity_id,
            price_list_id,
            occurred_at: raw.occurred_at,
        })
    }

    /// Encodes the event the way the database trigger publishes it.
    pub fn to_payload(&self) -> String {
        let raw = RawPayload {
            kind: self.kind.to_string(),
            entity_id: self.entity_id,
            price_list_id: self.price_list_id,
            occurred_at: self.occurred_at,
        };
        // A struct of strings, integers and timestamps always serializes.
        serde_json::to_string(&raw).unwrap_or_default()
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.price_list_id {
            Some(pl) => write!(f, "{}#{}@{}", self.kind, self.entity_id, pl),
            None => write!(f, "{}#{}", self.kind, self.entity_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_kind_parsing_is_case_and_separator_insensitive() {
        assert_eq!("test".parse::<EntityKind>().unwrap(), EntityKind::Test);
        assert_eq!(
            "TestGroup".parse::<EntityKind>().unwrap(),
            EntityKind::TestGroup
        );
        assert_eq!(
            "price-list-entry".parse::<EntityKind>().unwrap(),
            EntityKind::PriceListEntry
        );
        assert_eq!(
            "PRICE_LIST_GROUP_ENTRY".parse::<EntityKind>().unwrap(),
            EntityKind::PriceListGroupEntry
        );
        assert_eq!(
            "discount".parse::<EntityKind>().unwrap(),
            EntityKind::Unknown("discount".into())
        );
    }

    #[test]
    fn test_decode_price_scoped_event() {
        let payload = r#"{"kind":"price_list_entry","entity_id":1001,"price_list_id":27,"occurred_at":"2026-01-05T10:00:00Z"}"#;
        let event = ChangeEvent::from_payload(payload).unwrap();

        assert_eq!(event, ChangeEvent::priced(EntityKind::PriceListEntry, 1001, 27, ts()));
    }

    #[test]
    fn test_decode_accepts_camel_case_fields() {
        let payload = r#"{"entityKind":"TestGroup","entityId":5,"occurredAt":"2026-01-05T10:00:00Z"}"#;
        let event = ChangeEvent::from_payload(payload).unwrap();

        assert_eq!(event.kind, EntityKind::TestGroup);
        assert_eq!(event.entity_id, 5);
        assert!(event.price_list_id.is_none());
    }

    #[test]
    fn test_decode_unknown_kind_is_not_an_error() {
        let payload = r#"{"kind":"discount","entity_id":3,"occurred_at":"2026-01-05T10:00:00Z"}"#;
        let event = ChangeEvent::from_payload(payload).unwrap();

        assert!(event.kind.is_unknown());
        assert_eq!(event.occurred_at, ts());
    }

    #[test]
    fn test_decode_rejects_price_event_without_scope() {
        let payload = r#"{"kind":"price_list_entry","entity_id":1,"occurred_at":"2026-01-05T10:00:00Z"}"#;
        let err = ChangeEvent::from_payload(payload).unwrap_err();

        assert!(matches!(err, CoreError::MissingPriceList { .. }));
    }

    #[test]
    fn test_decode_drops_scope_on_structural_event() {
        let payload = r#"{"kind":"test","entity_id":1,"price_list_id":9,"occurred_at":"2026-01-05T10:00:00Z"}"#;
        let event = ChangeEvent::from_payload(payload).unwrap();

        assert!(event.price_list_id.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ChangeEvent::from_payload("").unwrap_err().is_malformed());
        assert!(ChangeEvent::from_payload("{}").unwrap_err().is_malformed());
        assert!(
            ChangeEvent::from_payload(r#"{"kind":"test","entity_id":"x","occurred_at":"2026-01-05T10:00:00Z"}"#)
                .unwrap_err()
                .is_malformed()
        );
    }

    #[test]
    fn test_payload_is_decodable() {
        let event = ChangeEvent::priced(EntityKind::PriceListGroupEntry, 12, 4, ts());
        let decoded = ChangeEvent::from_payload(&event.to_payload()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_display() {
        let event = ChangeEvent::priced(EntityKind::PriceListEntry, 1001, 27, ts());
        assert_eq!(event.to_string(), "price_list_entry#1001@27");
        let event = ChangeEvent::new(EntityKind::Test, 7, ts());
        assert_eq!(event.to_string(), "test#7");
    }
}
