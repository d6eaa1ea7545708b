//! Domain events produced by business modules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::signature::Signature;

/// Event types that have notification behavior.
///
/// Producers send the type as a plain string (`"ticket.created"`), so an
/// event whose type is not listed here is still a valid event: it simply has
/// no routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ticket.created")]
    TicketCreated,
    #[serde(rename = "ticket.assigned")]
    TicketAssigned,
    #[serde(rename = "ticket.status_changed")]
    TicketStatusChanged,
    #[serde(rename = "ticket.commented")]
    TicketCommented,
    #[serde(rename = "quote.submitted")]
    QuoteSubmitted,
    #[serde(rename = "quote.approved")]
    QuoteApproved,
    #[serde(rename = "quote.rejected")]
    QuoteRejected,
    #[serde(rename = "appointment.proposed")]
    AppointmentProposed,
    #[serde(rename = "appointment.confirmed")]
    AppointmentConfirmed,
    #[serde(rename = "invoice.issued")]
    InvoiceIssued,
    #[serde(rename = "invoice.paid")]
    InvoicePaid,
    #[serde(rename = "compliance.expiring")]
    ComplianceExpiring,
    #[serde(rename = "banking.sync_failed")]
    BankingSyncFailed,
}

impl EventType {
    pub const ALL: [EventType; 13] = [
        EventType::TicketCreated,
        EventType::TicketAssigned,
        EventType::TicketStatusChanged,
        EventType::TicketCommented,
        EventType::QuoteSubmitted,
        EventType::QuoteApproved,
        EventType::QuoteRejected,
        EventType::AppointmentProposed,
        EventType::AppointmentConfirmed,
        EventType::InvoiceIssued,
        EventType::InvoicePaid,
        EventType::ComplianceExpiring,
        EventType::BankingSyncFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TicketCreated => "ticket.created",
            EventType::TicketAssigned => "ticket.assigned",
            EventType::TicketStatusChanged => "ticket.status_changed",
            EventType::TicketCommented => "ticket.commented",
            EventType::QuoteSubmitted => "quote.submitted",
            EventType::QuoteApproved => "quote.approved",
            EventType::QuoteRejected => "quote.rejected",
            EventType::AppointmentProposed => "appointment.proposed",
            EventType::AppointmentConfirmed => "appointment.confirmed",
            EventType::InvoiceIssued => "invoice.issued",
            EventType::InvoicePaid => "invoice.paid",
            EventType::ComplianceExpiring => "compliance.expiring",
            EventType::BankingSyncFailed => "banking.sync_failed",
        }
    }

    /// The kind of resource the event is about, used to link in-app
    /// notifications back to the entity.
    pub fn resource_type(&self) -> &'static str {
        match self {
            EventType::TicketCreated
            | EventType::TicketAssigned
            | EventType::TicketStatusChanged
            | EventType::TicketCommented => "ticket",
            EventType::QuoteSubmitted | EventType::QuoteApproved | EventType::QuoteRejected => {
                "quote"
            }
            EventType::AppointmentProposed | EventType::AppointmentConfirmed => "appointment",
            EventType::InvoiceIssued | EventType::InvoicePaid => "invoice",
            EventType::ComplianceExpiring => "compliance_document",
            EventType::BankingSyncFailed => "bank_connection",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_owned()))
    }
}

/// A business occurrence that may result in notifications.
///
/// The event is transient: it is consumed by a single routing call and only
/// its identifying fields and payload end up in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub entity_id: String,
    #[serde(default = "default_entity_version")]
    pub entity_version: i64,
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Landlord organization; scope for `Landlord` and `Ops` recipients.
    #[serde(default)]
    pub landlord_id: Option<String>,
    /// Tenant organization; scope for `Tenant` recipients.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// The contractor user named on the entity.
    #[serde(default)]
    pub contractor_id: Option<String>,
    #[serde(default)]
    pub payload: EventPayload,
}

fn default_entity_version() -> i64 {
    1
}

impl Signature for NotificationEvent {}

impl NotificationEvent {
    pub fn new(event_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            entity_version: default_entity_version(),
            actor_id: None,
            landlord_id: None,
            tenant_id: None,
            contractor_id: None,
            payload: EventPayload::Empty,
        }
    }

    /// The typed event type, or `None` when the producer sent a type this
    /// service has no notion of.
    pub fn known_type(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }
}

/// Event-specific data forwarded to the channel adapters.
///
/// The outbox stores this serialized; only the adapter that renders it
/// decodes it back into a variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    #[default]
    Empty,
    Ticket {
        title: String,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        property: Option<String>,
    },
    Quote {
        reference: String,
        amount: Decimal,
        currency: String,
    },
    Appointment {
        #[serde(with = "time::serde::rfc3339")]
        scheduled_for: time::OffsetDateTime,
        #[serde(default)]
        location: Option<String>,
    },
    Invoice {
        number: String,
        amount: Decimal,
        currency: String,
        #[serde(default)]
        due_on: Option<String>,
    },
    Compliance {
        document: String,
        expires_on: String,
    },
    Message {
        title: String,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse() {
        assert_eq!("quote.approved".parse(), Ok(EventType::QuoteApproved));
        assert_eq!(
            "ticket.sneezed".parse::<EventType>(),
            Err(UnknownEventType("ticket.sneezed".to_owned()))
        );
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_event_defaults() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{"type":"ticket.created","entityId":"t1","landlordId":"orgA"}"#,
        )
        .unwrap();
        assert_eq!(event.entity_version, 1);
        assert_eq!(event.landlord_id.as_deref(), Some("orgA"));
        assert_eq!(event.payload, EventPayload::Empty);
        assert_eq!(event.known_type(), Some(EventType::TicketCreated));
    }

    #[test]
    fn test_payload_tagging() {
        let payload: EventPayload = serde_json::from_str(
            r#"{"kind":"quote","reference":"Q-7","amount":"125.50","currency":"EUR"}"#,
        )
        .unwrap();
        let EventPayload::Quote { amount, .. } = payload else {
            panic!("expected quote payload");
        };
        assert_eq!(amount.to_string(), "125.50");
    }
}
