//! Event routing: who gets notified, and on which channels.
//!
//! - [`RoutingTable`]: event type -> allowed roles + default channels
//! - [`RecipientResolver`]: roles -> concrete recipient ids for one event
//! - [`ChannelSelector`]: routing defaults folded with recipient preferences

pub mod resolver;
pub mod selector;

pub use resolver::RecipientResolver;
pub use selector::{ChannelSelector, select_channels};

use notify_sdk::objects::{Channel, ChannelList, EventType, Role};
use std::collections::{BTreeSet, HashMap};

/// Who may be notified for an event type and on which channels by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub allowed_roles: BTreeSet<Role>,
    /// Deduplicated, in declaration order.
    pub default_channels: ChannelList,
}

impl RoutingRule {
    pub fn new(
        roles: impl IntoIterator<Item = Role>,
        channels: impl IntoIterator<Item = Channel>,
    ) -> Self {
        let mut default_channels = ChannelList::new();
        for channel in channels {
            if !default_channels.contains(&channel) {
                default_channels.push(channel);
            }
        }
        Self {
            allowed_roles: roles.into_iter().collect(),
            default_channels,
        }
    }
}

/// Static mapping from event type to [`RoutingRule`].
///
/// Built once at startup and shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: HashMap<EventType, RoutingRule>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The routing rules every deployment starts from.
    pub fn builtin() -> Self {
        use Channel::{Email, InApp};
        use Role::{Contractor, Landlord, Ops, Tenant};

        let rules = [
            (EventType::TicketCreated, RoutingRule::new([Landlord, Ops], [InApp, Email])),
            (EventType::TicketAssigned, RoutingRule::new([Contractor, Ops], [InApp, Email])),
            (EventType::TicketStatusChanged, RoutingRule::new([Landlord, Tenant], [InApp])),
            (
                EventType::TicketCommented,
                RoutingRule::new([Landlord, Tenant, Contractor], [InApp]),
            ),
            (EventType::QuoteSubmitted, RoutingRule::new([Landlord, Ops], [InApp, Email])),
            (EventType::QuoteApproved, RoutingRule::new([Contractor, Ops], [InApp, Email])),
            (EventType::QuoteRejected, RoutingRule::new([Contractor], [InApp, Email])),
            (EventType::AppointmentProposed, RoutingRule::new([Tenant], [InApp, Email])),
            (
                EventType::AppointmentConfirmed,
                RoutingRule::new([Landlord, Tenant, Contractor], [InApp, Email]),
            ),
            (EventType::InvoiceIssued, RoutingRule::new([Landlord], [InApp, Email])),
            (EventType::InvoicePaid, RoutingRule::new([Contractor, Ops], [InApp])),
            (EventType::ComplianceExpiring, RoutingRule::new([Landlord, Ops], [Email, InApp])),
            (EventType::BankingSyncFailed, RoutingRule::new([Ops], [InApp, Email])),
        ];

        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Replace or add rules, e.g. from the `[[routing]]` config section.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = (EventType, RoutingRule)>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Look up the rule for a raw event type string.
    ///
    /// `None` is an expected outcome: the event type is unknown, or known
    /// but without notification behavior.
    pub fn lookup(&self, event_type: &str) -> Option<(EventType, &RoutingRule)> {
        let event_type: EventType = event_type.parse().ok()?;
        self.rules.get(&event_type).map(|rule| (event_type, rule))
    }

    pub fn get(&self, event_type: EventType) -> Option<&RoutingRule> {
        self.rules.get(&event_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
