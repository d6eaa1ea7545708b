//! Delivery channels and recipient roles.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A delivery mechanism for a notification.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use `DeliveryChannel` in `notify-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    InApp,
    Email,
    Webhook,
}

/// Channel lists never hold more than the three channels, so they stay inline.
pub type ChannelList = SmallVec<[Channel; 3]>;

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::InApp, Channel::Email, Channel::Webhook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in-app",
            Channel::Email => "email",
            Channel::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role a recipient holds relative to the event's entity.
///
/// Each role is resolved against a different identifier on the event:
/// `Landlord` and `Ops` against the landlord organization, `Tenant` against
/// the tenant organization, and `Contractor` against the named contractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Landlord,
    Ops,
    Tenant,
    Contractor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Landlord => "landlord",
            Role::Ops => "ops",
            Role::Tenant => "tenant",
            Role::Contractor => "contractor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
