//! Per-recipient notification preferences.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use super::channels::ChannelList;
use super::events::EventType;

/// A recipient's channel switches and per-event-type overrides.
///
/// A recipient without stored preferences gets [`RecipientPreference::default`]:
/// email and in-app enabled, webhook disabled, no overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientPreference {
    pub email_enabled: bool,
    pub webhook_enabled: bool,
    pub in_app_enabled: bool,
    #[serde(default)]
    pub webhook_endpoint: Option<Url>,
    /// Explicit channel lists that replace the routing default for an event type.
    #[serde(default)]
    pub overrides: HashMap<EventType, ChannelList>,
}

impl Default for RecipientPreference {
    fn default() -> Self {
        Self {
            email_enabled: true,
            webhook_enabled: false,
            in_app_enabled: true,
            webhook_endpoint: None,
            overrides: HashMap::new(),
        }
    }
}

impl RecipientPreference {
    pub fn override_for(&self, event_type: EventType) -> Option<&ChannelList> {
        self.overrides.get(&event_type)
    }

    /// Webhook delivery needs both the switch and somewhere to post to.
    pub fn webhook_target(&self) -> Option<&Url> {
        if self.webhook_enabled {
            self.webhook_endpoint.as_ref()
        } else {
            None
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: PreferenceUpdate) {
        if let Some(v) = update.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = update.webhook_enabled {
            self.webhook_enabled = v;
        }
        if let Some(v) = update.in_app_enabled {
            self.in_app_enabled = v;
        }
        if update.clear_webhook_endpoint {
            self.webhook_endpoint = None;
        }
        if let Some(endpoint) = update.webhook_endpoint {
            self.webhook_endpoint = Some(endpoint);
        }
        for event_type in update.clear_overrides {
            self.overrides.remove(&event_type);
        }
        self.overrides.extend(update.set_overrides);
    }
}

/// A partial preferences update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default)]
    pub email_enabled: Option<bool>,
    #[serde(default)]
    pub webhook_enabled: Option<bool>,
    #[serde(default)]
    pub in_app_enabled: Option<bool>,
    #[serde(default)]
    pub webhook_endpoint: Option<Url>,
    #[serde(default)]
    pub clear_webhook_endpoint: bool,
    #[serde(default)]
    pub set_overrides: HashMap<EventType, ChannelList>,
    #[serde(default)]
    pub clear_overrides: Vec<EventType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Channel;
    use smallvec::smallvec;

    #[test]
    fn test_default_preferences() {
        let prefs = RecipientPreference::default();
        assert!(prefs.email_enabled);
        assert!(prefs.in_app_enabled);
        assert!(!prefs.webhook_enabled);
        assert!(prefs.webhook_target().is_none());
    }

    #[test]
    fn test_apply_partial_update() {
        let mut prefs = RecipientPreference::default();
        prefs.apply(PreferenceUpdate {
            webhook_enabled: Some(true),
            webhook_endpoint: Some(Url::parse("https://hooks.example.com/n").unwrap()),
            set_overrides: HashMap::from([(EventType::TicketCreated, smallvec![Channel::InApp])]),
            ..Default::default()
        });
        assert!(prefs.email_enabled);
        assert_eq!(
            prefs.webhook_target().map(Url::as_str),
            Some("https://hooks.example.com/n")
        );
        assert_eq!(
            prefs.override_for(EventType::TicketCreated).map(|c| c.as_slice()),
            Some(&[Channel::InApp][..])
        );

        prefs.apply(PreferenceUpdate {
            clear_webhook_endpoint: true,
            clear_overrides: vec![EventType::TicketCreated],
            ..Default::default()
        });
        assert!(prefs.webhook_target().is_none());
        assert!(prefs.override_for(EventType::TicketCreated).is_none());
    }

    #[test]
    fn test_overrides_json_keys() {
        let prefs: RecipientPreference = serde_json::from_str(
            r#"{"email_enabled":false,"webhook_enabled":false,"in_app_enabled":true,
                "overrides":{"quote.approved":["in-app"]}}"#,
        )
        .unwrap();
        assert_eq!(
            prefs.override_for(EventType::QuoteApproved).map(|c| c.len()),
            Some(1)
        );
    }
}
