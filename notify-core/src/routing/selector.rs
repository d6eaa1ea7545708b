use super::RoutingRule;
use crate::store::{PreferenceStore, StoreError};
use notify_sdk::objects::{Channel, ChannelList, EventType, RecipientPreference};
use std::sync::Arc;

/// Fold a routing rule's defaults with one recipient's preferences.
///
/// 1. An override for `event_type` replaces the defaults entirely.
/// 2. Channel switches are applied; webhook also needs an endpoint.
/// 3. A configured webhook is always added, even when neither list names it.
///
/// The result is deduplicated and keeps list order. An empty list means the
/// recipient gets nothing for this event.
pub fn select_channels(
    rule: &RoutingRule,
    event_type: EventType,
    preference: &RecipientPreference,
) -> ChannelList {
    let base = preference
        .override_for(event_type)
        .unwrap_or(&rule.default_channels);
    let webhook_ready = preference.webhook_target().is_some();

    let mut selected = ChannelList::new();
    for &channel in base {
        let enabled = match channel {
            Channel::InApp => preference.in_app_enabled,
            Channel::Email => preference.email_enabled,
            Channel::Webhook => webhook_ready,
        };
        if enabled && !selected.contains(&channel) {
            selected.push(channel);
        }
    }

    if webhook_ready && !selected.contains(&Channel::Webhook) {
        selected.push(Channel::Webhook);
    }

    selected
}

/// [`select_channels`] backed by the preference store.
#[derive(Clone)]
pub struct ChannelSelector {
    preferences: Arc<dyn PreferenceStore>,
}

impl ChannelSelector {
    pub fn new(preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { preferences }
    }

    pub async fn select(
        &self,
        recipient_id: &str,
        event_type: EventType,
        rule: &RoutingRule,
    ) -> Result<ChannelList, StoreError> {
        let preference = self.preferences.get_preferences(recipient_id).await?;
        Ok(select_channels(rule, event_type, &preference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_sdk::objects::Role;
    use smallvec::smallvec;
    use url::Url;

    fn rule() -> RoutingRule {
        RoutingRule::new([Role::Landlord], [Channel::Email, Channel::InApp])
    }

    fn with_webhook() -> RecipientPreference {
        RecipientPreference {
            webhook_enabled: true,
            webhook_endpoint: Some(Url::parse("https://hooks.example.com/n").unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_pass_through() {
        let selected = select_channels(&rule(), EventType::TicketCreated, &Default::default());
        assert_eq!(selected.as_slice(), &[Channel::Email, Channel::InApp]);
    }

    #[test]
    fn test_override_replaces_defaults() {
        let mut prefs = RecipientPreference::default();
        prefs
            .overrides
            .insert(EventType::TicketCreated, smallvec![Channel::InApp]);
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::InApp]);

        // Overrides are per event type.
        let selected = select_channels(&rule(), EventType::QuoteSubmitted, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::Email, Channel::InApp]);
    }

    #[test]
    fn test_gates_remove_disabled_channels() {
        let prefs = RecipientPreference {
            email_enabled: false,
            ..Default::default()
        };
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::InApp]);

        let prefs = RecipientPreference {
            email_enabled: false,
            in_app_enabled: false,
            ..Default::default()
        };
        assert!(select_channels(&rule(), EventType::TicketCreated, &prefs).is_empty());
    }

    #[test]
    fn test_gates_apply_to_overrides() {
        let mut prefs = RecipientPreference {
            email_enabled: false,
            ..Default::default()
        };
        prefs
            .overrides
            .insert(EventType::TicketCreated, smallvec![Channel::Email]);
        assert!(select_channels(&rule(), EventType::TicketCreated, &prefs).is_empty());
    }

    #[test]
    fn test_webhook_without_endpoint_is_dropped() {
        let mut prefs = RecipientPreference {
            webhook_enabled: true,
            ..Default::default()
        };
        prefs.overrides.insert(
            EventType::TicketCreated,
            smallvec![Channel::Webhook, Channel::InApp],
        );
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::InApp]);
    }

    #[test]
    fn test_configured_webhook_is_added() {
        let mut prefs = with_webhook();
        prefs
            .overrides
            .insert(EventType::TicketCreated, smallvec![Channel::InApp]);
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::InApp, Channel::Webhook]);
    }

    #[test]
    fn test_webhook_not_duplicated() {
        let mut prefs = with_webhook();
        prefs.overrides.insert(
            EventType::TicketCreated,
            smallvec![Channel::Webhook, Channel::Email, Channel::Webhook],
        );
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::Webhook, Channel::Email]);
    }

    #[test]
    fn test_webhook_added_with_other_channels_disabled() {
        let prefs = RecipientPreference {
            email_enabled: false,
            in_app_enabled: false,
            ..with_webhook()
        };
        let selected = select_channels(&rule(), EventType::TicketCreated, &prefs);
        assert_eq!(selected.as_slice(), &[Channel::Webhook]);
    }
}
