mod common;

use common::{Harness, ticket_created};
use notify_core::entities::{DeliveryChannel, OutboxStatus};
use notify_core::events::{OutboxWritten, outbox_written_channel};
use notify_core::store::PreferenceStore;
use notify_sdk::objects::{
    EventType, NotificationEvent, PreferenceUpdate, RecipientPreference, Role,
};
use smallvec::smallvec;
use std::collections::HashMap;
use url::Url;

fn channels_of(harness: &Harness, recipient_id: &str) -> Vec<DeliveryChannel> {
    harness
        .store
        .entries()
        .into_iter()
        .filter(|e| e.recipient_id == recipient_id)
        .map(|e| e.channel)
        .collect()
}

#[tokio::test]
async fn ticket_created_fans_out_to_landlords() {
    let harness = Harness::new();

    let outcome = harness.router.route_event(&ticket_created()).await.unwrap();
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.created, 4);
    assert_eq!(outcome.duplicates, 0);

    let entries = harness.store.entries();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.status == OutboxStatus::Pending && e.attempts == 0));
    for recipient in ["alice", "bob"] {
        assert_eq!(
            channels_of(&harness, recipient),
            vec![DeliveryChannel::InApp, DeliveryChannel::Email]
        );
    }
}

#[tokio::test]
async fn routing_twice_creates_nothing_new() {
    let harness = Harness::new();

    harness.router.route_event(&ticket_created()).await.unwrap();
    let second = harness.router.route_event(&ticket_created()).await.unwrap();

    assert_eq!(second.created, 0);
    assert_eq!(second.duplicates, 4);
    assert_eq!(harness.store.entries().len(), 4);
}

#[tokio::test]
async fn new_entity_version_is_a_new_notification() {
    let harness = Harness::new();

    harness.router.route_event(&ticket_created()).await.unwrap();
    let mut next = ticket_created();
    next.entity_version = 2;
    let outcome = harness.router.route_event(&next).await.unwrap();

    assert_eq!(outcome.created, 4);
    assert_eq!(harness.store.entries().len(), 8);
}

#[tokio::test]
async fn unknown_event_type_is_not_an_error() {
    let harness = Harness::new();
    let mut event = NotificationEvent::new("ticket.sneezed", "t1");
    event.landlord_id = Some("orgA".to_owned());

    let outcome = harness.router.route_event(&event).await.unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.recipients, 0);
    assert!(harness.store.entries().is_empty());
}

#[tokio::test]
async fn missing_scope_resolves_nobody() {
    let harness = Harness::new();

    // No landlord id: neither landlords nor ops can be resolved.
    let outcome = harness
        .router
        .route_event(&NotificationEvent::new("ticket.created", "t1"))
        .await
        .unwrap();
    assert_eq!(outcome.recipients, 0);
    assert!(harness.store.entries().is_empty());
}

#[tokio::test]
async fn override_replaces_routing_defaults() {
    let harness = Harness::new();
    harness
        .store
        .update_preferences(
            "alice",
            PreferenceUpdate {
                set_overrides: HashMap::from([(
                    EventType::TicketCreated,
                    smallvec![notify_sdk::objects::Channel::InApp],
                )]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    harness.router.route_event(&ticket_created()).await.unwrap();

    assert_eq!(channels_of(&harness, "alice"), vec![DeliveryChannel::InApp]);
    assert_eq!(
        channels_of(&harness, "bob"),
        vec![DeliveryChannel::InApp, DeliveryChannel::Email]
    );
}

#[tokio::test]
async fn email_disabled_recipient_never_gets_email() {
    let harness = Harness::new();
    harness.store.set_preferences(
        "alice",
        RecipientPreference {
            email_enabled: false,
            ..Default::default()
        },
    );

    for event_type in ["ticket.created", "quote.submitted", "compliance.expiring"] {
        let mut event = NotificationEvent::new(event_type, "e1");
        event.landlord_id = Some("orgA".to_owned());
        harness.router.route_event(&event).await.unwrap();
    }

    let alice = channels_of(&harness, "alice");
    assert_eq!(alice.len(), 3);
    assert!(!alice.contains(&DeliveryChannel::Email));
    assert!(channels_of(&harness, "bob").contains(&DeliveryChannel::Email));
}

#[tokio::test]
async fn recipient_with_every_channel_off_is_skipped() {
    let harness = Harness::new();
    harness.store.set_preferences(
        "alice",
        RecipientPreference {
            email_enabled: false,
            in_app_enabled: false,
            ..Default::default()
        },
    );

    let outcome = harness.router.route_event(&ticket_created()).await.unwrap();
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.created, 2);
    assert!(channels_of(&harness, "alice").is_empty());
}

#[tokio::test]
async fn configured_webhook_is_appended() {
    let harness = Harness::new();
    harness.store.set_preferences(
        "alice",
        RecipientPreference {
            webhook_enabled: true,
            webhook_endpoint: Some(Url::parse("https://hooks.example.com/alice").unwrap()),
            overrides: HashMap::from([(
                EventType::TicketCreated,
                smallvec![notify_sdk::objects::Channel::InApp],
            )]),
            ..Default::default()
        },
    );

    harness.router.route_event(&ticket_created()).await.unwrap();

    assert_eq!(
        channels_of(&harness, "alice"),
        vec![DeliveryChannel::InApp, DeliveryChannel::Webhook]
    );
    assert!(!channels_of(&harness, "bob").contains(&DeliveryChannel::Webhook));
}

#[tokio::test]
async fn overlapping_roles_notify_once() {
    let harness = Harness::new();
    harness.store.add_member("orgA", "alice", Role::Ops);

    let outcome = harness.router.route_event(&ticket_created()).await.unwrap();
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.created, 4);
}

#[tokio::test]
async fn contractor_and_tenant_scopes() {
    let harness = Harness::new();
    let mut event = NotificationEvent::new("appointment.confirmed", "a1");
    event.tenant_id = Some("orgT".to_owned());
    event.contractor_id = Some("carl".to_owned());

    let outcome = harness.router.route_event(&event).await.unwrap();
    // Landlord scope missing: tenant + contractor only.
    assert_eq!(outcome.recipients, 2);
    assert_eq!(channels_of(&harness, "tina").len(), 2);
    assert_eq!(channels_of(&harness, "carl").len(), 2);
}

#[tokio::test]
async fn workers_are_woken_only_when_entries_are_written() {
    let harness = Harness::new();
    let (sender, mut receiver) = outbox_written_channel();
    let router = harness.router.clone().with_wake_sender(sender);

    router.route_event(&ticket_created()).await.unwrap();
    assert_eq!(receiver.try_recv().unwrap(), OutboxWritten { created: 4 });

    router.route_event(&ticket_created()).await.unwrap();
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn missing_preferences_are_created_with_defaults() {
    let harness = Harness::new();
    let prefs = harness.store.get_preferences("nobody").await.unwrap();
    assert_eq!(prefs, RecipientPreference::default());
}
