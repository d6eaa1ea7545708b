#![allow(dead_code)]

use async_trait::async_trait;
use notify_core::adapters::{
    AdapterError, ChannelAdapters, EmailChannel, InAppChannel, SignedPayload, TemplateRenderer,
    WebhookChannel,
};
use notify_core::config::{WebhookConfig, WorkerConfig};
use notify_core::outbox::OutboxWriter;
use notify_core::processors::{DeliveryWorker, NotificationRouter};
use notify_core::routing::RoutingTable;
use notify_core::store::{MemoryStore, OutboxStore};
use notify_sdk::objects::{NotificationEvent, Role};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const WEBHOOK_SECRET: &[u8] = b"webhook-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    InApp { recipient_id: String, title: String },
    Email { recipient_id: String, subject: String },
    Webhook { endpoint: Url, payload: SignedPayload },
}

/// Records every delivery; fails all of them while `failing` is set.
#[derive(Default)]
pub struct RecordingAdapters {
    pub failing: AtomicBool,
    calls: AtomicUsize,
    next_call_delay: Mutex<Option<Duration>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingAdapters {
    /// Adapter invocations, including ones that never finished.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call hang for `delay` before it records anything.
    pub fn delay_next_call(&self, delay: Duration) {
        *self.next_call_delay.lock().unwrap() = Some(delay);
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.next_call_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, delivery: Delivery) -> Result<(), AdapterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Rejected {
                status: 503,
                body: "provider unavailable".to_owned(),
            });
        }
        self.deliveries.lock().unwrap().push(delivery);
        Ok(())
    }

    pub fn bundle(self: &Arc<Self>) -> ChannelAdapters {
        ChannelAdapters {
            in_app: self.clone(),
            email: self.clone(),
            webhook: self.clone(),
        }
    }
}

#[async_trait]
impl InAppChannel for RecordingAdapters {
    async fn deliver_in_app(
        &self,
        recipient_id: &str,
        title: &str,
        _message: &str,
        _resource_type: &str,
        _resource_id: &str,
    ) -> Result<(), AdapterError> {
        self.enter().await;
        self.record(Delivery::InApp {
            recipient_id: recipient_id.to_owned(),
            title: title.to_owned(),
        })
    }
}

#[async_trait]
impl EmailChannel for RecordingAdapters {
    async fn deliver_email(
        &self,
        recipient_id: &str,
        subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> Result<(), AdapterError> {
        self.enter().await;
        self.record(Delivery::Email {
            recipient_id: recipient_id.to_owned(),
            subject: subject.to_owned(),
        })
    }
}

#[async_trait]
impl WebhookChannel for RecordingAdapters {
    async fn deliver_webhook(
        &self,
        endpoint: &Url,
        payload: &SignedPayload,
    ) -> Result<(), AdapterError> {
        self.enter().await;
        self.record(Delivery::Webhook {
            endpoint: endpoint.clone(),
            payload: payload.clone(),
        })
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub adapters: Arc<RecordingAdapters>,
    pub router: NotificationRouter,
}

impl Harness {
    /// orgA has two landlords (alice, bob) and no ops members;
    /// orgT has one tenant (tina).
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.add_member("orgA", "alice", Role::Landlord);
        store.add_member("orgA", "bob", Role::Landlord);
        store.add_member("orgT", "tina", Role::Tenant);

        let router = NotificationRouter::new(
            Arc::new(RoutingTable::builtin()),
            store.clone(),
            store.clone(),
            OutboxWriter::new(store.clone()),
        );

        Self {
            store,
            adapters: Arc::new(RecordingAdapters::default()),
            router,
        }
    }

    pub fn worker(&self) -> DeliveryWorker {
        self.worker_with(WorkerConfig::default())
    }

    pub fn worker_with(&self, config: WorkerConfig) -> DeliveryWorker {
        self.worker_on(self.store.clone(), config)
    }

    /// A worker whose outbox writes go through `outbox` instead of the store.
    pub fn worker_on(&self, outbox: Arc<dyn OutboxStore>, config: WorkerConfig) -> DeliveryWorker {
        DeliveryWorker::new(
            outbox,
            self.store.clone(),
            self.adapters.bundle(),
            Arc::new(TemplateRenderer::new().unwrap()),
            &WebhookConfig::new(WEBHOOK_SECRET.to_vec(), Duration::from_secs(5)),
            config,
        )
    }
}

/// `ticket.created` for `t1` version 1 in landlord org `orgA`.
pub fn ticket_created() -> NotificationEvent {
    let mut event = NotificationEvent::new("ticket.created", "t1");
    event.landlord_id = Some("orgA".to_owned());
    event
}
