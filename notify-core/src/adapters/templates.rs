//! Per-event-type rendering of in-app and email content.
//!
//! Text is derived from the typed [`EventPayload`]; email bodies go through
//! handlebars so interpolated values are HTML-escaped in the HTML part.

use super::AdapterError;
use handlebars::Handlebars;
use notify_sdk::objects::{EventPayload, EventType};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

const EMAIL_HTML: &str = "email-html";
const EMAIL_TEXT: &str = "email-text";

const EMAIL_HTML_TEMPLATE: &str = r#"<h2 class="title">{{title}}</h2>
<p class="body-text">{{message}}</p>
{{#if details}}
<ul>
{{#each details}}
    <li><strong>{{label}}</strong>: {{value}}</li>
{{/each}}
</ul>
{{/if}}
<p class="footer">Reference: {{resource_type}} <span class="identifier">{{resource_id}}</span></p>"#;

const EMAIL_TEXT_TEMPLATE: &str = r#"{{{title}}}

{{{message}}}
{{#each details}}
- {{{label}}}: {{{value}}}
{{/each}}

Reference: {{{resource_type}}} {{{resource_id}}}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InAppContent {
    pub title: String,
    pub message: String,
    pub resource_type: &'static str,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct Detail {
    label: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    title: String,
    message: String,
    details: Vec<Detail>,
    resource_type: &'static str,
    resource_id: String,
}

/// Decode a stored outbox payload.
pub fn decode_payload(raw: &str) -> Result<EventPayload, AdapterError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn render_in_app(event_type: EventType, entity_id: &str, payload: &EventPayload) -> InAppContent {
    let summary = summarize(event_type, entity_id, payload);
    InAppContent {
        title: summary.title,
        message: summary.message,
        resource_type: summary.resource_type,
        resource_id: summary.resource_id,
    }
}

pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_template_string(EMAIL_HTML, EMAIL_HTML_TEMPLATE)?;
        registry.register_template_string(EMAIL_TEXT, EMAIL_TEXT_TEMPLATE)?;
        Ok(Self { registry })
    }

    pub fn render_email(
        &self,
        event_type: EventType,
        entity_id: &str,
        payload: &EventPayload,
    ) -> Result<EmailContent, AdapterError> {
        let summary = summarize(event_type, entity_id, payload);
        Ok(EmailContent {
            html: self.registry.render(EMAIL_HTML, &summary)?,
            text: self.registry.render(EMAIL_TEXT, &summary)?,
            subject: summary.title,
        })
    }
}

fn detail(label: &'static str, value: impl Into<String>) -> Detail {
    Detail {
        label,
        value: value.into(),
    }
}

fn summarize(event_type: EventType, entity_id: &str, payload: &EventPayload) -> Summary {
    let (subject, mut message, details) = describe_payload(payload);
    let subject = subject.unwrap_or_else(|| format!("{} {entity_id}", event_type.resource_type()));

    let title = match event_type {
        EventType::TicketCreated => format!("New ticket: {subject}"),
        EventType::TicketAssigned => format!("Ticket assigned: {subject}"),
        EventType::TicketStatusChanged => format!("Ticket updated: {subject}"),
        EventType::TicketCommented => format!("New comment on {subject}"),
        EventType::QuoteSubmitted => format!("Quote {subject} submitted"),
        EventType::QuoteApproved => format!("Quote {subject} approved"),
        EventType::QuoteRejected => format!("Quote {subject} rejected"),
        EventType::AppointmentProposed => "Appointment proposed".to_owned(),
        EventType::AppointmentConfirmed => "Appointment confirmed".to_owned(),
        EventType::InvoiceIssued => format!("Invoice {subject} issued"),
        EventType::InvoicePaid => format!("Invoice {subject} paid"),
        EventType::ComplianceExpiring => format!("{subject} is expiring"),
        EventType::BankingSyncFailed => "Bank account sync failed".to_owned(),
    };

    if message.is_empty() {
        message = details
            .iter()
            .map(|d| format!("{}: {}", d.label, d.value))
            .collect::<Vec<_>>()
            .join(", ");
    }
    if message.is_empty() {
        message = title.clone();
    }

    Summary {
        title,
        message,
        details,
        resource_type: event_type.resource_type(),
        resource_id: entity_id.to_owned(),
    }
}

/// (subject used in the title, free-form message, labelled details)
fn describe_payload(payload: &EventPayload) -> (Option<String>, String, Vec<Detail>) {
    match payload {
        EventPayload::Empty => (None, String::new(), Vec::new()),
        EventPayload::Ticket {
            title,
            priority,
            status,
            property,
        } => {
            let details = [
                ("Priority", priority),
                ("Status", status),
                ("Property", property),
            ]
            .into_iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| detail(label, v.as_str())))
            .collect();
            (Some(title.clone()), String::new(), details)
        }
        EventPayload::Quote {
            reference,
            amount,
            currency,
        } => (
            Some(reference.clone()),
            String::new(),
            vec![detail("Amount", format!("{amount} {currency}"))],
        ),
        EventPayload::Appointment {
            scheduled_for,
            location,
        } => {
            let when = scheduled_for
                .format(&Rfc3339)
                .unwrap_or_else(|_| scheduled_for.to_string());
            let mut details = vec![detail("Scheduled for", when)];
            if let Some(location) = location {
                details.push(detail("Location", location.as_str()));
            }
            (None, String::new(), details)
        }
        EventPayload::Invoice {
            number,
            amount,
            currency,
            due_on,
        } => {
            let mut details = vec![detail("Amount", format!("{amount} {currency}"))];
            if let Some(due_on) = due_on {
                details.push(detail("Due on", due_on.as_str()));
            }
            (Some(number.clone()), String::new(), details)
        }
        EventPayload::Compliance {
            document,
            expires_on,
        } => (
            Some(document.clone()),
            format!("{document} expires on {expires_on}."),
            vec![detail("Expires on", expires_on.as_str())],
        ),
        EventPayload::Message { title, body } => (Some(title.clone()), body.clone(), Vec::new()),
    }
}
