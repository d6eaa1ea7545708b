use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use notify_sdk::objects::{ChannelList, EventType, RecipientPreference};
use sqlx::types::Json;
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Debug, Clone, sqlx::FromRow)]
struct RecipientPreferenceRow {
    recipient_id: String,
    email_enabled: bool,
    webhook_enabled: bool,
    in_app_enabled: bool,
    webhook_endpoint: Option<String>,
    overrides: Json<HashMap<String, ChannelList>>,
}

impl From<RecipientPreferenceRow> for RecipientPreference {
    fn from(row: RecipientPreferenceRow) -> Self {
        let webhook_endpoint = row.webhook_endpoint.and_then(|raw| {
            url::Url::parse(&raw)
                .inspect_err(|e| {
                    warn!(
                        recipient_id = %row.recipient_id,
                        error = %e,
                        "Ignoring unparsable webhook endpoint"
                    );
                })
                .ok()
        });
        let overrides = row
            .overrides
            .0
            .into_iter()
            .filter_map(|(raw, channels)| match raw.parse::<EventType>() {
                Ok(event_type) => Some((event_type, channels)),
                Err(_) => {
                    warn!(
                        recipient_id = %row.recipient_id,
                        event_type = %raw,
                        "Ignoring channel override for unknown event type"
                    );
                    None
                }
            })
            .collect();
        RecipientPreference {
            email_enabled: row.email_enabled,
            webhook_enabled: row.webhook_enabled,
            in_app_enabled: row.in_app_enabled,
            webhook_endpoint,
            overrides,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetRecipientPreference {
    pub recipient_id: String,
}

impl Processor<GetRecipientPreference> for DatabaseProcessor {
    type Output = Option<RecipientPreference>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRecipientPreference")]
    async fn process(
        &self,
        query: GetRecipientPreference,
    ) -> Result<Option<RecipientPreference>, sqlx::Error> {
        let row = sqlx::query_as::<_, RecipientPreferenceRow>(
            r#"
            SELECT
                recipient_id,
                email_enabled,
                webhook_enabled,
                in_app_enabled,
                webhook_endpoint,
                overrides
            FROM recipient_preferences
            WHERE recipient_id = $1
            "#,
        )
        .bind(query.recipient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}

#[derive(Debug, Clone)]
/// Insert or replace a recipient's full preference record.
pub struct SaveRecipientPreference {
    pub recipient_id: String,
    pub preference: RecipientPreference,
    pub now: OffsetDateTime,
}

impl Processor<SaveRecipientPreference> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveRecipientPreference")]
    async fn process(&self, cmd: SaveRecipientPreference) -> Result<(), sqlx::Error> {
        let SaveRecipientPreference {
            recipient_id,
            preference,
            now,
        } = cmd;
        sqlx::query(
            r#"
            INSERT INTO recipient_preferences
                (recipient_id, email_enabled, webhook_enabled, in_app_enabled,
                 webhook_endpoint, overrides, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (recipient_id) DO UPDATE SET
                email_enabled = EXCLUDED.email_enabled,
                webhook_enabled = EXCLUDED.webhook_enabled,
                in_app_enabled = EXCLUDED.in_app_enabled,
                webhook_endpoint = EXCLUDED.webhook_endpoint,
                overrides = EXCLUDED.overrides,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(recipient_id)
        .bind(preference.email_enabled)
        .bind(preference.webhook_enabled)
        .bind(preference.in_app_enabled)
        .bind(preference.webhook_endpoint.map(String::from))
        .bind(Json(preference.overrides))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Create a default preference record if the recipient has none yet.
pub struct EnsureRecipientPreference {
    pub recipient_id: String,
    pub now: OffsetDateTime,
}

impl Processor<EnsureRecipientPreference> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:EnsureRecipientPreference")]
    async fn process(&self, cmd: EnsureRecipientPreference) -> Result<(), sqlx::Error> {
        let defaults = RecipientPreference::default();
        sqlx::query(
            r#"
            INSERT INTO recipient_preferences
                (recipient_id, email_enabled, webhook_enabled, in_app_enabled, overrides, updated_at)
            VALUES ($1, $2, $3, $4, '{}'::jsonb, $5)
            ON CONFLICT (recipient_id) DO NOTHING
            "#,
        )
        .bind(cmd.recipient_id)
        .bind(defaults.email_enabled)
        .bind(defaults.webhook_enabled)
        .bind(defaults.in_app_enabled)
        .bind(cmd.now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_sdk::objects::Channel;
    use smallvec::smallvec;

    fn row(overrides: HashMap<String, ChannelList>) -> RecipientPreferenceRow {
        RecipientPreferenceRow {
            recipient_id: "alice".to_owned(),
            email_enabled: true,
            webhook_enabled: false,
            in_app_enabled: true,
            webhook_endpoint: Some("not a url".to_owned()),
            overrides: Json(overrides),
        }
    }

    #[test]
    fn test_unknown_override_keys_are_dropped() {
        let overrides = HashMap::from([
            ("ticket.created".to_owned(), smallvec![Channel::Email]),
            ("ticket.sneezed".to_owned(), smallvec![Channel::InApp]),
        ]);

        let preference = RecipientPreference::from(row(overrides));
        assert_eq!(preference.overrides.len(), 1);
        assert_eq!(
            preference.overrides.get(&EventType::TicketCreated).map(|c| c.as_slice()),
            Some([Channel::Email].as_slice())
        );
        assert!(preference.webhook_endpoint.is_none());
    }
}
