use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// In-app notification read-model row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    pub resource_type: String,
    pub resource_id: String,
    pub read_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct InsertNotification {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    pub resource_type: String,
    pub resource_id: String,
    pub now: OffsetDateTime,
}

impl Processor<InsertNotification> for DatabaseProcessor {
    type Output = Notification;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotification")]
    async fn process(&self, insert: InsertNotification) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications
                (id, recipient_id, title, message, resource_type, resource_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING
                id,
                recipient_id,
                title,
                message,
                resource_type,
                resource_id,
                read_at,
                created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(insert.recipient_id)
        .bind(insert.title)
        .bind(insert.message)
        .bind(insert.resource_type)
        .bind(insert.resource_id)
        .bind(insert.now)
        .fetch_one(&self.pool)
        .await
    }
}
