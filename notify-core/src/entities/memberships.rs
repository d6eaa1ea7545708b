use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use notify_sdk::objects::Role;

#[derive(Debug, Clone)]
/// Users holding `role` within organization `org_id`.
pub struct ListOrgMembersWithRole {
    pub org_id: String,
    pub role: Role,
}

impl Processor<ListOrgMembersWithRole> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrgMembersWithRole")]
    async fn process(&self, query: ListOrgMembersWithRole) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id
            FROM org_memberships
            WHERE org_id = $1
              AND role = $2
            ORDER BY user_id
            "#,
        )
        .bind(query.org_id)
        .bind(query.role.as_str())
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetRecipientEmail {
    pub recipient_id: String,
}

impl Processor<GetRecipientEmail> for DatabaseProcessor {
    type Output = Option<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRecipientEmail")]
    async fn process(&self, query: GetRecipientEmail) -> Result<Option<String>, sqlx::Error> {
        let email = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT email
            FROM recipients
            WHERE id = $1
            "#,
        )
        .bind(query.recipient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(email.flatten())
    }
}
