use super::RoutingRule;
use crate::store::{MembershipDirectory, StoreError};
use notify_sdk::objects::{NotificationEvent, Role};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Turns a rule's allowed roles into the concrete recipients of one event.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn MembershipDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { directory }
    }

    /// Union of the recipients of every allowed role.
    ///
    /// A role whose scope identifier is missing from the event contributes
    /// nobody; an empty result means nobody matched and is not an error.
    pub async fn resolve(
        &self,
        event: &NotificationEvent,
        rule: &RoutingRule,
    ) -> Result<BTreeSet<String>, StoreError> {
        let mut recipients = BTreeSet::new();

        for &role in &rule.allowed_roles {
            match role_scope(event, role) {
                Some(RoleScope::Organization(org_id)) => {
                    let members = self.directory.members_with_role(org_id, role).await?;
                    recipients.extend(members);
                }
                Some(RoleScope::Actor(actor_id)) => {
                    recipients.insert(actor_id.to_owned());
                }
                None => {
                    debug!(
                        event_type = %event.event_type,
                        entity_id = %event.entity_id,
                        %role,
                        "Event carries no scope for role, skipping"
                    );
                }
            }
        }

        Ok(recipients)
    }
}

enum RoleScope<'a> {
    Organization(&'a str),
    Actor(&'a str),
}

fn role_scope(event: &NotificationEvent, role: Role) -> Option<RoleScope<'_>> {
    match role {
        Role::Landlord | Role::Ops => non_empty(&event.landlord_id).map(RoleScope::Organization),
        Role::Tenant => non_empty(&event.tenant_id).map(RoleScope::Organization),
        Role::Contractor => non_empty(&event.contractor_id).map(RoleScope::Actor),
    }
}

fn non_empty(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use notify_sdk::objects::Channel;

    fn resolver(store: &Arc<MemoryStore>) -> RecipientResolver {
        RecipientResolver::new(store.clone())
    }

    #[tokio::test]
    async fn test_overlapping_roles_collapse() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("orgA", "alice", Role::Landlord);
        store.add_member("orgA", "alice", Role::Ops);
        store.add_member("orgA", "bob", Role::Ops);

        let mut event = NotificationEvent::new("ticket.created", "t1");
        event.landlord_id = Some("orgA".to_owned());
        let rule = RoutingRule::new([Role::Landlord, Role::Ops], [Channel::InApp]);

        let recipients = resolver(&store).resolve(&event, &rule).await.unwrap();
        assert_eq!(
            recipients.into_iter().collect::<Vec<_>>(),
            vec!["alice".to_owned(), "bob".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_missing_scope_yields_nobody() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("orgB", "tina", Role::Tenant);

        let event = NotificationEvent::new("appointment.proposed", "a1");
        let rule = RoutingRule::new([Role::Tenant, Role::Contractor], [Channel::Email]);

        let recipients = resolver(&store).resolve(&event, &rule).await.unwrap();
        assert!(recipients.is_empty());
    }

    #[tokio::test]
    async fn test_empty_scope_yields_nobody() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("", "ghost", Role::Tenant);

        let mut event = NotificationEvent::new("appointment.proposed", "a1");
        event.tenant_id = Some(String::new());
        event.contractor_id = Some(String::new());
        let rule = RoutingRule::new([Role::Tenant, Role::Contractor], [Channel::Email]);

        let recipients = resolver(&store).resolve(&event, &rule).await.unwrap();
        assert!(recipients.is_empty());
    }

    #[tokio::test]
    async fn test_contractor_is_named_actor() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("orgB", "tina", Role::Tenant);

        let mut event = NotificationEvent::new("appointment.confirmed", "a1");
        event.tenant_id = Some("orgB".to_owned());
        event.contractor_id = Some("carl".to_owned());
        let rule = RoutingRule::new([Role::Tenant, Role::Contractor], [Channel::Email]);

        let recipients = resolver(&store).resolve(&event, &rule).await.unwrap();
        assert!(recipients.contains("tina"));
        assert!(recipients.contains("carl"));
        assert_eq!(recipients.len(), 2);
    }
}
