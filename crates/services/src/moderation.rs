use std::sync::Arc;

use domains::{
    DomainError, Identity, IdentityRepository, NotificationType, Principal, Result,
    DEFAULT_SUSPENSION_REASON,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::notifications::{compose, NotificationDraft};

/// Administrator actions on identities. Node removal and locking live on
/// `ContentService`.
#[derive(Clone)]
pub struct ModerationService {
    identities: Arc<dyn IdentityRepository>,
}

impl ModerationService {
    pub fn new(identities: Arc<dyn IdentityRepository>) -> Self {
        Self { identities }
    }

    /// Flips the suspension flag. Suspending records the reason and leaves the
    /// identity a SUSPENSION notification in the same atomic write; lifting
    /// it clears the reason.
    #[instrument(skip(self, admin, reason), fields(admin = %admin.id))]
    pub async fn toggle_suspension(
        &self,
        admin: &Principal,
        target_id: Uuid,
        reason: Option<String>,
    ) -> Result<Identity> {
        if !admin.is_admin() {
            return Err(DomainError::Unauthorized("administrator role required".into()));
        }
        let target = self
            .identities
            .find_identity(target_id)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", target_id))?;

        let suspend = !target.is_suspended;
        let reason = suspend.then(|| {
            reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUSPENSION_REASON.to_string())
        });

        let notice = reason.as_ref().and_then(|reason| {
            compose(
                NotificationDraft::new(target_id, admin.id, NotificationType::Suspension)
                    .reason(reason.as_str()),
            )
        });

        let updated = self
            .identities
            .set_suspension(target_id, suspend, reason, notice)
            .await?;
        info!(%target_id, suspended = suspend, "suspension toggled");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockIdentityRepository, Role};

    fn admin() -> Principal {
        Principal {
            id: Uuid::now_v7(),
            username: "mod".into(),
            role: Role::Admin,
        }
    }

    fn holding(target: &Identity) -> MockIdentityRepository {
        let mut identities = MockIdentityRepository::new();
        let stored = target.clone();
        identities
            .expect_find_identity()
            .returning(move |_| Ok(Some(stored.clone())));
        identities
    }

    #[tokio::test]
    async fn suspending_records_default_reason_with_the_notice() {
        let target = Identity::new("troll".into(), "hash".into());
        let target_id = target.id;

        let mut identities = holding(&target);
        identities
            .expect_set_suspension()
            .times(1)
            .withf(move |_, suspended, reason, notice| {
                *suspended
                    && reason.as_deref() == Some(DEFAULT_SUSPENSION_REASON)
                    && notice.as_ref().is_some_and(|n| {
                        n.kind == NotificationType::Suspension
                            && n.recipient_id == target_id
                            && n.reason.as_deref() == Some(DEFAULT_SUSPENSION_REASON)
                    })
            })
            .returning(move |_, suspended, reason, _| {
                let mut t = target.clone();
                t.is_suspended = suspended;
                t.suspension_reason = reason;
                Ok(t)
            });

        let svc = ModerationService::new(Arc::new(identities));
        let updated = svc.toggle_suspension(&admin(), target_id, None).await.unwrap();
        assert!(updated.is_suspended);
    }

    #[tokio::test]
    async fn lifting_a_suspension_sends_no_notice() {
        let mut target = Identity::new("reformed".into(), "hash".into());
        target.is_suspended = true;
        target.suspension_reason = Some("spam".into());
        let target_id = target.id;

        let mut identities = holding(&target);
        identities
            .expect_set_suspension()
            .times(1)
            .withf(|_, suspended, reason, notice| !*suspended && reason.is_none() && notice.is_none())
            .returning(move |_, _, _, _| {
                let mut t = target.clone();
                t.is_suspended = false;
                t.suspension_reason = None;
                Ok(t)
            });

        let svc = ModerationService::new(Arc::new(identities));
        let updated = svc
            .toggle_suspension(&admin(), target_id, Some("ignored".into()))
            .await
            .unwrap();
        assert!(!updated.is_suspended);
    }

    #[tokio::test]
    async fn failed_write_leaves_the_flag_for_a_retry() {
        let target = Identity::new("troll".into(), "hash".into());
        let target_id = target.id;

        // Nothing committed, so the lookup still sees the identity unsuspended.
        let mut identities = holding(&target);
        let mut seq = mockall::Sequence::new();
        identities
            .expect_set_suspension()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, suspended, _, notice| *suspended && notice.is_some())
            .returning(|_, _, _, _| Err(DomainError::Internal("db blip".into())));
        identities
            .expect_set_suspension()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, suspended, _, notice| *suspended && notice.is_some())
            .returning(move |_, suspended, reason, _| {
                let mut t = target.clone();
                t.is_suspended = suspended;
                t.suspension_reason = reason;
                Ok(t)
            });

        let svc = ModerationService::new(Arc::new(identities));
        let err = svc
            .toggle_suspension(&admin(), target_id, Some("spam".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));

        let retried = svc
            .toggle_suspension(&admin(), target_id, Some("spam".into()))
            .await
            .unwrap();
        assert!(retried.is_suspended);
        assert_eq!(retried.suspension_reason.as_deref(), Some("spam"));
    }

    #[tokio::test]
    async fn non_admin_cannot_suspend() {
        let svc = ModerationService::new(Arc::new(MockIdentityRepository::new()));
        let user = Principal {
            id: Uuid::now_v7(),
            username: "user".into(),
            role: Role::User,
        };
        let err = svc
            .toggle_suspension(&user, Uuid::now_v7(), Some("spite".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
