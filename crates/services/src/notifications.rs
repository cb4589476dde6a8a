//! # NotificationEngine
//!
//! Derives typed notification records from graph mutations. Self-notification
//! is suppressed for every social type; administrative types (SUSPENSION,
//! POST_DELETED) are always recorded.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    ContentNode, DomainError, Notification, NotificationRepository, NotificationType,
    NotificationView, Principal, Result, NOTIFICATION_LIMIT,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Everything needed to describe one notification before it is persisted.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationType,
    pub related_post_id: Option<Uuid>,
    pub reason: Option<String>,
    pub context: Option<String>,
}

impl NotificationDraft {
    pub fn new(recipient_id: Uuid, actor_id: Uuid, kind: NotificationType) -> Self {
        Self {
            recipient_id,
            actor_id,
            kind,
            related_post_id: None,
            reason: None,
            context: None,
        }
    }

    pub fn post(mut self, post_id: Uuid) -> Self {
        self.related_post_id = Some(post_id);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Applies the suppression rule. `None` means nothing should be recorded.
pub fn compose(draft: NotificationDraft) -> Option<Notification> {
    if draft.recipient_id == draft.actor_id && !draft.kind.is_administrative() {
        return None;
    }
    Some(Notification {
        id: Uuid::now_v7(),
        recipient_id: draft.recipient_id,
        actor_id: draft.actor_id,
        kind: draft.kind,
        related_post_id: draft.related_post_id,
        reason: draft.reason,
        context_snippet: draft.context,
        is_read: false,
        created_at: Utc::now(),
    })
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Records a notification unless suppressed. Returns what was stored.
    #[instrument(skip(self, draft), fields(kind = draft.kind.as_str()))]
    pub async fn notify(&self, draft: NotificationDraft) -> Result<Option<Notification>> {
        let Some(notification) = compose(draft) else {
            debug!("self-notification suppressed");
            return Ok(None);
        };
        self.repo.insert_notification(notification.clone()).await?;
        Ok(Some(notification))
    }

    /// REPLY or BRANCH to the parent's author for a freshly created child.
    pub async fn notify_reply(&self, parent: &ContentNode, child: &ContentNode) -> Result<Option<Notification>> {
        let draft = NotificationDraft::new(
            parent.author_id,
            child.author_id,
            NotificationType::for_reply_to(parent),
        )
        .post(child.id);
        self.notify(draft).await
    }

    /// Side-effect flavour used after the primary mutation already committed:
    /// a failure is logged rather than failing the caller's request.
    pub async fn notify_best_effort(&self, draft: NotificationDraft) {
        let kind = draft.kind;
        if let Err(e) = self.notify(draft).await {
            warn!(kind = kind.as_str(), "failed to record notification: {e}");
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<NotificationView>> {
        self.repo.list_for_recipient(user_id, NOTIFICATION_LIMIT).await
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.repo.mark_all_read(user_id).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        self.repo.unread_count(user_id).await
    }

    /// Only the recipient may delete a notification.
    pub async fn delete(&self, notification_id: Uuid, requester: &Principal) -> Result<()> {
        let notification = self
            .repo
            .find_notification(notification_id)
            .await?
            .ok_or_else(|| DomainError::not_found("notification", notification_id))?;

        if notification.recipient_id != requester.id {
            return Err(DomainError::Unauthorized(
                "only the recipient may delete a notification".into(),
            ));
        }
        self.repo.delete_notification(notification_id).await
    }
}
