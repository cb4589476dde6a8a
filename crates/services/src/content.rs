//! # ContentGraphStore
//!
//! Create, edit and delete nodes of the content forest, walk lineages and
//! toggle likes. Each mutation commits first; notification and live
//! broadcast follow as side effects of the same request.

use std::collections::HashSet;
use std::sync::Arc;

use domains::{
    CascadeOutcome, ContentNode, ContentRepository, DomainError, EnrichedNode, EventPublisher,
    IdentityRepository, LikeRepository, LikeToggle, LiveEvent, ModerationStatus, NotificationType,
    Principal, Result, DEFAULT_DELETION_REASON,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::feed::Enricher;
use crate::notifications::{compose, NotificationDraft, NotificationService};
use crate::throttle::SubmissionThrottle;

/// A publish request as it arrives from a client.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub context_binding: Option<String>,
}

#[derive(Clone)]
pub struct ContentService {
    content: Arc<dyn ContentRepository>,
    likes: Arc<dyn LikeRepository>,
    identities: Arc<dyn IdentityRepository>,
    notifications: NotificationService,
    enricher: Enricher,
    bus: Arc<dyn EventPublisher>,
    throttle: Arc<SubmissionThrottle>,
}

impl ContentService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        likes: Arc<dyn LikeRepository>,
        identities: Arc<dyn IdentityRepository>,
        notifications: NotificationService,
        bus: Arc<dyn EventPublisher>,
        throttle: Arc<SubmissionThrottle>,
    ) -> Self {
        let enricher = Enricher::new(likes.clone(), identities.clone());
        Self {
            content,
            likes,
            identities,
            notifications,
            enricher,
            bus,
            throttle,
        }
    }

    async fn require_node(&self, id: Uuid) -> Result<ContentNode> {
        self.content
            .find_node(id)
            .await?
            .ok_or_else(|| DomainError::not_found("node", id))
    }

    /// Publishes a root node or a reply.
    ///
    /// A reply must reference an existing, live parent; its origin is the
    /// parent's lineage root. A context binding must quote the parent.
    #[instrument(skip(self, author, new), fields(author = %author.id, parent = ?new.parent_id))]
    pub async fn create_node(&self, author: &Principal, new: NewNode) -> Result<EnrichedNode> {
        let content = required_content(&new.content)?;
        let binding = new
            .context_binding
            .filter(|b| !b.trim().is_empty());

        let identity = self
            .identities
            .find_identity(author.id)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", author.id))?;
        if identity.is_suspended {
            return Err(DomainError::Unauthorized("identity is suspended".into()));
        }

        let (node, parent) = match new.parent_id {
            Some(parent_id) => {
                let parent = self.require_node(parent_id).await?;
                if !parent.accepts_replies() {
                    return Err(DomainError::Validation(format!(
                        "node {parent_id} is not accepting replies"
                    )));
                }
                if let Some(b) = &binding {
                    if !parent.content.contains(b.as_str()) {
                        return Err(DomainError::Validation(
                            "context binding must quote the parent's content".into(),
                        ));
                    }
                }
                (ContentNode::reply_to(&parent, author.id, content, binding), Some(parent))
            }
            None => {
                if binding.is_some() {
                    return Err(DomainError::Validation(
                        "context binding requires a parent".into(),
                    ));
                }
                (ContentNode::root(author.id, content), None)
            }
        };

        // Only a submission that passed every other check spends allowance.
        self.throttle.check(author.id)?;
        self.content.insert_node(node.clone()).await?;
        info!(node = %node.id, origin = %node.origin_id, "node created");

        if let Some(parent) = &parent {
            if let Err(e) = self.notifications.notify_reply(parent, &node).await {
                warn!(node = %node.id, "failed to record reply notification: {e}");
            }
        }

        let enriched = self.enricher.enrich_one(None, node).await?;
        self.bus.publish(LiveEvent::NewPost(enriched.clone()));
        Ok(enriched)
    }

    /// Only the author may edit, and only while the node is live.
    #[instrument(skip(self, editor, content), fields(editor = %editor.id))]
    pub async fn edit_node(&self, editor: &Principal, id: Uuid, content: String) -> Result<ContentNode> {
        let content = required_content(&content)?;
        let node = self.require_node(id).await?;
        if node.author_id != editor.id {
            return Err(DomainError::Unauthorized("only the author may edit a node".into()));
        }
        if node.status != ModerationStatus::Live {
            return Err(DomainError::Validation(format!("node {id} is locked")));
        }
        self.content.update_content(id, content).await
    }

    /// Deletes a node and its direct children (one level only) atomically.
    ///
    /// Grandchildren survive with a dangling parent and stay reachable through
    /// their origin. An administrator deleting someone else's node leaves the
    /// author a POST_DELETED notification with the reason and a snapshot of
    /// the removed text, written in the same atomic unit.
    #[instrument(skip(self, requester, reason), fields(requester = %requester.id))]
    pub async fn delete_node(
        &self,
        requester: &Principal,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<CascadeOutcome> {
        let node = self.require_node(id).await?;
        let is_owner = node.author_id == requester.id;
        if !is_owner && !requester.is_admin() {
            return Err(DomainError::Unauthorized(
                "only the author or an administrator may delete a node".into(),
            ));
        }

        let notice = if requester.is_admin() && !is_owner {
            let reason = reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DELETION_REASON.to_string());
            compose(
                NotificationDraft::new(node.author_id, requester.id, NotificationType::PostDeleted)
                    .reason(reason)
                    .context(node.content.clone()),
            )
        } else {
            None
        };

        let outcome = self.content.delete_cascade(id, notice).await?;
        info!(
            node = %id,
            children = outcome.removed_children.len(),
            moderated = !is_owner,
            "node deleted"
        );
        Ok(outcome)
    }

    pub async fn get_node(&self, viewer: Option<Uuid>, id: Uuid) -> Result<EnrichedNode> {
        let node = self.require_node(id).await?;
        self.enricher.enrich_one(viewer, node).await
    }

    /// The full lineage under `root_id`, oldest first.
    ///
    /// Walks parent links breadth-first, then adds every node that shares the
    /// origin, which picks up subtrees whose intermediate parent was removed
    /// by a shallow delete. A node reached twice is reported and skipped.
    #[instrument(skip(self))]
    pub async fn descendants(&self, viewer: Option<Uuid>, root_id: Uuid) -> Result<Vec<EnrichedNode>> {
        let root = self.require_node(root_id).await?;
        let mut seen = HashSet::from([root.id]);
        let mut lineage = vec![root];
        let mut frontier = vec![root_id];

        while !frontier.is_empty() {
            let children = self.content.children_of(&frontier).await?;
            frontier.clear();
            for child in children {
                if seen.insert(child.id) {
                    frontier.push(child.id);
                    lineage.push(child);
                } else {
                    warn!(node = %child.id, "node reached twice while walking lineage, skipping");
                }
            }
        }

        for node in self.content.with_origin(root_id).await? {
            if seen.insert(node.id) {
                lineage.push(node);
            }
        }

        lineage.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.enricher.enrich(viewer, lineage).await
    }

    /// Flips the like edge. Only an actual insert notifies the author.
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn toggle_like(&self, user: &Principal, post_id: Uuid) -> Result<LikeToggle> {
        let post = self.require_node(post_id).await?;
        let toggle = self.likes.toggle_like(user.id, post_id).await?;

        if toggle.liked && toggle.changed {
            let draft = NotificationDraft::new(post.author_id, user.id, NotificationType::Like)
                .post(post_id);
            self.notifications.notify_best_effort(draft).await;
        }
        Ok(toggle)
    }

    /// Administrators lock or reopen a node. Removal goes through `delete_node`.
    pub async fn set_status(
        &self,
        moderator: &Principal,
        id: Uuid,
        status: ModerationStatus,
    ) -> Result<ContentNode> {
        if !moderator.is_admin() {
            return Err(DomainError::Unauthorized("administrator role required".into()));
        }
        if status == ModerationStatus::Removed {
            return Err(DomainError::Validation("use delete to remove a node".into()));
        }
        self.require_node(id).await?;
        self.content.set_status(id, status).await
    }
}

fn required_content(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(DomainError::Validation("content is required".into()));
    }
    Ok(raw.to_string())
}
