//! In-memory implementation of every repository port.
//!
//! All tables sit behind a single `RwLock`. No guard is ever held across an
//! `.await`, and a poisoned lock is recovered rather than propagated since
//! each mutation leaves the tables consistent before it can panic.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    CascadeOutcome, ContentNode, ContentRepository, ConversationSummary, DirectMessage,
    DomainError, FollowRepository, Identity, IdentityRepository, IdentitySummary, LikeRepository,
    LikeToggle, MessageRepository, ModerationStatus, NodeOrder, NodeScope, Notification,
    NotificationRepository, NotificationView, Result,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    identities: HashMap<Uuid, Identity>,
    nodes: HashMap<Uuid, ContentNode>,
    /// Keyed by `(user_id, post_id)`; the key is the uniqueness contract.
    likes: HashMap<(Uuid, Uuid), DateTime<Utc>>,
    /// Keyed by `(follower_id, following_id)`.
    follows: HashMap<(Uuid, Uuid), DateTime<Utc>>,
    notifications: HashMap<Uuid, Notification>,
    messages: Vec<DirectMessage>,
}

impl Tables {
    fn like_count(&self, post_id: Uuid) -> u64 {
        self.likes.keys().filter(|(_, p)| *p == post_id).count() as u64
    }

    fn summary(&self, id: Uuid) -> Option<IdentitySummary> {
        self.identities.get(&id).map(Identity::summary)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityRepository for MemoryStore {
    async fn insert_identity(&self, identity: Identity) -> Result<()> {
        let mut t = self.write();
        if t.identities.values().any(|i| i.username == identity.username) {
            return Err(DomainError::Conflict(format!(
                "username {} already taken",
                identity.username
            )));
        }
        t.identities.insert(identity.id, identity);
        Ok(())
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.read().identities.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
        Ok(self
            .read()
            .identities
            .values()
            .find(|i| i.username == username)
            .cloned())
    }

    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<IdentitySummary>> {
        let t = self.read();
        Ok(ids.iter().filter_map(|id| t.summary(*id)).collect())
    }

    async fn set_public_key(&self, id: Uuid, public_key: String) -> Result<()> {
        let mut t = self.write();
        let identity = t
            .identities
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("identity", id))?;
        identity.public_key = Some(public_key);
        Ok(())
    }

    async fn search_identities(&self, query: &str, limit: usize) -> Result<Vec<IdentitySummary>> {
        let needle = query.to_lowercase();
        let t = self.read();
        let mut found: Vec<&Identity> = t
            .identities
            .values()
            .filter(|i| i.username.to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(found.into_iter().take(limit).map(Identity::summary).collect())
    }

    async fn set_suspension(
        &self,
        id: Uuid,
        suspended: bool,
        reason: Option<String>,
        notice: Option<Notification>,
    ) -> Result<Identity> {
        let mut t = self.write();
        let identity = t
            .identities
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("identity", id))?;
        identity.is_suspended = suspended;
        identity.suspension_reason = reason;
        let updated = identity.clone();

        if let Some(notice) = notice {
            t.notifications.insert(notice.id, notice);
        }
        Ok(updated)
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn insert_node(&self, node: ContentNode) -> Result<()> {
        let mut t = self.write();
        if t.nodes.contains_key(&node.id) {
            return Err(DomainError::Conflict(format!("node {} already exists", node.id)));
        }
        if let Some(parent_id) = node.parent_id {
            let parent = t
                .nodes
                .get(&parent_id)
                .ok_or_else(|| DomainError::not_found("node", parent_id))?;
            if !parent.accepts_replies() {
                return Err(DomainError::Validation(format!(
                    "node {parent_id} is not accepting replies"
                )));
            }
        }
        t.nodes.insert(node.id, node);
        Ok(())
    }

    async fn find_node(&self, id: Uuid) -> Result<Option<ContentNode>> {
        Ok(self.read().nodes.get(&id).cloned())
    }

    async fn update_content(&self, id: Uuid, content: String) -> Result<ContentNode> {
        let mut t = self.write();
        let node = t
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("node", id))?;
        node.content = content;
        node.edited_at = Some(Utc::now());
        Ok(node.clone())
    }

    async fn set_status(&self, id: Uuid, status: ModerationStatus) -> Result<ContentNode> {
        let mut t = self.write();
        let node = t
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("node", id))?;
        node.status = status;
        Ok(node.clone())
    }

    async fn delete_cascade(&self, id: Uuid, notice: Option<Notification>) -> Result<CascadeOutcome> {
        let mut t = self.write();
        if !t.nodes.contains_key(&id) {
            return Err(DomainError::not_found("node", id));
        }

        let removed_children: Vec<Uuid> = t
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(id))
            .map(|n| n.id)
            .collect();
        let doomed: HashSet<Uuid> = removed_children.iter().copied().chain([id]).collect();

        t.nodes.retain(|node_id, _| !doomed.contains(node_id));

        let likes_before = t.likes.len();
        t.likes.retain(|(_, post), _| !doomed.contains(post));
        let removed_likes = (likes_before - t.likes.len()) as u64;

        let notifications_before = t.notifications.len();
        t.notifications
            .retain(|_, n| !n.related_post_id.is_some_and(|p| doomed.contains(&p)));
        let removed_notifications = (notifications_before - t.notifications.len()) as u64;

        if let Some(notice) = notice {
            t.notifications.insert(notice.id, notice);
        }

        debug!(node = %id, children = removed_children.len(), "cascade applied");
        Ok(CascadeOutcome {
            removed_node: id,
            removed_children,
            removed_likes,
            removed_notifications,
        })
    }

    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<Vec<ContentNode>> {
        let t = self.read();
        Ok(t.nodes
            .values()
            .filter(|n| n.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect())
    }

    async fn with_origin(&self, origin_id: Uuid) -> Result<Vec<ContentNode>> {
        let t = self.read();
        Ok(t.nodes
            .values()
            .filter(|n| n.origin_id == origin_id && n.id != origin_id)
            .cloned()
            .collect())
    }

    async fn query_nodes(&self, scope: NodeScope, order: NodeOrder, limit: usize) -> Result<Vec<ContentNode>> {
        let t = self.read();
        let mut selected: Vec<(u64, &ContentNode)> = t
            .nodes
            .values()
            .filter(|n| match &scope {
                NodeScope::All => true,
                NodeScope::Roots => n.is_root(),
                NodeScope::Author(author) => n.author_id == *author,
                NodeScope::RootsByAuthors(authors) => n.is_root() && authors.contains(&n.author_id),
                NodeScope::ChildrenOf(parent) => n.parent_id == Some(*parent),
            })
            .map(|n| {
                let likes = match order {
                    NodeOrder::Engagement => t.like_count(n.id),
                    NodeOrder::Newest => 0,
                };
                (likes, n)
            })
            .collect();

        selected.sort_by(|(la, a), (lb, b)| {
            lb.cmp(la)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(selected
            .into_iter()
            .take(limit)
            .map(|(_, n)| n.clone())
            .collect())
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeToggle> {
        let mut t = self.write();
        let key = (user_id, post_id);
        let liked = if t.likes.remove(&key).is_some() {
            false
        } else {
            t.likes.insert(key, Utc::now());
            true
        };
        Ok(LikeToggle {
            liked,
            count: t.like_count(post_id),
            changed: true,
        })
    }

    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>> {
        let t = self.read();
        let mut counts = HashMap::new();
        for (_, post) in t.likes.keys() {
            if post_ids.contains(post) {
                *counts.entry(*post).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let t = self.read();
        Ok(post_ids
            .iter()
            .filter(|post| t.likes.contains_key(&(user_id, **post)))
            .copied()
            .collect())
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        let mut t = self.write();
        let key = (follower_id, following_id);
        if t.follows.remove(&key).is_some() {
            Ok(false)
        } else {
            t.follows.insert(key, Utc::now());
            Ok(true)
        }
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        Ok(self.read().follows.contains_key(&(follower_id, following_id)))
    }

    async fn count_followers(&self, id: Uuid) -> Result<u64> {
        Ok(self.read().follows.keys().filter(|(_, f)| *f == id).count() as u64)
    }

    async fn count_following(&self, id: Uuid) -> Result<u64> {
        Ok(self.read().follows.keys().filter(|(f, _)| *f == id).count() as u64)
    }

    async fn following_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let t = self.read();
        let mut edges: Vec<(&(Uuid, Uuid), &DateTime<Utc>)> =
            t.follows.iter().filter(|((f, _), _)| *f == follower_id).collect();
        edges.sort_by(|a, b| b.1.cmp(a.1));
        Ok(edges.into_iter().map(|((_, target), _)| *target).collect())
    }

    async fn follower_ids(&self, following_id: Uuid) -> Result<Vec<Uuid>> {
        let t = self.read();
        let mut edges: Vec<(&(Uuid, Uuid), &DateTime<Utc>)> =
            t.follows.iter().filter(|((_, f), _)| *f == following_id).collect();
        edges.sort_by(|a, b| b.1.cmp(a.1));
        Ok(edges.into_iter().map(|((follower, _), _)| *follower).collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<()> {
        self.write()
            .notifications
            .insert(notification.id, notification);
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.read().notifications.get(&id).cloned())
    }

    async fn list_for_recipient(&self, recipient_id: Uuid, limit: usize) -> Result<Vec<NotificationView>> {
        let t = self.read();
        let mut own: Vec<&Notification> = t
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(own
            .into_iter()
            .take(limit)
            .map(|n| NotificationView {
                actor: t.summary(n.actor_id),
                post_snippet: n
                    .related_post_id
                    .and_then(|p| t.nodes.get(&p))
                    .map(|node| node.content.clone()),
                notification: n.clone(),
            })
            .collect())
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64> {
        let mut t = self.write();
        let mut changed = 0;
        for n in t.notifications.values_mut() {
            if n.recipient_id == recipient_id && !n.is_read {
                n.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_notification(&self, id: Uuid) -> Result<()> {
        self.write()
            .notifications
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("notification", id))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64> {
        Ok(self
            .read()
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as u64)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert_message(&self, message: DirectMessage) -> Result<()> {
        self.write().messages.push(message);
        Ok(())
    }

    async fn conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<DirectMessage>> {
        let t = self.read();
        let mut thread: Vec<DirectMessage> = t
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect();
        thread.sort_by(|x, y| x.created_at.cmp(&y.created_at).then(x.id.cmp(&y.id)));
        Ok(thread)
    }

    async fn conversations(&self, identity: Uuid) -> Result<Vec<ConversationSummary>> {
        let t = self.read();
        let mut latest: HashMap<Uuid, &DirectMessage> = HashMap::new();
        for m in t.messages.iter().filter(|m| m.involves(identity)) {
            let counterpart = if m.sender_id == identity {
                m.receiver_id
            } else {
                m.sender_id
            };
            let slot = latest.entry(counterpart).or_insert(m);
            if (m.created_at, m.id) > (slot.created_at, slot.id) {
                *slot = m;
            }
        }

        let mut latest: Vec<(Uuid, &DirectMessage)> = latest.into_iter().collect();
        latest.sort_by(|(_, x), (_, y)| y.created_at.cmp(&x.created_at).then(y.id.cmp(&x.id)));

        Ok(latest
            .into_iter()
            .filter_map(|(counterpart, m)| {
                Some(ConversationSummary {
                    counterpart: t.summary(counterpart)?,
                    last_body: m.body.clone(),
                    last_is_encrypted: m.is_encrypted,
                    last_at: m.created_at,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{NotificationType, Role};

    async fn identity(store: &MemoryStore, name: &str) -> Uuid {
        let identity = Identity::new(name.into(), "hash".into());
        let id = identity.id;
        store.insert_identity(identity).await.unwrap();
        id
    }

    fn notice(recipient: Uuid, actor: Uuid, kind: NotificationType, post: Option<Uuid>) -> Notification {
        Notification {
            id: Uuid::now_v7(),
            recipient_id: recipient,
            actor_id: actor,
            kind,
            related_post_id: post,
            reason: None,
            context_snippet: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryStore::new();
        identity(&store, "ada").await;
        let err = store
            .insert_identity(Identity::new("ada".into(), "other".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn cascade_is_one_level_and_takes_dependents() {
        let store = MemoryStore::new();
        let (author, fan) = (identity(&store, "author").await, identity(&store, "fan").await);

        let root = ContentNode::root(author, "root".into());
        let child = ContentNode::reply_to(&root, fan, "child".into(), None);
        let grandchild = ContentNode::reply_to(&child, author, "grandchild".into(), None);
        for n in [&root, &child, &grandchild] {
            store.insert_node(n.clone()).await.unwrap();
        }
        store.toggle_like(fan, root.id).await.unwrap();
        store.toggle_like(author, child.id).await.unwrap();
        store
            .insert_notification(notice(author, fan, NotificationType::Reply, Some(child.id)))
            .await
            .unwrap();
        let kept = notice(fan, author, NotificationType::Branch, Some(grandchild.id));
        store.insert_notification(kept.clone()).await.unwrap();

        let moderator = Uuid::now_v7();
        let deleted = notice(author, moderator, NotificationType::PostDeleted, None);
        let outcome = store
            .delete_cascade(root.id, Some(deleted.clone()))
            .await
            .unwrap();

        assert_eq!(outcome.removed_children, vec![child.id]);
        assert_eq!(outcome.removed_likes, 2);
        assert_eq!(outcome.removed_notifications, 1);
        assert!(store.find_node(root.id).await.unwrap().is_none());
        assert!(store.find_node(child.id).await.unwrap().is_none());

        // Grandchild survives and is still reachable by origin.
        let orphans = store.with_origin(root.id).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, grandchild.id);

        assert!(store.find_notification(kept.id).await.unwrap().is_some());
        assert!(store.find_notification(deleted.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn engagement_order_breaks_ties_by_recency() {
        let store = MemoryStore::new();
        let author = identity(&store, "author").await;
        let fans = [identity(&store, "f1").await, identity(&store, "f2").await];

        let p1 = ContentNode::root(author, "one".into());
        let p2 = ContentNode::root(author, "two".into());
        let p3 = ContentNode::root(author, "three".into());
        for n in [&p1, &p2, &p3] {
            store.insert_node(n.clone()).await.unwrap();
        }
        store.toggle_like(fans[0], p1.id).await.unwrap();
        store.toggle_like(fans[1], p1.id).await.unwrap();

        let ordered: Vec<Uuid> = store
            .query_nodes(NodeScope::Roots, NodeOrder::Engagement, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ordered, vec![p1.id, p3.id, p2.id]);
    }

    #[tokio::test]
    async fn like_toggle_flips_and_counts() {
        let store = MemoryStore::new();
        let (user, post) = (Uuid::now_v7(), Uuid::now_v7());

        let first = store.toggle_like(user, post).await.unwrap();
        assert!(first.liked && first.count == 1);
        let second = store.toggle_like(user, post).await.unwrap();
        assert!(!second.liked && second.count == 0);
    }

    #[tokio::test]
    async fn conversation_list_keeps_latest_message_per_counterpart() {
        let store = MemoryStore::new();
        let (a, b, c) = (
            identity(&store, "a").await,
            identity(&store, "b").await,
            identity(&store, "c").await,
        );
        store
            .insert_message(DirectMessage::new(a, b, "first".into(), false))
            .await
            .unwrap();
        store
            .insert_message(DirectMessage::new(c, a, "from c".into(), false))
            .await
            .unwrap();
        store
            .insert_message(DirectMessage::new(b, a, "latest".into(), false))
            .await
            .unwrap();

        let list = store.conversations(a).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].counterpart.id, b);
        assert_eq!(list[0].last_body, "latest");
        assert_eq!(list[1].counterpart.id, c);
    }

    #[tokio::test]
    async fn suspension_round_trip_records_the_notice() {
        let store = MemoryStore::new();
        let id = identity(&store, "someone").await;
        let admin = Uuid::now_v7();
        let mut suspension = notice(id, admin, NotificationType::Suspension, None);
        suspension.reason = Some("spam".into());

        let suspended = store
            .set_suspension(id, true, Some("spam".into()), Some(suspension.clone()))
            .await
            .unwrap();
        assert!(suspended.is_suspended);
        assert_eq!(suspended.role, Role::User);
        assert!(store.find_notification(suspension.id).await.unwrap().is_some());

        let lifted = store.set_suspension(id, false, None, None).await.unwrap();
        assert!(!lifted.is_suspended && lifted.suspension_reason.is_none());
        assert_eq!(store.unread_count(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn suspending_a_missing_identity_leaves_no_notice() {
        let store = MemoryStore::new();
        let ghost = Uuid::now_v7();
        let suspension = notice(ghost, Uuid::now_v7(), NotificationType::Suspension, None);

        let err = store
            .set_suspension(ghost, true, Some("spam".into()), Some(suspension.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "identity", .. }));
        assert!(store.find_notification(suspension.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reply_under_a_missing_parent_is_refused() {
        let store = MemoryStore::new();
        let author = identity(&store, "author").await;
        let never_stored = ContentNode::root(author, "gone".into());
        let orphan = ContentNode::reply_to(&never_stored, author, "orphan".into(), None);

        let err = store.insert_node(orphan.clone()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "node", .. }));
        assert!(store.find_node(orphan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reply_racing_a_delete_is_refused() {
        let store = MemoryStore::new();
        let author = identity(&store, "author").await;
        let parent = ContentNode::root(author, "short lived".into());
        store.insert_node(parent.clone()).await.unwrap();

        // The reply was built while the parent still existed.
        let late = ContentNode::reply_to(&parent, author, "too late".into(), None);
        store.delete_cascade(parent.id, None).await.unwrap();

        assert!(store.insert_node(late.clone()).await.is_err());
        assert!(store.with_origin(parent.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn origin_lookup_excludes_the_root() {
        let store = MemoryStore::new();
        let author = identity(&store, "author").await;
        let root = ContentNode::root(author, "root".into());
        let reply = ContentNode::reply_to(&root, author, "reply".into(), None);
        store.insert_node(root.clone()).await.unwrap();
        store.insert_node(reply.clone()).await.unwrap();

        let found: Vec<Uuid> = store
            .with_origin(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(found, vec![reply.id]);
    }

    #[tokio::test]
    async fn reply_under_a_locked_parent_is_refused() {
        let store = MemoryStore::new();
        let author = identity(&store, "author").await;
        let parent = ContentNode::root(author, "closed".into());
        store.insert_node(parent.clone()).await.unwrap();
        store
            .set_status(parent.id, ModerationStatus::Locked)
            .await
            .unwrap();

        let reply = ContentNode::reply_to(&parent, author, "knock".into(), None);
        let err = store.insert_node(reply).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn concurrent_duplicate_likes_move_the_count_by_at_most_one() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let (user, post) = (Uuid::now_v7(), Uuid::now_v7());

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            set.spawn(async move { store.toggle_like(user, post).await });
        }
        while let Some(joined) = set.join_next().await {
            let toggle = joined.unwrap().unwrap();
            assert!(toggle.count <= 1);
        }

        let counts = store.like_counts(&[post]).await.unwrap();
        assert!(counts.get(&post).copied().unwrap_or(0) <= 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_capped() {
        let store = MemoryStore::new();
        for name in ["Alice", "malik", "alina", "bob", "Sally", "ali", "kalif"] {
            identity(&store, name).await;
        }
        let hits: Vec<String> = store
            .search_identities("AL", 5)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.username)
            .collect();
        assert_eq!(hits, vec!["Alice", "Sally", "ali", "alina", "kalif"]);
    }
}
