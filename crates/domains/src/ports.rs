//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Every method that touches more than one table is atomic: an implementation
//! must never let a concurrent reader observe half of the mutation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{
    CascadeOutcome, ContentNode, ConversationSummary, DirectMessage, Identity, IdentitySummary,
    LikeToggle, LiveEvent, ModerationStatus, NodeOrder, NodeScope, Notification,
    NotificationView, Principal,
};

/// Identity records: credentials, role, suspension state and public key.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn insert_identity(&self, identity: Identity) -> Result<()>;
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>>;
    /// Summaries for every id that exists; missing ids are skipped.
    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<IdentitySummary>>;
    async fn set_public_key(&self, id: Uuid, public_key: String) -> Result<()>;
    /// Case-insensitive substring match on usernames, ordered by username.
    async fn search_identities(&self, query: &str, limit: usize) -> Result<Vec<IdentitySummary>>;

    /// Sets the flag and reason, plus inserts `notice` if given, as one
    /// atomic unit. On error neither is applied.
    async fn set_suspension(
        &self,
        id: Uuid,
        suspended: bool,
        reason: Option<String>,
        notice: Option<Notification>,
    ) -> Result<Identity>;
}

/// The content forest.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// A reply is stored only if its parent exists (`NotFound`) and is LIVE
    /// (`Validation`) at the moment of the insert.
    async fn insert_node(&self, node: ContentNode) -> Result<()>;
    async fn find_node(&self, id: Uuid) -> Result<Option<ContentNode>>;
    async fn update_content(&self, id: Uuid, content: String) -> Result<ContentNode>;
    async fn set_status(&self, id: Uuid, status: ModerationStatus) -> Result<ContentNode>;

    /// Removes `id`, its direct children, and every like and notification
    /// pointing at them, plus inserts `notice` if given, as one atomic unit.
    async fn delete_cascade(&self, id: Uuid, notice: Option<Notification>) -> Result<CascadeOutcome>;

    /// Direct children of any of `parent_ids`, in no particular order.
    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<Vec<ContentNode>>;
    /// Every node whose `origin_id` is `origin_id`, the root itself excluded.
    async fn with_origin(&self, origin_id: Uuid) -> Result<Vec<ContentNode>>;

    async fn query_nodes(&self, scope: NodeScope, order: NodeOrder, limit: usize) -> Result<Vec<ContentNode>>;
}

/// The like edge set.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Conditional delete-else-insert. A duplicate concurrent insert is
    /// absorbed (`changed == false`), never double counted.
    async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeToggle>;
    async fn like_counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>>;
    /// Subset of `post_ids` liked by `user_id`.
    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<HashSet<Uuid>>;
}

/// The follow edge set.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Returns the resulting state: true when the edge now exists.
    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool>;
    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool>;
    async fn count_followers(&self, id: Uuid) -> Result<u64>;
    async fn count_following(&self, id: Uuid) -> Result<u64>;
    async fn following_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>>;
    async fn follower_ids(&self, following_id: Uuid) -> Result<Vec<Uuid>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<()>;
    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>>;
    /// Newest first, joined with actor summary and related post snippet.
    async fn list_for_recipient(&self, recipient_id: Uuid, limit: usize) -> Result<Vec<NotificationView>>;
    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64>;
    async fn delete_notification(&self, id: Uuid) -> Result<()>;
    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert_message(&self, message: DirectMessage) -> Result<()>;
    /// Both directions between `a` and `b`, oldest first.
    async fn conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<DirectMessage>>;
    /// One entry per counterpart, most recent conversation first.
    async fn conversations(&self, identity: Uuid) -> Result<Vec<ConversationSummary>>;
}

/// Fire-and-forget delivery of live events to connected sessions.
///
/// Delivery is at-most-once and unacknowledged; nothing is kept for offline
/// recipients. Implementations scope each event to `LiveEvent::audience`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait EventPublisher: Send + Sync {
    /// Returns the number of connections the event was handed to.
    fn publish(&self, event: LiveEvent) -> usize;
}

/// Password hashing collaborator.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String>;
    fn verify_password(&self, password: &str, hash: &str) -> bool;
}

/// Session token collaborator. Core only consumes the verified principal.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenService: Send + Sync {
    fn issue_token(&self, principal: &Principal) -> Result<String>;
    fn verify_token(&self, token: &str) -> Result<Principal>;
}
