//! # Domain Models
//!
//! These structs represent the core entities of echohub.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of nodes returned by any feed query.
pub const FEED_LIMIT: usize = 50;
/// Maximum number of notifications returned by a listing.
pub const NOTIFICATION_LIMIT: usize = 50;
/// Number of nodes on the trending board.
pub const TRENDING_LIMIT: usize = 5;
/// Number of matches returned by a username search.
pub const SEARCH_LIMIT: usize = 5;
/// Length in bytes of one RSA-2048 OAEP ciphertext block.
pub const CIPHERTEXT_LEN: usize = 256;

pub const DEFAULT_DELETION_REASON: &str = "Violates community guidelines";
pub const DEFAULT_SUSPENSION_REASON: &str = "Violation of community guidelines";

// ── Identities ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A registered account. The password hash never leaves the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    /// Base64 SPKI encoding of the identity's RSA public key, if registered.
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            username,
            password_hash,
            role: Role::User,
            is_verified: false,
            is_suspended: false,
            suspension_reason: None,
            public_key: None,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            username: self.username.clone(),
            is_verified: self.is_verified,
            is_suspended: self.is_suspended,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The public face of an identity attached to posts, notifications and conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: Uuid,
    pub username: String,
    pub is_verified: bool,
    pub is_suspended: bool,
}

/// A verified caller. Produced by the auth adapter, consumed by every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    #[serde(flatten)]
    pub identity: IdentitySummary,
    pub role: Role,
    pub followers: u64,
    pub following: u64,
    pub is_following: bool,
    pub has_public_key: bool,
    pub created_at: DateTime<Utc>,
}

// ── Content graph ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Original,
    Reply,
    Remix,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Original => "ORIGINAL",
            NodeKind::Reply => "REPLY",
            NodeKind::Remix => "REMIX",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ORIGINAL" => Some(NodeKind::Original),
            "REPLY" => Some(NodeKind::Reply),
            "REMIX" => Some(NodeKind::Remix),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    Live,
    /// Visible, but closed to replies and edits.
    Locked,
    Removed,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Live => "LIVE",
            ModerationStatus::Locked => "LOCKED",
            ModerationStatus::Removed => "REMOVED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LIVE" => Some(ModerationStatus::Live),
            "LOCKED" => Some(ModerationStatus::Locked),
            "REMOVED" => Some(ModerationStatus::Removed),
            _ => None,
        }
    }
}

/// A post, reply or remix in the content forest.
///
/// `origin_id` always names the root of the node's tree; a root names itself.
/// `parent_id` is fixed at creation and only ever references a node that
/// already existed, so the parent relation cannot form a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub kind: NodeKind,
    pub parent_id: Option<Uuid>,
    pub origin_id: Uuid,
    /// Fragment of the parent's content this node anchors to.
    pub context_binding: Option<String>,
    pub status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl ContentNode {
    /// Builds a root node: its own origin.
    pub fn root(author_id: Uuid, content: String) -> Self {
        let id = Uuid::now_v7();
        Self {
            id,
            author_id,
            content,
            kind: NodeKind::Original,
            parent_id: None,
            origin_id: id,
            context_binding: None,
            status: ModerationStatus::Live,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    /// Builds a reply under `parent`, inheriting the parent's lineage root.
    pub fn reply_to(
        parent: &ContentNode,
        author_id: Uuid,
        content: String,
        context_binding: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            author_id,
            content,
            kind: NodeKind::Reply,
            parent_id: Some(parent.id),
            origin_id: parent.lineage_root(),
            context_binding,
            status: ModerationStatus::Live,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.origin_id == self.id
    }

    /// The id a child of this node must carry as its origin.
    pub fn lineage_root(&self) -> Uuid {
        if self.is_root() {
            self.id
        } else {
            self.origin_id
        }
    }

    pub fn accepts_replies(&self) -> bool {
        self.status == ModerationStatus::Live
    }
}

/// A node as served to a viewer: live like count and the viewer's own like state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNode {
    #[serde(flatten)]
    pub node: ContentNode,
    pub author: IdentitySummary,
    pub like_count: u64,
    pub viewer_liked: bool,
}

/// What a cascading delete actually removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeOutcome {
    pub removed_node: Uuid,
    pub removed_children: Vec<Uuid>,
    pub removed_likes: u64,
    pub removed_notifications: u64,
}

/// Which nodes a content query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeScope {
    /// Every node, roots and replies alike.
    All,
    /// Root nodes only.
    Roots,
    /// Every node written by one author.
    Author(Uuid),
    /// Root nodes written by any of the given authors.
    RootsByAuthors(Vec<Uuid>),
    /// Direct children of one node.
    ChildrenOf(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrder {
    /// `created_at` descending.
    Newest,
    /// Live like count descending, then `created_at` descending.
    Engagement,
}

// ── Social edges ─────────────────────────────────────────────────────────────

/// Result of a like toggle. `changed` is false when a concurrent duplicate
/// insert was absorbed by the uniqueness contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub liked: bool,
    pub count: u64,
    #[serde(skip)]
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowToggle {
    pub following: bool,
}

// ── Feeds ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedMode {
    /// Followed identities plus the viewer; discovery ordering when nothing is followed.
    Home,
    #[default]
    Explore,
}

#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub viewer_id: Option<Uuid>,
    pub mode: FeedMode,
    /// Profile view: every node by this author.
    pub author_filter: Option<Uuid>,
    /// Replies view: direct children of this node.
    pub parent_filter: Option<Uuid>,
}

// ── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Like,
    Reply,
    Branch,
    Remix,
    Follow,
    Suspension,
    PostDeleted,
}

impl NotificationType {
    /// Administrative events are recorded even when the actor is the recipient.
    pub fn is_administrative(&self) -> bool {
        matches!(self, NotificationType::Suspension | NotificationType::PostDeleted)
    }

    /// REPLY for a first-level answer to a root, BRANCH for anything deeper.
    pub fn for_reply_to(parent: &ContentNode) -> Self {
        if parent.is_root() {
            NotificationType::Reply
        } else {
            NotificationType::Branch
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "LIKE",
            NotificationType::Reply => "REPLY",
            NotificationType::Branch => "BRANCH",
            NotificationType::Remix => "REMIX",
            NotificationType::Follow => "FOLLOW",
            NotificationType::Suspension => "SUSPENSION",
            NotificationType::PostDeleted => "POST_DELETED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LIKE" => Some(NotificationType::Like),
            "REPLY" => Some(NotificationType::Reply),
            "BRANCH" => Some(NotificationType::Branch),
            "REMIX" => Some(NotificationType::Remix),
            "FOLLOW" => Some(NotificationType::Follow),
            "SUSPENSION" => Some(NotificationType::Suspension),
            "POST_DELETED" => Some(NotificationType::PostDeleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// None when the related post has itself been removed.
    pub related_post_id: Option<Uuid>,
    /// Moderator-supplied reason, moderation events only.
    pub reason: Option<String>,
    /// Snapshot of content that is no longer queryable.
    pub context_snippet: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification joined with its actor and a snippet of the related post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub actor: Option<IdentitySummary>,
    pub post_snippet: Option<String>,
}

// ── Direct messages ──────────────────────────────────────────────────────────

/// A private message. `is_encrypted` is set by the sender at write time and
/// is the only source of truth for how `body` must be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
}

impl DirectMessage {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, body: String, is_encrypted: bool) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id,
            receiver_id,
            body,
            is_encrypted,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, identity: Uuid) -> bool {
        self.sender_id == identity || self.receiver_id == identity
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterpart: IdentitySummary,
    pub last_body: String,
    pub last_is_encrypted: bool,
    pub last_at: DateTime<Utc>,
}

// ── Live events ──────────────────────────────────────────────────────────────

/// Who receives a live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Identities(Vec<Uuid>),
}

/// An event pushed over the live channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum LiveEvent {
    NewPost(EnrichedNode),
    PrivateMessage(DirectMessage),
}

impl LiveEvent {
    /// Content is public; private messages reach their two participants only.
    pub fn audience(&self) -> Audience {
        match self {
            LiveEvent::NewPost(_) => Audience::Everyone,
            LiveEvent::PrivateMessage(msg) => {
                let mut ids = vec![msg.sender_id];
                if msg.receiver_id != msg.sender_id {
                    ids.push(msg.receiver_id);
                }
                Audience::Identities(ids)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::NewPost(_) => "new_post",
            LiveEvent::PrivateMessage(_) => "private_message",
        }
    }
}
