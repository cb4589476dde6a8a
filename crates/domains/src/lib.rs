//! echohub/crates/domains/src/lib.rs
//!
//! The central domain model and port definitions for echohub.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use uuid::Uuid;

    #[test]
    fn root_is_its_own_origin() {
        let root = ContentNode::root(Uuid::now_v7(), "hello".into());
        assert_eq!(root.origin_id, root.id);
        assert!(root.is_root());
        assert_eq!(root.kind, NodeKind::Original);
    }

    #[test]
    fn reply_inherits_lineage_root() {
        let author = Uuid::now_v7();
        let root = ContentNode::root(author, "root".into());
        let reply = ContentNode::reply_to(&root, author, "r1".into(), None);
        let branch = ContentNode::reply_to(&reply, author, "r2".into(), None);

        assert_eq!(reply.origin_id, root.id);
        assert_eq!(reply.parent_id, Some(root.id));
        assert_eq!(branch.origin_id, root.id);
        assert_eq!(branch.parent_id, Some(reply.id));
        assert!(!branch.is_root());
    }

    #[test]
    fn reply_and_branch_are_told_apart_by_parent() {
        let author = Uuid::now_v7();
        let root = ContentNode::root(author, "root".into());
        let reply = ContentNode::reply_to(&root, author, "r1".into(), None);

        assert_eq!(NotificationType::for_reply_to(&root), NotificationType::Reply);
        assert_eq!(NotificationType::for_reply_to(&reply), NotificationType::Branch);
    }

    #[test]
    fn private_message_audience_is_the_two_participants() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let event = LiveEvent::PrivateMessage(DirectMessage::new(a, b, "hi".into(), false));
        assert_eq!(event.audience(), Audience::Identities(vec![a, b]));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "private_message");
        assert_eq!(json["payload"]["isEncrypted"], false);
    }

    #[test]
    fn administrative_types() {
        assert!(NotificationType::Suspension.is_administrative());
        assert!(NotificationType::PostDeleted.is_administrative());
        assert!(!NotificationType::Like.is_administrative());
        assert_eq!(NotificationType::parse("POST_DELETED"), Some(NotificationType::PostDeleted));
    }
}
