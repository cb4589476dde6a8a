//! Direct messages between two identities.
//!
//! The server never holds private keys. It stores the body exactly as sent,
//! together with the sender's `is_encrypted` flag, and only checks that a
//! body flagged as encrypted has the shape of one ciphertext block.

use std::sync::Arc;

use domains::{
    ConversationSummary, DirectMessage, DomainError, EventPublisher, IdentityRepository, LiveEvent,
    MessageRepository, Principal, Result,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::secure_channel::check_ciphertext;

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    identities: Arc<dyn IdentityRepository>,
    bus: Arc<dyn EventPublisher>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        identities: Arc<dyn IdentityRepository>,
        bus: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            messages,
            identities,
            bus,
        }
    }

    /// Persists the message, then pushes it to both participants' live
    /// connections only.
    #[instrument(skip(self, sender, body), fields(sender = %sender.id, encrypted = is_encrypted))]
    pub async fn send(
        &self,
        sender: &Principal,
        receiver_id: Uuid,
        body: String,
        is_encrypted: bool,
    ) -> Result<DirectMessage> {
        if body.trim().is_empty() {
            return Err(DomainError::Validation("message body is required".into()));
        }
        if is_encrypted {
            check_ciphertext(&body)?;
        }
        self.identities
            .find_identity(receiver_id)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", receiver_id))?;

        let message = DirectMessage::new(sender.id, receiver_id, body, is_encrypted);
        self.messages.insert_message(message.clone()).await?;

        let delivered = self.bus.publish(LiveEvent::PrivateMessage(message.clone()));
        debug!(message = %message.id, delivered, "private message published");
        Ok(message)
    }

    /// Both directions between `a` and `b`, oldest first. Only a participant
    /// may read it.
    pub async fn history(&self, requester: &Principal, a: Uuid, b: Uuid) -> Result<Vec<DirectMessage>> {
        if requester.id != a && requester.id != b {
            return Err(DomainError::Unauthorized(
                "only a participant may read a conversation".into(),
            ));
        }
        self.messages.conversation(a, b).await
    }

    /// Every counterpart of `user_id` with the latest message, newest first.
    pub async fn conversations(&self, requester: &Principal, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        if requester.id != user_id {
            return Err(DomainError::Unauthorized(
                "conversations are only visible to their owner".into(),
            ));
        }
        self.messages.conversations(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{
        Identity, MockEventPublisher, MockIdentityRepository, MockMessageRepository, Role,
    };

    fn principal(id: Uuid) -> Principal {
        Principal {
            id,
            username: "sender".into(),
            role: Role::User,
        }
    }

    fn receiver_exists() -> MockIdentityRepository {
        let mut identities = MockIdentityRepository::new();
        identities.expect_find_identity().returning(|id| {
            let mut identity = Identity::new("receiver".into(), "hash".into());
            identity.id = id;
            Ok(Some(identity))
        });
        identities
    }

    #[tokio::test]
    async fn send_persists_then_publishes_to_participants() {
        let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());
        let mut messages = MockMessageRepository::new();
        messages
            .expect_insert_message()
            .times(1)
            .withf(|m| !m.is_encrypted && m.body == "hello bob")
            .returning(|_| Ok(()));
        let mut bus = MockEventPublisher::new();
        bus.expect_publish()
            .times(1)
            .withf(move |event| {
                event.audience() == domains::Audience::Identities(vec![alice, bob])
            })
            .returning(|_| 2);

        let svc = MessageService::new(Arc::new(messages), Arc::new(receiver_exists()), Arc::new(bus));
        let msg = svc
            .send(&principal(alice), bob, "hello bob".into(), false)
            .await
            .unwrap();
        assert_eq!(msg.receiver_id, bob);
    }

    #[tokio::test]
    async fn flagged_plaintext_is_refused() {
        let mut messages = MockMessageRepository::new();
        messages.expect_insert_message().never();
        let svc = MessageService::new(
            Arc::new(messages),
            Arc::new(receiver_exists()),
            Arc::new(MockEventPublisher::new()),
        );

        let err = svc
            .send(&principal(Uuid::now_v7()), Uuid::now_v7(), "not secret".into(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::CryptoFailure(_)));
    }

    #[tokio::test]
    async fn outsiders_cannot_read_history() {
        let svc = MessageService::new(
            Arc::new(MockMessageRepository::new()),
            Arc::new(MockIdentityRepository::new()),
            Arc::new(MockEventPublisher::new()),
        );
        let err = svc
            .history(&principal(Uuid::now_v7()), Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
