//! # SocialGraph
//!
//! Directed follow edges between identities and the profile view built on
//! top of them.

use std::sync::Arc;

use domains::{
    DomainError, FollowRepository, FollowToggle, Identity, IdentityProfile, IdentityRepository,
    IdentitySummary, Result, SEARCH_LIMIT,
};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct SocialService {
    follows: Arc<dyn FollowRepository>,
    identities: Arc<dyn IdentityRepository>,
}

impl SocialService {
    pub fn new(follows: Arc<dyn FollowRepository>, identities: Arc<dyn IdentityRepository>) -> Self {
        Self { follows, identities }
    }

    async fn require_identity(&self, id: Uuid) -> Result<Identity> {
        self.identities
            .find_identity(id)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", id))
    }

    /// Adds the edge if absent, removes it if present. Following yourself is
    /// rejected. Follows are silent: no notification is recorded.
    #[instrument(skip(self))]
    pub async fn toggle_follow(&self, follower_id: Uuid, target_id: Uuid) -> Result<FollowToggle> {
        if follower_id == target_id {
            return Err(DomainError::Validation("cannot follow yourself".into()));
        }
        self.require_identity(target_id).await?;

        let following = self.follows.toggle_follow(follower_id, target_id).await?;
        info!(%follower_id, %target_id, following, "follow toggled");
        Ok(FollowToggle { following })
    }

    pub async fn is_following(&self, follower_id: Uuid, target_id: Uuid) -> Result<bool> {
        self.follows.is_following(follower_id, target_id).await
    }

    /// `(followers, following)` for one identity.
    pub async fn counts(&self, id: Uuid) -> Result<(u64, u64)> {
        let followers = self.follows.count_followers(id).await?;
        let following = self.follows.count_following(id).await?;
        Ok((followers, following))
    }

    pub async fn followers(&self, id: Uuid) -> Result<Vec<IdentitySummary>> {
        self.require_identity(id).await?;
        let ids = self.follows.follower_ids(id).await?;
        self.identities.summaries(&ids).await
    }

    pub async fn following(&self, id: Uuid) -> Result<Vec<IdentitySummary>> {
        self.require_identity(id).await?;
        let ids = self.follows.following_ids(id).await?;
        self.identities.summaries(&ids).await
    }

    pub async fn profile(&self, viewer: Option<Uuid>, id: Uuid) -> Result<IdentityProfile> {
        let identity = self.require_identity(id).await?;
        self.profile_of(viewer, identity).await
    }

    /// Resolves a name to its profile, so a client can follow or message
    /// someone it only knows by username.
    pub async fn profile_by_username(&self, viewer: Option<Uuid>, username: &str) -> Result<IdentityProfile> {
        let identity = self
            .identities
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("identity", username))?;
        self.profile_of(viewer, identity).await
    }

    /// Usernames containing `query`, case-insensitively. A blank query
    /// matches nobody.
    pub async fn search(&self, query: &str) -> Result<Vec<IdentitySummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.identities.search_identities(query, SEARCH_LIMIT).await
    }

    async fn profile_of(&self, viewer: Option<Uuid>, identity: Identity) -> Result<IdentityProfile> {
        let id = identity.id;
        let (followers, following) = self.counts(id).await?;
        let is_following = match viewer {
            Some(viewer) if viewer != id => self.follows.is_following(viewer, id).await?,
            _ => false,
        };

        Ok(IdentityProfile {
            identity: identity.summary(),
            role: identity.role,
            followers,
            following,
            is_following,
            has_public_key: identity.public_key.is_some(),
            created_at: identity.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockFollowRepository, MockIdentityRepository};

    fn existing_identities() -> MockIdentityRepository {
        let mut identities = MockIdentityRepository::new();
        identities.expect_find_identity().returning(|id| {
            let mut identity = Identity::new("someone".into(), "hash".into());
            identity.id = id;
            Ok(Some(identity))
        });
        identities
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let mut follows = MockFollowRepository::new();
        follows.expect_toggle_follow().never();
        let svc = SocialService::new(Arc::new(follows), Arc::new(MockIdentityRepository::new()));

        let me = Uuid::now_v7();
        let err = svc.toggle_follow(me, me).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn follow_missing_identity_is_not_found() {
        let mut identities = MockIdentityRepository::new();
        identities.expect_find_identity().returning(|_| Ok(None));
        let svc = SocialService::new(Arc::new(MockFollowRepository::new()), Arc::new(identities));

        let err = svc
            .toggle_follow(Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "identity", .. }));
    }

    #[tokio::test]
    async fn profile_reports_counts_and_viewer_state() {
        let (viewer, target) = (Uuid::now_v7(), Uuid::now_v7());
        let mut follows = MockFollowRepository::new();
        follows.expect_count_followers().returning(|_| Ok(4));
        follows.expect_count_following().returning(|_| Ok(1));
        follows
            .expect_is_following()
            .withf(move |a, b| *a == viewer && *b == target)
            .returning(|_, _| Ok(true));

        let svc = SocialService::new(Arc::new(follows), Arc::new(existing_identities()));
        let profile = svc.profile(Some(viewer), target).await.unwrap();
        assert_eq!((profile.followers, profile.following), (4, 1));
        assert!(profile.is_following);
        assert!(!profile.has_public_key);
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let mut identities = MockIdentityRepository::new();
        identities.expect_find_by_username().returning(|_| Ok(None));
        let svc = SocialService::new(Arc::new(MockFollowRepository::new()), Arc::new(identities));

        let err = svc.profile_by_username(None, "nobody").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "identity", .. }));
    }

    #[tokio::test]
    async fn blank_search_skips_the_store() {
        let mut identities = MockIdentityRepository::new();
        identities.expect_search_identities().never();
        let svc = SocialService::new(Arc::new(MockFollowRepository::new()), Arc::new(identities));
        assert!(svc.search("   ").await.unwrap().is_empty());
    }
}
