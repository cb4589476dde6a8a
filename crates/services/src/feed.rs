//! # FeedAssembler
//!
//! Derives viewer-scoped node lists from the content forest and the follow
//! graph. Like counts and the viewer's like state are computed from the like
//! edge set at read time; nothing is cached on the node.

use std::collections::HashMap;
use std::sync::Arc;

use domains::{
    ContentNode, ContentRepository, DomainError, EnrichedNode, FeedMode, FeedRequest,
    FollowRepository, IdentityRepository, IdentitySummary, LikeRepository, NodeOrder, NodeScope,
    Result, FEED_LIMIT, TRENDING_LIMIT,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Attaches author summary, live like count and viewer like state.
#[derive(Clone)]
pub struct Enricher {
    likes: Arc<dyn LikeRepository>,
    identities: Arc<dyn IdentityRepository>,
}

impl Enricher {
    pub fn new(likes: Arc<dyn LikeRepository>, identities: Arc<dyn IdentityRepository>) -> Self {
        Self { likes, identities }
    }

    pub async fn enrich(&self, viewer: Option<Uuid>, nodes: Vec<ContentNode>) -> Result<Vec<EnrichedNode>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
        let counts = self.likes.like_counts(&ids).await?;
        let liked = match viewer {
            Some(viewer) => self.likes.liked_by(viewer, &ids).await?,
            None => Default::default(),
        };

        let mut author_ids: Vec<Uuid> = nodes.iter().map(|n| n.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors: HashMap<Uuid, IdentitySummary> = self
            .identities
            .summaries(&author_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        Ok(nodes
            .into_iter()
            .map(|node| {
                let author = authors.get(&node.author_id).cloned().unwrap_or_else(|| {
                    warn!(node = %node.id, author = %node.author_id, "node author missing");
                    IdentitySummary {
                        id: node.author_id,
                        username: "[unknown]".into(),
                        is_verified: false,
                        is_suspended: false,
                    }
                });
                EnrichedNode {
                    like_count: counts.get(&node.id).copied().unwrap_or(0),
                    viewer_liked: liked.contains(&node.id),
                    author,
                    node,
                }
            })
            .collect())
    }

    pub async fn enrich_one(&self, viewer: Option<Uuid>, node: ContentNode) -> Result<EnrichedNode> {
        let id = node.id;
        self.enrich(viewer, vec![node])
            .await?
            .pop()
            .ok_or_else(|| DomainError::Internal(format!("node {id} lost during enrichment")))
    }
}

#[derive(Clone)]
pub struct FeedService {
    content: Arc<dyn ContentRepository>,
    follows: Arc<dyn FollowRepository>,
    enricher: Enricher,
}

impl FeedService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        follows: Arc<dyn FollowRepository>,
        enricher: Enricher,
    ) -> Self {
        Self {
            content,
            follows,
            enricher,
        }
    }

    /// Chooses scope and ordering for a request.
    ///
    /// HOME with at least one follow narrows to followed authors plus the
    /// viewer. HOME with no follows falls back to discovery ordering so a new
    /// identity never sees an empty feed. HOME without a viewer is EXPLORE.
    pub async fn plan(&self, request: &FeedRequest) -> Result<(NodeScope, NodeOrder)> {
        if let Some(author) = request.author_filter {
            return Ok((NodeScope::Author(author), NodeOrder::Newest));
        }
        if let Some(parent) = request.parent_filter {
            return Ok((NodeScope::ChildrenOf(parent), NodeOrder::Newest));
        }

        match (request.mode, request.viewer_id) {
            (FeedMode::Home, Some(viewer)) => {
                let mut authors = self.follows.following_ids(viewer).await?;
                if authors.is_empty() {
                    debug!(%viewer, "no follows, using discovery ordering");
                    return Ok((NodeScope::Roots, NodeOrder::Engagement));
                }
                authors.push(viewer);
                Ok((NodeScope::RootsByAuthors(authors), NodeOrder::Newest))
            }
            _ => Ok((NodeScope::Roots, NodeOrder::Newest)),
        }
    }

    #[instrument(skip(self, request), fields(mode = ?request.mode, viewer = ?request.viewer_id))]
    pub async fn build_feed(&self, request: FeedRequest) -> Result<Vec<EnrichedNode>> {
        let (scope, order) = self.plan(&request).await?;
        let nodes = self.content.query_nodes(scope, order, FEED_LIMIT).await?;
        self.enricher.enrich(request.viewer_id, nodes).await
    }

    /// Most-liked nodes of any depth.
    pub async fn trending(&self, viewer: Option<Uuid>) -> Result<Vec<EnrichedNode>> {
        let nodes = self
            .content
            .query_nodes(NodeScope::All, NodeOrder::Engagement, TRENDING_LIMIT)
            .await?;
        self.enricher.enrich(viewer, nodes).await
    }
}
