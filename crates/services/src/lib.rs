//! echohub/crates/services/src/lib.rs
//!
//! Application services. Each one owns a slice of behaviour and talks to the
//! outside world only through the ports defined in `domains`.

pub mod content;
pub mod feed;
pub mod identity;
pub mod messages;
pub mod moderation;
pub mod notifications;
pub mod realtime;
pub mod secure_channel;
pub mod social;
pub mod throttle;

use std::sync::Arc;

use domains::{
    ContentRepository, CredentialHasher, FollowRepository, IdentityRepository, LikeRepository,
    MessageRepository, NotificationRepository, TokenService,
};

pub use content::{ContentService, NewNode};
pub use feed::{Enricher, FeedService};
pub use identity::{IdentityService, Session};
pub use messages::MessageService;
pub use moderation::ModerationService;
pub use notifications::{NotificationDraft, NotificationService};
pub use realtime::{BusStats, LiveConnection, RealtimeBus};
pub use secure_channel::{ClientKeyring, CryptoError, MemoryKeyVault, PrivateKeyVault, SealedBody};
pub use social::SocialService;
pub use throttle::{RateLimitConfig, SubmissionThrottle};

/// Every adapter the services need, already constructed.
#[derive(Clone)]
pub struct Ports {
    pub identities: Arc<dyn IdentityRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub tokens: Arc<dyn TokenService>,
}

/// The wired service graph shared by the HTTP and live-channel handlers.
#[derive(Clone)]
pub struct AppServices {
    pub identity: IdentityService,
    pub content: ContentService,
    pub social: SocialService,
    pub feed: FeedService,
    pub notifications: NotificationService,
    pub messages: MessageService,
    pub moderation: ModerationService,
    pub bus: RealtimeBus,
}

impl AppServices {
    pub fn new(ports: Ports, bus: RealtimeBus, throttle: SubmissionThrottle) -> Self {
        let publisher: Arc<dyn domains::EventPublisher> = Arc::new(bus.clone());
        let notifications = NotificationService::new(ports.notifications.clone());
        let enricher = Enricher::new(ports.likes.clone(), ports.identities.clone());

        Self {
            identity: IdentityService::new(ports.identities.clone(), ports.hasher, ports.tokens),
            content: ContentService::new(
                ports.content.clone(),
                ports.likes,
                ports.identities.clone(),
                notifications.clone(),
                publisher.clone(),
                Arc::new(throttle),
            ),
            social: SocialService::new(ports.follows.clone(), ports.identities.clone()),
            feed: FeedService::new(ports.content, ports.follows, enricher),
            moderation: ModerationService::new(ports.identities.clone()),
            messages: MessageService::new(ports.messages, ports.identities, publisher),
            notifications,
            bus,
        }
    }
}
