//! Application state - shared across all handlers.

use std::sync::Arc;

use yatube_core::Paginator;
use yatube_core::ports::{
    Cache, CommentRepository, FollowRepository, GroupRepository, MediaStorage, PasswordService,
    PostRepository, TokenService, UserRepository,
};
use yatube_infra::{
    Argon2PasswordService, InMemoryCache, InMemoryDatabase, JwtTokenService, LocalMediaStorage,
};

use crate::config::{AppConfig, SiteSettings};

#[cfg(feature = "postgres")]
use yatube_infra::DatabaseConnections;
#[cfg(feature = "postgres")]
use yatube_infra::database::{
    PostgresCommentRepository, PostgresFollowRepository, PostgresGroupRepository,
    PostgresPostRepository, PostgresUserRepository,
};
#[cfg(feature = "redis")]
use yatube_infra::RedisCache;

/// Repository handles, all backed by the same store.
struct Repositories {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl Repositories {
    fn in_memory() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        Self {
            users: db.clone(),
            groups: db.clone(),
            posts: db.clone(),
            comments: db.clone(),
            follows: db,
        }
    }

    #[cfg(feature = "postgres")]
    fn postgres(connections: &DatabaseConnections) -> Self {
        let conn = &connections.main;
        Self {
            users: Arc::new(PostgresUserRepository::new(conn.clone())),
            groups: Arc::new(PostgresGroupRepository::new(conn.clone())),
            posts: Arc::new(PostgresPostRepository::new(conn.clone())),
            comments: Arc::new(PostgresCommentRepository::new(conn.clone())),
            follows: Arc::new(PostgresFollowRepository::new(conn.clone())),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub cache: Arc<dyn Cache>,
    pub media: Arc<dyn MediaStorage>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub settings: Arc<SiteSettings>,
    #[cfg(feature = "postgres")]
    pub db: Option<Arc<DatabaseConnections>>,
}

impl AppState {
    fn assemble(
        repos: Repositories,
        cache: Arc<dyn Cache>,
        settings: SiteSettings,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        let media = Arc::new(LocalMediaStorage::new(
            settings.media_root.clone(),
            settings.media_url.clone(),
        ));
        Self {
            users: repos.users,
            groups: repos.groups,
            posts: repos.posts,
            comments: repos.comments,
            follows: repos.follows,
            cache,
            media,
            tokens,
            passwords: Arc::new(Argon2PasswordService::new()),
            settings: Arc::new(settings),
            #[cfg(feature = "postgres")]
            db: None,
        }
    }

    /// State backed entirely by process memory.
    pub fn in_memory(settings: SiteSettings, tokens: Arc<dyn TokenService>) -> Self {
        Self::assemble(
            Repositories::in_memory(),
            Arc::new(InMemoryCache::new()),
            settings,
            tokens,
        )
    }

    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone()));
        let cache = Self::init_cache(config).await?;

        #[cfg(feature = "postgres")]
        let (db, repos) = match &config.database {
            Some(db_config) => match DatabaseConnections::init(db_config).await {
                Ok(connections) => {
                    let repos = Repositories::postgres(&connections);
                    (Some(Arc::new(connections)), repos)
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                    (None, Repositories::in_memory())
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
                (None, Repositories::in_memory())
            }
        };

        #[cfg(not(feature = "postgres"))]
        let repos = {
            tracing::info!("Running without postgres feature - using in-memory repositories");
            Repositories::in_memory()
        };

        #[allow(unused_mut)]
        let mut state = Self::assemble(repos, cache, config.site.clone(), tokens);
        #[cfg(feature = "postgres")]
        {
            state.db = db;
        }

        tracing::info!("Application state initialized");
        Ok(state)
    }

    #[cfg(feature = "redis")]
    async fn init_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
        let Some(redis_config) = &config.redis else {
            return Ok(Arc::new(InMemoryCache::new()));
        };
        match RedisCache::new(redis_config.clone()).await {
            Ok(cache) => Ok(Arc::new(cache)),
            Err(e) if redis_config.fallback_to_memory => {
                tracing::warn!(error = %e, "Redis unavailable. Using in-memory page cache.");
                Ok(Arc::new(InMemoryCache::new()))
            }
            Err(e) => Err(anyhow::anyhow!("Redis unavailable: {e}")),
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn init_cache(_config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
        Ok(Arc::new(InMemoryCache::new()))
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.settings.posts_per_page)
    }
}
