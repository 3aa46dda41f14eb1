use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Comment, Follow, Group, Post, User};
use crate::error::RepoError;
use crate::pagination::{Page, Paginator};

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Insert a new entity.
    async fn create(&self, entity: T) -> Result<T, RepoError>;

    /// Overwrite an existing entity.
    async fn update(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Find a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError>;
}

/// Group repository.
#[async_trait]
pub trait GroupRepository: BaseRepository<Group, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Group>, RepoError>;

    /// All groups ordered by title, for form choices.
    async fn list_all(&self) -> Result<Vec<Group>, RepoError>;
}

/// Which posts a feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts by every author the given user follows.
    FollowedBy(Uuid),
}

/// Post repository. Listings are newest-first.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn count(&self, scope: FeedScope) -> Result<u64, RepoError>;

    async fn list(&self, scope: FeedScope, offset: u64, limit: u64)
    -> Result<Vec<Post>, RepoError>;

    /// Resolve the requested page number and load that page.
    async fn page(
        &self,
        scope: FeedScope,
        paginator: Paginator,
        requested: Option<&str>,
    ) -> Result<Page<Post>, RepoError> {
        let count = self.count(scope).await?;
        let window = paginator.resolve(count, requested);
        let items = if window.limit == 0 {
            Vec::new()
        } else {
            self.list(scope, window.offset, window.limit).await?
        };
        Ok(Page::new(items, window))
    }
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Comments of a post, newest-first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;
}

/// Follow edge repository.
#[async_trait]
pub trait FollowRepository: BaseRepository<Follow, Uuid> {
    async fn find_pair(&self, user_id: Uuid, author_id: Uuid)
    -> Result<Option<Follow>, RepoError>;

    /// Delete every edge `user_id -> author_id`. Returns how many went away.
    async fn delete_pair(&self, user_id: Uuid, author_id: Uuid) -> Result<u64, RepoError>;

    /// Number of authors `user_id` follows.
    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError>;

    /// Number of users following `author_id`.
    async fn count_followers(&self, author_id: Uuid) -> Result<u64, RepoError>;

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.find_pair(user_id, author_id).await?.is_some())
    }
}
