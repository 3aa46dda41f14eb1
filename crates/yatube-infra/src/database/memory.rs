//! In-memory database used when no `DATABASE_URL` is configured and in tests.
//!
//! Enforces the same constraints as the schema: unique usernames, group
//! slugs and follow pairs, foreign keys, and the delete cascades.

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use yatube_core::domain::{Comment, Follow, Group, Post, User};
use yatube_core::error::RepoError;
use yatube_core::ports::{
    BaseRepository, CommentRepository, FeedScope, FollowRepository, GroupRepository,
    PostRepository, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

impl Tables {
    fn user_exists(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn in_scope(&self, post: &Post, scope: FeedScope) -> bool {
        match scope {
            FeedScope::All => true,
            FeedScope::Group(group_id) => post.group_id == Some(group_id),
            FeedScope::Author(author_id) => post.author_id == author_id,
            FeedScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|f| f.user_id == user_id && f.author_id == post.author_id),
        }
    }

    fn check_post(&self, post: &Post) -> Result<(), RepoError> {
        if !self.user_exists(post.author_id) {
            return Err(RepoError::Constraint("post author does not exist".into()));
        }
        if let Some(group_id) = post.group_id {
            if !self.groups.iter().any(|g| g.id == group_id) {
                return Err(RepoError::Constraint("post group does not exist".into()));
            }
        }
        Ok(())
    }

    fn check_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        if !self.user_exists(comment.author_id) {
            return Err(RepoError::Constraint("comment author does not exist".into()));
        }
        if let Some(post_id) = comment.post_id {
            if !self.posts.iter().any(|p| p.id == post_id) {
                return Err(RepoError::Constraint("comment post does not exist".into()));
            }
        }
        Ok(())
    }

    fn remove_post(&mut self, id: Uuid) {
        self.posts.retain(|p| p.id != id);
        self.comments.retain(|c| c.post_id != Some(id));
    }
}

/// Newest first. Ties keep the later-inserted row first.
fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.reverse();
    rows.sort_by_key(|row| Reverse(key(row)));
    rows
}

/// Process-local store implementing every repository port.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.id == user.id || u.username == user.username)
        {
            return Err(RepoError::Constraint("username already taken".into()));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(RepoError::Constraint("username already taken".into()));
        }
        let row = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(RepoError::NotFound)?;
        *row = user.clone();
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(id) {
            return Err(RepoError::NotFound);
        }
        let authored: Vec<Uuid> = tables
            .posts
            .iter()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|c| c.author_id != id);
        tables
            .follows
            .retain(|f| f.user_id != id && f.author_id != id);
        tables.users.retain(|u| u.id != id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryDatabase {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BaseRepository<Group, Uuid> for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn create(&self, group: Group) -> Result<Group, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .groups
            .iter()
            .any(|g| g.id == group.id || g.slug == group.slug)
        {
            return Err(RepoError::Constraint("group slug already taken".into()));
        }
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn update(&self, group: Group) -> Result<Group, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .groups
            .iter()
            .any(|g| g.id != group.id && g.slug == group.slug)
        {
            return Err(RepoError::Constraint("group slug already taken".into()));
        }
        let row = tables
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or(RepoError::NotFound)?;
        *row = group.clone();
        Ok(group)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.groups.len();
        tables.groups.retain(|g| g.id != id);
        if tables.groups.len() == before {
            return Err(RepoError::NotFound);
        }
        for post in tables.posts.iter_mut().filter(|p| p.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for InMemoryDatabase {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Group>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .groups
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Group>, RepoError> {
        let tables = self.tables.read().await;
        let mut groups = tables.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.posts.iter().any(|p| p.id == post.id) {
            return Err(RepoError::Constraint("post already exists".into()));
        }
        tables.check_post(&post)?;
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        tables.check_post(&post)?;
        let row = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(RepoError::NotFound)?;
        *row = post.clone();
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == id) {
            return Err(RepoError::NotFound);
        }
        tables.remove_post(id);
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryDatabase {
    async fn count(&self, scope: FeedScope) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .filter(|p| tables.in_scope(p, scope))
            .count() as u64)
    }

    async fn list(
        &self,
        scope: FeedScope,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        let rows = newest_first(
            tables
                .posts
                .iter()
                .filter(|p| tables.in_scope(p, scope))
                .cloned()
                .collect(),
            |p: &Post| p.created_at,
        );
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.comments.iter().any(|c| c.id == comment.id) {
            return Err(RepoError::Constraint("comment already exists".into()));
        }
        tables.check_comment(&comment)?;
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        tables.check_comment(&comment)?;
        let row = tables
            .comments
            .iter_mut()
            .find(|c| c.id == comment.id)
            .ok_or(RepoError::NotFound)?;
        *row = comment.clone();
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        if tables.comments.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for InMemoryDatabase {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .comments
                .iter()
                .filter(|c| c.post_id == Some(post_id))
                .cloned()
                .collect(),
            |c: &Comment| c.created_at,
        ))
    }
}

#[async_trait]
impl BaseRepository<Follow, Uuid> for InMemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Follow>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.follows.iter().find(|f| f.id == id).cloned())
    }

    async fn create(&self, follow: Follow) -> Result<Follow, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(follow.user_id) || !tables.user_exists(follow.author_id) {
            return Err(RepoError::Constraint("follow user does not exist".into()));
        }
        if tables.follows.iter().any(|f| {
            f.id == follow.id || (f.user_id == follow.user_id && f.author_id == follow.author_id)
        }) {
            return Err(RepoError::Constraint("already following".into()));
        }
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn update(&self, follow: Follow) -> Result<Follow, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.follows.iter().any(|f| {
            f.id != follow.id && f.user_id == follow.user_id && f.author_id == follow.author_id
        }) {
            return Err(RepoError::Constraint("already following".into()));
        }
        let row = tables
            .follows
            .iter_mut()
            .find(|f| f.id == follow.id)
            .ok_or(RepoError::NotFound)?;
        *row = follow.clone();
        Ok(follow)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables.follows.retain(|f| f.id != id);
        if tables.follows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl FollowRepository for InMemoryDatabase {
    async fn find_pair(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<Follow>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .find(|f| f.user_id == user_id && f.author_id == author_id)
            .cloned())
    }

    async fn delete_pair(&self, user_id: Uuid, author_id: Uuid) -> Result<u64, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok((before - tables.follows.len()) as u64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.follows.iter().filter(|f| f.user_id == user_id).count() as u64)
    }

    async fn count_followers(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|f| f.author_id == author_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use yatube_core::Paginator;

    async fn user(db: &InMemoryDatabase, username: &str) -> User {
        let user = User::new(username.into(), format!("{username}@example.com"), "hash".into());
        BaseRepository::<User, Uuid>::create(db, user).await.unwrap()
    }

    async fn post(db: &InMemoryDatabase, author: &User, text: &str) -> Post {
        BaseRepository::<Post, Uuid>::create(db, Post::new(author.id, text.into()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_is_a_constraint_violation() {
        let db = InMemoryDatabase::new();
        user(&db, "leo").await;

        let again = User::new("leo".into(), "other@example.com".into(), "hash".into());
        let result = BaseRepository::<User, Uuid>::create(&db, again).await;
        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn posts_list_newest_first_with_insertion_tiebreak() {
        let db = InMemoryDatabase::new();
        let author = user(&db, "leo").await;
        let now = Utc::now();

        let mut old = Post::new(author.id, "old".into());
        old.created_at = now - Duration::hours(1);
        BaseRepository::<Post, Uuid>::create(&db, old).await.unwrap();
        for text in ["first", "second"] {
            let mut p = Post::new(author.id, text.into());
            p.created_at = now;
            BaseRepository::<Post, Uuid>::create(&db, p).await.unwrap();
        }

        let texts: Vec<String> = db
            .list(FeedScope::All, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, ["second", "first", "old"]);
    }

    #[tokio::test]
    async fn page_resolves_window() {
        let db = InMemoryDatabase::new();
        let author = user(&db, "leo").await;
        for i in 0..13 {
            post(&db, &author, &format!("post {i}")).await;
        }

        let page = db
            .page(FeedScope::Author(author.id), Paginator::new(10), Some("2"))
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.count, 13);
    }

    #[tokio::test]
    async fn followed_feed_contains_only_followed_authors() {
        let db = InMemoryDatabase::new();
        let reader = user(&db, "reader").await;
        let followed = user(&db, "followed").await;
        let other = user(&db, "other").await;
        post(&db, &followed, "visible").await;
        post(&db, &other, "hidden").await;

        BaseRepository::<Follow, Uuid>::create(&db, Follow::new(reader.id, followed.id))
            .await
            .unwrap();

        let posts = db.list(FeedScope::FollowedBy(reader.id), 0, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "visible");
        assert_eq!(db.count(FeedScope::FollowedBy(other.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn follow_pair_is_unique() {
        let db = InMemoryDatabase::new();
        let reader = user(&db, "reader").await;
        let author = user(&db, "author").await;

        BaseRepository::<Follow, Uuid>::create(&db, Follow::new(reader.id, author.id))
            .await
            .unwrap();
        let again =
            BaseRepository::<Follow, Uuid>::create(&db, Follow::new(reader.id, author.id)).await;

        assert!(matches!(again, Err(RepoError::Constraint(_))));
        assert_eq!(db.count_following(reader.id).await.unwrap(), 1);
        assert_eq!(db.count_followers(author.id).await.unwrap(), 1);
        assert_eq!(db.delete_pair(reader.id, author.id).await.unwrap(), 1);
        assert!(!db.exists(reader.id, author.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_group_keeps_posts_without_group() {
        let db = InMemoryDatabase::new();
        let author = user(&db, "leo").await;
        let group = BaseRepository::<Group, Uuid>::create(
            &db,
            Group::new("Cats".into(), "cats".into(), "About cats".into()),
        )
        .await
        .unwrap();
        let p = BaseRepository::<Post, Uuid>::create(
            &db,
            Post::new(author.id, "meow".into()).with_group(Some(group.id)),
        )
        .await
        .unwrap();

        BaseRepository::<Group, Uuid>::delete(&db, group.id).await.unwrap();

        let p = BaseRepository::<Post, Uuid>::find_by_id(&db, p.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.group_id, None);
    }

    #[tokio::test]
    async fn deleting_user_cascades() {
        let db = InMemoryDatabase::new();
        let author = user(&db, "author").await;
        let reader = user(&db, "reader").await;
        let p = post(&db, &author, "text").await;
        BaseRepository::<Comment, Uuid>::create(&db, Comment::new(p.id, reader.id, "hi".into()))
            .await
            .unwrap();
        BaseRepository::<Follow, Uuid>::create(&db, Follow::new(reader.id, author.id))
            .await
            .unwrap();

        BaseRepository::<User, Uuid>::delete(&db, author.id).await.unwrap();

        assert_eq!(db.count(FeedScope::All).await.unwrap(), 0);
        assert!(db.list_for_post(p.id).await.unwrap().is_empty());
        assert_eq!(db.count_following(reader.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn comment_requires_existing_post() {
        let db = InMemoryDatabase::new();
        let author = user(&db, "leo").await;
        let orphan = Comment::new(Uuid::new_v4(), author.id, "hi".into());

        let result = BaseRepository::<Comment, Uuid>::create(&db, orphan).await;
        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }
}
