use std::collections::BTreeMap;

use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait, Value};
use uuid::Uuid;

use crate::database::entity::{follow, group, post};
use crate::database::postgres_repo::{
    PostgresFollowRepository, PostgresGroupRepository, PostgresPostRepository, newest_posts,
};
use yatube_core::domain::Post;
use yatube_core::error::RepoError;
use yatube_core::ports::{
    BaseRepository, FeedScope, FollowRepository, GroupRepository, PostRepository,
};

fn post_model(author_id: Uuid, text: &str) -> post::Model {
    post::Model {
        id: Uuid::new_v4(),
        author_id,
        group_id: None,
        text: text.to_owned(),
        image: Some("posts/small.gif".to_owned()),
        created_at: chrono::Utc::now().into(),
        seq: 1,
    }
}

#[tokio::test]
async fn test_find_post_by_id() {
    let author_id = Uuid::new_v4();
    let model = post_model(author_id, "Test Post");
    let post_id = model.id;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![model]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);

    let post: Post = repo.find_by_id(post_id).await.unwrap().unwrap();

    assert_eq!(post.id, post_id);
    assert_eq!(post.author_id, author_id);
    assert_eq!(post.text, "Test Post");
    assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
}

#[tokio::test]
async fn test_count_followed_feed() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![BTreeMap::from([(
            "num_items",
            Value::BigInt(Some(7)),
        )])]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);

    let count = repo.count(FeedScope::FollowedBy(Uuid::new_v4())).await.unwrap();
    assert_eq!(count, 7);
}

#[tokio::test]
async fn test_list_feed_page() {
    let author_id = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![
            post_model(author_id, "second"),
            post_model(author_id, "first"),
        ]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);

    let posts = repo.list(FeedScope::Author(author_id), 0, 10).await.unwrap();
    let texts: Vec<&str> = posts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["second", "first"]);
}

#[test]
fn test_feed_ties_fall_back_to_insertion_order() {
    let sql = newest_posts(FeedScope::All)
        .build(DatabaseBackend::Postgres)
        .to_string();

    assert!(sql.contains(r#"ORDER BY "posts"."created_at" DESC, "posts"."seq" DESC"#));
}

#[tokio::test]
async fn test_find_group_by_slug() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![group::Model {
            id: Uuid::new_v4(),
            title: "Cats".to_owned(),
            slug: "cats".to_owned(),
            description: "About cats".to_owned(),
        }]])
        .into_connection();

    let repo = PostgresGroupRepository::new(db);

    let group = repo.find_by_slug("cats").await.unwrap().unwrap();
    assert_eq!(group.title, "Cats");
}

#[tokio::test]
async fn test_follow_exists() {
    let user_id = Uuid::new_v4();
    let author_id = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![follow::Model {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at: chrono::Utc::now().into(),
        }]])
        .append_query_results(vec![Vec::<follow::Model>::new()])
        .into_connection();

    let repo = PostgresFollowRepository::new(db);

    assert!(repo.exists(user_id, author_id).await.unwrap());
    assert!(!repo.exists(author_id, user_id).await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_post_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .into_connection();

    let repo = PostgresPostRepository::new(db);

    let result = BaseRepository::<Post, Uuid>::delete(&repo, Uuid::new_v4()).await;
    assert!(matches!(result, Err(RepoError::NotFound)));
}
