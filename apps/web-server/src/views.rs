//! View models handed to templates and small rendering helpers.

use std::collections::HashMap;

use actix_web::HttpResponse;
use actix_web::http::header;
use serde::Serialize;
use tera::Context;
use uuid::Uuid;

use yatube_core::Page;
use yatube_shared::FormErrors;
use yatube_shared::errors::NON_FIELD;
use yatube_core::domain::{Comment, Group, Post, User};
use yatube_core::ports::{GroupRepository, MediaStorage, UserRepository};

use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;
use crate::templates;

const DATE_FORMAT: &str = "%d %b %Y";

/// The logged-in user, as the navigation bar sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Viewer {
    pub id: Uuid,
    pub username: String,
}

impl From<&Identity> for Viewer {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id,
            username: identity.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.display_name(),
        }
    }
}

/// A post as shown in feeds and on its own page.
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub id: Uuid,
    pub text: String,
    pub excerpt: String,
    pub created_at: String,
    pub created_at_iso: String,
    pub author: AuthorView,
    pub group: Option<Group>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub text: String,
    pub created_at: String,
    pub author: AuthorView,
}

/// Context every page starts from.
pub fn page_context(viewer: Option<&Identity>) -> Context {
    let mut context = Context::new();
    context.insert("viewer", &viewer.map(Viewer::from));
    context
}

/// Field errors plus the form-wide ones under `non_field_errors`.
pub fn insert_errors(context: &mut Context, errors: &FormErrors) {
    context.insert("errors", errors);
    context.insert("non_field_errors", errors.get(NON_FIELD));
}

/// 200 response with a rendered template.
pub fn render(template: &str, context: &Context) -> AppResult<HttpResponse> {
    let html = templates::render(template, context)?;
    Ok(html_response(html))
}

pub fn html_response(html: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_url(post_id: Uuid) -> String {
    format!("/posts/{post_id}/")
}

/// Build cards for `posts`, loading authors and groups in two queries.
pub async fn post_cards(state: &AppState, posts: Vec<Post>) -> AppResult<Vec<PostCard>> {
    let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let mut group_ids: Vec<Uuid> = posts.iter().filter_map(|p| p.group_id).collect();
    group_ids.sort_unstable();
    group_ids.dedup();

    let authors: HashMap<Uuid, User> = state
        .users
        .find_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let groups: HashMap<Uuid, Group> = state
        .groups
        .find_by_ids(&group_ids)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    Ok(posts
        .into_iter()
        .filter_map(|post| {
            let author = authors.get(&post.author_id)?;
            let group = post.group_id.and_then(|id| groups.get(&id)).cloned();
            Some(card(state, post, author, group))
        })
        .collect())
}

pub fn card(state: &AppState, post: Post, author: &User, group: Option<Group>) -> PostCard {
    PostCard {
        id: post.id,
        excerpt: post.excerpt(),
        created_at: post.created_at.format(DATE_FORMAT).to_string(),
        created_at_iso: post.created_at.to_rfc3339(),
        author: AuthorView::from(author),
        group,
        image_url: post.image.as_deref().map(|key| state.media.url(key)),
        text: post.text,
    }
}

/// Swap a page of posts for a page of cards.
pub async fn card_page(state: &AppState, mut page: Page<Post>) -> AppResult<Page<PostCard>> {
    let posts = std::mem::take(&mut page.items);
    let cards = post_cards(state, posts).await?;
    Ok(page.with_items(cards))
}

pub async fn comment_views(
    state: &AppState,
    comments: Vec<Comment>,
) -> AppResult<Vec<CommentView>> {
    let mut author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<Uuid, User> = state
        .users
        .find_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(comments
        .into_iter()
        .filter_map(|comment| {
            let author = authors.get(&comment.author_id)?;
            Some(CommentView {
                id: comment.id,
                created_at: comment.created_at.format(DATE_FORMAT).to_string(),
                author: AuthorView::from(author),
                text: comment.text,
            })
        })
        .collect())
}
