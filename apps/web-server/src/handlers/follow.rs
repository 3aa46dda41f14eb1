//! Subscriptions between users and the feed they produce.

use actix_web::{HttpRequest, HttpResponse, web};

use yatube_core::domain::Follow;
use yatube_core::error::RepoError;
use yatube_core::ports::{BaseRepository, FeedScope, FollowRepository, PostRepository, UserRepository};

use super::PageQuery;
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

/// Posts by every author the viewer follows.
pub async fn follow_index(
    state: web::Data<AppState>,
    viewer: Identity,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page = state
        .posts
        .page(
            FeedScope::FollowedBy(viewer.user_id),
            state.paginator(),
            query.page.as_deref(),
        )
        .await?;
    let page = views::card_page(&state, page).await?;

    let mut context = views::page_context(Some(&viewer));
    context.insert("page_obj", &page);
    views::render("posts/follow.html", &context)
}

/// Subscribe to an author. Following yourself or someone already followed
/// changes nothing.
pub async fn profile_follow(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    let author = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(req.path().to_string()))?;

    let follow = Follow::new(viewer.user_id, author.id);
    if follow.is_self_follow() {
        tracing::debug!(user = %viewer.username, "Ignoring self-follow");
    } else if !state.follows.exists(viewer.user_id, author.id).await? {
        match state.follows.create(follow).await {
            Ok(_) => {
                tracing::info!(user = %viewer.username, author = %author.username, "Followed author");
            }
            // Lost a race with a concurrent follow of the same pair
            Err(RepoError::Constraint(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(views::redirect(&views::profile_url(&author.username)))
}

/// Drop a subscription if there is one.
pub async fn profile_unfollow(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    let author = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(req.path().to_string()))?;

    let removed = state.follows.delete_pair(viewer.user_id, author.id).await?;
    if removed > 0 {
        tracing::info!(user = %viewer.username, author = %author.username, "Unfollowed author");
    }

    Ok(views::redirect(&views::profile_url(&author.username)))
}
