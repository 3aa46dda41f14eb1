//! Feeds, post pages, the post form and comments.

use actix_web::{HttpRequest, HttpResponse, web};

use yatube_core::domain::{Comment, Post};
use yatube_core::ports::{
    BaseRepository, Cache, CommentRepository, FeedScope, FollowRepository, GroupRepository,
    MediaStorage, PostRepository, UserRepository,
};
use yatube_shared::FormErrors;
use yatube_shared::forms::{CommentForm, ImageUpload, PostForm};

use super::upload::{self, PostSubmission};
use super::{PageQuery, post_id};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::templates;
use crate::views::{self, AuthorView};

/// Longest raw `page` value that still gets its own cache entry.
const MAX_CACHED_PAGE_PARAM: usize = 20;

fn not_found(req: &HttpRequest) -> AppError {
    AppError::NotFound(req.path().to_string())
}

/// Main feed. Rendered pages are cached per viewer and page for a short
/// while, so new posts may show up late.
pub async fn index(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let viewer = viewer.0;
    let raw_page = query
        .page
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("1");
    let cache_key = (raw_page.len() <= MAX_CACHED_PAGE_PARAM).then(|| {
        let who = viewer
            .as_ref()
            .map(|v| v.user_id.to_string())
            .unwrap_or_else(|| "anon".to_string());
        format!("index_page:{who}:{raw_page}")
    });

    if let Some(key) = &cache_key {
        if let Some(html) = state.cache.get(key).await {
            tracing::debug!(key = %key, "Index page served from cache");
            return Ok(views::html_response(html));
        }
    }

    let page = state
        .posts
        .page(FeedScope::All, state.paginator(), query.page.as_deref())
        .await?;
    let page = views::card_page(&state, page).await?;

    let mut context = views::page_context(viewer.as_ref());
    context.insert("page_obj", &page);
    let html = templates::render("posts/index.html", &context)?;

    if let Some(key) = &cache_key {
        if let Err(e) = state
            .cache
            .set(key, &html, Some(state.settings.index_cache_ttl))
            .await
        {
            tracing::warn!(error = %e, "Failed to cache index page");
        }
    }

    Ok(views::html_response(html))
}

pub async fn group_posts(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    req: HttpRequest,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let group = state
        .groups
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| not_found(&req))?;

    let page = state
        .posts
        .page(
            FeedScope::Group(group.id),
            state.paginator(),
            query.page.as_deref(),
        )
        .await?;
    let page = views::card_page(&state, page).await?;

    let mut context = views::page_context(viewer.0.as_ref());
    context.insert("group", &group);
    context.insert("page_obj", &page);
    views::render("posts/group_list.html", &context)
}

pub async fn profile(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    req: HttpRequest,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let viewer = viewer.0;
    let author = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| not_found(&req))?;

    let page = state
        .posts
        .page(
            FeedScope::Author(author.id),
            state.paginator(),
            query.page.as_deref(),
        )
        .await?;
    let page = views::card_page(&state, page).await?;

    let is_self = viewer.as_ref().is_some_and(|v| v.user_id == author.id);
    let following = match &viewer {
        Some(v) if !is_self => state.follows.exists(v.user_id, author.id).await?,
        _ => false,
    };
    let followers_count = state.follows.count_followers(author.id).await?;
    let following_count = state.follows.count_following(author.id).await?;

    let mut context = views::page_context(viewer.as_ref());
    context.insert("author", &AuthorView::from(&author));
    context.insert("page_obj", &page);
    context.insert("is_self", &is_self);
    context.insert("following", &following);
    context.insert("followers_count", &followers_count);
    context.insert("following_count", &following_count);
    views::render("posts/profile.html", &context)
}

async fn render_post_detail(
    state: &AppState,
    viewer: Option<&Identity>,
    post: Post,
    form: &CommentForm,
    errors: &FormErrors,
) -> AppResult<HttpResponse> {
    let author = state
        .users
        .find_by_id(post.author_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Post {} has no author", post.id)))?;
    let group = match post.group_id {
        Some(id) => state.groups.find_by_id(id).await?,
        None => None,
    };
    let author_posts_count = state.posts.count(FeedScope::Author(author.id)).await?;
    let comments = state.comments.list_for_post(post.id).await?;
    let comments = views::comment_views(state, comments).await?;
    let can_edit = viewer.is_some_and(|v| post.is_authored_by(v.user_id));

    let mut context = views::page_context(viewer);
    context.insert("post", &views::card(state, post, &author, group));
    context.insert("author_posts_count", &author_posts_count);
    context.insert("comments", &comments);
    context.insert("can_edit", &can_edit);
    context.insert("form", form);
    views::insert_errors(&mut context, errors);
    views::render("posts/post_detail.html", &context)
}

pub async fn post_detail(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = post_id(&req, &path)?;
    let post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&req))?;

    render_post_detail(
        &state,
        viewer.0.as_ref(),
        post,
        &CommentForm::default(),
        &FormErrors::default(),
    )
    .await
}

async fn render_post_form(
    state: &AppState,
    viewer: &Identity,
    form: &PostForm,
    errors: &FormErrors,
    post: Option<&Post>,
) -> AppResult<HttpResponse> {
    let groups = state.groups.list_all().await?;

    let mut context = views::page_context(Some(viewer));
    context.insert("form", form);
    context.insert("groups", &groups);
    context.insert("is_edit", &post.is_some());
    context.insert("post_id", &post.map(|p| p.id));
    context.insert(
        "image_url",
        &post
            .and_then(|p| p.image.as_deref())
            .map(|key| state.media.url(key)),
    );
    views::insert_errors(&mut context, errors);
    views::render("posts/create_post.html", &context)
}

/// Validated post form: the group id and the storage key for a new image.
type CleanedPost = (Option<uuid::Uuid>, Option<String>);

async fn clean_submission(
    state: &AppState,
    form: &mut PostForm,
    image: Option<&ImageUpload>,
) -> AppResult<Result<CleanedPost, FormErrors>> {
    let mut errors = FormErrors::default();

    let group_id = match form.clean() {
        Ok(group_id) => group_id,
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    if let Some(id) = group_id {
        if state.groups.find_by_id(id).await?.is_none() {
            errors.add(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            );
        }
    }

    let image_key = match image.map(ImageUpload::clean) {
        Some(Ok(key)) => Some(key),
        Some(Err(e)) => {
            errors.merge(e);
            None
        }
        None => None,
    };

    Ok(errors.into_result((group_id, image_key)))
}

async fn store_image(
    state: &AppState,
    image: Option<ImageUpload>,
    key: Option<String>,
) -> AppResult<Option<String>> {
    match (image, key) {
        (Some(upload), Some(key)) => Ok(Some(state.media.save(&key, &upload.data).await?)),
        _ => Ok(None),
    }
}

pub async fn post_create_form(
    state: web::Data<AppState>,
    viewer: Identity,
) -> AppResult<HttpResponse> {
    render_post_form(
        &state,
        &viewer,
        &PostForm::default(),
        &FormErrors::default(),
        None,
    )
    .await
}

pub async fn post_create(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let PostSubmission {
        mut form, image, ..
    } = upload::read_post_submission(&req, body).await?;

    let (group_id, image_key) = match clean_submission(&state, &mut form, image.as_ref()).await? {
        Ok(cleaned) => cleaned,
        Err(errors) => return render_post_form(&state, &viewer, &form, &errors, None).await,
    };
    let image = store_image(&state, image, image_key).await?;

    let post = Post::new(viewer.user_id, form.text)
        .with_group(group_id)
        .with_image(image);
    let post = state.posts.create(post).await?;
    tracing::info!(post_id = %post.id, author = %viewer.username, "Post created");

    Ok(views::redirect(&views::profile_url(&viewer.username)))
}

pub async fn post_edit_form(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = post_id(&req, &path)?;
    let post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&req))?;
    if !post.is_authored_by(viewer.user_id) {
        return Ok(views::redirect(&views::post_url(post.id)));
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group_id.map(|id| id.to_string()),
    };
    render_post_form(&state, &viewer, &form, &FormErrors::default(), Some(&post)).await
}

pub async fn post_edit(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let id = post_id(&req, &path)?;
    let mut post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&req))?;
    if !post.is_authored_by(viewer.user_id) {
        tracing::warn!(post_id = %post.id, user = %viewer.username, "Edit attempt by non-author");
        return Ok(views::redirect(&views::post_url(post.id)));
    }

    let PostSubmission {
        mut form,
        image,
        clear_image,
    } = upload::read_post_submission(&req, body).await?;

    let (group_id, image_key) = match clean_submission(&state, &mut form, image.as_ref()).await? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            return render_post_form(&state, &viewer, &form, &errors, Some(&post)).await;
        }
    };
    let image = match store_image(&state, image, image_key).await? {
        Some(stored) => Some(stored),
        None if clear_image => None,
        None => post.image.clone(),
    };

    post.edit(viewer.user_id, form.text, group_id, image)?;
    let post = state.posts.update(post).await?;
    tracing::info!(post_id = %post.id, author = %viewer.username, "Post edited");

    Ok(views::redirect(&views::post_url(post.id)))
}

pub async fn add_comment(
    state: web::Data<AppState>,
    viewer: Identity,
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Form<CommentForm>,
) -> AppResult<HttpResponse> {
    let id = post_id(&req, &path)?;
    let post = state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(&req))?;

    let mut form = form.into_inner();
    if let Err(errors) = form.clean() {
        return render_post_detail(&state, Some(&viewer), post, &form, &errors).await;
    }

    let comment = state
        .comments
        .create(Comment::new(post.id, viewer.user_id, form.text))
        .await?;
    tracing::info!(comment_id = %comment.id, post_id = %post.id, "Comment added");

    Ok(views::redirect(&views::post_url(post.id)))
}
