//! HTTP handlers and route configuration.

mod about;
mod follow;
mod health;
mod media;
mod posts;
mod upload;
mod users;


use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use yatube_core::ports::RateLimiter;

use crate::middleware::error::AppError;
use crate::middleware::rate_limit::RateLimitMiddleware;

/// `?page=` as sent by the paginator links.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Parse a post id from the path; anything malformed is a 404.
fn post_id(req: &HttpRequest, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(req.path().to_string()))
}

/// Configure all application routes. Account form submissions go through
/// `limiter` when one is given.
pub fn configure_routes(cfg: &mut web::ServiceConfig, limiter: Option<Arc<dyn RateLimiter>>) {
    cfg.route("/", web::get().to(posts::index))
        .route("/group/{slug}/", web::get().to(posts::group_posts))
        .route("/profile/{username}/", web::get().to(posts::profile))
        .route("/profile/{username}/follow/", web::get().to(follow::profile_follow))
        .route("/profile/{username}/follow/", web::post().to(follow::profile_follow))
        .route("/profile/{username}/unfollow/", web::get().to(follow::profile_unfollow))
        .route("/profile/{username}/unfollow/", web::post().to(follow::profile_unfollow))
        .route("/follow/", web::get().to(follow::follow_index))
        .route("/create/", web::get().to(posts::post_create_form))
        .route("/create/", web::post().to(posts::post_create))
        .route("/posts/{post_id}/", web::get().to(posts::post_detail))
        .route("/posts/{post_id}/edit/", web::get().to(posts::post_edit_form))
        .route("/posts/{post_id}/edit/", web::post().to(posts::post_edit))
        .route("/posts/{post_id}/comment/", web::post().to(posts::add_comment))
        .service(
            web::scope("/auth")
                .wrap(RateLimitMiddleware::new(limiter))
                .route("/signup/", web::get().to(users::signup_form))
                .route("/signup/", web::post().to(users::signup))
                .route("/login/", web::get().to(users::login_form))
                .route("/login/", web::post().to(users::login))
                .route("/logout/", web::get().to(users::logout))
                .route("/logout/", web::post().to(users::logout))
                .route(
                    "/password_change/",
                    web::get().to(users::password_change_form),
                )
                .route("/password_change/", web::post().to(users::password_change))
                .route(
                    "/password_change/done/",
                    web::get().to(users::password_change_done),
                )
                .route("/password_reset/", web::get().to(users::password_reset_form))
                .route("/password_reset/", web::post().to(users::password_reset))
                .route(
                    "/password_reset/done/",
                    web::get().to(users::password_reset_done),
                )
                .route("/reset/done/", web::get().to(users::password_reset_complete))
                .route(
                    "/reset/{uid}/{token}/",
                    web::get().to(users::password_reset_confirm_form),
                )
                .route(
                    "/reset/{uid}/{token}/",
                    web::post().to(users::password_reset_confirm),
                ),
        )
        .service(
            web::scope("/about")
                .route("/author/", web::get().to(about::author))
                .route("/tech/", web::get().to(about::tech)),
        )
        .route("/media/{key:.*}", web::get().to(media::serve))
        .route("/health", web::get().to(health::health_check))
        .default_service(web::to(not_found));
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(req.path().to_string()))
}
