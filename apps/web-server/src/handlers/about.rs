//! Static "about" pages.

use actix_web::HttpResponse;

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::views;

pub async fn author(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    views::render("about/author.html", &views::page_context(viewer.0.as_ref()))
}

pub async fn tech(viewer: OptionalIdentity) -> AppResult<HttpResponse> {
    views::render("about/tech.html", &views::page_context(viewer.0.as_ref()))
}
