//! Serves uploaded images.

use actix_web::{HttpRequest, HttpResponse, http::header, web};

use yatube_core::ports::MediaStorage;

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn content_type_for(key: &str) -> mime_guess::Mime {
    mime_guess::from_path(key).first_or_octet_stream()
}

pub async fn serve(
    state: web::Data<AppState>,
    req: HttpRequest,
    key: web::Path<String>,
) -> AppResult<HttpResponse> {
    let data = state
        .media
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(req.path().to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&key))
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .insert_header(("X-Content-Type-Options", "nosniff"))
        .body(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("posts/small.gif").essence_str(), "image/gif");
        assert_eq!(content_type_for("posts/photo.JPEG").essence_str(), "image/jpeg");
        assert_eq!(
            content_type_for("posts/noext").essence_str(),
            "application/octet-stream"
        );
    }
}
