//! Reading the post form, which arrives as multipart when it carries an
//! image.

use actix_web::{HttpRequest, http::header, web};
use serde::Deserialize;

use yatube_shared::forms::{ImageUpload, PostForm};

use crate::middleware::error::{AppError, AppResult};

/// Checkbox that removes the current image when editing.
const CLEAR_IMAGE_FIELD: &str = "image-clear";

/// Everything the post form submitted.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub form: PostForm,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

/// Url-encoded fallback for clients that do not send files.
#[derive(Debug, Deserialize)]
struct UrlEncodedPost {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default, rename = "image-clear")]
    clear_image: Option<String>,
}

pub async fn read_post_submission(req: &HttpRequest, body: web::Bytes) -> AppResult<PostSubmission> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let parsed: UrlEncodedPost = serde_urlencoded::from_bytes(&body)
            .map_err(|e| AppError::BadRequest(format!("Malformed form: {e}")))?;
        return Ok(PostSubmission {
            form: PostForm {
                text: parsed.text,
                group: parsed.group,
            },
            image: None,
            clear_image: parsed.clear_image.is_some(),
        });
    }

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| AppError::BadRequest(format!("Expected a multipart form: {e}")))?;
    let stream = futures::stream::once(async move { Ok::<_, std::convert::Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut submission = PostSubmission::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => submission.form.text = field.text().await.map_err(malformed)?,
            "group" => submission.form.group = Some(field.text().await.map_err(malformed)?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(malformed)?;
                // An empty file input still sends a part with no file name
                if !file_name.is_empty() {
                    submission.image = Some(ImageUpload {
                        file_name,
                        data: data.to_vec(),
                    });
                }
            }
            CLEAR_IMAGE_FIELD => submission.clear_image = true,
            other => tracing::debug!(field = other, "Ignoring unknown post form field"),
        }
    }

    Ok(submission)
}

fn malformed(e: multer::Error) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_rt::test]
    async fn reads_multipart_fields_and_file() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"text\"\r\n\r\n\
            Hello there\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"image\"; filename=\"a.gif\"\r\n\
            Content-Type: image/gif\r\n\r\n\
            GIF89a\r\n\
            --XyZ--\r\n";
        let req = TestRequest::post()
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ"))
            .to_http_request();

        let submission = read_post_submission(&req, web::Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(submission.form.text, "Hello there");
        assert_eq!(submission.form.group, None);
        let image = submission.image.unwrap();
        assert_eq!(image.file_name, "a.gif");
        assert_eq!(image.data, b"GIF89a");
        assert!(!submission.clear_image);
    }

    #[actix_rt::test]
    async fn empty_file_input_is_no_image() {
        let body = "--b\r\n\
            Content-Disposition: form-data; name=\"text\"\r\n\r\n\
            Hi\r\n\
            --b\r\n\
            Content-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \r\n\
            --b\r\n\
            Content-Disposition: form-data; name=\"image-clear\"\r\n\r\n\
            on\r\n\
            --b--\r\n";
        let req = TestRequest::post()
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=b"))
            .to_http_request();

        let submission = read_post_submission(&req, web::Bytes::from(body))
            .await
            .unwrap();
        assert!(submission.image.is_none());
        assert!(submission.clear_image);
    }

    #[actix_rt::test]
    async fn accepts_urlencoded_form() {
        let req = TestRequest::post()
            .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
            .to_http_request();

        let submission = read_post_submission(&req, web::Bytes::from_static(b"text=Hi+all&group="))
            .await
            .unwrap();
        assert_eq!(submission.form.text, "Hi all");
        assert_eq!(submission.form.group.as_deref(), Some(""));
    }

    #[actix_rt::test]
    async fn rejects_unknown_content_type() {
        let req = TestRequest::post()
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .to_http_request();
        assert!(read_post_submission(&req, web::Bytes::new()).await.is_err());
    }
}
