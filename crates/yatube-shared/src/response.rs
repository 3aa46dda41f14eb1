//! Error page context shared by every HTML error response.

use serde::{Deserialize, Serialize};

/// Context for the error templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPage {
    pub status: u16,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Path that failed, echoed on the 404 page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorPage {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail: None,
            path: None,
            request_id: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, "Bad Request").with_detail(detail)
    }

    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden")
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(404, "Page not found").with_path(path)
    }

    pub fn too_many_requests() -> Self {
        Self::new(429, "Too Many Requests")
    }

    pub fn internal_error() -> Self {
        Self::new(500, "Server error")
    }

    /// Template that renders this page.
    pub fn template(&self) -> &'static str {
        match self.status {
            403 => "core/403.html",
            404 => "core/404.html",
            500.. => "core/500.html",
            _ => "core/error.html",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_template_by_status() {
        assert_eq!(ErrorPage::not_found("/nope/").template(), "core/404.html");
        assert_eq!(ErrorPage::forbidden().template(), "core/403.html");
        assert_eq!(ErrorPage::internal_error().template(), "core/500.html");
        assert_eq!(ErrorPage::too_many_requests().template(), "core/error.html");
    }
}
