//! Session authentication: cookie-carried tokens and the extractors that
//! read them.

use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, dev::Payload, web};
use std::fmt;
use std::future::{Ready, ready};
use uuid::Uuid;

use yatube_core::ports::{AuthError, TokenClaims, TokenService, roles};

use crate::state::AppState;

/// Logged-in user, taken from the session cookie.
///
/// Handlers that take an `Identity` redirect guests to the login page.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

/// Raised when a guest reaches a page that needs a session.
#[derive(Debug)]
pub struct LoginRequired {
    /// Path (with query) to come back to after logging in.
    pub next: String,
}

impl fmt::Display for LoginRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Login required for {}", self.next)
    }
}

impl ResponseError for LoginRequired {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((header::LOCATION, login_url(&self.next)))
            .finish()
    }
}

/// `/auth/login/?next=<next>` with `next` form-encoded.
pub fn login_url(next: &str) -> String {
    let query = serde_urlencoded::to_string([("next", next)]).unwrap_or_default();
    format!("/auth/login/?{query}")
}

fn authenticate(req: &HttpRequest) -> Result<Identity, AuthError> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        tracing::error!("AppState not found in app data");
        return Err(AuthError::InvalidToken(
            "Server configuration error".to_string(),
        ));
    };

    let cookie = req
        .cookie(&state.settings.session_cookie_name)
        .ok_or(AuthError::MissingAuth)?;

    let claims = state.tokens.validate_token(cookie.value())?;
    if !claims.has_role(roles::USER) {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(Identity::from(claims))
}

impl FromRequest for Identity {
    type Error = LoginRequired;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match authenticate(req) {
            Ok(identity) => ready(Ok(identity)),
            Err(e) => {
                if !matches!(e, AuthError::MissingAuth) {
                    tracing::debug!(error = %e, "Rejected session cookie");
                }
                let next = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| req.path().to_string());
                ready(Err(LoginRequired { next }))
            }
        }
    }
}

/// Optional identity extractor - doesn't fail if not authenticated.
pub struct OptionalIdentity(pub Option<Identity>);

impl FromRequest for OptionalIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalIdentity(authenticate(req).ok())))
    }
}

/// Cookie holding a freshly issued session token.
pub fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build(state.settings.session_cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.settings.session_cookie_secure)
        .max_age(CookieDuration::seconds(state.tokens.expiration_seconds()))
        .finish()
}

/// Cookie that makes the browser drop the session.
pub fn expired_session_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = Cookie::build(state.settings.session_cookie_name.clone(), "")
        .path("/")
        .finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(
            login_url("/posts/1/comment/"),
            "/auth/login/?next=%2Fposts%2F1%2Fcomment%2F"
        );
    }

    #[test]
    fn login_required_redirects() {
        let resp = LoginRequired {
            next: "/create/".to_string(),
        }
        .error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/auth/login/?next=%2Fcreate%2F"
        );
    }
}
