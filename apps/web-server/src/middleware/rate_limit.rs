//! Rate limiting middleware for form submissions.
//!
//! Only unsafe methods are counted; page views pass straight through.

use actix_web::{
    Error,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, header},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use yatube_core::ports::RateLimiter;
use yatube_shared::ErrorPage;

use crate::middleware::error::render_error_page;

/// Rate limiting middleware factory. Without a limiter it does nothing.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = match &self.limiter {
            Some(limiter) if *req.method() == Method::POST => limiter.clone(),
            _ => {
                return Box::pin(async move {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                });
            }
        };

        let key = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        Box::pin(async move {
            match limiter.check(&key).await {
                Ok(result) if !result.allowed => {
                    let retry_after = result.reset_after.as_secs().max(1);
                    tracing::warn!(key = %key, retry_after, "Rate limit exceeded");

                    let page = ErrorPage::too_many_requests().with_detail(format!(
                        "Too many attempts. Try again in {retry_after} seconds."
                    ));
                    let mut response = render_error_page(&page);
                    if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
                        response.headers_mut().insert(header::RETRY_AFTER, value);
                    }
                    Ok(req.into_response(response).map_into_right_body())
                }
                Ok(_) => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Rate limiter error, failing open");
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use yatube_core::ports::{RateLimitError, RateLimitResult};

    /// Allows the first `budget` checks.
    struct Budget {
        budget: u32,
        used: AtomicU32,
    }

    #[async_trait]
    impl RateLimiter for Budget {
        async fn check(&self, _key: &str) -> Result<RateLimitResult, RateLimitError> {
            let used = self.used.fetch_add(1, Ordering::SeqCst);
            Ok(RateLimitResult {
                allowed: used < self.budget,
                reset_after: Duration::from_secs(30),
            })
        }
    }

    #[actix_rt::test]
    async fn blocks_posts_over_budget_but_not_gets() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(Budget {
            budget: 1,
            used: AtomicU32::new(0),
        });
        let app = test::init_service(
            App::new()
                .wrap(RateLimitMiddleware::new(Some(limiter)))
                .route("/login/", web::get().to(HttpResponse::Ok))
                .route("/login/", web::post().to(HttpResponse::Ok)),
        )
        .await;

        let post = || test::TestRequest::post().uri("/login/").to_request();
        assert_eq!(test::call_service(&app, post()).await.status(), StatusCode::OK);

        let resp = test::call_service(&app, post()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "30");

        let get = test::TestRequest::get().uri("/login/").to_request();
        assert_eq!(test::call_service(&app, get).await.status(), StatusCode::OK);
    }
}
