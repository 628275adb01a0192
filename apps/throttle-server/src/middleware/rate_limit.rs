//! Rate limiting middleware.
//!
//! Wraps a route with one policy. The caller is identified from the
//! connection and a couple of demo headers, and the policy's
//! [`ResponseAction`] decides what a rejected caller sees.

use std::future::{Future, Ready, ready};
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpRequest, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderName, HeaderValue},
};

use throttle_core::RateLimitError;
use throttle_core::domain::ResponseAction;
use throttle_infra::{AttemptRequest, CallContext, RateLimiterManager, RequestIdentity};

use super::error::{AppError, ProblemDetails};

/// Header carrying the authenticated principal. Trusted as-is in this demo.
pub const PRINCIPAL_HEADER: &str = "X-User-Id";
pub const SESSION_HEADER: &str = "X-Session-Id";

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const EXCEEDED_HEADER: &str = "x-ratelimit-exceeded";

/// Collect the identity attributes of a request.
pub fn request_identity(req: &HttpRequest) -> RequestIdentity {
    let header_value = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|v| !v.is_empty())
    };

    let address = req.connection_info().realip_remote_addr().map(strip_port);

    RequestIdentity {
        address,
        principal: header_value(PRINCIPAL_HEADER),
        session: header_value(SESSION_HEADER),
        fingerprint: header_value(header::USER_AGENT.as_str()),
        ..RequestIdentity::default()
    }
}

fn strip_port(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|socket| socket.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}

/// Rate limiting middleware factory.
pub struct RateLimit {
    manager: Arc<RateLimiterManager>,
    policy: String,
}

impl RateLimit {
    pub fn new(manager: Arc<RateLimiterManager>, policy: impl Into<String>) -> Self {
        Self {
            manager,
            policy: policy.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            manager: self.manager.clone(),
            policy: self.policy.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    manager: Arc<RateLimiterManager>,
    policy: String,
}

/// What the middleware does with a request after consulting the manager.
enum Decision {
    Proceed {
        limit: u32,
        remaining: u32,
        exceeded: bool,
    },
    Respond(HttpResponse),
}

async fn decide(
    manager: &RateLimiterManager,
    policy_name: &str,
    identity: &RequestIdentity,
) -> Result<Decision, AppError> {
    let policy = manager.policy(Some(policy_name)).map_err(RateLimitError::from)?;
    let key = manager
        .identity_for(Some(policy_name), identity)
        .map_err(RateLimitError::from)?;

    let context = CallContext {
        address: identity.address.clone(),
        principal: identity.principal.clone(),
        bypass_once: false,
    };
    let request = AttemptRequest::for_policy(policy_name).with_context(context);
    let result = manager.attempt(&key, &request).await?;

    if result.allowed {
        return Ok(Decision::Proceed {
            limit: policy.max_attempts(),
            remaining: result.remaining,
            exceeded: false,
        });
    }

    let retry_after = result.retry_after_secs;
    let decision = match policy.on_exceeded() {
        ResponseAction::Reject => Decision::Respond(
            HttpResponse::TooManyRequests()
                .insert_header((REMAINING_HEADER, "0"))
                .insert_header((header::RETRY_AFTER, retry_after.to_string()))
                .json(ProblemDetails::too_many_requests(retry_after)),
        ),
        ResponseAction::RaiseError => Decision::Respond(
            HttpResponse::UnprocessableEntity().json(
                ProblemDetails::new(422, "Rate Limit Exceeded")
                    .with_detail(format!("Too many attempts for '{}'.", policy.name()))
                    .with_retry_after(retry_after),
            ),
        ),
        ResponseAction::Silent => Decision::Respond(HttpResponse::NoContent().finish()),
        ResponseAction::Notify => Decision::Proceed {
            limit: policy.max_attempts(),
            remaining: 0,
            exceeded: true,
        },
    };

    Ok(decision)
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let manager = self.manager.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let identity = request_identity(req.request());

            let response = match decide(&manager, &policy, &identity).await {
                Ok(Decision::Proceed {
                    limit,
                    remaining,
                    exceeded,
                }) => {
                    let mut res = service.call(req).await?;
                    let headers = res.headers_mut();
                    headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(limit));
                    headers.insert(
                        HeaderName::from_static(REMAINING_HEADER),
                        HeaderValue::from(remaining),
                    );
                    if exceeded {
                        headers.insert(
                            HeaderName::from_static(EXCEEDED_HEADER),
                            HeaderValue::from_static("true"),
                        );
                    }
                    return Ok(res.map_into_left_body());
                }
                Ok(Decision::Respond(response)) => response,
                Err(e) => e.error_response(),
            };

            let (http_req, _payload) = req.into_parts();
            Ok(ServiceResponse::new(http_req, response).map_into_right_body())
        })
    }
}
