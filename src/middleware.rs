//! Axum middleware that resolves the inbound signed request.
//!
//! The signed-request string is looked up in the `signed_request` field of a
//! form-encoded body first, then in the `fbsr_{app_id}` cookie. Whatever the
//! outcome, a [`Session`] lands in the request extensions and the pipeline
//! continues; handlers pull it out with the extractor and decide what an
//! anonymous session means for them. Setting
//! [`abort_on_error`](FaceplateLayer::abort_on_error) turns resolution
//! failures into error responses instead.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::FaceplateConfig;
use crate::error::FaceplateError;
use crate::session::Session;
use crate::signed_request::resolve;

const SIGNED_REQUEST_FIELD: &str = "signed_request";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Bodies larger than this are never buffered for signed-request sniffing.
const MAX_SNIFFED_BODY: usize = 1 << 20;

/// Middleware configuration, shared across requests.
pub struct FaceplateLayer {
    pub config: Arc<FaceplateConfig>,
    pub http: reqwest::Client,
    /// When set, a signed request that fails to resolve aborts the pipeline
    /// with the error response instead of continuing anonymously.
    pub abort_on_error: bool,
}

impl FaceplateLayer {
    pub fn new(config: Arc<FaceplateConfig>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            abort_on_error: false,
        }
    }

    pub fn with_abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    fn session(&self, payload: Option<crate::SignedRequestPayload>) -> Session {
        Session::new(self.config.clone(), self.http.clone(), payload)
    }
}

/// Extract the [`Session`] the middleware attached.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = FaceplateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(FaceplateError::MiddlewareNotConfigured)
    }
}

/// Axum middleware function, for use with `axum::middleware::from_fn`:
///
/// ```ignore
/// let layer = Arc::new(FaceplateLayer::new(config, http));
/// let app = Router::new().layer(from_fn(move |req, next| {
///     let layer = layer.clone();
///     faceplate_middleware(layer, req, next)
/// }));
/// ```
pub async fn faceplate_middleware(
    layer: Arc<FaceplateLayer>,
    req: Request,
    next: Next,
) -> Response {
    let (mut req, signed_request) = match extract_signed_request(&layer.config, req).await {
        Ok(extracted) => extracted,
        Err(response) => return response,
    };

    let session = match signed_request {
        Some(raw) => match resolve(&layer.http, &layer.config, &raw).await {
            Ok(payload) => layer.session(Some(payload)),
            Err(err) => {
                tracing::warn!(error = %err, "signed request resolution failed");
                if layer.abort_on_error {
                    return err.into_response();
                }
                layer.session(None)
            }
        },
        None => layer.session(None),
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}

/// Pull the signed-request string out of the request, body field first, then
/// cookie. Returns the request with its body intact (re-buffered if it was
/// read) so downstream extractors still work, or an error response when a
/// form body overruns the buffering limit and cannot be replayed.
async fn extract_signed_request(
    config: &FaceplateConfig,
    req: Request,
) -> Result<(Request, Option<String>), Response> {
    if has_sniffable_form_body(&req) {
        let (parts, body) = req.into_parts();
        match axum::body::to_bytes(body, MAX_SNIFFED_BODY).await {
            Ok(bytes) => {
                let from_body = serde_urlencoded::from_bytes::<HashMap<String, String>>(&bytes)
                    .ok()
                    .and_then(|mut form| form.remove(SIGNED_REQUEST_FIELD));
                let req = Request::from_parts(parts, Body::from(bytes));
                if from_body.is_some() {
                    return Ok((req, from_body));
                }
                let from_cookie = cookie_signed_request(&req, config);
                return Ok((req, from_cookie));
            }
            Err(_) => {
                // Body over limit mid-stream; the consumed part is gone, so
                // the request cannot be forwarded intact.
                tracing::warn!("form body exceeded the signed-request sniffing limit");
                return Err((
                    axum::http::StatusCode::PAYLOAD_TOO_LARGE,
                    axum::Json(serde_json::json!({"error": "request body too large"})),
                )
                    .into_response());
            }
        }
    }

    let from_cookie = cookie_signed_request(&req, config);
    Ok((req, from_cookie))
}

fn has_sniffable_form_body(req: &Request) -> bool {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
    if !is_form {
        return false;
    }
    // Don't commit to buffering something a declared length says is huge.
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_none_or(|len| len <= MAX_SNIFFED_BODY)
}

fn cookie_signed_request(req: &Request, config: &FaceplateConfig) -> Option<String> {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?;
    parse_cookie(cookie_header, &config.cookie_name()).map(String::from)
}

/// Find one cookie's value in a Cookie header.
fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        (key == name).then_some(value)
    })
}
