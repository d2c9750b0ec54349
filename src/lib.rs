//! Faceplate — Facebook signed-request authentication for Axum.
//!
//! Verifies the platform's `signature.base64url(payload)` signed-request
//! token, optionally exchanges an OAuth authorization code for an access
//! token, and attaches a request-scoped [`Session`] that downstream handlers
//! use to call the Graph and FQL APIs.
//!
//! The middleware looks for a signed request in the `signed_request` field of
//! a form-encoded body, then in the `fbsr_{app_id}` cookie. Requests without
//! one (or whose resolution fails, unless [`FaceplateLayer::abort_on_error`]
//! is set) proceed with an anonymous session — handlers must check
//! [`Session::is_authenticated`] before relying on identity.

pub mod codec;
pub mod config;
pub mod error;
pub mod middleware;
pub mod session;
pub mod signature;
pub mod signed_request;

pub use crate::config::{ConfigError, FaceplateConfig};
pub use crate::error::{ApiError, FaceplateError};
pub use crate::middleware::{FaceplateLayer, faceplate_middleware};
pub use crate::session::{FqlQuery, Session};
pub use crate::signed_request::{SignedRequestPayload, resolve};
