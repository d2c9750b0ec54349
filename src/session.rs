//! Per-request session over the Graph and FQL APIs.
//!
//! A [`Session`] is built once per inbound request from the resolved
//! signed-request payload (or nothing, for anonymous requests) and discarded
//! with it. Every operation funnels through one request primitive that merges
//! the session token under caller-supplied params and normalizes the
//! response: `{error: ...}` bodies become [`ApiError`], everything else is
//! unwrapped one `data` envelope deep.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::codec::{try_parse_json, try_parse_query_string};
use crate::config::FaceplateConfig;
use crate::error::{ApiError, FaceplateError};
use crate::signed_request::SignedRequestPayload;

/// An FQL query: a single statement or a set of named statements whose
/// results are keyed by name.
#[derive(Debug, Clone)]
pub enum FqlQuery {
    Single(String),
    Multi(HashMap<String, String>),
}

impl From<&str> for FqlQuery {
    fn from(query: &str) -> Self {
        FqlQuery::Single(query.to_string())
    }
}

impl From<String> for FqlQuery {
    fn from(query: String) -> Self {
        FqlQuery::Single(query)
    }
}

impl From<HashMap<String, String>> for FqlQuery {
    fn from(queries: HashMap<String, String>) -> Self {
        FqlQuery::Multi(queries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

/// Request-scoped handle on the platform APIs, bound to a resolved token
/// (or anonymous).
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<FaceplateConfig>,
    http: reqwest::Client,
    payload: Option<SignedRequestPayload>,
    token: Option<String>,
}

impl Session {
    /// Build a session from a resolved signed-request payload. The token is
    /// taken from the payload; a payload without one (e.g. the anonymous
    /// resolution case) yields an unauthenticated session.
    pub fn new(
        config: Arc<FaceplateConfig>,
        http: reqwest::Client,
        payload: Option<SignedRequestPayload>,
    ) -> Self {
        let token = payload
            .as_ref()
            .and_then(|p| p.token())
            .map(String::from);
        Self {
            config,
            http,
            payload,
            token,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn payload(&self) -> Option<&SignedRequestPayload> {
        self.payload.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `GET /me`. Without a token this short-circuits to `Ok(None)` and
    /// performs no network call.
    pub async fn me(&self) -> Result<Option<Value>, FaceplateError> {
        if self.token.is_none() {
            return Ok(None);
        }
        self.get("/me", &[]).await.map(Some)
    }

    /// `GET /{app_id}` — the app's own object.
    pub async fn app(&self) -> Result<Value, FaceplateError> {
        let path = format!("/{}", self.config.app_id);
        self.get(&path, &[]).await
    }

    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FaceplateError> {
        self.request(Method::Get, path, params).await
    }

    pub async fn post(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FaceplateError> {
        self.request(Method::Post, path, params).await
    }

    /// Run an FQL query (or a named set of them) against the legacy REST API.
    ///
    /// Single queries unwrap a `data` envelope when present. Multi-queries
    /// reshape the platform's `[{name, fql_result_set}]` array into a map
    /// keyed by query name; responses carrying an `error_code` become an
    /// [`ApiError`] holding the raw response.
    pub async fn fql(&self, query: impl Into<FqlQuery>) -> Result<Value, FaceplateError> {
        match query.into() {
            FqlQuery::Single(query) => {
                let result = self
                    .fql_call("fql.query", &[("query", query.as_str())])
                    .await?;
                Ok(unwrap_data(result))
            }
            FqlQuery::Multi(queries) => {
                // BTreeMap so the serialized `queries` param is deterministic
                let queries: BTreeMap<&String, &String> = queries.iter().collect();
                let encoded = serde_json::to_string(&queries)
                    .map_err(|e| FaceplateError::Transport(e.to_string()))?;
                let result = self
                    .fql_call("fql.multiquery", &[("queries", encoded.as_str())])
                    .await?;

                if result.get("error_code").is_some() {
                    return Err(ApiError::from_fql(result).into());
                }

                match result {
                    Value::Array(entries) => {
                        let mut by_name = Map::new();
                        for entry in entries {
                            if let Some(name) = entry.get("name").and_then(Value::as_str) {
                                let results = entry
                                    .get("fql_result_set")
                                    .cloned()
                                    .unwrap_or(Value::Null);
                                by_name.insert(name.to_string(), results);
                            }
                        }
                        Ok(Value::Object(by_name))
                    }
                    other => {
                        Err(ApiError::from_text(StatusCode::OK, other.to_string()).into())
                    }
                }
            }
        }
    }

    /// Trade the app's credentials for an app-level token and return a new
    /// session carrying it. The new session shares this one's config and
    /// signed-request payload but does not inherit the user token.
    pub async fn app_session(&self) -> Result<Session, FaceplateError> {
        let resp = self
            .http
            .post(self.config.token_url())
            .form(&[
                ("client_id", self.config.app_id.as_str()),
                ("client_secret", self.config.secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        if !status.is_success() {
            let body = try_parse_json(&text).unwrap_or(Value::String(text));
            return Err(FaceplateError::TokenExchangeFailed {
                body,
                user_id: None,
            });
        }

        let token = try_parse_query_string(&text)
            .and_then(|mut fields| fields.remove("access_token"))
            .ok_or_else(|| FaceplateError::TokenExchangeFailed {
                body: Value::String(text),
                user_id: None,
            })?;

        Ok(Session {
            config: self.config.clone(),
            http: self.http.clone(),
            payload: self.payload.clone(),
            token: Some(token),
        })
    }

    /// The one outbound-call primitive for Graph API operations.
    ///
    /// Merges `access_token` under caller params (caller wins on collision),
    /// performs the call, and normalizes the result.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FaceplateError> {
        let merged = self.merge_params(params);
        let url = self.config.graph(path);
        tracing::debug!(%url, ?method, "graph api call");

        let req = match method {
            Method::Get => self.http.get(&url).query(&merged),
            Method::Post => self.http.post(&url).form(&merged),
        };
        let resp = req
            .send()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        handle_api_result(status, &text)
    }

    /// Legacy REST call for FQL; returns the parsed body without the Graph
    /// `data` normalization, which differs per query shape.
    async fn fql_call(
        &self,
        fql_method: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FaceplateError> {
        let mut merged = self.merge_params(params);
        merged.insert("format".into(), "json".into());
        let url = self.config.fql_url(fql_method);
        tracing::debug!(%url, "fql call");

        let resp = self
            .http
            .get(&url)
            .query(&merged)
            .send()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FaceplateError::Transport(e.to_string()))?;

        let Some(value) = try_parse_json(&text) else {
            return Err(ApiError::from_text(status, text).into());
        };
        if let Some(error) = value.get("error") {
            return Err(ApiError::from_graph(error.clone()).into());
        }
        if !status.is_success() {
            let err = if value.get("error_code").is_some() {
                ApiError::from_fql(value)
            } else {
                ApiError::from_text(status, text)
            };
            return Err(err.into());
        }
        Ok(value)
    }

    /// Explicit param composition: the session token is the default,
    /// caller-supplied params override it.
    fn merge_params(&self, params: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        if let Some(token) = &self.token {
            merged.insert("access_token".to_string(), token.clone());
        }
        for (key, value) in params {
            merged.insert((*key).to_string(), (*value).to_string());
        }
        merged
    }
}

/// Normalize a Graph API response body.
///
/// `{error: ...}` becomes an [`ApiError`] regardless of status code; any
/// other JSON body succeeds, unwrapped one `data` envelope deep. Bodies that
/// are not JSON only succeed for 2xx responses that legitimately return bare
/// values; otherwise the raw text is preserved in the error.
fn handle_api_result(status: StatusCode, text: &str) -> Result<Value, FaceplateError> {
    let Some(value) = try_parse_json(text) else {
        return Err(ApiError::from_text(status, text.to_string()).into());
    };
    if let Some(error) = value.get("error") {
        return Err(ApiError::from_graph(error.clone()).into());
    }
    if !status.is_success() {
        return Err(ApiError::from_text(status, text.to_string()).into());
    }
    Ok(unwrap_data(value))
}

/// `response.data` when the envelope is present, the response otherwise.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
