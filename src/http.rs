//! Request and response values passed between the router and its capabilities.
//!
//! These are plain owned snapshots rather than live platform handles, so a
//! response can be cached, cloned and compared without consuming a stream.

use std::fmt;

use bytes::Bytes;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the page issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Ordinary same-origin subresource fetch.
    #[default]
    SameOrigin,
    /// Opaque cross-origin fetch.
    NoCors,
    /// CORS-checked cross-origin fetch.
    Cors,
}

/// A request descriptor as seen at the interception point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Fetch mode.
    pub mode: RequestMode,
    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Request body (empty for GET).
    pub body: Bytes,
}

impl Request {
    /// Creates a request with an empty body and no headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::for_url(method, url))
    }

    /// Creates a request for an already-parsed URL.
    #[must_use]
    pub fn for_url(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::default(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a GET subresource request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    /// Creates a GET navigation request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn navigate(url: &str) -> Result<Self> {
        Ok(Self::get(url)?.with_mode(RequestMode::Navigate))
    }

    /// Creates a POST request carrying `data` as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is invalid or `data` cannot be serialized.
    pub fn post_json(url: &str, data: &serde_json::Value) -> Result<Self> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::new(Method::POST, url)?
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Sets the fetch mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the URL path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns true for GET requests.
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Returns true for page navigations.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the cache identity of this request.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey {
            method: self.method.as_str().to_string(),
            url: self.url.to_string(),
        }
    }
}

/// Cache identity of a request: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute URL including query.
    pub url: String,
}

impl RequestKey {
    /// Key for a GET of `url`.
    #[must_use]
    pub fn get(url: &Url) -> Self {
        Self {
            method: Method::GET.as_str().to_string(),
            url: url.to_string(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A complete response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Creates a response with the canonical reason phrase for `status`.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Creates a JSON response.
    #[must_use]
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("Content-Type", "application/json")
    }

    /// Creates a `200 OK` HTML response.
    #[must_use]
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::new(200, body).with_header("Content-Type", "text/html")
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Overrides the reason phrase.
    #[must_use]
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Returns true when the status is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the `Content-Type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body is not valid JSON.
    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_relative_url() {
        let err = Request::get("/api/assessments").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn request_key_uses_method_and_full_url() {
        let req = Request::get("http://localhost:8501/api/questionnaires?lang=vi").unwrap();
        let key = req.key();
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "http://localhost:8501/api/questionnaires?lang=vi");
        assert_eq!(key, RequestKey::get(&req.url));
        assert_eq!(
            key.to_string(),
            "GET http://localhost:8501/api/questionnaires?lang=vi"
        );
    }

    #[test]
    fn navigation_requests() {
        let req = Request::navigate("http://localhost:8501/").unwrap();
        assert!(req.is_navigation());
        assert!(req.is_get());
        assert!(!Request::get("http://localhost:8501/").unwrap().is_navigation());
    }

    #[test]
    fn post_json_sets_content_type() {
        let data = serde_json::json!({"phq9": [1, 2, 0]});
        let req = Request::post_json("http://localhost:8501/api/assessments", &data).unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header("content-type"), Some("application/json"));
        let decoded: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn response_status_classification() {
        assert!(Response::new(200, "").is_ok());
        assert!(Response::new(204, "").is_ok());
        assert!(!Response::new(304, "").is_ok());
        assert!(!Response::new(503, "").is_ok());
    }

    #[test]
    fn response_reason_phrase() {
        assert_eq!(Response::new(503, "").status_text, "Service Unavailable");
        assert_eq!(Response::new(599, "").status_text, "");
    }

    #[test]
    fn response_header_lookup_is_case_insensitive() {
        let resp = Response::html("<h1>hi</h1>");
        assert_eq!(resp.content_type(), Some("text/html"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
