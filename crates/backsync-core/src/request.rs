//! Lossless transforms between a live outbound request and the fully
//! in-memory record the store persists.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RequestError;

/// Referrer value a fresh request carries when the caller sets nothing.
pub const DEFAULT_REFERRER: &str = "about:client";

/// Fetch-style request mode, preserved verbatim across storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    Navigate,
}

/// Fetch-style credentials mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Fetch-style cache mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

/// Fetch-style redirect mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    #[default]
    Follow,
    Error,
    Manual,
}

/// A live outbound HTTP request: everything needed to issue it, now or
/// after a round-trip through storage.
///
/// Bodies are held as in-memory bytes, so the same request can be rebuilt
/// and sent any number of times without consuming anything.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
    pub credentials: CredentialsMode,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub referrer: String,
    pub integrity: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            mode: RequestMode::default(),
            credentials: CredentialsMode::default(),
            cache: CacheMode::default(),
            redirect: RedirectMode::default(),
            referrer: DEFAULT_REFERRER.to_string(),
            integrity: String::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Append a header. Repeated names accumulate, as header maps do.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build a `reqwest::Request` for one send.
    ///
    /// Rebuilding per attempt keeps replay retries from fighting over a
    /// consumed body; the buffered bytes are shared, not copied.
    pub fn to_reqwest(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        request
    }
}

/// The stored form of a request: plain data, serde-serializable, and
/// losslessly convertible back to [`HttpRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    /// Absolute URL.
    pub url: String,
    pub method: String,
    /// Header name/value pairs in map iteration order; repeated names keep
    /// every value.
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
    pub mode: RequestMode,
    pub credentials: CredentialsMode,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub referrer: String,
    pub integrity: String,
}

impl RequestData {
    /// Capture a live request into its stored form.
    ///
    /// GET and HEAD requests must not carry a body, header values must be
    /// valid UTF-8, and the URL must be http(s) — anything else cannot be
    /// re-issued later and is rejected here rather than at replay time.
    pub fn from_request(request: &HttpRequest) -> Result<Self, RequestError> {
        let scheme = request.url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(RequestError::InvalidUrl(format!(
                "unsupported scheme '{scheme}' in {}",
                request.url
            )));
        }

        let bodyless = request.method == Method::GET || request.method == Method::HEAD;
        if bodyless && request.body.is_some() {
            return Err(RequestError::BodyNotAllowed(request.method.to_string()));
        }

        let mut headers = Vec::with_capacity(request.headers.len());
        for (name, value) in request.headers.iter() {
            let value = value.to_str().map_err(|_| {
                RequestError::InvalidHeader(format!("value of '{name}' is not valid UTF-8"))
            })?;
            headers.push((name.as_str().to_string(), value.to_string()));
        }

        Ok(Self {
            url: request.url.to_string(),
            method: request.method.as_str().to_string(),
            headers,
            body: request.body.as_ref().map(|b| b.to_vec()),
            mode: request.mode,
            credentials: request.credentials,
            cache: request.cache,
            redirect: request.redirect,
            referrer: request.referrer.clone(),
            integrity: request.integrity.clone(),
        })
    }

    /// Rebuild the live request. Inverse of [`RequestData::from_request`].
    pub fn to_request(&self) -> Result<HttpRequest, RequestError> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| RequestError::InvalidMethod(self.method.clone()))?;
        let url = Url::parse(&self.url)
            .map_err(|err| RequestError::InvalidUrl(format!("{}: {err}", self.url)))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RequestError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                RequestError::InvalidHeader(format!("stored value of '{name}' is unusable"))
            })?;
            headers.append(name, value);
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body: self.body.clone().map(Bytes::from),
            mode: self.mode,
            credentials: self.credentials,
            cache: self.cache,
            redirect: self.redirect,
            referrer: self.referrer.clone(),
            integrity: self.integrity.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let request = HttpRequest {
            method: Method::PUT,
            url: url("https://api.example.com/v1/items?dedupe=1"),
            headers: HeaderMap::new(),
            body: Some(Bytes::from_static(b"{\"n\":1}")),
            mode: RequestMode::SameOrigin,
            credentials: CredentialsMode::Include,
            cache: CacheMode::NoStore,
            redirect: RedirectMode::Manual,
            referrer: "https://example.com/app".to_string(),
            integrity: "sha256-abc123".to_string(),
        }
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(header::ACCEPT, HeaderValue::from_static("application/json"))
        .header(header::ACCEPT, HeaderValue::from_static("text/plain"));

        let data = RequestData::from_request(&request).unwrap();
        let rebuilt = data.to_request().unwrap();
        assert_eq!(rebuilt, request);
    }

    #[test]
    fn round_trip_without_body() {
        let request = HttpRequest::get(url("http://example.com/ping"))
            .header(header::USER_AGENT, HeaderValue::from_static("backsync"));
        let data = RequestData::from_request(&request).unwrap();
        assert!(data.body.is_none());
        assert_eq!(data.to_request().unwrap(), request);
    }

    #[test]
    fn body_on_get_or_head_is_rejected() {
        let get = HttpRequest::get(url("http://example.com/")).body(&b"x"[..]);
        assert!(matches!(
            RequestData::from_request(&get),
            Err(RequestError::BodyNotAllowed(_))
        ));

        let head = HttpRequest::new(Method::HEAD, url("http://example.com/")).body(&b"x"[..]);
        assert!(matches!(
            RequestData::from_request(&head),
            Err(RequestError::BodyNotAllowed(_))
        ));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let request = HttpRequest::get(url("file:///etc/passwd"));
        assert!(matches!(
            RequestData::from_request(&request),
            Err(RequestError::InvalidUrl(_))
        ));
    }

    #[test]
    fn non_utf8_header_value_is_rejected() {
        let request = HttpRequest::get(url("http://example.com/")).header(
            HeaderName::from_static("x-binary"),
            HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap(),
        );
        assert!(matches!(
            RequestData::from_request(&request),
            Err(RequestError::InvalidHeader(_))
        ));
    }

    #[test]
    fn stored_garbage_is_rejected_on_rebuild() {
        let mut data =
            RequestData::from_request(&HttpRequest::get(url("http://example.com/"))).unwrap();

        data.method = "NOT A METHOD".into();
        assert!(matches!(
            data.to_request(),
            Err(RequestError::InvalidMethod(_))
        ));

        data.method = "GET".into();
        data.url = "not a url".into();
        assert!(matches!(data.to_request(), Err(RequestError::InvalidUrl(_))));

        data.url = "http://example.com/".into();
        data.headers = vec![("bad header name".into(), "v".into())];
        assert!(matches!(
            data.to_request(),
            Err(RequestError::InvalidHeader(_))
        ));
    }

    #[test]
    fn modes_serialize_as_fetch_strings() {
        let request = HttpRequest {
            mode: RequestMode::NoCors,
            cache: CacheMode::OnlyIfCached,
            credentials: CredentialsMode::Omit,
            redirect: RedirectMode::Error,
            ..HttpRequest::get(url("http://example.com/"))
        };
        let value =
            serde_json::to_value(RequestData::from_request(&request).unwrap()).unwrap();
        assert_eq!(value["mode"], "no-cors");
        assert_eq!(value["cache"], "only-if-cached");
        assert_eq!(value["credentials"], "omit");
        assert_eq!(value["redirect"], "error");
        assert_eq!(value["referrer"], DEFAULT_REFERRER);
    }

    #[test]
    fn to_reqwest_carries_method_url_headers_and_body() {
        let request = HttpRequest::post(url("http://example.com/submit"))
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .body(&b"payload"[..]);

        let sent = request.to_reqwest();
        assert_eq!(sent.method(), &Method::POST);
        assert_eq!(sent.url().as_str(), "http://example.com/submit");
        assert_eq!(
            sent.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(sent.body().unwrap().as_bytes(), Some(&b"payload"[..]));

        // Building twice never consumes anything
        let again = request.to_reqwest();
        assert_eq!(again.body().unwrap().as_bytes(), Some(&b"payload"[..]));
    }
}
