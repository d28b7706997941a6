use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{ConnectionError, Error, Result, StdResult};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Method(reqwest::Method);

impl Method {
    pub const GET: Method = Method(reqwest::Method::GET);
    pub const POST: Method = Method(reqwest::Method::POST);
    pub const PUT: Method = Method(reqwest::Method::PUT);
    pub const DELETE: Method = Method(reqwest::Method::DELETE);
    pub const HEAD: Method = Method(reqwest::Method::HEAD);
    pub const PATCH: Method = Method(reqwest::Method::PATCH);

    pub fn from_bytes(s: &[u8]) -> StdResult<Self, ConnectionError> {
        reqwest::Method::from_bytes(s)
            .map(Method)
            .map_err(|_| ConnectionError::InvalidMethod(format!("{:?}", s)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub(self) fn into_inner(self) -> reqwest::Method {
        self.0
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for Method {
    fn serialize<S>(&self, serializer: S) -> StdResult<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D>(deserializer: D) -> StdResult<Method, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Method::from_bytes(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// A blocking HTTP request, configured builder-style and executed with
/// [`HttpRequest::execute`]. The same request may be executed any number of
/// times; each execution reads the configuration as it stands at that moment
/// and opens its own connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    url: String,
    #[serde(default)]
    method: Method,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default = "default_user_agent")]
    user_agent: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            user_agent: default_user_agent(),
        }
    }

    /// Replaces the outbound `User-Agent`. No validation is applied.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a request header. Calling again with the same name overwrites
    /// the previous value.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Performs the request and blocks until the full response body has been
    /// read. Returns either a complete [`HttpResponse`] or an [`Error`];
    /// there is no partial result.
    pub fn execute(&self) -> Result<HttpResponse> {
        Executor { request: self }.execute()
    }
}

/// An immutable HTTP response: status code, full body, and a normalized
/// key-to-single-value view of the response headers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status_code: u16,
    body: Bytes,
    headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Header keys are stored as the platform reports them (lowercase).
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Case-insensitive single-header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

struct Executor<'a> {
    request: &'a HttpRequest,
}

impl Executor<'_> {
    #[instrument(skip(self), fields(method = self.request.method.as_str(), url = %self.request.url))]
    fn execute(self) -> Result<HttpResponse> {
        let url = url::Url::parse(&self.request.url)
            .map_err(|e| ConnectionError::InvalidUrl(format!("{} for {}", e, self.request.url)))?;

        // One client per execution; dropping it at the end of this scope
        // releases the connection on every exit path.
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(ConnectionError::from)?;

        let response = client
            .request(self.request.method.clone().into_inner(), url)
            .headers(self.collect_request_headers()?)
            .send()
            .map_err(ConnectionError::from)?;

        let status_code = response.status().as_u16();
        let headers = process_response_headers(response.headers());
        let body = response.bytes().map_err(Error::Io)?;
        debug!(status_code, body_len = body.len(), "exchange finished");

        Ok(HttpResponse {
            status_code,
            body,
            headers,
        })
    }

    /// The configured user-agent goes in first so that a caller-added
    /// "User-Agent" header replaces it.
    fn collect_request_headers(&self) -> StdResult<HeaderMap, ConnectionError> {
        let mut collected = HeaderMap::new();
        collected.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(&self.request.user_agent)
                .map_err(|e| ConnectionError::InvalidHeader(e.to_string()))?,
        );
        for (name, value) in &self.request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConnectionError::InvalidHeader(format!("{} in {:?}", e, name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConnectionError::InvalidHeader(e.to_string()))?;
            collected.insert(name, value);
        }
        Ok(collected)
    }
}

fn process_response_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut processed = HashMap::new();
    'keys: for name in headers.keys() {
        // Multi-valued keys collapse by plain concatenation, without a
        // delimiter. A key with any non-decodable value is skipped entirely.
        let mut joined = String::new();
        for value in headers.get_all(name) {
            match value.to_str() {
                Ok(text) => joined.push_str(text),
                Err(_) => continue 'keys,
            }
        }
        processed.insert(name.as_str().to_string(), joined);
    }
    processed
}
