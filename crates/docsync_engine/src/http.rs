//! HTTP client abstraction.
//!
//! The engine never talks to a socket directly. Token exchange and document
//! writes are expressed as [`HttpRequest`] values handed to an
//! [`HttpClient`], so the platform's HTTP stack (or a mock) can be plugged
//! in.

use crate::error::HttpError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// `Authorization` header name.
pub const AUTHORIZATION: &str = "Authorization";
/// `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";
/// JSON content type.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// POST.
    Post,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body, if any.
    pub body: Option<String>,
    /// Timeout hint for the client.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a request with no headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a bearer `Authorization` header.
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(self, body: impl Into<String>) -> Self {
        let mut request = self.header(CONTENT_TYPE, APPLICATION_JSON);
        request.body = Some(body.into());
        request
    }

    /// Sets the timeout hint.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a header value.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A response as returned by the server, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into [`HttpError::Status`].
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                status: self.status,
                message: self.body,
            })
        }
    }
}

/// Trait for HTTP clients used by the engine.
///
/// Implementations block until a response arrives or the request fails.
/// A server answer of any status is `Ok`; `Err` is reserved for failures
/// that produced no response.
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    fn call(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn call(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).call(request)
    }
}

#[derive(Debug)]
struct Route {
    method: Method,
    url_fragment: String,
    outcome: Result<HttpResponse, HttpError>,
}

/// A scripted HTTP client for testing.
///
/// Routes match on method and a URL substring. The most recently added
/// matching route wins. Every request is recorded, routed or not.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    /// Creates a client with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome for requests matching `method` and `url_fragment`.
    pub fn respond(
        &self,
        method: Method,
        url_fragment: impl Into<String>,
        outcome: Result<HttpResponse, HttpError>,
    ) {
        self.routes.lock().push(Route {
            method,
            url_fragment: url_fragment.into(),
            outcome,
        });
    }

    /// Scripts a response with the given status and body.
    pub fn respond_with(
        &self,
        method: Method,
        url_fragment: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) {
        self.respond(method, url_fragment, Ok(HttpResponse::new(status, body)));
    }

    /// Scripts a failure without a response.
    pub fn fail_with(&self, method: Method, url_fragment: impl Into<String>, error: HttpError) {
        self.respond(method, url_fragment, Err(error));
    }

    /// Returns all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the recorded requests whose URL contains `url_fragment`.
    pub fn requests_to(&self, url_fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(url_fragment))
            .cloned()
            .collect()
    }

    /// Returns the number of recorded requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl HttpClient for MockHttpClient {
    fn call(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let outcome = self
            .routes
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == request.method && request.url.contains(&r.url_fragment))
            .map(|r| r.outcome.clone());

        let description = format!("{} {}", request.method, request.url);
        self.requests.lock().push(request);

        outcome.unwrap_or_else(|| Err(HttpError::Network(format!("no route for {description}"))))
    }
}
