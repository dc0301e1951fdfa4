//! C1: a bounded HTTP(S) client wrapping [`reqwest::Client`].

use std::time::Duration;

use devcontainer_features_common::{Error, Result};
use reqwest::{Method, Url};

const USER_AGENT: &str = "devcontainer";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A response read fully into memory.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: http::HeaderMap,
    pub body: bytes::Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Wraps two `reqwest::Client`s so GET/HEAD follow redirects (for manifest
/// and tag-list fetches served from a CDN) while PUT does not (a PUT
/// blob-upload `Location` must be surfaced unchanged to the caller, never
/// silently followed).
pub struct HttpTransport {
    following: reqwest::Client,
    non_following: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let following = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        let non_following = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            following,
            non_following,
        })
    }

    /// Issues a request, following redirects for every method except `PUT`.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: http::HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let url = Url::parse(url)
            .map_err(|e| Error::Other(format!("invalid request URL `{url}`: {e}")))?;
        let client = if method == Method::PUT {
            &self.non_following
        } else {
            &self.following
        };
        let mut builder = client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| Error::RegistryError {
            registry: url.host_str().unwrap_or_default().to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| Error::RegistryError {
            registry: url.host_str().unwrap_or_default().to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;
        tracing::debug!(%method, %url, status, "http request completed");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// A HEAD request, returning only the status code.
    pub async fn head(&self, url: &str, headers: http::HeaderMap) -> Result<u16> {
        Ok(self.request(Method::HEAD, url, headers, None).await?.status)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new().expect("default HTTP client configuration is always valid")
    }
}
