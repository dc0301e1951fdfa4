//! C3: negotiates `WWW-Authenticate` challenges (Basic or Bearer),
//! caching the resulting `Authorization` header per registry + scope.
//!
//! The cache is `Arc<RwLock<HashMap<AuthKey, HeaderValue>>>`, grounded on
//! `wasm_pkg_common::oci::Oci`'s `registry_auth: Arc<RwLock<HashMap<AuthKey,
//! RegistryAuth>>>` and its read-lock-first-then-maybe-write-lock pattern.
//! Unlike `wasm_pkg_common::oci::Oci` (which keys by pull/push
//! `RegistryOperation` because `oci-client` bakes scope into the
//! operation), this negotiator keys by registry host **and** the
//! negotiated `scope` string, since a single registry may require
//! distinct bearer scopes for different repositories.

use std::collections::HashMap;
use std::sync::Arc;

use devcontainer_features_common::{Error, Result};
use http::{HeaderMap, HeaderValue, Method};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;

use crate::client::HttpTransport;
use crate::credentials::{resolve_credentials, BasicCredentials};

static REALM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"realm="([^"]+)""#).unwrap());
static SERVICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"service="([^"]+)""#).unwrap());
static SCOPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"scope="([^"]+)""#).unwrap());

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthKey {
    registry: String,
    scope: String,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Negotiates and caches registry `Authorization` headers.
pub struct AuthNegotiator {
    cache: Arc<RwLock<HashMap<AuthKey, HeaderValue>>>,
}

impl AuthNegotiator {
    pub fn new() -> Self {
        Self {
            cache: Arc::default(),
        }
    }

    /// Sends `req` (already built, minus `Authorization`), applying any
    /// cached header first and negotiating a fresh one on a 401 challenge.
    pub async fn authenticated_request(
        &self,
        transport: &HttpTransport,
        registry_host: &str,
        method: Method,
        url: &str,
        mut headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<crate::client::HttpResponse> {
        let cache_key = AuthKey {
            registry: registry_host.to_string(),
            scope: String::new(),
        };
        if let Some(cached) = self.cached_for_prefix(registry_host).await {
            headers.insert(http::header::AUTHORIZATION, cached);
        }

        let response = transport
            .request(method.clone(), url, headers.clone(), body.clone())
            .await?;
        if response.status != 401 {
            return Ok(response);
        }

        let challenge = response
            .header("www-authenticate")
            .ok_or_else(|| Error::AuthMissingChallenge {
                registry: registry_host.to_string(),
            })?
            .to_string();

        let auth_header = self
            .negotiate(transport, registry_host, &challenge)
            .await?;

        let key = AuthKey {
            scope: SCOPE_RE
                .captures(&challenge)
                .map(|c| c[1].to_string())
                .unwrap_or_default(),
            ..cache_key
        };
        self.cache.write().await.insert(key, auth_header.clone());

        headers.insert(http::header::AUTHORIZATION, auth_header);
        let retried = transport.request(method, url, headers, body).await?;
        Ok(retried)
    }

    async fn cached_for_prefix(&self, registry_host: &str) -> Option<HeaderValue> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .find(|(key, _)| key.registry == registry_host)
            .map(|(_, value)| value.clone())
    }

    async fn negotiate(
        &self,
        transport: &HttpTransport,
        registry_host: &str,
        challenge: &str,
    ) -> Result<HeaderValue> {
        let scheme = challenge
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let credentials = resolve_credentials(registry_host);

        match scheme.as_str() {
            "bearer" => self.negotiate_bearer(transport, registry_host, challenge, credentials).await,
            "basic" => {
                let BasicCredentials { username, password } =
                    credentials.ok_or_else(|| Error::AuthFetchFailed {
                        registry: registry_host.to_string(),
                        reason: "basic auth requested but no credentials are configured".into(),
                    })?;
                basic_header(&username, secrecy::ExposeSecret::expose_secret(&password))
            }
            other => Err(Error::AuthUnsupported {
                registry: registry_host.to_string(),
                scheme: other.to_string(),
            }),
        }
    }

    async fn negotiate_bearer(
        &self,
        transport: &HttpTransport,
        registry_host: &str,
        challenge: &str,
        credentials: Option<BasicCredentials>,
    ) -> Result<HeaderValue> {
        let realm = REALM_RE
            .captures(challenge)
            .map(|c| c[1].to_string())
            .ok_or_else(|| Error::AuthFetchFailed {
                registry: registry_host.to_string(),
                reason: "bearer challenge missing realm".into(),
            })?;
        let service = SERVICE_RE.captures(challenge).map(|c| c[1].to_string());
        let scope = SCOPE_RE.captures(challenge).map(|c| c[1].to_string());

        let mut url = realm;
        let mut query = Vec::new();
        if let Some(service) = &service {
            query.push(format!("service={service}"));
        }
        if let Some(scope) = &scope {
            query.push(format!("scope={scope}"));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        let mut headers = HeaderMap::new();
        if let Some(BasicCredentials { username, password }) = credentials {
            headers.insert(
                http::header::AUTHORIZATION,
                basic_header(&username, secrecy::ExposeSecret::expose_secret(&password))?,
            );
        }

        let response = transport
            .request(Method::GET, &url, headers, None)
            .await
            .map_err(|e| Error::AuthFetchFailed {
                registry: registry_host.to_string(),
                reason: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(Error::AuthFetchFailed {
                registry: registry_host.to_string(),
                reason: format!("token endpoint returned status {}", response.status),
            });
        }
        let parsed: TokenResponse =
            serde_json::from_slice(&response.body).map_err(|e| Error::AuthFetchFailed {
                registry: registry_host.to_string(),
                reason: format!("invalid token response: {e}"),
            })?;
        let token = parsed.token.or(parsed.access_token).ok_or_else(|| Error::AuthFetchFailed {
            registry: registry_host.to_string(),
            reason: "token response contained neither `token` nor `access_token`".into(),
        })?;
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| Error::AuthFetchFailed {
            registry: registry_host.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for AuthNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

fn basic_header(username: &str, password: &str) -> Result<HeaderValue> {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|e| Error::Other(e.to_string()))
}
