//! C2: resolves registry credentials from the environment and the user's
//! docker credentials file, per the resolution order:
//!
//! 1. `ghcr.io` + non-empty `GITHUB_TOKEN` → `("USERNAME", GITHUB_TOKEN)`.
//! 2. `DEVCONTAINERS_OCI_AUTH=host|user|token(,host|user|token)*`.
//! 3. `$HOME/.docker/config.json` `auths[registry].auth` (base64 `user:token`).
//!
//! Modeled on `wasm-pkg-common::config::oci::BasicCredentials`, using
//! `secrecy` so the password never leaks into `Debug` output.

use base64::Engine;
use secrecy::SecretString;
use serde::Deserialize;

/// Resolved username/password pair for a single registry.
#[derive(Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: std::collections::HashMap<String, DockerAuthEntry>,
}

#[derive(Deserialize)]
struct DockerAuthEntry {
    auth: Option<String>,
}

/// Resolves credentials for `registry_host` following the §4.2 order.
/// Returns `None` ("anonymous") if no source matches.
pub fn resolve_credentials(registry_host: &str) -> Option<BasicCredentials> {
    if registry_host == "ghcr.io" {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                return Some(BasicCredentials {
                    username: "USERNAME".to_string(),
                    password: token.into(),
                });
            }
        }
    }

    if let Some(creds) = from_devcontainers_oci_auth(registry_host) {
        return Some(creds);
    }

    from_docker_config(registry_host)
}

fn from_devcontainers_oci_auth(registry_host: &str) -> Option<BasicCredentials> {
    let raw = std::env::var("DEVCONTAINERS_OCI_AUTH").ok()?;
    for entry in raw.split(',') {
        let mut parts = entry.splitn(3, '|');
        let host = parts.next()?;
        let user = parts.next()?;
        let token = parts.next()?;
        if host == registry_host {
            return Some(BasicCredentials {
                username: user.to_string(),
                password: token.to_string().into(),
            });
        }
    }
    None
}

fn from_docker_config(registry_host: &str) -> Option<BasicCredentials> {
    let home = dirs::home_dir()?;
    let path = home.join(".docker").join("config.json");
    let contents = std::fs::read_to_string(path).ok()?;
    let config: DockerConfig = serde_json::from_str(&contents).ok()?;
    let entry = config.auths.get(registry_host)?;
    let auth = entry.auth.as_ref()?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(auth).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string().into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghcr_picks_up_github_token() {
        std::env::set_var("GITHUB_TOKEN", "gh-token-value");
        let creds = resolve_credentials("ghcr.io").unwrap();
        assert_eq!(creds.username, "USERNAME");
        std::env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn devcontainers_oci_auth_matches_host() {
        std::env::remove_var("GITHUB_TOKEN");
        std::env::set_var(
            "DEVCONTAINERS_OCI_AUTH",
            "example.com|alice|s3cr3t,other.com|bob|t0ken",
        );
        let creds = resolve_credentials("other.com").unwrap();
        assert_eq!(creds.username, "bob");
        std::env::remove_var("DEVCONTAINERS_OCI_AUTH");
    }

    #[test]
    fn unknown_host_without_sources_is_anonymous() {
        std::env::remove_var("GITHUB_TOKEN");
        std::env::remove_var("DEVCONTAINERS_OCI_AUTH");
        assert!(resolve_credentials("totally-unconfigured.example").is_none());
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = BasicCredentials {
            username: "alice".to_string(),
            password: "hunter2".to_string().into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
    }
}
