//! A registry host identifier.
//!
//! Grounded on `wasm-pkg-common::registry::Registry`: a thin wrapper
//! around `http::uri::Authority` so registry hosts get `Host`-grade
//! validation for free.

use http::uri::Authority;

use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Registry(Authority);

impl Registry {
    pub fn host(&self) -> &str {
        self.0.host()
    }

    pub fn port(&self) -> Option<u16> {
        self.0.port_u16()
    }

    /// A host is "reachable" per §4.4 if it contains a dot, or begins
    /// with `localhost` (allowing `localhost:5000` style dev registries).
    pub fn looks_reachable(&self) -> bool {
        self.host().contains('.') || self.host().starts_with("localhost")
    }

    /// docker.io substitutes distinct auth/registry endpoints.
    pub fn auth_host(&self) -> &str {
        if self.host() == "docker.io" {
            "auth.docker.io"
        } else {
            self.host()
        }
    }

    pub fn registry_host(&self) -> &str {
        if self.host() == "docker.io" {
            "registry.docker.io"
        } else {
            self.host()
        }
    }
}

impl AsRef<str> for Registry {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Registry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse().map_err(|_| Error::IdentifierInvalid {
            identifier: s.to_string(),
            reason: "not a valid registry host".into(),
        })?))
    }
}

impl TryFrom<String> for Registry {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_io_substitution() {
        let reg: Registry = "docker.io".parse().unwrap();
        assert_eq!(reg.auth_host(), "auth.docker.io");
        assert_eq!(reg.registry_host(), "registry.docker.io");
    }

    #[test]
    fn localhost_is_reachable() {
        let reg: Registry = "localhost:5000".parse().unwrap();
        assert!(reg.looks_reachable());
    }

    #[test]
    fn single_label_host_is_unreachable() {
        let reg: Registry = "myregistry".parse().unwrap();
        assert!(!reg.looks_reachable());
    }
}
