//! Bounded HTTP(S) transport (C1), registry credential resolution (C2),
//! and `WWW-Authenticate` negotiation (C3) for the `devcontainer-features`
//! workspace.

mod auth;
mod client;
mod credentials;

pub use auth::{AuthKey, AuthNegotiator};
pub use client::{HttpResponse, HttpTransport};
pub use credentials::{resolve_credentials, BasicCredentials};

pub use devcontainer_features_common::{Error, Result};
