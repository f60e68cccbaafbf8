//! Caller identity resolution.
//!
//! Authentication itself happens outside this service. A resolver only maps
//! an already-authenticated request to the identity it acts for; it is
//! injected into the router state rather than installed globally.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};

use crate::error::ApiError;
use crate::AppState;
use edvault_common::{Error, Result};

/// Resolves the identity a request acts for.
pub trait AuthResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<String>;
}

/// Reads the identity from a request header set by an upstream proxy.
pub struct HeaderIdentityResolver {
    header: HeaderName,
}

impl HeaderIdentityResolver {
    /// # Errors
    /// - `Error::Validation` if `header` is not a valid header name
    pub fn new(header: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| Error::Validation(format!("Invalid identity header '{header}': {e}")))?;
        Ok(Self { header })
    }
}

impl AuthResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<String> {
        let value = headers.get(&self.header).ok_or_else(|| {
            Error::PermissionDenied(format!("Missing {} header", self.header))
        })?;
        let identity = value
            .to_str()
            .map_err(|_| Error::PermissionDenied(format!("Unreadable {} header", self.header)))?
            .trim();
        if identity.is_empty() {
            return Err(Error::PermissionDenied(format!("Empty {} header", self.header)));
        }
        Ok(identity.to_string())
    }
}

/// Resolves every request to one identity. For development and tests.
pub struct FixedIdentityResolver {
    identity: String,
}

impl FixedIdentityResolver {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl AuthResolver for FixedIdentityResolver {
    fn resolve(&self, _headers: &HeaderMap) -> Result<String> {
        Ok(self.identity.clone())
    }
}

/// Identity of the caller, as resolved by the state's [`AuthResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl Caller {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Caller(state.auth.resolve(&parts.headers)?))
    }
}
