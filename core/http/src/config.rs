//! Server configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::auth::{AuthResolver, FixedIdentityResolver, HeaderIdentityResolver};
use edvault_common::{Error, Result};

/// Default maximum request body size (16MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Default header carrying the caller identity.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-edv-controller";

/// Configuration of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Public base URI; vault ids are `{base_uri}/edvs/{localId}`.
    pub base_uri: String,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Header the caller identity is read from.
    pub identity_header: String,
    /// Resolve every request to this identity instead of reading a header.
    pub fixed_identity: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let bind = SocketAddr::from(([127, 0, 0, 1], 9443));
        Self {
            bind,
            base_uri: format!("http://{bind}"),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            fixed_identity: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Check the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_size == 0 {
            return Err(Error::Validation("max_body_size must be positive".to_string()));
        }
        if self.identity_header.is_empty() {
            return Err(Error::Validation("identity_header cannot be empty".to_string()));
        }
        if self.base_uri.is_empty() || self.base_uri.ends_with('/') {
            return Err(Error::Validation(
                "base_uri must be non-empty without a trailing slash".to_string(),
            ));
        }
        if matches!(&self.fixed_identity, Some(id) if id.is_empty()) {
            return Err(Error::Validation("fixed_identity cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Build the identity resolver this configuration selects.
    pub fn resolver(&self) -> Result<Arc<dyn AuthResolver>> {
        match &self.fixed_identity {
            Some(identity) => Ok(Arc::new(FixedIdentityResolver::new(identity.clone()))),
            None => Ok(Arc::new(HeaderIdentityResolver::new(&self.identity_header)?)),
        }
    }
}
