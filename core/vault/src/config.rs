//! Vault configuration and its validation.

use serde::{Deserialize, Serialize};

use edvault_common::{Error, KeyReference, Result};

/// One identity or a set of identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authorities {
    One(String),
    Many(Vec<String>),
}

impl Authorities {
    pub fn contains(&self, identity: &str) -> bool {
        match self {
            Authorities::One(one) => one == identity,
            Authorities::Many(many) => many.iter().any(|id| id == identity),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Authorities::One(one) => one.is_empty(),
            Authorities::Many(many) => many.is_empty() || many.iter().any(String::is_empty),
        }
    }
}

/// Stored configuration of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// URL of the vault, `{base_uri}/edvs/{localId}`.
    pub id: String,
    pub sequence: u64,
    pub controller: String,
    pub invoker: Authorities,
    pub delegator: Authorities,
    pub key_agreement_key: KeyReference,
    pub hmac: KeyReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl VaultConfig {
    /// Whether `identity` may read and write documents in this vault.
    pub fn allows_invoker(&self, identity: &str) -> bool {
        self.controller == identity || self.invoker.contains(identity)
    }
}

/// Configuration body as submitted by a client.
///
/// Every field is optional at the wire level so that a missing field is
/// reported as a validation error instead of a body parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub sequence: u64,
    pub controller: Option<String>,
    pub invoker: Option<Authorities>,
    pub delegator: Option<Authorities>,
    pub key_agreement_key: Option<KeyReference>,
    pub hmac: Option<KeyReference>,
    pub reference_id: Option<String>,
}

fn check_key(name: &str, key: Option<KeyReference>) -> Result<KeyReference> {
    let key = key.ok_or_else(|| Error::Validation(format!("{name} is required")))?;
    if key.id.is_empty() || key.key_type.is_empty() {
        return Err(Error::Validation(format!("{name} requires id and type")));
    }
    Ok(key)
}

impl VaultConfigRequest {
    /// Validate the body and build the configuration it describes.
    ///
    /// `invoker` and `delegator` default to the controller. The returned
    /// config carries `id` as submitted (possibly empty); the manager decides
    /// whether that is acceptable.
    ///
    /// # Errors
    /// - `Error::Validation` if controller, keyAgreementKey or hmac is
    ///   missing or empty, or an authority set is empty
    pub fn into_config(self) -> Result<VaultConfig> {
        let controller = self
            .controller
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Validation("controller is required".to_string()))?;
        let key_agreement_key = check_key("keyAgreementKey", self.key_agreement_key)?;
        let hmac = check_key("hmac", self.hmac)?;

        let invoker = self
            .invoker
            .unwrap_or_else(|| Authorities::One(controller.clone()));
        let delegator = self
            .delegator
            .unwrap_or_else(|| Authorities::One(controller.clone()));
        if invoker.is_empty() || delegator.is_empty() {
            return Err(Error::Validation(
                "invoker and delegator cannot be empty".to_string(),
            ));
        }
        if matches!(&self.reference_id, Some(r) if r.is_empty()) {
            return Err(Error::Validation("referenceId cannot be empty".to_string()));
        }

        Ok(VaultConfig {
            id: self.id.unwrap_or_default(),
            sequence: self.sequence,
            controller,
            invoker,
            delegator,
            key_agreement_key,
            hmac,
            reference_id: self.reference_id,
        })
    }
}

/// Path segment under which vaults are addressed.
pub const EDVS_PATH: &str = "edvs";
