//! Vault manager for creating and looking up vault configurations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{VaultConfig, VaultConfigRequest, EDVS_PATH};
use edvault_common::{EdvId, Error, Result};
use edvault_storage::DocumentStorage;

/// Vault manager owning every vault configuration.
///
/// Creating a vault also opens its partition in the document storage, so a
/// vault id the manager hands out is always usable for documents.
pub struct VaultManager {
    base_uri: String,
    storage: Arc<dyn DocumentStorage>,
    configs: RwLock<HashMap<EdvId, VaultConfig>>,
}

impl VaultManager {
    /// Create a manager that addresses vaults under `base_uri`.
    pub fn new(base_uri: impl Into<String>, storage: Arc<dyn DocumentStorage>) -> Self {
        Self {
            base_uri: base_uri.into(),
            storage,
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Get the document storage vaults are opened in.
    pub fn storage(&self) -> Arc<dyn DocumentStorage> {
        self.storage.clone()
    }

    /// URL of a vault.
    pub fn vault_url(&self, id: &EdvId) -> String {
        format!("{}/{}/{}", self.base_uri, EDVS_PATH, id)
    }

    /// Create a new vault.
    ///
    /// # Preconditions
    /// - `request.controller` is the caller
    /// - `request.sequence` is 0 and `request.id` is absent
    ///
    /// # Postconditions
    /// - Config is stored under a freshly generated id
    /// - The vault's document partition is open
    ///
    /// # Errors
    /// - `PermissionDenied` if the controller is not the caller
    /// - `Validation` if required fields are missing or server fields are set
    /// - `Duplicate` if the controller already has a vault with this referenceId
    pub async fn create_vault(
        &self,
        request: VaultConfigRequest,
        caller: &str,
    ) -> Result<VaultConfig> {
        let mut config = request.into_config()?;

        if !config.id.is_empty() {
            return Err(Error::Validation(
                "Vault id is assigned by the server".to_string(),
            ));
        }
        if config.sequence != 0 {
            return Err(Error::Validation(format!(
                "New vault must have sequence 0, got {}",
                config.sequence
            )));
        }
        if config.controller != caller {
            warn!(controller = %config.controller, caller, "Vault creation for another controller");
            return Err(Error::PermissionDenied(
                "Controller must match the authenticated caller".to_string(),
            ));
        }

        let mut configs = self.configs.write().await;
        Self::check_reference_id(&configs, &config, None)?;

        let id = EdvId::generate();
        config.id = self.vault_url(&id);
        self.storage.open_vault(&id, config.hmac.clone()).await?;
        configs.insert(id.clone(), config.clone());

        info!(vault = %id, controller = %config.controller, "Vault created");
        Ok(config)
    }

    fn check_reference_id(
        configs: &HashMap<EdvId, VaultConfig>,
        config: &VaultConfig,
        own_id: Option<&EdvId>,
    ) -> Result<()> {
        let Some(reference_id) = &config.reference_id else {
            return Ok(());
        };
        let taken = configs.iter().any(|(id, existing)| {
            Some(id) != own_id
                && existing.controller == config.controller
                && existing.reference_id.as_ref() == Some(reference_id)
        });
        if taken {
            return Err(Error::Duplicate(format!(
                "Vault with referenceId '{reference_id}' already exists for this controller"
            )));
        }
        Ok(())
    }

    /// Get a vault configuration.
    ///
    /// # Errors
    /// - `NotFound` if the vault does not exist
    pub async fn get_vault(&self, id: &EdvId) -> Result<VaultConfig> {
        self.configs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Vault not found: {id}")))
    }

    /// Replace a vault configuration.
    ///
    /// # Preconditions
    /// - Caller is the stored controller
    /// - `request.sequence` is the stored sequence + 1
    ///
    /// # Errors
    /// - `NotFound` if the vault does not exist
    /// - `PermissionDenied` if the caller is not the controller
    /// - `Validation` if `id` or `controller` would change
    /// - `InvalidState` on sequence mismatch
    /// - `Duplicate` if the new referenceId is taken
    pub async fn update_vault(
        &self,
        id: &EdvId,
        request: VaultConfigRequest,
        caller: &str,
    ) -> Result<VaultConfig> {
        let config = request.into_config()?;

        let mut configs = self.configs.write().await;
        let current = configs
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Vault not found: {id}")))?;

        if current.controller != caller {
            return Err(Error::PermissionDenied(
                "Only the controller may update a vault".to_string(),
            ));
        }
        if config.id != current.id {
            return Err(Error::Validation("Vault id cannot change".to_string()));
        }
        if config.controller != current.controller {
            return Err(Error::Validation("Vault controller cannot change".to_string()));
        }
        if current.sequence.checked_add(1) != Some(config.sequence) {
            return Err(Error::InvalidState(format!(
                "Sequence mismatch for vault {id}: expected {}, got {}",
                current.sequence.saturating_add(1),
                config.sequence
            )));
        }
        Self::check_reference_id(&configs, &config, Some(id))?;

        if config.hmac != current.hmac {
            self.storage.open_vault(id, config.hmac.clone()).await?;
        }
        configs.insert(id.clone(), config.clone());

        info!(vault = %id, sequence = config.sequence, "Vault config updated");
        Ok(config)
    }

    /// List the caller's vaults, optionally narrowed to one referenceId.
    ///
    /// # Errors
    /// - `PermissionDenied` if `controller` is not the caller
    pub async fn find_vaults(
        &self,
        controller: &str,
        reference_id: Option<&str>,
        caller: &str,
    ) -> Result<Vec<VaultConfig>> {
        if controller != caller {
            return Err(Error::PermissionDenied(
                "Cannot list vaults of another controller".to_string(),
            ));
        }

        let configs = self.configs.read().await;
        let mut found: Vec<VaultConfig> = configs
            .values()
            .filter(|c| c.controller == controller)
            .filter(|c| reference_id.is_none() || c.reference_id.as_deref() == reference_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(controller, matches = found.len(), "Vault lookup");
        Ok(found)
    }

    /// Check that `caller` may use the documents of a vault.
    ///
    /// # Errors
    /// - `NotFound` if the vault does not exist
    /// - `PermissionDenied` if the caller is neither controller nor invoker
    pub async fn authorize_invoker(&self, id: &EdvId, caller: &str) -> Result<VaultConfig> {
        let config = self.get_vault(id).await?;
        if !config.allows_invoker(caller) {
            warn!(vault = %id, caller, "Caller is not an invoker of the vault");
            return Err(Error::PermissionDenied(format!(
                "Caller may not invoke vault {id}"
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edvault_common::{Document, DocumentId, ErrorKind};
    use edvault_storage::MemoryDocumentStore;
    use serde_json::json;

    const ALPHA: &str = "did:example:alpha";

    fn manager() -> VaultManager {
        VaultManager::new("https://edv.example", Arc::new(MemoryDocumentStore::new()))
    }

    fn request(controller: &str) -> VaultConfigRequest {
        serde_json::from_value(json!({
            "sequence": 0,
            "controller": controller,
            "invoker": controller,
            "delegator": controller,
            "keyAgreementKey": {"id": "urn:kak:1", "type": "X25519KeyAgreementKey2019"},
            "hmac": {"id": "urn:hmac:1", "type": "Sha256HmacKey2019"}
        }))
        .unwrap()
    }

    fn local_id(config: &VaultConfig) -> EdvId {
        EdvId::parse(config.id.rsplit('/').next().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_create_vault() {
        let manager = manager();
        let config = manager.create_vault(request(ALPHA), ALPHA).await.unwrap();

        assert!(config.id.starts_with("https://edv.example/edvs/z"));
        assert_eq!(config.sequence, 0);
        assert_eq!(config.controller, ALPHA);
        assert_eq!(config.hmac.id, "urn:hmac:1");

        let fetched = manager.get_vault(&local_id(&config)).await.unwrap();
        assert_eq!(fetched, config);
    }

    #[tokio::test]
    async fn test_created_vault_accepts_documents() {
        let manager = manager();
        let config = manager.create_vault(request(ALPHA), ALPHA).await.unwrap();

        let doc = Document {
            id: DocumentId::generate(),
            sequence: 0,
            indexed: Vec::new(),
            content: json!({}),
        };
        manager
            .storage()
            .insert(&local_id(&config), doc)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_for_other_controller_denied() {
        let manager = manager();
        let err = manager
            .create_vault(request("urn:other:account"), ALPHA)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_create_rejects_server_fields() {
        let manager = manager();

        let mut with_sequence = request(ALPHA);
        with_sequence.sequence = 1;
        let err = manager.create_vault(with_sequence, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut with_id = request(ALPHA);
        with_id.id = Some("https://edv.example/edvs/zabc".to_string());
        let err = manager.create_vault(with_id, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_get_unknown_vault() {
        let err = manager().get_vault(&EdvId::generate()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reference_id_unique_per_controller() {
        let manager = manager();
        let mut first = request(ALPHA);
        first.reference_id = Some("primary".to_string());
        manager.create_vault(first.clone(), ALPHA).await.unwrap();

        let err = manager.create_vault(first, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let mut other = request("did:example:beta");
        other.reference_id = Some("primary".to_string());
        manager.create_vault(other, "did:example:beta").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_vault_sequence() {
        let manager = manager();
        let config = manager.create_vault(request(ALPHA), ALPHA).await.unwrap();
        let id = local_id(&config);

        let mut update = request(ALPHA);
        update.id = Some(config.id.clone());
        update.sequence = 1;
        update.reference_id = Some("renamed".to_string());
        let updated = manager.update_vault(&id, update.clone(), ALPHA).await.unwrap();
        assert_eq!(updated.sequence, 1);
        assert_eq!(updated.reference_id.as_deref(), Some("renamed"));

        // replaying the same sequence is stale
        let err = manager.update_vault(&id, update, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_update_vault_guards() {
        let manager = manager();
        let config = manager.create_vault(request(ALPHA), ALPHA).await.unwrap();
        let id = local_id(&config);

        let mut update = request(ALPHA);
        update.id = Some(config.id.clone());
        update.sequence = 1;

        let err = manager
            .update_vault(&id, update.clone(), "did:example:mallory")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let mut moved = update.clone();
        moved.controller = Some("did:example:beta".to_string());
        let err = manager.update_vault(&id, moved, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut renamed = update;
        renamed.id = Some("https://edv.example/edvs/elsewhere".to_string());
        let err = manager.update_vault(&id, renamed, ALPHA).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_find_vaults() {
        let manager = manager();
        let mut tagged = request(ALPHA);
        tagged.reference_id = Some("primary".to_string());
        manager.create_vault(tagged, ALPHA).await.unwrap();
        manager.create_vault(request(ALPHA), ALPHA).await.unwrap();

        assert_eq!(manager.find_vaults(ALPHA, None, ALPHA).await.unwrap().len(), 2);
        let found = manager
            .find_vaults(ALPHA, Some("primary"), ALPHA)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let err = manager
            .find_vaults(ALPHA, None, "did:example:beta")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_authorize_invoker() {
        let manager = manager();
        let mut req = request(ALPHA);
        req.invoker = Some(crate::config::Authorities::Many(vec![
            "did:example:service".to_string(),
        ]));
        let config = manager.create_vault(req, ALPHA).await.unwrap();
        let id = local_id(&config);

        manager.authorize_invoker(&id, ALPHA).await.unwrap();
        manager
            .authorize_invoker(&id, "did:example:service")
            .await
            .unwrap();
        let err = manager
            .authorize_invoker(&id, "did:example:mallory")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
