//! Store registry: one store per identity handle.

use std::collections::BTreeMap;

use loyalty_core::{parse_public_key, LoyaltyError, LoyaltyResult, Principal, Store};
use tracing::info;

#[derive(Debug, Default, Clone)]
pub struct StoreRegistry {
    stores: BTreeMap<Principal, Store>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store. The public key must parse as an uncompressed
    /// secp256k1 point so every later claim from this store is verifiable.
    pub fn register(&mut self, store: Store) -> LoyaltyResult<()> {
        if store.name.trim().is_empty() {
            return Err(LoyaltyError::InvalidInput(
                "store name must not be empty".into(),
            ));
        }
        if parse_public_key(&store.public_key).is_none() {
            return Err(LoyaltyError::InvalidInput(
                "store public key is not an uncompressed secp256k1 point".into(),
            ));
        }
        if self.stores.contains_key(&store.id) {
            return Err(LoyaltyError::AlreadyExists(format!("store {}", store.id)));
        }

        info!(store = %store.id, name = %store.name, "store registered");
        self.stores.insert(store.id.clone(), store);
        Ok(())
    }

    pub fn get(&self, id: &Principal) -> Option<&Store> {
        self.stores.get(id)
    }

    pub fn contains(&self, id: &Principal) -> bool {
        self.stores.contains_key(id)
    }

    /// Display name of a store, used by name-based condition filters.
    pub fn name_of(&self, id: &Principal) -> Option<&str> {
        self.stores.get(id).map(|s| s.name.as_str())
    }

    /// Fail with `NotFound` unless `caller` is a registered store.
    pub fn require_store(&self, caller: &Principal) -> LoyaltyResult<&Store> {
        self.stores
            .get(caller)
            .ok_or_else(|| LoyaltyError::NotFound(format!("store {}", caller)))
    }

    pub fn list(&self) -> Vec<Store> {
        self.stores.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn make_store(id: &str, name: &str) -> Store {
        let sk = SigningKey::from_slice(&[0x21u8; 32]).unwrap();
        Store {
            id: Principal::new(id),
            name: name.to_string(),
            description: "test store".to_string(),
            public_key: sk.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = StoreRegistry::new();
        registry.register(make_store("store-1", "Corner Shop")).unwrap();
        let store = registry.get(&Principal::new("store-1")).unwrap();
        assert_eq!(store.name, "Corner Shop");
        assert_eq!(registry.name_of(&Principal::new("store-1")), Some("Corner Shop"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut registry = StoreRegistry::new();
        registry.register(make_store("store-1", "A")).unwrap();
        let err = registry.register(make_store("store-1", "B")).unwrap_err();
        assert!(matches!(err, LoyaltyError::AlreadyExists(_)));
        assert_eq!(registry.get(&Principal::new("store-1")).unwrap().name, "A");
    }

    #[test]
    fn test_malformed_key_rejected() {
        let mut registry = StoreRegistry::new();
        let mut store = make_store("store-1", "A");
        store.public_key = vec![0x04; 10];
        let err = registry.register(store).unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidInput(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = StoreRegistry::new();
        let err = registry.register(make_store("store-1", "  ")).unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidInput(_)));
    }

    #[test]
    fn test_require_store() {
        let mut registry = StoreRegistry::new();
        registry.register(make_store("store-1", "A")).unwrap();
        assert!(registry.require_store(&Principal::new("store-1")).is_ok());
        assert!(matches!(
            registry.require_store(&Principal::new("nobody")),
            Err(LoyaltyError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_is_identity_ordered() {
        let mut registry = StoreRegistry::new();
        registry.register(make_store("b-store", "B")).unwrap();
        registry.register(make_store("a-store", "A")).unwrap();
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec!["a-store", "b-store"]);
    }
}
