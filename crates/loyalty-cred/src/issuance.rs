//! Credential schemes and signature-gated credential issuance.
//!
//! A store publishes schemes under ids derived from its identity and the
//! scheme name. It then signs claims off-chain for holders; a claim is
//! recorded only after its signature verifies against the store's
//! registered public key.

use std::collections::{BTreeMap, HashMap};

use loyalty_core::{
    credential_message, derive_scheme_id, verify_signature, CredentialScheme, IssuedCredential,
    LoyaltyError, LoyaltyResult, Principal, SchemeId, Timestamp,
};
use tracing::{info, warn};

use crate::store::StoreRegistry;

#[derive(Debug, Default, Clone)]
pub struct CredentialRegistry {
    schemes: BTreeMap<SchemeId, CredentialScheme>,
    by_holder: HashMap<Principal, Vec<IssuedCredential>>,
    by_issuer: HashMap<Principal, Vec<IssuedCredential>>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a credential scheme on behalf of `issuer`.
    ///
    /// The caller must already be a registered store. Scheme ids are global;
    /// republishing the same name from the same store collides.
    pub fn publish_scheme(
        &mut self,
        stores: &StoreRegistry,
        issuer: &Principal,
        name: &str,
        description: &str,
        metadata: Option<String>,
        reward: u64,
    ) -> LoyaltyResult<SchemeId> {
        stores.require_store(issuer)?;
        if name.is_empty() {
            return Err(LoyaltyError::InvalidInput(
                "scheme name must not be empty".into(),
            ));
        }

        let id = derive_scheme_id(issuer, name);
        if self.schemes.contains_key(&id) {
            return Err(LoyaltyError::AlreadyExists(format!("scheme {}", id)));
        }

        self.schemes.insert(
            id.clone(),
            CredentialScheme {
                id: id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                metadata,
                reward,
                issuer: issuer.clone(),
            },
        );
        info!(scheme = %id, issuer = %issuer, reward, "credential scheme published");
        Ok(id)
    }

    /// Record a credential for `holder` after verifying the issuer's claim.
    ///
    /// The canonical message is rebuilt from the stored scheme (issuer and
    /// reward come from the registry, never from the caller). Returns the
    /// zero-based position of the new record in the holder's list.
    pub fn issue_credential(
        &mut self,
        stores: &StoreRegistry,
        caller: &Principal,
        scheme_id: &SchemeId,
        holder: &Principal,
        signature: &[u8],
        timestamp: Timestamp,
    ) -> LoyaltyResult<usize> {
        let scheme = self
            .schemes
            .get(scheme_id)
            .ok_or_else(|| LoyaltyError::NotFound(format!("scheme {}", scheme_id)))?;

        if &scheme.issuer != caller {
            return Err(LoyaltyError::Unauthorized(format!(
                "{} is not the issuer of scheme {}",
                caller, scheme_id
            )));
        }

        let store = stores
            .get(&scheme.issuer)
            .ok_or_else(|| LoyaltyError::NotFound(format!("store {}", scheme.issuer)))?;

        let message = credential_message(scheme_id, &scheme.issuer, holder, timestamp, scheme.reward);
        if !verify_signature(&store.public_key, message.as_bytes(), signature) {
            warn!(scheme = %scheme_id, holder = %holder, "credential signature rejected");
            return Err(LoyaltyError::InvalidSignature);
        }

        let already_recorded = self
            .by_holder
            .get(holder)
            .map(|list| {
                list.iter()
                    .any(|c| &c.scheme_id == scheme_id && c.timestamp == timestamp)
            })
            .unwrap_or(false);
        if already_recorded {
            return Err(LoyaltyError::AlreadyExists(format!(
                "credential {} for {} at {}",
                scheme_id, holder, timestamp
            )));
        }

        let credential = IssuedCredential {
            scheme_id: scheme_id.clone(),
            holder: holder.clone(),
            timestamp,
            reward: scheme.reward,
            issuer: scheme.issuer.clone(),
        };

        self.by_issuer
            .entry(credential.issuer.clone())
            .or_default()
            .push(credential.clone());
        let holder_list = self.by_holder.entry(holder.clone()).or_default();
        holder_list.push(credential);
        let index = holder_list.len() - 1;

        info!(scheme = %scheme_id, holder = %holder, index, "credential issued");
        Ok(index)
    }

    /// Stateless pre-check of a claim against an explicit public key.
    ///
    /// Unknown schemes verify as `false`.
    pub fn verify_credential(
        &self,
        scheme_id: &SchemeId,
        holder: &Principal,
        timestamp: Timestamp,
        signature: &[u8],
        public_key: &[u8],
    ) -> bool {
        let Some(scheme) = self.schemes.get(scheme_id) else {
            return false;
        };
        let message = credential_message(scheme_id, &scheme.issuer, holder, timestamp, scheme.reward);
        verify_signature(public_key, message.as_bytes(), signature)
    }

    pub fn scheme(&self, id: &SchemeId) -> Option<&CredentialScheme> {
        self.schemes.get(id)
    }

    pub fn schemes(&self) -> Vec<CredentialScheme> {
        self.schemes.values().cloned().collect()
    }

    pub fn credentials_for(&self, holder: &Principal) -> &[IssuedCredential] {
        self.by_holder.get(holder).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn history_of(&self, issuer: &Principal) -> &[IssuedCredential] {
        self.by_issuer.get(issuer).map(Vec::as_slice).unwrap_or(&[])
    }
}
