use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loyalty_core::{
    Clock, CredentialScheme, IssuedCredential, IssuedTag, Ledger, LoyaltyError, Principal,
    Receipt, ReceiptId, ReceiptSummary, SchemeId, Signer, Store, TagId, Timestamp,
    UserSchemeRecord,
};
use loyalty_cred::{CredentialRegistry, StoreRegistry};
use loyalty_policy::{
    validate_condition, Condition, ConditionEngine, HistorySource, StoreScheme, TagScheme,
};
use loyalty_vault::verify_attestation_hex;
use tracing::{debug, error, info, warn};

use crate::attestation::{scheme_message, tag_message};
use crate::cashback::{compute_cashback, select_scheme, CashbackQuote};
use crate::config::RootConfig;
use crate::error::{RootError, RootResult};

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

/// Everything the service records. Guarded by a single mutex that is never
/// held across an await.
#[derive(Default)]
struct LoyaltyState {
    stores: StoreRegistry,
    credentials: CredentialRegistry,
    receipts: Vec<Receipt>,
    tags: BTreeMap<TagId, TagScheme>,
    store_schemes: BTreeMap<SchemeId, StoreScheme>,
    user_tags: HashMap<Principal, Vec<IssuedTag>>,
    user_schemes: HashMap<Principal, Vec<UserSchemeRecord>>,
}

impl HistorySource for LoyaltyState {
    fn receipts_for(&self, holder: &Principal) -> Vec<&Receipt> {
        self.receipts.iter().filter(|r| &r.holder == holder).collect()
    }

    fn credentials_for(&self, holder: &Principal) -> &[IssuedCredential] {
        self.credentials.credentials_for(holder)
    }

    fn store_name(&self, store: &Principal) -> Option<&str> {
        self.stores.name_of(store)
    }
}

impl LoyaltyState {
    /// Cashback for a purchase at `store`, using the store's active schemes
    /// that `holder` has already been awarded.
    fn quote(&self, config: &RootConfig, store: &Principal, holder: &Principal, amount: u64) -> CashbackQuote {
        let held = self
            .user_schemes
            .get(holder)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let candidates = held
            .iter()
            .filter_map(|record| self.store_schemes.get(&record.scheme_id))
            .filter(|s| s.active && &s.store == store);
        compute_cashback(amount, &config.cashback, select_scheme(candidates))
    }
}

/// Fields of a new store scheme.
#[derive(Debug, Clone)]
pub struct NewStoreScheme {
    pub name: String,
    pub description: String,
    pub condition: Condition,
    pub metadata: Option<String>,
    pub cashback_multiplier: u64,
    pub max_cashback_amount: Option<u64>,
}

// ---------------------------------------------------------------------------
// LoyaltyService
// ---------------------------------------------------------------------------

/// The loyalty ledger: stores, credentials, receipts with cashback, and
/// attested tag / store-scheme awards.
///
/// Every mutating operation takes the authenticated caller explicitly.
pub struct LoyaltyService {
    config: RootConfig,
    controller: Principal,
    state: Mutex<LoyaltyState>,
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
}

impl LoyaltyService {
    pub fn new(
        config: RootConfig,
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
    ) -> RootResult<Self> {
        config.validate()?;
        if config.controller.trim().is_empty() {
            return Err(RootError::Config("controller must be set".into()));
        }
        let controller = Principal::new(config.controller.clone());
        info!(controller = %controller, "loyalty service initialized");
        Ok(Self {
            config,
            controller,
            state: Mutex::new(LoyaltyState::default()),
            ledger,
            signer,
            clock,
        })
    }

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    pub fn controller(&self) -> &Principal {
        &self.controller
    }

    /// Hex form of the key that verifies this service's attestations.
    pub fn attestation_public_key(&self) -> String {
        hex::encode(self.signer.public_key_ed25519())
    }

    fn lock_state(&self) -> RootResult<MutexGuard<'_, LoyaltyState>> {
        self.state
            .lock()
            .map_err(|e| RootError::Internal(format!("state lock poisoned: {}", e)))
    }

    fn require_controller(&self, caller: &Principal) -> RootResult<()> {
        if caller != &self.controller {
            return Err(LoyaltyError::Unauthorized(format!("{} is not the controller", caller)).into());
        }
        Ok(())
    }

    /// Sign an award message. A signer failure is logged and yields `None`;
    /// the award itself still stands.
    fn attest(&self, message: &str) -> Option<String> {
        match self.signer.sign_ed25519(message.as_bytes()) {
            Ok(signature) => Some(hex::encode(signature)),
            Err(e) => {
                warn!(error = %e, "attestation signing failed, award recorded unsigned");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stores
    // -----------------------------------------------------------------------

    pub fn add_store(
        &self,
        caller: &Principal,
        identity: Principal,
        name: &str,
        description: &str,
        public_key: Vec<u8>,
    ) -> RootResult<()> {
        self.require_controller(caller)?;
        let mut state = self.lock_state()?;
        state.stores.register(Store {
            id: identity,
            name: name.to_string(),
            description: description.to_string(),
            public_key,
        })?;
        Ok(())
    }

    pub fn get_store(&self, identity: &Principal) -> RootResult<Option<Store>> {
        Ok(self.lock_state()?.stores.get(identity).cloned())
    }

    pub fn list_stores(&self) -> RootResult<Vec<Store>> {
        Ok(self.lock_state()?.stores.list())
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    pub fn publish_credential_scheme(
        &self,
        caller: &Principal,
        name: &str,
        description: &str,
        metadata: Option<String>,
        reward: u64,
    ) -> RootResult<SchemeId> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        Ok(state
            .credentials
            .publish_scheme(&state.stores, caller, name, description, metadata, reward)?)
    }

    pub fn get_credential_scheme(&self, id: &SchemeId) -> RootResult<Option<CredentialScheme>> {
        Ok(self.lock_state()?.credentials.scheme(id).cloned())
    }

    pub fn list_credential_schemes(&self) -> RootResult<Vec<CredentialScheme>> {
        Ok(self.lock_state()?.credentials.schemes())
    }

    pub fn issue_credential(
        &self,
        caller: &Principal,
        scheme_id: &SchemeId,
        holder: &Principal,
        signature: &[u8],
        timestamp: Timestamp,
    ) -> RootResult<usize> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        Ok(state.credentials.issue_credential(
            &state.stores,
            caller,
            scheme_id,
            holder,
            signature,
            timestamp,
        )?)
    }

    pub fn verify_credential(
        &self,
        scheme_id: &SchemeId,
        holder: &Principal,
        timestamp: Timestamp,
        signature: &[u8],
        public_key: &[u8],
    ) -> RootResult<bool> {
        let state = self.lock_state()?;
        Ok(state
            .credentials
            .verify_credential(scheme_id, holder, timestamp, signature, public_key))
    }

    pub fn get_user_credentials(&self, holder: &Principal) -> RootResult<Vec<IssuedCredential>> {
        Ok(self.lock_state()?.credentials.credentials_for(holder).to_vec())
    }

    pub fn get_store_history(&self, issuer: &Principal) -> RootResult<Vec<IssuedCredential>> {
        Ok(self.lock_state()?.credentials.history_of(issuer).to_vec())
    }

    // -----------------------------------------------------------------------
    // Receipts & cashback
    // -----------------------------------------------------------------------

    /// Record a purchase by `holder` at the calling store and pay cashback.
    ///
    /// The debit is the only suspending step. The receipt is committed only
    /// after the ledger confirmed the transfer, so a rejected or failed debit
    /// leaves no receipt behind and consumes no receipt id. A store cannot
    /// record a purchase by itself.
    pub async fn store_receipt(
        &self,
        caller: &Principal,
        encrypted_payload: String,
        holder: &Principal,
        amount: u64,
    ) -> RootResult<ReceiptId> {
        let quote = {
            let state = self.lock_state()?;
            state.stores.require_store(caller)?;
            if holder == caller {
                return Err(LoyaltyError::InvalidInput(format!(
                    "store {} cannot be the holder of its own receipt",
                    caller
                ))
                .into());
            }
            state.quote(&self.config, caller, holder, amount)
        };

        if quote.amount > 0 {
            let available = self
                .ledger
                .balance_of(caller)
                .await
                .map_err(|e| RootError::from_ledger(e, quote.amount))?;
            if available < quote.amount {
                warn!(store = %caller, required = quote.amount, available, "receipt rejected: insufficient balance");
                return Err(LoyaltyError::InsufficientBalance {
                    required: quote.amount,
                    available,
                }
                .into());
            }

            // Another call may have drained the balance since the read above;
            // the ledger's own answer is authoritative.
            let block = self
                .ledger
                .transfer(caller, holder, quote.amount)
                .await
                .map_err(|e| {
                    warn!(store = %caller, required = quote.amount, error = %e, "cashback transfer failed");
                    RootError::from_ledger(e, quote.amount)
                })?;
            debug!(store = %caller, holder = %holder, block, "cashback transferred");
        }

        // The debit above cannot be undone, so the receipt is recorded even
        // if another call panicked while holding the lock.
        let mut state = self.state.lock().unwrap_or_else(|poisoned| {
            error!(store = %caller, holder = %holder, "state lock poisoned after cashback debit, recording receipt anyway");
            PoisonError::into_inner(poisoned)
        });
        let id = state.receipts.len() as ReceiptId;
        state.receipts.push(Receipt {
            id,
            encrypted_payload,
            holder: holder.clone(),
            store: caller.clone(),
            amount,
            cashback: quote.amount,
            timestamp: self.clock.now(),
            applied_scheme: quote.applied_scheme.clone(),
        });
        info!(
            receipt = id,
            store = %caller,
            holder = %holder,
            amount,
            cashback = quote.amount,
            "receipt recorded"
        );
        Ok(id)
    }

    /// Payload of a receipt, visible only to its store and its holder.
    /// Anyone else sees `None`, exactly as for a missing receipt.
    pub fn get_encrypted_receipt_data(
        &self,
        caller: &Principal,
        receipt_id: ReceiptId,
    ) -> RootResult<Option<String>> {
        let state = self.lock_state()?;
        Ok(usize::try_from(receipt_id)
            .ok()
            .and_then(|i| state.receipts.get(i))
            .filter(|r| &r.store == caller || &r.holder == caller)
            .map(|r| r.encrypted_payload.clone()))
    }

    pub fn list_store_receipts(&self, caller: &Principal) -> RootResult<Vec<ReceiptSummary>> {
        let state = self.lock_state()?;
        Ok(state
            .receipts
            .iter()
            .filter(|r| &r.store == caller)
            .map(Receipt::summary)
            .collect())
    }

    pub fn list_user_receipts(&self, caller: &Principal) -> RootResult<Vec<ReceiptSummary>> {
        let state = self.lock_state()?;
        Ok(state
            .receipts
            .iter()
            .filter(|r| &r.holder == caller)
            .map(Receipt::summary)
            .collect())
    }

    pub async fn get_store_tokens(&self, store: &Principal) -> RootResult<u64> {
        self.ledger
            .balance_of(store)
            .await
            .map_err(|e| RootError::from_ledger(e, 0))
    }

    // -----------------------------------------------------------------------
    // Tags (controller-owned)
    // -----------------------------------------------------------------------

    pub fn create_tag(
        &self,
        caller: &Principal,
        id: TagId,
        name: &str,
        description: &str,
        condition: Condition,
        metadata: Option<String>,
    ) -> RootResult<TagId> {
        self.require_controller(caller)?;
        if id.as_str().trim().is_empty() {
            return Err(LoyaltyError::InvalidInput("tag id must not be empty".into()).into());
        }
        validate_condition(&condition, &self.config.policy.limits())?;

        let mut state = self.lock_state()?;
        if state.tags.contains_key(&id) {
            return Err(LoyaltyError::AlreadyExists(format!("tag {}", id)).into());
        }
        state.tags.insert(
            id.clone(),
            TagScheme {
                id: id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                condition,
                metadata,
                active: true,
            },
        );
        info!(tag = %id, "tag created");
        Ok(id)
    }

    pub fn deactivate_tag(&self, caller: &Principal, id: &TagId) -> RootResult<()> {
        self.require_controller(caller)?;
        let mut state = self.lock_state()?;
        let tag = state
            .tags
            .get_mut(id)
            .ok_or_else(|| LoyaltyError::NotFound(format!("tag {}", id)))?;
        if tag.active {
            tag.active = false;
            info!(tag = %id, "tag deactivated");
        }
        Ok(())
    }

    pub fn get_tag_scheme(&self, id: &TagId) -> RootResult<Option<TagScheme>> {
        Ok(self.lock_state()?.tags.get(id).cloned())
    }

    /// All tags, ascending by id.
    pub fn list_tag_schemes(&self) -> RootResult<Vec<TagScheme>> {
        Ok(self.lock_state()?.tags.values().cloned().collect())
    }

    /// Award every active tag `holder` now qualifies for and does not hold
    /// yet. Returns the newly awarded ids in ascending order.
    pub fn evaluate_user_tags(&self, holder: &Principal) -> RootResult<Vec<TagId>> {
        let mut state = self.lock_state()?;

        let awarded: Vec<TagId> = {
            let held: HashSet<&TagId> = state
                .user_tags
                .get(holder)
                .map(|list| list.iter().map(|t| &t.tag_id).collect())
                .unwrap_or_default();
            let engine = ConditionEngine::new(&*state);
            state
                .tags
                .values()
                .filter(|t| t.active && !held.contains(&t.id))
                .filter(|t| engine.evaluate(&t.condition, holder))
                .map(|t| t.id.clone())
                .collect()
        };

        for tag_id in &awarded {
            let signature = self.attest(&tag_message(tag_id, holder));
            state
                .user_tags
                .entry(holder.clone())
                .or_default()
                .push(IssuedTag {
                    tag_id: tag_id.clone(),
                    holder: holder.clone(),
                    awarded_at: self.clock.now(),
                    signature,
                });
            info!(tag = %tag_id, holder = %holder, "tag awarded");
        }
        Ok(awarded)
    }

    pub fn get_user_tags(&self, holder: &Principal) -> RootResult<Vec<IssuedTag>> {
        Ok(self
            .lock_state()?
            .user_tags
            .get(holder)
            .cloned()
            .unwrap_or_default())
    }

    /// Check a hex attestation for `(tag_id, holder)` against this
    /// service's key. Malformed input is simply `false`.
    pub fn verify_tag_canister_signature(
        &self,
        tag_id: &TagId,
        holder: &Principal,
        signature_hex: &str,
    ) -> bool {
        verify_attestation_hex(
            &self.signer.public_key_ed25519(),
            tag_message(tag_id, holder).as_bytes(),
            signature_hex,
        )
    }

    // -----------------------------------------------------------------------
    // Store schemes (store-owned)
    // -----------------------------------------------------------------------

    pub fn create_store_scheme(
        &self,
        caller: &Principal,
        scheme: NewStoreScheme,
    ) -> RootResult<SchemeId> {
        if scheme.name.trim().is_empty() {
            return Err(LoyaltyError::InvalidInput("scheme name must not be empty".into()).into());
        }
        if scheme.cashback_multiplier == 0 {
            return Err(
                LoyaltyError::InvalidInput("cashback multiplier must be > 0".into()).into(),
            );
        }
        validate_condition(&scheme.condition, &self.config.policy.limits())?;

        let mut state = self.lock_state()?;
        state.stores.require_store(caller)?;

        let id = loyalty_core::derive_scheme_id(caller, &scheme.name);
        if state.store_schemes.contains_key(&id) {
            return Err(LoyaltyError::AlreadyExists(format!(
                "store scheme {} for {}",
                scheme.name, caller
            ))
            .into());
        }
        state.store_schemes.insert(
            id.clone(),
            StoreScheme {
                id: id.clone(),
                store: caller.clone(),
                name: scheme.name,
                description: scheme.description,
                condition: scheme.condition,
                metadata: scheme.metadata,
                active: true,
                cashback_multiplier: scheme.cashback_multiplier,
                max_cashback_amount: scheme.max_cashback_amount,
            },
        );
        info!(
            scheme = %id,
            store = %caller,
            multiplier = scheme.cashback_multiplier,
            "store scheme created"
        );
        Ok(id)
    }

    pub fn deactivate_store_scheme(&self, caller: &Principal, id: &SchemeId) -> RootResult<()> {
        let mut state = self.lock_state()?;
        state.stores.require_store(caller)?;
        let scheme = state
            .store_schemes
            .get_mut(id)
            .ok_or_else(|| LoyaltyError::NotFound(format!("store scheme {}", id)))?;
        if &scheme.store != caller {
            return Err(LoyaltyError::Unauthorized(format!(
                "{} does not own store scheme {}",
                caller, id
            ))
            .into());
        }
        if scheme.active {
            scheme.active = false;
            info!(scheme = %id, store = %caller, "store scheme deactivated");
        }
        Ok(())
    }

    pub fn get_store_scheme(&self, id: &SchemeId) -> RootResult<Option<StoreScheme>> {
        Ok(self.lock_state()?.store_schemes.get(id).cloned())
    }

    /// Schemes owned by `store`, ascending by id.
    pub fn get_store_schemes(&self, store: &Principal) -> RootResult<Vec<StoreScheme>> {
        Ok(self
            .lock_state()?
            .store_schemes
            .values()
            .filter(|s| &s.store == store)
            .cloned()
            .collect())
    }

    /// Award every active store scheme `holder` now qualifies for and does
    /// not hold yet. Returns the newly awarded ids in ascending order.
    pub fn evaluate_user_store_schemes(&self, holder: &Principal) -> RootResult<Vec<SchemeId>> {
        let mut state = self.lock_state()?;

        let awarded: Vec<SchemeId> = {
            let held: HashSet<&SchemeId> = state
                .user_schemes
                .get(holder)
                .map(|list| list.iter().map(|s| &s.scheme_id).collect())
                .unwrap_or_default();
            let engine = ConditionEngine::new(&*state);
            state
                .store_schemes
                .values()
                .filter(|s| s.active && !held.contains(&s.id))
                .filter(|s| engine.evaluate(&s.condition, holder))
                .map(|s| s.id.clone())
                .collect()
        };

        for scheme_id in &awarded {
            let signature = self.attest(&scheme_message(scheme_id, holder));
            state
                .user_schemes
                .entry(holder.clone())
                .or_default()
                .push(UserSchemeRecord {
                    scheme_id: scheme_id.clone(),
                    holder: holder.clone(),
                    awarded_at: self.clock.now(),
                    signature,
                });
            info!(scheme = %scheme_id, holder = %holder, "store scheme awarded");
        }
        Ok(awarded)
    }

    pub fn get_user_schemes(&self, holder: &Principal) -> RootResult<Vec<UserSchemeRecord>> {
        Ok(self
            .lock_state()?
            .user_schemes
            .get(holder)
            .cloned()
            .unwrap_or_default())
    }

    pub fn verify_scheme_signature(
        &self,
        scheme_id: &SchemeId,
        holder: &Principal,
        signature_hex: &str,
    ) -> bool {
        verify_attestation_hex(
            &self.signer.public_key_ed25519(),
            scheme_message(scheme_id, holder).as_bytes(),
            signature_hex,
        )
    }
}
