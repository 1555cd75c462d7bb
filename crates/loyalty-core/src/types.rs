use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Typed identifiers: prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    Principal,
    "Opaque, comparable identity handle of a caller (store, holder, or controller)."
);
define_id!(
    SchemeId,
    "Identifier of a credential scheme or store scheme (hex SHA-256)."
);
define_id!(TagId, "Caller-supplied identifier of a controller-owned tag.");

/// Ordinal identifier of a recorded receipt.
pub type ReceiptId = u64;

// ---------------------------------------------------------------------------
// Timestamp: nanoseconds since the Unix epoch
// ---------------------------------------------------------------------------

/// Nanosecond-precision timestamp. `Display` renders the bare integer, which
/// is the form used inside canonical claim messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self::from(now)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self(seconds.saturating_mul(1_000_000_000))
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        let secs = (self.0 / 1_000_000_000) as i64;
        let nanos = (self.0 % 1_000_000_000) as u32;
        chrono::DateTime::from_timestamp(secs, nanos)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        let secs = dt.timestamp().max(0) as u64;
        Self(
            secs.saturating_mul(1_000_000_000)
                .saturating_add(dt.timestamp_subsec_nanos() as u64),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Store: a registered issuer of credentials and receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: Principal,
    pub name: String,
    pub description: String,
    /// Uncompressed secp256k1 point used to verify the store's claims.
    #[serde(with = "hex_vec")]
    pub public_key: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialScheme {
    pub id: SchemeId,
    pub name: String,
    pub description: String,
    pub metadata: Option<String>,
    pub reward: u64,
    pub issuer: Principal,
}

/// A store-signed claim recorded after its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub scheme_id: SchemeId,
    pub holder: Principal,
    pub timestamp: Timestamp,
    pub reward: u64,
    pub issuer: Principal,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    /// Opaque ciphertext; never interpreted.
    pub encrypted_payload: String,
    pub holder: Principal,
    pub store: Principal,
    pub amount: u64,
    /// Cashback actually debited from the store.
    pub cashback: u64,
    pub timestamp: Timestamp,
    /// Store scheme whose multiplier applied, if any.
    pub applied_scheme: Option<SchemeId>,
}

impl Receipt {
    pub fn summary(&self) -> ReceiptSummary {
        ReceiptSummary {
            id: self.id,
            holder: self.holder.clone(),
            store: self.store.clone(),
            amount: self.amount,
            cashback: self.cashback,
            timestamp: self.timestamp,
            applied_scheme: self.applied_scheme.clone(),
        }
    }
}

/// Receipt metadata without the encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub id: ReceiptId,
    pub holder: Principal,
    pub store: Principal,
    pub amount: u64,
    pub cashback: u64,
    pub timestamp: Timestamp,
    pub applied_scheme: Option<SchemeId>,
}

// ---------------------------------------------------------------------------
// Awards: monotonic per (holder, id)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTag {
    pub tag_id: TagId,
    pub holder: Principal,
    pub awarded_at: Timestamp,
    /// Hex Ed25519 attestation, absent when signing failed.
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSchemeRecord {
    pub scheme_id: SchemeId,
    pub holder: Principal,
    pub awarded_at: Timestamp,
    pub signature: Option<String>,
}

// ---------------------------------------------------------------------------
// Hex serialization helper for variable-length byte strings
// ---------------------------------------------------------------------------

mod hex_vec {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
