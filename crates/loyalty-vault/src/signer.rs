use crate::error::{VaultError, VaultResult};
use ed25519_dalek::{Signer as DalekSigner, SigningKey, VerifyingKey};
use loyalty_core::SigningError;
use zeroize::Zeroizing;

/// The service's own Ed25519 attestation key.
///
/// Implements `loyalty_core::Signer`. The seed stays in zeroizing memory.
pub struct AttestationSigner {
    signing_key: Zeroizing<[u8; 32]>,
    verifying_key: [u8; 32],
}

impl AttestationSigner {
    /// Create a signer from raw seed bytes.
    pub fn from_bytes(key_bytes: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key: Zeroizing::new(key_bytes),
            verifying_key: verifying_key.to_bytes(),
        }
    }

    /// Create a signer with a fresh random seed.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut seed[..]);
        Self::from_bytes(*seed)
    }

    /// Parse a hex-encoded 32-byte seed (surrounding whitespace ignored).
    pub fn from_hex(seed_hex: &str) -> VaultResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(seed_hex.trim())
                .map_err(|_| VaultError::InvalidKey("attestation seed is not hex".into()))?,
        );
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::InvalidKey(format!(
                "attestation seed must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(seed))
    }

    /// Hex form of the seed, for persisting to the key file.
    pub fn seed_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.signing_key[..]))
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.verifying_key)
    }

    /// Verify a signature against this signer's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        verify_attestation(&self.verifying_key, message, signature)
    }
}

/// Strict Ed25519 verification of an attestation under `public_key`.
pub fn verify_attestation(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    match VerifyingKey::from_bytes(public_key) {
        Ok(vk) => {
            let sig = ed25519_dalek::Signature::from_bytes(signature);
            vk.verify_strict(message, &sig).is_ok()
        }
        Err(_) => false,
    }
}

/// Hex-string variant of [`verify_attestation`]. Non-hex input and wrong
/// lengths verify as `false`.
pub fn verify_attestation_hex(public_key: &[u8; 32], message: &[u8], signature_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = <[u8; 64]>::try_from(bytes.as_slice()) else {
        return false;
    };
    verify_attestation(public_key, message, &signature)
}

impl loyalty_core::Signer for AttestationSigner {
    fn sign_ed25519(&self, message: &[u8]) -> Result<[u8; 64], SigningError> {
        let signing_key = SigningKey::from_bytes(&self.signing_key);
        let signature = signing_key.sign(message);
        Ok(signature.to_bytes())
    }

    fn public_key_ed25519(&self) -> [u8; 32] {
        self.verifying_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::Signer;

    #[test]
    fn test_sign_and_verify() {
        let signer = AttestationSigner::from_bytes([0x42u8; 32]);
        let msg = b"tag gold alice";
        let sig = signer.sign_ed25519(msg).unwrap();
        assert!(signer.verify(msg, &sig));
    }

    #[test]
    fn test_deterministic_from_seed() {
        let s1 = AttestationSigner::from_bytes([0x42u8; 32]);
        let s2 = AttestationSigner::from_bytes([0x42u8; 32]);
        assert_eq!(s1.public_key_ed25519(), s2.public_key_ed25519());
        assert_eq!(s1.sign_ed25519(b"m").unwrap(), s2.sign_ed25519(b"m").unwrap());
    }

    #[test]
    fn test_generated_keys_differ() {
        let s1 = AttestationSigner::generate();
        let s2 = AttestationSigner::generate();
        assert_ne!(s1.public_key_ed25519(), s2.public_key_ed25519());
    }

    #[test]
    fn test_wrong_message_fails_verify() {
        let signer = AttestationSigner::from_bytes([0x42u8; 32]);
        let sig = signer.sign_ed25519(b"message A").unwrap();
        assert!(!signer.verify(b"message B", &sig));
    }

    #[test]
    fn test_hex_seed_round_trip() {
        let signer = AttestationSigner::from_bytes([0x17u8; 32]);
        let restored = AttestationSigner::from_hex(&format!("{}\n", *signer.seed_hex())).unwrap();
        assert_eq!(restored.public_key_ed25519(), signer.public_key_ed25519());
    }

    #[test]
    fn test_bad_hex_seed_rejected() {
        assert!(matches!(
            AttestationSigner::from_hex("zz"),
            Err(VaultError::InvalidKey(_))
        ));
        assert!(matches!(
            AttestationSigner::from_hex("abcd"),
            Err(VaultError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_verify_hex_rejects_garbage() {
        let signer = AttestationSigner::from_bytes([0x42u8; 32]);
        let pk = signer.public_key_ed25519();
        let sig = signer.sign_ed25519(b"msg").unwrap();
        assert!(verify_attestation_hex(&pk, b"msg", &hex::encode(sig)));
        assert!(!verify_attestation_hex(&pk, b"msg", "not a signature"));
        assert!(!verify_attestation_hex(&pk, b"msg", "abcd"));
        assert!(!verify_attestation_hex(&pk, b"msg", ""));
    }
}
