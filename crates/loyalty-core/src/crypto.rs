use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::types::{Principal, SchemeId, Timestamp};

/// SEC1 tag byte of an uncompressed point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Parse an uncompressed secp256k1 public key.
///
/// Accepts the 65-byte SEC1 form (`0x04 ‖ x ‖ y`) or the bare 64-byte
/// `x ‖ y` form. Anything else, including points off the curve, is `None`.
pub fn parse_public_key(bytes: &[u8]) -> Option<VerifyingKey> {
    match bytes.len() {
        65 if bytes[0] == UNCOMPRESSED_TAG => VerifyingKey::from_sec1_bytes(bytes).ok(),
        64 => {
            let mut sec1 = [0u8; 65];
            sec1[0] = UNCOMPRESSED_TAG;
            sec1[1..].copy_from_slice(bytes);
            VerifyingKey::from_sec1_bytes(&sec1).ok()
        }
        _ => None,
    }
}

/// Verify a 64-byte `r ‖ s` ECDSA signature over `SHA-256(message)`.
///
/// Pure and total: malformed keys, malformed signatures and high-S
/// signatures all return `false`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Some(verifying_key) = parse_public_key(public_key) else {
        return false;
    };
    if signature.len() != 64 {
        return false;
    }
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    // Only low-S signatures are canonical.
    if signature.normalize_s().is_some() {
        return false;
    }
    let digest = Sha256::digest(message);
    verifying_key.verify_prehash(&digest, &signature).is_ok()
}

/// Derive a scheme id: `hex(SHA-256(issuer ‖ name))`, no separator.
pub fn derive_scheme_id(issuer: &Principal, name: &str) -> SchemeId {
    let mut hasher = Sha256::new();
    hasher.update(issuer.as_str().as_bytes());
    hasher.update(name.as_bytes());
    SchemeId(hex::encode(hasher.finalize()))
}

/// Canonical credential claim: the space-joined
/// `[schemeId, issuer, holder, timestamp, reward]`.
///
/// Off-chain signers hash exactly these bytes, so field order and the
/// single-space separator must never change.
pub fn credential_message(
    scheme_id: &SchemeId,
    issuer: &Principal,
    holder: &Principal,
    timestamp: Timestamp,
    reward: u64,
) -> String {
    [
        scheme_id.as_str().to_string(),
        issuer.as_str().to_string(),
        holder.as_str().to_string(),
        timestamp.to_string(),
        reward.to_string(),
    ]
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    /// secp256k1 group order, big-endian.
    const ORDER: [u8; 32] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
        0x41, 0x41,
    ];

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).unwrap()
    }

    fn public_key(sk: &SigningKey) -> Vec<u8> {
        sk.verifying_key().to_encoded_point(false).as_bytes().to_vec()
    }

    fn sign(sk: &SigningKey, message: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(message);
        let signature: Signature = sk.sign_prehash(&digest).unwrap();
        signature.to_bytes().to_vec()
    }

    /// Replace s with n - s, producing the high-S twin of a signature.
    fn to_high_s(signature: &[u8]) -> Vec<u8> {
        let mut out = signature.to_vec();
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = ORDER[i] as i16 - signature[32 + i] as i16 - borrow;
            if diff < 0 {
                out[32 + i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                out[32 + i] = diff as u8;
                borrow = 0;
            }
        }
        out
    }

    #[test]
    fn test_valid_signature_verifies() {
        let sk = test_key();
        let msg = b"Hello, loyalty!";
        assert!(verify_signature(&public_key(&sk), msg, &sign(&sk, msg)));
    }

    #[test]
    fn test_bare_64_byte_key_accepted() {
        let sk = test_key();
        let msg = b"bare point";
        let pk = public_key(&sk);
        assert_eq!(pk.len(), 65);
        assert!(verify_signature(&pk[1..], msg, &sign(&sk, msg)));
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let sk = test_key();
        let msg = b"message";
        let pk = public_key(&sk);
        let sig = sign(&sk, msg);
        for i in [0, 31, 32, 63] {
            let mut tampered = sig.clone();
            tampered[i] ^= 0x01;
            assert!(!verify_signature(&pk, msg, &tampered), "byte {} flip", i);
        }
    }

    #[test]
    fn test_flipped_message_byte_fails() {
        let sk = test_key();
        let msg = b"message".to_vec();
        let sig = sign(&sk, &msg);
        let mut tampered = msg.clone();
        tampered[0] ^= 0x01;
        assert!(!verify_signature(&public_key(&sk), &tampered, &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sk = test_key();
        let other = SigningKey::from_slice(&[0x07u8; 32]).unwrap();
        let msg = b"message";
        assert!(!verify_signature(&public_key(&other), msg, &sign(&sk, msg)));
    }

    #[test]
    fn test_high_s_signature_rejected() {
        let sk = test_key();
        let msg = b"canonical only";
        let pk = public_key(&sk);
        let sig = sign(&sk, msg);
        assert!(verify_signature(&pk, msg, &sig));
        assert!(!verify_signature(&pk, msg, &to_high_s(&sig)));
    }

    #[test]
    fn test_malformed_public_keys_return_false() {
        let sk = test_key();
        let msg = b"message";
        let sig = sign(&sk, msg);
        let pk = public_key(&sk);

        assert!(!verify_signature(&[], msg, &sig));
        assert!(!verify_signature(&pk[..33], msg, &sig));
        assert!(!verify_signature(&[0x04u8; 65], msg, &sig));

        let mut wrong_tag = pk.clone();
        wrong_tag[0] = 0x02;
        assert!(!verify_signature(&wrong_tag, msg, &sig));

        // Point not on the curve.
        let mut off_curve = pk.clone();
        off_curve[64] ^= 0x01;
        assert!(parse_public_key(&off_curve).is_none());
        assert!(!verify_signature(&off_curve, msg, &sig));
    }

    #[test]
    fn test_malformed_signatures_return_false() {
        let sk = test_key();
        let msg = b"message";
        let pk = public_key(&sk);
        assert!(!verify_signature(&pk, msg, &[]));
        assert!(!verify_signature(&pk, msg, &[0u8; 64]));
        assert!(!verify_signature(&pk, msg, &[0x11u8; 65]));
    }

    #[test]
    fn test_scheme_id_matches_concatenation_hash() {
        let issuer = Principal::new("store-principal");
        let id = derive_scheme_id(&issuer, "test_scheme");
        let expected = hex::encode(Sha256::digest(b"store-principaltest_scheme"));
        assert_eq!(id.as_str(), expected);
        assert_eq!(id.as_str().len(), 64);
    }

    #[test]
    fn test_scheme_id_differs_per_issuer() {
        let a = derive_scheme_id(&Principal::new("store-a"), "gold");
        let b = derive_scheme_id(&Principal::new("store-b"), "gold");
        assert_ne!(a, b);
    }

    #[test]
    fn test_credential_message_layout() {
        let msg = credential_message(
            &SchemeId::new("abc123"),
            &Principal::new("store-1"),
            &Principal::new("alice"),
            Timestamp::from_nanos(1_700_000_000_000_000_000),
            100,
        );
        assert_eq!(msg, "abc123 store-1 alice 1700000000000000000 100");
    }
}
