//! Award attestations and the attestation key file.

use loyalty_core::{Principal, SchemeId, TagId};
use loyalty_vault::AttestationSigner;
use std::path::Path;
use tracing::info;

use crate::error::{RootError, RootResult};

/// Bytes signed when `holder` is awarded `tag_id`.
pub fn tag_message(tag_id: &TagId, holder: &Principal) -> String {
    format!("tag {} {}", tag_id, holder)
}

/// Bytes signed when `holder` is awarded store scheme `scheme_id`.
pub fn scheme_message(scheme_id: &SchemeId, holder: &Principal) -> String {
    format!("scheme {} {}", scheme_id, holder)
}

/// Read the hex seed at `path`.
pub fn load_signer(path: &Path) -> RootResult<AttestationSigner> {
    let seed_hex = zeroize::Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
        RootError::Config(format!(
            "cannot read attestation key {}: {}",
            path.display(),
            e
        ))
    })?);
    Ok(AttestationSigner::from_hex(&seed_hex)?)
}

/// Load the key at `path`, generating and writing a fresh one if absent.
/// The flag is `true` when a new key was written.
pub fn load_or_create_signer(path: &Path) -> RootResult<(AttestationSigner, bool)> {
    if path.exists() {
        return Ok((load_signer(path)?, false));
    }
    let signer = AttestationSigner::generate();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(RootError::Io)?;
    }
    std::fs::write(path, signer.seed_hex().as_bytes()).map_err(RootError::Io)?;
    info!(path = %path.display(), "attestation key generated");
    Ok((signer, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::Signer;

    #[test]
    fn test_messages_are_prefixed_by_kind() {
        let holder = Principal::new("alice");
        assert_eq!(tag_message(&TagId::new("gold"), &holder), "tag gold alice");
        assert_eq!(
            scheme_message(&SchemeId::new("ab12"), &holder),
            "scheme ab12 alice"
        );
    }

    #[test]
    fn test_tag_and_scheme_messages_never_collide() {
        let holder = Principal::new("alice");
        assert_ne!(
            tag_message(&TagId::new("x"), &holder),
            scheme_message(&SchemeId::new("x"), &holder)
        );
    }

    #[test]
    fn test_load_or_create_is_stable() {
        let dir = std::env::temp_dir().join(format!("loyalty-test-key-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("attestation.key");

        let (first, created) = load_or_create_signer(&path).unwrap();
        assert!(created);
        let (second, created) = load_or_create_signer(&path).unwrap();
        assert!(!created);
        assert_eq!(first.public_key_ed25519(), second.public_key_ed25519());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_key_is_config_error() {
        let err = load_signer(Path::new("/nonexistent/attestation.key")).err().expect("expected an error");
        assert!(matches!(err, RootError::Config(_)));
    }
}
