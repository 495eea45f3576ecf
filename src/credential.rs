//! Participant identifiers and access credentials
//!
//! The issuer only generates; uniqueness is enforced by the store's UNIQUE
//! constraints and enrollment regenerates on collision.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the opaque access credential
pub const CREDENTIAL_LEN: usize = 8;

/// Digits in a generated external identifier
pub const EXTERNAL_ID_DIGITS: u32 = 12;

/// A freshly generated identifier/credential pair, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub external_id: String,
    pub credential: String,
}

/// Source of new participant identifiers and credentials.
pub trait CredentialIssuer: Send + Sync {
    fn issue(&self) -> IssuedCredential;
}

/// Random numeric identifier, credential = first 8 hex chars of its SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestIssuer;

impl DigestIssuer {
    pub fn credential_for(external_id: &str) -> String {
        let digest = Sha256::digest(external_id.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(CREDENTIAL_LEN);
        encoded
    }
}

impl CredentialIssuer for DigestIssuer {
    fn issue(&self) -> IssuedCredential {
        let low = 10u64.pow(EXTERNAL_ID_DIGITS - 1);
        let high = 10u64.pow(EXTERNAL_ID_DIGITS);
        let external_id = rand::thread_rng().gen_range(low..high).to_string();
        let credential = Self::credential_for(&external_id);
        IssuedCredential {
            external_id,
            credential,
        }
    }
}

/// Whether `candidate` has the shape of an issued credential.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == CREDENTIAL_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_shape() {
        let issued = DigestIssuer.issue();
        assert_eq!(issued.external_id.len(), EXTERNAL_ID_DIGITS as usize);
        assert!(issued.external_id.bytes().all(|b| b.is_ascii_digit()));
        assert!(is_well_formed(&issued.credential));
    }

    #[test]
    fn test_credential_is_deterministic_digest() {
        assert_eq!(
            DigestIssuer::credential_for("123456"),
            DigestIssuer::credential_for("123456")
        );
        assert_ne!(
            DigestIssuer::credential_for("123456"),
            DigestIssuer::credential_for("123457")
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("0a1b2c3d"));
        assert!(!is_well_formed("0a1b2c3"));
        assert!(!is_well_formed("zzzzzzzz"));
    }
}
