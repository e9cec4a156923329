//! Unsubscribe-link token signing.
//!
//! Tokens are `{username}.{signature}` where the signature is a keyed SHA-256
//! over a fixed salt, the configured secret, and the username. Stable for a
//! given user (digests rendered on retry carry the same link) and unguessable
//! without the secret.

use sha2::{Digest, Sha256};

const SALT: &str = "unsubscribe-salt";

#[derive(Debug, Clone)]
pub struct UnsubscribeSigner {
    secret: String,
}

impl UnsubscribeSigner {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produce a signed unsubscribe token for a username.
    #[must_use]
    pub fn make_token(&self, username: &str) -> String {
        format!("{username}.{}", self.signature(username))
    }

    /// Validate a token, returning the username it was issued for.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<String> {
        let (username, signature) = token.rsplit_once('.')?;
        // Compare hashes of the signatures rather than the raw strings so the
        // comparison does not leak a matching prefix length.
        let expected = self.signature(username);
        if Sha256::digest(signature.as_bytes()) == Sha256::digest(expected.as_bytes()) {
            Some(username.to_string())
        } else {
            None
        }
    }

    fn signature(&self, username: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(SALT.as_bytes());
        hasher.update(self.secret.as_bytes());
        hasher.update(username.as_bytes());
        hex::encode(hasher.finalize())
    }
}
