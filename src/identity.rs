use sha2::{Digest, Sha256};

// Limiter key derived from a device fingerprint. Never holds the raw fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn from_fingerprint(fingerprint: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(":");
        hasher.update(fingerprint);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Prefix used in log fields
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}
