//! Shared-secret verification.
//!
//! Both the configured and the presented secret are run through HMAC-SHA256
//! under a per-process random key, and the tags are compared with
//! [`Mac::verify_slice`]. The comparison therefore always covers two
//! fixed-length digests, whatever the inputs' lengths or where they differ.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use shipwright_types::{Secret, ShipwrightError};

type HmacSha256 = Hmac<Sha256>;

pub struct SecretVerifier {
    expected: Option<Secret>,
    key: [u8; 32],
}

impl SecretVerifier {
    pub fn new(expected: Option<Secret>) -> Self {
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        key[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self {
            expected: expected.filter(|s| !s.is_empty()),
            key,
        }
    }

    /// `Config` error when no secret is configured, `Auth` on mismatch.
    pub fn verify(&self, presented: &str) -> shipwright_types::Result<()> {
        let expected = self.expected.as_ref().ok_or_else(|| {
            ShipwrightError::Config("shared secret not configured".into())
        })?;
        let expected_tag = self.tag(expected.expose())?.finalize().into_bytes();
        self.tag(presented)?
            .verify_slice(&expected_tag)
            .map_err(|_| ShipwrightError::Auth)
    }

    fn tag(&self, value: &str) -> shipwright_types::Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| ShipwrightError::Other(format!("HMAC init failed: {e}")))?;
        mac.update(value.as_bytes());
        Ok(mac)
    }
}
