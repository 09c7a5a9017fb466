//! Server-issued guest credentials.
//!
//! A credential is `"<uuid>.<base64url(HMAC-SHA256(secret, uuid))>"`. Only
//! the uuid part is stored as a conversation owner.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct GuestSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for GuestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GuestSigner(..)")
    }
}

impl GuestSigner {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("invalid guest signing key: {e}"))?;
        Ok(Self { mac })
    }

    /// Mint a credential for a fresh guest id.
    pub fn issue(&self) -> String {
        self.sign(&Uuid::new_v4().to_string())
    }

    pub fn sign(&self, guest_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(guest_id.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{guest_id}.{tag}")
    }

    /// Return the guest id when `credential` carries a valid signature.
    pub fn verify(&self, credential: &str) -> Option<String> {
        let (guest_id, tag) = credential.trim().split_once('.')?;
        Uuid::parse_str(guest_id).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac.clone();
        mac.update(guest_id.as_bytes());
        mac.verify_slice(&tag).ok()?;
        Some(guest_id.to_owned())
    }
}
