//! One-time capability probe for the primary cipher
//!
//! The probe runs a known-answer test of AES-256-GCM the first time it is
//! asked and caches the answer for the life of the process. Cipher choice
//! is routed on this cached value only, never on an error from the primary
//! path.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Whether the primary cipher can be used on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSupport {
    Available,
    Unavailable,
}

static PRIMARY_SUPPORT: OnceLock<CipherSupport> = OnceLock::new();

/// GCM test case 13 (AES-256, zero key, zero IV, empty plaintext): tag only.
const KAT_TAG: [u8; 16] = [
    0x53, 0x0f, 0x8a, 0xfb, 0xc7, 0x45, 0x36, 0xb9, 0xa9, 0x63, 0xb4, 0xf1, 0xc4, 0xcb, 0x73, 0x8b,
];

fn known_answer_test() -> bool {
    let key = [0u8; 32];
    let nonce = [0u8; 12];
    let empty: &[u8] = &[];
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let Ok(sealed) = cipher.encrypt(Nonce::from_slice(&nonce), empty) else {
        return false;
    };
    if sealed != KAT_TAG {
        return false;
    }
    matches!(cipher.decrypt(Nonce::from_slice(&nonce), &sealed[..]), Ok(p) if p.is_empty())
}

/// Report primary cipher support, probing on first use
pub fn primary_support() -> CipherSupport {
    *PRIMARY_SUPPORT.get_or_init(|| {
        if known_answer_test() {
            info!("AES-256-GCM self-test passed; primary cipher available");
            CipherSupport::Available
        } else {
            warn!("AES-256-GCM self-test failed; only the fallback obfuscation can be used");
            CipherSupport::Unavailable
        }
    })
}
