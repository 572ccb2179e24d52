//! AES-256-GCM envelope encryption for stored variable values.
//!
//! Envelope text: `hex(iv):hex(tag):hex(ciphertext)` with a 16-byte IV and a
//! 16-byte tag.

use crate::error::LinkmapError;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::RngCore;
use std::fmt;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

const MASK_CHAR: char = '•';
const MASK_MAX_DOTS: usize = 20;
const MASK_VISIBLE_PREFIX: usize = 4;

#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm16,
}

impl fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

impl SecretBox {
    /// Build from a 64-character hex key (32 bytes).
    pub fn from_hex_key(key_hex: &str) -> Result<Self, LinkmapError> {
        let key_hex = key_hex.trim();
        if key_hex.is_empty() {
            return Err(LinkmapError::InvalidKey(
                "encryption key is not set".to_string(),
            ));
        }
        let key = hex::decode(key_hex)
            .map_err(|e| LinkmapError::InvalidKey(format!("encryption key is not hex: {e}")))?;
        Self::from_key_bytes(&key)
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, LinkmapError> {
        if key.len() != KEY_LEN {
            return Err(LinkmapError::InvalidKey(format!(
                "expected {} key bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| LinkmapError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, LinkmapError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = self
            .cipher
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| LinkmapError::Crypto(format!("AES-GCM encrypt failed: {e}")))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String, LinkmapError> {
        let parts: Vec<&str> = envelope.split(':').collect();
        let [iv_hex, tag_hex, data_hex] = parts.as_slice() else {
            return Err(LinkmapError::malformed_envelope());
        };

        let iv = hex::decode(iv_hex).map_err(|_| LinkmapError::malformed_envelope())?;
        let tag = hex::decode(tag_hex).map_err(|_| LinkmapError::malformed_envelope())?;
        let mut sealed = hex::decode(data_hex).map_err(|_| LinkmapError::malformed_envelope())?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(LinkmapError::malformed_envelope());
        }
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::<U16>::from_slice(&iv), sealed.as_ref())
            .map_err(|e| LinkmapError::Crypto(format!("AES-GCM decrypt failed: {e}")))?;
        String::from_utf8(plaintext)
            .map_err(|_| LinkmapError::Crypto("decrypted value is not UTF-8".to_string()))
    }
}

/// Display form of a secret: the first four characters followed by up to 20
/// mask dots. Values of four characters or fewer are fully masked.
pub fn mask_value(value: &str) -> String {
    let len = value.chars().count();
    if len <= MASK_VISIBLE_PREFIX {
        return MASK_CHAR.to_string().repeat(MASK_VISIBLE_PREFIX);
    }
    let prefix: String = value.chars().take(MASK_VISIBLE_PREFIX).collect();
    let dots = (len - MASK_VISIBLE_PREFIX).min(MASK_MAX_DOTS);
    format!("{}{}", prefix, MASK_CHAR.to_string().repeat(dots))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_box() -> SecretBox {
        SecretBox::from_hex_key(&"a".repeat(64)).unwrap()
    }

    #[test]
    fn envelope_has_iv_tag_data() {
        let envelope = secret_box().encrypt("hello world").unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert!(!parts[2].is_empty());
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let sb = secret_box();
        assert_ne!(sb.encrypt("same text").unwrap(), sb.encrypt("same text").unwrap());
    }

    #[test]
    fn decrypts_what_it_encrypts() {
        let sb = secret_box();
        for plaintext in ["sk-proj-abc123XYZ", "한글 테스트 🔑", ""] {
            let envelope = sb.encrypt(plaintext).unwrap();
            assert_eq!(sb.decrypt(&envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn rejects_missing_or_bad_key() {
        assert!(matches!(
            SecretBox::from_hex_key(""),
            Err(LinkmapError::InvalidKey(_))
        ));
        assert!(SecretBox::from_hex_key("zz").is_err());
        assert!(SecretBox::from_hex_key(&"a".repeat(32)).is_err());
    }

    #[test]
    fn rejects_invalid_format() {
        let err = secret_box().decrypt("invalid").unwrap_err();
        assert!(err.to_string().contains("invalid encrypted data format"));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let sb = secret_box();
        let envelope = sb.encrypt("secret").unwrap();
        let mut parts: Vec<String> = envelope.split(':').map(str::to_string).collect();
        let flipped = if parts[2].starts_with("ff") { "00" } else { "ff" };
        parts[2] = format!("{}{}", flipped, &parts[2][2..]);
        assert!(sb.decrypt(&parts.join(":")).is_err());
    }

    #[test]
    fn rejects_wrong_key() {
        let envelope = secret_box().encrypt("secret").unwrap();
        let other = SecretBox::from_hex_key(&"b".repeat(64)).unwrap();
        assert!(other.decrypt(&envelope).is_err());
    }

    #[test]
    fn masks_long_values() {
        assert_eq!(mask_value("sk-proj-abc123"), "sk-p••••••••••");
    }

    #[test]
    fn masks_short_values_fully() {
        assert_eq!(mask_value("abc"), "••••");
        assert_eq!(mask_value("abcd"), "••••");
    }

    #[test]
    fn caps_mask_dots() {
        assert_eq!(mask_value(&"a".repeat(30)), format!("aaaa{}", "•".repeat(20)));
    }
}
