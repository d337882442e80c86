//! Per-field encryption for the configuration document.
//!
//! Every value in a non-exempt section is independently sealed with
//! AES-256-GCM. The wire shape of one field is `base64(nonce || ciphertext)`
//! with a random 96-bit nonce, so re-encrypting a document never produces
//! the same text twice while decryption stays deterministic.
//!
//! Failure policy: a field that cannot be decrypted (tampered, wrong key,
//! not actually ciphertext) is logged at `warn` and left untouched; the
//! rest of the document always proceeds. Only storage I/O is allowed to
//! abort.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::warn;
use thiserror::Error;

use super::ConfigDocument;
use crate::keys::DerivedKey;

const NONCE_LEN: usize = 12;

/// Why a single field failed to seal or open. Never fatal.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("value too short to contain a nonce")]
    TooShort,

    #[error("authenticated decryption failed (wrong key or tampered value)")]
    Cipher,

    #[error("decrypted bytes are not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn cipher_for(key: &DerivedKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Seal one field value.
pub fn encrypt_field(key: &DerivedKey, plaintext: &str) -> Result<String, FieldError> {
    let cipher = cipher_for(key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| FieldError::Cipher)?;

    let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    framed.extend_from_slice(&nonce);
    framed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(framed))
}

/// Open one field value.
pub fn decrypt_field(key: &DerivedKey, armored: &str) -> Result<String, FieldError> {
    let framed = BASE64.decode(armored.trim())?;
    if framed.len() <= NONCE_LEN {
        return Err(FieldError::TooShort);
    }
    let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
    let cipher = cipher_for(key);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| FieldError::Cipher)?;
    Ok(String::from_utf8(plaintext)?)
}

/// Decrypt every value of every non-exempt section in place. Fields that
/// fail stay as they are, with a warning each.
pub fn decrypt_document(doc: &mut ConfigDocument, key: &DerivedKey) {
    for section in doc.encryptable_sections_mut() {
        let name = section.name().to_string();
        section.set_each(|field, value| match decrypt_field(key, value) {
            Ok(plain) => Some(plain),
            Err(e) => {
                warn!("decryption failed [{name}] -> {field}: {e}");
                None
            }
        });
    }
}

/// Symmetric counterpart of [`decrypt_document`], same per-field isolation.
pub fn encrypt_document(doc: &mut ConfigDocument, key: &DerivedKey) {
    for section in doc.encryptable_sections_mut() {
        let name = section.name().to_string();
        section.set_each(|field, value| match encrypt_field(key, value) {
            Ok(sealed) => Some(sealed),
            Err(e) => {
                warn!("encryption failed [{name}] -> {field}: {e}");
                None
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigDocument;
    use crate::keys::derive_key;

    const SAMPLE: &str = "\
[general]
name = box
company = acme

[influxdb]
url = http://localhost:8086
token = secret-token

[smtp]
password = hunter2
";

    #[test]
    fn field_round_trip() {
        let key = derive_key("pw");
        let sealed = encrypt_field(&key, "payload").unwrap();
        assert_ne!(sealed, "payload");
        assert_eq!(decrypt_field(&key, &sealed).unwrap(), "payload");
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sealed = encrypt_field(&derive_key("right"), "payload").unwrap();
        let err = decrypt_field(&derive_key("wrong"), &sealed).unwrap_err();
        assert!(matches!(err, FieldError::Cipher));
    }

    #[test]
    fn garbage_is_rejected_not_panicked() {
        let key = derive_key("pw");
        assert!(decrypt_field(&key, "not base64 at all!").is_err());
        assert!(decrypt_field(&key, "AAAA").is_err());
    }

    #[test]
    fn document_round_trip_restores_every_field() {
        let key = derive_key("pw");
        let original = ConfigDocument::parse(SAMPLE).unwrap();

        let mut doc = original.clone();
        encrypt_document(&mut doc, &key);
        assert_ne!(doc.get("influxdb", "token"), Some("secret-token"));
        assert_ne!(doc.get("smtp", "password"), Some("hunter2"));

        decrypt_document(&mut doc, &key);
        assert_eq!(doc, original);
    }

    #[test]
    fn exempt_sections_stay_plaintext() {
        let key = derive_key("pw");
        let mut doc = ConfigDocument::parse(SAMPLE).unwrap();
        encrypt_document(&mut doc, &key);
        assert_eq!(doc.machine_name(), Some("box"));
        assert_eq!(doc.company(), Some("acme"));
    }

    #[test]
    fn one_bad_field_never_aborts_the_rest() {
        let key = derive_key("pw");
        let mut doc = ConfigDocument::parse(SAMPLE).unwrap();
        encrypt_document(&mut doc, &key);
        doc.set("influxdb", "url", "corrupted-not-ciphertext");

        decrypt_document(&mut doc, &key);
        // The broken field keeps its marker value, the siblings decrypt.
        assert_eq!(doc.get("influxdb", "url"), Some("corrupted-not-ciphertext"));
        assert_eq!(doc.get("influxdb", "token"), Some("secret-token"));
        assert_eq!(doc.get("smtp", "password"), Some("hunter2"));
    }
}
