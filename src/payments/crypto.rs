//! Request-signing primitives shared by the provider adapters.
//!
//! Every function here is pure and deterministic given (fields, secret,
//! timestamp). Each provider composes these into its own recipe; the
//! concatenation order is provider-defined and owned by the adapter.

use crate::payments::error::{PaymentError, PaymentResult};
use aes::Aes256;
use base64::{engine::general_purpose, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256, Sha384};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Ordered concatenation of `parts`, SHA-256, lowercase hex.
pub fn concat_sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Ordered concatenation of `parts`, SHA-384, lowercase hex.
pub fn concat_sha384_hex(parts: &[&str]) -> String {
    let mut hasher = Sha384::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 over `message`, lowercase hex. Used for header-signed
/// providers where the message is `client_id + timestamp + body`.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> PaymentResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        PaymentError::Validation {
            message: "invalid HMAC key".to_string(),
            field: None,
        }
    })?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checksum over outgoing form fields: secret prepended to the
/// concatenation of field *values* in submission order, SHA-256 hex.
pub fn form_checksum(secret: &str, values: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    for value in values {
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// AES-256-CBC/PKCS7 encryption of a single sensitive field.
///
/// Key is the shared secret left-padded with `'0'` to 32 bytes, IV the
/// request timestamp left-padded with `'0'` to 16 bytes. Output base64.
pub fn aes_cbc_encrypt_field(
    provider: &str,
    plaintext: &str,
    secret: &str,
    timestamp: &str,
) -> PaymentResult<String> {
    let config_err = || PaymentError::Configuration {
        provider: provider.to_string(),
    };
    let key: [u8; 32] = pad_left(secret, 32)
        .ok_or_else(config_err)?
        .try_into()
        .map_err(|_| config_err())?;
    let iv: [u8; 16] = pad_left(timestamp, 16)
        .ok_or_else(config_err)?
        .try_into()
        .map_err(|_| config_err())?;

    let msg = plaintext.as_bytes();
    let mut buf = vec![0u8; msg.len() + 16];
    buf[..msg.len()].copy_from_slice(msg);
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, msg.len())
        .map_err(|_| PaymentError::Configuration {
            provider: provider.to_string(),
        })?;

    Ok(general_purpose::STANDARD.encode(ciphertext))
}

/// RSA SHA-256 PKCS#1 v1.5 signature over a canonical string
/// (`timestamp|secret|minified_body`), base64-encoded for a request header.
/// Accepts PKCS#8 or PKCS#1 PEM private keys.
pub fn rsa_sha256_pkcs1_sign(
    provider: &str,
    private_key_pem: &str,
    message: &str,
) -> PaymentResult<String> {
    let key = match RsaPrivateKey::from_pkcs8_pem(private_key_pem) {
        Ok(key) => key,
        Err(_) => RsaPrivateKey::from_pkcs1_pem(private_key_pem).map_err(|_| {
            PaymentError::Configuration {
                provider: provider.to_string(),
            }
        })?,
    };
    let signing_key = SigningKey::<Sha256>::new(key);
    let signature = signing_key.sign(message.as_bytes());
    Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
}

/// Left-pads with ASCII `'0'` to exactly `width` bytes. Input longer
/// than `width` is refused rather than truncated: signing with partial
/// key material would produce ciphertexts the provider cannot decrypt.
fn pad_left(value: &str, width: usize) -> Option<Vec<u8>> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return None;
    }
    let mut out = vec![b'0'; width - bytes.len()];
    out.extend_from_slice(bytes);
    Some(out)
}
