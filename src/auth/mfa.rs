//! TOTP (RFC 6238, HMAC-SHA1, 6 digits, 30 s steps) and backup codes.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

pub const STEP_SECONDS: i64 = 30;
pub const DIGITS: u32 = 6;
const SECRET_BYTES: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
// no 0/o, 1/l/i
const BACKUP_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

#[derive(Debug, Error, PartialEq)]
pub enum MfaError {
    #[error("TOTP secret is not valid base32")]
    InvalidSecret,

    #[error("Could not build provisioning URI: {0}")]
    Uri(String),
}

pub fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Case-insensitive; spaces and `=` padding are ignored
pub fn base32_decode(input: &str) -> Result<Vec<u8>, MfaError> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for ch in input.chars().filter(|c| !c.is_whitespace() && *c != '=') {
        let upper = ch.to_ascii_uppercase() as u8;
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a == upper)
            .ok_or(MfaError::InvalidSecret)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    if out.is_empty() {
        return Err(MfaError::InvalidSecret);
    }
    Ok(out)
}

/// New random shared secret, base32 encoded
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes[..]);
    base32_encode(&bytes)
}

/// `otpauth://` provisioning URI; clients render it as a QR code
pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> Result<String, MfaError> {
    let label = format!("{}:{}", urlencoding::encode(issuer), urlencoding::encode(account));
    let mut uri = Url::parse(&format!("otpauth://totp/{}", label)).map_err(|e| MfaError::Uri(e.to_string()))?;
    uri.query_pairs_mut()
        .append_pair("secret", secret)
        .append_pair("issuer", issuer)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", &DIGITS.to_string())
        .append_pair("period", &STEP_SECONDS.to_string());
    Ok(uri.to_string())
}

pub fn step_at(unix_seconds: i64) -> i64 {
    unix_seconds.div_euclid(STEP_SECONDS)
}

fn hotp(key: &[u8], counter: u64, digits: u32) -> Result<u32, MfaError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| MfaError::InvalidSecret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | digest[offset + 3] as u32;
    Ok(binary % 10u32.pow(digits))
}

pub fn code_for_step(secret: &str, step: i64) -> Result<String, MfaError> {
    let key = base32_decode(secret)?;
    let value = hotp(&key, step as u64, DIGITS)?;
    Ok(format!("{:0width$}", value, width = DIGITS as usize))
}

pub fn code_at(secret: &str, unix_seconds: i64) -> Result<String, MfaError> {
    code_for_step(secret, step_at(unix_seconds))
}

/// Checks `code` against every step within `window` of `unix_seconds`.
/// Returns the matching step so callers can reject its reuse.
pub fn verify_code(secret: &str, code: &str, unix_seconds: i64, window: i64) -> Result<Option<i64>, MfaError> {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let current = step_at(unix_seconds);
    for step in (current - window)..=(current + window) {
        if step < 0 {
            continue;
        }
        let expected = code_for_step(secret, step)?;
        if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
            return Ok(Some(step));
        }
    }
    Ok(None)
}

/// Whether the input looks like a TOTP code rather than a backup code
pub fn is_totp_shaped(code: &str) -> bool {
    let code = code.trim();
    code.len() == DIGITS as usize && code.bytes().all(|b| b.is_ascii_digit())
}

/// Backup codes in `xxxxx-xxxxx` form
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut code = String::with_capacity(11);
            for i in 0..10 {
                if i == 5 {
                    code.push('-');
                }
                code.push(BACKUP_ALPHABET[rng.gen_range(0..BACKUP_ALPHABET.len())] as char);
            }
            code
        })
        .collect()
}

/// SHA-256 hex of the normalized code (case, dashes and spaces ignored)
pub fn hash_backup_code(code: &str) -> String {
    let normalized: String = code
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}
