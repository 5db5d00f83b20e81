//! Webhook authenticity: signature header parsing, manifest signing, and
//! freshness-checked verification.
//!
//! Senders sign the manifest `id:<dataId>;request-id:<requestId>;ts:<ts>;`
//! with HMAC-SHA256 and send `x-signature: ts=<unix>,v1=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the signed timestamp and now.
pub const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing the ts component")]
    MissingTimestamp,

    #[error("signature header is missing the v1 component")]
    MissingHash,

    #[error("signature timestamp is not a unix time: {0}")]
    InvalidTimestamp(String),

    #[error("signature timestamp is {age_secs}s old")]
    Expired { age_secs: i64 },

    #[error("signature timestamp is {ahead_secs}s in the future")]
    FromFuture { ahead_secs: i64 },

    #[error("signature does not match")]
    Mismatch,
}

/// The two components of an `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub hash: String,
}

impl SignatureHeader {
    /// Parse `ts=<unix>,v1=<hex>`. Component order is free and unknown
    /// components are ignored; both `ts` and `v1` are required.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut hash = None;

        for part in header.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key.trim() {
                    "ts" => timestamp = Some(value.trim()),
                    "v1" => hash = Some(value.trim()),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp
            .filter(|v| !v.is_empty())
            .ok_or(SignatureError::MissingTimestamp)?;
        let hash = hash
            .filter(|v| !v.is_empty())
            .ok_or(SignatureError::MissingHash)?;

        Ok(Self {
            timestamp: timestamp
                .parse()
                .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?,
            hash: hash.to_string(),
        })
    }
}

/// The exact string a sender signs.
pub fn signing_manifest(data_id: &str, request_id: &str, timestamp: i64) -> String {
    format!("id:{data_id};request-id:{request_id};ts:{timestamp};")
}

/// Hex-encoded HMAC-SHA256 of the manifest for the given components.
pub fn compute_signature(secret: &str, data_id: &str, request_id: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signing_manifest(data_id, request_id, timestamp).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an `x-signature` header against the notification it accompanies.
///
/// Freshness is checked before any cryptographic work. The digest
/// comparison is constant-time; a hash of the wrong length or that is not
/// valid hex is a mismatch, never a panic.
pub fn verify_signature(
    secret: &str,
    header: &str,
    data_id: &str,
    request_id: &str,
    now: i64,
    window_secs: i64,
) -> Result<(), SignatureError> {
    let parsed = SignatureHeader::parse(header)?;

    let age = now - parsed.timestamp;
    if age > window_secs {
        return Err(SignatureError::Expired { age_secs: age });
    }
    if -age > window_secs {
        return Err(SignatureError::FromFuture { ahead_secs: -age });
    }

    let provided = hex::decode(&parsed.hash).map_err(|_| SignatureError::Mismatch)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signing_manifest(data_id, request_id, parsed.timestamp).as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}
