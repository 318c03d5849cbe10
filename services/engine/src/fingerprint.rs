//! Payload fingerprints for idempotency conflict detection.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 over the canonical JSON serialization of a payload, hex-encoded.
///
/// Two envelopes under the same idempotency key must carry the same
/// fingerprint to count as a replay; a differing fingerprint is a conflict.
pub fn payload_fingerprint<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let data = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}
