use sha2::{Digest, Sha256};

/// Marker used in place of the address when fingerprinting MMS records.
pub const MMS_MARKER: &str = "mms";

/// Content identifier used as the sole dedup key for messages.
///
/// SHA-256 over `"{timestamp}:{address}:{body}"`, hex encoded. Field order
/// matters and the output depends on nothing but the three inputs.
pub fn fingerprint(timestamp: &str, address: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(b":");
    hasher.update(address.as_bytes());
    hasher.update(b":");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
