//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Fingerprint of a `(policy_id, policy_version, prompt)` triple:
/// `sha256(policy_id || 0x00 || decimal(version) || 0x00 || text)` as
/// lowercase hex.
///
/// The version is part of the key, so bumping a policy's version invalidates
/// every entry cached under the old one without any explicit flush.
pub fn fingerprint(policy_id: &str, policy_version: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(policy_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(policy_version.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
