//! Callback message signatures.
//!
//! The platform signs `(token, timestamp, nonce, payload)` by sorting the four
//! strings lexicographically, concatenating them, and taking the lowercase
//! hex SHA-1 digest. Argument order therefore does not matter.

use sha1::{Digest, Sha1};

/// Compute the lowercase hex signature of the four inputs.
pub fn signature(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut parts = [token, timestamp, nonce, payload];
    parts.sort_unstable();
    let digest = Sha1::digest(parts.concat().as_bytes());
    format!("{:x}", digest)
}

/// Recompute the signature and compare it in constant time.
pub fn verify_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    payload: &str,
    expected: &str,
) -> bool {
    let computed = signature(token, timestamp, nonce, payload);
    constant_time_eq(computed.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison (XOR fold).
///
/// Returns true if and only if `a == b`. Time taken does not depend on how
/// many leading bytes match.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
