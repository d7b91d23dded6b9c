//! Checksum binding between a blob's key and its device identity.
//!
//! The producer embeds `SHA-1(key || 0x00 || device_id || 0x00)` after the
//! device id. Because the device id is mixed in, a checksum copied from
//! another device's blob never verifies.
//!
//! Producers may embed a truncated checksum. Only the bytes actually present
//! are compared against the same-length prefix of the computed digest, so an
//! empty embedded checksum verifies.

use crate::blob::{DecodedBlob, DeviceId};
use crate::constants::{CHECKSUM_DELIMITER, DIGEST_SIZE};
use sha1::{Digest, Sha1};

/// Result of checking one blob's embedded checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub computed_checksum: [u8; DIGEST_SIZE],
    pub verified: bool,
}

/// Compute the expected checksum for a key and device id
pub fn compute_checksum(key: &[u8], device_id: &DeviceId) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update([CHECKSUM_DELIMITER]);
    hasher.update(device_id.as_bytes());
    hasher.update([CHECKSUM_DELIMITER]);
    hasher.finalize().into()
}

/// Compare a provided checksum against the prefix of `computed` it covers.
///
/// Every byte is examined; the result does not reveal where a mismatch was.
/// A provided checksum longer than the digest never matches.
pub fn checksum_matches(provided: &[u8], computed: &[u8; DIGEST_SIZE]) -> bool {
    if provided.len() > DIGEST_SIZE {
        return false;
    }
    provided
        .iter()
        .zip(computed.iter())
        .fold(0u8, |diff, (p, c)| diff | (p ^ c))
        == 0
}

/// Compare the embedded checksum with the one computed when the blob was
/// decoded (see [`DecodedBlob::from_bytes`]).
pub fn verify(blob: &DecodedBlob) -> Verification {
    Verification {
        computed_checksum: blob.computed_checksum,
        verified: checksum_matches(&blob.provided_checksum, &blob.computed_checksum),
    }
}
