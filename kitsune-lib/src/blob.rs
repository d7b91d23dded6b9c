//! Fixed-layout decoding of key-provisioning blobs.
//!
//! A blob is the plaintext produced by the upstream RSA decryption step.
//! Fields sit at fixed offsets:
//!
//! | Range          | Field       |
//! |----------------|-------------|
//! | `0..80`        | pad         |
//! | `80`           | separator   |
//! | `81..97`       | key         |
//! | `97`           | separator   |
//! | `98..106`      | device id   |
//! | `106`          | separator   |
//! | `107..len-2`   | checksum    |
//! | `len-2..len`   | trailer     |

use crate::constants::*;
use crate::error::KitsuneError;
use crate::integrity;
use bytes::Bytes;
use std::fmt;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The fixed 107-byte prefix of a blob, viewed in place.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct BlobHeaderRaw {
    pub pad: [u8; PAD_SIZE],
    pub sep0: u8,
    pub key: [u8; KEY_SIZE],
    pub sep1: u8,
    pub device_id: [u8; DEVICE_ID_SIZE],
    pub sep2: u8,
}

/// 8-byte identity of the device a blob is provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub [u8; DEVICE_ID_SIZE]);

impl DeviceId {
    pub fn as_bytes(&self) -> &[u8; DEVICE_ID_SIZE] {
        &self.0
    }

    /// Uppercase hex form, as used for key-store identities
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One decoded blob. Created per input file and dropped once its outcome
/// is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    /// Positional filler, kept only for diagnostics
    pub pad: [u8; PAD_SIZE],
    /// Recovered AES-128 key
    pub key: [u8; KEY_SIZE],
    pub device_id: DeviceId,
    /// Checksum embedded by the producer, possibly shorter than a full digest
    pub provided_checksum: Bytes,
    /// SHA-1 over key and device id, computed locally
    pub computed_checksum: [u8; DIGEST_SIZE],
}

impl DecodedBlob {
    /// Decode a blob from its raw plaintext bytes.
    ///
    /// Fails with [`KitsuneError::MalformedBlob`] when the buffer cannot hold
    /// the fixed fields plus trailer, and with [`KitsuneError::ChecksumTooLong`]
    /// when the embedded checksum would be longer than a SHA-1 digest.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, KitsuneError> {
        if bytes.len() < MIN_BLOB_SIZE {
            return Err(KitsuneError::MalformedBlob {
                expected: MIN_BLOB_SIZE,
                actual: bytes.len(),
            });
        }

        let checksum_end = bytes.len() - TRAILER_SIZE;
        let checksum_len = checksum_end - CHECKSUM_OFFSET;
        if checksum_len > DIGEST_SIZE {
            return Err(KitsuneError::ChecksumTooLong {
                max: DIGEST_SIZE,
                actual: checksum_len,
            });
        }

        let header = BlobHeaderRaw::ref_from_bytes(&bytes[..CHECKSUM_OFFSET]).map_err(|_| {
            KitsuneError::MalformedBlob {
                expected: CHECKSUM_OFFSET,
                actual: bytes.len(),
            }
        })?;

        let device_id = DeviceId(header.device_id);
        let computed_checksum = integrity::compute_checksum(&header.key, &device_id);

        Ok(Self {
            pad: header.pad,
            key: header.key,
            device_id,
            provided_checksum: bytes.slice(CHECKSUM_OFFSET..checksum_end),
            computed_checksum,
        })
    }

    /// Key rendered with only the first and last 4 bytes visible
    pub fn redacted_key(&self) -> String {
        format!(
            "{}XXXX{}",
            hex::encode_upper(&self.key[..4]),
            hex::encode_upper(&self.key[KEY_SIZE - 4..])
        )
    }

    pub fn key_hex(&self) -> String {
        hex::encode_upper(self.key)
    }
}

impl fmt::Display for DecodedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pad: {}", hex::encode_upper(self.pad))?;
        writeln!(f, "DeviceId: {}", self.device_id)?;
        writeln!(f, "Key: {}", self.redacted_key())?;
        writeln!(f, "Sha: {}", hex::encode_upper(&self.provided_checksum))?;
        write!(f, "ComputedSha: {}", hex::encode_upper(self.computed_checksum))
    }
}
