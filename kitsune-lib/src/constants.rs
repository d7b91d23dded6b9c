// Layout constants for key-provisioning blobs

/// Size of the leading filler region (80 bytes)
pub const PAD_SIZE: usize = 80;

/// Size of the recovered AES key (16 bytes)
pub const KEY_SIZE: usize = 16;

/// Size of the device identity (8 bytes)
pub const DEVICE_ID_SIZE: usize = 8;

/// Size of each single-byte separator between fields
pub const SEPARATOR_SIZE: usize = 1;

/// Offset of the key field (after pad and one separator)
pub const KEY_OFFSET: usize = PAD_SIZE + SEPARATOR_SIZE;

/// Offset of the device id field (after key and one separator)
pub const DEVICE_ID_OFFSET: usize = KEY_OFFSET + KEY_SIZE + SEPARATOR_SIZE;

/// Offset of the embedded checksum (after device id and one separator)
pub const CHECKSUM_OFFSET: usize = DEVICE_ID_OFFSET + DEVICE_ID_SIZE + SEPARATOR_SIZE;

/// Size of the fixed trailer that is discarded (2 bytes)
pub const TRAILER_SIZE: usize = 2;

/// Size of a SHA-1 digest (20 bytes)
pub const DIGEST_SIZE: usize = 20;

/// Minimum size of a blob: fixed header, empty checksum, trailer
pub const MIN_BLOB_SIZE: usize = CHECKSUM_OFFSET + TRAILER_SIZE;

/// Maximum size of a blob: fixed header, full digest, trailer
pub const MAX_BLOB_SIZE: usize = CHECKSUM_OFFSET + DIGEST_SIZE + TRAILER_SIZE;

/// Byte mixed in after each field when computing the checksum
pub const CHECKSUM_DELIMITER: u8 = 0x00;
