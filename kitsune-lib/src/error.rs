use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `kitsune-lib` library.
///
/// Every variant here aborts a batch. A checksum mismatch is not an error:
/// it is reported as [`crate::batch::FileOutcome::Mismatch`].
#[derive(Error, Debug)]
pub enum KitsuneError {
    #[error("Malformed blob: expected at least {expected} bytes, got {actual}")]
    MalformedBlob { expected: usize, actual: usize },

    #[error("Malformed blob: embedded checksum is {actual} bytes, longer than the {max}-byte digest")]
    ChecksumTooLong { max: usize, actual: usize },

    #[error("Duplicate for: {device_id} in file: {file}. Already seen in file: {first_file}")]
    DuplicateIdentity {
        device_id: String,
        file: String,
        first_file: String,
    },

    #[error("Failed to upload: {0}")]
    Sink(#[from] SinkError),

    #[error("Decryption failed for {file}: {message}")]
    Decrypt { file: String, message: String },

    #[error("Hex decoding failed for {file}: {source}")]
    HexDecode {
        file: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Batch is no longer running: {0}")]
    BatchClosed(String),
}

/// Errors returned by a [`crate::sink::KeySink`].
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Key store rejected record for {0}")]
    Rejected(String),

    #[error("Key store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Key store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
