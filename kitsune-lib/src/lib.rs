pub mod batch;
pub mod blob;
pub mod constants;
pub mod error;
pub mod integrity;
pub mod sink;
pub mod source;


// Re-export the pieces most callers need
pub use batch::{BatchProcessor, BatchResult, BlobInput, FileOutcome};
pub use blob::{DecodedBlob, DeviceId};
pub use error::KitsuneError;
pub use sink::{FileKeyStore, KeySink, MemorySink};
pub use source::{BlobSource, Decryptor, OpensslDecryptor, Passthrough};
