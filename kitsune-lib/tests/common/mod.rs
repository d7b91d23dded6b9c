//! Shared fixtures for integration tests

// Not every test file uses every helper
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use kitsune_lib::batch::{BatchProcessor, BatchState, BatchSummary, BlobInput, FileOutcome};
#[allow(unused_imports)]
pub use kitsune_lib::blob::{DecodedBlob, DeviceId};
#[allow(unused_imports)]
pub use kitsune_lib::error::{KitsuneError, SinkError};
#[allow(unused_imports)]
pub use kitsune_lib::integrity;
#[allow(unused_imports)]
pub use kitsune_lib::sink::{FileKeyStore, KeySink, MemorySink};

/// Build a raw blob with the given key and device id.
///
/// `checksum` overrides the embedded checksum; by default the full correct
/// digest is embedded.
#[allow(dead_code)]
pub fn build_blob(key: [u8; 16], device_id: [u8; 8], checksum: Option<&[u8]>) -> Vec<u8> {
    let digest = integrity::compute_checksum(&key, &DeviceId(device_id));
    let checksum = checksum.unwrap_or(&digest);

    let mut buf = vec![0x5A; 80];
    buf.push(0x00);
    buf.extend_from_slice(&key);
    buf.push(0x00);
    buf.extend_from_slice(&device_id);
    buf.push(0x00);
    buf.extend_from_slice(checksum);
    buf.extend_from_slice(&[0x00, 0x00]);
    buf
}

/// A blob whose embedded checksum verifies
#[allow(dead_code)]
pub fn valid_blob(key: [u8; 16], device_id: [u8; 8]) -> Vec<u8> {
    build_blob(key, device_id, None)
}

/// A blob with the last checksum byte flipped
#[allow(dead_code)]
pub fn tampered_blob(key: [u8; 16], device_id: [u8; 8]) -> Vec<u8> {
    let mut digest = integrity::compute_checksum(&key, &DeviceId(device_id));
    digest[19] ^= 0x01;
    build_blob(key, device_id, Some(&digest[..]))
}

#[allow(dead_code)]
pub fn input(name: &str, bytes: Vec<u8>) -> Result<BlobInput, KitsuneError> {
    Ok(BlobInput::new(name, bytes))
}

/// Route library logs to the test harness output
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .without_time()
        .try_init();
}
