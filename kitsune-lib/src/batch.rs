//! Batch processing: decode, de-duplicate, verify and forward every blob
//! of one run, in order.
//!
//! Per file the processor goes Decoding -> duplicate check -> Verifying ->
//! Recording. Decode failures, duplicate identities, input failures and
//! sink failures abort the whole batch. A checksum mismatch is counted and
//! the batch moves on.

use crate::blob::{DecodedBlob, DeviceId};
use crate::constants::DIGEST_SIZE;
use crate::error::KitsuneError;
use crate::integrity;
use crate::sink::KeySink;
use bytes::Bytes;
use std::collections::HashMap;
use strum_macros::Display;
use tracing::{debug, error, info};

/// One decrypted blob buffer and the name of the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInput {
    pub name: String,
    pub bytes: Bytes,
}

impl BlobInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum BatchState {
    Running,
    Completed,
    /// Terminal; carries the rendered abort reason
    Aborted(String),
}

/// Diagnostic record for a blob whose checksum did not verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub file: String,
    pub device_id: DeviceId,
    pub computed_checksum: [u8; DIGEST_SIZE],
    pub provided_checksum: Bytes,
}

/// What happened to a single file that did not abort the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Verified {
        file: String,
        device_id: DeviceId,
        uploaded: bool,
    },
    Mismatch(MismatchReport),
}

/// Final counters of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub ok: usize,
    pub failed: usize,
    pub uploaded: usize,
}

/// Running state of one batch. Counters only ever grow.
#[derive(Debug, Default)]
pub struct BatchResult {
    seen_identities: HashMap<DeviceId, String>,
    ok_count: usize,
    fail_count: usize,
    uploaded_count: usize,
    mismatches: Vec<MismatchReport>,
}

impl BatchResult {
    pub fn ok_count(&self) -> usize {
        self.ok_count
    }

    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded_count
    }

    pub fn mismatches(&self) -> &[MismatchReport] {
        &self.mismatches
    }

    /// File that first presented this identity in the batch
    pub fn first_file_for(&self, device_id: &DeviceId) -> Option<&str> {
        self.seen_identities.get(device_id).map(String::as_str)
    }

    pub fn seen_count(&self) -> usize {
        self.seen_identities.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            ok: self.ok_count,
            failed: self.fail_count,
            uploaded: self.uploaded_count,
        }
    }

    /// Record a new identity, or return the file that already holds it
    fn claim_identity(&mut self, device_id: DeviceId, file: &str) -> Result<(), String> {
        if let Some(first) = self.seen_identities.get(&device_id) {
            return Err(first.clone());
        }
        self.seen_identities.insert(device_id, file.to_string());
        Ok(())
    }
}

/// Drives one batch run. Owns the batch state exclusively; create a new
/// processor per batch.
pub struct BatchProcessor<'a> {
    sink: Option<Box<dyn KeySink + 'a>>,
    verbose: bool,
    state: BatchState,
    result: BatchResult,
}

impl Default for BatchProcessor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BatchProcessor<'a> {
    pub fn new() -> Self {
        Self {
            sink: None,
            verbose: false,
            state: BatchState::Running,
            result: BatchResult::default(),
        }
    }

    /// Forward every verified blob to `sink`
    pub fn with_sink(mut self, sink: impl KeySink + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Include pad, redacted key, device id and checksum in OK reports
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn forwarding(&self) -> bool {
        self.sink.is_some()
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn result(&self) -> &BatchResult {
        &self.result
    }

    pub fn into_result(self) -> BatchResult {
        self.result
    }

    /// Process every input in order, then report totals.
    ///
    /// The first fatal error (from an input or from processing) aborts the
    /// batch and is returned; counters up to that point stay available via
    /// [`BatchProcessor::result`].
    pub fn run<I>(&mut self, inputs: I) -> Result<BatchSummary, KitsuneError>
    where
        I: IntoIterator<Item = Result<BlobInput, KitsuneError>>,
    {
        for input in inputs {
            let input = match input {
                Ok(input) => input,
                Err(err) => return Err(self.abort(err)),
            };
            self.process_file(&input.name, input.bytes)?;
        }
        self.finish()
    }

    /// Run a single file through the batch.
    pub fn process_file(&mut self, file: &str, bytes: Bytes) -> Result<FileOutcome, KitsuneError> {
        self.ensure_running()?;
        self.step(file, bytes).map_err(|err| self.abort(err))
    }

    /// Mark the batch completed and report the totals
    pub fn finish(&mut self) -> Result<BatchSummary, KitsuneError> {
        self.ensure_running()?;
        self.state = BatchState::Completed;

        let summary = self.result.summary();
        info!("Successfully decoded {} files", summary.ok);
        if summary.failed > 0 {
            error!("Failed decoding {} files", summary.failed);
        }
        if self.forwarding() {
            info!("Successfully uploaded: {} key pairs", summary.uploaded);
        }
        Ok(summary)
    }

    fn ensure_running(&self) -> Result<(), KitsuneError> {
        match &self.state {
            BatchState::Running => Ok(()),
            BatchState::Completed => Err(KitsuneError::BatchClosed("batch already completed".to_string())),
            BatchState::Aborted(reason) => Err(KitsuneError::BatchClosed(reason.clone())),
        }
    }

    fn abort(&mut self, err: KitsuneError) -> KitsuneError {
        debug!(reason = %err, ok = self.result.ok_count, "Batch aborted");
        self.state = BatchState::Aborted(err.to_string());
        err
    }

    fn step(&mut self, file: &str, bytes: Bytes) -> Result<FileOutcome, KitsuneError> {
        let blob = DecodedBlob::from_bytes(bytes)?;

        // Duplicates are fatal even when the checksum would not verify
        if let Err(first_file) = self.result.claim_identity(blob.device_id, file) {
            return Err(KitsuneError::DuplicateIdentity {
                device_id: blob.device_id.to_hex(),
                file: file.to_string(),
                first_file,
            });
        }

        let verification = integrity::verify(&blob);
        if !verification.verified {
            let report = MismatchReport {
                file: file.to_string(),
                device_id: blob.device_id,
                computed_checksum: verification.computed_checksum,
                provided_checksum: blob.provided_checksum.clone(),
            };
            report_mismatch(&report);
            self.result.fail_count += 1;
            self.result.mismatches.push(report.clone());
            return Ok(FileOutcome::Mismatch(report));
        }

        self.result.ok_count += 1;
        self.report_ok(file, &blob);

        let uploaded = match self.sink.as_mut() {
            Some(sink) => {
                sink.put(&blob.device_id.to_hex(), &blob.key_hex())?;
                self.result.uploaded_count += 1;
                true
            }
            None => false,
        };

        Ok(FileOutcome::Verified {
            file: file.to_string(),
            device_id: blob.device_id,
            uploaded,
        })
    }

    fn report_ok(&self, file: &str, blob: &DecodedBlob) {
        info!("[OK] {}", file);
        if self.verbose {
            info!("\tPad: {}", hex::encode(blob.pad));
            info!("\tKey: {}", blob.redacted_key());
            info!("\tDevice_id: {}", blob.device_id);
            info!("\tSha: {}", hex::encode_upper(&blob.provided_checksum));
        }
    }
}

fn report_mismatch(report: &MismatchReport) {
    error!("[FAIL] Sha doesn't match for file: {}", report.file);
    error!("\t-> Device_id: {}", report.device_id);
    error!("\t-> Computed sha: {}", hex::encode_upper(report.computed_checksum));
    error!("\t-> Provided sha: {}", hex::encode_upper(&report.provided_checksum));
}
