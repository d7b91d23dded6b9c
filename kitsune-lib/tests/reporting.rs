//! Operator-facing report lines emitted while a batch runs

mod common;

use common::*;
use kitsune_lib::source::{BlobSource, Passthrough};
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

const KEY_AA: [u8; 16] = [0xAA; 16];
const FULL_KEY_AA: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Clone, Default)]
struct SharedLogBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter {
            buffer: self.buffer.clone(),
        }
    }
}

struct SharedLogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with an INFO-level subscriber scoped to this thread and return
/// everything it logged
fn capture_logs<F: FnOnce()>(f: F) -> String {
    let logs = SharedLogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_max_level(tracing::Level::INFO)
        .with_writer(logs.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = logs.buffer.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_ok_and_fail_report_lines() {
    let logs = capture_logs(|| {
        let summary = BatchProcessor::new()
            .verbose(true)
            .run(vec![
                input("a.txt", valid_blob(KEY_AA, [0xBB; 8])),
                input("b.txt", tampered_blob(KEY_AA, [0xCC; 8])),
            ])
            .unwrap();
        assert_eq!(summary, BatchSummary { ok: 1, failed: 1, uploaded: 0 });
    });

    assert!(logs.contains("[OK] a.txt"), "{}", logs);
    assert!(logs.contains(&format!("\tPad: {}", "5a".repeat(80))), "{}", logs);
    assert!(logs.contains("\tKey: AAAAAAAAXXXXAAAAAAAA"), "{}", logs);
    assert!(logs.contains("\tDevice_id: BBBBBBBBBBBBBBBB"), "{}", logs);
    let sha_a = hex::encode_upper(integrity::compute_checksum(&KEY_AA, &DeviceId([0xBB; 8])));
    assert!(logs.contains(&format!("\tSha: {}", sha_a)), "{}", logs);

    let computed_b = integrity::compute_checksum(&KEY_AA, &DeviceId([0xCC; 8]));
    let mut provided_b = computed_b;
    provided_b[19] ^= 0x01;
    assert!(logs.contains("[FAIL] Sha doesn't match for file: b.txt"), "{}", logs);
    assert!(logs.contains("\t-> Device_id: CCCCCCCCCCCCCCCC"), "{}", logs);
    assert!(
        logs.contains(&format!("\t-> Computed sha: {}", hex::encode_upper(computed_b))),
        "{}",
        logs
    );
    assert!(
        logs.contains(&format!("\t-> Provided sha: {}", hex::encode_upper(provided_b))),
        "{}",
        logs
    );

    assert!(logs.contains("Successfully decoded 1 files"), "{}", logs);
    assert!(logs.contains("Failed decoding 1 files"), "{}", logs);
    assert!(!logs.contains("Successfully uploaded"), "{}", logs);
}

#[test]
fn test_key_never_logged_in_full() {
    let logs = capture_logs(|| {
        BatchProcessor::new()
            .verbose(true)
            .with_sink(MemorySink::new())
            .run(vec![
                input("a.txt", valid_blob(KEY_AA, [0x01; 8])),
                input("b.txt", tampered_blob(KEY_AA, [0x02; 8])),
            ])
            .unwrap();
    });

    assert!(logs.contains("[FAIL]"), "{}", logs);
    assert!(!logs.contains(FULL_KEY_AA), "{}", logs);
}

#[test]
fn test_conditional_totals_absent_for_clean_batch() {
    let logs = capture_logs(|| {
        BatchProcessor::new()
            .run(vec![
                input("a.txt", valid_blob(KEY_AA, [0x01; 8])),
                input("b.txt", valid_blob(KEY_AA, [0x02; 8])),
            ])
            .unwrap();
    });

    assert!(logs.contains("[OK] a.txt"), "{}", logs);
    assert!(logs.contains("[OK] b.txt"), "{}", logs);
    assert!(logs.contains("Successfully decoded 2 files"), "{}", logs);
    assert!(!logs.contains("Failed decoding"), "{}", logs);
    assert!(!logs.contains("Successfully uploaded"), "{}", logs);
    // verbose fields only with the flag on
    assert!(!logs.contains("\tKey:"), "{}", logs);
    assert!(!logs.contains("\tPad:"), "{}", logs);
}

#[test]
fn test_upload_total_reported_when_forwarding() {
    let logs = capture_logs(|| {
        BatchProcessor::new()
            .with_sink(MemorySink::new())
            .run(vec![
                input("a.txt", valid_blob(KEY_AA, [0x01; 8])),
                input("b.txt", valid_blob(KEY_AA, [0x02; 8])),
            ])
            .unwrap();
    });

    assert!(logs.contains("Successfully uploaded: 2 key pairs"), "{}", logs);
    assert!(!logs.contains("Failed decoding"), "{}", logs);
}

#[test]
fn test_verbose_source_reports_progress_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), hex::encode(valid_blob(KEY_AA, [0x01; 8]))).unwrap();
    fs::write(dir.path().join("notes.md"), "ignored").unwrap();

    let run = |verbose: bool| {
        capture_logs(|| {
            let source = BlobSource::new(dir.path(), Passthrough).verbose(verbose);
            BatchProcessor::new().run(source.inputs().unwrap()).unwrap();
        })
    };

    let verbose_logs = run(true);
    assert!(verbose_logs.contains("Processing file:"), "{}", verbose_logs);
    assert!(verbose_logs.contains("\"notes.md\" does not have the right extension"), "{}", verbose_logs);

    let quiet_logs = run(false);
    assert!(quiet_logs.contains("[OK] a.txt"), "{}", quiet_logs);
    assert!(!quiet_logs.contains("Processing file:"), "{}", quiet_logs);
    assert!(!quiet_logs.contains("does not have the right extension"), "{}", quiet_logs);
}
