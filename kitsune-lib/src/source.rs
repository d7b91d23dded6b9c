//! Input stage: turns a directory of hex-encoded ciphertext files into raw
//! blob buffers, one file at a time.
//!
//! Each file goes through hex decoding and then a [`Decryptor`]. Nothing is
//! written back to disk.

use crate::batch::BlobInput;
use crate::error::KitsuneError;
use bytes::Bytes;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, trace};

/// Default extension of ciphertext files
pub const DEFAULT_EXTENSION: &str = "txt";

/// Turns ciphertext into blob plaintext.
pub trait Decryptor {
    fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, KitsuneError>;
}

/// Inputs are already plaintext.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Decryptor for Passthrough {
    fn decrypt(&self, _name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, KitsuneError> {
        Ok(ciphertext.to_vec())
    }
}

/// Raw (unpadded) RSA decryption through the `openssl` command line tool.
#[derive(Debug, Clone)]
pub struct OpensslDecryptor {
    program: PathBuf,
    private_key: PathBuf,
}

impl OpensslDecryptor {
    pub fn new(private_key: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("openssl"),
            private_key: private_key.into(),
        }
    }

    /// Use a specific `openssl` binary instead of the one on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn failure(name: &str, message: impl Into<String>) -> KitsuneError {
        KitsuneError::Decrypt {
            file: name.to_string(),
            message: message.into(),
        }
    }
}

impl Decryptor for OpensslDecryptor {
    fn decrypt(&self, name: &str, ciphertext: &[u8]) -> Result<Vec<u8>, KitsuneError> {
        let mut child = Command::new(&self.program)
            .arg("pkeyutl")
            .arg("-decrypt")
            .arg("-pkeyopt")
            .arg("rsa_padding_mode:none")
            .arg("-inkey")
            .arg(&self.private_key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::failure(name, format!("failed to run {:?}: {}", self.program, e)))?;

        // openssl may exit before reading all of stdin; the child is still
        // reaped and its exit status takes precedence over the pipe error
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(ciphertext),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| Self::failure(name, format!("failed waiting for openssl: {}", e)))?;

        if !output.status.success() {
            return Err(Self::failure(
                name,
                format!(
                    "openssl exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        written.map_err(|e| Self::failure(name, format!("failed to write ciphertext: {}", e)))?;

        trace!(file = name, len = output.stdout.len(), "Decrypted blob");
        Ok(output.stdout)
    }
}

/// Decode hex text, ignoring whitespace and line breaks
pub fn decode_hex_text(name: &str, text: &[u8]) -> Result<Vec<u8>, KitsuneError> {
    let compact: Vec<u8> = text.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    hex::decode(compact).map_err(|source| KitsuneError::HexDecode {
        file: name.to_string(),
        source,
    })
}

/// A directory of ciphertext files feeding one batch.
///
/// Files are visited in ascending file-name order.
pub struct BlobSource<D> {
    dir: PathBuf,
    extension: String,
    decryptor: D,
    verbose: bool,
}

impl<D: Decryptor> BlobSource<D> {
    pub fn new(dir: impl Into<PathBuf>, decryptor: D) -> Self {
        Self {
            dir: dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            decryptor,
            verbose: false,
        }
    }

    /// Report per-file progress and skipped entries at info level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn progress(&self, message: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    /// Only pick up files with this extension (without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List candidate files, sorted by file name
    pub fn candidates(&self) -> Result<Vec<PathBuf>, KitsuneError> {
        let io_err = |source: std::io::Error| KitsuneError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();

            if entry.file_type().map_err(io_err)?.is_dir() {
                self.progress(format_args!("Skipping directory {:?}", path));
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                self.progress(format_args!(
                    "{:?} does not have the right extension",
                    path.file_name().unwrap_or_default()
                ));
                continue;
            }
            files.push(path);
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Read, hex-decode and decrypt a single file
    pub fn load(&self, path: &Path) -> Result<BlobInput, KitsuneError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.progress(format_args!("Processing file: {:?}", path));
        let text = fs::read(path).map_err(|source| KitsuneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ciphertext = decode_hex_text(&name, &text)?;
        let plaintext = self.decryptor.decrypt(&name, &ciphertext)?;

        Ok(BlobInput {
            name,
            bytes: Bytes::from(plaintext),
        })
    }

    /// Lazily load every candidate, in order
    pub fn inputs(&self) -> Result<impl Iterator<Item = Result<BlobInput, KitsuneError>> + '_, KitsuneError> {
        let files = self.candidates()?;
        Ok(files.into_iter().map(move |path| self.load(&path)))
    }
}
