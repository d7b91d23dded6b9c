use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kitsune_lib::batch::BatchProcessor;
use kitsune_lib::blob::DecodedBlob;
use kitsune_lib::integrity;
use kitsune_lib::sink::FileKeyStore;
use kitsune_lib::source::{self, BlobSource, Decryptor, OpensslDecryptor, Passthrough};

/// Recover device keys from RSA-encrypted provisioning blobs, verify them
/// and optionally store them.
#[derive(Parser, Debug)]
#[command(name = "kitsune", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decrypt and verify every blob in a directory, optionally uploading the keys
    Decrypt(DecryptArgs),
    /// Decode a single blob and print its fields
    Inspect(InspectArgs),
    /// Print the version
    Version,
}

#[derive(Args, Debug)]
struct DecryptArgs {
    /// Directory containing individual blobs to be decrypted.
    #[arg(short, long, default_value = "blobs/")]
    dir: PathBuf,
    /// RSA private key used to decrypt the blobs.
    #[arg(long, default_value = "kitsune.pem")]
    inkey: PathBuf,
    /// Blobs are hex-encoded plaintext; skip RSA decryption.
    #[arg(long)]
    raw: bool,
    /// Extension of the blob files.
    #[arg(long, default_value = source::DEFAULT_EXTENSION)]
    extension: String,
    /// Output verbose logs: per-file progress, skipped files and the fields
    /// of every verified blob.
    #[arg(long)]
    debug: bool,
    /// Append verified key pairs to this key store file.
    #[arg(long, value_name = "KEY_STORE")]
    upload: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Blob file to decode.
    file: PathBuf,
    /// The file holds hex text rather than raw bytes.
    #[arg(long)]
    hex: bool,
}

/// Console output, plus a plain-text copy in `log_file` when given.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(log_file: Option<&Path>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let (file_writer, guard) = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file at: {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // -v / -q move the default level; RUST_LOG overrides it
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    let console = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .without_time();
    let file = file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false).with_target(false));

    tracing_subscriber::registry().with(filter).with(console).with(file).init();

    if let Some(path) = log_file {
        info!(path = ?path, "Logging to file");
    }
    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = init_tracing(cli.log_file.as_deref(), &cli.verbose)?;

    let result = match cli.command {
        Command::Decrypt(args) => run_decrypt(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Version => {
            println!("Version = {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        drop(guard);
        process::exit(1);
    }

    Ok(())
}

fn run_decrypt(args: DecryptArgs) -> Result<()> {
    if args.raw {
        let source = BlobSource::new(&args.dir, Passthrough)
            .with_extension(&args.extension)
            .verbose(args.debug);
        run_batch(source, &args)
    } else {
        let decryptor = OpensslDecryptor::new(&args.inkey);
        let source = BlobSource::new(&args.dir, decryptor)
            .with_extension(&args.extension)
            .verbose(args.debug);
        run_batch(source, &args)
    }
}

fn run_batch<D: Decryptor>(source: BlobSource<D>, args: &DecryptArgs) -> Result<()> {
    let mut processor = BatchProcessor::new().verbose(args.debug);
    if let Some(path) = &args.upload {
        let store = FileKeyStore::open(path)
            .with_context(|| format!("Failed to open key store at: {:?}", path))?;
        info!("Uploading verified keys to {:?}", path);
        processor = processor.with_sink(store);
    }

    let inputs = source
        .inputs()
        .with_context(|| format!("Failed to list blobs in {:?}", source.dir()))?;
    processor.run(inputs)?;
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let name = args.file.display().to_string();
    let contents = fs::read(&args.file).with_context(|| format!("Failed to read {}", name))?;
    let bytes = if args.hex {
        source::decode_hex_text(&name, &contents)?
    } else {
        contents
    };

    let blob = DecodedBlob::from_bytes(bytes.into())?;
    let verification = integrity::verify(&blob);
    println!("{}", blob);
    println!("Verified: {}", verification.verified);
    Ok(())
}
