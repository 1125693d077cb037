//! Commentseal CLI - encode and decode comment payloads
//!
//! Command-line interface for encoding text into commentseal payloads and
//! back, using AES-256-GCM with PBKDF2 key derivation.

use clap::{Parser, Subcommand};
use std::error::Error as StdError;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use commentseal::error::{CommentSealError, ErrorCategory, ErrorKind, Result};
use commentseal::passphrase::{
    FileSecretStore, PassphraseReader, ReaderPassphraseReader, SecretStore,
    StoredPassphraseReader, TerminalPassphraseReader,
};
use commentseal::{Codec, CodecConfig, PayloadClass, classify, file_ops, kdf};

#[derive(Parser)]
#[command(name = "commentseal")]
#[command(version)]
#[command(about = "Passphrase-based encryption of comments.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Read the passphrase from (or, with `secret`, manage) this secret file
    #[arg(long, global = true, value_name = "FILE", env = "COMMENTSEAL_SECRET_FILE")]
    secret_file: Option<PathBuf>,

    /// JSON file with codec settings (iterations, salt_len, nonce_len, fallback_rounds)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// PBKDF2 iteration count; overrides the config file
    #[arg(long, global = true, value_name = "N")]
    iterations: Option<u32>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a text file into a payload
    #[command(alias = "e")]
    Encode {
        /// Path to the file whose contents is to be encoded
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the payload to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decode a payload file
    #[command(alias = "d")]
    Decode {
        /// Path to the file holding the payload
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the decoded text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Update a payload file with new content, while validating
    /// that the passphrase is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file whose contents is to be encoded
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing payload file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Print whether a file holds plaintext, a primary or a fallback payload
    Classify {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Read a passphrase and print strength warnings, if any
    CheckSecret,

    /// Manage the secret file given by --secret-file
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Read a passphrase and store it in the secret file
    Set,
    /// Remove the secret file
    Clear,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", report(&e));
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Encode { ref input, ref output } => {
            let codec = load_codec(&cli)?;
            let mut reader = get_passphrase_reader(&cli);
            file_ops::encode_file(&codec, input, output, &mut *reader)
        }
        Commands::Decode { ref input, ref output } => {
            let codec = load_codec(&cli)?;
            let mut reader = get_passphrase_reader(&cli);
            file_ops::decode_file(&codec, input, output, &mut *reader)
        }
        Commands::Update { ref input, ref output } => {
            let codec = load_codec(&cli)?;
            let mut reader = get_passphrase_reader(&cli);
            file_ops::update_file(&codec, input, output, &mut *reader)
        }
        Commands::Classify { ref input } => {
            let text = fs::read_to_string(input).map_err(|e| {
                CommentSealError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to read from {}", input.display()),
                    e,
                )
            })?;
            let class = match classify(text.trim_end()) {
                PayloadClass::Plaintext => "plaintext",
                PayloadClass::Primary => "primary",
                PayloadClass::Fallback => "fallback",
            };
            println!("{}", class);
            Ok(())
        }
        Commands::CheckSecret => {
            let passphrase = get_passphrase_reader(&cli).read_passphrase()?;
            let warnings = kdf::assess_secret(&passphrase);
            if warnings.is_empty() {
                println!("no warnings");
            }
            for warning in warnings {
                println!("warning: {}", warning);
            }
            Ok(())
        }
        Commands::Secret { ref action } => {
            let path = cli.secret_file.clone().ok_or_else(|| {
                CommentSealError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::SecretUnavailable,
                    "--secret-file is required for secret management",
                )
            })?;
            let mut store = FileSecretStore::new(path);
            match action {
                SecretAction::Set => {
                    let passphrase = interactive_reader(cli.passphrase_stdin).read_passphrase()?;
                    if passphrase.is_empty() {
                        return Err(CommentSealError::with_kind(
                            ErrorCategory::User,
                            ErrorKind::InvalidSecret,
                            "refusing to store an empty secret",
                        ));
                    }
                    for warning in kdf::assess_secret(&passphrase) {
                        eprintln!("warning: {}", warning);
                    }
                    store.set(&passphrase)
                }
                SecretAction::Clear => store.clear(),
            }
        }
    }
}

fn load_codec(cli: &Cli) -> Result<Codec> {
    let mut config = match &cli.config {
        Some(path) => CodecConfig::from_json_file(path)?,
        None => CodecConfig::default(),
    };
    if let Some(iterations) = cli.iterations {
        config = config.with_iterations(iterations);
    }
    Codec::new(config)
}

fn get_passphrase_reader(cli: &Cli) -> Box<dyn PassphraseReader> {
    match &cli.secret_file {
        Some(path) => Box::new(StoredPassphraseReader::new(FileSecretStore::new(path))),
        None => interactive_reader(cli.passphrase_stdin),
    }
}

fn interactive_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

/// Render an error and its chain of sources on one line.
fn report(err: &CommentSealError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
