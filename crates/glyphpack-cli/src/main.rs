//! Glyphpack command-line encoder
//!
//! ## Usage
//!
//! ```bash
//! # Encode a JSON manifest with the default tolerance (0.01)
//! glyphpack encode --input weights.json --output weights.gp
//!
//! # Tighter tolerance, one shared scheme, printable ASCII only
//! glyphpack encode -i weights.json --tolerance 0.002 --shared --alphabet ascii90
//!
//! # Back to a manifest; --config adds its custom alphabets
//! glyphpack decode -i weights.gp -o roundtrip.json --config pack.json
//! ```

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use glyphpack::prelude::*;
use glyphpack::{decode, into_collection, Alphabet, AlphabetSpec};

#[derive(Parser, Debug)]
#[command(name = "glyphpack")]
#[command(author = "Daemoniorum LLC")]
#[command(version)]
#[command(about = "Quantize network weights into a compact text payload", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON weight manifest into a payload
    Encode {
        /// Manifest path: {"arrays": [{"name", "shape", "values"}]}
        #[arg(short, long)]
        input: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Payload output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum per-element reconstruction error
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Bit-width search ceiling
        #[arg(long)]
        ceiling: Option<u32>,

        /// Use one scheme for every array
        #[arg(long)]
        shared: bool,

        /// Restrict the candidate alphabets (repeatable)
        #[arg(short, long = "alphabet")]
        alphabets: Vec<String>,

        /// Skip the decode-and-check pass
        #[arg(long)]
        no_verify: bool,
    },

    /// Decode a payload back into a JSON manifest
    Decode {
        /// Payload path
        #[arg(short, long)]
        input: PathBuf,

        /// JSON configuration whose custom alphabets the payload may use
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Manifest output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in alphabets
    Alphabets,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so a payload on stdout stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Encode {
            input,
            config,
            output,
            tolerance,
            ceiling,
            shared,
            alphabets,
            no_verify,
        } => {
            let mut config = match config {
                Some(path) => PackConfig::from_file(path)?,
                None => PackConfig::default(),
            };
            if let Some(tolerance) = tolerance {
                config.tolerance = tolerance;
            }
            if let Some(ceiling) = ceiling {
                config.bit_width_ceiling = ceiling;
            }
            if shared {
                config.per_array_scheme = false;
            }
            if !alphabets.is_empty() {
                config.alphabet_candidates =
                    alphabets.into_iter().map(AlphabetSpec::Preset).collect();
            }

            let collection = TensorCollection::from_json(&fs::read_to_string(&input)?)?;
            info!(
                "Loaded {} arrays ({} values) from {}",
                collection.len(),
                collection.total_elements(),
                input.display()
            );

            let payload = if no_verify {
                encode(&collection, &config)?
            } else {
                encode_verified(&collection, &config)?
            };

            match output {
                Some(path) => {
                    fs::write(&path, payload.text())?;
                    info!("Wrote {} chars to {}", payload.char_len(), path.display());
                    print!("{}", payload.report());
                }
                None => {
                    println!("{}", payload.text());
                    eprint!("{}", payload.report());
                }
            }
        }

        Command::Decode {
            input,
            config,
            output,
        } => {
            let alphabets = match config {
                Some(path) => PackConfig::from_file(path)?.decoder_alphabets()?,
                None => Alphabet::presets(),
            };
            let text = fs::read_to_string(&input)?;
            // Retry without the final newline editors and `encode` to stdout append
            let decoded = decode(&text, &alphabets).or_else(|e| match text.strip_suffix('\n') {
                Some(trimmed) => decode(trimmed, &alphabets),
                None => Err(e),
            })?;
            let collection = into_collection(decoded)?;
            info!("Decoded {} arrays from {}", collection.len(), input.display());

            let json = serde_json::to_string_pretty(&collection.to_manifest())?;
            match output {
                Some(path) => fs::write(path, json)?,
                None => println!("{}", json),
            }
        }

        Command::Alphabets => {
            for alphabet in Alphabet::presets() {
                let preview: String = alphabet.symbols().iter().take(16).collect();
                println!(
                    "{:<8} base {:>5}  {:>6.3} bits/char  {}...",
                    alphabet.name(),
                    alphabet.base(),
                    alphabet.bits_per_symbol(),
                    preview
                );
            }
        }
    }

    Ok(())
}
