//! CAN Diagnostics CLI
//!
//! Command-line front end for the diagnostics core. It is presentation glue
//! over the library:
//! - Decode/encode signal values against a stored signal set
//! - Merge observed byte ranges for a CAN ID selection and preview fuzz
//!   payloads constrained by them
//! - Import OBD-II sample files for offline correlation
//! - Rank a correlation engine response and show the derived signal

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use can_diag_core::fuzz::PayloadGenerator;
use can_diag_core::{
    codec, merge_byte_ranges, CanIdAnalysis, Candidate, SampleSet, SignalStore,
};

/// CAN diagnostics console - signal codec, byte ranges and discovery
#[derive(Parser, Debug)]
#[command(name = "can-diag-cli")]
#[command(about = "Decode CAN signals, merge byte ranges, rank discovery candidates", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode every stored signal of a CAN ID from a hex frame
    Decode {
        /// Path to the signal store JSON (bulk export format)
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
        /// CAN identifier, hex
        #[arg(long, value_name = "ID")]
        id: String,
        /// Frame payload, hex string (e.g. 00000BB800000000)
        #[arg(long, value_name = "HEX")]
        frame: String,
    },

    /// Encode a physical value into a frame for one stored signal
    Encode {
        /// Path to the signal store JSON
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
        /// CAN identifier, hex
        #[arg(long, value_name = "ID")]
        id: String,
        /// Signal name within the CAN ID
        #[arg(long, value_name = "NAME")]
        signal: String,
        /// Physical value to encode
        #[arg(long, value_name = "VALUE")]
        value: f64,
    },

    /// Merge byte ranges of selected CAN IDs from a capture analysis
    Ranges {
        /// Path to the per-identifier analysis JSON (array)
        #[arg(long, value_name = "FILE")]
        analysis: PathBuf,
        /// CAN identifier to include (can be repeated)
        #[arg(long = "select", value_name = "ID")]
        selected: Vec<String>,
        /// Also generate this many fuzz payloads within the merged ranges
        #[arg(long, value_name = "COUNT")]
        fuzz: Option<usize>,
        /// Seed for reproducible fuzz payloads
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,
    },

    /// Check an OBD sample file for offline correlation
    Import {
        /// Delimited text file, one "timestamp,value" pair per line
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,
    },

    /// Rank the candidates of a correlation engine response
    Rank {
        /// Path to the engine response JSON
        #[arg(long, value_name = "FILE")]
        response: PathBuf,
        /// Name for the signal derived from the top candidate
        #[arg(long, value_name = "NAME", default_value = "Discovered")]
        name: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Diagnostics CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using core library v{}", can_diag_core::VERSION);

    match args.command {
        Command::Decode { db, id, frame } => decode_frame(&db, &id, &frame),
        Command::Encode { db, id, signal, value } => encode_value(&db, &id, &signal, value),
        Command::Ranges { analysis, selected, fuzz, seed } => {
            show_ranges(&analysis, &selected, fuzz, seed)
        }
        Command::Import { samples } => import_samples(&samples),
        Command::Rank { response, name } => rank_response(&response, &name),
    }
}

fn load_store(path: &PathBuf) -> Result<SignalStore> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read signal store {:?}", path))?;
    let mut store = SignalStore::new();
    store
        .import_json(&json)
        .with_context(|| format!("failed to parse signal store {:?}", path))?;
    Ok(store)
}

fn parse_hex_frame(hex: &str) -> Result<Vec<u8>> {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        bail!("frame hex must have an even number of digits");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte '{}'", &cleaned[i..i + 2]))
        })
        .collect()
}

fn decode_frame(db: &PathBuf, id: &str, frame: &str) -> Result<()> {
    let store = load_store(db)?;
    let data = parse_hex_frame(frame)?;

    let signals = store.signals_for(id);
    if signals.is_empty() {
        bail!("no signals stored for CAN ID {}", id);
    }

    println!("CAN ID {} ({} signal(s)):", can_diag_core::normalize_can_id(id), signals.len());
    for signal in signals {
        match codec::decode(signal, &data) {
            Ok(value) => {
                let unit = signal.unit.as_deref().unwrap_or("");
                println!("  {:<24} {:>12.3} {}", signal.name, value, unit);
            }
            Err(e) => println!("  {:<24} <error: {}>", signal.name, e),
        }
    }
    Ok(())
}

fn encode_value(db: &PathBuf, id: &str, name: &str, value: f64) -> Result<()> {
    let store = load_store(db)?;
    let signal = store
        .find(id, name)
        .with_context(|| format!("no signal '{}' for CAN ID {}", name, id))?;

    let data = codec::encode(signal, value)?;
    let hex: String = data.iter().map(|b| format!("{:02X}", b)).collect();
    println!("{} = {} -> frame {}", signal.name, value, hex);
    Ok(())
}

fn show_ranges(
    analysis: &PathBuf,
    selected: &[String],
    fuzz: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let json = fs::read_to_string(analysis)
        .with_context(|| format!("failed to read analysis {:?}", analysis))?;
    let analyses: Vec<CanIdAnalysis> =
        serde_json::from_str(&json).context("failed to parse capture analysis")?;

    if selected.is_empty() {
        bail!("select at least one CAN ID with --select");
    }

    let merged = merge_byte_ranges(&analyses, selected);
    if merged.is_empty() {
        println!("No byte ranges observed for the selected CAN IDs");
        return Ok(());
    }

    println!("{:<6} {:>5} {:>5} {:>7}", "byte", "min", "max", "unique");
    for range in &merged {
        println!(
            "{:<6} {:>5} {:>5} {:>7}",
            range.index,
            format!("{:02X}", range.min),
            format!("{:02X}", range.max),
            range.unique
        );
    }

    if let Some(count) = fuzz {
        let generator = PayloadGenerator::new(merged);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        println!("\n{} fuzz payload(s):", count);
        for _ in 0..count {
            let payload = generator.generate(&mut rng);
            let hex: String = payload.iter().map(|b| format!("{:02X}", b)).collect();
            println!("  {}", hex);
        }
    }

    Ok(())
}

fn import_samples(path: &PathBuf) -> Result<()> {
    let mut set = SampleSet::new();
    let imported = set.import_file(path)?;

    let first = set.samples().first().map(|s| s.timestamp).unwrap_or(0.0);
    let last = set.samples().last().map(|s| s.timestamp).unwrap_or(0.0);
    println!(
        "{} sample(s) spanning {:.1} s - ready for offline correlation",
        imported,
        last - first
    );
    Ok(())
}

fn rank_response(path: &PathBuf, name: &str) -> Result<()> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read engine response {:?}", path))?;
    let response: can_diag_core::CorrelationResponse =
        serde_json::from_str(&json).context("failed to parse engine response")?;

    let mut candidates: Vec<Candidate> = response.candidates;
    can_diag_core::candidate::rank_candidates(&mut candidates);

    println!(
        "{} candidate(s) from {} CAN IDs ({} frames, {:.1} ms engine time)",
        candidates.len(),
        response.total_ids_analyzed,
        response.total_frames_processed,
        response.elapsed_ms
    );

    for (i, c) in candidates.iter().enumerate() {
        println!(
            "{:>3}. {} bytes {}-{} [{}]  conf={:.3} ({})  pearson={:+.3} spearman={:+.3}",
            i + 1,
            c.can_id,
            c.byte_index,
            c.byte_end,
            c.model,
            c.confidence,
            c.tier(),
            c.pearson,
            c.spearman
        );
    }

    if let Some(top) = candidates.first() {
        let signal = top.to_signal(name);
        println!(
            "\nDerived signal '{}': CAN {} start_bit={} length={} {:?} scale={} offset={}",
            signal.name,
            signal.can_id,
            signal.start_bit,
            signal.length,
            signal.byte_order,
            signal.scale,
            signal.offset
        );
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
