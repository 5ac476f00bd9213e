//! Dorudon CLI
//!
//! Operator front end for the dictionary store: open and migrate it, import
//! the dictionary source file once, and query or export what is stored.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use dorudon_core::{
    format_line, progress_channel, DictStore, IndexView, InputMethod, PopulationState,
};

/// Dorudon - character dictionary store
#[derive(Parser)]
#[command(name = "dorudon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Dorudon character dictionary store")]
#[command(long_about = "Dorudon keeps a character / input-method dictionary in a local SQLite store.\n\nThe store is populated once from a Unihan-style dictionary file and then queried by code, by input method, or by both.")]
struct Cli {
    /// Custom data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the store, migrating it if needed, and report whether it is populated
    Init,

    /// Populate an empty store from a dictionary source file
    Load {
        /// Path to the dictionary text file (read as "ascii")
        file: PathBuf,
    },

    /// Show stored values for a character code
    Lookup {
        /// Code as U+4E00, 0x4E00, or the character itself
        code: String,
        /// Restrict to one input method (e.g. kCangjie)
        #[arg(long)]
        im: Option<String>,
    },

    /// List the codes completed for an input method
    Codes {
        /// Input method name (e.g. kTotalStrokes)
        im: String,
        /// Maximum number of codes to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show store statistics
    Stats,

    /// Export every entry back to dictionary source format
    Export {
        /// Output file path
        output: PathBuf,
        /// Ordering: code-im, im-code or code
        #[arg(long, default_value = "code-im")]
        order: String,
    },

    /// Create a full backup of the SQLite database
    Backup {
        /// Output file path for the backup
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let store = open_store(cli.data_dir)?;

    let outcome = match cli.command {
        Commands::Init => run_init(&store).await,
        Commands::Load { file } => run_load(&store, file).await,
        Commands::Lookup { code, im } => run_lookup(&store, &code, im.as_deref()).await,
        Commands::Codes { im, limit } => run_codes(&store, &im, limit).await,
        Commands::Stats => run_stats(&store).await,
        Commands::Export { output, order } => run_export(&store, output, &order).await,
        Commands::Backup { output } => run_backup(&store, output).await,
    };
    store.close();
    outcome
}

fn open_store(data_dir: Option<PathBuf>) -> anyhow::Result<DictStore> {
    let db_path = data_dir.map(|dir| dir.join("dorudon.db"));
    Ok(DictStore::new(db_path)?)
}

/// Run init command
async fn run_init(store: &DictStore) -> anyhow::Result<()> {
    let state = store.init().await?;
    println!("{}", "=== Dorudon Store ===".cyan().bold());
    println!("{}: {}", "Location".white().bold(), store.path().display());
    println!("{}: {}", "Schema version".white().bold(), store.schema_version().await?);
    match state {
        PopulationState::Populated => println!("{}", "Dictionary is populated.".green()),
        _ => println!(
            "{}",
            "Dictionary is empty. Import it with `dorudon load <FILE>`.".yellow()
        ),
    }
    Ok(())
}

/// Run load command
async fn run_load(store: &DictStore, file: PathBuf) -> anyhow::Result<()> {
    let (tx, mut rx) = progress_channel();
    let printer = tokio::spawn(async move {
        let mut stderr = io::stderr();
        while let Ok(progress) = rx.recv().await {
            let filled = usize::from(progress.percent) / 5;
            let _ = write!(
                stderr,
                "\r[{}{}] {:>3}%  {}/{}",
                "#".repeat(filled),
                " ".repeat(20 - filled),
                progress.percent,
                progress.written,
                progress.total
            );
            let _ = stderr.flush();
        }
    });

    let result = store.load_from_file(&file, Some(tx)).await;
    // The sender is gone once the load returns, which ends the printer
    let _ = printer.await;
    eprintln!();

    match result {
        Ok(summary) => {
            println!(
                "{} {} entries from {} in {} ms",
                "Loaded".green().bold(),
                summary.entries,
                file.display(),
                summary.duration_ms
            );
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to load '{}'", file.display()))),
    }
}

/// Run lookup command
async fn run_lookup(store: &DictStore, code: &str, im: Option<&str>) -> anyhow::Result<()> {
    let code = parse_code(code)?;
    let entries: Vec<_> = match im {
        Some(name) => {
            let im = parse_im(name)?;
            store.lookup(code, im).await?.into_iter().collect()
        }
        None => store.entries_for_code(code).await?,
    };

    let glyph = char::from_u32(code).map(String::from).unwrap_or_default();
    println!("{} {}", format!("U+{:04X}", code).as_str().cyan().bold(), glyph);
    if entries.is_empty() {
        println!("  {}", "(no entries)".dimmed());
    }
    for entry in entries {
        let value = match &entry.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("  {:<16} {}", entry.im.name().white().bold(), value);
    }
    Ok(())
}

/// Run codes command
async fn run_codes(store: &DictStore, im: &str, limit: usize) -> anyhow::Result<()> {
    let im = parse_im(im)?;
    let codes = store.codes_for(im).await?;
    println!("{} {} codes", im.name().cyan().bold(), codes.len());
    for code in codes.iter().take(limit) {
        let glyph = char::from_u32(*code).map(String::from).unwrap_or_default();
        println!("  U+{:04X} {}", code, glyph);
    }
    if codes.len() > limit {
        println!("  {}", format!("... {} more", codes.len() - limit).as_str().dimmed());
    }
    Ok(())
}

/// Run stats command
async fn run_stats(store: &DictStore) -> anyhow::Result<()> {
    let state = store.init().await?;
    let total = store.entry_count().await?;

    println!("{}", "=== Dorudon Statistics ===".cyan().bold());
    println!("{}: {}", "Schema version".white().bold(), store.schema_version().await?);
    println!("{}: {:?}", "Population".white().bold(), state);
    println!("{}: {}", "Total entries".white().bold(), total);

    if total > 0 {
        println!();
        println!("{}", "=== Entries per Input Method ===".yellow().bold());
        for im in InputMethod::ALL {
            let count = store.codes_for(im).await?.len();
            println!("  {:<16} {}", im.name(), count);
        }
    }
    Ok(())
}

/// Run export command
async fn run_export(store: &DictStore, output: PathBuf, order: &str) -> anyhow::Result<()> {
    let view: IndexView = order.parse().map_err(|e: String| anyhow!(e))?;
    let entries = store.entries(view).await?;

    let file = std::fs::File::create(&output)
        .with_context(|| format!("cannot create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "# Exported by dorudon {} ({} order)", env!("CARGO_PKG_VERSION"), view)?;
    for entry in &entries {
        writeln!(writer, "{}", format_line(entry))?;
    }
    writer.flush()?;

    println!(
        "{} {} entries to {}",
        "Exported".green().bold(),
        entries.len(),
        output.display()
    );
    Ok(())
}

/// Run backup command
async fn run_backup(store: &DictStore, output: PathBuf) -> anyhow::Result<()> {
    if output.exists() {
        bail!("{} already exists; refusing to overwrite", output.display());
    }
    store.backup_to(&output).await?;
    println!("{} {}", "Backup written to".green().bold(), output.display());
    Ok(())
}

fn parse_im(name: &str) -> anyhow::Result<InputMethod> {
    name.parse().map_err(|e: String| {
        let known: Vec<&str> = InputMethod::ALL.iter().map(|im| im.name()).collect();
        anyhow!("{} (known: {})", e, known.join(", "))
    })
}

/// Accepts `U+4E00`, `0x4E00`, or a single character.
fn parse_code(raw: &str) -> anyhow::Result<u32> {
    let hex = raw
        .strip_prefix("U+")
        .or_else(|| raw.strip_prefix("u+"))
        .or_else(|| raw.strip_prefix("0x"))
        .or_else(|| raw.strip_prefix("0X"));
    if let Some(hex) = hex {
        return u32::from_str_radix(hex, 16).with_context(|| format!("invalid code: {}", raw));
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(u32::from(c)),
        _ => bail!("invalid code: {} (use U+XXXX, 0xXXXX or a single character)", raw),
    }
}
