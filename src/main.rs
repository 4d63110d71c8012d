//! Kunai CLI - Command-line tool for package table extraction.
//!
//! This is the main entry point for the Kunai command-line application.

mod config;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use hashbrown::HashSet;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use kunai::prelude::*;

use crate::config::SettingsFile;

/// Extension used for entries with no better name.
const DEFAULT_EXTENSION: &str = "bin";

/// Kunai - package table extraction tool
#[derive(Parser)]
#[command(name = "kunai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of every mounted table
    List {
        /// Game data root directory
        #[arg(short, long, env = "KUNAI_ROOT")]
        root: PathBuf,

        /// Title settings file (JSON)
        #[arg(short, long, env = "KUNAI_SETTINGS")]
        settings: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// File list mapping entry paths to names
        #[arg(long)]
        file_list: Option<PathBuf>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract entries to a directory
    Extract {
        /// Game data root directory
        #[arg(short, long, env = "KUNAI_ROOT")]
        root: PathBuf,

        /// Title settings file (JSON)
        #[arg(short, long, env = "KUNAI_SETTINGS")]
        settings: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// File list mapping entry paths to names
        #[arg(long)]
        file_list: Option<PathBuf>,

        /// Resize mismatched payloads instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Decompress a single chunked blob
    Decompress {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Expected decompressed size in bytes
        #[arg(short, long)]
        size: usize,

        /// Resize mismatched output instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Compress a file into the chunked format
    Compress {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Uncompressed bytes per chunk
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List {
            root,
            settings,
            filter,
            file_list,
            detailed,
        } => {
            let store = open_store(&root, &settings, file_list.as_deref(), false)?;
            cmd_list(&store, filter.as_deref(), detailed)?;
        }
        Commands::Extract {
            root,
            settings,
            output,
            filter,
            file_list,
            lenient,
        } => {
            let store = open_store(&root, &settings, file_list.as_deref(), lenient)?;
            cmd_extract(&store, &output, filter.as_deref())?;
        }
        Commands::Decompress {
            input,
            output,
            size,
            lenient,
        } => {
            cmd_decompress(&input, &output, size, lenient)?;
        }
        Commands::Compress {
            input,
            output,
            block_size,
        } => {
            cmd_compress(&input, &output, block_size)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(
    root: &Path,
    settings_path: &Path,
    file_list: Option<&Path>,
    lenient: bool,
) -> Result<PackageTableStore> {
    let settings = SettingsFile::load(settings_path)?.into_settings(lenient)?;

    let start = Instant::now();
    let mut store = PackageTableStore::mount(root, settings)
        .with_context(|| format!("Failed to mount tables under {}", root.display()))?;

    if let Some(path) = file_list {
        let names = store
            .load_file_list(path)
            .with_context(|| format!("Failed to load file list {}", path.display()))?;
        debug!("Loaded {} file list names", names);
    }

    println!(
        "Mounted {} tables ({} entries) in {:?}",
        store.tables().len(),
        store.entry_count(),
        start.elapsed()
    );
    Ok(store)
}

fn build_filter(filter: Option<&str>) -> Result<Option<Pattern>> {
    filter
        .map(|pattern| Pattern::new(pattern).context("Invalid filter pattern"))
        .transpose()
}

fn filter_matches(filter: Option<&Pattern>, name: &str) -> bool {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    filter.map_or(true, |pattern| pattern.matches_with(name, OPTIONS))
}

/// Names of every entry passing the filter, as `(index, name)`.
///
/// Names that would land on the same output path are disambiguated with
/// the entry index so no entry overwrites another.
fn select_entries(
    store: &PackageTableStore,
    filter: Option<&Pattern>,
) -> Result<Vec<(usize, String)>> {
    let mut selected = Vec::new();
    let mut taken = HashSet::new();

    for index in 0..store.entry_count() {
        let mut name = store.filename(index, DEFAULT_EXTENSION)?;
        if !filter_matches(filter, &name) {
            continue;
        }

        while !taken.insert(output_path(Path::new(""), &name)) {
            let renamed = format!("{name}.{index}");
            warn!("Duplicate output name {}, extracting as {}", name, renamed);
            name = renamed;
        }
        selected.push((index, name));
    }
    Ok(selected)
}

/// Turn an entry name into a path under `output`.
///
/// Leading separators are dropped and `..` components ignored so every
/// entry lands inside the output directory.
fn output_path(output: &Path, name: &str) -> PathBuf {
    let normalized = name.replace('\\', "/");
    let relative = Path::new(normalized.trim_start_matches('/'));

    let mut path = output.to_path_buf();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

fn cmd_list(store: &PackageTableStore, filter: Option<&str>, detailed: bool) -> Result<()> {
    let filter = build_filter(filter)?;

    let mut count = 0;
    for entry in store.iter() {
        let name = store.filename(entry.index, DEFAULT_EXTENSION)?;
        if !filter_matches(filter.as_ref(), &name) {
            continue;
        }

        if detailed {
            println!(
                "{:>6} {:>12} {:>12} {:>12} {:<24} {}",
                entry.index,
                entry.entry.data_offset,
                entry.entry.compressed_size,
                entry.entry.decompressed_size,
                entry.entry.flags.to_string(),
                name
            );
        } else {
            println!("{}", name);
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_extract(store: &PackageTableStore, output: &Path, filter: Option<&str>) -> Result<()> {
    let filter = build_filter(filter)?;
    let selected = select_entries(store, filter.as_ref())?;

    println!("Extracting {} entries...", selected.len());

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output).context("Failed to create output directory")?;

    let extracted = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let start = Instant::now();
    selected.par_iter().for_each(|(index, name)| {
        match extract_entry(store, output, *index, name) {
            Ok(true) => {
                extracted.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("Failed to extract {} ({}): {:#}", name, index, err);
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");
    println!(
        "Extracted {} entries ({} empty, {} failed) in {:?}",
        extracted.into_inner(),
        skipped.into_inner(),
        failed.into_inner(),
        start.elapsed()
    );

    Ok(())
}

/// Extract one entry. Returns `false` for empty entries.
fn extract_entry(store: &PackageTableStore, output: &Path, index: usize, name: &str) -> Result<bool> {
    let data = store.read_entry(index)?;
    if data.is_empty() {
        debug!("Skipping empty entry {} ({})", name, index);
        return Ok(false);
    }

    let path = output_path(output, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

fn cmd_decompress(input: &Path, output: &Path, size: usize, lenient: bool) -> Result<()> {
    println!("Decompressing: {} -> {}", input.display(), output.display());

    let data = fs::read(input).context("Failed to read input file")?;
    let size_check = if lenient {
        SizeCheck::Lenient
    } else {
        SizeCheck::Strict
    };
    let decoded = decompress(&data, size, size_check).context("Failed to decompress")?;
    fs::write(output, &decoded).context("Failed to write output file")?;

    println!("Wrote {} bytes", decoded.len());

    Ok(())
}

fn cmd_compress(input: &Path, output: &Path, block_size: u32) -> Result<()> {
    println!("Compressing: {} -> {}", input.display(), output.display());

    let data = fs::read(input).context("Failed to read input file")?;
    let encoded = compress(&data, block_size).context("Failed to compress")?;
    fs::write(output, &encoded).context("Failed to write output file")?;

    println!("{} -> {} bytes", data.len(), encoded.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn key() -> KeyParameters {
        KeyParameters::new(b"cli test truth".to_vec(), 0x41C64E6D, 0x7FFF_FFFF)
    }

    /// Five entries in one package: two unnamed, one empty, two sharing an
    /// original path.
    fn store_fixture() -> (TempDir, PackageTableStore, Vec<Vec<u8>>) {
        let dir = TempDir::new().unwrap();
        let both = TableFlags::COMPRESSED | TableFlags::ENCRYPTED;
        let payloads = vec![
            b"first payload ".repeat(40),
            b"second payload".to_vec(),
            Vec::new(),
            b"shared name one".to_vec(),
            b"shared name two".to_vec(),
        ];
        let originals = [None, None, None, Some("dev/same.g1t"), Some("dev/same.g1t")];

        let mut package = Vec::new();
        let mut builder = IdTableBuilder::new();
        for (payload, original) in payloads.iter().zip(originals) {
            builder
                .push_payload(&mut package, "pkg.bin", original, payload, both, &key(), 0x200)
                .unwrap();
        }
        fs::write(dir.path().join("pkg.bin"), &package).unwrap();
        fs::write(
            dir.path().join("main.tbl"),
            builder.build_encoded(both, &key(), DEFAULT_BLOCK_SIZE).unwrap(),
        )
        .unwrap();

        let settings = StoreSettings::new(key()).with_tables(["main.tbl"]);
        let store = PackageTableStore::mount(dir.path(), settings).unwrap();
        (dir, store, payloads)
    }

    #[test]
    fn test_select_entries_names_are_unique() {
        let (_dir, store, _) = store_fixture();
        let selected = select_entries(&store, None).unwrap();

        let names: Vec<&str> = selected.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(
            names,
            [
                "pkg.bin/000000.bin",
                "pkg.bin/000001.bin",
                "pkg.bin/000002.bin",
                "dev/same.g1t",
                "dev/same.g1t.4",
            ]
        );
    }

    #[test]
    fn test_extract_entries_do_not_overwrite() {
        let (dir, store, payloads) = store_fixture();
        let output = dir.path().join("out");

        for (index, name) in select_entries(&store, None).unwrap() {
            let written = extract_entry(&store, &output, index, &name).unwrap();
            assert_eq!(written, !payloads[index].is_empty());
        }

        assert_eq!(fs::read(output.join("pkg.bin/000000.bin")).unwrap(), payloads[0]);
        assert_eq!(fs::read(output.join("pkg.bin/000001.bin")).unwrap(), payloads[1]);
        assert!(!output.join("pkg.bin/000002.bin").exists());
        assert_eq!(fs::read(output.join("dev/same.g1t")).unwrap(), payloads[3]);
        assert_eq!(fs::read(output.join("dev/same.g1t.4")).unwrap(), payloads[4]);
    }

    #[test]
    fn test_select_entries_filter() {
        let (_dir, store, _) = store_fixture();
        let filter = build_filter(Some("dev/*")).unwrap();
        let selected = select_entries(&store, filter.as_ref()).unwrap();
        let indices: Vec<usize> = selected.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, [3, 4]);
    }

    #[test]
    fn test_output_path_stays_inside() {
        let out = Path::new("/out");
        assert_eq!(output_path(out, "/data/a.bin"), Path::new("/out/data/a.bin"));
        assert_eq!(output_path(out, "\\data\\b.g1t"), Path::new("/out/data/b.g1t"));
        assert_eq!(output_path(out, "../../etc/passwd"), Path::new("/out/etc/passwd"));
        assert_eq!(output_path(out, "./x/./y"), Path::new("/out/x/y"));
    }

    #[test]
    fn test_filter_matches() {
        let pattern = build_filter(Some("*.G1T")).unwrap();
        assert!(filter_matches(pattern.as_ref(), "textures/a.g1t"));
        assert!(!filter_matches(pattern.as_ref(), "models/a.g1m"));
        assert!(filter_matches(None, "anything"));
        assert!(build_filter(Some("[")).is_err());
    }
}
