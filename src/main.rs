use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use jetkey::{
    EntryKind, JetArchive, JetSettings, PasswordSource, TargetConvention, DEFAULT_PROBE_ENTRIES,
};

/// Password discovery and entry access for jet game-asset containers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Glob pattern for jet archive(s) to process (e.g., "*.jet" or "assets/*.jet")
    #[arg(short, long)]
    archive: Option<String>,

    /// Path to the password cache file (one password per line)
    #[arg(short, long, default_value = "passwords.txt")]
    cache: PathBuf,

    /// URL of the remote password list (defaults to the published list)
    #[arg(short, long)]
    url: Option<String>,

    /// Re-download the password list even if a cache file exists
    #[arg(short, long, default_value_t = false)]
    refresh: bool,

    /// Number of entries to probe per password attempt
    #[arg(short, long, default_value_t = DEFAULT_PROBE_ENTRIES)]
    probe: usize,

    /// Quiet mode - only output found passwords
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List entries of a jet archive
    List {
        /// Path to the archive
        #[arg(short, long)]
        archive: PathBuf,

        /// Base path inside the archive (empty for the container root)
        #[arg(short, long, default_value = "")]
        base: String,

        /// Recurse into subdirectories
        #[arg(short, long, default_value_t = false)]
        recursive: bool,

        /// What to list: all, files, or dirs
        #[arg(short, long, default_value = "all")]
        kind: String,

        /// Flat-file product: treat .json entries as directories
        #[arg(short, long, default_value_t = false)]
        flat: bool,
    },
    /// Read a text entry out of a jet archive, discovering the password if needed
    Read {
        /// Path to the archive
        #[arg(short, long)]
        archive: PathBuf,

        /// Path of the entry inside the archive
        #[arg(short, long)]
        entry: String,

        /// Path to the password cache file
        #[arg(short, long, default_value = "passwords.txt")]
        cache: PathBuf,

        /// URL of the remote password list
        #[arg(short, long)]
        url: Option<String>,

        /// Use this password instead of running discovery
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Force re-download of the password list into the cache file
    Refresh {
        /// Path to the password cache file
        #[arg(short, long, default_value = "passwords.txt")]
        cache: PathBuf,

        /// URL of the remote password list
        #[arg(short, long)]
        url: Option<String>,

        /// Quiet mode - only output the candidate count
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
}

/// Result of attempting password discovery on an archive
#[derive(Debug, Clone)]
enum DiscoveryOutcome {
    /// A working password was found
    Found(String),
    /// No candidate in the list matched
    NotFound,
    /// Archive is not encrypted
    NotEncrypted,
    /// Archive could not be processed (with error message)
    Error(String),
}

fn build_settings(cache: &Path, url: Option<&str>, probe: usize) -> JetSettings {
    let mut settings = JetSettings::new(cache).with_probe_entries(probe);
    if let Some(url) = url {
        settings = settings.with_url(url);
    }
    settings
}

fn parse_entry_kind(kind: &str) -> Result<EntryKind> {
    match kind.to_lowercase().as_str() {
        "all" => Ok(EntryKind::All),
        "files" => Ok(EntryKind::Files),
        "dirs" | "directories" => Ok(EntryKind::Directories),
        other => bail!("Unknown entry kind: {other}. Expected all, files, or dirs"),
    }
}

/// Try each candidate against a single archive, newest first
fn discover_jet_password(
    archive_path: &Path,
    candidates: &[String],
    settings: &JetSettings,
    quiet: bool,
) -> DiscoveryOutcome {
    let mut archive = match JetArchive::open_with_settings(archive_path, settings) {
        Ok(archive) => archive,
        Err(e) => return DiscoveryOutcome::Error(format!("Failed to open archive: {e}")),
    };

    if archive.is_password_correct("") {
        return DiscoveryOutcome::NotEncrypted;
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(candidates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("Invalid template")
                .progress_chars("█▓▒░"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    };

    for candidate in candidates {
        let candidate = candidate.trim_end_matches(['\n', '\r']);
        if archive.is_password_correct(candidate) {
            pb.finish_and_clear();
            return DiscoveryOutcome::Found(candidate.to_string());
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    DiscoveryOutcome::NotFound
}

/// List entries of one archive to stdout
fn run_list(archive: &Path, base: &str, recursive: bool, kind: &str, flat: bool) -> Result<()> {
    let kind = parse_entry_kind(kind)?;
    let convention = if flat {
        TargetConvention::FlatFile
    } else {
        TargetConvention::DirectoryTree
    };

    let opened = JetArchive::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;

    for entry in opened.list_entries(kind, recursive, base, convention) {
        println!("{entry}");
    }
    Ok(())
}

/// Read one entry to stdout, running password discovery if required
fn run_read(
    archive: &Path,
    entry: &str,
    cache: &Path,
    url: Option<&str>,
    password: Option<&str>,
) -> Result<()> {
    let settings = build_settings(cache, url, DEFAULT_PROBE_ENTRIES);
    let source = PasswordSource::new(&settings);

    let mut opened = JetArchive::open_with_settings(archive, &settings)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    if let Some(password) = password {
        opened.set_password(password);
    }

    let text = opened
        .read_entry(&source, entry)
        .with_context(|| format!("Failed to read \"{entry}\" from {}", archive.display()))?;
    print!("{text}");
    Ok(())
}

/// Force-refresh the candidate list cache
fn run_refresh(cache: &Path, url: Option<&str>, quiet: bool) -> Result<()> {
    let settings = build_settings(cache, url, DEFAULT_PROBE_ENTRIES);
    let source = PasswordSource::new(&settings);

    let candidates = source.candidates(true);
    if candidates.is_empty() {
        bail!("Could not acquire the password list (remote unreachable and no usable cache)");
    }

    if quiet {
        println!("{}", candidates.len());
    } else {
        println!(
            "{} Password list refreshed: {} candidates written to {}",
            style("✓").green().bold(),
            style(candidates.len()).yellow(),
            style(cache.display()).green()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Handle subcommands
    if let Some(command) = args.command {
        return match command {
            Commands::List {
                archive,
                base,
                recursive,
                kind,
                flat,
            } => run_list(&archive, &base, recursive, &kind, flat),
            Commands::Read {
                archive,
                entry,
                cache,
                url,
                password,
            } => run_read(&archive, &entry, &cache, url.as_deref(), password.as_deref()),
            Commands::Refresh { cache, url, quiet } => run_refresh(&cache, url.as_deref(), quiet),
        };
    }

    // Default mode: batch password discovery over a glob of archives
    let pattern = args.archive.ok_or_else(|| {
        anyhow::anyhow!(
            "Archive pattern is required. Use --archive <PATTERN> or run 'jetkey --help' for usage."
        )
    })?;

    let archive_paths: Vec<PathBuf> = glob(&pattern)
        .context("Failed to parse glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();

    if archive_paths.is_empty() {
        bail!("No archives found matching pattern: {}", pattern);
    }

    if !args.quiet {
        println!(
            "{} Jet Password Discovery v{}",
            style("⚡").cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!("{}", style("─".repeat(50)).dim());
        println!("  Pattern:   {}", style(&pattern).green());
        println!("  Archives:  {}", style(archive_paths.len()).yellow());
        println!("  Cache:     {}", style(args.cache.display()).green());
        println!("{}", style("─".repeat(50)).dim());
    }

    let settings = build_settings(&args.cache, args.url.as_deref(), args.probe);
    let source = PasswordSource::new(&settings);
    let candidates = source.candidates(args.refresh);

    if !args.quiet {
        println!("  Candidates: {}", style(candidates.len()).yellow());
        if candidates.is_empty() {
            println!(
                "  {} No candidates available; only unencrypted archives can be confirmed",
                style("⚠").yellow()
            );
        }
        println!("{}", style("─".repeat(50)).dim());
    }

    // Process each archive
    let mut results: Vec<(PathBuf, DiscoveryOutcome)> = Vec::new();

    for (idx, archive_path) in archive_paths.iter().enumerate() {
        if !args.quiet {
            println!(
                "\n{} Processing archive {}/{}: {}",
                style("🔍").cyan(),
                style(idx + 1).yellow(),
                style(archive_paths.len()).yellow(),
                style(archive_path.display()).green()
            );
        }

        let result = discover_jet_password(archive_path, &candidates, &settings, args.quiet);

        if !args.quiet {
            match &result {
                DiscoveryOutcome::Found(password) => {
                    println!(
                        "  {} Password found: {}",
                        style("✓").green().bold(),
                        style(password).green().bold()
                    );
                }
                DiscoveryOutcome::NotFound => {
                    println!("  {} Password not found", style("✗").red());
                }
                DiscoveryOutcome::NotEncrypted => {
                    println!("  {} Not encrypted", style("ℹ").blue());
                }
                DiscoveryOutcome::Error(msg) => {
                    println!("  {} Error: {}", style("✗").red(), style(msg).red());
                }
            }
        }

        results.push((archive_path.clone(), result));
    }

    // Print summary
    if !args.quiet {
        println!("\n{}", style("═".repeat(50)).dim());
        println!("{} Summary", style("📊").cyan().bold());
        println!("{}", style("═".repeat(50)).dim());
    }

    let mut found_count = 0;
    let mut not_found_count = 0;
    let mut not_encrypted_count = 0;
    let mut error_count = 0;

    let single_archive = results.len() == 1;

    for (archive_path, result) in &results {
        match result {
            DiscoveryOutcome::Found(password) => {
                found_count += 1;
                if args.quiet {
                    if single_archive {
                        println!("{password}");
                    } else {
                        println!("{}: {password}", archive_path.display());
                    }
                } else {
                    println!(
                        "  {} {} - Password: {}",
                        style("✓").green().bold(),
                        style(archive_path.display()).green(),
                        style(password).green().bold()
                    );
                }
            }
            DiscoveryOutcome::NotFound => {
                not_found_count += 1;
                if !args.quiet {
                    println!(
                        "  {} {} - Password not found",
                        style("✗").red(),
                        style(archive_path.display()).dim()
                    );
                }
            }
            DiscoveryOutcome::NotEncrypted => {
                not_encrypted_count += 1;
                if !args.quiet {
                    println!(
                        "  {} {} - Not encrypted",
                        style("ℹ").blue(),
                        style(archive_path.display()).dim()
                    );
                }
            }
            DiscoveryOutcome::Error(msg) => {
                error_count += 1;
                if !args.quiet {
                    println!(
                        "  {} {} - Error: {}",
                        style("✗").red(),
                        style(archive_path.display()).dim(),
                        style(msg).red()
                    );
                }
            }
        }
    }

    if !args.quiet {
        println!("{}", style("─".repeat(50)).dim());
        println!("  Total archives:       {}", style(results.len()).yellow());
        println!(
            "  Passwords found:      {}",
            style(found_count).green().bold()
        );
        println!("  Passwords not found:  {}", style(not_found_count).red());
        println!(
            "  Not encrypted:        {}",
            style(not_encrypted_count).blue()
        );
        println!("  Errors:               {}", style(error_count).red());
        println!("{}", style("─".repeat(50)).dim());
    }

    // Exit with error if no passwords were found
    if found_count == 0 && not_found_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}
