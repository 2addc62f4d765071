use chrono::Local;
use clap::{Parser, Subcommand};
use human_notary::batch;
use human_notary::report::{self, CaptureReport, Summary, Verdict};
use human_notary::serve::{self, ServeConfig};
use human_notary::{Database, DbError, MemoryStore, Notary, ScoringConfig, Verifier};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use rayon::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "notary")]
#[command(author, version, about = "Prove a post was typed by a human")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web UI and JSON API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "NOTARY_PORT", default_value = "3333")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// SQLite database path
        #[arg(long, env = "NOTARY_DB", default_value = human_notary::db::DEFAULT_DB_PATH)]
        db: PathBuf,

        /// Keep posts in memory only (nothing is written to disk)
        #[arg(long)]
        memory: bool,

        /// Request worker threads
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Scoring thresholds (TOML)
        #[arg(long)]
        scoring: Option<PathBuf>,

        /// Don't open the browser
        #[arg(long)]
        no_open: bool,
    },

    /// Score keystroke capture files (.json) offline
    Verify {
        /// Capture file or directory of captures
        path: PathBuf,

        /// Output report file (.csv, .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scoring thresholds (TOML)
        #[arg(long)]
        scoring: Option<PathBuf>,

        /// Number of parallel workers (default: number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Inspect and back up the post database
    Db {
        /// SQLite database path
        #[arg(long, env = "NOTARY_DB", default_value = human_notary::db::DEFAULT_DB_PATH)]
        db: PathBuf,

        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// List recent posts
    Posts {
        /// Number of posts to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one post with its metrics as JSON
    Show {
        /// Post ID
        id: String,
    },

    /// Post counts and average score
    Stats,

    /// Create a backup of the database
    Backup {
        /// Output path for backup (default: notary_backup_<timestamp>.db)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match args.command {
        Command::Serve { port, host, db, memory, workers, scoring, no_open } => {
            let verifier = load_verifier(scoring.as_deref());
            let config = ServeConfig {
                host,
                port,
                workers,
                open_browser: !no_open,
            };

            let result = if memory {
                log::warn!("posts are kept in memory and lost on exit");
                serve::start(&config, Notary::new(MemoryStore::new()).with_verifier(verifier))
            } else {
                let database = open_database(&db);
                log::info!("using database {}", db.display());
                serve::start(&config, Notary::new(database).with_verifier(verifier))
            };

            if let Err(e) = result {
                log::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Verify { path, output, scoring, jobs } => {
            let verifier = load_verifier(scoring.as_deref());
            let code = run_verify(&path, output.as_deref(), &verifier, jobs, args.quiet);
            std::process::exit(code);
        }
        Command::Db { db, action } => handle_db_action(&db, action),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_verifier(scoring: Option<&Path>) -> Verifier {
    let Some(path) = scoring else {
        return Verifier::new();
    };

    match ScoringConfig::from_toml_file(path) {
        Ok(config) => {
            log::info!("loaded scoring config from {}", path.display());
            Verifier::new().with_config(config)
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn open_database(path: &Path) -> Database {
    match Database::open_at(path) {
        Ok(db) => db,
        Err(e) => {
            log::error!("Failed to open database {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Score every capture under `path`. Returns the process exit code.
fn run_verify(path: &Path, output: Option<&Path>, verifier: &Verifier, jobs: Option<usize>, quiet: bool) -> i32 {
    // Set up thread pool
    if let Some(jobs) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files = batch::collect_captures(path);
    if files.is_empty() {
        log::error!("No capture files found under {}", path.display());
        return 1;
    }

    if !quiet {
        eprintln!("\x1b[1mHuman Notary - Keystroke Verification\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} capture file(s)\n", files.len());
    }

    // Set up progress bar
    let pb = if !quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    // Score files in parallel
    let results: Vec<CaptureReport> = files
        .par_iter()
        .map(|file| {
            let result = batch::verify_file(file, verifier);
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(result.file_name.clone());
            }
            result
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !quiet {
        for r in &results {
            print_result(r);
        }
    }

    let summary = Summary::from_results(&results);

    if !quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Verified:\x1b[0m   {}", summary.verified);
        eprintln!("  \x1b[31m✗ Unverified:\x1b[0m {}", summary.unverified);
        if summary.error > 0 {
            eprintln!("  \x1b[90mErrors:\x1b[0m       {}", summary.error);
        }
    }

    if let Some(output_path) = output {
        if let Err(e) = report::generate(output_path, &results) {
            log::error!("Failed to write report: {}", e);
            return 1;
        }
        if !quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
    }

    if summary.unverified > 0 || summary.error > 0 {
        1
    } else {
        0
    }
}

fn print_result(r: &CaptureReport) {
    let color = match r.verdict {
        Verdict::Verified => "\x1b[32m",   // Green
        Verdict::Unverified => "\x1b[31m", // Red
        Verdict::Error => "\x1b[90m",      // Gray
    };
    let reset = "\x1b[0m";

    let detail = match (&r.error, r.reasons.is_empty()) {
        (Some(e), _) => e.clone(),
        (None, true) => "-".to_string(),
        (None, false) => r.reasons.join("; "),
    };

    println!(
        "{}{:<13}{} {:>3}%  {:>5} keys  {:<30}  {}",
        color,
        format!("[{}]", r.verdict),
        reset,
        r.score_percent(),
        r.keystroke_count,
        truncate(&r.file_name, 30),
        detail
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[derive(Debug, Error)]
enum DbCommandError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("No database found at {0}")]
    Missing(String),

    #[error("Failed to create backup: {0}")]
    Backup(#[source] io::Error),

    #[error("Error serializing post: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn handle_db_action(db_path: &Path, action: DbAction) {
    let stdout = io::stdout();
    if let Err(e) = run_db_action(db_path, action, &mut stdout.lock()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_db_action<W: Write>(db_path: &Path, action: DbAction, out: &mut W) -> Result<(), DbCommandError> {
    match action {
        // Copies the file; no connection needed
        DbAction::Backup { output } => backup_database(db_path, output, out),

        DbAction::Posts { limit } => {
            let posts = Database::open_at(db_path)?.get_recent_posts(limit)?;
            if posts.is_empty() {
                writeln!(out, "No posts found.")?;
                return Ok(());
            }

            writeln!(out, "{:<8} {:<11} {:>5}  {:<25} {}", "ID", "VERDICT", "SCORE", "CREATED", "CONTENT")?;
            writeln!(out, "{}", "-".repeat(80))?;
            for p in posts {
                writeln!(
                    out,
                    "{:<8} {:<11} {:>4}%  {:<25} {}",
                    p.id,
                    if p.verified { "verified" } else { "unverified" },
                    p.score_percent(),
                    truncate(&p.created_at, 25),
                    truncate(&p.content.replace('\n', " "), 40)
                )?;
            }
            Ok(())
        }

        DbAction::Show { id } => {
            let id = id.trim();
            let post = Database::open_at(db_path)?
                .get_post(id)?
                .ok_or_else(|| DbCommandError::NotFound(id.to_string()))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&post)?)?;
            Ok(())
        }

        DbAction::Stats => {
            let stats = Database::open_at(db_path)?.get_summary()?;
            writeln!(out, "Posts:      {}", stats.total)?;
            writeln!(out, "Verified:   {}", stats.verified)?;
            writeln!(out, "Unverified: {}", stats.unverified)?;
            match stats.avg_score {
                Some(avg) => writeln!(out, "Avg score:  {:.0}%", avg * 100.0)?,
                None => writeln!(out, "Avg score:  -")?,
            }
            Ok(())
        }
    }
}

fn backup_database<W: Write>(db_path: &Path, output: Option<PathBuf>, out: &mut W) -> Result<(), DbCommandError> {
    if !db_path.exists() {
        return Err(DbCommandError::Missing(db_path.display().to_string()));
    }

    let backup_path = output.unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("notary_backup_{}.db", timestamp))
    });

    let bytes = std::fs::copy(db_path, &backup_path).map_err(DbCommandError::Backup)?;
    writeln!(out, "Backup created: {} ({} bytes)", backup_path.display(), bytes)?;
    Ok(())
}
