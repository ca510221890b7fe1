//! fragstats - CLI tool for tracking game server statistics
//!
//! Registers game servers, ingests their log files into the database, and
//! reports player rankings.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/fragstats/data.db (~/.local/share/fragstats/data.db)
//! - Logs: $XDG_STATE_HOME/fragstats/fragstats.log (~/.local/state/fragstats/fragstats.log)
//! - Config: $XDG_CONFIG_HOME/fragstats/config.toml (~/.config/fragstats/config.toml)

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use fragstats_core::feed::SyncPublisher;
use fragstats_core::ingest::{IngestCoordinator, SyncResult};
use fragstats_core::pipeline::EventPipeline;
use fragstats_core::types::{Game, Server};
use fragstats_core::{Config, Database};

#[derive(Parser)]
#[command(name = "fragstats")]
#[command(about = "Track player statistics from game server logs")]
#[command(version)]
struct Args {
    /// Path to a config file (defaults to the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest log files for a server
    Sync {
        /// Server id the log files belong to
        #[arg(long)]
        server: i64,

        /// Directory containing *.log files (defaults to [ingest].log_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Watch mode - continuously sync instead of one-shot
        #[arg(short, long)]
        watch: bool,

        /// Poll interval in milliseconds (only with --watch)
        #[arg(long, default_value = "1000")]
        poll: u64,

        /// Dry run - discover files but don't sync
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the skill ranking for a game
    Top {
        /// Game code (e.g. cstrike)
        #[arg(long)]
        game: String,

        /// Number of players to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Parse log lines from stdin and print the events as JSON
    Parse,

    /// Manage registered servers
    #[command(subcommand)]
    Server(ServerCommand),
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Register a server
    Add {
        /// Game code (created if unknown)
        #[arg(long)]
        game: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        address: String,

        #[arg(long, default_value = "27015")]
        port: i64,
    },

    /// List registered servers
    List,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Initialize logging
    let _log_guard =
        fragstats_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("fragstats starting");

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::Sync {
            server,
            dir,
            watch,
            poll,
            dry_run,
        } => {
            let dir = dir
                .or_else(|| config.ingest.log_dir.clone())
                .context("no log directory given (--dir or [ingest].log_dir)")?;
            run_sync(&db, &config, server, &dir, watch, poll, dry_run)
        }
        Command::Top { game, limit } => run_top(&db, &game, limit),
        Command::Parse => run_parse(),
        Command::Server(cmd) => run_server(&db, cmd),
    }
}

fn run_sync(
    db: &Database,
    config: &Config,
    server_id: i64,
    dir: &Path,
    watch: bool,
    poll: u64,
    dry_run: bool,
) -> Result<()> {
    let server = db
        .get_server(server_id)?
        .with_context(|| format!("no server with id {}", server_id))?;

    println!("Server:   {} ({})", server.name, server.game_code);
    println!("Log dir:  {}", dir.display());

    if dry_run {
        println!("\nDry run - no sync performed");
        tracing::info!("Dry run complete");
        return Ok(());
    }

    // Initialize kill feed publisher if configured
    let publisher = SyncPublisher::new(&config.feed).context("failed to create publisher")?;
    if publisher.is_some() {
        println!("Kill feed: enabled");
        tracing::info!(
            server_url = %config.feed.server_url.as_deref().unwrap_or(""),
            "Kill feed enabled"
        );
    }

    let pipeline = EventPipeline::with_publisher(db, publisher);
    let mut coordinator = IngestCoordinator::with_pipeline(db, pipeline);

    let result = if watch {
        run_watch_mode(&mut coordinator, server_id, dir, poll)
    } else {
        run_single_sync(&mut coordinator, server_id, dir)
    };

    // Flush any pending feed events on shutdown
    match coordinator.flush_feed() {
        Ok(sent) if sent > 0 => println!("Sent {} kill feed events", sent),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to flush feed events on shutdown"),
    }

    result
}

/// Run a single sync operation with progress bar
fn run_single_sync(
    coordinator: &mut IngestCoordinator,
    server_id: i64,
    dir: &Path,
) -> Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = coordinator
        .sync_dir_with_progress(server_id, dir, |current, total, path| {
            if current == 0 {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("...")
                    .to_string(),
            );
        })
        .context("sync failed")?;

    pb.finish_and_clear();
    print_sync_result(&result);

    tracing::info!(
        files_processed = result.files_processed,
        kills_processed = result.kills_processed,
        "fragstats sync complete"
    );

    Ok(())
}

/// Run continuous watch mode
fn run_watch_mode(
    coordinator: &mut IngestCoordinator,
    server_id: i64,
    dir: &Path,
    poll: u64,
) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let poll_duration = Duration::from_millis(poll);

    println!(
        "Watch mode active (poll every {}ms). Press Ctrl+C to stop.",
        poll
    );
    println!();

    let mut iteration = 0u64;

    while running.load(Ordering::SeqCst) {
        iteration += 1;

        // Checkpoints make each iteration incremental
        let result = coordinator.sync_dir(server_id, dir).context("sync failed")?;

        // Only print if there were changes
        if result.lines_read > 0 {
            let timestamp = chrono::Local::now().format("%H:%M:%S");
            println!(
                "[{}] Synced: {} files, {} lines, {} kills",
                timestamp, result.files_processed, result.lines_read, result.kills_processed
            );

            tracing::info!(
                iteration,
                files_processed = result.files_processed,
                kills_processed = result.kills_processed,
                "watch sync iteration"
            );
        }

        thread::sleep(poll_duration);
    }

    println!("Watch mode stopped.");
    tracing::info!("fragstats watch mode stopped");

    Ok(())
}

/// Print sync result summary
fn print_sync_result(result: &SyncResult) {
    println!("\nSync complete:");
    println!("  Files processed:  {}", result.files_processed);
    println!("  Files skipped:    {}", result.files_skipped);
    println!("  Lines read:       {}", result.lines_read);
    println!("  Events parsed:    {}", result.events_parsed);
    println!("  Kills recorded:   {}", result.kills_processed);
    println!("  Unmatched lines:  {}", result.unmatched_lines);

    if result.parse_errors > 0 {
        println!("  Malformed lines:  {}", result.parse_errors);
    }

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for (path, err) in &result.errors {
            println!("  {}: {}", path.display(), err);
        }
    }
}

fn run_top(db: &Database, game: &str, limit: i64) -> Result<()> {
    if db.get_game(game)?.is_none() {
        bail!("unknown game {:?}", game);
    }

    let ranking = db.top_players(game, limit)?;
    if ranking.is_empty() {
        println!("No ranked players for {} yet", game);
        return Ok(());
    }

    println!(
        "{:>4}  {:<24} {:>8} {:>7} {:>7} {:>6}",
        "#", "Player", "Skill", "Kills", "Deaths", "K/D"
    );
    for entry in &ranking {
        let p = &entry.player;
        println!(
            "{:>4}  {:<24} {:>8.0} {:>7} {:>7} {:>6.2}",
            entry.rank,
            p.last_name,
            p.skill,
            p.kills,
            p.deaths,
            p.kd_ratio()
        );
    }

    Ok(())
}

/// Parse stdin line by line, printing each recognized event as JSON.
fn run_parse() -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    for line in input.lines() {
        match fragstats_core::parser::parse_line(line) {
            Ok(Some(event)) => {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
            Ok(None) => {
                eprintln!("unmatched: {}", line);
            }
            Err(e) => {
                eprintln!("error: {} ({})", e, line);
            }
        }
    }

    Ok(())
}

fn run_server(db: &Database, cmd: ServerCommand) -> Result<()> {
    match cmd {
        ServerCommand::Add {
            game,
            name,
            address,
            port,
        } => {
            if db.get_game(&game)?.is_none() {
                db.upsert_game(&Game {
                    code: game.clone(),
                    name: game.clone(),
                    enabled: true,
                })?;
                println!("Registered game {:?}", game);
            }

            let id = db.insert_server(&Server {
                id: 0,
                game_code: game,
                name: name.clone(),
                address,
                port,
                enabled: true,
                map: None,
                last_activity: None,
            })?;
            println!("Registered server {:?} with id {}", name, id);
            Ok(())
        }
        ServerCommand::List => {
            let servers = db.list_servers()?;
            if servers.is_empty() {
                println!("No servers registered. Use `fragstats server add`.");
                return Ok(());
            }
            for server in servers {
                println!(
                    "{:>4}  {:<24} {:<10} {}:{}  map={}",
                    server.id,
                    server.name,
                    server.game_code,
                    server.address,
                    server.port,
                    server.map.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}
