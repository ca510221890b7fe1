//! Ingestion layer for parsing game server log files
//!
//! This module orchestrates reading raw log files into stored frags and
//! player statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │   Log Files     │ ──► │ IngestCoordinator│ ──► │    Database     │
//! │ (*.log on disk) │     │                  │     │ (players, frags)│
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │ parser::parse_line   │
//!                    │ EventPipeline        │
//!                    └──────────────────────┘
//! ```
//!
//! Sync is incremental: each file's byte offset is checkpointed in the
//! database, so re-running sync only reads lines appended since the last
//! pass. A file that shrank below its checkpoint (rotation, truncation) is
//! re-read from the start.

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::pipeline::EventPipeline;
use crate::types::LogEvent;

/// Result of syncing a directory of log files.
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Number of files that yielded new lines
    pub files_processed: usize,
    /// Number of files skipped (no new content)
    pub files_skipped: usize,
    /// Total lines read across all files
    pub lines_read: usize,
    /// Lines that matched a known event pattern
    pub events_parsed: usize,
    /// Kill events stored as frags
    pub kills_processed: usize,
    /// Lines that matched no pattern (ignored)
    pub unmatched_lines: usize,
    /// Matched lines dropped for malformed data (bad timestamps)
    pub parse_errors: usize,
    /// Files that failed entirely (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
}

/// Result of syncing a single log file.
#[derive(Debug)]
pub struct FileSyncResult {
    /// Path to the synced file
    pub path: PathBuf,
    /// Lines read this pass
    pub lines_read: usize,
    /// Lines that matched a known event pattern
    pub events_parsed: usize,
    /// Kill events stored as frags
    pub kills_processed: usize,
    /// Lines that matched no pattern
    pub unmatched_lines: usize,
    /// Matched lines dropped for malformed data
    pub parse_errors: usize,
    /// Byte offset checkpointed for the next sync
    pub new_offset: u64,
    /// Reason the file was skipped (if skipped)
    pub skip_reason: Option<SkipReason>,
}

/// Reason a file was skipped during sync.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// Checkpoint already covers the whole file
    AlreadyParsed { checkpoint_offset: u64, file_size: u64 },
    /// File is empty
    EmptyFile,
}

/// Coordinates incremental ingestion of server log files.
///
/// The coordinator is responsible for:
/// - Discovering log files in a server's log directory
/// - Loading byte-offset checkpoints from the database
/// - Feeding parsed events through the pipeline
/// - Advancing checkpoints as lines are consumed
pub struct IngestCoordinator<'a> {
    db: &'a Database,
    pipeline: EventPipeline<'a>,
}

impl<'a> IngestCoordinator<'a> {
    /// Create a coordinator without feed delivery.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            pipeline: EventPipeline::new(db),
        }
    }

    /// Create a coordinator backed by an existing pipeline (e.g. one with a
    /// kill feed publisher attached).
    pub fn with_pipeline(db: &'a Database, pipeline: EventPipeline<'a>) -> Self {
        Self { db, pipeline }
    }

    /// Sync every `*.log` file under `dir` for one server.
    pub fn sync_dir(&mut self, server_id: i64, dir: &Path) -> Result<SyncResult> {
        self.sync_dir_with_progress(server_id, dir, |_, _, _| {})
    }

    /// Sync a directory with a progress callback.
    ///
    /// The callback receives `(current_file_index, total_files, file_path)`
    /// before each file is processed.
    pub fn sync_dir_with_progress<F>(
        &mut self,
        server_id: i64,
        dir: &Path,
        mut on_progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(usize, usize, &Path),
    {
        let files = discover_log_files(dir)?;
        let total = files.len();
        let mut result = SyncResult::default();

        for (i, path) in files.iter().enumerate() {
            on_progress(i, total, path);

            match self.sync_file(server_id, path) {
                Ok(file_result) => Self::update_result(&mut result, &file_result),
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Failed to sync log file"
                    );
                    result.errors.push((path.clone(), e.to_string()));
                }
            }
        }

        Ok(result)
    }

    /// Sync a single log file.
    ///
    /// Reads from the checkpointed byte offset, parses each complete line,
    /// and applies events through the pipeline. A trailing line without a
    /// newline is left for the next pass. Malformed lines are logged and
    /// counted, never fatal for the batch; the checkpoint always reflects
    /// the last line fully applied.
    pub fn sync_file(&mut self, server_id: i64, path: &Path) -> Result<FileSyncResult> {
        // Events must never be attributed to an unknown server.
        if self.db.get_server(server_id)?.is_none() {
            return Err(Error::ServerNotFound(server_id));
        }

        let path_str = path.to_string_lossy().to_string();
        let file_size = std::fs::metadata(path)?.len();
        let mut offset = self.db.get_log_offset(&path_str)?;

        if offset > file_size {
            tracing::warn!(
                path = %path.display(),
                checkpoint = offset,
                file_size,
                "Log file shrank below checkpoint, re-reading from start"
            );
            offset = 0;
        }

        if file_size == 0 {
            return Ok(skipped(path, offset, SkipReason::EmptyFile));
        }
        if offset >= file_size {
            return Ok(skipped(
                path,
                offset,
                SkipReason::AlreadyParsed {
                    checkpoint_offset: offset,
                    file_size,
                },
            ));
        }

        let mut file = std::fs::File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let mut result = FileSyncResult {
            path: path.to_path_buf(),
            lines_read: 0,
            events_parsed: 0,
            kills_processed: 0,
            unmatched_lines: 0,
            parse_errors: 0,
            new_offset: offset,
            skip_reason: None,
        };

        let mut line = String::new();
        loop {
            line.clear();
            let bytes = reader.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            // Partial trailing line: the writer is mid-append, pick it up
            // next pass.
            if !line.ends_with('\n') {
                break;
            }

            result.lines_read += 1;
            let trimmed = line.trim_end();

            match crate::parser::parse_line(trimmed) {
                Ok(Some(event)) => {
                    result.events_parsed += 1;
                    if let Err(e) = self.apply_event(server_id, &event, &mut result) {
                        // Persist progress up to the last applied line before
                        // surfacing the failure.
                        self.db
                            .set_log_offset(&path_str, server_id, result.new_offset)?;
                        return Err(e);
                    }
                }
                Ok(None) => {
                    result.unmatched_lines += 1;
                    tracing::trace!(line = %trimmed, "Unmatched log line");
                }
                Err(e) => {
                    result.parse_errors += 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = %trimmed,
                        error = %e,
                        "Dropping malformed log line"
                    );
                }
            }

            result.new_offset += bytes as u64;
        }

        self.db
            .set_log_offset(&path_str, server_id, result.new_offset)?;

        tracing::debug!(
            path = %path.display(),
            lines = result.lines_read,
            kills = result.kills_processed,
            offset = result.new_offset,
            "Synced log file"
        );

        Ok(result)
    }

    fn apply_event(
        &mut self,
        server_id: i64,
        event: &LogEvent,
        result: &mut FileSyncResult,
    ) -> Result<()> {
        match event {
            LogEvent::Kill { .. } => {
                let outcome = self.pipeline.process(server_id, event)?;
                if outcome.recorded() {
                    result.kills_processed += 1;
                }
            }
            LogEvent::MapChange { timestamp, map } => {
                self.db.update_server_map(server_id, map, *timestamp)?;
            }
            _ => {
                // Connects, chat, round ends: parsed but not stored.
            }
        }
        Ok(())
    }

    /// Flush any buffered kill feed events; call before shutdown.
    pub fn flush_feed(&mut self) -> Result<usize> {
        self.pipeline.flush_feed()
    }

    fn update_result(result: &mut SyncResult, file_result: &FileSyncResult) {
        if file_result.lines_read > 0 {
            result.files_processed += 1;
        } else {
            result.files_skipped += 1;

            let reason = match &file_result.skip_reason {
                Some(SkipReason::AlreadyParsed {
                    checkpoint_offset,
                    file_size,
                }) => format!(
                    "already parsed (checkpoint {} >= file size {})",
                    checkpoint_offset, file_size
                ),
                Some(SkipReason::EmptyFile) => "empty file".to_string(),
                None => "no new content".to_string(),
            };
            tracing::debug!(
                path = %file_result.path.display(),
                reason = %reason,
                "File skipped"
            );
        }

        result.lines_read += file_result.lines_read;
        result.events_parsed += file_result.events_parsed;
        result.kills_processed += file_result.kills_processed;
        result.unmatched_lines += file_result.unmatched_lines;
        result.parse_errors += file_result.parse_errors;
    }
}

fn skipped(path: &Path, offset: u64, reason: SkipReason) -> FileSyncResult {
    FileSyncResult {
        path: path.to_path_buf(),
        lines_read: 0,
        events_parsed: 0,
        kills_processed: 0,
        unmatched_lines: 0,
        parse_errors: 0,
        new_offset: offset,
        skip_reason: Some(reason),
    }
}

/// Find `*.log` files directly under `dir`, sorted by path.
fn discover_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.log");
    let pattern = pattern.to_string_lossy();

    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::Config(format!("invalid log directory pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    tracing::debug!(dir = %dir.display(), count = files.len(), "Discovered log files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Game, Server};
    use std::io::Write;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.upsert_game(&Game {
            code: "cstrike".to_string(),
            name: "Counter-Strike".to_string(),
            enabled: true,
        })
        .unwrap();
        db
    }

    fn test_server(db: &Database) -> i64 {
        db.insert_server(&Server {
            id: 0,
            game_code: "cstrike".to_string(),
            name: "test".to_string(),
            address: "127.0.0.1".to_string(),
            port: 27015,
            enabled: true,
            map: Some("de_dust2".to_string()),
            last_activity: None,
        })
        .unwrap()
    }

    const KILL_LINE: &str = r#"L 08/15/2025 - 21:30:45: "Alice<5><STEAM_1:0:111><CT>" killed "Bob<7><STEAM_1:0:222><TERRORIST>" with "ak47" (headshot)"#;

    #[test]
    fn test_sync_file_processes_kills() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let mut f = std::fs::File::create(&log_path).unwrap();
        writeln!(f, "{}", KILL_LINE).unwrap();
        writeln!(f, "garbage line that matches nothing").unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        let result = coordinator.sync_file(server_id, &log_path).unwrap();

        assert_eq!(result.lines_read, 2);
        assert_eq!(result.events_parsed, 1);
        assert_eq!(result.kills_processed, 1);
        assert_eq!(result.unmatched_lines, 1);
        assert_eq!(result.parse_errors, 0);
        assert_eq!(db.frag_count().unwrap(), 1);
    }

    #[test]
    fn test_second_sync_is_incremental() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let mut f = std::fs::File::create(&log_path).unwrap();
        writeln!(f, "{}", KILL_LINE).unwrap();
        f.sync_all().unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(db.frag_count().unwrap(), 1);

        // No new content: skipped, no double-counting
        let second = coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(second.lines_read, 0);
        assert!(matches!(
            second.skip_reason,
            Some(SkipReason::AlreadyParsed { .. })
        ));
        assert_eq!(db.frag_count().unwrap(), 1);

        // Append one more kill: only the new line is read
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap();
        writeln!(f, "{}", KILL_LINE).unwrap();
        f.sync_all().unwrap();

        let third = coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(third.lines_read, 1);
        assert_eq!(db.frag_count().unwrap(), 2);
    }

    #[test]
    fn test_truncated_file_resets_checkpoint() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        std::fs::write(&log_path, format!("{}\n", KILL_LINE)).unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        coordinator.sync_file(server_id, &log_path).unwrap();

        // Simulate rotation: new, shorter file at the same path
        std::fs::write(&log_path, format!("{}\n", KILL_LINE)).unwrap();
        db.set_log_offset(&log_path.to_string_lossy(), server_id, 1_000_000)
            .unwrap();

        let result = coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(result.lines_read, 1);
        assert_eq!(db.frag_count().unwrap(), 2);
    }

    #[test]
    fn test_partial_trailing_line_left_for_next_pass() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        // Complete line plus a half-written one
        std::fs::write(
            &log_path,
            format!("{}\nL 08/15/2025 - 21:31:0", KILL_LINE),
        )
        .unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        let result = coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(result.lines_read, 1);
        assert_eq!(result.new_offset, (KILL_LINE.len() + 1) as u64);

        // Finish the partial line with garbage; it is read next pass
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap();
        writeln!(f, "0: nothing").unwrap();
        let second = coordinator.sync_file(server_id, &log_path).unwrap();
        assert_eq!(second.lines_read, 1);
        assert_eq!(second.unmatched_lines, 1);
    }

    #[test]
    fn test_bad_timestamp_counted_not_fatal() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        let bad = r#"L 13/45/2025 - 21:30:45: "A<5><STEAM_1:0:1><CT>" killed "B<7><STEAM_1:0:2><TERRORIST>" with "ak47""#;
        std::fs::write(&log_path, format!("{}\n{}\n", bad, KILL_LINE)).unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        let result = coordinator.sync_file(server_id, &log_path).unwrap();

        assert_eq!(result.parse_errors, 1);
        assert_eq!(result.kills_processed, 1);
        assert_eq!(db.frag_count().unwrap(), 1);
    }

    #[test]
    fn test_map_change_updates_server() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        std::fs::write(
            &log_path,
            format!(
                "L 08/15/2025 - 21:29:00: Loading map \"de_inferno\"\n{}\n",
                KILL_LINE
            ),
        )
        .unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        coordinator.sync_file(server_id, &log_path).unwrap();

        let server = db.get_server(server_id).unwrap().unwrap();
        assert_eq!(server.map.as_deref(), Some("de_inferno"));

        // The frag after the change carries the new map
        let frags = db.recent_frags(server_id, 1).unwrap();
        assert_eq!(frags[0].map.as_deref(), Some("de_inferno"));
    }

    #[test]
    fn test_unknown_server_is_fatal() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");
        std::fs::write(&log_path, format!("{}\n", KILL_LINE)).unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        let err = coordinator.sync_file(999, &log_path).unwrap_err();
        assert!(matches!(err, Error::ServerNotFound(999)));
    }

    #[test]
    fn test_sync_dir_aggregates() {
        let db = test_db();
        let server_id = test_server(&db);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), format!("{}\n", KILL_LINE)).unwrap();
        std::fs::write(dir.path().join("b.log"), format!("{}\n", KILL_LINE)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a log\n").unwrap();

        let mut coordinator = IngestCoordinator::new(&db);
        let result = coordinator.sync_dir(server_id, dir.path()).unwrap();

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.kills_processed, 2);
        assert!(result.errors.is_empty());
        assert_eq!(db.frag_count().unwrap(), 2);
    }
}
