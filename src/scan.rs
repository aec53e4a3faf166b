//! Scan coordinator: discovers class files, populates the database, and
//! accumulates the work list of files needing instrumentation.
//!
//! Decoding is pure and runs in parallel; registration, work-list appends,
//! and reporting run sequentially in discovery order, so the work list
//! preserves scan order. One malformed file never aborts a bulk scan; only
//! the decoder's explicit unrecoverable failure propagates to the caller.

use anyhow::Result;
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use crate::classfile::{DecodeError, DecodedClass};
use crate::db::MethodDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Needs instrumentation and was appended to the work list.
    Queued,
    /// Needs instrumentation but already carries the instrumented marker.
    AlreadyInstrumented,
    /// No suspendable methods; nothing to rewrite.
    NotSuspendable,
    /// Could not be read or decoded; logged and skipped.
    Failed,
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub root: String,
    pub scanned: usize,
    pub queued: usize,
    pub already_instrumented: usize,
    pub not_suspendable: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// All `.class` files under `root`, sorted for deterministic scan order.
pub fn discover_class_files(root: &Path) -> Result<Vec<PathBuf>> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "class") {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut files: Vec<PathBuf> = rx.iter().collect();
    files.sort();
    Ok(files)
}

/// Analyzes one class file: registers its metadata record and appends it to
/// the work list when it needs instrumentation and has none yet.
///
/// Only the decoder's unrecoverable variant is returned as an error; the
/// caller decides whether to abort the batch or skip the file. Every other
/// failure is logged at error severity and reported as `Failed`.
pub fn scan_file(db: &MethodDatabase, path: &Path) -> Result<FileStatus, DecodeError> {
    apply(db, path, decode_one(db, path))
}

/// Scans a directory tree. Decodes in parallel, then registers and reports
/// sequentially in discovery order; aborts only on the first unrecoverable
/// decode failure in that order.
pub fn scan_tree(db: &MethodDatabase, root: &Path) -> Result<ScanReport> {
    let start = Instant::now();
    let files = discover_class_files(root)?;

    let outcomes: Vec<DecodeOutcome> = files.par_iter().map(|path| decode_one(db, path)).collect();

    let mut report = ScanReport {
        root: root.to_string_lossy().to_string(),
        scanned: 0,
        queued: 0,
        already_instrumented: 0,
        not_suspendable: 0,
        failed: 0,
        duration_ms: 0,
    };
    for (path, outcome) in files.iter().zip(outcomes) {
        report.scanned += 1;
        match apply(db, path, outcome)? {
            FileStatus::Queued => report.queued += 1,
            FileStatus::AlreadyInstrumented => report.already_instrumented += 1,
            FileStatus::NotSuspendable => report.not_suspendable += 1,
            FileStatus::Failed => report.failed += 1,
        }
    }
    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

#[derive(Debug)]
enum DecodeOutcome {
    Decoded(DecodedClass),
    Unrecoverable(DecodeError),
    Failed(String),
}

fn decode_one(db: &MethodDatabase, path: &Path) -> DecodeOutcome {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => return DecodeOutcome::Failed(format!("{}: {err}", path.display())),
    };
    match db.decoder().decode_full(&bytes) {
        Ok(decoded) => DecodeOutcome::Decoded(decoded),
        Err(err) if err.is_unrecoverable() => DecodeOutcome::Unrecoverable(err),
        Err(err) => DecodeOutcome::Failed(format!("{}: {err}", path.display())),
    }
}

fn apply(
    db: &MethodDatabase,
    path: &Path,
    outcome: DecodeOutcome,
) -> Result<FileStatus, DecodeError> {
    match outcome {
        DecodeOutcome::Unrecoverable(err) => Err(err),
        DecodeOutcome::Failed(message) => {
            db.diag().error(&message);
            Ok(FileStatus::Failed)
        }
        DecodeOutcome::Decoded(decoded) => {
            db.record(&decoded.name, decoded.entry);
            if !decoded.needs_instrumentation {
                return Ok(FileStatus::NotSuspendable);
            }
            if decoded.already_instrumented {
                db.diag()
                    .info(&format!("found instrumented class: {}", path.display()));
                Ok(FileStatus::AlreadyInstrumented)
            } else {
                db.diag().info(&format!("found class: {}", path.display()));
                db.push_work(path.to_path_buf());
                Ok(FileStatus::Queued)
            }
        }
    }
}
