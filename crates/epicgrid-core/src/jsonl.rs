//! `issues.jsonl`: one issue per line.
//!
//! Blank lines and `#` comment lines are skipped on read. Writes go through a
//! sibling temp file that is synced and renamed over the target.

use crate::issue::Issue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Errors from JSONL operations. Line numbers are 1-based; 0 means "whole file".
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted data file: {0}")]
    Corrupt(String),
}

fn read_records<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| JsonlError::Io(line_no, e.to_string()))?;
        let body = line.trim();
        if body.is_empty() || body.starts_with('#') {
            continue;
        }
        let record =
            serde_json::from_str(body).map_err(|e| JsonlError::Parse(line_no, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

fn write_records<T: Serialize>(writer: &mut impl Write, records: &[T]) -> Result<(), JsonlError> {
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

pub fn read_issues(reader: impl BufRead) -> Result<Vec<Issue>, JsonlError> {
    read_records(reader)
}

pub fn write_issues(writer: &mut impl Write, issues: &[Issue]) -> Result<(), JsonlError> {
    write_records(writer, issues)
}

/// Read issues from a file, rejecting NUL and non-UTF-8 content up front.
pub fn read_issues_from_path(path: impl AsRef<Path>) -> Result<Vec<Issue>, JsonlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    check_text(path, &bytes)?;
    read_issues(bytes.as_slice())
}

/// Replace `path` with the given issues.
pub fn write_issues_to_path(path: impl AsRef<Path>, issues: &[Issue]) -> Result<(), JsonlError> {
    let path = path.as_ref();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    }

    let staging = staging_path(path);
    if let Err(error) = write_synced(&staging, issues) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(JsonlError::Io(
            0,
            format!("{} -> {}: {e}", staging.display(), path.display()),
        ));
    }

    if let Some(dir) = dir {
        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| io_error(dir, e))?;
    }
    Ok(())
}

fn write_synced(path: &Path, issues: &[Issue]) -> Result<(), JsonlError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);
    write_issues(&mut writer, issues)?;
    let file = writer
        .into_inner()
        .map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(format!(".tmp.{}", std::process::id()));
    PathBuf::from(name)
}

fn io_error(path: &Path, error: std::io::Error) -> JsonlError {
    JsonlError::Io(0, format!("{}: {error}", path.display()))
}

fn check_text(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}
