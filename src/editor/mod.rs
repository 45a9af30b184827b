//! Line-indexed text mutation engine.
//!
//! Every operation is a stateless read-modify-write of one whole file. Nothing
//! is cached between calls and no lock is held against other writers: if two
//! writers race on one file, the last write wins.
//!
//! Failures are specific and leave the file untouched, so a caller that sent a
//! bad line number or an ambiguous pattern can `view` again and retry.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::{AppError, Result};

pub mod range;
pub mod text;
pub mod writer;

pub use range::{LineRange, TO_EOF};
pub use writer::WriteSummary;

/// Show a file with absolute 1-indexed line numbers, optionally restricted to `range`.
///
/// # Errors
///
/// Returns `AppError::NotFound` / `AppError::NotAFile` if `path` is not a
/// regular file, `AppError::OutOfBounds` / `AppError::InvalidRange` for a bad
/// range, and `AppError::Io` if the file cannot be read.
pub fn view(path: &Path, range: Option<LineRange>) -> Result<String> {
    let content = read_regular_file(path)?;
    let lines = text::split_lines(&content);

    let (first, last) = match range {
        Some(range) => range.resolve(lines.len())?,
        None => (1, lines.len()),
    };
    if lines.is_empty() {
        return Ok(String::new());
    }

    debug!(path = %path.display(), first, last, "viewing file");
    Ok(text::number_lines(&lines[first - 1..last], first))
}

/// Write `file_text` to `path`, creating parent directories and replacing any existing file.
///
/// This is the only operation that accepts a path that does not exist yet.
///
/// # Errors
///
/// Returns `AppError::NotAFile` if `path` is a directory and `AppError::Io`
/// if the write fails.
pub fn create(path: &Path, file_text: &str) -> Result<WriteSummary> {
    let summary = writer::write_file(path, file_text)?;
    info!(
        path = %path.display(),
        bytes = summary.bytes_written,
        replaced = summary.replaced_existing,
        "file created"
    );
    Ok(summary)
}

/// Replace every verbatim occurrence of `old` with `new` (deletion when `new` is `None`).
///
/// Returns how many occurrences existed before the edit. A count above one
/// tells the caller its pattern was broader than intended.
///
/// # Errors
///
/// Returns `AppError::NotFound` / `AppError::NotAFile` for a bad path,
/// `AppError::PatternNotFound` if `old` is empty or absent, and
/// `AppError::Io` on read or write failures.
pub fn replace(path: &Path, old: &str, new: Option<&str>) -> Result<usize> {
    let content = read_regular_file(path)?;

    if old.is_empty() {
        return Err(AppError::PatternNotFound(format!(
            "the search string is empty; nothing to match in {}",
            path.display()
        )));
    }

    let (updated, occurrences) = text::replace_all(&content, old, new.unwrap_or_default())
        .ok_or_else(|| {
            AppError::PatternNotFound(format!("string not found in file: {}", path.display()))
        })?;

    writer::write_file(path, &updated)?;
    info!(path = %path.display(), occurrences, "replaced text");
    Ok(occurrences)
}

/// Insert `new_text` after line `after_line`; `0` makes it the new first line.
///
/// # Errors
///
/// Returns `AppError::NotFound` / `AppError::NotAFile` for a bad path,
/// `AppError::OutOfBounds` if `after_line` is negative or past the last
/// line, and `AppError::Io` on read or write failures.
pub fn insert(path: &Path, after_line: i64, new_text: &str) -> Result<()> {
    let content = read_regular_file(path)?;
    let count = text::line_count(&content);

    if after_line < 0 {
        return Err(AppError::OutOfBounds(format!(
            "invalid insert_line {after_line} for {}: line number must be >= 0",
            path.display()
        )));
    }
    let position = usize::try_from(after_line).unwrap_or(usize::MAX);
    if position > count {
        return Err(AppError::OutOfBounds(format!(
            "invalid insert_line {after_line} for {}: line number cannot be greater than the number of lines in the file ({count})",
            path.display()
        )));
    }

    let updated = text::insert_after(&content, position, new_text);
    writer::write_file(path, &updated)?;
    info!(path = %path.display(), after_line, "inserted text");
    Ok(())
}

/// Read `path` as UTF-8 after checking it is an existing regular file.
fn read_regular_file(path: &Path) -> Result<String> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!(
                "file does not exist: {}",
                path.display()
            )));
        }
        Err(err) => {
            return Err(AppError::Io(format!(
                "error reading {}: {err}",
                path.display()
            )));
        }
    };

    if !metadata.is_file() {
        return Err(AppError::NotAFile(format!(
            "path is not a file: {}",
            path.display()
        )));
    }

    fs::read_to_string(path)
        .map_err(|err| AppError::Io(format!("error reading {}: {err}", path.display())))
}
