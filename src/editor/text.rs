//! Pure line-level transformations used by the editor operations.
//!
//! A line is a `\n`-terminated segment; a final unterminated segment is also a
//! line, but a trailing terminator does not open an extra empty one.

/// Split `content` into lines, each keeping its terminator.
#[must_use]
pub fn split_lines(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}

/// Number of lines in `content`.
#[must_use]
pub fn line_count(content: &str) -> usize {
    content.split_inclusive('\n').count()
}

/// The line ending used by `content`, defaulting to `\n`.
#[must_use]
pub fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map_or(line, |rest| rest.strip_suffix('\r').unwrap_or(rest))
}

/// Render `lines` with right-aligned numbers starting at `first_number`.
///
/// The number column is at least three wide and grows to fit the largest
/// number shown, so a partial view prints the same absolute positions a full
/// view would.
#[must_use]
pub fn number_lines(lines: &[&str], first_number: usize) -> String {
    let last_number = first_number + lines.len().saturating_sub(1);
    let width = last_number.to_string().len().max(3);

    lines
        .iter()
        .enumerate()
        .map(|(offset, line)| {
            format!(
                "{:>width$} {}",
                first_number + offset,
                strip_terminator(line)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace every non-overlapping occurrence of `old` with `new`.
///
/// Returns the rewritten text and the number of occurrences found before
/// replacement, or `None` when `old` is empty or absent.
#[must_use]
pub fn replace_all(content: &str, old: &str, new: &str) -> Option<(String, usize)> {
    if old.is_empty() {
        return None;
    }
    let occurrences = content.matches(old).count();
    if occurrences == 0 {
        return None;
    }
    Some((content.replace(old, new), occurrences))
}

/// Insert `text` as new line(s) after line `after_line` (0 prepends).
///
/// The caller guarantees `after_line <= line_count(content)`.
#[must_use]
pub fn insert_after(content: &str, after_line: usize, text: &str) -> String {
    if content.is_empty() {
        return text.to_owned();
    }

    let eol = line_ending(content);
    let mut lines: Vec<String> = split_lines(content).into_iter().map(str::to_owned).collect();
    let appending = after_line >= lines.len();

    if appending {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                // The file had no trailing newline; keep it that way.
                last.push_str(eol);
                lines.push(text.to_owned());
                return lines.concat();
            }
        }
    }

    let mut inserted = text.to_owned();
    if !inserted.ends_with('\n') {
        inserted.push_str(eol);
    }
    lines.insert(after_line.min(lines.len()), inserted);
    lines.concat()
}
