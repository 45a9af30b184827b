//! 1-indexed inclusive line ranges with an end-of-file sentinel.

use std::fmt::{Display, Formatter};

use crate::{AppError, Result};

/// `end` value meaning "through the last line of the file".
pub const TO_EOF: i64 = -1;

/// A requested `[start, end]` window into a file.
///
/// Values are signed because callers send raw numbers and `-1` is meaningful;
/// [`LineRange::resolve`] turns them into concrete positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// First line to include, 1-indexed.
    pub start: i64,
    /// Last line to include, or [`TO_EOF`].
    pub end: i64,
}

impl LineRange {
    /// Range covering `start..=end`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range covering `start` through the end of the file.
    #[must_use]
    pub fn from_start(start: i64) -> Self {
        Self { start, end: TO_EOF }
    }

    /// Build a range from a caller-supplied list, which must hold exactly two values.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRange` when the list does not have two entries.
    pub fn from_values(values: &[i64]) -> Result<Self> {
        match values {
            [start, end] => Ok(Self::new(*start, *end)),
            _ => Err(AppError::InvalidRange(format!(
                "invalid `view_range` {values:?}; it should be a list of two integers"
            ))),
        }
    }

    /// Resolve against a file of `line_count` lines into 1-indexed inclusive bounds.
    ///
    /// `start` is checked strictly. An `end` past the last line is clamped so
    /// "read to the end" works without knowing the exact length.
    ///
    /// # Errors
    ///
    /// - `AppError::OutOfBounds` if `start < 1` or `start > line_count`.
    /// - `AppError::InvalidRange` if `end` is not [`TO_EOF`] and `end < start`.
    pub fn resolve(self, line_count: usize) -> Result<(usize, usize)> {
        let count = i64::try_from(line_count).unwrap_or(i64::MAX);

        if self.start < 1 || self.start > count {
            return Err(AppError::OutOfBounds(format!(
                "invalid `view_range` {self}: the start line `{}` should be within the range of lines in the file: [1, {count}]",
                self.start
            )));
        }

        let end = if self.end == TO_EOF {
            count
        } else if self.end < self.start {
            return Err(AppError::InvalidRange(format!(
                "invalid `view_range` {self}: the end line `{}` should be -1 or within the range of lines in the file: [{}, {count}]",
                self.end, self.start
            )));
        } else {
            self.end.min(count)
        };

        // Both bounds are now within 1..=count, which came from a usize.
        let start = usize::try_from(self.start).unwrap_or(usize::MAX);
        let end = usize::try_from(end).unwrap_or(usize::MAX);
        Ok((start, end))
    }
}

impl Display for LineRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
