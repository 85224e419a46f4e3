//! Exclusion filter
//!
//! An ordered list of regular expressions loaded once at startup. A path is
//! excluded when any pattern matches either its absolute local form or its
//! name relative to the watched root. Excluded paths never appear in a scan,
//! a listing, or a queued job.
//!
//! File format: one pattern per line. Blank lines and lines whose first
//! non-blank character is `#` or `;` are ignored.

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading exclusion patterns
#[derive(Debug, Error)]
pub enum ExclusionError {
    /// The exclusion file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line did not compile as a regular expression
    #[error("Invalid pattern on line {line} ('{pattern}'): {source}")]
    Pattern {
        /// 1-based line number
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Immutable set of exclusion patterns
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// A filter that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses patterns from the text of an exclusion file
    ///
    /// # Errors
    /// Returns [`ExclusionError::Pattern`] for the first invalid line
    pub fn parse(source: &str) -> Result<Self, ExclusionError> {
        let mut patterns = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            let regex = Regex::new(line).map_err(|source| ExclusionError::Pattern {
                line: idx + 1,
                pattern: line.to_string(),
                source,
            })?;
            debug!(pattern = line, "Loaded exclusion pattern");
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// Loads patterns from `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or holds an invalid pattern
    pub fn load(path: &Path) -> Result<Self, ExclusionError> {
        let source = std::fs::read_to_string(path).map_err(|source| ExclusionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let filter = Self::parse(&source)?;
        info!(
            path = %path.display(),
            patterns = filter.len(),
            "Loaded exclusion file"
        );
        Ok(filter)
    }

    /// Loads from `path` when given, otherwise returns an empty filter
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self, ExclusionError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::empty()),
        }
    }

    /// Returns true if any pattern matches `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// Returns true if the file at `path`, named `name` relative to the root, is excluded
    pub fn excludes(&self, path: &Path, name: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        self.is_match(name) || self.is_match(&path.to_string_lossy())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';')
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_filter_matches_nothing() {
        let filter = ExclusionFilter::empty();
        assert!(!filter.is_match("anything"));
        assert!(!filter.excludes(Path::new("/r/a.swp"), "a.swp"));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let filter = ExclusionFilter::parse(
            "# editor files\n\n   ; old style comment\n\\.swp$\n   \t\n~$\n",
        )
        .unwrap();
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_extended_syntax_patterns() {
        let filter = ExclusionFilter::parse("^(tmp|cache)/\n\\.(o|a)$\n").unwrap();
        assert!(filter.is_match("tmp/x"));
        assert!(filter.is_match("cache/y/z"));
        assert!(filter.is_match("build/lib.a"));
        assert!(!filter.is_match("src/tmp/x.c"));
    }

    #[test]
    fn test_excludes_checks_relative_and_absolute_forms() {
        let filter = ExclusionFilter::parse("^/srv/www/logs/\n^private/\n").unwrap();
        assert!(filter.excludes(Path::new("/srv/www/logs/a.log"), "logs/a.log"));
        assert!(filter.excludes(Path::new("/srv/www/private/k"), "private/k"));
        assert!(!filter.excludes(Path::new("/srv/www/public/k"), "public/k"));
    }

    #[test]
    fn test_invalid_pattern_reports_line() {
        let err = ExclusionFilter::parse("# ok\n\\.swp$\n(unclosed\n").unwrap_err();
        match err {
            ExclusionError::Pattern { line, pattern, .. } => {
                assert_eq!(line, 3);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\\.tmp$\r\n#c\r\n").unwrap();
        tmp.flush().unwrap();

        let filter = ExclusionFilter::load(tmp.path()).unwrap();
        assert_eq!(filter.len(), 1);
        assert!(filter.is_match("x.tmp"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = ExclusionFilter::load(Path::new("/nonexistent/exclude")).unwrap_err();
        assert!(matches!(err, ExclusionError::Read { .. }));
    }

    #[test]
    fn test_optional_file_none_is_empty() {
        let filter = ExclusionFilter::from_optional_file(None).unwrap();
        assert!(filter.is_empty());
    }
}
