//! Reader for the line-oriented `key=value` files used by Arduino cores
//! (`platform.txt`, `boards.txt`, and project override files).
//!
//! Reading never fails: problems are reported as a [`ConfigIssue`] next to a
//! possibly empty [`ConfigFile`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `key=value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    /// 1-based line number in the source text
    pub line: usize,
}

impl ConfigEntry {
    /// Parse a single line. Returns `None` for blank lines, `#` comments,
    /// lines without `=` and lines with an empty key.
    ///
    /// Only the first `=` splits the line, values may contain more of them.
    pub fn parse_line(line: &str, line_number: usize) -> Option<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }

        Some(Self {
            key: key.to_string(),
            value: value.to_string(),
            line: line_number,
        })
    }
}

/// Entries of one file in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    entries: Vec<ConfigEntry>,
}

impl ConfigFile {
    /// Parse file contents. Carriage returns are normalised first.
    pub fn parse(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let entries = normalized
            .lines()
            .enumerate()
            .filter_map(|(index, line)| ConfigEntry::parse_line(line, index + 1))
            .collect();

        Self {
            path: None,
            entries,
        }
    }

    /// Attach the path the contents were read from.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of the last line defining `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// First line defining `key`.
    pub fn first(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Flatten into a map, the last occurrence of a key wins.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect()
    }
}

/// Whether a missing file is worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Mandatory,
    Optional,
}

/// Problem encountered while reading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    MissingFile { path: PathBuf },
    Unreadable { path: PathBuf, reason: String },
}

/// Outcome of [`read_config_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRead {
    pub file: ConfigFile,
    pub issue: Option<ConfigIssue>,
}

/// Read and parse a `key=value` file.
///
/// A missing file yields an empty [`ConfigFile`]; it is only reported when
/// `requirement` is [`Requirement::Mandatory`]. Other I/O failures are always
/// reported. Callers turn issues into errors or diagnostics and log them
/// there, so this only logs at debug level.
pub fn read_config_file(path: &Path, requirement: Requirement) -> ConfigRead {
    match fs::read_to_string(path) {
        Ok(text) => {
            let file = ConfigFile::parse(&text).with_path(path);
            debug!("Read {} entries from {}", file.len(), path.display());
            ConfigRead { file, issue: None }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let issue = match requirement {
                Requirement::Mandatory => {
                    debug!("Required file not found: {}", path.display());
                    Some(ConfigIssue::MissingFile {
                        path: path.to_path_buf(),
                    })
                }
                Requirement::Optional => {
                    debug!("Optional file not present: {}", path.display());
                    None
                }
            };
            ConfigRead {
                file: ConfigFile::default().with_path(path),
                issue,
            }
        }
        Err(e) => {
            debug!("Failed to read {}: {}", path.display(), e);
            ConfigRead {
                file: ConfigFile::default().with_path(path),
                issue: Some(ConfigIssue::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_on_first_equals() {
        let file = ConfigFile::parse("build.extra_flags=-DFOO=1 -DBAR=2\n");
        assert_eq!(file.get("build.extra_flags"), Some("-DFOO=1 -DBAR=2"));
    }

    #[test]
    fn test_skips_comments_blank_and_malformed_lines() {
        let text = "# comment=ignored\n\n   \nno equals here\n=empty key\nname=Arduino Nano\n";
        let file = ConfigFile::parse(text);
        assert_eq!(file.len(), 1);
        assert_eq!(file.get("name"), Some("Arduino Nano"));
        assert_eq!(file.entries()[0].line, 6);
    }

    #[test]
    fn test_carriage_returns_are_normalized() {
        let file = ConfigFile::parse("a=1\r\nb=2\rc=3\r\n");
        assert_eq!(file.get("a"), Some("1"));
        assert_eq!(file.get("b"), Some("2"));
        assert_eq!(file.get("c"), Some("3"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let file = ConfigFile::parse("build.mcu=atmega168\nbuild.mcu=atmega328p\n");
        assert_eq!(file.get("build.mcu"), Some("atmega328p"));
        assert_eq!(file.first("build.mcu").map(|e| e.value.as_str()), Some("atmega168"));
        assert_eq!(file.to_map()["build.mcu"], "atmega328p");
    }

    #[test]
    fn test_key_is_trimmed_value_is_kept() {
        let entry = ConfigEntry::parse_line("  compiler.c.flags = -Os ", 1).unwrap();
        assert_eq!(entry.key, "compiler.c.flags");
        assert_eq!(entry.value, " -Os ");
    }

    #[test]
    fn test_missing_optional_file_is_silent() {
        let temp = TempDir::new().unwrap();
        let read = read_config_file(&temp.path().join("absent.txt"), Requirement::Optional);
        assert!(read.file.is_empty());
        assert!(read.issue.is_none());
    }

    #[test]
    fn test_missing_mandatory_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("platform.txt");
        let read = read_config_file(&path, Requirement::Mandatory);
        assert!(read.file.is_empty());
        assert_eq!(read.issue, Some(ConfigIssue::MissingFile { path }));
    }

    #[test]
    fn test_unreadable_file_is_reported_even_when_optional() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be read as a file.
        let read = read_config_file(temp.path(), Requirement::Optional);
        assert!(read.file.is_empty());
        assert!(matches!(read.issue, Some(ConfigIssue::Unreadable { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("boards.txt");
        fs::write(&path, [b'a', b'=', 0xff, 0xfe]).unwrap();
        let read = read_config_file(&path, Requirement::Mandatory);
        assert!(matches!(read.issue, Some(ConfigIssue::Unreadable { .. })));
    }

    #[test]
    fn test_read_records_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("boards.txt");
        fs::write(&path, "nano.name=Arduino Nano\n").unwrap();
        let read = read_config_file(&path, Requirement::Mandatory);
        assert!(read.issue.is_none());
        assert_eq!(read.file.path(), Some(path.as_path()));
        assert_eq!(read.file.get("nano.name"), Some("Arduino Nano"));
    }
}
