//! Durable, append-only record of downloaded articles
//!
//! The ledger is a CSV file with the header `Title,Folder,URL,Timestamp`. Rows
//! are only ever appended; lookups scan the whole file, which keeps the file
//! itself the single source of truth across restarts.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crawler::storage::article_dir;

/// Header row of the ledger file
pub const LEDGER_HEADER: [&str; 4] = ["Title", "Folder", "URL", "Timestamp"];

/// Timestamp format of ledger rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

type Result<T> = std::result::Result<T, LedgerError>;

/// One row of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Folder")]
    pub folder: String,

    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// Append-only CSV ledger of completed articles
#[derive(Debug, Clone)]
pub struct DownloadLedger {
    root: PathBuf,
    path: PathBuf,
}

impl DownloadLedger {
    /// Open the ledger `file_name` under `root`, creating both with a header row if absent
    pub fn open(root: impl Into<PathBuf>, file_name: &str) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let path = root.join(file_name);

        let ledger = Self { root, path };
        ledger.ensure_header()?;
        Ok(ledger)
    }

    /// Write the header row if the ledger file is missing or empty
    fn ensure_header(&self) -> Result<()> {
        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if needs_header {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = csv::Writer::from_path(&self.path)?;
            writer.write_record(LEDGER_HEADER)?;
            writer.flush()?;
            info!(path = %self.path.display(), "Created download ledger");
        }
        Ok(())
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `title` is already downloaded, together with the folder the
    /// article belongs in
    ///
    /// An article counts as downloaded when its directory exists and the
    /// ledger has a row for it. A directory left behind by an interrupted
    /// iteration has no row; a row whose directory was removed has no files.
    pub fn is_downloaded(&self, title: &str) -> Result<(bool, PathBuf)> {
        let folder = article_dir(&self.root, title);
        if !folder.is_dir() {
            return Ok((false, folder));
        }

        self.ensure_header()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        for record in reader.records() {
            if record?.get(0) == Some(title) {
                debug!(title, "Found in ledger");
                return Ok((true, folder));
            }
        }
        Ok((false, folder))
    }

    /// Append a row for a completed article
    ///
    /// A ledger file removed while the crawler runs is recreated with its header.
    pub fn append(&self, title: &str, folder: &Path, url: &str, now: NaiveDateTime) -> Result<()> {
        self.ensure_header()?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let folder = folder.display().to_string();
        writer.write_record([title, folder.as_str(), url, timestamp.as_str()])?;
        writer.flush()?;
        Ok(())
    }

    /// All rows in the order they were appended
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.ensure_header()?;
        let mut reader = csv::Reader::from_path(&self.path)?;
        let entries = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_open_creates_header() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("articles");
        let ledger = DownloadLedger::open(&root, "download_log.csv").unwrap();

        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(contents, "Title,Folder,URL,Timestamp\n");
        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "download_log.csv").unwrap();

        let (downloaded, folder) = ledger.is_downloaded("Rust (language)").unwrap();
        assert!(!downloaded);
        assert_eq!(folder, dir.path().join("Rust_(language)"));
        fs::create_dir_all(&folder).unwrap();

        ledger
            .append(
                "Rust (language)",
                &folder,
                "https://en.wikipedia.org/wiki/Rust_(language)",
                timestamp(),
            )
            .unwrap();

        let reopened = DownloadLedger::open(dir.path(), "download_log.csv").unwrap();
        let (downloaded, same_folder) = reopened.is_downloaded("Rust (language)").unwrap();
        assert!(downloaded);
        assert_eq!(same_folder, folder);

        let entries = reopened.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, "2024-03-01 12:30:05");
        assert_eq!(entries[0].folder, folder.display().to_string());
    }

    #[test]
    fn test_exact_title_match_only() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        for folder in ["Paris", "paris", "Paris,_Texas"] {
            fs::create_dir_all(dir.path().join(folder)).unwrap();
        }
        ledger
            .append("Paris", &dir.path().join("Paris"), "https://x/Paris", timestamp())
            .unwrap();

        assert!(!ledger.is_downloaded("paris").unwrap().0);
        assert!(!ledger.is_downloaded("Paris, Texas").unwrap().0);
        assert!(ledger.is_downloaded("Paris").unwrap().0);
    }

    #[test]
    fn test_directory_alone_is_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        fs::create_dir_all(dir.path().join("Half_done")).unwrap();

        let (downloaded, folder) = ledger.is_downloaded("Half done").unwrap();
        assert!(!downloaded);
        assert!(folder.exists());
    }

    #[test]
    fn test_row_without_directory_is_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        let folder = dir.path().join("Gone_Page");
        fs::create_dir_all(&folder).unwrap();
        ledger
            .append("Gone Page", &folder, "https://x/Gone_Page", timestamp())
            .unwrap();
        assert!(ledger.is_downloaded("Gone Page").unwrap().0);

        fs::remove_dir_all(&folder).unwrap();
        let (downloaded, expected) = ledger.is_downloaded("Gone Page").unwrap();
        assert!(!downloaded);
        assert_eq!(expected, folder);
    }

    #[test]
    fn test_append_recreates_removed_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        let folder = dir.path().join("Late");
        fs::create_dir_all(&folder).unwrap();
        fs::remove_file(ledger.path()).unwrap();

        ledger.append("Late", &folder, "https://x/Late", timestamp()).unwrap();

        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert!(contents.starts_with("Title,Folder,URL,Timestamp\n"));
        assert!(ledger.is_downloaded("Late").unwrap().0);
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_titles_with_commas_and_quotes() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        let title = r#"Hello, "World""#;
        let folder = article_dir(dir.path(), title);
        fs::create_dir_all(&folder).unwrap();
        ledger.append(title, &folder, "https://x", timestamp()).unwrap();

        assert!(ledger.is_downloaded(title).unwrap().0);
        assert_eq!(ledger.entries().unwrap()[0].title, title);
    }

    #[test]
    fn test_appends_preserve_order() {
        let dir = TempDir::new().unwrap();
        let ledger = DownloadLedger::open(dir.path(), "log.csv").unwrap();
        for title in ["First", "Second", "Third"] {
            ledger
                .append(title, &dir.path().join(title), "https://x", timestamp())
                .unwrap();
        }

        let titles: Vec<String> = ledger.entries().unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }
}
