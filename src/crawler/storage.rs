//! Per-article directory layout and artifact writers
//!
//! `ArtifactStore` writes everything extracted from one article into its own
//! directory. Each artifact is written on its own, so a failing download is
//! recorded and skipped while the rest of the article is still saved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::CrawlError;
use super::fetch::Fetcher;
use super::{ArticleModel, ExternalLink, Table};

/// Longest directory or file name produced from a title or URL, in bytes
const MAX_NAME_BYTES: usize = 200;

/// Longest suffix kept intact when a file name is shortened
const MAX_EXTENSION_BYTES: usize = 16;

/// Subdirectory for downloaded images
pub const IMAGES_DIR: &str = "images";

/// Subdirectory for downloaded linked media
pub const MEDIA_DIR: &str = "media";

/// Replace path separators, characters rejected by common filesystems and
/// control characters with underscores
fn replace_invalid(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Longest prefix of `s` that fits in `max` bytes
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn or_placeholder(name: String) -> String {
    if name.is_empty() || name == "." || name == ".." {
        return "_".to_string();
    }
    name
}

/// Turn an article title into a single valid path segment
///
/// Spaces, path separators and characters rejected by common filesystems
/// become underscores.
pub fn sanitize_title(title: &str) -> String {
    let name = replace_invalid(title).replace(' ', "_");
    or_placeholder(truncate_at_boundary(&name, MAX_NAME_BYTES).to_string())
}

/// Turn a decoded URL segment into a file name
///
/// Spaces are kept. When the name is too long the stem is shortened and the
/// extension is kept.
pub fn sanitize_file_name(segment: &str) -> String {
    let name = replace_invalid(segment);
    if name.len() <= MAX_NAME_BYTES {
        return or_placeholder(name);
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let stem = truncate_at_boundary(stem, MAX_NAME_BYTES - extension.len());
    or_placeholder(format!("{}{}", stem, extension))
}

/// Directory holding the artifacts of `title` under `root`
pub fn article_dir(root: &Path, title: &str) -> PathBuf {
    root.join(sanitize_title(title))
}

/// File name for a downloaded URL: the last path segment, percent-decoded
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(sanitize_file_name(&decoded))
}

/// Render the sections of an article as plain text
pub fn render_text(model: &ArticleModel) -> String {
    let mut text = String::new();
    for section in &model.sections {
        text.push('\n');
        text.push_str(&format!("=== {} ===\n", section.heading));
        text.push('\n');
        for paragraph in &section.paragraphs {
            text.push_str(paragraph);
            text.push('\n');
        }
    }
    text
}

/// Render a table as CSV
pub fn render_table(table: &Table) -> Result<Vec<u8>, CrawlError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| CrawlError::Other(format!("CSV error: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| CrawlError::Other(format!("CSV error: {}", e)))
}

/// Render references, each followed by a blank line
pub fn render_references(references: &[String]) -> String {
    references
        .iter()
        .map(|reference| format!("{}\n\n", reference))
        .collect()
}

/// Render external links as `url - label` lines
pub fn render_external_links(links: &[ExternalLink]) -> String {
    links
        .iter()
        .map(|link| format!("{} - {}\n", link.url, link.label))
        .collect()
}

/// Saved and failed downloads of one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTally {
    pub saved: usize,
    pub failed: usize,
}

/// What `ArtifactStore::persist` wrote for one article
#[derive(Debug, Default)]
pub struct PersistReport {
    /// Path of the section text file
    pub text_file: PathBuf,

    /// Image downloads
    pub images: FileTally,

    /// Linked media downloads
    pub media: FileTally,

    /// Number of table files written
    pub tables: usize,

    /// Number of references written
    pub references: usize,

    /// Number of external links written
    pub external_links: usize,

    /// Artifact errors that were absorbed
    pub failures: Vec<CrawlError>,
}

impl PersistReport {
    fn absorb(&mut self, err: CrawlError) {
        warn!("Skipping artifact: {}", err);
        self.failures.push(err);
    }
}

/// Filesystem layout of downloaded articles
///
/// ```text
/// <root>/<sanitized-title>/
///     <sanitized-title>.txt
///     images/<file>
///     media/<file>
///     table_1.csv, table_2.csv, ...
///     references.txt
///     external_links.txt
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of `title`
    pub fn article_dir(&self, title: &str) -> PathBuf {
        article_dir(&self.root, title)
    }

    /// Write every artifact of `model` into `folder`
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used to download images and linked media
    /// * `folder` - The article directory, created if missing
    /// * `model` - The extracted article
    /// * `file_timeout` - Timeout for each download
    ///
    /// # Returns
    ///
    /// A report of what was written. Failing to create the article directory
    /// is an error; any other failure is logged, recorded in the report and
    /// skipped.
    #[instrument(skip_all, fields(title = %model.title))]
    pub async fn persist<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        folder: &Path,
        model: &ArticleModel,
        file_timeout: Duration,
    ) -> Result<PersistReport, CrawlError> {
        fs::create_dir_all(folder).await?;
        let mut report = PersistReport {
            text_file: folder.join(format!("{}.txt", sanitize_title(&model.title))),
            ..Default::default()
        };

        let text_file = report.text_file.clone();
        self.write_artifact(&text_file, render_text(model).into_bytes(), &mut report)
            .await;

        let image_urls: Vec<&str> = model.images.iter().map(|i| i.absolute_url.as_str()).collect();
        report.images = self
            .download_all(fetcher, &image_urls, &folder.join(IMAGES_DIR), file_timeout, &mut report)
            .await;

        for (index, table) in model.tables.iter().enumerate() {
            let path = folder.join(format!("table_{}.csv", index + 1));
            match render_table(table) {
                Ok(csv) => {
                    if self.write_artifact(&path, csv, &mut report).await {
                        report.tables += 1;
                    }
                }
                Err(e) => report.absorb(CrawlError::artifact(&path, e)),
            }
        }

        let media_urls: Vec<&str> = model
            .linked_media
            .iter()
            .map(|m| m.absolute_url.as_str())
            .collect();
        report.media = self
            .download_all(fetcher, &media_urls, &folder.join(MEDIA_DIR), file_timeout, &mut report)
            .await;

        if self
            .write_artifact(
                &folder.join("references.txt"),
                render_references(&model.references).into_bytes(),
                &mut report,
            )
            .await
        {
            report.references = model.references.len();
        }

        if self
            .write_artifact(
                &folder.join("external_links.txt"),
                render_external_links(&model.external_links).into_bytes(),
                &mut report,
            )
            .await
        {
            report.external_links = model.external_links.len();
        }

        info!(
            images = report.images.saved,
            media = report.media.saved,
            tables = report.tables,
            failures = report.failures.len(),
            "Persisted article to {}",
            folder.display()
        );
        Ok(report)
    }

    /// Write one artifact, recording a failure in the report instead of returning it
    async fn write_artifact(&self, path: &Path, contents: Vec<u8>, report: &mut PersistReport) -> bool {
        match fs::write(path, contents).await {
            Ok(()) => true,
            Err(e) => {
                report.absorb(CrawlError::artifact(path, e));
                false
            }
        }
    }

    async fn download_all<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        urls: &[&str],
        dir: &Path,
        timeout: Duration,
        report: &mut PersistReport,
    ) -> FileTally {
        let mut tally = FileTally::default();
        if let Err(e) = fs::create_dir_all(dir).await {
            report.absorb(CrawlError::artifact(dir, e));
            tally.failed = urls.len();
            return tally;
        }

        for url in urls {
            match self.download(fetcher, url, dir, timeout).await {
                Ok(path) => {
                    debug!(url, path = %path.display(), "Downloaded file");
                    tally.saved += 1;
                }
                Err(e) => {
                    report.absorb(e);
                    tally.failed += 1;
                }
            }
        }
        tally
    }

    async fn download<F: Fetcher + ?Sized>(
        &self,
        fetcher: &F,
        url: &str,
        dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, CrawlError> {
        let name = file_name_from_url(url)
            .ok_or_else(|| CrawlError::artifact(dir, format!("no file name in {}", url)))?;
        let path = dir.join(name);

        let page = fetcher
            .get(url, timeout)
            .await
            .map_err(|e| CrawlError::artifact(&path, format!("{} ({})", e, url)))?;
        fs::write(&path, page.body)
            .await
            .map_err(|e| CrawlError::artifact(&path, e))?;
        Ok(path)
    }
}
