//! Content extraction functionality for the crawler module
//!
//! Turns a parsed article page into an [`ArticleModel`]. Extraction is a pure
//! function of the document tree: it performs no I/O and never fails except
//! when the page lacks a title or a main content region.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::crawler::document::DocumentTree;
use crate::crawler::error::ExtractionError;
use crate::crawler::{
    ArticleModel, CrawlerConfig, ExternalLink, INTRODUCTION, ImageRef, MediaRef, Section, Table,
};

/// Id of the primary heading holding the article title
const TITLE_ID: &str = "firstHeading";

/// Id of the main content region
const CONTENT_ID: &str = "mw-content-text";

/// Id of the landmark that opens the external links section
const EXTERNAL_LINKS_ID: &str = "External_links";

/// Marker class of data tables
const DATA_TABLE_CLASS: &str = "wikitable";

/// Marker class of reference lists
const REFERENCES_CLASS: &str = "references";

static EDIT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*edit\s*\]").expect("edit marker pattern is valid"));

/// Extract the article title from the primary heading
///
/// # Arguments
///
/// * `doc` - The parsed page
///
/// # Returns
///
/// The trimmed title, or `ExtractionError::MissingTitle` when the page has no
/// non-empty `h1` carrying the title id
pub fn extract_title<D: DocumentTree>(doc: &D) -> Result<String, ExtractionError> {
    let heading = doc
        .find_by_id(TITLE_ID)
        .filter(|node| doc.tag_name(*node) == "h1")
        .ok_or(ExtractionError::MissingTitle)?;

    let title = doc.text(heading);
    if title.is_empty() {
        return Err(ExtractionError::MissingTitle);
    }
    Ok(title)
}

/// Extract the full article model from a page
///
/// # Arguments
///
/// * `doc` - The parsed page
/// * `page_url` - URL the page was served from, used to resolve relative image sources
/// * `config` - Crawler configuration (site base and media extensions)
///
/// # Returns
///
/// The article model, or an `ExtractionError` when the title or the main
/// content region is missing
pub fn extract_article<D: DocumentTree>(
    doc: &D,
    page_url: &str,
    config: &CrawlerConfig,
) -> Result<ArticleModel, ExtractionError> {
    let title = extract_title(doc)?;
    let content = doc
        .find_by_id(CONTENT_ID)
        .ok_or(ExtractionError::MissingContent)?;

    let page_base = Url::parse(page_url).ok();
    let site_base = Url::parse(&config.site_base).ok();

    let model = ArticleModel {
        sections: extract_sections(doc, content),
        images: extract_images(doc, content, page_base.as_ref()),
        tables: extract_tables(doc, content),
        linked_media: extract_media(doc, content, site_base.as_ref(), &config.media_extensions),
        references: extract_references(doc, content),
        external_links: extract_external_links(doc),
        title,
    };

    debug!(
        title = %model.title,
        sections = model.sections.len(),
        images = model.images.len(),
        tables = model.tables.len(),
        media = model.linked_media.len(),
        references = model.references.len(),
        external_links = model.external_links.len(),
        "Extracted article"
    );
    Ok(model)
}

/// Remove the `[edit]` marker from a heading
pub fn clean_heading(text: &str) -> String {
    EDIT_MARKER.replace_all(text, "").trim().to_string()
}

fn extract_sections<'a, D: DocumentTree>(doc: &'a D, content: D::Node<'a>) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut heading = INTRODUCTION.to_string();
    let mut buffer: Vec<String> = Vec::new();

    for node in doc.find_all(content, &["h2", "h3", "p"], None) {
        match doc.tag_name(node) {
            "p" => {
                let text = doc.text(node);
                if !text.is_empty() {
                    buffer.push(text);
                }
            }
            _ => {
                if !buffer.is_empty() {
                    sections.push(Section {
                        heading,
                        paragraphs: std::mem::take(&mut buffer),
                    });
                }
                heading = clean_heading(&doc.text(node));
            }
        }
    }

    if !buffer.is_empty() {
        sections.push(Section {
            heading,
            paragraphs: buffer,
        });
    }
    sections
}

/// Resolve a link found in the page into an absolute http(s) URL
fn resolve_url(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let url = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
            Err(_) => return None,
        }
    };

    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn extract_images<'a, D: DocumentTree>(
    doc: &'a D,
    content: D::Node<'a>,
    page_base: Option<&Url>,
) -> Vec<ImageRef> {
    doc.find_all(content, &["img"], None)
        .into_iter()
        .filter_map(|img| doc.attr(img, "src"))
        .filter_map(|src| resolve_url(page_base, src))
        .map(|absolute_url| ImageRef { absolute_url })
        .collect()
}

fn extract_tables<'a, D: DocumentTree>(doc: &'a D, content: D::Node<'a>) -> Vec<Table> {
    doc.find_all(content, &["table"], Some(DATA_TABLE_CLASS))
        .into_iter()
        .map(|table| Table {
            rows: doc
                .find_all(table, &["tr"], None)
                .into_iter()
                .map(|row| {
                    doc.find_all(row, &["th", "td"], None)
                        .into_iter()
                        .map(|cell| doc.text(cell))
                        .collect()
                })
                .collect(),
        })
        .collect()
}

/// True when the href ends with one of the media extensions, ignoring case
pub fn is_media_link(href: &str, extensions: &[String]) -> bool {
    let href = href.to_lowercase();
    extensions
        .iter()
        .any(|ext| href.ends_with(&ext.to_lowercase()))
}

fn extract_media<'a, D: DocumentTree>(
    doc: &'a D,
    content: D::Node<'a>,
    site_base: Option<&Url>,
    extensions: &[String],
) -> Vec<MediaRef> {
    doc.find_all(content, &["a"], None)
        .into_iter()
        .filter_map(|anchor| doc.attr(anchor, "href"))
        .filter(|href| is_media_link(href, extensions))
        .filter_map(|href| resolve_url(site_base, href))
        .map(|absolute_url| MediaRef { absolute_url })
        .collect()
}

fn extract_references<'a, D: DocumentTree>(doc: &'a D, content: D::Node<'a>) -> Vec<String> {
    doc.find_all(content, &["ol"], Some(REFERENCES_CLASS))
        .into_iter()
        .flat_map(|list| doc.find_all(list, &["li"], None))
        .map(|item| doc.text(item))
        .collect()
}

fn extract_external_links<D: DocumentTree>(doc: &D) -> Vec<ExternalLink> {
    let Some(landmark) = doc.find_by_id(EXTERNAL_LINKS_ID) else {
        return Vec::new();
    };
    let Some(list) = doc.find_next(landmark, "ul") else {
        return Vec::new();
    };

    doc.find_all(list, &["li"], None)
        .into_iter()
        .filter_map(|item| {
            let anchor = doc
                .find_all(item, &["a"], None)
                .into_iter()
                .find(|a| doc.attr(*a, "href").is_some())?;
            Some(ExternalLink {
                url: doc.attr(anchor, "href")?.to_string(),
                label: doc.text(item),
            })
        })
        .collect()
}
