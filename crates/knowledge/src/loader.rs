//! Source document loading and text extraction.
//!
//! PDFs are extracted with the `pdftotext` tool from poppler-utils, which
//! separates pages with form feeds. Plain text keeps form feeds as page
//! breaks too, so pre-extracted reports retain their page numbers.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use insight_core::{AppError, AppResult};
use walkdir::WalkDir;

use crate::types::Document;

const PAGE_BREAK: char = '\u{0C}';

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Stable document id for a path: the path as given, with `/` separators.
pub fn document_id(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Load one file into a `Document`.
pub fn load_document(path: &Path) -> AppResult<Document> {
    if !path.is_file() {
        return Err(AppError::Document(format!("File not found: {:?}", path)));
    }

    let content_type = ContentType::from_path(path);
    let id = document_id(path);

    let document = match content_type {
        ContentType::Pdf => {
            let raw = extract_pdf_text(path)?;
            Document::from_pages(id, path, split_pages(&raw).as_slice())
        }
        ContentType::PlainText => {
            let raw = read_text(path)?;
            if raw.contains(PAGE_BREAK) {
                Document::from_pages(id, path, split_pages(&raw).as_slice())
            } else {
                Document::new(id, path, raw)
            }
        }
        ContentType::Markdown => Document::new(id, path, clean_markdown(&read_text(path)?)),
        ContentType::Html => Document::new(id, path, clean_html(&read_text(path)?)),
        ContentType::Unknown => {
            let raw = read_text(path)?;
            if !is_likely_text(&raw) {
                return Err(AppError::Document(format!(
                    "Binary file not supported: {:?}",
                    path
                )));
            }
            Document::new(id, path, raw)
        }
    };

    if document.text.trim().is_empty() {
        return Err(AppError::Document(format!(
            "No extractable text in {:?}",
            path
        )));
    }

    tracing::debug!(
        document = %document.id,
        content_type = content_type.as_str(),
        chars = document.char_len(),
        pages = document.pages.len(),
        "Loaded document"
    );

    Ok(document)
}

/// Load every document named by `paths`.
///
/// Directories are walked recursively in file name order; hidden entries and
/// unsupported or unreadable files inside them are skipped with a warning.
/// Files named explicitly must load. A file reached more than once, by
/// repeating it or by naming both it and a directory above it, loads once.
pub fn load_corpus<P: AsRef<Path>>(paths: &[P]) -> AppResult<Vec<Document>> {
    let mut documents = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for file in walk_directory(path) {
                if !seen.insert(canonical(&file)) {
                    tracing::debug!("Already loaded {:?}", file);
                    continue;
                }
                match load_document(&file) {
                    Ok(doc) => documents.push(doc),
                    Err(e) => tracing::warn!("Skipping {:?}: {}", file, e),
                }
            }
        } else if seen.insert(canonical(path)) {
            documents.push(load_document(path)?);
        } else {
            tracing::debug!("Already loaded {:?}", path);
        }
    }

    if documents.is_empty() {
        return Err(AppError::Document(
            "No documents found to ingest".to_string(),
        ));
    }

    tracing::info!("Loaded {} document(s)", documents.len());
    Ok(documents)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn walk_directory(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| ContentType::from_path(p) != ContentType::Unknown)
        .collect()
}

fn read_text(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::Document(format!("Failed to read {:?}: {}", path, e)))
}

/// Run `pdftotext` and return its UTF-8 output.
fn extract_pdf_text(path: &Path) -> AppResult<String> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::Document(
                "pdftotext not found; install poppler-utils to ingest PDF files".to_string(),
            ),
            _ => AppError::Document(format!("Failed to run pdftotext on {:?}: {}", path, e)),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Document(format!(
            "pdftotext failed for {:?} ({}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Split extracted text into pages on form feeds.
///
/// `pdftotext` ends every page with a form feed, so a trailing empty
/// segment is dropped.
fn split_pages(raw: &str) -> Vec<&str> {
    let mut pages: Vec<&str> = raw.split(PAGE_BREAK).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Strip markdown headers, rules and code fences.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Strip tags, scripts and styles, then collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &lower[i..];
            if rest.starts_with("<script") {
                in_script = true;
            } else if rest.starts_with("</script") {
                in_script = false;
            } else if rest.starts_with("<style") {
                in_style = true;
            } else if rest.starts_with("</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    decode_entities(&result.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}
