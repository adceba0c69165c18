//! Filesystem digest archive.
//!
//! Layout under the archive directory:
//! - `<YYYY-MM-DD>.html`: the full digest for that date
//! - `<YYYY-MM-DD>.{ai,cyber,summary}.html`: per-section partials
//! - `<YYYY-MM-DD>.md`: legacy digests, used only when no `.html` exists for that date

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::traits::ArchiveStore;
use crate::types::DigestFile;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Section bodies for one digest, as produced upstream by the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSections {
    pub ai_html: String,
    pub cyber_html: String,
    pub summary_html: String,
}

/// Partials read back from the archive; a missing file is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestParts {
    pub ai: Option<String>,
    pub cyber: Option<String>,
    pub summary: Option<String>,
}

impl DigestParts {
    pub fn is_empty(&self) -> bool {
        self.ai.is_none() && self.cyber.is_none() && self.summary.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FsArchive {
    dir: PathBuf,
}

impl FsArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full digests in the archive, newest first. A missing directory is an
    /// empty archive.
    pub fn list(&self) -> Result<Vec<DigestFile>> {
        if !self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "archive directory does not exist");
            return Ok(vec![]);
        }
        // date -> (path, is_html)
        let mut by_date: BTreeMap<NaiveDate, (PathBuf, bool)> = BTreeMap::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1).into_iter() {
            let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_html = match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("html") => true,
                Some(ext) if ext.eq_ignore_ascii_case("md") => false,
                _ => continue,
            };
            // partials have a stem like `2025-01-01.ai` and never parse
            let Some(date) = path.file_stem().and_then(|s| s.to_str()).and_then(parse_digest_date) else {
                continue;
            };
            match by_date.get(&date) {
                Some((_, true)) => {}
                Some((_, false)) if !is_html => {}
                _ => {
                    by_date.insert(date, (path.to_path_buf(), is_html));
                }
            }
        }
        let files: Vec<DigestFile> = by_date
            .into_iter()
            .rev()
            .map(|(date, (path, _))| DigestFile { date: date.format(DATE_FORMAT).to_string(), path })
            .collect();
        tracing::info!(dir = %self.dir.display(), files = files.len(), "listed digest files");
        Ok(files)
    }

    pub fn list_dates(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|f| f.date).collect())
    }

    /// Full markup of the digest for `date`.
    pub async fn load_digest(&self, date: &str) -> Result<String> {
        if parse_digest_date(date).is_none() {
            return Err(Error::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", date)));
        }
        for ext in ["html", "md"] {
            let path = self.dir.join(format!("{}.{}", date, ext));
            if path.is_file() {
                return Ok(tokio::fs::read_to_string(&path).await?);
            }
        }
        tracing::warn!(date, dir = %self.dir.display(), "digest not found");
        Err(Error::NotFound(format!("no digest archived for {}", date)))
    }

    pub async fn load_digest_parts(&self, date: &str) -> Result<DigestParts> {
        if parse_digest_date(date).is_none() {
            return Err(Error::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", date)));
        }
        let parts = DigestParts {
            ai: self.read_partial(date, "ai").await?,
            cyber: self.read_partial(date, "cyber").await?,
            summary: self.read_partial(date, "summary").await?,
        };
        tracing::debug!(date, ai = parts.ai.is_some(), cyber = parts.cyber.is_some(), summary = parts.summary.is_some(), "loaded digest partials");
        Ok(parts)
    }

    async fn read_partial(&self, date: &str, section: &str) -> Result<Option<String>> {
        let path = self.dir.join(format!("{}.{}.html", date, section));
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the full digest and its three partials; returns the full digest path.
    pub async fn save_digest(&self, date: &str, sections: &DigestSections) -> Result<PathBuf> {
        if parse_digest_date(date).is_none() {
            return Err(Error::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", date)));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let full_path = self.dir.join(format!("{}.html", date));
        tokio::fs::write(&full_path, render_digest_html(date, sections)).await?;
        for (section, body) in [("ai", &sections.ai_html), ("cyber", &sections.cyber_html), ("summary", &sections.summary_html)] {
            tokio::fs::write(self.dir.join(format!("{}.{}.html", date, section)), body).await?;
        }
        tracing::info!(date, path = %full_path.display(), "saved digest and partials");
        Ok(full_path)
    }
}

#[async_trait]
impl ArchiveStore for FsArchive {
    async fn list_digest_files(&self) -> Result<Vec<DigestFile>> {
        self.list()
    }

    async fn read_digest_content(&self, file: &DigestFile) -> Result<String> {
        match tokio::fs::read_to_string(&file.path).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("digest file {}", file.path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn parse_digest_date(s: &str) -> Option<NaiveDate> {
    // chrono accepts unpadded fields; archive names are always zero-padded
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Assemble the full report page from its three sections.
pub fn render_digest_html(date: &str, sections: &DigestSections) -> String {
    format!(
        "<h1>Global Tech Digest: AI &amp; Cybersecurity</h1>\n\
         <p><em>Digest for {date}</em></p>\n\
         \n<hr/>\n\n\
         <section class=\"ai-wrapper\">\n  {ai}\n</section>\n\
         \n<hr/>\n\n\
         <section class=\"cyber-wrapper\">\n  {cyber}\n</section>\n\
         \n<hr/>\n\n\
         <section class=\"summary-wrapper\">\n  {summary}\n</section>",
        date = date,
        ai = sections.ai_html,
        cyber = sections.cyber_html,
        summary = sections.summary_html,
    )
}
