//! Turns archived digest markup into plain-text documents.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;
use crate::traits::ArchiveStore;
use crate::types::DigestDocument;

/// Read every archived digest and convert it to text. Records that are empty
/// after conversion are skipped; an empty archive yields an empty vector.
pub async fn load_documents(archive: &dyn ArchiveStore) -> Result<Vec<DigestDocument>> {
    let files = archive.list_digest_files().await?;
    if files.is_empty() {
        tracing::info!("archive is empty, nothing to load");
        return Ok(vec![]);
    }
    let mut docs = Vec::with_capacity(files.len());
    for file in &files {
        let markup = archive.read_digest_content(file).await?;
        let text = markup_to_text(&markup);
        if text.is_empty() {
            tracing::warn!(date = %file.date, path = %file.path.display(), "digest has no text after markup stripping, skipping");
            continue;
        }
        docs.push(DigestDocument { text, date: file.date.clone(), source_path: file.source_path() });
    }
    tracing::info!(files = files.len(), documents = docs.len(), "loaded digest documents");
    Ok(docs)
}

/// Strip tags, decode common entities and collapse blank lines.
///
/// Block-level tags become line breaks so list items and headings stay on
/// their own lines; runs of blank lines collapse into one.
pub fn markup_to_text(markup: &str) -> String {
    let no_script = replace_with(script_regex(), markup, " ");
    let with_breaks = replace_with(block_regex(), &no_script, "\n");
    let stripped = replace_with(tag_regex(), &with_breaks, "");
    let decoded = decode_entities(&stripped);

    let mut out: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for line in decoded.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !previous_blank { out.push(String::new()); }
            previous_blank = true;
        } else {
            out.push(line);
            previous_blank = false;
        }
    }
    while out.last().is_some_and(String::is_empty) { out.pop(); }
    out.join("\n")
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn script_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>")
}

/// Opening, closing and self-closing forms of block-level tags.
fn block_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)<\s*/?\s*(p|li|h[1-6]|section|div|hr|br|tr|ul|ol|table|blockquote|header|footer|article)\b[^>]*>")
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?s)<[^>]*>")
}

fn replace_with(re: Option<&Regex>, text: &str, with: &str) -> String {
    match re {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_keeps_block_structure() {
        let html = "<h1>Global Tech Digest</h1>\n<p><em>2025-01-01</em></p><ul><li>First</li><li>Second &amp; third</li></ul>";
        assert_eq!(markup_to_text(html), "Global Tech Digest\n\n2025-01-01\n\nFirst\n\nSecond & third");
    }

    #[test]
    fn opening_block_tags_separate_words() {
        let html = "<ul><li><strong>Patch Tuesday</strong><ul><li>Microsoft fixed 60 bugs</li></ul></li></ul><p>Intro</p>Loose<h3>Title</h3>";
        assert_eq!(markup_to_text(html), "Patch Tuesday\n\nMicrosoft fixed 60 bugs\n\nIntro\nLoose\nTitle");
    }

    #[test]
    fn inline_tags_do_not_break_lines() {
        assert_eq!(markup_to_text("<p>A <strong>zero-day</strong> in <a href=\"x\">Chrome</a></p>"), "A zero-day in Chrome");
        assert_eq!(markup_to_text("<pre>code</pre>"), "code");
    }

    #[test]
    fn collapses_blank_runs() {
        let html = "<p>one</p>\n\n\n\n<hr/>\n\n<p>two</p>";
        assert_eq!(markup_to_text(html), "one\n\ntwo");
    }

    #[test]
    fn drops_scripts_and_styles() {
        let html = "<style>p { color: red }</style><p>visible</p><script>alert('x')</script>";
        assert_eq!(markup_to_text(html), "visible");
    }

    #[test]
    fn markup_without_text_is_empty() {
        assert_eq!(markup_to_text("<section>\n  <div></div>\n</section>"), "");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(markup_to_text("A new vulnerability was disclosed."), "A new vulnerability was disclosed.");
    }
}
