use digest_core::archive::{DigestSections, FsArchive};
use digest_core::chunker::split_documents;
use digest_core::loader::load_documents;
use tempfile::TempDir;

#[tokio::test]
async fn archive_to_chunks_end_to_end() {
    let tmp = TempDir::new().expect("tempdir");
    std::fs::write(tmp.path().join("2025-01-01.html"), "<h1>AI</h1><p>AI models advance rapidly.</p>").expect("write");
    std::fs::write(tmp.path().join("2025-01-02.html"), "<h1>Cyber</h1><p>A new vulnerability was disclosed.</p>").expect("write");
    // partials must not be indexed as separate digests
    std::fs::write(tmp.path().join("2025-01-02.cyber.html"), "<p>A new vulnerability was disclosed.</p>").expect("write");

    let archive = FsArchive::new(tmp.path());
    let docs = load_documents(&archive).await.expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].date, "2025-01-02");
    assert_eq!(docs[0].text, "Cyber\n\nA new vulnerability was disclosed.");
    assert!(docs[0].source_path.ends_with("2025-01-02.html"));

    let chunks = split_documents(&docs, 800, 150).expect("split");
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.chunk_index == 0));
}

#[tokio::test]
async fn empty_and_blank_digests_yield_no_documents() {
    let tmp = TempDir::new().expect("tempdir");
    let archive = FsArchive::new(tmp.path());
    assert!(load_documents(&archive).await.expect("load").is_empty());

    std::fs::write(tmp.path().join("2025-01-03.html"), "<section>\n</section>").expect("write");
    assert!(load_documents(&archive).await.expect("load").is_empty());
}

#[tokio::test]
async fn saved_digest_is_loadable_as_text() {
    let tmp = TempDir::new().expect("tempdir");
    let archive = FsArchive::new(tmp.path());
    let sections = DigestSections {
        ai_html: "<ul><li>New open model released</li></ul>".into(),
        cyber_html: "<ul><li>Ransomware group targets hospitals</li></ul>".into(),
        summary_html: "<p>Busy day.</p>".into(),
    };
    archive.save_digest("2025-03-04", &sections).await.expect("save");

    let docs = load_documents(&archive).await.expect("load");
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("Ransomware group targets hospitals"));
    assert!(docs[0].text.contains("AI & Cybersecurity"));
    assert!(!docs[0].text.contains('<'));
}
