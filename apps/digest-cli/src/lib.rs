//! Shared bootstrap for the `digest` and `digest-indexer` binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use digest_core::archive::DigestParts;
use digest_core::config::{Config, Settings};
use digest_core::loader::markup_to_text;
use digest_core::Error;
use digest_rag::{AnswerStatus, QaResponse};

/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,lance=warn,lancedb=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Load `.env` (if any) and then the layered configuration.
pub fn load_settings() -> anyhow::Result<Settings> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment from .env"),
        Err(e) if e.not_found() => tracing::debug!("no .env file, using process environment only"),
        Err(e) => tracing::warn!(error = %e, "failed to load .env file"),
    }
    let settings = Config::load()?.settings()?;
    tracing::debug!(digests = %settings.data.digests_path().display(), store = %settings.data.rag_store_path().display(), "configuration loaded");
    Ok(settings)
}

/// One-line message for errors a user can act on.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Error>() {
        Some(Error::EmptyCorpus) => "No archive yet: there are no digests to index. Generate a digest first.".to_string(),
        Some(Error::Configuration(msg)) => format!("Configuration error: {}", msg),
        Some(Error::InvalidInput(msg)) => format!("Invalid input: {}", msg),
        Some(Error::NotFound(msg)) => format!("Not found: {}", msg),
        _ => format!("Error: {:#}", err),
    }
}

pub fn render_response(res: &QaResponse) -> String {
    let mut out = String::new();
    out.push_str(&res.answer);
    out.push('\n');
    match res.status {
        AnswerStatus::Answered => {
            out.push_str("\nSources:\n");
            for s in &res.sources {
                out.push_str(&format!("  [{}] {} (score {:.3}) {}\n", s.index, s.date, s.score, s.source_path));
                let snippet = s.snippet.split_whitespace().collect::<Vec<_>>().join(" ");
                out.push_str(&format!("      {}\n", snippet));
            }
        }
        AnswerStatus::InsufficientEvidence => out.push_str("\n(no relevant digests found)\n"),
        AnswerStatus::ProviderUnavailable => out.push_str("\n(model provider unavailable)\n"),
    }
    out
}

/// Plain-text view of a digest from its section partials; missing sections are skipped.
pub fn render_digest_parts(date: &str, parts: &DigestParts) -> String {
    let mut out = format!("Digest for {}\n", date);
    for (title, body) in [("AI", &parts.ai), ("Cybersecurity", &parts.cyber), ("Summary", &parts.summary)] {
        let Some(body) = body else { continue };
        out.push_str(&format!("\n== {} ==\n{}\n", title, markup_to_text(body)));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Index { force: bool },
    Ask { question: String },
    Archive { date: Option<String> },
}

pub fn parse_command(args: &[String]) -> Result<Command, String> {
    let (cmd, rest) = args.split_first().ok_or_else(usage)?;
    match cmd.as_str() {
        "index" => {
            let mut force = false;
            for a in rest {
                match a.as_str() {
                    "--force" | "-f" => force = true,
                    other => return Err(format!("unknown flag for index: {}\n{}", other, usage())),
                }
            }
            Ok(Command::Index { force })
        }
        "ask" => {
            let question = rest.join(" ");
            if question.trim().is_empty() {
                return Err(format!("ask needs a question\n{}", usage()));
            }
            Ok(Command::Ask { question })
        }
        "archive" => Ok(Command::Archive { date: rest.first().cloned() }),
        other => Err(format!("unknown command: {}\n{}", other, usage())),
    }
}

pub fn usage() -> String {
    "Usage: digest <index [--force] | ask \"<question>\" | archive [YYYY-MM-DD]>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_rag::Source;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command(&args(&["index"])), Ok(Command::Index { force: false }));
        assert_eq!(parse_command(&args(&["index", "--force"])), Ok(Command::Index { force: true }));
        assert_eq!(
            parse_command(&args(&["ask", "what", "happened?"])),
            Ok(Command::Ask { question: "what happened?".into() })
        );
        assert_eq!(parse_command(&args(&["archive", "2025-01-02"])), Ok(Command::Archive { date: Some("2025-01-02".into()) }));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command(&[]).is_err());
        assert!(parse_command(&args(&["ask", "  "])).is_err());
        assert!(parse_command(&args(&["index", "--nope"])).is_err());
        assert!(parse_command(&args(&["serve"])).is_err());
    }

    #[test]
    fn empty_corpus_gets_a_friendly_message() {
        let err = anyhow::Error::from(Error::EmptyCorpus);
        assert!(describe_error(&err).starts_with("No archive yet"));
    }

    #[test]
    fn renders_available_sections_only() {
        let parts = DigestParts {
            ai: Some("<ul><li>Open model released</li></ul>".into()),
            cyber: None,
            summary: Some("<p>Quiet day.</p>".into()),
        };
        let out = render_digest_parts("2025-01-02", &parts);
        assert_eq!(out, "Digest for 2025-01-02\n\n== AI ==\nOpen model released\n\n== Summary ==\nQuiet day.\n");
    }

    #[test]
    fn renders_numbered_sources() {
        let res = QaResponse {
            question: "q".into(),
            answer: "It happened [1].".into(),
            status: AnswerStatus::Answered,
            sources: vec![Source {
                index: 1,
                date: "2025-01-02".into(),
                source_path: "digests/2025-01-02.html".into(),
                snippet: "A new\nvulnerability".into(),
                score: 0.5,
            }],
        };
        let out = render_response(&res);
        assert!(out.starts_with("It happened [1].\n"));
        assert!(out.contains("[1] 2025-01-02 (score 0.500) digests/2025-01-02.html"));
        assert!(out.contains("A new vulnerability"));
    }
}
