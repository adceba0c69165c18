use std::env;

use digest_cli::{describe_error, init_tracing, load_settings, parse_command, render_digest_parts, render_response, Command};
use digest_core::archive::FsArchive;
use digest_core::loader::markup_to_text;
use digest_rag::QaService;

#[tokio::main]
async fn main() {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    if let Err(e) = run(command).await {
        eprintln!("{}", describe_error(&e));
        std::process::exit(1);
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let settings = load_settings()?;
    match command {
        Command::Index { force } => {
            let service = QaService::from_settings(&settings, true)?;
            let index = if force { service.rebuild_index().await? } else { service.handle().get().await? };
            println!("Index ready: {} digests, {} chunks (dim {})", index.document_count(), index.len(), index.dim());
            println!("Store: {}", settings.data.rag_store_path().display());
        }
        Command::Ask { question } => {
            let service = QaService::from_settings(&settings, false)?;
            let res = service.answer_question(&question).await?;
            print!("{}", render_response(&res));
        }
        Command::Archive { date: None } => {
            let archive = FsArchive::new(settings.data.digests_path());
            let dates = archive.list_dates()?;
            if dates.is_empty() {
                println!("No digests archived in {}", archive.dir().display());
            }
            for d in dates {
                println!("{}", d);
            }
        }
        Command::Archive { date: Some(date) } => {
            let archive = FsArchive::new(settings.data.digests_path());
            let parts = archive.load_digest_parts(&date).await?;
            if parts.is_empty() {
                println!("{}", markup_to_text(&archive.load_digest(&date).await?));
            } else {
                print!("{}", render_digest_parts(&date, &parts));
            }
        }
    }
    Ok(())
}
