use digest_cli::{describe_error, init_tracing, load_settings};
use digest_rag::index_handle_from_settings;

/// Unconditional rebuild of the persisted index from the digest archive.
#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("{}", describe_error(&e));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = load_settings()?;
    println!("Digest indexer\n==============");
    println!("Archive: {}", settings.data.digests_path().display());
    println!("Store:   {}", settings.data.rag_store_path().display());

    let handle = index_handle_from_settings(&settings, true)?;
    let index = handle.rebuild().await?;

    println!("\nIndexed {} digests into {} chunks (dim {})", index.document_count(), index.len(), index.dim());
    println!("Embedder: {}", index.fingerprint().embedder_id);
    Ok(())
}
