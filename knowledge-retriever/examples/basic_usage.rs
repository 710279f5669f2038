use anyhow::Result;
use knowledge_retriever::{
    config::RetrieverConfig, retrieval::keyword_index::RetrievalIndex, status::StatusApi,
};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempdir()?;
    let config = RetrieverConfig::new(temp_dir.path().to_path_buf());
    let index = RetrievalIndex::open(&config).await?;

    index.add_entry("python", "python is a language").await?;
    index.add_entry("rust", "rust is fast and safe").await?;
    index
        .add_entry("cargo", "cargo is the rust package manager")
        .await?;

    for query in ["tell me about python", "how does cargo build rust", "what time is it"] {
        let hits = index.search(query).await?;
        println!("{query:?}: {} hits", hits.len());
        for hit in hits {
            println!("  {:>5.1}  {}  {}", hit.score, hit.key_text, hit.content);
        }
    }

    let status = StatusApi::collect(&index).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
