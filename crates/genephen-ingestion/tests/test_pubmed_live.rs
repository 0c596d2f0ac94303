//! Live PubMed checks.
//!
//! Run with: cargo test --package genephen-ingestion --test test_pubmed_live -- --ignored --nocapture

use genephen_common::RetrieverConfig;
use genephen_ingestion::query::gene_query;
use genephen_ingestion::{LiteratureSource, Provenance, PubMedClient};

fn client() -> PubMedClient {
    let config = RetrieverConfig {
        api_key: std::env::var("NCBI_API_KEY").ok(),
        ..Default::default()
    };
    PubMedClient::new(config).expect("client")
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_search_and_metadata() {
    let pubmed = client();
    let ids = pubmed
        .search(&gene_query("KCNH2", &[], Some((2015, 2020))), 5)
        .await
        .expect("PubMed search failed");
    assert!(!ids.is_empty(), "Should find at least one paper");
    assert!(ids.len() <= 5);

    let meta = pubmed.fetch_metadata(&ids).await.expect("efetch failed");
    for id in &ids {
        if let Some(m) = meta.get(id) {
            println!("{id}: {:?} ({:?})", m.title, m.publication_date);
        }
    }
    assert!(!meta.is_empty());
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_fetch_text_prefers_full_text() {
    // Open-access article with a PMC counterpart.
    let (text, provenance) = client()
        .fetch_text("23299919", true)
        .await
        .expect("fetch_text failed");
    println!("{provenance}: {} chars", text.len());
    assert!(!text.is_empty());
    if provenance == Provenance::FullText {
        assert!(text.contains("## Abstract"));
    }
}
