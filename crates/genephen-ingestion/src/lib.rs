//! genephen-ingestion — Literature retrieval.
//! - Paper discovery (PubMed esearch, NCBI Gene synonym expansion)
//! - Batched citation metadata
//! - PMC cross-reference and full-text assembly
//! - Supplementary material download and decoding
//! - Retry/backoff over a sandboxed HTTP transport

pub mod decode;
pub mod models;
pub mod query;
pub mod retry;
pub mod sources;
pub mod supplementary;
pub mod transport;
pub mod xml;

pub use models::{ArticleMetadata, ArticleText, BodySection, Provenance, SupplementarySection};
pub use sources::gene::{GeneSynonym, SynonymFinder, SynonymKind};
pub use sources::pubmed::PubMedClient;
pub use sources::LiteratureSource;
pub use transport::{HttpResponse, HttpTransport, SandboxTransport};
