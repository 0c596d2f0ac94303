//! genephen-extract — Cost-gated evidence extraction.
//!
//! A cheap relevance classifier decides whether the expensive structured
//! extractor runs for a document. Both stages are capability traits; the
//! [`llm`] module provides one OpenAI-compatible backend implementing both.

pub mod capability;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod payload;
pub mod prompts;

pub use capability::{EvidenceExtractor, RelevanceClassifier, RelevanceVerdict};
pub use dispatcher::{DispatchItem, DispatcherStats, EvidenceExtractionDispatcher};
pub use error::ExtractionError;
pub use llm::OpenAiCompatibleBackend;
