//! genephen-common — Shared types, errors, and configuration used across all genephen crates.

pub mod config;
pub mod error;
pub mod genetics;
pub mod normalise;

// Re-export commonly used types
pub use config::{DispatcherConfig, LlmConfig, RetrieverConfig, RetryConfig};
pub use error::{GenephenError, Result};
pub use genetics::{AffectedStatus, Genotype, PhenotypeObservation, Sex};
pub use normalise::{normalize_variant, parse_variant, same_variant, ParsedVariant, VariantNormaliser};
