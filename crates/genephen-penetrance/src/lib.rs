//! genephen-penetrance — Evidence data model and cross-paper penetrance aggregation.
//!
//! Cohort-level counts and individual-level family reports are ingested into
//! three in-memory databases owned by [`EvidenceAggregator`]. Every database
//! has a single writer; queries borrow immutably.

pub mod aggregator;
pub mod cohort;
pub mod database;
pub mod evidence;
pub mod family;
pub mod individual_db;

pub use aggregator::{AggregateSummary, CombinedFrequency, Counts, EvidenceAggregator, IngestOutcome};
pub use cohort::{CohortDatabase, CohortRecord, CohortSummary, PhenotypeCount, PhenotypeStats};
pub use database::{Association, PenetranceDatabase, PhenotypeSummary, SourceTally, VariantKey, VariantSummary};
pub use evidence::{Disposition, EvidenceRecord};
pub use family::{FamilyStudy, Individual, Penetrance};
pub use individual_db::{IndividualDatabase, IndividualSummary};
