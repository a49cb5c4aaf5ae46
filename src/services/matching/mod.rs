//! Test/control twin matching.
//!
//! `ingest` validates the observation CSV, `scoring` computes the per-metric
//! dissimilarity for one test/control pair, `ranking` drives the scorer over
//! every eligible pair and builds the ranked tables, `export` writes them out.

pub mod export;
pub mod ingest;
pub mod ranking;
pub mod scoring;
pub mod types;

pub use ranking::{find_twin_matches, RankOptions};
pub use types::{MatchReport, ObservationTable, TopN, WeightMap};
