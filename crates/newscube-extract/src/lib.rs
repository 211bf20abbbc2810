//! Newscube Extract - Enrichment stages for article batches
//!
//! Implements the three per-document extraction stages that run inside
//! each processing batch:
//! - [`TextNormalizer`]: matching-ready lowercase text views
//! - [`TagMatcher`]: taxonomy tag detection with confidence scores
//! - [`EntityExtractor`]: organization-name extraction with identity
//!   resolution under aliasing

pub mod entity;
pub mod normalize;
pub mod tags;

pub use entity::{BatchExtraction, EntityDimCandidate, EntityExtractor};
pub use normalize::TextNormalizer;
pub use tags::TagMatcher;
