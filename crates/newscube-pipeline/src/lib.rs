//! Newscube Pipeline - Batch orchestration
//!
//! Drives the full transformation: reads the source dataset in
//! fixed-size batches, runs the extraction stages per batch while
//! accumulating dimension candidates globally, then assembles the star
//! schema once the source is exhausted. The two-phase protocol
//! (mutable accumulators while scanning, immutable derived tables at
//! finalization) is what keeps dimension membership consistent across
//! independently processed chunks.

pub mod processor;

pub use processor::{BatchProcessor, PipelineOutput};
