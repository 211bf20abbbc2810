//! Newscube Schema - Star-schema assembly
//!
//! Turns accumulated dimension candidates and enriched article batches
//! into the final star schema: surrogate-keyed dimension tables, one
//! fact row per document, and the two bridge tables. Fact-to-entity
//! links resolve through a three-tier name-matching strategy.

pub mod builder;
pub mod dimensions;
pub mod resolver;

pub use builder::{PrebuiltDimensions, ResolutionReport, StarSchemaBuilder};
pub use dimensions::{
    build_dim_entity, build_dim_source, build_dim_tag, build_dim_time, classify_source_type,
    date_key, is_valid_source, parse_article_date, time_row,
};
pub use resolver::EntityResolver;
