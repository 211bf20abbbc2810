//! Newscube Ingest - File I/O at the pipeline boundary
//!
//! Everything that touches the filesystem lives here:
//! - [`ArticleReader`]: chunked, malformed-row-tolerant CSV reading
//! - [`TaxonomyLoader`]: tag definitions from the Excel workbook
//! - [`RegistryLoader`]: the known-company CSV
//! - [`SchemaWriter`]: the seven output tables plus audit artifacts

pub mod reader;
pub mod registry;
pub mod taxonomy;
pub mod writer;

pub use reader::ArticleReader;
pub use registry::RegistryLoader;
pub use taxonomy::TaxonomyLoader;
pub use writer::SchemaWriter;
