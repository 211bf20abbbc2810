//! Chunked article CSV reading
//!
//! Reads the source dataset in fixed-size batches. Rows whose field
//! count does not match the header are corruption from the upstream
//! merge and are dropped with a counter rather than aborting the run.
//! A missing text column, by contrast, is fatal: nothing downstream
//! can work without it.

use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use newscube_core::{ArticleRecord, CubeError, Result};

/// Accepted header spellings per logical column, matched
/// case-insensitively after trimming.
const DOCUMENT_ID_HEADERS: [&str; 4] = ["document_id", "document id", "doc_id", "id"];
const DATE_HEADERS: [&str; 3] = ["date", "publication_date", "published"];
const SOURCE_HEADERS: [&str; 3] = ["source", "source_name", "publication"];
const HEADLINE_HEADERS: [&str; 3] = ["headline", "title", "header"];
const BODY_HEADERS: [&str; 4] = ["body", "body_text", "body/abstract/extract", "abstract"];
const CONSOLIDATED_HEADERS: [&str; 2] = ["consolidated_text", "consolidated text"];
const HINTS_HEADERS: [&str; 3] = ["matched_keywords", "matched keywords", "keywords"];
const NEWS_LINK_HEADERS: [&str; 3] = ["news_link", "news link", "url"];
const CLEANED_HEADERS: [&str; 3] = ["cleaned_text", "cleaned text", "cleaned_text_g"];
const SENTIMENT_HEADERS: [&str; 2] = ["sentiment_score", "sentiment"];
const QC_HEADERS: [&str; 3] = ["qc_status", "qc", "qc_h"];

/// Resolved indexes of the logical columns within the header.
#[derive(Debug, Clone)]
struct ColumnMap {
    document_id: Option<usize>,
    date: Option<usize>,
    source: Option<usize>,
    headline: Option<usize>,
    body: usize,
    consolidated: Option<usize>,
    hints: Option<usize>,
    news_link: Option<usize>,
    cleaned: Option<usize>,
    sentiment: Option<usize>,
    qc: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |candidates: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                candidates.iter().any(|c| h == *c)
            })
        };

        let body = find(&BODY_HEADERS)
            .ok_or_else(|| CubeError::MissingColumn("body text".to_string()))?;

        Ok(Self {
            document_id: find(&DOCUMENT_ID_HEADERS),
            date: find(&DATE_HEADERS),
            source: find(&SOURCE_HEADERS),
            headline: find(&HEADLINE_HEADERS),
            body,
            consolidated: find(&CONSOLIDATED_HEADERS),
            hints: find(&HINTS_HEADERS),
            news_link: find(&NEWS_LINK_HEADERS),
            cleaned: find(&CLEANED_HEADERS),
            sentiment: find(&SENTIMENT_HEADERS),
            qc: find(&QC_HEADERS),
        })
    }

    fn to_record(&self, row: &StringRecord) -> ArticleRecord {
        let get = |idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i)).unwrap_or("").trim().to_string()
        };

        let sentiment_score = get(self.sentiment).parse::<f64>().ok().filter(|v| v.is_finite());

        ArticleRecord {
            document_id: get(self.document_id),
            date: get(self.date),
            source: get(self.source),
            headline: get(self.headline),
            body: get(Some(self.body)),
            consolidated_text: get(self.consolidated),
            keyword_hints: get(self.hints),
            news_link: get(self.news_link),
            cleaned_text: get(self.cleaned),
            sentiment_score,
            qc_status: get(self.qc),
        }
    }
}

/// Reads article records from a CSV file in batches.
#[derive(Debug)]
pub struct ArticleReader {
    reader: csv::Reader<std::fs::File>,
    columns: ColumnMap,
    header_len: usize,
    batch_size: usize,
    rows_read: usize,
    rows_skipped: usize,
}

impl ArticleReader {
    /// Open a CSV file and resolve its header.
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| CubeError::Ingest(format!("{}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| CubeError::Ingest(format!("{}: {e}", path.display())))?
            .clone();
        let columns = ColumnMap::resolve(&headers)?;

        info!(
            path = %path.display(),
            columns = headers.len(),
            batch_size,
            "opened article source"
        );

        Ok(Self {
            reader,
            columns,
            header_len: headers.len(),
            batch_size,
            rows_read: 0,
            rows_skipped: 0,
        })
    }

    /// Read the next batch. Returns `None` once the source is exhausted.
    ///
    /// Rows whose field count mismatches the header are dropped and
    /// counted; they never abort the run.
    pub fn read_batch(&mut self) -> Result<Option<Vec<ArticleRecord>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut row = StringRecord::new();

        while batch.len() < self.batch_size {
            let more = self
                .reader
                .read_record(&mut row)
                .map_err(|e| CubeError::Ingest(e.to_string()))?;
            if !more {
                break;
            }

            if row.len() != self.header_len {
                self.rows_skipped += 1;
                continue;
            }

            batch.push(self.columns.to_record(&row));
            self.rows_read += 1;
        }

        if batch.is_empty() {
            if self.rows_skipped > 0 {
                warn!(skipped = self.rows_skipped, "dropped malformed rows");
            }
            return Ok(None);
        }
        Ok(Some(batch))
    }

    /// Well-formed rows read so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Malformed rows dropped so far
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_batches_of_requested_size() {
        let file = write_csv(
            "Document_ID,Date,Source,Headline,Body\n\
             d1,2024-01-01,BioSpace,One,text one\n\
             d2,2024-01-02,BioSpace,Two,text two\n\
             d3,2024-01-03,BioSpace,Three,text three\n",
        );

        let mut reader = ArticleReader::open(file.path(), 2).unwrap();

        let first = reader.read_batch().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].document_id, "d1");
        assert_eq!(first[0].body, "text one");

        let second = reader.read_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);

        assert!(reader.read_batch().unwrap().is_none());
        assert_eq!(reader.rows_read(), 3);
    }

    #[test]
    fn test_malformed_rows_skipped_not_fatal() {
        let file = write_csv(
            "Document_ID,Date,Source,Headline,Body\n\
             d1,2024-01-01,BioSpace,One,text one\n\
             corrupted-row-with-too-few-fields\n\
             d2,2024-01-02,BioSpace,Two,text two\n",
        );

        let mut reader = ArticleReader::open(file.path(), 100).unwrap();
        let batch = reader.read_batch().unwrap().unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(reader.rows_skipped(), 1);
    }

    #[test]
    fn test_missing_body_column_is_fatal() {
        let file = write_csv("Document_ID,Date,Source,Headline\nd1,2024-01-01,BioSpace,One\n");

        let err = ArticleReader::open(file.path(), 10).unwrap_err();
        assert!(matches!(err, CubeError::MissingColumn(_)));
    }

    #[test]
    fn test_header_resolution_is_case_insensitive() {
        let file = write_csv(
            "document_id,DATE,source,HEADLINE,Body/abstract/extract,matched_keywords\n\
             d1,2024-01-01,BioSpace,One,body text,Pfizer; merger\n",
        );

        let mut reader = ArticleReader::open(file.path(), 10).unwrap();
        let batch = reader.read_batch().unwrap().unwrap();

        assert_eq!(batch[0].body, "body text");
        assert_eq!(batch[0].keyword_hints, "Pfizer; merger");
    }

    #[test]
    fn test_sentiment_parsed_when_numeric() {
        let file = write_csv(
            "Body,Sentiment_Score\n\
             text,0.75\n\
             text,not-a-number\n",
        );

        let mut reader = ArticleReader::open(file.path(), 10).unwrap();
        let batch = reader.read_batch().unwrap().unwrap();

        assert_eq!(batch[0].sentiment_score, Some(0.75));
        assert_eq!(batch[1].sentiment_score, None);
    }
}
