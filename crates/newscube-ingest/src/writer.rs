//! Star-schema output
//!
//! Writes the seven schema tables, the rejected-entity report, and the
//! run summary to the output directory. The writer only ever sees fully
//! assembled tables; a run that fails earlier writes nothing.

use std::path::PathBuf;

use tracing::info;

use newscube_core::{CubeError, RejectedEntityRow, Result, RunSummary, StarSchema};

/// Writes all output artifacts for one pipeline run.
pub struct SchemaWriter {
    output_dir: PathBuf,
}

impl SchemaWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write every table plus the audit artifacts.
    pub fn write_all(
        &self,
        schema: &StarSchema,
        rejected: &[RejectedEntityRow],
        summary: &RunSummary,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| CubeError::Output(format!("{}: {e}", self.output_dir.display())))?;

        self.write_fact_document(schema)?;
        self.write_dim_time(schema)?;
        self.write_dim_source(schema)?;
        self.write_dim_tag(schema)?;
        self.write_dim_entity(schema)?;
        self.write_bridge_fact_tag(schema)?;
        self.write_bridge_fact_entity(schema)?;
        self.write_rejected_entities(rejected)?;
        self.write_run_summary(summary)?;

        info!(
            dir = %self.output_dir.display(),
            total_rows = schema.total_rows(),
            "wrote star schema"
        );
        Ok(())
    }

    fn table_writer(&self, name: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = self.output_dir.join(format!("{name}.csv"));
        csv::Writer::from_path(&path)
            .map_err(|e| CubeError::Output(format!("{}: {e}", path.display())))
    }

    fn write_fact_document(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Fact_Document")?;
        writer
            .write_record([
                "Fact_ID",
                "Document_ID",
                "Date_Key",
                "Source_Key",
                "Year",
                "Quarter",
                "Month",
                "Date_String",
                "Source_Name",
                "Source_Type",
                "Headline",
                "Body_Text",
                "News_Link",
                "Cleaned_Text",
                "Consolidated_Text",
                "Matched_Keywords",
                "Sentiment_Score",
                "QC_Status",
                "Document_Count",
                "Tag_Count",
                "Has_Key_Event",
            ])
            .map_err(write_err)?;

        for row in &schema.fact_document {
            writer
                .write_record([
                    row.fact_id.to_string(),
                    row.document_id.clone(),
                    row.date_key.to_string(),
                    row.source_key.to_string(),
                    opt_to_string(row.year),
                    row.quarter.clone().unwrap_or_default(),
                    row.month.clone().unwrap_or_default(),
                    row.date_string.clone(),
                    row.source_name.clone(),
                    row.source_type.clone(),
                    row.headline.clone(),
                    row.body_text.clone(),
                    row.news_link.clone(),
                    row.cleaned_text.clone(),
                    row.consolidated_text.clone(),
                    row.matched_keywords.clone(),
                    opt_to_string(row.sentiment_score),
                    row.qc_status.clone(),
                    row.document_count.to_string(),
                    row.tag_count.to_string(),
                    row.has_key_event.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_dim_time(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Dim_Time")?;
        writer
            .write_record([
                "Date_Key",
                "Year",
                "Quarter",
                "Month",
                "Month_Number",
                "Day",
                "Day_of_Week",
                "Week_of_Year",
                "Date_String",
            ])
            .map_err(write_err)?;

        for row in &schema.dim_time {
            writer
                .write_record([
                    row.date_key.to_string(),
                    row.year.to_string(),
                    row.quarter.clone(),
                    row.month.clone(),
                    row.month_number.to_string(),
                    row.day.to_string(),
                    row.day_of_week.clone(),
                    row.week_of_year.to_string(),
                    row.date_string.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_dim_source(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Dim_Source")?;
        writer
            .write_record(["Source_Key", "Source_Name", "Source_Type"])
            .map_err(write_err)?;

        for row in &schema.dim_source {
            writer
                .write_record([
                    row.source_key.to_string(),
                    row.source_name.clone(),
                    row.source_type.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_dim_tag(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Dim_Tag")?;
        writer
            .write_record(["Tag_Key", "Tag_Name", "Tag_Category", "Tag_Domain"])
            .map_err(write_err)?;

        for row in &schema.dim_tag {
            writer
                .write_record([
                    row.tag_key.to_string(),
                    row.tag_name.clone(),
                    row.tag_category.clone(),
                    row.tag_domain.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_dim_entity(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Dim_Entity")?;
        writer
            .write_record(["Entity_Key", "Entity_Name", "Entity_Type", "Entity_Domain"])
            .map_err(write_err)?;

        for row in &schema.dim_entity {
            writer
                .write_record([
                    row.entity_key.to_string(),
                    row.entity_name.clone(),
                    row.entity_type.clone(),
                    row.entity_domain.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_bridge_fact_tag(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Bridge_Fact_Tag")?;
        writer
            .write_record(["Fact_ID", "Tag_Key", "Confidence_Score"])
            .map_err(write_err)?;

        for row in &schema.bridge_fact_tag {
            writer
                .write_record([
                    row.fact_id.to_string(),
                    row.tag_key.to_string(),
                    format!("{}", row.confidence),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_bridge_fact_entity(&self, schema: &StarSchema) -> Result<()> {
        let mut writer = self.table_writer("Bridge_Fact_Entity")?;
        writer
            .write_record(["Fact_ID", "Entity_Key", "Mention_Count"])
            .map_err(write_err)?;

        for row in &schema.bridge_fact_entity {
            writer
                .write_record([
                    row.fact_id.to_string(),
                    row.entity_key.to_string(),
                    row.mention_count.to_string(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_rejected_entities(&self, rejected: &[RejectedEntityRow]) -> Result<()> {
        let mut writer = self.table_writer("rejected_entities")?;
        writer
            .write_record(["Rejected_Entity", "Occurrence_Count", "Reason"])
            .map_err(write_err)?;

        for row in rejected {
            writer
                .write_record([
                    row.rejected_entity.clone(),
                    row.occurrence_count.to_string(),
                    row.reason.clone(),
                ])
                .map_err(write_err)?;
        }
        writer.flush().map_err(io_err)
    }

    fn write_run_summary(&self, summary: &RunSummary) -> Result<()> {
        let path = self.output_dir.join("run_summary.json");
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| CubeError::Output(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| CubeError::Output(format!("{}: {e}", path.display())))
    }
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_err(e: csv::Error) -> CubeError {
    CubeError::Output(e.to_string())
}

fn io_err(e: std::io::Error) -> CubeError {
    CubeError::Output(e.to_string())
}
