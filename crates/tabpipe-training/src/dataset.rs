use crate::error::{PipelineError, PipelineResult};
use crate::schema::TabularSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// One row: feature tokens exactly as they appeared in the source, plus a 0/1 label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularRecord {
    pub features: Vec<String>,
    pub target: u8,
}

/// A parsed raw dataset with named columns and remapped labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub records: Vec<TabularRecord>,
}

impl TabularDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable content hash over every record, in order.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update([record.target]);
            for feature in &record.features {
                hasher.update(b",");
                hasher.update(feature.as_bytes());
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Remap the raw label encoding `{1, 2}` to `{1, 0}`.
pub fn remap_target(raw: &str, line: usize) -> PipelineResult<u8> {
    match raw.trim() {
        "1" => Ok(1),
        "2" => Ok(0),
        other => Err(PipelineError::UnknownLabel { line, value: other.to_string() }),
    }
}

/// Parse a whitespace-delimited file without header. The last field of each row
/// is the label; blank lines are skipped.
pub fn parse_raw(text: &str, schema: &TabularSchema) -> PipelineResult<TabularDataset> {
    let expected = schema.column_count();
    let mut records = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: Vec<String> = line.split_ascii_whitespace().map(str::to_string).collect();
        if fields.len() != expected {
            return Err(PipelineError::MalformedRow { line: line_no, expected, found: fields.len() });
        }
        let raw_target = fields.pop().unwrap_or_default();
        let target = remap_target(&raw_target, line_no)?;
        records.push(TabularRecord { features: fields, target });
    }

    if records.is_empty() {
        return Err(PipelineError::Dataset("source contains no rows".to_string()));
    }

    Ok(TabularDataset { columns: schema.column_names(), records })
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> PipelineResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| PipelineError::Dataset(format!("failed to flush csv buffer: {}", e)))
}

/// Label first, then every feature. No header, no index.
pub fn encode_labelled(records: &[TabularRecord]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv_writer();
    for record in records {
        let label = record.target.to_string();
        writer.write_record(
            std::iter::once(label.as_str()).chain(record.features.iter().map(String::as_str)),
        )?;
    }
    finish(writer)
}

/// Features only, in record order.
pub fn encode_features<S: AsRef<str>>(rows: &[Vec<S>]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv_writer();
    for row in rows {
        writer.write_record(row.iter().map(AsRef::as_ref))?;
    }
    finish(writer)
}

/// One label per line, in record order.
pub fn encode_labels(records: &[TabularRecord]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv_writer();
    for record in records {
        writer.write_record([record.target.to_string()])?;
    }
    finish(writer)
}

pub fn read_feature_file(path: &Path) -> PipelineResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

pub fn read_label_file(path: &Path) -> PipelineResult<Vec<u8>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut labels = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record.get(0).unwrap_or_default().trim();
        let label = match raw {
            "0" => 0,
            "1" => 1,
            other => {
                return Err(PipelineError::Dataset(format!(
                    "{} line {}: label {:?} is not 0 or 1",
                    path.display(),
                    idx + 1,
                    other
                )));
            }
        };
        labels.push(label);
    }
    Ok(labels)
}
