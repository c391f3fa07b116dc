//! Writing embeddings to JSON or CSV files.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::embedding::EmbeddingMatrix;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> ExportFormat {
        path.extension()
            .and_then(|ext| ExportFormat::parse(&ext.to_string_lossy()))
            .unwrap_or(ExportFormat::Json)
    }
}

/// One exported embedding and the input it came from.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRecord {
    pub source: String,
    pub embedding: Vec<f32>,
}

/// Pair each row of `embeddings` with its source label.
pub fn records(sources: &[String], embeddings: &EmbeddingMatrix) -> Result<Vec<EmbeddingRecord>> {
    if sources.len() != embeddings.nrows() {
        return Err(anyhow!(
            "{} sources for {} embeddings",
            sources.len(),
            embeddings.nrows()
        ));
    }

    Ok(sources
        .iter()
        .zip(embeddings.rows())
        .map(|(source, row)| EmbeddingRecord {
            source: source.clone(),
            embedding: row.to_vec(),
        })
        .collect())
}

/// Write records to `output_path`, returning how many were written.
pub fn export_embeddings(
    records: &[EmbeddingRecord],
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    match format {
        ExportFormat::Json => export_json(records, output_path)?,
        ExportFormat::Csv => export_csv(records, output_path)?,
    }

    tracing::info!(count = records.len(), path = ?output_path, "Exported embeddings");
    Ok(records.len())
}

fn export_json(records: &[EmbeddingRecord], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(records: &[EmbeddingRecord], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    let dimension = records.first().map(|r| r.embedding.len()).unwrap_or(0);
    let mut header = vec!["source".to_string()];
    header.extend((0..dimension).map(|i| format!("e{}", i)));
    wtr.write_record(&header)?;

    for record in records {
        let mut row = Vec::with_capacity(dimension + 1);
        row.push(record.source.clone());
        row.extend(record.embedding.iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn sample() -> Vec<EmbeddingRecord> {
        let embeddings = array![[0.6f32, 0.8], [1.0, 0.0]];
        records(&["a.jpg".to_string(), "b.png".to_string()], &embeddings).unwrap()
    }

    #[test]
    fn test_records_length_mismatch() {
        let embeddings = array![[0.6f32, 0.8]];
        assert!(records(&[], &embeddings).is_err());
    }

    #[test]
    fn test_export_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        let count = export_embeddings(&sample(), &path, ExportFormat::Json).unwrap();
        assert_eq!(count, 2);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[1]["source"], "b.png");
        assert_eq!(value[0]["embedding"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        export_embeddings(&sample(), &path, ExportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "source,e0,e1");
        assert_eq!(lines[1], "a.jpg,0.6,0.8");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("x.CSV")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("x.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("x")), ExportFormat::Json);
    }
}
