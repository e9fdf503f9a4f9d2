//! Synthesizer for LTR_retriever prediction tables
//!
//! The retriever table is whitespace-delimited with `#` comment lines.
//! Columns used: 0/1 span, 9 identity (fraction), 11 sequence id, 12 strand,
//! and the second-to-last column carries a superfamily sub-classification.

use crate::types::{GenomicFeature, IdAllocator, Result, Strand, TeAnnotError};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// One decoded retriever prediction
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverRecord {
    pub seq_id: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub identity: f64,
    pub subtype: String,
}

/// Parse an LTR_retriever table into records.
///
/// Rows with fewer columns than the retriever layout are malformed records
/// and abort the file with a line-numbered error.
pub fn read_retriever<P: AsRef<Path>>(path: P) -> Result<Vec<RetrieverRecord>> {
    let path = path.as_ref();
    info!("Reading LTR_retriever table: {}", path.display());

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record = parse_retriever_row(line).map_err(|e| {
            TeAnnotError::ScannerParse(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }

    info!("Parsed {} retriever predictions", records.len());
    Ok(records)
}

fn parse_retriever_row(line: &str) -> Result<RetrieverRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 14 {
        return Err(TeAnnotError::ScannerParse(format!(
            "expected at least 14 columns, found {}",
            fields.len()
        )));
    }

    let start = fields[0]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid start: {}", fields[0])))?;
    let end = fields[1]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid end: {}", fields[1])))?;
    let identity = fields[9]
        .parse::<f64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid identity: {}", fields[9])))?;

    Ok(RetrieverRecord {
        seq_id: fields[11].to_string(),
        start,
        end,
        strand: Strand::from_str(fields[12])?,
        identity,
        subtype: fields[fields.len() - 2].to_string(),
    })
}

/// Convert decoded records into canonical features.
///
/// The identity fraction is rescaled to a percentage; a known subtype is
/// appended to the base type as `TYPE/subtype` on the record it belongs to
/// (never carried over to later rows).
pub fn synthesize_features(
    records: &[RetrieverRecord],
    source: &str,
    base_type: &str,
    ids: &mut IdAllocator,
) -> Vec<GenomicFeature> {
    records
        .iter()
        .map(|record| {
            let feature_type = if record.subtype != "unknown" {
                format!("{}/{}", base_type, record.subtype)
            } else {
                base_type.to_string()
            };

            let (mut start, mut end) = (record.start, record.end);
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }

            GenomicFeature {
                seq_id: record.seq_id.clone(),
                source: source.to_string(),
                feature_type,
                start,
                end,
                score: record.identity * 100.0,
                strand: record.strand,
                id: ids.next_id(),
                parent: None,
            }
        })
        .collect()
}

/// File-to-features convenience wrapper used by the CLI
pub fn retriever_to_features<P: AsRef<Path>>(
    path: P,
    source: &str,
    base_type: &str,
) -> Result<Vec<GenomicFeature>> {
    let records = read_retriever(path)?;
    let mut ids = IdAllocator::new(base_type);
    Ok(synthesize_features(&records, source, base_type, &mut ids))
}
