//! Synthesizer for block-formatted ltr_finder scanner output
//!
//! ltr_finder reports each prediction as a block:
//!
//! ```text
//! [1] seq1
//! Location : 1234 - 5678 Len: 4445 Strand:+
//! Score    : 6 [LTR region similarity:0.953]
//! ```
//!
//! The emitted score is the trailing LTR-region similarity scaled to a
//! percentage.

use crate::types::{GenomicFeature, IdAllocator, Result, Strand, TeAnnotError};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// One decoded ltr_finder prediction block
#[derive(Debug, Clone, PartialEq)]
pub struct LtrFinderRecord {
    pub seq_id: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub score: f64,
}

#[derive(Default)]
struct BlockState {
    seq_id: Option<String>,
    location: Option<(u64, u64, Strand)>,
}

/// Parse an ltr_finder result file into records.
///
/// A `Score` line arriving before its block's header and `Location` lines is
/// a malformed record and aborts the file with a line-numbered error.
pub fn read_ltr_finder<P: AsRef<Path>>(path: P) -> Result<Vec<LtrFinderRecord>> {
    let path = path.as_ref();
    info!("Reading ltr_finder output: {}", path.display());

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut state = BlockState::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let context = |msg: &str| {
            TeAnnotError::ScannerParse(format!("{}:{}: {}", path.display(), index + 1, msg))
        };

        if line.starts_with('[') {
            let seq_id = line
                .split_whitespace()
                .nth(1)
                .ok_or_else(|| context("index line without a sequence name"))?;
            state = BlockState {
                seq_id: Some(seq_id.to_string()),
                location: None,
            };
        } else if line.starts_with("Location") {
            if state.seq_id.is_none() {
                return Err(context("Location line outside a prediction block"));
            }
            state.location = Some(parse_location(line).map_err(|e| context(&e.to_string()))?);
        } else if line.starts_with("Score") {
            let (seq_id, (start, end, strand)) = match (state.seq_id.take(), state.location.take())
            {
                (Some(s), Some(l)) => (s, l),
                _ => return Err(context("Score line without a complete prediction block")),
            };
            let score = parse_score(line).map_err(|e| context(&e.to_string()))?;
            records.push(LtrFinderRecord {
                seq_id,
                start,
                end,
                strand,
                score,
            });
            state = BlockState::default();
        }
    }

    info!("Parsed {} ltr_finder predictions", records.len());
    Ok(records)
}

/// `Location : 1234 - 5678 Len: 4445 Strand:+`
fn parse_location(line: &str) -> Result<(u64, u64, Strand)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(TeAnnotError::ScannerParse(format!(
            "truncated Location line: {}",
            line
        )));
    }

    let start = fields[2].parse::<u64>().map_err(|_| {
        TeAnnotError::ScannerParse(format!("invalid start coordinate: {}", fields[2]))
    })?;
    let end = fields[4].parse::<u64>().map_err(|_| {
        TeAnnotError::ScannerParse(format!("invalid end coordinate: {}", fields[4]))
    })?;

    let strand_field = fields[fields.len() - 1];
    let strand_symbol = strand_field.split(':').nth(1).ok_or_else(|| {
        TeAnnotError::ScannerParse(format!("missing strand tag: {}", strand_field))
    })?;

    Ok((start, end, Strand::from_str(strand_symbol)?))
}

/// `Score    : 6 [LTR region similarity:0.953]` -> 95.3
fn parse_score(line: &str) -> Result<f64> {
    let tail = line
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches(']');

    let similarity = tail
        .parse::<f64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid similarity score: {}", tail)))?;

    Ok(similarity * 100.0)
}

/// Convert decoded records into canonical features with caller-scoped ids
pub fn synthesize_features(
    records: &[LtrFinderRecord],
    source: &str,
    feature_type: &str,
    ids: &mut IdAllocator,
) -> Vec<GenomicFeature> {
    records
        .iter()
        .map(|record| {
            let (mut start, mut end) = (record.start, record.end);
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            GenomicFeature {
                seq_id: record.seq_id.clone(),
                source: source.to_string(),
                feature_type: feature_type.to_string(),
                start,
                end,
                score: record.score,
                strand: record.strand,
                id: ids.next_id(),
                parent: None,
            }
        })
        .collect()
}

/// File-to-features convenience wrapper used by the CLI
pub fn ltr_finder_to_features<P: AsRef<Path>>(
    path: P,
    source: &str,
    feature_type: &str,
) -> Result<Vec<GenomicFeature>> {
    let records = read_ltr_finder(path)?;
    let mut ids = IdAllocator::new(feature_type);
    Ok(synthesize_features(&records, source, feature_type, &mut ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_block(file: &mut NamedTempFile, seq: &str, start: u64, end: u64, sim: f64) {
        writeln!(file, "[1] {}", seq).unwrap();
        writeln!(file, "Location : {} - {} Len: {} Strand:+", start, end, end - start + 1).unwrap();
        writeln!(file, "Score    : 6 [LTR region similarity:{}]", sim).unwrap();
    }

    #[test]
    fn test_read_blocks() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Program    : LTR_FINDER").unwrap();
        write_block(&mut temp_file, "chr1", 1000, 4000, 0.95);
        write_block(&mut temp_file, "chr2", 200, 900, 0.88);

        let records = read_ltr_finder(temp_file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq_id, "chr1");
        assert_eq!((records[0].start, records[0].end), (1000, 4000));
        assert_eq!(records[0].strand, Strand::Forward);
        assert!((records[0].score - 95.0).abs() < 1e-9);
        assert!((records[1].score - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_without_block_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Score    : 6 [LTR region similarity:0.95]").unwrap();

        let err = read_ltr_finder(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains(":1:"), "got: {}", err);
    }

    #[test]
    fn test_synthesized_ids_are_sequential() {
        let records = vec![
            LtrFinderRecord {
                seq_id: "chr1".to_string(),
                start: 100,
                end: 900,
                strand: Strand::Forward,
                score: 95.0,
            },
            LtrFinderRecord {
                seq_id: "chr1".to_string(),
                start: 2000,
                end: 2800,
                strand: Strand::Reverse,
                score: 80.0,
            },
        ];

        let mut ids = IdAllocator::new("LTR");
        let features = synthesize_features(&records, "ltr_finder", "LTR", &mut ids);
        assert_eq!(features[0].id, "LTR_00001");
        assert_eq!(features[1].id, "LTR_00002");
        assert_eq!(features[1].strand, Strand::Reverse);
    }
}
