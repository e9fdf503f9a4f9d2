//! Synthesizer for HelitronScanner run-length output
//!
//! Each scanned sequence produces a `>name` header followed by one line of
//! candidate runs:
//!
//! ```text
//! >chr1 12345678
//! 100:5200 [6:7]8000:13100 [5:9]
//! ```
//!
//! A run is `start:end [head:tail...]`; its score is the sum of the two
//! integers in the first bracket pair.

use crate::types::{normalize_span, GenomicFeature, IdAllocator, Result, TeAnnotError};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One candidate helitron decoded from a run-length line
#[derive(Debug, Clone, PartialEq)]
pub struct HelitronRecord {
    pub seq_id: String,
    pub start: u64,
    pub end: u64,
    pub score: u64,
}

/// Parse a HelitronScanner result file into records
pub fn read_helitron_scanner<P: AsRef<Path>>(path: P) -> Result<Vec<HelitronRecord>> {
    let path = path.as_ref();
    info!("Reading HelitronScanner output: {}", path.display());

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut current_seq: Option<String> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            let seq_id = header.split_whitespace().next().ok_or_else(|| {
                TeAnnotError::ScannerParse(format!(
                    "{}:{}: empty sequence header",
                    path.display(),
                    index + 1
                ))
            })?;
            current_seq = Some(seq_id.to_string());
            continue;
        }

        let seq_id = current_seq.take().ok_or_else(|| {
            TeAnnotError::ScannerParse(format!(
                "{}:{}: run line without a sequence header",
                path.display(),
                index + 1
            ))
        })?;

        for run in split_runs(line) {
            let (start, end, score) = run.map_err(|e| {
                TeAnnotError::ScannerParse(format!("{}:{}: {}", path.display(), index + 1, e))
            })?;
            records.push(HelitronRecord {
                seq_id: seq_id.clone(),
                start,
                end,
                score,
            });
        }
    }

    info!("Parsed {} helitron candidates", records.len());
    Ok(records)
}

/// Split a run-length line into (start, end, score) triples.
///
/// Adjacent bracket groups are first glued with `;` so every run ends at a
/// single `]`, mirroring how the scanner concatenates candidates.
fn split_runs(line: &str) -> Vec<Result<(u64, u64, u64)>> {
    let glued = line.replace("][", ";");

    glued
        .split(']')
        .map(|run| run.trim())
        .filter(|run| !run.is_empty())
        .map(parse_run)
        .collect()
}

/// `100:5200 [6:7` -> (100, 5200, 13)
fn parse_run(run: &str) -> Result<(u64, u64, u64)> {
    let (location, scores) = run.split_once(' ').ok_or_else(|| {
        TeAnnotError::ScannerParse(format!("run without a score group: {}", run))
    })?;

    let (start, end) = location.split_once(':').ok_or_else(|| {
        TeAnnotError::ScannerParse(format!("run location without ':': {}", location))
    })?;

    let start = start
        .parse::<u64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid run start: {}", start)))?;
    let end = end
        .parse::<u64>()
        .map_err(|_| TeAnnotError::ScannerParse(format!("invalid run end: {}", end)))?;

    Ok((start, end, sum_score(scores)?))
}

/// Sum the two integers of the first bracket pair, e.g. `[6:7;5:9` -> 13
fn sum_score(scores: &str) -> Result<u64> {
    let first_pair = scores
        .trim()
        .trim_start_matches('[')
        .split(';')
        .next()
        .unwrap_or_default();

    let mut total = 0;
    for part in first_pair.splitn(2, ':') {
        total += part
            .parse::<u64>()
            .map_err(|_| TeAnnotError::ScannerParse(format!("invalid score group: {}", scores)))?;
    }

    Ok(total)
}

/// Convert decoded records into canonical features.
///
/// The scanner reports reverse-strand candidates with a descending span, so
/// the strand is derived during normalization.
pub fn synthesize_features(
    records: &[HelitronRecord],
    source: &str,
    feature_type: &str,
    ids: &mut IdAllocator,
) -> Vec<GenomicFeature> {
    records
        .iter()
        .map(|record| {
            let (start, end, strand) = normalize_span(record.start, record.end);
            GenomicFeature {
                seq_id: record.seq_id.clone(),
                source: source.to_string(),
                feature_type: feature_type.to_string(),
                start,
                end,
                score: record.score as f64,
                strand,
                id: ids.next_id(),
                parent: None,
            }
        })
        .collect()
}

/// File-to-features convenience wrapper used by the CLI
pub fn helitron_to_features<P: AsRef<Path>>(
    path: P,
    source: &str,
    feature_type: &str,
    locus: &str,
) -> Result<Vec<GenomicFeature>> {
    let records = read_helitron_scanner(path)?;
    let mut ids = IdAllocator::new(locus);
    Ok(synthesize_features(&records, source, feature_type, &mut ids))
}
