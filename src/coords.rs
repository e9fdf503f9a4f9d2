//! Best-hit selection over nucmer `show-coords` alignment tables

use crate::types::{normalize_span, GenomicFeature, IdAllocator, Result, TeAnnotError};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One alignment row from a coordinate-comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentHit {
    pub ref_start: u64,
    pub ref_end: u64,
    pub identity: f64,
    pub query_len: u64,
    pub query_id: String,
    pub ref_seq_id: String,
}

/// Read alignment rows from a `show-coords` table.
///
/// Header and delimiter lines (`=`, `[S1]`), rows with fewer than 11 columns
/// and self-hits (span markers equal to the reference span) are skipped;
/// skipping is part of this component's contract, not an error.
pub fn read_coords_file<P: AsRef<Path>>(path: P) -> Result<Vec<AlignmentHit>> {
    let path = path.as_ref();
    info!("Reading alignment table: {}", path.display());

    let file = File::open(path).map_err(|e| {
        TeAnnotError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open coords file {}: {}", path.display(), e),
        ))
    })?;

    let reader = BufReader::new(file);
    let mut hits = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('=') || line.starts_with("[S1]") {
            continue;
        }

        let line = line.replace('|', "");
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 11 {
            continue;
        }

        let Some(hit) = parse_hit_row(&fields) else {
            continue;
        };
        hits.push(hit);
    }

    info!("Read {} alignment rows from {}", hits.len(), path.display());
    Ok(hits)
}

/// Decode one whitespace-split row, returning None for self-hits and rows
/// with unparsable numeric columns.
fn parse_hit_row(fields: &[&str]) -> Option<AlignmentHit> {
    let span_start = fields[0].parse::<u64>().ok()?;
    let span_end = fields[1].parse::<u64>().ok()?;
    let ref_start = fields[2].parse::<u64>().ok()?;
    let ref_end = fields[3].parse::<u64>().ok()?;
    let identity = fields[6].parse::<f64>().ok()?;
    let query_len = fields[8].parse::<u64>().ok()?;

    // a query aligned onto its own span carries no placement information
    if span_start == ref_start && span_end == ref_end {
        return None;
    }

    Some(AlignmentHit {
        ref_start,
        ref_end,
        identity,
        query_len,
        query_id: fields[9].to_string(),
        ref_seq_id: fields[10].to_string(),
    })
}

/// Collapse alignment rows to one feature per distinct query.
///
/// The surviving hit for a query is the one with the highest identity; on
/// exact ties the last-encountered row wins. This replace-on-tie rule is
/// deliberate and downstream output depends on it. Features are emitted in
/// first-seen query order with ids from the caller's allocator.
pub fn select_best_hits(
    hits: &[AlignmentHit],
    source: &str,
    feature_type: &str,
    ids: &mut IdAllocator,
) -> Vec<GenomicFeature> {
    let mut best: HashMap<&str, &AlignmentHit> = HashMap::new();
    let mut query_order: Vec<&str> = Vec::new();

    for hit in hits {
        match best.get(hit.query_id.as_str()).map(|stored| stored.identity) {
            None => {
                query_order.push(&hit.query_id);
                best.insert(&hit.query_id, hit);
            }
            Some(stored_identity) => {
                if hit.identity >= stored_identity {
                    best.insert(&hit.query_id, hit);
                }
            }
        }
    }

    debug!("Selected best hits for {} queries", query_order.len());

    let mut features = Vec::with_capacity(query_order.len());
    for query_id in query_order {
        let hit = best[query_id];
        let (start, end, strand) = normalize_span(hit.ref_start, hit.ref_end);

        features.push(GenomicFeature {
            seq_id: hit.ref_seq_id.clone(),
            source: source.to_string(),
            feature_type: feature_type.to_string(),
            start,
            end,
            score: hit.identity,
            strand,
            id: ids.next_id(),
            parent: Some(query_id.to_string()),
        });
    }

    features
}

/// File-to-features convenience wrapper used by the CLI
pub fn coords_to_features<P: AsRef<Path>>(
    path: P,
    source: &str,
    feature_type: &str,
    locus: &str,
) -> Result<Vec<GenomicFeature>> {
    let hits = read_coords_file(path)?;
    let mut ids = IdAllocator::new(locus);
    Ok(select_best_hits(&hits, source, feature_type, &mut ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn hit(query: &str, ref_start: u64, ref_end: u64, identity: f64) -> AlignmentHit {
        AlignmentHit {
            ref_start,
            ref_end,
            identity,
            query_len: 500,
            query_id: query.to_string(),
            ref_seq_id: "chr1".to_string(),
        }
    }

    #[test]
    fn test_one_feature_per_query() {
        let hits = vec![
            hit("q1", 100, 600, 90.0),
            hit("q2", 1000, 1500, 85.0),
            hit("q1", 200, 700, 95.0),
        ];
        let mut ids = IdAllocator::new("MITE");
        let features = select_best_hits(&hits, "Mite_Hunter", "MITE", &mut ids);

        assert_eq!(features.len(), 2);
        // first-seen query order, not sorted
        assert_eq!(features[0].parent.as_deref(), Some("q1"));
        assert_eq!(features[0].id, "MITE_00001");
        assert_eq!(features[0].score, 95.0);
        assert_eq!((features[0].start, features[0].end), (200, 700));
        assert_eq!(features[1].parent.as_deref(), Some("q2"));
        assert_eq!(features[1].id, "MITE_00002");
    }

    #[test]
    fn test_tie_breaks_to_last_row() {
        let hits = vec![
            hit("Q1", 100, 600, 98.5),
            hit("Q1", 200, 700, 99.0),
            hit("Q1", 300, 800, 99.0),
        ];
        let mut ids = IdAllocator::new("MITE");
        let features = select_best_hits(&hits, "Mite_Hunter", "MITE", &mut ids);

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].score, 99.0);
        // coordinates come from the third row, the last tie
        assert_eq!((features[0].start, features[0].end), (300, 800));
    }

    #[test]
    fn test_reverse_hits_are_normalized() {
        let hits = vec![hit("q1", 900, 400, 91.0)];
        let mut ids = IdAllocator::new("SINE");
        let features = select_best_hits(&hits, "sinescan", "SINE", &mut ids);

        assert_eq!((features[0].start, features[0].end), (400, 900));
        assert_eq!(features[0].strand, Strand::Reverse);
    }

    #[test]
    fn test_empty_input_yields_no_features() {
        let mut ids = IdAllocator::new("MITE");
        assert!(select_best_hits(&[], "x", "MITE", &mut ids).is_empty());
        assert_eq!(ids.issued(), 0);
    }

    #[test]
    fn test_read_coords_skips_headers_and_self_hits() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "/tmp/mite.fasta /tmp/genome.fasta").unwrap();
        writeln!(temp_file, "NUCMER").unwrap();
        writeln!(temp_file).unwrap();
        writeln!(temp_file, "[S1] [E1] [S2] [E2] [LEN 1] [LEN 2] [% IDY] [LEN R] [LEN Q] [TAGS]").unwrap();
        writeln!(temp_file, "=====================================================").unwrap();
        // self-hit: span markers equal the reference span
        writeln!(temp_file, "1 500 | 1 500 | 500 500 | 100.00 | 500 500 | q1 q1").unwrap();
        writeln!(temp_file, "1 500 | 1200 1699 | 500 500 | 97.20 | 500 2000 | q1 chr1").unwrap();

        let hits = read_coords_file(temp_file.path()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query_id, "q1");
        assert_eq!(hits[0].ref_seq_id, "chr1");
        assert_eq!(hits[0].identity, 97.2);
        assert_eq!((hits[0].ref_start, hits[0].ref_end), (1200, 1699));
    }

    #[test]
    fn test_all_self_hits_yield_zero_features() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "1 500 | 1 500 | 500 500 | 100.00 | 500 500 | q1 q1").unwrap();
        writeln!(temp_file, "3 80 | 3 80 | 78 78 | 100.00 | 80 80 | q2 q2").unwrap();

        let features = coords_to_features(temp_file.path(), "x", "MITE", "MITE").unwrap();
        assert!(features.is_empty());
    }
}
