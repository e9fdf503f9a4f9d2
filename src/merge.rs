//! Non-redundant merging of per-tool prediction features
//!
//! Combines canonical features from several tools for the same genome,
//! sorts them positionally, suppresses redundant cross-tool calls and
//! re-issues final locus ids.

use crate::types::{GenomicFeature, IdAllocator, Result, Strand, TeAnnotError};
use log::{debug, info};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Read a MUSTv2 result table and convert it on the fly to canonical
/// features: identity is rescaled to a percentage and the tool's element id
/// becomes the feature id (the cluster column is provenance the merge
/// discards).
pub fn read_mustv2<P: AsRef<Path>>(
    path: P,
    source: &str,
    feature_type: &str,
) -> Result<Vec<GenomicFeature>> {
    let path = path.as_ref();
    info!("Reading MUSTv2 table: {}", path.display());

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut features = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let feature = parse_mustv2_row(line, source, feature_type).map_err(|e| {
            TeAnnotError::GffParse(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        features.push(feature);
    }

    info!("Converted {} MUSTv2 rows", features.len());
    Ok(features)
}

fn parse_mustv2_row(line: &str, source: &str, feature_type: &str) -> Result<GenomicFeature> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 13 {
        return Err(TeAnnotError::GffParse(format!(
            "expected at least 13 columns, found {}",
            fields.len()
        )));
    }

    let mut start = fields[3]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::GffParse(format!("invalid start: {}", fields[3])))?;
    let mut end = fields[4]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::GffParse(format!("invalid end: {}", fields[4])))?;
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let identity = fields[12]
        .parse::<f64>()
        .map_err(|_| TeAnnotError::GffParse(format!("invalid identity: {}", fields[12])))?;

    Ok(GenomicFeature {
        seq_id: fields[0].to_string(),
        source: source.to_string(),
        feature_type: feature_type.to_string(),
        start,
        end,
        score: identity * 100.0,
        strand: Strand::from_str(fields[5])?,
        id: fields[1].to_string(),
        parent: None,
    })
}

/// Merge features from multiple tools into one renumbered stream.
///
/// Features are sorted by `(seq_id, start)` and scanned in order. A
/// candidate is suppressed iff its end falls inside the span of the last
/// accepted record and it comes from a different tool; accepted records get
/// a fresh `{locus}_{n:05}` id (n monotonic over the whole stream) and carry
/// their previous id as `Parent`.
///
/// Suppression compares only against the single last-accepted record, not
/// every overlapping one, so two overlapping features separated in sort
/// order by a third can both survive. A sweep-line or interval-tree scan
/// would change output on such multi-way overlaps; keep the one-record
/// lookback unless that behavior change is deliberate and documented.
pub fn merge_features(
    mut features: Vec<GenomicFeature>,
    locus: &str,
) -> Result<Vec<GenomicFeature>> {
    features.sort_by(|a, b| a.seq_id.cmp(&b.seq_id).then(a.start.cmp(&b.start)));

    let mut ids = IdAllocator::new(locus);
    let mut merged: Vec<GenomicFeature> = Vec::with_capacity(features.len());

    let mut last_start = 0;
    let mut last_end = 0;
    let mut last_source = String::new();

    for mut feature in features {
        if feature.id.is_empty() {
            return Err(TeAnnotError::GffParse(format!(
                "feature {}:{}-{} from {} has no ID to merge on",
                feature.seq_id, feature.start, feature.end, feature.source
            )));
        }

        if feature.end >= last_start && feature.end <= last_end && feature.source != last_source {
            debug!(
                "Suppressing {} {}:{}-{} inside {}-{}",
                feature.source, feature.seq_id, feature.start, feature.end, last_start, last_end
            );
            continue;
        }

        last_start = feature.start;
        last_end = feature.end;
        last_source = feature.source.clone();

        feature.parent = Some(std::mem::take(&mut feature.id));
        feature.id = ids.next_id();
        merged.push(feature);
    }

    info!("Merged stream holds {} features", merged.len());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn feature(seq: &str, source: &str, start: u64, end: u64, id: &str) -> GenomicFeature {
        GenomicFeature {
            seq_id: seq.to_string(),
            source: source.to_string(),
            feature_type: "MITE".to_string(),
            start,
            end,
            score: 90.0,
            strand: Strand::Forward,
            id: id.to_string(),
            parent: None,
        }
    }

    #[test]
    fn test_cross_tool_overlap_is_suppressed() {
        let features = vec![
            feature("chr1", "Mite_Hunter", 100, 900, "a1"),
            feature("chr1", "MUSTv2", 150, 800, "b1"),
            feature("chr1", "MUSTv2", 2000, 2500, "b2"),
        ];

        let merged = merge_features(features, "MITE").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "MITE_00001");
        assert_eq!(merged[0].parent.as_deref(), Some("a1"));
        assert_eq!(merged[1].id, "MITE_00002");
        assert_eq!(merged[1].parent.as_deref(), Some("b2"));
    }

    #[test]
    fn test_same_tool_overlap_survives() {
        let features = vec![
            feature("chr1", "Mite_Hunter", 100, 900, "a1"),
            feature("chr1", "Mite_Hunter", 150, 800, "a2"),
        ];

        let merged = merge_features(features, "MITE").unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_sorting_spans_sequences() {
        let features = vec![
            feature("chr2", "x", 10, 50, "c"),
            feature("chr1", "x", 500, 900, "b"),
            feature("chr1", "x", 5, 80, "a"),
        ];

        let merged = merge_features(features, "SINE").unwrap();
        let order: Vec<&str> = merged.iter().map(|f| f.parent.as_deref().unwrap()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(merged[2].id, "SINE_00003");
    }

    #[test]
    fn test_lookback_is_single_record() {
        // the third feature overlaps the first, but the second has already
        // replaced it as the lookback record, so both survive
        let features = vec![
            feature("chr1", "tool_a", 100, 2000, "a1"),
            feature("chr1", "tool_b", 150, 3000, "b1"),
            feature("chr1", "tool_c", 200, 1500, "c1"),
        ];

        let merged = merge_features(features, "MITE").unwrap();
        let parents: Vec<&str> = merged.iter().map(|f| f.parent.as_deref().unwrap()).collect();
        assert_eq!(parents, vec!["a1", "b1"]);
        // c1 fell inside b1's span and came from another tool
    }

    #[test]
    fn test_merge_is_idempotent_on_single_source() {
        let features = vec![
            feature("chr1", "x", 5, 80, "a"),
            feature("chr1", "x", 500, 900, "b"),
            feature("chr2", "x", 10, 50, "c"),
        ];

        let once = merge_features(features, "MITE").unwrap();
        let twice = merge_features(once.clone(), "MITE").unwrap();

        assert_eq!(once.len(), twice.len());
        for (first, second) in once.iter().zip(&twice) {
            assert_eq!(first.id, second.id);
            assert_eq!((first.start, first.end), (second.start, second.end));
            assert_eq!(second.parent.as_deref(), Some(first.id.as_str()));
        }
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let features = vec![feature("chr1", "x", 5, 80, "")];
        assert!(merge_features(features, "MITE").is_err());
    }

    #[test]
    fn test_read_mustv2() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            "chr1\tmite-1\tcluster-4\t100\t420\t+\tx\tx\tx\tx\tx\tx\t0.88"
        )
        .unwrap();

        let features = read_mustv2(temp_file.path(), "MUSTv2", "MITE").unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "mite-1");
        assert_eq!((features[0].start, features[0].end), (100, 420));
        assert!((features[0].score - 88.0).abs() < 1e-9);
    }
}
