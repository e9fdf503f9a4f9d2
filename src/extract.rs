//! Extraction of annotated element sequences from the genome

use crate::types::{Genome, GenomicFeature, Result};
use log::{debug, info};
use std::collections::HashMap;

/// An extracted element sequence ready for FASTA emission
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSequence {
    pub id: String,
    pub description: String,
    pub sequence: Vec<u8>,
}

/// Pull the subsequence of every feature of the requested type (`all`
/// matches everything) out of the genome, reverse-complemented for
/// minus-strand features.
///
/// Output follows genome sequence order, then feature input order within a
/// sequence; features on sequences missing from the genome are dropped.
pub fn extract_features(
    genome: &Genome,
    features: &[GenomicFeature],
    te_type: &str,
) -> Result<Vec<ExtractedSequence>> {
    let mut by_seq: HashMap<&str, Vec<&GenomicFeature>> = HashMap::new();

    for feature in features {
        if te_type != "all" && feature.feature_type != te_type {
            continue;
        }
        by_seq.entry(&feature.seq_id).or_default().push(feature);
    }

    let mut extracted = Vec::new();

    for seq_id in &genome.sequence_order {
        let Some(group) = by_seq.get(seq_id.as_str()) else {
            continue;
        };

        for feature in group {
            let sequence =
                genome.get_subsequence(&feature.seq_id, feature.start, feature.end, feature.strand)?;
            debug!(
                "Extracted {} ({}:{}-{}, {} bp)",
                feature.id,
                feature.seq_id,
                feature.start,
                feature.end,
                sequence.len()
            );
            extracted.push(ExtractedSequence {
                id: feature.id.clone(),
                description: format!("desc={}-{}", feature.start, feature.end),
                sequence,
            });
        }
    }

    info!(
        "Extracted {} element sequences of type {}",
        extracted.len(),
        te_type
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenomeSequence, Strand};

    fn genome() -> Genome {
        let mut genome = Genome::new();
        genome.add_sequence(GenomeSequence {
            id: "chr1".to_string(),
            description: None,
            sequence: b"AAATGCCCGG".to_vec(),
        });
        genome
    }

    fn feature(seq: &str, te_type: &str, start: u64, end: u64, strand: Strand, id: &str) -> GenomicFeature {
        GenomicFeature {
            seq_id: seq.to_string(),
            source: "x".to_string(),
            feature_type: te_type.to_string(),
            start,
            end,
            score: 90.0,
            strand,
            id: id.to_string(),
            parent: None,
        }
    }

    #[test]
    fn test_extract_by_type() {
        let features = vec![
            feature("chr1", "MITE", 3, 6, Strand::Forward, "MITE_00001"),
            feature("chr1", "LTR", 1, 4, Strand::Forward, "LTR_00001"),
        ];

        let mites = extract_features(&genome(), &features, "MITE").unwrap();
        assert_eq!(mites.len(), 1);
        assert_eq!(mites[0].id, "MITE_00001");
        assert_eq!(mites[0].description, "desc=3-6");
        assert_eq!(mites[0].sequence, b"ATGC");

        let all = extract_features(&genome(), &features, "all").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_minus_strand_is_reverse_complemented() {
        let features = vec![feature("chr1", "MITE", 3, 6, Strand::Reverse, "m")];
        let extracted = extract_features(&genome(), &features, "all").unwrap();
        assert_eq!(extracted[0].sequence, b"GCAT");
    }

    #[test]
    fn test_features_on_missing_sequences_are_dropped() {
        let features = vec![feature("chrX", "MITE", 1, 4, Strand::Forward, "m")];
        let extracted = extract_features(&genome(), &features, "all").unwrap();
        assert!(extracted.is_empty());
    }
}
