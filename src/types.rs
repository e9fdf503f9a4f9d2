//! Core data structures for transposable-element annotation

use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during annotation processing
#[derive(Error, Debug)]
pub enum TeAnnotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FASTA parsing error: {0}")]
    FastaParse(String),

    #[error("GFF parsing error: {0}")]
    GffParse(String),

    #[error("scanner output parsing error: {0}")]
    ScannerParse(String),

    #[error("invalid attribute encoding: {0}")]
    AttributeEncoding(String),

    #[error("statistics error: {0}")]
    Stat(String),
}

pub type Result<T> = std::result::Result<T, TeAnnotError>;

/// DNA strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
            Strand::Unknown => write!(f, "."),
        }
    }
}

impl std::str::FromStr for Strand {
    type Err = TeAnnotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            // LTR_retriever writes "?" for undetermined strands
            "." | "?" => Ok(Strand::Unknown),
            _ => Err(TeAnnotError::GffParse(format!("Invalid strand: {}", s))),
        }
    }
}

/// Normalize a raw coordinate pair into an ordered 1-based span.
///
/// Prediction tools report reverse-strand hits with start and end swapped;
/// the strand is derived from that ordering. A raw start equal to the raw
/// end also yields the reverse strand, matching the upstream convention.
pub fn normalize_span(raw_start: u64, raw_end: u64) -> (u64, u64, Strand) {
    if raw_start >= raw_end {
        (raw_end, raw_start, Strand::Reverse)
    } else {
        (raw_start, raw_end, Strand::Forward)
    }
}

/// The canonical annotation record flowing through merge, filter and stats.
///
/// Coordinates are 1-based inclusive with `start <= end`; the phase column
/// is unused for transposon features and always emitted as `.`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomicFeature {
    pub seq_id: String,
    pub source: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub score: f64,
    pub strand: Strand,
    pub id: String,
    pub parent: Option<String>,
}

impl GenomicFeature {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// TE class with any `/subtype` suffix stripped, e.g. `LTR/Gypsy` -> `LTR`.
    pub fn te_class(&self) -> &str {
        self.feature_type
            .split('/')
            .next()
            .unwrap_or(&self.feature_type)
    }
}

/// Caller-scoped sequential ID source producing `{locus}_{n:05}` tags.
///
/// Each synthesizer or merge run owns its own allocator so numbering is
/// never shared across tools or hidden in module state.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    locus: String,
    next: u32,
}

impl IdAllocator {
    pub fn new(locus: &str) -> Self {
        Self {
            locus: locus.to_string(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{}_{:05}", self.locus, self.next)
    }

    pub fn issued(&self) -> u32 {
        self.next
    }
}

/// Represents a genome sequence
#[derive(Debug, Clone)]
pub struct GenomeSequence {
    pub id: String,
    pub description: Option<String>,
    pub sequence: Vec<u8>,
}

/// Collection of genome sequences, preserving input order
#[derive(Debug, Default)]
pub struct Genome {
    pub sequences: HashMap<String, GenomeSequence>,
    pub sequence_order: Vec<String>,
}

impl Genome {
    pub fn new() -> Self {
        Self {
            sequences: HashMap::new(),
            sequence_order: Vec::new(),
        }
    }

    pub fn add_sequence(&mut self, sequence: GenomeSequence) {
        self.sequence_order.push(sequence.id.clone());
        self.sequences.insert(sequence.id.clone(), sequence);
    }

    pub fn get_sequence(&self, id: &str) -> Option<&GenomeSequence> {
        self.sequences.get(id)
    }

    /// Total genome length, summed over every sequence.
    pub fn total_length(&self) -> u64 {
        self.sequences
            .values()
            .map(|s| s.sequence.len() as u64)
            .sum()
    }

    /// Id of the first sequence in input order, used as the default sample name.
    pub fn first_id(&self) -> Option<&str> {
        self.sequence_order.first().map(|s| s.as_str())
    }

    /// Extract a 1-based inclusive subsequence, reverse-complemented when the
    /// requested strand is reverse.
    pub fn get_subsequence(
        &self,
        seq_id: &str,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Result<Vec<u8>> {
        let seq = self
            .get_sequence(seq_id)
            .ok_or_else(|| TeAnnotError::FastaParse(format!("Sequence not found: {}", seq_id)))?;

        let from = (start - 1) as usize;
        let to = end as usize;

        if from >= seq.sequence.len() || to > seq.sequence.len() {
            return Err(TeAnnotError::FastaParse(format!(
                "Interval out of bounds: {}:{}-{}",
                seq_id, start, end
            )));
        }

        let mut subseq = seq.sequence[from..to].to_vec();

        if strand == Strand::Reverse {
            subseq = reverse_complement(&subseq);
        }

        Ok(subseq)
    }
}

/// Reverse complement a DNA sequence
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            b'N' => b'N',
            _ => base,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_normalize_span() {
        assert_eq!(normalize_span(10, 100), (10, 100, Strand::Forward));
        assert_eq!(normalize_span(100, 10), (10, 100, Strand::Reverse));
        // equal coordinates count as reversed
        assert_eq!(normalize_span(50, 50), (50, 50, Strand::Reverse));
    }

    #[test]
    fn test_strand_round_trip() {
        assert_eq!(Strand::from_str("+").unwrap(), Strand::Forward);
        assert_eq!(Strand::from_str("-").unwrap(), Strand::Reverse);
        assert_eq!(Strand::from_str(".").unwrap(), Strand::Unknown);
        assert_eq!(Strand::from_str("?").unwrap(), Strand::Unknown);
        assert!(Strand::from_str("x").is_err());
        assert_eq!(Strand::Forward.to_string(), "+");
        assert_eq!(Strand::Unknown.to_string(), ".");
    }

    #[test]
    fn test_id_allocator() {
        let mut ids = IdAllocator::new("MITE");
        assert_eq!(ids.next_id(), "MITE_00001");
        assert_eq!(ids.next_id(), "MITE_00002");
        assert_eq!(ids.issued(), 2);

        // scopes are independent
        let mut other = IdAllocator::new("LTR");
        assert_eq!(other.next_id(), "LTR_00001");
    }

    #[test]
    fn test_te_class_strips_subtype() {
        let feature = GenomicFeature {
            seq_id: "chr1".to_string(),
            source: "LTR_retriever".to_string(),
            feature_type: "LTR/Gypsy".to_string(),
            start: 100,
            end: 500,
            score: 95.0,
            strand: Strand::Forward,
            id: "LTR_00001".to_string(),
            parent: None,
        };
        assert_eq!(feature.te_class(), "LTR");
        assert_eq!(feature.length(), 401);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ATGC"), b"GCAT");
        assert_eq!(reverse_complement(b"AANN"), b"NNTT");
    }

    #[test]
    fn test_subsequence_extraction() {
        let mut genome = Genome::new();
        genome.add_sequence(GenomeSequence {
            id: "chr1".to_string(),
            description: None,
            sequence: b"ATGCATGCAT".to_vec(),
        });

        let fwd = genome
            .get_subsequence("chr1", 2, 5, Strand::Forward)
            .unwrap();
        assert_eq!(fwd, b"TGCA");

        let rev = genome
            .get_subsequence("chr1", 1, 4, Strand::Reverse)
            .unwrap();
        assert_eq!(rev, b"GCAT");

        assert!(genome
            .get_subsequence("chr1", 2, 50, Strand::Forward)
            .is_err());
        assert!(genome
            .get_subsequence("chr2", 1, 2, Strand::Forward)
            .is_err());
    }
}
