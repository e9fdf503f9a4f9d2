//! FASTA file parsing and genome sequence handling

use crate::types::{Genome, GenomeSequence, Result, TeAnnotError};
use bio::io::fasta;
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parse a FASTA file and return a Genome structure
pub fn parse_fasta_file<P: AsRef<Path>>(path: P) -> Result<Genome> {
    let path = path.as_ref();
    info!("Parsing FASTA file: {}", path.display());

    let file = File::open(path).map_err(|e| {
        TeAnnotError::FastaParse(format!("Failed to open FASTA file {}: {}", path.display(), e))
    })?;

    let reader = BufReader::new(file);
    let fasta_reader = fasta::Reader::new(reader);

    let mut genome = Genome::new();
    let mut sequence_count = 0;

    for result in fasta_reader.records() {
        let record = result.map_err(|e| {
            TeAnnotError::FastaParse(format!("Failed to parse FASTA record: {}", e))
        })?;

        let id = record.id().to_string();
        let description = record.desc().map(|d| d.to_string());
        let sequence = record.seq().to_vec();

        debug!("Loaded sequence: {} (length: {})", id, sequence.len());

        genome.add_sequence(GenomeSequence {
            id,
            description,
            sequence,
        });
        sequence_count += 1;
    }

    info!(
        "Successfully loaded {} sequences from FASTA file",
        sequence_count
    );

    if sequence_count == 0 {
        return Err(TeAnnotError::FastaParse(
            "No sequences found in FASTA file".to_string(),
        ));
    }

    Ok(genome)
}

/// Write FASTA records, wrapping sequence lines at `width` columns.
pub fn write_fasta<W: std::io::Write>(
    writer: &mut W,
    id: &str,
    description: Option<&str>,
    sequence: &[u8],
    width: usize,
) -> Result<()> {
    match description {
        Some(desc) => writeln!(writer, ">{} {}", id, desc)?,
        None => writeln!(writer, ">{}", id)?,
    }

    for chunk in sequence.chunks(width) {
        writer.write_all(chunk)?;
        writeln!(writer)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_fasta() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, ">seq1 Test sequence 1").unwrap();
        writeln!(temp_file, "ATGCATGC").unwrap();
        writeln!(temp_file, ">seq2").unwrap();
        writeln!(temp_file, "GCTAGCTA").unwrap();
        writeln!(temp_file, "GCTA").unwrap();

        let genome = parse_fasta_file(temp_file.path()).unwrap();

        assert_eq!(genome.sequences.len(), 2);
        assert_eq!(genome.sequence_order, vec!["seq1", "seq2"]);
        assert_eq!(genome.first_id(), Some("seq1"));
        assert_eq!(genome.total_length(), 20);

        let seq1 = genome.get_sequence("seq1").unwrap();
        assert_eq!(seq1.sequence, b"ATGCATGC");
        assert_eq!(seq1.description, Some("Test sequence 1".to_string()));

        let seq2 = genome.get_sequence("seq2").unwrap();
        assert_eq!(seq2.sequence, b"GCTAGCTAGCTA");
    }

    #[test]
    fn test_empty_fasta_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(parse_fasta_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_write_fasta_wraps_lines() {
        let mut out = Vec::new();
        write_fasta(&mut out, "seq1", None, b"ATGCATGCAT", 4).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, ">seq1\nATGC\nATGC\nAT\n");
    }
}
