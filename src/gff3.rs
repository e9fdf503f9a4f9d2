//! Canonical 9-column feature file parsing and writing

use crate::types::{GenomicFeature, Result, Strand, TeAnnotError};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Parse a canonical feature file into GenomicFeature records.
///
/// Comment lines (`#`) and blank lines are skipped; any data line that does
/// not decompose into 9 tab-separated columns aborts the file with a
/// file+line error rather than being silently dropped.
pub fn parse_feature_file<P: AsRef<Path>>(path: P) -> Result<Vec<GenomicFeature>> {
    let path = path.as_ref();
    info!("Parsing feature file: {}", path.display());

    let file = File::open(path).map_err(|e| {
        TeAnnotError::GffParse(format!("Failed to open feature file {}: {}", path.display(), e))
    })?;

    let reader = BufReader::new(file);
    let mut features = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let feature = parse_feature_line(trimmed).map_err(|e| {
            TeAnnotError::GffParse(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        features.push(feature);
    }

    info!("Parsed {} features from {}", features.len(), path.display());
    Ok(features)
}

/// Parse a single 9-column feature line
pub fn parse_feature_line(line: &str) -> Result<GenomicFeature> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() != 9 {
        return Err(TeAnnotError::GffParse(format!(
            "Expected 9 fields, found {}",
            fields.len()
        )));
    }

    let mut start = fields[3]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::GffParse(format!("Invalid start position: {}", fields[3])))?;

    let mut end = fields[4]
        .parse::<u64>()
        .map_err(|_| TeAnnotError::GffParse(format!("Invalid end position: {}", fields[4])))?;

    // Upstream tools occasionally leave reverse-strand spans unswapped
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let score = if fields[5] == "." {
        0.0
    } else {
        fields[5]
            .parse::<f64>()
            .map_err(|_| TeAnnotError::GffParse(format!("Invalid score: {}", fields[5])))?
    };

    let strand = Strand::from_str(fields[6])?;

    let (id, parent) = parse_attributes(fields[8])?;

    Ok(GenomicFeature {
        seq_id: fields[0].to_string(),
        source: fields[1].to_string(),
        feature_type: fields[2].to_string(),
        start,
        end,
        score,
        strand,
        id,
        parent,
    })
}

/// Decompose a `key=value;key=value` attribute column into (ID, Parent).
///
/// The ID may be absent (some upstream files carry only descriptive tags);
/// a pair without `=` is a malformed record.
fn parse_attributes(attr_str: &str) -> Result<(String, Option<String>)> {
    let mut id = String::new();
    let mut parent = None;

    if attr_str.trim().is_empty() || attr_str == "." {
        return Ok((id, parent));
    }

    for pair in attr_str.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair.split_once('=').ok_or_else(|| {
            TeAnnotError::GffParse(format!("Invalid attribute format: {}", pair))
        })?;

        match key {
            "ID" => id = value.to_string(),
            "Parent" => parent = Some(value.to_string()),
            _ => {}
        }
    }

    Ok((id, parent))
}

/// Writer for canonical feature files
pub struct GffWriter<W: Write> {
    writer: W,
}

impl GffWriter<BufWriter<File>> {
    /// Create a feature file on disk with a `##gff-version 3` header
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Creating feature output file: {}", path.display());

        let file = File::create(path).map_err(TeAnnotError::Io)?;
        let mut writer = GffWriter::new(BufWriter::new(file));
        writer.write_header()?;
        Ok(writer)
    }
}

impl<W: Write> GffWriter<W> {
    pub fn new(writer: W) -> Self {
        GffWriter { writer }
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.writer, "##gff-version 3")?;
        Ok(())
    }

    pub fn write_feature(&mut self, feature: &GenomicFeature) -> Result<()> {
        writeln!(self.writer, "{}", format_feature(feature))?;
        Ok(())
    }

    pub fn write_features(&mut self, features: &[GenomicFeature]) -> Result<()> {
        for feature in features {
            self.write_feature(feature)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Format a feature as one 9-column line; scores carry 2-decimal precision
pub fn format_feature(feature: &GenomicFeature) -> String {
    let mut attributes = format!("ID={}", feature.id);
    if let Some(parent) = &feature.parent {
        attributes.push_str(&format!(";Parent={}", parent));
    }

    format!(
        "{}\t{}\t{}\t{}\t{}\t{:.2}\t{}\t.\t{}",
        feature.seq_id,
        feature.source,
        feature.feature_type,
        feature.start,
        feature.end,
        feature.score,
        feature.strand,
        attributes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_feature_line() {
        let line = "chr1\tltr_finder\tLTR\t100\t1100\t95.00\t+\t.\tID=LTR_00001";
        let feature = parse_feature_line(line).unwrap();

        assert_eq!(feature.seq_id, "chr1");
        assert_eq!(feature.source, "ltr_finder");
        assert_eq!(feature.feature_type, "LTR");
        assert_eq!(feature.start, 100);
        assert_eq!(feature.end, 1100);
        assert_eq!(feature.score, 95.0);
        assert_eq!(feature.strand, Strand::Forward);
        assert_eq!(feature.id, "LTR_00001");
        assert_eq!(feature.parent, None);
    }

    #[test]
    fn test_parse_unswapped_span() {
        let line = "chr1\tx\tMITE\t500\t100\t1.00\t-\t.\tID=a";
        let feature = parse_feature_line(line).unwrap();
        assert_eq!((feature.start, feature.end), (100, 500));
    }

    #[test]
    fn test_parse_parent_attribute() {
        let line = "chr1\tMUSTv2\tMITE\t5\t50\t88.00\t+\t.\tID=MITE_00002;Parent=mite-3";
        let feature = parse_feature_line(line).unwrap();
        assert_eq!(feature.id, "MITE_00002");
        assert_eq!(feature.parent, Some("mite-3".to_string()));
    }

    #[test]
    fn test_malformed_lines_abort() {
        assert!(parse_feature_line("chr1\tx\tMITE\t5\t50").is_err());
        // attribute without key=value decomposition
        assert!(parse_feature_line("chr1\tx\tMITE\t5\t50\t1.00\t+\t.\tnot-an-attr").is_err());
        assert!(parse_feature_line("chr1\tx\tMITE\tfive\t50\t1.00\t+\t.\tID=a").is_err());
    }

    #[test]
    fn test_parse_file_reports_line_numbers() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "##gff-version 3").unwrap();
        writeln!(temp_file, "chr1\tx\tMITE\t5\t50\t1.00\t+\t.\tID=a").unwrap();
        writeln!(temp_file, "broken line").unwrap();

        let err = parse_feature_file(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains(":3:"), "got: {}", err);
    }

    #[test]
    fn test_format_feature_round_trip() {
        let line = "chr2\tsinescan\tSINE\t10\t90\t77.25\t-\t.\tID=SINE_00003;Parent=s9";
        let feature = parse_feature_line(line).unwrap();
        assert_eq!(format_feature(&feature), line);
    }

    #[test]
    fn test_writer_emits_header() {
        let mut buffer = Vec::new();
        {
            let mut writer = GffWriter::new(&mut buffer);
            writer.write_header().unwrap();
            writer
                .write_feature(&parse_feature_line("chr1\tx\tMITE\t5\t50\t1.00\t+\t.\tID=a").unwrap())
                .unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("##gff-version 3\n"));
        assert!(text.contains("ID=a"));
    }
}
