//! Threshold filtering of whole-genome masking annotations
//!
//! The masking step aligns the genome against a TE library whose sequence
//! names are composite identifiers built by [`build_masker_db`]:
//! `{seqid}:LEN-{length}#{class}`. The masker echoes that identifier inside
//! each annotation's attribute column, e.g.
//!
//! ```text
//! Target "Motif:MITE_00012:LEN-512#MITE" 3 498
//! ```
//!
//! [`filter_masker_file`] decodes it back into the element class, the full
//! element length and the matched sub-span, then drops weak matches.

use crate::types::{Genome, Result, TeAnnotError};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Decoded composite identifier from a masking annotation
#[derive(Debug, Clone, PartialEq)]
pub struct MaskerAttr {
    /// The identifier as written into the library (kept as the `note`)
    pub identifier: String,
    /// TE class, the identifier prefix before the first `_`
    pub te_class: String,
    /// Full length of the library element
    pub seq_len: u64,
    /// Length of the matched sub-span
    pub match_len: u64,
}

/// Decode the attribute column of one masking annotation.
///
/// The last two whitespace tokens are the matched sub-span (order
/// normalized); the token before them is the quoted composite identifier.
/// Every missing delimiter is fatal for the record.
pub fn parse_composite_attr(attr: &str) -> Result<MaskerAttr> {
    let tokens: Vec<&str> = attr.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(TeAnnotError::AttributeEncoding(format!(
            "expected identifier plus two sub-coordinates, got: {}",
            attr
        )));
    }

    let mut sub_start = tokens[tokens.len() - 2].parse::<u64>().map_err(|_| {
        TeAnnotError::AttributeEncoding(format!(
            "invalid sub-coordinate: {}",
            tokens[tokens.len() - 2]
        ))
    })?;
    let mut sub_end = tokens[tokens.len() - 1].parse::<u64>().map_err(|_| {
        TeAnnotError::AttributeEncoding(format!(
            "invalid sub-coordinate: {}",
            tokens[tokens.len() - 1]
        ))
    })?;
    if sub_start >= sub_end {
        std::mem::swap(&mut sub_start, &mut sub_end);
    }
    let match_len = sub_end - sub_start + 1;

    let quoted = tokens[tokens.len() - 3].trim_matches('"');
    let parts: Vec<&str> = quoted.split(':').collect();
    if parts.len() < 3 {
        return Err(TeAnnotError::AttributeEncoding(format!(
            "identifier lacks ':' structure: {}",
            quoted
        )));
    }

    let identifier = parts[1..].join(":");

    let name_part = parts[parts.len() - 2];
    let te_class = name_part
        .split_once('_')
        .map(|(class, _)| class)
        .ok_or_else(|| {
            TeAnnotError::AttributeEncoding(format!("identifier name lacks '_': {}", name_part))
        })?;

    let len_part = parts[parts.len() - 1];
    let len_value = len_part.split_once('-').map(|(_, v)| v).ok_or_else(|| {
        TeAnnotError::AttributeEncoding(format!("identifier lacks LEN- field: {}", len_part))
    })?;
    // the library context key after '#' is not needed here
    let len_digits = len_value.split('#').next().unwrap_or_default();
    let seq_len = len_digits.parse::<u64>().map_err(|_| {
        TeAnnotError::AttributeEncoding(format!("invalid element length: {}", len_value))
    })?;

    if seq_len == 0 {
        return Err(TeAnnotError::AttributeEncoding(format!(
            "zero element length in identifier: {}",
            quoted
        )));
    }

    Ok(MaskerAttr {
        identifier,
        te_class: te_class.to_string(),
        seq_len,
        match_len,
    })
}

/// One accepted masking annotation with its renumbered identity
#[derive(Debug, Clone)]
pub struct FilteredRecord {
    /// Original columns with the type column rewritten to the TE class
    pub columns: Vec<String>,
    pub new_id: String,
    pub note: String,
}

impl FilteredRecord {
    /// The reformatted row: class in the type column, original attributes
    pub fn reformatted_line(&self) -> String {
        self.columns.join("\t")
    }

    /// The renumbered row: fresh per-class ID plus the identifier as a note
    pub fn renumbered_line(&self) -> String {
        let mut columns = self.columns.clone();
        let last = columns.len() - 1;
        columns[last] = format!("ID={};note={}", self.new_id, self.note);
        columns.join("\t")
    }
}

/// Filter a masking annotation file by coverage ratio and element length.
///
/// A record survives iff its matched span covers at least `mperc` percent
/// of the library element and the element itself is at least `minlen` long.
/// Surviving records are renumbered per TE class, counters starting fresh
/// for each input file.
pub fn filter_masker_file<P: AsRef<Path>>(
    path: P,
    mperc: u32,
    minlen: u64,
) -> Result<Vec<FilteredRecord>> {
    let path = path.as_ref();
    info!(
        "Filtering masking annotation {} (mperc={}, minlen={})",
        path.display(),
        mperc,
        minlen
    );

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut records = Vec::new();
    let mut seen = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(TeAnnotError::GffParse(format!(
                "{}:{}: expected 9 fields, found {}",
                path.display(),
                index + 1,
                fields.len()
            )));
        }
        seen += 1;

        let attr = parse_composite_attr(fields[fields.len() - 1]).map_err(|e| {
            TeAnnotError::AttributeEncoding(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;

        let coverage = attr.match_len as f64 * 100.0 / attr.seq_len as f64;
        if coverage < mperc as f64 {
            debug!(
                "Rejecting {} at line {}: coverage {:.1}% < {}%",
                attr.identifier,
                index + 1,
                coverage,
                mperc
            );
            continue;
        }
        if attr.seq_len < minlen {
            debug!(
                "Rejecting {} at line {}: element length {} < {}",
                attr.identifier,
                index + 1,
                attr.seq_len,
                minlen
            );
            continue;
        }

        let counter = counters.entry(attr.te_class.clone()).or_insert(0);
        *counter += 1;

        let mut columns: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        columns[2] = attr.te_class.clone();

        records.push(FilteredRecord {
            columns,
            new_id: format!("{}_{:05}", attr.te_class, counter),
            note: attr.identifier,
        });
    }

    info!(
        "Kept {} of {} masking annotations from {}",
        records.len(),
        seen,
        path.display()
    );
    Ok(records)
}

/// Rewrite genome/library sequence names into masker-database composite
/// identifiers `{seqid}:LEN-{length}#{class}`.
///
/// Without an explicit class the prefix of the sequence id before its first
/// `_` is used (the converters emit `{class}_{n:05}` ids).
pub fn build_masker_db(genome: &Genome, te_class: Option<&str>) -> Result<Vec<(String, Vec<u8>)>> {
    let mut renamed = Vec::with_capacity(genome.sequence_order.len());

    for id in &genome.sequence_order {
        let seq = &genome.sequences[id];
        let class = match te_class {
            Some(class) => class,
            None => id.split_once('_').map(|(class, _)| class).ok_or_else(|| {
                TeAnnotError::AttributeEncoding(format!(
                    "cannot derive TE class from sequence id: {}",
                    id
                ))
            })?,
        };

        renamed.push((
            format!("{}:LEN-{}#{}", id, seq.sequence.len(), class),
            seq.sequence.clone(),
        ));
    }

    Ok(renamed)
}
