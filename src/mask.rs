//! Genome masking from a reconciled annotation file

use crate::types::{Genome, Result, TeAnnotError};
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Simple-repeat classes excluded from masking unless masking everything
pub const SKIPPED_CLASSES: [&str; 3] = ["Low_complexity", "Simple_repeat", "Satellite"];

/// How annotated spans are written back into the genome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    /// Lowercase the annotated span
    Soft,
    /// Replace annotated bases with `N`
    HardN,
    /// Replace annotated bases with `X`
    HardX,
}

impl std::str::FromStr for MaskMode {
    type Err = TeAnnotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "softmask" => Ok(MaskMode::Soft),
            "hardmaskN" => Ok(MaskMode::HardN),
            "hardmaskX" => Ok(MaskMode::HardX),
            _ => Err(TeAnnotError::GffParse(format!("Invalid mask mode: {}", s))),
        }
    }
}

/// Collect maskable spans per sequence from an annotation file.
///
/// Spans are normalized; rows of the simple-repeat classes are skipped
/// unless `mask_all` is set.
pub fn read_mask_spans<P: AsRef<Path>>(
    path: P,
    mask_all: bool,
) -> Result<HashMap<String, Vec<(u64, u64)>>> {
    let path = path.as_ref();
    info!("Reading mask spans from {}", path.display());

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut spans: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
    let mut count = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(TeAnnotError::GffParse(format!(
                "{}:{}: expected at least 5 fields, found {}",
                path.display(),
                index + 1,
                fields.len()
            )));
        }

        if !mask_all && SKIPPED_CLASSES.contains(&fields[2]) {
            continue;
        }

        let mut start = fields[3].parse::<u64>().map_err(|_| {
            TeAnnotError::GffParse(format!(
                "{}:{}: invalid start: {}",
                path.display(),
                index + 1,
                fields[3]
            ))
        })?;
        let mut end = fields[4].parse::<u64>().map_err(|_| {
            TeAnnotError::GffParse(format!(
                "{}:{}: invalid end: {}",
                path.display(),
                index + 1,
                fields[4]
            ))
        })?;
        if start >= end {
            std::mem::swap(&mut start, &mut end);
        }

        spans.entry(fields[0].to_string()).or_default().push((start, end));
        count += 1;
    }

    info!("Collected {} maskable spans", count);
    Ok(spans)
}

/// Apply spans to the genome and return the masked sequences in input order.
///
/// Sequences are uppercased first; spans beyond a sequence end are clamped.
pub fn mask_genome(
    genome: &Genome,
    spans: &HashMap<String, Vec<(u64, u64)>>,
    mode: MaskMode,
) -> Vec<(String, Vec<u8>)> {
    let mut masked = Vec::with_capacity(genome.sequence_order.len());

    for seq_id in &genome.sequence_order {
        let mut sequence = genome.sequences[seq_id].sequence.to_ascii_uppercase();

        if let Some(seq_spans) = spans.get(seq_id) {
            let mut ordered = seq_spans.clone();
            ordered.sort_by_key(|span| span.0);

            for (start, end) in ordered {
                let from = (start.saturating_sub(1)) as usize;
                let to = (end as usize).min(sequence.len());
                if from >= to {
                    continue;
                }
                mask_range(&mut sequence[from..to], mode);
            }
        }

        masked.push((seq_id.clone(), sequence));
    }

    masked
}

fn mask_range(bases: &mut [u8], mode: MaskMode) {
    for base in bases {
        match mode {
            MaskMode::Soft => *base = base.to_ascii_lowercase(),
            MaskMode::HardN | MaskMode::HardX => {
                if matches!(*base, b'A' | b'T' | b'G' | b'C') {
                    *base = if mode == MaskMode::HardN { b'N' } else { b'X' };
                }
            }
        }
    }
}
