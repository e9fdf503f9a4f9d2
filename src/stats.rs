//! Per-class statistics over reconciled transposon annotations

use crate::types::{Genome, GenomicFeature, Result, TeAnnotError};
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Fixed reporting order for TE classes; `Total` is appended implicitly
pub const TE_CLASSES: [&str; 5] = ["MITE", "LTR", "SINE", "TER", "HELITRON"];

pub const STAT_HEADER: &str =
    "#sample\tType\tNumber\tAverage length(bp)\tLength(bp)\tGenome size(kb)\t% genome";

/// One statistics row for a (sample, class) pair; derived, never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub sample: String,
    pub te_class: String,
    pub count: u64,
    pub average_len: f64,
    pub total_len: u64,
    pub genome_kb: f64,
    pub percent: f64,
}

/// Compute per-class count/length/coverage statistics for one genome.
///
/// Class membership strips any `/subtype` suffix; `Total` accumulates every
/// feature regardless of class. Only non-empty classes produce rows. A
/// zero-length genome cannot be covered and is an error, not an `inf`.
pub fn compute_stat_rows(
    genome: &Genome,
    features: &[GenomicFeature],
    sample: Option<&str>,
) -> Result<Vec<StatRow>> {
    let genome_length = genome.total_length();
    if genome_length == 0 {
        return Err(TeAnnotError::Stat(
            "genome length is zero, cannot compute coverage".to_string(),
        ));
    }

    let sample = sample
        .or_else(|| genome.first_id())
        .unwrap_or_default()
        .to_string();

    let mut lengths: HashMap<&str, Vec<u64>> = HashMap::new();
    let mut total: Vec<u64> = Vec::new();

    for feature in features {
        let length = feature.length();
        total.push(length);

        let class = feature.te_class();
        if TE_CLASSES.contains(&class) {
            lengths.entry(class).or_default().push(length);
        }
    }

    let mut rows = Vec::new();
    for class in TE_CLASSES.iter().map(|c| *c).chain(std::iter::once("Total")) {
        let values = if class == "Total" {
            &total
        } else {
            match lengths.get(class) {
                Some(values) => values,
                None => continue,
            }
        };
        if values.is_empty() {
            continue;
        }

        let count = values.len() as u64;
        let sum: u64 = values.iter().sum();

        rows.push(StatRow {
            sample: sample.clone(),
            te_class: class.to_string(),
            count,
            average_len: sum as f64 / count as f64,
            total_len: sum,
            genome_kb: genome_length as f64 / 1000.0,
            percent: sum as f64 * 100.0 / genome_length as f64,
        });
    }

    info!(
        "Computed {} statistic rows over {} features",
        rows.len(),
        features.len()
    );
    Ok(rows)
}

/// Write statistic rows with the shared header line
pub fn write_stat_rows<W: Write>(writer: &mut W, rows: &[StatRow]) -> Result<()> {
    writeln!(writer, "{}", STAT_HEADER)?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}",
            row.sample,
            row.te_class,
            group_integer(row.count),
            group_float2(row.average_len),
            group_integer(row.total_len),
            group_float2(row.genome_kb),
            row.percent
        )?;
    }
    Ok(())
}

/// Format an integer with thousands separators, e.g. 50000 -> "50,000"
fn group_integer(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}

/// Two-decimal float with a grouped integer part, e.g. 5000.0 -> "5,000.00"
fn group_float2(x: f64) -> String {
    let fixed = format!("{:.2}", x);
    match fixed.split_once('.') {
        Some((int_part, frac)) => {
            let n = int_part.parse::<u64>().unwrap_or(0);
            format!("{}.{}", group_integer(n), frac)
        }
        None => fixed,
    }
}

/// Per-sample statistic rows partitioned by TE class
#[derive(Debug, Default)]
pub struct ClassGroups {
    /// First header line seen across the inputs
    pub header: String,
    /// Classes in first-seen order
    pub order: Vec<String>,
    pub rows: HashMap<String, Vec<String>>,
}

/// Group statistic rows from many sample files by their class column.
///
/// Class order follows first appearance across the inputs; within a class,
/// rows keep file-input order. No input files yield an empty grouping.
pub fn group_stat_files<P: AsRef<Path>>(paths: &[P]) -> Result<ClassGroups> {
    let mut groups = ClassGroups::default();

    for path in paths {
        let path = path.as_ref();
        info!("Reading sample statistics: {}", path.display());

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if groups.header.is_empty() {
                    groups.header = line.to_string();
                }
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(TeAnnotError::GffParse(format!(
                    "{}:{}: statistics row lacks a class column",
                    path.display(),
                    index + 1
                )));
            }

            let class = fields[1].to_string();
            if !groups.rows.contains_key(&class) {
                groups.order.push(class.clone());
            }
            groups
                .rows
                .entry(class)
                .or_default()
                .push(line.to_string());
        }
    }

    Ok(groups)
}

/// Write one `{class}_transposon.tsv` file per grouped class
pub fn write_class_files<P: AsRef<Path>>(groups: &ClassGroups, out_dir: P) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    let mut written = Vec::new();

    for class in &groups.order {
        let path = out_dir.join(format!("{}_transposon.tsv", class));
        let mut writer = BufWriter::new(File::create(&path)?);

        if !groups.header.is_empty() {
            writeln!(writer, "{}", groups.header)?;
        }
        for row in &groups.rows[class] {
            writeln!(writer, "{}", row)?;
        }
        writer.flush()?;

        info!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
