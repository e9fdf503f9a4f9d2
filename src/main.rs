use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use teannot::{
    coords::coords_to_features,
    extract::extract_features,
    fasta::{parse_fasta_file, write_fasta},
    gff3::{format_feature, parse_feature_file, GffWriter},
    helitron::helitron_to_features,
    logging::init_logger,
    ltr_finder::ltr_finder_to_features,
    mask::{mask_genome, read_mask_spans, MaskMode},
    masker::{build_masker_db, filter_masker_file},
    merge::{merge_features, read_mustv2},
    scn::retriever_to_features,
    stats::{compute_stat_rows, group_stat_files, write_class_files, write_stat_rows},
    types::GenomicFeature,
};

/// Reconcile transposable-element predictions from multiple tools
#[derive(Parser)]
#[command(name = "teannot")]
#[command(about = "Transposable-element annotation reconciliation and statistics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (shows debug info)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Log file path (optional, logs all messages)
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Select the best alignment hit per query from a comparison table
    Coords2gff {
        /// Input nucmer comparison result file
        #[arg(value_name = "FILE")]
        coords: PathBuf,

        /// Software the input sequences came from
        #[arg(short = 's', long = "source", default_value = "Mite_Hunter")]
        source: String,

        /// Type of the input sequences
        #[arg(short = 't', long = "type", default_value = "MITE")]
        feature_type: String,

        /// Output feature file (default: stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert ltr_finder prediction blocks to features
    Ltr2gff {
        /// Input ltr_finder prediction result file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(short = 's', long = "source", default_value = "ltr_finder")]
        source: String,

        #[arg(short = 't', long = "type", default_value = "LTR")]
        feature_type: String,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert HelitronScanner run-length output to features
    Helitron2gff {
        /// Input HelitronScanner prediction result file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(short = 's', long = "source", default_value = "helitronscanner")]
        source: String,

        #[arg(short = 't', long = "type", default_value = "helitron")]
        feature_type: String,

        /// Locus tag prefix for emitted ids
        #[arg(short = 'l', long = "locus", default_value = "HELITRON")]
        locus: String,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert an LTR_retriever prediction table to features
    Scn2gff {
        /// Input LTR_retriever prediction result file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(short = 's', long = "source", default_value = "LTR_retriever")]
        source: String,

        #[arg(short = 't', long = "type", default_value = "LTR")]
        feature_type: String,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Merge per-tool predictions into one non-redundant feature stream
    Merge {
        /// Input feature files
        #[arg(short = 'g', long = "gffs", num_args = 1.., value_name = "FILE")]
        gffs: Vec<PathBuf>,

        /// Input MUSTv2 tables requiring on-the-fly conversion
        #[arg(long = "tsvs", num_args = 0.., value_name = "FILE")]
        tsvs: Vec<PathBuf>,

        /// Locus tag prefix for the merged ids
        #[arg(short = 'l', long = "locus", default_value = "MITE")]
        locus: String,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Filter a whole-genome masking annotation by coverage and length
    FilterMasker {
        /// Input annotation file produced by the masker
        #[arg(value_name = "FILE")]
        gff: PathBuf,

        /// Keep matches covering at least this percentage of the element
        #[arg(long = "mperc", default_value = "50")]
        mperc: u32,

        /// Keep elements of at least this length
        #[arg(long = "minlen", default_value = "80")]
        minlen: u64,

        /// Renumbered output file (default: input stem + .gff3)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compute per-class statistics for one genome
    Stat {
        /// Input genome sequence file
        #[arg(value_name = "FASTA")]
        fasta: PathBuf,

        /// Input reconciled feature file
        #[arg(short = 'g', long = "gff", value_name = "FILE")]
        gff: PathBuf,

        /// Sample name (default: first sequence id)
        #[arg(short = 'n', long = "sample")]
        sample: Option<String>,

        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Partition per-sample statistic rows by TE class
    ClassStat {
        /// Per-sample statistic files
        #[arg(num_args = 1.., value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// Directory for the per-class output files
        #[arg(long = "out-dir", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Extract annotated element sequences from the genome
    Gff2fa {
        /// Input feature file
        #[arg(value_name = "FILE")]
        gff: PathBuf,

        /// Input genome sequence file
        #[arg(short = 'g', long = "genome", value_name = "FASTA")]
        genome: PathBuf,

        /// Feature type to extract, or "all"
        #[arg(short = 't', long = "type", default_value = "all")]
        feature_type: String,
    },

    /// Rewrite library sequence names into masker-database identifiers
    Maskerdb {
        /// Input element library files
        #[arg(num_args = 1.., value_name = "FASTA")]
        fastas: Vec<PathBuf>,

        /// TE class to record (default: derived from sequence ids)
        #[arg(long = "types")]
        types: Option<String>,
    },

    /// Mask annotated spans in the genome
    Mask {
        /// Input annotation file
        #[arg(value_name = "FILE")]
        gff: PathBuf,

        /// Input genome sequence file
        #[arg(short = 'g', long = "genome", value_name = "FASTA")]
        genome: PathBuf,

        /// Also mask simple repeats and low-complexity spans
        #[arg(long = "mask-all")]
        mask_all: bool,

        /// softmask, hardmaskN or hardmaskX
        #[arg(long = "model", default_value = "softmask")]
        model: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Coords2gff {
            coords,
            source,
            feature_type,
            output,
        } => {
            let features = coords_to_features(&coords, &source, &feature_type, &feature_type)?;
            write_feature_stream(output.as_deref(), &features, false)?;
        }
        Command::Ltr2gff {
            input,
            source,
            feature_type,
            output,
        } => {
            let features = ltr_finder_to_features(&input, &source, &feature_type)?;
            write_feature_stream(output.as_deref(), &features, false)?;
        }
        Command::Helitron2gff {
            input,
            source,
            feature_type,
            locus,
            output,
        } => {
            let features = helitron_to_features(&input, &source, &feature_type, &locus)?;
            write_feature_stream(output.as_deref(), &features, false)?;
        }
        Command::Scn2gff {
            input,
            source,
            feature_type,
            output,
        } => {
            let features = retriever_to_features(&input, &source, &feature_type)?;
            write_feature_stream(output.as_deref(), &features, false)?;
        }
        Command::Merge {
            gffs,
            tsvs,
            locus,
            output,
        } => {
            let mut features = Vec::new();
            for path in &gffs {
                features.extend(parse_feature_file(path)?);
            }
            for path in &tsvs {
                features.extend(read_mustv2(path, "MUSTv2", "MITE")?);
            }

            let merged = merge_features(features, &locus)?;
            write_feature_stream(output.as_deref(), &merged, true)?;
        }
        Command::FilterMasker {
            gff,
            mperc,
            minlen,
            output,
        } => {
            let records = filter_masker_file(&gff, mperc, minlen)?;

            let stdout = std::io::stdout();
            let mut console = stdout.lock();
            for record in &records {
                writeln!(console, "{}", record.reformatted_line())?;
            }

            let output = output.unwrap_or_else(|| renumbered_output_path(&gff));
            let mut writer = BufWriter::new(std::fs::File::create(&output)?);
            for record in &records {
                writeln!(writer, "{}", record.renumbered_line())?;
            }
            writer.flush()?;
            info!("Wrote {} renumbered records to {}", records.len(), output.display());
        }
        Command::Stat {
            fasta,
            gff,
            sample,
            output,
        } => {
            let genome = parse_fasta_file(&fasta)?;
            let features = parse_feature_file(&gff)?;
            let rows = compute_stat_rows(&genome, &features, sample.as_deref())?;

            match output {
                Some(path) => {
                    let mut writer = BufWriter::new(std::fs::File::create(&path)?);
                    write_stat_rows(&mut writer, &rows)?;
                    writer.flush()?;
                }
                None => {
                    let stdout = std::io::stdout();
                    write_stat_rows(&mut stdout.lock(), &rows)?;
                }
            }
        }
        Command::ClassStat { inputs, out_dir } => {
            let groups = group_stat_files(&inputs)?;
            let written = write_class_files(&groups, &out_dir)?;
            info!("Wrote {} per-class files", written.len());
        }
        Command::Gff2fa {
            gff,
            genome,
            feature_type,
        } => {
            let genome = parse_fasta_file(&genome)?;
            let features = parse_feature_file(&gff)?;
            let extracted = extract_features(&genome, &features, &feature_type)?;

            let stdout = std::io::stdout();
            let mut console = stdout.lock();
            for record in &extracted {
                write_fasta(
                    &mut console,
                    &record.id,
                    Some(&record.description),
                    &record.sequence,
                    60,
                )?;
            }
        }
        Command::Maskerdb { fastas, types } => {
            let stdout = std::io::stdout();
            let mut console = stdout.lock();
            for path in &fastas {
                let library = parse_fasta_file(path)?;
                for (name, sequence) in build_masker_db(&library, types.as_deref())? {
                    write_fasta(&mut console, &name, None, &sequence, 60)?;
                }
            }
        }
        Command::Mask {
            gff,
            genome,
            mask_all,
            model,
        } => {
            let mode = MaskMode::from_str(&model)?;
            let genome = parse_fasta_file(&genome)?;
            let spans = read_mask_spans(&gff, mask_all)?;

            let stdout = std::io::stdout();
            let mut console = stdout.lock();
            for (seq_id, sequence) in mask_genome(&genome, &spans, mode) {
                write_fasta(&mut console, &seq_id, None, &sequence, 100)?;
            }
        }
    }

    Ok(())
}

/// Write features to a file or stdout; merged streams carry the GFF header
fn write_feature_stream(
    output: Option<&Path>,
    features: &[GenomicFeature],
    header: bool,
) -> Result<()> {
    match output {
        Some(path) => {
            let mut writer = GffWriter::new(BufWriter::new(std::fs::File::create(path)?));
            if header {
                writer.write_header()?;
            }
            writer.write_features(features)?;
            writer.flush()?;
            info!("Wrote {} features to {}", features.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut console = stdout.lock();
            if header {
                writeln!(console, "##gff-version 3")?;
            }
            for feature in features {
                writeln!(console, "{}", format_feature(feature))?;
            }
        }
    }

    Ok(())
}

/// Default renumbered output path: input file stem with a .gff3 suffix
fn renumbered_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "filtered".to_string());
    PathBuf::from(format!("{}.gff3", stem))
}
