//! teannot: transposable-element annotation reconciliation
//!
//! This library reconciles TE predictions produced by independent tools
//! (MITE hunters, LTR scanners, helitron scanners, whole-genome maskers)
//! into one canonical, non-redundant feature set per genome, and computes
//! per-class summary statistics across samples.

pub mod coords;
pub mod extract;
pub mod fasta;
pub mod gff3;
pub mod helitron;
pub mod logging;
pub mod ltr_finder;
pub mod mask;
pub mod masker;
pub mod merge;
pub mod scn;
pub mod stats;
pub mod types;

// Re-export the types every stage shares
pub use types::{GenomicFeature, IdAllocator, Result, Strand, TeAnnotError};
