//! # Pileup Genotyping for Small Genomes
//!
//! This library calls single-base variants from short-read alignments and
//! quantifies gene expression as RPKM. It targets bacterial-scale genomes
//! where the whole-genome pileup fits in memory.
//!
//! ## Core Pipeline
//!
//! 1. **Pileup construction**: tally observed alleles per reference position
//! 2. **Heterozygosity test**: exact two-sided binomial test against a 50/50 split
//! 3. **Classification**: heterozygous and homozygous-alternate calls, 1-based
//!
//! Expression quantification counts reads per CDS annotation and normalizes
//! by gene length and total depth.
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use genotyper::genomics::{
//!     build_pileup, find_variants, AlignedRead, PileupRegion, ReferenceSequence,
//! };
//!
//! let contig: Arc<str> = Arc::from("sample");
//! let reads = vec![AlignedRead::new(Arc::clone(&contig), 0, b"AAGG".to_vec())];
//! let reference = ReferenceSequence::new("sample", b"AATT")?;
//! let pileup = build_pileup(&reads, PileupRegion::new(0, 3)?)?;
//! let variants = find_variants(&reference, &pileup)?;
//! assert_eq!(variants.len(), 2);
//! # Ok::<(), genotyper::AnalysisError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod genomics; // Pileup, statistics, classification, expression
/// Python bindings for exposing the genotyper to external runtimes.
#[cfg(feature = "python-bindings")]
pub mod python_bindings;

// Re-exports for convenience
pub use genomics::{
    build_pileup, find_variants, is_heterozygous_plausible, rpkm, transcript_levels,
    AlignedRead, Allele, ExpressionRecord, Pileup, PileupColumn, PileupRegion,
    ReferenceSequence, SourceError, Variant, VariantCaller,
};

use thiserror::Error;

/// Significance threshold below which a split is rejected as heterozygous.
pub const DEFAULT_ALPHA: f64 = 0.10;

/// Annotation feature type quantified by default.
pub const DEFAULT_FEATURE_TYPE: &str = "CDS";

/// Configuration parameters for an analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Heterozygosity test threshold (p-values below it reject the call)
    pub alpha: f64,

    /// Worker threads for pileup construction (1 = sequential)
    pub threads: usize,

    /// Contig to analyze (None = first sequence in the reference)
    pub contig: Option<String>,

    /// First 0-based position of the pileup (None = 0)
    pub region_start: Option<u32>,

    /// Last 0-based position of the pileup, inclusive (None = end of contig)
    pub region_end: Option<u32>,

    /// Annotation feature type quantified for expression
    pub feature_type: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            threads: 1,
            contig: None,
            region_start: None,
            region_end: None,
            feature_type: DEFAULT_FEATURE_TYPE.to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Set the heterozygosity threshold.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the number of pileup worker threads (clamped to at least 1).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Select the contig to analyze.
    pub fn with_contig(mut self, contig: impl Into<String>) -> Self {
        self.contig = Some(contig.into());
        self
    }

    /// Restrict the pileup to explicit bounds.
    pub fn with_region(mut self, start: Option<u32>, end: Option<u32>) -> Self {
        self.region_start = start;
        self.region_end = end;
        self
    }

    /// Set the annotation feature type used for expression.
    pub fn with_feature_type(mut self, feature_type: impl Into<String>) -> Self {
        self.feature_type = feature_type.into();
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AnalysisError::InvalidInput(format!(
                "alpha must lie in [0, 1], got {}",
                self.alpha
            )));
        }
        if self.feature_type.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "feature type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur during analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Position or index outside valid bounds
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// Offending index
        index: u64,
        /// Length of the indexed sequence or contig
        len: u64,
    },

    /// Malformed or insufficient input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Normalization with a zero denominator
    #[error("division by zero: {0}")]
    DivisionByZero(String),

    /// Failure reported by an alignment, sequence, or annotation source
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}
