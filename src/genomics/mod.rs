//! Genomics data structures and algorithms for pileup genotyping.
//!
//! This module exposes the analysis core (pileup construction, the
//! heterozygosity test, variant classification, expression quantification)
//! together with the source traits it consumes and file-backed readers.

mod expression;
mod io;
mod pileup;
mod source;
mod statistics;
mod types;
mod variant_caller;
mod vcf;

pub use expression::{
    read_count, rpkm, transcript_levels, write_expression_table, ExpressionQuantifier,
    ExpressionRecord,
};
pub use io::{create_bam_writer, BamAlignments, FastaSequences, GffAnnotations};
pub use pileup::{
    build_pileup, build_pileup_parallel, resolve_region, Pileup, PileupColumn, PileupRegion,
};
pub use source::{
    AlignmentSource, AnnotationSource, InMemoryAlignments, InMemoryAnnotations,
    InMemorySequences, SequenceSource, SourceError,
};
pub use statistics::{binomial_test, is_heterozygous_plausible, HeterozygosityTest};
pub use types::{AlignedRead, Allele, GeneRecord, ReferenceSequence, ALLELE_COUNT};
pub use variant_caller::{find_variants, select_reference, Variant, VariantCaller, Zygosity};
pub use vcf::{render_vcf, write_vcf};
