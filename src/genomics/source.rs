//! Capabilities supplied by alignment, sequence, and annotation readers.
//!
//! The analysis core only talks to these traits; file-backed
//! implementations wrap BAM, FASTA, and GFF3 readers.

use thiserror::Error;

use crate::genomics::{AlignedRead, GeneRecord};

/// Errors raised by input sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// htslib rejected the alignment file or query.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    /// A record could not be interpreted.
    #[error("malformed record: {0}")]
    Parse(String),

    /// Query named a contig absent from the header.
    #[error("unknown contig {0}")]
    UnknownContig(String),
}

/// Reader over aligned reads.
pub trait AlignmentSource {
    /// Every read, in file order.
    fn reads(&mut self) -> Result<Vec<AlignedRead>, SourceError>;

    /// Reads on `contig` overlapping the half-open window `[start, end)`.
    fn fetch(&mut self, contig: &str, start: u64, end: u64)
        -> Result<Vec<AlignedRead>, SourceError>;

    /// Length of `contig`, when the header records it.
    fn contig_length(&self, contig: &str) -> Option<u64>;

    /// `(name, length)` for every contig in the header.
    fn contigs(&self) -> Vec<(String, u64)>;

    /// Number of reads (full scan).
    fn count_reads(&mut self) -> Result<u64, SourceError> {
        Ok(self.reads()?.len() as u64)
    }

    /// Number of reads overlapping `[start, end)` on `contig`.
    fn count_in_region(&mut self, contig: &str, start: u64, end: u64) -> Result<u64, SourceError> {
        Ok(self.fetch(contig, start, end)?.len() as u64)
    }
}

/// Reader over named reference sequences.
pub trait SequenceSource {
    /// `(name, bases)` pairs in file order.
    fn sequences(&mut self) -> Result<Vec<(String, Vec<u8>)>, SourceError>;
}

/// Reader over annotation features.
pub trait AnnotationSource {
    /// Feature records in file order.
    fn records(&mut self) -> Result<Vec<GeneRecord>, SourceError>;
}

/// Alignment source backed by a vector of reads.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlignments {
    reads: Vec<AlignedRead>,
    lengths: Vec<(String, u64)>,
}

impl InMemoryAlignments {
    /// Wrap reads without contig metadata.
    pub fn new(reads: Vec<AlignedRead>) -> Self {
        Self {
            reads,
            lengths: Vec::new(),
        }
    }

    /// Record the length of a contig.
    pub fn with_contig_length(mut self, contig: impl Into<String>, length: u64) -> Self {
        let contig = contig.into();
        self.lengths.retain(|(name, _)| *name != contig);
        self.lengths.push((contig, length));
        self
    }
}

impl AlignmentSource for InMemoryAlignments {
    fn reads(&mut self) -> Result<Vec<AlignedRead>, SourceError> {
        Ok(self.reads.clone())
    }

    fn fetch(
        &mut self,
        contig: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<AlignedRead>, SourceError> {
        Ok(self
            .reads
            .iter()
            .filter(|read| read.contig.as_ref() == contig && read.overlaps(start, end))
            .cloned()
            .collect())
    }

    fn contig_length(&self, contig: &str) -> Option<u64> {
        self.lengths
            .iter()
            .find(|(name, _)| name == contig)
            .map(|&(_, length)| length)
    }

    fn contigs(&self) -> Vec<(String, u64)> {
        self.lengths.clone()
    }

    fn count_reads(&mut self) -> Result<u64, SourceError> {
        Ok(self.reads.len() as u64)
    }

    fn count_in_region(&mut self, contig: &str, start: u64, end: u64) -> Result<u64, SourceError> {
        Ok(self
            .reads
            .iter()
            .filter(|read| read.contig.as_ref() == contig && read.overlaps(start, end))
            .count() as u64)
    }
}

/// Sequence source backed by `(name, bases)` pairs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySequences {
    sequences: Vec<(String, Vec<u8>)>,
}

impl InMemorySequences {
    /// Wrap named sequences.
    pub fn new(sequences: Vec<(String, Vec<u8>)>) -> Self {
        Self { sequences }
    }
}

impl SequenceSource for InMemorySequences {
    fn sequences(&mut self) -> Result<Vec<(String, Vec<u8>)>, SourceError> {
        Ok(self.sequences.clone())
    }
}

/// Annotation source backed by a vector of records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotations {
    records: Vec<GeneRecord>,
}

impl InMemoryAnnotations {
    /// Wrap annotation records.
    pub fn new(records: Vec<GeneRecord>) -> Self {
        Self { records }
    }
}

impl AnnotationSource for InMemoryAnnotations {
    fn records(&mut self) -> Result<Vec<GeneRecord>, SourceError> {
        Ok(self.records.clone())
    }
}
