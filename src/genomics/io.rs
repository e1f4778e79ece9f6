use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use bio::io::{fasta, gff};
use rust_htslib::bam::{self, header::Header, header::HeaderRecord, Read, Writer};
use tracing::debug;

use crate::genomics::{
    AlignedRead, AlignmentSource, AnnotationSource, GeneRecord, SequenceSource, SourceError,
};

/// Create a BAM writer with a minimal header for a single-reference alignment.
///
/// The caller is responsible for writing alignment records using the returned writer.
pub fn create_bam_writer<P: AsRef<Path>>(
    output_path: P,
    reference_name: &str,
    reference_length: usize,
) -> Result<Writer> {
    let mut header = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &"1.6");
    hd.push_tag(b"SO", &"coordinate");
    header.push_record(&hd);

    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", reference_name);
    sq.push_tag(b"LN", &(reference_length as i64));
    header.push_record(&sq);

    let writer = bam::Writer::from_path(output_path, &header, bam::Format::Bam)?;
    Ok(writer)
}

/// Alignment source over a BAM file.
///
/// Full scans stream the file; region queries need a `.bai` index next to it.
pub struct BamAlignments {
    path: PathBuf,
    contigs: Vec<(String, u64)>,
    indexed: Option<bam::IndexedReader>,
}

impl fmt::Debug for BamAlignments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BamAlignments")
            .field("path", &self.path)
            .field("contigs", &self.contigs)
            .field("indexed", &self.indexed.is_some())
            .finish()
    }
}

impl BamAlignments {
    /// Open a BAM file and read its header.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let reader = bam::Reader::from_path(&path)?;
        let header = reader.header();
        let contigs = header
            .target_names()
            .into_iter()
            .enumerate()
            .map(|(tid, name)| {
                let length = header.target_len(tid as u32).unwrap_or(0);
                (String::from_utf8_lossy(name).into_owned(), length)
            })
            .collect::<Vec<_>>();
        debug!(path = %path.display(), contigs = contigs.len(), "opened BAM");

        Ok(Self {
            path,
            contigs,
            indexed: None,
        })
    }

    fn indexed_reader(&mut self) -> Result<&mut bam::IndexedReader, SourceError> {
        if self.indexed.is_none() {
            self.indexed = Some(bam::IndexedReader::from_path(&self.path)?);
        }
        self.indexed
            .as_mut()
            .ok_or_else(|| SourceError::Parse("index reader unavailable".to_string()))
    }

    fn convert(&self, record: &bam::Record) -> Result<Option<AlignedRead>, SourceError> {
        if record.is_unmapped() || record.tid() < 0 || record.pos() < 0 {
            return Ok(None);
        }
        let contig = self
            .contigs
            .get(record.tid() as usize)
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| {
                SourceError::Parse(format!("record tid {} not in header", record.tid()))
            })?;
        let start = u32::try_from(record.pos())
            .map_err(|_| SourceError::Parse(format!("position {} exceeds u32", record.pos())))?;
        Ok(Some(AlignedRead::new(
            Arc::<str>::from(contig),
            start,
            record.seq().as_bytes(),
        )))
    }

    fn fetch_range(&mut self, contig: &str, start: u64, end: u64) -> Result<(), SourceError> {
        if self.contig_length(contig).is_none() {
            return Err(SourceError::UnknownContig(contig.to_string()));
        }
        let reader = self.indexed_reader()?;
        reader.fetch((contig, start as i64, end as i64))?;
        Ok(())
    }
}

impl AlignmentSource for BamAlignments {
    fn reads(&mut self) -> Result<Vec<AlignedRead>, SourceError> {
        let mut reader = bam::Reader::from_path(&self.path)?;
        let mut reads = Vec::new();
        for record in reader.records() {
            if let Some(read) = self.convert(&record?)? {
                reads.push(read);
            }
        }
        Ok(reads)
    }

    fn fetch(
        &mut self,
        contig: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<AlignedRead>, SourceError> {
        self.fetch_range(contig, start, end)?;
        let mut records = Vec::new();
        let reader = self.indexed_reader()?;
        for record in reader.records() {
            records.push(record?);
        }
        let mut reads = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(read) = self.convert(record)? {
                reads.push(read);
            }
        }
        Ok(reads)
    }

    fn contig_length(&self, contig: &str) -> Option<u64> {
        self.contigs
            .iter()
            .find(|(name, _)| name == contig)
            .map(|&(_, length)| length)
    }

    fn contigs(&self) -> Vec<(String, u64)> {
        self.contigs.clone()
    }

    fn count_reads(&mut self) -> Result<u64, SourceError> {
        let mut reader = bam::Reader::from_path(&self.path)?;
        let mut record = bam::Record::new();
        let mut total = 0u64;
        while let Some(result) = reader.read(&mut record) {
            result?;
            total += 1;
        }
        Ok(total)
    }

    fn count_in_region(&mut self, contig: &str, start: u64, end: u64) -> Result<u64, SourceError> {
        self.fetch_range(contig, start, end)?;
        let reader = self.indexed_reader()?;
        let mut record = bam::Record::new();
        let mut total = 0u64;
        while let Some(result) = reader.read(&mut record) {
            result?;
            total += 1;
        }
        Ok(total)
    }
}

/// Sequence source over a FASTA file.
#[derive(Debug, Clone)]
pub struct FastaSequences {
    path: PathBuf,
}

impl FastaSequences {
    /// Wrap a FASTA path; the file is read on demand.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SequenceSource for FastaSequences {
    fn sequences(&mut self) -> Result<Vec<(String, Vec<u8>)>, SourceError> {
        let reader = fasta::Reader::new(File::open(&self.path)?);
        let mut sequences = Vec::new();
        for record in reader.records() {
            let record = record?;
            sequences.push((record.id().to_string(), record.seq().to_ascii_uppercase()));
        }
        debug!(path = %self.path.display(), sequences = sequences.len(), "read FASTA");
        Ok(sequences)
    }
}

/// Annotation source over a GFF3 file.
///
/// Coordinates are passed through exactly as written in the file.
#[derive(Debug, Clone)]
pub struct GffAnnotations {
    path: PathBuf,
}

impl GffAnnotations {
    /// Wrap a GFF3 path; the file is read on demand.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AnnotationSource for GffAnnotations {
    fn records(&mut self) -> Result<Vec<GeneRecord>, SourceError> {
        let mut reader = gff::Reader::new(File::open(&self.path)?, gff::GffType::GFF3);
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| SourceError::Parse(err.to_string()))?;
            records.push(GeneRecord::new(
                record.seqname(),
                record.feature_type(),
                *record.start(),
                *record.end(),
            ));
        }
        debug!(path = %self.path.display(), records = records.len(), "read GFF");
        Ok(records)
    }
}
