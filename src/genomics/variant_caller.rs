use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::genomics::statistics::HeterozygosityTest;
use crate::genomics::{
    build_pileup, build_pileup_parallel, resolve_region, AlignedRead, AlignmentSource, Allele,
    Pileup, PileupColumn, PileupRegion, ReferenceSequence, SequenceSource,
};
use crate::{AnalysisConfig, AnalysisError};

/// Single-base variant call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variant {
    /// Genomic coordinate (1-based).
    pub position: u32,
    /// Most frequent allele.
    pub allele_major: Allele,
    /// Second most frequent allele; equals the major allele for homozygous calls.
    pub allele_minor: Allele,
}

/// Zygosity implied by a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zygosity {
    /// Two alleles in a split consistent with 50/50.
    Heterozygous,
    /// A single allele differing from the reference.
    HomozygousAlternate,
}

impl Variant {
    /// Construct a new call.
    pub fn new(position: u32, allele_major: Allele, allele_minor: Allele) -> Self {
        Self {
            position,
            allele_major,
            allele_minor,
        }
    }

    /// Zygosity of the call.
    pub fn zygosity(&self) -> Zygosity {
        if self.allele_major == self.allele_minor {
            Zygosity::HomozygousAlternate
        } else {
            Zygosity::Heterozygous
        }
    }
}

/// Pileup classifier emitting heterozygous and homozygous-alternate calls.
#[derive(Debug, Clone)]
pub struct VariantCaller {
    config: AnalysisConfig,
    test: HeterozygosityTest,
}

impl Default for VariantCaller {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::default(),
            test: HeterozygosityTest::default(),
        }
    }
}

impl VariantCaller {
    /// Create a caller from a validated configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let test = HeterozygosityTest::new(config.alpha);
        Ok(Self { config, test })
    }

    /// Configuration in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Classify every column of `pileup` against `reference`.
    ///
    /// Column `i` covers 0-based coordinate `region.start() + i` and is
    /// reported at that coordinate plus one.
    pub fn find_variants(
        &self,
        reference: &ReferenceSequence,
        pileup: &Pileup,
    ) -> Result<Vec<Variant>, AnalysisError> {
        let region = pileup.region();
        let required = region.start() as u64 + pileup.len() as u64;
        if (reference.len() as u64) < required {
            return Err(AnalysisError::OutOfRange {
                index: required - 1,
                len: reference.len() as u64,
            });
        }

        let mut variants = Vec::new();
        for (offset, column) in pileup.columns().iter().enumerate() {
            let coordinate = region.start() as usize + offset;
            let reference_allele = reference.allele_at(coordinate)?;
            let position = coordinate as u32 + 1;
            if let Some(variant) = self.call_column(column, reference_allele, position) {
                variants.push(variant);
            }
        }

        debug!(
            columns = pileup.len(),
            calls = variants.len(),
            "classified pileup"
        );
        Ok(variants)
    }

    fn call_column(
        &self,
        column: &PileupColumn,
        reference_allele: Allele,
        position: u32,
    ) -> Option<Variant> {
        let ranked = column.ranked();
        match ranked.as_slice() {
            [] => None,
            [(allele, _)] => (column.count(reference_allele) == 0)
                .then(|| Variant::new(position, *allele, *allele)),
            [(major, major_count), (minor, minor_count), ..] => self
                .test
                .is_plausible(*major_count, *minor_count)
                .then(|| Variant::new(position, *major, *minor)),
        }
    }

    /// Build the pileup for the configured region, honoring `threads`.
    pub fn pileup(
        &self,
        reads: &[AlignedRead],
        region: PileupRegion,
    ) -> Result<Pileup, AnalysisError> {
        if self.config.threads <= 1 {
            return build_pileup(reads, region);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|err| AnalysisError::InvalidInput(format!("thread pool: {err}")))?;
        pool.install(|| build_pileup_parallel(reads, region))
    }

    /// Call variants end to end from injected alignment and sequence sources.
    ///
    /// The reference is the configured contig, or the first sequence when
    /// none is configured.
    pub fn call_variants(
        &self,
        alignments: &mut dyn AlignmentSource,
        sequences: &mut dyn SequenceSource,
    ) -> Result<Vec<Variant>, AnalysisError> {
        let reference = select_reference(sequences, self.config.contig.as_deref())?;
        self.call_against(alignments, &reference)
    }

    /// Call variants on the contig named by an already selected reference.
    pub fn call_against(
        &self,
        alignments: &mut dyn AlignmentSource,
        reference: &ReferenceSequence,
    ) -> Result<Vec<Variant>, AnalysisError> {
        let contig = reference.name();

        let region = match alignments.contig_length(contig) {
            Some(_) => resolve_region(
                alignments,
                contig,
                self.config.region_start,
                self.config.region_end,
            )?,
            None => PileupRegion::resolve(
                self.config.region_start,
                self.config.region_end,
                reference.len() as u64,
            )?,
        };

        let reads: Vec<_> = alignments
            .reads()?
            .into_iter()
            .filter(|read| read.contig.as_ref() == contig)
            .collect();
        info!(
            contig = %contig,
            reads = reads.len(),
            start = region.start(),
            end = region.end(),
            "calling variants"
        );

        let pileup = self.pileup(&reads, region)?;
        let variants = self.find_variants(reference, &pileup)?;
        info!(contig = %contig, calls = variants.len(), "variant calling finished");
        Ok(variants)
    }
}

/// Pick the named sequence, or the first one, and validate it as a reference.
pub fn select_reference(
    sequences: &mut dyn SequenceSource,
    contig: Option<&str>,
) -> Result<ReferenceSequence, AnalysisError> {
    let records = sequences.sequences()?;
    let (name, bases) = match contig {
        Some(contig) => records
            .into_iter()
            .find(|(name, _)| name == contig)
            .ok_or_else(|| {
                AnalysisError::InvalidInput(format!("reference has no sequence named {contig}"))
            })?,
        None => records.into_iter().next().ok_or_else(|| {
            AnalysisError::InvalidInput("reference contains no sequences".to_string())
        })?,
    };
    ReferenceSequence::new(name, &bases)
}

/// Classify `pileup` against `reference` with the default 0.10 threshold.
pub fn find_variants(
    reference: &ReferenceSequence,
    pileup: &Pileup,
) -> Result<Vec<Variant>, AnalysisError> {
    VariantCaller::default().find_variants(reference, pileup)
}
