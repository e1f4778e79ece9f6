use rayon::prelude::*;
use tracing::debug;

use crate::genomics::types::ALLELE_COUNT;
use crate::genomics::{AlignedRead, Allele, AlignmentSource};
use crate::AnalysisError;

/// Per-position allele tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PileupColumn {
    counts: [u32; ALLELE_COUNT],
}

impl PileupColumn {
    /// Create an empty column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a column from explicit `(allele, count)` pairs.
    pub fn from_counts(counts: impl IntoIterator<Item = (Allele, u32)>) -> Self {
        let mut column = Self::new();
        for (allele, count) in counts {
            column.counts[allele.index()] += count;
        }
        column
    }

    pub(crate) fn observe(&mut self, allele: Allele) {
        self.counts[allele.index()] += 1;
    }

    /// Number of observations of `allele`.
    pub fn count(&self, allele: Allele) -> u32 {
        self.counts[allele.index()]
    }

    /// Total number of reads covering this position.
    pub fn depth(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Number of alleles with a non-zero count.
    pub fn distinct_alleles(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    /// Observed alleles, most frequent first; equal counts follow allele order.
    pub fn ranked(&self) -> Vec<(Allele, u32)> {
        let mut ranked: Vec<(Allele, u32)> = Allele::ALL
            .iter()
            .map(|&allele| (allele, self.count(allele)))
            .filter(|&(_, count)| count > 0)
            .collect();
        // Stable sort keeps allele order among ties.
        ranked.sort_by(|left, right| right.1.cmp(&left.1));
        ranked
    }

    /// Elementwise sum of two columns.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.absorb(other);
        merged
    }

    fn absorb(&mut self, other: &Self) {
        for (count, extra) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += extra;
        }
    }
}

/// Inclusive genomic window `[start, end]` covered by a pileup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PileupRegion {
    start: u32,
    end: u32,
}

impl PileupRegion {
    /// Construct a region including both `start` and `end`.
    pub fn new(start: u32, end: u32) -> Result<Self, AnalysisError> {
        if end < start {
            return Err(AnalysisError::InvalidInput(format!(
                "region end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// First 0-based position.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last 0-based position (inclusive).
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of positions, counting both ends.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// Always false; a region holds at least one position.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether a 0-based coordinate falls inside the region.
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start as u64 && position <= self.end as u64
    }

    /// Resolve optional bounds against a contig of known length.
    ///
    /// The default end is the last base of the contig, so the default
    /// region spans exactly `contig_length` positions.
    pub fn resolve(
        start: Option<u32>,
        end: Option<u32>,
        contig_length: u64,
    ) -> Result<Self, AnalysisError> {
        if contig_length == 0 {
            return Err(AnalysisError::InvalidInput(
                "cannot build a region over an empty contig".to_string(),
            ));
        }
        let last = contig_length - 1;
        let start = start.unwrap_or(0);
        let end = match end {
            Some(end) => end,
            None => u32::try_from(last).map_err(|_| AnalysisError::OutOfRange {
                index: last,
                len: u32::MAX as u64,
            })?,
        };

        if end as u64 > last {
            return Err(AnalysisError::OutOfRange {
                index: end as u64,
                len: contig_length,
            });
        }
        if start > end {
            return Err(AnalysisError::OutOfRange {
                index: start as u64,
                len: end as u64 + 1,
            });
        }
        Self::new(start, end)
    }
}

/// Allele tallies for every position of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pileup {
    region: PileupRegion,
    columns: Vec<PileupColumn>,
}

impl Pileup {
    /// Allocate one empty column per position of `region`.
    pub fn empty(region: PileupRegion) -> Self {
        Self {
            region,
            columns: vec![PileupColumn::new(); region.len()],
        }
    }

    /// Wrap precomputed columns; the column count must match the region.
    pub fn from_columns(
        region: PileupRegion,
        columns: Vec<PileupColumn>,
    ) -> Result<Self, AnalysisError> {
        if columns.len() != region.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} columns supplied for a region of {} positions",
                columns.len(),
                region.len()
            )));
        }
        Ok(Self { region, columns })
    }

    /// Region covered by the pileup.
    pub fn region(&self) -> PileupRegion {
        self.region
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; see [`PileupRegion::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Ordered columns; index `i` covers coordinate `region.start() + i`.
    pub fn columns(&self) -> &[PileupColumn] {
        &self.columns
    }

    /// Column covering a 0-based genomic coordinate.
    pub fn column_at(&self, position: u64) -> Option<&PileupColumn> {
        if !self.region.contains(position) {
            return None;
        }
        self.columns.get((position - self.region.start as u64) as usize)
    }

    /// Tally every in-region base of `read`.
    pub fn add_read(&mut self, read: &AlignedRead) -> Result<(), AnalysisError> {
        let region_start = self.region.start as u64;
        for (position, base) in read.placed_bases() {
            if !self.region.contains(position) {
                continue;
            }
            let allele = Allele::try_from(base)?;
            self.columns[(position - region_start) as usize].observe(allele);
        }
        Ok(())
    }

    /// Merge two pileups over the same region, summing columns.
    pub fn merge(mut self, other: &Self) -> Result<Self, AnalysisError> {
        if self.region != other.region {
            return Err(AnalysisError::InvalidInput(format!(
                "cannot merge pileups over [{}, {}] and [{}, {}]",
                self.region.start, self.region.end, other.region.start, other.region.end
            )));
        }
        for (column, extra) in self.columns.iter_mut().zip(other.columns.iter()) {
            column.absorb(extra);
        }
        Ok(self)
    }
}

/// Build a pileup over the inclusive `region` from `reads`.
pub fn build_pileup(reads: &[AlignedRead], region: PileupRegion) -> Result<Pileup, AnalysisError> {
    let mut pileup = Pileup::empty(region);
    for read in reads {
        pileup.add_read(read)?;
    }
    debug!(
        reads = reads.len(),
        start = region.start,
        end = region.end,
        "built pileup"
    );
    Ok(pileup)
}

/// Build a pileup with rayon, folding per-worker pileups and summing them.
///
/// Produces the same result as [`build_pileup`].
pub fn build_pileup_parallel(
    reads: &[AlignedRead],
    region: PileupRegion,
) -> Result<Pileup, AnalysisError> {
    let pileup = reads
        .par_iter()
        .try_fold(
            || Pileup::empty(region),
            |mut pileup, read| {
                pileup.add_read(read)?;
                Ok::<_, AnalysisError>(pileup)
            },
        )
        .try_reduce(|| Pileup::empty(region), |left, right| left.merge(&right))?;
    debug!(
        reads = reads.len(),
        threads = rayon::current_num_threads(),
        start = region.start,
        end = region.end,
        "built pileup in parallel"
    );
    Ok(pileup)
}

/// Resolve pileup bounds for `contig` using the alignment source.
///
/// Without contig metadata, the end is inferred from the furthest read; an
/// empty read set then leaves nothing to infer from.
pub fn resolve_region(
    source: &mut dyn AlignmentSource,
    contig: &str,
    start: Option<u32>,
    end: Option<u32>,
) -> Result<PileupRegion, AnalysisError> {
    if let Some(length) = source.contig_length(contig) {
        return PileupRegion::resolve(start, end, length);
    }

    if let (Some(start), Some(end)) = (start, end) {
        return PileupRegion::new(start, end);
    }

    let reads = source.reads()?;
    let furthest = reads
        .iter()
        .filter(|read| read.contig.as_ref() == contig && !read.is_empty())
        .map(AlignedRead::end)
        .max()
        .ok_or_else(|| {
            AnalysisError::InvalidInput(format!(
                "no reads on contig {contig} to infer region bounds from"
            ))
        })?;
    PileupRegion::resolve(start, end, furthest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::InMemoryAlignments;

    fn read(start: u32, bases: &str) -> AlignedRead {
        AlignedRead::new("chr1", start, bases.as_bytes().to_vec())
    }

    #[test]
    fn pileup_builder_aggregates_counts() {
        let reads = vec![read(100, "ACGT"), read(101, "CGTA")];
        let region = PileupRegion::new(100, 109).unwrap();
        let pileup = build_pileup(&reads, region).expect("pileup should succeed");

        assert_eq!(pileup.len(), 10);
        let first = &pileup.columns()[0];
        assert_eq!(first.count(Allele::A), 1);
        assert_eq!(first.depth(), 1);
        let second = pileup.column_at(101).unwrap();
        assert_eq!(second.count(Allele::C), 2);
        assert_eq!(second.distinct_alleles(), 1);
        assert_eq!(pileup.column_at(104).unwrap().count(Allele::A), 1);
        assert_eq!(pileup.column_at(105).unwrap().depth(), 0);
    }

    #[test]
    fn single_position_region_has_one_column() {
        let region = PileupRegion::new(0, 0).unwrap();
        let pileup = build_pileup(&[read(0, "GATTACA")], region).unwrap();
        assert_eq!(pileup.len(), 1);
        assert_eq!(pileup.columns()[0].count(Allele::G), 1);
    }

    #[test]
    fn region_end_is_inclusive() {
        let region = PileupRegion::new(2, 4).unwrap();
        let pileup = build_pileup(&[read(0, "AAAAAAA")], region).unwrap();
        assert_eq!(pileup.len(), 3);
        assert!(pileup.columns().iter().all(|column| column.depth() == 1));
    }

    #[test]
    fn reads_outside_region_are_ignored() {
        let region = PileupRegion::new(10, 12).unwrap();
        let pileup = build_pileup(&[read(0, "ACGT"), read(13, "TT")], region).unwrap();
        assert!(pileup.columns().iter().all(|column| column.depth() == 0));
    }

    #[test]
    fn malformed_base_aborts_build() {
        let region = PileupRegion::new(0, 3).unwrap();
        let err = build_pileup(&[read(0, "ACXT")], region).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn malformed_base_outside_region_is_not_inspected() {
        let region = PileupRegion::new(0, 1).unwrap();
        assert!(build_pileup(&[read(0, "ACXT")], region).is_ok());
    }

    #[test]
    fn ranked_breaks_ties_by_allele_order() {
        let column = PileupColumn::from_counts([(Allele::T, 3), (Allele::C, 3), (Allele::A, 1)]);
        assert_eq!(
            column.ranked(),
            vec![(Allele::C, 3), (Allele::T, 3), (Allele::A, 1)]
        );
        assert_eq!(column.distinct_alleles(), 3);
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let reads: Vec<_> = (0..200)
            .map(|i| read(i % 37, if i % 3 == 0 { "ACGTAC" } else { "ACGAAC" }))
            .collect();
        let region = PileupRegion::new(0, 45).unwrap();
        let sequential = build_pileup(&reads, region).unwrap();
        let parallel = build_pileup_parallel(&reads, region).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn parallel_build_propagates_errors() {
        let region = PileupRegion::new(0, 3).unwrap();
        let reads = vec![read(0, "ACGT"), read(1, "A?G")];
        assert!(build_pileup_parallel(&reads, region).is_err());
    }

    #[test]
    fn merge_rejects_mismatched_regions() {
        let left = Pileup::empty(PileupRegion::new(0, 3).unwrap());
        let right = Pileup::empty(PileupRegion::new(0, 4).unwrap());
        assert!(left.merge(&right).is_err());
    }

    #[test]
    fn resolve_defaults_to_full_contig() {
        let region = PileupRegion::resolve(None, None, 1000).unwrap();
        assert_eq!(region.start(), 0);
        assert_eq!(region.end(), 999);
        assert_eq!(region.len(), 1000);
    }

    #[test]
    fn resolve_rejects_bounds_outside_contig() {
        assert!(matches!(
            PileupRegion::resolve(None, Some(1000), 1000),
            Err(AnalysisError::OutOfRange { index: 1000, len: 1000 })
        ));
        assert!(matches!(
            PileupRegion::resolve(Some(20), Some(10), 1000),
            Err(AnalysisError::OutOfRange { .. })
        ));
    }

    #[test]
    fn resolve_region_infers_end_from_reads() {
        let mut source = InMemoryAlignments::new(vec![read(0, "ACGT"), read(6, "GG")]);
        let region = resolve_region(&mut source, "chr1", None, None).unwrap();
        assert_eq!(region, PileupRegion::new(0, 7).unwrap());
    }

    #[test]
    fn resolve_region_without_reads_is_invalid() {
        let mut source = InMemoryAlignments::new(Vec::new());
        assert!(matches!(
            resolve_region(&mut source, "chr1", None, None),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
