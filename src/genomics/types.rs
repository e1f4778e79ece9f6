use std::fmt;
use std::sync::Arc;

use crate::AnalysisError;

/// Number of symbols in the allele alphabet (A, C, G, T, N, gap).
pub const ALLELE_COUNT: usize = 6;

/// Allele observed in a read or stored in the reference.
///
/// The declaration order is the tie-break order used when ranking alleles
/// with equal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Allele {
    /// Adenine.
    A,
    /// Cytosine.
    C,
    /// Guanine.
    G,
    /// Thymine.
    T,
    /// Unknown base.
    N,
    /// Gap (deletion placeholder).
    Gap,
}

impl Allele {
    /// All alleles in tie-break order.
    pub const ALL: [Allele; ALLELE_COUNT] = [
        Allele::A,
        Allele::C,
        Allele::G,
        Allele::T,
        Allele::N,
        Allele::Gap,
    ];

    /// Parse an ASCII base, case-insensitively.
    pub fn from_byte(base: u8) -> Option<Self> {
        match base {
            b'A' | b'a' => Some(Allele::A),
            b'C' | b'c' => Some(Allele::C),
            b'G' | b'g' => Some(Allele::G),
            b'T' | b't' => Some(Allele::T),
            b'N' | b'n' => Some(Allele::N),
            b'-' | b'*' => Some(Allele::Gap),
            _ => None,
        }
    }

    /// Column index used by fixed-schema counters.
    pub fn index(self) -> usize {
        self as usize
    }

    /// ASCII rendering.
    pub fn as_byte(self) -> u8 {
        match self {
            Allele::A => b'A',
            Allele::C => b'C',
            Allele::G => b'G',
            Allele::T => b'T',
            Allele::N => b'N',
            Allele::Gap => b'-',
        }
    }

    /// Character rendering.
    pub fn as_char(self) -> char {
        self.as_byte() as char
    }
}

impl TryFrom<u8> for Allele {
    type Error = AnalysisError;

    fn try_from(base: u8) -> Result<Self, Self::Error> {
        Allele::from_byte(base).ok_or_else(|| {
            AnalysisError::InvalidInput(format!("unsupported allele character {:?}", base as char))
        })
    }
}

impl TryFrom<char> for Allele {
    type Error = AnalysisError;

    fn try_from(base: char) -> Result<Self, Self::Error> {
        u8::try_from(base)
            .ok()
            .and_then(Allele::from_byte)
            .ok_or_else(|| {
                AnalysisError::InvalidInput(format!("unsupported allele character {base:?}"))
            })
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Aligned read placed on the reference without gaps.
///
/// Base `k` of `bases` sits at reference coordinate `start + k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Reference contig/chromosome name.
    pub contig: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub start: u32,
    /// Read sequence, one ASCII base per aligned reference position.
    pub bases: Arc<[u8]>,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper.
    pub fn new(contig: impl Into<Arc<str>>, start: u32, bases: impl Into<Arc<[u8]>>) -> Self {
        Self {
            contig: contig.into(),
            start,
            bases: bases.into(),
        }
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether the read carries no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// End position (half-open) on the reference.
    pub fn end(&self) -> u64 {
        self.start as u64 + self.len() as u64
    }

    /// Whether the read overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        (self.start as u64) < end && self.end() > start
    }

    /// Iterate `(reference position, base)` pairs.
    pub fn placed_bases(&self) -> impl Iterator<Item = (u64, u8)> + '_ {
        let start = self.start as u64;
        self.bases
            .iter()
            .enumerate()
            .map(move |(offset, &base)| (start + offset as u64, base))
    }
}

/// Validated reference sequence, 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    name: String,
    alleles: Vec<Allele>,
}

impl ReferenceSequence {
    /// Build a reference from raw ASCII bases, rejecting unknown characters.
    pub fn new(name: impl Into<String>, bases: &[u8]) -> Result<Self, AnalysisError> {
        let alleles = bases
            .iter()
            .enumerate()
            .map(|(idx, &base)| {
                Allele::from_byte(base).ok_or_else(|| {
                    AnalysisError::InvalidInput(format!(
                        "unsupported reference character {:?} at position {}",
                        base as char,
                        idx + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.into(),
            alleles,
        })
    }

    /// Sequence name as reported by the sequence source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    /// Whether the reference is empty.
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Allele at a 0-based coordinate.
    pub fn get(&self, position: usize) -> Option<Allele> {
        self.alleles.get(position).copied()
    }

    /// Allele at a 0-based coordinate, failing with `OutOfRange`.
    pub fn allele_at(&self, position: usize) -> Result<Allele, AnalysisError> {
        self.get(position).ok_or(AnalysisError::OutOfRange {
            index: position as u64,
            len: self.len() as u64,
        })
    }

    /// All alleles in order.
    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }
}

/// Annotation record as produced by the annotation reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    /// Contig the feature lies on.
    pub contig_id: String,
    /// Feature type column (e.g. `CDS`, `gene`).
    pub feature_type: String,
    /// Start coordinate as reported by the reader.
    pub start: u64,
    /// End coordinate as reported by the reader.
    pub end: u64,
}

impl GeneRecord {
    /// Construct a new annotation record.
    pub fn new(
        contig_id: impl Into<String>,
        feature_type: impl Into<String>,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            contig_id: contig_id.into(),
            feature_type: feature_type.into(),
            start,
            end,
        }
    }
}
