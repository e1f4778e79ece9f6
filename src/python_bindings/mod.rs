//! Python bindings that expose the genotyper core via PyO3.
use std::sync::Arc;

use pyo3::{exceptions::PyValueError, prelude::*, types::PyModule};

use crate::genomics::{
    build_pileup, is_heterozygous_plausible, rpkm, AlignedRead, PileupRegion, ReferenceSequence,
    VariantCaller,
};
use crate::{AnalysisConfig, AnalysisError};

const CONTIG: &str = "sample";

fn to_py_err(err: AnalysisError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Python-facing entry point for variant calling and quantification.
#[pyclass]
#[derive(Debug)]
pub struct PyGenotyper {
    caller: VariantCaller,
}

#[pymethods]
impl PyGenotyper {
    #[new]
    #[pyo3(signature = (alpha = crate::DEFAULT_ALPHA))]
    /// Create the engine with the given heterozygosity threshold.
    pub fn new(alpha: f64) -> PyResult<Self> {
        let caller = VariantCaller::new(AnalysisConfig::default().with_alpha(alpha))
            .map_err(to_py_err)?;
        Ok(Self { caller })
    }

    /// Call variants on a single reference.
    ///
    /// Args:
    ///     reference: Reference sequence.
    ///     reads: List of `(position, sequence)` tuples, 0-based.
    ///     region_start: First position (inclusive, default 0).
    ///     region_end: Last position (inclusive, default end of reference).
    ///
    /// Returns:
    ///     List of `(position, major, minor)` tuples, 1-based.
    #[pyo3(signature = (reference, reads, region_start = None, region_end = None))]
    pub fn find_variants(
        &self,
        reference: String,
        reads: Vec<(u32, String)>,
        region_start: Option<u32>,
        region_end: Option<u32>,
    ) -> PyResult<Vec<(u32, char, char)>> {
        let reference =
            ReferenceSequence::new(CONTIG, reference.trim().as_bytes()).map_err(to_py_err)?;
        let region = PileupRegion::resolve(region_start, region_end, reference.len() as u64)
            .map_err(to_py_err)?;

        let contig: Arc<str> = Arc::from(CONTIG);
        let aligned_reads: Vec<AlignedRead> = reads
            .into_iter()
            .map(|(pos, seq)| {
                AlignedRead::new(Arc::clone(&contig), pos, seq.trim().as_bytes().to_vec())
            })
            .collect();

        let pileup = build_pileup(&aligned_reads, region).map_err(to_py_err)?;
        let variants = self
            .caller
            .find_variants(&reference, &pileup)
            .map_err(to_py_err)?;

        Ok(variants
            .into_iter()
            .map(|variant| {
                (
                    variant.position,
                    variant.allele_major.as_char(),
                    variant.allele_minor.as_char(),
                )
            })
            .collect())
    }

    /// Whether a major/minor split passes the heterozygosity test.
    #[staticmethod]
    pub fn is_heterozygous_plausible(major: u32, minor: u32) -> bool {
        is_heterozygous_plausible(major, minor)
    }

    /// Reads Per Kilobase per Million mapped reads.
    #[staticmethod]
    pub fn rpkm(gene_reads: u64, gene_length: u64, total_depth: u64) -> PyResult<f64> {
        rpkm(gene_reads, gene_length, total_depth).map_err(to_py_err)
    }
}

/// Create Python module.
#[pymodule]
pub fn genotyper_py(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGenotyper>()?;
    Ok(())
}
