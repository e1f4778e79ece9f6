use std::io::Write;

use anyhow::Result as AnyResult;
use tracing::{debug, info};

use crate::genomics::{AlignmentSource, AnnotationSource, GeneRecord};
use crate::{AnalysisConfig, AnalysisError, DEFAULT_FEATURE_TYPE};

/// Normalized expression for one annotated feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpressionRecord {
    /// Contig the feature lies on.
    pub contig_id: String,
    /// Feature start as reported by the annotation.
    pub start: u64,
    /// Feature end as reported by the annotation.
    pub end: u64,
    /// Reads per kilobase per million mapped reads.
    pub rpkm: f64,
}

/// Reads Per Kilobase of transcript per Million mapped reads.
pub fn rpkm(gene_reads: u64, gene_length: u64, total_depth: u64) -> Result<f64, AnalysisError> {
    if gene_length == 0 {
        return Err(AnalysisError::DivisionByZero(
            "gene length is zero".to_string(),
        ));
    }
    if total_depth == 0 {
        return Err(AnalysisError::DivisionByZero(
            "total read depth is zero".to_string(),
        ));
    }
    let kilobases = gene_length as f64 / 1_000.0;
    let millions = total_depth as f64 / 1_000_000.0;
    Ok(gene_reads as f64 / (kilobases * millions))
}

/// Number of reads overlapping the half-open window `[start, end)` on `contig`.
pub fn read_count(
    source: &mut dyn AlignmentSource,
    contig: &str,
    start: u64,
    end: u64,
) -> Result<u64, AnalysisError> {
    Ok(source.count_in_region(contig, start, end)?)
}

/// Per-feature RPKM quantification over a chosen annotation type.
#[derive(Debug, Clone)]
pub struct ExpressionQuantifier {
    feature_type: String,
}

impl Default for ExpressionQuantifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionQuantifier {
    /// Quantify `CDS` features.
    pub fn new() -> Self {
        Self {
            feature_type: DEFAULT_FEATURE_TYPE.to_string(),
        }
    }

    /// Quantify the feature type carried by a validated configuration.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            feature_type: config.feature_type.clone(),
        })
    }

    /// Quantify a different feature type.
    pub fn with_feature_type(mut self, feature_type: impl Into<String>) -> Self {
        self.feature_type = feature_type.into();
        self
    }

    /// Feature type being quantified.
    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    /// RPKM for every matching annotation, in annotation order.
    ///
    /// Total depth is counted once, before any per-feature query.
    pub fn transcript_levels(
        &self,
        alignments: &mut dyn AlignmentSource,
        annotations: &mut dyn AnnotationSource,
    ) -> Result<Vec<ExpressionRecord>, AnalysisError> {
        let total_depth = alignments.count_reads()?;
        debug!(total_depth, "counted mapped reads");

        let mut levels = Vec::new();
        for record in annotations.records()? {
            if record.feature_type != self.feature_type {
                continue;
            }
            levels.push(self.quantify(alignments, &record, total_depth)?);
        }

        info!(
            feature_type = %self.feature_type,
            features = levels.len(),
            total_depth,
            "quantified expression"
        );
        Ok(levels)
    }

    fn quantify(
        &self,
        alignments: &mut dyn AlignmentSource,
        record: &GeneRecord,
        total_depth: u64,
    ) -> Result<ExpressionRecord, AnalysisError> {
        let gene_length = record.end.checked_sub(record.start).ok_or_else(|| {
            AnalysisError::InvalidInput(format!(
                "feature on {} ends at {} before its start {}",
                record.contig_id, record.end, record.start
            ))
        })?;
        let gene_reads = read_count(alignments, &record.contig_id, record.start, record.end)?;
        Ok(ExpressionRecord {
            contig_id: record.contig_id.clone(),
            start: record.start,
            end: record.end,
            rpkm: rpkm(gene_reads, gene_length, total_depth)?,
        })
    }
}

/// RPKM for every `CDS` annotation, in annotation order.
pub fn transcript_levels(
    alignments: &mut dyn AlignmentSource,
    annotations: &mut dyn AnnotationSource,
) -> Result<Vec<ExpressionRecord>, AnalysisError> {
    ExpressionQuantifier::new().transcript_levels(alignments, annotations)
}

const TABLE_HEADER: &str = "contig\tstart\tend\trpkm\n";

/// Write the expression table as tab-separated values.
pub fn write_expression_table<W: Write>(
    writer: &mut W,
    records: &[ExpressionRecord],
) -> AnyResult<()> {
    writer.write_all(TABLE_HEADER.as_bytes())?;
    for record in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{:.2}",
            record.contig_id, record.start, record.end, record.rpkm
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{AlignedRead, InMemoryAlignments, InMemoryAnnotations};

    #[test]
    fn rpkm_matches_reference_value() {
        let value = rpkm(1953, 1301, 6167).unwrap();
        assert!((value - 243_417.05).abs() < 0.01, "rpkm {value}");
    }

    #[test]
    fn rpkm_guards_zero_denominators() {
        assert!(matches!(rpkm(10, 0, 100), Err(AnalysisError::DivisionByZero(_))));
        assert!(matches!(rpkm(10, 100, 0), Err(AnalysisError::DivisionByZero(_))));
        assert_eq!(rpkm(0, 100, 100).unwrap(), 0.0);
    }

    #[test]
    fn transcript_levels_filter_cds_in_order() {
        let reads = vec![
            AlignedRead::new("sample", 0, b"ACGTACGTAC".to_vec()),
            AlignedRead::new("sample", 5, b"ACGTACGTAC".to_vec()),
            AlignedRead::new("sample", 100, b"ACGTACGTAC".to_vec()),
            AlignedRead::new("sample", 500, b"ACGTACGTAC".to_vec()),
        ];
        let mut alignments = InMemoryAlignments::new(reads);
        let mut annotations = InMemoryAnnotations::new(vec![
            GeneRecord::new("sample", "gene", 0, 200),
            GeneRecord::new("sample", "CDS", 100, 200),
            GeneRecord::new("sample", "CDS", 0, 10),
        ]);

        let levels = transcript_levels(&mut alignments, &mut annotations).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!((levels[0].start, levels[0].end), (100, 200));
        assert_eq!((levels[1].start, levels[1].end), (0, 10));
        // 1 read / (0.1 kb * 4e-6 M)
        assert!((levels[0].rpkm - 2_500_000.0).abs() < 1e-6);
        // 2 reads / (0.01 kb * 4e-6 M)
        assert!((levels[1].rpkm - 50_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn transcript_levels_with_no_reads_divides_by_zero() {
        let mut alignments = InMemoryAlignments::new(Vec::new());
        let mut annotations =
            InMemoryAnnotations::new(vec![GeneRecord::new("sample", "CDS", 0, 10)]);
        assert!(matches!(
            transcript_levels(&mut alignments, &mut annotations),
            Err(AnalysisError::DivisionByZero(_))
        ));
    }

    #[test]
    fn inverted_feature_is_invalid() {
        let mut alignments =
            InMemoryAlignments::new(vec![AlignedRead::new("sample", 0, b"A".to_vec())]);
        let mut annotations =
            InMemoryAnnotations::new(vec![GeneRecord::new("sample", "CDS", 10, 5)]);
        assert!(matches!(
            transcript_levels(&mut alignments, &mut annotations),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn custom_feature_type_is_honored() {
        let mut alignments =
            InMemoryAlignments::new(vec![AlignedRead::new("sample", 0, b"ACGT".to_vec())]);
        let mut annotations = InMemoryAnnotations::new(vec![
            GeneRecord::new("sample", "CDS", 0, 4),
            GeneRecord::new("sample", "exon", 0, 4),
        ]);
        let levels = ExpressionQuantifier::new()
            .with_feature_type("exon")
            .transcript_levels(&mut alignments, &mut annotations)
            .unwrap();
        assert_eq!(levels.len(), 1);
    }

    #[test]
    fn config_feature_type_reaches_transcript_levels() {
        let mut alignments =
            InMemoryAlignments::new(vec![AlignedRead::new("sample", 0, b"ACGT".to_vec())]);
        let mut annotations = InMemoryAnnotations::new(vec![
            GeneRecord::new("sample", "CDS", 0, 4),
            GeneRecord::new("sample", "exon", 0, 2),
            GeneRecord::new("sample", "exon", 2, 4),
        ]);
        let config = AnalysisConfig::default().with_feature_type("exon");
        let quantifier = ExpressionQuantifier::from_config(&config).unwrap();
        assert_eq!(quantifier.feature_type(), "exon");

        let levels = quantifier
            .transcript_levels(&mut alignments, &mut annotations)
            .unwrap();
        let spans: Vec<_> = levels.iter().map(|level| (level.start, level.end)).collect();
        assert_eq!(spans, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn empty_config_feature_type_is_rejected() {
        let config = AnalysisConfig::default().with_feature_type("");
        assert!(matches!(
            ExpressionQuantifier::from_config(&config),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn expression_table_renders_tsv() {
        let records = vec![ExpressionRecord {
            contig_id: "sample".to_string(),
            start: 336,
            end: 1637,
            rpkm: 243_417.0512,
        }];
        let mut buffer = Vec::new();
        write_expression_table(&mut buffer, &records).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "contig\tstart\tend\trpkm\nsample\t336\t1637\t243417.05\n"
        );
    }
}
