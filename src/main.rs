use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genotyper::genomics::{
    select_reference, write_expression_table, write_vcf, BamAlignments, ExpressionQuantifier,
    FastaSequences, GffAnnotations, VariantCaller,
};
use genotyper::AnalysisConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "genotyper", about = "Pileup SNP calling and RPKM quantification")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call heterozygous and homozygous-alternate SNPs, printing VCF.
    Variants {
        /// Reference genome (FASTA).
        #[arg(long)]
        reference: PathBuf,
        /// Coordinate-sorted alignments (BAM).
        #[arg(long)]
        alignments: PathBuf,
        /// Reference sequence to call on (default: first in the FASTA).
        #[arg(long)]
        contig: Option<String>,
        /// First 0-based position of the pileup.
        #[arg(long)]
        region_start: Option<u32>,
        /// Last 0-based position of the pileup (inclusive).
        #[arg(long)]
        region_end: Option<u32>,
        /// Worker threads for pileup construction.
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Heterozygosity test threshold.
        #[arg(long, default_value_t = genotyper::DEFAULT_ALPHA)]
        alpha: f64,
    },
    /// Compute RPKM for annotated features, printing a TSV table.
    Expression {
        /// Coordinate-sorted, indexed alignments (BAM + BAI).
        #[arg(long)]
        alignments: PathBuf,
        /// Gene annotations (GFF3).
        #[arg(long)]
        annotations: PathBuf,
        /// Feature type to quantify.
        #[arg(long, default_value = genotyper::DEFAULT_FEATURE_TYPE)]
        feature_type: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Variants {
            reference,
            alignments,
            contig,
            region_start,
            region_end,
            threads,
            alpha,
        } => {
            let mut config = AnalysisConfig::default()
                .with_alpha(alpha)
                .with_threads(threads)
                .with_region(region_start, region_end);
            if let Some(contig) = contig {
                config = config.with_contig(contig);
            }
            run_variants(reference, alignments, config)?
        }
        Commands::Expression {
            alignments,
            annotations,
            feature_type,
        } => {
            let config = AnalysisConfig::default().with_feature_type(feature_type);
            run_expression(alignments, annotations, config)?
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_variants(
    reference_path: PathBuf,
    alignments_path: PathBuf,
    config: AnalysisConfig,
) -> Result<()> {
    let mut alignments = BamAlignments::from_path(&alignments_path).with_context(|| {
        format!("failed to open alignments {}", alignments_path.display())
    })?;
    let mut sequences = FastaSequences::from_path(&reference_path);

    let caller = VariantCaller::new(config).context("invalid analysis configuration")?;
    let reference = select_reference(&mut sequences, caller.config().contig.as_deref())
        .with_context(|| format!("failed to read reference from {}", reference_path.display()))?;

    let variants = caller
        .call_against(&mut alignments, &reference)
        .context("variant calling failed")?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    write_vcf(&mut writer, &reference, &variants)?;
    info!(calls = variants.len(), "wrote VCF");

    Ok(())
}

fn run_expression(
    alignments_path: PathBuf,
    annotations_path: PathBuf,
    config: AnalysisConfig,
) -> Result<()> {
    let mut alignments = BamAlignments::from_path(&alignments_path).with_context(|| {
        format!("failed to open alignments {}", alignments_path.display())
    })?;
    let mut annotations = GffAnnotations::from_path(&annotations_path);

    let quantifier =
        ExpressionQuantifier::from_config(&config).context("invalid analysis configuration")?;
    let levels = quantifier
        .transcript_levels(&mut alignments, &mut annotations)
        .with_context(|| {
            format!(
                "expression quantification failed for {}",
                annotations_path.display()
            )
        })?;

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    write_expression_table(&mut writer, &levels)?;
    info!(features = levels.len(), "wrote expression table");

    Ok(())
}
