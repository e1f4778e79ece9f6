use anyhow::{anyhow, Result};
use std::io::Write;
use tracing::debug;

use super::{Allele, ReferenceSequence, Variant};

const HEADER: &str = "##fileformat=VCFv4.3\n##source=genotyper\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE\n";

/// ALT column and genotype for a call against its reference base.
fn alt_and_genotype(variant: &Variant, reference: Allele) -> (String, &'static str) {
    let Variant {
        allele_major: major,
        allele_minor: minor,
        ..
    } = *variant;

    if major == minor {
        return (major.to_string(), "1/1");
    }
    match (major == reference, minor == reference) {
        (true, _) => (minor.to_string(), "0/1"),
        (_, true) => (major.to_string(), "0/1"),
        _ => (format!("{major},{minor}"), "1/2"),
    }
}

/// Write variants as VCF, one sample column.
///
/// Calls touching a gap, in the reference or in either allele, have no SNP
/// encoding and are left out.
pub fn write_vcf<W: Write>(
    writer: &mut W,
    reference: &ReferenceSequence,
    variants: &[Variant],
) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;

    for variant in variants {
        let index = (variant.position as usize)
            .checked_sub(1)
            .ok_or_else(|| anyhow!("variant position must be 1-based, got 0"))?;
        let ref_base = reference.allele_at(index)?;
        if [ref_base, variant.allele_major, variant.allele_minor].contains(&Allele::Gap) {
            debug!(position = variant.position, "skipping gap call");
            continue;
        }
        let (alt, genotype) = alt_and_genotype(variant, ref_base);
        let line = format!(
            "{chrom}\t{pos}\t.\t{ref_base}\t{alt}\t.\tPASS\t.\tGT\t{genotype}\n",
            chrom = reference.name(),
            pos = variant.position,
        );
        writer.write_all(line.as_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

/// Render variants into a VCF string (useful for tests and snapshots).
pub fn render_vcf(reference: &ReferenceSequence, variants: &[Variant]) -> Result<String> {
    let mut buffer = Vec::new();
    write_vcf(&mut buffer, reference, variants)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered VCF is not valid UTF-8"))
}
