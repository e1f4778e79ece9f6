#[path = "common/mod.rs"]
mod common;
use common::assert_snapshot;
use genotyper::genomics::{render_vcf, Allele, ReferenceSequence, Variant};

#[test]
fn render_vcf_matches_golden() {
    let reference = ReferenceSequence::new("chr1", b"ACGTACGTAC").expect("valid reference");
    let variants = vec![
        Variant::new(3, Allele::T, Allele::T),
        Variant::new(5, Allele::A, Allele::G),
        Variant::new(8, Allele::C, Allele::G),
    ];

    let actual = render_vcf(&reference, &variants).expect("VCF rendering should succeed");
    assert_snapshot("variants/simple.vcf", &actual);
}
