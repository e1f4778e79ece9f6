use statrs::distribution::{Binomial, Discrete, DiscreteCDF};
use statrs::function::beta::beta_reg;

use crate::{AnalysisError, DEFAULT_ALPHA};

/// Relative tolerance when comparing outcome probabilities to the observed one.
const PMF_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Exact two-sided binomial test.
///
/// Sums the probabilities of every outcome that is at most as likely as
/// observing `successes` out of `trials` at success probability `p`.
pub fn binomial_test(successes: u64, trials: u64, p: f64) -> Result<f64, AnalysisError> {
    if successes > trials {
        return Err(AnalysisError::InvalidInput(format!(
            "{successes} successes exceed {trials} trials"
        )));
    }
    if trials == 0 {
        return Ok(1.0);
    }
    let dist = Binomial::new(p, trials)
        .map_err(|err| AnalysisError::InvalidInput(format!("binomial parameters: {err}")))?;

    let expected = p * trials as f64;
    let observed = successes as f64;
    if observed == expected {
        return Ok(1.0);
    }

    let threshold = dist.pmf(successes) * (1.0 + PMF_RELATIVE_TOLERANCE);
    let p_value = if observed < expected {
        // Upper tail outcomes no more likely than the observation.
        let upper_tail = (expected.ceil() as u64..=trials)
            .filter(|&k| dist.pmf(k) <= threshold)
            .count() as u64;
        let upper = match upper_tail {
            0 => 0.0,
            n => match trials.checked_sub(n) {
                Some(boundary) => dist.sf(boundary),
                None => 1.0,
            },
        };
        dist.cdf(successes) + upper
    } else {
        let lower_tail = (0..=expected.floor() as u64)
            .filter(|&k| dist.pmf(k) <= threshold)
            .count() as u64;
        let lower = match lower_tail {
            0 => 0.0,
            n => dist.cdf(n - 1),
        };
        lower + dist.sf(successes - 1)
    };

    Ok(p_value.min(1.0))
}

/// Heterozygosity test with a configurable rejection threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeterozygosityTest {
    alpha: f64,
}

impl Default for HeterozygosityTest {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl HeterozygosityTest {
    /// Create a test rejecting splits whose p-value falls below `alpha`.
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Rejection threshold.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// P-value of the major/minor split under a 50/50 allele balance.
    ///
    /// Agrees with `binomial_test(major, major + minor, 0.5)`. The fair coin
    /// is symmetric, so the p-value is twice the tail below the rarer count.
    pub fn p_value(&self, major_count: u32, minor_count: u32) -> f64 {
        let trials = major_count as f64 + minor_count as f64;
        let rarer = major_count.min(minor_count) as f64;
        if 2.0 * rarer >= trials {
            return 1.0;
        }
        // P(X <= rarer) = I_0.5(trials - rarer, rarer + 1); both arguments are positive here.
        let tail = beta_reg(trials - rarer, rarer + 1.0, 0.5);
        (2.0 * tail).min(1.0)
    }

    /// Whether the split is consistent with a heterozygous site.
    ///
    /// A site with no minor allele evidence is never heterozygous.
    pub fn is_plausible(&self, major_count: u32, minor_count: u32) -> bool {
        if minor_count == 0 {
            return false;
        }
        self.p_value(major_count, minor_count) >= self.alpha
    }
}

/// Whether a major/minor split passes the heterozygosity test at p >= 0.10.
pub fn is_heterozygous_plausible(major_count: u32, minor_count: u32) -> bool {
    HeterozygosityTest::default().is_plausible(major_count, minor_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn approx(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-7
    }

    #[test_case(8, 12, 794.0 / 2048.0 ; "eight of twelve")]
    #[test_case(4, 12, 794.0 / 2048.0 ; "four of twelve")]
    #[test_case(0, 5, 2.0 / 32.0 ; "none of five")]
    #[test_case(5, 5, 2.0 / 32.0 ; "all of five")]
    #[test_case(3, 6, 1.0 ; "balanced")]
    #[test_case(1, 1, 1.0 ; "single trial")]
    fn fair_coin_p_values(successes: u64, trials: u64, expected: f64) {
        let p_value = binomial_test(successes, trials, 0.5).unwrap();
        assert!(
            approx(p_value, expected),
            "p-value {p_value} != {expected}"
        );
    }

    #[test]
    fn skewed_probability_sums_both_tails() {
        // n = 3, p = 0.25: pmf = [27, 27, 9, 1] / 64; observing 2 keeps outcomes 2 and 3.
        let p_value = binomial_test(2, 3, 0.25).unwrap();
        assert!(approx(p_value, 10.0 / 64.0), "p-value {p_value}");
        // Observing 0 keeps outcomes 0, 1 (equally likely), 2 and 3.
        let p_value = binomial_test(0, 3, 0.25).unwrap();
        assert!(approx(p_value, 1.0), "p-value {p_value}");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(binomial_test(4, 3, 0.5).is_err());
        assert!(binomial_test(1, 3, 1.5).is_err());
        assert_eq!(binomial_test(0, 0, 0.5).unwrap(), 1.0);
    }

    #[test]
    fn eight_four_split_is_plausible() {
        assert!(is_heterozygous_plausible(8, 4));
    }

    #[test]
    fn strongly_skewed_split_is_rejected() {
        // 2 * P(X <= 2 | n = 20) ~= 0.0004
        assert!(!is_heterozygous_plausible(18, 2));
    }

    #[test]
    fn missing_minor_allele_is_never_plausible() {
        for major in 1..10 {
            assert!(!is_heterozygous_plausible(major, 0));
        }
    }

    #[test]
    fn custom_alpha_changes_decision() {
        // p-value of 9/3 is 2 * 299 / 4096 ~= 0.146
        assert!(HeterozygosityTest::new(0.10).is_plausible(9, 3));
        assert!(!HeterozygosityTest::new(0.20).is_plausible(9, 3));
    }

    #[test]
    fn fair_coin_p_value_agrees_with_exact_test() {
        let test = HeterozygosityTest::default();
        for trials in 0..=80u32 {
            for major in 0..=trials {
                let expected = binomial_test(major as u64, trials as u64, 0.5).unwrap();
                let actual = test.p_value(major, trials - major);
                assert!(
                    (actual - expected).abs() < 1e-9,
                    "{major}/{trials}: {actual} != {expected}"
                );
            }
        }
    }
}
