//! Log-likelihood of a genotype given per-category read evidence.

use super::{
    gt::AlleleSupport,
    haplotype::StrHaplotype,
};
use crate::reads::ReadClass;
use crate::utils::math::log_sum_exp;
use arrayvec::ArrayVec;
use std::collections::BTreeMap;

/// Per-locus read evidence: histograms of observed unit counts for spanning
/// and flanking reads, and the number of in-repeat reads. The genotype
/// log-likelihood is a sum over reads, so it is invariant to read order by
/// construction.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    pub spanning: BTreeMap<i32, u32>,
    pub flanking: BTreeMap<i32, u32>,
    pub num_in_repeat: u32,
}

impl Evidence {
    pub fn new() -> Self {
        Evidence::default()
    }

    pub fn record(&mut self, class: ReadClass) {
        match class {
            ReadClass::Spanning(count) => {
                *self.spanning.entry(count as i32).or_insert(0) += 1;
            }
            ReadClass::Flanking(count) => {
                *self.flanking.entry(count as i32).or_insert(0) += 1;
            }
            ReadClass::InRepeat(_) => self.num_in_repeat += 1,
            ReadClass::Irrelevant => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spanning.is_empty() && self.flanking.is_empty() && self.num_in_repeat == 0
    }

    pub fn num_reads(&self) -> u32 {
        self.spanning.values().sum::<u32>()
            + self.flanking.values().sum::<u32>()
            + self.num_in_repeat
    }

    pub fn max_observed(&self) -> Option<i32> {
        let spanning = self.spanning.keys().next_back();
        let flanking = self.flanking.keys().next_back();
        spanning.max(flanking).copied()
    }
}

/// Shared model parameters for every genotype evaluated at a locus.
#[derive(Debug, Clone, Copy)]
pub struct GenotypeParams {
    /// Largest unit count one read can contain.
    pub max_units_in_read: i32,
    /// Probability a molecule is sized correctly.
    pub prop_correct: f64,
    /// Expected coverage per haplotype.
    pub hap_depth: f64,
    pub read_len: i32,
}

/// A candidate genotype of one or two haplotypes under evaluation.
pub struct StrGenotype {
    haplotypes: ArrayVec<StrHaplotype, 2>,
    params: GenotypeParams,
}

impl StrGenotype {
    pub fn haploid(params: GenotypeParams, num_units: i32) -> Self {
        let mut haplotypes = ArrayVec::new();
        haplotypes.push(StrHaplotype::new(
            num_units,
            params.max_units_in_read,
            params.prop_correct,
        ));
        StrGenotype { haplotypes, params }
    }

    pub fn diploid(params: GenotypeParams, num_units_hap1: i32, num_units_hap2: i32) -> Self {
        let mut haplotypes = ArrayVec::new();
        for num_units in [num_units_hap1, num_units_hap2] {
            haplotypes.push(StrHaplotype::new(
                num_units,
                params.max_units_in_read,
                params.prop_correct,
            ));
        }
        StrGenotype { haplotypes, params }
    }

    pub fn num_haplotypes(&self) -> usize {
        self.haplotypes.len()
    }

    pub fn unit_counts(&self) -> ArrayVec<i32, 2> {
        self.haplotypes.iter().map(|h| h.num_units()).collect()
    }

    /// Log-probability that a haplotype drawn uniformly produces exactly
    /// `num_units_in_read` units in a read.
    pub fn calc_spanning_loglik(&self, num_units_in_read: i32) -> f64 {
        let prior = -(self.haplotypes.len() as f64).ln();
        let terms: ArrayVec<f64, 2> = self
            .haplotypes
            .iter()
            .map(|hap| prior + hap.prop_molecules_at(num_units_in_read).ln())
            .collect();
        log_sum_exp(&terms)
    }

    /// Log-probability that a haplotype drawn uniformly produces at least
    /// `num_units_in_read` units in a read.
    pub fn calc_flanking_loglik(&self, num_units_in_read: i32) -> f64 {
        let prior = -(self.haplotypes.len() as f64).ln();
        let terms: ArrayVec<f64, 2> = self
            .haplotypes
            .iter()
            .map(|hap| prior + hap.prop_molecules_at_least(num_units_in_read).ln())
            .collect();
        log_sum_exp(&terms)
    }

    /// Expected number of in-repeat reads under this genotype: each
    /// haplotype expanded past the read capacity sheds reads at a rate
    /// proportional to the expansion length beyond one read.
    pub fn in_repeat_rate(&self) -> f64 {
        self.haplotypes
            .iter()
            .map(|hap| {
                let excess = (hap.num_units() - self.params.max_units_in_read + 1).max(0);
                self.params.hap_depth * excess as f64 / self.params.read_len as f64
            })
            .sum()
    }

    /// Total log-likelihood of the evidence plus the per-haplotype support
    /// counts the genotype is credited with.
    pub fn calc_loglik(&self, evidence: &Evidence) -> (f64, ArrayVec<AlleleSupport, 2>) {
        let mut support: ArrayVec<AlleleSupport, 2> =
            self.haplotypes.iter().map(|_| AlleleSupport::default()).collect();

        let mut loglik = 0.0;

        for (&count, &num_reads) in &evidence.spanning {
            loglik += num_reads as f64 * self.calc_spanning_loglik(count);
            // A spanning read supports the allele whose in-read count it
            // reproduces exactly.
            if let Some(index) = self
                .haplotypes
                .iter()
                .position(|hap| hap.units_in_read() == count)
            {
                support[index].spanning += num_reads;
            }
        }

        for (&count, &num_reads) in &evidence.flanking {
            loglik += num_reads as f64 * self.calc_flanking_loglik(count);
            // A flanking read supports the allele most likely to reach its
            // observed count; the first haplotype wins ties.
            let mut index = 0;
            for (i, hap) in self.haplotypes.iter().enumerate().skip(1) {
                if hap.prop_molecules_at_least(count)
                    > self.haplotypes[index].prop_molecules_at_least(count)
                {
                    index = i;
                }
            }
            support[index].flanking += num_reads;
        }

        let rate = self.in_repeat_rate();
        if evidence.num_in_repeat > 0 {
            loglik += evidence.num_in_repeat as f64 * rate.ln();
            // In-repeat reads support the most expanded haplotype, provided
            // it is long enough to shed them at all.
            let mut expanded: Option<usize> = None;
            for (i, hap) in self.haplotypes.iter().enumerate() {
                if hap.num_units() > self.params.max_units_in_read
                    && expanded.map_or(true, |e| {
                        hap.num_units() > self.haplotypes[e].num_units()
                    })
                {
                    expanded = Some(i);
                }
            }
            if let Some(index) = expanded {
                support[index].in_repeat += evidence.num_in_repeat;
            }
        }
        // The Poisson normalisation keeps totals comparable across
        // genotypes with different rates.
        loglik -= rate;

        (loglik, support)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenotypeParams {
        GenotypeParams {
            max_units_in_read: 30,
            prop_correct: 0.97,
            hap_depth: 30.0,
            read_len: 150,
        }
    }

    fn spanning(pairs: &[(i32, u32)]) -> Evidence {
        let mut evidence = Evidence::new();
        for &(count, num) in pairs {
            evidence.spanning.insert(count, num);
        }
        evidence
    }

    #[test]
    fn spanning_likelihood_mixes_both_haplotypes() {
        let genotype = StrGenotype::diploid(params(), 10, 20);
        let expected = (0.5 * 0.97_f64).ln();
        // Observation 10 is the exact size of haplotype 1 and essentially
        // impossible under haplotype 2.
        assert!((genotype.calc_spanning_loglik(10) - expected).abs() < 1e-6);
    }

    #[test]
    fn flanking_likelihood_uses_the_tail() {
        let genotype = StrGenotype::diploid(params(), 10, 20);
        // A flanking read with 5 units is compatible with both haplotypes.
        assert!(genotype.calc_flanking_loglik(5) > (0.9_f64).ln());
        // A flanking read with 15 units is compatible with hap 2 only.
        let loglik = genotype.calc_flanking_loglik(15);
        assert!(loglik < (0.6_f64).ln() && loglik > (0.4_f64).ln());
    }

    #[test]
    fn in_repeat_rate_counts_expanded_haplotypes_only() {
        let genotype = StrGenotype::diploid(params(), 10, 100);
        let expected = 30.0 * (100 - 30 + 1) as f64 / 150.0;
        assert!((genotype.in_repeat_rate() - expected).abs() < 1e-12);

        let unexpanded = StrGenotype::diploid(params(), 10, 20);
        assert_eq!(unexpanded.in_repeat_rate(), 0.0);
    }

    #[test]
    fn loglik_is_a_sum_over_reads() {
        let genotype = StrGenotype::haploid(params(), 10);
        let (single, _) = genotype.calc_loglik(&spanning(&[(10, 1)]));
        let (triple, _) = genotype.calc_loglik(&spanning(&[(10, 3)]));
        assert!((triple - 3.0 * single).abs() < 1e-9);
    }

    #[test]
    fn spanning_support_requires_an_exact_size_match() {
        let genotype = StrGenotype::haploid(params(), 10);
        let (_, support) = genotype.calc_loglik(&spanning(&[(10, 20), (11, 1)]));
        assert_eq!(support[0].spanning, 20);
    }

    #[test]
    fn in_repeat_support_goes_to_the_expanded_haplotype() {
        let genotype = StrGenotype::diploid(params(), 10, 100);
        let mut evidence = Evidence::new();
        evidence.num_in_repeat = 7;
        let (_, support) = genotype.calc_loglik(&evidence);
        assert_eq!(support[0].in_repeat, 0);
        assert_eq!(support[1].in_repeat, 7);
    }

    #[test]
    fn in_repeat_reads_with_zero_rate_sink_the_genotype() {
        let genotype = StrGenotype::diploid(params(), 10, 20);
        let mut evidence = Evidence::new();
        evidence.num_in_repeat = 3;
        let (loglik, _) = genotype.calc_loglik(&evidence);
        assert_eq!(loglik, f64::NEG_INFINITY);
    }

    #[test]
    fn empty_evidence_has_zero_loglik_for_unexpanded_genotypes() {
        let genotype = StrGenotype::diploid(params(), 0, 0);
        let (loglik, support) = genotype.calc_loglik(&Evidence::new());
        assert_eq!(loglik, 0.0);
        assert_eq!(support[0], AlleleSupport::default());
    }
}
