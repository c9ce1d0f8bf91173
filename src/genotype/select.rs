//! Candidate enumeration and maximum-likelihood genotype selection.

use super::{
    gt::{AlleleCall, GenotypeCall, Gt},
    likelihood::{Evidence, GenotypeParams, StrGenotype},
};
use crate::utils::{CancelToken, Ploidy};
use itertools::Itertools;

/// Candidate unit counts for a locus: every distinct spanning or flanking
/// observation plus a coarse grid above the largest one. In-repeat reads
/// push the grid to the locus's search bound, since the expansion they
/// signal is longer than any in-read observation.
pub fn enumerate_candidates(evidence: &Evidence, max_unit_count: i32) -> Vec<i32> {
    if evidence.is_empty() {
        return vec![0];
    }

    let mut candidates: Vec<i32> = evidence
        .spanning
        .keys()
        .chain(evidence.flanking.keys())
        .copied()
        .collect();

    let top = evidence.max_observed().unwrap_or(0);
    let bound = if evidence.num_in_repeat > 0 {
        max_unit_count.max(top)
    } else {
        max_unit_count.min(top + 5)
    };
    if bound > top {
        let step = ((bound - top) / 10).max(1);
        let mut count = top + step;
        while count < bound {
            candidates.push(count);
            count += step;
        }
        candidates.push(bound);
    }

    if candidates.is_empty() {
        candidates.push(0);
    }

    candidates.into_iter().sorted().dedup().collect()
}

/// Evaluates every genotype over `candidates` and returns the most likely
/// one. Ties go to the genotype with the smaller maximum count, then the
/// smaller minimum count. With no evidence at all, the zero-unit genotype
/// is returned with empty support.
pub fn find_most_likely_genotype(
    ploidy: Ploidy,
    params: GenotypeParams,
    evidence: &Evidence,
    candidates: &[i32],
    cancel: &CancelToken,
) -> GenotypeCall {
    assert!(ploidy != Ploidy::Zero, "Can't genotype repeats of zero ploidy");

    if evidence.is_empty() || candidates.is_empty() {
        let gt: Gt = (0..ploidy.num_alleles()).map(|_| AlleleCall::new(0)).collect();
        return GenotypeCall {
            gt,
            loglik: 0.0,
            margin: 0.0,
        };
    }

    let genotypes = enumerate_genotypes(ploidy, candidates);

    let mut best: Option<(Vec<i32>, f64, Gt)> = None;
    let mut runner_up: Option<f64> = None;

    for counts in genotypes {
        if cancel.is_cancelled() {
            break;
        }

        let genotype = match counts[..] {
            [hap] => StrGenotype::haploid(params, hap),
            [hap1, hap2] => StrGenotype::diploid(params, hap1, hap2),
            _ => unreachable!(),
        };
        let (loglik, support) = genotype.calc_loglik(evidence);

        let better = match &best {
            None => true,
            Some((best_counts, best_loglik, _)) => {
                loglik > *best_loglik
                    || (loglik == *best_loglik && prefer_on_tie(&counts, best_counts))
            }
        };

        if better {
            if let Some((_, loglik, _)) = &best {
                if runner_up.map_or(true, |r| *loglik > r) {
                    runner_up = Some(*loglik);
                }
            }
            let gt: Gt = counts
                .iter()
                .zip(&support)
                .map(|(&num_units, &support)| AlleleCall { num_units, support })
                .collect();
            best = Some((counts, loglik, gt));
        } else if runner_up.map_or(true, |r| loglik > r) {
            runner_up = Some(loglik);
        }
    }

    // Cancellation can fire before the first evaluation; the driver
    // discards the result either way.
    let Some((_, loglik, gt)) = best else {
        let gt: Gt = (0..ploidy.num_alleles()).map(|_| AlleleCall::new(0)).collect();
        return GenotypeCall {
            gt,
            loglik: 0.0,
            margin: 0.0,
        };
    };
    let margin = runner_up.map_or(0.0, |r| loglik - r);
    GenotypeCall { gt, loglik, margin }
}

fn enumerate_genotypes(ploidy: Ploidy, candidates: &[i32]) -> Vec<Vec<i32>> {
    match ploidy {
        Ploidy::One => candidates.iter().map(|&c| vec![c]).collect(),
        Ploidy::Two => {
            let mut genotypes = Vec::new();
            for (index, &hap1) in candidates.iter().enumerate() {
                for &hap2 in &candidates[index..] {
                    genotypes.push(vec![hap1, hap2]);
                }
            }
            genotypes
        }
        Ploidy::Zero => unreachable!(),
    }
}

fn prefer_on_tie(counts: &[i32], incumbent: &[i32]) -> bool {
    let max = counts.iter().max().unwrap();
    let incumbent_max = incumbent.iter().max().unwrap();
    if max != incumbent_max {
        return max < incumbent_max;
    }
    counts.iter().min().unwrap() < incumbent.iter().min().unwrap()
}
