//! Per-locus analysis: read extraction, graph alignment, classification,
//! and genotype selection.

use crate::genotype::{
    enumerate_candidates, find_most_likely_genotype, Evidence, GenotypeCall, GenotypeParams,
};
use crate::graphs::{AlignScoring, GraphAligner};
use crate::locus::Locus;
use crate::reads::{classify_read, ReadClass, ShortRead};
use crate::utils::{CancelToken, Error, Ploidy, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_htslib::bam::{self, Read, Record};

pub struct Params {
    pub search_flank_len: usize,
    pub read_len: usize,
    pub prop_correct: f64,
    pub hap_depth: f64,
    pub max_depth: usize,
    pub min_match_frac: f64,
    pub scoring: AlignScoring,
}

#[derive(Debug)]
pub struct LocusResult {
    pub call: Option<GenotypeCall>,
    pub evidence: Evidence,
    pub num_reads: usize,
}

impl LocusResult {
    pub fn empty() -> LocusResult {
        LocusResult {
            call: None,
            evidence: Evidence::new(),
            num_reads: 0,
        }
    }
}

pub fn analyze_str(
    locus: &Locus,
    params: &Params,
    bam: &mut bam::IndexedReader,
    cancel: &CancelToken,
) -> Result<LocusResult> {
    if locus.ploidy == Ploidy::Zero {
        return Ok(LocusResult::empty());
    }

    let mut reads = extract_reads(locus, bam, params)?;
    log::debug!("{}: Collected {} reads", locus.id, reads.len());

    let unit_len = locus.unit.len();
    let aligner = GraphAligner::new(locus.graph.clone(), params.scoring);

    let mut evidence = Evidence::new();
    let mut num_aligned = 0;
    for read in reads.iter_mut() {
        if cancel.is_cancelled() {
            return Ok(LocusResult::empty());
        }

        let class = match aligner.align(read.bases())? {
            Some(mapping) => {
                read.set_canonical_mapping(mapping)?;
                num_aligned += 1;
                classify_read(
                    read.canonical_mapping()?,
                    &locus.nodes,
                    read.len(),
                    unit_len,
                    read.mate().maps_near_locus,
                    params.min_match_frac,
                )
            }
            None => ReadClass::Irrelevant,
        };
        evidence.record(class);
    }
    log::debug!(
        "{}: {} of {} reads aligned, {} informative",
        locus.id,
        num_aligned,
        reads.len(),
        evidence.num_reads()
    );

    let genotype_params = GenotypeParams {
        max_units_in_read: (params.read_len / unit_len) as i32,
        prop_correct: params.prop_correct,
        hap_depth: params.hap_depth,
        read_len: params.read_len as i32,
    };

    let candidates = enumerate_candidates(&evidence, locus.max_unit_count);
    log::debug!("{}: Evaluating {} candidate counts", locus.id, candidates.len());

    let call = find_most_likely_genotype(
        locus.ploidy,
        genotype_params,
        &evidence,
        &candidates,
        cancel,
    );
    if cancel.is_cancelled() {
        return Ok(LocusResult::empty());
    }

    Ok(LocusResult {
        call: Some(call),
        evidence,
        num_reads: reads.len(),
    })
}

fn extract_reads(
    locus: &Locus,
    bam: &mut bam::IndexedReader,
    params: &Params,
) -> Result<Vec<ShortRead>> {
    let flank_len = params.search_flank_len as u32;
    let reservoir_threshold = params.max_depth * 3;

    let extraction_region = (
        locus.region.contig.as_str(),
        locus.region.start.saturating_sub(flank_len),
        locus.region.end + flank_len,
    );

    let mut reads = Vec::new();
    if let Err(msg) = bam.fetch(extraction_region) {
        log::warn!("{}: Fetch error: {}", locus.id, msg);
        return Ok(reads);
    }

    let mut n_reads = 0;
    let mut record = Record::new();
    while n_reads < reservoir_threshold {
        match bam.read(&mut record) {
            Some(Ok(_)) => {
                if record.is_supplementary() || record.is_secondary() {
                    continue;
                }
                match ShortRead::from_hts_rec(&record, &locus.region, flank_len) {
                    Ok(read) => reads.push(read),
                    Err(err) => {
                        log::error!("{}: {}", locus.id, err);
                        continue;
                    }
                }
                n_reads += 1;
            }
            Some(Err(err)) => return Err(Error::Resource(err.to_string())),
            None => break,
        }
    }

    // More reads available with the reservoir full: sample uniformly so the
    // evidence stays depth-bounded without positional bias.
    if n_reads >= reservoir_threshold {
        log::warn!("{}: Reservoir sampling reads", locus.id);
        let mut rng = StdRng::seed_from_u64(42);

        while let Some(result) = bam.read(&mut record) {
            match result {
                Ok(_) => {
                    if record.is_supplementary() || record.is_secondary() {
                        continue;
                    }
                    let j = rng.gen_range(0..n_reads);
                    if j < reservoir_threshold {
                        match ShortRead::from_hts_rec(&record, &locus.region, flank_len) {
                            Ok(read) => reads[j] = read,
                            Err(err) => {
                                log::error!("{}: {}", locus.id, err);
                                continue;
                            }
                        }
                    }
                    n_reads += 1;
                }
                Err(err) => return Err(Error::Resource(err.to_string())),
            }
        }
    }

    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::{Graph, Node};
    use crate::reads::LocusNodes;
    use crate::utils::GenomicRegion;
    use std::sync::Arc;

    fn test_locus() -> Locus {
        let nodes = vec![
            Node::new("TTAACC").unwrap(),
            Node::new("CAG").unwrap(),
            Node::new("GGTTAA").unwrap(),
        ];
        let graph = Graph::new(nodes, &[(0, 1), (1, 1), (1, 2), (0, 2)]).unwrap();
        Locus {
            id: "TEST".to_string(),
            region: GenomicRegion::new("chr1", 100, 112).unwrap(),
            unit: "CAG".to_string(),
            ploidy: Ploidy::Two,
            max_unit_count: 100,
            graph: Arc::new(graph),
            nodes: LocusNodes {
                repeat_node: 1,
                left_nodes: vec![0],
                right_nodes: vec![2],
            },
            ref_unit_count: 4,
        }
    }

    fn test_params() -> Params {
        Params {
            search_flank_len: 6,
            read_len: 12,
            prop_correct: 0.97,
            hap_depth: 30.0,
            max_depth: 250,
            min_match_frac: 0.7,
            scoring: AlignScoring::default(),
        }
    }

    fn classify_and_genotype(reads: &mut [ShortRead], locus: &Locus, params: &Params) -> GenotypeCall {
        let aligner = GraphAligner::new(locus.graph.clone(), params.scoring);
        let mut evidence = Evidence::new();
        for read in reads.iter_mut() {
            let class = match aligner.align(read.bases()).unwrap() {
                Some(mapping) => {
                    read.set_canonical_mapping(mapping).unwrap();
                    classify_read(
                        read.canonical_mapping().unwrap(),
                        &locus.nodes,
                        read.len(),
                        locus.unit.len(),
                        read.mate().maps_near_locus,
                        params.min_match_frac,
                    )
                }
                None => ReadClass::Irrelevant,
            };
            evidence.record(class);
        }

        let genotype_params = GenotypeParams {
            max_units_in_read: (params.read_len / locus.unit.len()) as i32,
            prop_correct: params.prop_correct,
            hap_depth: params.hap_depth,
            read_len: params.read_len as i32,
        };
        let candidates = enumerate_candidates(&evidence, locus.max_unit_count);
        find_most_likely_genotype(
            locus.ploidy,
            genotype_params,
            &evidence,
            &candidates,
            &CancelToken::new(),
        )
    }

    #[test]
    fn spanning_reads_yield_the_expected_diploid_call() {
        let locus = test_locus();
        let params = test_params();

        // Ten reads spanning two units and ten spanning three.
        let mut reads = Vec::new();
        for index in 0..10 {
            reads.push(
                ShortRead::new(format!("frag{}", index), "ACCCAGCAGGGT", "IIIIIIIIIIII").unwrap(),
            );
            reads.push(
                ShortRead::new(format!("long{}", index), "ACCCAGCAGCAGGGT", "IIIIIIIIIIIIIII")
                    .unwrap(),
            );
        }

        let call = classify_and_genotype(&mut reads, &locus, &params);
        let counts: Vec<i32> = call.gt.iter().map(|a| a.num_units).collect();
        assert_eq!(counts, vec![2, 3]);
        assert_eq!(call.gt[0].support.spanning, 10);
        assert_eq!(call.gt[1].support.spanning, 10);
    }

    #[test]
    fn no_reads_yield_the_zero_call() {
        let locus = test_locus();
        let params = test_params();
        let call = classify_and_genotype(&mut [], &locus, &params);
        let counts: Vec<i32> = call.gt.iter().map(|a| a.num_units).collect();
        assert_eq!(counts, vec![0, 0]);
    }
}
