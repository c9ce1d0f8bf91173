//! Locus catalogue records and the per-locus sequence graph.

use crate::graphs::{Graph, Node, NodeId};
use crate::reads::LocusNodes;
use crate::utils::{
    open_catalog_reader, open_genome_reader, Error, GenomicRegion, Karyotype, Ploidy, Result,
};
use crossbeam_channel::Sender;
use rust_htslib::faidx;
use std::{collections::HashMap, io::BufRead, path::Path, sync::Arc};

#[derive(Debug)]
pub struct Locus {
    pub id: String,
    pub region: GenomicRegion,
    pub unit: String,
    pub ploidy: Ploidy,
    pub max_unit_count: i32,
    pub graph: Arc<Graph>,
    pub nodes: LocusNodes,
    /// Unit count spelled by the reference region, for reporting.
    pub ref_unit_count: i32,
}

impl Locus {
    pub fn new(
        genome_reader: &faidx::Reader,
        chrom_lengths: &HashMap<String, u32>,
        line: &str,
        flank_len: usize,
        karyotype: &Karyotype,
        default_max_unit_count: i32,
    ) -> Result<Self> {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [chrom, start, end, info] = columns[..] else {
            return Err(Error::Config(format!(
                "Expected 4 fields in the format 'chrom start end info', found {}: {}",
                columns.len(),
                line
            )));
        };

        let parse_bound = |bound: &str| {
            bound.parse::<u32>().map_err(|_| {
                Error::Config(format!("Coordinate '{}' is not a number: {}", bound, line))
            })
        };
        let region = GenomicRegion::new(chrom, parse_bound(start)?, parse_bound(end)?)?;
        validate_padded_region(&region, flank_len as u32, chrom_lengths)?;

        let ploidy = karyotype.ploidy_of(chrom)?;
        let fields = parse_locus_info(info)?;

        let require = |key: &str| {
            fields
                .get(key)
                .cloned()
                .ok_or_else(|| Error::Config(format!("{} field missing: {}", key, line)))
        };

        let id = require("ID")?;
        let unit = require("UNIT")?;
        let interruption = fields.get("INTERRUPTION").cloned();
        let max_unit_count = match fields.get("MAXCOUNT") {
            Some(value) => value.parse::<i32>().map_err(|_| {
                Error::Config(format!("Invalid MAXCOUNT '{}' for locus {}", value, id))
            })?,
            None => default_max_unit_count,
        };

        let (left_flank, right_flank) = fetch_flanks(genome_reader, &region, flank_len)?;
        let (graph, nodes) =
            build_locus_graph(&left_flank, &unit, interruption.as_deref(), &right_flank)?;

        let ref_unit_count = ((region.end - region.start) as usize / unit.len()) as i32;

        Ok(Locus {
            id,
            region,
            unit,
            ploidy,
            max_unit_count,
            graph: Arc::new(graph),
            nodes,
            ref_unit_count,
        })
    }
}

/// Builds the locus graph `left-flank -> (unit loop) -> right-flank`, with
/// an optional interruption node between two unit stretches. Skip edges
/// admit zero-unit paths around each repeat stretch.
fn build_locus_graph(
    left_flank: &str,
    unit: &str,
    interruption: Option<&str>,
    right_flank: &str,
) -> Result<(Graph, LocusNodes)> {
    match interruption {
        None => {
            let nodes = vec![
                Node::new(left_flank)?,
                Node::new(unit)?,
                Node::new(right_flank)?,
            ];
            let graph = Graph::new(nodes, &[(0, 1), (1, 1), (1, 2), (0, 2)])?;
            let nodes = LocusNodes {
                repeat_node: 1,
                left_nodes: vec![0],
                right_nodes: vec![2],
            };
            Ok((graph, nodes))
        }
        Some(interruption) => {
            let nodes = vec![
                Node::new(left_flank)?,
                Node::new(unit)?,
                Node::new(interruption)?,
                Node::new(unit)?,
                Node::new(right_flank)?,
            ];
            let edges: &[(NodeId, NodeId)] = &[
                (0, 1),
                (1, 1),
                (1, 2),
                (0, 2),
                (2, 3),
                (3, 3),
                (3, 4),
                (2, 4),
            ];
            let graph = Graph::new(nodes, edges)?;
            let nodes = LocusNodes {
                repeat_node: 1,
                left_nodes: vec![0],
                right_nodes: vec![4],
            };
            Ok((graph, nodes))
        }
    }
}

/// Chromosome lengths indexed by name, from the FASTA index.
pub fn chrom_lengths(genome: &faidx::Reader) -> Result<HashMap<String, u32>> {
    (0..genome.n_seqs() as i32)
        .map(|index| {
            let name = genome
                .seq_name(index)
                .map_err(|e| Error::Resource(e.to_string()))?;
            let length = u32::try_from(genome.fetch_seq_len(&name)).map_err(|_| {
                Error::Resource(format!("Chromosome {} is too long to index", name))
            })?;
            Ok((name, length))
        })
        .collect()
}

/// Streams catalogue records into `sender` in catalogue order, pairing each
/// with its index so the sink can restore ordering. Per-locus failures are
/// sent as errors and do not stop the stream.
pub fn stream_loci_into_channel(
    repeats_path: &Path,
    genome_path: &Path,
    flank_len: usize,
    max_unit_count: i32,
    karyotype: &Karyotype,
    sender: Sender<(usize, Result<Locus>)>,
) -> Result<()> {
    let catalog_reader = open_catalog_reader(repeats_path)?;
    let genome_reader = open_genome_reader(genome_path)?;
    let chrom_lengths = chrom_lengths(&genome_reader)?;

    for (index, result_line) in catalog_reader.lines().enumerate() {
        let locus = result_line
            .map_err(|e| Error::Resource(format!("Error at BED line {}: {}", index + 1, e)))
            .and_then(|line| {
                Locus::new(
                    &genome_reader,
                    &chrom_lengths,
                    &line,
                    flank_len,
                    karyotype,
                    max_unit_count,
                )
                .map_err(|e| Error::Config(format!("Error at BED line {}: {}", index + 1, e)))
            });
        sender
            .send((index, locus))
            .map_err(|_| Error::Internal("Locus channel closed unexpectedly".to_string()))?;
    }

    Ok(())
}

fn fetch_uppercase(
    genome: &faidx::Reader,
    contig: &str,
    start: usize,
    end: usize,
) -> Result<String> {
    match genome.fetch_seq_string(contig, start, end) {
        Ok(seq) => Ok(seq.to_uppercase()),
        Err(e) => Err(Error::Resource(format!(
            "Could not read {}:{}-{} from the reference: {}",
            contig, start, end, e
        ))),
    }
}

fn fetch_flanks(
    genome: &faidx::Reader,
    region: &GenomicRegion,
    flank_len: usize,
) -> Result<(String, String)> {
    let start = region.start as usize;
    let end = region.end as usize;
    let left = fetch_uppercase(genome, &region.contig, start - flank_len, start - 1)?;
    let right = fetch_uppercase(genome, &region.contig, end, end + flank_len - 1)?;
    Ok((left, right))
}

/// Parses `ID=..;UNIT=..` style locus annotations into a field table.
fn parse_locus_info(info: &str) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::new();
    for part in info.split(';') {
        let (name, value) = part
            .split_once('=')
            .filter(|(name, value)| !name.is_empty() && !value.is_empty())
            .ok_or_else(|| {
                Error::Config(format!("Locus annotation '{}' is not name=value", part))
            })?;
        if fields.insert(name.to_string(), value.to_string()).is_some() {
            return Err(Error::Config(format!(
                "Locus annotation repeats field {}",
                name
            )));
        }
    }
    Ok(fields)
}

/// The locus region padded by its flanks must fit inside the chromosome.
fn validate_padded_region(
    region: &GenomicRegion,
    flank_len: u32,
    chrom_lengths: &HashMap<String, u32>,
) -> Result<()> {
    let chrom_length = chrom_lengths.get(&region.contig).copied().ok_or_else(|| {
        Error::Config(format!(
            "Reference genome has no chromosome {}",
            region.contig
        ))
    })?;

    let fits_left = region.start.checked_sub(flank_len).is_some_and(|s| s >= 1);
    let fits_right = region
        .end
        .checked_add(flank_len)
        .is_some_and(|e| e <= chrom_length);
    if !fits_left || !fits_right {
        return Err(Error::Config(format!(
            "Locus {} with {} bp flanks does not fit inside chromosome {} (length {})",
            region, flank_len, region.contig, chrom_length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_locus_graph_has_str_shape() {
        let (graph, nodes) = build_locus_graph("TTAACC", "CAG", None, "GGTTAA").unwrap();
        assert_eq!(graph.num_nodes(), 3);
        assert!(graph.has_self_loop(nodes.repeat_node));
        assert!(graph.has_edge(0, 2));
        assert_eq!(nodes.left_nodes, vec![0]);
        assert_eq!(nodes.right_nodes, vec![2]);
    }

    #[test]
    fn interrupted_locus_graph_has_two_repeat_stretches() {
        let (graph, nodes) = build_locus_graph("TTAACC", "CAG", Some("CCACCG"), "GGTTAA").unwrap();
        assert_eq!(graph.num_nodes(), 5);
        assert!(graph.has_self_loop(1));
        assert!(graph.has_self_loop(3));
        assert_eq!(nodes.repeat_node, 1);
        assert_eq!(nodes.right_nodes, vec![4]);
    }

    #[test]
    fn invalid_unit_sequence_is_a_configuration_error() {
        let err = build_locus_graph("TTAACC", "CAU", None, "GGTTAA").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn locus_info_decodes_and_rejects_duplicates() {
        let fields = parse_locus_info("ID=HTT;UNIT=CAG").unwrap();
        assert_eq!(fields.get("ID").unwrap(), "HTT");
        assert_eq!(fields.get("UNIT").unwrap(), "CAG");
        assert!(parse_locus_info("ID=A;ID=B").is_err());
        assert!(parse_locus_info("ID").is_err());
        assert!(parse_locus_info("ID=").is_err());
    }

    #[test]
    fn padded_region_is_checked_against_the_chromosome() {
        let mut lengths = HashMap::new();
        lengths.insert("chr1".to_string(), 1000_u32);

        let region = GenomicRegion::new("chr1", 100, 200).unwrap();
        assert!(validate_padded_region(&region, 50, &lengths).is_ok());
        assert!(validate_padded_region(&region, 150, &lengths).is_err());

        let near_end = GenomicRegion::new("chr1", 900, 990).unwrap();
        assert!(validate_padded_region(&near_end, 50, &lengths).is_err());

        let unknown = GenomicRegion::new("chr9", 100, 200).unwrap();
        assert!(validate_padded_region(&unknown, 50, &lengths).is_err());
    }
}
