//! Short reads extracted from the alignment stream around a locus.

use crate::graphs::GraphMapping;
use crate::utils::{Error, GenomicRegion, Result};
use rust_htslib::bam;
use std::str;

/// Mate-pair evidence carried alongside a read; used to decide whether an
/// in-repeat read plausibly originates from the locus.
#[derive(Debug, Clone, Default)]
pub struct MateInfo {
    pub is_paired: bool,
    /// The mate maps to the same contig within the extraction window.
    pub maps_near_locus: bool,
    pub insert_size: Option<i64>,
}

/// One read: fragment id, bases, per-base qualities, optional mate
/// evidence, and at most one canonical graph mapping.
#[derive(Debug, Clone)]
pub struct ShortRead {
    id: String,
    bases: String,
    quals: String,
    mate: MateInfo,
    canonical_mapping: Option<GraphMapping>,
}

impl ShortRead {
    pub fn new(id: impl Into<String>, bases: impl Into<String>, quals: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let bases = bases.into();
        let quals = quals.into();
        if bases.len() != quals.len() {
            return Err(Error::Parse(format!(
                "Read {} has {} bases but {} quality values",
                id,
                bases.len(),
                quals.len()
            )));
        }
        Ok(ShortRead {
            id,
            bases,
            quals,
            mate: MateInfo::default(),
            canonical_mapping: None,
        })
    }

    /// Builds a read from an HTSlib record fetched around `region`. The mate
    /// is considered near the locus when it maps to the same contig within
    /// `window` bases of the region.
    pub fn from_hts_rec(rec: &bam::Record, region: &GenomicRegion, window: u32) -> Result<Self> {
        let id = str::from_utf8(rec.qname())
            .map_err(|_| Error::Parse("Read name is not valid UTF-8".to_string()))?
            .to_string();
        let bases = String::from_utf8(rec.seq().as_bytes())
            .map_err(|_| Error::Parse(format!("Read {} has non-ASCII bases", id)))?
            .to_uppercase();
        let quals: String = rec.qual().iter().map(|&q| (q.min(60) + 33) as char).collect();

        let mate = if rec.is_paired() {
            let same_contig = rec.mtid() == rec.tid() && rec.mtid() >= 0;
            let mate_pos = rec.mpos();
            let lo = region.start.saturating_sub(window) as i64;
            let hi = (region.end + window) as i64;
            MateInfo {
                is_paired: true,
                maps_near_locus: same_contig && mate_pos >= lo && mate_pos <= hi,
                insert_size: Some(rec.insert_size()),
            }
        } else {
            MateInfo::default()
        };

        let mut read = ShortRead::new(id, bases, quals)?;
        read.mate = mate;
        Ok(read)
    }

    pub fn fragment_id(&self) -> &str {
        &self.id
    }

    pub fn bases(&self) -> &str {
        &self.bases
    }

    pub fn quals(&self) -> &str {
        &self.quals
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn mate(&self) -> &MateInfo {
        &self.mate
    }

    pub fn set_mate(&mut self, mate: MateInfo) {
        self.mate = mate;
    }

    /// Attaches the canonical mapping; a read is mapped at most once.
    pub fn set_canonical_mapping(&mut self, mapping: GraphMapping) -> Result<()> {
        if self.canonical_mapping.is_some() {
            return Err(Error::Internal(format!(
                "Read {} already has a canonical mapping",
                self.id
            )));
        }
        self.canonical_mapping = Some(mapping);
        Ok(())
    }

    pub fn canonical_mapping(&self) -> Result<&GraphMapping> {
        self.canonical_mapping.as_ref().ok_or_else(|| {
            Error::Internal(format!("Read {} has no canonical mapping", self.id))
        })
    }

    pub fn has_canonical_mapping(&self) -> bool {
        self.canonical_mapping.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::{AlignScoring, Graph, GraphAligner, Node};
    use std::sync::Arc;

    #[test]
    fn read_with_core_info_is_created() {
        let read = ShortRead::new("frag1", "ATTC", "????").unwrap();
        assert_eq!(read.fragment_id(), "frag1");
        assert_eq!(read.bases(), "ATTC");
        assert_eq!(read.quals(), "????");
    }

    #[test]
    fn bases_and_quals_of_unequal_length_fail() {
        assert!(ShortRead::new("frag1", "ATT", "?").is_err());
    }

    #[test]
    fn canonical_mapping_is_set_at_most_once() {
        let nodes = vec![Node::new("ATTC").unwrap()];
        let graph = Arc::new(Graph::new(nodes, &[]).unwrap());
        let aligner = GraphAligner::new(graph, AlignScoring::default());
        let mapping = aligner.align("ATTC").unwrap().unwrap();

        let mut read = ShortRead::new("frag1", "ATTC", "????").unwrap();
        assert!(!read.has_canonical_mapping());
        read.set_canonical_mapping(mapping.clone()).unwrap();
        assert!(read.set_canonical_mapping(mapping).is_err());
    }

    #[test]
    fn unset_canonical_mapping_is_an_error() {
        let read = ShortRead::new("frag1", "ATTC", "????").unwrap();
        assert!(read.canonical_mapping().is_err());
    }
}
