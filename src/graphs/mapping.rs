use super::operation::Operation;
use crate::utils::{Error, Result};

/// Alignment of a query window to one node's sequence: a reference start
/// offset on the node plus an ordered run of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    reference_start: usize,
    operations: Vec<Operation>,
}

impl Mapping {
    /// Decodes a node CIGAR like `2M1I3M` against the query window and the
    /// node sequence. `reference` must be the full node sequence; operations
    /// consume it starting at `reference_start`.
    pub fn from_cigar(reference_start: usize, cigar: &str, query: &str, reference: &str) -> Result<Self> {
        if reference_start > reference.len() {
            return Err(Error::Parse(format!(
                "Mapping start {} is past the node end {}",
                reference_start,
                reference.len()
            )));
        }

        let mut operations = Vec::new();
        let mut query_pos = 0;
        let mut ref_pos = reference_start;
        let mut chars = cigar.chars().peekable();

        while chars.peek().is_some() {
            let mut length = 0_usize;
            let mut has_digits = false;
            while let Some(c) = chars.peek().copied() {
                if let Some(digit) = c.to_digit(10) {
                    length = length
                        .checked_mul(10)
                        .and_then(|l| l.checked_add(digit as usize))
                        .ok_or_else(|| {
                            Error::Parse(format!("{} is a malformed CIGAR", cigar))
                        })?;
                    has_digits = true;
                    chars.next();
                } else {
                    break;
                }
            }
            let code = chars
                .next()
                .filter(|_| has_digits)
                .ok_or_else(|| Error::Parse(format!("{} is a malformed CIGAR", cigar)))?;

            let operation = Operation::new(code, length, &query[query_pos..], &reference[ref_pos..])
                .map_err(|e| Error::Parse(format!("{}: {}", cigar, e)))?;
            query_pos += operation.query_len();
            ref_pos += operation.reference_len();
            operations.push(operation);
        }

        if operations.is_empty() {
            return Err(Error::Parse(format!("{} is an empty CIGAR", cigar)));
        }

        Ok(Mapping {
            reference_start,
            operations,
        })
    }

    pub fn new(reference_start: usize, operations: Vec<Operation>) -> Self {
        Mapping {
            reference_start,
            operations,
        }
    }

    pub fn reference_start(&self) -> usize {
        self.reference_start
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn query_span(&self) -> usize {
        self.operations.iter().map(|op| op.query_len()).sum()
    }

    pub fn reference_span(&self) -> usize {
        self.operations.iter().map(|op| op.reference_len()).sum()
    }

    pub fn num_matches(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Match(_)))
            .map(|op| op.len())
            .sum()
    }

    pub fn num_mismatches(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Mismatch { .. }))
            .map(|op| op.len())
            .sum()
    }

    /// Query bases consumed by match or mismatch operations; insertions and
    /// clips do not count as aligned bases.
    pub fn num_aligned_bases(&self) -> usize {
        self.num_matches() + self.num_mismatches()
    }

    pub fn num_clipped(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::SoftClip(_)))
            .map(|op| op.len())
            .sum()
    }

    /// The full query window of this mapping, clips and insertions included.
    pub fn query(&self) -> String {
        self.operations.iter().map(|op| op.query()).collect()
    }

    pub fn reference(&self) -> String {
        self.operations.iter().map(|op| op.reference()).collect()
    }

    pub fn cigar(&self) -> String {
        self.operations.iter().map(|op| op.to_string()).collect()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_typical_node_cigar() {
        let mapping = Mapping::from_cigar(1, "2M1I3M", "ATTCGA", "CATCGAC").unwrap();
        assert_eq!(mapping.reference_start(), 1);
        assert_eq!(mapping.query_span(), 6);
        assert_eq!(mapping.reference_span(), 5);
        assert_eq!(mapping.num_matches(), 5);
        assert_eq!(mapping.cigar(), "2M1I3M");
        assert_eq!(mapping.query(), "ATTCGA");
        assert_eq!(mapping.reference(), "ATCGA");
    }

    #[test]
    fn decode_cigar_with_all_consuming_ops() {
        // query: AC + GG(ins) + T, reference: AC + A(del) + T
        let mapping = Mapping::from_cigar(0, "2M2I1D1M", "ACGGT", "ACAT").unwrap();
        assert_eq!(mapping.query_span(), 5);
        assert_eq!(mapping.reference_span(), 4);
        assert_eq!(mapping.num_aligned_bases(), 3);
    }

    #[test]
    fn cigar_without_length_is_rejected() {
        assert!(Mapping::from_cigar(0, "M", "A", "A").is_err());
    }

    #[test]
    fn cigar_with_trailing_digits_is_rejected() {
        assert!(Mapping::from_cigar(0, "2M3", "AC", "AC").is_err());
    }

    #[test]
    fn cigar_overrunning_node_is_rejected() {
        let err = Mapping::from_cigar(0, "5M", "ACGTA", "ACG").unwrap_err();
        assert!(err.to_string().contains("5M"));
    }

    #[test]
    fn mapping_start_past_node_end_is_rejected() {
        assert!(Mapping::from_cigar(4, "1M", "A", "ACG").is_err());
    }

    #[test]
    fn soft_clips_count_toward_query_span_only() {
        let mapping = Mapping::from_cigar(0, "2S3M", "GGACG", "ACGT").unwrap();
        assert_eq!(mapping.query_span(), 5);
        assert_eq!(mapping.reference_span(), 3);
        assert_eq!(mapping.num_clipped(), 2);
    }
}
