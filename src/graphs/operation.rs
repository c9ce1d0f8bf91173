use crate::utils::{Error, Result};
use std::fmt;

/// One aligned operation between a query window and a node sequence.
///
/// The CIGAR codes are {M, X, I, D, S, N} where `M` is an exact match and
/// `X` a mismatch. This follows the graph-CIGAR wire format of existing STR
/// pipelines and deliberately diverges from SAM, where `M` may hide
/// mismatches. `N` marks missing query bases that align to reference bases
/// at zero penalty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Match(String),
    Mismatch { query: String, reference: String },
    Insertion(String),
    Deletion(String),
    SoftClip(String),
    Missing { query: String, reference: String },
}

impl Operation {
    /// Builds an operation from a CIGAR code and the query and reference
    /// windows it consumes, validating the windows against the code.
    pub fn new(code: char, length: usize, query: &str, reference: &str) -> Result<Self> {
        if length == 0 {
            return Err(Error::Parse(format!(
                "Operation {} must have positive length",
                code
            )));
        }

        let query_len = if consumes_query(code) { length } else { 0 };
        let ref_len = if consumes_reference(code) { length } else { 0 };
        if query.len() < query_len {
            return Err(Error::Parse(format!(
                "Operation {}{} overruns the query",
                length, code
            )));
        }
        if reference.len() < ref_len {
            return Err(Error::Parse(format!(
                "Operation {}{} overruns the reference",
                length, code
            )));
        }
        let query = &query[..query_len];
        let reference = &reference[..ref_len];

        match code {
            'M' => {
                if query != reference {
                    return Err(Error::Parse(format!(
                        "Match operation over unequal sequences {} and {}",
                        query, reference
                    )));
                }
                Ok(Operation::Match(query.to_string()))
            }
            'X' => {
                let all_differ = query
                    .chars()
                    .zip(reference.chars())
                    .all(|(q, r)| q != r);
                if !all_differ {
                    return Err(Error::Parse(format!(
                        "Mismatch operation over equal bases in {} and {}",
                        query, reference
                    )));
                }
                Ok(Operation::Mismatch {
                    query: query.to_string(),
                    reference: reference.to_string(),
                })
            }
            'I' => Ok(Operation::Insertion(query.to_string())),
            'D' => Ok(Operation::Deletion(reference.to_string())),
            'S' => Ok(Operation::SoftClip(query.to_string())),
            'N' => {
                let n_in_every_pair = query
                    .chars()
                    .zip(reference.chars())
                    .all(|(q, r)| q == 'N' || r == 'N');
                if !n_in_every_pair {
                    return Err(Error::Parse(format!(
                        "Missing-bases operation without N over {} and {}",
                        query, reference
                    )));
                }
                Ok(Operation::Missing {
                    query: query.to_string(),
                    reference: reference.to_string(),
                })
            }
            _ => Err(Error::Parse(format!("Unknown operation code {}", code))),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Operation::Match(_) => 'M',
            Operation::Mismatch { .. } => 'X',
            Operation::Insertion(_) => 'I',
            Operation::Deletion(_) => 'D',
            Operation::SoftClip(_) => 'S',
            Operation::Missing { .. } => 'N',
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Operation::Match(seq) => seq.len(),
            Operation::Mismatch { query, .. } => query.len(),
            Operation::Insertion(seq) => seq.len(),
            Operation::Deletion(seq) => seq.len(),
            Operation::SoftClip(seq) => seq.len(),
            Operation::Missing { query, .. } => query.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query_len(&self) -> usize {
        match self {
            Operation::Match(_)
            | Operation::Mismatch { .. }
            | Operation::Insertion(_)
            | Operation::SoftClip(_)
            | Operation::Missing { .. } => self.len(),
            Operation::Deletion(_) => 0,
        }
    }

    pub fn reference_len(&self) -> usize {
        match self {
            Operation::Match(_) | Operation::Mismatch { .. } | Operation::Missing { .. } => {
                self.len()
            }
            Operation::Deletion(_) => self.len(),
            Operation::Insertion(_) | Operation::SoftClip(_) => 0,
        }
    }

    /// The query bases this operation consumes; empty for deletions.
    pub fn query(&self) -> &str {
        match self {
            Operation::Match(seq) => seq,
            Operation::Mismatch { query, .. } => query,
            Operation::Insertion(seq) => seq,
            Operation::SoftClip(seq) => seq,
            Operation::Missing { query, .. } => query,
            Operation::Deletion(_) => "",
        }
    }

    /// The reference bases this operation consumes; empty for insertions
    /// and soft-clips.
    pub fn reference(&self) -> &str {
        match self {
            Operation::Match(seq) => seq,
            Operation::Mismatch { reference, .. } => reference,
            Operation::Deletion(seq) => seq,
            Operation::Missing { reference, .. } => reference,
            Operation::Insertion(_) | Operation::SoftClip(_) => "",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len(), self.code())
    }
}

fn consumes_query(code: char) -> bool {
    matches!(code, 'M' | 'X' | 'I' | 'S' | 'N')
}

fn consumes_reference(code: char) -> bool {
    matches!(code, 'M' | 'X' | 'D' | 'N')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_operation_requires_equal_windows() {
        let op = Operation::new('M', 4, "ACGTAA", "ACGTCC").unwrap();
        assert_eq!(op, Operation::Match("ACGT".to_string()));
        assert_eq!(op.query_len(), 4);
        assert_eq!(op.reference_len(), 4);
        assert!(Operation::new('M', 4, "ACGA", "ACGT").is_err());
    }

    #[test]
    fn mismatch_operation_requires_differing_bases() {
        let op = Operation::new('X', 2, "AC", "CA").unwrap();
        assert_eq!(op.code(), 'X');
        assert!(Operation::new('X', 2, "AC", "AG").is_err());
    }

    #[test]
    fn insertion_consumes_query_only() {
        let op = Operation::new('I', 3, "ACGT", "").unwrap();
        assert_eq!(op.query(), "ACG");
        assert_eq!(op.query_len(), 3);
        assert_eq!(op.reference_len(), 0);
    }

    #[test]
    fn deletion_consumes_reference_only() {
        let op = Operation::new('D', 2, "", "ACGT").unwrap();
        assert_eq!(op.reference(), "AC");
        assert_eq!(op.query_len(), 0);
        assert_eq!(op.reference_len(), 2);
    }

    #[test]
    fn missing_bases_require_n_on_either_side() {
        let op = Operation::new('N', 2, "NN", "AC").unwrap();
        assert_eq!(op.query(), "NN");
        assert_eq!(op.reference(), "AC");
        assert!(Operation::new('N', 2, "AN", "NC").is_ok());
        assert!(Operation::new('N', 2, "NA", "AC").is_err());
    }

    #[test]
    fn zero_length_operation_is_rejected() {
        assert!(Operation::new('M', 0, "", "").is_err());
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(Operation::new('Z', 1, "A", "A").is_err());
    }

    #[test]
    fn operation_renders_as_cigar_token() {
        assert_eq!(Operation::new('S', 5, "ACGTA", "").unwrap().to_string(), "5S");
    }

    #[test]
    fn operation_overrunning_window_is_rejected() {
        assert!(Operation::new('M', 5, "ACG", "ACG").is_err());
    }
}
