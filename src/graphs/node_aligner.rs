//! Affine-gap alignment of a query window against a single node sequence.
//!
//! The column-wise dynamic program here is the engine behind both the
//! standalone node alignment and the path extension of the graph aligner:
//! a column holds the three affine states for every query position at one
//! reference position, so carrying a column across a node boundary
//! continues the alignment (gaps included) on the next node.

use super::{mapping::Mapping, operation::Operation};
use crate::utils::{Error, Result};

/// Scores are positive penalties except for `match_scr`, which is a bonus.
/// Defaults follow the flank-alignment scoring of the CLI.
#[derive(Debug, Clone, Copy)]
pub struct AlignScoring {
    pub match_scr: i32,
    pub mism_scr: i32,
    pub gapo_scr: i32,
    pub gape_scr: i32,
}

impl Default for AlignScoring {
    fn default() -> Self {
        AlignScoring {
            match_scr: 1,
            mism_scr: 1,
            gapo_scr: 5,
            gape_scr: 1,
        }
    }
}

/// Low enough to never win a maximum, high enough to survive repeated
/// penalty subtraction without wrapping.
pub const NEG_INF: i32 = i32::MIN / 4;

/// Affine alignment states at one (query position, reference position):
/// `m` ends in a base-to-base operation, `del` in a reference-consuming gap,
/// `ins` in a query-consuming gap. Row 0 of `m` doubles as the start state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub m: i32,
    pub del: i32,
    pub ins: i32,
}

impl Cell {
    pub const IMPOSSIBLE: Cell = Cell {
        m: NEG_INF,
        del: NEG_INF,
        ins: NEG_INF,
    };

    pub fn best(&self) -> i32 {
        self.m.max(self.del).max(self.ins)
    }
}

/// One column of cells, indexed by query position 0..=query_len.
pub type Column = Vec<Cell>;

/// Filled DP matrix for one node: columns 0..=node_len, where column 0 is
/// the entry column supplied by the caller.
#[derive(Debug)]
pub struct NodeMatrix {
    pub columns: Vec<Column>,
}

pub struct NodeAligner {
    scoring: AlignScoring,
}

impl NodeAligner {
    pub fn new(scoring: AlignScoring) -> Self {
        NodeAligner { scoring }
    }

    pub fn scoring(&self) -> &AlignScoring {
        &self.scoring
    }

    /// Score of aligning query base `q` to reference base `r`. `N` on either
    /// side aligns at zero penalty and zero reward.
    pub fn substitution_score(&self, q: u8, r: u8) -> i32 {
        if q == b'N' || r == b'N' {
            0
        } else if q == r {
            self.scoring.match_scr
        } else {
            -self.scoring.mism_scr
        }
    }

    fn gap_open(&self) -> i32 {
        self.scoring.gapo_scr + self.scoring.gape_scr
    }

    fn gap_extend(&self) -> i32 {
        self.scoring.gape_scr
    }

    /// Extends `entry` across `node_seq`, producing every column. When
    /// `free_start` is set, row 0 of each column is a zero-cost start state,
    /// so the alignment may begin at any reference position.
    pub fn fill(&self, query: &[u8], node_seq: &[u8], entry: Column, free_start: bool) -> NodeMatrix {
        let rows = query.len() + 1;
        debug_assert_eq!(entry.len(), rows);

        let open = self.gap_open();
        let extend = self.gap_extend();

        let mut columns = Vec::with_capacity(node_seq.len() + 1);
        columns.push(entry);

        for (j, &r) in node_seq.iter().enumerate() {
            let prev = &columns[j];
            let mut col = vec![Cell::IMPOSSIBLE; rows];

            col[0].m = if free_start { 0 } else { NEG_INF };
            col[0].del = (prev[0].m - open).max(prev[0].del - extend);

            for i in 1..rows {
                let q = query[i - 1];
                let diag = prev[i - 1];
                let best_diag = diag.best();
                if best_diag > NEG_INF {
                    col[i].m = best_diag + self.substitution_score(q, r);
                }
                col[i].del = (prev[i].m - open)
                    .max(prev[i].del - extend)
                    .max(prev[i].ins - open);
                col[i].ins = (col[i - 1].m - open)
                    .max(col[i - 1].ins - extend)
                    .max(col[i - 1].del - open);
            }

            columns.push(col);
        }

        NodeMatrix { columns }
    }

    /// Optimal global-within-node alignment of `query` against
    /// `node_seq[offset..]`, anchored at `offset`. The whole query is
    /// consumed; the alignment ends wherever on the node the score is
    /// maximal. Equal scores resolve through [`TieBreak`]: longer terminal
    /// matches, then fewer gap opens, then the lexicographically smaller
    /// CIGAR.
    pub fn align(&self, query: &str, node_seq: &str, offset: usize) -> Result<Mapping> {
        if offset >= node_seq.len() {
            return Err(Error::Internal(format!(
                "Alignment offset {} is out of bounds on a node of length {}",
                offset,
                node_seq.len()
            )));
        }

        let query = query.as_bytes();
        let window = &node_seq.as_bytes()[offset..];
        let rows = query.len() + 1;

        let mut entry = vec![Cell::IMPOSSIBLE; rows];
        entry[0].m = 0;
        for i in 1..rows {
            // Leading insertions are the only way to consume query before
            // the anchored reference start.
            entry[i].ins = (entry[i - 1].m - self.gap_open())
                .max(entry[i - 1].ins - self.gap_extend());
        }

        let matrix = self.fill(query, window, entry, false);

        let mut max_score = NEG_INF;
        for col in &matrix.columns {
            let cell = col[rows - 1];
            max_score = max_score.max(cell.m).max(cell.ins);
        }
        if max_score <= NEG_INF {
            return Err(Error::Internal("Node alignment has no viable end".to_string()));
        }

        let mut chosen: Option<(TieBreak, Vec<Step>)> = None;
        for (j, col) in matrix.columns.iter().enumerate() {
            for state in [State::M, State::Ins] {
                if state.value(&col[rows - 1]) != max_score {
                    continue;
                }
                let steps = self.traceback(&matrix, query, window, j, state)?;
                let key = TieBreak::from_steps(&steps);
                if chosen.as_ref().map_or(true, |(best, _)| key.beats(best)) {
                    chosen = Some((key, steps));
                }
            }
        }

        let (_, steps) = chosen
            .ok_or_else(|| Error::Internal("Node alignment has no viable end".to_string()))?;
        Ok(Mapping::new(offset, collect_operations(&steps)))
    }

    /// Walks one filled matrix from `(end_col, row = query_len, state)` back
    /// to the start state, returning steps in alignment order. Preference on
    /// equal scores: base-to-base, then deletion, then insertion.
    fn traceback(
        &self,
        matrix: &NodeMatrix,
        query: &[u8],
        window: &[u8],
        end_col: usize,
        end_state: State,
    ) -> Result<Vec<Step>> {
        let open = self.gap_open();
        let extend = self.gap_extend();

        let mut steps = Vec::new();
        let mut i = query.len();
        let mut j = end_col;
        let mut state = end_state;

        loop {
            if i == 0 && matches!(state, State::M) {
                break;
            }
            let value = state.value(&matrix.columns[j][i]);
            if value <= NEG_INF {
                return Err(Error::Internal("Traceback entered an unreachable cell".to_string()));
            }

            match state {
                State::M => {
                    let q = query[i - 1];
                    let r = window[j - 1];
                    steps.push(Step::diagonal(q, r));
                    let diag = matrix.columns[j - 1][i - 1];
                    let sub = self.substitution_score(q, r);
                    state = pick_state(&diag, value - sub)?;
                    i -= 1;
                    j -= 1;
                }
                State::Del => {
                    steps.push(Step::deletion(window[j - 1]));
                    let prev = matrix.columns[j - 1][i];
                    state = if prev.m - open == value {
                        State::M
                    } else if prev.del - extend == value {
                        State::Del
                    } else if prev.ins - open == value {
                        State::Ins
                    } else {
                        return Err(Error::Internal("Traceback lost the deletion chain".to_string()));
                    };
                    j -= 1;
                }
                State::Ins => {
                    steps.push(Step::insertion(query[i - 1]));
                    let below = matrix.columns[j][i - 1];
                    state = if below.m - open == value {
                        State::M
                    } else if below.ins - extend == value {
                        State::Ins
                    } else if below.del - open == value {
                        State::Del
                    } else {
                        return Err(Error::Internal("Traceback lost the insertion chain".to_string()));
                    };
                    i -= 1;
                }
            }
        }

        steps.reverse();
        Ok(steps)
    }
}

/// Orders alignments of equal score: longer terminal match runs win, then
/// fewer gap opens, then the lexicographically smaller CIGAR. Candidates
/// tying on all three keep the first placement found, which scans are
/// arranged to make the leftmost one.
#[derive(Debug)]
pub struct TieBreak {
    terminal_matches: usize,
    gap_opens: usize,
    cigar: String,
}

impl TieBreak {
    pub fn from_steps(steps: &[Step]) -> TieBreak {
        let terminal_matches = steps
            .iter()
            .rev()
            .skip_while(|step| step.code == 'S')
            .take_while(|step| step.code == 'M')
            .count();

        let mut gap_opens = 0;
        let mut previous = ' ';
        for step in steps {
            if (step.code == 'I' || step.code == 'D') && step.code != previous {
                gap_opens += 1;
            }
            previous = step.code;
        }

        let cigar = collect_operations(steps)
            .iter()
            .map(|op| op.to_string())
            .collect();

        TieBreak {
            terminal_matches,
            gap_opens,
            cigar,
        }
    }

    pub fn beats(&self, other: &TieBreak) -> bool {
        if self.terminal_matches != other.terminal_matches {
            return self.terminal_matches > other.terminal_matches;
        }
        if self.gap_opens != other.gap_opens {
            return self.gap_opens < other.gap_opens;
        }
        self.cigar < other.cigar
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    M,
    Del,
    Ins,
}

impl State {
    pub fn value(&self, cell: &Cell) -> i32 {
        match self {
            State::M => cell.m,
            State::Del => cell.del,
            State::Ins => cell.ins,
        }
    }
}

fn pick_state(cell: &Cell, target: i32) -> Result<State> {
    if cell.m == target {
        Ok(State::M)
    } else if cell.del == target {
        Ok(State::Del)
    } else if cell.ins == target {
        Ok(State::Ins)
    } else {
        Err(Error::Internal("Traceback lost the alignment chain".to_string()))
    }
}

/// One traceback step; a run of equal-code steps becomes one Operation.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub code: char,
    pub query_base: u8,
    pub ref_base: u8,
}

impl Step {
    pub fn diagonal(q: u8, r: u8) -> Step {
        let code = if q == b'N' || r == b'N' {
            'N'
        } else if q == r {
            'M'
        } else {
            'X'
        };
        Step {
            code,
            query_base: q,
            ref_base: r,
        }
    }

    pub fn deletion(r: u8) -> Step {
        Step {
            code: 'D',
            query_base: 0,
            ref_base: r,
        }
    }

    pub fn insertion(q: u8) -> Step {
        Step {
            code: 'I',
            query_base: q,
            ref_base: 0,
        }
    }

    pub fn clip(q: u8) -> Step {
        Step {
            code: 'S',
            query_base: q,
            ref_base: 0,
        }
    }
}

/// Merges steps into operations, one per run of equal codes.
pub fn collect_operations(steps: &[Step]) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut index = 0;
    while index < steps.len() {
        let code = steps[index].code;
        let mut query = String::new();
        let mut reference = String::new();
        while index < steps.len() && steps[index].code == code {
            if steps[index].query_base != 0 {
                query.push(steps[index].query_base as char);
            }
            if steps[index].ref_base != 0 {
                reference.push(steps[index].ref_base as char);
            }
            index += 1;
        }
        let operation = match code {
            'M' => Operation::Match(query),
            'X' => Operation::Mismatch { query, reference },
            'I' => Operation::Insertion(query),
            'D' => Operation::Deletion(reference),
            'S' => Operation::SoftClip(query),
            'N' => Operation::Missing { query, reference },
            _ => unreachable!("unknown step code {}", code),
        };
        operations.push(operation);
    }
    operations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner() -> NodeAligner {
        NodeAligner::new(AlignScoring::default())
    }

    #[test]
    fn perfect_match_from_offset() {
        let mapping = aligner().align("TTCC", "AATTCC", 2).unwrap();
        assert_eq!(mapping.cigar(), "4M");
        assert_eq!(mapping.reference_start(), 2);
    }

    #[test]
    fn single_mismatch_is_reported() {
        let mapping = aligner().align("TGCC", "AATTCC", 2).unwrap();
        assert_eq!(mapping.cigar(), "1M1X2M");
    }

    #[test]
    fn deletion_beats_mismatch_run_when_cheaper() {
        // Skipping the 7-base G run costs 12 and keeps all 14 query bases
        // matched; any shifted placement loses two matches per gap base.
        let query = "ACGTTTTTTTTTTT";
        let node = "ACGTGGGGGGGTTTTTTTTTT";
        let mapping = aligner().align(query, node, 0).unwrap();
        assert_eq!(mapping.cigar(), "4M7D10M");
    }

    #[test]
    fn insertion_in_query_is_recovered() {
        let mapping = aligner().align("ACGTTTTTTTTACG", "ACGACG", 0).unwrap();
        assert_eq!(mapping.cigar(), "3M8I3M");
    }

    #[test]
    fn n_bases_align_at_zero_penalty() {
        let mapping = aligner().align("ANNC", "AGTC", 0).unwrap();
        assert_eq!(mapping.cigar(), "1M2N1M");
        assert_eq!(mapping.num_matches(), 2);
    }

    #[test]
    fn query_reproduced_by_mapping() {
        let query = "ACGTTTTACG";
        let mapping = aligner().align(query, "ACGTACGTT", 0).unwrap();
        assert_eq!(mapping.query(), query);
    }

    #[test]
    fn out_of_bounds_offset_fails() {
        assert!(aligner().align("ACGT", "ACGT", 4).is_err());
    }

    #[test]
    fn tiebreak_prefers_longer_terminal_matches() {
        let more = TieBreak::from_steps(&[
            Step::diagonal(b'C', b'G'),
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'T', b'T'),
        ]);
        let fewer = TieBreak::from_steps(&[
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'C', b'G'),
            Step::diagonal(b'T', b'T'),
        ]);
        assert!(more.beats(&fewer));
        assert!(!fewer.beats(&more));
    }

    #[test]
    fn tiebreak_skips_trailing_clips_when_counting_terminal_matches() {
        // Two terminal matches hide behind the clip; the run ending in a
        // mismatch has none.
        let clipped = TieBreak::from_steps(&[
            Step::diagonal(b'C', b'G'),
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'T', b'T'),
            Step::clip(b'G'),
        ]);
        let mismatch_end = TieBreak::from_steps(&[
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'T', b'T'),
            Step::diagonal(b'C', b'G'),
        ]);
        assert!(clipped.beats(&mismatch_end));
    }

    #[test]
    fn tiebreak_counts_gap_runs_not_gap_bases() {
        // One two-base deletion run opens one gap; two separated one-base
        // runs open two.
        let one_open = TieBreak::from_steps(&[
            Step::diagonal(b'A', b'A'),
            Step::deletion(b'C'),
            Step::deletion(b'G'),
            Step::diagonal(b'T', b'T'),
        ]);
        let two_opens = TieBreak::from_steps(&[
            Step::deletion(b'C'),
            Step::diagonal(b'A', b'A'),
            Step::deletion(b'G'),
            Step::diagonal(b'T', b'T'),
        ]);
        assert!(one_open.beats(&two_opens));
    }

    #[test]
    fn tiebreak_falls_back_to_cigar_order() {
        // Same score shape, same terminal matches, same gap opens: the
        // lexicographically smaller CIGAR (1D before 1I) wins.
        let deletion_first = TieBreak::from_steps(&[
            Step::deletion(b'C'),
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'T', b'T'),
        ]);
        let insertion_first = TieBreak::from_steps(&[
            Step::insertion(b'C'),
            Step::diagonal(b'A', b'A'),
            Step::diagonal(b'T', b'T'),
        ]);
        assert!(deletion_first.beats(&insertion_first));
    }

    #[test]
    fn alignment_is_anchored_at_given_offset() {
        // The query matches perfectly at offset 4, but the anchor at 0
        // forbids a silent shift; mismatches are cheaper than the leading
        // deletion under the default scores.
        let mapping = aligner().align("GGGG", "ACGTGGGG", 0).unwrap();
        assert_eq!(mapping.reference_start(), 0);
        assert_eq!(mapping.cigar(), "2X1M1X");
        assert_eq!(mapping.query(), "GGGG");
    }
}
