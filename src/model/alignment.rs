//! Reports describing how a restraint-file sequence lines up with a coordinate chain.

use serde::{Deserialize, Serialize};

/// Column-wise alignment between a coordinate (reference) chain and a restraint (test) chain.
///
/// `ref_seq_id` and `test_seq_id` hold one entry per alignment column; `None` marks a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceAlignment {
    pub ref_chain_id: String,
    pub test_chain_id: String,
    pub length: usize,
    pub matched: usize,
    pub conflict: usize,
    pub unmapped: usize,
    pub sequence_coverage: f64,
    pub ref_seq_id: Vec<Option<i32>>,
    pub test_seq_id: Vec<Option<i32>>,
    pub ref_code: String,
    pub mid_code: String,
    pub test_code: String,
    pub ref_gauge_code: String,
    pub test_gauge_code: String,
}

impl SequenceAlignment {
    /// Checks the column bookkeeping of the alignment.
    pub fn is_consistent(&self) -> bool {
        self.matched + self.conflict + self.unmapped == self.length
            && self.ref_seq_id.len() == self.length
            && self.test_seq_id.len() == self.length
    }

    /// Pairs of `(ref_seq_id, test_seq_id)` for every column where both sides are present.
    pub fn aligned_pairs(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.ref_seq_id
            .iter()
            .zip(&self.test_seq_id)
            .filter_map(|(r, t)| Some(((*r)?, (*t)?)))
    }
}

/// A restraint residue that found no partner in the coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedResidue {
    pub test_seq_id: i32,
    pub test_comp_id: String,
}

/// A column whose two residues disagree in residue name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResidue {
    pub ref_seq_id: i32,
    pub ref_comp_id: String,
    pub test_seq_id: i32,
    pub test_comp_id: String,
}

/// Admitted routing of a restraint chain onto a coordinate chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAssignment {
    pub ref_chain_id: String,
    pub test_chain_id: String,
    pub length: usize,
    pub matched: usize,
    pub conflict: usize,
    pub unmapped: usize,
    pub sequence_coverage: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmapped_sequence: Vec<UnmappedResidue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_sequence: Vec<ConflictResidue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SequenceAlignment {
        SequenceAlignment {
            ref_chain_id: "A".into(),
            test_chain_id: "A".into(),
            length: 3,
            matched: 2,
            conflict: 0,
            unmapped: 1,
            sequence_coverage: 1.0,
            ref_seq_id: vec![Some(1), Some(2), Some(3)],
            test_seq_id: vec![None, Some(5), Some(6)],
            ref_code: "MGS".into(),
            mid_code: " ||".into(),
            test_code: "-GS".into(),
            ref_gauge_code: "   ".into(),
            test_gauge_code: "   ".into(),
        }
    }

    #[test]
    fn aligned_pairs_skip_gap_columns() {
        let pairs: Vec<_> = sample().aligned_pairs().collect();
        assert_eq!(pairs, vec![(2, 5), (3, 6)]);
    }

    #[test]
    fn is_consistent_checks_column_counts() {
        let mut alignment = sample();
        assert!(alignment.is_consistent());

        alignment.unmapped = 0;
        assert!(!alignment.is_consistent());
    }
}
