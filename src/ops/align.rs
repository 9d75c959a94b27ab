//! Pairwise residue-sequence alignment.
//!
//! Sequences are slices of `(seq_id, comp_id)` pairs. The placeholder comp `"."` fills
//! numbering gaps of a restraint sequence and scores neutrally against everything.

/// Residue code filling unreferenced positions of a restraint sequence.
pub const PLACEHOLDER: &str = ".";

/// One alignment column: an index into the reference, the test sequence, or both.
pub type Column = (Option<usize>, Option<usize>);

/// Global pairwise aligner returning alignment columns in sequence order.
pub trait SequenceAligner {
    fn align(&self, reference: &[(i32, &str)], test: &[(i32, &str)]) -> Vec<Column>;
}

/// Needleman–Wunsch alignment with linear gap costs and free terminal gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalAligner {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_score: i32,
    /// Added to a match whose two residues also share their sequence number.
    pub numbering_bonus: i32,
}

impl Default for GlobalAligner {
    fn default() -> Self {
        Self {
            match_score: 10,
            mismatch_score: -5,
            gap_score: -8,
            numbering_bonus: 1,
        }
    }
}

impl GlobalAligner {
    fn score(&self, r: (i32, &str), t: (i32, &str)) -> i32 {
        if r.1 == PLACEHOLDER || t.1 == PLACEHOLDER {
            0
        } else if r.1 == t.1 {
            self.match_score + if r.0 == t.0 { self.numbering_bonus } else { 0 }
        } else {
            self.mismatch_score
        }
    }
}

impl SequenceAligner for GlobalAligner {
    fn align(&self, reference: &[(i32, &str)], test: &[(i32, &str)]) -> Vec<Column> {
        let m = reference.len();
        let n = test.len();
        let cols = n + 1;
        let idx = |i: usize, j: usize| i * cols + j;

        // Leading gaps are free, so row 0 and column 0 stay at zero.
        let mut h = vec![0i32; (m + 1) * cols];
        for i in 1..=m {
            for j in 1..=n {
                let diag = h[idx(i - 1, j - 1)] + self.score(reference[i - 1], test[j - 1]);
                let up = h[idx(i - 1, j)] + self.gap_score;
                let left = h[idx(i, j - 1)] + self.gap_score;
                h[idx(i, j)] = diag.max(up).max(left);
            }
        }

        // Trailing gaps are free as well: end in the best cell of the last row or column.
        let (mut i, mut j) = (m, n);
        let mut best = h[idx(m, n)];
        for jj in 0..=n {
            if h[idx(m, jj)] > best {
                best = h[idx(m, jj)];
                (i, j) = (m, jj);
            }
        }
        for ii in 0..=m {
            if h[idx(ii, n)] > best {
                best = h[idx(ii, n)];
                (i, j) = (ii, n);
            }
        }

        let mut columns: Vec<Column> = Vec::with_capacity(m + n);
        for jj in (j..n).rev() {
            columns.push((None, Some(jj)));
        }
        for ii in (i..m).rev() {
            columns.push((Some(ii), None));
        }

        while i > 0 && j > 0 {
            let here = h[idx(i, j)];
            if here == h[idx(i - 1, j - 1)] + self.score(reference[i - 1], test[j - 1]) {
                columns.push((Some(i - 1), Some(j - 1)));
                i -= 1;
                j -= 1;
            } else if here == h[idx(i - 1, j)] + self.gap_score {
                columns.push((Some(i - 1), None));
                i -= 1;
            } else {
                columns.push((None, Some(j - 1)));
                j -= 1;
            }
        }
        while j > 0 {
            columns.push((None, Some(j - 1)));
            j -= 1;
        }
        while i > 0 {
            columns.push((Some(i - 1), None));
            i -= 1;
        }

        columns.reverse();
        columns
    }
}
