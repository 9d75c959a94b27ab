//! Reconciliation of restraint-file polymer sequences with the coordinate polymers.
//!
//! While a pass runs, every residue reference lands in a [`PolySeqRst`]. At the end of the
//! pass the [`Reconciler`] aligns each restraint chain against each coordinate chain,
//! assigns chains one-to-one, and derives the reasons a second pass needs: label numbering,
//! per-residue renumbering, and the split of a concatenated chain over identical copies.

use crate::db::ChemCompStore;
use crate::model::alignment::{ChainAssignment, ConflictResidue, SequenceAlignment, UnmappedResidue};
use crate::model::chain::PolymerChain;
use crate::model::index::CoordinateIndex;
use crate::model::reasons::{ChainIdRemap, ReasonsForReparsing, SeqIdRemap};
use crate::ops::align::{Column, PLACEHOLDER, SequenceAligner};
use crate::ops::config::NormalizerConfig;
use crate::ops::diagnostics::{DiagnosticKind, Diagnostics};
use crate::ops::translate::parent_residue_name;
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};

/// Restraint-file polymer sequences keyed by restraint chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolySeqRst {
    chains: BTreeMap<String, BTreeMap<i32, String>>,
}

impl PolySeqRst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a referenced residue; the first residue name seen for a number is kept.
    pub fn add(&mut self, chain_key: &str, seq_id: i32, comp_id: &str) {
        self.chains
            .entry(chain_key.to_string())
            .or_default()
            .entry(seq_id)
            .or_insert_with(|| comp_id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn clear(&mut self) {
        self.chains.clear();
    }

    pub fn chain_keys(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Referenced residues of a chain in sequence order.
    pub fn residues(&self, chain_key: &str) -> Vec<(i32, &str)> {
        self.chains
            .get(chain_key)
            .map(|r| r.iter().map(|(s, c)| (*s, c.as_str())).collect())
            .unwrap_or_default()
    }

    /// Contiguous sequence from the lowest to the highest referenced number, with
    /// [`PLACEHOLDER`] at unreferenced positions.
    pub fn densified(&self, chain_key: &str) -> Vec<(i32, String)> {
        let Some(residues) = self.chains.get(chain_key) else {
            return Vec::new();
        };
        let (Some(first), Some(last)) = (residues.keys().next(), residues.keys().next_back()) else {
            return Vec::new();
        };
        (*first..=*last)
            .map(|seq| {
                let comp = residues.get(&seq).map(String::as_str).unwrap_or(PLACEHOLDER);
                (seq, comp.to_string())
            })
            .collect()
    }
}

/// Everything the reconciler learned about one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub alignments: Vec<SequenceAlignment>,
    pub assignments: Vec<ChainAssignment>,
    /// Hints not already present in the reasons the pass was seeded with.
    pub reasons: ReasonsForReparsing,
    pub diagnostics: Diagnostics,
}

struct Candidate {
    test_key: String,
    ref_chain: usize,
    alignment: SequenceAlignment,
    offset: usize,
}

pub struct Reconciler<'a> {
    index: &'a CoordinateIndex,
    ccd: &'a dyn ChemCompStore,
    config: &'a NormalizerConfig,
    aligner: &'a dyn SequenceAligner,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        index: &'a CoordinateIndex,
        ccd: &'a dyn ChemCompStore,
        config: &'a NormalizerConfig,
        aligner: &'a dyn SequenceAligner,
    ) -> Self {
        Self {
            index,
            ccd,
            config,
            aligner,
        }
    }

    fn compare_key(&self, comp_id: &str) -> String {
        if comp_id == PLACEHOLDER {
            return comp_id.to_string();
        }
        parent_residue_name(comp_id, self.ccd).unwrap_or_else(|| comp_id.to_string())
    }

    fn one_letter(&self, comp_id: &str) -> char {
        if comp_id == PLACEHOLDER {
            return '.';
        }
        let code = |c: &str| self.ccd.chem_comp(c).and_then(|comp| comp.one_letter_code);
        code(comp_id)
            .or_else(|| parent_residue_name(comp_id, self.ccd).and_then(|p| code(&p)))
            .unwrap_or('X')
    }

    /// Aligns a restraint sequence against a coordinate chain.
    ///
    /// When the plain alignment leaves residues in conflict or unaligned, runs of
    /// placeholders at least `large_gap_threshold` long are removed and the sequence is
    /// aligned again. The repaired alignment is kept only if every residue it recovers
    /// becomes a match.
    pub fn align_chain(
        &self,
        reference: &PolymerChain,
        test_key: &str,
        test: &[(i32, String)],
    ) -> SequenceAlignment {
        let plain = self.align_raw(reference, test_key, test);
        let plain_stranded = plain.conflict + unaligned_test_residues(&plain, test);
        if plain_stranded == 0 {
            return plain;
        }

        let collapsed = collapse_large_gaps(test, self.config.large_gap_threshold);
        if collapsed.len() == test.len() {
            return plain;
        }
        let beautified = self.align_raw(reference, test_key, &collapsed);
        let stranded = beautified.conflict + unaligned_test_residues(&beautified, &collapsed);
        let recovered = beautified.matched == plain.matched + (plain_stranded - stranded);
        if stranded < plain_stranded && recovered {
            log::debug!(
                "large-gap repair of restraint chain {} against {} recovered {} residues",
                test_key,
                reference.chain_id,
                plain_stranded - stranded
            );
            beautified
        } else {
            plain
        }
    }

    fn align_raw(
        &self,
        reference: &PolymerChain,
        test_key: &str,
        test: &[(i32, String)],
    ) -> SequenceAlignment {
        let ref_keys: Vec<(i32, String)> = reference
            .iter_residues()
            .map(|(auth, _, comp)| (auth, self.compare_key(comp)))
            .collect();
        let test_keys: Vec<(i32, String)> = test
            .iter()
            .map(|(seq, comp)| (*seq, self.compare_key(comp)))
            .collect();

        let ref_view: Vec<(i32, &str)> = ref_keys.iter().map(|(s, c)| (*s, c.as_str())).collect();
        let test_view: Vec<(i32, &str)> = test_keys.iter().map(|(s, c)| (*s, c.as_str())).collect();
        let columns = self.aligner.align(&ref_view, &test_view);

        self.build_alignment(reference, test_key, test, &ref_view, &test_view, &columns)
    }

    fn build_alignment(
        &self,
        reference: &PolymerChain,
        test_key: &str,
        test: &[(i32, String)],
        ref_view: &[(i32, &str)],
        test_view: &[(i32, &str)],
        columns: &[Column],
    ) -> SequenceAlignment {
        let is_real = |t: &Option<usize>| t.is_some_and(|j| test_view[j].1 != PLACEHOLDER);
        let first = columns.iter().position(|(_, t)| is_real(t));
        let last = columns.iter().rposition(|(_, t)| is_real(t));

        let mut alignment = SequenceAlignment {
            ref_chain_id: reference.chain_id.clone(),
            test_chain_id: test_key.to_string(),
            length: 0,
            matched: 0,
            conflict: 0,
            unmapped: 0,
            sequence_coverage: 0.0,
            ref_seq_id: Vec::new(),
            test_seq_id: Vec::new(),
            ref_code: String::new(),
            mid_code: String::new(),
            test_code: String::new(),
            ref_gauge_code: String::new(),
            test_gauge_code: String::new(),
        };
        let (Some(first), Some(last)) = (first, last) else {
            return alignment;
        };

        let comps = reference.comp_ids();
        for (r, t) in &columns[first..=last] {
            let real = is_real(t);
            alignment.ref_seq_id.push(r.map(|i| ref_view[i].0));
            alignment.test_seq_id.push(t.filter(|_| real).map(|j| test_view[j].0));
            alignment
                .ref_code
                .push(r.map(|i| self.one_letter(&comps[i])).unwrap_or('-'));
            alignment
                .test_code
                .push(t.map(|j| self.one_letter(&test[j].1)).unwrap_or('-'));

            match (r, t) {
                (Some(i), Some(j)) if real && ref_view[*i].1 == test_view[*j].1 => {
                    alignment.matched += 1;
                    alignment.mid_code.push('|');
                }
                (Some(_), Some(_)) if real => {
                    alignment.conflict += 1;
                    alignment.mid_code.push(' ');
                }
                _ => {
                    alignment.unmapped += 1;
                    alignment.mid_code.push(' ');
                }
            }
        }
        alignment.length = alignment.ref_seq_id.len();
        alignment.ref_gauge_code = gauge(&alignment.ref_seq_id);
        alignment.test_gauge_code = gauge(&alignment.test_seq_id);

        let real_count = test.iter().filter(|(_, c)| c != PLACEHOLDER).count();
        alignment.sequence_coverage = alignment.matched as f64 / real_count.max(1) as f64;
        alignment
    }

    /// Aligns, assigns, and derives the reasons for reparsing of one pass.
    ///
    /// # Arguments
    ///
    /// * `poly_seq` - Residues referenced during the pass.
    /// * `incoming` - Reasons the pass was seeded with; they are never published again.
    /// * `label_rescued` - Whether the resolver succeeded only through label numbering.
    pub fn reconcile(
        &self,
        poly_seq: &PolySeqRst,
        incoming: &ReasonsForReparsing,
        label_rescued: bool,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut reasons = ReasonsForReparsing {
            label_seq_scheme: label_rescued,
            ..Default::default()
        };
        let refs = self.index.polymer_chains();

        let mut candidates = Vec::new();
        let mut tests: BTreeMap<String, Vec<(i32, String)>> = BTreeMap::new();
        for key in poly_seq.chain_keys() {
            let test = poly_seq.densified(key);
            for (r, reference) in refs.iter().enumerate() {
                let alignment = self.align_chain(reference, key, &test);
                let offset = unaligned_test_residues(&alignment, &test);
                if self.passes_coverage_gate(&alignment, offset) {
                    candidates.push(Candidate {
                        test_key: key.to_string(),
                        ref_chain: r,
                        alignment,
                        offset,
                    });
                }
            }
            tests.insert(key.to_string(), test);
        }

        let renamed = |c: &Candidate| refs[c.ref_chain].chain_id != c.test_key;
        candidates.sort_by(|a, b| {
            b.alignment
                .matched
                .cmp(&a.alignment.matched)
                .then(a.alignment.conflict.cmp(&b.alignment.conflict))
                .then(renamed(a).cmp(&renamed(b)))
                .then(a.ref_chain.cmp(&b.ref_chain))
        });

        let mut assigned_tests = HashSet::new();
        let mut assigned_refs = HashSet::new();
        let mut chosen = Vec::new();
        for candidate in candidates {
            if assigned_tests.contains(&candidate.test_key)
                || assigned_refs.contains(&candidate.ref_chain)
            {
                continue;
            }
            assigned_tests.insert(candidate.test_key.clone());
            assigned_refs.insert(candidate.ref_chain);
            chosen.push(candidate);
        }
        chosen.sort_by(|a, b| a.test_key.cmp(&b.test_key));

        for candidate in &chosen {
            let reference = &refs[candidate.ref_chain];
            let test = &tests[&candidate.test_key];
            log::debug!(
                "restraint chain {} assigned to {} (matched {}, conflict {}, offset {})",
                candidate.test_key,
                reference.chain_id,
                candidate.alignment.matched,
                candidate.alignment.conflict,
                candidate.offset
            );

            let assignment = self.assignment(reference, test, &candidate.alignment);
            if !assignment.conflict_sequence.is_empty() {
                outcome.diagnostics.report(
                    DiagnosticKind::SequenceMismatch,
                    None,
                    format!(
                        "Restraint chain {} disagrees with coordinate chain {} at {}.",
                        candidate.test_key,
                        reference.chain_id,
                        assignment
                            .conflict_sequence
                            .iter()
                            .map(|c| format!(
                                "{}:{} (coordinates {}:{})",
                                c.test_seq_id, c.test_comp_id, c.ref_seq_id, c.ref_comp_id
                            ))
                            .join(", ")
                    ),
                );
            }

            let numbering =
                self.numbering_reason(reference, &candidate.test_key, test, &candidate.alignment);
            if let Some(remap) = numbering {
                match remap {
                    NumberingReason::LabelScheme => reasons.label_seq_scheme = true,
                    NumberingReason::Remap(remap) => reasons.seq_id_remap.push(remap),
                }
            }

            let splits = self.split_concatenated(
                reference,
                &candidate.test_key,
                test,
                &candidate.alignment,
                &assigned_refs,
                &mut outcome.alignments,
            );
            if !splits.is_empty() {
                let chains = std::iter::once(reference.chain_id.as_str())
                    .chain(splits.iter().map(|(chain, _)| chain.as_str()))
                    .join(", ");
                outcome.diagnostics.report(
                    DiagnosticKind::ConcatenatedSequence,
                    None,
                    format!(
                        "Restraint chain {} spans coordinate chains {}; the mapping onto {} is \
                         kept.",
                        candidate.test_key, chains, reference.chain_id
                    ),
                );
                reasons
                    .chain_id_remap
                    .extend(splits.into_iter().filter_map(|(_, remap)| remap));
            }

            outcome.alignments.push(candidate.alignment.clone());
            outcome.assignments.push(assignment);
        }

        for key in tests.keys().filter(|k| !assigned_tests.contains(*k)) {
            log::debug!("restraint chain {} matches no coordinate chain", key);
        }

        outcome.reasons = reasons.without(incoming);
        outcome
    }

    fn passes_coverage_gate(&self, alignment: &SequenceAlignment, offset: usize) -> bool {
        if alignment.matched == 0 {
            return false;
        }
        !(alignment.conflict + offset > alignment.matched
            && alignment.sequence_coverage < self.config.min_sequence_coverage)
    }

    fn assignment(
        &self,
        reference: &PolymerChain,
        test: &[(i32, String)],
        alignment: &SequenceAlignment,
    ) -> ChainAssignment {
        let test_comp = |seq: i32| {
            test.iter()
                .find(|(s, _)| *s == seq)
                .map(|(_, c)| c.clone())
                .unwrap_or_default()
        };
        let mut unmapped_sequence = Vec::new();
        let mut conflict_sequence = Vec::new();
        for (r, t) in alignment.ref_seq_id.iter().zip(&alignment.test_seq_id) {
            match (r, t) {
                (None, Some(t)) => unmapped_sequence.push(UnmappedResidue {
                    test_seq_id: *t,
                    test_comp_id: test_comp(*t),
                }),
                (Some(r), Some(t)) => {
                    let ref_comp = reference.comp_id_at_auth(*r).unwrap_or_default();
                    let t_comp = test_comp(*t);
                    if self.compare_key(ref_comp) != self.compare_key(&t_comp) {
                        conflict_sequence.push(ConflictResidue {
                            ref_seq_id: *r,
                            ref_comp_id: ref_comp.to_string(),
                            test_seq_id: *t,
                            test_comp_id: t_comp,
                        });
                    }
                }
                _ => {}
            }
        }

        ChainAssignment {
            ref_chain_id: reference.chain_id.clone(),
            test_chain_id: alignment.test_chain_id.clone(),
            length: alignment.length,
            matched: alignment.matched,
            conflict: alignment.conflict,
            unmapped: alignment.unmapped,
            sequence_coverage: alignment.sequence_coverage,
            unmapped_sequence,
            conflict_sequence,
        }
    }

    fn numbering_reason(
        &self,
        reference: &PolymerChain,
        test_key: &str,
        test: &[(i32, String)],
        alignment: &SequenceAlignment,
    ) -> Option<NumberingReason> {
        let paired: Vec<(i32, i32)> = alignment.aligned_pairs().collect();
        let matched: Vec<(i32, i32)> = paired
            .iter()
            .copied()
            .filter(|(r, t)| {
                let ref_comp = reference.comp_id_at_auth(*r).unwrap_or_default();
                test.iter()
                    .find(|(s, _)| s == t)
                    .is_some_and(|(_, c)| self.compare_key(c) == self.compare_key(ref_comp))
            })
            .collect();
        let unchanged = matched.iter().all(|(r, t)| r == t) && reference.chain_id == test_key;
        if matched.is_empty() || unchanged {
            return None;
        }

        let label_of = |auth: i32| {
            reference
                .position_of_auth(auth)
                .map(|i| reference.label_seq_ids()[i])
        };
        if reference.chain_id == test_key && matched.iter().all(|(r, t)| label_of(*r) == Some(*t)) {
            return Some(NumberingReason::LabelScheme);
        }

        Some(NumberingReason::Remap(SeqIdRemap {
            chain_id: reference.chain_id.clone(),
            test_chain_id: test_key.to_string(),
            seq_id_dict: paired.into_iter().map(|(r, t)| (t, r)).collect(),
        }))
    }

    /// Aligns test residues left over by the primary alignment against other unassigned
    /// coordinate chains. Identical copies receive a chain remap.
    fn split_concatenated(
        &self,
        reference: &PolymerChain,
        test_key: &str,
        test: &[(i32, String)],
        alignment: &SequenceAlignment,
        assigned_refs: &HashSet<usize>,
        alignments: &mut Vec<SequenceAlignment>,
    ) -> Vec<(String, Option<ChainIdRemap>)> {
        let aligned: HashSet<i32> = alignment.aligned_pairs().map(|(_, t)| t).collect();
        let mut leftover: Vec<(i32, String)> = test
            .iter()
            .filter(|(s, c)| c != PLACEHOLDER && !aligned.contains(s))
            .cloned()
            .collect();
        if leftover.is_empty() {
            return Vec::new();
        }

        let identical: HashSet<&str> = self
            .index
            .identical_chain_ids(&reference.chain_id)
            .into_iter()
            .collect();
        let mut splits = Vec::new();
        for (r, other) in self.index.polymer_chains().iter().enumerate() {
            if leftover.is_empty() {
                break;
            }
            if other.chain_id == reference.chain_id || assigned_refs.contains(&r) {
                continue;
            }
            let dense = densify(&leftover);
            let split = self.align_chain(other, test_key, &dense);
            let offset = unaligned_test_residues(&split, &dense);
            if !self.passes_coverage_gate(&split, offset)
                || split.sequence_coverage < self.config.min_sequence_coverage
            {
                continue;
            }

            let taken: BTreeMap<i32, i32> = split.aligned_pairs().map(|(r, t)| (t, r)).collect();
            leftover.retain(|(s, _)| !taken.contains_key(s));
            let remap = identical.contains(other.chain_id.as_str()).then(|| ChainIdRemap {
                chain_id: other.chain_id.clone(),
                test_chain_id: test_key.to_string(),
                seq_id_dict: taken,
            });
            log::debug!(
                "restraint chain {} continues on coordinate chain {} (identical: {})",
                test_key,
                other.chain_id,
                remap.is_some()
            );
            alignments.push(split);
            splits.push((other.chain_id.clone(), remap));
        }
        splits
    }
}

enum NumberingReason {
    LabelScheme,
    Remap(SeqIdRemap),
}

fn densify(residues: &[(i32, String)]) -> Vec<(i32, String)> {
    let (Some(first), Some(last)) = (residues.first(), residues.last()) else {
        return Vec::new();
    };
    (first.0..=last.0)
        .map(|seq| {
            let comp = residues
                .iter()
                .find(|(s, _)| *s == seq)
                .map(|(_, c)| c.clone())
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            (seq, comp)
        })
        .collect()
}

/// Drops every run of placeholders at least `threshold` long.
fn collapse_large_gaps(test: &[(i32, String)], threshold: usize) -> Vec<(i32, String)> {
    let mut out = Vec::with_capacity(test.len());
    let mut run: Vec<(i32, String)> = Vec::new();
    for residue in test {
        if residue.1 == PLACEHOLDER {
            run.push(residue.clone());
            continue;
        }
        if run.len() < threshold {
            out.append(&mut run);
        }
        run.clear();
        out.push(residue.clone());
    }
    if run.len() < threshold {
        out.append(&mut run);
    }
    out
}

fn unaligned_test_residues(alignment: &SequenceAlignment, test: &[(i32, String)]) -> usize {
    let aligned: HashSet<i32> = alignment.aligned_pairs().map(|(_, t)| t).collect();
    test.iter()
        .filter(|(s, c)| c != PLACEHOLDER && !aligned.contains(s))
        .count()
}

/// Ruler line with the sequence number printed at the first column and at multiples of ten.
fn gauge(seq_ids: &[Option<i32>]) -> String {
    let mut line = vec![' '; seq_ids.len()];
    let mut free_from = 0;
    let mut first = true;
    for (k, seq) in seq_ids.iter().enumerate() {
        let Some(seq) = seq else { continue };
        if (first || seq % 10 == 0) && k >= free_from {
            let label = seq.to_string();
            if k + label.len() <= line.len() {
                for (offset, ch) in label.chars().enumerate() {
                    line[k + offset] = ch;
                }
                free_from = k + label.len() + 1;
            }
        }
        first = false;
    }
    line.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;
    use crate::model::chain::EntityKind;
    use crate::model::index::CoordinateIndexBuilder;
    use crate::ops::align::GlobalAligner;

    const TEN: [&str; 10] = ["MET", "LYS", "THR", "ALA", "TYR", "ILE", "LEU", "GLY", "SER", "VAL"];

    fn chain(chain_id: &str, entity: &str, start: i32, comps: &[&str]) -> PolymerChain {
        let residues: Vec<(i32, &str)> = comps
            .iter()
            .enumerate()
            .map(|(i, c)| (start + i as i32, *c))
            .collect();
        PolymerChain::from_residues(chain_id, entity, &residues)
    }

    fn reconcile(
        index: &CoordinateIndex,
        poly_seq: &PolySeqRst,
        incoming: &ReasonsForReparsing,
    ) -> ReconcileOutcome {
        let ccd = ChemCompLibrary::standard();
        let config = NormalizerConfig::default();
        let aligner = GlobalAligner::default();
        Reconciler::new(index, &ccd, &config, &aligner).reconcile(poly_seq, incoming, false)
    }

    #[test]
    fn densified_fills_gaps_with_placeholders() {
        let mut poly_seq = PolySeqRst::new();
        poly_seq.add("A", 3, "ALA");
        poly_seq.add("A", 6, "GLY");
        poly_seq.add("A", 3, "SER");

        let dense = poly_seq.densified("A");
        let comps: Vec<&str> = dense.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(comps, vec!["ALA", ".", ".", "GLY"]);
        assert_eq!(dense[0].0, 3);
    }

    #[test]
    fn identical_numbering_publishes_no_reasons() {
        let index = CoordinateIndexBuilder::new().polymer(chain("A", "1", 1, &TEN)).build();
        let mut poly_seq = PolySeqRst::new();
        poly_seq.add("A", 2, "LYS");
        poly_seq.add("A", 5, "TYR");

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());

        assert!(outcome.reasons.is_empty());
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].matched, 2);
        assert!(outcome.alignments.iter().all(SequenceAlignment::is_consistent));
    }

    #[test]
    fn shifted_numbering_produces_seq_id_remap() {
        let index = CoordinateIndexBuilder::new().polymer(chain("B", "1", 1, &TEN)).build();
        let mut poly_seq = PolySeqRst::new();
        for (seq, comp) in [(1, "LEU"), (2, "GLY"), (3, "SER"), (4, "VAL")] {
            poly_seq.add("B", seq, comp);
        }

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());

        assert_eq!(outcome.reasons.seq_id_remap.len(), 1);
        let remap = &outcome.reasons.seq_id_remap[0];
        assert_eq!(remap.chain_id, "B");
        assert_eq!(remap.seq_id_dict.get(&1), Some(&7));
        assert_eq!(remap.seq_id_dict.get(&4), Some(&10));

        let again = reconcile(&index, &poly_seq, &outcome.reasons);
        assert!(again.reasons.is_empty());
    }

    #[test]
    fn label_numbering_is_detected_instead_of_remap() {
        let mut chain_a = PolymerChain::new("A", "1", EntityKind::Polymer);
        for (i, comp) in TEN.iter().enumerate() {
            chain_a.push_residue(101 + i as i32, 1 + i as i32, comp, comp);
        }
        let index = CoordinateIndexBuilder::new().polymer(chain_a).build();
        let mut poly_seq = PolySeqRst::new();
        poly_seq.add("A", 2, "LYS");
        poly_seq.add("A", 7, "LEU");

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());

        assert!(outcome.reasons.label_seq_scheme);
        assert!(outcome.reasons.seq_id_remap.is_empty());
    }

    #[test]
    fn concatenated_chain_is_split_over_identical_copies() {
        let index = CoordinateIndexBuilder::new()
            .polymer(chain("A", "1", 1, &TEN))
            .polymer(chain("B", "1", 1, &TEN))
            .build();
        let mut poly_seq = PolySeqRst::new();
        for (i, comp) in TEN.iter().enumerate() {
            poly_seq.add("A", 1 + i as i32, comp);
            poly_seq.add("A", 11 + i as i32, comp);
        }

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());

        assert_eq!(outcome.reasons.chain_id_remap.len(), 1);
        let remap = &outcome.reasons.chain_id_remap[0];
        assert_eq!(remap.chain_id, "B");
        assert_eq!(remap.seq_id_dict.get(&11), Some(&1));
        assert!(outcome.reasons.seq_id_remap.is_empty());
        assert!(outcome.diagnostics.has(DiagnosticKind::ConcatenatedSequence));
    }

    #[test]
    fn coverage_gate_rejects_unrelated_sequences() {
        let index = CoordinateIndexBuilder::new().polymer(chain("A", "1", 1, &TEN)).build();
        let mut poly_seq = PolySeqRst::new();
        let residues = [(1, "TRP"), (2, "TRP"), (3, "HIS"), (4, "HIS"), (5, "ALA"), (6, "PRO")];
        for (seq, comp) in residues {
            poly_seq.add("A", seq, comp);
        }

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());
        assert!(outcome.assignments.is_empty());
    }

    #[test]
    fn large_gap_is_collapsed_when_it_removes_conflicts() {
        let index = CoordinateIndexBuilder::new().polymer(chain("A", "1", 1, &TEN)).build();
        let mut poly_seq = PolySeqRst::new();
        for (i, comp) in TEN[..5].iter().enumerate() {
            poly_seq.add("A", 1 + i as i32, comp);
        }
        for (i, comp) in TEN[5..].iter().enumerate() {
            poly_seq.add("A", 21 + i as i32, comp);
        }

        let outcome = reconcile(&index, &poly_seq, &ReasonsForReparsing::default());

        assert_eq!(outcome.assignments[0].matched, 10);
        assert_eq!(outcome.assignments[0].conflict, 0);
        let remap = &outcome.reasons.seq_id_remap[0];
        assert_eq!(remap.seq_id_dict.get(&21), Some(&6));
    }

    #[test]
    fn gauge_marks_first_and_every_tenth_residue() {
        let ids: Vec<Option<i32>> = (8..=21).map(Some).collect();
        assert_eq!(gauge(&ids), "8 10        20");
    }

    #[test]
    fn collapse_large_gaps_keeps_short_runs() {
        let residues = [(1, "ALA"), (2, "."), (3, "GLY"), (4, "."), (5, "."), (6, "SER")];
        let test: Vec<(i32, String)> = residues
            .iter()
            .map(|(s, c)| (*s, c.to_string()))
            .collect();
        let collapsed = collapse_large_gaps(&test, 2);
        let seqs: Vec<i32> = collapsed.iter().map(|(s, _)| *s).collect();
        assert_eq!(seqs, vec![1, 2, 3, 6]);
    }
}
