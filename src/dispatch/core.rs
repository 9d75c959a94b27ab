use crate::db::ChemCompStore;
use crate::io::ShiftStatistics;
use crate::model::alignment::{ChainAssignment, SequenceAlignment};
use crate::model::atom::CoordAtom;
use crate::model::index::CoordinateIndex;
use crate::model::reasons::ReasonsForReparsing;
use crate::model::restraint::{DstFunc, RestraintRecord};
use crate::model::types::RestraintSubtype;
use crate::ops::{
    AtomRef, AtomResolver, BoundSet, DiagnosticKind, Diagnostics, GlobalAligner, NormalizerConfig,
    RangeValidator, Reconciler, Rejection, ResolveFailure, Resolved, RestraintLocation,
    dihedral_name, element_of, selections_overlap, torsion_atoms, within_one_residue,
};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Everything one pass borrows from its caller, plus the hints it was seeded with.
#[derive(Clone)]
pub struct PassContext<'a> {
    pub index: &'a CoordinateIndex,
    pub ccd: &'a dyn ChemCompStore,
    pub config: &'a NormalizerConfig,
    pub stats: Option<&'a dyn ShiftStatistics>,
    pub reasons: ReasonsForReparsing,
}

impl<'a> PassContext<'a> {
    pub fn new(
        index: &'a CoordinateIndex,
        ccd: &'a dyn ChemCompStore,
        config: &'a NormalizerConfig,
    ) -> Self {
        Self {
            index,
            ccd,
            config,
            stats: None,
            reasons: ReasonsForReparsing::default(),
        }
    }

    pub fn with_stats(mut self, stats: Option<&'a dyn ShiftStatistics>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_reasons(mut self, reasons: ReasonsForReparsing) -> Self {
        self.reasons = reasons;
        self
    }
}

/// Products of one pass over a restraint file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutput {
    pub records: Vec<RestraintRecord>,
    pub diagnostics: Diagnostics,
    pub alignments: Vec<SequenceAlignment>,
    pub assignments: Vec<ChainAssignment>,
    /// Hints for another pass; empty when the pass needs no repetition.
    pub reasons: ReasonsForReparsing,
}

/// Optional record attributes beyond atoms and values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordExtras {
    pub angle_name: Option<String>,
    pub ambig_code: Option<u8>,
    pub sequence_mismatch: bool,
}

/// Rejects selections that share an atom.
pub fn distinct_atoms(selections: &[Vec<CoordAtom>]) -> Result<(), Rejection> {
    if selections_overlap(selections) {
        let atoms = selections.iter().flatten().map(|a| a.to_string()).join(", ");
        return Err(Rejection::new(
            DiagnosticKind::InvalidAtomSelection,
            format!("The atoms {} are not distinct.", atoms),
        ));
    }
    Ok(())
}

/// Rejects selections when two of them touch the same residue.
pub fn distinct_residues(selections: &[Vec<CoordAtom>]) -> Result<(), Rejection> {
    distinct_atoms(selections)?;
    for (left, right) in selections.iter().tuple_combinations() {
        let shared = left
            .iter()
            .find(|a| right.iter().any(|b| a.chain_id == b.chain_id && a.seq_id == b.seq_id));
        if let Some(atom) = shared {
            return Err(Rejection::new(
                DiagnosticKind::InvalidAtomSelection,
                format!(
                    "Two angle atoms lie in residue {}:{}:{}.",
                    atom.chain_id, atom.seq_id, atom.comp_id
                ),
            ));
        }
    }
    Ok(())
}

fn leading_atoms(selections: &[Vec<CoordAtom>]) -> Vec<CoordAtom> {
    selections.iter().filter_map(|s| s.first().cloned()).collect()
}

/// Classifies the four atoms of a dihedral restraint.
///
/// # Returns
///
/// The conventional torsion name, or `None` for a dihedral under no conventional name.
///
/// # Errors
///
/// Rejects overlapping atoms, and four atoms inside one residue.
pub fn dihedral_class(
    ccd: &dyn ChemCompStore,
    selections: &[Vec<CoordAtom>],
) -> Result<Option<&'static str>, Rejection> {
    distinct_atoms(selections)?;
    let atoms = leading_atoms(selections);
    let refs: Vec<&CoordAtom> = atoms.iter().collect();
    if within_one_residue(&refs) {
        return Err(Rejection::new(
            DiagnosticKind::InvalidAtomSelection,
            format!("The dihedral atoms {} lie in one residue.", atoms.iter().join(", ")),
        ));
    }
    Ok(dihedral_name(&atoms, ccd))
}

/// Names the torsion a scalar coupling runs across.
///
/// Couplings such as 3J(HN,HA) sit inside one residue, so only overlapping atoms are
/// rejected.
pub fn coupling_torsion_name(
    ccd: &dyn ChemCompStore,
    selections: &[Vec<CoordAtom>],
) -> Result<Option<&'static str>, Rejection> {
    distinct_atoms(selections)?;
    Ok(dihedral_name(&leading_atoms(selections), ccd))
}

/// State shared by every format dispatcher during one pass.
///
/// Restraint rows are counted per subtype to locate diagnostics; record ids count only the
/// restraints that were emitted. Ambiguous restraints become the cartesian product of
/// their selections, members sharing the id.
pub struct DispatcherCore<'a> {
    index: &'a CoordinateIndex,
    ccd: &'a dyn ChemCompStore,
    config: &'a NormalizerConfig,
    stats: Option<&'a dyn ShiftStatistics>,
    resolver: AtomResolver<'a>,
    validator: RangeValidator<'a>,
    rows: BTreeMap<RestraintSubtype, u32>,
    emitted: BTreeMap<RestraintSubtype, u32>,
    records: Vec<RestraintRecord>,
    diagnostics: Diagnostics,
}

impl<'a> DispatcherCore<'a> {
    pub fn new(context: PassContext<'a>) -> Self {
        let PassContext {
            index,
            ccd,
            config,
            stats,
            reasons,
        } = context;
        Self {
            index,
            ccd,
            config,
            stats,
            resolver: AtomResolver::new(index, ccd, config, reasons),
            validator: RangeValidator::new(config, stats),
            rows: BTreeMap::new(),
            emitted: BTreeMap::new(),
            records: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn index(&self) -> &'a CoordinateIndex {
        self.index
    }

    pub fn ccd(&self) -> &'a dyn ChemCompStore {
        self.ccd
    }

    pub fn config(&self) -> &'a NormalizerConfig {
        self.config
    }

    pub fn stats(&self) -> Option<&'a dyn ShiftStatistics> {
        self.stats
    }

    pub fn resolver(&mut self) -> &mut AtomResolver<'a> {
        &mut self.resolver
    }

    pub fn records(&self) -> &[RestraintRecord] {
        &self.records
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Counts one more restraint row of `subtype` and returns its location.
    pub fn next_location(&mut self, subtype: RestraintSubtype) -> RestraintLocation {
        let row = self.rows.entry(subtype).or_insert(0);
        *row += 1;
        RestraintLocation::new(subtype, *row)
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        location: Option<RestraintLocation>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        if kind.is_warning() {
            log::debug!("{} {}", kind, message);
        } else {
            log::debug!("dropping restraint: {} {}", kind, message);
        }
        self.diagnostics.report(kind, location, message);
    }

    pub fn reject(&mut self, location: RestraintLocation, rejection: Rejection) {
        self.report(rejection.kind, Some(location), rejection.message);
    }

    fn fail(&mut self, location: RestraintLocation, failure: ResolveFailure) {
        match failure {
            ResolveFailure::Silent => {}
            ResolveFailure::Rejected { kind, message } => {
                self.report(kind, Some(location), message)
            }
        }
    }

    /// Resolves one reference, reporting its warnings or the reason it failed.
    pub fn resolve(
        &mut self,
        location: RestraintLocation,
        atom: &AtomRef,
        allow_ambiguity: bool,
    ) -> Option<Resolved> {
        match self.resolver.resolve(atom, allow_ambiguity) {
            Ok(resolved) => {
                for (kind, message) in &resolved.warnings {
                    self.report(*kind, Some(location), message.clone());
                }
                Some(resolved)
            }
            Err(failure) => {
                if failure == ResolveFailure::Silent {
                    log::debug!("{} is not observed, restraint dropped", atom);
                }
                self.fail(location, failure);
                None
            }
        }
    }

    /// Resolves every reference of a restraint.
    ///
    /// All references are attempted even after a failure so that each residue reaches
    /// the restraint-file sequence.
    ///
    /// # Returns
    ///
    /// One selection per reference and whether any of them hit a renamed residue, or
    /// `None` if some reference did not resolve.
    pub fn resolve_all(
        &mut self,
        location: RestraintLocation,
        atoms: &[AtomRef],
        allow_ambiguity: bool,
    ) -> Option<(Vec<Vec<CoordAtom>>, bool)> {
        let mut selections = Vec::with_capacity(atoms.len());
        let mut mismatch = false;
        let mut complete = true;
        for atom in atoms {
            match self.resolve(location, atom, allow_ambiguity) {
                Some(resolved) => {
                    mismatch |= resolved.sequence_mismatch;
                    selections.push(resolved.atoms);
                }
                None => complete = false,
            }
        }
        complete.then_some((selections, mismatch))
    }

    /// Resolves the four atoms of a torsion named on a residue (`3 PHE PHI`).
    ///
    /// Neighbouring residues take their names from the coordinates.
    pub fn resolve_torsion(
        &mut self,
        location: RestraintLocation,
        name: &str,
        chain_hint: Option<&str>,
        seq_id: i32,
        comp_id: &str,
    ) -> Option<(Vec<Vec<CoordAtom>>, bool)> {
        let comp = self.resolver.translator().translate_residue(comp_id);
        let Some(torsion) = torsion_atoms(name, &comp, self.ccd) else {
            self.report(
                DiagnosticKind::InvalidAtomNomenclature,
                Some(location),
                format!("{} is not a torsion angle of {}.", name, comp_id),
            );
            return None;
        };
        let anchor = match self.resolver.locate_residue(chain_hint, seq_id, comp_id) {
            Ok(anchor) => anchor,
            Err(failure) => {
                self.fail(location, failure);
                return None;
            }
        };

        let mut refs = Vec::with_capacity(torsion.len());
        for (offset, atom_id) in torsion {
            let neighbour = if offset == 0 {
                Some(comp_id.to_string())
            } else {
                self.index
                    .comp_id_at(&anchor.chain_id, anchor.seq_id + offset)
                    .map(str::to_string)
            };
            let Some(neighbour) = neighbour else {
                self.report(
                    DiagnosticKind::AtomNotFound,
                    Some(location),
                    format!(
                        "{} of {}:{} needs residue {}, which is absent.",
                        name,
                        anchor.chain_id,
                        anchor.seq_id,
                        anchor.seq_id + offset
                    ),
                );
                return None;
            };
            let mut atom = AtomRef::new(seq_id + offset, &neighbour, atom_id);
            atom.chain_id = chain_hint.map(str::to_string);
            refs.push(atom);
        }
        self.resolve_all(location, &refs, false)
    }

    /// Validates bounds against the envelope of `subtype`, reporting warnings.
    pub fn validate(
        &mut self,
        location: RestraintLocation,
        subtype: RestraintSubtype,
        bounds: BoundSet,
    ) -> Option<BoundSet> {
        let outcome = self.validator.check(subtype, bounds);
        self.settle(location, outcome)
    }

    /// Validates a chemical shift assigned to `atom`.
    pub fn validate_shift(
        &mut self,
        location: RestraintLocation,
        value: f64,
        atom: &CoordAtom,
    ) -> Option<BoundSet> {
        let element = element_of(self.ccd, atom);
        let outcome = self.validator.check_shift(value, atom, element);
        self.settle(location, outcome)
    }

    pub fn validate_weight(&mut self, location: RestraintLocation, weight: f64) -> bool {
        match self.validator.check_weight(weight) {
            Ok(()) => true,
            Err(rejection) => {
                self.reject(location, rejection);
                false
            }
        }
    }

    fn settle(
        &mut self,
        location: RestraintLocation,
        outcome: Result<crate::ops::Validation, Rejection>,
    ) -> Option<BoundSet> {
        match outcome {
            Ok(validation) => {
                for (kind, message) in validation.warnings {
                    self.report(kind, Some(location), message);
                }
                Some(validation.bounds)
            }
            Err(rejection) => {
                self.reject(location, rejection);
                None
            }
        }
    }

    /// Emits one restraint as the cartesian product of its selections.
    ///
    /// The first selection varies slowest. Members are numbered from 1 when the product
    /// holds more than one combination.
    ///
    /// # Returns
    ///
    /// The id assigned to the restraint.
    pub fn emit(
        &mut self,
        subtype: RestraintSubtype,
        selections: Vec<Vec<CoordAtom>>,
        dst_func: DstFunc,
        extras: RecordExtras,
    ) -> u32 {
        let counter = self.emitted.entry(subtype).or_insert(0);
        *counter += 1;
        let id = *counter;

        let combinations: Vec<Vec<CoordAtom>> =
            selections.into_iter().multi_cartesian_product().collect();
        let ambiguous = combinations.len() > 1;
        for (member, atoms) in combinations.into_iter().enumerate() {
            self.records.push(RestraintRecord {
                subtype,
                id,
                member_id: ambiguous.then_some(member as u32 + 1),
                atoms,
                dst_func: dst_func.clone(),
                angle_name: extras.angle_name.clone(),
                ambig_code: extras.ambig_code,
                sequence_mismatch: extras.sequence_mismatch,
            });
        }
        id
    }

    /// Reconciles the sequences referenced during the pass and closes it.
    pub fn finish(self) -> PassOutput {
        let DispatcherCore {
            index,
            ccd,
            config,
            resolver,
            records,
            mut diagnostics,
            ..
        } = self;

        let incoming = resolver.reasons().clone();
        let (poly_seq, label_rescued) = resolver.into_parts();
        let aligner = GlobalAligner::default();
        let outcome = Reconciler::new(index, ccd, config, &aligner).reconcile(
            &poly_seq,
            &incoming,
            label_rescued,
        );

        diagnostics.extend(outcome.diagnostics);
        diagnostics.dedup();
        log::debug!(
            "pass closed with {} records and {} diagnostics",
            records.len(),
            diagnostics.len()
        );

        PassOutput {
            records,
            diagnostics,
            alignments: outcome.alignments,
            assignments: outcome.assignments,
            reasons: outcome.reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;
    use crate::model::chain::PolymerChain;
    use crate::model::index::CoordinateIndexBuilder;

    fn index() -> CoordinateIndex {
        let residues = [(1, "MET"), (2, "GLY"), (3, "PHE"), (4, "LEU")];
        let chain = PolymerChain::from_residues("A", "1", &residues);
        CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 1, &["N", "CA", "C", "H1"])
            .observed("A", 2, &["N", "CA", "C", "H", "HA2", "HA3"])
            .observed("A", 3, &["N", "CA", "C", "CB", "CG", "H"])
            .observed("A", 4, &["N", "CA", "C", "CB", "CG", "CD1", "CD2", "HD11", "HD12", "HD13"])
            .build()
    }

    fn fixture() -> (CoordinateIndex, ChemCompLibrary, NormalizerConfig) {
        (index(), ChemCompLibrary::standard(), NormalizerConfig::default())
    }

    #[test]
    fn emit_numbers_members_of_ambiguous_restraints() {
        let (index, ccd, config) = fixture();
        let mut core = DispatcherCore::new(PassContext::new(&index, &ccd, &config));
        let a = CoordAtom::new("A", 2, "GLY", "H");
        let pair = vec![
            CoordAtom::new("A", 2, "GLY", "HA2"),
            CoordAtom::new("A", 2, "GLY", "HA3"),
        ];
        let mut distance = |selections: Vec<Vec<CoordAtom>>| {
            let (func, extras) = (DstFunc::default(), RecordExtras::default());
            core.emit(RestraintSubtype::Distance, selections, func, extras)
        };

        let first = distance(vec![vec![a.clone()], pair]);
        let second = distance(vec![vec![a.clone()], vec![a]]);

        assert_eq!((first, second), (1, 2));
        let records = core.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].member_id, Some(1));
        assert_eq!(records[1].member_id, Some(2));
        assert_eq!(records[1].atoms[1].atom_id, "HA3");
        assert_eq!(records[2].member_id, None);
    }

    #[test]
    fn locations_count_rows_per_subtype() {
        let (index, ccd, config) = fixture();
        let mut core = DispatcherCore::new(PassContext::new(&index, &ccd, &config));

        core.next_location(RestraintSubtype::Distance);
        let dihedral = core.next_location(RestraintSubtype::Dihedral);
        let distance = core.next_location(RestraintSubtype::Distance);

        assert_eq!(dihedral.index, 1);
        assert_eq!(distance.to_string(), "[Check the 2nd row of distance restraints]");
    }

    #[test]
    fn resolve_torsion_expands_phi_onto_the_preceding_residue() {
        let (index, ccd, config) = fixture();
        let mut core = DispatcherCore::new(PassContext::new(&index, &ccd, &config));
        let location = core.next_location(RestraintSubtype::Dihedral);

        let (selections, mismatch) = core.resolve_torsion(location, "PHI", None, 3, "PHE").unwrap();

        let atoms: Vec<(i32, &str)> =
            selections.iter().map(|s| (s[0].seq_id, s[0].atom_id.as_str())).collect();
        assert_eq!(atoms, vec![(2, "C"), (3, "N"), (3, "CA"), (3, "C")]);
        assert!(!mismatch);
        assert_eq!(dihedral_class(&ccd, &selections).unwrap(), Some("PHI"));
    }

    #[test]
    fn resolve_torsion_reports_a_missing_neighbour() {
        let (index, ccd, config) = fixture();
        let mut core = DispatcherCore::new(PassContext::new(&index, &ccd, &config));
        let location = core.next_location(RestraintSubtype::Dihedral);

        assert!(core.resolve_torsion(location, "PHI", None, 1, "MET").is_none());
        assert!(core.diagnostics().has(DiagnosticKind::AtomNotFound));
    }

    fn residue_atoms(seq_id: i32, comp_id: &str, ids: &[&str]) -> Vec<Vec<CoordAtom>> {
        ids.iter().map(|id| vec![CoordAtom::new("A", seq_id, comp_id, id)]).collect()
    }

    #[test]
    fn dihedral_class_rejects_four_atoms_in_one_residue() {
        let ccd = ChemCompLibrary::standard();

        for ids in [["N", "CA", "C", "CB"], ["N", "CA", "CB", "CG"]] {
            let rejection = dihedral_class(&ccd, &residue_atoms(3, "PHE", &ids)).unwrap_err();
            assert_eq!(rejection.kind, DiagnosticKind::InvalidAtomSelection);
            assert!(rejection.message.contains("lie in one residue"));
        }
    }

    #[test]
    fn coupling_torsion_name_accepts_an_intra_residue_coupling() {
        let ccd = ChemCompLibrary::standard();
        let hn_ha = residue_atoms(3, "PHE", &["H", "N", "CA", "HA"]);
        let chi1 = residue_atoms(3, "PHE", &["N", "CA", "CB", "CG"]);

        assert_eq!(coupling_torsion_name(&ccd, &hn_ha).unwrap(), None);
        assert_eq!(coupling_torsion_name(&ccd, &chi1).unwrap(), Some("CHI1"));

        let repeated = residue_atoms(3, "PHE", &["H", "N", "N", "HA"]);
        assert!(coupling_torsion_name(&ccd, &repeated).is_err());
    }

    #[test]
    fn distinct_residues_rejects_angle_sets_sharing_a_residue() {
        let within = residue_atoms(2, "GLY", &["N", "CA", "C"]);
        let rejection = distinct_residues(&within).unwrap_err();
        assert_eq!(rejection.kind, DiagnosticKind::InvalidAtomSelection);
        assert!(rejection.message.contains("A:2:GLY"));

        let across = vec![
            vec![CoordAtom::new("A", 1, "MET", "C")],
            vec![CoordAtom::new("A", 2, "GLY", "CA")],
            vec![CoordAtom::new("A", 3, "PHE", "N")],
        ];
        assert!(distinct_residues(&across).is_ok());
    }

    #[test]
    fn distinct_atoms_rejects_a_repeated_atom() {
        let atom = CoordAtom::new("A", 3, "PHE", "CA");
        let nitrogen = CoordAtom::new("A", 3, "PHE", "N");
        let selections = vec![vec![atom.clone()], vec![nitrogen], vec![atom]];

        assert!(distinct_atoms(&selections).is_err());
    }

    #[test]
    fn finish_publishes_no_reasons_for_a_consistent_pass() {
        let (index, ccd, config) = fixture();
        let mut core = DispatcherCore::new(PassContext::new(&index, &ccd, &config));
        let location = core.next_location(RestraintSubtype::Distance);
        let refs = [AtomRef::new(2, "GLY", "HN"), AtomRef::new(3, "PHE", "HN")];

        let (selections, _) = core.resolve_all(location, &refs, true).unwrap();
        let extras = RecordExtras::default();
        core.emit(RestraintSubtype::Distance, selections, DstFunc::default(), extras);
        let output = core.finish();

        assert_eq!(output.records.len(), 1);
        assert!(output.reasons.is_empty());
        assert!(output.diagnostics.is_empty());
    }
}
