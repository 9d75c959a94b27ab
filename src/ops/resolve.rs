//! Resolution of restraint atom references onto observed coordinate atoms.
//!
//! An [`AtomResolver`] lives for one pass over a restraint file. Besides answering
//! lookups it accumulates the per-pass state the reconciler needs afterwards: the
//! restraint-file polymer sequence, the chain number dictionary, and whether label
//! numbering had to rescue a reference.

use crate::db::ChemCompStore;
use crate::model::atom::CoordAtom;
use crate::model::index::CoordinateIndex;
use crate::model::reasons::ReasonsForReparsing;
use crate::model::types::SeqScheme;
use crate::ops::config::NormalizerConfig;
use crate::ops::diagnostics::DiagnosticKind;
use crate::ops::reconcile::PolySeqRst;
use crate::ops::translate::{Translator, normalize_atom_name, residue_names_agree};
use std::collections::HashMap;
use std::fmt;

/// One atom reference as spelled in a restraint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomRef {
    /// Chain hint; BIOSYM and PALES files often carry numbers or nothing at all.
    pub chain_id: Option<String>,
    pub seq_id: i32,
    pub comp_id: String,
    pub atom_id: String,
}

impl AtomRef {
    pub fn new(seq_id: i32, comp_id: &str, atom_id: &str) -> Self {
        Self {
            chain_id: None,
            seq_id,
            comp_id: comp_id.to_string(),
            atom_id: atom_id.to_string(),
        }
    }

    pub fn with_chain(mut self, chain_id: &str) -> Self {
        self.chain_id = Some(chain_id.to_string());
        self
    }
}

impl fmt::Display for AtomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(chain) = &self.chain_id {
            write!(f, "{}:", chain)?;
        }
        write!(f, "{}:{}:{}", self.seq_id, self.comp_id, self.atom_id)
    }
}

/// Why a reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// Dropped without a diagnostic: unobserved residue or missing exchangeable proton.
    Silent,
    Rejected { kind: DiagnosticKind, message: String },
}

impl ResolveFailure {
    pub fn rejected(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            message: message.into(),
        }
    }
}

/// Coordinate residue a reference was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueMatch {
    pub chain_id: String,
    /// Author sequence number in the coordinates.
    pub seq_id: i32,
    /// CCD code of the residue in the coordinates.
    pub comp_id: String,
    pub scheme: SeqScheme,
    pub nonpolymer: bool,
    /// Set when the restraint names a different residue at this position.
    pub mismatch: bool,
    /// Chain the hint pinned down when the residue was found on another chain.
    pub hint_chain: Option<String>,
}

/// Atoms a reference resolved to, with the warnings that accompany them.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub atoms: Vec<CoordAtom>,
    pub warnings: Vec<(DiagnosticKind, String)>,
    pub sequence_mismatch: bool,
}

pub struct AtomResolver<'a> {
    index: &'a CoordinateIndex,
    translator: Translator<'a>,
    config: &'a NormalizerConfig,
    reasons: ReasonsForReparsing,
    scheme: SeqScheme,
    label_rescued: bool,
    chain_numbers: HashMap<String, String>,
    last_chain: Option<String>,
    poly_seq: PolySeqRst,
}

impl<'a> AtomResolver<'a> {
    /// Creates a resolver for one pass.
    ///
    /// # Arguments
    ///
    /// * `index` - Coordinate model of the entry.
    /// * `ccd` - Residue dictionary.
    /// * `config` - Normalizer settings; `prefer_auth_seq` picks the first numbering tried.
    /// * `reasons` - Hints published by an earlier pass over the same file.
    pub fn new(
        index: &'a CoordinateIndex,
        ccd: &'a dyn ChemCompStore,
        config: &'a NormalizerConfig,
        reasons: ReasonsForReparsing,
    ) -> Self {
        let scheme = if reasons.label_seq_scheme || !config.prefer_auth_seq {
            SeqScheme::Label
        } else {
            SeqScheme::Author
        };
        Self {
            index,
            translator: Translator::new(ccd),
            config,
            reasons,
            scheme,
            label_rescued: false,
            chain_numbers: HashMap::new(),
            last_chain: None,
            poly_seq: PolySeqRst::new(),
        }
    }

    pub fn index(&self) -> &'a CoordinateIndex {
        self.index
    }

    pub fn translator(&self) -> &Translator<'a> {
        &self.translator
    }

    pub fn ccd(&self) -> &'a dyn ChemCompStore {
        self.translator.ccd()
    }

    /// Numbering scheme tried first for the next reference.
    pub fn preferred_scheme(&self) -> SeqScheme {
        self.scheme
    }

    /// Hints this pass was seeded with.
    pub fn reasons(&self) -> &ReasonsForReparsing {
        &self.reasons
    }

    pub fn label_rescued(&self) -> bool {
        self.label_rescued
    }

    /// Coordinate chain a source chain hint was bound to.
    pub fn chain_number(&self, hint: &str) -> Option<&str> {
        self.chain_numbers.get(hint).map(String::as_str)
    }

    pub fn poly_seq(&self) -> &PolySeqRst {
        &self.poly_seq
    }

    /// Hands over the restraint-file sequence and the label-rescue flag.
    pub fn into_parts(self) -> (PolySeqRst, bool) {
        (self.poly_seq, self.label_rescued)
    }

    /// Resolves one reference to coordinate atoms.
    ///
    /// # Arguments
    ///
    /// * `atom` - Reference as spelled in the restraint file.
    /// * `allow_ambiguity` - Whether a selection of more than one atom is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveFailure::Silent`] for references that are dropped without comment
    /// and [`ResolveFailure::Rejected`] with the diagnostic to log otherwise.
    pub fn resolve(
        &mut self,
        atom: &AtomRef,
        allow_ambiguity: bool,
    ) -> Result<Resolved, ResolveFailure> {
        let (comp_id, atom_id) = self.source_names(atom);
        let hit = self.locate_residue(atom.chain_id.as_deref(), atom.seq_id, &comp_id)?;

        let ids = match self.observed_atoms(&hit, &atom_id, atom) {
            Ok(ids) => ids,
            Err(ResolveFailure::Rejected { .. }) if hit.mismatch => {
                return Err(ResolveFailure::rejected(
                    DiagnosticKind::UnmatchedResidueName,
                    format!(
                        "{} is {} in the coordinates ({}:{}); the atom name does not fit it.",
                        atom, hit.comp_id, hit.chain_id, hit.seq_id
                    ),
                ));
            }
            Err(failure) => return Err(failure),
        };

        if !allow_ambiguity && ids.len() > 1 {
            return Err(ResolveFailure::rejected(
                DiagnosticKind::InvalidAtomSelection,
                format!(
                    "Ambiguous atom selection {} ({}) is not allowed here.",
                    atom,
                    ids.join(", ")
                ),
            ));
        }

        let atoms = ids
            .iter()
            .map(|id| {
                CoordAtom::new(&hit.chain_id, hit.seq_id, &hit.comp_id, id).with_source(
                    atom.seq_id,
                    &atom.comp_id,
                    &atom.atom_id,
                )
            })
            .collect();

        let mut warnings = Vec::new();
        if let Some(pinned) = &hit.hint_chain {
            warnings.push((
                DiagnosticKind::SequenceMismatch,
                format!(
                    "{} is not on chain {} that its chain hint points at; it resolves to \
                     {}:{}:{} instead.",
                    atom, pinned, hit.chain_id, hit.seq_id, hit.comp_id
                ),
            ));
        }
        if hit.mismatch {
            warnings.push((
                DiagnosticKind::SequenceMismatch,
                format!(
                    "Residue name {} of {} disagrees with {} at {}:{} of the coordinates.",
                    atom.comp_id, atom, hit.comp_id, hit.chain_id, hit.seq_id
                ),
            ));
        }
        Ok(Resolved {
            atoms,
            warnings,
            sequence_mismatch: hit.mismatch,
        })
    }

    /// Routes a residue reference to a coordinate residue.
    ///
    /// Remaps from the incoming reasons win. Otherwise both numberings are tried on the
    /// chains the hint pins down, then on every other chain, the preferred numbering
    /// first. A match off the pinned chains carries [`ResidueMatch::hint_chain`] and does
    /// not bind the hint. A reference that only matches a
    /// differently named residue on a chain the hint pins down resolves with
    /// [`ResidueMatch::mismatch`] set. Every reference, resolved or not, is recorded into
    /// the restraint-file polymer sequence.
    pub fn locate_residue(
        &mut self,
        chain_hint: Option<&str>,
        seq_id: i32,
        comp_id: &str,
    ) -> Result<ResidueMatch, ResolveFailure> {
        let key = self.chain_key(chain_hint);
        let remapped = self.remapped(chain_hint, &key, seq_id);

        let (candidates, pinned, seq_id, schemes) = match &remapped {
            Some((chain, seq)) => (vec![chain.clone()], 1, *seq, vec![SeqScheme::Author]),
            None => {
                let (chains, pinned) = self.candidate_chains(chain_hint);
                (chains, pinned, seq_id, vec![self.scheme, self.scheme.other()])
            }
        };

        let (preferred, others) = candidates.split_at(pinned);
        for (chains, off_hint) in [(preferred, false), (others, pinned > 0)] {
            for &scheme in &schemes {
                for chain in chains {
                    for auth in self.auth_seq_ids(chain, seq_id, scheme) {
                        let Some(coord_comp) = self.index.comp_id_at(chain, auth) else {
                            continue;
                        };
                        if self.same_residue_name(coord_comp, comp_id) {
                            let mut hit =
                                self.residue_match(chain, auth, coord_comp, scheme, false);
                            if off_hint {
                                hit.hint_chain = preferred.first().cloned();
                            }
                            self.accept(chain_hint, &hit, comp_id, remapped.is_none());
                            return Ok(hit);
                        }
                    }
                }
            }
        }

        let determined = remapped.as_ref().map(|(c, _)| c.clone()).or_else(|| {
            chain_hint.and_then(|hint| {
                self.chain_numbers
                    .get(hint)
                    .cloned()
                    .or_else(|| self.index.get_chain(hint).map(|c| c.chain_id.clone()))
            })
        });
        if let Some(chain) = determined {
            let scheme = schemes[0];
            let auth = self.auth_seq_ids(&chain, seq_id, scheme).into_iter().next();
            let found = auth.and_then(|a| self.index.comp_id_at(&chain, a).map(|c| (a, c)));
            if let Some((auth, coord_comp)) = found {
                let hit = self.residue_match(&chain, auth, coord_comp, scheme, true);
                self.accept(chain_hint, &hit, comp_id, false);
                return Ok(hit);
            }
        }

        let record_key = remapped.as_ref().map(|(c, _)| c.as_str()).unwrap_or(&key);
        self.poly_seq.add(record_key, seq_id, comp_id);

        let shown = match chain_hint {
            Some(hint) => format!("{}:{}:{}", hint, seq_id, comp_id),
            None => format!("{}:{}", seq_id, comp_id),
        };
        let named_elsewhere = candidates
            .iter()
            .any(|c| self.index.comp_id_at(c, seq_id).is_some());
        if named_elsewhere {
            Err(ResolveFailure::rejected(
                DiagnosticKind::UnmatchedResidueName,
                format!(
                    "Residue {} does not match the residue of the coordinates at that position.",
                    shown
                ),
            ))
        } else {
            Err(ResolveFailure::rejected(
                DiagnosticKind::AtomNotFound,
                format!("Residue {} is not present in the coordinates.", shown),
            ))
        }
    }

    fn source_names(&self, atom: &AtomRef) -> (String, String) {
        let comp_id = self.translator.translate_residue(&atom.comp_id);
        let atom_id = normalize_atom_name(&atom.atom_id);
        if !self.ccd().contains(&comp_id) {
            if let Some(mapping) = self.config.mapped_atom_name(atom.seq_id, &comp_id, &atom_id) {
                return (mapping.target_comp_id.clone(), mapping.target_atom_id.clone());
            }
        }
        (comp_id, atom_id)
    }

    /// Key under which a reference enters the restraint-file polymer sequence.
    fn chain_key(&self, chain_hint: Option<&str>) -> String {
        match chain_hint {
            Some(hint) => self
                .chain_numbers
                .get(hint)
                .cloned()
                .unwrap_or_else(|| hint.to_string()),
            None => self.default_chain(),
        }
    }

    fn default_chain(&self) -> String {
        self.last_chain
            .clone()
            .or_else(|| self.index.polymer_chains().first().map(|c| c.chain_id.clone()))
            .unwrap_or_default()
    }

    fn remapped(&self, chain_hint: Option<&str>, key: &str, seq_id: i32) -> Option<(String, i32)> {
        let mut keys = vec![key.to_string()];
        match chain_hint {
            Some(hint) => keys.push(hint.to_string()),
            None => keys.extend(self.index.polymer_chains().iter().map(|c| c.chain_id.clone())),
        }
        keys.iter()
            .find_map(|k| self.reasons.remap(k, seq_id))
            .map(|(chain, seq)| (chain.to_string(), seq))
    }

    /// Chains searched for a reference.
    ///
    /// # Returns
    ///
    /// The chains in search order, and how many leading entries the hint pins down.
    fn candidate_chains(&self, chain_hint: Option<&str>) -> (Vec<String>, usize) {
        let mut chains: Vec<String> = Vec::new();
        match chain_hint {
            Some(hint) => {
                chains.extend(self.chain_numbers.get(hint).cloned());
                if self.index.has_chain(hint) {
                    chains.push(hint.to_string());
                }
                chains.dedup();
            }
            None => chains.extend(self.last_chain.clone()),
        }
        let pinned = if chain_hint.is_some() { chains.len() } else { 0 };
        chains.extend(self.index.polymer_chains().iter().map(|c| c.chain_id.clone()));
        chains.extend(self.index.nonpolymer_entities().iter().map(|c| c.chain_id.clone()));

        let mut seen = std::collections::HashSet::new();
        chains.retain(|c| seen.insert(c.clone()));
        (chains, pinned)
    }

    /// Author numbers a restraint number may denote under a scheme, cyclic wrap included.
    fn auth_seq_ids(&self, chain_id: &str, seq_id: i32, scheme: SeqScheme) -> Vec<i32> {
        let base = match scheme {
            SeqScheme::Author => Some(seq_id),
            SeqScheme::Label => self.index.label_to_auth(chain_id, seq_id),
        };
        let mut ids: Vec<i32> = base.into_iter().collect();

        if self.index.is_cyclic_polymer(chain_id) {
            if let Some(chain) = self.index.get_chain(chain_id) {
                let len = chain.len() as i32;
                for wrapped in [seq_id - len, seq_id + len] {
                    let auth = match scheme {
                        SeqScheme::Author => Some(wrapped),
                        SeqScheme::Label => self.index.label_to_auth(chain_id, wrapped),
                    };
                    ids.extend(auth.filter(|a| !ids.contains(a)));
                }
            }
        }
        ids
    }

    fn same_residue_name(&self, coord_comp: &str, comp_id: &str) -> bool {
        residue_names_agree(coord_comp, comp_id, self.ccd())
    }

    fn residue_match(
        &self,
        chain_id: &str,
        seq_id: i32,
        comp_id: &str,
        scheme: SeqScheme,
        mismatch: bool,
    ) -> ResidueMatch {
        ResidueMatch {
            chain_id: chain_id.to_string(),
            seq_id,
            comp_id: comp_id.to_string(),
            scheme,
            nonpolymer: self
                .index
                .get_chain(chain_id)
                .is_none_or(|c| c.position_of_auth(seq_id).is_none()),
            mismatch,
            hint_chain: None,
        }
    }

    fn accept(
        &mut self,
        chain_hint: Option<&str>,
        hit: &ResidueMatch,
        comp_id: &str,
        may_switch_scheme: bool,
    ) {
        if !hit.nonpolymer {
            if let Some(hint) = chain_hint.filter(|_| hit.hint_chain.is_none()) {
                if !self.chain_numbers.contains_key(hint) {
                    log::debug!("chain hint {} bound to coordinate chain {}", hint, hit.chain_id);
                    self.chain_numbers.insert(hint.to_string(), hit.chain_id.clone());
                }
            }
            self.poly_seq.add(&hit.chain_id, hit.seq_id, comp_id);
        }

        if may_switch_scheme && hit.scheme != self.scheme {
            if hit.scheme == SeqScheme::Label {
                self.label_rescued = true;
            }
            log::debug!(
                "{:?} numbering resolved {}:{}; preferring it from now on",
                hit.scheme,
                hit.chain_id,
                hit.seq_id
            );
            self.scheme = hit.scheme;
        }
        self.last_chain = Some(hit.chain_id.clone());
    }

    /// Observed atom ids of the residue that the source atom name denotes.
    fn observed_atoms(
        &self,
        hit: &ResidueMatch,
        atom_id: &str,
        atom: &AtomRef,
    ) -> Result<Vec<String>, ResolveFailure> {
        let translation = self.translator.translate(&hit.comp_id, atom_id);
        let Some(site) = self.index.atom_site(&hit.chain_id, hit.seq_id) else {
            if self.index.is_unobserved(&hit.chain_id, hit.seq_id) && translation.is_some() {
                return Err(ResolveFailure::Silent);
            }
            return Err(ResolveFailure::rejected(
                DiagnosticKind::AtomNotFound,
                format!("{} has no observed atoms in the coordinates.", atom),
            ));
        };

        let is_first_residue = self
            .index
            .get_chain(&hit.chain_id)
            .and_then(|c| c.first_auth_seq_id())
            == Some(hit.seq_id);
        let terminal_amide =
            matches!(atom_id, "H" | "HN") && is_first_residue && site.contains("H1");

        let Some(translation) = translation else {
            if site.contains(atom_id) {
                return Ok(vec![atom_id.to_string()]);
            }
            if terminal_amide {
                return Ok(vec!["H1".to_string()]);
            }
            return Err(ResolveFailure::rejected(
                DiagnosticKind::InvalidAtomNomenclature,
                format!("{} is not a valid atom name of {}.", atom, hit.comp_id),
            ));
        };

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for id in translation.atom_ids() {
            let observed = if site.contains(id) {
                Some(id)
            } else {
                site.atom_for_alt(id)
            };
            match observed {
                Some(id) if !found.iter().any(|f: &String| f == id) => found.push(id.to_string()),
                Some(_) => {}
                None => missing.push(id.to_string()),
            }
        }
        if !found.is_empty() {
            return Ok(found);
        }

        if terminal_amide {
            return Ok(vec!["H1".to_string()]);
        }
        if site.contains(atom_id) {
            return Ok(vec![atom_id.to_string()]);
        }
        let labile = self
            .ccd()
            .chem_comp(&translation.comp_id)
            .is_some_and(|comp| missing.iter().all(|id| comp.is_labile_proton(id)));
        if labile && !missing.is_empty() {
            return Err(ResolveFailure::Silent);
        }
        Err(ResolveFailure::rejected(
            DiagnosticKind::AtomNotFound,
            format!(
                "{:?} of {}:{}:{} ({}) are not present in the coordinates.",
                missing, hit.chain_id, hit.seq_id, hit.comp_id, atom
            ),
        ))
    }
}

/// Reports whether two selection sets share an atom.
pub fn selections_overlap(selections: &[Vec<CoordAtom>]) -> bool {
    selections.iter().enumerate().any(|(i, a)| {
        selections[i + 1..]
            .iter()
            .any(|b| a.iter().any(|x| b.iter().any(|y| x.same_atom(y))))
    })
}

/// Reports whether every atom of a combination lies in one residue.
pub fn within_one_residue(atoms: &[&CoordAtom]) -> bool {
    atoms.windows(2).all(|w| w[0].same_residue(w[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;
    use crate::model::chain::{EntityKind, PolymerChain};
    use crate::model::index::CoordinateIndexBuilder;
    use crate::model::reasons::SeqIdRemap;
    use std::collections::BTreeMap;

    fn index() -> CoordinateIndex {
        CoordinateIndexBuilder::new()
            .polymer(PolymerChain::from_residues(
                "A",
                "1",
                &[(1, "MET"), (2, "GLY"), (3, "LEU"), (4, "ALA"), (5, "SER")],
            ))
            .observed("A", 1, &["N", "CA", "C", "H1", "H2", "H3", "HA"])
            .observed("A", 2, &["N", "CA", "C", "H", "HA2", "HA3"])
            .observed(
                "A",
                3,
                &["N", "CA", "H", "CD1", "HD11", "HD12", "HD13", "HD21", "HD22", "HD23"],
            )
            .observed("A", 4, &["N", "CA", "CB", "HB1", "HB2", "HB3"])
            .build()
    }

    fn fixture() -> (CoordinateIndex, ChemCompLibrary, NormalizerConfig, ReasonsForReparsing) {
        (
            index(),
            ChemCompLibrary::standard(),
            NormalizerConfig::default(),
            ReasonsForReparsing::default(),
        )
    }

    fn atom_ids(resolved: &Resolved) -> Vec<&str> {
        resolved.atoms.iter().map(|a| a.atom_id.as_str()).collect()
    }

    fn kind(failure: ResolveFailure) -> Option<DiagnosticKind> {
        match failure {
            ResolveFailure::Silent => None,
            ResolveFailure::Rejected { kind, .. } => Some(kind),
        }
    }

    #[test]
    fn resolver_translates_amide_proton_and_keeps_source_spelling() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver.resolve(&AtomRef::new(2, "GLY", "HN"), false).unwrap();

        assert_eq!(atom_ids(&resolved), vec!["H"]);
        assert_eq!(resolved.atoms[0].chain_id, "A");
        assert_eq!(resolved.atoms[0].auth_atom_id, "HN");
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn resolver_expands_methyl_pseudo_atom_only_when_ambiguity_is_allowed() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);
        let md1 = AtomRef::new(3, "LEU", "MD1").with_chain("A");

        let resolved = resolver.resolve(&md1, true).unwrap();
        assert_eq!(atom_ids(&resolved), vec!["HD11", "HD12", "HD13"]);

        let failure = resolver.resolve(&md1, false).unwrap_err();
        assert_eq!(kind(failure), Some(DiagnosticKind::InvalidAtomSelection));
    }

    #[test]
    fn resolver_retries_terminal_amide_as_h1() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver.resolve(&AtomRef::new(1, "MET", "HN"), false).unwrap();

        assert_eq!(atom_ids(&resolved), vec!["H1"]);
    }

    #[test]
    fn resolver_drops_unobserved_residue_silently() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let failure = resolver.resolve(&AtomRef::new(5, "SER", "HA"), true).unwrap_err();

        assert_eq!(failure, ResolveFailure::Silent);
    }

    #[test]
    fn resolver_drops_missing_labile_proton_silently() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let labile = resolver.resolve(&AtomRef::new(4, "ALA", "H"), true).unwrap_err();
        let carbon_bound = resolver.resolve(&AtomRef::new(4, "ALA", "HA"), true).unwrap_err();

        assert_eq!(labile, ResolveFailure::Silent);
        assert_eq!(kind(carbon_bound), Some(DiagnosticKind::AtomNotFound));
    }

    #[test]
    fn resolver_rejects_unknown_atom_name() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let failure = resolver.resolve(&AtomRef::new(4, "ALA", "QZ"), true).unwrap_err();

        assert_eq!(kind(failure), Some(DiagnosticKind::InvalidAtomNomenclature));
    }

    #[test]
    fn resolver_falls_back_to_label_numbering_and_keeps_it() {
        let mut chain = PolymerChain::new("A", "1", EntityKind::Polymer);
        chain.push_residue(101, 1, "ALA", "ALA");
        chain.push_residue(102, 2, "GLY", "GLY");
        let index = CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 101, &["N", "CA", "HA"])
            .observed("A", 102, &["N", "CA", "HA2"])
            .build();
        let (ccd, config, reasons) = (
            ChemCompLibrary::standard(),
            NormalizerConfig::default(),
            ReasonsForReparsing::default(),
        );
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver.resolve(&AtomRef::new(1, "ALA", "HA"), false).unwrap();

        assert_eq!(resolved.atoms[0].seq_id, 101);
        assert!(resolver.label_rescued());
        assert_eq!(resolver.preferred_scheme(), SeqScheme::Label);
        assert_eq!(resolver.poly_seq().residues("A"), vec![(101, "ALA")]);
    }

    fn two_chains() -> CoordinateIndex {
        CoordinateIndexBuilder::new()
            .polymer(PolymerChain::from_residues("A", "1", &[(1, "ALA"), (2, "GLY")]))
            .polymer(PolymerChain::from_residues("B", "2", &[(1, "GLY"), (2, "GLY")]))
            .observed("A", 1, &["N", "CA", "HA"])
            .observed("A", 2, &["N", "CA", "HA2", "HA3"])
            .observed("B", 1, &["N", "CA", "HA2", "HA3"])
            .observed("B", 2, &["N", "CA", "HA2", "HA3"])
            .build()
    }

    #[test]
    fn resolver_binds_chain_hint_once() {
        let index = two_chains();
        let (ccd, config, reasons) = (
            ChemCompLibrary::standard(),
            NormalizerConfig::default(),
            ReasonsForReparsing::default(),
        );
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let first = resolver
            .resolve(&AtomRef::new(1, "GLY", "HA2").with_chain("1"), false)
            .unwrap();
        assert_eq!(first.atoms[0].chain_id, "B");
        assert!(first.warnings.is_empty());
        assert_eq!(resolver.chain_number("1"), Some("B"));

        let second = resolver
            .resolve(&AtomRef::new(1, "ALA", "HA").with_chain("1"), false)
            .unwrap();
        assert_eq!(second.atoms[0].chain_id, "A");
        assert_eq!(second.warnings.len(), 1);
        assert_eq!(second.warnings[0].0, DiagnosticKind::SequenceMismatch);
        assert!(second.warnings[0].1.contains("chain B"));
        assert_eq!(resolver.chain_number("1"), Some("B"));
    }

    #[test]
    fn match_off_a_named_chain_does_not_rebind_the_hint() {
        let index = two_chains();
        let (ccd, config, reasons) = (
            ChemCompLibrary::standard(),
            NormalizerConfig::default(),
            ReasonsForReparsing::default(),
        );
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let elsewhere = resolver
            .resolve(&AtomRef::new(1, "GLY", "HA2").with_chain("A"), false)
            .unwrap();
        assert_eq!(elsewhere.atoms[0].chain_id, "B");
        assert_eq!(elsewhere.warnings[0].0, DiagnosticKind::SequenceMismatch);
        assert_eq!(resolver.chain_number("A"), None);

        let pinned = resolver
            .resolve(&AtomRef::new(2, "GLY", "HA3").with_chain("A"), false)
            .unwrap();
        assert_eq!(pinned.atoms[0].chain_id, "A");
        assert!(pinned.warnings.is_empty());
    }

    #[test]
    fn resolver_flags_residue_name_mismatch_on_a_named_chain() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver
            .resolve(&AtomRef::new(4, "VAL", "CA").with_chain("A"), false)
            .unwrap();

        assert!(resolved.sequence_mismatch);
        assert_eq!(resolved.atoms[0].comp_id, "ALA");
        assert_eq!(resolved.warnings[0].0, DiagnosticKind::SequenceMismatch);

        let failure = resolver
            .resolve(&AtomRef::new(4, "VAL", "CG1").with_chain("A"), false)
            .unwrap_err();
        assert_eq!(kind(failure), Some(DiagnosticKind::UnmatchedResidueName));
    }

    #[test]
    fn resolver_applies_incoming_seq_id_remap() {
        let (index, ccd, config, _) = fixture();
        let reasons = ReasonsForReparsing {
            seq_id_remap: vec![SeqIdRemap {
                chain_id: "A".to_string(),
                test_chain_id: "A".to_string(),
                seq_id_dict: BTreeMap::from([(13, 3)]),
            }],
            ..Default::default()
        };
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver
            .resolve(&AtomRef::new(13, "LEU", "HD11").with_chain("A"), false)
            .unwrap();

        assert_eq!(resolved.atoms[0].seq_id, 3);
        assert_eq!(resolved.atoms[0].auth_seq_id, 13);
        assert_eq!(resolver.poly_seq().residues("A"), vec![(3, "LEU")]);
    }

    #[test]
    fn resolver_wraps_numbering_of_cyclic_chains() {
        let index = CoordinateIndexBuilder::new()
            .polymer(PolymerChain::from_residues("A", "1", &[(1, "GLY"), (2, "ALA"), (3, "SER")]))
            .observed("A", 1, &["N", "CA", "HA2"])
            .cyclic("A")
            .build();
        let (ccd, config, reasons) = (
            ChemCompLibrary::standard(),
            NormalizerConfig::default(),
            ReasonsForReparsing::default(),
        );
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let resolved = resolver.resolve(&AtomRef::new(4, "GLY", "HA2"), false).unwrap();

        assert_eq!(resolved.atoms[0].seq_id, 1);
    }

    #[test]
    fn unresolved_references_still_enter_the_restraint_sequence() {
        let (index, ccd, config, reasons) = fixture();
        let mut resolver = AtomResolver::new(&index, &ccd, &config, reasons);

        let failure = resolver.resolve(&AtomRef::new(40, "TRP", "HE1"), true).unwrap_err();

        assert_eq!(kind(failure), Some(DiagnosticKind::AtomNotFound));
        let (poly_seq, rescued) = resolver.into_parts();
        assert_eq!(poly_seq.residues("A"), vec![(40, "TRP")]);
        assert!(!rescued);
    }

    #[test]
    fn selections_overlap_detects_shared_atoms() {
        let a = CoordAtom::new("A", 1, "ALA", "CA");
        let b = CoordAtom::new("A", 2, "GLY", "CA");
        assert!(!selections_overlap(&[vec![a.clone()], vec![b.clone()]]));
        assert!(selections_overlap(&[vec![a.clone(), b.clone()], vec![a.clone()]]));
        assert!(within_one_residue(&[&a, &a]));
        assert!(!within_one_residue(&[&a, &b]));
    }
}
