//! AMBER restraint plumbing shared by the AMBER dispatcher.
//!
//! AMBER `&rst` namelists reference atoms by integer. The integers are resolved either
//! through a parameter topology ([`AmberTopologyMapper`]) or through the Sander comment
//! that usually precedes each restraint ([`SanderComment`]). Both routes fill one
//! [`AmberAtomDict`] per pass.

use crate::db::ChemCompStore;
use crate::io::AmberTopology;
use crate::model::atom::CoordAtom;
use crate::model::index::{AtomSite, CoordinateIndex};
use crate::model::types::RestraintSubtype;
use crate::ops::diagnostics::DiagnosticKind;
use crate::ops::translate::{Translator, residue_names_agree};
use crate::ops::validate::Rejection;
use itertools::Itertools;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Integer atom number to coordinate atom, written at most once per number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmberAtomDict {
    entries: BTreeMap<i64, CoordAtom>,
}

impl AmberAtomDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: i64) -> Option<&CoordAtom> {
        self.entries.get(&number)
    }

    pub fn contains(&self, number: i64) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds a number unless it is already bound.
    ///
    /// # Returns
    ///
    /// `true` when the binding was added.
    pub fn insert_once(&mut self, number: i64, atom: CoordAtom) -> bool {
        if self.entries.contains_key(&number) {
            return false;
        }
        self.entries.insert(number, atom);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &CoordAtom)> {
        self.entries.iter().map(|(n, a)| (*n, a))
    }
}

impl FromIterator<(i64, CoordAtom)> for AmberAtomDict {
    fn from_iter<T: IntoIterator<Item = (i64, CoordAtom)>>(iter: T) -> Self {
        let mut dict = Self::new();
        for (number, atom) in iter {
            dict.insert_once(number, atom);
        }
        dict
    }
}

/// One `seq comp atom` triple of a Sander comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanderTriple {
    pub seq_id: i32,
    pub comp_id: String,
    pub atom_id: String,
}

/// Atom triples extracted from the comment preceding a restraint, e.g.
/// `# 10 ALA HA 12 GLY H 5.0` or `# 3 PHE PHI`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanderComment {
    pub triples: Vec<SanderTriple>,
}

fn triple_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?:^|[\s#!(])(-?\d+)\s+"#,
            r#"([A-Za-z][A-Za-z0-9+]{0,3})\s+"#,
            r#"([0-9]?[A-Za-z][A-Za-z0-9'"*#%+]*)"#,
        ))
        .expect("triple pattern is valid")
    })
}

impl SanderComment {
    pub fn parse(text: &str) -> Self {
        let triples = triple_pattern()
            .captures_iter(text)
            .filter_map(|caps| {
                Some(SanderTriple {
                    seq_id: caps[1].parse().ok()?,
                    comp_id: caps[2].to_ascii_uppercase(),
                    atom_id: caps[3].to_string(),
                })
            })
            .collect();
        Self { triples }
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// A single triple naming a torsion (`3 PHE PHI`) instead of an atom.
    pub fn torsion(&self) -> Option<&SanderTriple> {
        match self.triples.as_slice() {
            [only] if crate::ops::dihedral::is_torsion_name(&only.atom_id) => Some(only),
            _ => None,
        }
    }
}

/// Maps prmtop atom numbers onto coordinate atoms.
///
/// Topology residues are walked in order against every coordinate residue, polymers
/// first. An unobserved coordinate residue consumes its topology residue without binding
/// atoms. A topology residue whose name disagrees with the next coordinate residue
/// (solvent, counter ions, caps) is skipped without consuming it.
pub struct AmberTopologyMapper<'a> {
    index: &'a CoordinateIndex,
    translator: Translator<'a>,
}

impl<'a> AmberTopologyMapper<'a> {
    pub fn new(index: &'a CoordinateIndex, ccd: &'a dyn ChemCompStore) -> Self {
        Self {
            index,
            translator: Translator::new(ccd),
        }
    }

    fn coordinate_residues(&self) -> Vec<(&'a str, i32, &'a str, Option<&'a AtomSite>)> {
        let index = self.index;
        index
            .polymer_chains()
            .iter()
            .chain(index.nonpolymer_entities())
            .flat_map(|chain| {
                chain.iter_residues().map(move |(auth, _, comp)| {
                    let site = index.atom_site(&chain.chain_id, auth);
                    (chain.chain_id.as_str(), auth, comp, site)
                })
            })
            .collect()
    }

    fn pick_atom(&self, comp_id: &str, site: &AtomSite, name: &str) -> Option<String> {
        let observed = |id: &str| {
            if site.contains(id) {
                Some(id.to_string())
            } else {
                site.atom_for_alt(id).map(str::to_string)
            }
        };
        self.translator
            .translate(comp_id, name)
            .and_then(|t| t.atom_ids().find_map(|id| observed(id)))
            .or_else(|| observed(name))
    }

    /// Builds the atom dictionary of a topology.
    pub fn map(&self, topology: &AmberTopology) -> AmberAtomDict {
        let residues = self.coordinate_residues();
        let ccd = self.translator.ccd();
        let mut dict = AmberAtomDict::new();
        let mut cursor = 0;
        let mut skipped = 0;

        for r in 0..topology.n_residues() {
            let label = self.translator.translate_residue(&topology.residue_labels[r]);
            let Some(&(chain_id, seq_id, comp_id, site)) = residues.get(cursor) else {
                skipped += 1;
                continue;
            };
            if !residue_names_agree(comp_id, &label, ccd) {
                skipped += 1;
                continue;
            }
            cursor += 1;
            let Some(site) = site else {
                log::debug!(
                    "topology residue {} ({}) is unobserved at {}:{}",
                    r + 1,
                    topology.residue_labels[r],
                    chain_id,
                    seq_id
                );
                continue;
            };

            for a in topology.residue_range(r) {
                let name = &topology.atom_names[a];
                match self.pick_atom(comp_id, site, name) {
                    Some(atom_id) => {
                        let atom = CoordAtom::new(chain_id, seq_id, comp_id, &atom_id).with_source(
                            r as i32 + 1,
                            &topology.residue_labels[r],
                            name,
                        );
                        dict.insert_once(a as i64 + 1, atom);
                    }
                    None => log::debug!(
                        "topology atom {} ({} {}) has no coordinate counterpart",
                        a + 1,
                        topology.residue_labels[r],
                        name
                    ),
                }
            }
        }

        if skipped > 0 {
            log::debug!("{} topology residues had no coordinate counterpart", skipped);
        }
        dict
    }
}

/// One IAT position: a single atom or an IGR group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomColumn {
    Atom(i64),
    Group(Vec<i64>),
}

impl AtomColumn {
    pub fn numbers(&self) -> &[i64] {
        match self {
            AtomColumn::Atom(n) => std::slice::from_ref(n),
            AtomColumn::Group(g) => g,
        }
    }
}

/// Restraint class implied by the number of IAT entries.
///
/// Counts shared by two classes resolve to the generalized distance when `RSTWT` is
/// present, otherwise to the angle variant.
pub fn classify(columns: usize, has_weights: bool) -> Option<RestraintSubtype> {
    match (columns, has_weights) {
        (2, _) => Some(RestraintSubtype::Distance),
        (3, _) => Some(RestraintSubtype::Angle),
        (4, true) | (6, _) => Some(RestraintSubtype::GeneralizedDistance),
        (4, false) => Some(RestraintSubtype::Dihedral),
        (5, _) => Some(RestraintSubtype::PlanePoint),
        (8, true) => Some(RestraintSubtype::GeneralizedDistance),
        (8, false) => Some(RestraintSubtype::PlanePlane),
        _ => None,
    }
}

/// Pairs IAT entries with their IGR groups.
///
/// `igr` is keyed by the 1-based IAT position. A negative IAT entry requires a group with
/// at least two positive members; a positive entry forbids one. Zero terminates an IGR
/// list, and repeated members are dropped with a redundancy note.
///
/// # Returns
///
/// The columns in IAT order plus one message per dropped duplicate.
///
/// # Errors
///
/// Returns an `[Invalid data]` rejection for any inconsistent pairing.
pub fn atom_columns(
    iat: &[i64],
    igr: &BTreeMap<usize, Vec<i64>>,
) -> Result<(Vec<AtomColumn>, Vec<String>), Rejection> {
    let invalid = |message: String| Rejection::new(DiagnosticKind::InvalidData, message);
    let mut columns = Vec::with_capacity(iat.len());
    let mut notes = Vec::new();

    for (k, &number) in iat.iter().enumerate() {
        let position = k + 1;
        let group = igr.get(&position);
        match number {
            0 => return Err(invalid(format!("iat({}) must not be zero", position))),
            n if n > 0 => {
                if group.is_some_and(|g| g.iter().any(|&m| m > 0)) {
                    return Err(invalid(format!(
                        "iat({})={} is positive but igr{} is also defined",
                        position, n, position
                    )));
                }
                columns.push(AtomColumn::Atom(n));
            }
            n => {
                let Some(group) = group else {
                    return Err(invalid(format!(
                        "iat({})={} requires igr{} to be defined",
                        position, n, position
                    )));
                };
                let members: Vec<i64> = group.iter().copied().take_while(|&m| m > 0).collect();
                let distinct: Vec<i64> = members.iter().copied().unique().collect();
                for duplicate in members.iter().duplicates() {
                    notes.push(format!("igr{} lists atom {} more than once", position, duplicate));
                }
                if distinct.len() < 2 {
                    return Err(invalid(format!(
                        "igr{} must list at least two atoms, got {}",
                        position,
                        distinct.len()
                    )));
                }
                columns.push(AtomColumn::Group(distinct));
            }
        }
    }

    if let Some(stray) = igr.keys().find(|&&p| p > iat.len()) {
        return Err(invalid(format!(
            "igr{} is defined but iat has only {} entries",
            stray,
            iat.len()
        )));
    }
    Ok((columns, notes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;
    use crate::model::chain::PolymerChain;
    use crate::model::index::CoordinateIndexBuilder;

    #[test]
    fn atom_dict_binds_each_number_once() {
        let mut dict = AmberAtomDict::new();

        assert!(dict.insert_once(1, CoordAtom::new("A", 10, "ALA", "HA")));
        assert!(!dict.insert_once(1, CoordAtom::new("A", 10, "ALA", "CA")));
        assert_eq!(dict.get(1).map(|a| a.atom_id.as_str()), Some("HA"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn sander_comment_extracts_triples_and_ignores_values() {
        let comment = SanderComment::parse("# 10 ALA HA 12 GLY H 5.0");

        assert_eq!(
            comment.triples,
            vec![
                SanderTriple { seq_id: 10, comp_id: "ALA".into(), atom_id: "HA".into() },
                SanderTriple { seq_id: 12, comp_id: "GLY".into(), atom_id: "H".into() },
            ]
        );
        assert!(comment.torsion().is_none());
    }

    #[test]
    fn sander_comment_recognizes_a_torsion_name() {
        let comment = SanderComment::parse("!  3 PHE PHI");

        let triple = comment.torsion().unwrap();
        assert_eq!(triple.seq_id, 3);
        assert_eq!(triple.atom_id, "PHI");
    }

    #[test]
    fn sander_comment_without_triples_is_empty() {
        assert!(SanderComment::parse("# upper bound tightened").is_empty());
    }

    #[test]
    fn classify_uses_rstwt_to_break_ties() {
        assert_eq!(classify(2, false), Some(RestraintSubtype::Distance));
        assert_eq!(classify(4, false), Some(RestraintSubtype::Dihedral));
        assert_eq!(classify(4, true), Some(RestraintSubtype::GeneralizedDistance));
        assert_eq!(classify(8, false), Some(RestraintSubtype::PlanePlane));
        assert_eq!(classify(8, true), Some(RestraintSubtype::GeneralizedDistance));
        assert_eq!(classify(7, true), None);
    }

    #[test]
    fn atom_columns_pairs_negative_entries_with_groups() {
        let igr = BTreeMap::from([(2, vec![5, 6, 0])]);

        let (columns, notes) = atom_columns(&[1, -1], &igr).unwrap();

        assert_eq!(columns, vec![AtomColumn::Atom(1), AtomColumn::Group(vec![5, 6])]);
        assert!(notes.is_empty());
    }

    #[test]
    fn atom_columns_drops_duplicates_with_a_note() {
        let igr = BTreeMap::from([(1, vec![7, 8, 7])]);

        let (columns, notes) = atom_columns(&[-1, 3], &igr).unwrap();

        assert_eq!(columns[0], AtomColumn::Group(vec![7, 8]));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn atom_columns_rejects_inconsistent_pairings() {
        let missing = atom_columns(&[1, -1], &BTreeMap::new()).unwrap_err();
        assert_eq!(missing.kind, DiagnosticKind::InvalidData);

        let extra = atom_columns(&[1, 2], &BTreeMap::from([(2, vec![5, 6])]));
        assert!(extra.is_err());

        let short = atom_columns(&[1, -1], &BTreeMap::from([(2, vec![5, 5])]));
        assert!(short.is_err());

        assert!(atom_columns(&[0, 2], &BTreeMap::new()).is_err());
    }

    #[test]
    fn topology_mapper_skips_solvent_and_translates_names() {
        let chain = PolymerChain::from_residues("A", "1", &[(1, "MET"), (2, "HIS")]);
        let index = CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 1, &["N", "CA", "H1"])
            .observed("A", 2, &["N", "CA", "HD1"])
            .build();
        let ccd = ChemCompLibrary::standard();
        let topology = AmberTopology {
            atom_names: ["N", "CA", "H1", "O", "H1", "H2", "N", "CA", "HD1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            residue_labels: vec!["MET".into(), "WAT".into(), "HID".into()],
            residue_pointers: vec![0, 3, 6],
        };

        let dict = AmberTopologyMapper::new(&index, &ccd).map(&topology);

        assert_eq!(dict.len(), 6);
        let hd1 = dict.get(9).unwrap();
        assert_eq!((hd1.chain_id.as_str(), hd1.seq_id, hd1.atom_id.as_str()), ("A", 2, "HD1"));
        assert_eq!(hd1.auth_comp_id, "HID");
        assert!(!dict.contains(4));
    }

    #[test]
    fn topology_mapper_steps_over_unobserved_residues() {
        let chain = PolymerChain::from_residues("A", "1", &[(1, "ALA"), (2, "ALA"), (3, "ALA")]);
        let index = CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 1, &["N", "CA"])
            .unobserved("A", 2)
            .observed("A", 3, &["N", "CA"])
            .build();
        let ccd = ChemCompLibrary::standard();
        let topology = AmberTopology {
            atom_names: ["N", "CA", "N", "CA", "N", "CA"].iter().map(|s| s.to_string()).collect(),
            residue_labels: vec!["ALA".into(), "ALA".into(), "ALA".into()],
            residue_pointers: vec![0, 2, 4],
        };

        let dict = AmberTopologyMapper::new(&index, &ccd).map(&topology);

        assert_eq!(dict.len(), 4);
        assert!(!dict.contains(3));
        assert!(!dict.contains(4));
        let n3 = dict.get(5).unwrap();
        assert_eq!((n3.seq_id, n3.atom_id.as_str()), (3, "N"));
        assert_eq!(dict.get(6).unwrap().seq_id, 3);
        assert_eq!(dict.get(2).unwrap().seq_id, 1);
    }
}
