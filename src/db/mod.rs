//! Chemical Component Dictionary access.
//!
//! The engine only ever asks the dictionary two kinds of questions: which atoms a residue
//! may carry, and which of them are bonded. [`ChemCompStore`] captures that lookup surface
//! so callers can plug in a full dictionary, while [`ChemCompLibrary`] layers user-supplied
//! entries over the standard residues embedded in the crate.

mod loader;
mod schema;
mod store;

use crate::model::types::Element;
use std::collections::HashMap;

/// Lookup service returning one CCD entry per component identifier.
pub trait ChemCompStore {
    /// Retrieves the entry for a component.
    ///
    /// # Arguments
    ///
    /// * `comp_id` - CCD code such as `"ALA"` or `"DA"`.
    ///
    /// # Returns
    ///
    /// `Some(&ChemComp)` when the dictionary knows the component, otherwise `None`.
    fn chem_comp(&self, comp_id: &str) -> Option<&ChemComp>;

    fn contains(&self, comp_id: &str) -> bool {
        self.chem_comp(comp_id).is_some()
    }
}

/// Coarse polymer class derived from the CCD `_chem_comp.type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChemCompKind {
    Peptide,
    Dna,
    Rna,
    NonPolymer,
    Other,
}

impl ChemCompKind {
    pub fn from_type(comp_type: &str) -> Self {
        let upper = comp_type.to_ascii_uppercase();
        if upper.contains("PEPTIDE") {
            ChemCompKind::Peptide
        } else if upper.starts_with("DNA") {
            ChemCompKind::Dna
        } else if upper.starts_with("RNA") {
            ChemCompKind::Rna
        } else if upper.contains("NON-POLYMER") {
            ChemCompKind::NonPolymer
        } else {
            ChemCompKind::Other
        }
    }

    pub fn is_nucleotide(&self) -> bool {
        matches!(self, ChemCompKind::Dna | ChemCompKind::Rna)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChemCompAtom {
    pub atom_id: String,
    pub alt_atom_id: Option<String>,
    pub element: Element,
}

/// One CCD entry: atom inventory and covalent bonds of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemComp {
    pub comp_id: String,
    pub name: String,
    pub kind: ChemCompKind,
    pub one_letter_code: Option<char>,
    /// Standard parent of a modified residue (`MSE` -> `MET`).
    pub parent_comp_id: Option<String>,
    /// Release status flag; obsolete entries are kept but flagged.
    pub released: bool,
    atoms: Vec<ChemCompAtom>,
    bonds: Vec<(String, String)>,
}

impl ChemComp {
    pub fn new(comp_id: &str, kind: ChemCompKind) -> Self {
        Self {
            comp_id: comp_id.to_string(),
            name: String::new(),
            kind,
            one_letter_code: None,
            parent_comp_id: None,
            released: true,
            atoms: Vec::new(),
            bonds: Vec::new(),
        }
    }

    /// Builder-style atom insertion; duplicate identifiers are ignored.
    pub fn with_atom(mut self, atom_id: &str, element: Element) -> Self {
        self.push_atom(atom_id, None, element);
        self
    }

    pub fn with_bond(mut self, a1: &str, a2: &str) -> Self {
        self.push_bond(a1, a2);
        self
    }

    pub(crate) fn push_atom(&mut self, atom_id: &str, alt_atom_id: Option<&str>, element: Element) {
        if self.has_atom(atom_id) {
            return;
        }
        self.atoms.push(ChemCompAtom {
            atom_id: atom_id.to_string(),
            alt_atom_id: alt_atom_id
                .filter(|alt| *alt != atom_id)
                .map(str::to_string),
            element,
        });
    }

    pub(crate) fn push_bond(&mut self, a1: &str, a2: &str) {
        debug_assert!(
            self.has_atom(a1) && self.has_atom(a2),
            "Bond {}-{} in CCD entry '{}' refers to an unknown atom",
            a1,
            a2,
            self.comp_id
        );
        if !self.are_bonded(a1, a2) {
            self.bonds.push((a1.to_string(), a2.to_string()));
        }
    }

    pub fn atoms(&self) -> &[ChemCompAtom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[(String, String)] {
        &self.bonds
    }

    pub fn atom_ids(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(|a| a.atom_id.as_str())
    }

    pub fn has_atom(&self, atom_id: &str) -> bool {
        self.atoms.iter().any(|a| a.atom_id == atom_id)
    }

    pub fn atom(&self, atom_id: &str) -> Option<&ChemCompAtom> {
        self.atoms.iter().find(|a| a.atom_id == atom_id)
    }

    /// Maps an alternative CCD atom name onto the canonical identifier.
    pub fn atom_id_for_alt(&self, alt_atom_id: &str) -> Option<&str> {
        self.atoms
            .iter()
            .find(|a| a.alt_atom_id.as_deref() == Some(alt_atom_id))
            .map(|a| a.atom_id.as_str())
    }

    pub fn element_of(&self, atom_id: &str) -> Option<Element> {
        self.atom(atom_id).map(|a| a.element)
    }

    pub fn is_proton(&self, atom_id: &str) -> bool {
        self.element_of(atom_id).is_some_and(|e| e.is_hydrogen())
    }

    pub fn protons(&self) -> impl Iterator<Item = &str> {
        self.atoms
            .iter()
            .filter(|a| a.element.is_hydrogen())
            .map(|a| a.atom_id.as_str())
    }

    pub fn are_bonded(&self, a1: &str, a2: &str) -> bool {
        self.bonds
            .iter()
            .any(|(x, y)| (x == a1 && y == a2) || (x == a2 && y == a1))
    }

    /// Atoms covalently bonded to `atom_id`, in bond declaration order.
    pub fn neighbours(&self, atom_id: &str) -> Vec<&str> {
        self.bonds
            .iter()
            .filter_map(|(x, y)| {
                if x == atom_id {
                    Some(y.as_str())
                } else if y == atom_id {
                    Some(x.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Heavy atom a proton is attached to.
    pub fn heavy_parent(&self, proton: &str) -> Option<&str> {
        self.neighbours(proton)
            .into_iter()
            .find(|n| !self.is_proton(n))
    }

    /// Reports whether a proton sits on N, O or S and therefore exchanges with solvent.
    pub fn is_labile_proton(&self, atom_id: &str) -> bool {
        self.is_proton(atom_id)
            && self
                .heavy_parent(atom_id)
                .and_then(|p| self.element_of(p))
                .is_some_and(|e| e.hosts_labile_proton())
    }

    /// Proton triples hosted by one carbon, ordered by carbon declaration.
    pub fn methyl_groups(&self) -> Vec<Vec<&str>> {
        self.atoms
            .iter()
            .filter(|a| a.element == Element::C)
            .filter_map(|c| {
                let hs: Vec<&str> = self
                    .neighbours(&c.atom_id)
                    .into_iter()
                    .filter(|n| self.is_proton(n))
                    .collect();
                (hs.len() == 3).then_some(hs)
            })
            .collect()
    }
}

/// Embedded standard residues plus caller-supplied entries.
///
/// User entries shadow embedded ones with the same identifier.
#[derive(Debug, Clone)]
pub struct ChemCompLibrary {
    entries: HashMap<String, ChemComp>,
    include_standard: bool,
}

impl ChemCompLibrary {
    /// Library backed by the embedded standard residues.
    pub fn standard() -> Self {
        Self {
            entries: HashMap::new(),
            include_standard: true,
        }
    }

    /// Library holding only explicitly added entries.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            include_standard: false,
        }
    }

    pub fn with_entry(mut self, comp: ChemComp) -> Self {
        self.add(comp);
        self
    }

    pub fn add(&mut self, comp: ChemComp) {
        self.entries.insert(comp.comp_id.clone(), comp);
    }

    pub fn extend(&mut self, comps: impl IntoIterator<Item = ChemComp>) {
        for comp in comps {
            self.add(comp);
        }
    }

    pub fn len(&self) -> usize {
        let embedded = if self.include_standard {
            store::get_store()
                .comps_by_id
                .keys()
                .filter(|k| !self.entries.contains_key(*k))
                .count()
        } else {
            0
        };
        embedded + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChemCompLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

impl ChemCompStore for ChemCompLibrary {
    fn chem_comp(&self, comp_id: &str) -> Option<&ChemComp> {
        self.entries.get(comp_id).or_else(|| {
            if self.include_standard {
                store::get_store().comps_by_id.get(comp_id)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_library_contains_amino_acids_nucleotides_and_water() {
        let library = ChemCompLibrary::standard();

        for comp_id in ["ALA", "GLY", "TRP", "DA", "DT", "A", "U", "HOH"] {
            assert!(library.contains(comp_id), "missing {comp_id}");
        }
        assert_eq!(library.len(), 29);
        assert!(!library.contains("MSE"));
    }

    #[test]
    fn embedded_entries_are_internally_consistent() {
        let library = ChemCompLibrary::standard();
        let comp = library.chem_comp("LEU").unwrap();

        assert_eq!(comp.kind, ChemCompKind::Peptide);
        assert_eq!(comp.one_letter_code, Some('L'));
        assert!(comp.released);
        for (a1, a2) in comp.bonds() {
            assert!(comp.has_atom(a1) && comp.has_atom(a2));
        }
    }

    #[test]
    fn nucleotide_entries_expose_alternative_phosphate_names() {
        let library = ChemCompLibrary::standard();
        let comp = library.chem_comp("DG").unwrap();

        assert!(comp.kind.is_nucleotide());
        assert_eq!(comp.atom_id_for_alt("O1P"), Some("OP1"));
        assert!(comp.has_atom("H2''"));
        assert!(!library.chem_comp("G").unwrap().has_atom("H2''"));
    }

    #[test]
    fn methyl_groups_are_detected_from_bonds() {
        let library = ChemCompLibrary::standard();
        let leu = library.chem_comp("LEU").unwrap();

        assert_eq!(
            leu.methyl_groups(),
            vec![vec!["HD11", "HD12", "HD13"], vec!["HD21", "HD22", "HD23"]]
        );
        assert!(library.chem_comp("GLY").unwrap().methyl_groups().is_empty());
    }

    #[test]
    fn labile_protons_sit_on_nitrogen_oxygen_or_sulfur() {
        let library = ChemCompLibrary::standard();
        let ser = library.chem_comp("SER").unwrap();

        assert!(ser.is_labile_proton("H"));
        assert!(ser.is_labile_proton("HG"));
        assert!(!ser.is_labile_proton("HA"));
        assert!(!ser.is_labile_proton("OG"));
        assert_eq!(ser.heavy_parent("HB2"), Some("CB"));
    }

    #[test]
    fn user_entries_shadow_embedded_entries() {
        let custom = ChemComp::new("ALA", ChemCompKind::Peptide).with_atom("CA", Element::C);
        let library = ChemCompLibrary::standard().with_entry(custom);

        assert_eq!(library.chem_comp("ALA").unwrap().atoms().len(), 1);
        assert_eq!(library.len(), 29);
    }

    #[test]
    fn empty_library_knows_nothing_until_extended() {
        let mut library = ChemCompLibrary::empty();
        assert!(library.is_empty());

        let zinc = ChemComp::new("ZN", ChemCompKind::NonPolymer).with_atom("ZN", Element::Zn);
        library.extend([zinc]);
        assert!(library.contains("ZN"));
        assert!(!library.contains("ALA"));
    }
}
