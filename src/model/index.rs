//! Read-only view of a coordinate model tailored to restraint resolution.
//!
//! The [`CoordinateIndex`] keeps only what atom resolution needs: polymer and non-polymer
//! sequences in both numbering schemes, observed atom sites of the representative model,
//! unobserved residues, and cyclic closure flags. Instances are assembled with
//! [`CoordinateIndexBuilder`] (directly in tests, or by the mmCIF reader) and are never
//! mutated once built.

use super::chain::{EntityKind, PolymerChain};
use super::types::Point;
use std::collections::{HashMap, HashSet};

type ResidueKey = (String, i32);

/// Atoms observed for one residue of the representative model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomSite {
    atom_ids: Vec<String>,
    alt_atom_ids: Vec<String>,
    positions: Vec<Point>,
}

impl AtomSite {
    fn push(&mut self, atom_id: &str, alt_atom_id: &str, position: Point) {
        if self.atom_ids.iter().any(|a| a == atom_id) {
            return;
        }
        self.atom_ids.push(atom_id.to_string());
        self.alt_atom_ids.push(alt_atom_id.to_string());
        self.positions.push(position);
    }

    pub fn atom_ids(&self) -> &[String] {
        &self.atom_ids
    }

    pub fn alt_atom_ids(&self) -> &[String] {
        &self.alt_atom_ids
    }

    pub fn len(&self) -> usize {
        self.atom_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_ids.is_empty()
    }

    pub fn contains(&self, atom_id: &str) -> bool {
        self.atom_ids.iter().any(|a| a == atom_id)
    }

    /// Maps an alternative (author) atom name back to the canonical atom id.
    pub fn atom_for_alt(&self, alt_atom_id: &str) -> Option<&str> {
        self.alt_atom_ids
            .iter()
            .position(|a| a == alt_atom_id)
            .map(|i| self.atom_ids[i].as_str())
    }

    pub fn position(&self, atom_id: &str) -> Option<Point> {
        self.atom_ids
            .iter()
            .position(|a| a == atom_id)
            .map(|i| self.positions[i])
    }
}

/// Immutable coordinate model index shared by every dispatcher of a run.
#[derive(Debug, Clone, Default)]
pub struct CoordinateIndex {
    polymers: Vec<PolymerChain>,
    nonpolymers: Vec<PolymerChain>,
    atom_sites: HashMap<ResidueKey, AtomSite>,
    unobserved: HashSet<ResidueKey>,
    label_to_auth: HashMap<ResidueKey, i32>,
    auth_to_label: HashMap<ResidueKey, i32>,
    cyclic: HashSet<String>,
}

impl CoordinateIndex {
    /// Looks up a polymer chain by its author chain identifier.
    pub fn get_chain(&self, chain_id: &str) -> Option<&PolymerChain> {
        self.polymers.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn polymer_chains(&self) -> &[PolymerChain] {
        &self.polymers
    }

    pub fn nonpolymer_entities(&self) -> &[PolymerChain] {
        &self.nonpolymers
    }

    /// Iterates the non-polymer entities deposited under one author chain.
    pub fn nonpolymers_in<'s>(&'s self, chain_id: &str) -> impl Iterator<Item = &'s PolymerChain> {
        self.nonpolymers.iter().filter(move |c| c.chain_id == chain_id)
    }

    pub fn has_chain(&self, chain_id: &str) -> bool {
        self.get_chain(chain_id).is_some() || self.nonpolymers_in(chain_id).next().is_some()
    }

    pub fn atom_site(&self, chain_id: &str, seq_id: i32) -> Option<&AtomSite> {
        self.atom_sites.get(&(chain_id.to_string(), seq_id))
    }

    /// Reports whether a residue is absent from the representative model.
    pub fn is_unobserved(&self, chain_id: &str, seq_id: i32) -> bool {
        self.unobserved.contains(&(chain_id.to_string(), seq_id))
    }

    /// CCD code of a residue, searching polymers first and then non-polymers.
    pub fn comp_id_at<'s>(&'s self, chain_id: &str, seq_id: i32) -> Option<&'s str> {
        self.get_chain(chain_id)
            .and_then(|c| c.comp_id_at_auth(seq_id))
            .or_else(|| {
                self.nonpolymers_in(chain_id)
                    .find_map(|c| c.comp_id_at_auth(seq_id))
            })
    }

    pub fn label_to_auth(&self, chain_id: &str, label_seq_id: i32) -> Option<i32> {
        self.label_to_auth
            .get(&(chain_id.to_string(), label_seq_id))
            .copied()
    }

    pub fn auth_to_label(&self, chain_id: &str, auth_seq_id: i32) -> Option<i32> {
        self.auth_to_label
            .get(&(chain_id.to_string(), auth_seq_id))
            .copied()
    }

    /// True when the terminal residues of the chain are covalently joined.
    pub fn is_cyclic_polymer(&self, chain_id: &str) -> bool {
        self.cyclic.contains(chain_id)
    }

    /// Other polymer chains carrying the same entity as `chain_id`.
    pub fn identical_chain_ids(&self, chain_id: &str) -> Vec<&str> {
        let Some(chain) = self.get_chain(chain_id) else {
            return Vec::new();
        };
        self.polymers
            .iter()
            .filter(|c| c.chain_id != chain_id && c.entity_id == chain.entity_id)
            .map(|c| c.chain_id.as_str())
            .collect()
    }

    pub fn position(&self, chain_id: &str, seq_id: i32, atom_id: &str) -> Option<Point> {
        self.atom_site(chain_id, seq_id)
            .and_then(|site| site.position(atom_id))
    }

    /// Verifies polymer sequences against the invariants of [`PolymerChain`].
    ///
    /// # Returns
    ///
    /// `Ok(())` when every polymer is consistent, or the first violation found.
    pub fn check_integrity(&self) -> Result<(), String> {
        for chain in &self.polymers {
            chain.check_integrity()?;
        }
        Ok(())
    }
}

/// Incremental constructor for [`CoordinateIndex`].
///
/// Residues of polymer chains that never receive an atom are recorded as unobserved when
/// the index is built.
#[derive(Debug, Default)]
pub struct CoordinateIndexBuilder {
    polymers: Vec<PolymerChain>,
    nonpolymers: Vec<PolymerChain>,
    atom_sites: HashMap<ResidueKey, AtomSite>,
    unobserved: HashSet<ResidueKey>,
    cyclic: HashSet<String>,
}

impl CoordinateIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polymer(mut self, chain: PolymerChain) -> Self {
        self.polymers.push(chain);
        self
    }

    pub fn nonpolymer(mut self, mut entity: PolymerChain) -> Self {
        entity.kind = EntityKind::NonPolymer;
        self.nonpolymers.push(entity);
        self
    }

    /// Records one observed atom with its author spelling and position.
    pub fn atom(
        mut self,
        chain_id: &str,
        seq_id: i32,
        atom_id: &str,
        alt_atom_id: &str,
        position: Point,
    ) -> Self {
        self.push_atom(chain_id, seq_id, atom_id, alt_atom_id, position);
        self
    }

    /// Records a set of observed atoms at the origin, author spelling equal to the id.
    pub fn observed(mut self, chain_id: &str, seq_id: i32, atom_ids: &[&str]) -> Self {
        for atom_id in atom_ids {
            self.push_atom(chain_id, seq_id, atom_id, atom_id, Point::origin());
        }
        self
    }

    pub fn unobserved(mut self, chain_id: &str, seq_id: i32) -> Self {
        self.unobserved.insert((chain_id.to_string(), seq_id));
        self
    }

    pub fn cyclic(mut self, chain_id: &str) -> Self {
        self.cyclic.insert(chain_id.to_string());
        self
    }

    pub(crate) fn push_atom(
        &mut self,
        chain_id: &str,
        seq_id: i32,
        atom_id: &str,
        alt_atom_id: &str,
        position: Point,
    ) {
        self.atom_sites
            .entry((chain_id.to_string(), seq_id))
            .or_default()
            .push(atom_id, alt_atom_id, position);
    }

    pub(crate) fn push_polymer(&mut self, chain: PolymerChain) {
        self.polymers.push(chain);
    }

    pub(crate) fn push_nonpolymer(&mut self, entity: PolymerChain) {
        self.nonpolymers.push(entity);
    }

    pub(crate) fn mark_unobserved(&mut self, chain_id: &str, seq_id: i32) {
        self.unobserved.insert((chain_id.to_string(), seq_id));
    }

    pub(crate) fn mark_cyclic(&mut self, chain_id: &str) {
        self.cyclic.insert(chain_id.to_string());
    }

    pub(crate) fn polymers(&self) -> &[PolymerChain] {
        &self.polymers
    }

    pub(crate) fn position(&self, chain_id: &str, seq_id: i32, atom_id: &str) -> Option<Point> {
        self.atom_sites
            .get(&(chain_id.to_string(), seq_id))
            .and_then(|site| site.position(atom_id))
    }

    pub fn build(self) -> CoordinateIndex {
        let mut label_to_auth = HashMap::new();
        let mut auth_to_label = HashMap::new();
        let mut unobserved = self.unobserved;

        for chain in &self.polymers {
            for (auth, label, _) in chain.iter_residues() {
                label_to_auth.insert((chain.chain_id.clone(), label), auth);
                auth_to_label.insert((chain.chain_id.clone(), auth), label);
                let key = (chain.chain_id.clone(), auth);
                if !self.atom_sites.contains_key(&key) {
                    unobserved.insert(key);
                }
            }
        }

        CoordinateIndex {
            polymers: self.polymers,
            nonpolymers: self.nonpolymers,
            atom_sites: self.atom_sites,
            unobserved,
            label_to_auth,
            auth_to_label,
            cyclic: self.cyclic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chain_index() -> CoordinateIndex {
        let mut chain_b = PolymerChain::new("B", "1", EntityKind::Polymer);
        chain_b.push_residue(7, 1, "LEU", "LEU");
        chain_b.push_residue(8, 2, "ALA", "ALA");

        CoordinateIndexBuilder::new()
            .polymer(PolymerChain::from_residues("A", "1", &[(1, "MET"), (2, "GLY")]))
            .polymer(chain_b)
            .nonpolymer(PolymerChain::from_residues("A", "2", &[(101, "ZN")]))
            .observed("A", 1, &["N", "CA", "H"])
            .atom("A", 2, "HA2", "HA1", Point::new(1.0, 2.0, 3.0))
            .observed("B", 7, &["N", "CA", "HD11"])
            .observed("A", 101, &["ZN"])
            .build()
    }

    #[test]
    fn label_and_author_maps_are_mutual_inverses() {
        let index = two_chain_index();

        assert_eq!(index.label_to_auth("B", 1), Some(7));
        assert_eq!(index.auth_to_label("B", 8), Some(2));
        assert_eq!(index.label_to_auth("B", 3), None);
    }

    #[test]
    fn residues_without_atoms_are_reported_unobserved() {
        let index = two_chain_index();

        assert!(index.is_unobserved("B", 8));
        assert!(!index.is_unobserved("B", 7));
        assert!(!index.is_unobserved("A", 101));
    }

    #[test]
    fn atom_site_answers_canonical_and_alternative_names() {
        let index = two_chain_index();
        let site = index.atom_site("A", 2).unwrap();

        assert!(site.contains("HA2"));
        assert_eq!(site.atom_for_alt("HA1"), Some("HA2"));
        assert_eq!(index.position("A", 2, "HA2"), Some(Point::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn comp_id_at_falls_back_to_nonpolymers() {
        let index = two_chain_index();

        assert_eq!(index.comp_id_at("A", 1), Some("MET"));
        assert_eq!(index.comp_id_at("A", 101), Some("ZN"));
        assert_eq!(index.comp_id_at("A", 50), None);
        let found = {
            let chain_id = String::from("A");
            index.comp_id_at(&chain_id, 101)
        };
        assert_eq!(found, Some("ZN"));
        assert!(index.has_chain("A"));
        assert!(!index.has_chain("C"));
    }

    #[test]
    fn identical_chains_share_an_entity() {
        let index = two_chain_index();

        assert_eq!(index.identical_chain_ids("A"), vec!["B"]);
        assert!(index.identical_chain_ids("Z").is_empty());
    }

    #[test]
    fn cyclic_flag_is_per_chain() {
        let index = CoordinateIndexBuilder::new()
            .polymer(PolymerChain::from_residues("A", "1", &[(1, "GLY"), (2, "GLY")]))
            .cyclic("A")
            .build();

        assert!(index.is_cyclic_polymer("A"));
        assert!(!index.is_cyclic_polymer("B"));
    }

    #[test]
    fn duplicate_atoms_in_one_residue_keep_the_first_position() {
        let index = CoordinateIndexBuilder::new()
            .atom("A", 1, "CA", "CA", Point::new(1.0, 0.0, 0.0))
            .atom("A", 1, "CA", "CA", Point::new(9.0, 0.0, 0.0))
            .build();

        assert_eq!(index.atom_site("A", 1).unwrap().len(), 1);
        assert_eq!(index.position("A", 1, "CA"), Some(Point::new(1.0, 0.0, 0.0)));
    }
}
