use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Polymer,
    NonPolymer,
}

/// Ordered residue sequence of one coordinate chain.
///
/// The four per-residue arrays are kept parallel: position `i` of each describes the same
/// residue. `comp_ids` holds CCD codes while `auth_comp_ids` keeps the deposited spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymerChain {
    pub chain_id: String,
    pub entity_id: String,
    pub kind: EntityKind,
    auth_seq_ids: Vec<i32>,
    label_seq_ids: Vec<i32>,
    comp_ids: Vec<String>,
    auth_comp_ids: Vec<String>,
}

impl PolymerChain {
    pub fn new(chain_id: &str, entity_id: &str, kind: EntityKind) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            entity_id: entity_id.to_string(),
            kind,
            auth_seq_ids: Vec::new(),
            label_seq_ids: Vec::new(),
            comp_ids: Vec::new(),
            auth_comp_ids: Vec::new(),
        }
    }

    /// Convenience constructor for chains whose label numbering starts at 1 and
    /// whose deposited residue names equal the CCD codes.
    pub fn from_residues(chain_id: &str, entity_id: &str, residues: &[(i32, &str)]) -> Self {
        let mut chain = Self::new(chain_id, entity_id, EntityKind::Polymer);
        for (i, (auth_seq, comp)) in residues.iter().enumerate() {
            chain.push_residue(*auth_seq, i as i32 + 1, comp, comp);
        }
        chain
    }

    pub fn push_residue(
        &mut self,
        auth_seq_id: i32,
        label_seq_id: i32,
        comp_id: &str,
        auth_comp_id: &str,
    ) {
        debug_assert!(
            !self.auth_seq_ids.contains(&auth_seq_id),
            "Attempted to add a duplicate author sequence number '{}' to chain '{}'",
            auth_seq_id,
            self.chain_id
        );
        self.auth_seq_ids.push(auth_seq_id);
        self.label_seq_ids.push(label_seq_id);
        self.comp_ids.push(comp_id.to_string());
        self.auth_comp_ids.push(auth_comp_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.auth_seq_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auth_seq_ids.is_empty()
    }

    pub fn auth_seq_ids(&self) -> &[i32] {
        &self.auth_seq_ids
    }

    pub fn label_seq_ids(&self) -> &[i32] {
        &self.label_seq_ids
    }

    pub fn comp_ids(&self) -> &[String] {
        &self.comp_ids
    }

    pub fn auth_comp_ids(&self) -> &[String] {
        &self.auth_comp_ids
    }

    pub fn position_of_auth(&self, auth_seq_id: i32) -> Option<usize> {
        self.auth_seq_ids.iter().position(|&s| s == auth_seq_id)
    }

    pub fn position_of_label(&self, label_seq_id: i32) -> Option<usize> {
        self.label_seq_ids.iter().position(|&s| s == label_seq_id)
    }

    pub fn comp_id_at_auth(&self, auth_seq_id: i32) -> Option<&str> {
        self.position_of_auth(auth_seq_id)
            .map(|i| self.comp_ids[i].as_str())
    }

    pub fn first_auth_seq_id(&self) -> Option<i32> {
        self.auth_seq_ids.first().copied()
    }

    pub fn last_auth_seq_id(&self) -> Option<i32> {
        self.auth_seq_ids.last().copied()
    }

    /// Iterates `(auth_seq_id, label_seq_id, comp_id)` triples in chain order.
    pub fn iter_residues(&self) -> impl Iterator<Item = (i32, i32, &str)> {
        self.auth_seq_ids
            .iter()
            .zip(&self.label_seq_ids)
            .zip(&self.comp_ids)
            .map(|((a, l), c)| (*a, *l, c.as_str()))
    }

    /// Checks the structural invariants of the sequence arrays.
    ///
    /// Author numbers may jump but must not repeat; label numbers must increase.
    pub fn check_integrity(&self) -> Result<(), String> {
        let n = self.auth_seq_ids.len();
        if self.label_seq_ids.len() != n
            || self.comp_ids.len() != n
            || self.auth_comp_ids.len() != n
        {
            return Err(format!(
                "sequence arrays of chain '{}' differ in length",
                self.chain_id
            ));
        }

        let mut seen = HashSet::with_capacity(n);
        for seq in &self.auth_seq_ids {
            if !seen.insert(*seq) {
                return Err(format!(
                    "author sequence number {} occurs twice in chain '{}'",
                    seq, self.chain_id
                ));
            }
        }

        if self.kind == EntityKind::Polymer
            && self.label_seq_ids.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(format!(
                "label sequence numbers of chain '{}' are not strictly increasing",
                self.chain_id
            ));
        }

        Ok(())
    }
}

impl fmt::Display for PolymerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PolymerChain {{ chain_id: \"{}\", entity: \"{}\", residues: {} }}",
            self.chain_id,
            self.entity_id,
            self.len()
        )
    }
}
