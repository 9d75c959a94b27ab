//! Coordinate-anchored atom references produced by the resolver.
//!
//! A [`CoordAtom`] names one atom of the coordinate model in canonical terms while still
//! remembering how the restraint file spelled it. Records, dictionaries, and diagnostics
//! all speak in terms of this type so that downstream consumers never need to consult the
//! source tokens again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical atom identity paired with its as-written source spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordAtom {
    /// Author chain identifier of the coordinate model.
    pub chain_id: String,
    /// Author sequence number of the coordinate residue.
    pub seq_id: i32,
    /// CCD code of the coordinate residue.
    pub comp_id: String,
    /// CCD atom identifier.
    pub atom_id: String,
    /// Sequence number exactly as it appeared in the restraint file.
    pub auth_seq_id: i32,
    /// Residue name exactly as it appeared in the restraint file.
    pub auth_comp_id: String,
    /// Atom name exactly as it appeared in the restraint file.
    pub auth_atom_id: String,
}

impl CoordAtom {
    /// Creates an atom reference whose source spelling equals the canonical one.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - Author chain identifier.
    /// * `seq_id` - Author sequence number.
    /// * `comp_id` - CCD residue code.
    /// * `atom_id` - CCD atom identifier.
    ///
    /// # Returns
    ///
    /// A `CoordAtom` with `auth_*` fields mirroring the canonical ones.
    pub fn new(chain_id: &str, seq_id: i32, comp_id: &str, atom_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            seq_id,
            comp_id: comp_id.to_string(),
            atom_id: atom_id.to_string(),
            auth_seq_id: seq_id,
            auth_comp_id: comp_id.to_string(),
            auth_atom_id: atom_id.to_string(),
        }
    }

    /// Replaces the source spelling while keeping the canonical identity.
    ///
    /// # Arguments
    ///
    /// * `seq_id` - Sequence number used by the restraint file.
    /// * `comp_id` - Residue name used by the restraint file.
    /// * `atom_id` - Atom name used by the restraint file.
    ///
    /// # Returns
    ///
    /// The updated atom reference.
    pub fn with_source(mut self, seq_id: i32, comp_id: &str, atom_id: &str) -> Self {
        self.auth_seq_id = seq_id;
        self.auth_comp_id = comp_id.to_string();
        self.auth_atom_id = atom_id.to_string();
        self
    }

    /// Returns the residue key `(chain_id, seq_id)` of the atom.
    pub fn residue_key(&self) -> (&str, i32) {
        (self.chain_id.as_str(), self.seq_id)
    }

    /// Reports whether two references point at the same residue of the coordinates.
    pub fn same_residue(&self, other: &CoordAtom) -> bool {
        self.chain_id == other.chain_id && self.seq_id == other.seq_id
    }

    /// Reports whether two references point at the same coordinate atom.
    ///
    /// Source spellings are ignored.
    pub fn same_atom(&self, other: &CoordAtom) -> bool {
        self.same_residue(other) && self.atom_id == other.atom_id
    }
}

impl fmt::Display for CoordAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chain_id, self.seq_id, self.comp_id, self.atom_id
        )
    }
}
