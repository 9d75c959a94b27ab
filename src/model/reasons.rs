//! Recovery hints published by one normalization pass and consumed by the next.
//!
//! The bag is intentionally opaque to callers: it is produced by the reconciler at the end
//! of a pass, may be serialized to JSON, and is handed back unchanged to seed a second
//! pass over the same parser events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-residue renumbering of one restraint chain onto one coordinate chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqIdRemap {
    /// Coordinate chain receiving the residues.
    pub chain_id: String,
    /// Restraint chain key the residues were referenced under.
    pub test_chain_id: String,
    /// Restraint sequence number to coordinate author sequence number.
    pub seq_id_dict: BTreeMap<i32, i32>,
}

impl SeqIdRemap {
    pub fn lookup(&self, test_chain_id: &str, seq_id: i32) -> Option<(&str, i32)> {
        if self.test_chain_id != test_chain_id {
            return None;
        }
        self.seq_id_dict
            .get(&seq_id)
            .map(|s| (self.chain_id.as_str(), *s))
    }
}

/// Residues of a concatenated restraint chain that belong to another identical copy.
pub type ChainIdRemap = SeqIdRemap;

/// Hints for reparsing a restraint file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonsForReparsing {
    /// The restraint file numbers residues with label (not author) sequence ids.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub label_seq_scheme: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seq_id_remap: Vec<SeqIdRemap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain_id_remap: Vec<ChainIdRemap>,
}

impl ReasonsForReparsing {
    pub fn is_empty(&self) -> bool {
        !self.label_seq_scheme && self.seq_id_remap.is_empty() && self.chain_id_remap.is_empty()
    }

    /// Routes a referenced residue through the remaps, split remaps first.
    ///
    /// # Arguments
    ///
    /// * `test_chain_id` - Restraint chain key under which the residue was referenced.
    /// * `seq_id` - Restraint sequence number.
    ///
    /// # Returns
    ///
    /// `Some((chain_id, seq_id))` in the coordinate model when a remap covers the residue.
    pub fn remap(&self, test_chain_id: &str, seq_id: i32) -> Option<(&str, i32)> {
        self.chain_id_remap
            .iter()
            .chain(&self.seq_id_remap)
            .find_map(|r| r.lookup(test_chain_id, seq_id))
    }

    /// Returns the hints of `self` that `previous` does not already carry.
    pub fn without(&self, previous: &ReasonsForReparsing) -> ReasonsForReparsing {
        ReasonsForReparsing {
            label_seq_scheme: self.label_seq_scheme && !previous.label_seq_scheme,
            seq_id_remap: self
                .seq_id_remap
                .iter()
                .filter(|r| !previous.seq_id_remap.contains(r))
                .cloned()
                .collect(),
            chain_id_remap: self
                .chain_id_remap
                .iter()
                .filter(|r| !previous.chain_id_remap.contains(r))
                .cloned()
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
