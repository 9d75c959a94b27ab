//! Diagnostics log shared by every stage of a normalization pass.
//!
//! Each entry renders as one plain-text line that starts with a bracketed tag and, when it
//! concerns a particular restraint, ends with the location of that restraint, e.g.
//! `[Atom not found] None of the atoms A:3:ALA:HB1 ... [Check the 2nd row of distance restraints]`.

use crate::model::types::RestraintSubtype;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    InvalidData,
    RangeValueError,
    RangeValueWarning,
    AtomNotFound,
    UnmatchedResidueName,
    SequenceMismatch,
    ConcatenatedSequence,
    InvalidAtomSelection,
    InvalidAtomNomenclature,
    RedundantData,
    MissingData,
}

impl DiagnosticKind {
    pub fn tag(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidData => "Invalid data",
            DiagnosticKind::RangeValueError => "Range value error",
            DiagnosticKind::RangeValueWarning => "Range value warning",
            DiagnosticKind::AtomNotFound => "Atom not found",
            DiagnosticKind::UnmatchedResidueName => "Unmatched residue name",
            DiagnosticKind::SequenceMismatch => "Sequence mismatch",
            DiagnosticKind::ConcatenatedSequence => "Concatenated sequence",
            DiagnosticKind::InvalidAtomSelection => "Invalid atom selection",
            DiagnosticKind::InvalidAtomNomenclature => "Invalid atom nomenclature",
            DiagnosticKind::RedundantData => "Redundant data",
            DiagnosticKind::MissingData => "Missing data",
        }
    }

    /// Warnings accompany an emitted record; every other kind means the record was dropped.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::RangeValueWarning
                | DiagnosticKind::SequenceMismatch
                | DiagnosticKind::ConcatenatedSequence
                | DiagnosticKind::RedundantData
        )
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tag())
    }
}

/// Subtype and 1-based index of the restraint a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestraintLocation {
    pub subtype: RestraintSubtype,
    pub index: u32,
}

impl RestraintLocation {
    pub fn new(subtype: RestraintSubtype, index: u32) -> Self {
        Self { subtype, index }
    }
}

impl fmt::Display for RestraintLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Check the {} row of {}]",
            ordinal(self.index),
            self.subtype.description()
        )
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<RestraintLocation>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " {}", location)?;
        }
        Ok(())
    }
}

/// Ordered collector passed by reference through a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        location: Option<RestraintLocation>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind,
            message: message.into(),
            location,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|d| d.kind == kind)
    }

    /// Removes repeated entries, keeping the first occurrence of each.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.entries.retain(|d| seen.insert(d.clone()));
    }

    /// Rendered log lines in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
