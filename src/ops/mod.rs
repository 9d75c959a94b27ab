//! Normalization stages applied while a restraint file is walked.
//!
//! Name translation, atom resolution, numeric validation, and sequence reconciliation are
//! independent of the restraint format. The format dispatchers in `dispatch` drive them,
//! and the driver repeats a pass when reconciliation publishes new hints.

mod align;
mod amber;
mod config;
mod diagnostics;
mod dihedral;
mod error;
mod reconcile;
mod resolve;
mod translate;
mod validate;

pub use align::{GlobalAligner, PLACEHOLDER, SequenceAligner};
pub use amber::{
    AmberAtomDict, AmberTopologyMapper, AtomColumn, SanderComment, SanderTriple, atom_columns,
    classify as classify_amber_restraint,
};
pub use config::{AtomNameMapping, Envelope, NormalizerConfig, RangeTable, ShiftWindows, ValueRange};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, RestraintLocation};
pub use dihedral::{
    Torsion, TorsionAtoms, dihedral_name, is_torsion_name, torsion_atoms, torsions_of,
};
pub use error::Error;
pub use reconcile::{PolySeqRst, ReconcileOutcome, Reconciler};
pub use resolve::{
    AtomRef, AtomResolver, ResidueMatch, ResolveFailure, Resolved, selections_overlap,
    within_one_residue,
};
pub use translate::{
    TranslatedAtom, Translation, Translator, alternate_residue_name, normalize_atom_name,
    parent_residue_name, residue_names_agree,
};
pub use validate::{
    BoundSet, RangeValidator, Rejection, Validation, are_one_bond_apart, check_csa_triplet,
    check_rdc_pair, element_of, shift_ambiguity_code,
};
