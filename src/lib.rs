//! # NMR Forge
//!
//! **NMR Forge** normalizes NMR restraint files against a coordinate model. Restraints
//! written for AMBER, PALES/DYNAMO/TALOS, BIOSYM, or PIPP name their atoms in force-field
//! or legacy nomenclature and number their residues however the author's tooling did;
//! the engine routes every reference onto an observed atom of the mmCIF model, checks the
//! numbers against physical ranges, and emits uniform restraint records with a plain-text
//! diagnostics log.
//!
//! ## Features
//!
//! - **Nomenclature translation** – IUPAC, XPLOR, and AMBER atom names, pseudo atoms
//!   (`MD1`, `QB`, `HB#`), and force-field residue names map onto CCD atoms, with embedded
//!   TOML templates for the standard residues.
//! - **Atom resolution** – References are matched by author or label numbering, through
//!   chain hints, cyclic polymers, and non-polymers, with exchangeable protons and
//!   unobserved residues dropped quietly.
//! - **Range validation** – Hard and soft envelopes per restraint class, ordered bound
//!   checks, chemical-shift windows informed by BMRB statistics, and RDC/CSA geometry.
//! - **Sequence reconciliation** – Residues referenced by the restraints are aligned to the
//!   coordinate chains; numbering offsets and split chains become reasons for a second
//!   pass.
//! - **Format dispatchers** – Event-driven handlers under `dispatch` share one core that
//!   numbers rows, expands ambiguous selections, and closes each pass.

mod db;
mod driver;
mod model;

pub mod dispatch;
pub mod io;
pub mod ops;

pub use db::{ChemComp, ChemCompAtom, ChemCompKind, ChemCompLibrary, ChemCompStore};
pub use driver::{NormalizedFile, Normalizer};
pub use model::alignment::{ChainAssignment, ConflictResidue, SequenceAlignment, UnmappedResidue};
pub use model::atom::CoordAtom;
pub use model::chain::{EntityKind, PolymerChain};
pub use model::index::{AtomSite, CoordinateIndex, CoordinateIndexBuilder};
pub use model::reasons::{ChainIdRemap, ReasonsForReparsing, SeqIdRemap};
pub use model::restraint::{DstFunc, RestraintRecord};
pub use model::types::{Element, HydrogenKind, Point, RestraintSubtype, SeqScheme};
