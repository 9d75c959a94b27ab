//! Numeric envelope checks per restraint class.
//!
//! A value outside the hard range of its class rejects the restraint; a value inside the
//! hard range but outside the soft range only produces a warning. Bounds given together
//! must be ordered `lower_linear <= lower <= upper <= upper_linear`, and equal bounds are
//! accepted. Low distance outliers may be elided instead of rejected when
//! `omit_distance_outlier` is on; ordering is then checked on the surviving bounds.

use crate::db::ChemCompStore;
use crate::io::ShiftStatistics;
use crate::model::atom::CoordAtom;
use crate::model::restraint::DstFunc;
use crate::model::types::{Element, RestraintSubtype};
use crate::ops::config::{NormalizerConfig, ValueRange};
use crate::ops::diagnostics::DiagnosticKind;
use std::collections::HashSet;

/// Target and bounds of one restraint as read from the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundSet {
    pub target_value: Option<f64>,
    pub lower_linear_limit: Option<f64>,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
    pub upper_linear_limit: Option<f64>,
}

impl BoundSet {
    pub fn target(value: f64) -> Self {
        Self {
            target_value: Some(value),
            ..Default::default()
        }
    }

    pub fn range(lower: f64, upper: f64) -> Self {
        Self {
            lower_limit: Some(lower),
            upper_limit: Some(upper),
            ..Default::default()
        }
    }

    fn named(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("target_value", self.target_value),
            ("lower_linear_limit", self.lower_linear_limit),
            ("lower_limit", self.lower_limit),
            ("upper_limit", self.upper_limit),
            ("upper_linear_limit", self.upper_linear_limit),
        ]
    }

    fn set(&mut self, name: &str, value: Option<f64>) {
        match name {
            "target_value" => self.target_value = value,
            "lower_linear_limit" => self.lower_linear_limit = value,
            "lower_limit" => self.lower_limit = value,
            "upper_limit" => self.upper_limit = value,
            _ => self.upper_linear_limit = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.named().iter().all(|(_, v)| v.is_none())
    }

    /// Copies the bounds into a distance function carrying `weight`.
    pub fn into_dst_func(self, weight: f64) -> DstFunc {
        let mut func = DstFunc::with_weight(weight);
        func.target_value = self.target_value;
        func.lower_linear_limit = self.lower_linear_limit;
        func.lower_limit = self.lower_limit;
        func.upper_limit = self.upper_limit;
        func.upper_linear_limit = self.upper_linear_limit;
        func
    }
}

/// A restraint the validator refused, with the diagnostic to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Bounds that passed validation and the warnings raised on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub bounds: BoundSet,
    pub warnings: Vec<(DiagnosticKind, String)>,
}

pub struct RangeValidator<'a> {
    config: &'a NormalizerConfig,
    stats: Option<&'a dyn ShiftStatistics>,
}

impl<'a> RangeValidator<'a> {
    pub fn new(config: &'a NormalizerConfig, stats: Option<&'a dyn ShiftStatistics>) -> Self {
        Self { config, stats }
    }

    /// Rejects weights that are not strictly positive.
    pub fn check_weight(&self, weight: f64) -> Result<(), Rejection> {
        if weight.is_finite() && weight > 0.0 {
            Ok(())
        } else {
            Err(Rejection::new(
                DiagnosticKind::InvalidData,
                format!("The weight value '{}' must be positive.", weight),
            ))
        }
    }

    /// Validates the bounds of a restraint against the envelope of its class.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] tagged `Range value error` for values outside the hard range
    /// or out of order, `Invalid data` for non-finite values, and `Range value warning`
    /// when every distance bound was elided as an outlier.
    pub fn check(
        &self,
        subtype: RestraintSubtype,
        bounds: BoundSet,
    ) -> Result<Validation, Rejection> {
        let envelope = self.config.ranges.envelope(subtype);
        self.check_with(subtype, bounds, envelope.hard, &[envelope.soft])
    }

    /// Validates a chemical shift observed on `atom`.
    ///
    /// Besides the class envelope, the element window and the range observed in the
    /// statistics, when available, are soft limits.
    pub fn check_shift(
        &self,
        value: f64,
        atom: &CoordAtom,
        element: Element,
    ) -> Result<Validation, Rejection> {
        let ranges = &self.config.ranges;
        let mut soft = vec![ranges.chemical_shift.soft, ranges.shift_window(element)];
        if let Some(stat) = self
            .stats
            .and_then(|s| s.shift_stat(&atom.comp_id, &atom.atom_id))
        {
            soft.push(ValueRange::closed(stat.min, stat.max));
        }
        self.check_with(
            RestraintSubtype::ChemicalShift,
            BoundSet::target(value),
            ranges.chemical_shift.hard,
            &soft,
        )
    }

    fn check_with(
        &self,
        subtype: RestraintSubtype,
        mut bounds: BoundSet,
        hard: ValueRange,
        soft: &[ValueRange],
    ) -> Result<Validation, Rejection> {
        let mut warnings = Vec::new();

        for (name, value) in bounds.named() {
            if let Some(v) = value.filter(|v| !v.is_finite()) {
                return Err(Rejection::new(
                    DiagnosticKind::InvalidData,
                    format!("The {} value '{}' is not a number.", name, v),
                ));
            }
        }

        let distance_like = matches!(
            subtype,
            RestraintSubtype::Distance | RestraintSubtype::GeneralizedDistance
        );
        if distance_like && self.config.omit_distance_outlier && !bounds.is_empty() {
            for (name, value) in bounds.named() {
                if let Some(v) = value.filter(|v| !hard.contains(*v) && *v <= hard.min) {
                    bounds.set(name, None);
                    warnings.push((
                        DiagnosticKind::RangeValueWarning,
                        format!(
                            "The {} value '{}' is below the range {} and was omitted.",
                            name,
                            v,
                            hard.describe()
                        ),
                    ));
                }
            }
            if bounds.is_empty() {
                let message = warnings
                    .into_iter()
                    .map(|(_, m)| m)
                    .collect::<Vec<_>>()
                    .join(" ");
                return Err(Rejection::new(DiagnosticKind::RangeValueWarning, message));
            }
        }

        for (name, value) in bounds.named() {
            if let Some(v) = value.filter(|v| !hard.contains(*v)) {
                return Err(Rejection::new(
                    DiagnosticKind::RangeValueError,
                    format!(
                        "The {} value '{}' must be within the range {}.",
                        name,
                        v,
                        hard.describe()
                    ),
                ));
            }
        }

        check_order(&bounds)?;

        for (name, value) in bounds.named() {
            let Some(v) = value else { continue };
            if let Some(range) = soft.iter().find(|r| !r.contains(v)) {
                warnings.push((
                    DiagnosticKind::RangeValueWarning,
                    format!(
                        "The {} value '{}' should be within the range {}.",
                        name,
                        v,
                        range.describe()
                    ),
                ));
            }
        }

        Ok(Validation { bounds, warnings })
    }
}

fn check_order(bounds: &BoundSet) -> Result<(), Rejection> {
    let ordered = [
        ("lower_linear_limit", bounds.lower_linear_limit),
        ("lower_limit", bounds.lower_limit),
        ("upper_limit", bounds.upper_limit),
        ("upper_linear_limit", bounds.upper_linear_limit),
    ];
    let present: Vec<(&str, f64)> = ordered
        .iter()
        .filter_map(|(n, v)| v.map(|v| (*n, v)))
        .collect();
    for pair in present.windows(2) {
        let ((lo_name, lo), (hi_name, hi)) = (pair[0], pair[1]);
        if lo > hi {
            return Err(Rejection::new(
                DiagnosticKind::RangeValueError,
                format!(
                    "The {} value '{}' must not exceed the {} value '{}'.",
                    lo_name, lo, hi_name, hi
                ),
            ));
        }
    }

    if let Some(target) = bounds.target_value {
        let below = bounds.lower_limit.is_some_and(|lo| target < lo);
        let above = bounds.upper_limit.is_some_and(|hi| target > hi);
        if below || above {
            return Err(Rejection::new(
                DiagnosticKind::RangeValueError,
                format!("The target value '{}' lies outside its own bounds.", target),
            ));
        }
    }
    Ok(())
}

/// Element of a resolved atom according to the CCD, guessed from the name otherwise.
pub fn element_of(ccd: &dyn ChemCompStore, atom: &CoordAtom) -> Element {
    ccd.chem_comp(&atom.comp_id)
        .and_then(|c| c.element_of(&atom.atom_id))
        .unwrap_or_else(|| Element::guess_from_atom_name(&atom.atom_id))
}

/// Whether two atoms are covalently bonded, peptide and phosphodiester links included.
pub fn are_one_bond_apart(ccd: &dyn ChemCompStore, a: &CoordAtom, b: &CoordAtom) -> bool {
    if a.same_residue(b) {
        return ccd
            .chem_comp(&a.comp_id)
            .is_some_and(|c| c.are_bonded(&a.atom_id, &b.atom_id));
    }
    if a.chain_id != b.chain_id {
        return false;
    }
    let (first, second) = if a.seq_id < b.seq_id { (a, b) } else { (b, a) };
    second.seq_id - first.seq_id == 1
        && matches!(
            (first.atom_id.as_str(), second.atom_id.as_str()),
            ("C", "N") | ("O3'", "P")
        )
}

/// Requires the two atoms of a dipolar coupling to be magnetic nuclei one bond apart.
pub fn check_rdc_pair(
    ccd: &dyn ChemCompStore,
    a: &CoordAtom,
    b: &CoordAtom,
) -> Result<(), Rejection> {
    for atom in [a, b] {
        let element = element_of(ccd, atom);
        if !element.is_nmr_observable() {
            return Err(Rejection::new(
                DiagnosticKind::InvalidData,
                format!("Non-magnetic atom {} ({}) cannot carry an RDC.", atom, element),
            ));
        }
    }
    if !are_one_bond_apart(ccd, a, b) {
        return Err(Rejection::new(
            DiagnosticKind::InvalidData,
            format!("RDC atoms {} and {} are not one bond apart.", a, b),
        ));
    }
    Ok(())
}

/// Requires a CSA triplet to be a nucleus bonded to both of its frame atoms.
pub fn check_csa_triplet(ccd: &dyn ChemCompStore, atoms: &[CoordAtom]) -> Result<(), Rejection> {
    let [nucleus, first, second] = atoms else {
        return Err(Rejection::new(
            DiagnosticKind::InvalidData,
            format!("A CSA restraint needs three atoms, {} given.", atoms.len()),
        ));
    };
    if are_one_bond_apart(ccd, nucleus, first) && are_one_bond_apart(ccd, nucleus, second) {
        Ok(())
    } else {
        Err(Rejection::new(
            DiagnosticKind::InvalidData,
            format!(
                "CSA atoms {}, {}, {} do not form a bonded triplet around {}.",
                nucleus, first, second, nucleus
            ),
        ))
    }
}

/// BMRB ambiguity code of a chemical-shift assignment to `atoms`.
///
/// A single atom or one complete methyl group is code 1. Atoms on one heavy atom, or on
/// heavy atoms sharing a neighbour, are code 2 unless the statistics carry a code for the
/// first atom. Any other selection is code 4.
pub fn shift_ambiguity_code(
    ccd: &dyn ChemCompStore,
    stats: Option<&dyn ShiftStatistics>,
    atoms: &[CoordAtom],
) -> u8 {
    let Some(first) = atoms.first() else {
        return 1;
    };
    if atoms.len() == 1 {
        return 1;
    }
    if atoms.iter().any(|a| !a.same_residue(first)) {
        return 4;
    }
    let Some(comp) = ccd.chem_comp(&first.comp_id) else {
        return 4;
    };

    let ids: HashSet<&str> = atoms.iter().map(|a| a.atom_id.as_str()).collect();
    if comp
        .methyl_groups()
        .iter()
        .any(|group| group.len() == ids.len() && group.iter().all(|id| ids.contains(id)))
    {
        return 1;
    }

    let parents: HashSet<&str> = ids.iter().filter_map(|id| comp.heavy_parent(id)).collect();
    let shared_parent = parents.len() == 1 && parents.len() < ids.len();
    let common_neighbour = parents.len() > 1 && {
        let mut iter = parents.iter();
        let first_parent = iter.next().map(|p| comp.neighbours(p)).unwrap_or_default();
        first_parent
            .iter()
            .any(|n| parents.iter().all(|p| comp.are_bonded(p, n)))
    };
    if shared_parent || common_neighbour {
        return stats
            .and_then(|s| s.ambiguity_code(&first.comp_id, &first.atom_id))
            .filter(|code| *code > 1)
            .unwrap_or(2);
    }
    4
}
