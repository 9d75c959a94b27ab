//! Normalizer configuration: numeric envelopes per restraint class and the switches that
//! steer sequence reconciliation.
//!
//! Every field has a documented default, and the whole structure can be read from TOML so
//! pipelines can pin their tolerances next to their inputs.

use crate::model::types::{Element, RestraintSubtype};
use crate::ops::error::Error;
use serde::{Deserialize, Serialize};

/// Closed or half-open numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    #[serde(default = "inclusive")]
    pub min_inclusive: bool,
    #[serde(default = "inclusive")]
    pub max_inclusive: bool,
}

fn inclusive() -> bool {
    true
}

impl ValueRange {
    pub const fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    pub const fn open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_inclusive: false,
            max_inclusive: false,
        }
    }

    /// `(min, max]`.
    pub const fn left_open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_inclusive: false,
            max_inclusive: true,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }

    /// Interval notation, e.g. `(0.0, 150.0]`.
    pub fn describe(&self) -> String {
        format!(
            "{}{}, {}{}",
            if self.min_inclusive { '[' } else { '(' },
            self.min,
            self.max,
            if self.max_inclusive { ']' } else { ')' }
        )
    }
}

/// Hard bounds reject a value; soft bounds only warn.
///
/// An envelope is replaced as a whole when read from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub hard: ValueRange,
    pub soft: ValueRange,
}

impl Envelope {
    pub const fn new(hard: ValueRange, soft: ValueRange) -> Self {
        Self { hard, soft }
    }
}

/// Soft chemical-shift windows for the nuclei that carry one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftWindows {
    pub h: ValueRange,
    pub c: ValueRange,
    pub n: ValueRange,
    pub p: ValueRange,
    pub f: ValueRange,
}

impl Default for ShiftWindows {
    fn default() -> Self {
        Self {
            h: ValueRange::closed(-5.0, 20.0),
            c: ValueRange::closed(-10.0, 240.0),
            n: ValueRange::closed(60.0, 300.0),
            p: ValueRange::closed(-60.0, 60.0),
            f: ValueRange::closed(-250.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeTable {
    pub distance: Envelope,
    pub angle: Envelope,
    pub dihedral: Envelope,
    pub rdc: Envelope,
    pub csa: Envelope,
    pub pcs: Envelope,
    /// Hard bounds for every nucleus; the soft bound applies to nuclei without a window.
    pub chemical_shift: Envelope,
    pub chemical_shift_windows: ShiftWindows,
    pub j_coupling: Envelope,
    pub noesy_volume: Envelope,
}

impl Default for RangeTable {
    fn default() -> Self {
        Self {
            distance: Envelope::new(
                ValueRange::left_open(0.0, 150.0),
                ValueRange::closed(1.2, 20.0),
            ),
            angle: Envelope::new(
                ValueRange::left_open(-360.0, 360.0),
                ValueRange::closed(0.0, 180.0),
            ),
            dihedral: Envelope::new(
                ValueRange::left_open(-360.0, 360.0),
                ValueRange::closed(-180.0, 180.0),
            ),
            rdc: Envelope::new(ValueRange::open(-500.0, 500.0), ValueRange::open(-120.0, 120.0)),
            csa: Envelope::new(ValueRange::open(-999.0, 999.0), ValueRange::closed(-300.0, 300.0)),
            pcs: Envelope::new(ValueRange::open(-40.0, 40.0), ValueRange::closed(-20.0, 20.0)),
            chemical_shift: Envelope::new(
                ValueRange::open(-999.0, 999.0),
                ValueRange::open(-999.0, 999.0),
            ),
            chemical_shift_windows: ShiftWindows::default(),
            j_coupling: Envelope::new(
                ValueRange::open(-200.0, 200.0),
                ValueRange::closed(-5.0, 20.0),
            ),
            noesy_volume: Envelope::new(
                ValueRange::open(f64::NEG_INFINITY, f64::INFINITY),
                ValueRange::closed(0.0, f64::INFINITY),
            ),
        }
    }
}

impl RangeTable {
    /// Envelope governing the bounds of a restraint subtype.
    pub fn envelope(&self, subtype: RestraintSubtype) -> &Envelope {
        match subtype {
            RestraintSubtype::Distance | RestraintSubtype::GeneralizedDistance => &self.distance,
            RestraintSubtype::Angle
            | RestraintSubtype::PlanePoint
            | RestraintSubtype::PlanePlane => &self.angle,
            RestraintSubtype::Dihedral => &self.dihedral,
            RestraintSubtype::Rdc => &self.rdc,
            RestraintSubtype::Csa => &self.csa,
            RestraintSubtype::Pcs => &self.pcs,
            RestraintSubtype::ChemicalShift => &self.chemical_shift,
            RestraintSubtype::JCoupling => &self.j_coupling,
            RestraintSubtype::NoesyVolume => &self.noesy_volume,
        }
    }

    /// Soft window of a chemical shift observed on `element`.
    pub fn shift_window(&self, element: Element) -> ValueRange {
        let w = &self.chemical_shift_windows;
        match element {
            Element::H => w.h,
            Element::C => w.c,
            Element::N => w.n,
            Element::P => w.p,
            Element::F => w.f,
            _ => self.chemical_shift.soft,
        }
    }

    fn entries(&self) -> Vec<(&'static str, &ValueRange)> {
        let w = &self.chemical_shift_windows;
        vec![
            ("distance.hard", &self.distance.hard),
            ("distance.soft", &self.distance.soft),
            ("angle.hard", &self.angle.hard),
            ("angle.soft", &self.angle.soft),
            ("dihedral.hard", &self.dihedral.hard),
            ("dihedral.soft", &self.dihedral.soft),
            ("rdc.hard", &self.rdc.hard),
            ("rdc.soft", &self.rdc.soft),
            ("csa.hard", &self.csa.hard),
            ("csa.soft", &self.csa.soft),
            ("pcs.hard", &self.pcs.hard),
            ("pcs.soft", &self.pcs.soft),
            ("chemical_shift.hard", &self.chemical_shift.hard),
            ("chemical_shift.soft", &self.chemical_shift.soft),
            ("chemical_shift_windows.h", &w.h),
            ("chemical_shift_windows.c", &w.c),
            ("chemical_shift_windows.n", &w.n),
            ("chemical_shift_windows.p", &w.p),
            ("chemical_shift_windows.f", &w.f),
            ("j_coupling.hard", &self.j_coupling.hard),
            ("j_coupling.soft", &self.j_coupling.soft),
            ("noesy_volume.hard", &self.noesy_volume.hard),
            ("noesy_volume.soft", &self.noesy_volume.soft),
        ]
    }
}

/// Source-specific atom name that the CCD does not know, mapped onto a CCD atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomNameMapping {
    /// Restricts the mapping to one residue number when set.
    #[serde(default)]
    pub seq_id: Option<i32>,
    pub comp_id: String,
    pub atom_id: String,
    pub target_comp_id: String,
    pub target_atom_id: String,
}

/// Tunables of a normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Numeric envelopes per restraint class.
    pub ranges: RangeTable,
    /// Elide low-end distance outliers instead of rejecting the record (default `false`).
    pub omit_distance_outlier: bool,
    /// Consecutive placeholders that count as a large sequence gap (default `10`).
    pub large_gap_threshold: usize,
    /// Coverage below which a poorly matching chain pair is rejected (default `0.3`).
    pub min_sequence_coverage: f64,
    /// Try author numbering before label numbering (default `true`).
    pub prefer_auth_seq: bool,
    /// TALOS classes whose rows become dihedral restraints.
    pub talos_classes: Vec<String>,
    pub atom_name_map: Vec<AtomNameMapping>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            ranges: RangeTable::default(),
            omit_distance_outlier: false,
            large_gap_threshold: 10,
            min_sequence_coverage: 0.3,
            prefer_auth_seq: true,
            talos_classes: vec!["Strong".to_string(), "Generous".to_string(), "Good".to_string()],
            atom_name_map: Vec::new(),
        }
    }
}

impl NormalizerConfig {
    /// Parses and validates a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, range) in self.ranges.entries() {
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                return Err(Error::invalid_config(format!(
                    "range '{}' is empty: {}",
                    name,
                    range.describe()
                )));
            }
        }
        if self.large_gap_threshold == 0 {
            return Err(Error::invalid_config("large_gap_threshold must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_sequence_coverage) {
            return Err(Error::invalid_config(format!(
                "min_sequence_coverage {} is outside [0, 1]",
                self.min_sequence_coverage
            )));
        }
        Ok(())
    }

    pub fn admits_talos_class(&self, class: &str) -> bool {
        self.talos_classes.iter().any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Mapping for a residue/atom the CCD does not describe.
    pub fn mapped_atom_name(
        &self,
        seq_id: i32,
        comp_id: &str,
        atom_id: &str,
    ) -> Option<&AtomNameMapping> {
        self.atom_name_map.iter().find(|m| {
            m.comp_id == comp_id && m.atom_id == atom_id && m.seq_id.is_none_or(|s| s == seq_id)
        })
    }

    pub fn with_ranges(mut self, ranges: RangeTable) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_omit_distance_outlier(mut self, omit: bool) -> Self {
        self.omit_distance_outlier = omit;
        self
    }

    pub fn with_large_gap_threshold(mut self, threshold: usize) -> Self {
        self.large_gap_threshold = threshold;
        self
    }

    pub fn with_min_sequence_coverage(mut self, coverage: f64) -> Self {
        self.min_sequence_coverage = coverage;
        self
    }

    pub fn with_prefer_auth_seq(mut self, prefer: bool) -> Self {
        self.prefer_auth_seq = prefer;
        self
    }

    pub fn with_talos_classes(mut self, classes: &[&str]) -> Self {
        self.talos_classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_atom_name_mapping(mut self, mapping: AtomNameMapping) -> Self {
        self.atom_name_map.push(mapping);
        self
    }
}
