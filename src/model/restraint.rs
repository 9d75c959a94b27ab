use super::atom::CoordAtom;
use super::types::RestraintSubtype;
use serde::{Deserialize, Serialize};

/// Numeric envelope of one restraint.
///
/// Only `weight` is always present; every other key is emitted when the source
/// restraint supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DstFunc {
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_linear_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_linear_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Linear-combination coefficients of a generalized distance (AMBER `RSTWT`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coefficients: Vec<f64>,
}

impl DstFunc {
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight,
            target_value: None,
            lower_limit: None,
            upper_limit: None,
            lower_linear_limit: None,
            upper_linear_limit: None,
            tolerance: None,
            multiplicity: None,
            scale: None,
            coefficients: Vec::new(),
        }
    }

    /// Bounds in ascending order `[lower_linear, lower, upper, upper_linear]`.
    pub fn ordered_bounds(&self) -> [Option<f64>; 4] {
        [
            self.lower_linear_limit,
            self.lower_limit,
            self.upper_limit,
            self.upper_linear_limit,
        ]
    }

    /// Reports whether no target or bound survived validation.
    pub fn has_no_values(&self) -> bool {
        self.target_value.is_none() && self.ordered_bounds().iter().all(Option::is_none)
    }
}

impl Default for DstFunc {
    fn default() -> Self {
        Self::with_weight(1.0)
    }
}

/// One normalized restraint whose atoms are anchored in the coordinate model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestraintRecord {
    pub subtype: RestraintSubtype,
    /// 1-based index among the restraints of the same subtype.
    pub id: u32,
    /// Position within the cartesian product of an ambiguous restraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<u32>,
    pub atoms: Vec<CoordAtom>,
    pub dst_func: DstFunc,
    /// Conventional torsion name (`PHI`, `CHI1`, ...) of dihedral records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_name: Option<String>,
    /// BMRB ambiguity code of chemical-shift records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambig_code: Option<u8>,
    /// Set when a residue name disagrees with the coordinates but the atoms still resolved.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sequence_mismatch: bool,
}
