use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Point = nalgebra::Point3<f64>;

/// Chemical elements that occur in biomolecular coordinate models and their ligands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum Element {
    H = 1,
    B = 5,
    C = 6,
    N = 7,
    O = 8,
    F = 9,
    Na = 11,
    Mg = 12,
    Si = 14,
    P = 15,
    S = 16,
    Cl = 17,
    K = 19,
    Ca = 20,
    Mn = 25,
    Fe = 26,
    Co = 27,
    Ni = 28,
    Cu = 29,
    Zn = 30,
    Se = 34,
    Br = 35,
    Cd = 48,
    I = 53,
    Hg = 80,
    Unknown = 0,
}

/// Classification of a proton within its residue.
///
/// Pseudo-atom expansion and the sibling refinement pass both produce this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrogenKind {
    Isolated,
    Methyl,
    Geminal,
}

/// Numbering scheme used to address a residue of the coordinate model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeqScheme {
    Author,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RestraintSubtype {
    #[serde(rename = "dist")]
    Distance,
    #[serde(rename = "ang")]
    Angle,
    #[serde(rename = "dihed")]
    Dihedral,
    #[serde(rename = "plane_point")]
    PlanePoint,
    #[serde(rename = "plane_plane")]
    PlanePlane,
    #[serde(rename = "lin_comb_dist")]
    GeneralizedDistance,
    #[serde(rename = "rdc")]
    Rdc,
    #[serde(rename = "csa")]
    Csa,
    #[serde(rename = "pcs")]
    Pcs,
    #[serde(rename = "cs")]
    ChemicalShift,
    #[serde(rename = "noepk")]
    NoesyVolume,
    #[serde(rename = "jcoup")]
    JCoupling,
}

impl Element {
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::H => "H",
            Element::B => "B",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Na => "Na",
            Element::Mg => "Mg",
            Element::Si => "Si",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "Cl",
            Element::K => "K",
            Element::Ca => "Ca",
            Element::Mn => "Mn",
            Element::Fe => "Fe",
            Element::Co => "Co",
            Element::Ni => "Ni",
            Element::Cu => "Cu",
            Element::Zn => "Zn",
            Element::Se => "Se",
            Element::Br => "Br",
            Element::Cd => "Cd",
            Element::I => "I",
            Element::Hg => "Hg",
            Element::Unknown => "Unknown",
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        *self == Element::H
    }

    /// Nuclei with a spin-1/2 isotope routinely observed in biomolecular NMR.
    pub fn is_nmr_observable(&self) -> bool {
        matches!(
            self,
            Element::H | Element::C | Element::N | Element::F | Element::P | Element::Cd
        )
    }

    /// Heavy atoms whose attached protons exchange with solvent.
    pub fn hosts_labile_proton(&self) -> bool {
        matches!(self, Element::N | Element::O | Element::S)
    }

    /// Best-effort element guess from an atom name such as `HD21` or `CA`.
    ///
    /// Only the leading letter is considered, so two-letter metals are never inferred.
    pub fn guess_from_atom_name(name: &str) -> Self {
        let first = name.trim_start_matches(|c: char| c.is_ascii_digit()).chars().next();
        match first {
            Some('H') => Element::H,
            Some('C') => Element::C,
            Some('N') => Element::N,
            Some('O') => Element::O,
            Some('S') => Element::S,
            Some('P') => Element::P,
            Some('F') => Element::F,
            _ => Element::Unknown,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Element {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let normalized: String = match (chars.next(), chars.next()) {
            (Some(a), Some(b)) => {
                let mut n = a.to_ascii_uppercase().to_string();
                n.push(b.to_ascii_lowercase());
                n.extend(chars);
                n
            }
            (Some(a), None) => a.to_ascii_uppercase().to_string(),
            _ => return Err("Empty element symbol".to_string()),
        };

        match normalized.as_str() {
            "H" | "D" => Ok(Element::H),
            "B" => Ok(Element::B),
            "C" => Ok(Element::C),
            "N" => Ok(Element::N),
            "O" => Ok(Element::O),
            "F" => Ok(Element::F),
            "Na" => Ok(Element::Na),
            "Mg" => Ok(Element::Mg),
            "Si" => Ok(Element::Si),
            "P" => Ok(Element::P),
            "S" => Ok(Element::S),
            "Cl" => Ok(Element::Cl),
            "K" => Ok(Element::K),
            "Ca" => Ok(Element::Ca),
            "Mn" => Ok(Element::Mn),
            "Fe" => Ok(Element::Fe),
            "Co" => Ok(Element::Co),
            "Ni" => Ok(Element::Ni),
            "Cu" => Ok(Element::Cu),
            "Zn" => Ok(Element::Zn),
            "Se" => Ok(Element::Se),
            "Br" => Ok(Element::Br),
            "Cd" => Ok(Element::Cd),
            "I" => Ok(Element::I),
            "Hg" => Ok(Element::Hg),
            "X" | "Unknown" => Ok(Element::Unknown),
            _ => Err(format!("Unsupported element symbol: {}", s)),
        }
    }
}

impl TryFrom<String> for Element {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Element> for String {
    fn from(value: Element) -> Self {
        value.symbol().to_string()
    }
}

impl HydrogenKind {
    pub fn name(&self) -> &'static str {
        match self {
            HydrogenKind::Isolated => "isolated",
            HydrogenKind::Methyl => "methyl",
            HydrogenKind::Geminal => "geminal",
        }
    }
}

impl fmt::Display for HydrogenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl SeqScheme {
    pub fn other(&self) -> Self {
        match self {
            SeqScheme::Author => SeqScheme::Label,
            SeqScheme::Label => SeqScheme::Author,
        }
    }
}

impl RestraintSubtype {
    pub fn key(&self) -> &'static str {
        match self {
            RestraintSubtype::Distance => "dist",
            RestraintSubtype::Angle => "ang",
            RestraintSubtype::Dihedral => "dihed",
            RestraintSubtype::PlanePoint => "plane_point",
            RestraintSubtype::PlanePlane => "plane_plane",
            RestraintSubtype::GeneralizedDistance => "lin_comb_dist",
            RestraintSubtype::Rdc => "rdc",
            RestraintSubtype::Csa => "csa",
            RestraintSubtype::Pcs => "pcs",
            RestraintSubtype::ChemicalShift => "cs",
            RestraintSubtype::NoesyVolume => "noepk",
            RestraintSubtype::JCoupling => "jcoup",
        }
    }

    /// Human readable plural used in diagnostic locations.
    pub fn description(&self) -> &'static str {
        match self {
            RestraintSubtype::Distance => "distance restraints",
            RestraintSubtype::Angle => "angle restraints",
            RestraintSubtype::Dihedral => "dihedral angle restraints",
            RestraintSubtype::PlanePoint => "plane-point angle restraints",
            RestraintSubtype::PlanePlane => "plane-plane angle restraints",
            RestraintSubtype::GeneralizedDistance => "generalized distance restraints",
            RestraintSubtype::Rdc => "RDC restraints",
            RestraintSubtype::Csa => "CSA restraints",
            RestraintSubtype::Pcs => "PCS restraints",
            RestraintSubtype::ChemicalShift => "chemical shifts",
            RestraintSubtype::NoesyVolume => "NOESY peak volumes",
            RestraintSubtype::JCoupling => "J-couplings",
        }
    }

    /// Whether a multi-atom selection is admissible at any position of the restraint.
    pub fn allows_ambiguity(&self) -> bool {
        matches!(
            self,
            RestraintSubtype::Distance
                | RestraintSubtype::GeneralizedDistance
                | RestraintSubtype::ChemicalShift
                | RestraintSubtype::NoesyVolume
        )
    }
}

impl fmt::Display for RestraintSubtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
