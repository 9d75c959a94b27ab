//! Residue and atom nomenclature translation onto CCD names.
//!
//! Restraint files use force-field residue names (`HIE`, `CYX`), legacy atom names (`HN`,
//! `O1P`, `1HB`), wildcards (`HB*`, `HD#`), and NMR pseudo-atoms (`MD1`, `QB`, `QQD`). The
//! [`Translator`] maps all of these onto the atom inventory of the CCD entry and tags every
//! proton with its [`HydrogenKind`].

use crate::db::{ChemComp, ChemCompStore};
use crate::model::types::HydrogenKind;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

/// One CCD atom produced by a translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedAtom {
    pub atom_id: String,
    /// Proton classification; `None` for heavy atoms.
    pub kind: Option<HydrogenKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// CCD residue code the atoms belong to.
    pub comp_id: String,
    pub atoms: Vec<TranslatedAtom>,
    /// Set when the atoms were only found under the alternate residue name.
    pub via_alternate: bool,
    /// Set when the CCD does not describe the residue and the atom passed through unchanged.
    pub unchecked: bool,
}

impl Translation {
    pub fn atom_ids(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(|a| a.atom_id.as_str())
    }
}

fn residue_aliases() -> &'static HashMap<&'static str, &'static str> {
    static ALIASES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    ALIASES.get_or_init(|| {
        let mut map = HashMap::new();

        macro_rules! register_alias {
            ($canonical:expr => $($alias:expr),+) => {
                $(map.insert($alias, $canonical);)+
            };
        }

        register_alias!("ARG" => "ARN");
        register_alias!("ASP" => "ASH");
        register_alias!("CYS" => "CYX", "CYM", "CYZ");
        register_alias!("GLU" => "GLH");
        register_alias!("HIS" => "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "HIZ");
        register_alias!("LYS" => "LYN", "LYP");
        register_alias!("TYR" => "TYM");

        register_alias!("DA" => "DA5", "DA3", "DAN", "ADE");
        register_alias!("DC" => "DC5", "DC3", "DCN", "CYT");
        register_alias!("DG" => "DG5", "DG3", "DGN", "GUA");
        register_alias!("DT" => "DT5", "DT3", "DTN", "THY");
        register_alias!("A" => "RA", "RA5", "RA3", "A5", "A3", "RADE");
        register_alias!("C" => "RC", "RC5", "RC3", "C5", "C3", "RCYT");
        register_alias!("G" => "RG", "RG5", "RG3", "G5", "G3", "RGUA");
        register_alias!("U" => "RU", "RU5", "RU3", "U5", "U3", "URA", "URI");

        register_alias!("HOH" => "WAT", "SOL", "H2O", "TIP", "TIP3", "TP3", "SPC");
        map
    })
}

/// Standard parents of frequent modified residues, consulted when the CCD entry of the
/// residue carries no parent itself.
fn modified_parents() -> &'static HashMap<&'static str, &'static str> {
    static PARENTS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    PARENTS.get_or_init(|| {
        let mut map = HashMap::new();

        macro_rules! register_parent {
            ($parent:expr => $($modified:expr),+) => {
                $(map.insert($modified, $parent);)+
            };
        }

        register_parent!("ALA" => "AIB", "DAL", "MAA");
        register_parent!("ARG" => "DAR", "AGM");
        register_parent!("ASP" => "DAS", "IAS");
        register_parent!("CYS" => "DCY", "CSO", "CME", "CSD", "OCS");
        register_parent!("GLN" => "DGN");
        register_parent!("GLU" => "DGL", "PCA", "CGU");
        register_parent!("HIS" => "DHI", "NEP", "HIC");
        register_parent!("ILE" => "DIL");
        register_parent!("LEU" => "DLE", "NLE");
        register_parent!("LYS" => "DLY", "MLY", "M3L", "ALY");
        register_parent!("MET" => "MSE", "MED", "FME");
        register_parent!("PHE" => "DPN");
        register_parent!("PRO" => "DPR", "HYP");
        register_parent!("SER" => "DSN", "SEP");
        register_parent!("THR" => "DTH", "TPO");
        register_parent!("TRP" => "DTR");
        register_parent!("TYR" => "DTY", "PTR");
        register_parent!("VAL" => "DVA");
        register_parent!("DC" => "5CM");
        register_parent!("U" => "PSU");
        map
    })
}

/// Standard parent of a modified residue, from its CCD entry or the built-in table.
pub fn parent_residue_name(comp_id: &str, ccd: &dyn ChemCompStore) -> Option<String> {
    ccd.chem_comp(comp_id)
        .and_then(|c| c.parent_comp_id.clone())
        .filter(|parent| parent != comp_id)
        .or_else(|| modified_parents().get(comp_id).map(|p| p.to_string()))
}

/// Whether two residue codes denote the same residue, directly or through a parent.
pub fn residue_names_agree(a: &str, b: &str, ccd: &dyn ChemCompStore) -> bool {
    if a == b {
        return true;
    }
    let parent_a = parent_residue_name(a, ccd);
    let parent_b = parent_residue_name(b, ccd);
    parent_a.as_deref() == Some(b)
        || parent_b.as_deref() == Some(a)
        || (parent_a.is_some() && parent_a == parent_b)
}

/// Residue name to retry with when atoms are not found under the primary name.
///
/// Modified residues map to their standard parent, and DNA/RNA nucleotides map onto
/// each other.
pub fn alternate_residue_name(comp_id: &str, ccd: &dyn ChemCompStore) -> Option<String> {
    if let Some(parent) = parent_residue_name(comp_id, ccd) {
        return Some(parent);
    }
    let swapped = match comp_id {
        "DA" => "A",
        "DC" => "C",
        "DG" => "G",
        "DT" => "U",
        "A" => "DA",
        "C" => "DC",
        "G" => "DG",
        "U" => "DT",
        _ => return None,
    };
    Some(swapped.to_string())
}

/// Classifies every proton of a residue from its sibling names.
///
/// A proton whose name ends in a digit belongs to the group of names sharing everything but
/// that digit. A group numbered exactly `1, 2, 3` is a methyl and a group numbered `1, 2` or
/// `2, 3` is a geminal pair; every other proton is isolated.
pub fn refine_hydrogen_kinds<'a>(
    protons: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<&'a str, HydrogenKind> {
    let protons: Vec<&str> = protons.into_iter().collect();
    let mut groups: HashMap<&str, BTreeSet<char>> = HashMap::new();
    for name in &protons {
        if let Some((base, digit)) = split_trailing_digit(name) {
            groups.entry(base).or_default().insert(digit);
        }
    }

    protons
        .into_iter()
        .map(|name| {
            let kind = split_trailing_digit(name)
                .and_then(|(base, _)| groups.get(base))
                .map(|digits| {
                    let digits: String = digits.iter().collect();
                    match digits.as_str() {
                        "123" => HydrogenKind::Methyl,
                        "12" | "23" => HydrogenKind::Geminal,
                        _ => HydrogenKind::Isolated,
                    }
                })
                .unwrap_or(HydrogenKind::Isolated);
            (name, kind)
        })
        .collect()
}

fn split_trailing_digit(name: &str) -> Option<(&str, char)> {
    let last = name.chars().last()?;
    if last.is_ascii_digit() && name.len() > 1 {
        Some((&name[..name.len() - 1], last))
    } else {
        None
    }
}

/// Legacy spellings tried before the CCD alternative names.
fn atom_aliases(atom_id: &str) -> Vec<String> {
    let mut aliases = Vec::new();
    let fixed = match atom_id {
        "HN" | "HT" => Some("H"),
        "OT1" | "O1" | "OT" => Some("O"),
        "OT2" | "O2" => Some("OXT"),
        "HT1" => Some("H1"),
        "HT2" => Some("H2"),
        "HT3" => Some("H3"),
        "H5'1" => Some("H5'"),
        "H5'2" => Some("H5''"),
        "H2'1" => Some("H2'"),
        "H2'2" => Some("H2''"),
        "HO'2" | "H2'O" => Some("HO2'"),
        "H3T" => Some("HO3'"),
        "H5T" => Some("HO5'"),
        "O1P" => Some("OP1"),
        "O2P" => Some("OP2"),
        "O3P" => Some("OP3"),
        "C5M" => Some("C7"),
        _ => None,
    };
    if let Some(fixed) = fixed {
        aliases.push(fixed.to_string());
    }
    if atom_id.contains('*') {
        aliases.push(atom_id.replace('*', "'"));
    }
    // 1HB -> HB1, 2HD1 -> HD12
    let digits: String = atom_id.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() && digits.len() < atom_id.len() {
        aliases.push(format!("{}{}", &atom_id[digits.len()..], digits));
    }
    aliases
}

fn strip_wildcard(atom_id: &str) -> Option<&str> {
    let stripped = atom_id.trim_end_matches(['*', '#', '%', '+']);
    (stripped.len() < atom_id.len() && !stripped.is_empty()).then_some(stripped)
}

/// CCD atoms named `prefix` followed by one or more digits.
fn numbered_after<'c>(comp: &'c ChemComp, prefix: &str) -> Vec<&'c str> {
    comp.atom_ids()
        .filter(|id| {
            id.strip_prefix(prefix)
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .collect()
}

/// Translates source residue and atom tokens against a CCD store.
pub struct Translator<'a> {
    ccd: &'a dyn ChemCompStore,
}

impl<'a> Translator<'a> {
    pub fn new(ccd: &'a dyn ChemCompStore) -> Self {
        Self { ccd }
    }

    pub fn ccd(&self) -> &'a dyn ChemCompStore {
        self.ccd
    }

    /// CCD code for a source residue name; unknown names pass through upper-cased.
    pub fn translate_residue(&self, comp_id: &str) -> String {
        let upper = comp_id.trim().to_ascii_uppercase();
        if self.ccd.contains(&upper) {
            return upper;
        }
        residue_aliases()
            .get(upper.as_str())
            .map(|c| c.to_string())
            .unwrap_or(upper)
    }

    /// Expands a source atom name into CCD atoms of `comp`.
    ///
    /// Returns an empty vector when no rule applies.
    pub fn translate_atom(&self, comp: &ChemComp, atom_id: &str) -> Vec<TranslatedAtom> {
        let atom_id = normalize_atom_name(atom_id);
        let (ids, forced_methyl) = self.expand(comp, &atom_id);
        self.tag(comp, ids, forced_methyl)
    }

    /// Full residue plus atom translation with the alternate-residue retry.
    ///
    /// # Returns
    ///
    /// `None` when neither the residue nor its alternate name knows the atom.
    pub fn translate(&self, comp_id: &str, atom_id: &str) -> Option<Translation> {
        let comp_id = self.translate_residue(comp_id);
        let Some(comp) = self.ccd.chem_comp(&comp_id) else {
            let atom_id = normalize_atom_name(atom_id);
            let kind = atom_id.starts_with('H').then_some(HydrogenKind::Isolated);
            return Some(Translation {
                comp_id,
                atoms: vec![TranslatedAtom { atom_id, kind }],
                via_alternate: false,
                unchecked: true,
            });
        };

        let atoms = self.translate_atom(comp, atom_id);
        if !atoms.is_empty() {
            return Some(Translation {
                comp_id,
                atoms,
                via_alternate: false,
                unchecked: false,
            });
        }

        let alternate = alternate_residue_name(&comp_id, self.ccd)?;
        let alt_comp = self.ccd.chem_comp(&alternate)?;
        let atoms = self.translate_atom(alt_comp, atom_id);
        (!atoms.is_empty()).then(|| Translation {
            comp_id: alternate,
            atoms,
            via_alternate: true,
            unchecked: false,
        })
    }

    fn expand<'c>(&self, comp: &'c ChemComp, atom_id: &str) -> (Vec<&'c str>, bool) {
        if let Some(atom) = comp.atom(atom_id) {
            return (vec![atom.atom_id.as_str()], false);
        }
        for alias in atom_aliases(atom_id) {
            if let Some(atom) = comp.atom(&alias) {
                return (vec![atom.atom_id.as_str()], false);
            }
        }
        if let Some(id) = comp.atom_id_for_alt(atom_id) {
            return (vec![id], false);
        }
        if let Some(prefix) = strip_wildcard(atom_id) {
            let ids = numbered_after(comp, prefix);
            if !ids.is_empty() {
                return (ids, false);
            }
        }
        if let Some(base) = atom_id.strip_prefix('M').filter(|b| !b.is_empty()) {
            let ids = self.methyl(comp, base);
            if !ids.is_empty() {
                return (ids, true);
            }
        }
        if let Some(base) = atom_id
            .strip_prefix("QQ")
            .or_else(|| atom_id.strip_prefix('Q'))
            .filter(|b| !b.is_empty())
        {
            let prefix = format!("H{}", base);
            let ids: Vec<&str> = comp
                .protons()
                .filter(|id| {
                    id.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
                    })
                })
                .collect();
            if !ids.is_empty() {
                return (ids, false);
            }
        }
        if let Some(stem) = atom_id.strip_suffix('1') {
            let two = format!("{}2", stem);
            let three = format!("{}3", stem);
            if comp.has_atom(&two) {
                if let Some(atom) = comp.atom(&three) {
                    return (vec![atom.atom_id.as_str()], false);
                }
            }
        }
        (numbered_after(comp, atom_id), false)
    }

    fn methyl<'c>(&self, comp: &'c ChemComp, base: &str) -> Vec<&'c str> {
        let triple = |stem: String| -> Option<Vec<&'c str>> {
            ["1", "2", "3"]
                .iter()
                .map(|d| comp.atom(&format!("{}{}", stem, d)).map(|a| a.atom_id.as_str()))
                .collect()
        };
        if let Some(ids) = triple(format!("H{}", base)) {
            return ids;
        }
        if let Some(ids) = triple(format!("H{}1", base)) {
            return ids;
        }
        let prefix = format!("H{}", base);
        comp.methyl_groups()
            .into_iter()
            .find(|group| group.iter().all(|id| id.starts_with(prefix.as_str())))
            .unwrap_or_default()
    }

    fn tag(&self, comp: &ChemComp, ids: Vec<&str>, forced_methyl: bool) -> Vec<TranslatedAtom> {
        let kinds = refine_hydrogen_kinds(comp.protons());
        ids.into_iter()
            .map(|id| {
                let kind = if comp.is_proton(id) {
                    Some(if forced_methyl {
                        HydrogenKind::Methyl
                    } else {
                        kinds.get(id).copied().unwrap_or(HydrogenKind::Isolated)
                    })
                } else {
                    None
                };
                TranslatedAtom {
                    atom_id: id.to_string(),
                    kind,
                }
            })
            .collect()
    }
}

/// Upper-cases an atom name and spells double primes as two single quotes.
pub fn normalize_atom_name(atom_id: &str) -> String {
    atom_id.trim().to_ascii_uppercase().replace('"', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChemCompKind, ChemCompLibrary};
    use crate::model::types::Element;

    fn ids(translation: &Translation) -> Vec<&str> {
        translation.atom_ids().collect()
    }

    #[test]
    fn translate_residue_maps_force_field_names_and_passes_unknown_through() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        assert_eq!(translator.translate_residue("HIE"), "HIS");
        assert_eq!(translator.translate_residue("cyx"), "CYS");
        assert_eq!(translator.translate_residue("RU5"), "U");
        assert_eq!(translator.translate_residue("WAT"), "HOH");
        assert_eq!(translator.translate_residue("XYZ"), "XYZ");
    }

    #[test]
    fn methyl_pseudo_atoms_expand_to_three_protons() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let md = translator.translate("LEU", "MD").unwrap();
        assert_eq!(ids(&md), vec!["HD11", "HD12", "HD13"]);
        assert!(md.atoms.iter().all(|a| a.kind == Some(HydrogenKind::Methyl)));

        let md2 = translator.translate("LEU", "MD2").unwrap();
        assert_eq!(ids(&md2), vec!["HD21", "HD22", "HD23"]);

        let mg = translator.translate("THR", "MG").unwrap();
        assert_eq!(ids(&mg), vec!["HG21", "HG22", "HG23"]);
    }

    #[test]
    fn geminal_pseudo_atoms_expand_to_numbered_protons() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let qb = translator.translate("SER", "QB").unwrap();
        assert_eq!(ids(&qb), vec!["HB2", "HB3"]);
        assert!(qb.atoms.iter().all(|a| a.kind == Some(HydrogenKind::Geminal)));

        let qqd = translator.translate("LEU", "QQD").unwrap();
        assert_eq!(qqd.atoms.len(), 6);
    }

    #[test]
    fn legacy_and_wildcard_names_reach_ccd_atoms() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        assert_eq!(ids(&translator.translate("MET", "HN").unwrap()), vec!["H"]);
        assert_eq!(ids(&translator.translate("ALA", "1HB").unwrap()), vec!["HB1"]);
        assert_eq!(ids(&translator.translate("ALA", "HB*").unwrap()), vec!["HB1", "HB2", "HB3"]);
        assert_eq!(ids(&translator.translate("DG", "O1P").unwrap()), vec!["OP1"]);
        assert_eq!(ids(&translator.translate("DA", "H5\"").unwrap()), vec!["H5''"]);
        assert_eq!(ids(&translator.translate("DA", "H2*").unwrap()), vec!["H2'"]);
        assert_eq!(ids(&translator.translate("DT", "C5M").unwrap()), vec!["C7"]);
        assert_eq!(ids(&translator.translate("SER", "HB1").unwrap()), vec!["HB3"]);
        assert_eq!(ids(&translator.translate("LYS", "HZ").unwrap()), vec!["HZ1", "HZ2", "HZ3"]);
    }

    #[test]
    fn heavy_atoms_carry_no_hydrogen_kind() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let ca = translator.translate("GLY", "CA").unwrap();
        assert_eq!(ca.atoms[0].kind, None);
        let ha = translator.translate("ALA", "HA").unwrap();
        assert_eq!(ha.atoms[0].kind, Some(HydrogenKind::Isolated));
    }

    #[test]
    fn translate_retries_with_alternate_residue_name() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let translation = translator.translate("DC", "HO2'").unwrap();
        assert_eq!(translation.comp_id, "C");
        assert!(translation.via_alternate);
        assert!(translator.translate("ALA", "QZ").is_none());
    }

    #[test]
    fn unknown_residues_pass_atoms_through_unchecked() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let translation = translator.translate("lig", "c1").unwrap();
        assert_eq!(translation.comp_id, "LIG");
        assert_eq!(ids(&translation), vec!["C1"]);
        assert!(translation.unchecked);
    }

    #[test]
    fn translating_output_again_is_a_no_op() {
        let ccd = ChemCompLibrary::standard();
        let translator = Translator::new(&ccd);

        let spellings = [
            ("LEU", "MD1"),
            ("SER", "QB"),
            ("HIP", "HN"),
            ("DA", "H5'1"),
            ("ALA", "HB#"),
        ];
        for (comp, atom) in spellings {
            let first = translator.translate(comp, atom).unwrap();
            for translated in &first.atoms {
                let again = translator.translate(&first.comp_id, &translated.atom_id).unwrap();
                assert_eq!(again.comp_id, first.comp_id);
                assert_eq!(again.atoms, vec![translated.clone()]);
            }
        }
    }

    #[test]
    fn refine_hydrogen_kinds_uses_sibling_numbering() {
        let kinds = refine_hydrogen_kinds([
            "HB1", "HB2", "HB3", "HA2", "HA3", "HE21", "HE22", "H", "HZ1", "HZ2", "HZ3", "HZ4",
        ]);

        assert_eq!(kinds["HB1"], HydrogenKind::Methyl);
        assert_eq!(kinds["HA3"], HydrogenKind::Geminal);
        assert_eq!(kinds["HE22"], HydrogenKind::Geminal);
        assert_eq!(kinds["H"], HydrogenKind::Isolated);
        assert_eq!(kinds["HZ2"], HydrogenKind::Isolated);
    }

    #[test]
    fn alternate_residue_name_prefers_ccd_parent() {
        let ccd = ChemCompLibrary::standard().with_entry({
            let mut comp = ChemComp::new("XMT", ChemCompKind::Peptide).with_atom("CA", Element::C);
            comp.parent_comp_id = Some("MET".to_string());
            comp
        });

        assert_eq!(alternate_residue_name("XMT", &ccd).as_deref(), Some("MET"));
        assert_eq!(alternate_residue_name("MSE", &ccd).as_deref(), Some("MET"));
        assert_eq!(alternate_residue_name("DG", &ccd).as_deref(), Some("G"));
        assert_eq!(alternate_residue_name("ALA", &ccd), None);
    }
}
