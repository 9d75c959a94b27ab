//! Conventional torsion angle names.
//!
//! Each torsion is four `(residue offset, atom)` pairs relative to the residue that owns
//! the angle. Names are recognized in both atom orders.

use crate::db::{ChemCompKind, ChemCompStore};
use crate::model::atom::CoordAtom;
use crate::ops::translate::parent_residue_name;

/// Atoms of a torsion as `(offset from the owning residue, atom id)`.
pub type TorsionAtoms = [(i32, &'static str); 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Torsion {
    pub name: &'static str,
    pub atoms: TorsionAtoms,
}

const fn torsion(name: &'static str, atoms: TorsionAtoms) -> Torsion {
    Torsion { name, atoms }
}

const PEPTIDE_BACKBONE: [Torsion; 3] = [
    torsion("PHI", [(-1, "C"), (0, "N"), (0, "CA"), (0, "C")]),
    torsion("PSI", [(0, "N"), (0, "CA"), (0, "C"), (1, "N")]),
    torsion("OMEGA", [(-1, "CA"), (-1, "C"), (0, "N"), (0, "CA")]),
];

const NUCLEIC_BACKBONE: [Torsion; 11] = [
    torsion("ALPHA", [(-1, "O3'"), (0, "P"), (0, "O5'"), (0, "C5'")]),
    torsion("BETA", [(0, "P"), (0, "O5'"), (0, "C5'"), (0, "C4'")]),
    torsion("GAMMA", [(0, "O5'"), (0, "C5'"), (0, "C4'"), (0, "C3'")]),
    torsion("DELTA", [(0, "C5'"), (0, "C4'"), (0, "C3'"), (0, "O3'")]),
    torsion("EPSILON", [(0, "C4'"), (0, "C3'"), (0, "O3'"), (1, "P")]),
    torsion("ZETA", [(0, "C3'"), (0, "O3'"), (1, "P"), (1, "O5'")]),
    torsion("NU0", [(0, "C4'"), (0, "O4'"), (0, "C1'"), (0, "C2'")]),
    torsion("NU1", [(0, "O4'"), (0, "C1'"), (0, "C2'"), (0, "C3'")]),
    torsion("NU2", [(0, "C1'"), (0, "C2'"), (0, "C3'"), (0, "C4'")]),
    torsion("NU3", [(0, "C2'"), (0, "C3'"), (0, "C4'"), (0, "O4'")]),
    torsion("NU4", [(0, "C3'"), (0, "C4'"), (0, "O4'"), (0, "C1'")]),
];

const PURINE_CHI: Torsion = torsion("CHI", [(0, "O4'"), (0, "C1'"), (0, "N9"), (0, "C4")]);
const PYRIMIDINE_CHI: Torsion = torsion("CHI", [(0, "O4'"), (0, "C1'"), (0, "N1"), (0, "C2")]);

/// Side-chain atom path of each standard amino acid; consecutive windows of four are
/// CHI1, CHI2, and so on.
fn side_chain_path(comp_id: &str) -> &'static [&'static str] {
    match comp_id {
        "ARG" => &["N", "CA", "CB", "CG", "CD", "NE", "CZ", "NH1"],
        "ASN" => &["N", "CA", "CB", "CG", "OD1"],
        "ASP" => &["N", "CA", "CB", "CG", "OD1"],
        "CYS" => &["N", "CA", "CB", "SG"],
        "GLN" => &["N", "CA", "CB", "CG", "CD", "OE1"],
        "GLU" => &["N", "CA", "CB", "CG", "CD", "OE1"],
        "HIS" => &["N", "CA", "CB", "CG", "ND1"],
        "ILE" => &["N", "CA", "CB", "CG1", "CD1"],
        "LEU" => &["N", "CA", "CB", "CG", "CD1"],
        "LYS" => &["N", "CA", "CB", "CG", "CD", "CE", "NZ"],
        "MET" => &["N", "CA", "CB", "CG", "SD", "CE"],
        "PHE" => &["N", "CA", "CB", "CG", "CD1"],
        "PRO" => &["N", "CA", "CB", "CG", "CD"],
        "SER" => &["N", "CA", "CB", "OG"],
        "THR" => &["N", "CA", "CB", "OG1"],
        "TRP" => &["N", "CA", "CB", "CG", "CD1"],
        "TYR" => &["N", "CA", "CB", "CG", "CD1"],
        "VAL" => &["N", "CA", "CB", "CG1"],
        _ => &[],
    }
}

const CHI_NAMES: [&str; 5] = ["CHI1", "CHI2", "CHI3", "CHI4", "CHI5"];

/// Torsions owned by a residue.
pub fn torsions_of(comp_id: &str, ccd: &dyn ChemCompStore) -> Vec<Torsion> {
    let standard = parent_residue_name(comp_id, ccd).unwrap_or_else(|| comp_id.to_string());
    let kind = ccd
        .chem_comp(&standard)
        .or_else(|| ccd.chem_comp(comp_id))
        .map(|c| c.kind);

    match kind {
        Some(k) if k.is_nucleotide() => {
            let mut torsions = NUCLEIC_BACKBONE.to_vec();
            match standard.as_str() {
                "A" | "G" | "DA" | "DG" => torsions.push(PURINE_CHI),
                "C" | "U" | "DC" | "DT" => torsions.push(PYRIMIDINE_CHI),
                _ => {}
            }
            torsions
        }
        Some(ChemCompKind::Peptide) | None => {
            let mut torsions = PEPTIDE_BACKBONE.to_vec();
            let path = side_chain_path(&standard);
            for (name, window) in CHI_NAMES.iter().zip(path.windows(4)) {
                let atoms = [(0, window[0]), (0, window[1]), (0, window[2]), (0, window[3])];
                torsions.push(torsion(name, atoms));
            }
            torsions
        }
        Some(_) => Vec::new(),
    }
}

/// Whether a name is one of the conventional torsion names.
pub fn is_torsion_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    PEPTIDE_BACKBONE
        .iter()
        .chain(NUCLEIC_BACKBONE.iter())
        .any(|t| t.name == upper)
        || upper == "CHI"
        || CHI_NAMES.contains(&upper.as_str())
}

/// Name of the torsion spanned by four resolved atoms, in either order.
pub fn dihedral_name(atoms: &[CoordAtom], ccd: &dyn ChemCompStore) -> Option<&'static str> {
    if atoms.len() != 4 {
        return None;
    }
    let reversed: Vec<&CoordAtom> = atoms.iter().rev().collect();
    let forward: Vec<&CoordAtom> = atoms.iter().collect();

    for anchor in atoms {
        for candidate in torsions_of(&anchor.comp_id, ccd) {
            for order in [&forward, &reversed] {
                let fits = order.iter().zip(candidate.atoms.iter()).all(|(atom, (offset, id))| {
                    atom.chain_id == anchor.chain_id
                        && atom.seq_id == anchor.seq_id + offset
                        && atom.atom_id == *id
                });
                if fits {
                    return Some(candidate.name);
                }
            }
        }
    }
    None
}

/// Atoms of the named torsion owned by a residue of type `comp_id`.
pub fn torsion_atoms(name: &str, comp_id: &str, ccd: &dyn ChemCompStore) -> Option<TorsionAtoms> {
    torsions_of(comp_id, ccd)
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .map(|t| t.atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;

    fn atoms(spec: &[(i32, &str, &str)]) -> Vec<CoordAtom> {
        spec.iter()
            .map(|(seq, comp, atom)| CoordAtom::new("A", *seq, comp, atom))
            .collect()
    }

    #[test]
    fn dihedral_name_recognizes_phi_across_two_residues() {
        let ccd = ChemCompLibrary::standard();
        let phi = atoms(&[(2, "GLY", "C"), (3, "PHE", "N"), (3, "PHE", "CA"), (3, "PHE", "C")]);

        assert_eq!(dihedral_name(&phi, &ccd), Some("PHI"));

        let reversed: Vec<CoordAtom> = phi.into_iter().rev().collect();
        assert_eq!(dihedral_name(&reversed, &ccd), Some("PHI"));
    }

    #[test]
    fn dihedral_name_recognizes_side_chain_and_nucleic_torsions() {
        let ccd = ChemCompLibrary::standard();
        let chi2 = atoms(&[
            (5, "LEU", "CA"),
            (5, "LEU", "CB"),
            (5, "LEU", "CG"),
            (5, "LEU", "CD1"),
        ]);
        let chi = atoms(&[(1, "DA", "O4'"), (1, "DA", "C1'"), (1, "DA", "N9"), (1, "DA", "C4")]);
        let epsilon = atoms(&[
            (1, "DC", "C4'"),
            (1, "DC", "C3'"),
            (1, "DC", "O3'"),
            (2, "DG", "P"),
        ]);

        assert_eq!(dihedral_name(&chi2, &ccd), Some("CHI2"));
        assert_eq!(dihedral_name(&chi, &ccd), Some("CHI"));
        assert_eq!(dihedral_name(&epsilon, &ccd), Some("EPSILON"));
    }

    #[test]
    fn dihedral_name_is_none_for_arbitrary_atoms() {
        let ccd = ChemCompLibrary::standard();
        let odd = atoms(&[(5, "LEU", "HA"), (5, "LEU", "CB"), (5, "LEU", "CG"), (5, "LEU", "CD1")]);

        assert_eq!(dihedral_name(&odd, &ccd), None);
    }

    #[test]
    fn torsion_atoms_reverses_the_lookup() {
        let ccd = ChemCompLibrary::standard();

        assert_eq!(
            torsion_atoms("psi", "ALA", &ccd),
            Some([(0, "N"), (0, "CA"), (0, "C"), (1, "N")])
        );
        assert_eq!(
            torsion_atoms("CHI1", "SER", &ccd),
            Some([(0, "N"), (0, "CA"), (0, "CB"), (0, "OG")])
        );
        assert_eq!(torsion_atoms("CHI2", "SER", &ccd), None);
    }

    #[test]
    fn torsion_names_are_recognized_case_insensitively() {
        assert!(is_torsion_name("phi"));
        assert!(is_torsion_name("CHI3"));
        assert!(is_torsion_name("ZETA"));
        assert!(!is_torsion_name("HA"));
    }
}
