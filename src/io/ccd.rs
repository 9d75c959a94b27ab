use crate::db::{ChemComp, ChemCompKind};
use crate::io::cif;
use crate::io::error::Error;
use crate::model::types::Element;
use std::io::BufRead;

const FORMAT: &str = "CCD";

/// Reads every data block of a components.cif-style document.
///
/// Each block must carry `_chem_comp` and `_chem_comp_atom`; `_chem_comp_bond` is optional
/// for single-atom components. Atoms with an unrecognized `type_symbol` fall back to a guess
/// from their name.
pub fn read<R: BufRead>(reader: R) -> Result<Vec<ChemComp>, Error> {
    let document = cif::parse(reader, FORMAT)?;
    let mut comps = Vec::with_capacity(document.blocks.len());

    for block in &document.blocks {
        let info = block
            .category("chem_comp")
            .and_then(|t| t.rows().next())
            .ok_or_else(|| {
                let section = format!("_chem_comp of block '{}'", block.name);
                Error::missing_section(FORMAT, None, section)
            })?;
        let comp_id = info.get("id").unwrap_or(block.name.as_str());

        let kind = ChemCompKind::from_type(info.get("type").unwrap_or(""));
        let mut comp = ChemComp::new(comp_id, kind);
        comp.name = info.get("name").unwrap_or("").to_string();
        comp.one_letter_code = info
            .get("one_letter_code")
            .and_then(|c| c.chars().next())
            .filter(|c| c.is_ascii_alphabetic());
        comp.parent_comp_id = info
            .get("mon_nstd_parent_comp_id")
            .map(|p| p.split(',').next().unwrap_or(p).trim().to_string());
        comp.released = info
            .get("pdbx_release_status")
            .is_none_or(|status| status == "REL");

        let atoms = block.category("chem_comp_atom").ok_or_else(|| {
            Error::missing_section(FORMAT, None, format!("_chem_comp_atom of '{}'", comp_id))
        })?;
        for row in atoms.rows() {
            let Some(atom_id) = row.get("atom_id") else {
                continue;
            };
            let element = row
                .get("type_symbol")
                .and_then(|s| s.parse::<Element>().ok())
                .unwrap_or_else(|| Element::guess_from_atom_name(atom_id));
            comp.push_atom(atom_id, row.get("alt_atom_id"), element);
        }

        if let Some(bonds) = block.category("chem_comp_bond") {
            for row in bonds.rows() {
                let (Some(a1), Some(a2)) = (row.get("atom_id_1"), row.get("atom_id_2")) else {
                    continue;
                };
                if !comp.has_atom(a1) || !comp.has_atom(a2) {
                    return Err(Error::inconsistent_data(
                        FORMAT,
                        None,
                        format!("bond {}-{} of '{}' names an undeclared atom", a1, a2, comp_id),
                    ));
                }
                comp.push_bond(a1, a2);
            }
        }

        comps.push(comp);
    }

    Ok(comps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const MSE: &str = indoc! {r#"
        data_MSE
        _chem_comp.id MSE
        _chem_comp.name SELENOMETHIONINE
        _chem_comp.type "L-peptide linking"
        _chem_comp.one_letter_code M
        _chem_comp.mon_nstd_parent_comp_id MET
        _chem_comp.pdbx_release_status REL
        loop_
        _chem_comp_atom.comp_id
        _chem_comp_atom.atom_id
        _chem_comp_atom.alt_atom_id
        _chem_comp_atom.type_symbol
        MSE N   N   N
        MSE CA  CA  C
        MSE SE  SE  SE
        MSE CE  CE  C
        MSE HE1 1HE H
        MSE HE2 2HE H
        MSE HE3 3HE H
        loop_
        _chem_comp_bond.comp_id
        _chem_comp_bond.atom_id_1
        _chem_comp_bond.atom_id_2
        _chem_comp_bond.value_order
        MSE N  CA  SING
        MSE SE CE  SING
        MSE CE HE1 SING
        MSE CE HE2 SING
        MSE CE HE3 SING
    "#};

    #[test]
    fn read_parses_modified_residue_with_parent_and_alt_names() {
        let comps = read(MSE.as_bytes()).unwrap();
        assert_eq!(comps.len(), 1);

        let mse = &comps[0];
        assert_eq!(mse.comp_id, "MSE");
        assert_eq!(mse.kind, ChemCompKind::Peptide);
        assert_eq!(mse.parent_comp_id.as_deref(), Some("MET"));
        assert_eq!(mse.element_of("SE"), Some(Element::Se));
        assert_eq!(mse.atom_id_for_alt("2HE"), Some("HE2"));
        assert_eq!(mse.methyl_groups(), vec![vec!["HE1", "HE2", "HE3"]]);
    }

    #[test]
    fn read_rejects_bonds_to_undeclared_atoms() {
        let text = indoc! {"
            data_BAD
            _chem_comp.id BAD
            _chem_comp.type NON-POLYMER
            loop_
            _chem_comp_atom.atom_id
            _chem_comp_atom.type_symbol
            C1 C
            loop_
            _chem_comp_bond.atom_id_1
            _chem_comp_bond.atom_id_2
            C1 C2
        "};
        let err = read(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InconsistentData { .. }));
    }
}
