use super::schema::ChemCompFile;
use super::store::DataStore;
use super::{ChemComp, ChemCompKind};
use std::collections::HashMap;

pub fn load_all_chem_comps() -> DataStore {
    let mut comps_by_id = HashMap::new();

    macro_rules! load_chem_comp {
        ($path:literal) => {
            let content = include_str!(concat!("../../templates/ccd/", $path));
            let schema: ChemCompFile = toml::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse CCD file '{}': {}", $path, e));

            let comp = from_schema(schema);
            let comp_id = comp.comp_id.clone();

            if comps_by_id.insert(comp_id.clone(), comp).is_some() {
                panic!("Duplicate CCD entry found: {}", comp_id);
            }
        };
    }

    load_chem_comp!("protein/ALA.toml");
    load_chem_comp!("protein/ARG.toml");
    load_chem_comp!("protein/ASN.toml");
    load_chem_comp!("protein/ASP.toml");
    load_chem_comp!("protein/CYS.toml");
    load_chem_comp!("protein/GLN.toml");
    load_chem_comp!("protein/GLU.toml");
    load_chem_comp!("protein/GLY.toml");
    load_chem_comp!("protein/HIS.toml");
    load_chem_comp!("protein/ILE.toml");
    load_chem_comp!("protein/LEU.toml");
    load_chem_comp!("protein/LYS.toml");
    load_chem_comp!("protein/MET.toml");
    load_chem_comp!("protein/PHE.toml");
    load_chem_comp!("protein/PRO.toml");
    load_chem_comp!("protein/SER.toml");
    load_chem_comp!("protein/THR.toml");
    load_chem_comp!("protein/TRP.toml");
    load_chem_comp!("protein/TYR.toml");
    load_chem_comp!("protein/VAL.toml");

    load_chem_comp!("nucleic/A.toml");
    load_chem_comp!("nucleic/C.toml");
    load_chem_comp!("nucleic/G.toml");
    load_chem_comp!("nucleic/U.toml");

    load_chem_comp!("nucleic/DA.toml");
    load_chem_comp!("nucleic/DC.toml");
    load_chem_comp!("nucleic/DG.toml");
    load_chem_comp!("nucleic/DT.toml");

    load_chem_comp!("solvent/HOH.toml");

    DataStore { comps_by_id }
}

fn from_schema(schema: ChemCompFile) -> ChemComp {
    let info = schema.info;
    let mut comp = ChemComp::new(&info.comp_id, ChemCompKind::from_type(&info.comp_type));
    comp.name = info.name;
    comp.one_letter_code = info.one_letter_code;
    comp.parent_comp_id = info.parent_comp_id;
    comp.released = info.release_status == "REL";

    for atom in schema.atoms {
        comp.push_atom(&atom.id, atom.alt.as_deref(), atom.element);
    }
    for bond in schema.bonds {
        comp.push_bond(&bond.a1, &bond.a2);
    }
    comp
}
