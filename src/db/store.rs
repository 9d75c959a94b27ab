use super::ChemComp;
use super::loader;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct DataStore {
    pub comps_by_id: HashMap<String, ChemComp>,
}

static STORE: OnceLock<DataStore> = OnceLock::new();

pub fn get_store() -> &'static DataStore {
    STORE.get_or_init(loader::load_all_chem_comps)
}
