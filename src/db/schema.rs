use crate::model::types::Element;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChemCompFile {
    pub info: ChemCompInfo,
    #[serde(default)]
    pub atoms: Vec<ChemCompAtomEntry>,
    #[serde(default)]
    pub bonds: Vec<ChemCompBondEntry>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChemCompInfo {
    pub comp_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub comp_type: String,
    #[serde(default)]
    pub one_letter_code: Option<char>,
    #[serde(default)]
    pub parent_comp_id: Option<String>,
    pub release_status: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChemCompAtomEntry {
    pub id: String,
    pub element: Element,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChemCompBondEntry {
    pub a1: String,
    pub a2: String,
}
