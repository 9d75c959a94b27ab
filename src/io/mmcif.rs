use crate::io::cif::{self, CifLoop, DataBlock};
use crate::io::error::Error;
use crate::model::chain::{EntityKind, PolymerChain};
use crate::model::index::{CoordinateIndex, CoordinateIndexBuilder};
use crate::model::types::Point;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;

const FORMAT: &str = "mmCIF";

/// Longest terminal C-N (or O3'-P) separation still treated as a covalent closure.
const CLOSURE_BOND_CUTOFF: f64 = 1.75;

#[derive(Debug, Clone)]
struct SiteResidue {
    chain_id: String,
    auth_seq_id: i32,
    label_seq_id: Option<i32>,
    comp_id: String,
    auth_comp_id: String,
    entity_id: String,
}

/// Builds a [`CoordinateIndex`] from the first data block of an mmCIF document.
///
/// Only the first model of `_atom_site` is indexed and the first alternate location of
/// each atom wins. Chain and residue numbering follow the author scheme; label numbering
/// is kept alongside for the label-to-author maps.
pub fn read<R: BufRead>(reader: R) -> Result<CoordinateIndex, Error> {
    let document = cif::parse(reader, FORMAT)?;
    let block = document
        .blocks
        .first()
        .ok_or_else(|| Error::missing_section(FORMAT, None, "data block"))?;
    let atom_site = block
        .category("atom_site")
        .ok_or_else(|| Error::missing_section(FORMAT, None, "_atom_site"))?;

    let mut builder = CoordinateIndexBuilder::new();
    let residues = collect_atom_sites(atom_site, &mut builder)?;

    let polymers = match block.category("pdbx_poly_seq_scheme") {
        Some(scheme) => polymers_from_scheme(scheme)?,
        None => polymers_from_sites(&residues),
    };
    let polymer_keys: HashSet<(String, i32)> = polymers
        .iter()
        .flat_map(|c| {
            c.auth_seq_ids()
                .iter()
                .map(move |s| (c.chain_id.clone(), *s))
        })
        .collect();

    let nonpolymers = match block.category("pdbx_nonpoly_scheme") {
        Some(scheme) => nonpolymers_from_scheme(scheme),
        None => nonpolymers_from_sites(&residues, &polymer_keys),
    };

    for chain in polymers {
        builder.push_polymer(chain);
    }
    for entity in nonpolymers {
        builder.push_nonpolymer(entity);
    }

    if let Some(unobserved) = block.category("pdbx_unobs_or_zero_occ_residues") {
        for row in unobserved.rows() {
            let chain = row.first_of(&["auth_asym_id", "label_asym_id"]);
            let seq = row
                .parse_i32("auth_seq_id")
                .or_else(|| row.parse_i32("label_seq_id"));
            if let (Some(chain), Some(seq)) = (chain, seq) {
                builder.mark_unobserved(chain, seq);
            }
        }
    }

    mark_cyclic_chains(block, &mut builder);

    Ok(builder.build())
}

fn collect_atom_sites(
    atom_site: &CifLoop,
    builder: &mut CoordinateIndexBuilder,
) -> Result<Vec<SiteResidue>, Error> {
    let mut residues = Vec::new();
    let mut seen = HashSet::new();
    let mut first_model: Option<&str> = None;

    for (row_index, row) in atom_site.rows().enumerate() {
        if let Some(model) = row.get("pdbx_PDB_model_num") {
            match first_model {
                None => first_model = Some(model),
                Some(first) if first != model => continue,
                Some(_) => {}
            }
        }

        let chain_id = row
            .first_of(&["auth_asym_id", "label_asym_id"])
            .ok_or_else(|| row_error(row_index, "atom has no chain identifier"))?;
        let auth_seq_id = row
            .parse_i32("auth_seq_id")
            .or_else(|| row.parse_i32("label_seq_id"))
            .ok_or_else(|| row_error(row_index, "atom has no sequence number"))?;
        let atom_id = row
            .first_of(&["label_atom_id", "auth_atom_id"])
            .ok_or_else(|| row_error(row_index, "atom has no name"))?;
        let alt_atom_id = row.get("auth_atom_id").unwrap_or(atom_id);
        let comp_id = row
            .first_of(&["label_comp_id", "auth_comp_id"])
            .ok_or_else(|| row_error(row_index, "atom has no residue name"))?;

        let position = match (
            row.parse_f64("Cartn_x"),
            row.parse_f64("Cartn_y"),
            row.parse_f64("Cartn_z"),
        ) {
            (Some(x), Some(y), Some(z)) => Point::new(x, y, z),
            _ => return Err(row_error(row_index, "atom has invalid coordinates")),
        };

        builder.push_atom(chain_id, auth_seq_id, atom_id, alt_atom_id, position);

        if seen.insert((chain_id.to_string(), auth_seq_id)) {
            residues.push(SiteResidue {
                chain_id: chain_id.to_string(),
                auth_seq_id,
                label_seq_id: row.parse_i32("label_seq_id"),
                comp_id: comp_id.to_string(),
                auth_comp_id: row.get("auth_comp_id").unwrap_or(comp_id).to_string(),
                entity_id: row.get("label_entity_id").unwrap_or("?").to_string(),
            });
        }
    }

    Ok(residues)
}

fn row_error(row_index: usize, details: &str) -> Error {
    Error::inconsistent_data(
        FORMAT,
        None,
        format!("_atom_site row {}: {}", row_index + 1, details),
    )
}

fn polymers_from_scheme(scheme: &CifLoop) -> Result<Vec<PolymerChain>, Error> {
    let mut order: Vec<String> = Vec::new();
    let mut chains: HashMap<String, PolymerChain> = HashMap::new();

    for row in scheme.rows() {
        let Some(chain_id) = row.first_of(&["pdb_strand_id", "asym_id"]) else {
            continue;
        };
        let Some(label_seq_id) = row.parse_i32("seq_id") else {
            continue;
        };
        let auth_seq_id = row
            .parse_i32("pdb_seq_num")
            .or_else(|| row.parse_i32("auth_seq_num"))
            .unwrap_or(label_seq_id);
        let comp_id = row.get("mon_id").ok_or_else(|| {
            Error::inconsistent_data(
                FORMAT,
                None,
                format!("_pdbx_poly_seq_scheme row of chain '{}' has no mon_id", chain_id),
            )
        })?;
        let auth_comp_id = row.first_of(&["pdb_mon_id", "auth_mon_id"]).unwrap_or(comp_id);

        let chain = chains.entry(chain_id.to_string()).or_insert_with(|| {
            order.push(chain_id.to_string());
            PolymerChain::new(
                chain_id,
                row.get("entity_id").unwrap_or("?"),
                EntityKind::Polymer,
            )
        });

        // Microheterogeneity and insertion codes repeat a residue; the first entry wins.
        if chain.position_of_label(label_seq_id).is_some()
            || chain.position_of_auth(auth_seq_id).is_some()
        {
            continue;
        }
        chain.push_residue(auth_seq_id, label_seq_id, comp_id, auth_comp_id);
    }

    Ok(order
        .into_iter()
        .filter_map(|id| chains.remove(&id))
        .collect())
}

fn polymers_from_sites(residues: &[SiteResidue]) -> Vec<PolymerChain> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&SiteResidue>> = HashMap::new();

    for residue in residues.iter().filter(|r| r.label_seq_id.is_some()) {
        grouped
            .entry(residue.chain_id.clone())
            .or_insert_with(|| {
                order.push(residue.chain_id.clone());
                Vec::new()
            })
            .push(residue);
    }

    order
        .into_iter()
        .filter_map(|id| grouped.remove(&id).map(|rs| (id, rs)))
        .map(|(id, mut rs)| {
            rs.sort_by_key(|r| r.label_seq_id);
            let mut chain = PolymerChain::new(&id, &rs[0].entity_id, EntityKind::Polymer);
            for r in rs {
                if let Some(label) = r.label_seq_id {
                    if chain.position_of_label(label).is_none() {
                        chain.push_residue(r.auth_seq_id, label, &r.comp_id, &r.auth_comp_id);
                    }
                }
            }
            chain
        })
        .collect()
}

fn nonpolymers_from_scheme(scheme: &CifLoop) -> Vec<PolymerChain> {
    let mut entities: Vec<PolymerChain> = Vec::new();

    for row in scheme.rows() {
        let (Some(chain_id), Some(auth_seq_id), Some(comp_id)) = (
            row.first_of(&["pdb_strand_id", "asym_id"]),
            row.parse_i32("pdb_seq_num")
                .or_else(|| row.parse_i32("auth_seq_num")),
            row.get("mon_id"),
        ) else {
            continue;
        };
        let entity_id = row.get("entity_id").unwrap_or("?");
        let auth_comp_id = row.first_of(&["pdb_mon_id", "auth_mon_id"]).unwrap_or(comp_id);
        push_nonpolymer_residue(
            &mut entities,
            chain_id,
            entity_id,
            auth_seq_id,
            comp_id,
            auth_comp_id,
        );
    }

    entities
}

fn nonpolymers_from_sites(
    residues: &[SiteResidue],
    polymer_keys: &HashSet<(String, i32)>,
) -> Vec<PolymerChain> {
    let mut entities: Vec<PolymerChain> = Vec::new();
    for r in residues {
        if polymer_keys.contains(&(r.chain_id.clone(), r.auth_seq_id)) {
            continue;
        }
        push_nonpolymer_residue(
            &mut entities,
            &r.chain_id,
            &r.entity_id,
            r.auth_seq_id,
            &r.comp_id,
            &r.auth_comp_id,
        );
    }
    entities
}

fn push_nonpolymer_residue(
    entities: &mut Vec<PolymerChain>,
    chain_id: &str,
    entity_id: &str,
    auth_seq_id: i32,
    comp_id: &str,
    auth_comp_id: &str,
) {
    let position = entities
        .iter()
        .position(|e| e.chain_id == chain_id && e.entity_id == entity_id);
    let entity = match position {
        Some(i) => &mut entities[i],
        None => {
            entities.push(PolymerChain::new(chain_id, entity_id, EntityKind::NonPolymer));
            let last = entities.len() - 1;
            &mut entities[last]
        }
    };
    if entity.position_of_auth(auth_seq_id).is_none() {
        let ordinal = entity.len() as i32 + 1;
        entity.push_residue(auth_seq_id, ordinal, comp_id, auth_comp_id);
    }
}

fn mark_cyclic_chains(block: &DataBlock, builder: &mut CoordinateIndexBuilder) {
    let termini: Vec<(String, i32, i32)> = builder
        .polymers()
        .iter()
        .filter(|c| c.len() > 2)
        .filter_map(|c| {
            Some((
                c.chain_id.clone(),
                c.first_auth_seq_id()?,
                c.last_auth_seq_id()?,
            ))
        })
        .collect();

    let mut declared: HashSet<String> = HashSet::new();
    if let Some(conn) = block.category("struct_conn") {
        for row in conn.rows() {
            let is_covalent = row
                .get("conn_type_id")
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("covale"));
            if !is_covalent {
                continue;
            }
            let (Some(c1), Some(s1), Some(c2), Some(s2)) = (
                row.get("ptnr1_auth_asym_id"),
                row.parse_i32("ptnr1_auth_seq_id"),
                row.get("ptnr2_auth_asym_id"),
                row.parse_i32("ptnr2_auth_seq_id"),
            ) else {
                continue;
            };
            if c1 != c2 {
                continue;
            }
            if let Some((chain_id, first, last)) =
                termini.iter().find(|(id, _, _)| id == c1)
            {
                if (s1 == *first && s2 == *last) || (s1 == *last && s2 == *first) {
                    declared.insert(chain_id.clone());
                }
            }
        }
    }

    for (chain_id, first, last) in &termini {
        let closed = declared.contains(chain_id)
            || [("C", "N"), ("O3'", "P")].iter().any(|(tail, head)| {
                match (
                    builder.position(chain_id, *last, tail),
                    builder.position(chain_id, *first, head),
                ) {
                    (Some(a), Some(b)) => nalgebra::distance(&a, &b) < CLOSURE_BOND_CUTOFF,
                    _ => false,
                }
            });
        if closed {
            log::debug!("chain '{}' is a cyclic polymer", chain_id);
            builder.mark_cyclic(chain_id);
        }
    }
}
