//! AMBER `&rst` namelists.
//!
//! IAT entries are atom numbers, negative entries pointing at an IGR group. Atom numbers
//! resolve through a parameter topology when one is supplied and through the Sander
//! comment preceding the namelist otherwise. Bounds `r1` to `r4` map onto the linear and
//! flat-bottom limits; once given they carry over to later namelists, as in sander.

use super::RestraintHooks;
use super::core::{
    DispatcherCore, PassContext, PassOutput, RecordExtras, dihedral_class, distinct_atoms,
    distinct_residues,
};
use crate::io::AmberTopology;
use crate::model::atom::CoordAtom;
use crate::model::types::RestraintSubtype;
use crate::ops::{
    AmberAtomDict, AmberTopologyMapper, AtomColumn, AtomRef, BoundSet, DiagnosticKind,
    RestraintLocation, SanderComment, atom_columns, classify_amber_restraint,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmberStatement {
    Restraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmberField {
    Iat(Vec<i64>),
    /// `igrK` with its 1-based IAT position.
    Igr(usize, Vec<i64>),
    /// `rK` with `K` in 1..=4.
    R(usize, f64),
    Rk2(f64),
    Rk3(f64),
    Rstwt(Vec<f64>),
}

#[derive(Debug, Clone, Default)]
struct Namelist {
    iat: Vec<i64>,
    igr: BTreeMap<usize, Vec<i64>>,
    rstwt: Vec<f64>,
    invalid: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CarriedValues {
    r: [Option<f64>; 4],
    rk2: Option<f64>,
    rk3: Option<f64>,
}

pub struct AmberDispatcher<'a> {
    core: DispatcherCore<'a>,
    atoms: AmberAtomDict,
    topology_mode: bool,
    comment: Option<String>,
    open: Option<Namelist>,
    carried: CarriedValues,
}

impl<'a> AmberDispatcher<'a> {
    /// Dispatcher resolving atom numbers through Sander comments.
    pub fn new(context: PassContext<'a>) -> Self {
        Self {
            core: DispatcherCore::new(context),
            atoms: AmberAtomDict::new(),
            topology_mode: false,
            comment: None,
            open: None,
            carried: CarriedValues::default(),
        }
    }

    /// Resolves atom numbers through a parameter topology instead of comments.
    pub fn with_topology(self, topology: &AmberTopology) -> Self {
        let atoms = AmberTopologyMapper::new(self.core.index(), self.core.ccd()).map(topology);
        log::info!(
            "mapped {} of {} topology atoms onto the coordinates",
            atoms.len(),
            topology.n_atoms()
        );
        self.with_atom_dict(atoms)
    }

    /// Resolves atom numbers through a prepared dictionary.
    pub fn with_atom_dict(mut self, atoms: AmberAtomDict) -> Self {
        self.atoms = atoms;
        self.topology_mode = true;
        self
    }

    pub fn atom_dict(&self) -> &AmberAtomDict {
        &self.atoms
    }

    fn lookup(&self, columns: &[AtomColumn]) -> Option<Vec<Vec<CoordAtom>>> {
        columns
            .iter()
            .map(|c| {
                c.numbers()
                    .iter()
                    .map(|n| self.atoms.get(*n).cloned())
                    .collect::<Option<Vec<_>>>()
            })
            .collect()
    }

    fn resolve_columns(
        &mut self,
        location: RestraintLocation,
        subtype: RestraintSubtype,
        columns: &[AtomColumn],
        comment: Option<&str>,
    ) -> Option<(Vec<Vec<CoordAtom>>, bool)> {
        if let Some(selections) = self.lookup(columns) {
            return Some((selections, false));
        }
        if self.topology_mode {
            let missing = columns
                .iter()
                .flat_map(|c| c.numbers().iter().copied())
                .filter(|n| !self.atoms.contains(*n))
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.core.report(
                DiagnosticKind::AtomNotFound,
                Some(location),
                format!("Atom numbers {} are absent from the topology.", missing),
            );
            return None;
        }

        let comment = comment.map(SanderComment::parse).unwrap_or_default();
        if comment.is_empty() {
            self.core.report(
                DiagnosticKind::MissingData,
                Some(location),
                "Atom numbers cannot be resolved without a topology or a Sander comment naming \
                 the atoms.",
            );
            return None;
        }

        if let Some(triple) = comment.torsion().filter(|_| subtype == RestraintSubtype::Dihedral) {
            let (selections, mismatch) = self.core.resolve_torsion(
                location,
                &triple.atom_id,
                None,
                triple.seq_id,
                &triple.comp_id,
            )?;
            for (column, selection) in columns.iter().zip(&selections) {
                if let (AtomColumn::Atom(n), Some(atom)) = (column, selection.first()) {
                    self.atoms.insert_once(*n, atom.clone());
                }
            }
            return self.lookup(columns).map(|s| (s, mismatch));
        }

        if comment.triples.len() < columns.len() {
            self.core.report(
                DiagnosticKind::MissingData,
                Some(location),
                format!(
                    "The Sander comment names {} atoms but the restraint has {} positions.",
                    comment.triples.len(),
                    columns.len()
                ),
            );
            return None;
        }

        let mut mismatch = false;
        let mut complete = true;
        for (column, triple) in columns.iter().zip(&comment.triples) {
            if column.numbers().iter().all(|n| self.atoms.contains(*n)) {
                continue;
            }
            let reference = AtomRef::new(triple.seq_id, &triple.comp_id, &triple.atom_id);
            let grouped = matches!(column, AtomColumn::Group(_));
            let Some(resolved) = self.core.resolve(location, &reference, grouped) else {
                complete = false;
                continue;
            };
            mismatch |= resolved.sequence_mismatch;

            match column {
                AtomColumn::Atom(n) => {
                    if let Some(atom) = resolved.atoms.into_iter().next() {
                        self.atoms.insert_once(*n, atom);
                    }
                }
                AtomColumn::Group(numbers) => {
                    let mut atoms = resolved.atoms;
                    if atoms.is_empty() {
                        complete = false;
                        continue;
                    }
                    atoms.sort_by(|a, b| a.atom_id.cmp(&b.atom_id));
                    if atoms.len() != numbers.len() {
                        log::debug!(
                            "{} resolves to {} atoms for an IGR group of {}; binding in turn",
                            reference,
                            atoms.len(),
                            numbers.len()
                        );
                    }
                    // serials beyond the resolved atoms wrap around, so every serial is bound
                    for (n, atom) in numbers.iter().zip(atoms.iter().cycle()) {
                        self.atoms.insert_once(*n, atom.clone());
                    }
                }
            }
        }

        if !complete {
            return None;
        }
        self.lookup(columns).map(|s| (s, mismatch))
    }

    fn close(&mut self, namelist: Namelist, comment: Option<String>) {
        let has_weights = !namelist.rstwt.is_empty();
        let Some(subtype) = classify_amber_restraint(namelist.iat.len(), has_weights) else {
            self.core.report(
                DiagnosticKind::InvalidData,
                None,
                format!(
                    "A restraint with {} IAT entries matches no restraint class.",
                    namelist.iat.len()
                ),
            );
            return;
        };
        let location = self.core.next_location(subtype);

        if let Some(message) = namelist.invalid.into_iter().next() {
            self.core.report(DiagnosticKind::InvalidData, Some(location), message);
            return;
        }
        let (columns, notes) = match atom_columns(&namelist.iat, &namelist.igr) {
            Ok(paired) => paired,
            Err(rejection) => return self.core.reject(location, rejection),
        };
        for note in notes {
            self.core.report(DiagnosticKind::RedundantData, Some(location), note);
        }
        let grouped = columns.iter().any(|c| matches!(c, AtomColumn::Group(_)));
        if !subtype.allows_ambiguity() && grouped {
            self.core.report(
                DiagnosticKind::InvalidAtomSelection,
                Some(location),
                format!("IGR groups are not allowed in {}.", subtype.description()),
            );
            return;
        }
        let generalized = subtype == RestraintSubtype::GeneralizedDistance;
        if generalized && namelist.rstwt.len() * 2 != columns.len() {
            self.core.report(
                DiagnosticKind::InvalidData,
                Some(location),
                format!(
                    "A generalized distance over {} atoms needs {} RSTWT weights, {} given.",
                    columns.len(),
                    columns.len() / 2,
                    namelist.rstwt.len()
                ),
            );
            return;
        }
        for (name, constant) in [("rk2", self.carried.rk2), ("rk3", self.carried.rk3)] {
            if let Some(k) = constant.filter(|k| !k.is_finite() || *k < 0.0) {
                self.core.report(
                    DiagnosticKind::InvalidData,
                    Some(location),
                    format!("The force constant {}={} must not be negative.", name, k),
                );
                return;
            }
        }

        let Some((selections, sequence_mismatch)) =
            self.resolve_columns(location, subtype, &columns, comment.as_deref())
        else {
            return;
        };

        let checked = match subtype {
            RestraintSubtype::Dihedral => {
                dihedral_class(self.core.ccd(), &selections).map(|name| name.map(str::to_string))
            }
            RestraintSubtype::Angle => distinct_residues(&selections).map(|_| None),
            _ => distinct_atoms(&selections).map(|_| None),
        };
        let angle_name = match checked {
            Ok(name) => name,
            Err(rejection) => return self.core.reject(location, rejection),
        };

        let [r1, r2, r3, r4] = self.carried.r;
        let bounds = BoundSet {
            target_value: None,
            lower_linear_limit: r1,
            lower_limit: r2,
            upper_limit: r3,
            upper_linear_limit: r4,
        };
        let Some(bounds) = self.core.validate(location, subtype, bounds) else {
            return;
        };
        let mut dst_func = bounds.into_dst_func(1.0);
        if subtype == RestraintSubtype::GeneralizedDistance {
            dst_func.coefficients = namelist.rstwt;
        }

        self.core.emit(
            subtype,
            selections,
            dst_func,
            RecordExtras {
                angle_name,
                sequence_mismatch,
                ..Default::default()
            },
        );
    }
}

impl RestraintHooks for AmberDispatcher<'_> {
    type Statement = AmberStatement;
    type Field = AmberField;

    fn enter_restraint(&mut self, _statement: AmberStatement) {
        self.open = Some(Namelist::default());
    }

    fn on_field(&mut self, field: AmberField) {
        let Some(namelist) = self.open.as_mut() else {
            log::warn!("AMBER field outside a namelist ignored: {:?}", field);
            return;
        };
        match field {
            AmberField::Iat(iat) => namelist.iat = iat,
            AmberField::Igr(position, group) => {
                namelist.igr.insert(position, group);
            }
            AmberField::R(k @ 1..=4, value) => self.carried.r[k - 1] = Some(value),
            AmberField::R(k, _) => namelist.invalid.push(format!("r{} is not an AMBER bound.", k)),
            AmberField::Rk2(k) => self.carried.rk2 = Some(k),
            AmberField::Rk3(k) => self.carried.rk3 = Some(k),
            AmberField::Rstwt(weights) => namelist.rstwt = weights,
        }
    }

    /// Keeps the latest comment for the namelist that follows it.
    fn on_comment(&mut self, text: &str) {
        self.comment = Some(text.to_string());
    }

    fn exit_restraint(&mut self) {
        let Some(namelist) = self.open.take() else {
            return;
        };
        let comment = self.comment.take();
        self.close(namelist, comment);
    }

    fn finish(self) -> PassOutput {
        self.core.finish()
    }
}
