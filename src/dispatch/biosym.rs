//! BIOSYM (Insight/Discover) distance and dihedral restraints.
//!
//! Atoms are written `segment:RES_seq:ATOM`; the segment is usually a number that only
//! the chain number dictionary can tie to a coordinate chain. Values follow the atoms:
//! `lower upper` then force constants, which carry no geometry and are not kept.

use super::RestraintHooks;
use super::core::{
    DispatcherCore, PassContext, PassOutput, RecordExtras, dihedral_class, distinct_atoms,
};
use crate::model::types::RestraintSubtype;
use crate::ops::{AtomRef, BoundSet, DiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiosymStatement {
    Distance,
    Dihedral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BiosymField {
    Atom(AtomRef),
    Value(f64),
}

pub struct BiosymDispatcher<'a> {
    core: DispatcherCore<'a>,
    open: Option<(BiosymStatement, Vec<AtomRef>, Vec<f64>)>,
}

impl<'a> BiosymDispatcher<'a> {
    pub fn new(context: PassContext<'a>) -> Self {
        Self {
            core: DispatcherCore::new(context),
            open: None,
        }
    }

    fn close(&mut self, statement: BiosymStatement, atoms: Vec<AtomRef>, values: Vec<f64>) {
        let (subtype, arity) = match statement {
            BiosymStatement::Distance => (RestraintSubtype::Distance, 2),
            BiosymStatement::Dihedral => (RestraintSubtype::Dihedral, 4),
        };
        let location = self.core.next_location(subtype);
        let [lower, upper] = match (atoms.len() == arity, values.as_slice()) {
            (true, [lower, upper, ..]) => [*lower, *upper],
            _ => {
                self.core.report(
                    DiagnosticKind::MissingData,
                    Some(location),
                    format!(
                        "Expected {} atoms with lower and upper bounds, found {} atoms and {} \
                         values.",
                        arity,
                        atoms.len(),
                        values.len()
                    ),
                );
                return;
            }
        };

        let Some((selections, sequence_mismatch)) =
            self.core.resolve_all(location, &atoms, subtype.allows_ambiguity())
        else {
            return;
        };

        let (bounds, angle_name) = match subtype {
            RestraintSubtype::Dihedral => {
                let name = match dihedral_class(self.core.ccd(), &selections) {
                    Ok(name) => name.map(str::to_string),
                    Err(rejection) => return self.core.reject(location, rejection),
                };
                let upper = if lower > upper { upper + 360.0 } else { upper };
                (BoundSet::range(lower, upper), name)
            }
            _ => {
                if let Err(rejection) = distinct_atoms(&selections) {
                    return self.core.reject(location, rejection);
                }
                (BoundSet::range(lower, upper), None)
            }
        };

        let Some(bounds) = self.core.validate(location, subtype, bounds) else {
            return;
        };
        self.core.emit(
            subtype,
            selections,
            bounds.into_dst_func(1.0),
            RecordExtras {
                angle_name,
                sequence_mismatch,
                ..Default::default()
            },
        );
    }
}

impl RestraintHooks for BiosymDispatcher<'_> {
    type Statement = BiosymStatement;
    type Field = BiosymField;

    fn enter_restraint(&mut self, statement: BiosymStatement) {
        self.open = Some((statement, Vec::new(), Vec::new()));
    }

    fn on_field(&mut self, field: BiosymField) {
        let Some((_, atoms, values)) = self.open.as_mut() else {
            log::warn!("BIOSYM field outside a restraint ignored: {:?}", field);
            return;
        };
        match field {
            BiosymField::Atom(atom) => atoms.push(atom),
            BiosymField::Value(value) => values.push(value),
        }
    }

    fn exit_restraint(&mut self) {
        if let Some((statement, atoms, values)) = self.open.take() {
            self.close(statement, atoms, values);
        }
    }

    fn finish(self) -> PassOutput {
        self.core.finish()
    }
}
