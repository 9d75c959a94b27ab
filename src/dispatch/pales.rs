//! PALES and DYNAMO restraint tables, TALOS predictions included.
//!
//! Every row lists its atoms first and its numbers after them:
//!
//! | statement  | atoms | values                                 |
//! |------------|-------|----------------------------------------|
//! | Dipolar    | 2     | `D DD [W]`                             |
//! | Distance   | 2     | `lower upper [W]`                      |
//! | Torsion    | 4     | `lower upper [W]`                      |
//! | JCoupling  | 4     | `J error [A B C]`                      |
//! | Talos      | -     | `phi psi dphi dpsi`, plus a residue and class |

use super::RestraintHooks;
use super::core::{
    DispatcherCore, PassContext, PassOutput, RecordExtras, coupling_torsion_name, dihedral_class,
    distinct_atoms,
};
use crate::model::types::RestraintSubtype;
use crate::ops::{AtomRef, BoundSet, DiagnosticKind, RestraintLocation, check_rdc_pair};

/// TALOS marks an angle it could not predict with this value.
const TALOS_MISSING: f64 = 9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalesStatement {
    Dipolar,
    Distance,
    Torsion,
    JCoupling,
    Talos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PalesField {
    Atom(AtomRef),
    Value(f64),
    Class(String),
    Residue { seq_id: i32, comp_id: String },
}

#[derive(Debug, Clone)]
struct Row {
    statement: PalesStatement,
    atoms: Vec<AtomRef>,
    values: Vec<f64>,
    class: Option<String>,
    residue: Option<(i32, String)>,
}

impl Row {
    fn new(statement: PalesStatement) -> Self {
        Self {
            statement,
            atoms: Vec::new(),
            values: Vec::new(),
            class: None,
            residue: None,
        }
    }
}

pub struct PalesDispatcher<'a> {
    core: DispatcherCore<'a>,
    open: Option<Row>,
}

impl<'a> PalesDispatcher<'a> {
    pub fn new(context: PassContext<'a>) -> Self {
        Self {
            core: DispatcherCore::new(context),
            open: None,
        }
    }

    fn expect_shape(
        &mut self,
        location: RestraintLocation,
        row: &Row,
        atoms: usize,
        values: usize,
    ) -> bool {
        if row.atoms.len() == atoms && row.values.len() >= values {
            return true;
        }
        self.core.report(
            DiagnosticKind::MissingData,
            Some(location),
            format!(
                "Expected {} atoms and at least {} values, found {} and {}.",
                atoms,
                values,
                row.atoms.len(),
                row.values.len()
            ),
        );
        false
    }

    fn weight(&mut self, location: RestraintLocation, row: &Row, position: usize) -> Option<f64> {
        let weight = row.values.get(position).copied().unwrap_or(1.0);
        self.core.validate_weight(location, weight).then_some(weight)
    }

    fn dipolar(&mut self, row: Row) {
        let location = self.core.next_location(RestraintSubtype::Rdc);
        if !self.expect_shape(location, &row, 2, 2) {
            return;
        }
        let Some((selections, sequence_mismatch)) =
            self.core.resolve_all(location, &row.atoms, false)
        else {
            return;
        };
        if let (Some(a), Some(b)) = (selections[0].first(), selections[1].first()) {
            if let Err(rejection) = check_rdc_pair(self.core.ccd(), a, b) {
                return self.core.reject(location, rejection);
            }
        }
        let Some(weight) = self.weight(location, &row, 2) else {
            return;
        };
        let (coupling, error) = (row.values[0], row.values[1]);
        let bounds = BoundSet::range(coupling - error, coupling + error);
        let Some(bounds) = self.core.validate(location, RestraintSubtype::Rdc, bounds) else {
            return;
        };
        self.core.emit(
            RestraintSubtype::Rdc,
            selections,
            bounds.into_dst_func(weight),
            RecordExtras {
                sequence_mismatch,
                ..Default::default()
            },
        );
    }

    fn distance(&mut self, row: Row) {
        let location = self.core.next_location(RestraintSubtype::Distance);
        if !self.expect_shape(location, &row, 2, 2) {
            return;
        }
        let Some((selections, sequence_mismatch)) =
            self.core.resolve_all(location, &row.atoms, true)
        else {
            return;
        };
        if let Err(rejection) = distinct_atoms(&selections) {
            return self.core.reject(location, rejection);
        }
        let Some(weight) = self.weight(location, &row, 2) else {
            return;
        };
        let bounds = BoundSet::range(row.values[0], row.values[1]);
        let Some(bounds) = self.core.validate(location, RestraintSubtype::Distance, bounds) else {
            return;
        };
        self.core.emit(
            RestraintSubtype::Distance,
            selections,
            bounds.into_dst_func(weight),
            RecordExtras {
                sequence_mismatch,
                ..Default::default()
            },
        );
    }

    fn torsion(&mut self, row: Row) {
        let location = self.core.next_location(RestraintSubtype::Dihedral);
        if !self.expect_shape(location, &row, 4, 2) {
            return;
        }
        let Some((selections, sequence_mismatch)) =
            self.core.resolve_all(location, &row.atoms, false)
        else {
            return;
        };
        let angle_name = match dihedral_class(self.core.ccd(), &selections) {
            Ok(name) => name.map(str::to_string),
            Err(rejection) => return self.core.reject(location, rejection),
        };
        let Some(weight) = self.weight(location, &row, 2) else {
            return;
        };
        let (lower, mut upper) = (row.values[0], row.values[1]);
        if lower > upper {
            upper += 360.0;
        }
        let Some(bounds) = self
            .core
            .validate(location, RestraintSubtype::Dihedral, BoundSet::range(lower, upper))
        else {
            return;
        };
        self.core.emit(
            RestraintSubtype::Dihedral,
            selections,
            bounds.into_dst_func(weight),
            RecordExtras {
                angle_name,
                sequence_mismatch,
                ..Default::default()
            },
        );
    }

    fn j_coupling(&mut self, row: Row) {
        let location = self.core.next_location(RestraintSubtype::JCoupling);
        if !self.expect_shape(location, &row, 4, 2) {
            return;
        }
        let Some((selections, sequence_mismatch)) =
            self.core.resolve_all(location, &row.atoms, false)
        else {
            return;
        };
        let angle_name = match coupling_torsion_name(self.core.ccd(), &selections) {
            Ok(name) => name.map(str::to_string),
            Err(rejection) => return self.core.reject(location, rejection),
        };
        let (coupling, error) = (row.values[0], row.values[1]);
        let bounds = BoundSet {
            target_value: Some(coupling),
            ..BoundSet::range(coupling - error, coupling + error)
        };
        let Some(bounds) = self.core.validate(location, RestraintSubtype::JCoupling, bounds) else {
            return;
        };
        let mut dst_func = bounds.into_dst_func(1.0);
        dst_func.coefficients = row.values[2..].iter().copied().take(3).collect();
        self.core.emit(
            RestraintSubtype::JCoupling,
            selections,
            dst_func,
            RecordExtras {
                angle_name,
                sequence_mismatch,
                ..Default::default()
            },
        );
    }

    /// One TALOS row yields up to two dihedral restraints, PHI then PSI.
    fn talos(&mut self, row: Row) {
        let Some((seq_id, comp_id)) = row.residue.clone() else {
            let location = self.core.next_location(RestraintSubtype::Dihedral);
            let message = "A TALOS row names no residue.";
            self.core.report(DiagnosticKind::MissingData, Some(location), message);
            return;
        };
        if let Some(class) = &row.class {
            if !self.core.config().admits_talos_class(class) {
                log::debug!("TALOS class {} of {}:{} is not admitted", class, seq_id, comp_id);
                return;
            }
        }
        let [phi, psi, dphi, dpsi] = match row.values.as_slice() {
            [phi, psi, dphi, dpsi, ..] => [*phi, *psi, *dphi, *dpsi],
            _ => {
                let location = self.core.next_location(RestraintSubtype::Dihedral);
                self.core.report(
                    DiagnosticKind::MissingData,
                    Some(location),
                    format!(
                        "A TALOS row needs PHI, PSI, DPHI and DPSI, found {} values.",
                        row.values.len()
                    ),
                );
                return;
            }
        };

        for (name, angle, delta) in [("PHI", phi, dphi), ("PSI", psi, dpsi)] {
            if angle >= TALOS_MISSING || delta >= TALOS_MISSING {
                continue;
            }
            let location = self.core.next_location(RestraintSubtype::Dihedral);
            let Some((selections, sequence_mismatch)) =
                self.core.resolve_torsion(location, name, None, seq_id, &comp_id)
            else {
                continue;
            };
            let bounds = BoundSet {
                target_value: Some(angle),
                ..BoundSet::range(angle - delta, angle + delta)
            };
            let Some(bounds) = self.core.validate(location, RestraintSubtype::Dihedral, bounds)
            else {
                continue;
            };
            self.core.emit(
                RestraintSubtype::Dihedral,
                selections,
                bounds.into_dst_func(1.0),
                RecordExtras {
                    angle_name: Some(name.to_string()),
                    sequence_mismatch,
                    ..Default::default()
                },
            );
        }
    }
}

impl RestraintHooks for PalesDispatcher<'_> {
    type Statement = PalesStatement;
    type Field = PalesField;

    fn enter_restraint(&mut self, statement: PalesStatement) {
        self.open = Some(Row::new(statement));
    }

    fn on_field(&mut self, field: PalesField) {
        let Some(row) = self.open.as_mut() else {
            log::warn!("PALES field outside a row ignored: {:?}", field);
            return;
        };
        match field {
            PalesField::Atom(atom) => row.atoms.push(atom),
            PalesField::Value(value) => row.values.push(value),
            PalesField::Class(class) => row.class = Some(class),
            PalesField::Residue { seq_id, comp_id } => row.residue = Some((seq_id, comp_id)),
        }
    }

    fn exit_restraint(&mut self) {
        let Some(row) = self.open.take() else {
            return;
        };
        match row.statement {
            PalesStatement::Dipolar => self.dipolar(row),
            PalesStatement::Distance => self.distance(row),
            PalesStatement::Torsion => self.torsion(row),
            PalesStatement::JCoupling => self.j_coupling(row),
            PalesStatement::Talos => self.talos(row),
        }
    }

    fn finish(self) -> PassOutput {
        self.core.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChemCompLibrary;
    use crate::dispatch::{ParserEvent, replay};
    use crate::model::atom::CoordAtom;
    use crate::model::chain::PolymerChain;
    use crate::model::index::{CoordinateIndex, CoordinateIndexBuilder};
    use crate::ops::NormalizerConfig;

    type Event = ParserEvent<PalesStatement, PalesField>;

    fn index() -> CoordinateIndex {
        let residues = [(1, "MET"), (2, "GLN"), (3, "ILE"), (4, "PHE")];
        let chain = PolymerChain::from_residues("A", "1", &residues);
        CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 1, &["N", "CA", "C", "H1", "H2", "H3"])
            .observed("A", 2, &["N", "CA", "C", "H", "HA", "HB2", "HB3"])
            .observed("A", 3, &["N", "CA", "C", "H", "HA", "CB", "CG1"])
            .observed("A", 4, &["N", "CA", "C", "H", "HA"])
            .build()
    }

    fn fixture() -> (CoordinateIndex, ChemCompLibrary, NormalizerConfig) {
        (index(), ChemCompLibrary::standard(), NormalizerConfig::default())
    }

    fn row(statement: PalesStatement, fields: Vec<PalesField>) -> Vec<Event> {
        let mut events = vec![Event::Enter(statement)];
        events.extend(fields.into_iter().map(Event::Field));
        events.push(Event::Exit);
        events
    }

    fn atom(seq: i32, comp: &str, name: &str) -> PalesField {
        PalesField::Atom(AtomRef::new(seq, comp, name))
    }

    fn reference(atom: &CoordAtom) -> AtomRef {
        AtomRef::new(atom.seq_id, &atom.comp_id, &atom.atom_id).with_chain(&atom.chain_id)
    }

    #[test]
    fn dipolar_coupling_becomes_a_symmetric_range() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Dipolar,
            vec![
                atom(2, "GLN", "N"),
                atom(2, "GLN", "HN"),
                PalesField::Value(-12.3),
                PalesField::Value(0.5),
                PalesField::Value(1.0),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert_eq!(output.records.len(), 1);
        let func = &output.records[0].dst_func;
        assert!((func.lower_limit.unwrap() + 12.8).abs() < 1e-9);
        assert!((func.upper_limit.unwrap() + 11.8).abs() < 1e-9);
        assert_eq!(func.target_value, None);
        assert_eq!(func.weight, 1.0);
        assert_eq!(output.records[0].atoms[1].atom_id, "H");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn dipolar_atoms_must_be_bonded() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Dipolar,
            vec![
                atom(2, "GLN", "N"),
                atom(2, "GLN", "HA"),
                PalesField::Value(4.0),
                PalesField::Value(0.5),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert!(output.records.is_empty());
        assert!(output.diagnostics.has(DiagnosticKind::InvalidData));
    }

    #[test]
    fn talos_row_emits_phi_and_psi() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Talos,
            vec![
                PalesField::Residue { seq_id: 3, comp_id: "ILE".into() },
                PalesField::Value(-63.0),
                PalesField::Value(-42.0),
                PalesField::Value(8.0),
                PalesField::Value(9.0),
                PalesField::Class("Strong".into()),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        let names: Vec<_> = output.records.iter().map(|r| r.angle_name.as_deref()).collect();
        assert_eq!(names, vec![Some("PHI"), Some("PSI")]);
        let psi = &output.records[1].dst_func;
        assert_eq!(psi.target_value, Some(-42.0));
        assert_eq!((psi.lower_limit, psi.upper_limit), (Some(-51.0), Some(-33.0)));
        assert_eq!(output.records[1].id, 2);
    }

    #[test]
    fn talos_rows_outside_admitted_classes_are_dropped_silently() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Talos,
            vec![
                PalesField::Residue { seq_id: 3, comp_id: "ILE".into() },
                PalesField::Value(-63.0),
                PalesField::Value(-42.0),
                PalesField::Value(8.0),
                PalesField::Value(9.0),
                PalesField::Class("Dyn".into()),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert!(output.records.is_empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn talos_skips_unpredicted_angles() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Talos,
            vec![
                PalesField::Residue { seq_id: 4, comp_id: "PHE".into() },
                PalesField::Value(-70.0),
                PalesField::Value(TALOS_MISSING),
                PalesField::Value(10.0),
                PalesField::Value(0.0),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].angle_name.as_deref(), Some("PHI"));
    }

    #[test]
    fn torsion_with_wrapped_bounds_is_unwrapped() {
        let (index, ccd, config) = fixture();
        let atoms = [
            CoordAtom::new("A", 2, "GLN", "C"),
            CoordAtom::new("A", 3, "ILE", "N"),
            CoordAtom::new("A", 3, "ILE", "CA"),
            CoordAtom::new("A", 3, "ILE", "C"),
        ];
        let mut fields: Vec<PalesField> =
            atoms.iter().map(|a| PalesField::Atom(reference(a))).collect();
        fields.extend([PalesField::Value(170.0), PalesField::Value(-170.0)]);

        let output = replay(
            PalesDispatcher::new(PassContext::new(&index, &ccd, &config)),
            &row(PalesStatement::Torsion, fields),
        );

        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        assert_eq!(record.angle_name.as_deref(), Some("PHI"));
        assert_eq!(record.dst_func.upper_limit, Some(190.0));
        assert!(output.diagnostics.iter().all(|d| d.kind.is_warning()));
    }

    #[test]
    fn hn_ha_coupling_inside_one_residue_is_emitted() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::JCoupling,
            vec![
                atom(3, "ILE", "HN"),
                atom(3, "ILE", "N"),
                atom(3, "ILE", "CA"),
                atom(3, "ILE", "HA"),
                PalesField::Value(7.5),
                PalesField::Value(0.5),
                PalesField::Value(6.98),
                PalesField::Value(-1.38),
                PalesField::Value(1.72),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        let ids: Vec<&str> = record.atoms.iter().map(|a| a.atom_id.as_str()).collect();
        assert_eq!(ids, vec!["H", "N", "CA", "HA"]);
        assert_eq!(record.angle_name, None);
        assert_eq!(record.dst_func.target_value, Some(7.5));
        assert_eq!(record.dst_func.coefficients, vec![6.98, -1.38, 1.72]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn torsion_inside_one_residue_is_rejected() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Torsion,
            vec![
                atom(3, "ILE", "N"),
                atom(3, "ILE", "CA"),
                atom(3, "ILE", "CB"),
                atom(3, "ILE", "CG1"),
                PalesField::Value(-80.0),
                PalesField::Value(-40.0),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert!(output.records.is_empty());
        assert!(output.diagnostics.has(DiagnosticKind::InvalidAtomSelection));
    }

    #[test]
    fn distance_rows_accept_pseudo_atoms() {
        let (index, ccd, config) = fixture();
        let events = row(
            PalesStatement::Distance,
            vec![
                atom(2, "GLN", "HB#"),
                atom(3, "ILE", "HN"),
                PalesField::Value(1.8),
                PalesField::Value(5.0),
            ],
        );

        let output = replay(PalesDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[0].atoms[0].atom_id, "HB2");
        assert_eq!(output.records[1].atoms[0].atom_id, "HB3");
    }
}
