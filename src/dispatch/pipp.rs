//! PIPP chemical-shift lists.
//!
//! A `RES_ID`/`RES_TYPE` header opens a residue block and stays in force for every shift
//! row below it. PIPP files carry no chain, so references land on the first polymer
//! chain unless an earlier pass published a remap.

use super::RestraintHooks;
use super::core::{DispatcherCore, PassContext, PassOutput, RecordExtras};
use crate::model::types::RestraintSubtype;
use crate::ops::{AtomRef, DiagnosticKind, shift_ambiguity_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PippStatement {
    /// A `RES_ID`/`RES_TYPE` header or a shift row; both use the same fields.
    Row,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PippField {
    ResId(i32),
    ResType(String),
    AtomName(String),
    Shift(f64),
}

#[derive(Debug, Clone, Default)]
struct ShiftRow {
    atom_id: Option<String>,
    shift: Option<f64>,
}

pub struct PippDispatcher<'a> {
    core: DispatcherCore<'a>,
    seq_id: Option<i32>,
    comp_id: Option<String>,
    open: Option<ShiftRow>,
}

impl<'a> PippDispatcher<'a> {
    pub fn new(context: PassContext<'a>) -> Self {
        Self {
            core: DispatcherCore::new(context),
            seq_id: None,
            comp_id: None,
            open: None,
        }
    }

    fn close(&mut self, row: ShiftRow) {
        let (Some(atom_id), Some(shift)) = (row.atom_id, row.shift) else {
            return;
        };
        let location = self.core.next_location(RestraintSubtype::ChemicalShift);
        let (Some(seq_id), Some(comp_id)) = (self.seq_id, self.comp_id.clone()) else {
            self.core.report(
                DiagnosticKind::MissingData,
                Some(location),
                format!("The shift of {} precedes any RES_ID/RES_TYPE header.", atom_id),
            );
            return;
        };

        let reference = AtomRef::new(seq_id, &comp_id, &atom_id);
        let Some(resolved) = self.core.resolve(location, &reference, true) else {
            return;
        };
        let Some(first) = resolved.atoms.first() else {
            return;
        };
        let Some(bounds) = self.core.validate_shift(location, shift, first) else {
            return;
        };
        let ambig_code = shift_ambiguity_code(self.core.ccd(), self.core.stats(), &resolved.atoms);

        self.core.emit(
            RestraintSubtype::ChemicalShift,
            vec![resolved.atoms],
            bounds.into_dst_func(1.0),
            RecordExtras {
                ambig_code: Some(ambig_code),
                sequence_mismatch: resolved.sequence_mismatch,
                ..Default::default()
            },
        );
    }
}

impl RestraintHooks for PippDispatcher<'_> {
    type Statement = PippStatement;
    type Field = PippField;

    fn enter_restraint(&mut self, _statement: PippStatement) {
        self.open = Some(ShiftRow::default());
    }

    fn on_field(&mut self, field: PippField) {
        match field {
            PippField::ResId(seq_id) => self.seq_id = Some(seq_id),
            PippField::ResType(comp_id) => self.comp_id = Some(comp_id),
            PippField::AtomName(atom_id) => match self.open.as_mut() {
                Some(row) => row.atom_id = Some(atom_id),
                None => log::warn!("PIPP atom {} outside a row ignored", atom_id),
            },
            PippField::Shift(shift) => match self.open.as_mut() {
                Some(row) => row.shift = Some(shift),
                None => log::warn!("PIPP shift {} outside a row ignored", shift),
            },
        }
    }

    fn exit_restraint(&mut self) {
        if let Some(row) = self.open.take() {
            self.close(row);
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
    use crate::model::chain::PolymerChain;
    use crate::model::index::{CoordinateIndex, CoordinateIndexBuilder};
    use crate::ops::NormalizerConfig;

    type Event = ParserEvent<PippStatement, PippField>;

    fn index() -> CoordinateIndex {
        let chain = PolymerChain::from_residues("A", "1", &[(1, "MET"), (2, "LEU"), (3, "GLY")]);
        CoordinateIndexBuilder::new()
            .polymer(chain)
            .observed("A", 1, &["N", "CA", "H1"])
            .observed(
                "A",
                2,
                &[
                    "N", "CA", "CB", "CG", "CD1", "CD2", "HD11", "HD12", "HD13", "HD21", "HD22",
                    "HD23", "HG",
                ],
            )
            .observed("A", 3, &["N", "CA", "H", "HA2", "HA3"])
            .build()
    }

    fn fixture() -> (CoordinateIndex, ChemCompLibrary, NormalizerConfig) {
        (index(), ChemCompLibrary::standard(), NormalizerConfig::default())
    }

    fn block(seq: i32, comp: &str, rows: &[(&str, f64)]) -> Vec<Event> {
        let mut events = vec![
            Event::Enter(PippStatement::Row),
            Event::Field(PippField::ResId(seq)),
            Event::Field(PippField::ResType(comp.to_string())),
            Event::Exit,
        ];
        for (atom, shift) in rows {
            events.extend([
                Event::Enter(PippStatement::Row),
                Event::Field(PippField::AtomName(atom.to_string())),
                Event::Field(PippField::Shift(*shift)),
                Event::Exit,
            ]);
        }
        events
    }

    #[test]
    fn methyl_shift_yields_one_record_per_proton() {
        let (index, ccd, config) = fixture();

        let output = replay(
            PippDispatcher::new(PassContext::new(&index, &ccd, &config)),
            &block(2, "LEU", &[("MD1", 0.85)]),
        );

        assert_eq!(output.records.len(), 3);
        assert!(output.records.iter().all(|r| r.ambig_code == Some(1) && r.id == 1));
        assert_eq!(output.records[0].dst_func.target_value, Some(0.85));
    }

    #[test]
    fn both_methyls_are_ambiguous_within_the_residue() {
        let (index, ccd, config) = fixture();

        let output = replay(
            PippDispatcher::new(PassContext::new(&index, &ccd, &config)),
            &block(2, "LEU", &[("HD#", 0.85)]),
        );

        assert_eq!(output.records.len(), 6);
        assert!(output.records.iter().all(|r| r.ambig_code == Some(2)));
    }

    #[test]
    fn residue_header_stays_in_force_for_later_rows() {
        let (index, ccd, config) = fixture();

        let output = replay(
            PippDispatcher::new(PassContext::new(&index, &ccd, &config)),
            &block(3, "GLY", &[("HN", 8.3), ("HA2", 3.9)]),
        );

        let ids: Vec<u32> = output.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(output.records[0].atoms[0].atom_id, "H");
    }

    #[test]
    fn a_proton_shift_outside_its_window_is_kept_with_a_warning() {
        let (index, ccd, config) = fixture();

        let output = replay(
            PippDispatcher::new(PassContext::new(&index, &ccd, &config)),
            &block(3, "GLY", &[("HA2", 45.0)]),
        );

        assert_eq!(output.records.len(), 1);
        assert!(output.diagnostics.has(DiagnosticKind::RangeValueWarning));
    }

    #[test]
    fn shifts_before_a_header_are_missing_data() {
        let (index, ccd, config) = fixture();
        let events = vec![
            Event::Enter(PippStatement::Row),
            Event::Field(PippField::AtomName("HA".into())),
            Event::Field(PippField::Shift(4.2)),
            Event::Exit,
        ];

        let output = replay(PippDispatcher::new(PassContext::new(&index, &ccd, &config)), &events);

        assert!(output.diagnostics.has(DiagnosticKind::MissingData));
    }
}
