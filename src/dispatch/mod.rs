//! Format dispatchers driven by restraint-file parse events.
//!
//! A grammar front end walks a restraint file and reports what it sees through
//! [`RestraintHooks`]: a restraint statement opens, fields arrive one by one, comments
//! interleave, and the statement closes. Each dispatcher accumulates the fields of the
//! open statement and, on exit, resolves atoms, validates values, and emits records
//! through a shared [`DispatcherCore`].
//!
//! Front ends that already hold the events can hand them to [`replay`], which is also
//! how the driver repeats a pass.

mod amber;
mod biosym;
mod core;
mod pales;
mod pipp;

pub use amber::{AmberDispatcher, AmberField, AmberStatement};
pub use biosym::{BiosymDispatcher, BiosymField, BiosymStatement};
pub use self::core::{
    DispatcherCore, PassContext, PassOutput, RecordExtras, coupling_torsion_name, dihedral_class,
    distinct_atoms, distinct_residues,
};
pub use pales::{PalesDispatcher, PalesField, PalesStatement};
pub use pipp::{PippDispatcher, PippField, PippStatement};

/// Callbacks every format dispatcher implements.
pub trait RestraintHooks {
    /// Kind of restraint statement a format defines.
    type Statement;
    /// One parsed field of an open statement.
    type Field;

    fn enter_restraint(&mut self, statement: Self::Statement);

    fn on_field(&mut self, field: Self::Field);

    /// A comment line; formats that do not use comments ignore it.
    fn on_comment(&mut self, _text: &str) {}

    fn exit_restraint(&mut self);

    /// Closes the pass and reconciles the sequences referenced during it.
    fn finish(self) -> PassOutput;
}

/// One recorded parse event.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent<S, F> {
    Enter(S),
    Field(F),
    Comment(String),
    Exit,
}

/// Feeds recorded events through a dispatcher and finishes the pass.
pub fn replay<H>(mut hooks: H, events: &[ParserEvent<H::Statement, H::Field>]) -> PassOutput
where
    H: RestraintHooks,
    H::Statement: Clone,
    H::Field: Clone,
{
    for event in events {
        match event {
            ParserEvent::Enter(statement) => hooks.enter_restraint(statement.clone()),
            ParserEvent::Field(field) => hooks.on_field(field.clone()),
            ParserEvent::Comment(text) => hooks.on_comment(text),
            ParserEvent::Exit => hooks.exit_restraint(),
        }
    }
    hooks.finish()
}
