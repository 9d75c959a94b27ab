//! Two-pass normalization of one restraint file.
//!
//! The first pass resolves what it can and reconciles the referenced sequences against
//! the coordinates. When reconciliation publishes reasons for reparsing (a numbering
//! scheme switch, sequence or chain remaps), the file is replayed once more with those
//! reasons applied and the second pass provides the records. Reasons published by the
//! first pass are returned so callers can cache them and seed later runs directly.

use crate::db::ChemCompStore;
use crate::dispatch::{ParserEvent, PassContext, PassOutput, RestraintHooks, replay};
use crate::io::ShiftStatistics;
use crate::model::alignment::{ChainAssignment, SequenceAlignment};
use crate::model::index::CoordinateIndex;
use crate::model::reasons::ReasonsForReparsing;
use crate::model::restraint::RestraintRecord;
use crate::model::types::RestraintSubtype;
use crate::ops::{Diagnostics, Error, NormalizerConfig};
use serde::Serialize;

/// Normalized records of a restraint file with everything learned on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedFile {
    pub records: Vec<RestraintRecord>,
    pub diagnostics: Diagnostics,
    pub alignments: Vec<SequenceAlignment>,
    pub assignments: Vec<ChainAssignment>,
    /// Reasons the records were produced under; empty for a single clean pass.
    pub reasons: ReasonsForReparsing,
    pub passes: u8,
}

impl NormalizedFile {
    fn from_pass(output: PassOutput, reasons: ReasonsForReparsing, passes: u8) -> Self {
        Self {
            records: output.records,
            diagnostics: output.diagnostics,
            alignments: output.alignments,
            assignments: output.assignments,
            reasons,
            passes,
        }
    }

    pub fn records_of(&self, subtype: RestraintSubtype) -> impl Iterator<Item = &RestraintRecord> {
        self.records.iter().filter(move |r| r.subtype == subtype)
    }

    /// Diagnostics rendered one per line.
    pub fn log_lines(&self) -> Vec<String> {
        self.diagnostics.lines()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Inputs shared by both passes.
pub struct Normalizer<'a> {
    index: &'a CoordinateIndex,
    ccd: &'a dyn ChemCompStore,
    config: &'a NormalizerConfig,
    stats: Option<&'a dyn ShiftStatistics>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        index: &'a CoordinateIndex,
        ccd: &'a dyn ChemCompStore,
        config: &'a NormalizerConfig,
    ) -> Self {
        Self {
            index,
            ccd,
            config,
            stats: None,
        }
    }

    pub fn with_shift_statistics(mut self, stats: &'a dyn ShiftStatistics) -> Self {
        self.stats = Some(stats);
        self
    }

    fn context(&self) -> PassContext<'a> {
        PassContext::new(self.index, self.ccd, self.config).with_stats(self.stats)
    }

    /// Checks that the coordinates can anchor restraints at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCoordinates`] for an empty model,
    /// [`Error::CorruptPolymerSequence`] when a chain breaks its sequence invariants, and
    /// [`Error::MissingChemComp`] when a polymer residue has no CCD entry.
    pub fn preflight(&self) -> Result<(), Error> {
        self.config.validate()?;
        let index = self.index;
        if index.polymer_chains().is_empty() && index.nonpolymer_entities().is_empty() {
            return Err(Error::MissingCoordinates);
        }
        for chain in index.polymer_chains() {
            chain
                .check_integrity()
                .map_err(|details| Error::corrupt_polymer_sequence(&chain.chain_id, details))?;
            if let Some(comp_id) = chain.comp_ids().iter().find(|c| !self.ccd.contains(c)) {
                return Err(Error::missing_chem_comp(comp_id, &chain.chain_id));
            }
        }
        for entity in index.nonpolymer_entities() {
            for comp_id in entity.comp_ids().iter().filter(|c| !self.ccd.contains(c)) {
                log::warn!(
                    "no CCD entry for non-polymer {} in chain {}; its atoms resolve by name only",
                    comp_id,
                    entity.chain_id
                );
            }
        }
        Ok(())
    }

    /// Runs one or two passes over recorded parse events.
    ///
    /// # Arguments
    ///
    /// * `events` - Parse events of the whole restraint file.
    /// * `dispatcher` - Builds a fresh dispatcher for each pass.
    ///
    /// # Errors
    ///
    /// Returns an error when [`Normalizer::preflight`] fails.
    pub fn normalize<H, F>(
        &self,
        events: &[ParserEvent<H::Statement, H::Field>],
        dispatcher: F,
    ) -> Result<NormalizedFile, Error>
    where
        H: RestraintHooks,
        H::Statement: Clone,
        H::Field: Clone,
        F: Fn(PassContext<'a>) -> H,
    {
        self.preflight()?;

        let first = replay(dispatcher(self.context()), events);
        log::info!(
            "first pass: {} records, {} diagnostics",
            first.records.len(),
            first.diagnostics.len()
        );
        if first.reasons.is_empty() {
            return Ok(NormalizedFile::from_pass(first, ReasonsForReparsing::default(), 1));
        }

        let reasons = first.reasons;
        log::info!(
            "repeating the pass (label numbering: {}, {} sequence remaps, {} chain remaps)",
            reasons.label_seq_scheme,
            reasons.seq_id_remap.len(),
            reasons.chain_id_remap.len()
        );
        let second = replay(dispatcher(self.context().with_reasons(reasons.clone())), events);
        if !second.reasons.is_empty() {
            log::warn!("second pass still found inconsistent numbering; its hints are not applied");
        }
        log::info!(
            "second pass: {} records, {} diagnostics",
            second.records.len(),
            second.diagnostics.len()
        );
        Ok(NormalizedFile::from_pass(second, reasons, 2))
    }

    /// Runs a single pass seeded with reasons cached from an earlier run.
    pub fn normalize_with_reasons<H, F>(
        &self,
        events: &[ParserEvent<H::Statement, H::Field>],
        reasons: ReasonsForReparsing,
        dispatcher: F,
    ) -> Result<NormalizedFile, Error>
    where
        H: RestraintHooks,
        H::Statement: Clone,
        H::Field: Clone,
        F: Fn(PassContext<'a>) -> H,
    {
        self.preflight()?;
        let output = replay(dispatcher(self.context().with_reasons(reasons.clone())), events);
        Ok(NormalizedFile::from_pass(output, reasons, 1))
    }
}
