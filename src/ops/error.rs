use thiserror::Error;

/// Conditions that invalidate a whole normalization pass.
///
/// Per-restraint problems never surface here; they are recorded as diagnostics and the
/// offending record is skipped.
#[derive(Debug, Error)]
pub enum Error {
    #[error("coordinate model holds no polymer chain or non-polymer entity")]
    MissingCoordinates,

    #[error("no CCD entry for residue '{comp_id}' declared in chain '{chain_id}'")]
    MissingChemComp { comp_id: String, chain_id: String },

    #[error("polymer sequence of chain '{chain_id}' is corrupt: {details}")]
    CorruptPolymerSequence { chain_id: String, details: String },

    #[error("invalid normalizer configuration: {details}")]
    InvalidConfig { details: String },

    #[error(transparent)]
    Io(#[from] crate::io::Error),
}

impl Error {
    pub fn missing_chem_comp(comp_id: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self::MissingChemComp {
            comp_id: comp_id.into(),
            chain_id: chain_id.into(),
        }
    }

    pub fn corrupt_polymer_sequence(
        chain_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::CorruptPolymerSequence {
            chain_id: chain_id.into(),
            details: details.into(),
        }
    }

    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_chain_and_residue() {
        let err = Error::missing_chem_comp("XYZ", "A");
        assert_eq!(err.to_string(), "no CCD entry for residue 'XYZ' declared in chain 'A'");

        let err = Error::corrupt_polymer_sequence("B", "label_seq_id 3 repeats");
        assert_eq!(
            err.to_string(),
            "polymer sequence of chain 'B' is corrupt: label_seq_id 3 repeats"
        );
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io = crate::io::Error::cache("stale");
        let err: Error = io.into();
        assert_eq!(err.to_string(), "binary cache is unusable: stale");
    }
}
