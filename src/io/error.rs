use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "I/O error for {path_desc}: {source}",
        path_desc = PathDisplay(path)
    )]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to parse {format} {path_desc}: {details} (line {line_number})",
        path_desc = PathDisplay(path)
    )]
    Parse {
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        details: String,
    },

    #[error(
        "required section '{section}' is missing from {format} {path_desc}",
        path_desc = PathDisplay(path)
    )]
    MissingSection {
        format: &'static str,
        path: Option<PathBuf>,
        section: String,
    },

    #[error(
        "inconsistent data in {format} {path_desc}: {details}",
        path_desc = PathDisplay(path)
    )]
    InconsistentData {
        format: &'static str,
        path: Option<PathBuf>,
        details: String,
    },

    #[error(
        "failed to read CSV table {path_desc}: {source}",
        path_desc = PathDisplay(path)
    )]
    Csv {
        path: Option<PathBuf>,
        #[source]
        source: csv::Error,
    },

    #[error("binary cache is unusable: {details}")]
    Cache { details: String },
}

impl Error {
    pub fn from_io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { path, source }
    }

    pub fn parse(
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format,
            path,
            line_number,
            details: details.into(),
        }
    }

    pub fn missing_section(
        format: &'static str,
        path: Option<PathBuf>,
        section: impl Into<String>,
    ) -> Self {
        Self::MissingSection {
            format,
            path,
            section: section.into(),
        }
    }

    pub fn inconsistent_data(
        format: &'static str,
        path: Option<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self::InconsistentData {
            format,
            path,
            details: details.into(),
        }
    }

    pub fn from_csv(source: csv::Error, path: Option<PathBuf>) -> Self {
        Self::Csv { path, source }
    }

    pub fn cache(details: impl Into<String>) -> Self {
        Self::Cache {
            details: details.into(),
        }
    }

    /// Attaches a file path to errors raised while reading an anonymous stream.
    pub(crate) fn with_path(self, new_path: PathBuf) -> Self {
        match self {
            Self::Io { path: None, source } => Self::Io { path: Some(new_path), source },
            Self::Parse { format, path: None, line_number, details } => Self::Parse {
                format,
                path: Some(new_path),
                line_number,
                details,
            },
            Self::MissingSection { format, path: None, section } => Self::MissingSection {
                format,
                path: Some(new_path),
                section,
            },
            Self::InconsistentData { format, path: None, details } => Self::InconsistentData {
                format,
                path: Some(new_path),
                details,
            },
            Self::Csv { path: None, source } => Self::Csv { path: Some(new_path), source },
            other => other,
        }
    }
}

struct PathDisplay<'a>(&'a Option<PathBuf>);

impl<'a> fmt::Display for PathDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(p) => write!(f, "file '{}'", p.display()),
            None => write!(f, "stream source"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_message_names_format_and_line() {
        let err = Error::parse("mmCIF", None, 12, "unterminated quote");
        assert_eq!(
            err.to_string(),
            "failed to parse mmCIF stream source: unterminated quote (line 12)"
        );
    }

    #[test]
    fn with_path_fills_in_missing_paths_only() {
        let err = Error::missing_section("prmtop", None, "ATOM_NAME").with_path("a.prmtop".into());
        assert_eq!(
            err.to_string(),
            "required section 'ATOM_NAME' is missing from prmtop file 'a.prmtop'"
        );

        let err = Error::cache("version mismatch").with_path("x".into());
        assert_eq!(err.to_string(), "binary cache is unusable: version mismatch");
    }
}
