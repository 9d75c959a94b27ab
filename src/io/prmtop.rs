//! AMBER parameter-topology (prmtop) reader.
//!
//! Only the sections needed to name atoms are decoded: `POINTERS`, `ATOM_NAME`,
//! `RESIDUE_LABEL`, and `RESIDUE_POINTER`. Force-field parameters are skipped.

use crate::io::error::Error;
use std::collections::HashMap;
use std::io::BufRead;
use std::ops::Range;

const FORMAT: &str = "prmtop";

/// Atom and residue naming extracted from a prmtop file.
#[derive(Debug, Clone, PartialEq)]
pub struct AmberTopology {
    /// Atom names in topology order (atom number `n` is `atom_names[n - 1]`).
    pub atom_names: Vec<String>,
    /// Residue labels in topology order.
    pub residue_labels: Vec<String>,
    /// First atom (0-based) of every residue.
    pub residue_pointers: Vec<usize>,
}

impl AmberTopology {
    pub fn n_atoms(&self) -> usize {
        self.atom_names.len()
    }

    pub fn n_residues(&self) -> usize {
        self.residue_labels.len()
    }

    /// 0-based atom range of a residue.
    pub fn residue_range(&self, residue_index: usize) -> Range<usize> {
        let start = self.residue_pointers[residue_index];
        let end = self
            .residue_pointers
            .get(residue_index + 1)
            .copied()
            .unwrap_or(self.n_atoms());
        start..end
    }

    /// Residue index (0-based) owning a 0-based atom index.
    pub fn residue_of_atom(&self, atom_index: usize) -> Option<usize> {
        if atom_index >= self.n_atoms() {
            return None;
        }
        match self.residue_pointers.binary_search(&atom_index) {
            Ok(i) => Some(i),
            Err(i) => i.checked_sub(1),
        }
    }
}

struct Section {
    width: Option<usize>,
    lines: Vec<String>,
}

/// Parses a prmtop file.
///
/// # Errors
///
/// Returns [`Error::MissingSection`] when a required `%FLAG` block is absent and
/// [`Error::InconsistentData`] when section lengths disagree with `POINTERS`.
pub fn read<R: BufRead>(reader: R) -> Result<AmberTopology, Error> {
    let sections = read_sections(reader)?;

    let pointers = parse_integers(&sections, "POINTERS")?;
    if pointers.len() < 12 {
        return Err(Error::inconsistent_data(FORMAT, None, "POINTERS section is too short"));
    }
    if pointers[0] < 0 || pointers[11] < 0 {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!(
                "POINTERS holds negative counts: atoms={}, residues={}",
                pointers[0], pointers[11]
            ),
        ));
    }
    let n_atoms = pointers[0] as usize;
    let n_residues = pointers[11] as usize;

    let mut atom_names = parse_strings(&sections, "ATOM_NAME")?;
    let mut residue_labels = parse_strings(&sections, "RESIDUE_LABEL")?;
    let residue_pointers = parse_integers(&sections, "RESIDUE_POINTER")?;

    if atom_names.len() < n_atoms
        || residue_labels.len() < n_residues
        || residue_pointers.len() < n_residues
    {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!(
                "expected {} atoms and {} residues, found {} atom names, {} labels, {} pointers",
                n_atoms,
                n_residues,
                atom_names.len(),
                residue_labels.len(),
                residue_pointers.len()
            ),
        ));
    }
    atom_names.truncate(n_atoms);
    residue_labels.truncate(n_residues);

    let mut pointers_0 = Vec::with_capacity(n_residues);
    for p in residue_pointers.into_iter().take(n_residues) {
        if p < 1 || p as usize > n_atoms.max(1) {
            return Err(Error::inconsistent_data(
                FORMAT,
                None,
                format!("residue pointer {} is outside 1..={}", p, n_atoms),
            ));
        }
        pointers_0.push(p as usize - 1);
    }
    if pointers_0.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::inconsistent_data(FORMAT, None, "residue pointers are not increasing"));
    }

    Ok(AmberTopology {
        atom_names,
        residue_labels,
        residue_pointers: pointers_0,
    })
}

fn read_sections<R: BufRead>(reader: R) -> Result<HashMap<String, Section>, Error> {
    let mut sections = HashMap::new();
    let mut current: Option<(String, Section)> = None;

    for line in reader.lines() {
        let line = line.map_err(|e| Error::from_io(e, None))?;

        if let Some(flag) = line.strip_prefix("%FLAG") {
            if let Some((name, section)) = current.take() {
                sections.insert(name, section);
            }
            current = Some((
                flag.trim().to_string(),
                Section {
                    width: None,
                    lines: Vec::new(),
                },
            ));
        } else if let Some(format) = line.strip_prefix("%FORMAT") {
            if let Some((_, section)) = current.as_mut() {
                section.width = string_width(format);
            }
        } else if line.starts_with("%VERSION") || line.starts_with("%COMMENT") {
            continue;
        } else if let Some((_, section)) = current.as_mut() {
            section.lines.push(line);
        }
    }
    if let Some((name, section)) = current {
        sections.insert(name, section);
    }

    Ok(sections)
}

/// Field width of a Fortran string format such as `(20a4)`.
fn string_width(format: &str) -> Option<usize> {
    let inner = format.trim().trim_start_matches('(').trim_end_matches(')');
    let lower = inner.to_ascii_lowercase();
    let (_, width) = lower.split_once('a')?;
    width.trim().parse().ok()
}

fn section<'a>(sections: &'a HashMap<String, Section>, flag: &str) -> Result<&'a Section, Error> {
    sections
        .get(flag)
        .ok_or_else(|| Error::missing_section(FORMAT, None, flag))
}

fn parse_integers(sections: &HashMap<String, Section>, flag: &str) -> Result<Vec<i64>, Error> {
    let mut values = Vec::new();
    for (i, line) in section(sections, flag)?.lines.iter().enumerate() {
        for word in line.split_whitespace() {
            let value = word.parse().map_err(|_| {
                Error::inconsistent_data(
                    FORMAT,
                    None,
                    format!("'{}' in line {} of {} is not an integer", word, i + 1, flag),
                )
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

fn parse_strings(sections: &HashMap<String, Section>, flag: &str) -> Result<Vec<String>, Error> {
    let section = section(sections, flag)?;
    let width = section.width.unwrap_or(4).max(1);

    let mut values = Vec::new();
    for line in &section.lines {
        let chars: Vec<char> = line.chars().collect();
        for chunk in chars.chunks(width) {
            let value: String = chunk.iter().collect::<String>().trim().to_string();
            if !value.is_empty() {
                values.push(value);
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const DIPEPTIDE: &str = indoc! {"
        %VERSION  VERSION_STAMP = V0001.000  DATE = 01/01/24  00:00:00
        %FLAG TITLE
        %FORMAT(20a4)
        AG
        %FLAG POINTERS
        %FORMAT(10I8)
               7       2       0       0       0       0       0       0       0       0
               0       2       0       0       0       0       0       0       0       0
        %FLAG ATOM_NAME
        %FORMAT(20a4)
        N   H1  CA  HA  C   N   HA2
        %FLAG RESIDUE_LABEL
        %FORMAT(20a4)
        ALA GLY
        %FLAG RESIDUE_POINTER
        %FORMAT(10I8)
               1       6
    "};

    #[test]
    fn read_decodes_atom_and_residue_naming() {
        let topology = read(DIPEPTIDE.as_bytes()).unwrap();

        assert_eq!(topology.n_atoms(), 7);
        assert_eq!(topology.atom_names[1], "H1");
        assert_eq!(topology.residue_labels, vec!["ALA", "GLY"]);
        assert_eq!(topology.residue_range(0), 0..5);
        assert_eq!(topology.residue_range(1), 5..7);
    }

    #[test]
    fn residue_of_atom_uses_residue_pointers() {
        let topology = read(DIPEPTIDE.as_bytes()).unwrap();

        assert_eq!(topology.residue_of_atom(0), Some(0));
        assert_eq!(topology.residue_of_atom(4), Some(0));
        assert_eq!(topology.residue_of_atom(5), Some(1));
        assert_eq!(topology.residue_of_atom(7), None);
    }

    #[test]
    fn read_reports_missing_sections() {
        let text = DIPEPTIDE.replace("%FLAG RESIDUE_LABEL", "%FLAG SOMETHING_ELSE");
        let err = read(text.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            Error::MissingSection { ref section, .. } if section == "RESIDUE_LABEL"
        ));
    }

    #[test]
    fn string_width_reads_fortran_formats() {
        assert_eq!(string_width("(20a4)"), Some(4));
        assert_eq!(string_width(" (20A4) "), Some(4));
        assert_eq!(string_width("(10I8)"), None);
    }
}
