//! BMRB chemical-shift statistics.
//!
//! Statistics are distributed as CSV with one row per `(comp_id, atom_id)`. Parsing the
//! CSV on every run is slow for full tables, so [`ShiftStatTable::load_cached`] keeps a
//! bincode image next to it. The image starts with a version tag and is rebuilt whenever
//! the tag differs or the image cannot be decoded.

use crate::io::error::Error;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

const CACHE_VERSION: u32 = 1;

/// Observed distribution of one atom's chemical shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ShiftStat {
    pub comp_id: String,
    pub atom_id: String,
    pub count: u32,
    pub avg: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// BMRB ambiguity code assigned to the atom when its group is unresolved.
    #[serde(default)]
    pub ambig_code: Option<u8>,
}

/// Lookup surface over chemical-shift statistics.
pub trait ShiftStatistics {
    fn shift_stat(&self, comp_id: &str, atom_id: &str) -> Option<&ShiftStat>;

    fn ambiguity_code(&self, comp_id: &str, atom_id: &str) -> Option<u8> {
        self.shift_stat(comp_id, atom_id).and_then(|s| s.ambig_code)
    }
}

#[derive(Debug, Encode, Decode)]
struct CacheImage {
    version: u32,
    entries: Vec<ShiftStat>,
}

#[derive(Debug, Clone, Default)]
pub struct ShiftStatTable {
    entries: HashMap<(String, String), ShiftStat>,
}

impl ShiftStatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stat: ShiftStat) {
        self.entries
            .insert((stat.comp_id.clone(), stat.atom_id.clone()), stat);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads a statistics table from CSV with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::new();
        for row in csv_reader.deserialize::<ShiftStat>() {
            table.insert(row.map_err(|e| Error::from_csv(e, None))?);
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
        Self::from_csv_reader(file).map_err(|e| e.with_path(path.to_path_buf()))
    }

    pub fn to_cache_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut entries: Vec<ShiftStat> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| (&a.comp_id, &a.atom_id).cmp(&(&b.comp_id, &b.atom_id)));

        let image = CacheImage {
            version: CACHE_VERSION,
            entries,
        };
        bincode::encode_to_vec(&image, bincode::config::standard())
            .map_err(|e| Error::cache(e.to_string()))
    }

    pub fn from_cache_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (image, _len): (CacheImage, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| Error::cache(e.to_string()))?;
        if image.version != CACHE_VERSION {
            return Err(Error::cache(format!(
                "cache version {} does not match {}",
                image.version, CACHE_VERSION
            )));
        }

        let mut table = Self::new();
        for stat in image.entries {
            table.insert(stat);
        }
        Ok(table)
    }

    /// Loads the table from its binary cache, rebuilding the cache from CSV when needed.
    ///
    /// A cache that cannot be written is reported with `log::warn!` and otherwise ignored.
    pub fn load_cached(csv_path: &Path, cache_path: &Path) -> Result<Self, Error> {
        if let Ok(bytes) = fs::read(cache_path) {
            match Self::from_cache_bytes(&bytes) {
                Ok(table) => return Ok(table),
                Err(e) => log::debug!("rebuilding shift statistics cache: {}", e),
            }
        }

        let table = Self::read_csv(csv_path)?;
        match table.to_cache_bytes() {
            Ok(bytes) => {
                if let Err(e) = fs::write(cache_path, bytes) {
                    log::warn!(
                        "could not write shift statistics cache '{}': {}",
                        cache_path.display(),
                        e
                    );
                }
            }
            Err(e) => log::warn!("could not encode shift statistics cache: {}", e),
        }
        Ok(table)
    }
}

impl ShiftStatistics for ShiftStatTable {
    fn shift_stat(&self, comp_id: &str, atom_id: &str) -> Option<&ShiftStat> {
        self.entries.get(&(comp_id.to_string(), atom_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const CSV: &str = indoc! {"
        comp_id,atom_id,count,avg,std,min,max,ambig_code
        LEU,HD11,9000,0.76,0.28,-1.2,2.1,2
        LEU,CA,8000,55.6,2.1,42.0,67.0,1
        GLY,HA2,5000,3.97,0.37,0.9,6.1,
    "};

    #[test]
    fn from_csv_reader_parses_rows_and_optional_codes() {
        let table = ShiftStatTable::from_csv_reader(CSV.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.ambiguity_code("LEU", "HD11"), Some(2));
        assert_eq!(table.ambiguity_code("GLY", "HA2"), None);
        assert_eq!(table.shift_stat("LEU", "CA").unwrap().max, 67.0);
        assert!(table.shift_stat("ALA", "CA").is_none());
    }

    #[test]
    fn cache_bytes_round_trip_and_reject_other_versions() {
        let table = ShiftStatTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let bytes = table.to_cache_bytes().unwrap();

        let restored = ShiftStatTable::from_cache_bytes(&bytes).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.shift_stat("LEU", "HD11"), table.shift_stat("LEU", "HD11"));

        let stale = bincode::encode_to_vec(
            &CacheImage { version: CACHE_VERSION + 1, entries: Vec::new() },
            bincode::config::standard(),
        )
        .unwrap();
        assert!(matches!(ShiftStatTable::from_cache_bytes(&stale), Err(Error::Cache { .. })));
        assert!(ShiftStatTable::from_cache_bytes(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn load_cached_writes_and_then_prefers_the_cache() {
        let dir = std::env::temp_dir().join(format!("nmr-forge-bmrb-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("stats.csv");
        let cache_path = dir.join("stats.bin");
        fs::write(&csv_path, CSV).unwrap();
        let _ = fs::remove_file(&cache_path);

        let first = ShiftStatTable::load_cached(&csv_path, &cache_path).unwrap();
        assert!(cache_path.exists());

        fs::write(&csv_path, "comp_id,atom_id,count,avg,std,min,max\n").unwrap();
        let second = ShiftStatTable::load_cached(&csv_path, &cache_path).unwrap();
        assert_eq!(second.len(), first.len());

        fs::remove_dir_all(&dir).unwrap();
    }
}
