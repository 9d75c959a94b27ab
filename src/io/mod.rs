mod bmrb;
mod ccd;
mod cif;
mod error;
mod mmcif;
mod prmtop;

use crate::db::ChemComp;
use crate::model::index::CoordinateIndex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub use bmrb::{ShiftStat, ShiftStatTable, ShiftStatistics};
pub use ccd::read as read_chem_comps;
pub use mmcif::read as read_coordinate_index;
pub use prmtop::{AmberTopology, read as read_prmtop};

pub use error::Error;

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))
}

/// Reads a coordinate model from an mmCIF file on disk.
pub fn read_coordinate_index_file(path: &Path) -> Result<CoordinateIndex, Error> {
    read_coordinate_index(open(path)?).map_err(|e| e.with_path(path.to_path_buf()))
}

pub fn read_chem_comps_file(path: &Path) -> Result<Vec<ChemComp>, Error> {
    read_chem_comps(open(path)?).map_err(|e| e.with_path(path.to_path_buf()))
}

pub fn read_prmtop_file(path: &Path) -> Result<AmberTopology, Error> {
    read_prmtop(open(path)?).map_err(|e| e.with_path(path.to_path_buf()))
}
