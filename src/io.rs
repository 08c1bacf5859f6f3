//! `.npy` grid files.
//!
//! Elevation grids are exchanged as 2-D NumPy arrays. `f64` is read as-is; `f32`, `i64` and
//! `i32` files are widened to `f64` on load. Writes are always `f64`.

use crate::distribution::validate_grid;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyExt};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn read_as<T: ndarray_npy::ReadableElement>(
    path: &Path,
) -> std::result::Result<Array2<T>, ReadNpyError> {
    let reader = BufReader::new(File::open(path)?);
    Array2::<T>::read_npy(reader)
}

/// Load a 2-D elevation grid from a `.npy` file.
///
/// Fails with [`Error::ReadNpy`] if the file is not a 2-D `f64`/`f32`/`i64`/`i32` array (the
/// error of the `f64` attempt is reported) and with [`Error::Domain`] if it contains NaN/Inf.
pub fn load_grid(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let grid = match read_as::<f64>(path) {
        Ok(g) => g,
        Err(ReadNpyError::Io(e)) => return Err(Error::Io(e)),
        Err(first) => widen_from_other_dtypes(path).ok_or(Error::ReadNpy(first))?,
    };
    validate_grid(&grid.view())?;
    log::debug!("{}: loaded {:?} grid", path.display(), grid.dim());
    Ok(grid)
}

fn widen_from_other_dtypes(path: &Path) -> Option<Array2<f64>> {
    if let Ok(g) = read_as::<f32>(path) {
        log::debug!("{}: widening f32 grid to f64", path.display());
        return Some(g.mapv(f64::from));
    }
    if let Ok(g) = read_as::<i64>(path) {
        log::debug!("{}: converting i64 grid to f64", path.display());
        return Some(g.mapv(|z| z as f64));
    }
    if let Ok(g) = read_as::<i32>(path) {
        log::debug!("{}: converting i32 grid to f64", path.display());
        return Some(g.mapv(f64::from));
    }
    None
}

/// Write `grid` to `path` as a 2-D `f64` `.npy` file.
pub fn save_grid(path: impl AsRef<Path>, grid: &ArrayView2<f64>) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    grid.write_npy(writer)?;
    Ok(())
}
