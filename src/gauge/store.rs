/* ************************************************************************ **
** This file is part of kdots, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of kdots is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Where wavefunctions come from, and where the gauge-fixed ones go.

use kdots_core::{Complex64, Error, Result, SpinorMode, WfcKey};
use std::collections::BTreeMap;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Provides raw wavefunctions, as produced by the solver.
pub trait WavefunctionSource: Sync {
    fn read_raw(&self, key: WfcKey) -> Result<Vec<Complex64>>;

    /// A single value of a raw field.
    ///
    /// The default implementation reads the whole field.
    fn raw_value(&self, key: WfcKey, index: usize) -> Result<Complex64> {
        let field = self.read_raw(key)?;
        field.get(index).cloned().ok_or_else(|| Error::OutOfRange {
            what: "grid point",
            index,
            len: field.len(),
        })
    }
}

/// Accepts gauge-fixed wavefunctions.
pub trait GaugeSink: Sync {
    fn write_fixed(&self, key: WfcKey, field: &[Complex64]) -> Result<()>;
}

/// Provides gauge-fixed wavefunctions.
///
/// Must fail with `MissingArtifact` for a key that was never written.
pub trait GaugeStore: Sync {
    fn read_fixed(&self, key: WfcKey) -> Result<Vec<Complex64>>;

    /// All channels of one band.
    fn read_band(&self, point: usize, band: usize, mode: SpinorMode) -> Result<Vec<Vec<Complex64>>>
    { WfcKey::channels(point, band, mode).map(|key| self.read_fixed(key)).collect() }
}

//=================================================================

/// Fields held in memory.
///
/// Serves as a source of raw fields as well as a store of fixed ones,
/// which is mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    fields: Mutex<BTreeMap<WfcKey, Vec<Complex64>>>,
}

impl MemoryStore {
    pub fn new() -> Self
    { Default::default() }

    pub fn insert(&self, key: WfcKey, field: Vec<Complex64>)
    { self.lock().insert(key, field); }

    pub fn get(&self, key: WfcKey) -> Option<Vec<Complex64>>
    { self.lock().get(&key).cloned() }

    pub fn contains(&self, key: WfcKey) -> bool
    { self.lock().contains_key(&key) }

    pub fn len(&self) -> usize
    { self.lock().len() }

    pub fn is_empty(&self) -> bool
    { self.lock().is_empty() }

    pub fn keys(&self) -> Vec<WfcKey>
    { self.lock().keys().cloned().collect() }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<WfcKey, Vec<Complex64>>> {
        // the map is never left half-modified, so a poisoned lock is still usable
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WavefunctionSource for MemoryStore {
    fn read_raw(&self, key: WfcKey) -> Result<Vec<Complex64>>
    { self.get(key).ok_or_else(|| Error::missing(key)) }
}

impl GaugeSink for MemoryStore {
    fn write_fixed(&self, key: WfcKey, field: &[Complex64]) -> Result<()> {
        self.insert(key, field.to_vec());
        Ok(())
    }
}

impl GaugeStore for MemoryStore {
    fn read_fixed(&self, key: WfcKey) -> Result<Vec<Complex64>>
    { self.get(key).ok_or_else(|| Error::missing(key)) }
}

//=================================================================

/// A directory with one `.npy` file per gauge-fixed field.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    mode: SpinorMode,
}

impl DirStore {
    /// Use an existing directory.
    pub fn open(dir: impl AsRef<Path>, mode: SpinorMode) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        if !dir.is_dir() {
            return Err(Error::missing(format!("wavefunction directory '{}'", dir.display())));
        }
        Ok(DirStore { dir, mode })
    }

    /// Use a directory, creating it if necessary.
    pub fn create(dir: impl AsRef<Path>, mode: SpinorMode) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        kdots_fs_util::create_dir_all(&dir)?;
        Ok(DirStore { dir, mode })
    }

    pub fn dir(&self) -> &Path
    { &self.dir }

    pub fn path(&self, key: WfcKey) -> PathBuf {
        let name = match self.mode {
            SpinorMode::Single => format!("k{}-b{}.npy", key.point, key.band),
            SpinorMode::TwoChannel => format!("k{}-b{}-s{}.npy", key.point, key.band, key.channel),
        };
        self.dir.join(name)
    }
}

impl GaugeSink for DirStore {
    fn write_fixed(&self, key: WfcKey, field: &[Complex64]) -> Result<()> {
        kdots_fs_util::write_then_rename(self.path(key), |w| {
            Ok(kdots_npy::write(w, &[field.len()], field)?)
        })
    }
}

impl GaugeStore for DirStore {
    fn read_fixed(&self, key: WfcKey) -> Result<Vec<Complex64>> {
        let file = match kdots_fs_util::open(self.path(key)) {
            Ok(file) => file,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::missing(format!("{} at '{}'", key, self.path(key).display())));
            },
            Err(e) => return Err(e.into()),
        };
        let array = kdots_npy::read::<Complex64>(BufReader::new(file))?;
        array.expect_ndim(1)?;
        Ok(array.data)
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn field(seed: f64) -> Vec<Complex64> {
        (0..5).map(|i| Complex64::new(seed + i as f64, -seed)).collect()
    }

    #[test]
    fn memory_store() {
        let store = MemoryStore::new();
        let key = WfcKey::new(1, 2, 0);
        store.write_fixed(key, &field(1.0)).unwrap();
        assert_eq!(store.read_fixed(key).unwrap(), field(1.0));
        assert_eq!(store.raw_value(key, 3).unwrap(), Complex64::new(4.0, -1.0));
        match store.read_fixed(WfcKey::new(2, 2, 0)).unwrap_err() {
            Error::MissingArtifact(msg) => assert!(msg.contains("k-point 2, band 2")),
            e => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn dir_store_file_names() {
        let tmp = TempDir::new("kdots-gauge").unwrap();
        let single = DirStore::create(tmp.path().join("wfc"), SpinorMode::Single).unwrap();
        let two = DirStore::open(tmp.path().join("wfc"), SpinorMode::TwoChannel).unwrap();
        assert!(single.path(WfcKey::new(3, 1, 0)).ends_with("k3-b1.npy"));
        assert!(two.path(WfcKey::new(3, 1, 1)).ends_with("k3-b1-s1.npy"));
        assert!(DirStore::open(tmp.path().join("nope"), SpinorMode::Single).is_err());
    }

    #[test]
    fn dir_store_roundtrip() {
        let tmp = TempDir::new("kdots-gauge").unwrap();
        let store = DirStore::create(tmp.path(), SpinorMode::TwoChannel).unwrap();
        store.write_fixed(WfcKey::new(0, 0, 0), &field(0.5)).unwrap();
        store.write_fixed(WfcKey::new(0, 0, 1), &field(-2.0)).unwrap();

        let band = store.read_band(0, 0, SpinorMode::TwoChannel).unwrap();
        assert_eq!(band, vec![field(0.5), field(-2.0)]);

        match store.read_fixed(WfcKey::new(0, 1, 0)).unwrap_err() {
            Error::MissingArtifact(msg) => assert!(msg.contains("k0-b1-s0.npy")),
            e => panic!("unexpected error: {}", e),
        }
    }
}
