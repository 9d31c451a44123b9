#![allow(dead_code)]

use kdots_core::Complex64;
use std::path::PathBuf;
use tempdir::TempDir;

/// A scratch directory holding the inputs of a run.
pub struct Scenario {
    pub dir: TempDir,
}

impl Scenario {
    pub fn new() -> Scenario
    { Scenario { dir: TempDir::new("kdots-test").unwrap() } }

    pub fn path(&self, name: &str) -> PathBuf
    { self.dir.path().join(name) }

    pub fn write_config(&self, yaml: &str) -> PathBuf {
        let path = self.path("settings.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    /// Write a solver dump, one field per (point, band[, channel]) in that order.
    pub fn write_dump(&self, fields: &[Vec<Complex64>]) -> PathBuf {
        let path = self.path("wfc.dat");
        std::fs::write(&path, fortran_text(fields.iter().flatten())).unwrap();
        path
    }

    pub fn write_neighbors(&self, num_points: usize, table: &[i64]) -> PathBuf {
        let path = self.path("neighbors.npy");
        let shape = [num_points, table.len() / num_points];
        kdots_npy::write(kdots_fs_util::create(&path).unwrap(), &shape, table).unwrap();
        path
    }
}

// enough digits to read back every f64 exactly
fn fortran_text<'a>(values: impl Iterator<Item=&'a Complex64>) -> String {
    values.map(|z| format!(" ({:24.16E},{:24.16E})\n", z.re, z.im)).collect()
}

pub fn real(values: &[f64]) -> Vec<Complex64>
{ values.iter().map(|&x| Complex64::new(x, 0.0)).collect() }

pub fn rotated(field: &[Complex64], angle: f64) -> Vec<Complex64>
{ field.iter().map(|z| z * Complex64::from_polar(1.0, angle)).collect() }
