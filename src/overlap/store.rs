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

//! The overlap tensor `dpc` and its modulus `dp`.

use kdots_core::{check_index, Complex64, Error, Result};
use kdots_mesh::{Edge, MeshTopology};
use std::io::BufReader;
use std::path::Path;

pub const DPC_FILENAME: &str = "dpc.npy";
pub const DP_FILENAME: &str = "dp.npy";

/// Normalized overlaps, shape `(N, D, B, B)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultStore {
    shape: [usize; 4],
    dpc: Vec<Complex64>,
    dp: Vec<f64>,
    failed: Vec<Edge>,
}

impl ResultStore {
    pub(crate) fn new(shape: [usize; 4], dpc: Vec<Complex64>, failed: Vec<Edge>) -> Self {
        let dp = dpc.iter().map(|z| z.norm()).collect();
        ResultStore { shape, dpc, dp, failed }
    }

    /// `(N, D, B, B)`
    pub fn shape(&self) -> [usize; 4]
    { self.shape }

    /// The whole tensor, row-major.
    pub fn dpc_data(&self) -> &[Complex64]
    { &self.dpc }

    pub fn dp_data(&self) -> &[f64]
    { &self.dp }

    /// Edges that were filled in rather than computed.
    ///
    /// Only known for a store produced by a run; `load` always gives an empty list.
    pub fn failed_edges(&self) -> &[Edge]
    { &self.failed }

    fn block_start(&self, point: usize, direction: usize) -> Result<usize> {
        let [points, directions, bands, _] = self.shape;
        check_index("k-point", point, points)?;
        check_index("direction", direction, directions)?;
        Ok((point * directions + direction) * bands * bands)
    }

    fn index(&self, point: usize, direction: usize, i: usize, j: usize) -> Result<usize> {
        let bands = self.shape[2];
        check_index("band", i, bands)?;
        check_index("band", j, bands)?;
        Ok(self.block_start(point, direction)? + i * bands + j)
    }

    pub fn dpc(&self, point: usize, direction: usize, i: usize, j: usize) -> Result<Complex64>
    { Ok(self.dpc[self.index(point, direction, i, j)?]) }

    pub fn dp(&self, point: usize, direction: usize, i: usize, j: usize) -> Result<f64>
    { Ok(self.dp[self.index(point, direction, i, j)?]) }

    /// The `B x B` block of `(p, d)`, row-major in `(i, j)`.
    pub fn edge_block(&self, point: usize, direction: usize) -> Result<&[Complex64]> {
        let start = self.block_start(point, direction)?;
        let bands = self.shape[2];
        Ok(&self.dpc[start..start + bands * bands])
    }

    /// Write `dpc.npy` and `dp.npy` into a directory.
    ///
    /// Both files are written under temporary names before either is renamed,
    /// so a failed save leaves the previous pair in place.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        kdots_fs_util::create_dir_all(dir)?;

        let mut files = kdots_fs_util::PartialFiles::new();
        files.write(dir.join(DPC_FILENAME), |w| -> Result<()> {
            Ok(kdots_npy::write(w, &self.shape, &self.dpc)?)
        })?;
        files.write(dir.join(DP_FILENAME), |w| -> Result<()> {
            Ok(kdots_npy::write(w, &self.shape, &self.dp)?)
        })?;
        files.commit()?;
        info!("Overlaps saved to '{}' and '{}'", DPC_FILENAME, DP_FILENAME);
        Ok(())
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read_file = |name: &str| -> Result<_> {
            Ok(BufReader::new(kdots_fs_util::open(dir.join(name))?))
        };
        let dpc = kdots_npy::read::<Complex64>(read_file(DPC_FILENAME)?)?;
        let dp = kdots_npy::read::<f64>(read_file(DP_FILENAME)?)?;

        let shape = {
            let s = dpc.expect_ndim(4)?;
            if s[2] != s[3] {
                return Err(Error::Malformed {
                    what: DPC_FILENAME.to_string(),
                    message: format!("expected shape (N, D, B, B), got {:?}", s),
                });
            }
            [s[0], s[1], s[2], s[3]]
        };
        if dp.shape != dpc.shape {
            return Err(Error::Malformed {
                what: DP_FILENAME.to_string(),
                message: format!("shape {:?} does not match {} shape {:?}", dp.shape, DPC_FILENAME, dpc.shape),
            });
        }
        Ok(ResultStore { shape, dpc: dpc.data, dp: dp.data, failed: vec![] })
    }

    /// Verify `dpc[q, d', j, i] = conj(dpc[p, d, i, j])` on every edge of the mesh
    /// that was computed.
    pub fn check_hermitian(&self, mesh: &MeshTopology, tol: f64) -> Result<()> {
        let bands = self.shape[2];
        for edge in mesh.edges() {
            if self.failed.contains(&edge) {
                continue;
            }
            let mirror = edge.flip();
            for i in 0..bands {
                for j in 0..bands {
                    let forward = self.dpc(edge.point, edge.direction, i, j)?;
                    let backward = self.dpc(mirror.point, mirror.direction, j, i)?;
                    if !((forward - backward.conj()).norm() <= tol) {
                        return Err(Error::Malformed {
                            what: "overlap tensor".to_string(),
                            message: format!(
                                "not Hermitian at k-point {}, direction {}, bands ({}, {}): {} vs conj({})",
                                edge.point, edge.direction, i, j, forward, backward,
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

//=================================================================

/// Puts per-edge blocks into the tensor, checking that no block is written twice.
pub(crate) struct Assembler {
    shape: [usize; 4],
    dpc: Vec<Complex64>,
    written: Vec<bool>,
    failed: Vec<Edge>,
}

impl Assembler {
    pub fn new(points: usize, directions: usize, bands: usize) -> Self {
        Assembler {
            shape: [points, directions, bands, bands],
            dpc: vec![Complex64::new(0.0, 0.0); points * directions * bands * bands],
            written: vec![false; points * directions],
            failed: vec![],
        }
    }

    fn claim(&mut self, point: usize, direction: usize) -> Result<usize> {
        let [_, directions, bands, _] = self.shape;
        let slot = point * directions + direction;
        if self.written[slot] {
            return Err(Error::DoubleWrite { point, direction });
        }
        self.written[slot] = true;
        Ok(slot * bands * bands)
    }

    /// Write `block[i][j]` at `(p, d, i, j)` and its conjugate at `(q, d', j, i)`.
    pub fn put(&mut self, edge: &Edge, block: &[Complex64]) -> Result<()> {
        let bands = self.shape[2];
        let forward = self.claim(edge.point, edge.direction)?;
        let backward = self.claim(edge.neighbor, edge.reverse)?;
        for i in 0..bands {
            for j in 0..bands {
                let value = block[i * bands + j];
                self.dpc[forward + i * bands + j] = value;
                self.dpc[backward + j * bands + i] = value.conj();
            }
        }
        Ok(())
    }

    /// Set both blocks of an edge to `value`, and remember the edge as failed.
    pub fn fill(&mut self, edge: &Edge, value: Complex64) -> Result<()> {
        let len = self.shape[2] * self.shape[2];
        for &(point, direction) in &[(edge.point, edge.direction), (edge.neighbor, edge.reverse)] {
            let start = self.claim(point, direction)?;
            for cell in &mut self.dpc[start..start + len] {
                *cell = value;
            }
        }
        self.failed.push(*edge);
        Ok(())
    }

    pub fn finish(self) -> ResultStore
    { ResultStore::new(self.shape, self.dpc, self.failed) }
}
