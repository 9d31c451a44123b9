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

use crate::phase::BlochPhaseSource;
use crate::progress::{NoProgress, Progress};
use crate::store::{Assembler, ResultStore};
use kdots_core::{Complex64, Dims, Error, Result, SpinorMode};
use kdots_gauge::GaugeStore;
use kdots_mesh::{Edge, MeshTopology};
use rayon::prelude::*;
use std::time::Instant;

/// What to do when an input of an edge is missing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnMissing {
    /// Fail the whole run.
    Abort,
    /// Fill both blocks of the edge, and list it in the result.
    Fill,
}

impl Default for OnMissing {
    fn default() -> Self { OnMissing::Abort }
}

/// Computes the overlap tensor
///
/// ```text
/// dpc[p, d, i, j] = (1/nr) Σ_r phase_pq[r] ψ_{p,i}[r] conj(ψ_{q,j}[r])
/// ```
///
/// for every edge `q = neighbor(p, d)`, summed over spinor channels.
///
/// Each undirected edge is computed once, by one task on the pool; the task
/// returns its `B x B` block, and after all tasks have joined, the block is
/// written at `(p, d)` and its conjugate transpose at `(q, d')`.
pub struct OverlapEngine<'a> {
    mesh: &'a MeshTopology,
    wavefunctions: &'a dyn GaugeStore,
    phases: &'a dyn BlochPhaseSource,
    dims: Dims,
    mode: SpinorMode,
    on_missing: OnMissing,
    fill_value: Complex64,
    progress: &'a dyn Progress,
}

impl<'a> OverlapEngine<'a> {
    pub fn new(
        mesh: &'a MeshTopology,
        wavefunctions: &'a dyn GaugeStore,
        phases: &'a dyn BlochPhaseSource,
        dims: Dims,
        mode: SpinorMode,
    ) -> Self {
        OverlapEngine {
            mesh, wavefunctions, phases, dims, mode,
            on_missing: OnMissing::Abort,
            fill_value: Complex64::new(std::f64::NAN, std::f64::NAN),
            progress: &NoProgress,
        }
    }

    /// Set the missing-input policy, and the value used by `OnMissing::Fill`.
    pub fn on_missing(self, on_missing: OnMissing, fill_value: Complex64) -> Self
    { OverlapEngine { on_missing, fill_value, ..self } }

    pub fn progress(self, progress: &'a dyn Progress) -> Self
    { OverlapEngine { progress, ..self } }

    /// Run all edges on the pool.
    ///
    /// Nothing is returned unless every edge either succeeded or was filled.
    pub fn run(&self, pool: &rayon::ThreadPool) -> Result<ResultStore> {
        self.dims.validate()?;
        self.mesh.check_dims(&self.dims)?;

        let edges = self.mesh.edges();
        info!("Number of threads: {}", pool.current_num_threads());
        info!("Number of bands: {}", self.dims.bands);
        info!("Total number of k-points: {}", self.dims.points);
        info!("Total number of points in real space: {}", self.dims.grid_points);
        info!("Number of edges to compute: {}", edges.len());

        let blocks = pool.install(|| {
            edges.par_iter()
                .map(|edge| self.run_edge(edge))
                .collect::<Result<Vec<_>>>()
        })?;

        // everything below happens on this thread, after the join
        let Dims { points, directions, bands, grid_points } = self.dims;
        let norm = 1.0 / grid_points as f64;
        let mut assembler = Assembler::new(points, directions, bands);
        for (edge, block) in edges.iter().zip(blocks) {
            match block {
                Some(block) => {
                    let block = block.into_iter().map(|z| z * norm).collect::<Vec<_>>();
                    assembler.put(edge, &block)?;
                },
                None => assembler.fill(edge, self.fill_value)?,
            }
        }

        let result = assembler.finish();
        if !result.failed_edges().is_empty() {
            warn!("{} of {} edges could not be computed and were filled", result.failed_edges().len(), edges.len());
        }
        Ok(result)
    }

    /// The block of one edge, or `None` if it is to be filled.
    fn run_edge(&self, edge: &Edge) -> Result<Option<Vec<Complex64>>> {
        match self.compute_block(edge) {
            Ok(block) => Ok(Some(block)),
            Err(Error::MissingArtifact(what)) if self.on_missing == OnMissing::Fill => {
                warn!(
                    "Filling edge (k-point {}, direction {}) -> k-point {}: missing {}",
                    edge.point, edge.direction, edge.neighbor, what,
                );
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Unnormalized overlaps of all band pairs of one edge, row-major in `(i, j)`.
    pub fn compute_block(&self, edge: &Edge) -> Result<Vec<Complex64>> {
        let start = Instant::now();
        let bands = self.dims.bands;

        let phase = self.phases.edge_phase(edge)?;
        self.dims.check_field(
            format_args!("Bloch phase of edge (k-point {}, direction {})", edge.point, edge.direction),
            phase.len(),
        )?;

        // phase[r] * ψ_{p,i}[r], for each band and channel
        let left = (0..bands).map(|i| {
            let mut channels = self.read_band(edge.point, i)?;
            for field in &mut channels {
                for (z, &ph) in field.iter_mut().zip(&phase) {
                    *z *= ph;
                }
            }
            Ok(channels)
        }).collect::<Result<Vec<_>>>()?;
        let right = (0..bands)
            .map(|j| self.read_band(edge.neighbor, j))
            .collect::<Result<Vec<_>>>()?;

        let mut block = Vec::with_capacity(bands * bands);
        for i in 0..bands {
            for j in 0..bands {
                let value = left[i].iter().zip(&right[j])
                    .map(|(a, b)| dot_conj(a, b))
                    .sum::<Complex64>();
                self.progress.cell(edge, i, j, value);
                block.push(value);
            }
        }
        self.progress.task_done(edge, start.elapsed());
        Ok(block)
    }

    fn read_band(&self, point: usize, band: usize) -> Result<Vec<Vec<Complex64>>> {
        let channels = self.wavefunctions.read_band(point, band, self.mode)?;
        for (channel, field) in channels.iter().enumerate() {
            self.dims.check_field(
                format_args!("wavefunction (k-point {}, band {}, channel {})", point, band, channel),
                field.len(),
            )?;
        }
        Ok(channels)
    }
}

/// `Σ_r a[r] conj(b[r])`
fn dot_conj(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).fold(Complex64::new(0.0, 0.0), |acc, (x, y)| acc + x * y.conj())
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;
    use crate::phase::{PointPhaseTable, UniformPhase};
    use kdots_assert_close::assert_close;
    use kdots_core::WfcKey;
    use kdots_gauge::{fix_all, GaugeFixer, MemoryStore, OnAmbiguous};

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap()
    }

    fn field(p: usize, b: usize, c: usize, nr: usize) -> Vec<Complex64> {
        (0..nr).map(|r| {
            let x = (3 * p + 5 * b + 11 * c + 2 * r) as f64 * 0.37;
            Complex64::new(1.0 + x.sin(), 0.5 * x.cos())
        }).collect()
    }

    fn store(dims: &Dims, mode: SpinorMode) -> MemoryStore {
        let store = MemoryStore::new();
        for p in 0..dims.points {
            for b in 0..dims.bands {
                for key in WfcKey::channels(p, b, mode) {
                    store.insert(key, field(p, b, key.channel, dims.grid_points));
                }
            }
        }
        store
    }

    fn line_dims() -> Dims {
        Dims { points: 3, directions: 2, bands: 2, grid_points: 5 }
    }

    #[test]
    fn hermitian_with_zero_boundaries() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let wfcs = store(&dims, SpinorMode::Single);
        let phase = UniformPhase { grid_points: 5 };

        let result = OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single)
            .run(&pool()).unwrap();
        assert_eq!(result.shape(), [3, 2, 2, 2]);
        result.check_hermitian(&mesh, 1e-14).unwrap();

        // -x of the first point, +x of the last
        for &(p, d) in &[(0, 1), (2, 0)] {
            assert!(result.edge_block(p, d).unwrap().iter().all(|z| *z == Complex64::new(0.0, 0.0)));
        }
        assert!(result.failed_edges().is_empty());
    }

    #[test]
    fn matches_direct_sum() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let wfcs = store(&dims, SpinorMode::Single);
        let phases = (0..3).map(|p| {
            (0..5).map(|r| Complex64::from_polar(1.0, 0.2 * (p + 1) as f64 * r as f64)).collect()
        }).collect::<Vec<Vec<_>>>();
        let table = PointPhaseTable::from_points(5, &phases).unwrap();

        let result = OverlapEngine::new(&mesh, &wfcs, &table, dims, SpinorMode::Single)
            .run(&pool()).unwrap();

        // point 1, direction +x leads to point 2
        for i in 0..2 {
            for j in 0..2 {
                let a = field(1, i, 0, 5);
                let b = field(2, j, 0, 5);
                let expected = (0..5)
                    .map(|r| phases[1][r] * phases[2][r].conj() * a[r] * b[r].conj())
                    .sum::<Complex64>() / 5.0;
                assert_close!(abs=1e-12, result.dpc(1, 0, i, j).unwrap(), expected);
                assert_close!(abs=1e-12, result.dpc(2, 1, j, i).unwrap(), expected.conj());
                assert_close!(abs=1e-12, result.dp(1, 0, i, j).unwrap(), expected.norm());
            }
        }
    }

    #[test]
    fn two_points() {
        let dims = Dims { points: 2, directions: 1, bands: 1, grid_points: 3 };
        let mesh = MeshTopology::from_table(2, 1, &[1, 0]).unwrap();
        let wfcs = MemoryStore::new();
        wfcs.insert(WfcKey::new(0, 0, 0), vec![Complex64::new(1.0, 0.0); 3]);
        wfcs.insert(WfcKey::new(1, 0, 0), vec![Complex64::new(0.0, 1.0); 3]);
        let phase = UniformPhase { grid_points: 3 };

        let result = OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single)
            .run(&pool()).unwrap();
        // (1/3) Σ 1 * conj(i) = -i
        assert_close!(abs=1e-14, result.dpc(0, 0, 0, 0).unwrap(), Complex64::new(0.0, -1.0));
        assert_close!(abs=1e-14, result.dpc(1, 0, 0, 0).unwrap(), Complex64::new(0.0, 1.0));
        assert_close!(abs=1e-14, result.dp(1, 0, 0, 0).unwrap(), 1.0);
    }

    #[test]
    fn channels_are_summed() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let phase = UniformPhase { grid_points: 5 };
        let run = |mode| {
            let wfcs = store(&dims, mode);
            OverlapEngine::new(&mesh, &wfcs, &phase, dims, mode).run(&pool()).unwrap()
        };
        let single = run(SpinorMode::Single);
        let double = run(SpinorMode::TwoChannel);

        let second_channel = (0..5)
            .map(|r| field(0, 1, 1, 5)[r] * field(1, 0, 1, 5)[r].conj())
            .sum::<Complex64>() / 5.0;
        assert_close!(
            abs=1e-12,
            double.dpc(0, 0, 1, 0).unwrap(),
            single.dpc(0, 0, 1, 0).unwrap() + second_channel,
        );
    }

    #[test]
    fn independent_of_input_phases() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let phase = UniformPhase { grid_points: 5 };
        let fixer = GaugeFixer::new(1, SpinorMode::Single);
        let pool = pool();

        let raw = store(&dims, SpinorMode::Single);
        let rotated = MemoryStore::new();
        for key in raw.keys() {
            let theta = 0.9 * (key.point * 2 + key.band) as f64 - 1.3;
            let field = raw.get(key).unwrap().into_iter()
                .map(|z| z * Complex64::from_polar(1.0, theta))
                .collect();
            rotated.insert(key, field);
        }

        let run = |source: &MemoryStore| {
            let fixed = MemoryStore::new();
            fix_all(&fixer, &dims, source, &fixed, OnAmbiguous::Abort, &pool).unwrap();
            OverlapEngine::new(&mesh, &fixed, &phase, dims, SpinorMode::Single).run(&pool).unwrap()
        };
        let expected = run(&raw);
        let actual = run(&rotated);
        for (a, b) in actual.dpc_data().iter().zip(expected.dpc_data()) {
            assert_close!(abs=1e-12, *a, *b);
        }
    }

    #[test]
    fn quadratic_in_amplitude() {
        let dims = line_dims();
        let mesh = MeshTopology::periodic(&[3]).unwrap();
        let phase = UniformPhase { grid_points: 5 };
        let wfcs = store(&dims, SpinorMode::Single);
        let scaled = MemoryStore::new();
        for key in wfcs.keys() {
            scaled.insert(key, wfcs.get(key).unwrap().into_iter().map(|z| z * 2.5).collect());
        }

        let pool = pool();
        let base = OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single).run(&pool).unwrap();
        let big = OverlapEngine::new(&mesh, &scaled, &phase, dims, SpinorMode::Single).run(&pool).unwrap();
        for (a, b) in big.dpc_data().iter().zip(base.dpc_data()) {
            assert_close!(abs=1e-12, *a, *b * 6.25);
        }
    }

    fn store_without_point_1(dims: &Dims) -> MemoryStore {
        let full = store(dims, SpinorMode::Single);
        let partial = MemoryStore::new();
        for key in full.keys().into_iter().filter(|k| !(k.point == 1 && k.band == 0)) {
            partial.insert(key, full.get(key).unwrap());
        }
        partial
    }

    #[test]
    fn missing_input_aborts() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let wfcs = store_without_point_1(&dims);
        let phase = UniformPhase { grid_points: 5 };

        match OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single).run(&pool()) {
            Err(Error::MissingArtifact(_)) => {},
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn missing_input_fills() {
        let dims = Dims { points: 4, ..line_dims() };
        let mesh = MeshTopology::periodic(&[4]).unwrap();
        let wfcs = store_without_point_1(&dims);
        let phase = UniformPhase { grid_points: 5 };

        let result = OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single)
            .on_missing(OnMissing::Fill, Complex64::new(-1.0, 0.0))
            .run(&pool()).unwrap();

        // the edges 0-1 and 1-2
        assert_eq!(result.failed_edges().len(), 2);
        for &(p, d) in &[(0, 0), (1, 1), (1, 0), (2, 1)] {
            assert!(result.edge_block(p, d).unwrap().iter().all(|z| *z == Complex64::new(-1.0, 0.0)));
        }
        // the edge 2-3 is untouched
        assert!(result.dpc(2, 0, 0, 0).unwrap().norm() > 0.0);
        result.check_hermitian(&mesh, 1e-14).unwrap();
    }

    #[test]
    fn fill_does_not_hide_other_errors() {
        let dims = line_dims();
        let mesh = MeshTopology::regular(&[3]).unwrap();
        let wfcs = store(&dims, SpinorMode::Single);
        wfcs.insert(WfcKey::new(2, 1, 0), vec![Complex64::new(1.0, 0.0); 4]);
        let phase = UniformPhase { grid_points: 5 };

        let result = OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single)
            .on_missing(OnMissing::Fill, Complex64::new(0.0, 0.0))
            .run(&pool());
        match result {
            Err(Error::DimensionMismatch { expected: 5, actual: 4, .. }) => {},
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn mesh_must_match_dims() {
        let mesh = MeshTopology::regular(&[4]).unwrap();
        let dims = line_dims();
        let wfcs = store(&dims, SpinorMode::Single);
        let phase = UniformPhase { grid_points: 5 };
        assert!(OverlapEngine::new(&mesh, &wfcs, &phase, dims, SpinorMode::Single).run(&pool()).is_err());
    }
}
