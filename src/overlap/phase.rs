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

//! Bloch phase fields.
//!
//! The real-space wavefunctions at two k-points follow Bloch conventions
//! that differ by a position-dependent phase. Each edge of the mesh comes
//! with a field of length `nr` relating the two; it is an input here and is
//! used as given.

use kdots_core::{check_index, Complex64, Dims, Error, Result};
use kdots_mesh::Edge;
use kdots_npy::NpyArray;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

/// Provides the phase field of each edge.
pub trait BlochPhaseSource: Sync {
    /// The field for the overlap of `edge.point` with `edge.neighbor`.
    fn edge_phase(&self, edge: &Edge) -> Result<Vec<Complex64>>;
}

//=================================================================

/// One phase vector `φ_p` per k-point; the field of an edge `p → q` is
/// `φ_p * conj(φ_q)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPhaseTable {
    num_points: usize,
    grid_points: usize,
    // shape (nr, N), as stored in phase.npy
    data: Vec<Complex64>,
}

impl PointPhaseTable {
    /// `data` has shape `(nr, N)`, row-major.
    pub fn from_grid_major(grid_points: usize, num_points: usize, data: Vec<Complex64>) -> Result<Self> {
        if data.len() != grid_points * num_points {
            return Err(Error::dimension("Bloch phase table", grid_points * num_points, data.len()));
        }
        Ok(PointPhaseTable { num_points, grid_points, data })
    }

    /// Build from one vector per k-point.
    pub fn from_points(grid_points: usize, phases: &[Vec<Complex64>]) -> Result<Self> {
        for (point, phase) in phases.iter().enumerate() {
            if phase.len() != grid_points {
                return Err(Error::dimension(format!("Bloch phase of k-point {}", point), grid_points, phase.len()));
            }
        }
        let data = (0..grid_points)
            .flat_map(|r| phases.iter().map(move |phase| phase[r]))
            .collect();
        PointPhaseTable::from_grid_major(grid_points, phases.len(), data)
    }

    pub fn from_npy(array: NpyArray<Complex64>) -> Result<Self> {
        let (grid_points, num_points) = {
            let shape = array.expect_ndim(2)?;
            (shape[0], shape[1])
        };
        PointPhaseTable::from_grid_major(grid_points, num_points, array.data)
    }

    /// Read `phase.npy`, of shape `(nr, N)`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = BufReader::new(kdots_fs_util::open(path.as_ref())?);
        PointPhaseTable::from_npy(kdots_npy::read(file)?)
    }

    /// Fail unless the table covers exactly `N` k-points of `nr` grid points.
    pub fn check_dims(&self, dims: &Dims) -> Result<()> {
        if self.num_points != dims.points {
            return Err(Error::dimension("number of k-points in the Bloch phase table", dims.points, self.num_points));
        }
        dims.check_field("Bloch phase table", self.grid_points)
    }

    pub fn point_phase(&self, point: usize) -> Result<Vec<Complex64>> {
        check_index("k-point", point, self.num_points)?;
        Ok(self.data.iter().skip(point).step_by(self.num_points).cloned().collect())
    }
}

impl BlochPhaseSource for PointPhaseTable {
    fn edge_phase(&self, edge: &Edge) -> Result<Vec<Complex64>> {
        check_index("k-point", edge.point, self.num_points)?;
        check_index("k-point", edge.neighbor, self.num_points)?;
        Ok(self.data.chunks(self.num_points)
            .map(|row| row[edge.point] * row[edge.neighbor].conj())
            .collect())
    }
}

//=================================================================

/// Explicit fields for each edge, keyed by the edge's `(point, direction)`.
#[derive(Debug, Clone, Default)]
pub struct EdgePhaseMap {
    grid_points: usize,
    fields: HashMap<(usize, usize), Vec<Complex64>>,
}

impl EdgePhaseMap {
    pub fn new(grid_points: usize) -> Self
    { EdgePhaseMap { grid_points, fields: HashMap::new() } }

    pub fn insert(&mut self, point: usize, direction: usize, field: Vec<Complex64>) -> Result<()> {
        if field.len() != self.grid_points {
            let what = format!("Bloch phase of edge (k-point {}, direction {})", point, direction);
            return Err(Error::dimension(what, self.grid_points, field.len()));
        }
        self.fields.insert((point, direction), field);
        Ok(())
    }
}

impl BlochPhaseSource for EdgePhaseMap {
    fn edge_phase(&self, edge: &Edge) -> Result<Vec<Complex64>> {
        self.fields.get(&(edge.point, edge.direction)).cloned().ok_or_else(|| {
            Error::missing(format!("Bloch phase of edge (k-point {}, direction {})", edge.point, edge.direction))
        })
    }
}

//=================================================================

/// A field of ones everywhere.
#[derive(Debug, Copy, Clone)]
pub struct UniformPhase {
    pub grid_points: usize,
}

impl BlochPhaseSource for UniformPhase {
    fn edge_phase(&self, _: &Edge) -> Result<Vec<Complex64>>
    { Ok(vec![Complex64::new(1.0, 0.0); self.grid_points]) }
}
