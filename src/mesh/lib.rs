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

//! The neighbor graph of a k-point mesh.
//!
//! Every k-point has the same number `D` of direction slots. A slot either
//! names a neighboring k-point or is empty (a boundary of the mesh). The
//! graph must be symmetric: whenever `p` lists `q`, `q` lists `p`, and with
//! the same multiplicity.

#[macro_use]
extern crate log;
#[macro_use]
extern crate itertools;

use kdots_core::{check_index, Dims, Error, Result};
use kdots_npy::NpyArray;
use std::io::BufReader;
use std::path::Path;

/// Marks an empty slot in a neighbor table.
pub const NO_NEIGHBOR: i64 = -1;

/// A directed edge of the mesh, together with the slot that leads back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub point: usize,
    pub direction: usize,
    pub neighbor: usize,
    /// The direction at `neighbor` that leads back to `point`.
    pub reverse: usize,
}

impl Edge {
    /// The same edge, seen from the other end.
    #[inline]
    pub fn flip(self) -> Edge {
        Edge {
            point: self.neighbor,
            direction: self.reverse,
            neighbor: self.point,
            reverse: self.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshTopology {
    num_points: usize,
    num_directions: usize,
    // both indexed by `point * num_directions + direction`
    neighbors: Vec<Option<usize>>,
    reverse: Vec<Option<usize>>,
}

//=================================================================

impl MeshTopology {
    /// Build from a row-major `(N, D)` table, where [`NO_NEIGHBOR`] marks a boundary.
    pub fn from_table(num_points: usize, num_directions: usize, table: &[i64]) -> Result<Self> {
        if table.len() != num_points * num_directions {
            return Err(Error::dimension("neighbor table", num_points * num_directions, table.len()));
        }

        let neighbors = table.iter().enumerate().map(|(index, &entry)| match entry {
            NO_NEIGHBOR => Ok(None),
            q if 0 <= q && (q as u64) < num_points as u64 => Ok(Some(q as usize)),
            q => Err(Error::Configuration(format!(
                "neighbor table names k-point {} (at k-point {}, direction {}), \
                 but there are only {} k-points",
                q, index / num_directions, index % num_directions, num_points,
            ))),
        }).collect::<Result<Vec<_>>>()?;

        let reverse = pair_reverse_directions(num_directions, &neighbors)?;
        Ok(MeshTopology { num_points, num_directions, neighbors, reverse })
    }

    /// Build from an integer array of shape `(N, D)`.
    pub fn from_npy(array: &NpyArray<i64>) -> Result<Self> {
        let shape = array.expect_ndim(2)?;
        MeshTopology::from_table(shape[0], shape[1], &array.data)
    }

    /// Read a neighbor table from an `.npy` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = BufReader::new(kdots_fs_util::open(path)?);
        let mesh = MeshTopology::from_npy(&kdots_npy::read(file)?)?;
        debug!(
            "read neighbor table for {} k-points x {} directions from '{}'",
            mesh.num_points, mesh.num_directions, path.display(),
        );
        Ok(mesh)
    }

    /// The non-periodic rectilinear mesh over a 1, 2 or 3 dimensional grid.
    ///
    /// Directions are `+x, -x, +y, -y, +z, -z` (as many as there are axes),
    /// and points are numbered with x varying fastest.
    pub fn regular(shape: &[usize]) -> Result<Self>
    { MeshTopology::rectilinear(shape, false) }

    /// Like [`MeshTopology::regular`], but each axis wraps around.
    pub fn periodic(shape: &[usize]) -> Result<Self>
    { MeshTopology::rectilinear(shape, true) }

    fn rectilinear(shape: &[usize], periodic: bool) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(Error::Configuration(format!("a k mesh must have 1 to 3 axes, not {}", shape.len())));
        }
        if shape.contains(&0) {
            return Err(Error::Configuration(format!("k mesh shape {:?} has an empty axis", shape)));
        }

        let num_points = shape.iter().product::<usize>();
        let num_directions = 2 * shape.len();
        let strides = shape.iter().scan(1, |acc, &n| {
            let stride = *acc;
            *acc *= n;
            Some(stride)
        }).collect::<Vec<_>>();

        let mut table = Vec::with_capacity(num_points * num_directions);
        for point in 0..num_points {
            for (&n, &stride) in shape.iter().zip(&strides) {
                let coord = (point / stride) % n;
                for &step in &[1i64, -1] {
                    let next = coord as i64 + step;
                    let next = match (0 <= next && next < n as i64, periodic) {
                        (true, _) => Some(next as usize),
                        (false, true) => Some(((next + n as i64) % n as i64) as usize),
                        (false, false) => None,
                    };
                    table.push(match next {
                        Some(next) => (point - coord * stride + next * stride) as i64,
                        None => NO_NEIGHBOR,
                    });
                }
            }
        }
        MeshTopology::from_table(num_points, num_directions, &table)
    }
}

/// Pairs up every directed edge with one on the other end that leads back.
///
/// The result is an involution over directed edges, so that no two edges
/// share a mirror. Where several slots of `q` lead back to `p`, the opposite
/// slot `d ^ 1` is preferred.
fn pair_reverse_directions(num_directions: usize, neighbors: &[Option<usize>]) -> Result<Vec<Option<usize>>> {
    let nd = num_directions;
    let mut reverse = vec![None; neighbors.len()];

    for (index, &neighbor) in neighbors.iter().enumerate() {
        let q = match neighbor {
            Some(q) => q,
            None => continue,
        };
        if reverse[index].is_some() {
            continue;
        }
        let (p, d) = (index / nd, index % nd);

        let is_free = |d2: usize| {
            let other = q * nd + d2;
            other != index && neighbors[other] == Some(p) && reverse[other].is_none()
        };
        let opposite = Some(d ^ 1).filter(|&d2| d2 < nd);
        let partner = opposite.into_iter().chain(0..nd).find(|&d2| is_free(d2));

        match partner {
            Some(d2) => {
                reverse[index] = Some(d2);
                reverse[q * nd + d2] = Some(d);
            },
            // an unpaired slot of a point that neighbors itself
            None if q == p => reverse[index] = Some(d),
            None => return Err(Error::Configuration(format!(
                "neighbor table is not symmetric: k-point {} lists {} in direction {}, \
                 but {} has no unpaired direction leading back",
                p, q, d, q,
            ))),
        }
    }
    Ok(reverse)
}

//=================================================================

impl MeshTopology {
    pub fn num_points(&self) -> usize
    { self.num_points }

    pub fn num_directions(&self) -> usize
    { self.num_directions }

    fn slot(&self, point: usize, direction: usize) -> Result<usize> {
        check_index("k-point", point, self.num_points)?;
        check_index("direction", direction, self.num_directions)?;
        Ok(point * self.num_directions + direction)
    }

    /// The k-point in the given direction, or `None` at a boundary.
    pub fn neighbor(&self, point: usize, direction: usize) -> Result<Option<usize>>
    { Ok(self.neighbors[self.slot(point, direction)?]) }

    /// The direction `d'` at `q = neighbor(p, d)` with `neighbor(q, d') = p`.
    ///
    /// `None` exactly when there is no neighbor.
    pub fn reverse_direction(&self, point: usize, direction: usize) -> Result<Option<usize>>
    { Ok(self.reverse[self.slot(point, direction)?]) }

    /// Every undirected edge once, as the directed edge `(p, d)` with `q > p`.
    ///
    /// Edges are produced in `(p, d)` order. Boundaries and points that
    /// neighbor themselves produce nothing.
    pub fn edges(&self) -> Vec<Edge> {
        iproduct!(0..self.num_points, 0..self.num_directions)
            .filter_map(|(point, direction)| {
                let slot = point * self.num_directions + direction;
                match (self.neighbors[slot], self.reverse[slot]) {
                    (Some(neighbor), Some(reverse)) if neighbor > point => {
                        Some(Edge { point, direction, neighbor, reverse })
                    },
                    _ => None,
                }
            }).collect()
    }

    /// Fail unless the mesh has the sizes given in `dims`.
    pub fn check_dims(&self, dims: &Dims) -> Result<()> {
        if self.num_points != dims.points {
            return Err(Error::dimension("number of k-points in the mesh", dims.points, self.num_points));
        }
        if self.num_directions != dims.directions {
            return Err(Error::dimension("number of mesh directions", dims.directions, self.num_directions));
        }
        Ok(())
    }
}
