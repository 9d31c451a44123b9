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

//! Types shared by every stage of kdots.
//!
//! A run is described by four sizes (see [`Dims`]): the number of k-points
//! `N`, the number of neighbor directions per point `D`, the number of bands
//! `B`, and the number of real-space grid points `nr` on which each
//! wavefunction is sampled. The overlap tensor is `(N, D, B, B)`, row-major.

#[macro_use]
extern crate serde_derive;

use std::fmt;

pub use num_complex::Complex64;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error(
        "gauge is ambiguous at k-point {point}, band {band}: \
         modulus {modulus:e} at the reference point is below {threshold:e}"
    )]
    GaugeAmbiguous { point: usize, band: usize, modulus: f64, threshold: f64 },

    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch { what: String, expected: usize, actual: usize },

    #[error("{what} index {index} is out of range (must be less than {len})")]
    OutOfRange { what: &'static str, index: usize, len: usize },

    #[error("overlap block of k-point {point}, direction {direction} would be written twice")]
    DoubleWrite { point: usize, direction: usize },

    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },

    #[error("malformed npy data")]
    Npy(#[from] kdots_npy::Error),

    #[error(transparent)]
    Fs(#[from] kdots_fs_util::Error),
}

impl Error {
    pub fn missing(what: impl fmt::Display) -> Self
    { Error::MissingArtifact(what.to_string()) }

    pub fn dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self
    { Error::DimensionMismatch { what: what.into(), expected, actual } }
}

/// Whether each wavefunction is one complex field, or a pair of them
/// (the two spinor channels of a noncolinear calculation).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpinorMode {
    Single,
    TwoChannel,
}

impl SpinorMode {
    pub fn channels(self) -> usize {
        match self {
            SpinorMode::Single => 1,
            SpinorMode::TwoChannel => 2,
        }
    }
}

impl Default for SpinorMode {
    fn default() -> Self { SpinorMode::Single }
}

/// Address of one wavefunction field.
///
/// `channel` is always 0 for [`SpinorMode::Single`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WfcKey {
    pub point: usize,
    pub band: usize,
    pub channel: usize,
}

impl WfcKey {
    pub fn new(point: usize, band: usize, channel: usize) -> Self
    { WfcKey { point, band, channel } }

    /// All keys of one (point, band), in channel order.
    pub fn channels(point: usize, band: usize, mode: SpinorMode) -> impl Iterator<Item=WfcKey>
    { (0..mode.channels()).map(move |channel| WfcKey { point, band, channel }) }
}

impl fmt::Display for WfcKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "wavefunction (k-point {}, band {}, channel {})", self.point, self.band, self.channel)
    }
}

/// Sizes of a run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Dims {
    /// `N`, the number of k-points.
    pub points: usize,
    /// `D`, the number of neighbor slots per k-point.
    pub directions: usize,
    /// `B`
    pub bands: usize,
    /// `nr`, the length of each real-space field.
    pub grid_points: usize,
}

impl Dims {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("points", self.points),
            ("directions", self.directions),
            ("bands", self.bands),
            ("grid-points", self.grid_points),
        ];
        for &(name, value) in &fields {
            if value == 0 {
                return Err(Error::Configuration(format!("'{}' must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn tensor_shape(&self) -> [usize; 4]
    { [self.points, self.directions, self.bands, self.bands] }

    pub fn tensor_len(&self) -> usize
    { self.tensor_shape().iter().product() }

    /// Number of cells in the `B x B` block of one directed edge.
    pub fn block_len(&self) -> usize
    { self.bands * self.bands }

    /// Offset of the first cell of `(p, d)`'s block.
    pub fn block_offset(&self, point: usize, direction: usize) -> usize
    { (point * self.directions + direction) * self.block_len() }

    /// Row-major offset of `dpc[p, d, i, j]`.
    pub fn tensor_index(&self, point: usize, direction: usize, i: usize, j: usize) -> usize
    { self.block_offset(point, direction) + i * self.bands + j }

    pub fn check_point(&self, point: usize) -> Result<()>
    { check_index("k-point", point, self.points) }

    pub fn check_direction(&self, direction: usize) -> Result<()>
    { check_index("direction", direction, self.directions) }

    pub fn check_band(&self, band: usize) -> Result<()>
    { check_index("band", band, self.bands) }

    /// Fail unless a field has length `nr`.
    pub fn check_field(&self, what: impl fmt::Display, len: usize) -> Result<()> {
        match len == self.grid_points {
            true => Ok(()),
            false => Err(Error::dimension(what.to_string(), self.grid_points, len)),
        }
    }
}

pub fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    match index < len {
        true => Ok(()),
        false => Err(Error::OutOfRange { what, index, len }),
    }
}

/// The reference value used to fix the gauge of one (point, band).
#[derive(Debug, Copy, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct PhaseRecord {
    pub point: usize,
    pub band: usize,
    /// Modulus of the sum over channels at the reference grid point.
    pub modulus: f64,
    /// The phase that was removed, in radians.
    pub angle: f64,
    /// False when the modulus fell below the threshold, or is NaN.
    pub valid: bool,
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    fn dims() -> Dims {
        Dims { points: 3, directions: 4, bands: 2, grid_points: 5 }
    }

    #[test]
    fn tensor_index_is_row_major() {
        let dims = dims();
        assert_eq!(dims.tensor_shape(), [3, 4, 2, 2]);
        assert_eq!(dims.tensor_len(), 48);

        let mut expected = 0;
        for p in 0..3 {
            for d in 0..4 {
                for i in 0..2 {
                    for j in 0..2 {
                        assert_eq!(dims.tensor_index(p, d, i, j), expected);
                        expected += 1;
                    }
                }
            }
        }
    }

    #[test]
    fn validation() {
        dims().validate().unwrap();

        let err = Dims { bands: 0, ..dims() }.validate().unwrap_err();
        match err {
            Error::Configuration(msg) => assert!(msg.contains("bands")),
            e => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn index_checks() {
        let dims = dims();
        dims.check_point(2).unwrap();
        dims.check_direction(3).unwrap();
        match dims.check_direction(4).unwrap_err() {
            Error::OutOfRange { what: "direction", index: 4, len: 4 } => {},
            e => panic!("unexpected error: {}", e),
        }
        match dims.check_field("phase", 4).unwrap_err() {
            Error::DimensionMismatch { expected: 5, actual: 4, .. } => {},
            e => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn keys() {
        let keys = WfcKey::channels(3, 1, SpinorMode::TwoChannel).collect::<Vec<_>>();
        assert_eq!(keys, vec![WfcKey::new(3, 1, 0), WfcKey::new(3, 1, 1)]);
        assert_eq!(WfcKey::channels(0, 0, SpinorMode::Single).count(), 1);
        assert!(Error::missing(keys[1]).to_string().contains("k-point 3, band 1, channel 1"));
    }
}
