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

use kdots_core::{Complex64, Error, PhaseRecord, Result, SpinorMode};

/// Below this modulus at the reference point, the phase is considered noise.
pub const DEFAULT_THRESHOLD: f64 = 1e-5;

/// Removes the global phase of each wavefunction, so that it is real and
/// positive at one reference grid point.
///
/// In the two-channel case there is a single gauge per band, taken from the
/// sum of the channels at the reference point; both channels are rotated by
/// the same phase.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GaugeFixer {
    reference_point: usize,
    threshold: f64,
    mode: SpinorMode,
}

impl GaugeFixer {
    pub fn new(reference_point: usize, mode: SpinorMode) -> Self
    { GaugeFixer { reference_point, threshold: DEFAULT_THRESHOLD, mode } }

    pub fn with_threshold(self, threshold: f64) -> Self
    { GaugeFixer { threshold, ..self } }

    pub fn reference_point(&self) -> usize { self.reference_point }
    pub fn threshold(&self) -> f64 { self.threshold }
    pub fn mode(&self) -> SpinorMode { self.mode }

    /// Compute the phase reference of one band from the values of each of its
    /// channels at the reference point.
    ///
    /// This never fails; an unusable reference produces a record with `valid: false`.
    pub fn measure(&self, point: usize, band: usize, values: &[Complex64]) -> PhaseRecord {
        // Both the phase and the modulus come from the sum over channels,
        // so the gauge varies continuously with the reference values.
        let pooled = values.iter().fold(Complex64::new(0.0, 0.0), |acc, &z| acc + z);
        let modulus = pooled.norm();
        let angle = pooled.im.atan2(pooled.re);
        // false for NaN
        let valid = modulus >= self.threshold;

        PhaseRecord { point, band, modulus, angle, valid }
    }

    /// Like `measure`, but reads the reference values out of the fields, and
    /// fails on an unusable reference.
    pub fn reference(&self, point: usize, band: usize, channels: &[Vec<Complex64>]) -> Result<PhaseRecord> {
        let values = self.reference_values(channels)?;
        let record = self.measure(point, band, &values);
        match record.valid {
            true => Ok(record),
            false => Err(self.ambiguous(&record)),
        }
    }

    /// Rotate all channels of one band in place.
    pub fn fix(&self, point: usize, band: usize, channels: &mut [Vec<Complex64>]) -> Result<PhaseRecord> {
        let record = self.reference(point, band, channels)?;
        rotate(channels, record.angle);
        Ok(record)
    }

    pub(crate) fn ambiguous(&self, record: &PhaseRecord) -> Error {
        Error::GaugeAmbiguous {
            point: record.point,
            band: record.band,
            modulus: record.modulus,
            threshold: self.threshold,
        }
    }

    fn reference_values(&self, channels: &[Vec<Complex64>]) -> Result<Vec<Complex64>> {
        let expected = self.mode.channels();
        if channels.len() != expected {
            return Err(Error::dimension("number of spinor channels", expected, channels.len()));
        }
        channels.iter().map(|field| {
            field.get(self.reference_point).cloned().ok_or_else(|| Error::OutOfRange {
                what: "reference grid point",
                index: self.reference_point,
                len: field.len(),
            })
        }).collect()
    }
}

/// Multiply every channel by `exp(-i angle)`.
pub fn rotate(channels: &mut [Vec<Complex64>], angle: f64) {
    let factor = Complex64::from_polar(1.0, -angle);
    for field in channels {
        for z in field.iter_mut() {
            *z *= factor;
        }
    }
}
