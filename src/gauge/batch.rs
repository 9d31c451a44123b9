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

use crate::fixer::{rotate, GaugeFixer};
use crate::store::{GaugeSink, WavefunctionSource};
use kdots_core::{Dims, PhaseRecord, Result, WfcKey};
use rayon::prelude::*;

/// What to do with a wavefunction whose gauge cannot be fixed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnAmbiguous {
    /// Fail before anything is written.
    Abort,
    /// Log a warning and don't write that wavefunction.
    ///
    /// Any overlap that needs it will fail later for lack of the artifact.
    Skip,
}

impl Default for OnAmbiguous {
    fn default() -> Self { OnAmbiguous::Abort }
}

/// The phase reference of every (point, band), in that order.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct GaugeReport {
    pub records: Vec<PhaseRecord>,
}

impl GaugeReport {
    /// Records of the wavefunctions that were not written.
    pub fn skipped(&self) -> impl Iterator<Item=&PhaseRecord>
    { self.records.iter().filter(|r| !r.valid) }
}

/// Fix the gauge of every wavefunction of the mesh on the given pool.
///
/// All references are measured before anything is written, so that with
/// `OnAmbiguous::Abort` a failure leaves the sink untouched.
pub fn fix_all(
    fixer: &GaugeFixer,
    dims: &Dims,
    source: &dyn WavefunctionSource,
    sink: &dyn GaugeSink,
    on_ambiguous: OnAmbiguous,
    pool: &rayon::ThreadPool,
) -> Result<GaugeReport> {
    dims.validate()?;
    kdots_core::check_index("reference grid point", fixer.reference_point(), dims.grid_points)?;

    let mode = fixer.mode();
    let bands = (0..dims.points)
        .flat_map(|point| (0..dims.bands).map(move |band| (point, band)))
        .collect::<Vec<_>>();

    debug!("{:>6}  {:>4}  {:>12}  {:>12}   {}", "k", "band", "modulus", "phase", "valid");
    let records = pool.install(|| {
        bands.par_iter().map(|&(point, band)| {
            let values = WfcKey::channels(point, band, mode)
                .map(|key| source.raw_value(key, fixer.reference_point()))
                .collect::<Result<Vec<_>>>()?;
            let record = fixer.measure(point, band, &values);
            debug!(
                "{:6}  {:4}  {:12.8}  {:12.8}   {}",
                point, band, record.modulus, record.angle, record.valid,
            );
            Ok(record)
        }).collect::<Result<Vec<_>>>()
    })?;

    for record in records.iter().filter(|r| !r.valid) {
        match on_ambiguous {
            OnAmbiguous::Abort => return Err(fixer.ambiguous(record)),
            OnAmbiguous::Skip => warn!(
                "Not writing k-point {}, band {}: modulus {:e} at the reference point is below {:e}",
                record.point, record.band, record.modulus, fixer.threshold(),
            ),
        }
    }

    pool.install(|| {
        records.par_iter().filter(|r| r.valid).map(|record| {
            let keys = || WfcKey::channels(record.point, record.band, mode);
            let mut channels = keys().map(|key| {
                let field = source.read_raw(key)?;
                dims.check_field(key, field.len())?;
                Ok(field)
            }).collect::<Result<Vec<_>>>()?;

            rotate(&mut channels, record.angle);
            for (key, field) in keys().zip(&channels) {
                sink.write_fixed(key, field)?;
            }
            Ok(())
        }).collect::<Result<()>>()
    })?;

    let report = GaugeReport { records };
    let skipped = report.skipped().count();
    info!("Fixed the gauge of {} wavefunctions ({} skipped)", report.records.len() - skipped, skipped);
    Ok(report)
}
