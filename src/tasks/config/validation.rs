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

//! Checks performed on the settings before any work starts.

use crate::config::*;
use kdots_core::{Error, Result};
use kdots_overlap::OnMissing;

macro_rules! bail {
    ($($arg:tt)*) => { return Err(Error::Configuration(format!($($arg)*))) };
}

impl Settings {
    pub fn validate(self) -> Result<ValidatedSettings>
    { self.validate_for_cpus(num_cpus::get()) }

    fn validate_for_cpus(self, cpus: usize) -> Result<ValidatedSettings> {
        check_threads(self.threads, cpus)?;

        let dims = [
            ("points", self.points),
            ("directions", self.directions),
            ("bands", self.bands),
            ("grid-points", self.grid_points),
        ];
        for &(name, value) in &dims {
            if value == 0 {
                bail!("`{}` must be positive", name);
            }
        }

        if self.reference_point >= self.grid_points {
            bail!(
                "`reference-point: {}` is outside the grid (grid-points: {})",
                self.reference_point, self.grid_points,
            );
        }

        check_gauge(&self.gauge)?;
        check_overlap(&self.overlap);

        Ok(ValidatedSettings(self))
    }
}

fn check_threads(threads: Option<usize>, cpus: usize) -> Result<()> {
    match threads {
        Some(n) if n == 0 || n > cpus => {
            bail!("`threads: {}` is invalid. (1 <= threads <= {}, the number of cores)", n, cpus);
        },
        _ => Ok(()),
    }
}

fn check_gauge(gauge: &Gauge) -> Result<()> {
    if !(gauge.threshold.is_finite() && gauge.threshold >= 0.0) {
        bail!("`gauge.threshold: {}` must be a non-negative number", gauge.threshold);
    }
    Ok(())
}

fn check_overlap(overlap: &Overlap) {
    if overlap.on_missing == OnMissing::Abort && overlap.fill_value.iter().any(|x| !x.is_nan()) {
        warn!("`overlap.fill-value` has no effect unless `overlap.on-missing: fill`");
    }
}
