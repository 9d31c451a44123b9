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

//! Overlaps of gauge-fixed wavefunctions between neighboring k-points.
//!
//! The output is the tensor `dpc[p, d, i, j]` of shape `(N, D, B, B)`, along
//! with its elementwise modulus `dp`. Slots without a neighbor stay zero.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod engine;
mod phase;
mod progress;
mod store;

pub use crate::engine::{OnMissing, OverlapEngine};
pub use crate::phase::{BlochPhaseSource, EdgePhaseMap, PointPhaseTable, UniformPhase};
pub use crate::progress::{LogProgress, NoProgress, Progress};
pub use crate::store::{ResultStore, DP_FILENAME, DPC_FILENAME};
