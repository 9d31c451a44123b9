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

//! Gauge fixing of real-space wavefunctions.
//!
//! Every wavefunction returned by the solver carries an arbitrary global
//! phase. Overlaps between neighboring k-points are only meaningful once
//! that phase is fixed in some consistent way; here, each wavefunction is
//! rotated to be real and positive at one chosen grid point.

// The expansion of do_parse! leaves unnecessary parentheses around an output
// expression that isn't a tuple of 2 or more elements.
#![allow(unused_parens)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;
#[macro_use]
extern crate serde_derive;

mod batch;
mod dump;
mod fixer;
mod store;

pub use crate::batch::{fix_all, GaugeReport, OnAmbiguous};
pub use crate::dump::{parse_values, DumpSource};
pub use crate::fixer::{rotate, GaugeFixer, DEFAULT_THRESHOLD};
pub use crate::store::{DirStore, GaugeSink, GaugeStore, MemoryStore, WavefunctionSource};
