/* ********************************************************************** **
**  This file is part of kdots.                                           **
**                                                                        **
**  kdots is free software: you can redistribute it and/or modify it      **
**  under the terms of the GNU General Public License as published by the **
**  Free Software Foundation, either version 3 of the License, or (at     **
**  your option) any later version.                                       **
**                                                                        **
**      http://www.gnu.org/licenses/                                      **
**                                                                        **
** Do note that, while the whole of kdots is licensed under the GPL, many **
** parts of it are licensed under more permissive terms.                  **
** ********************************************************************** */

//! The commands behind the kdots binaries.
//!
//! Everything in here sits on top of the library crates, and is where
//! settings files, logging and the worker pool get set up.

#[macro_use]
extern crate log;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate serde_json;

pub type FailResult<T> = Result<T, failure::Error>;

mod cmd;
mod env;
pub mod entry_points;

mod ui {
    pub mod logging;
}

pub use crate::cmd::{read_settings, run_gauge_fix, run_overlaps, OverlapInputs};
pub use crate::cmd::{FAILED_EDGES_FILENAME, GAUGE_REPORT_FILENAME};
pub use crate::ui::logging::GlobalLogger;
