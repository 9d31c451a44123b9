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

use crate::FailResult;
use crate::cmd::{read_settings, run_gauge_fix, run_overlaps, OverlapInputs, GAUGE_REPORT_FILENAME};
use crate::ui::logging::GlobalLogger;

use clap::{App, Arg, ArgMatches};
use std::path::PathBuf;

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if crate::env::rust_backtrace() {
            error!("{}", e.backtrace());
        } else {
            error!("(for a backtrace, try again with RUST_BACKTRACE=1)");
        }
        std::process::exit(1);
    });
}

fn common_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.version(crate_version!())
        .args(&[
            Arg::with_name("config")
                .short("c").long("config").value_name("CONFIG")
                .takes_value(true).required(true)
                .help("settings yaml"),
            Arg::with_name("output")
                .short("o").long("output").value_name("DIR")
                .takes_value(true).required(true)
                .help("output directory"),
            Arg::with_name("log")
                .long("log").value_name("FILE")
                .takes_value(true)
                .help("also write the log to this file"),
            Arg::with_name("verbose")
                .short("v").long("verbose").multiple(true)
                .help("more output; give twice to log every overlap"),
        ])
}

fn init_logger(matches: &ArgMatches<'_>) -> FailResult<()> {
    let mut logger = GlobalLogger::default();
    logger.verbosity(matches.occurrences_of("verbose") as i32);
    logger.show_target(crate::env::log_mod()?);
    if let Some(path) = matches.value_of("log") {
        logger.path(path);
    }
    logger.apply()
}

// clap has already rejected the command line if a required arg is missing
fn path_arg(matches: &ArgMatches<'_>, name: &str) -> FailResult<PathBuf> {
    match matches.value_of_os(name) {
        Some(s) => Ok(PathBuf::from(s)),
        None => bail!("missing argument: --{}", name),
    }
}

// -------------------------------------------------------------------------------------

pub fn gauge_fix() {
    wrap_result_main(|| {
        let matches = common_args(App::new("kdots-gauge-fix"))
            .about("Make each wavefunction real and positive at the reference grid point.")
            .arg(Arg::with_name("dump")
                .long("dump").value_name("FILE")
                .takes_value(true).required(true)
                .help("text dump of the raw real-space wavefunctions"))
            .get_matches();
        init_logger(&matches)?;

        let settings = read_settings(path_arg(&matches, "config")?)?;
        let dump = path_arg(&matches, "dump")?;
        let output = path_arg(&matches, "output")?;

        let report = run_gauge_fix(&settings, &dump, &output)?;
        if report.skipped().next().is_some() {
            warn!("Some wavefunctions were skipped; see '{}'", output.join(GAUGE_REPORT_FILENAME).display());
        }
        Ok(())
    });
}

pub fn overlaps() {
    wrap_result_main(|| {
        let matches = common_args(App::new("kdots-overlaps"))
            .about("Overlaps of gauge-fixed wavefunctions between neighboring k-points.")
            .args(&[
                Arg::with_name("neighbors")
                    .long("neighbors").value_name("NPY")
                    .takes_value(true).required(true)
                    .help("(N, D) integer table of neighbors, with -1 for none"),
                Arg::with_name("phase")
                    .long("phase").value_name("NPY")
                    .takes_value(true)
                    .help("(nr, N) complex table of Bloch phases [default: 1 everywhere]"),
                Arg::with_name("wfc")
                    .long("wfc").value_name("DIR")
                    .takes_value(true).required(true)
                    .help("directory written by kdots-gauge-fix"),
            ])
            .get_matches();
        init_logger(&matches)?;

        let settings = read_settings(path_arg(&matches, "config")?)?;
        let inputs = OverlapInputs {
            neighbors: path_arg(&matches, "neighbors")?,
            phase: matches.value_of_os("phase").map(PathBuf::from),
            wavefunctions: path_arg(&matches, "wfc")?,
        };
        let output = path_arg(&matches, "output")?;

        run_overlaps(&settings, &inputs, &output)?;
        Ok(())
    });
}
