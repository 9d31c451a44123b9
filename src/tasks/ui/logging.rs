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

use ansi_term::Colour;
use log::{Level, LevelFilter};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

// crates whose debug output is worth seeing by default
const OUR_CRATES: &[&str] = &[
    "kdots_tasks",
    "kdots_mesh",
    "kdots_gauge",
    "kdots_overlap",
];

/// Builder-style setup for logging
#[derive(Debug, Clone, Default)]
pub struct GlobalLogger {
    path: Option<PathBuf>,
    verbosity: Verbosity,
    show_target: bool,
}

impl GlobalLogger {
    /// Also write everything to a file.
    pub fn path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self
    { self.path = Some(path.as_ref().to_owned()); self }

    /// Any integer will be accepted; the level will be truncated
    /// to the most extreme value supported.
    ///
    /// `1` adds per-edge timing, `2` adds every single overlap.
    pub fn verbosity(&mut self, level: i32) -> &mut Self {
        self.verbosity = match level {
            l if l <= 0 => Verbosity::Default,
            1 => Verbosity::Loud,
            _ => Verbosity::Louder,
        };
        self
    }

    /// Prefix each message with the module it came from.
    pub fn show_target(&mut self, show: bool) -> &mut Self
    { self.show_target = show; self }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity { Default, Loud, Louder }

impl Default for Verbosity {
    fn default() -> Self { Verbosity::Default }
}

impl GlobalLogger {
    /// Install the logger.
    ///
    /// Fails if a logger is already installed.
    pub fn apply(&mut self) -> FailResult<()> {
        let start = Instant::now();
        let show_target = self.show_target;
        let ours = match self.verbosity {
            Verbosity::Default => LevelFilter::Info,
            Verbosity::Loud => LevelFilter::Debug,
            Verbosity::Louder => LevelFilter::Trace,
        };

        let mut fern = fern::Dispatch::new()
            .format(move |out, message, record| {
                let t = start.elapsed();
                let target = match show_target {
                    true => format!("[{}]", record.target()),
                    false => String::new(),
                };
                out.finish(format_args!("[{:>4}.{:03}s]{}[{}] {}",
                    t.as_secs(),
                    t.subsec_millis(),
                    target,
                    ColorizedLevel(record.level()),
                    message))
            })
            .level(LevelFilter::Info);
        for name in OUR_CRATES {
            fern = fern.level_for(*name, ours);
        }
        fern = fern.chain(std::io::stdout());

        if let Some(path) = self.path.as_ref() {
            fern = fern.chain(fern::log_file(path)?);
        }

        fern.apply()?;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ColorizedLevel(pub Level);
impl fmt::Display for ColorizedLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let style = match self.0 {
            Level::Error => Colour::Red.bold(),
            Level::Warn  => Colour::Red.normal(),
            Level::Info  => Colour::Cyan.bold(),
            Level::Debug => Colour::Yellow.dimmed(),
            Level::Trace => Colour::Cyan.normal(),
        };
        write!(f, "{}", style.paint(self.0.to_string()))
    }
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_saturates() {
        let mut logger = GlobalLogger::default();
        assert_eq!(logger.verbosity(-3).verbosity, Verbosity::Default);
        assert_eq!(logger.verbosity(1).verbosity, Verbosity::Loud);
        assert_eq!(logger.verbosity(40).verbosity, Verbosity::Louder);
    }

    #[test]
    fn level_text_survives_coloring() {
        assert!(ColorizedLevel(Level::Warn).to_string().contains("WARN"));
    }
}
