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

//! The real-space wavefunction dump written by the plane-wave solver.
//!
//! The dump is text with one complex number per line, in Fortran's
//! list-directed form:
//!
//! ```text
//! (  0.1234E-01, -0.5678E+00)
//! ```
//!
//! Values are ordered by k-point, then band, then spinor channel (if there
//! are two), then grid point. Blank lines and `#` comment lines are skipped.

use crate::store::WavefunctionSource;
use kdots_core::{check_index, Complex64, Dims, Error, Result, SpinorMode, WfcKey};
use nom::IResult;
use std::path::Path;

/// Raw wavefunctions for a whole mesh, read from a solver dump.
#[derive(Debug, Clone)]
pub struct DumpSource {
    dims: Dims,
    mode: SpinorMode,
    values: Vec<Complex64>,
}

impl DumpSource {
    pub fn parse(text: &str, dims: Dims, mode: SpinorMode) -> Result<Self> {
        let values = parse_values(text)?;
        DumpSource::from_values(values, dims, mode)
    }

    pub fn load(path: impl AsRef<Path>, dims: Dims, mode: SpinorMode) -> Result<Self> {
        let path = path.as_ref();
        let text = kdots_fs_util::read_to_string(path)?;
        let source = DumpSource::parse(&text, dims, mode)?;
        debug!("read {} values from '{}'", source.values.len(), path.display());
        Ok(source)
    }

    /// Use values that are already in dump order.
    pub fn from_values(values: Vec<Complex64>, dims: Dims, mode: SpinorMode) -> Result<Self> {
        let expected = dims.points * dims.bands * mode.channels() * dims.grid_points;
        if values.len() != expected {
            return Err(Error::dimension("wavefunction dump (k-points x bands x channels x grid points)", expected, values.len()));
        }
        Ok(DumpSource { dims, mode, values })
    }

    fn offset(&self, key: WfcKey) -> Result<usize> {
        self.dims.check_point(key.point)?;
        self.dims.check_band(key.band)?;
        check_index("spinor channel", key.channel, self.mode.channels())?;

        let field = (key.point * self.dims.bands + key.band) * self.mode.channels() + key.channel;
        Ok(field * self.dims.grid_points)
    }
}

impl WavefunctionSource for DumpSource {
    fn read_raw(&self, key: WfcKey) -> Result<Vec<Complex64>> {
        let start = self.offset(key)?;
        Ok(self.values[start..start + self.dims.grid_points].to_vec())
    }

    fn raw_value(&self, key: WfcKey, index: usize) -> Result<Complex64> {
        check_index("grid point", index, self.dims.grid_points)?;
        Ok(self.values[self.offset(key)? + index])
    }
}

//=================================================================

/// Parse every value of a dump, in order.
pub fn parse_values(text: &str) -> Result<Vec<Complex64>> {
    text.lines().enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|&(_, line)| !(line.is_empty() || line.starts_with('#')))
        .map(|(line_number, line)| match complex(line.as_bytes()) {
            IResult::Done(_, z) => Ok(z),
            _ => Err(Error::Malformed {
                what: "wavefunction dump".to_string(),
                message: format!("line {}: expected a value like '(1.0, -2.0)', found {:?}", line_number, line),
            }),
        })
        .collect()
}

fn is_blank(c: u8) -> bool
{ c == b' ' || c == b'\t' }

fn is_number_byte(c: u8) -> bool
{ c.is_ascii_digit() || b"+-.eEdD".contains(&c) }

// Fortran may write double precision exponents with a 'D'.
fn parse_fortran_float(s: &str) -> std::result::Result<f64, std::num::ParseFloatError>
{ s.replace(&['d', 'D'][..], "e").parse() }

named!(blanks<&[u8]>, take_while!(is_blank));

named!{number<f64>,
    map_res!(
        map_res!(take_while1!(is_number_byte), std::str::from_utf8),
        parse_fortran_float
    )
}

named!{complex<Complex64>,
    do_parse!(
        tag!("(")
        >> blanks >> re: number >> blanks
        >> tag!(",")
        >> blanks >> im: number >> blanks
        >> tag!(")")
        >> eof!()
        >> (Complex64::new(re, im))
    )
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 { Complex64::new(re, im) }

    #[test]
    fn fortran_formatting() {
        let text = "\
# name: psi
(  0.1234E-01, -0.5678E+00)
(-1.5,2)

( 1.0D+00 ,  -2.5d-1 )
\t(0.0,0.0)
";
        let values = parse_values(text).unwrap();
        assert_eq!(values, vec![
            c(0.1234e-01, -0.5678),
            c(-1.5, 2.0),
            c(1.0, -0.25),
            c(0.0, 0.0),
        ]);
    }

    #[test]
    fn bad_line_is_reported() {
        let err = parse_values("(1.0, 2.0)\n(1.0; 2.0)\n").unwrap_err();
        match err {
            Error::Malformed { message, .. } => assert!(message.starts_with("line 2:"), "{}", message),
            e => panic!("unexpected error: {}", e),
        }
        assert!(parse_values("(1.0, 2.0) trailing").is_err());
        assert!(parse_values("(1.0, x)").is_err());
    }

    #[test]
    fn layout() {
        let dims = Dims { points: 2, directions: 2, bands: 3, grid_points: 2 };
        let values = (0..24).map(|k| c(k as f64, 0.0)).collect();
        let source = DumpSource::from_values(values, dims, SpinorMode::TwoChannel).unwrap();

        // point 1, band 2, channel 0 is field number (1 * 3 + 2) * 2 + 0 = 10
        assert_eq!(source.read_raw(WfcKey::new(1, 2, 0)).unwrap(), vec![c(20.0, 0.0), c(21.0, 0.0)]);
        assert_eq!(source.read_raw(WfcKey::new(0, 0, 1)).unwrap(), vec![c(2.0, 0.0), c(3.0, 0.0)]);
        assert_eq!(source.raw_value(WfcKey::new(1, 2, 1), 1).unwrap(), c(23.0, 0.0));

        assert!(source.read_raw(WfcKey::new(2, 0, 0)).is_err());
        assert!(source.read_raw(WfcKey::new(0, 0, 2)).is_err());
        assert!(source.raw_value(WfcKey::new(0, 0, 0), 2).is_err());
    }

    #[test]
    fn length_is_checked() {
        let dims = Dims { points: 1, directions: 2, bands: 2, grid_points: 3 };
        let text = "(1.0, 0.0)\n".repeat(5);
        match DumpSource::parse(&text, dims, SpinorMode::Single).unwrap_err() {
            Error::DimensionMismatch { expected: 6, actual: 5, .. } => {},
            e => panic!("unexpected error: {}", e),
        }
    }
}
