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

//! Reading and writing `.npy` files.
//!
//! Make no mistake; this makes no attempt to implement the whole format, which
//! allows the header to be any python literal that `numpy.dtype()` accepts.
//! Only little-endian, C-ordered arrays of the element types in this module are
//! understood. That is exactly what kdots writes, and exactly what numpy writes
//! for the same arrays; anything else is rejected rather than misread.

// The expansion of do_parse! leaves unnecessary parentheses around an output
// expression that isn't a tuple of 2 or more elements.
#![allow(unused_parens)]

#[macro_use]
extern crate nom;

use nom::{IResult, digit, le_u8, le_u16, le_u32};
use num_complex::Complex64;
use std::io::{Read, Write};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o error while transferring npy data")]
    Io(#[from] std::io::Error),

    #[error("not an npy file (bad magic string)")]
    BadMagic,

    #[error("unsupported npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("could not understand npy header: {0:?}")]
    BadHeader(String),

    #[error("expected dtype '{expected}', found '{found}'")]
    WrongDtype { expected: &'static str, found: String },

    #[error("npy payload has {actual} bytes, but shape {shape:?} requires {expected}")]
    WrongPayload { shape: Vec<usize>, expected: usize, actual: usize },

    #[error("got {actual} elements for shape {shape:?}, which holds {expected}")]
    ShapeMismatch { shape: Vec<usize>, expected: usize, actual: usize },
}

const MAGIC: &[u8] = b"\x93NUMPY";

/// Scalar types that can be stored in an npy file.
///
/// Every supported type is made of 8-byte words, which is what lets the
/// payload go through a single `u64` conversion.
pub trait Element: Copy {
    /// The `descr` field of the header.
    const DESCR: &'static str;
    /// Number of `u64` words per element.
    const WORDS: usize;

    fn push_words(&self, out: &mut Vec<u64>);
    fn from_words(words: &[u64]) -> Self;
}

impl Element for f64 {
    const DESCR: &'static str = "<f8";
    const WORDS: usize = 1;

    fn push_words(&self, out: &mut Vec<u64>) { out.push(self.to_bits()) }
    fn from_words(words: &[u64]) -> Self { f64::from_bits(words[0]) }
}

impl Element for i64 {
    const DESCR: &'static str = "<i8";
    const WORDS: usize = 1;

    fn push_words(&self, out: &mut Vec<u64>) { out.push(*self as u64) }
    fn from_words(words: &[u64]) -> Self { words[0] as i64 }
}

impl Element for Complex64 {
    const DESCR: &'static str = "<c16";
    const WORDS: usize = 2;

    fn push_words(&self, out: &mut Vec<u64>) {
        out.push(self.re.to_bits());
        out.push(self.im.to_bits());
    }

    fn from_words(words: &[u64]) -> Self {
        Complex64::new(f64::from_bits(words[0]), f64::from_bits(words[1]))
    }
}

/// A dense, C-ordered array as read from an npy file.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> NpyArray<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        check_shape(&shape, data.len())?;
        Ok(NpyArray { shape, data })
    }

    /// Fail unless the array has the given number of axes.
    pub fn expect_ndim(&self, ndim: usize) -> Result<&[usize]> {
        match self.shape.len() == ndim {
            true => Ok(&self.shape),
            false => Err(Error::BadHeader(format!("expected {} axes, got shape {:?}", ndim, self.shape))),
        }
    }
}

fn check_shape(shape: &[usize], len: usize) -> Result<()> {
    let expected = shape.iter().product::<usize>();
    if expected != len {
        return Err(Error::ShapeMismatch { shape: shape.to_vec(), expected, actual: len });
    }
    Ok(())
}

//-----------------------------------------------------------------------------

/// Write a C-ordered array.
pub fn write<T: Element>(mut w: impl Write, shape: &[usize], data: &[T]) -> Result<()> {
    check_shape(shape, data.len())?;

    w.write_all(&encode_preamble(T::DESCR, shape))?;

    let mut words = Vec::with_capacity(data.len() * T::WORDS);
    for x in data {
        x.push_words(&mut words);
    }
    let mut bytes = vec![0u8; words.len() * 8];
    byte_tools::write_u64v_le(&mut bytes, &words);
    w.write_all(&bytes)?;
    w.flush()?;
    Ok(())
}

fn header_dict(descr: &str, shape: &[usize]) -> String {
    let shape = match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => {
            let dims: Vec<_> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        },
    };
    format!("{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}", descr, shape)
}

// Magic string, version, header length, and the header padded so that the
// payload begins on a 64-byte boundary (as numpy does).
fn encode_preamble(descr: &str, shape: &[usize]) -> Vec<u8> {
    let mut header = header_dict(descr, shape);

    let (major, len_size) = match header.len() + 64 < usize::from(u16::max_value()) {
        true => (1u8, 2),
        false => (2u8, 4),
    };
    let unpadded = MAGIC.len() + 2 + len_size + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[major, 0]);
    match major {
        1 => out.extend_from_slice(&(header.len() as u16).to_le_bytes()),
        _ => out.extend_from_slice(&(header.len() as u32).to_le_bytes()),
    }
    out.extend_from_slice(header.as_bytes());
    out
}

//-----------------------------------------------------------------------------

/// Read a C-ordered array of the given element type.
pub fn read<T: Element>(mut r: impl Read) -> Result<NpyArray<T>> {
    let bytes = {
        let mut bytes = vec![];
        r.read_to_end(&mut bytes)?;
        bytes
    };

    let (rest, (major, minor)) = match magic(&bytes) {
        IResult::Done(rest, version) => (rest, version),
        _ => return Err(Error::BadMagic),
    };

    let header_len = match (major, minor) {
        (1, 0) => header_len_v1(rest),
        (2, 0) | (3, 0) => header_len_v2(rest),
        _ => return Err(Error::UnsupportedVersion(major, minor)),
    };
    let (rest, header_len) = match header_len {
        IResult::Done(rest, len) if len <= rest.len() => (rest, len),
        _ => return Err(Error::BadHeader("truncated preamble".to_string())),
    };
    let (header, payload) = rest.split_at(header_len);

    let (descr, shape) = match dict(header) {
        IResult::Done(_, parsed) => parsed,
        _ => return Err(Error::BadHeader(String::from_utf8_lossy(header).into_owned())),
    };
    if descr != T::DESCR {
        return Err(Error::WrongDtype { expected: T::DESCR, found: descr });
    }

    let count = shape.iter().product::<usize>();
    let expected = count * T::WORDS * 8;
    if payload.len() != expected {
        return Err(Error::WrongPayload { shape, expected, actual: payload.len() });
    }

    let mut words = vec![0u64; count * T::WORDS];
    byte_tools::read_u64v_le(&mut words, payload);
    let data = words.chunks(T::WORDS).map(T::from_words).collect();
    Ok(NpyArray { shape, data })
}

named!{magic<(u8, u8)>,
    do_parse!(
        tag!(MAGIC)
        >> major: le_u8
        >> minor: le_u8
        >> ((major, minor))
    )
}

named!(header_len_v1<usize>, map!(le_u16, |n: u16| n as usize));
named!(header_len_v2<usize>, map!(le_u32, |n: u32| n as usize));

named!(digits<&str>, map_res!(digit, std::str::from_utf8));
named!(integer<usize>, map_res!(digits, str::parse::<usize>));

// "3, " or "3," or "3"
named!{shape_entry<usize>,
    do_parse!(
        n: integer
        >> opt!(tag!(","))
        >> opt!(tag!(" "))
        >> (n)
    )
}

named!{dict<(String, Vec<usize>)>,
    do_parse!(
        tag!("{'descr': '")
        >> descr: map_res!(take_until!("'"), std::str::from_utf8)
        >> tag!("', 'fortran_order': False, 'shape': (")
        >> shape: many0!(shape_entry)
        >> tag!(")")
        >> is_a!(",} \t\r\n")
        >> eof!()
        >> ((descr.to_string(), shape))
    )
}

#[cfg(test)]
#[deny(unused)]
mod tests {
    use super::*;

    // What `numpy.save` produces for `np.array([1.0, 2.0])`.
    fn numpy_f8_pair() -> Vec<u8> {
        let mut bytes = b"\x93NUMPY\x01\x00\x76\x00".to_vec();
        bytes.extend_from_slice(b"{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }");
        bytes.extend(std::iter::repeat(b' ').take(60));
        bytes.push(b'\n');
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        bytes.extend_from_slice(&2.0f64.to_le_bytes());
        bytes
    }

    #[test]
    fn matches_numpy_bytes() {
        let mut written = Vec::<u8>::new();
        write(&mut written, &[2], &[1.0f64, 2.0]).unwrap();
        assert_eq!(written, numpy_f8_pair());
    }

    #[test]
    fn reads_numpy_bytes() {
        let array = read::<f64>(&numpy_f8_pair()[..]).unwrap();
        assert_eq!(array.shape, vec![2]);
        assert_eq!(array.data, vec![1.0, 2.0]);
    }

    #[test]
    fn payload_is_aligned() {
        for shape in vec![vec![], vec![7], vec![2, 3], vec![10, 6, 4, 4]] {
            let preamble = encode_preamble(Complex64::DESCR, &shape);
            assert_eq!(preamble.len() % 64, 0, "{:?}", shape);
            assert_eq!(preamble.last(), Some(&b'\n'));
        }
    }

    #[test]
    fn complex_tensor() {
        let shape = [2, 2, 1, 3];
        let data: Vec<_> = (0..12).map(|k| Complex64::new(k as f64, -0.5 * k as f64)).collect();

        let mut bytes = Vec::<u8>::new();
        write(&mut bytes, &shape, &data).unwrap();
        let array = read::<Complex64>(&bytes[..]).unwrap();
        assert_eq!(array.shape, shape.to_vec());
        assert_eq!(array.data, data);
    }

    #[test]
    fn integer_table_with_sentinel() {
        let mut bytes = Vec::<u8>::new();
        write(&mut bytes, &[2, 2], &[1i64, -1, 0, -1]).unwrap();
        let array = read::<i64>(&bytes[..]).unwrap();
        assert_eq!(array.expect_ndim(2).unwrap(), &[2, 2]);
        assert_eq!(array.data, vec![1, -1, 0, -1]);
    }

    #[test]
    fn scalar_shape() {
        let mut bytes = Vec::<u8>::new();
        write(&mut bytes, &[], &[3.5f64]).unwrap();
        let array = read::<f64>(&bytes[..]).unwrap();
        assert_eq!(array.shape, Vec::<usize>::new());
        assert_eq!(array.data, vec![3.5]);
    }

    #[test]
    fn wrong_dtype() {
        match read::<Complex64>(&numpy_f8_pair()[..]) {
            Err(Error::WrongDtype { found, .. }) => assert_eq!(found, "<f8"),
            r => panic!("unexpected: {:?}", r),
        }
    }

    #[test]
    fn truncated_payload() {
        let mut bytes = numpy_f8_pair();
        bytes.pop();
        match read::<f64>(&bytes[..]) {
            Err(Error::WrongPayload { expected: 16, actual: 15, .. }) => {},
            r => panic!("unexpected: {:?}", r),
        }
    }

    #[test]
    fn not_npy() {
        match read::<f64>(&b"PK\x03\x04 this is a zip"[..]) {
            Err(Error::BadMagic) => {},
            r => panic!("unexpected: {:?}", r),
        }
    }

    #[test]
    fn shape_mismatch_on_write() {
        match write(Vec::<u8>::new(), &[3], &[1.0f64, 2.0]) {
            Err(Error::ShapeMismatch { expected: 3, actual: 2, .. }) => {},
            r => panic!("unexpected: {:?}", r),
        }
    }
}
