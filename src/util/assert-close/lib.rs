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

//! Approximate equality assertions.
//!
//! ```
//! # #[macro_use] extern crate kdots_assert_close;
//! # use num_complex::Complex64;
//! # fn main() {
//! assert_close!(1.0, 1.0 + 1e-12);
//! assert_close!(abs=1e-10, vec![0.0, 1.0], vec![1e-12, 1.0]);
//! assert_close!(rel=1e-8, Complex64::new(0.0, 2.0), Complex64::new(1e-9, 2.0));
//! # }
//! ```
//!
//! Complex numbers are compared by the modulus of their difference, so
//! a tolerance means the same thing regardless of the phase of the values.

use failure::Fail;
use num_complex::Complex64;
use std::fmt;

pub const DEFAULT_NONZERO_TOL: f64 = 1e-9;

#[macro_export]
macro_rules! assert_close {
    ($($t:tt)*) => {
        $crate::assert_close_impl!{@parsing [$($t)*] [[@rel $crate::DEFAULT_NONZERO_TOL] [@abs 0.0]]}
    };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            $crate::assert_close!{$($t)*}
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! assert_close_impl {
    (@parsing [rel=$tol:expr, $($rest:tt)*] [$($assignment:tt)*]) => {
        $crate::assert_close_impl!(@parsing [$($rest)*] [$($assignment)* [@rel $tol]]);
    };
    (@parsing [abs=$tol:expr, $($rest:tt)*] [$($assignment:tt)*]) => {
        $crate::assert_close_impl!(@parsing [$($rest)*] [$($assignment)* [@abs $tol]]);
    };
    (@parsing [$a:expr, $b:expr $(,)*] $assignments:tt) => {
        $crate::assert_close_impl!(@expand $assignments [@comp $a, $b] [@fmt "not nearly equal!"])
    };
    (@parsing [$a:expr, $b:expr, $($fmt:tt)+] $assignments:tt) => {
        $crate::assert_close_impl!(@expand $assignments [@comp $a, $b] [@fmt $($fmt)+])
    };
    (@expand [$($assignment:tt)*] [@comp $a:expr, $b:expr] [@fmt $($fmt:tt)+] ) => {
        #[allow(unused_mut)]
        #[allow(unused_assignments)]
        {
            let a = $a;
            let b = $b;

            let mut abs;
            let mut rel;
            $(
                $crate::assert_close_impl!{@stmt::assign [abs, rel] $assignment}
            )*

            if let Err(e) = $crate::CheckClose::check_close(&a, &b, $crate::Tolerances { abs, rel }) {
                panic!(
                    "{} (tolerances: rel={}, abs={})\n left: {:?}\nright: {:?}\n{}",
                    format!($($fmt)*), rel, abs, a, b, e,
                );
            }
        }
    };
    (@stmt::assign [$abs:ident, $rel:ident] [@abs $tol:expr]) => { $abs = $tol; };
    (@stmt::assign [$abs:ident, $rel:ident] [@rel $tol:expr]) => { $rel = $tol; };
}

/// Closeness of two values whose difference has size `diff`, and whose
/// own sizes are `a` and `b`.
///
/// Same rule as Python 3.5's `math.isclose`.
fn is_close_by_size(diff: f64, a: f64, b: f64, Tolerances { abs, rel }: Tolerances) -> bool {
    assert!(rel >= 0.0);
    assert!(abs >= 0.0);
    diff < abs.max(rel * a).max(rel * b)
}

pub fn is_close(a: f64, b: f64, tol: Tolerances) -> bool {
    // infinities of same sign
    if a == b { return true; }
    // infinities of opposite sign would otherwise get infinite relative tolerance
    if a.is_infinite() || b.is_infinite() { return false; }

    // NaN falls through and compares false
    is_close_by_size((a - b).abs(), a.abs(), b.abs(), tol)
}

pub fn is_close_complex(a: Complex64, b: Complex64, tol: Tolerances) -> bool {
    if a == b { return true; }
    if !(a.is_finite() && b.is_finite()) { return false; }

    is_close_by_size((a - b).norm(), a.norm(), b.norm(), tol)
}

#[derive(Debug, Copy, Clone)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

#[derive(Debug)]
pub struct CheckCloseError<T = f64> {
    pub values: (T, T),
    /// Position of the offending element, for sequences.
    pub index: Option<usize>,
    pub tol: Tolerances,
}

impl<T: fmt::Debug + Send + Sync + 'static> Fail for CheckCloseError<T> {}

impl<T: fmt::Debug> fmt::Display for CheckCloseError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (ref left, ref right) = self.values;
        match self.index {
            Some(index) => writeln!(f, "failed at index {}:", index)?,
            None => writeln!(f, "failed at:")?,
        }
        write!(f, "  left: {:?}\n right: {:?}\n   tol: {:?}", left, right, self.tol)
    }
}

pub trait CheckClose<Rhs: ?Sized = Self> {
    type Scalar;

    /// Test that all values of self and other are close.
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>;
}

impl CheckClose for f64 {
    type Scalar = f64;

    #[inline]
    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<f64>> {
        match is_close(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { values: (*self, *other), index: None, tol }),
        }
    }
}

impl CheckClose for Complex64 {
    type Scalar = Complex64;

    #[inline]
    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Complex64>> {
        match is_close_complex(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { values: (*self, *other), index: None, tol }),
        }
    }
}

impl<'a, T: ?Sized + CheckClose> CheckClose for &'a T {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
    { CheckClose::check_close(*self, *other, tol) }
}

impl<T: CheckClose> CheckClose for [T] {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>> {
        assert_eq!(self.len(), other.len(), "length mismatch in check_close");
        for (index, (a, b)) in self.iter().zip(other).enumerate() {
            a.check_close(b, tol).map_err(|e| CheckCloseError {
                index: Some(e.index.unwrap_or(index)),
                ..e
            })?;
        }
        Ok(())
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
    { self[..].check_close(&other[..], tol) }
}

impl<T: CheckClose> CheckClose<[T]> for Vec<T> {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
    { self[..].check_close(other, tol) }
}

macro_rules! gen_array_impls {
    ($($n:tt)*) => {
        $(
        impl<T: CheckClose> CheckClose for [T; $n] {
            type Scalar = T::Scalar;

            fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
            { self[..].check_close(&other[..], tol) }
        }
        )*
    };
}

gen_array_impls! { 1 2 3 4 }
