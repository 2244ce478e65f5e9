//! 17.14 fixed-point arithmetic used by the MLFQS scheduler.
//!
//! A [`Fixed`] stores a real number `x` as the integer `x * 2^14`.
//! Mixed arithmetic with plain integers is provided through the
//! operator traits, so the decay formulas read the way they are written:
//!
//! ```ignore
//! let load = load * 59 / 60 + Fixed::from_int(ready) / 60;
//! ```

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Number of fractional bits.
const Q: u32 = 14;
/// Scaling factor, `1.0` in fixed point.
const F: i32 = 1 << Q;

/// A signed 17.14 fixed-point number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(F);

    /// Converts an integer to fixed point.
    pub const fn from_int(n: i32) -> Self {
        Fixed(n * F)
    }

    /// Builds a value from its raw representation.
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Converts to an integer, rounding toward zero.
    pub const fn trunc(self) -> i32 {
        self.0 / F
    }

    /// Converts to an integer, rounding to nearest (halves away from zero).
    pub const fn round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    /// `self * n` rounded to nearest, computed in 64 bits. The product may
    /// exceed the fixed-point range even when the integer result fits.
    pub fn scaled_round(self, n: i32) -> i32 {
        let x = i64::from(self.0) * i64::from(n);
        let (f, half) = (i64::from(F), i64::from(F / 2));
        let rounded = if x >= 0 { (x + half) / f } else { (x - half) / f };
        rounded as i32
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (int, frac) = (abs / F as u32, abs % F as u32);
        write!(f, "Fixed({sign}{int}.{:02})", frac * 100 / F as u32)
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;

    fn add(self, n: i32) -> Fixed {
        Fixed(self.0 + n * F)
    }
}

impl AddAssign<i32> for Fixed {
    fn add_assign(&mut self, n: i32) {
        *self = *self + n;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;

    fn sub(self, n: i32) -> Fixed {
        Fixed(self.0 - n * F)
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed((i64::from(self.0) * i64::from(rhs.0) / i64::from(F)) as i32)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;

    fn mul(self, n: i32) -> Fixed {
        Fixed(self.0 * n)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    fn div(self, rhs: Fixed) -> Fixed {
        Fixed((i64::from(self.0) * i64::from(F) / i64::from(rhs.0)) as i32)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;

    fn div(self, n: i32) -> Fixed {
        Fixed(self.0 / n)
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}
