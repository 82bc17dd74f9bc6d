use core::fmt;

const SIGN_BIT: u32 = 1 << 31;
const SCALE_SHIFT: u32 = 16;
const SCALE_MASK: u32 = 0xFF << SCALE_SHIFT;

/// Largest scale (digits after the decimal point).
pub const MAX_SCALE: u32 = 28;

/// Largest magnitude of the 96-bit mantissa.
pub const MAX_MANTISSA: i128 = (1 << 96) - 1;

/// 128-bit decimal floating point: a 96-bit unsigned mantissa, a sign and a
/// power-of-ten scale in `0..=28`.
///
/// Stored as `flags, hi, lo` so the raw 16 bytes can live in a constant pool
/// or span operand stack words like any other primitive.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Decimal {
    flags: u32,
    hi: u32,
    lo: u64,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        flags: 0,
        hi: 0,
        lo: 0,
    };

    pub const ONE: Decimal = Decimal {
        flags: 0,
        hi: 0,
        lo: 1,
    };

    /// Builds `mantissa * 10^-scale`. Returns `None` if the mantissa does not
    /// fit in 96 bits or the scale exceeds [`MAX_SCALE`].
    pub const fn new(mantissa: i128, scale: u32) -> Option<Self> {
        if scale > MAX_SCALE || mantissa.unsigned_abs() > MAX_MANTISSA as u128 {
            return None;
        }
        let magnitude = mantissa.unsigned_abs();
        let mut flags = scale << SCALE_SHIFT;
        if mantissa < 0 {
            flags |= SIGN_BIT;
        }
        Some(Self {
            flags,
            hi: (magnitude >> 64) as u32,
            lo: magnitude as u64,
        })
    }

    /// Signed mantissa.
    pub const fn mantissa(&self) -> i128 {
        let magnitude = ((self.hi as i128) << 64) | self.lo as i128;
        if self.flags & SIGN_BIT != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Power-of-ten scale. Garbage scale bits are clamped.
    pub const fn scale(&self) -> u32 {
        let scale = (self.flags & SCALE_MASK) >> SCALE_SHIFT;
        if scale > MAX_SCALE { MAX_SCALE } else { scale }
    }

    pub const fn is_negative(&self) -> bool {
        self.flags & SIGN_BIT != 0 && self.mantissa() != 0
    }

    /// Strips trailing zeros from the mantissa.
    pub fn normalize(self) -> Self {
        let mut mantissa = self.mantissa();
        let mut scale = self.scale();
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self::from_valid(mantissa, scale)
    }

    /// Adds two decimals, rounding away excess scale when the exact sum does
    /// not fit. Returns `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let (mut a, mut a_scale) = (self.mantissa(), self.scale());
        let (mut b, mut b_scale) = (rhs.mantissa(), rhs.scale());

        raise_scale(&mut a, &mut a_scale, b_scale);
        raise_scale(&mut b, &mut b_scale, a_scale);

        // the operand that could not be raised forces the other one down
        while a_scale > b_scale {
            a = div_round(a);
            a_scale -= 1;
        }
        while b_scale > a_scale {
            b = div_round(b);
            b_scale -= 1;
        }

        let mut sum = a + b;
        let mut scale = a_scale;
        while sum.unsigned_abs() > MAX_MANTISSA as u128 && scale > 0 {
            sum = div_round(sum);
            scale -= 1;
        }
        Self::new(sum, scale)
    }

    fn from_valid(mantissa: i128, scale: u32) -> Self {
        match Self::new(mantissa, scale) {
            Some(value) => value,
            None => unreachable!("mantissa and scale were taken from a valid decimal"),
        }
    }
}

fn raise_scale(mantissa: &mut i128, scale: &mut u32, target: u32) {
    while *scale < target {
        match mantissa.checked_mul(10) {
            Some(raised) if raised.unsigned_abs() <= MAX_MANTISSA as u128 => {
                *mantissa = raised;
                *scale += 1;
            }
            _ => break,
        }
    }
}

/// Divides by ten, rounding half to even.
fn div_round(value: i128) -> i128 {
    let quotient = value / 10;
    let remainder = (value % 10).abs();
    if remainder > 5 || (remainder == 5 && quotient % 2 != 0) {
        quotient + value.signum()
    } else {
        quotient
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let a = self.normalize();
        let b = other.normalize();
        a.mantissa() == b.mantissa() && a.scale() == b.scale()
    }
}

impl Eq for Decimal {}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_valid(value as i128, 0)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Self::from(value as i64)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::from_valid(value as i128, 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.scale() as usize;
        let digits = self.mantissa().unsigned_abs().to_string();
        let digits = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
        } else {
            digits
        };
        if self.is_negative() {
            f.write_str("-")?;
        }
        let (int, frac) = digits.split_at(digits.len() - scale);
        if frac.is_empty() {
            f.write_str(int)
        } else {
            write!(f, "{int}.{frac}")
        }
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}
