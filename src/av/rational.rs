use std::fmt;

/// A rational number, used for time bases and aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Rational {
    /// `num/den`, not reduced.
    pub const fn new(num: i32, den: i32) -> Self {
        Rational { num, den }
    }

    /// `0/1`, the "unknown" aspect ratio.
    pub const fn zero() -> Self {
        Rational { num: 0, den: 1 }
    }

    /// Whether the numerator is zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// The value as a float; 0.0 when the denominator is zero.
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Rescales `value` from this time base to `to`, rounding half away from zero.
    pub fn rescale(&self, value: i64, to: Rational) -> i64 {
        let mut num = value as i128 * self.num as i128 * to.den as i128;
        let mut den = self.den as i128 * to.num as i128;
        if den == 0 {
            return 0;
        }
        if den < 0 {
            num = -num;
            den = -den;
        }
        let rounded = if num >= 0 {
            (num + den / 2) / den
        } else {
            -((-num + den / 2) / den)
        };
        rounded as i64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::zero()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
