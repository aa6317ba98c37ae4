use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::Error;

/// Fixed-point currency amount stored in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const SCALE: i64 = 100; // 2 decimal places
    pub const TARGET_DECIMALS: u32 = 2;

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn from_major(major: i64) -> Option<Self> {
        major.checked_mul(Self::SCALE).map(Self)
    }

    pub fn as_minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        match self.checked_sub(other) {
            Some(v) if v.0 >= 0 => v,
            _ => Self::zero(),
        }
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::TARGET_DECIMALS)
    }

    /// Rounds half away from zero to cents.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        let rounded =
            value.round_dp_with_strategy(Self::TARGET_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_i64()
            .map(Self)
    }

    pub fn from_scaled_i128(value: i128, scale: u32) -> Option<Self> {
        if scale == Self::TARGET_DECIMALS {
            return i64::try_from(value).ok().map(Self);
        }
        if scale < Self::TARGET_DECIMALS {
            let factor = 10i128.checked_pow(Self::TARGET_DECIMALS - scale)?;
            let widened = value.checked_mul(factor)?;
            return i64::try_from(widened).ok().map(Self);
        }
        // scale > TARGET_DECIMALS: need rounding
        let factor = 10i128.checked_pow(scale - Self::TARGET_DECIMALS)?;
        let div = value / factor; // truncated toward zero
        let rem = value % factor;
        let mut adjusted = div;
        // tie -> half away from zero
        if rem.abs() * 2 >= factor {
            adjusted += if value.is_negative() { -1 } else { 1 };
        }
        i64::try_from(adjusted).ok().map(Self)
    }

    pub fn from_decimal_str(s: &str) -> Option<Self> {
        let s = s.trim();

        if s.is_empty() {
            return None;
        }
        let neg = s.starts_with('-');
        let body = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
        if !body.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }
        let mut parts = body.split('.');
        let int_part = parts.next()?;
        if int_part.is_empty() {
            return None;
        }
        let int_val: i128 = int_part.parse().ok()?;
        let frac_opt = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let (raw, scale) = match frac_opt {
            Some(frac) if !frac.is_empty() => {
                let scale = u32::try_from(frac.len()).ok()?;
                let widened = int_val.checked_mul(10i128.checked_pow(scale)?)?;
                (widened.checked_add(frac.parse::<i128>().ok()?)?, scale)
            }
            _ => (int_val, 0),
        };
        let signed = if neg { -raw } else { raw };
        Money::from_scaled_i128(signed, scale)
    }
}

impl core::str::FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_decimal_str(s)
            .ok_or_else(|| Error::InvalidAmount(format!("not a currency amount: {:?}", s)))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let minor = self.0;
        let sign = if minor < 0 { "-" } else { "" };
        let abs = minor.unsigned_abs();
        let scale = Self::SCALE.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / scale, abs % scale)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_decimal_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid Money format: {}", s)))
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Money;
    use rust_decimal::Decimal;

    #[test]
    fn round_half_away_from_zero() {
        let v = Money::from_scaled_i128(1_234, 3).unwrap(); // 1.234 -> 1.23
        assert_eq!(format!("{}", v), "1.23");
        let v = Money::from_scaled_i128(1_235, 3).unwrap(); // 1.235 -> 1.24
        assert_eq!(format!("{}", v), "1.24");
        let v = Money::from_scaled_i128(-1_235, 3).unwrap();
        assert_eq!(format!("{}", v), "-1.24");
        let v = Money::from_scaled_i128(-1_234, 3).unwrap();
        assert_eq!(format!("{}", v), "-1.23");
    }

    #[test]
    fn parses_plain_and_fractional_amounts() {
        assert_eq!(Money::from_decimal_str("100"), Some(Money::from_minor(10_000)));
        assert_eq!(Money::from_decimal_str(" 0.5 "), Some(Money::from_minor(50)));
        assert_eq!(Money::from_decimal_str("+12.345"), Some(Money::from_minor(1_235)));
        assert_eq!(Money::from_decimal_str("-3.10"), Some(Money::from_minor(-310)));
    }

    #[test]
    fn rejects_garbage_and_non_finite() {
        for bad in ["", "abc", "1.2.3", "NaN", "inf", "1e5", ".5", "--1"] {
            assert_eq!(Money::from_decimal_str(bad), None, "{bad}");
        }
        assert!("1e5".parse::<Money>().is_err());
    }

    #[test]
    fn decimal_conversion_rounds_to_cents() {
        let d = Decimal::new(3042194, 4); // 304.2194
        assert_eq!(Money::from_decimal(d), Some(Money::from_minor(30422)));
        assert_eq!(Money::from_minor(30422).to_decimal(), Decimal::new(30422, 2));
    }

    #[test]
    fn floor_subtraction_never_goes_negative() {
        let remaining = Money::from_minor(500);
        assert_eq!(remaining.saturating_sub_floor(Money::from_minor(200)), Money::from_minor(300));
        assert_eq!(remaining.saturating_sub_floor(Money::from_minor(900)), Money::zero());
    }
}
