//! Additive and multiplicative correction operators.

use std::fmt;
use std::str::FromStr;

use crate::error::GroupError;

/// How an adjustment factor combines with the value it corrects.
///
/// Multiplicative corrections with a zero denominator produce NaN or
/// infinities; they are propagated, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    /// `base + factor`; identity factor 0.
    #[default]
    Additive,
    /// `base * factor`; identity factor 1.
    Multiplicative,
}

impl Kind {
    /// `base + factor` or `base * factor`.
    #[inline]
    pub fn apply(self, base: f64, factor: f64) -> f64 {
        match self {
            Kind::Additive => base + factor,
            Kind::Multiplicative => base * factor,
        }
    }

    /// `-value` or `1 / value`.
    #[inline]
    pub fn invert(self, value: f64) -> f64 {
        match self {
            Kind::Additive => -value,
            Kind::Multiplicative => 1.0 / value,
        }
    }

    /// Factor that moves `source` onto `target`: `target - source` or
    /// `target / source`.
    #[inline]
    pub fn get(self, source: f64, target: f64) -> f64 {
        match self {
            Kind::Additive => target - source,
            Kind::Multiplicative => target / source,
        }
    }

    /// The factor that leaves values unchanged.
    pub fn identity(self) -> f64 {
        match self {
            Kind::Additive => 0.0,
            Kind::Multiplicative => 1.0,
        }
    }

    /// Operator symbol, `+` or `*`.
    pub fn symbol(self) -> &'static str {
        match self {
            Kind::Additive => "+",
            Kind::Multiplicative => "*",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Kind {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "+" | "add" | "additive" => Ok(Kind::Additive),
            "*" | "mul" | "multiplicative" => Ok(Kind::Multiplicative),
            other => Err(GroupError::UnknownKind {
                name: other.to_string(),
            }),
        }
    }
}

/// Element-wise [`Kind::apply`] over two equally long slices.
pub fn apply_correction(base: &[f64], factor: &[f64], kind: Kind) -> Vec<f64> {
    base.iter()
        .zip(factor.iter())
        .map(|(&b, &f)| kind.apply(b, f))
        .collect()
}

/// Element-wise [`Kind::invert`].
pub fn invert(values: &[f64], kind: Kind) -> Vec<f64> {
    values.iter().map(|&v| kind.invert(v)).collect()
}

/// Element-wise [`Kind::get`].
pub fn get_correction(source: &[f64], target: &[f64], kind: Kind) -> Vec<f64> {
    source
        .iter()
        .zip(target.iter())
        .map(|(&s, &t)| kind.get(s, t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn apply_and_get() {
        assert_eq!(Kind::Additive.apply(2.0, 3.0), 5.0);
        assert_eq!(Kind::Multiplicative.apply(2.0, 3.0), 6.0);
        assert_eq!(Kind::Additive.get(2.0, 5.0), 3.0);
        assert_eq!(Kind::Multiplicative.get(2.0, 4.0), 2.0);
    }

    #[test]
    fn inverse_round_trip() {
        for kind in [Kind::Additive, Kind::Multiplicative] {
            for (x, f) in [(1.5, 0.3), (-4.0, 2.5), (1e3, 1e-2)] {
                let y = kind.apply(x, f);
                assert_relative_eq!(kind.apply(y, kind.invert(f)), x, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn zero_denominator_propagates() {
        assert!(Kind::Multiplicative.get(0.0, 1.0).is_infinite());
        assert!(Kind::Multiplicative.get(0.0, 0.0).is_nan());
        assert!(Kind::Multiplicative.invert(0.0).is_infinite());
    }

    #[test]
    fn slice_helpers() {
        let f = get_correction(&[1.0, 2.0], &[2.0, 6.0], Kind::Multiplicative);
        assert_eq!(f, vec![2.0, 3.0]);
        assert_eq!(
            apply_correction(&[1.0, 2.0], &invert(&f, Kind::Multiplicative), Kind::Multiplicative),
            vec![0.5, 2.0 / 3.0]
        );
    }

    #[test]
    fn parse_kind() {
        assert_eq!("*".parse::<Kind>().unwrap(), Kind::Multiplicative);
        assert_eq!("additive".parse::<Kind>().unwrap(), Kind::Additive);
        assert!("/".parse::<Kind>().is_err());
    }
}
