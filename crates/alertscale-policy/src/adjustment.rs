//! Adjustment expressions: parsing, resolution, and bounding.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use alertscale_core::ConfigError;

static ADJUSTMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?([0-9]+)(%)?$").expect("adjustment pattern is a valid regex")
});

/// A parsed adjustment expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// `N`: set the size to exactly N.
    Exact(u64),
    /// `+N` / `-N`: add to the current desired size.
    Relative(i64),
    /// `N%`: grow by N percent of the current desired size.
    Percent(u64),
    /// `+N%` / `-N%`: grow or shrink by N percent of the current
    /// desired size.
    RelativePercent(i64),
}

impl FromStr for Adjustment {
    type Err = ConfigError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let caps = ADJUSTMENT_RE
            .captures(expr)
            .ok_or_else(|| ConfigError::InvalidAdjustment(expr.to_string()))?;

        // The grammar allows any number of digits. Magnitudes past the
        // integer range saturate; bounding clamps the result anyway.
        let magnitude: u64 = caps[2].parse().unwrap_or(u64::MAX);
        let percent = caps.get(3).is_some();

        let signed = |sign: &str| {
            let m = i64::try_from(magnitude).unwrap_or(i64::MAX);
            if sign == "-" { -m } else { m }
        };

        Ok(match (caps.get(1).map(|m| m.as_str()), percent) {
            (None, false) => Adjustment::Exact(magnitude),
            (None, true) => Adjustment::Percent(magnitude),
            (Some(sign), false) => Adjustment::Relative(signed(sign)),
            (Some(sign), true) => Adjustment::RelativePercent(signed(sign)),
        })
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::Exact(n) => write!(f, "{n}"),
            Adjustment::Relative(n) => write!(f, "{n:+}"),
            Adjustment::Percent(p) => write!(f, "{p}%"),
            Adjustment::RelativePercent(p) => write!(f, "{p:+}%"),
        }
    }
}

impl Adjustment {
    /// New size for a group currently at `desired`, before bounding.
    ///
    /// Percentage deltas round their magnitude up, so any non-zero
    /// percentage of a non-empty group moves it by at least one. Results
    /// outside the `i64` range saturate.
    pub fn apply(&self, desired: u32) -> i64 {
        let desired = i128::from(desired);
        let new_size = match *self {
            Adjustment::Exact(n) => i128::from(n),
            Adjustment::Relative(n) => desired + i128::from(n),
            Adjustment::Percent(p) => desired + percent_of(i128::from(p), desired),
            Adjustment::RelativePercent(p) => {
                let delta = percent_of(i128::from(p).abs(), desired);
                if p < 0 { desired - delta } else { desired + delta }
            }
        };
        new_size.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

/// ceil(pct / 100 × value) for non-negative inputs.
fn percent_of(pct: i128, value: i128) -> i128 {
    (pct * value + 99) / 100
}

/// Resolve an adjustment expression against the current desired size.
pub fn resolve(expr: &str, desired: u32) -> Result<i64, ConfigError> {
    Ok(expr.parse::<Adjustment>()?.apply(desired))
}

/// Clamp `new_size` into `[min, max]`.
///
/// If a provider reports `min > max`, `min` wins.
pub fn bound(new_size: i64, min: u32, max: u32) -> u32 {
    let clamped = new_size.min(i64::from(max)).max(i64::from(min));
    // Within [min, max(min, max)], so it fits in u32.
    clamped as u32
}
