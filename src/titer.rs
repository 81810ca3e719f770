use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChartError, Result};

// ---------------------------------------------------------------------------
// Titer – one dilution reading
// ---------------------------------------------------------------------------

/// A single dilution-series reading, stored as its short text token
/// (`"40"`, `"<10"`, `">1280"`, `"~80"`, `"*"`).
///
/// The variant is selected by the leading character; construction from
/// arbitrary text never fails — unrecognized tokens become [`Titer::Invalid`]
/// and their numeric accessors error explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Titer {
    /// Empty or unparseable token; carries the raw text for diagnostics.
    Invalid(String),
    /// `"*"` – no measurement for this cell.
    DontCare,
    /// Plain numeric reading, e.g. `"40"`.
    Regular(u32),
    /// Below the detection threshold, e.g. `"<10"`.
    LessThan(u32),
    /// Above the highest dilution tested, e.g. `">1280"`.
    MoreThan(u32),
    /// `"~"`-flagged suspicious reading; Regular-like unless explicitly
    /// treated otherwise.
    Dodgy(u32),
}

impl Titer {
    /// Parse a titer token. Never panics; unrecognized input → `Invalid`.
    pub fn new(source: &str) -> Self {
        let s = source.trim();
        match s.as_bytes().first() {
            None => Titer::Invalid(String::new()),
            Some(b'*') if s == "*" => Titer::DontCare,
            Some(b'<') => match s[1..].parse() {
                Ok(v) => Titer::LessThan(v),
                Err(_) => Titer::Invalid(s.to_string()),
            },
            Some(b'>') => match s[1..].parse() {
                Ok(v) => Titer::MoreThan(v),
                Err(_) => Titer::Invalid(s.to_string()),
            },
            Some(b'~') => match s[1..].parse() {
                Ok(v) => Titer::Dodgy(v),
                Err(_) => Titer::Invalid(s.to_string()),
            },
            Some(b'0'..=b'9') => match s.parse() {
                Ok(v) => Titer::Regular(v),
                Err(_) => Titer::Invalid(s.to_string()),
            },
            Some(_) => Titer::Invalid(s.to_string()),
        }
    }

    /// Inverse of [`Titer::logged`]: `round(2^logged * 10)`, stringified with
    /// an optional `<`/`>` prefix.
    pub fn from_logged(logged: f64, prefix: &str) -> Self {
        let value = (2f64.powf(logged) * 10.0).round() as u32;
        match prefix {
            "<" => Titer::LessThan(value),
            ">" => Titer::MoreThan(value),
            "~" => Titer::Dodgy(value),
            _ => Titer::Regular(value),
        }
    }

    pub fn is_dont_care(&self) -> bool {
        matches!(self, Titer::DontCare)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Titer::Invalid(_))
    }

    /// Regular or Dodgy: a definite, unthresholded reading.
    pub fn is_regular(&self) -> bool {
        matches!(self, Titer::Regular(_) | Titer::Dodgy(_))
    }

    pub fn is_thresholded(&self) -> bool {
        matches!(self, Titer::LessThan(_) | Titer::MoreThan(_))
    }

    /// The embedded integer. Errors for `Invalid` and `DontCare`.
    pub fn value(&self) -> Result<u32> {
        match self {
            Titer::Regular(v) | Titer::LessThan(v) | Titer::MoreThan(v) | Titer::Dodgy(v) => Ok(*v),
            _ => Err(ChartError::invalid_titer(self, "no numeric value")),
        }
    }

    /// log2(value / 10). Errors for `Invalid` and `DontCare`.
    pub fn logged(&self) -> Result<f64> {
        Ok((f64::from(self.value()?) / 10.0).log2())
    }

    /// `logged()` shifted to make thresholded readings comparable with
    /// regular ones: −1 for LessThan, +1 for MoreThan.
    pub fn logged_with_thresholded(&self) -> Result<f64> {
        match self {
            Titer::Regular(_) | Titer::Dodgy(_) => self.logged(),
            Titer::LessThan(_) => Ok(self.logged()? - 1.0),
            Titer::MoreThan(_) => Ok(self.logged()? + 1.0),
            _ => Err(ChartError::invalid_titer(self, "no numeric value")),
        }
    }

    /// The reading's contribution to a column basis: `logged()` for
    /// Regular/LessThan, `logged()+1` for MoreThan, −1 for DontCare and
    /// Dodgy (both excluded from bases). Errors only for `Invalid`.
    pub fn logged_for_column_bases(&self) -> Result<f64> {
        match self {
            Titer::Regular(_) | Titer::LessThan(_) => self.logged(),
            Titer::MoreThan(_) => Ok(self.logged()? + 1.0),
            Titer::DontCare | Titer::Dodgy(_) => Ok(-1.0),
            Titer::Invalid(_) => Err(ChartError::invalid_titer(self, "no numeric value")),
        }
    }

    /// Total-order key: LessThan sorts just below, MoreThan just above the
    /// embedded value; Invalid and DontCare sort first.
    pub fn value_for_sorting(&self) -> u32 {
        match self {
            Titer::Invalid(_) | Titer::DontCare => 0,
            Titer::Regular(v) | Titer::Dodgy(v) => *v,
            Titer::LessThan(v) => v.saturating_sub(1),
            Titer::MoreThan(v) => v.saturating_add(1),
        }
    }
}

impl Default for Titer {
    fn default() -> Self {
        Titer::DontCare
    }
}

impl From<&str> for Titer {
    fn from(s: &str) -> Self {
        Titer::new(s)
    }
}

impl From<String> for Titer {
    fn from(s: String) -> Self {
        Titer::new(&s)
    }
}

impl From<Titer> for String {
    fn from(t: Titer) -> Self {
        t.to_string()
    }
}

impl fmt::Display for Titer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Titer::Invalid(s) => write!(f, "{s}"),
            Titer::DontCare => write!(f, "*"),
            Titer::Regular(v) => write!(f, "{v}"),
            Titer::LessThan(v) => write!(f, "<{v}"),
            Titer::MoreThan(v) => write!(f, ">{v}"),
            Titer::Dodgy(v) => write!(f, "~{v}"),
        }
    }
}

// -- Ordering over value_for_sorting so Titer works as a BTree key --

impl PartialOrd for Titer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Titer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value_for_sorting()
            .cmp(&other.value_for_sorting())
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_from_leading_character() {
        assert_eq!(Titer::new("40"), Titer::Regular(40));
        assert_eq!(Titer::new("<10"), Titer::LessThan(10));
        assert_eq!(Titer::new(">1280"), Titer::MoreThan(1280));
        assert_eq!(Titer::new("~80"), Titer::Dodgy(80));
        assert_eq!(Titer::new("*"), Titer::DontCare);
        assert_eq!(Titer::new(""), Titer::Invalid(String::new()));
        assert_eq!(Titer::new("forty"), Titer::Invalid("forty".into()));
        assert_eq!(Titer::new("<x"), Titer::Invalid("<x".into()));
    }

    #[test]
    fn display_round_trips_the_token() {
        for tok in ["40", "<10", ">1280", "~80", "*"] {
            assert_eq!(Titer::new(tok).to_string(), tok);
        }
    }

    #[test]
    fn logged_values() {
        assert_eq!(Titer::new("10").logged().unwrap(), 0.0);
        assert_eq!(Titer::new("40").logged().unwrap(), 2.0);
        assert_eq!(Titer::new("1280").logged().unwrap(), 7.0);
        assert!(Titer::new("*").logged().is_err());
        assert!(Titer::new("").logged().is_err());
    }

    #[test]
    fn logged_with_thresholded_shifts() {
        assert_eq!(Titer::new("<10").logged_with_thresholded().unwrap(), -1.0);
        assert_eq!(Titer::new(">1280").logged_with_thresholded().unwrap(), 8.0);
        assert_eq!(Titer::new("~40").logged_with_thresholded().unwrap(), 2.0);
    }

    #[test]
    fn logged_for_column_bases_rules() {
        assert_eq!(Titer::new("40").logged_for_column_bases().unwrap(), 2.0);
        assert_eq!(Titer::new("<40").logged_for_column_bases().unwrap(), 2.0);
        assert_eq!(Titer::new(">1280").logged_for_column_bases().unwrap(), 8.0);
        assert_eq!(Titer::new("*").logged_for_column_bases().unwrap(), -1.0);
        assert_eq!(Titer::new("~640").logged_for_column_bases().unwrap(), -1.0);
        assert!(Titer::new("bad").logged_for_column_bases().is_err());
    }

    #[test]
    fn sorting_orders_thresholds_around_value() {
        assert!(Titer::new("<40").value_for_sorting() < Titer::new("40").value_for_sorting());
        assert!(Titer::new(">40").value_for_sorting() > Titer::new("40").value_for_sorting());
        assert!(Titer::new("<40") < Titer::new("40"));
        assert!(Titer::new("40") < Titer::new(">40"));
    }

    #[test]
    fn sorting_saturates_at_the_value_bounds() {
        assert_eq!(Titer::MoreThan(u32::MAX).value_for_sorting(), u32::MAX);
        assert_eq!(Titer::LessThan(0).value_for_sorting(), 0);
    }

    #[test]
    fn from_logged_round_trip() {
        for tok in ["10", "20", "40", "80", "160", "2560", "<10", ">1280"] {
            let t = Titer::new(tok);
            let prefix = match &t {
                Titer::LessThan(_) => "<",
                Titer::MoreThan(_) => ">",
                _ => "",
            };
            let back = Titer::from_logged(t.logged().unwrap(), prefix);
            assert_eq!(back.value_for_sorting(), t.value_for_sorting(), "{tok}");
        }
    }

    #[test]
    fn from_logged_rounds_to_nearest() {
        // 2^2.5 * 10 = 56.57 → 57
        assert_eq!(Titer::from_logged(2.5, ""), Titer::Regular(57));
        assert_eq!(Titer::from_logged(0.0, "<"), Titer::LessThan(10));
    }
}
