//! Cache keys: ordered tuples of primitive segments that identify one
//! cached collection or entity snapshot.
//!
//! Key derivation must be a pure, deterministic function of its semantic
//! inputs. Calendar dates are canonicalized to `YYYY-MM-DD` before entering
//! a key, so time-of-day and timezone can never split one logical day
//! across two entries.

use std::fmt;

use jiff::civil::Date;

use crate::error::{Result, SyncError};

/// One element of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Str(String),
    Int(i64),
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Str(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Str(s)
    }
}

impl From<i64> for Segment {
    fn from(n: i64) -> Self {
        Segment::Int(n)
    }
}

impl From<Date> for Segment {
    fn from(d: Date) -> Self {
        Segment::Str(iso_date(d))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Str(s) => write!(f, "{}", s),
            Segment::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Ordered, finite sequence of segments identifying one cache entry.
///
/// Two keys are equal iff their sequences are element-wise equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<Segment>);

impl CacheKey {
    pub fn new(segments: Vec<Segment>) -> Self {
        CacheKey(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// Build a [`CacheKey`] from mixed string/integer/date parts.
///
/// ```
/// use plansync::cache_key;
///
/// let key = cache_key!["activity", "citizen", 12i64, "2024-10-01"];
/// assert_eq!(key.to_string(), "activity/citizen/12/2024-10-01");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($seg:expr),+ $(,)?) => {
        $crate::key::CacheKey::new(vec![$($crate::key::Segment::from($seg)),+])
    };
}

/// Canonical ISO rendering of a calendar date (`YYYY-MM-DD`).
pub fn iso_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())
}

/// Parse a canonical ISO calendar date.
///
/// Anything that is not a valid calendar date is a contract violation and
/// fails fast; it is never coerced or defaulted.
pub fn parse_iso_date(s: &str) -> Result<Date> {
    s.parse::<Date>()
        .map_err(|_| SyncError::InvalidDate(s.to_string()))
}
