//! # Domain Models
//!
//! An `Ad` is the root record of the board. Its comments live inside it and
//! are never stored or addressed on their own.
//! Ads are keyed by `AdId`, a time-derived identifier.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of an ad: microseconds since the Unix epoch at creation time,
/// bumped forward on collision.
///
/// Ordering is numeric, so ids of different digit lengths still sort by age.
/// Boards written by the older deployment keyed ads by seconds with a decimal
/// fraction (`"1697000000.123456"`); such ids keep that layout so `key()`
/// still names the record they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdId {
    micros: u64,
    layout: KeyLayout,
}

/// How an id is spelled as a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum KeyLayout {
    /// `"1697000000123456"`
    Micros,
    /// `"1697000000.123456"`: shortest fraction, `".0"` for whole seconds.
    Seconds,
}

const MICROS_PER_SECOND: u64 = 1_000_000;

impl AdId {
    pub const fn from_micros(micros: u64) -> Self {
        Self {
            micros,
            layout: KeyLayout::Micros,
        }
    }

    pub const fn as_micros(self) -> u64 {
        self.micros
    }

    /// Candidate id for an instant. Instants before the epoch map to zero.
    pub fn from_time<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self::from_micros(u64::try_from(at.timestamp_micros()).unwrap_or(0))
    }

    /// The next candidate after a collision, or `None` once the id space is exhausted.
    pub fn successor(self) -> Option<Self> {
        self.micros.checked_add(1).map(|micros| Self { micros, ..self })
    }

    /// True for ids keyed in the seconds-with-fraction layout.
    pub fn is_legacy(self) -> bool {
        self.layout == KeyLayout::Seconds
    }

    /// The store key this ad lives under.
    pub fn key(self) -> String {
        match self.layout {
            KeyLayout::Micros => self.micros.to_string(),
            KeyLayout::Seconds => {
                let secs = self.micros / MICROS_PER_SECOND;
                let frac = self.micros % MICROS_PER_SECOND;
                if frac == 0 {
                    format!("{secs}.0")
                } else {
                    let digits = format!("{frac:06}");
                    format!("{secs}.{}", digits.trim_end_matches('0'))
                }
            }
        }
    }
}

impl fmt::Display for AdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A store key or URL segment that is not the canonical form of an `AdId`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an ad id: {0:?}")]
pub struct ParseAdIdError(pub String);

impl FromStr for AdId {
    type Err = ParseAdIdError;

    /// Only canonical strings parse, so `id.key()` always gives back the exact
    /// key the id was read from ("007", "+7" and "12.50" are rejected).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.split_once('.') {
            None => parse_whole(s).map(Self::from_micros),
            Some((secs, frac)) => parse_seconds(secs, frac).map(|micros| Self {
                micros,
                layout: KeyLayout::Seconds,
            }),
        };
        parsed.ok_or_else(|| ParseAdIdError(s.to_string()))
    }
}

/// Decimal digits without sign or leading zeros.
fn parse_whole(s: &str) -> Option<u64> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if !canonical {
        return None;
    }
    s.parse().ok()
}

/// `secs.frac` with 1 to 6 fraction digits and no trailing zero, except `.0`.
fn parse_seconds(secs: &str, frac: &str) -> Option<u64> {
    let secs = parse_whole(secs)?;
    let canonical = (1..=6).contains(&frac.len())
        && frac.bytes().all(|b| b.is_ascii_digit())
        && (frac == "0" || !frac.ends_with('0'));
    if !canonical {
        return None;
    }
    let frac: u64 = format!("{frac:0<6}").parse().ok()?;
    secs.checked_mul(MICROS_PER_SECOND)?.checked_add(frac)
}

/// A classified ad. Everything except `comments` is fixed once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ad {
    pub author: String,
    #[serde(rename = "theme")]
    pub title: String,
    pub text: String,
    #[serde(rename = "date", with = "crate::codec::board_date")]
    pub created_at: NaiveDateTime,
    /// Append-only, oldest first.
    pub comments: Vec<Comment>,
}

impl Ad {
    pub fn new(author: &str, title: &str, text: &str, created_at: NaiveDateTime) -> Self {
        Self {
            author: author.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            created_at,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    #[serde(rename = "date", with = "crate::codec::board_date")]
    pub created_at: NaiveDateTime,
}

impl Comment {
    pub fn new(author: &str, text: &str, created_at: NaiveDateTime) -> Self {
        Self {
            author: author.to_string(),
            text: text.to_string(),
            created_at,
        }
    }
}

/// A stored entry that could not be turned into an ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRecord {
    pub key: String,
    pub reason: String,
}

/// One pass over the whole board, newest ad first.
///
/// Records that failed to decode are reported in `corrupt` rather than
/// failing the listing.
#[derive(Debug, Default)]
pub struct AdListing {
    pub ads: Vec<(AdId, Ad)>,
    pub corrupt: Vec<CorruptRecord>,
}

impl AdListing {
    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }
}
