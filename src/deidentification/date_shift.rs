//! Format-preserving date shifting
//!
//! Numeric dates are parsed in a fixed order:
//!
//! 1. Year first (`YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`), never ambiguous.
//! 2. The preferred day/month order of the primary country.
//! 3. The other order, when the preferred one is not a valid calendar date
//!    (a component above 12 cannot be a month).
//!
//! The shifted date is rendered with the same separator, component order,
//! zero-padding and year width. Anything else is a [`DeidError::Parse`] and
//! the caller substitutes a placeholder.

use crate::domain::{ComponentOrder, DeidError, Result};
use chrono::{Datelike, Days, NaiveDate};
use rand::Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Component layout of a numeric date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    YearMonthDay,
    DayMonthYear,
    MonthDayYear,
}

/// Textual format of a parsed date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    pub layout: DateLayout,
    pub separator: char,
    /// Digits written for each component, in textual order
    pub widths: [usize; 3],
}

impl DateFormat {
    fn render(&self, date: NaiveDate) -> String {
        let year_width = match self.layout {
            DateLayout::YearMonthDay => self.widths[0],
            _ => self.widths[2],
        };
        let year = if year_width == 2 {
            format!("{:02}", date.year().rem_euclid(100))
        } else {
            format!("{:04}", date.year())
        };
        let pad = |value: u32, width: usize| format!("{value:0width$}");

        let parts = match self.layout {
            DateLayout::YearMonthDay => [
                year,
                pad(date.month(), self.widths[1]),
                pad(date.day(), self.widths[2]),
            ],
            DateLayout::DayMonthYear => [
                pad(date.day(), self.widths[0]),
                pad(date.month(), self.widths[1]),
                year,
            ],
            DateLayout::MonthDayYear => [
                pad(date.month(), self.widths[0]),
                pad(date.day(), self.widths[1]),
                year,
            ],
        };
        parts.join(&self.separator.to_string())
    }
}

/// Expand a two-digit year: 00-68 is 2000s, 69-99 is 1900s
fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    match digits.len() {
        4 => Some(value),
        2 if value <= 68 => Some(2000 + value),
        2 => Some(1900 + value),
        _ => None,
    }
}

/// Split a numeric date into three digit groups sharing one separator
fn split_components(text: &str) -> Option<(char, [&str; 3])> {
    let separator = text.chars().find(|c| !c.is_ascii_digit())?;
    if !matches!(separator, '/' | '-' | '.') {
        return None;
    }
    let mut parts = text.split(separator);
    let components = [parts.next()?, parts.next()?, parts.next()?];
    if parts.next().is_some()
        || components
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    Some((separator, components))
}

/// Parse a numeric date given the preferred day/month order
pub fn parse_date(text: &str, preferred: ComponentOrder) -> Result<(NaiveDate, DateFormat)> {
    let unparsed = || DeidError::Parse("unrecognized date format".to_string());
    let (separator, [a, b, c]) = split_components(text).ok_or_else(unparsed)?;
    let widths = [a.len(), b.len(), c.len()];
    let num = |s: &str| s.parse::<u32>().ok();

    // 1. year first
    if a.len() == 4 {
        if b.len() > 2 || c.len() > 2 {
            return Err(unparsed());
        }
        let date = NaiveDate::from_ymd_opt(
            expand_year(a).ok_or_else(unparsed)?,
            num(b).ok_or_else(unparsed)?,
            num(c).ok_or_else(unparsed)?,
        )
        .ok_or_else(|| DeidError::Parse("invalid calendar date".to_string()))?;
        return Ok((
            date,
            DateFormat {
                layout: DateLayout::YearMonthDay,
                separator,
                widths,
            },
        ));
    }

    if a.len() > 2 || b.len() > 2 {
        return Err(unparsed());
    }
    let year = expand_year(c).ok_or_else(unparsed)?;
    let (first, second) = (num(a).ok_or_else(unparsed)?, num(b).ok_or_else(unparsed)?);

    // 2. preferred order, 3. the other order
    let attempts = match preferred {
        ComponentOrder::DayFirst => [DateLayout::DayMonthYear, DateLayout::MonthDayYear],
        ComponentOrder::MonthFirst => [DateLayout::MonthDayYear, DateLayout::DayMonthYear],
    };
    for layout in attempts {
        let (month, day) = match layout {
            DateLayout::DayMonthYear => (second, first),
            _ => (first, second),
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Ok((
                date,
                DateFormat {
                    layout,
                    separator,
                    widths,
                },
            ));
        }
    }
    Err(DeidError::Parse("invalid calendar date".to_string()))
}

/// Draw a non-zero run offset in `[-range_days, range_days]`
pub fn draw_offset(range_days: u32) -> i64 {
    let range = i64::from(range_days.max(1));
    let mut rng = rand::thread_rng();
    let magnitude = rng.gen_range(1..=range);
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Shifts dates by one run-wide offset (or, without interval preservation,
/// by a deterministic per-date offset)
pub struct DateShifter {
    preferred: ComponentOrder,
    offset_days: i64,
    range_days: u32,
    preserve_intervals: bool,
    salt: Zeroizing<Vec<u8>>,
}

impl DateShifter {
    pub fn new(
        preferred: ComponentOrder,
        offset_days: i64,
        range_days: u32,
        preserve_intervals: bool,
        salt: Vec<u8>,
    ) -> Self {
        Self {
            preferred,
            offset_days,
            range_days,
            preserve_intervals,
            salt: Zeroizing::new(salt),
        }
    }

    pub fn preferred_order(&self) -> ComponentOrder {
        self.preferred
    }

    /// Offset applied to `date`
    pub fn offset_for(&self, date: NaiveDate) -> i64 {
        if self.preserve_intervals {
            return self.offset_days;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_slice());
        hasher.update(b"date-offset");
        hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);

        let range = u64::from(self.range_days.max(1));
        let n = u64::from_be_bytes(bytes) % (2 * range);
        if n < range {
            -((n + 1) as i64)
        } else {
            (n - range + 1) as i64
        }
    }

    /// Parse and shift a date, keeping its textual format
    pub fn shift(&self, text: &str) -> Result<String> {
        let (date, format) = parse_date(text, self.preferred)?;
        let offset = self.offset_for(date);
        let shifted = if offset >= 0 {
            date.checked_add_days(Days::new(offset.unsigned_abs()))
        } else {
            date.checked_sub_days(Days::new(offset.unsigned_abs()))
        }
        .ok_or_else(|| DeidError::Parse("shifted date out of range".to_string()))?;
        Ok(format.render(shifted))
    }
}

impl std::fmt::Debug for DateShifter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateShifter")
            .field("preferred", &self.preferred)
            .field("offset_days", &"[REDACTED]")
            .field("range_days", &self.range_days)
            .field("preserve_intervals", &self.preserve_intervals)
            .finish()
    }
}
