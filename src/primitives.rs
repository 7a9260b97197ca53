//! Primitive value types shared across the catalog: partial dates,
//! pagination ranges and the embedded-image content hash encoding.

use std::fmt;

/// How much of a `PartialDateTime` is actually known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Invalid = 0,
    Year = 1,
    Month = 2,
    Day = 3,
    Hour = 4,
    Min = 5,
    Sec = 6,
}

/// A date/time value with an explicit, possibly coarse, precision.
///
/// Unset fields below `precision` read as absent and are stored as `0`;
/// `PartialDateTime::fromString` degrades precision rather than
/// rejecting input when a trailing component is `0` (e.g. `1992-00`
/// parses to year precision).
#[derive(Debug, Clone, Copy)]
pub struct PartialDateTime {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
    precision: Precision,
}

impl PartialDateTime {
    pub const fn invalid() -> Self {
        Self {
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            min: 0,
            sec: 0,
            precision: Precision::Invalid,
        }
    }

    pub fn from_year(year: i32) -> Self {
        Self {
            year,
            month: 0,
            day: 0,
            hour: 0,
            min: 0,
            sec: 0,
            precision: Precision::Year,
        }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn is_valid(&self) -> bool {
        self.precision != Precision::Invalid
    }

    fn field_at(&self, min_precision: Precision, value: u32) -> Option<u32> {
        if self.precision >= min_precision {
            Some(value)
        } else {
            None
        }
    }

    pub fn year(&self) -> Option<i32> {
        if self.precision >= Precision::Year {
            Some(self.year)
        } else {
            None
        }
    }
    pub fn month(&self) -> Option<u32> {
        self.field_at(Precision::Month, self.month)
    }
    pub fn day(&self) -> Option<u32> {
        self.field_at(Precision::Day, self.day)
    }
    pub fn hour(&self) -> Option<u32> {
        self.field_at(Precision::Hour, self.hour)
    }
    pub fn min(&self) -> Option<u32> {
        self.field_at(Precision::Min, self.min)
    }
    pub fn sec(&self) -> Option<u32> {
        self.field_at(Precision::Sec, self.sec)
    }

    /// Parses `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or
    /// `YYYY-MM-DDTHH:MM:SS`, where `-` may also be `/` and `T` may
    /// also be a space. A zero month or day degrades precision instead
    /// of failing.
    pub fn from_str(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::invalid();
        }

        let (date_part, time_part) = split_date_time(s);

        let date_fields: Vec<&str> = date_part
            .split(|c| c == '-' || c == '/')
            .filter(|p| !p.is_empty())
            .collect();

        let year: i32 = match date_fields.first().and_then(|y| y.parse().ok()) {
            Some(y) => y,
            None => return Self::invalid(),
        };

        let month: u32 = match date_fields.get(1) {
            Some(m) => match m.parse() {
                Ok(v) => v,
                Err(_) => return Self::invalid(),
            },
            None => 0,
        };
        if month == 0 {
            return Self::from_year(year);
        }

        let day: u32 = match date_fields.get(2) {
            Some(d) => match d.parse() {
                Ok(v) => v,
                Err(_) => return Self::invalid(),
            },
            None => 0,
        };
        if day == 0 {
            return Self {
                year,
                month,
                day: 0,
                hour: 0,
                min: 0,
                sec: 0,
                precision: Precision::Month,
            };
        }

        let base = Self {
            year,
            month,
            day,
            hour: 0,
            min: 0,
            sec: 0,
            precision: Precision::Day,
        };

        let Some(time_part) = time_part else {
            return base;
        };
        let time_fields: Vec<&str> = time_part
            .split(':')
            .filter(|p| !p.is_empty())
            .collect();

        let hour: u32 = match time_fields.first().and_then(|h| h.parse().ok()) {
            Some(h) => h,
            None => return base,
        };
        let min: u32 = match time_fields.get(1).and_then(|m| m.parse().ok()) {
            Some(m) => m,
            None => {
                return Self {
                    hour,
                    precision: Precision::Hour,
                    ..base
                }
            }
        };
        let sec: u32 = match time_fields.get(2).and_then(|s| s.parse().ok()) {
            Some(s) => s,
            None => {
                return Self {
                    hour,
                    min,
                    precision: Precision::Min,
                    ..base
                }
            }
        };

        Self {
            hour,
            min,
            sec,
            precision: Precision::Sec,
            ..base
        }
    }

    /// Renders exactly the precision stored; the empty string for an
    /// invalid value.
    pub fn to_iso8601_string(&self) -> String {
        match self.precision {
            Precision::Invalid => String::new(),
            Precision::Year => format!("{:04}", self.year),
            Precision::Month => format!("{:04}-{:02}", self.year, self.month),
            Precision::Day => format!("{:04}-{:02}-{:02}", self.year, self.month, self.day),
            Precision::Hour => format!(
                "{:04}-{:02}-{:02}T{:02}",
                self.year, self.month, self.day, self.hour
            ),
            Precision::Min => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.min
            ),
            Precision::Sec => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.min, self.sec
            ),
        }
    }

    fn ordering_key(&self) -> (i32, u32, u32, u32, u32, u32, Precision) {
        (
            self.year,
            self.month,
            self.day,
            self.hour,
            self.min,
            self.sec,
            self.precision,
        )
    }

    /// The common prefix of `self` and `other`: the coarser of the two
    /// precisions, truncated to agreeing fields. Used by
    /// `Release::getOriginalDate`-style aggregation where several rows
    /// share a year but disagree below it.
    pub fn common_prefix(&self, other: &Self) -> Self {
        if !self.is_valid() || !other.is_valid() {
            return Self::invalid();
        }
        if self.year != other.year {
            return Self::invalid();
        }
        let mut result = Self::from_year(self.year);
        if self.precision < Precision::Month || other.precision < Precision::Month {
            return result;
        }
        if self.month != other.month {
            return result;
        }
        result = Self {
            month: self.month,
            precision: Precision::Month,
            ..result
        };
        if self.precision < Precision::Day || other.precision < Precision::Day {
            return result;
        }
        if self.day != other.day {
            return result;
        }
        result = Self {
            day: self.day,
            precision: Precision::Day,
            ..result
        };
        result
    }
}

fn split_date_time(s: &str) -> (&str, Option<&str>) {
    if let Some(idx) = s.find(['T', ' ']) {
        (&s[..idx], Some(&s[idx + 1..]))
    } else {
        (s, None)
    }
}

impl PartialEq for PartialDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.ordering_key() == other.ordering_key()
    }
}
impl Eq for PartialDateTime {}

impl PartialOrd for PartialDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PartialDateTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering_key().cmp(&other.ordering_key())
    }
}

impl fmt::Display for PartialDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso8601_string())
    }
}

/// A pagination window. `size == 0` (the default) means "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Range {
    pub offset: usize,
    pub size: usize,
}

impl Range {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_limited(&self) -> bool {
        self.size != 0
    }
}

/// 64-bit content fingerprint of an embedded image, stored as a decimal
/// string to survive SQLite's signed 64-bit `INTEGER` column range when
/// the high bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHash(pub u64);

impl ImageHash {
    pub fn to_storage_string(&self) -> String {
        self.0.to_string()
    }

    pub fn from_storage_string(s: &str) -> Option<Self> {
        s.parse::<u64>().ok().map(ImageHash)
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_only() {
        let d = PartialDateTime::from_str("1992");
        assert_eq!(d.precision(), Precision::Year);
        assert_eq!(d.year(), Some(1992));
        assert_eq!(d.month(), None);
    }

    #[test]
    fn zero_month_degrades_to_year() {
        let d = PartialDateTime::from_str("1992-00-00");
        assert_eq!(d.precision(), Precision::Year);
        assert_eq!(d.year(), Some(1992));
    }

    #[test]
    fn zero_day_degrades_to_month() {
        let d = PartialDateTime::from_str("1992-05-00");
        assert_eq!(d.precision(), Precision::Month);
        assert_eq!(d.month(), Some(5));
    }

    #[test]
    fn full_datetime_with_slashes_and_space() {
        let d = PartialDateTime::from_str("1992/01/05 10:20:30");
        assert_eq!(d.precision(), Precision::Sec);
        assert_eq!(d.sec(), Some(30));
    }

    #[test]
    fn roundtrip_iso8601_for_every_precision() {
        for s in [
            "1992",
            "1992-01",
            "1992-01-05",
            "1992-01-05T10",
            "1992-01-05T10:20",
            "1992-01-05T10:20:30",
        ] {
            let d = PartialDateTime::from_str(s);
            assert!(d.is_valid());
            let rendered = d.to_iso8601_string();
            let reparsed = PartialDateTime::from_str(&rendered);
            assert_eq!(d, reparsed, "roundtrip failed for {s}");
        }
    }

    #[test]
    fn invalid_value_renders_empty_string() {
        let d = PartialDateTime::invalid();
        assert_eq!(d.to_iso8601_string(), "");
    }

    #[test]
    fn equality_requires_identical_precision() {
        let year = PartialDateTime::from_str("1992");
        let month = PartialDateTime::from_str("1992-01");
        assert_ne!(year, month);
    }

    #[test]
    fn lower_precision_sorts_before_higher_at_equal_fields() {
        let year = PartialDateTime::from_str("1992");
        let month = PartialDateTime::from_str("1992-01");
        assert!(year < month);
    }

    #[test]
    fn common_prefix_of_matching_year_differing_month_is_year() {
        let a = PartialDateTime::from_str("1992");
        let b = PartialDateTime::from_str("1992-01");
        let c = PartialDateTime::from_str("1992-01-05");
        assert_eq!(a.common_prefix(&b), a);
        assert_eq!(b.common_prefix(&c), b);
        assert_eq!(a.common_prefix(&c), a);
    }

    #[test]
    fn range_unlimited_by_default() {
        let r = Range::default();
        assert!(!r.is_limited());
    }

    #[test]
    fn image_hash_storage_roundtrip() {
        let h = ImageHash(u64::MAX);
        let s = h.to_storage_string();
        assert_eq!(ImageHash::from_storage_string(&s), Some(h));
    }
}
